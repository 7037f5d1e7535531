//! Database schemas for Gatekeeper
//!
//! Defines MongoDB document structures for users, residents, visitors,
//! visit requests, blocks, entry logs, notifications and the building
//! configuration.

mod block;
mod building;
mod entry_log;
mod metadata;
mod notification;
mod resident;
mod user;
mod visit_request;
mod visitor;

pub use block::{BlockDoc, BlockSubject, BLOCK_COLLECTION};
pub use building::{BuildingDoc, BUILDING_COLLECTION};
pub use entry_log::{EntryAction, EntryLogDoc, EntrySubject, ENTRY_LOG_COLLECTION};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NOTIFICATION_COLLECTION};
pub use resident::{ResidentDoc, RESIDENT_COLLECTION};
pub use user::{UserDoc, UserRole, USER_COLLECTION};
pub use visit_request::{RequestStatus, VisitRequestDoc, VISIT_REQUEST_COLLECTION};
pub use visitor::{VisitorDoc, VISITOR_COLLECTION};
