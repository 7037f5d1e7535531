//! Background and utility services

pub mod idgen;
pub mod qr;
pub mod reaper;

pub use qr::{QrCategory, QrStore};
pub use reaper::{ExpiryReaper, SweepReport};
