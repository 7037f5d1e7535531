//! Read projections
//!
//! Status enrichment layered over reads: a subject is "Blocked" exactly
//! while a live block row exists for it. Expired rows are deleted
//! lazily on read, the same idempotent delete the reaper performs on
//! its own cadence, so neither mechanism depends on the other having
//! run. Consumers must never trust a block row without checking
//! `to_datetime` — this module is where that check lives.

use bson::{doc, DateTime};

use crate::db::schemas::BlockDoc;
use crate::db::MongoCollection;
use crate::types::Result;

/// Projected block status of a resident or visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Active,
    Blocked,
}

impl BlockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockState::Active => "Active",
            BlockState::Blocked => "Blocked",
        }
    }
}

/// Pure decision: what a block row means right now.
///
/// Returns the projected state and whether the row is expired garbage
/// that should be deleted.
pub fn live_status(block: Option<&BlockDoc>, now: DateTime) -> (BlockState, bool) {
    match block {
        None => (BlockState::Active, false),
        Some(b) if b.is_expired(now) => (BlockState::Active, true),
        Some(_) => (BlockState::Blocked, false),
    }
}

/// Projected status for a subject, lazily deleting an expired block
pub async fn subject_status(
    blocks: &MongoCollection<BlockDoc>,
    external_id: &str,
    now: DateTime,
) -> Result<BlockState> {
    let block = blocks
        .find_one(doc! { "subject.external_id": external_id })
        .await?;

    let (state, expired) = live_status(block.as_ref(), now);

    if expired {
        // Same idempotent delete the reaper performs; racing it is fine
        blocks
            .delete_one(doc! { "subject.external_id": external_id })
            .await?;
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::BlockSubject;
    use bson::oid::ObjectId;

    fn block_until(to_millis: i64) -> BlockDoc {
        BlockDoc::new(
            BlockSubject::Resident {
                resident_id: ObjectId::new(),
                external_id: "RES-1001".into(),
            },
            "test".into(),
            "admin".into(),
            DateTime::from_millis(0),
            DateTime::from_millis(to_millis),
        )
    }

    #[test]
    fn test_no_block_is_active() {
        let (state, expired) = live_status(None, DateTime::from_millis(1_000));
        assert_eq!(state, BlockState::Active);
        assert!(!expired);
    }

    #[test]
    fn test_live_block_is_blocked() {
        let block = block_until(2_000);
        let (state, expired) = live_status(Some(&block), DateTime::from_millis(1_000));
        assert_eq!(state, BlockState::Blocked);
        assert!(!expired);
    }

    #[test]
    fn test_expired_block_reads_active_and_wants_delete() {
        let block = block_until(500);
        let (state, expired) = live_status(Some(&block), DateTime::from_millis(1_000));
        assert_eq!(state, BlockState::Active);
        assert!(expired);
    }

    #[test]
    fn test_block_active_at_exact_expiry_instant() {
        let block = block_until(1_000);
        let (state, _) = live_status(Some(&block), DateTime::from_millis(1_000));
        assert_eq!(state, BlockState::Blocked);
    }
}
