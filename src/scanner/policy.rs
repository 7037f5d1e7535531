//! Entry policy decisions
//!
//! Pure functions driving the verification state machine: token
//! classification, block checks, and time-window checks over the
//! normalized ledger record. The block check always precedes the
//! window check — a blocked subject is rejected even inside a valid
//! window.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::ledger::LedgerRecord;
use crate::services::idgen::{REQUEST_PREFIX, RESIDENT_PREFIX, VISITOR_PREFIX};

/// Subject kind a token resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Resident,
    Visitor,
    Request,
}

/// Terminal rejection states of the verification machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Token prefix matches no subject kind
    InvalidToken,
    /// Subject missing on the ledger or in local metadata
    NotFound(&'static str),
    /// An active block gates the subject
    Blocked(TokenKind),
    /// Current time falls outside the visit window
    OutOfWindow { from: String, to: String },
    /// Visit request exists but was never accepted
    NotAccepted,
    /// The ledger record lacked fields the decision requires
    Malformed(String),
}

impl Rejection {
    /// Operator-facing description
    pub fn message(&self) -> String {
        match self {
            Rejection::InvalidToken => "Invalid QR code format".into(),
            Rejection::NotFound(what) => format!("{} not found", what),
            Rejection::Blocked(TokenKind::Resident) => "Access denied. Resident blocked".into(),
            Rejection::Blocked(_) => "Access denied. Visitor blocked".into(),
            Rejection::OutOfWindow { from, to } => {
                format!("Access denied. Visit only allowed between {} and {}", from, to)
            }
            Rejection::NotAccepted => "Visit request is not accepted".into(),
            Rejection::Malformed(detail) => format!("Ledger record malformed: {}", detail),
        }
    }
}

/// Classify a token by its structural prefix
pub fn classify(token: &str) -> Option<TokenKind> {
    match token.split('-').next() {
        Some(p) if p == RESIDENT_PREFIX => Some(TokenKind::Resident),
        Some(p) if p == VISITOR_PREFIX => Some(TokenKind::Visitor),
        Some(p) if p == REQUEST_PREFIX => Some(TokenKind::Request),
        _ => None,
    }
}

/// Whether `now` falls inside [from, to] on `date`, both ends inclusive
pub fn window_contains(
    now: NaiveDateTime,
    date: NaiveDate,
    from: &str,
    to: &str,
) -> Result<bool, Rejection> {
    let from_t = parse_time(from)?;
    let to_t = parse_time(to)?;

    let start = date.and_time(from_t);
    let end = date.and_time(to_t);

    Ok(now >= start && now <= end)
}

fn parse_time(value: &str) -> Result<NaiveTime, Rejection> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| Rejection::Malformed(format!("unparseable time '{}'", value)))
}

fn parse_date(value: &str) -> Result<NaiveDate, Rejection> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Rejection::Malformed(format!("unparseable date '{}'", value)))
}

/// Resident gate: ledger presence and block flag. Residents carry no
/// time window; the window state is skipped unconditionally.
pub fn check_resident(record: &LedgerRecord) -> Result<(), Rejection> {
    if record.is_error() {
        return Err(Rejection::NotFound("Resident"));
    }

    if record.bool_field("isBlocked") {
        return Err(Rejection::Blocked(TokenKind::Resident));
    }

    Ok(())
}

/// Visitor gate: ledger presence, nested block status, then today's
/// visit window
pub fn check_visitor(record: &LedgerRecord, now: NaiveDateTime) -> Result<(), Rejection> {
    if record.is_error() {
        return Err(Rejection::NotFound("Visitor"));
    }

    let blocked = record
        .nested("visitor")
        .and_then(|v| v.str_field("status").map(|s| s == "Blocked"))
        .unwrap_or(false);
    if blocked {
        return Err(Rejection::Blocked(TokenKind::Visitor));
    }

    let from = record
        .str_field("visitTimeFrom")
        .ok_or_else(|| Rejection::Malformed("missing visitTimeFrom".into()))?
        .to_string();
    let to = record
        .str_field("visitTimeTo")
        .ok_or_else(|| Rejection::Malformed("missing visitTimeTo".into()))?
        .to_string();

    if !window_contains(now, now.date(), &from, &to)? {
        return Err(Rejection::OutOfWindow { from, to });
    }

    Ok(())
}

/// Visit request gate: ledger presence, accepted status, then the
/// request's dated window
pub fn check_request(record: &LedgerRecord, now: NaiveDateTime) -> Result<(), Rejection> {
    if record.is_error() {
        return Err(Rejection::NotFound("Visit request"));
    }

    if record.str_field("status") != Some("accepted") {
        return Err(Rejection::NotAccepted);
    }

    let date = parse_date(
        record
            .str_field("visitDate")
            .ok_or_else(|| Rejection::Malformed("missing visitDate".into()))?,
    )?;
    let from = record
        .str_field("visitTimeFrom")
        .ok_or_else(|| Rejection::Malformed("missing visitTimeFrom".into()))?
        .to_string();
    let to = record
        .str_field("visitTimeTo")
        .ok_or_else(|| Rejection::Malformed("missing visitTimeTo".into()))?
        .to_string();

    if !window_contains(now, date, &from, &to)? {
        return Err(Rejection::OutOfWindow { from, to });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(NaiveTime::parse_from_str(time, "%H:%M").unwrap())
    }

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(classify("RES-1001"), Some(TokenKind::Resident));
        assert_eq!(classify("VIS-20af31bc"), Some(TokenKind::Visitor));
        assert_eq!(classify("REQ-5d11efa0"), Some(TokenKind::Request));
        assert_eq!(classify("BADGE-1"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_window_boundaries_inclusive() {
        let date = NaiveDate::parse_from_str("2026-08-06", "%Y-%m-%d").unwrap();
        let check = |time| window_contains(at("2026-08-06", time), date, "10:00", "12:00").unwrap();

        assert!(!check("09:59"));
        assert!(check("10:00"));
        assert!(check("11:30"));
        assert!(check("12:00"));
        assert!(!check("12:01"));
    }

    #[test]
    fn test_resident_block_gate() {
        let blocked = LedgerRecord::new(json!({ "residentId": "RES-1", "isBlocked": true }));
        assert_eq!(
            check_resident(&blocked),
            Err(Rejection::Blocked(TokenKind::Resident))
        );

        let clear = LedgerRecord::new(json!({ "residentId": "RES-1", "isBlocked": false }));
        assert_eq!(check_resident(&clear), Ok(()));

        let missing = LedgerRecord::new(json!({ "error": "record not found" }));
        assert_eq!(check_resident(&missing), Err(Rejection::NotFound("Resident")));
    }

    #[test]
    fn test_visitor_block_precedes_window() {
        // Blocked inside a perfectly valid window still rejects Blocked
        let record = LedgerRecord::new(json!({
            "visitorId": "VIS-1",
            "visitTimeFrom": "00:00",
            "visitTimeTo": "23:59",
            "visitor": { "status": "Blocked" },
        }));
        assert_eq!(
            check_visitor(&record, at("2026-08-06", "10:00")),
            Err(Rejection::Blocked(TokenKind::Visitor))
        );
    }

    #[test]
    fn test_visitor_window_enforced() {
        let record = LedgerRecord::new(json!({
            "visitorId": "VIS-1",
            "visitTimeFrom": "10:00",
            "visitTimeTo": "12:00",
            "visitor": { "status": "Active" },
        }));

        assert_eq!(check_visitor(&record, at("2026-08-06", "11:00")), Ok(()));
        assert!(matches!(
            check_visitor(&record, at("2026-08-06", "12:01")),
            Err(Rejection::OutOfWindow { .. })
        ));
    }

    #[test]
    fn test_request_must_be_accepted() {
        let pending = LedgerRecord::new(json!({
            "requestId": "REQ-1",
            "status": "pending",
            "visitDate": "2026-08-06",
            "visitTimeFrom": "09:00",
            "visitTimeTo": "11:00",
        }));
        assert_eq!(
            check_request(&pending, at("2026-08-06", "10:00")),
            Err(Rejection::NotAccepted)
        );
    }

    #[test]
    fn test_request_window_on_its_date() {
        let record = LedgerRecord::new(json!({
            "requestId": "REQ-1",
            "status": "accepted",
            "visitDate": "2026-08-06",
            "visitTimeFrom": "09:00",
            "visitTimeTo": "11:00",
        }));

        assert_eq!(check_request(&record, at("2026-08-06", "09:00")), Ok(()));
        assert_eq!(check_request(&record, at("2026-08-06", "11:00")), Ok(()));
        assert!(matches!(
            check_request(&record, at("2026-08-06", "11:01")),
            Err(Rejection::OutOfWindow { .. })
        ));
        // Right time, wrong day
        assert!(matches!(
            check_request(&record, at("2026-08-07", "10:00")),
            Err(Rejection::OutOfWindow { .. })
        ));
    }

    #[test]
    fn test_pascal_case_records_decide_identically() {
        let record = LedgerRecord::new(json!({
            "RequestId": "REQ-1",
            "Status": "accepted",
            "VisitDate": "2026-08-06",
            "VisitTimeFrom": "09:00",
            "VisitTimeTo": "11:00",
        }));
        assert_eq!(check_request(&record, at("2026-08-06", "10:00")), Ok(()));
    }

    #[test]
    fn test_malformed_window_is_not_a_policy_reject() {
        let record = LedgerRecord::new(json!({
            "visitorId": "VIS-1",
            "visitor": { "status": "Active" },
        }));
        assert!(matches!(
            check_visitor(&record, at("2026-08-06", "10:00")),
            Err(Rejection::Malformed(_))
        ));
    }
}
