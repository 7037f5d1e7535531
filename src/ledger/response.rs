//! Ledger response normalization
//!
//! Chaincode versions disagree on field casing: some return
//! `visitTimeFrom`, others `VisitTimeFrom`. The rest of the crate asks
//! for fields by camelCase name and this adapter checks both spellings,
//! so the scanner and coordinator never see the difference.

use serde_json::Value;

/// A normalized chaincode query result
#[derive(Debug, Clone)]
pub struct LedgerRecord {
    value: Value,
}

impl LedgerRecord {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// The underlying JSON value
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Whether the chaincode reported an error instead of a record
    pub fn is_error(&self) -> bool {
        self.value.get("error").is_some()
    }

    /// The chaincode error message, if any
    pub fn error_message(&self) -> Option<&str> {
        self.value.get("error").and_then(Value::as_str)
    }

    /// Fetch a field by camelCase name, falling back to PascalCase
    pub fn field(&self, camel: &str) -> Option<&Value> {
        if let Some(v) = self.value.get(camel) {
            return Some(v);
        }
        self.value.get(pascal_case(camel))
    }

    /// Fetch a string field in either casing
    pub fn str_field(&self, camel: &str) -> Option<&str> {
        self.field(camel).and_then(Value::as_str)
    }

    /// Fetch a boolean field in either casing
    pub fn bool_field(&self, camel: &str) -> bool {
        self.field(camel).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Descend into a nested object field in either casing
    pub fn nested(&self, camel: &str) -> Option<LedgerRecord> {
        self.field(camel)
            .filter(|v| v.is_object())
            .map(|v| LedgerRecord::new(v.clone()))
    }
}

/// Uppercase the first ASCII character: `visitDate` -> `VisitDate`
fn pascal_case(camel: &str) -> String {
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_field() {
        let record = LedgerRecord::new(json!({ "visitDate": "2026-08-06" }));
        assert_eq!(record.str_field("visitDate"), Some("2026-08-06"));
    }

    #[test]
    fn test_pascal_case_fallback() {
        let record = LedgerRecord::new(json!({
            "VisitDate": "2026-08-06",
            "VisitTimeFrom": "09:00",
        }));
        assert_eq!(record.str_field("visitDate"), Some("2026-08-06"));
        assert_eq!(record.str_field("visitTimeFrom"), Some("09:00"));
    }

    #[test]
    fn test_camel_case_wins_when_both_present() {
        let record = LedgerRecord::new(json!({
            "status": "accepted",
            "Status": "rejected",
        }));
        assert_eq!(record.str_field("status"), Some("accepted"));
    }

    #[test]
    fn test_bool_field_defaults_false() {
        let record = LedgerRecord::new(json!({ "IsBlocked": true }));
        assert!(record.bool_field("isBlocked"));
        assert!(!record.bool_field("somethingElse"));
    }

    #[test]
    fn test_nested_record() {
        let record = LedgerRecord::new(json!({
            "Visitor": { "status": "Blocked" }
        }));
        let visitor = record.nested("visitor").unwrap();
        assert_eq!(visitor.str_field("status"), Some("Blocked"));
        assert!(record.nested("resident").is_none());
    }

    #[test]
    fn test_error_detection() {
        let record = LedgerRecord::new(json!({ "error": "record not found" }));
        assert!(record.is_error());
        assert_eq!(record.error_message(), Some("record not found"));
    }
}
