//! External identifier generation
//!
//! Ledger-facing identities are prefixed short hex strings. The prefix
//! doubles as the structural tag the scanner classifies tokens by, so
//! it never changes once issued.

use rand::RngCore;

pub const RESIDENT_PREFIX: &str = "RES";
pub const VISITOR_PREFIX: &str = "VIS";
pub const REQUEST_PREFIX: &str = "REQ";

fn generate(prefix: &str) -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}-{}", prefix, hex::encode(bytes))
}

/// New resident identity, e.g. "RES-9f2ab41c"
pub fn resident_id() -> String {
    generate(RESIDENT_PREFIX)
}

/// New visitor identity, e.g. "VIS-0c77d2e9"
pub fn visitor_id() -> String {
    generate(VISITOR_PREFIX)
}

/// New visit request key, e.g. "REQ-5d11efa0"
pub fn request_id() -> String {
    generate(REQUEST_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert!(resident_id().starts_with("RES-"));
        assert!(visitor_id().starts_with("VIS-"));
        assert!(request_id().starts_with("REQ-"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = request_id();
        let b = request_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_shape() {
        let id = resident_id();
        let (prefix, hex_part) = id.split_once('-').unwrap();
        assert_eq!(prefix, "RES");
        assert_eq!(hex_part.len(), 8);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
