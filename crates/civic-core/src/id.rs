//! ID generation for civic issues
//!
//! Hash-based IDs so records created by the API and the operator CLI never
//! need a central counter.
//! Format: iss-xxxxxxxxxx (10 lowercase alphanumeric chars)

use sha2::{Digest, Sha256};
use uuid::Uuid;

const HASH_LEN: usize = 10;

/// Generate a unique issue ID
///
/// Uses UUID + timestamp hash, encoded as base32 lowercase.
pub fn generate_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4();
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(uuid.as_bytes());
    hasher.update(timestamp.to_le_bytes());

    let hash = hasher.finalize();

    // 8 bytes give 13 base32 chars, more than we keep
    let encoded = base32::encode(base32::Alphabet::Crockford, &hash[..8])
        .to_lowercase()
        .chars()
        .take(HASH_LEN)
        .collect::<String>();

    format!("{}-{}", prefix, encoded)
}

/// Parse an issue ID into prefix and hash
pub fn parse_id(id: &str) -> Option<(&str, &str)> {
    let (prefix, hash) = id.split_once('-')?;
    if prefix.is_empty() || hash.is_empty() {
        return None;
    }
    Some((prefix, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("iss");
        assert!(id.starts_with("iss-"));
        assert_eq!(id.len(), 4 + HASH_LEN);
        assert!(id[4..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_ids_are_distinct() {
        let a = generate_id("iss");
        let b = generate_id("iss");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("iss-abc123"), Some(("iss", "abc123")));
        assert_eq!(parse_id("iss-"), None);
        assert_eq!(parse_id("nohyphen"), None);
    }
}
