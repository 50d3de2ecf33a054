use sha2::{Digest, Sha256};
use std::fmt;

use crate::store::BlockRow;

/// Fingerprint of a profile's stored block rows.
///
/// Two reads return the same revision only when the rows have the same ids,
/// types, content and order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Hash rows as read from storage, in `display_order` order
    pub fn of_rows(rows: &[BlockRow]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((rows.len() as u64).to_be_bytes());
        for row in rows {
            hasher.update(row.id.to_be_bytes());
            hasher.update(row.display_order.to_be_bytes());
            hasher.update(row.block_type.as_bytes());
            hasher.update([0u8]);
            // serde_json::Map keeps keys sorted, so this is stable
            hasher.update(row.content.to_string().as_bytes());
            hasher.update([0u8]);
        }

        let digest = hasher.finalize();
        Self(digest.iter().map(|byte| format!("{:02x}", byte)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, enough for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}
