//! Object identifier generation.

use uuid::Uuid;

/// Produces candidate object ids for a bucket.
///
/// Implementations only need to be effectively unique; the object store
/// re-checks every candidate against the filesystem before using it.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, bucket: &str) -> String;
}

/// Random 128-bit ids rendered as hyphenated lowercase UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self, _bucket: &str) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_canonical_uuids() {
        let id = UuidGenerator.generate("photos");
        let parsed = Uuid::parse_str(&id).expect("canonical uuid");
        assert_eq!(parsed.to_string(), id);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn successive_ids_differ() {
        let ids: HashSet<String> = (0..1000).map(|_| UuidGenerator.generate("b")).collect();
        assert_eq!(ids.len(), 1000);
    }
}
