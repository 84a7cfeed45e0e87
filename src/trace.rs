//! Deterministic idempotency keys
//!
//! Outbound message ids and refund trace ids are derived from the id of the
//! triggering event, so a redelivered event produces the same keys and the
//! bus / wallet can deduplicate.

use uuid::Uuid;

/// Derive a stable id from a source message id and a step tag.
///
/// Source ids that are not UUIDs are first hashed into one, so the
/// derivation stays total.
pub fn derive_id(source_id: &str, tag: &str) -> Uuid {
    let namespace = Uuid::parse_str(source_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, source_id.as_bytes()));
    Uuid::new_v5(&namespace, tag.as_bytes())
}

/// Id of the `step`-th reply to a source message (steps start at 1).
pub fn reply_id(source_id: &str, step: u32) -> Uuid {
    derive_id(source_id, &format!("reply {}", step))
}

pub fn refund_trace_id(source_id: &str) -> Uuid {
    derive_id(source_id, "refund")
}

/// Fresh trace for one-shot operations that must not be deduplicated.
pub fn random_trace_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_stable() {
        let source = "2f1c2b3e-7e8a-4c1b-9d2e-1f0a3b4c5d6e";
        assert_eq!(refund_trace_id(source), refund_trace_id(source));
        assert_eq!(reply_id(source, 1), reply_id(source, 1));
    }

    #[test]
    fn test_tags_and_sources_separate_ids() {
        let source = "2f1c2b3e-7e8a-4c1b-9d2e-1f0a3b4c5d6e";
        assert_ne!(reply_id(source, 1), reply_id(source, 2));
        assert_ne!(reply_id(source, 1), refund_trace_id(source));
        assert_ne!(
            refund_trace_id(source),
            refund_trace_id("8a9b0c1d-2e3f-4a5b-8c7d-9e0f1a2b3c4d")
        );
    }

    #[test]
    fn test_non_uuid_source_still_derives() {
        assert_eq!(derive_id("msg-42", "refund"), derive_id("msg-42", "refund"));
        assert_ne!(derive_id("msg-42", "refund"), derive_id("msg-43", "refund"));
    }

    #[test]
    fn test_random_traces_differ() {
        assert_ne!(random_trace_id(), random_trace_id());
    }
}
