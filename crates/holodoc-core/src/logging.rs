//! Structured logging schema and field name constants for HoloDoc.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Unusable configuration, session cannot continue |
//! | WARN  | Failed or slow request, local state kept as-is |
//! | INFO  | Lifecycle events (session start, match, link) |
//! | DEBUG | Request dispatch and completion, reconciliation decisions |
//! | TRACE | Payload sizes, per-record iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "core", "sync", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "registry", "links", "http", "session"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "match_or_create", "update", "create_link"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Local entity handle.
pub const ENTITY_ID: &str = "entity_id";

/// Server-assigned document identity.
pub const DOCUMENT_ID: &str = "document_id";

/// Link group identifier.
pub const LINK_ID: &str = "link_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a request payload.
pub const PAYLOAD_LEN: &str = "payload_len";

/// Byte length of a response body.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [&str; 12] = [
        SUBSYSTEM,
        COMPONENT,
        OPERATION,
        ENTITY_ID,
        DOCUMENT_ID,
        LINK_ID,
        DURATION_MS,
        PAYLOAD_LEN,
        RESPONSE_LEN,
        SUCCESS,
        ERROR_MSG,
        SLOW,
    ];

    #[test]
    fn test_field_names_are_unique_snake_case() {
        let unique: HashSet<&str> = ALL.iter().copied().collect();
        assert_eq!(unique.len(), ALL.len());
        for name in ALL {
            assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
