use chrono::{DateTime, Utc};

/// A recorded fact about a stream.
///
/// Immutable once appended; the audit log never rewrites or reorders it.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name used in logs, e.g. `requisition.approved`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version, bumped when a variant's fields change shape.
    fn schema_version(&self) -> u32 {
        1
    }

    /// Business time. Storage time is on the envelope.
    fn occurred_at(&self) -> DateTime<Utc>;
}
