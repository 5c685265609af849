use async_trait::async_trait;

use crate::error::WorkflowError;

/// Kinds of human-presentable numbers issued by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Quote,
    Booking,
    Payment,
}

impl SequenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::Quote => "Q",
            SequenceKind::Booking => "B",
            SequenceKind::Payment => "P",
        }
    }
}

/// Render a sequence value as the externally stable number, e.g.
/// `Q-2025-00123`. The pad is a display minimum; values past 99999 simply
/// widen.
pub fn format_sequence(kind: SequenceKind, year: i32, value: u64) -> String {
    format!("{}-{}-{:05}", kind.prefix(), year, value)
}

/// Issues unique, strictly increasing numbers per `(kind, year)` key.
///
/// Gaps are acceptable; duplicates are not, including across service
/// instances, so implementations must advance an atomic counter in the
/// store rather than scanning for max-plus-one. Unavailability is fatal to
/// the calling operation: no quote, booking or payment may exist without a
/// valid number.
#[async_trait]
pub trait SequenceIssuer: Send + Sync {
    async fn next(&self, kind: SequenceKind, year: i32) -> Result<String, WorkflowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_minimum_width() {
        assert_eq!(format_sequence(SequenceKind::Quote, 2025, 123), "Q-2025-00123");
        assert_eq!(format_sequence(SequenceKind::Booking, 2025, 1), "B-2025-00001");
        assert_eq!(format_sequence(SequenceKind::Payment, 2026, 7), "P-2026-00007");
    }

    #[test]
    fn widens_past_pad() {
        assert_eq!(format_sequence(SequenceKind::Quote, 2025, 123456), "Q-2025-123456");
    }
}
