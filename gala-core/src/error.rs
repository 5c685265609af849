use thiserror::Error;

/// Machine-readable discriminant for state conflicts, so callers can react
/// to a specific refusal without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    QuoteExpired,
    QuoteNotOpen,
    RequestAlreadyResolved,
    RequestNotEditable,
    RequestNotQuotable,
    QuoteAlreadyOpen,
    BookingNotCancellable,
    BookingNotCompletable,
    BookingNotEditable,
    BookingClosed,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::QuoteExpired => "quote expired",
            ConflictKind::QuoteNotOpen => "quote is not open for this transition",
            ConflictKind::RequestAlreadyResolved => "request already resolved",
            ConflictKind::RequestNotEditable => "request can no longer be edited",
            ConflictKind::RequestNotQuotable => "request cannot take a quote",
            ConflictKind::QuoteAlreadyOpen => "request already has an open quote",
            ConflictKind::BookingNotCancellable => "booking cannot be cancelled",
            ConflictKind::BookingNotCompletable => "booking cannot be completed",
            ConflictKind::BookingNotEditable => "booking can no longer be edited",
            ConflictKind::BookingClosed => "booking no longer accepts payments",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed input, rejected before any state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The transition is not legal from the entity's current state. Carries
    /// the authoritative state so the caller can reconcile.
    #[error("{entity} {id}: {} (current state: {current})", .kind.as_str())]
    StateConflict {
        kind: ConflictKind,
        entity: &'static str,
        id: String,
        current: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller holds no relationship to the resource that permits the
    /// operation. Distinct from validation so resource existence does not
    /// leak to non-parties.
    #[error("operation not permitted: {0}")]
    Forbidden(String),

    /// A financial invariant would be broken. Never auto-clamped.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Store or sequence issuer unavailable; the operation was not applied.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn conflict(
        kind: ConflictKind,
        entity: &'static str,
        id: impl ToString,
        current: impl ToString,
    ) -> Self {
        WorkflowError::StateConflict {
            kind,
            entity,
            id: id.to_string(),
            current: current.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound { entity, id: id.to_string() }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        WorkflowError::Forbidden(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        WorkflowError::Invariant(msg.into())
    }

    pub fn infra(err: impl std::fmt::Display) -> Self {
        WorkflowError::Infrastructure(err.to_string())
    }

    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            WorkflowError::StateConflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
