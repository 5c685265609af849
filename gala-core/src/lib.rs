pub mod directory;
pub mod error;
pub mod events;
pub mod sequence;

pub use directory::{EventDirectory, EventSummary, VendorDirectory, VendorProfile};
pub use error::{ConflictKind, WorkflowError};
pub use events::{EventSink, NullSink};
pub use sequence::{format_sequence, SequenceIssuer, SequenceKind};
