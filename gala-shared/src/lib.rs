pub mod events;
pub mod money;
pub mod party;

pub use events::WorkflowEvent;
pub use party::Actor;
