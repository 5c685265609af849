pub mod app_config;
pub mod events;
pub mod memory;
pub mod postgres;

pub use app_config::Config;
pub use events::EventBus;
pub use memory::{MemoryDirectory, MemorySequenceIssuer, MemoryStore};
pub use postgres::{PgDirectory, PgSequenceIssuer, PgStore};
