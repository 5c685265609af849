use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated caller of a workflow operation.
///
/// Authorization is relational: whether an actor may act on a resource is
/// decided per operation from (caller, resource, relationship), e.g. being
/// the request's organizer or the owner of the quoted vendor. The only
/// stored privilege is the platform-admin override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub admin: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self { user_id, admin: false }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self { user_id, admin: true }
    }
}
