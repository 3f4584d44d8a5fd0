//! Identity types for Vellum records

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
/// `Uuid::nil()` marks an identifier that has not been assigned yet.
pub type EntityId = Uuid;

/// Identifier of the user (or service) acting on a record.
pub type ActorId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Whether an identifier has been assigned.
pub fn is_assigned(id: &Uuid) -> bool {
    !id.is_nil()
}

/// Whether an optional actor carries a real (non-nil) identifier.
pub fn actor_is_set(actor: &Option<ActorId>) -> bool {
    actor.is_some_and(|a| !a.is_nil())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_is_assigned_and_unique() {
        let a = new_entity_id();
        let b = new_entity_id();
        assert!(is_assigned(&a));
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 7);
    }

    #[test]
    fn test_actor_is_set() {
        assert!(!actor_is_set(&None));
        assert!(!actor_is_set(&Some(Uuid::nil())));
        assert!(actor_is_set(&Some(Uuid::now_v7())));
    }
}
