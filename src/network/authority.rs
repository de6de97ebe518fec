//! Authority and Ownership
//!
//! Answers two questions the simulator asks every tick: may this instance
//! mutate the entity, and whose input drives it.

use std::collections::{BTreeMap, BTreeSet};

use crate::game::state::{EntityId, ParticipantId};

/// Authority/ownership lookup provided by the session layer.
pub trait Authority {
    /// May this instance mutate `entity`'s physical state?
    fn is_authority(&self, entity: EntityId) -> bool;

    /// Is `participant` the owner of `entity`?
    fn is_owner(&self, entity: EntityId, participant: ParticipantId) -> bool;
}

/// Table-backed [`Authority`].
#[derive(Clone, Debug, Default)]
pub struct AuthorityTable {
    authoritative: BTreeSet<EntityId>,
    owners: BTreeMap<EntityId, ParticipantId>,
}

impl AuthorityTable {
    /// Empty table: nothing is authoritative, nothing is owned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `owner` for `entity` and whether this instance simulates it.
    pub fn assign(&mut self, entity: EntityId, owner: ParticipantId, authoritative: bool) {
        self.owners.insert(entity, owner);
        if authoritative {
            self.authoritative.insert(entity);
        } else {
            self.authoritative.remove(&entity);
        }
    }

    /// Forget an entity.
    pub fn remove(&mut self, entity: EntityId) {
        self.owners.remove(&entity);
        self.authoritative.remove(&entity);
    }
}

impl Authority for AuthorityTable {
    fn is_authority(&self, entity: EntityId) -> bool {
        self.authoritative.contains(&entity)
    }

    fn is_owner(&self, entity: EntityId, participant: ParticipantId) -> bool {
        self.owners.get(&entity) == Some(&participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_query() {
        let mut table = AuthorityTable::new();
        let owner = ParticipantId::new([3; 16]);
        table.assign(EntityId(1), owner, true);
        table.assign(EntityId(2), owner, false);

        assert!(table.is_authority(EntityId(1)));
        assert!(!table.is_authority(EntityId(2)));
        assert!(table.is_owner(EntityId(2), owner));
        assert!(!table.is_owner(EntityId(2), ParticipantId::new([4; 16])));
        assert!(!table.is_authority(EntityId(9)));
    }

    #[test]
    fn test_reassign_drops_authority() {
        let mut table = AuthorityTable::new();
        let owner = ParticipantId::new([3; 16]);
        table.assign(EntityId(1), owner, true);
        table.assign(EntityId(1), owner, false);
        assert!(!table.is_authority(EntityId(1)));

        table.remove(EntityId(1));
        assert!(!table.is_owner(EntityId(1), owner));
    }
}
