//! Message typing: the registry that assigns ids and the well-known
//! lifecycle payloads.
//!
//! Message payloads are plain data records passed by reference to dispatch
//! functions. The store defines the lifecycle messages (post-spawn,
//! pre-kill) and their invocation points; everything else is opaque to it.

use super::entity::{EntityDescriptor, MessageTypeId};
use super::error::WorldError;
use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use tracing::debug;

/// Assigns a stable integer id to each message type on first use.
///
/// Owned by the world rather than living in process-global state, so
/// independent worlds (and tests) stay hermetic. Per-type dispatch tables
/// are sized against these ids.
#[derive(Default)]
pub struct MessageRegistry {
    ids: HashMap<TypeId, MessageTypeId>,
    names: Vec<&'static str>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicitly register a message type, failing if it already exists.
    pub fn register<M: 'static>(&mut self) -> Result<MessageTypeId, WorldError> {
        if self.ids.contains_key(&TypeId::of::<M>()) {
            return Err(WorldError::DuplicateMessageType {
                name: type_name::<M>().to_string(),
            });
        }
        Ok(self.assign::<M>())
    }

    /// Id of a message type, assigning one on first use.
    pub fn resolve<M: 'static>(&mut self) -> MessageTypeId {
        match self.ids.get(&TypeId::of::<M>()) {
            Some(&id) => id,
            None => self.assign::<M>(),
        }
    }

    /// Id of a message type, if one has been assigned.
    pub fn lookup<M: 'static>(&self) -> Option<MessageTypeId> {
        self.ids.get(&TypeId::of::<M>()).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name_of(&self, id: MessageTypeId) -> Option<&'static str> {
        self.names.get(id as usize).copied()
    }

    fn assign<M: 'static>(&mut self) -> MessageTypeId {
        let id = self.names.len() as MessageTypeId;
        self.ids.insert(TypeId::of::<M>(), id);
        self.names.push(type_name::<M>());
        debug!(name = type_name::<M>(), id, "assigned message type id");
        id
    }
}

/// Sent to an entity right after it is constructed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSpawnMessage {
    pub descriptor: EntityDescriptor,
}

/// Sent to an entity right before its destructor runs, so it can release
/// sub-entities or notify listeners about its impending destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKillMessage {
    pub descriptor: EntityDescriptor,
}

/// Per-frame tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub delta_time: f64,
}

/// Fixed-rate simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedUpdateMessage {
    pub delta_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_stable() {
        let mut registry = MessageRegistry::new();
        let update = registry.resolve::<UpdateMessage>();
        let fixed = registry.resolve::<FixedUpdateMessage>();
        assert_eq!(update, 0);
        assert_eq!(fixed, 1);
        assert_eq!(registry.resolve::<UpdateMessage>(), update);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = MessageRegistry::new();
        registry.register::<UpdateMessage>().unwrap();
        assert!(matches!(
            registry.register::<UpdateMessage>(),
            Err(WorldError::DuplicateMessageType { .. })
        ));
    }

    #[test]
    fn lookup_does_not_assign() {
        let mut registry = MessageRegistry::new();
        assert_eq!(registry.lookup::<PreKillMessage>(), None);
        let id = registry.resolve::<PreKillMessage>();
        assert_eq!(registry.lookup::<PreKillMessage>(), Some(id));
        assert!(registry.name_of(id).unwrap().contains("PreKillMessage"));
    }
}
