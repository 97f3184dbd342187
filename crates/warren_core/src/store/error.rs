use super::entity::{EntityDescriptor, PageId};
use thiserror::Error;

/// Errors raised by the entity store.
///
/// All of these indicate a caller-contract violation and fail fast; none
/// are transient. Benign not-found paths (double despawn, sending to an
/// empty slot) return `bool` instead of raising.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("entity type '{name}' is already registered")]
    DuplicateEntityType { name: String },

    #[error("message type '{name}' is already registered")]
    DuplicateMessageType { name: String },

    #[error("init has been finalized; no new types may be registered")]
    InitFinalized,

    #[error("pages {dst_page} and {src_page} hold different entity types")]
    IncompatiblePages { dst_page: PageId, src_page: PageId },

    #[error("destination slot {descriptor:?} is already occupied")]
    DestinationOccupied { descriptor: EntityDescriptor },

    #[error("slot {descriptor:?} is empty")]
    EmptySlot { descriptor: EntityDescriptor },

    #[error("entity type '{entity}' already handles message type '{message}'")]
    DuplicateMessageHandler {
        entity: &'static str,
        message: &'static str,
    },

    #[error("entity type '{name}' is not registered")]
    UnknownEntityType { name: String },

    #[error("descriptor {descriptor:?} does not reference an existing page")]
    InvalidDescriptor { descriptor: EntityDescriptor },
}
