//! Paged entity storage and typed message dispatch.
//!
//! The store holds arbitrary aggregate entity types contiguously in
//! fixed-capacity pages, hands out stable lightweight references to them,
//! and broadcasts typed messages to every live instance of a type — all
//! without compile-time knowledge of those types outside of registration.
//!
//! The moving parts, leaves first: [`EntityPage`] owns slots and an
//! occupancy bitmap; [`EntityInterface`] is the per-type function table
//! generated from an [`Entity`] impl at registration; [`MessageRegistry`]
//! assigns message type ids on first use; [`World`] ties it all together.

mod entity;
mod error;
mod interface;
mod message;
mod occupancy;
mod page;
mod world;

pub use entity::{
    EntityDescriptor, EntityId, EntityRef, EntityTypeId, EntityVersion, MessageTypeId, PageId,
};
pub use error::WorldError;
pub use interface::{
    CloneFn, DropFn, EmbeddedComponent, Entity, EntityInterface, EntitySpec, Handles, MoveFn,
    SendContiguousFn, SendFn, SendManyFn, SwapFn,
};
pub use message::{
    FixedUpdateMessage, MessageRegistry, PostSpawnMessage, PreKillMessage, UpdateMessage,
};
pub use page::{EntityPage, ReservedSlot, PAGE_CAPACITY};
pub use world::World;
