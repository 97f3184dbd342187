//! Entity handles: slot descriptors and reuse-detecting references.
//!
//! An [`EntityDescriptor`] names a storage slot and is only valid while
//! that slot stays occupied. An [`EntityRef`] adds a version counter so a
//! stale holder can detect that the underlying slot was repurposed.

use super::page::PAGE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-lifetime id of a registered entity type.
pub type EntityTypeId = u32;

/// Process-lifetime id of a registered message type.
pub type MessageTypeId = u32;

/// Index of a page in the world's page table.
pub type PageId = u32;

/// Longer-lived entity identity, recycled through a free list.
pub type EntityId = u32;

/// Incremented each time an [`EntityId`] is detached from a slot.
pub type EntityVersion = u32;

const PAGE_SHIFT: u32 = PAGE_CAPACITY.trailing_zeros();
const OFFSET_MASK: u32 = PAGE_CAPACITY as u32 - 1;

/// Identifies a currently-live slot: `page_id * PAGE_CAPACITY + offset`.
///
/// Descriptors are reused once the slot is freed, so they must not be
/// retained across a despawn without external invalidation; use
/// [`EntityRef`] for that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityDescriptor(u32);

impl EntityDescriptor {
    pub fn from_parts(page: PageId, offset: u32) -> Self {
        debug_assert!(offset < PAGE_CAPACITY as u32);
        Self((page << PAGE_SHIFT) | offset)
    }

    #[inline]
    pub fn page(&self) -> PageId {
        self.0 >> PAGE_SHIFT
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.0 & OFFSET_MASK
    }

    pub fn to_bits(&self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityDescriptor(page={}, offset={})",
            self.page(),
            self.offset()
        )
    }
}

/// Entity identity with a reuse counter.
///
/// Format: [32-bit id | 32-bit version]. The id maps through the world's
/// indirection table to a descriptor; the version must match the id's
/// current version or the reference is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub version: EntityVersion,
}

impl EntityRef {
    /// Serialize to a 64-bit integer (for networking/save files).
    pub fn to_bits(&self) -> u64 {
        ((self.version as u64) << 32) | (self.id as u64)
    }

    /// Deserialize from a 64-bit integer.
    pub fn from_bits(bits: u64) -> Self {
        Self {
            id: bits as u32,
            version: (bits >> 32) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips_page_and_offset() {
        for (page, offset) in [(0, 0), (0, 255), (1, 0), (7, 44), (1000, 99)] {
            let descriptor = EntityDescriptor::from_parts(page, offset);
            assert_eq!(descriptor.page(), page);
            assert_eq!(descriptor.offset(), offset);
            assert_eq!(
                descriptor.to_bits(),
                page * PAGE_CAPACITY as u32 + offset
            );
            assert_eq!(EntityDescriptor::from_bits(descriptor.to_bits()), descriptor);
        }
    }

    #[test]
    fn entity_ref_bits_round_trip() {
        let entity_ref = EntityRef { id: 12345, version: 7 };
        assert_eq!(EntityRef::from_bits(entity_ref.to_bits()), entity_ref);
    }

    #[test]
    fn descriptor_serde_round_trip() {
        let descriptor = EntityDescriptor::from_parts(3, 99);
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(
            serde_json::from_str::<EntityDescriptor>(&json).unwrap(),
            descriptor
        );
    }
}
