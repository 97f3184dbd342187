// world.rs - the top-level entity store
//
// Owns every page, the per-type interface table and the id/version
// indirection. All cross-references between parts are index-based (type
// ids, page ids); nothing points back at the world.

use super::entity::{
    EntityDescriptor, EntityId, EntityRef, EntityTypeId, EntityVersion, MessageTypeId, PageId,
};
use super::error::WorldError;
use super::interface::{stride_of, Entity, EntityInterface};
use super::message::{MessageRegistry, PostSpawnMessage, PreKillMessage};
use super::page::{EntityPage, PAGE_CAPACITY};
use crate::strided::ErasedStridedSlice;
use glam::{Mat4, Quat, Vec3};
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Where an embedded component of some type can be found: every entity of
/// the host page carries one at a fixed byte offset.
#[derive(Debug, Clone, Copy)]
struct ComponentOverlay {
    page_id: PageId,
    byte_offset: usize,
}

/// The entity store: registration, paging, spawn/despawn, iteration and
/// typed message dispatch.
///
/// Single-threaded by design; every operation is synchronous and bounded,
/// and raw pointers handed to callbacks are valid only for the duration of
/// that callback.
pub struct World {
    interfaces: Vec<EntityInterface>,
    type_names: HashMap<String, EntityTypeId>,
    rust_types: HashMap<TypeId, EntityTypeId>,
    pages: Vec<EntityPage>,
    pages_by_type: Vec<Vec<PageId>>,
    overlays_by_type: Vec<Vec<ComponentOverlay>>,
    /// Pages with free capacity, per type; ordered so the lowest page id is
    /// preferred, biasing allocation toward partially-filled low pages.
    free_pages_by_type: Vec<BTreeSet<PageId>>,
    messages: MessageRegistry,
    id_to_descriptor: Vec<EntityDescriptor>,
    id_to_version: Vec<EntityVersion>,
    descriptor_to_id: Vec<Option<EntityId>>,
    free_ids: Vec<EntityId>,
    finalized: bool,
}

impl World {
    pub fn new() -> Self {
        Self {
            interfaces: Vec::new(),
            type_names: HashMap::new(),
            rust_types: HashMap::new(),
            pages: Vec::new(),
            pages_by_type: Vec::new(),
            overlays_by_type: Vec::new(),
            free_pages_by_type: Vec::new(),
            messages: MessageRegistry::new(),
            id_to_descriptor: Vec::new(),
            id_to_version: Vec::new(),
            descriptor_to_id: Vec::new(),
            free_ids: Vec::new(),
            finalized: false,
        }
    }

    // ---- registration ----------------------------------------------------

    /// Register an entity type, generating its interface.
    ///
    /// Embedded component declarations are resolved against types that are
    /// already registered. Fails on a duplicate name, after
    /// [`finalize_init`](Self::finalize_init), or when the generated
    /// interface is invalid (duplicate message handler, unknown embedded
    /// type).
    pub fn register_entity_type<T: Entity>(&mut self) -> Result<EntityTypeId, WorldError> {
        if self.finalized {
            return Err(WorldError::InitFinalized);
        }
        if self.type_names.contains_key(T::NAME) {
            return Err(WorldError::DuplicateEntityType {
                name: T::NAME.to_string(),
            });
        }

        let mut interface = EntityInterface::of::<T>(&mut self.messages)?;
        for component in interface.embedded_components_mut() {
            component.entity_type = *self.type_names.get(component.type_name).ok_or_else(|| {
                WorldError::UnknownEntityType {
                    name: component.type_name.to_string(),
                }
            })?;
        }

        let type_id = self.interfaces.len() as EntityTypeId;
        self.interfaces.push(interface);
        self.type_names.insert(T::NAME.to_string(), type_id);
        self.rust_types.insert(TypeId::of::<T>(), type_id);
        self.pages_by_type.push(Vec::new());
        self.overlays_by_type.push(Vec::new());
        self.free_pages_by_type.push(BTreeSet::new());
        debug!(name = T::NAME, type_id, "registered entity type");
        Ok(type_id)
    }

    /// Explicitly register a message type ahead of first use.
    pub fn register_message_type<M: 'static>(&mut self) -> Result<MessageTypeId, WorldError> {
        if self.finalized {
            return Err(WorldError::InitFinalized);
        }
        self.messages.register::<M>()
    }

    /// Close registration; any register call afterwards fails.
    pub fn finalize_init(&mut self) {
        self.finalized = true;
        info!(
            entity_types = self.interfaces.len(),
            message_types = self.messages.len(),
            "world init finalized"
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // ---- lookups ---------------------------------------------------------

    pub fn type_id_of<T: Entity>(&self) -> Option<EntityTypeId> {
        self.rust_types.get(&TypeId::of::<T>()).copied()
    }

    pub fn type_id_by_name(&self, name: &str) -> Option<EntityTypeId> {
        self.type_names.get(name).copied()
    }

    pub fn interface_of(&self, type_id: EntityTypeId) -> &EntityInterface {
        &self.interfaces[type_id as usize]
    }

    pub fn message_registry(&self) -> &MessageRegistry {
        &self.messages
    }

    /// Live instances of a type stored in primary pages (embedded
    /// components are counted with their host).
    pub fn live_count_of(&self, type_id: EntityTypeId) -> usize {
        self.pages_by_type[type_id as usize]
            .iter()
            .map(|&page_id| self.pages[page_id as usize].live_count())
            .sum()
    }

    pub fn live_count<T: Entity>(&self) -> usize {
        self.type_id_of::<T>().map_or(0, |t| self.live_count_of(t))
    }

    pub fn page_count_of(&self, type_id: EntityTypeId) -> usize {
        self.pages_by_type[type_id as usize].len()
    }

    pub fn contains(&self, descriptor: EntityDescriptor) -> bool {
        self.pages
            .get(descriptor.page() as usize)
            .is_some_and(|page| page.is_present(descriptor.offset()))
    }

    // ---- allocation and spawn --------------------------------------------

    fn create_page(&mut self, type_id: EntityTypeId) -> PageId {
        let interface = &self.interfaces[type_id as usize];
        let page_id = self.pages.len() as PageId;
        self.pages.push(EntityPage::new(
            type_id,
            page_id,
            interface.stride(),
            interface.align().max(1),
        ));
        self.pages_by_type[type_id as usize].push(page_id);
        self.free_pages_by_type[type_id as usize].insert(page_id);
        for component in interface.embedded_components() {
            self.overlays_by_type[component.entity_type as usize].push(ComponentOverlay {
                page_id,
                byte_offset: component.offset,
            });
        }
        debug!(page_id, type_id, "created entity page");
        page_id
    }

    /// Smallest page id with free capacity, creating a page if none.
    fn free_page(&mut self, type_id: EntityTypeId) -> PageId {
        match self.free_pages_by_type[type_id as usize].first() {
            Some(&page_id) => page_id,
            None => self.create_page(type_id),
        }
    }

    /// Construct an entity in place and return its descriptor.
    ///
    /// Fires [`PostSpawnMessage`] when the type handles it.
    pub fn spawn<T: Entity>(&mut self, value: T) -> Result<EntityDescriptor, WorldError> {
        let type_id = self
            .type_id_of::<T>()
            .ok_or_else(|| WorldError::UnknownEntityType {
                name: T::NAME.to_string(),
            })?;
        let page_id = self.free_page(type_id);
        let page = &mut self.pages[page_id as usize];
        let slot = page.reserve().expect("free page should have capacity");
        // SAFETY: the slot covers one stride of T and the page's stride and
        // alignment were derived from T at registration.
        unsafe {
            std::ptr::write(slot.ptr.cast::<T>(), value);
        }
        if page.is_full() {
            self.free_pages_by_type[type_id as usize].remove(&page_id);
        }

        let descriptor = EntityDescriptor::from_parts(page_id, slot.offset);
        self.attach_id(descriptor);

        if let Some(message_id) = self.messages.lookup::<PostSpawnMessage>() {
            let message = PostSpawnMessage { descriptor };
            self.send_by_id(
                descriptor,
                message_id,
                &message as *const PostSpawnMessage as *const u8,
            );
        }
        Ok(descriptor)
    }

    // ---- despawn ---------------------------------------------------------

    /// Destroy the entity at `descriptor` and release its slot.
    ///
    /// Returns `false` without raising when the slot is already empty; a
    /// double despawn is benign in the single-writer model. Order is fixed:
    /// pre-kill message, then destructor, then release, then free-pool
    /// upkeep.
    pub fn despawn(&mut self, descriptor: EntityDescriptor) -> bool {
        let page_index = descriptor.page() as usize;
        if page_index >= self.pages.len() {
            return false;
        }
        let offset = descriptor.offset();
        if !self.pages[page_index].is_present(offset) {
            return false;
        }

        if let Some(message_id) = self.messages.lookup::<PreKillMessage>() {
            let message = PreKillMessage { descriptor };
            self.send_by_id(
                descriptor,
                message_id,
                &message as *const PreKillMessage as *const u8,
            );
        }

        let page = &mut self.pages[page_index];
        let type_id = page.entity_type();
        let interface = &self.interfaces[type_id as usize];
        // SAFETY: the slot is live, so a valid object of the page's type
        // lives at this address.
        unsafe {
            (interface.drop_fn)(page.entity_ptr(offset));
        }
        page.release(offset);
        if page.live_count() == PAGE_CAPACITY - 1 {
            // The page just transitioned out of "full".
            self.free_pages_by_type[type_id as usize].insert(page.page_id());
        }
        self.detach_id(descriptor);
        true
    }

    // ---- relocation and swap ---------------------------------------------

    /// Move the entity at `src` into the empty slot `dst`.
    ///
    /// Both slots must belong to pages of the same entity type. Occupancy
    /// and free-pool membership follow the object, as does its id, so the
    /// occupancy/liveness invariant holds afterwards. Exists to support
    /// page compaction.
    pub fn relocate_entity(
        &mut self,
        dst: EntityDescriptor,
        src: EntityDescriptor,
    ) -> Result<(), WorldError> {
        let dst_page = self.page_index_checked(dst)?;
        let src_page = self.page_index_checked(src)?;
        let dst_type = self.pages[dst_page].entity_type();
        let src_type = self.pages[src_page].entity_type();
        if dst_type != src_type {
            return Err(WorldError::IncompatiblePages {
                dst_page: dst.page(),
                src_page: src.page(),
            });
        }
        if self.pages[dst_page].is_present(dst.offset()) {
            return Err(WorldError::DestinationOccupied { descriptor: dst });
        }
        if !self.pages[src_page].is_present(src.offset()) {
            return Err(WorldError::EmptySlot { descriptor: src });
        }

        // Claim the destination first: growing its buffer may reallocate,
        // which would invalidate a source pointer taken from the same page.
        let dst_ptr = self.pages[dst_page]
            .reserve_at(dst.offset())
            .expect("destination slot checked empty");
        let src_ptr = self.pages[src_page].entity_ptr(src.offset());
        let move_fn = self.interfaces[dst_type as usize].move_fn;
        // SAFETY: dst was empty storage of the right stride, src is live,
        // and the slots are distinct; the move is a bitwise relocation.
        unsafe {
            move_fn(dst_ptr, src_ptr);
        }
        // The object now lives at dst; the source bytes are moved-from and
        // must not be dropped.
        self.pages[src_page].release(src.offset());

        if self.pages[dst_page].is_full() {
            self.free_pages_by_type[dst_type as usize].remove(&dst.page());
        }
        if self.pages[src_page].live_count() == PAGE_CAPACITY - 1 {
            self.free_pages_by_type[src_type as usize].insert(src.page());
        }
        self.remap_id(src, dst);
        Ok(())
    }

    /// Exchange the contents of two occupied slots of the same type.
    pub fn swap_entities(
        &mut self,
        a: EntityDescriptor,
        b: EntityDescriptor,
    ) -> Result<(), WorldError> {
        let a_page = self.page_index_checked(a)?;
        let b_page = self.page_index_checked(b)?;
        let a_type = self.pages[a_page].entity_type();
        let b_type = self.pages[b_page].entity_type();
        if a_type != b_type {
            return Err(WorldError::IncompatiblePages {
                dst_page: a.page(),
                src_page: b.page(),
            });
        }
        if !self.pages[a_page].is_present(a.offset()) {
            return Err(WorldError::EmptySlot { descriptor: a });
        }
        if !self.pages[b_page].is_present(b.offset()) {
            return Err(WorldError::EmptySlot { descriptor: b });
        }
        if a == b {
            return Ok(());
        }

        let a_ptr = self.pages[a_page].entity_ptr(a.offset());
        let b_ptr = self.pages[b_page].entity_ptr(b.offset());
        let swap_fn = self.interfaces[a_type as usize].swap_fn;
        // SAFETY: both slots are live, distinct and of the same type, so
        // the pointed-to ranges do not overlap.
        unsafe {
            swap_fn(a_ptr, b_ptr);
        }
        // Both slots stay occupied; only the id mapping follows the objects.
        self.swap_ids(a, b);
        Ok(())
    }

    fn page_index_checked(&self, descriptor: EntityDescriptor) -> Result<usize, WorldError> {
        let index = descriptor.page() as usize;
        if index >= self.pages.len() {
            return Err(WorldError::InvalidDescriptor { descriptor });
        }
        Ok(index)
    }

    // ---- iteration -------------------------------------------------------

    /// Visit every live instance of a type as raw byte ranges.
    ///
    /// Primary pages produce one callback per maximal run of occupied
    /// slots, with `[begin, end)` pointers; stepping inside the run at the
    /// type's stride is the caller's job. Embedded components are visited
    /// one element at a time, because their host stride differs from the
    /// component's own size. Pointers are valid only inside the callback.
    pub fn for_each_entity_raw(
        &mut self,
        type_id: EntityTypeId,
        mut on_range: impl FnMut(*mut u8, *mut u8),
    ) {
        let stride = self.interfaces[type_id as usize].stride();
        for &page_id in &self.pages_by_type[type_id as usize] {
            let page = &self.pages[page_id as usize];
            for range in page.active_ranges() {
                let begin = page.entity_ptr(range.start as u32);
                // SAFETY: the buffer covers every slot of the run plus one
                // past the last, so the end pointer stays in bounds.
                let end = unsafe { begin.add(range.len() * stride) };
                on_range(begin, end);
            }
        }
        for overlay in self.overlays_of(type_id) {
            let page = &self.pages[overlay.page_id as usize];
            for range in page.active_ranges() {
                for offset in range {
                    let begin = page.component_ptr(offset as u32, overlay.byte_offset);
                    // SAFETY: the component's bytes lie inside the host slot.
                    let end = unsafe { begin.add(stride) };
                    on_range(begin, end);
                }
            }
        }
    }

    /// Visit every live instance of `T`, including embedded components.
    pub fn for_each_entity<T: Entity>(
        &mut self,
        mut f: impl FnMut(&mut T),
    ) -> Result<(), WorldError> {
        let type_id = self
            .type_id_of::<T>()
            .ok_or_else(|| WorldError::UnknownEntityType {
                name: T::NAME.to_string(),
            })?;
        self.for_each_entity_raw(type_id, |begin, end| {
            let count = (end as usize - begin as usize) / stride_of::<T>();
            for index in 0..count {
                // SAFETY: each address in the run holds a live T, and the
                // world is exclusively borrowed for the whole iteration.
                unsafe { f(&mut *begin.add(index * stride_of::<T>()).cast::<T>()) }
            }
        });
        Ok(())
    }

    fn overlays_of(&self, type_id: EntityTypeId) -> &[ComponentOverlay] {
        &self.overlays_by_type[type_id as usize]
    }

    // ---- message dispatch ------------------------------------------------

    /// Send a message to a single entity.
    ///
    /// Returns `false` when the slot is empty, the message type is unknown
    /// or the entity's type has no handler for it; none of these are
    /// failures.
    pub fn send_to<M: 'static>(&mut self, descriptor: EntityDescriptor, message: &M) -> bool {
        let Some(message_id) = self.messages.lookup::<M>() else {
            return false;
        };
        if !self.contains(descriptor) {
            return false;
        }
        self.send_by_id(descriptor, message_id, message as *const M as *const u8)
    }

    /// Broadcast a message to every live instance of a type, embedded
    /// components included. A type without a handler is a no-op.
    pub fn broadcast<M: 'static>(&mut self, type_id: EntityTypeId, message: &M) {
        let Some(message_id) = self.messages.lookup::<M>() else {
            return;
        };
        self.broadcast_by_id(type_id, message_id, message as *const M as *const u8);
    }

    /// Broadcast a message to every registered entity type.
    pub fn broadcast_all<M: 'static>(&mut self, message: &M) {
        let Some(message_id) = self.messages.lookup::<M>() else {
            return;
        };
        for type_id in 0..self.interfaces.len() as EntityTypeId {
            self.broadcast_by_id(type_id, message_id, message as *const M as *const u8);
        }
    }

    /// Dispatch to one live slot. The caller has checked liveness.
    fn send_by_id(
        &mut self,
        descriptor: EntityDescriptor,
        message_id: MessageTypeId,
        message: *const u8,
    ) -> bool {
        let page = &self.pages[descriptor.page() as usize];
        let interface = &self.interfaces[page.entity_type() as usize];
        let Some(send) = interface.send_fn(message_id) else {
            return false;
        };
        // SAFETY: the slot is live and the shim was monomorphized for the
        // page's entity type; the message pointer outlives the call.
        unsafe {
            send(message, page.entity_ptr(descriptor.offset()));
        }
        true
    }

    fn broadcast_by_id(
        &mut self,
        type_id: EntityTypeId,
        message_id: MessageTypeId,
        message: *const u8,
    ) {
        let interface = &self.interfaces[type_id as usize];
        let stride = interface.stride();

        if let Some(send) = interface.send_contiguous_fn(message_id) {
            for &page_id in &self.pages_by_type[type_id as usize] {
                let page = &self.pages[page_id as usize];
                for range in page.active_ranges() {
                    let begin = page.entity_ptr(range.start as u32);
                    // SAFETY: the run is live and contiguous at the type's
                    // stride; the end pointer is one past the last slot.
                    unsafe {
                        send(message, begin, begin.add(range.len() * stride));
                    }
                }
            }
        }

        if let Some(send) = interface.send_many_fn(message_id) {
            for overlay in self.overlays_of(type_id) {
                let page = &self.pages[overlay.page_id as usize];
                let host_stride = page.stride();
                for range in page.active_ranges() {
                    let view = ErasedStridedSlice::new(
                        page.component_ptr(range.start as u32, overlay.byte_offset),
                        range.len(),
                        host_stride,
                    );
                    // SAFETY: every strided address holds a live component
                    // of the dispatched type inside a live host.
                    unsafe {
                        send(message, view);
                    }
                }
            }
        }
    }

    // ---- typed access ----------------------------------------------------

    pub fn get<T: Entity>(&self, descriptor: EntityDescriptor) -> Option<&T> {
        let type_id = self.type_id_of::<T>()?;
        let page = self.pages.get(descriptor.page() as usize)?;
        if page.entity_type() != type_id || !page.is_present(descriptor.offset()) {
            return None;
        }
        // SAFETY: the slot is live and belongs to a page of T's type.
        Some(unsafe { &*page.entity_ptr(descriptor.offset()).cast::<T>() })
    }

    pub fn get_mut<T: Entity>(&mut self, descriptor: EntityDescriptor) -> Option<&mut T> {
        let type_id = self.type_id_of::<T>()?;
        let page = self.pages.get(descriptor.page() as usize)?;
        if page.entity_type() != type_id || !page.is_present(descriptor.offset()) {
            return None;
        }
        // SAFETY: as in `get`, plus the world is exclusively borrowed.
        Some(unsafe { &mut *page.entity_ptr(descriptor.offset()).cast::<T>() })
    }

    // ---- id/version indirection ------------------------------------------

    /// Reuse-detecting reference for a live slot.
    pub fn ref_of(&self, descriptor: EntityDescriptor) -> Option<EntityRef> {
        let id = (*self.descriptor_to_id.get(descriptor.to_bits() as usize)?)?;
        Some(EntityRef {
            id,
            version: self.id_to_version[id as usize],
        })
    }

    /// Current descriptor for a reference, or `None` if the reference is
    /// stale (the slot was repurposed since the reference was taken).
    pub fn resolve(&self, entity_ref: EntityRef) -> Option<EntityDescriptor> {
        let version = *self.id_to_version.get(entity_ref.id as usize)?;
        if version != entity_ref.version {
            return None;
        }
        Some(self.id_to_descriptor[entity_ref.id as usize])
    }

    pub fn version_of(&self, id: EntityId) -> Option<EntityVersion> {
        self.id_to_version.get(id as usize).copied()
    }

    fn attach_id(&mut self, descriptor: EntityDescriptor) -> EntityId {
        let id = match self.free_ids.pop() {
            Some(id) => {
                self.id_to_descriptor[id as usize] = descriptor;
                id
            }
            None => {
                let id = self.id_to_descriptor.len() as EntityId;
                self.id_to_descriptor.push(descriptor);
                self.id_to_version.push(0);
                id
            }
        };
        let index = descriptor.to_bits() as usize;
        if self.descriptor_to_id.len() <= index {
            self.descriptor_to_id.resize(index + 1, None);
        }
        self.descriptor_to_id[index] = Some(id);
        id
    }

    fn detach_id(&mut self, descriptor: EntityDescriptor) {
        let index = descriptor.to_bits() as usize;
        let Some(slot) = self.descriptor_to_id.get_mut(index) else {
            return;
        };
        if let Some(id) = slot.take() {
            self.id_to_version[id as usize] = self.id_to_version[id as usize].wrapping_add(1);
            self.free_ids.push(id);
        }
    }

    fn remap_id(&mut self, from: EntityDescriptor, to: EntityDescriptor) {
        let from_index = from.to_bits() as usize;
        let Some(id) = self
            .descriptor_to_id
            .get_mut(from_index)
            .and_then(Option::take)
        else {
            return;
        };
        let to_index = to.to_bits() as usize;
        if self.descriptor_to_id.len() <= to_index {
            self.descriptor_to_id.resize(to_index + 1, None);
        }
        self.descriptor_to_id[to_index] = Some(id);
        self.id_to_descriptor[id as usize] = to;
    }

    fn swap_ids(&mut self, a: EntityDescriptor, b: EntityDescriptor) {
        let a_index = a.to_bits() as usize;
        let b_index = b.to_bits() as usize;
        let needed = a_index.max(b_index) + 1;
        if self.descriptor_to_id.len() < needed {
            self.descriptor_to_id.resize(needed, None);
        }
        self.descriptor_to_id.swap(a_index, b_index);
        if let Some(id) = self.descriptor_to_id[a_index] {
            self.id_to_descriptor[id as usize] = a;
        }
        if let Some(id) = self.descriptor_to_id[b_index] {
            self.id_to_descriptor[id as usize] = b;
        }
    }

    // ---- transform boundary ----------------------------------------------

    pub fn position(&self, descriptor: EntityDescriptor) -> Option<Vec3> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: the slot is live and of the interface's type.
        Some(unsafe { (interface.position_fn)(ptr) })
    }

    pub fn rotation(&self, descriptor: EntityDescriptor) -> Option<Quat> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.rotation_fn)(ptr) })
    }

    pub fn scale(&self, descriptor: EntityDescriptor) -> Option<Vec3> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.scale_fn)(ptr) })
    }

    pub fn local_position(&self, descriptor: EntityDescriptor) -> Option<Vec3> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.local_position_fn)(ptr) })
    }

    pub fn local_rotation(&self, descriptor: EntityDescriptor) -> Option<Quat> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.local_rotation_fn)(ptr) })
    }

    pub fn local_scale(&self, descriptor: EntityDescriptor) -> Option<Vec3> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.local_scale_fn)(ptr) })
    }

    /// World transform composed rotate → scale → translate.
    pub fn transform(&self, descriptor: EntityDescriptor) -> Option<Mat4> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.transform_fn)(ptr) })
    }

    pub fn local_transform(&self, descriptor: EntityDescriptor) -> Option<Mat4> {
        let (ptr, interface) = self.live_slot(descriptor)?;
        // SAFETY: as above.
        Some(unsafe { (interface.local_transform_fn)(ptr) })
    }

    /// Post-multiply the entity's transform onto `target`. Returns `false`
    /// for an empty slot.
    pub fn accumulate_transform(&self, descriptor: EntityDescriptor, target: &mut Mat4) -> bool {
        let Some((ptr, interface)) = self.live_slot(descriptor) else {
            return false;
        };
        // SAFETY: as above.
        unsafe { (interface.accumulate_transform_fn)(ptr, target) };
        true
    }

    pub fn accumulate_local_transform(
        &self,
        descriptor: EntityDescriptor,
        target: &mut Mat4,
    ) -> bool {
        let Some((ptr, interface)) = self.live_slot(descriptor) else {
            return false;
        };
        // SAFETY: as above.
        unsafe { (interface.accumulate_local_transform_fn)(ptr, target) };
        true
    }

    fn live_slot(&self, descriptor: EntityDescriptor) -> Option<(*const u8, &EntityInterface)> {
        let page = self.pages.get(descriptor.page() as usize)?;
        if !page.is_present(descriptor.offset()) {
            return None;
        }
        Some((
            page.entity_ptr(descriptor.offset()),
            &self.interfaces[page.entity_type() as usize],
        ))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        // Destroy every still-live object so resources owned by the
        // aggregates are released; pages then free their raw storage.
        for page in &self.pages {
            let interface = &self.interfaces[page.entity_type() as usize];
            for range in page.active_ranges() {
                for offset in range {
                    // SAFETY: every slot in an active range holds a live
                    // object of the page's type.
                    unsafe {
                        (interface.drop_fn)(page.entity_ptr(offset as u32));
                    }
                }
            }
        }
    }
}
