// interface.rs - per-type function tables for the type-erased store
//
// An EntityInterface is built once per concrete entity type at
// registration time and looked up by type id afterwards. It is the sole
// place where generic store code touches type-specific logic: lifecycle,
// transform access and message dispatch all go through these monomorphized
// function pointers.

use super::entity::{EntityTypeId, MessageTypeId};
use super::error::WorldError;
use super::message::MessageRegistry;
use crate::strided::ErasedStridedSlice;
use glam::{Mat4, Quat, Vec3};
use std::any::type_name;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

/// Entity size rounded so zero-sized aggregates still occupy one byte,
/// keeping slot addresses distinct.
#[inline]
pub(crate) fn stride_of<T>() -> usize {
    mem::size_of::<T>().max(1)
}

pub type DropFn = unsafe fn(entity: *mut u8);
pub type MoveFn = unsafe fn(dst: *mut u8, src: *mut u8);
pub type CloneFn = unsafe fn(src: *const u8, dst: *mut u8);
pub type SwapFn = unsafe fn(a: *mut u8, b: *mut u8);
pub type SendFn = unsafe fn(message: *const u8, entity: *mut u8);
pub type SendManyFn = unsafe fn(message: *const u8, view: ErasedStridedSlice);
pub type SendContiguousFn = unsafe fn(message: *const u8, begin: *mut u8, end: *mut u8);

type Vec3Fn = unsafe fn(entity: *const u8) -> Vec3;
type QuatFn = unsafe fn(entity: *const u8) -> Quat;
type TransformFn = unsafe fn(entity: *const u8) -> Mat4;
type AccumulateFn = unsafe fn(entity: *const u8, target: &mut Mat4);

/// A concrete entity type storable in the world.
///
/// The transform accessors are best-effort: types without such state keep
/// the neutral defaults (zero position/rotation, unit scale), and the
/// generated interface composes transforms from whichever accessors are
/// overridden. `describe` is the walk over the type's declarations: it
/// registers message handlers and embedded components with the interface
/// being generated.
pub trait Entity: Sized + 'static {
    const NAME: &'static str;

    fn position(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn rotation(&self) -> Quat {
        Quat::IDENTITY
    }

    fn scale(&self) -> Vec3 {
        Vec3::ONE
    }

    fn local_position(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn local_rotation(&self) -> Quat {
        Quat::IDENTITY
    }

    fn local_scale(&self) -> Vec3 {
        Vec3::ONE
    }

    fn describe(spec: &mut EntitySpec<Self>) {
        let _ = spec;
    }
}

/// Typed message handler; one impl per handled message type.
pub trait Handles<M: 'static>: Entity {
    fn handle(&mut self, message: &M);
}

/// A sub-object embedded in an entity's byte range, independently
/// addressable as its own entity type.
#[derive(Debug, Clone)]
pub struct EmbeddedComponent {
    /// Name of the embedding field.
    pub field_name: &'static str,
    /// Registered name of the component's entity type.
    pub type_name: &'static str,
    /// Byte offset within the host entity.
    pub offset: usize,
    /// Declaration position (order of `embed` calls).
    pub decl_index: usize,
    /// Resolved when the host type is registered.
    pub entity_type: EntityTypeId,
}

/// Per-type record of function pointers.
///
/// Immutable after registration except for its message tables, which grow
/// as new message type ids are assigned. Owned by the world's type table;
/// looked up by [`EntityTypeId`].
pub struct EntityInterface {
    type_name: &'static str,
    size: usize,
    align: usize,
    pub(crate) drop_fn: DropFn,
    pub(crate) move_fn: MoveFn,
    pub(crate) clone_fn: Option<CloneFn>,
    pub(crate) swap_fn: SwapFn,
    pub(crate) position_fn: Vec3Fn,
    pub(crate) rotation_fn: QuatFn,
    pub(crate) scale_fn: Vec3Fn,
    pub(crate) local_position_fn: Vec3Fn,
    pub(crate) local_rotation_fn: QuatFn,
    pub(crate) local_scale_fn: Vec3Fn,
    pub(crate) transform_fn: TransformFn,
    pub(crate) local_transform_fn: TransformFn,
    pub(crate) accumulate_transform_fn: AccumulateFn,
    pub(crate) accumulate_local_transform_fn: AccumulateFn,
    pub(crate) embedded_components: Vec<EmbeddedComponent>,
    pub(crate) send_message: Vec<Option<SendFn>>,
    pub(crate) send_message_to_many: Vec<Option<SendManyFn>>,
    pub(crate) send_message_to_many_contiguous: Vec<Option<SendContiguousFn>>,
}

impl EntityInterface {
    /// Generate the interface for a concrete entity type.
    ///
    /// This is the registration boundary: the returned record is fully
    /// populated, and any message types discovered through `describe` are
    /// registered with `messages` as a side effect.
    pub fn of<T: Entity>(messages: &mut MessageRegistry) -> Result<Self, WorldError> {
        let mut interface = EntityInterface {
            type_name: T::NAME,
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            drop_fn: drop_shim::<T>,
            move_fn: move_shim::<T>,
            clone_fn: None,
            swap_fn: swap_shim::<T>,
            position_fn: position_shim::<T>,
            rotation_fn: rotation_shim::<T>,
            scale_fn: scale_shim::<T>,
            local_position_fn: local_position_shim::<T>,
            local_rotation_fn: local_rotation_shim::<T>,
            local_scale_fn: local_scale_shim::<T>,
            transform_fn: transform_shim::<T>,
            local_transform_fn: local_transform_shim::<T>,
            accumulate_transform_fn: accumulate_transform_shim::<T>,
            accumulate_local_transform_fn: accumulate_local_transform_shim::<T>,
            embedded_components: Vec::new(),
            send_message: Vec::new(),
            send_message_to_many: Vec::new(),
            send_message_to_many_contiguous: Vec::new(),
        };
        let mut spec = EntitySpec {
            interface: &mut interface,
            messages,
            error: None,
            _marker: PhantomData,
        };
        T::describe(&mut spec);
        if let Some(error) = spec.error.take() {
            return Err(error);
        }
        Ok(interface)
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Entity size rounded per type; the page slot width.
    #[inline]
    pub fn stride(&self) -> usize {
        self.size.max(1)
    }

    pub fn embedded_components(&self) -> &[EmbeddedComponent] {
        &self.embedded_components
    }

    pub(crate) fn embedded_components_mut(&mut self) -> &mut [EmbeddedComponent] {
        &mut self.embedded_components
    }

    /// Whether this type handles the given message type.
    pub fn handles_message(&self, id: MessageTypeId) -> bool {
        self.send_fn(id).is_some()
    }

    pub(crate) fn send_fn(&self, id: MessageTypeId) -> Option<SendFn> {
        self.send_message.get(id as usize).copied().flatten()
    }

    pub(crate) fn send_many_fn(&self, id: MessageTypeId) -> Option<SendManyFn> {
        self.send_message_to_many.get(id as usize).copied().flatten()
    }

    pub(crate) fn send_contiguous_fn(&self, id: MessageTypeId) -> Option<SendContiguousFn> {
        self.send_message_to_many_contiguous
            .get(id as usize)
            .copied()
            .flatten()
    }

    fn ensure_message_slot(&mut self, index: usize) {
        if self.send_message.len() <= index {
            self.send_message.resize(index + 1, None);
            self.send_message_to_many.resize(index + 1, None);
            self.send_message_to_many_contiguous.resize(index + 1, None);
        }
    }
}

/// Declaration walk for one entity type, driven by [`Entity::describe`].
pub struct EntitySpec<'a, T: Entity> {
    interface: &'a mut EntityInterface,
    messages: &'a mut MessageRegistry,
    error: Option<WorldError>,
    _marker: PhantomData<fn(T)>,
}

impl<'a, T: Entity> EntitySpec<'a, T> {
    /// Install the dispatch entries for message type `M`.
    ///
    /// Assigns `M` an id on first use. Declaring the same message type
    /// twice for one entity type is a duplicate-handler error, surfaced
    /// from the enclosing registration.
    pub fn handles<M: 'static>(&mut self)
    where
        T: Handles<M>,
    {
        if self.error.is_some() {
            return;
        }
        let id = self.messages.resolve::<M>();
        let index = id as usize;
        self.interface.ensure_message_slot(index);
        if self.interface.send_message[index].is_some() {
            self.error = Some(WorldError::DuplicateMessageHandler {
                entity: T::NAME,
                message: type_name::<M>(),
            });
            return;
        }
        self.interface.send_message[index] = Some(send_shim::<T, M>);
        self.interface.send_message_to_many[index] = Some(send_many_shim::<T, M>);
        self.interface.send_message_to_many_contiguous[index] = Some(send_contiguous_shim::<T, M>);
    }

    /// Declare a component of type `C` embedded at `offset` bytes into the
    /// host. Declaration position is the call order.
    pub fn embed<C: Entity>(&mut self, field_name: &'static str, offset: usize) {
        debug_assert!(offset + mem::size_of::<C>() <= mem::size_of::<T>());
        let decl_index = self.interface.embedded_components.len();
        self.interface.embedded_components.push(EmbeddedComponent {
            field_name,
            type_name: C::NAME,
            offset,
            decl_index,
            entity_type: EntityTypeId::MAX,
        });
    }

    /// Install the copy slot. Opt-in, since entity aggregates are not
    /// universally `Clone`.
    pub fn clonable(&mut self)
    where
        T: Clone,
    {
        self.interface.clone_fn = Some(clone_shim::<T>);
    }
}

fn compose(position: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
    // Rotate, then scale, then translate.
    Mat4::from_translation(position) * Mat4::from_scale(scale) * Mat4::from_quat(rotation)
}

// Lifecycle shims. Move is a bitwise relocation: after it runs the source
// bytes must not be dropped again.

unsafe fn drop_shim<T>(entity: *mut u8) {
    ptr::drop_in_place(entity.cast::<T>());
}

unsafe fn move_shim<T>(dst: *mut u8, src: *mut u8) {
    ptr::copy_nonoverlapping(src.cast::<T>(), dst.cast::<T>(), 1);
}

unsafe fn clone_shim<T: Clone>(src: *const u8, dst: *mut u8) {
    ptr::write(dst.cast::<T>(), (*src.cast::<T>()).clone());
}

unsafe fn swap_shim<T>(a: *mut u8, b: *mut u8) {
    ptr::swap_nonoverlapping(a.cast::<T>(), b.cast::<T>(), 1);
}

// Transform shims.

unsafe fn position_shim<T: Entity>(entity: *const u8) -> Vec3 {
    (*entity.cast::<T>()).position()
}

unsafe fn rotation_shim<T: Entity>(entity: *const u8) -> Quat {
    (*entity.cast::<T>()).rotation()
}

unsafe fn scale_shim<T: Entity>(entity: *const u8) -> Vec3 {
    (*entity.cast::<T>()).scale()
}

unsafe fn local_position_shim<T: Entity>(entity: *const u8) -> Vec3 {
    (*entity.cast::<T>()).local_position()
}

unsafe fn local_rotation_shim<T: Entity>(entity: *const u8) -> Quat {
    (*entity.cast::<T>()).local_rotation()
}

unsafe fn local_scale_shim<T: Entity>(entity: *const u8) -> Vec3 {
    (*entity.cast::<T>()).local_scale()
}

unsafe fn transform_shim<T: Entity>(entity: *const u8) -> Mat4 {
    let entity = &*entity.cast::<T>();
    compose(entity.position(), entity.rotation(), entity.scale())
}

unsafe fn local_transform_shim<T: Entity>(entity: *const u8) -> Mat4 {
    let entity = &*entity.cast::<T>();
    compose(
        entity.local_position(),
        entity.local_rotation(),
        entity.local_scale(),
    )
}

unsafe fn accumulate_transform_shim<T: Entity>(entity: *const u8, target: &mut Mat4) {
    *target = *target * transform_shim::<T>(entity);
}

unsafe fn accumulate_local_transform_shim<T: Entity>(entity: *const u8, target: &mut Mat4) {
    *target = *target * local_transform_shim::<T>(entity);
}

// Dispatch shims.

unsafe fn send_shim<T: Handles<M>, M: 'static>(message: *const u8, entity: *mut u8) {
    (*entity.cast::<T>()).handle(&*message.cast::<M>());
}

unsafe fn send_many_shim<T: Handles<M>, M: 'static>(message: *const u8, view: ErasedStridedSlice) {
    let message = &*message.cast::<M>();
    let mut entities = view.interpret_as::<T>();
    for entity in entities.iter_mut() {
        entity.handle(message);
    }
}

unsafe fn send_contiguous_shim<T: Handles<M>, M: 'static>(
    message: *const u8,
    begin: *mut u8,
    end: *mut u8,
) {
    let message = &*message.cast::<M>();
    let count = (end as usize - begin as usize) / stride_of::<T>();
    for index in 0..count {
        (*begin.add(index * stride_of::<T>()).cast::<T>()).handle(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::message::UpdateMessage;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Plain {
        value: u32,
    }

    impl Entity for Plain {
        const NAME: &'static str = "Plain";
    }

    #[derive(Clone)]
    struct Mover {
        position: Vec3,
        velocity: Vec3,
    }

    impl Entity for Mover {
        const NAME: &'static str = "Mover";

        fn position(&self) -> Vec3 {
            self.position
        }

        fn describe(spec: &mut EntitySpec<Self>) {
            spec.handles::<UpdateMessage>();
            spec.clonable();
        }
    }

    impl Handles<UpdateMessage> for Mover {
        fn handle(&mut self, message: &UpdateMessage) {
            self.position += self.velocity * message.delta_time as f32;
        }
    }

    struct DoubleHandler;

    impl Entity for DoubleHandler {
        const NAME: &'static str = "DoubleHandler";

        fn describe(spec: &mut EntitySpec<Self>) {
            spec.handles::<UpdateMessage>();
            spec.handles::<UpdateMessage>();
        }
    }

    impl Handles<UpdateMessage> for DoubleHandler {
        fn handle(&mut self, _message: &UpdateMessage) {}
    }

    #[test]
    fn interface_records_layout() {
        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Mover>(&mut messages).unwrap();
        assert_eq!(interface.type_name(), "Mover");
        assert_eq!(interface.size(), mem::size_of::<Mover>());
        assert_eq!(interface.align(), mem::align_of::<Mover>());
        assert_eq!(interface.stride(), mem::size_of::<Mover>());
    }

    #[test]
    fn neutral_transform_defaults() {
        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Plain>(&mut messages).unwrap();
        let plain = Plain { value: 9 };
        let entity = &plain as *const Plain as *const u8;
        // SAFETY: entity points at a live Plain.
        unsafe {
            assert_eq!((interface.position_fn)(entity), Vec3::ZERO);
            assert_eq!((interface.rotation_fn)(entity), Quat::IDENTITY);
            assert_eq!((interface.scale_fn)(entity), Vec3::ONE);
            assert_eq!((interface.transform_fn)(entity), Mat4::IDENTITY);
        }
        assert_eq!(plain.value, 9);
    }

    #[test]
    fn transform_composes_rotate_scale_translate() {
        struct Posed;
        impl Entity for Posed {
            const NAME: &'static str = "Posed";
            fn position(&self) -> Vec3 {
                Vec3::new(1.0, 2.0, 3.0)
            }
            fn scale(&self) -> Vec3 {
                Vec3::splat(2.0)
            }
        }
        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Posed>(&mut messages).unwrap();
        let posed = Posed;
        // SAFETY: posed is live for the duration of the calls.
        let matrix = unsafe { (interface.transform_fn)(&posed as *const Posed as *const u8) };
        let mapped = matrix.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        // Point is scaled first, then translated.
        assert!((mapped - Vec3::new(3.0, 2.0, 3.0)).length() < 1e-6);

        let mut accumulated = Mat4::IDENTITY;
        // SAFETY: as above.
        unsafe {
            (interface.accumulate_transform_fn)(
                &posed as *const Posed as *const u8,
                &mut accumulated,
            );
        }
        assert_eq!(accumulated, matrix);
    }

    #[test]
    fn handler_shims_dispatch_by_message_id() {
        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Mover>(&mut messages).unwrap();
        let id = messages.lookup::<UpdateMessage>().unwrap();
        assert!(interface.handles_message(id));
        assert!(!interface.handles_message(id + 1));

        let mut mover = Mover {
            position: Vec3::ZERO,
            velocity: Vec3::new(1.0, 0.0, 0.0),
        };
        let message = UpdateMessage { delta_time: 0.5 };
        let send = interface.send_fn(id).unwrap();
        // SAFETY: message and entity pointers reference live values of the
        // types the shim was monomorphized for.
        unsafe {
            send(
                &message as *const UpdateMessage as *const u8,
                &mut mover as *mut Mover as *mut u8,
            );
        }
        assert_eq!(mover.position, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn duplicate_handler_is_rejected() {
        let mut messages = MessageRegistry::new();
        assert!(matches!(
            EntityInterface::of::<DoubleHandler>(&mut messages),
            Err(WorldError::DuplicateMessageHandler { .. })
        ));
    }

    #[test]
    fn drop_shim_runs_destructor() {
        struct Tracked {
            alive: Rc<Cell<u32>>,
        }
        impl Entity for Tracked {
            const NAME: &'static str = "Tracked";
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.alive.set(self.alive.get() - 1);
            }
        }

        let alive = Rc::new(Cell::new(1u32));
        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Tracked>(&mut messages).unwrap();

        let mut slot = mem::MaybeUninit::new(Tracked { alive: alive.clone() });
        // SAFETY: slot holds a live Tracked; the shim consumes it.
        unsafe { (interface.drop_fn)(slot.as_mut_ptr() as *mut u8) };
        assert_eq!(alive.get(), 0);
    }

    #[test]
    fn clone_shim_copies_value() {
        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Mover>(&mut messages).unwrap();
        let clone_fn = interface.clone_fn.unwrap();

        let source = Mover {
            position: Vec3::new(4.0, 5.0, 6.0),
            velocity: Vec3::ZERO,
        };
        let mut target = mem::MaybeUninit::<Mover>::uninit();
        // SAFETY: source is live, target is writable uninitialized storage.
        let cloned = unsafe {
            clone_fn(
                &source as *const Mover as *const u8,
                target.as_mut_ptr() as *mut u8,
            );
            target.assume_init()
        };
        assert_eq!(cloned.position, source.position);
    }

    #[test]
    fn embed_records_declaration_order() {
        #[repr(C)]
        struct Bulb {
            watts: f32,
        }
        impl Entity for Bulb {
            const NAME: &'static str = "Bulb";
        }

        #[repr(C)]
        struct Fixture {
            id: u32,
            main: Bulb,
            backup: Bulb,
        }
        impl Entity for Fixture {
            const NAME: &'static str = "Fixture";

            fn describe(spec: &mut EntitySpec<Self>) {
                spec.embed::<Bulb>("main", mem::offset_of!(Fixture, main));
                spec.embed::<Bulb>("backup", mem::offset_of!(Fixture, backup));
            }
        }

        let mut messages = MessageRegistry::new();
        let interface = EntityInterface::of::<Fixture>(&mut messages).unwrap();
        let embedded = interface.embedded_components();
        assert_eq!(embedded.len(), 2);
        assert_eq!(embedded[0].field_name, "main");
        assert_eq!(embedded[0].decl_index, 0);
        assert_eq!(embedded[0].offset, mem::offset_of!(Fixture, main));
        assert_eq!(embedded[1].field_name, "backup");
        assert_eq!(embedded[1].decl_index, 1);
    }
}
