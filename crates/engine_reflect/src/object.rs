//! The [`Object`] trait every reflected instance implements, and the
//! [`ObjectCore`] each instance embeds.
//!
//! Rust has no struct inheritance, so a derived class's Rust type embeds the
//! Rust type of its first base, down to the root, which holds the single
//! [`ObjectCore`]. `core()` on a derived type forwards to the embedded base.
//! Members declared on a base reach the embedded value through the
//! projections given to [`ClassBuilder::base`](crate::ClassBuilder::base).
//!
//! Instances that take part in signal connections as receivers are shared as
//! [`Shared<T>`]. A connection only holds a weak reference to its receiver,
//! so dropping the last `Shared` handle severs every connection to it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::builder::{ClassBuilder, ClassDefinition, Reflected};
use crate::class::ClassDescriptor;
use crate::dynvar::DynamicVariable;
use crate::error::{MemberKind, ReflectError, Result};
use crate::signal::{ConnectionId, Signal};
use crate::value::{TypeTag, Value};

/// Qualified name of the root class every engine object derives from.
pub const ROOT_CLASS: &str = "core::Object";

/// Name of the signal [`ObjectCore`] emits while its object is dropped.
pub const DESTROYED_SIGNAL: &str = "destroyed";

/// Process-unique identifier of a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

/// Token of the calling thread, never 0.
fn thread_token() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TOKEN: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|token| *token)
}

pub(crate) struct SharedCell<T> {
    class: Arc<ClassDescriptor>,
    /// Token of the thread holding `value`, 0 when unlocked.
    holder: AtomicU64,
    value: Mutex<T>,
}

/// A reflected instance shared with signal connections.
///
/// The receiver's class is captured when it is shared, so connecting to it
/// never needs its lock.
pub struct Shared<T> {
    cell: Arc<SharedCell<T>>,
}

/// Wrap an object for use as a signal receiver.
pub fn share<T: Object>(object: T) -> Shared<T> {
    Shared {
        cell: Arc::new(SharedCell {
            class: Arc::clone(object.class()),
            holder: AtomicU64::new(0),
            value: Mutex::new(object),
        }),
    }
}

impl<T> Shared<T> {
    /// Lock the object, blocking until it is available.
    pub fn lock(&self) -> SharedGuard<'_, T> {
        SharedGuard::acquire(&self.cell, self.cell.value.lock())
    }

    /// Lock the object if nobody holds it.
    pub fn try_lock(&self) -> Option<SharedGuard<'_, T>> {
        let guard = self.cell.value.try_lock()?;
        Some(SharedGuard::acquire(&self.cell, guard))
    }

    /// Returns `true` if the calling thread holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.cell.holder.load(Ordering::Acquire) == thread_token()
    }

    /// Class of the shared object.
    #[must_use]
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.cell.class
    }

    /// Address identifying this object among receivers.
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<SharedCell<T>> {
        Arc::downgrade(&self.cell)
    }

    pub(crate) fn from_cell(cell: Arc<SharedCell<T>>) -> Self {
        Self { cell }
    }

    /// Lock for a signal delivery. Waits for other threads, but returns
    /// `None` instead of deadlocking when the calling thread holds the lock.
    pub(crate) fn lock_for_delivery(&self) -> Option<SharedGuard<'_, T>> {
        if let Some(guard) = self.try_lock() {
            return Some(guard);
        }
        if self.is_held_by_current_thread() {
            return None;
        }
        Some(self.lock())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("class", &self.cell.class.qualified_name())
            .field("locked", &self.cell.value.is_locked())
            .finish()
    }
}

/// Exclusive access to a [`Shared`] object.
pub struct SharedGuard<'a, T> {
    holder: &'a AtomicU64,
    guard: MutexGuard<'a, T>,
}

impl<'a, T> SharedGuard<'a, T> {
    fn acquire(cell: &'a SharedCell<T>, guard: MutexGuard<'a, T>) -> Self {
        cell.holder.store(thread_token(), Ordering::Release);
        Self {
            holder: &cell.holder,
            guard,
        }
    }
}

impl<T> Deref for SharedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SharedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for SharedGuard<'_, T> {
    // Runs before `guard` unlocks.
    fn drop(&mut self) {
        self.holder.store(0, Ordering::Release);
    }
}

/// Per-instance state: identity, class, and the instance's signals.
pub struct ObjectCore {
    id: ObjectId,
    class: Arc<ClassDescriptor>,
    /// Keeps every ancestor alive for as long as the instance.
    lineage: Vec<Arc<ClassDescriptor>>,
    signals: HashMap<String, Signal<[Value]>>,
}

impl ObjectCore {
    /// Create the core for an instance of `class`, with one signal per signal
    /// the class declares or inherits.
    #[must_use]
    pub fn new(class: &Arc<ClassDescriptor>) -> Self {
        let signals = class
            .all_signals()
            .into_iter()
            .map(|decl| (decl.name.clone(), Signal::new(decl.name.clone())))
            .collect();
        Self {
            id: ObjectId::next(),
            class: Arc::clone(class),
            lineage: class.ancestors(),
            signals,
        }
    }

    /// Process-unique id of the instance.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Class the instance was created as.
    #[must_use]
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// The instance's signal named `name`, declared or inherited.
    #[must_use]
    pub fn signal(&self, name: &str) -> Option<&Signal<[Value]>> {
        self.signals.get(name)
    }

    /// Emit a declared signal. Arguments are checked against the declaration
    /// and converted to its parameter tags. Returns the number of slots run.
    pub fn emit(&self, name: &str, args: &[Value]) -> Result<usize> {
        let declaration = self
            .class
            .get_signal(name)
            .ok_or_else(|| ReflectError::MemberNotFound {
                class: self.class.qualified_name().to_string(),
                kind: MemberKind::Signal,
                member: name.to_string(),
            })?;
        let args = declaration.coerce_arguments(args)?;
        Ok(self
            .signals
            .get(name)
            .map_or(0, |signal| signal.emit(args.as_slice())))
    }
}

/// [`ROOT_CLASS`] itself.
impl Reflected for ObjectCore {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<ObjectCore>::new("Object")
            .namespace("core")
            .description("Root of every reflected engine object.")
            .computed("id", TypeTag::UInt, |core| Value::UInt(core.id.0))
            .attribute_description("process-unique object id")
            .computed("class", TypeTag::String, |core| {
                Value::String(core.class.qualified_name().to_string())
            })
            .attribute_description("qualified class name")
            .signal(DESTROYED_SIGNAL, &[TypeTag::UInt])
            .build()
    }
}

impl Drop for ObjectCore {
    fn drop(&mut self) {
        if let Some(signal) = self.signals.get(DESTROYED_SIGNAL) {
            signal.emit(&[Value::UInt(self.id.0)]);
        }
        for signal in self.signals.values() {
            signal.disconnect_all();
        }
        trace!(id = self.id.0, class = self.class.qualified_name(), "object dropped");
    }
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCore")
            .field("id", &self.id)
            .field("class", &self.class.qualified_name())
            .field("ancestors", &self.lineage.len())
            .field("signals", &self.signals.len())
            .finish()
    }
}

/// Conversions every [`Object`] gets for free.
pub trait AsObject {
    fn as_object(&self) -> &dyn Object;
    fn as_object_mut(&mut self) -> &mut dyn Object;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Object> AsObject for T {
    fn as_object(&self) -> &dyn Object {
        self
    }

    fn as_object_mut(&mut self) -> &mut dyn Object {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// The common capability of every reflected instance.
pub trait Object: AsObject + Send + 'static {
    /// The core embedded in this instance (or in its innermost base).
    fn core(&self) -> &ObjectCore;

    fn class(&self) -> &Arc<ClassDescriptor> {
        self.core().class()
    }

    fn object_id(&self) -> ObjectId {
        self.core().id()
    }

    fn signal(&self, name: &str) -> Option<&Signal<[Value]>> {
        self.core().signal(name)
    }

    fn emit(&self, name: &str, args: &[Value]) -> Result<usize> {
        self.core().emit(name, args)
    }

    /// A handle for generic access to one attribute, or `None` if no class
    /// in the hierarchy declares it.
    fn dynamic_variable(&mut self, name: &str) -> Option<DynamicVariable<'_>> {
        let field = self.class().resolve_field(name)?;
        Some(DynamicVariable::new(self.as_object_mut(), field))
    }

    /// Read one attribute without taking a mutable borrow.
    fn read_attribute(&self, name: &str) -> Result<Value> {
        let field = self
            .class()
            .resolve_field(name)
            .ok_or_else(|| member_not_found(self.class(), MemberKind::Attribute, name))?;
        let target = field
            .project(self.as_any())
            .ok_or_else(|| projection_failed(self.class(), name))?;
        field.descriptor().read(target)
    }

    /// Invoke a method declared on this class or inherited from a base.
    fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let class = Arc::clone(self.class());
        let method = class
            .resolve_method(name)
            .ok_or_else(|| member_not_found(&class, MemberKind::Method, name))?;
        let target = method
            .project_mut(self.as_any_mut())
            .ok_or_else(|| projection_failed(&class, name))?;
        method.descriptor().call(target, args)
    }
}

fn member_not_found(class: &ClassDescriptor, kind: MemberKind, member: &str) -> ReflectError {
    ReflectError::MemberNotFound {
        class: class.qualified_name().to_string(),
        kind,
        member: member.to_string(),
    }
}

pub(crate) fn projection_failed(class: &ClassDescriptor, member: &str) -> ReflectError {
    ReflectError::InstanceMismatch {
        member: member.to_string(),
        expected: class.rust_type(),
    }
}

impl dyn Object {
    #[must_use]
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    #[must_use]
    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Recover the concrete type of a boxed object, or hand the box back.
    pub fn downcast<T: Object>(self: Box<Self>) -> std::result::Result<Box<T>, Box<dyn Object>> {
        if self.is::<T>() {
            self.into_any()
                .downcast()
                .map_err(|_| unreachable!("type checked above"))
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for dyn Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.object_id())
            .field("class", &self.class().qualified_name())
            .finish()
    }
}

/// Connect a declared signal of `emitter` to a reflected method of
/// `receiver`, so that each emission invokes the method with the signal's
/// arguments. Connecting the same (receiver, method) pair twice is a no-op
/// that returns the existing connection.
pub fn connect<R: Object>(
    emitter: &dyn Object,
    signal: &str,
    receiver: &Shared<R>,
    method: &str,
) -> Result<ConnectionId> {
    let emitter_class = emitter.class();
    let declaration = emitter_class
        .get_signal(signal)
        .ok_or_else(|| member_not_found(emitter_class, MemberKind::Signal, signal))?;

    let receiver_class = receiver.class();
    let slot = receiver_class
        .get_method(method)
        .ok_or_else(|| member_not_found(receiver_class, MemberKind::Method, method))?;

    if slot.params().len() != declaration.params.len() {
        return Err(ReflectError::ArityMismatch {
            member: method.to_string(),
            expected: slot.params().len(),
            found: declaration.params.len(),
        });
    }
    for (&sent, &accepted) in declaration.params.iter().zip(slot.params()) {
        if Value::zero(sent).convert_to(accepted).is_none() {
            return Err(ReflectError::TypeMismatch {
                member: method.to_string(),
                expected: accepted,
                found: sent,
            });
        }
    }

    let signal_handle = emitter
        .signal(signal)
        .ok_or_else(|| member_not_found(emitter_class, MemberKind::Signal, signal))?;
    Ok(signal_handle.connect_invoke(receiver, slot.name()))
}

/// Undo [`connect`]. Returns `false` if the pair was not connected.
pub fn disconnect<R: Object>(emitter: &dyn Object, signal: &str, receiver: &Shared<R>, method: &str) -> bool {
    let Some(handle) = emitter.signal(signal) else {
        return false;
    };
    receiver.class().get_method(method).is_some() && handle.disconnect_invoke(receiver, method)
}
