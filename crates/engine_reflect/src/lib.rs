//! # engine_reflect
//!
//! Runtime type information for the engine: the meta-object layer editors,
//! scripts, and loaders use to work with engine objects without knowing
//! their Rust types.
//!
//! This crate provides:
//!
//! - [`ClassRegistry`]: qualified class name to [`ClassDescriptor`], with
//!   module load/unload.
//! - [`ClassDescriptor`]: a class's attributes, methods, properties, and
//!   signals, with depth-first inherited lookup.
//! - [`ClassBuilder`]: typed registration input for one class.
//! - [`Object`]: the capability every reflected instance has, and
//!   [`ObjectCore`], the state every instance embeds.
//! - [`DynamicVariable`]: string and value access to one attribute of one
//!   instance.
//! - [`Signal`]: synchronous signal/slot dispatch with weak receivers.
//! - [`Value`] / [`TypeTag`]: the closed set of reflected value types.

pub mod builder;
pub mod class;
pub mod config;
pub mod descriptor;
pub mod dynvar;
pub mod error;
pub mod object;
pub mod registry;
pub mod signal;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use builder::{ClassBuilder, ClassDefinition, Reflected};
pub use class::{ClassDescriptor, Resolved};
pub use config::{DuplicatePolicy, OrphanPolicy, RegistryConfig};
pub use descriptor::{
    AccessMode, AttributeDescriptor, ConstructorDescriptor, MethodDescriptor, PropertyDescriptor,
    SignalDescriptor,
};
pub use dynvar::{DynamicVariable, apply_defaults, restore, snapshot};
pub use error::{MemberKind, ReflectError, Result};
pub use object::{
    AsObject, DESTROYED_SIGNAL, Object, ObjectCore, ObjectId, ROOT_CLASS, Shared, SharedGuard, connect,
    disconnect, share,
};
pub use registry::{ClassRegistry, ModuleDefinition};
pub use signal::{ConnectionId, Signal, SignalState};
pub use value::{FromValue, IntoValue, TypeTag, Value};
