//! Member descriptors: the immutable metadata records a class is made of.
//!
//! Descriptors are created by [`ClassBuilder`](crate::ClassBuilder) and frozen
//! once their class is registered. Callables (getters, setters, method and
//! constructor thunks) are stored type-erased: they receive the instance as
//! `&dyn Any` projected to the Rust type the declaring class was built on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::class::ClassDescriptor;
use crate::error::{MemberKind, ReflectError, Result};
use crate::object::Object;
use crate::value::{TypeTag, Value};

pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
pub(crate) type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;
pub(crate) type MethodThunk = Arc<dyn Fn(&mut dyn Any, &[Value]) -> Result<Value> + Send + Sync>;
pub(crate) type ConstructorThunk =
    Arc<dyn Fn(&Arc<ClassDescriptor>, &[Value]) -> Result<Box<dyn Object>> + Send + Sync>;

/// Whether an attribute accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// A descriptor stored in a class's member table.
pub(crate) trait Member {
    const KIND: MemberKind;

    fn member_name(&self) -> &str;
}

/// Convert `args` to the declared parameter tags of `member`.
pub(crate) fn coerce_arguments(member: &str, params: &[TypeTag], args: &[Value]) -> Result<Vec<Value>> {
    if params.len() != args.len() {
        return Err(ReflectError::ArityMismatch {
            member: member.to_string(),
            expected: params.len(),
            found: args.len(),
        });
    }
    params
        .iter()
        .zip(args)
        .map(|(tag, arg)| arg.clone().coerce(*tag, member))
        .collect()
}

/// One reflected field of a class.
pub struct AttributeDescriptor {
    pub(crate) name: String,
    pub(crate) type_tag: TypeTag,
    pub(crate) default: Value,
    pub(crate) description: String,
    pub(crate) annotation: String,
    pub(crate) getter: Getter,
    pub(crate) setter: Option<Setter>,
}

impl AttributeDescriptor {
    /// Name the attribute is looked up by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag of the attribute's values.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// The value written by [`DynamicVariable::reset`](crate::DynamicVariable::reset).
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Read-write when the attribute has a setter.
    #[must_use]
    pub fn access(&self) -> AccessMode {
        if self.setter.is_some() {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        }
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Free-form tooling hint, e.g. `"range:1..179"`.
    #[must_use]
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    pub(crate) fn read(&self, target: &dyn Any) -> Result<Value> {
        (self.getter)(target)
    }

    /// Write an already-coerced value. Callers check access first.
    pub(crate) fn write(&self, target: &mut dyn Any, value: Value) -> Result<()> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(ReflectError::ReadOnlyViolation(self.name.clone())),
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(ReflectError::ReadOnlyViolation(self.name.clone()));
        }
        Ok(())
    }
}

impl Member for AttributeDescriptor {
    const KIND: MemberKind = MemberKind::Attribute;

    fn member_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("default", &self.default)
            .field("access", &self.access())
            .field("annotation", &self.annotation)
            .finish_non_exhaustive()
    }
}

/// One reflected callable of a class.
pub struct MethodDescriptor {
    pub(crate) name: String,
    pub(crate) params: Vec<TypeTag>,
    pub(crate) returns: TypeTag,
    pub(crate) description: String,
    pub(crate) thunk: MethodThunk,
}

impl MethodDescriptor {
    /// Name the method is invoked by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter tags, in order.
    #[must_use]
    pub fn params(&self) -> &[TypeTag] {
        &self.params
    }

    /// Tag the result is converted to.
    #[must_use]
    pub fn returns(&self) -> TypeTag {
        self.returns
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Check arity and convert each argument to its parameter tag.
    pub fn coerce_arguments(&self, args: &[Value]) -> Result<Vec<Value>> {
        coerce_arguments(&self.name, &self.params, args)
    }

    /// Run the thunk against a projected instance. Arguments are checked and
    /// converted here; the result is converted to the declared return tag.
    pub(crate) fn call(&self, target: &mut dyn Any, args: &[Value]) -> Result<Value> {
        let args = self.coerce_arguments(args)?;
        let result = (self.thunk)(target, &args)?;
        result.coerce(self.returns, &self.name)
    }
}

impl Member for MethodDescriptor {
    const KIND: MemberKind = MemberKind::Method;

    fn member_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A descriptive key/value annotation on a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    pub key: String,
    pub value: String,
}

impl Member for PropertyDescriptor {
    const KIND: MemberKind = MemberKind::Property;

    fn member_name(&self) -> &str {
        &self.key
    }
}

/// A signal a class's instances can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalDescriptor {
    pub name: String,
    pub params: Vec<TypeTag>,
}

impl SignalDescriptor {
    /// Check arity and convert each argument to its parameter tag.
    pub fn coerce_arguments(&self, args: &[Value]) -> Result<Vec<Value>> {
        coerce_arguments(&self.name, &self.params, args)
    }
}

impl Member for SignalDescriptor {
    const KIND: MemberKind = MemberKind::Signal;

    fn member_name(&self) -> &str {
        &self.name
    }
}

/// A constructor signature and the thunk that builds the instance.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub(crate) params: Vec<TypeTag>,
    pub(crate) thunk: ConstructorThunk,
}

impl ConstructorDescriptor {
    #[must_use]
    pub fn params(&self) -> &[TypeTag] {
        &self.params
    }

    /// Returns `true` if `args` has the right arity and every argument
    /// converts to its parameter tag.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(tag, arg)| arg.convert_to(*tag).is_some())
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
