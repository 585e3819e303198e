//! Dynamic variables: generic read/write access to one attribute of one
//! live instance.
//!
//! A [`DynamicVariable`] borrows its instance, so it can never outlive it.
//! Handles are created on demand through
//! [`Object::dynamic_variable`](crate::Object::dynamic_variable).
//!
//! Every failed write leaves the attribute unchanged: access and conversion
//! are checked before the setter runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::class::Resolved;
use crate::descriptor::{AccessMode, AttributeDescriptor};
use crate::error::{MemberKind, ReflectError, Result};
use crate::object::{Object, projection_failed};
use crate::value::{TypeTag, Value};

/// A handle bound to one attribute of one instance.
pub struct DynamicVariable<'a> {
    target: &'a mut dyn Object,
    field: Resolved<AttributeDescriptor>,
}

impl<'a> DynamicVariable<'a> {
    pub(crate) fn new(target: &'a mut dyn Object, field: Resolved<AttributeDescriptor>) -> Self {
        Self { target, field }
    }

    /// Name of the attribute.
    #[must_use]
    pub fn name(&self) -> &str {
        self.field.descriptor().name()
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<AttributeDescriptor> {
        self.field.descriptor()
    }

    /// Qualified name of the class declaring the attribute.
    #[must_use]
    pub fn owner(&self) -> &str {
        self.field.owner()
    }

    /// Tag every value written through this handle is converted to.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.field.descriptor().type_tag()
    }

    #[must_use]
    pub fn access(&self) -> AccessMode {
        self.field.descriptor().access()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.field.descriptor().is_read_only()
    }

    /// The current value.
    pub fn get_value(&self) -> Result<Value> {
        let class = self.target.class();
        let target = self
            .field
            .project(self.target.as_any())
            .ok_or_else(|| projection_failed(class, self.name()))?;
        self.field.descriptor().read(target)
    }

    /// The canonical text of the current value.
    pub fn get_string(&self) -> Result<String> {
        Ok(self.get_value()?.to_text())
    }

    /// Write a value, converting it to the attribute's tag. Infinite and NaN
    /// components are rejected, since their text would not parse back.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        let descriptor = Arc::clone(self.field.descriptor());
        descriptor.ensure_writable()?;
        let value = value.coerce(descriptor.type_tag(), descriptor.name())?;
        self.write(&descriptor, value)
    }

    /// Parse `text` as the attribute's tag and write it.
    pub fn set_string(&mut self, text: &str) -> Result<()> {
        let descriptor = Arc::clone(self.field.descriptor());
        descriptor.ensure_writable()?;
        let value = Value::parse(descriptor.type_tag(), text)?;
        self.write(&descriptor, value)
    }

    /// Write the attribute's declared default.
    pub fn reset(&mut self) -> Result<()> {
        let default = self.field.descriptor().default_value().clone();
        self.set_value(default)
    }

    fn write(&mut self, descriptor: &AttributeDescriptor, value: Value) -> Result<()> {
        let class = Arc::clone(self.target.class());
        let target = self
            .field
            .project_mut(self.target.as_any_mut())
            .ok_or_else(|| projection_failed(&class, descriptor.name()))?;
        descriptor.write(target, value)
    }
}

impl std::fmt::Debug for DynamicVariable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicVariable")
            .field("object", &self.target.object_id())
            .field("attribute", &self.name())
            .field("owner", &self.owner())
            .finish()
    }
}

/// Write the declared default of every writable attribute, own and inherited.
pub fn apply_defaults(object: &mut dyn Object) -> Result<()> {
    let class = Arc::clone(object.class());
    for field in class.all_fields() {
        if field.descriptor().is_read_only() {
            continue;
        }
        DynamicVariable::new(&mut *object, field).reset()?;
    }
    Ok(())
}

/// Current value of every readable attribute, keyed by name.
pub fn snapshot(object: &dyn Object) -> Result<BTreeMap<String, Value>> {
    let class = object.class();
    let mut values = BTreeMap::new();
    for field in class.all_fields() {
        let name = field.descriptor().name().to_string();
        let target = field
            .project(object.as_any())
            .ok_or_else(|| projection_failed(class, &name))?;
        values.insert(name, field.descriptor().read(target)?);
    }
    Ok(values)
}

/// Write a [`snapshot`] back. Read-only attributes in `values` are skipped;
/// names the class does not know are an error. Stops at the first failure.
pub fn restore(object: &mut dyn Object, values: &BTreeMap<String, Value>) -> Result<()> {
    let class = Arc::clone(object.class());
    for (name, value) in values {
        let field = class
            .resolve_field(name)
            .ok_or_else(|| ReflectError::MemberNotFound {
                class: class.qualified_name().to_string(),
                kind: MemberKind::Attribute,
                member: name.clone(),
            })?;
        if field.descriptor().is_read_only() {
            continue;
        }
        DynamicVariable::new(&mut *object, field).set_value(value.clone())?;
    }
    Ok(())
}
