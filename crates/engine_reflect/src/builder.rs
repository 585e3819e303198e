//! Typed registration input.
//!
//! A [`ClassBuilder<T>`] collects everything a class declares against the
//! Rust type `T` its members operate on, and erases it into a
//! [`ClassDefinition`]. Nothing is validated here: base names, duplicate
//! members, and default values are checked when the registry resolves the
//! definition into a [`ClassDescriptor`](crate::ClassDescriptor).
//!
//! ```rust
//! use engine_reflect::{ClassBuilder, ClassRegistry, TypeTag, Value};
//!
//! struct Light {
//!     intensity: f64,
//! }
//!
//! let registry = ClassRegistry::new();
//! let class = registry
//!     .register(
//!         ClassBuilder::<Light>::new("Light")
//!             .namespace("scene")
//!             .field("intensity", |l| &l.intensity, |l| &mut l.intensity)
//!             .default_value("1")
//!             .annotation("range:0..10")
//!             .method("brightest", &[], TypeTag::Bool, |l, _| Ok(Value::Bool(l.intensity >= 10.0)))
//!             .build(),
//!     )
//!     .unwrap();
//! assert!(class.get_field("intensity").is_some());
//! ```

use std::any::{Any, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::class::{ClassDescriptor, Projection, Upcast};
use crate::descriptor::{
    ConstructorDescriptor, Getter, MethodDescriptor, PropertyDescriptor, Setter, SignalDescriptor,
};
use crate::error::{ReflectError, Result};
use crate::object::Object;
use crate::value::{FromValue, IntoValue, TypeTag, Value};

pub(crate) struct BaseSpec {
    pub(crate) name: String,
    pub(crate) projection: Arc<dyn Upcast>,
}

pub(crate) struct AttributeSpec {
    pub(crate) name: String,
    pub(crate) type_tag: TypeTag,
    pub(crate) default_text: Option<String>,
    pub(crate) description: String,
    pub(crate) annotation: String,
    pub(crate) getter: Getter,
    pub(crate) setter: Option<Setter>,
}

/// An unresolved, type-erased class declaration, ready to be registered.
pub struct ClassDefinition {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) description: String,
    pub(crate) rust_type: &'static str,
    pub(crate) bases: Vec<BaseSpec>,
    pub(crate) constructors: Vec<ConstructorDescriptor>,
    pub(crate) attributes: Vec<AttributeSpec>,
    pub(crate) methods: Vec<MethodDescriptor>,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) signals: Vec<SignalDescriptor>,
}

impl ClassDefinition {
    /// `namespace::name`, or `name` when the namespace is empty.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }

    /// Qualified names of the declared bases.
    pub fn base_names(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(|b| b.name.as_str())
    }
}

impl std::fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("qualified_name", &self.qualified_name())
            .field("bases", &self.base_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A type that can describe its own class.
pub trait Reflected: Any {
    fn class_definition() -> ClassDefinition;
}

fn instance_mismatch<T>(member: &str) -> ReflectError {
    ReflectError::InstanceMismatch {
        member: member.to_string(),
        expected: type_name::<T>(),
    }
}

/// Fluent builder for one class whose members operate on `T`.
///
/// The attribute modifiers ([`default_value`](Self::default_value),
/// [`annotation`](Self::annotation),
/// [`attribute_description`](Self::attribute_description)) apply to the most
/// recently declared attribute.
pub struct ClassBuilder<T> {
    definition: ClassDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> ClassBuilder<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: ClassDefinition {
                name: name.into(),
                namespace: String::new(),
                description: String::new(),
                rust_type: type_name::<T>(),
                bases: Vec::new(),
                constructors: Vec::new(),
                attributes: Vec::new(),
                methods: Vec::new(),
                properties: Vec::new(),
                signals: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.definition.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    /// Declare a base class. `get`/`get_mut` reach the instance of the base's
    /// Rust type embedded in `T`.
    #[must_use]
    pub fn base<B: Any>(
        mut self,
        qualified_name: impl Into<String>,
        get: fn(&T) -> &B,
        get_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        self.definition.bases.push(BaseSpec {
            name: qualified_name.into(),
            projection: Arc::new(Projection { get, get_mut }),
        });
        self
    }

    /// A read-write attribute backed by a field of `T`.
    #[must_use]
    pub fn field<F>(self, name: impl Into<String>, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: FromValue + IntoValue + Clone + 'static,
    {
        let name = name.into();
        let member = name.clone();
        let setter: Setter = Arc::new(move |target: &mut dyn Any, value: Value| -> Result<()> {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| instance_mismatch::<T>(&member))?;
            *get_mut(target) = value.extract(&member)?;
            Ok(())
        });
        self.push_attribute(name, F::TAG, field_getter(get), Some(setter))
    }

    /// A read-only attribute backed by a field of `T`.
    #[must_use]
    pub fn field_read_only<F>(self, name: impl Into<String>, get: fn(&T) -> &F) -> Self
    where
        F: FromValue + IntoValue + Clone + 'static,
    {
        self.push_attribute(name.into(), F::TAG, field_getter(get), None)
    }

    /// A read-only attribute computed from `T`.
    #[must_use]
    pub fn computed<G>(self, name: impl Into<String>, tag: TypeTag, get: G) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.push_attribute(name.into(), tag, computed_getter(get), None)
    }

    /// A read-write attribute with custom accessors. `set` receives a value
    /// already converted to `tag`.
    #[must_use]
    pub fn computed_rw<G, S>(self, name: impl Into<String>, tag: TypeTag, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        let setter: Setter = Arc::new(move |target: &mut dyn Any, value: Value| -> Result<()> {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| instance_mismatch::<T>(&member))?;
            set(target, value)
        });
        self.push_attribute(name, tag, computed_getter(get), Some(setter))
    }

    fn push_attribute(mut self, name: String, tag: TypeTag, getter: Getter, setter: Option<Setter>) -> Self {
        self.definition.attributes.push(AttributeSpec {
            name,
            type_tag: tag,
            default_text: None,
            description: String::new(),
            annotation: String::new(),
            getter,
            setter,
        });
        self
    }

    fn last_attribute(&mut self) -> Option<&mut AttributeSpec> {
        self.definition.attributes.last_mut()
    }

    /// Default of the last attribute, as canonical text.
    #[must_use]
    pub fn default_value(mut self, text: impl Into<String>) -> Self {
        if let Some(attribute) = self.last_attribute() {
            attribute.default_text = Some(text.into());
        }
        self
    }

    /// Tooling annotation of the last attribute.
    #[must_use]
    pub fn annotation(mut self, text: impl Into<String>) -> Self {
        if let Some(attribute) = self.last_attribute() {
            attribute.annotation = text.into();
        }
        self
    }

    /// Human description of the last attribute.
    #[must_use]
    pub fn attribute_description(mut self, text: impl Into<String>) -> Self {
        if let Some(attribute) = self.last_attribute() {
            attribute.description = text.into();
        }
        self
    }

    /// A method. `call` receives arguments already converted to `params`.
    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, params: &[TypeTag], returns: TypeTag, call: F) -> Self
    where
        F: Fn(&mut T, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        self.definition.methods.push(MethodDescriptor {
            name,
            params: params.to_vec(),
            returns,
            description: String::new(),
            thunk: Arc::new(move |target: &mut dyn Any, args: &[Value]| -> Result<Value> {
                let target = target
                    .downcast_mut::<T>()
                    .ok_or_else(|| instance_mismatch::<T>(&member))?;
                call(target, args)
            }),
        });
        self
    }

    /// Human description of the last method.
    #[must_use]
    pub fn method_description(mut self, text: impl Into<String>) -> Self {
        if let Some(method) = self.definition.methods.last_mut() {
            method.description = text.into();
        }
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.properties.push(PropertyDescriptor {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn signal(mut self, name: impl Into<String>, params: &[TypeTag]) -> Self {
        self.definition.signals.push(SignalDescriptor {
            name: name.into(),
            params: params.to_vec(),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> ClassDefinition {
        self.definition
    }
}

impl<T: Object> ClassBuilder<T> {
    /// A constructor. `construct` receives the registered class (to hand to
    /// [`ObjectCore::new`](crate::ObjectCore::new)) and arguments already
    /// converted to `params`.
    #[must_use]
    pub fn constructor<F>(mut self, params: &[TypeTag], construct: F) -> Self
    where
        F: Fn(&Arc<ClassDescriptor>, &[Value]) -> Result<T> + Send + Sync + 'static,
    {
        self.definition.constructors.push(ConstructorDescriptor {
            params: params.to_vec(),
            thunk: Arc::new(
                move |class: &Arc<ClassDescriptor>, args: &[Value]| -> Result<Box<dyn Object>> {
                    let object = construct(class, args)?;
                    Ok(Box::new(object))
                },
            ),
        });
        self
    }
}

fn field_getter<T: Any, F: IntoValue + Clone + 'static>(get: fn(&T) -> &F) -> Getter {
    Arc::new(move |target: &dyn Any| -> Result<Value> {
        let target = target
            .downcast_ref::<T>()
            .ok_or_else(|| instance_mismatch::<T>("field"))?;
        Ok(get(target).clone().into_value())
    })
}

fn computed_getter<T: Any, G>(get: G) -> Getter
where
    G: Fn(&T) -> Value + Send + Sync + 'static,
{
    Arc::new(move |target: &dyn Any| -> Result<Value> {
        let target = target
            .downcast_ref::<T>()
            .ok_or_else(|| instance_mismatch::<T>("computed"))?;
        Ok(get(target))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lamp {
        watts: f64,
        on: bool,
    }

    fn lamp_class() -> ClassDefinition {
        ClassBuilder::<Lamp>::new("Lamp")
            .namespace("props")
            .description("a light source")
            .field("watts", |l| &l.watts, |l| &mut l.watts)
            .default_value("60")
            .annotation("range:0..200")
            .attribute_description("power draw")
            .field_read_only("on", |l| &l.on)
            .method("toggle", &[], TypeTag::Bool, |l, _| {
                l.on = !l.on;
                Ok(Value::Bool(l.on))
            })
            .method_description("flip the switch")
            .property("category", "furniture")
            .signal("switched", &[TypeTag::Bool])
            .build()
    }

    #[test]
    fn test_definition_collects_members() {
        let def = lamp_class();
        assert_eq!(def.qualified_name(), "props::Lamp");
        assert_eq!(def.attributes.len(), 2);
        assert_eq!(def.attributes[0].default_text.as_deref(), Some("60"));
        assert_eq!(def.attributes[0].annotation, "range:0..200");
        assert_eq!(def.attributes[0].description, "power draw");
        assert!(def.attributes[1].setter.is_none());
        assert_eq!(def.methods[0].description, "flip the switch");
        assert_eq!(def.signals[0].params, vec![TypeTag::Bool]);
        assert!(def.rust_type.ends_with("Lamp"));
    }

    #[test]
    fn test_field_accessors_reach_the_field() {
        let def = lamp_class();
        let mut lamp = Lamp::default();
        let watts = &def.attributes[0];
        (watts.setter.as_ref().unwrap())(&mut lamp, Value::Float(40.0)).unwrap();
        assert_eq!(lamp.watts, 40.0);
        assert_eq!((watts.getter)(&lamp).unwrap(), Value::Float(40.0));
    }

    #[test]
    fn test_accessors_reject_foreign_instances() {
        let def = lamp_class();
        let mut other = 5u8;
        let err = (def.attributes[0].getter)(&other).unwrap_err();
        assert!(matches!(err, ReflectError::InstanceMismatch { .. }));
        let err = (def.methods[0].thunk)(&mut other, &[]).unwrap_err();
        assert!(matches!(err, ReflectError::InstanceMismatch { .. }));
    }

    #[test]
    fn test_modifiers_without_attribute_are_ignored() {
        let def = ClassBuilder::<Lamp>::new("Bare").default_value("1").annotation("x").build();
        assert!(def.attributes.is_empty());
        assert_eq!(def.qualified_name(), "Bare");
    }
}
