//! Class descriptors and inheritance-aware member lookup.
//!
//! A [`ClassDescriptor`] only holds the members its own class declares.
//! Inherited members are found by walking the base list at lookup time:
//! depth-first, in declaration order, recursing into a base's own bases
//! before moving on to the next sibling. The first match wins, so a class's
//! own member always shadows an inherited one, and when two bases declare the
//! same name the base listed first wins. Diamond hierarchies are walked as
//! trees under the same rule; ambiguity is never diagnosed.
//!
//! Bases are held as [`Weak`] handles into the registry. A base that has
//! been unregistered is skipped by every walk, and registering a class under
//! the same name re-points the handle at the new descriptor. Live instances
//! pin their ancestors, so an instance never loses inherited members.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::json;

use crate::builder::ClassDefinition;
use crate::descriptor::{
    AttributeDescriptor, ConstructorDescriptor, Member, MethodDescriptor, PropertyDescriptor,
    SignalDescriptor,
};
use crate::error::{ReflectError, Result};
use crate::object::Object;
use crate::value::{TypeTag, Value};

/// Upcast from a derived instance to the embedded instance of one base.
pub(crate) trait Upcast: Send + Sync {
    fn up<'a>(&self, target: &'a dyn Any) -> Option<&'a dyn Any>;
    fn up_mut<'a>(&self, target: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

/// An [`Upcast`] built from a pair of field accessors.
pub(crate) struct Projection<T, B> {
    pub(crate) get: fn(&T) -> &B,
    pub(crate) get_mut: fn(&mut T) -> &mut B,
}

impl<T: Any, B: Any> Upcast for Projection<T, B> {
    fn up<'a>(&self, target: &'a dyn Any) -> Option<&'a dyn Any> {
        target
            .downcast_ref::<T>()
            .map(|derived| (self.get)(derived) as &dyn Any)
    }

    fn up_mut<'a>(&self, target: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        target
            .downcast_mut::<T>()
            .map(|derived| (self.get_mut)(derived) as &mut dyn Any)
    }
}

/// A weak handle to a registered base class.
pub(crate) struct BaseRef {
    pub(crate) name: String,
    pub(crate) class: RwLock<Weak<ClassDescriptor>>,
    pub(crate) projection: Arc<dyn Upcast>,
}

impl BaseRef {
    fn target(&self) -> Option<Arc<ClassDescriptor>> {
        self.class.read().upgrade()
    }
}

/// Name-keyed descriptors, kept in declaration order for listing.
pub(crate) struct MemberTable<D> {
    entries: Vec<Arc<D>>,
    index: HashMap<String, usize>,
}

impl<D: Member> MemberTable<D> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, class: &str, descriptor: D) -> Result<()> {
        let name = descriptor.member_name().to_string();
        if self.index.contains_key(&name) {
            return Err(ReflectError::DuplicateMember {
                class: class.to_string(),
                kind: D::KIND,
                member: name,
            });
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(Arc::new(descriptor));
        Ok(())
    }

    fn get(&self, name: &str) -> Option<&Arc<D>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<D>> {
        self.entries.iter()
    }
}

/// A member found by a hierarchy walk, together with the chain of upcasts
/// from an instance of the class the walk started at to an instance of the
/// declaring class.
pub struct Resolved<D> {
    descriptor: Arc<D>,
    owner: String,
    path: Vec<Arc<dyn Upcast>>,
}

impl<D> Resolved<D> {
    #[must_use]
    pub fn descriptor(&self) -> &Arc<D> {
        &self.descriptor
    }

    /// Qualified name of the class that declares the member.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn into_descriptor(self) -> Arc<D> {
        self.descriptor
    }

    pub(crate) fn project<'a>(&self, target: &'a dyn Any) -> Option<&'a dyn Any> {
        let mut current = target;
        for step in &self.path {
            current = step.up(current)?;
        }
        Some(current)
    }

    pub(crate) fn project_mut<'a>(&self, target: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let mut current = target;
        for step in &self.path {
            current = step.up_mut(current)?;
        }
        Some(current)
    }
}

impl<D> Clone for Resolved<D> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            owner: self.owner.clone(),
            path: self.path.clone(),
        }
    }
}

impl<D: fmt::Debug> fmt::Debug for Resolved<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("descriptor", &self.descriptor)
            .field("owner", &self.owner)
            .field("depth", &self.path.len())
            .finish()
    }
}

/// One registered class.
pub struct ClassDescriptor {
    name: String,
    namespace: String,
    qualified_name: String,
    description: String,
    rust_type: &'static str,
    bases: Vec<BaseRef>,
    constructors: Vec<ConstructorDescriptor>,
    attributes: MemberTable<AttributeDescriptor>,
    methods: MemberTable<MethodDescriptor>,
    properties: MemberTable<PropertyDescriptor>,
    signals: MemberTable<SignalDescriptor>,
}

impl ClassDescriptor {
    /// Freeze a definition into a descriptor. `resolve` maps a base's
    /// qualified name to its registered descriptor.
    pub(crate) fn from_definition(
        definition: ClassDefinition,
        resolve: impl Fn(&str) -> Option<Arc<ClassDescriptor>>,
    ) -> Result<Self> {
        let qualified_name = definition.qualified_name();
        let ClassDefinition {
            name,
            namespace,
            description,
            rust_type,
            bases: base_specs,
            constructors,
            attributes: attribute_specs,
            methods: method_list,
            properties: property_list,
            signals: signal_list,
        } = definition;

        let mut bases = Vec::with_capacity(base_specs.len());
        for base in base_specs {
            let class = (base.name != qualified_name)
                .then(|| resolve(&base.name))
                .flatten()
                .ok_or_else(|| ReflectError::UnknownBase {
                    class: qualified_name.clone(),
                    base: base.name.clone(),
                })?;
            bases.push(BaseRef {
                name: base.name,
                class: RwLock::new(Arc::downgrade(&class)),
                projection: base.projection,
            });
        }

        let mut attributes = MemberTable::new();
        for spec in attribute_specs {
            let default = match &spec.default_text {
                Some(text) => Value::parse(spec.type_tag, text)?,
                None => Value::zero(spec.type_tag),
            };
            attributes.insert(
                &qualified_name,
                AttributeDescriptor {
                    name: spec.name,
                    type_tag: spec.type_tag,
                    default,
                    description: spec.description,
                    annotation: spec.annotation,
                    getter: spec.getter,
                    setter: spec.setter,
                },
            )?;
        }

        let mut methods = MemberTable::new();
        for method in method_list {
            methods.insert(&qualified_name, method)?;
        }
        let mut properties = MemberTable::new();
        for property in property_list {
            properties.insert(&qualified_name, property)?;
        }
        let mut signals = MemberTable::new();
        for signal in signal_list {
            signals.insert(&qualified_name, signal)?;
        }

        Ok(Self {
            name,
            namespace,
            qualified_name,
            description,
            rust_type,
            bases,
            constructors,
            attributes,
            methods,
            properties,
            signals,
        })
    }

    /// Unqualified class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning namespace, empty for classes outside any namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `namespace::name`, or just `name` for classes outside any namespace.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Name of the Rust type the class's members are declared on.
    #[must_use]
    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }

    /// Qualified names of the direct bases, in declaration order.
    pub fn base_names(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(|b| b.name.as_str())
    }

    /// Direct bases that are still registered, in declaration order.
    #[must_use]
    pub fn bases(&self) -> Vec<Arc<ClassDescriptor>> {
        self.bases.iter().filter_map(BaseRef::target).collect()
    }

    /// Every reachable ancestor, in lookup order, each listed once.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Arc<ClassDescriptor>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_ancestors(&mut seen, &mut out);
        out
    }

    fn collect_ancestors(&self, seen: &mut HashSet<String>, out: &mut Vec<Arc<ClassDescriptor>>) {
        for base in &self.bases {
            let Some(class) = base.target() else {
                continue;
            };
            if seen.insert(class.qualified_name.clone()) {
                out.push(Arc::clone(&class));
                class.collect_ancestors(seen, out);
            }
        }
    }

    /// Returns `true` if this class is `name` or derives from it.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.qualified_name == name
            || self
                .bases
                .iter()
                .any(|b| b.target().is_some_and(|class| class.is_a(name)))
    }

    /// Point every base handle named after `base` at it. Returns `true` if
    /// this class derives from `base` directly.
    pub(crate) fn relink(&self, base: &Arc<ClassDescriptor>) -> bool {
        let mut linked = false;
        for handle in self.bases.iter().filter(|b| b.name == base.qualified_name) {
            *handle.class.write() = Arc::downgrade(base);
            linked = true;
        }
        linked
    }

    // -- Hierarchy lookup --

    fn resolve<D>(&self, name: &str, table: fn(&ClassDescriptor) -> &MemberTable<D>) -> Option<Resolved<D>>
    where
        D: Member,
    {
        let mut path = Vec::new();
        self.resolve_in(name, table, &mut path)
    }

    fn resolve_in<D>(
        &self,
        name: &str,
        table: fn(&ClassDescriptor) -> &MemberTable<D>,
        path: &mut Vec<Arc<dyn Upcast>>,
    ) -> Option<Resolved<D>>
    where
        D: Member,
    {
        if let Some(descriptor) = table(self).get(name) {
            return Some(Resolved {
                descriptor: Arc::clone(descriptor),
                owner: self.qualified_name.clone(),
                path: path.clone(),
            });
        }
        for base in &self.bases {
            let Some(class) = base.target() else {
                continue;
            };
            path.push(Arc::clone(&base.projection));
            if let Some(found) = class.resolve_in(name, table, path) {
                return Some(found);
            }
            path.pop();
        }
        None
    }

    /// Every member of one kind visible from this class, in lookup order,
    /// with shadowed names removed.
    fn resolve_all<D>(&self, table: fn(&ClassDescriptor) -> &MemberTable<D>) -> Vec<Resolved<D>>
    where
        D: Member,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.resolve_all_in(table, &mut path, &mut seen, &mut out);
        out
    }

    fn resolve_all_in<D>(
        &self,
        table: fn(&ClassDescriptor) -> &MemberTable<D>,
        path: &mut Vec<Arc<dyn Upcast>>,
        seen: &mut HashSet<String>,
        out: &mut Vec<Resolved<D>>,
    ) where
        D: Member,
    {
        for descriptor in table(self).iter() {
            if seen.insert(descriptor.member_name().to_string()) {
                out.push(Resolved {
                    descriptor: Arc::clone(descriptor),
                    owner: self.qualified_name.clone(),
                    path: path.clone(),
                });
            }
        }
        for base in &self.bases {
            let Some(class) = base.target() else {
                continue;
            };
            path.push(Arc::clone(&base.projection));
            class.resolve_all_in(table, path, seen, out);
            path.pop();
        }
    }

    /// Find an attribute on this class or, failing that, on its bases.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<Arc<AttributeDescriptor>> {
        self.resolve_field(name).map(Resolved::into_descriptor)
    }

    /// Find a method on this class or, failing that, on its bases.
    #[must_use]
    pub fn get_method(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.resolve_method(name).map(Resolved::into_descriptor)
    }

    /// Find a property on this class or, failing that, on its bases.
    #[must_use]
    pub fn get_property(&self, key: &str) -> Option<Arc<PropertyDescriptor>> {
        self.resolve(key, |c| &c.properties)
            .map(Resolved::into_descriptor)
    }

    /// Find a signal on this class or, failing that, on its bases.
    #[must_use]
    pub fn get_signal(&self, name: &str) -> Option<Arc<SignalDescriptor>> {
        self.resolve(name, |c| &c.signals)
            .map(Resolved::into_descriptor)
    }

    /// Like [`get_field`](Self::get_field), keeping the upcast chain needed to
    /// apply the attribute to an instance of this class.
    #[must_use]
    pub fn resolve_field(&self, name: &str) -> Option<Resolved<AttributeDescriptor>> {
        self.resolve(name, |c| &c.attributes)
    }

    /// Like [`get_method`](Self::get_method), keeping the upcast chain.
    #[must_use]
    pub fn resolve_method(&self, name: &str) -> Option<Resolved<MethodDescriptor>> {
        self.resolve(name, |c| &c.methods)
    }

    /// Attributes declared by this class only.
    pub fn own_fields(&self) -> impl Iterator<Item = &Arc<AttributeDescriptor>> {
        self.attributes.iter()
    }

    /// Methods declared by this class only.
    pub fn own_methods(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.methods.iter()
    }

    /// Properties declared by this class only.
    pub fn own_properties(&self) -> impl Iterator<Item = &Arc<PropertyDescriptor>> {
        self.properties.iter()
    }

    /// Signals declared by this class only.
    pub fn own_signals(&self) -> impl Iterator<Item = &Arc<SignalDescriptor>> {
        self.signals.iter()
    }

    /// Every visible attribute: own first, then inherited, shadowed removed.
    #[must_use]
    pub fn all_fields(&self) -> Vec<Resolved<AttributeDescriptor>> {
        self.resolve_all(|c| &c.attributes)
    }

    /// Every visible method, shadowed names removed.
    #[must_use]
    pub fn all_methods(&self) -> Vec<Resolved<MethodDescriptor>> {
        self.resolve_all(|c| &c.methods)
    }

    /// Every visible property, own first.
    #[must_use]
    pub fn all_properties(&self) -> Vec<Arc<PropertyDescriptor>> {
        self.resolve_all(|c| &c.properties)
            .into_iter()
            .map(Resolved::into_descriptor)
            .collect()
    }

    /// Every visible signal. [`ObjectCore::new`](crate::ObjectCore::new)
    /// creates one [`Signal`](crate::Signal) per entry.
    #[must_use]
    pub fn all_signals(&self) -> Vec<Arc<SignalDescriptor>> {
        self.resolve_all(|c| &c.signals)
            .into_iter()
            .map(Resolved::into_descriptor)
            .collect()
    }

    // -- Construction --

    /// Own constructors, in declaration order.
    #[must_use]
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// Build an instance with the first constructor that accepts `args`.
    ///
    /// Constructors are not inherited.
    pub fn create_instance(self: &Arc<Self>, args: &[Value]) -> Result<Box<dyn Object>> {
        let constructor = self
            .constructors
            .iter()
            .find(|c| c.accepts(args))
            .ok_or_else(|| ReflectError::NoMatchingConstructor {
                class: self.qualified_name.clone(),
                arguments: args.iter().map(Value::tag).collect(),
            })?;
        let args = crate::descriptor::coerce_arguments(&self.qualified_name, &constructor.params, args)?;
        (constructor.thunk)(self, &args).map_err(|err| match err {
            ReflectError::ConstructionFailed { .. } => err,
            other => ReflectError::construction(&self.qualified_name, other),
        })
    }

    /// JSON description of the class and its own members, for tooling.
    #[must_use]
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "name": self.qualified_name,
            "namespace": self.namespace,
            "description": self.description,
            "bases": self.base_names().collect::<Vec<_>>(),
            "constructors": self.constructors.iter().map(|c| {
                c.params().iter().map(|t| t.name()).collect::<Vec<_>>()
            }).collect::<Vec<_>>(),
            "attributes": self.attributes.iter().map(|a| json!({
                "name": a.name(),
                "type": a.type_tag(),
                "default": a.default_value().to_text(),
                "access": a.access(),
                "description": a.description(),
                "annotation": a.annotation(),
            })).collect::<Vec<_>>(),
            "methods": self.methods.iter().map(|m| json!({
                "name": m.name(),
                "params": m.params(),
                "returns": m.returns(),
                "description": m.description(),
            })).collect::<Vec<_>>(),
            "properties": self.properties.iter().map(|p| json!({
                "key": p.key,
                "value": p.value,
            })).collect::<Vec<_>>(),
            "signals": self.signals.iter().map(|s| json!({
                "name": s.name,
                "params": s.params,
            })).collect::<Vec<_>>(),
        })
    }

    /// Parameter lists of every constructor, for diagnostics.
    #[must_use]
    pub fn constructor_signatures(&self) -> Vec<Vec<TypeTag>> {
        self.constructors.iter().map(|c| c.params.clone()).collect()
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("qualified_name", &self.qualified_name)
            .field("bases", &self.base_names().collect::<Vec<_>>())
            .field("attributes", &self.attributes.entries.len())
            .field("methods", &self.methods.entries.len())
            .field("properties", &self.properties.entries.len())
            .field("signals", &self.signals.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ClassBuilder;
    use crate::value::TypeTag;

    struct Shape;

    fn lookup(classes: &[Arc<ClassDescriptor>]) -> impl Fn(&str) -> Option<Arc<ClassDescriptor>> + '_ {
        move |name| classes.iter().find(|c| c.qualified_name() == name).cloned()
    }

    fn class(
        builder: ClassBuilder<Shape>,
        registered: &[Arc<ClassDescriptor>],
    ) -> Arc<ClassDescriptor> {
        Arc::new(ClassDescriptor::from_definition(builder.build(), lookup(registered)).unwrap())
    }

    fn tagged(name: &str, marker: &str) -> ClassBuilder<Shape> {
        ClassBuilder::<Shape>::new(name)
            .namespace("geo")
            .computed(marker, TypeTag::Int, |_| Value::Int(0))
    }

    fn up(builder: ClassBuilder<Shape>, base: &str) -> ClassBuilder<Shape> {
        builder.base::<Shape>(base, |s| s, |s| s)
    }

    #[test]
    fn test_qualified_name() {
        let c = class(ClassBuilder::<Shape>::new("Circle").namespace("geo"), &[]);
        assert_eq!(c.qualified_name(), "geo::Circle");
        let c = class(ClassBuilder::<Shape>::new("Circle"), &[]);
        assert_eq!(c.qualified_name(), "Circle");
    }

    #[test]
    fn test_multi_level_lookup_finds_grandparent_member() {
        let c = class(
            ClassBuilder::<Shape>::new("C")
                .namespace("geo")
                .method("area", &[], TypeTag::Float, |_, _| Ok(Value::Float(1.0))),
            &[],
        );
        let b = class(up(ClassBuilder::new("B").namespace("geo"), "geo::C"), &[c.clone()]);
        let a = class(up(ClassBuilder::new("A").namespace("geo"), "geo::B"), &[c.clone(), b.clone()]);

        let found = a.get_method("area").unwrap();
        let declared = c.get_method("area").unwrap();
        assert!(Arc::ptr_eq(&found, &declared));
        assert_eq!(a.resolve_method("area").unwrap().owner(), "geo::C");
    }

    #[test]
    fn test_first_declared_base_wins() {
        let b1 = class(tagged("B1", "radius"), &[]);
        let b2 = class(tagged("B2", "radius"), &[]);
        let a = class(
            up(up(ClassBuilder::new("A").namespace("geo"), "geo::B1"), "geo::B2"),
            &[b1.clone(), b2.clone()],
        );
        let found = a.get_field("radius").unwrap();
        assert!(Arc::ptr_eq(&found, &b1.get_field("radius").unwrap()));

        let reversed = class(
            up(up(ClassBuilder::new("R").namespace("geo"), "geo::B2"), "geo::B1"),
            &[b1.clone(), b2.clone()],
        );
        let found = reversed.get_field("radius").unwrap();
        assert!(Arc::ptr_eq(&found, &b2.get_field("radius").unwrap()));
    }

    #[test]
    fn test_depth_first_before_next_sibling() {
        // A: [B1, B2]; B1: [C]. C and B2 both declare `edge`; C is reached
        // first because B1's bases are searched before B2.
        let c = class(tagged("C", "edge"), &[]);
        let b1 = class(up(ClassBuilder::new("B1").namespace("geo"), "geo::C"), &[c.clone()]);
        let b2 = class(tagged("B2", "edge"), &[]);
        let a = class(
            up(up(ClassBuilder::new("A").namespace("geo"), "geo::B1"), "geo::B2"),
            &[c.clone(), b1.clone(), b2.clone()],
        );
        assert_eq!(a.resolve_field("edge").unwrap().owner(), "geo::C");
    }

    #[test]
    fn test_own_member_shadows_inherited() {
        let base = class(tagged("Base", "size"), &[]);
        let derived = class(
            up(tagged("Derived", "size"), "geo::Base"),
            &[base.clone()],
        );
        let own = derived.get_field("size").unwrap();
        assert!(!Arc::ptr_eq(&own, &base.get_field("size").unwrap()));
        assert_eq!(derived.resolve_field("size").unwrap().owner(), "geo::Derived");
        assert_eq!(derived.all_fields().len(), 1);
    }

    #[test]
    fn test_miss_is_none() {
        let base = class(tagged("Base", "size"), &[]);
        let derived = class(up(ClassBuilder::new("D").namespace("geo"), "geo::Base"), &[base]);
        assert!(derived.get_field("missing").is_none());
        assert!(derived.get_method("size").is_none());
        assert!(derived.get_property("size").is_none());
    }

    #[test]
    fn test_own_maps_hold_no_inherited_entries() {
        let base = class(tagged("Base", "size"), &[]);
        let derived = class(up(tagged("D", "depth"), "geo::Base"), &[base.clone()]);
        let own: Vec<_> = derived.own_fields().map(|a| a.name().to_string()).collect();
        assert_eq!(own, vec!["depth"]);
        let all: Vec<_> = derived
            .all_fields()
            .iter()
            .map(|r| r.descriptor().name().to_string())
            .collect();
        assert_eq!(all, vec!["depth", "size"]);
    }

    #[test]
    fn test_unknown_base_rejected() {
        let err = ClassDescriptor::from_definition(
            up(ClassBuilder::new("A"), "geo::Missing").build(),
            lookup(&[]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReflectError::UnknownBase {
                class: "A".into(),
                base: "geo::Missing".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let err = ClassDescriptor::from_definition(
            tagged("A", "x").computed("x", TypeTag::Int, |_| Value::Int(1)).build(),
            lookup(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ReflectError::DuplicateMember { .. }));
    }

    #[test]
    fn test_malformed_default_rejected() {
        let err = ClassDescriptor::from_definition(
            tagged("A", "x").default_value("seven").build(),
            lookup(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ReflectError::TypeConversion { tag: TypeTag::Int, .. }));
    }

    #[test]
    fn test_ancestors_and_is_a() {
        let root = class(ClassBuilder::new("Root").namespace("geo"), &[]);
        let left = class(up(ClassBuilder::new("L").namespace("geo"), "geo::Root"), &[root.clone()]);
        let right = class(up(ClassBuilder::new("R").namespace("geo"), "geo::Root"), &[root.clone()]);
        let diamond = class(
            up(up(ClassBuilder::new("D").namespace("geo"), "geo::L"), "geo::R"),
            &[root.clone(), left.clone(), right.clone()],
        );
        let names: Vec<_> = diamond
            .ancestors()
            .iter()
            .map(|c| c.qualified_name().to_string())
            .collect();
        assert_eq!(names, vec!["geo::L", "geo::Root", "geo::R"]);
        assert!(diamond.is_a("geo::Root"));
        assert!(diamond.is_a("geo::D"));
        assert!(!root.is_a("geo::D"));
    }

    #[test]
    fn test_dropped_base_is_skipped() {
        let base = class(tagged("Base", "size"), &[]);
        let derived = class(up(ClassBuilder::new("D").namespace("geo"), "geo::Base"), &[base.clone()]);
        assert!(derived.get_field("size").is_some());
        drop(base);
        assert!(derived.get_field("size").is_none());
        assert!(derived.bases().is_empty());
        assert_eq!(derived.base_names().collect::<Vec<_>>(), vec!["geo::Base"]);
    }

    #[test]
    fn test_relink_points_base_at_replacement() {
        let old = class(tagged("Base", "size"), &[]);
        let derived = class(up(ClassBuilder::new("D").namespace("geo"), "geo::Base"), &[old.clone()]);
        let new = class(tagged("Base", "width"), &[]);

        assert!(derived.relink(&new));
        assert!(derived.get_field("size").is_none());
        assert!(Arc::ptr_eq(&derived.get_field("width").unwrap(), &new.get_field("width").unwrap()));
        assert!(derived.is_a("geo::Base"));

        let unrelated = class(tagged("Other", "size"), &[]);
        assert!(!derived.relink(&unrelated));
    }

    #[test]
    fn test_relink_reattaches_dropped_base() {
        let derived = {
            let base = class(tagged("Base", "size"), &[]);
            class(up(ClassBuilder::new("D").namespace("geo"), "geo::Base"), &[base])
        };
        assert!(derived.bases().is_empty());
        let base = class(tagged("Base", "size"), &[]);
        derived.relink(&base);
        assert_eq!(derived.resolve_field("size").unwrap().owner(), "geo::Base");
    }

    #[test]
    fn test_describe_lists_own_members() {
        let c = class(
            tagged("Circle", "radius")
                .description("a round shape")
                .property("category", "primitive"),
            &[],
        );
        let json = c.describe();
        assert_eq!(json["name"], "geo::Circle");
        assert_eq!(json["attributes"][0]["name"], "radius");
        assert_eq!(json["attributes"][0]["type"], "int");
        assert_eq!(json["attributes"][0]["access"], "read_only");
        assert_eq!(json["properties"][0]["value"], "primitive");
    }
}
