//! Small class hierarchy shared by the unit tests.
//!
//! `core::Object` <- `game::Entity` <- `game::Player`, plus `game::Listener`
//! as a signal receiver.

use std::sync::Arc;

use glam::Vec3;

use crate::builder::{ClassBuilder, ClassDefinition, Reflected};
use crate::class::ClassDescriptor;
use crate::error::{ReflectError, Result};
use crate::object::{Object, ObjectCore};
use crate::registry::ClassRegistry;
use crate::value::{TypeTag, Value};

pub struct Entity {
    pub core: ObjectCore,
    pub name: String,
    pub health: i64,
    pub position: Vec3,
}

impl Entity {
    /// An entity whose core reports `class`, which may be a derived class.
    pub fn with_class(class: &Arc<ClassDescriptor>, name: String) -> Self {
        Self {
            core: ObjectCore::new(class),
            name,
            health: 100,
            position: Vec3::Y,
        }
    }
}

impl Object for Entity {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

fn named(class: &Arc<ClassDescriptor>, args: &[Value]) -> Result<String> {
    let name: String = args[0].get()?;
    if name.is_empty() {
        return Err(ReflectError::construction(class.qualified_name(), "empty name"));
    }
    Ok(name)
}

impl Reflected for Entity {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<Entity>::new("Entity")
            .namespace("game")
            .base("core::Object", |e| &e.core, |e| &mut e.core)
            .constructor(&[], |class, _| Ok(Entity::with_class(class, String::new())))
            .constructor(&[TypeTag::String], |class, args| {
                Ok(Entity::with_class(class, named(class, args)?))
            })
            .field("name", |e| &e.name, |e| &mut e.name)
            .field("health", |e| &e.health, |e| &mut e.health)
            .default_value("100")
            .field("position", |e| &e.position, |e| &mut e.position)
            .default_value("0 1 0")
            .computed("label", TypeTag::String, |e| {
                Value::String(format!("{} [{}]", e.name, e.health))
            })
            .method("heal", &[TypeTag::Int], TypeTag::Int, |e, args| {
                e.health += args[0].get::<i64>()?;
                Ok(Value::Int(e.health))
            })
            .method("describe", &[], TypeTag::String, |e, _| {
                Ok(Value::String(format!("entity {}", e.name)))
            })
            .signal("damaged", &[TypeTag::Int])
            .signal("renamed", &[TypeTag::String])
            .build()
    }
}

pub struct Player {
    pub entity: Entity,
    pub score: u64,
    pub level: i32,
    pub speed: f32,
}

impl Player {
    fn new(entity: Entity) -> Self {
        Self {
            entity,
            score: 0,
            level: 1,
            speed: 1.5,
        }
    }
}

impl Object for Player {
    fn core(&self) -> &ObjectCore {
        self.entity.core()
    }
}

impl Reflected for Player {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<Player>::new("Player")
            .namespace("game")
            .base("game::Entity", |p| &p.entity, |p| &mut p.entity)
            .constructor(&[], |class, _| Ok(Player::new(Entity::with_class(class, String::new()))))
            .constructor(&[TypeTag::String], |class, args| {
                Ok(Player::new(Entity::with_class(class, named(class, args)?)))
            })
            .field("score", |p| &p.score, |p| &mut p.score)
            .field("level", |p| &p.level, |p| &mut p.level)
            .default_value("1")
            .field("speed", |p| &p.speed, |p| &mut p.speed)
            .default_value("1.5")
            .method("describe", &[], TypeTag::String, |p, _| {
                Ok(Value::String(format!("player {} ({} pts)", p.entity.name, p.score)))
            })
            .property("category", "actor")
            .build()
    }
}

pub struct Listener {
    pub core: ObjectCore,
    pub received: Vec<i64>,
}

impl Listener {
    pub fn create(registry: &ClassRegistry) -> Self {
        let class = registry.find("game::Listener").unwrap();
        Self {
            core: ObjectCore::new(&class),
            received: Vec::new(),
        }
    }
}

impl Object for Listener {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl Reflected for Listener {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<Listener>::new("Listener")
            .namespace("game")
            .base("core::Object", |l| &l.core, |l| &mut l.core)
            .method("on_damaged", &[TypeTag::Int], TypeTag::Unit, |l, args| {
                l.received.push(args[0].get()?);
                Ok(Value::Unit)
            })
            .method("reset", &[], TypeTag::Unit, |l, _| {
                l.received.clear();
                Ok(Value::Unit)
            })
            .build()
    }
}

pub fn registry() -> ClassRegistry {
    let registry = ClassRegistry::new();
    registry.register_type::<ObjectCore>().unwrap();
    registry.register_type::<Entity>().unwrap();
    registry.register_type::<Player>().unwrap();
    registry.register_type::<Listener>().unwrap();
    registry
}
