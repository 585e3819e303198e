//! A small scene module registered by the inspector, and a scripted run that
//! exercises it through the reflection API only.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use glam::{Quat, Vec3};
use serde::Serialize;
use tracing::info;

use engine_reflect::{
    ClassBuilder, ClassDefinition, ClassRegistry, ModuleDefinition, Object, ObjectCore, Reflected,
    RegistryConfig, TypeTag, Value, connect, share, snapshot,
};

pub const MODULE: &str = "scene";

pub struct Node {
    pub core: ObjectCore,
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub visible: bool,
}

impl Node {
    fn new(core: ObjectCore, name: String) -> Self {
        Self {
            core,
            name,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            visible: true,
        }
    }
}

impl Object for Node {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl Reflected for Node {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<Node>::new("Node")
            .namespace("scene")
            .description("A named transform in the scene graph.")
            .base(engine_reflect::ROOT_CLASS, |n| &n.core, |n| &mut n.core)
            .constructor(&[], |class, _| Ok(Node::new(ObjectCore::new(class), String::new())))
            .constructor(&[TypeTag::String], |class, args| {
                Ok(Node::new(ObjectCore::new(class), args[0].get()?))
            })
            .field("name", |n| &n.name, |n| &mut n.name)
            .field("position", |n| &n.position, |n| &mut n.position)
            .default_value("0 0 0")
            .field("rotation", |n| &n.rotation, |n| &mut n.rotation)
            .default_value("0 0 0 1")
            .field("visible", |n| &n.visible, |n| &mut n.visible)
            .default_value("true")
            .method("translate", &[TypeTag::Vec3], TypeTag::Vec3, |n, args| {
                n.position += args[0].get::<Vec3>()?;
                n.core.emit("moved", &[Value::Vec3(n.position)])?;
                Ok(Value::Vec3(n.position))
            })
            .method_description("move by an offset and emit `moved`")
            .signal("moved", &[TypeTag::Vec3])
            .build()
    }
}

pub struct Camera {
    pub node: Node,
    pub fov: f64,
    pub near: f64,
    pub far: f64,
}

impl Object for Camera {
    fn core(&self) -> &ObjectCore {
        self.node.core()
    }
}

impl Reflected for Camera {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<Camera>::new("Camera")
            .namespace("scene")
            .description("A perspective camera.")
            .base("scene::Node", |c| &c.node, |c| &mut c.node)
            .constructor(&[TypeTag::String], |class, args| {
                Ok(Camera {
                    node: Node::new(ObjectCore::new(class), args[0].get()?),
                    fov: 60.0,
                    near: 0.1,
                    far: 1000.0,
                })
            })
            .field("fov", |c| &c.fov, |c| &mut c.fov)
            .default_value("60")
            .annotation("range:1..179")
            .attribute_description("vertical field of view in degrees")
            .field("near", |c| &c.near, |c| &mut c.near)
            .default_value("0.1")
            .field("far", |c| &c.far, |c| &mut c.far)
            .default_value("1000")
            .method("zoom", &[TypeTag::Float], TypeTag::Float, |c, args| {
                let factor: f64 = args[0].get()?;
                if factor > 0.0 {
                    c.fov = (c.fov / factor).clamp(1.0, 179.0);
                }
                Ok(Value::Float(c.fov))
            })
            .property("category", "render")
            .build()
    }
}

pub struct Tracker {
    pub core: ObjectCore,
    pub hits: u64,
    pub last: Vec3,
}

impl Object for Tracker {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl Reflected for Tracker {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<Tracker>::new("Tracker")
            .namespace("scene")
            .description("Counts the moves of the nodes it is connected to.")
            .base(engine_reflect::ROOT_CLASS, |t| &t.core, |t| &mut t.core)
            .constructor(&[], |class, _| {
                Ok(Tracker {
                    core: ObjectCore::new(class),
                    hits: 0,
                    last: Vec3::ZERO,
                })
            })
            .field_read_only("hits", |t| &t.hits)
            .field_read_only("last", |t| &t.last)
            .method("on_moved", &[TypeTag::Vec3], TypeTag::Unit, |t, args| {
                t.last = args[0].get()?;
                t.hits += 1;
                Ok(Value::Unit)
            })
            .build()
    }
}

pub struct MeshLoader {
    pub core: ObjectCore,
}

impl Object for MeshLoader {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl Reflected for MeshLoader {
    fn class_definition() -> ClassDefinition {
        ClassBuilder::<MeshLoader>::new("MeshLoader")
            .namespace("io")
            .description("Loads meshes from disk.")
            .base(engine_reflect::ROOT_CLASS, |l| &l.core, |l| &mut l.core)
            .constructor(&[], |class, _| Ok(MeshLoader { core: ObjectCore::new(class) }))
            .method("supports", &[TypeTag::String], TypeTag::Bool, |l, args| {
                let extension: String = args[0].get()?;
                let supported = l
                    .core
                    .class()
                    .get_property("extensions")
                    .is_some_and(|p| p.value.split(',').any(|e| e.trim() == extension));
                Ok(Value::Bool(supported))
            })
            .property("category", "loader")
            .property("extensions", "obj,gltf,glb")
            .build()
    }
}

/// The scene module, bases first.
pub fn scene_module() -> ModuleDefinition {
    ModuleDefinition::new(MODULE)
        .with_type::<Node>()
        .with_type::<Camera>()
        .with_type::<Tracker>()
        .with_type::<MeshLoader>()
}

/// A registry holding the root class and the scene module.
pub fn registry(config: RegistryConfig) -> Result<ClassRegistry> {
    let registry = ClassRegistry::with_config(config);
    registry.register_type::<ObjectCore>()?;
    registry.load_module(scene_module())?;
    info!(classes = registry.len(), "scene module loaded");
    Ok(registry)
}

/// Outcome of [`run`].
#[derive(Debug, Serialize)]
pub struct Report {
    pub moves: usize,
    pub camera: BTreeMap<String, Value>,
    pub tracker: BTreeMap<String, Value>,
}

/// Move a camera around with a tracker connected to it.
pub fn run(registry: &ClassRegistry) -> Result<Report> {
    let mut camera = registry.create_instance("scene::Camera", &[Value::String("main".into())])?;
    let tracker = registry
        .create_instance("scene::Tracker", &[])?
        .downcast::<Tracker>()
        .map_err(|object| anyhow!("expected a tracker, got {object:?}"))?;
    let tracker = share(*tracker);

    connect(camera.as_ref(), "moved", &tracker, "on_moved")?;
    camera
        .dynamic_variable("fov")
        .context("camera has no fov")?
        .set_string("75")?;

    let offsets = [Vec3::X, Vec3::new(0.0, 2.0, 0.0), Vec3::new(-1.0, 0.0, 4.0)];
    for offset in offsets {
        let position = camera.invoke("translate", &[Value::Vec3(offset)])?;
        info!(%position, "camera moved");
    }

    let tracker = tracker.lock();
    Ok(Report {
        moves: offsets.len(),
        camera: snapshot(camera.as_ref())?,
        tracker: snapshot(&*tracker)?,
    })
}
