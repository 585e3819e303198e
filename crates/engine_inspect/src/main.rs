//! # engine_inspect
//!
//! Command-line view of the reflected class registry. Registers the root
//! class and a demo scene module, then answers lookups the way an editor or
//! script bridge would: by qualified name, through descriptors, dynamic
//! variables, and signals.

mod demo;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use engine_reflect::{ClassDescriptor, ClassRegistry, RegistryConfig, Value, snapshot};

#[derive(Parser)]
#[command(name = "engine_inspect", about = "Inspect the engine's reflected classes")]
struct Args {
    /// Registry configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered classes and their bases
    Classes,
    /// Print a class's schema, including inherited members
    Describe { class: String },
    /// Construct an instance and print its attributes
    Create {
        class: String,
        /// Constructor arguments, parsed against the constructor's parameter types
        args: Vec<String>,
        /// Attribute assignments applied after construction (`name=value`)
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        sets: Vec<String>,
    },
    /// Dump the whole registry as JSON
    Dump,
    /// Run the scripted scene demo
    Demo,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_inspect=info".parse()?))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RegistryConfig::default(),
    };
    debug!(?config, "registry config");
    let registry = demo::registry(config)?;

    match args.command {
        Command::Classes => {
            for name in registry.class_names() {
                let Some(class) = registry.find(&name) else {
                    continue;
                };
                let bases: Vec<&str> = class.base_names().collect();
                if bases.is_empty() {
                    println!("{name}");
                } else {
                    println!("{name} : {}", bases.join(", "));
                }
            }
        }
        Command::Describe { class } => {
            let class = find(&registry, &class)?;
            println!("{}", serde_json::to_string_pretty(&describe_with_inherited(&class))?);
        }
        Command::Create { class, args, sets } => {
            let values = constructor_arguments(&*find(&registry, &class)?, &args);
            let mut object = registry.create_instance(&class, &values)?;
            for assignment in &sets {
                let Some((name, text)) = assignment.split_once('=') else {
                    bail!("expected NAME=VALUE, got '{assignment}'");
                };
                object
                    .dynamic_variable(name.trim())
                    .with_context(|| format!("{class} has no attribute '{}'", name.trim()))?
                    .set_string(text)?;
            }
            info!(id = %object.object_id(), "instance created");
            println!("{}", serde_json::to_string_pretty(&snapshot(object.as_ref())?)?);
        }
        Command::Dump => {
            println!("{}", serde_json::to_string_pretty(&registry.describe())?);
        }
        Command::Demo => {
            let report = demo::run(&registry)?;
            info!(moves = report.moves, "demo finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<RegistryConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    RegistryConfig::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn find(registry: &ClassRegistry, name: &str) -> Result<std::sync::Arc<ClassDescriptor>> {
    registry
        .find(name)
        .with_context(|| format!("class '{name}' is not registered"))
}

/// Parse `texts` against the first constructor of matching arity whose
/// parameter types all accept them. Falls back to plain strings, which lets
/// construction report the mismatch.
fn constructor_arguments(class: &ClassDescriptor, texts: &[String]) -> Vec<Value> {
    class
        .constructor_signatures()
        .into_iter()
        .filter(|params| params.len() == texts.len())
        .find_map(|params| {
            params
                .iter()
                .zip(texts)
                .map(|(&tag, text)| Value::parse(tag, text).ok())
                .collect::<Option<Vec<_>>>()
        })
        .unwrap_or_else(|| texts.iter().map(|t| Value::String(t.clone())).collect())
}

/// The class's own schema plus every member it inherits, tagged with the
/// class that declares it.
fn describe_with_inherited(class: &ClassDescriptor) -> serde_json::Value {
    let mut description = class.describe();
    description["ancestors"] = class
        .ancestors()
        .iter()
        .map(|a| a.qualified_name().to_string())
        .collect();
    description["visible_attributes"] = class
        .all_fields()
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.descriptor().name(),
                "type": f.descriptor().type_tag(),
                "owner": f.owner(),
                "access": f.descriptor().access(),
            })
        })
        .collect();
    description["visible_methods"] = class
        .all_methods()
        .iter()
        .map(|m| serde_json::json!({ "name": m.descriptor().name(), "owner": m.owner() }))
        .collect();
    description["visible_signals"] = class
        .all_signals()
        .iter()
        .map(|s| serde_json::json!({ "name": s.name, "params": s.params }))
        .collect();
    description["visible_properties"] = class
        .all_properties()
        .iter()
        .map(|p| serde_json::json!({ "key": p.key, "value": p.value }))
        .collect();
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_arguments_follow_parameter_types() {
        let registry = demo::registry(RegistryConfig::default()).unwrap();
        let camera = registry.find("scene::Camera").unwrap();
        assert_eq!(
            constructor_arguments(&camera, &["main".into()]),
            vec![Value::String("main".into())]
        );
        let node = registry.find("scene::Node").unwrap();
        assert!(constructor_arguments(&node, &[]).is_empty());
    }

    #[test]
    fn test_unparseable_arguments_fall_back_to_strings() {
        let registry = demo::registry(RegistryConfig::default()).unwrap();
        let tracker = registry.find("scene::Tracker").unwrap();
        let values = constructor_arguments(&tracker, &["7".into()]);
        assert_eq!(values, vec![Value::String("7".into())]);
        assert!(registry.create_instance("scene::Tracker", &values).is_err());
    }

    #[test]
    fn test_describe_lists_inherited_members_with_owner() {
        let registry = demo::registry(RegistryConfig::default()).unwrap();
        let camera = registry.find("scene::Camera").unwrap();
        let description = describe_with_inherited(&camera);
        assert_eq!(description["ancestors"][0], "scene::Node");
        assert_eq!(description["ancestors"][1], "core::Object");
        let position = description["visible_attributes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["name"] == "position")
            .unwrap();
        assert_eq!(position["owner"], "scene::Node");
        assert!(
            description["visible_signals"]
                .as_array()
                .unwrap()
                .iter()
                .any(|s| s["name"] == "destroyed")
        );
    }
}
