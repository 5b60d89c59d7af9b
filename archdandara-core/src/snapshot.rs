//! Recorded scenes loaded from JSON, for replaying the mod outside the game.
//!
//! A snapshot carries the enum and component types its scenes use, so a
//! file is self-contained:
//!
//! ```json
//! {
//!   "enums": [{ "name": "SpawnID", "members": ["SpawnA", "SpawnB"] }],
//!   "types": [{ "name": "Door", "base": "Interactable",
//!               "fields": [{ "name": "spawnID", "type": { "enum": "SpawnID" } }] }],
//!   "scenes": [{ "name": "Hub", "roots": [{
//!       "name": "LeftExit", "position": [1.0, 2.0, 0.0],
//!       "components": [{ "type": "Door", "values": { "spawnID": "SpawnA" } }] }] }]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::logging::MAIN;
use crate::reflect::{DynComponent, EnumType, MemberHandle, ReflectError, TypeInfo, Value, ValueType};
use crate::resolve::coerce;
use crate::world::{GameObject, Scene, SceneSet, SceneSource, Vec3};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<SnapshotError>,
    },
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to walk snapshot directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("type {0} is declared twice")]
    DuplicateType(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("type {type_name} uses unknown enum {enum_name}")]
    UnknownEnum { type_name: String, enum_name: String },
    #[error("unknown value type {ty} on {type_name}.{member}")]
    UnknownValueType {
        type_name: String,
        member: String,
        ty: String,
    },
    #[error("inheritance cycle through type {0}")]
    InheritanceCycle(String),
    #[error("{type_name} has no member {member}")]
    UnknownMember { type_name: String, member: String },
    #[error("bad value for {object}.{member}: {source}")]
    Value {
        object: String,
        member: String,
        #[source]
        source: ReflectError,
    },
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    enums: Vec<EnumSpec>,
    #[serde(default)]
    types: Vec<TypeSpec>,
    #[serde(default)]
    scenes: Vec<SceneSpec>,
}

#[derive(Debug, Deserialize)]
struct EnumSpec {
    name: String,
    members: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TypeSpec {
    name: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    fields: Vec<MemberSpec>,
    #[serde(default)]
    properties: Vec<MemberSpec>,
}

#[derive(Debug, Deserialize)]
struct MemberSpec {
    name: String,
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default = "default_true")]
    writable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeRef {
    Named(String),
    Enum {
        #[serde(rename = "enum")]
        name: String,
    },
}

#[derive(Debug, Deserialize)]
struct SceneSpec {
    name: String,
    #[serde(default = "default_true")]
    valid: bool,
    #[serde(default)]
    roots: Vec<ObjectSpec>,
}

#[derive(Debug, Deserialize)]
struct ObjectSpec {
    name: String,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    position: [f32; 3],
    #[serde(default)]
    components: Vec<ComponentSpec>,
    #[serde(default)]
    children: Vec<ObjectSpec>,
}

#[derive(Debug, Deserialize)]
struct ComponentSpec {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    values: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

/// Scenes from one or more snapshot files.
#[derive(Default)]
pub struct SnapshotWorld {
    scenes: SceneSet,
}

impl SnapshotWorld {
    pub fn scene_names(&self) -> Vec<String> {
        self.scenes.scene_names()
    }

    /// Takes every scene of `other`; a scene already present is replaced.
    pub fn merge(&mut self, other: SnapshotWorld) {
        for scene in other.scenes.into_scenes() {
            if self.scenes.insert(scene).is_some() {
                debug!(target: MAIN, "Replaced an earlier snapshot of a scene");
            }
        }
    }
}

impl SceneSource for SnapshotWorld {
    fn scene_by_name(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.scene_by_name(name)
    }
}

pub fn parse_snapshot(text: &str) -> Result<SnapshotWorld, SnapshotError> {
    let file: SnapshotFile = serde_json::from_str(text)?;

    let enums: HashMap<String, Arc<EnumType>> = file
        .enums
        .into_iter()
        .map(|e| (e.name.clone(), Arc::new(EnumType::new(e.name, e.members))))
        .collect();
    let types = TypeTable::build(file.types, &enums)?;

    let mut scenes = SceneSet::default();
    for spec in file.scenes {
        let roots = spec
            .roots
            .into_iter()
            .map(|o| build_object(o, &types))
            .collect::<Result<Vec<_>, _>>()?;
        let mut scene = Scene::new(spec.name, roots);
        scene.valid = spec.valid;
        scenes.insert(scene);
    }
    Ok(SnapshotWorld { scenes })
}

pub fn load_snapshot(path: &Path) -> Result<SnapshotWorld, SnapshotError> {
    let text = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(&text).map_err(|e| SnapshotError::Parse {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Loads `path` if it is a file, or every `*.json` below it (sorted by
/// path) if it is a directory.
pub fn load_snapshots(path: &Path) -> Result<SnapshotWorld, SnapshotError> {
    if !path.is_dir() {
        return load_snapshot(path);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "json") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    if files.is_empty() {
        warn!(target: MAIN, "No snapshots found under {}", path.display());
    }

    let mut world = SnapshotWorld::default();
    for file in files {
        world.merge(load_snapshot(&file)?);
    }
    Ok(world)
}

/// Component types by name, with bases resolved in any declaration order.
struct TypeTable {
    built: HashMap<String, Arc<TypeInfo>>,
}

impl TypeTable {
    fn build(specs: Vec<TypeSpec>, enums: &HashMap<String, Arc<EnumType>>) -> Result<Self, SnapshotError> {
        let mut pending: HashMap<String, TypeSpec> = HashMap::new();
        for spec in specs {
            if pending.contains_key(&spec.name) {
                return Err(SnapshotError::DuplicateType(spec.name));
            }
            pending.insert(spec.name.clone(), spec);
        }

        let mut names: Vec<String> = pending.keys().cloned().collect();
        names.sort();

        let mut table = Self { built: HashMap::new() };
        let mut visiting = HashSet::new();
        for name in names {
            table.resolve(&name, &pending, enums, &mut visiting)?;
        }
        Ok(table)
    }

    fn resolve(
        &mut self,
        name: &str,
        specs: &HashMap<String, TypeSpec>,
        enums: &HashMap<String, Arc<EnumType>>,
        visiting: &mut HashSet<String>,
    ) -> Result<Arc<TypeInfo>, SnapshotError> {
        if let Some(ty) = self.built.get(name) {
            return Ok(Arc::clone(ty));
        }
        let spec = specs
            .get(name)
            .ok_or_else(|| SnapshotError::UnknownType(name.to_string()))?;
        if !visiting.insert(name.to_string()) {
            return Err(SnapshotError::InheritanceCycle(name.to_string()));
        }

        let mut info = TypeInfo::new(name);
        if let Some(base) = &spec.base {
            info = info.with_base(self.resolve(base, specs, enums, visiting)?);
        }
        for field in &spec.fields {
            info = info.field(field.name.clone(), value_type(name, field, enums)?);
        }
        for property in &spec.properties {
            info = info.property(
                property.name.clone(),
                value_type(name, property, enums)?,
                property.writable,
            );
        }

        visiting.remove(name);
        let info = Arc::new(info);
        self.built.insert(name.to_string(), Arc::clone(&info));
        Ok(info)
    }

    fn get(&self, name: &str) -> Result<Arc<TypeInfo>, SnapshotError> {
        self.built
            .get(name)
            .cloned()
            .ok_or_else(|| SnapshotError::UnknownType(name.to_string()))
    }
}

fn value_type(
    type_name: &str,
    member: &MemberSpec,
    enums: &HashMap<String, Arc<EnumType>>,
) -> Result<ValueType, SnapshotError> {
    match &member.ty {
        TypeRef::Named(ty) => match ty.as_str() {
            "string" => Ok(ValueType::String),
            "bool" => Ok(ValueType::Bool),
            "int" => Ok(ValueType::Int),
            "float" => Ok(ValueType::Float),
            "object" => Ok(ValueType::Object),
            other => Err(SnapshotError::UnknownValueType {
                type_name: type_name.to_string(),
                member: member.name.clone(),
                ty: other.to_string(),
            }),
        },
        TypeRef::Enum { name } => enums
            .get(name)
            .map(|e| ValueType::Enum(Arc::clone(e)))
            .ok_or_else(|| SnapshotError::UnknownEnum {
                type_name: type_name.to_string(),
                enum_name: name.clone(),
            }),
    }
}

fn build_object(spec: ObjectSpec, types: &TypeTable) -> Result<GameObject, SnapshotError> {
    let mut object = GameObject::new(spec.name).at(Vec3::from(spec.position));
    object.active = spec.active;

    for component in spec.components {
        let ty = types.get(&component.type_name)?;
        let mut built = DynComponent::new(Arc::clone(&ty));
        for (member_name, raw) in component.values {
            let member = ty
                .find_field(&member_name)
                .or_else(|| ty.find_property(&member_name))
                .ok_or_else(|| SnapshotError::UnknownMember {
                    type_name: ty.name().to_string(),
                    member: member_name.clone(),
                })?;
            json_value(&member, raw)
                .and_then(|v| built.set_named(&member_name, v))
                .map_err(|source| SnapshotError::Value {
                    object: object.name.clone(),
                    member: member_name.clone(),
                    source,
                })?;
        }
        object.components.push(Box::new(built));
    }

    for child in spec.children {
        object.children.push(build_object(child, types)?);
    }
    Ok(object)
}

fn json_value(member: &MemberHandle, raw: serde_json::Value) -> Result<Value, ReflectError> {
    use serde_json::Value as Json;

    let value = match raw {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        Json::String(s) if matches!(member.ty(), ValueType::Object) => Value::Object(s),
        Json::String(s) => Value::Str(s),
        other => {
            return Err(ReflectError::TypeMismatch {
                member: member.name().to_string(),
                value: other.to_string(),
                expected: member.ty().to_string(),
            })
        }
    };
    coerce(member, value)
}
