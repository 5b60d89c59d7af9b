//! Runtime type metadata for components the mod cannot name at compile time.
//!
//! The game's own classes are only visible through the host adapter, so every
//! live component is handled as a [`Reflect`] object: it reports a
//! [`TypeInfo`] (name, base type, declared fields and properties) and reads or
//! writes members through [`MemberHandle`]s obtained from that metadata.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReflectError {
    #[error("'{value}' is not a defined member of enum {enum_name}")]
    UndefinedEnumMember { enum_name: String, value: String },

    #[error("cannot convert '{value}' to {expected} for member {member}")]
    Coerce {
        member: String,
        value: String,
        expected: String,
    },

    #[error("value {value} does not match declared type {expected} of member {member}")]
    TypeMismatch {
        member: String,
        value: String,
        expected: String,
    },

    #[error("property {member} on {type_name} is read-only")]
    ReadOnly { type_name: String, member: String },

    #[error("type {type_name} has no member named {member}")]
    UnknownMember { type_name: String, member: String },
}

/// Closed set of named values, e.g. the game's spawn point identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    members: Vec<(String, i64)>,
}

impl EnumType {
    /// Members are numbered from zero in declaration order.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members
            .into_iter()
            .enumerate()
            .map(|(idx, m)| (m.into(), idx as i64))
            .collect();
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }

    /// Exact, case-sensitive name lookup.
    pub fn is_defined(&self, member: &str) -> bool {
        self.members.iter().any(|(name, _)| name == member)
    }

    pub fn parse(&self, member: &str) -> Option<Value> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(name, value)| Value::Enum {
                type_name: self.name.clone(),
                member: name.clone(),
                value: *value,
            })
    }

    pub fn from_value(&self, value: i64) -> Option<Value> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, v)| Value::Enum {
                type_name: self.name.clone(),
                member: name.clone(),
                value: *v,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    String,
    Bool,
    Int,
    Float,
    Enum(Arc<EnumType>),
    Object,
}

impl ValueType {
    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Object)
    }

    /// What an unassigned member of this type reads as. Enums start at the
    /// member numbered zero, or the first member when none is.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::String | ValueType::Object => Value::Null,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Enum(e) => e
                .from_value(0)
                .or_else(|| e.members().next().and_then(|m| e.parse(m)))
                .unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => f.write_str("string"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::Enum(e) => write!(f, "enum {}", e.name()),
            ValueType::Object => f.write_str("object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Enum {
        type_name: String,
        member: String,
        value: i64,
    },
    /// Reference to another live object, identified by its name.
    Object(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value may be stored in a member declared as `ty`.
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::Null, ty) => ty.is_nullable(),
            (Value::Bool(_), ValueType::Bool) => true,
            (Value::Int(_), ValueType::Int) => true,
            (Value::Float(_), ValueType::Float) => true,
            (Value::Str(_), ValueType::String) => true,
            (Value::Enum { type_name, member, .. }, ValueType::Enum(e)) => {
                type_name == e.name() && e.is_defined(member)
            }
            (Value::Object(_), ValueType::Object) => true,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Renders the way the game's own `ToString` would: enum values by member
/// name and null as an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Enum { member, .. } => f.write_str(member),
            Value::Object(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property { writable: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub kind: MemberKind,
    pub ty: ValueType,
}

/// A member as declared on one specific type of an inheritance chain.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberHandle {
    pub declaring_type: String,
    pub decl: MemberDecl,
}

impl MemberHandle {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn ty(&self) -> &ValueType {
        &self.decl.ty
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.decl.kind, MemberKind::Property { writable: false })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    name: String,
    base: Option<Arc<TypeInfo>>,
    fields: Vec<MemberDecl>,
    properties: Vec<MemberDecl>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            fields: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: Arc<TypeInfo>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.fields.push(MemberDecl {
            name: name.into(),
            kind: MemberKind::Field,
            ty,
        });
        self
    }

    pub fn property(mut self, name: impl Into<String>, ty: ValueType, writable: bool) -> Self {
        self.properties.push(MemberDecl {
            name: name.into(),
            kind: MemberKind::Property { writable },
            ty,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<TypeInfo>> {
        self.base.as_ref()
    }

    /// This type followed by each of its base types, most derived first.
    pub fn ancestry(&self) -> impl Iterator<Item = &TypeInfo> {
        std::iter::successors(Some(self), |t| t.base.as_deref())
    }

    pub fn declared_field(&self, name: &str) -> Option<MemberHandle> {
        self.declared(&self.fields, name)
    }

    pub fn declared_property(&self, name: &str) -> Option<MemberHandle> {
        self.declared(&self.properties, name)
    }

    /// First field called `name` on this type or any base type.
    pub fn find_field(&self, name: &str) -> Option<MemberHandle> {
        self.ancestry().find_map(|t| t.declared_field(name))
    }

    pub fn find_property(&self, name: &str) -> Option<MemberHandle> {
        self.ancestry().find_map(|t| t.declared_property(name))
    }

    /// Every field across the inheritance chain, most derived first.
    pub fn all_fields(&self) -> Vec<MemberHandle> {
        self.ancestry()
            .flat_map(|t| {
                t.fields.iter().map(move |decl| MemberHandle {
                    declaring_type: t.name.clone(),
                    decl: decl.clone(),
                })
            })
            .collect()
    }

    fn declared(&self, members: &[MemberDecl], name: &str) -> Option<MemberHandle> {
        members
            .iter()
            .find(|m| m.name == name)
            .map(|decl| MemberHandle {
                declaring_type: self.name.clone(),
                decl: decl.clone(),
            })
    }
}

/// A live object whose members can be inspected by name at runtime.
///
/// The host adapter implements this for the game's components; values
/// handed to [`Reflect::set`] are already converted to the member's declared
/// type (see [`crate::resolve::write`] for the converting entry point).
pub trait Reflect {
    fn type_info(&self) -> &TypeInfo;

    /// Current value of `member`; unset members read as their type's
    /// default.
    fn get(&self, member: &MemberHandle) -> Value;

    fn set(&mut self, member: &MemberHandle, value: Value) -> Result<(), ReflectError>;
}

/// Table-backed component: member values live in a map keyed by declaring
/// type and member name.
#[derive(Debug, Clone)]
pub struct DynComponent {
    ty: Arc<TypeInfo>,
    slots: HashMap<(String, String), Value>,
}

impl DynComponent {
    pub fn new(ty: Arc<TypeInfo>) -> Self {
        Self {
            ty,
            slots: HashMap::new(),
        }
    }

    /// Sets the field (or, failing that, the property) called `name`.
    pub fn set_named(&mut self, name: &str, value: Value) -> Result<(), ReflectError> {
        let member = self
            .ty
            .find_field(name)
            .or_else(|| self.ty.find_property(name))
            .ok_or_else(|| ReflectError::UnknownMember {
                type_name: self.ty.name().to_string(),
                member: name.to_string(),
            })?;
        // Initial values bypass the read-only check.
        self.store(&member, value)
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, ReflectError> {
        self.set_named(name, value.into())?;
        Ok(self)
    }

    pub fn get_named(&self, name: &str) -> Value {
        match self.ty.find_field(name).or_else(|| self.ty.find_property(name)) {
            Some(member) => self.get(&member),
            None => Value::Null,
        }
    }

    fn store(&mut self, member: &MemberHandle, value: Value) -> Result<(), ReflectError> {
        if !value.conforms_to(member.ty()) {
            return Err(ReflectError::TypeMismatch {
                member: member.name().to_string(),
                value: format!("{value:?}"),
                expected: member.ty().to_string(),
            });
        }
        self.slots.insert(
            (member.declaring_type.clone(), member.name().to_string()),
            value,
        );
        Ok(())
    }
}

impl Reflect for DynComponent {
    fn type_info(&self) -> &TypeInfo {
        &self.ty
    }

    fn get(&self, member: &MemberHandle) -> Value {
        self.slots
            .get(&(member.declaring_type.clone(), member.name().to_string()))
            .cloned()
            .unwrap_or_else(|| member.ty().default_value())
    }

    fn set(&mut self, member: &MemberHandle, value: Value) -> Result<(), ReflectError> {
        if !member.is_writable() {
            return Err(ReflectError::ReadOnly {
                type_name: member.declaring_type.clone(),
                member: member.name().to_string(),
            });
        }
        self.store(member, value)
    }
}
