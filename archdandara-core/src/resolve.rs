//! Locating logical door attributes on components of unknown type.
//!
//! Different builds of the game name the same attribute differently, so
//! callers pass an ordered list of candidate member names. The order is the
//! tie-break: the first candidate that yields a value wins.

use crate::reflect::{MemberHandle, Reflect, ReflectError, TypeInfo, Value, ValueType};

/// Member names that have carried a door's destination scene.
pub const DESTINATION_CANDIDATES: &[&str] = &[
    "_otherSideScene",
    "otherSideScene",
    "m_otherSideScene",
    "doorDestination",
    "_destination",
    "destinationScene",
];

pub const SPAWN_FIELD: &str = "spawnID";
pub const FAKE_SPAWN_FIELD: &str = "fakeSpawnID";

/// Non-null while a player is walking into or out of the door.
pub const ENTERING_PLAYER_FIELD: &str = "_enteringPlayer";
pub const LEAVING_PLAYER_FIELD: &str = "_leavingPlayer";

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub member: MemberHandle,
    pub value: Value,
}

/// Finds the first candidate member holding a non-null value.
///
/// All candidates are tried as fields (on the concrete type and every base
/// type) before any of them is tried as a property. `None` means the
/// attribute does not exist on this object, or is unset everywhere.
pub fn resolve(object: &dyn Reflect, candidates: &[&str]) -> Option<Resolved> {
    resolve_where(object, candidates, |_| true)
}

/// [`resolve`] restricted to string-typed members. Scene names are strings,
/// so a same-named member of another type never counts as a destination.
pub fn resolve_string(object: &dyn Reflect, candidates: &[&str]) -> Option<Resolved> {
    resolve_where(object, candidates, is_string)
}

fn resolve_where(object: &dyn Reflect, candidates: &[&str], accept: fn(&ValueType) -> bool) -> Option<Resolved> {
    first_set(object, candidates, accept, TypeInfo::declared_field)
        .or_else(|| first_set(object, candidates, accept, TypeInfo::declared_property))
}

fn first_set(
    object: &dyn Reflect,
    candidates: &[&str],
    accept: fn(&ValueType) -> bool,
    lookup: fn(&TypeInfo, &str) -> Option<MemberHandle>,
) -> Option<Resolved> {
    candidates.iter().find_map(|name| {
        object
            .type_info()
            .ancestry()
            .filter_map(|t| lookup(t, name))
            .filter(|member| accept(member.ty()))
            .find_map(|member| {
                let value = object.get(&member);
                (!value.is_null()).then_some(Resolved { member, value })
            })
    })
}

fn is_string(ty: &ValueType) -> bool {
    matches!(ty, ValueType::String)
}

/// First declared field among `candidates`, whatever its current value.
pub fn find_field(object: &dyn Reflect, candidates: &[&str]) -> Option<MemberHandle> {
    let ty = object.type_info();
    candidates.iter().find_map(|name| ty.find_field(name))
}

/// First declared string field among `candidates`, whatever its current value.
pub fn find_string_field(object: &dyn Reflect, candidates: &[&str]) -> Option<MemberHandle> {
    let ty = object.type_info();
    candidates
        .iter()
        .filter_map(|name| ty.find_field(name))
        .find(|member| is_string(member.ty()))
}

/// Converts `input` to the member's declared type and assigns it.
///
/// Strings naming an enum member are parsed into that member; a string that
/// is not a defined member is rejected and nothing is written.
pub fn write(
    object: &mut dyn Reflect,
    member: &MemberHandle,
    input: impl Into<Value>,
) -> Result<(), ReflectError> {
    let value = coerce(member, input.into())?;
    object.set(member, value)
}

pub fn coerce(member: &MemberHandle, value: Value) -> Result<Value, ReflectError> {
    if value.conforms_to(member.ty()) {
        return Ok(value);
    }

    let text = match value {
        Value::Str(text) => text,
        Value::Int(i) if matches!(member.ty(), ValueType::Float) => return Ok(Value::Float(i as f64)),
        Value::Int(i) => {
            if let ValueType::Enum(e) = member.ty() {
                if let Some(parsed) = e.from_value(i) {
                    return Ok(parsed);
                }
            }
            return Err(mismatch(member, &Value::Int(i)));
        }
        other => return Err(mismatch(member, &other)),
    };

    let coerce_err = |text: &str| ReflectError::Coerce {
        member: member.name().to_string(),
        value: text.to_string(),
        expected: member.ty().to_string(),
    };

    match member.ty() {
        ValueType::String => Ok(Value::Str(text)),
        ValueType::Enum(e) => e.parse(&text).ok_or_else(|| ReflectError::UndefinedEnumMember {
            enum_name: e.name().to_string(),
            value: text.clone(),
        }),
        ValueType::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(coerce_err(&text))
            }
        }
        ValueType::Int => text.trim().parse().map(Value::Int).map_err(|_| coerce_err(&text)),
        ValueType::Float => text.trim().parse().map(Value::Float).map_err(|_| coerce_err(&text)),
        ValueType::Object => Err(coerce_err(&text)),
    }
}

fn mismatch(member: &MemberHandle, value: &Value) -> ReflectError {
    ReflectError::TypeMismatch {
        member: member.name().to_string(),
        value: format!("{value:?}"),
        expected: member.ty().to_string(),
    }
}
