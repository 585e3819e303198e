//! Type tags and the type-erased [`Value`].
//!
//! Every reflected attribute, method parameter, and signal argument is
//! declared with one [`TypeTag`] from a closed set. A [`Value`] carries one
//! instance of a tagged type. Conversions between tags follow a small fixed
//! rule set (see [`Value::convert_to`]); there is no open-ended coercion.
//!
//! ## Canonical text
//!
//! Each value has exactly one canonical string form, produced by
//! [`Value::to_text`] and accepted by [`Value::parse`]:
//!
//! ```text
//! bool    true | false            (parse also accepts 1 | 0, any case)
//! int     -42
//! uint    42
//! float   0.25                    (finite values only)
//! string  verbatim
//! vec3    1 2.5 -3                (parse also accepts commas)
//! quat    0 0 0 1                 (x y z w)
//! unit    (empty)
//! ```

use std::fmt;

use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{ReflectError, Result};

/// The declared type of a reflected member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Unit,
    Bool,
    Int,
    UInt,
    Float,
    String,
    Vec2,
    Vec3,
    Vec4,
    Quat,
}

impl TypeTag {
    /// All tags, in declaration order.
    pub const ALL: [TypeTag; 10] = [
        TypeTag::Unit,
        TypeTag::Bool,
        TypeTag::Int,
        TypeTag::UInt,
        TypeTag::Float,
        TypeTag::String,
        TypeTag::Vec2,
        TypeTag::Vec3,
        TypeTag::Vec4,
        TypeTag::Quat,
    ];

    /// The lowercase name used in text and JSON.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TypeTag::Unit => "unit",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::UInt => "uint",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Vec2 => "vec2",
            TypeTag::Vec3 => "vec3",
            TypeTag::Vec4 => "vec4",
            TypeTag::Quat => "quat",
        }
    }

    /// Look a tag up by its [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }

    /// Number of `f32` components for vector-like tags.
    #[must_use]
    pub const fn components(self) -> Option<usize> {
        match self {
            TypeTag::Vec2 => Some(2),
            TypeTag::Vec3 => Some(3),
            TypeTag::Vec4 | TypeTag::Quat => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type-erased reflected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
}

impl Value {
    /// The tag of this value's runtime type.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Unit => TypeTag::Unit,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::UInt(_) => TypeTag::UInt,
            Value::Float(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::Vec2(_) => TypeTag::Vec2,
            Value::Vec3(_) => TypeTag::Vec3,
            Value::Vec4(_) => TypeTag::Vec4,
            Value::Quat(_) => TypeTag::Quat,
        }
    }

    /// The zero value of a tag, used when an attribute declares no default.
    #[must_use]
    pub fn zero(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Unit => Value::Unit,
            TypeTag::Bool => Value::Bool(false),
            TypeTag::Int => Value::Int(0),
            TypeTag::UInt => Value::UInt(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::String => Value::String(String::new()),
            TypeTag::Vec2 => Value::Vec2(Vec2::ZERO),
            TypeTag::Vec3 => Value::Vec3(Vec3::ZERO),
            TypeTag::Vec4 => Value::Vec4(Vec4::ZERO),
            TypeTag::Quat => Value::Quat(Quat::IDENTITY),
        }
    }

    /// Convert to `tag` under the fixed conversion rules.
    ///
    /// - identity always succeeds;
    /// - `int` and `uint` convert into each other when the value fits;
    /// - `int` and `uint` widen to `float`;
    /// - `float` narrows to `int`/`uint` only when integral and in range.
    ///
    /// Everything else returns `None`.
    #[must_use]
    pub fn convert_to(&self, tag: TypeTag) -> Option<Value> {
        if self.tag() == tag {
            return Some(self.clone());
        }
        match (self, tag) {
            (Value::Int(i), TypeTag::UInt) => u64::try_from(*i).ok().map(Value::UInt),
            (Value::UInt(u), TypeTag::Int) => i64::try_from(*u).ok().map(Value::Int),
            (Value::Int(i), TypeTag::Float) => Some(Value::Float(*i as f64)),
            (Value::UInt(u), TypeTag::Float) => Some(Value::Float(*u as f64)),
            (Value::Float(f), TypeTag::Int) => {
                // i64::MAX as f64 rounds up to 2^63, hence the strict bound.
                (f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .then(|| Value::Int(*f as i64))
            }
            (Value::Float(f), TypeTag::UInt) => {
                (f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                    .then(|| Value::UInt(*f as u64))
            }
            _ => None,
        }
    }

    /// Returns `false` if any floating-point component is infinite or NaN.
    /// Such values have no text form that parses back.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::Vec2(v) => v.is_finite(),
            Value::Vec3(v) => v.is_finite(),
            Value::Vec4(v) => v.is_finite(),
            Value::Quat(q) => q.is_finite(),
            _ => true,
        }
    }

    /// Convert to `tag`, reporting a [`ReflectError::TypeMismatch`] against
    /// `member` when the rules forbid it and a
    /// [`ReflectError::TypeConversion`] for non-finite results.
    pub fn coerce(self, tag: TypeTag, member: &str) -> Result<Value> {
        let value = if self.tag() == tag {
            self
        } else {
            self.convert_to(tag).ok_or_else(|| ReflectError::TypeMismatch {
                member: member.to_string(),
                expected: tag,
                found: self.tag(),
            })?
        };
        if !value.is_finite() {
            return Err(ReflectError::TypeConversion {
                tag,
                text: value.to_text(),
            });
        }
        Ok(value)
    }

    /// Extract a Rust value, converting first if the rules allow it.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        self.extract("value")
    }

    /// Like [`get`](Self::get), naming `member` in a mismatch. A value of the
    /// right tag that does not fit `T` is a [`ReflectError::TypeConversion`].
    pub fn extract<T: FromValue>(&self, member: &str) -> Result<T> {
        let converted = self.convert_to(T::TAG).ok_or_else(|| ReflectError::TypeMismatch {
            member: member.to_string(),
            expected: T::TAG,
            found: self.tag(),
        })?;
        T::from_value(&converted).ok_or_else(|| ReflectError::TypeConversion {
            tag: T::TAG,
            text: self.to_text(),
        })
    }

    /// The canonical text form.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Parse canonical (or leniently formatted) text as a value of `tag`.
    pub fn parse(tag: TypeTag, text: &str) -> Result<Value> {
        let fail = || ReflectError::TypeConversion {
            tag,
            text: text.to_string(),
        };
        let trimmed = text.trim();
        match tag {
            TypeTag::Unit => trimmed.is_empty().then_some(Value::Unit).ok_or_else(fail),
            TypeTag::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            TypeTag::Int => trimmed.parse().map(Value::Int).map_err(|_| fail()),
            TypeTag::UInt => trimmed.parse().map(Value::UInt).map_err(|_| fail()),
            TypeTag::Float => match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                _ => Err(fail()),
            },
            TypeTag::String => Ok(Value::String(text.to_string())),
            TypeTag::Vec2 => parse_components::<2>(trimmed)
                .map(|c| Value::Vec2(Vec2::from_array(c)))
                .ok_or_else(fail),
            TypeTag::Vec3 => parse_components::<3>(trimmed)
                .map(|c| Value::Vec3(Vec3::from_array(c)))
                .ok_or_else(fail),
            TypeTag::Vec4 => parse_components::<4>(trimmed)
                .map(|c| Value::Vec4(Vec4::from_array(c)))
                .ok_or_else(fail),
            TypeTag::Quat => parse_components::<4>(trimmed)
                .map(|c| Value::Quat(Quat::from_array(c)))
                .ok_or_else(fail),
        }
    }
}

fn parse_components<const N: usize>(text: &str) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut parts = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty());
    for slot in &mut out {
        let component: f32 = parts.next()?.parse().ok()?;
        if !component.is_finite() {
            return None;
        }
        *slot = component;
    }
    parts.next().is_none().then_some(out)
}

fn write_components(f: &mut fmt::Formatter<'_>, components: &[f32]) -> fmt::Result {
    for (i, c) in components.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Vec2(v) => write_components(f, &v.to_array()),
            Value::Vec3(v) => write_components(f, &v.to_array()),
            Value::Vec4(v) => write_components(f, &v.to_array()),
            Value::Quat(q) => write_components(f, &q.to_array()),
        }
    }
}

/// Conversion from a Rust value into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Extraction of a Rust value out of a [`Value`] of exactly [`FromValue::TAG`].
pub trait FromValue: Sized {
    /// The tag this type is reflected as.
    const TAG: TypeTag;

    /// Extract from a value already of [`Self::TAG`].
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! reflect_plain {
    ($ty:ty, $variant:ident) => {
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromValue for $ty {
            const TAG: TypeTag = TypeTag::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

reflect_plain!(bool, Bool);
reflect_plain!(i64, Int);
reflect_plain!(u64, UInt);
reflect_plain!(f64, Float);
reflect_plain!(String, String);
reflect_plain!(Vec2, Vec2);
reflect_plain!(Vec3, Vec3);
reflect_plain!(Vec4, Vec4);
reflect_plain!(Quat, Quat);

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl FromValue for i32 {
    const TAG: TypeTag = TypeTag::Int;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Value {
        Value::UInt(u64::from(self))
    }
}

impl FromValue for u32 {
    const TAG: TypeTag = TypeTag::UInt;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::UInt(u) => u32::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f32 {
    const TAG: TypeTag = TypeTag::Float;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) if f.abs() <= f64::from(f32::MAX) => Some(*f as f32),
            _ => None,
        }
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Unit
    }
}

impl FromValue for () {
    const TAG: TypeTag = TypeTag::Unit;

    fn from_value(value: &Value) -> Option<Self> {
        matches!(value, Value::Unit).then_some(())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}
