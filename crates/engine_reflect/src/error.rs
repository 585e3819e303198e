//! Reflection error types.
//!
//! Lookups never produce errors: a name that no class in a hierarchy declares
//! is reported as `None`. Everything that mutates state (registration,
//! construction, attribute writes, invocation) returns a [`ReflectError`].

use std::fmt;

use crate::value::TypeTag;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReflectError>;

/// The kind of member a class declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Attribute,
    Method,
    Property,
    Signal,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Attribute => "attribute",
            MemberKind::Method => "method",
            MemberKind::Property => "property",
            MemberKind::Signal => "signal",
        };
        f.write_str(name)
    }
}

/// Errors produced by the reflection core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReflectError {
    /// A class with this qualified name is already registered.
    #[error("class '{0}' is already registered")]
    DuplicateClass(String),

    /// No class with this qualified name is registered.
    #[error("class '{0}' is not registered")]
    UnknownClass(String),

    /// A class names a base that has not been registered yet.
    #[error("class '{class}' names base '{base}', which is not registered")]
    UnknownBase { class: String, base: String },

    /// A class declares two members of the same kind with one name.
    #[error("class '{class}' declares {kind} '{member}' more than once")]
    DuplicateMember {
        class: String,
        kind: MemberKind,
        member: String,
    },

    /// A member invoked or emitted by name exists nowhere in the hierarchy.
    #[error("class '{class}' has no {kind} named '{member}'")]
    MemberNotFound {
        class: String,
        kind: MemberKind,
        member: String,
    },

    /// No constructor accepts the supplied argument list.
    #[error("class '{class}' has no constructor accepting {arguments:?}")]
    NoMatchingConstructor {
        class: String,
        arguments: Vec<TypeTag>,
    },

    /// A constructor was selected but refused to build the instance.
    #[error("construction of '{class}' failed: {reason}")]
    ConstructionFailed { class: String, reason: String },

    /// Text could not be parsed into the requested type.
    #[error("cannot convert '{text}' to {tag}")]
    TypeConversion { tag: TypeTag, text: String },

    /// A write was attempted through a read-only attribute.
    #[error("attribute '{0}' is read-only")]
    ReadOnlyViolation(String),

    /// A callable received the wrong number of arguments.
    #[error("'{member}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        member: String,
        expected: usize,
        found: usize,
    },

    /// A value's runtime type does not convert to the declared type.
    #[error("'{member}' expects {expected}, got {found}")]
    TypeMismatch {
        member: String,
        expected: TypeTag,
        found: TypeTag,
    },

    /// A thunk was handed an instance of a different Rust type than the one
    /// its class was declared on.
    #[error("'{member}' was applied to an instance that is not a {expected}")]
    InstanceMismatch {
        member: String,
        expected: &'static str,
    },

    /// A module with this name is already loaded.
    #[error("module '{0}' is already loaded")]
    DuplicateModule(String),

    /// No module with this name is loaded.
    #[error("module '{0}' is not loaded")]
    UnknownModule(String),

    /// The class is still a base of other registered classes.
    #[error("class '{class}' is still a base of {dependents:?}")]
    ClassInUse {
        class: String,
        dependents: Vec<String>,
    },
}

impl ReflectError {
    /// Build a [`ReflectError::ConstructionFailed`] from any displayable reason.
    pub fn construction(class: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ConstructionFailed {
            class: class.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for the arity/type mismatch family.
    #[must_use]
    pub fn is_arity_or_type_mismatch(&self) -> bool {
        matches!(
            self,
            ReflectError::ArityMismatch { .. } | ReflectError::TypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ReflectError::DuplicateMember {
            class: "scene::Node".into(),
            kind: MemberKind::Attribute,
            member: "position".into(),
        };
        assert_eq!(
            err.to_string(),
            "class 'scene::Node' declares attribute 'position' more than once"
        );

        let err = ReflectError::TypeConversion {
            tag: TypeTag::Int,
            text: "abc".into(),
        };
        assert_eq!(err.to_string(), "cannot convert 'abc' to int");
    }

    #[test]
    fn test_mismatch_family() {
        let arity = ReflectError::ArityMismatch {
            member: "heal".into(),
            expected: 1,
            found: 0,
        };
        let ty = ReflectError::TypeMismatch {
            member: "heal".into(),
            expected: TypeTag::Int,
            found: TypeTag::String,
        };
        assert!(arity.is_arity_or_type_mismatch());
        assert!(ty.is_arity_or_type_mismatch());
        assert!(!ReflectError::ReadOnlyViolation("id".into()).is_arity_or_type_mismatch());
    }
}
