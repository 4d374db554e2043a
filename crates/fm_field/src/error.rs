use alloc::boxed::Box;
use alloc::string::String;

use thiserror::Error;

use crate::kind::FieldKind;
use crate::tree::FieldId;

// -----------------------------------------------------------------------------
// AccessError

/// An error returned by `get`/`set` style operations on a field.
///
/// `field` is always the struct path of the field involved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("field `{field}` of kind {kind} cannot be read (type `{type_name}`)")]
    UnsupportedKind {
        field: Box<str>,
        kind: FieldKind,
        type_name: &'static str,
    },

    #[error("type mismatch on field `{field}`: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        field: Box<str>,
        expected: &'static str,
        found: String,
    },

    #[error("field `{field}` belongs to `{expected}`, not `{found}`")]
    OwnerMismatch {
        field: Box<str>,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{field}` is not stored inline in the root record")]
    Detached { field: Box<str> },
}

// -----------------------------------------------------------------------------
// BuildError

/// An error returned when a descriptor is rejected by a
/// [`FieldTree`](crate::FieldTree).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    #[error("parent {0} is not in the tree")]
    UnknownParent(FieldId),

    #[error("parent `{parent}` of kind {kind} cannot hold fields")]
    ParentNotRecord { parent: Box<str>, kind: FieldKind },

    #[error("field `{field}` declares owner `{found}`, expected `{expected}`")]
    OwnerMismatch {
        field: Box<str>,
        expected: &'static str,
        found: &'static str,
    },

    #[error("struct path `{0}` is already taken")]
    DuplicatePath(Box<str>),
}
