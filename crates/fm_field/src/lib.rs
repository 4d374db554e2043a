#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Scalar table

/// Invokes `$mac` with the full `Variant => Type` table of scalar kinds.
///
/// Every per-kind item (the kind enum, the value enum, the typed accessors)
/// is generated from this single list.
macro_rules! for_each_scalar {
    ($mac:ident) => {
        $mac! {
            String => alloc::string::String,
            Isize => isize,
            I8 => i8,
            I16 => i16,
            I32 => i32,
            I64 => i64,
            Usize => usize,
            U8 => u8,
            U16 => u16,
            U32 => u32,
            U64 => u64,
            F32 => f32,
            F64 => f64,
            Bool => bool,
        }
    };
}

pub(crate) use for_each_scalar;

// -----------------------------------------------------------------------------
// Modules

mod access;
mod descriptor;
mod error;
mod kind;
mod tag;
mod tree;
mod ty;
mod value;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use descriptor::{FieldDescriptor, FieldSpec};
pub use error::{AccessError, BuildError};
pub use kind::{FieldKind, ScalarKind};
pub use tag::{StructTag, TagValue};
pub use tree::{Field, FieldId, FieldTree};
pub use ty::{FieldType, FieldTyped};
pub use value::{CompositeValue, FieldValue, Scalar, ScalarType};

#[doc(hidden)]
pub mod __macro_exports {
    pub use core::mem::offset_of;
}
