use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};
use core::fmt;

use fm_ptr::{Ptr, PtrMut};

use crate::access::{assign_erased, clone_erased};
use crate::kind::FieldKind;
use crate::value::{CompositeValue, ScalarType};

/// Clones the value behind a field pointer into a [`CompositeValue`].
pub(crate) type CloneFn = unsafe fn(Ptr<'_>) -> CompositeValue;

/// Replaces the value behind a field pointer if the types match exactly.
pub(crate) type AssignFn = unsafe fn(PtrMut<'_>, CompositeValue) -> Result<(), CompositeValue>;

// -----------------------------------------------------------------------------
// FieldType

/// The static type of a field.
///
/// Only used to select the access strategy: the kind decides between the
/// typed fast path and the generic path, the [`TypeId`] guards the generic
/// path.
///
/// Optional fields are `Option<T>`. Their [`kind`](Self::kind) is the kind
/// of `T`, and [`elem_id`](Self::elem_id) is `T`'s id.
///
/// # Examples
///
/// ```
/// use fm_field::{FieldKind, FieldType, ScalarKind};
///
/// let ty = FieldType::optional_scalar::<u32>();
/// assert!(ty.is::<Option<u32>>());
/// assert!(ty.is_optional());
/// assert_eq!(ty.kind(), FieldKind::Scalar(ScalarKind::U32));
///
/// let ty = FieldType::array::<u8, 4>();
/// assert!(ty.is::<[u8; 4]>());
/// assert_eq!(ty.kind(), FieldKind::Array);
/// ```
#[derive(Clone, Copy)]
pub struct FieldType {
    type_id: TypeId,
    type_name: &'static str,
    elem_id: TypeId,
    elem_name: &'static str,
    kind: FieldKind,
    optional: bool,
    size: usize,
    align: usize,
    // `None` for scalar and opaque kinds.
    clone: Option<CloneFn>,
    assign: AssignFn,
}

impl FieldType {
    #[inline]
    fn build<T: Any, E: Any>(kind: FieldKind, optional: bool, clone: Option<CloneFn>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            elem_id: TypeId::of::<E>(),
            elem_name: type_name::<E>(),
            kind,
            optional,
            size: size_of::<T>(),
            align: align_of::<T>(),
            clone,
            assign: assign_erased::<T> as AssignFn,
        }
    }

    /// A scalar field of type `T`.
    pub fn scalar<T: ScalarType>() -> Self {
        Self::build::<T, T>(FieldKind::Scalar(T::KIND), false, None)
    }

    /// An optional scalar field, `Option<T>`.
    pub fn optional_scalar<T: ScalarType>() -> Self {
        Self::build::<Option<T>, T>(FieldKind::Scalar(T::KIND), true, None)
    }

    /// A nested record stored inline.
    pub fn record<T: Any + Clone>() -> Self {
        Self::build::<T, T>(FieldKind::Struct, false, Some(clone_erased::<T> as CloneFn))
    }

    /// An optional nested record, `Option<T>`.
    pub fn optional_record<T: Any + Clone>() -> Self {
        let clone = clone_erased::<Option<T>> as CloneFn;
        Self::build::<Option<T>, T>(FieldKind::Struct, true, Some(clone))
    }

    /// A sequence, `Vec<E>`.
    pub fn list<E: Any + Clone>() -> Self {
        let clone = clone_erased::<Vec<E>> as CloneFn;
        Self::build::<Vec<E>, Vec<E>>(FieldKind::List, false, Some(clone))
    }

    /// An optional sequence, `Option<Vec<E>>`.
    pub fn optional_list<E: Any + Clone>() -> Self {
        let clone = clone_erased::<Option<Vec<E>>> as CloneFn;
        Self::build::<Option<Vec<E>>, Vec<E>>(FieldKind::List, true, Some(clone))
    }

    /// A fixed-size array, `[E; N]`.
    pub fn array<E: Any + Clone, const N: usize>() -> Self {
        let clone = clone_erased::<[E; N]> as CloneFn;
        Self::build::<[E; N], [E; N]>(FieldKind::Array, false, Some(clone))
    }

    /// An optional fixed-size array, `Option<[E; N]>`.
    pub fn optional_array<E: Any + Clone, const N: usize>() -> Self {
        let clone = clone_erased::<Option<[E; N]>> as CloneFn;
        Self::build::<Option<[E; N]>, [E; N]>(FieldKind::Array, true, Some(clone))
    }

    /// Any type outside the recognized kinds.
    ///
    /// Reading such a field fails with
    /// [`UnsupportedKind`](crate::AccessError::UnsupportedKind), writing it
    /// goes through the generic path.
    pub fn opaque<T: Any>() -> Self {
        Self::build::<T, T>(FieldKind::Opaque, false, None)
    }

    /// An optional opaque type, `Option<T>`.
    pub fn optional_opaque<T: Any>() -> Self {
        Self::build::<Option<T>, T>(FieldKind::Opaque, true, None)
    }

    /// Returns the [`TypeId`] of the declared type.
    #[inline(always)]
    pub const fn id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the name of the declared type.
    #[inline(always)]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the [`TypeId`] behind the optional wrapper.
    ///
    /// Equal to [`id`](Self::id) for non-optional types.
    #[inline(always)]
    pub const fn elem_id(&self) -> TypeId {
        self.elem_id
    }

    /// Returns the type name behind the optional wrapper.
    #[inline(always)]
    pub const fn elem_name(&self) -> &'static str {
        self.elem_name
    }

    #[inline(always)]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns `true` for `Option<T>` fields.
    #[inline(always)]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns `true` if fields can be nested under this type.
    #[inline]
    pub const fn is_record(&self) -> bool {
        matches!(self.kind, FieldKind::Struct)
    }

    #[inline(always)]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Check if the given type is the declared type.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    #[inline(always)]
    pub(crate) const fn clone_fn(&self) -> Option<CloneFn> {
        self.clone
    }

    #[inline(always)]
    pub(crate) const fn assign_fn(&self) -> AssignFn {
        self.assign
    }
}

impl PartialEq for FieldType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for FieldType {}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// FieldTyped

/// Types that know their own [`FieldType`].
///
/// Implemented for every scalar and `Option<scalar>`, for `Vec<E>`, `[E; N]`
/// and their optional forms. Record types implement it by hand:
///
/// ```
/// use fm_field::{FieldType, FieldTyped};
///
/// #[derive(Clone)]
/// struct Address {
///     city: String,
/// }
///
/// impl FieldTyped for Address {
///     fn field_type() -> FieldType {
///         FieldType::record::<Self>()
///     }
/// }
///
/// assert!(Address::field_type().is_record());
/// ```
pub trait FieldTyped: Any {
    fn field_type() -> FieldType;
}

macro_rules! impl_field_typed_scalar {
    ($($variant:ident => $ty:ty,)*) => {
        $(
            impl FieldTyped for $ty {
                #[inline]
                fn field_type() -> FieldType {
                    FieldType::scalar::<$ty>()
                }
            }

            impl FieldTyped for Option<$ty> {
                #[inline]
                fn field_type() -> FieldType {
                    FieldType::optional_scalar::<$ty>()
                }
            }
        )*
    };
}

crate::for_each_scalar!(impl_field_typed_scalar);

impl<E: Any + Clone> FieldTyped for Vec<E> {
    #[inline]
    fn field_type() -> FieldType {
        FieldType::list::<E>()
    }
}

impl<E: Any + Clone> FieldTyped for Option<Vec<E>> {
    #[inline]
    fn field_type() -> FieldType {
        FieldType::optional_list::<E>()
    }
}

impl<E: Any + Clone, const N: usize> FieldTyped for [E; N] {
    #[inline]
    fn field_type() -> FieldType {
        FieldType::array::<E, N>()
    }
}

impl<E: Any + Clone, const N: usize> FieldTyped for Option<[E; N]> {
    #[inline]
    fn field_type() -> FieldType {
        FieldType::optional_array::<E, N>()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldType, FieldTyped};
    use crate::kind::{FieldKind, ScalarKind};
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::any::TypeId;

    #[derive(Clone)]
    struct Inner {
        _x: u8,
    }

    #[test]
    fn scalar_types() {
        let ty = <String as FieldTyped>::field_type();
        assert_eq!(ty.kind(), FieldKind::Scalar(ScalarKind::String));
        assert!(!ty.is_optional());
        assert_eq!(ty.size(), size_of::<String>());

        let ty = <Option<isize> as FieldTyped>::field_type();
        assert_eq!(ty.kind(), FieldKind::Scalar(ScalarKind::Isize));
        assert!(ty.is_optional());
        assert_eq!(ty.elem_id(), TypeId::of::<isize>());
    }

    #[test]
    fn composite_types() {
        let ty = FieldType::optional_record::<Inner>();
        assert!(ty.is::<Option<Inner>>());
        assert!(ty.is_record());
        assert_eq!(ty.elem_id(), TypeId::of::<Inner>());
        assert!(ty.clone_fn().is_some());

        let ty = <Option<Vec<u16>> as FieldTyped>::field_type();
        assert_eq!(ty.kind(), FieldKind::List);
        assert_eq!(ty.elem_id(), TypeId::of::<Vec<u16>>());

        let ty = <[bool; 3] as FieldTyped>::field_type();
        assert_eq!(ty.kind(), FieldKind::Array);
        assert_eq!(ty.align(), 1);
    }

    #[test]
    fn opaque_types() {
        let ty = FieldType::opaque::<char>();
        assert_eq!(ty.kind(), FieldKind::Opaque);
        assert!(ty.clone_fn().is_none());
        assert_eq!(ty, FieldType::opaque::<char>());
        assert_ne!(ty, FieldType::optional_opaque::<char>());
    }
}
