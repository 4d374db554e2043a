#![expect(unsafe_code, reason = "Offset-based field access reinterprets record memory.")]

use core::any::{Any, TypeId, type_name};

use fm_ptr::{Ptr, PtrMut};

use crate::descriptor::FieldDescriptor;
use crate::error::AccessError;
use crate::kind::{FieldKind, ScalarKind};
use crate::tree::Field;
use crate::value::{CompositeValue, FieldValue, Scalar};

// -----------------------------------------------------------------------------
// Erased operations

/// Clones the `T` behind `ptr`.
///
/// # Safety
/// `ptr` must point to a valid, aligned `T`.
pub(crate) unsafe fn clone_erased<T: Any + Clone>(ptr: Ptr<'_>) -> CompositeValue {
    // SAFETY: guaranteed by the caller.
    CompositeValue::new(unsafe { ptr.read_cloned::<T>() })
}

/// Replaces the `T` behind `ptr` if `value` holds exactly a `T`.
///
/// # Safety
/// `ptr` must point to a valid, aligned `T`.
pub(crate) unsafe fn assign_erased<T: Any>(
    mut ptr: PtrMut<'_>,
    value: CompositeValue,
) -> Result<(), CompositeValue> {
    let value = value.downcast::<T>()?;
    // SAFETY: guaranteed by the caller.
    drop(unsafe { ptr.replace::<T>(value) });
    Ok(())
}

// -----------------------------------------------------------------------------
// Typed fast path

macro_rules! define_typed_access {
    ($($variant:ident => $ty:ty,)*) => {
        /// # Safety
        /// `ptr` must point to a valid, aligned value of the type of `kind`.
        unsafe fn read_scalar(kind: ScalarKind, ptr: Ptr<'_>) -> Scalar {
            match kind {
                // SAFETY: `kind` names the stored type.
                $(ScalarKind::$variant => Scalar::$variant(unsafe { ptr.read_cloned::<$ty>() }),)*
            }
        }

        /// # Safety
        /// `ptr` must point to a valid, aligned `Option` of the type of `kind`.
        unsafe fn read_optional(kind: ScalarKind, ptr: Ptr<'_>) -> Option<Scalar> {
            match kind {
                $(ScalarKind::$variant => {
                    // SAFETY: `kind` names the stored type.
                    unsafe { ptr.as_ref::<Option<$ty>>() }.clone().map(Scalar::$variant)
                })*
            }
        }

        /// Gives the value back if its kind is not `kind`.
        ///
        /// # Safety
        /// `ptr` must point to a valid, aligned value of the type of `kind`.
        unsafe fn write_scalar(
            kind: ScalarKind,
            ptr: PtrMut<'_>,
            value: Scalar,
        ) -> Result<(), Scalar> {
            if value.kind() != kind {
                return Err(value);
            }
            match value {
                // SAFETY: the value kind equals `kind`, which names the stored type.
                $(Scalar::$variant(v) => *unsafe { ptr.consume::<$ty>() } = v,)*
            }
            Ok(())
        }

        /// Gives the value back if it is `Some` of a kind other than `kind`.
        ///
        /// # Safety
        /// `ptr` must point to a valid, aligned `Option` of the type of `kind`.
        unsafe fn write_optional(
            kind: ScalarKind,
            ptr: PtrMut<'_>,
            value: Option<Scalar>,
        ) -> Result<(), Option<Scalar>> {
            match value {
                None => match kind {
                    // SAFETY: `kind` names the stored type.
                    $(ScalarKind::$variant => *unsafe { ptr.consume::<Option<$ty>>() } = None,)*
                },
                Some(value) if value.kind() != kind => return Err(Some(value)),
                Some(value) => match value {
                    // SAFETY: the value kind equals `kind`, which names the stored type.
                    $(Scalar::$variant(v) => *unsafe { ptr.consume::<Option<$ty>>() } = Some(v),)*
                },
            }
            Ok(())
        }
    };
}

crate::for_each_scalar!(define_typed_access);

// -----------------------------------------------------------------------------
// FieldDescriptor access

impl FieldDescriptor {
    #[inline(always)]
    fn debug_check_align(&self, addr: *const u8) {
        if cfg!(all(debug_assertions, feature = "debug")) {
            assert!(
                addr.addr().is_multiple_of(self.ty().align()),
                "field `{}` at {addr:p} is not aligned to {} for `{}`",
                self.struct_path(),
                self.ty().align(),
                self.ty().type_name(),
            );
        }
    }

    /// Reads the field stored at `ptr` (already offset).
    ///
    /// # Safety
    /// `ptr` must point to a valid value of the field type.
    pub(crate) unsafe fn read_at(&self, ptr: Ptr<'_>) -> Result<FieldValue, AccessError> {
        self.debug_check_align(ptr.as_ptr());
        let ty = self.ty();
        match ty.kind() {
            // SAFETY: the kind and the optional flag describe the stored type.
            FieldKind::Scalar(kind) if ty.is_optional() => {
                Ok(FieldValue::Optional(unsafe { read_optional(kind, ptr) }))
            }
            FieldKind::Scalar(kind) => Ok(FieldValue::Scalar(unsafe { read_scalar(kind, ptr) })),
            _ => match ty.clone_fn() {
                // SAFETY: `clone` was created for exactly the stored type.
                Some(clone) => Ok(FieldValue::Composite(unsafe { clone(ptr) })),
                None => Err(self.unsupported_kind()),
            },
        }
    }

    /// Writes `value` to the field stored at `ptr` (already offset).
    ///
    /// # Safety
    /// `ptr` must point to a valid value of the field type.
    pub(crate) unsafe fn write_at(
        &self,
        ptr: PtrMut<'_>,
        value: FieldValue,
    ) -> Result<(), AccessError> {
        self.debug_check_align(ptr.as_ptr());
        let ty = self.ty();
        let assign = ty.assign_fn();
        // SAFETY: the kind and the optional flag describe the stored type,
        // `assign` was created for exactly the stored type.
        let result = match (ty.kind(), value) {
            (FieldKind::Scalar(kind), FieldValue::Scalar(v)) if !ty.is_optional() => {
                unsafe { write_scalar(kind, ptr, v) }.map_err(FieldValue::Scalar)
            }
            (FieldKind::Scalar(kind), FieldValue::Optional(v)) if ty.is_optional() => {
                unsafe { write_optional(kind, ptr, v) }.map_err(FieldValue::Optional)
            }
            // An opaque field may be declared with a scalar type.
            (_, FieldValue::Scalar(v)) if v.kind().type_id() == ty.id() => {
                unsafe { assign(ptr, v.into_composite()) }.map_err(FieldValue::Composite)
            }
            (_, FieldValue::Composite(v)) => {
                unsafe { assign(ptr, v) }.map_err(FieldValue::Composite)
            }
            (_, other) => Err(other),
        };
        result.map_err(|rejected| self.type_mismatch(rejected.describe()))
    }

    /// Returns a pointer to the field inside `record`.
    ///
    /// # Safety
    /// `record` must point to a valid instance of the owner type.
    #[inline]
    pub unsafe fn get_ptr_unchecked<'a>(&self, record: PtrMut<'a>) -> PtrMut<'a> {
        // SAFETY: the field lies inside the owner at `offset`.
        unsafe { record.byte_add(self.offset()) }
    }

    /// Reads the field out of `record`.
    ///
    /// Scalars are copied through the typed path, records, lists and arrays
    /// are cloned. Any other kind fails with [`AccessError::UnsupportedKind`].
    ///
    /// # Safety
    /// `record` must point to a valid instance of the owner type.
    pub unsafe fn get_unchecked(&self, record: Ptr<'_>) -> Result<FieldValue, AccessError> {
        // SAFETY: the field lies inside the owner at `offset`.
        unsafe { self.read_at(record.byte_add(self.offset())) }
    }

    /// Writes `value` into the field of `record`, dropping the old value.
    ///
    /// Scalar fields take a [`FieldValue::Scalar`] (or
    /// [`FieldValue::Optional`] for optional fields) of the same kind. Any
    /// field takes a [`FieldValue::Composite`] holding exactly the field
    /// type, and a [`FieldValue::Scalar`] whose type is exactly the field
    /// type. Everything else fails with [`AccessError::TypeMismatch`] and
    /// leaves the record untouched.
    ///
    /// # Safety
    /// `record` must point to a valid instance of the owner type.
    pub unsafe fn set_unchecked(
        &self,
        record: PtrMut<'_>,
        value: FieldValue,
    ) -> Result<(), AccessError> {
        // SAFETY: the field lies inside the owner at `offset`.
        unsafe { self.write_at(record.byte_add(self.offset()), value) }
    }

    /// Reads the field out of `record`, see [`get_unchecked`](Self::get_unchecked).
    ///
    /// Fails with [`AccessError::OwnerMismatch`] if `R` is not the owner.
    pub fn get<R: Any>(&self, record: &R) -> Result<FieldValue, AccessError> {
        self.check_owner::<R>()?;
        // SAFETY: `R` is the owner type.
        unsafe { self.get_unchecked(Ptr::from_ref(record)) }
    }

    /// Writes into the field of `record`, see [`set_unchecked`](Self::set_unchecked).
    ///
    /// Fails with [`AccessError::OwnerMismatch`] if `R` is not the owner.
    pub fn set<R: Any>(
        &self,
        record: &mut R,
        value: impl Into<FieldValue>,
    ) -> Result<(), AccessError> {
        self.check_owner::<R>()?;
        // SAFETY: `R` is the owner type.
        unsafe { self.set_unchecked(PtrMut::from_mut(record), value.into()) }
    }

    /// Returns a pointer to the field storage inside `record`.
    ///
    /// Works for every kind. Fails with [`AccessError::OwnerMismatch`] if `R`
    /// is not the owner.
    pub fn get_ptr<'a, R: Any>(&self, record: &'a mut R) -> Result<PtrMut<'a>, AccessError> {
        self.check_owner::<R>()?;
        // SAFETY: `R` is the owner type.
        Ok(unsafe { self.get_ptr_unchecked(PtrMut::from_mut(record)) })
    }

    /// Borrows the field of `record` as a `T`.
    ///
    /// ```
    /// use fm_field::{FieldDescriptor, field_spec};
    ///
    /// struct Doc { title: String, pages: Vec<u32> }
    ///
    /// let pages = FieldDescriptor::new(field_spec!(Doc, pages: Vec<u32>));
    /// let mut doc = Doc { title: "a".into(), pages: vec![1] };
    ///
    /// pages.field_mut::<Doc, Vec<u32>>(&mut doc).unwrap().push(2);
    /// assert_eq!(pages.field_ref::<Doc, Vec<u32>>(&doc).unwrap(), &[1, 2]);
    /// assert!(pages.field_ref::<Doc, Vec<u64>>(&doc).is_err());
    /// ```
    pub fn field_ref<'a, R: Any, T: Any>(&self, record: &'a R) -> Result<&'a T, AccessError> {
        self.check_owner::<R>()?;
        self.check_type::<T>()?;
        // SAFETY: `R` is the owner type and `T` the field type.
        let ptr = unsafe { Ptr::from_ref(record).byte_add(self.offset()) };
        ptr.debug_assert_aligned::<T>();
        Ok(unsafe { ptr.as_ref::<T>() })
    }

    /// Mutably borrows the field of `record` as a `T`.
    pub fn field_mut<'a, R: Any, T: Any>(
        &self,
        record: &'a mut R,
    ) -> Result<&'a mut T, AccessError> {
        self.check_owner::<R>()?;
        self.check_type::<T>()?;
        // SAFETY: `R` is the owner type and `T` the field type.
        let ptr = unsafe { PtrMut::from_mut(record).byte_add(self.offset()) };
        ptr.debug_assert_aligned::<T>();
        Ok(unsafe { ptr.consume::<T>() })
    }
}

// -----------------------------------------------------------------------------
// Root access

impl Field<'_> {
    fn root_field_offset<R: Any>(&self) -> Result<usize, AccessError> {
        let tree = self.tree();
        if tree.root_id() != TypeId::of::<R>() {
            return Err(self.owner_mismatch(tree.root_name(), type_name::<R>()));
        }
        self.root_offset().ok_or_else(|| AccessError::Detached {
            field: self.struct_path().into(),
        })
    }

    /// Reads this field out of the root record of the tree.
    ///
    /// Fails with [`AccessError::Detached`] if an optional record lies
    /// between the root and the field.
    pub fn get_from_root<R: Any>(&self, root: &R) -> Result<FieldValue, AccessError> {
        let offset = self.root_field_offset::<R>()?;
        // SAFETY: `R` is the root type, every record on the way is inline.
        unsafe { self.read_at(Ptr::from_ref(root).byte_add(offset)) }
    }

    /// Writes this field inside the root record of the tree.
    pub fn set_on_root<R: Any>(
        &self,
        root: &mut R,
        value: impl Into<FieldValue>,
    ) -> Result<(), AccessError> {
        let offset = self.root_field_offset::<R>()?;
        // SAFETY: `R` is the root type, every record on the way is inline.
        unsafe { self.write_at(PtrMut::from_mut(root).byte_add(offset), value.into()) }
    }
}
