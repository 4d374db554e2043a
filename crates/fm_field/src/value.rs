use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use core::any::{Any, TypeId};
use core::fmt;

use serde_core::ser::{Error as _, Serialize, Serializer};

use crate::kind::ScalarKind;

// -----------------------------------------------------------------------------
// ScalarType

mod sealed {
    pub trait Sealed {}
}

/// A Rust type that belongs to the closed scalar set.
///
/// This trait is sealed: the scalar kinds are exactly the variants of
/// [`ScalarKind`], and a [`FieldType`](crate::FieldType) can only claim a scalar
/// kind through this trait.
pub trait ScalarType: sealed::Sealed + Any + Clone {
    /// The scalar kind of `Self`.
    const KIND: ScalarKind;

    /// Wraps the value into a [`Scalar`].
    fn into_scalar(self) -> Scalar;

    /// Unwraps a [`Scalar`] of kind [`KIND`](Self::KIND), or gives it back.
    fn from_scalar(scalar: Scalar) -> Result<Self, Scalar>;
}

// -----------------------------------------------------------------------------
// Scalar

macro_rules! define_scalar {
    ($($variant:ident => $ty:ty,)*) => {
        /// An owned scalar value, one variant per [`ScalarKind`].
        #[derive(Debug, Clone, PartialEq)]
        pub enum Scalar {
            $($variant($ty),)*
        }

        impl Scalar {
            /// Returns the kind of the held value.
            pub const fn kind(&self) -> ScalarKind {
                match self {
                    $(Self::$variant(_) => ScalarKind::$variant,)*
                }
            }

            /// Returns the type name of the held value.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => core::any::type_name::<$ty>(),)*
                }
            }

            /// Boxes the held value for the generic path.
            pub fn into_composite(self) -> CompositeValue {
                match self {
                    $(Self::$variant(v) => CompositeValue::new(v),)*
                }
            }
        }

        impl fmt::Display for Scalar {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant(v) => fmt::Display::fmt(v, f),)*
                }
            }
        }

        impl Serialize for Scalar {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    $(Self::$variant(v) => Serialize::serialize(v, serializer),)*
                }
            }
        }

        $(
            impl sealed::Sealed for $ty {}

            impl ScalarType for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                #[inline]
                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                #[inline]
                fn from_scalar(scalar: Scalar) -> Result<Self, Scalar> {
                    match scalar {
                        Scalar::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }

            impl From<$ty> for Scalar {
                #[inline]
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }

            impl From<$ty> for FieldValue {
                #[inline]
                fn from(value: $ty) -> Self {
                    FieldValue::Scalar(Scalar::$variant(value))
                }
            }

            impl From<Option<$ty>> for FieldValue {
                #[inline]
                fn from(value: Option<$ty>) -> Self {
                    FieldValue::Optional(value.map(Scalar::$variant))
                }
            }
        )*
    };
}

crate::for_each_scalar!(define_scalar);

impl From<&str> for FieldValue {
    #[inline]
    fn from(value: &str) -> Self {
        FieldValue::Scalar(Scalar::String(value.into()))
    }
}

// -----------------------------------------------------------------------------
// CompositeValue

/// A boxed value of any type, carried through the generic access path.
///
/// The [`TypeId`] and type name are captured at construction because the
/// box itself only exposes `dyn Any`.
pub struct CompositeValue {
    value: Box<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
}

impl CompositeValue {
    /// Boxes `value`.
    #[inline]
    pub fn new<T: Any>(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Wraps an already boxed value.
    #[inline]
    pub fn from_box<T: Any>(value: Box<T>) -> Self {
        Self {
            value,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the boxed value.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the boxed value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if the boxed value is a `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns a reference to the boxed value if it is a `T`.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the boxed value out if it is a `T`, otherwise gives `self` back.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let Self {
            value,
            type_id,
            type_name,
        } = self;
        match value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(value) => Err(Self {
                value,
                type_id,
                type_name,
            }),
        }
    }

    /// Returns the inner box.
    #[inline]
    pub fn into_box(self) -> Box<dyn Any> {
        self.value
    }
}

impl fmt::Debug for CompositeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// FieldValue

/// A value moved in or out of a field.
///
/// Scalars travel unboxed. Only values of the generic path are boxed.
///
/// # Examples
///
/// ```
/// use fm_field::{FieldValue, Scalar};
///
/// let v = FieldValue::from(7u16);
/// assert_eq!(v.as_scalar(), Some(&Scalar::U16(7)));
///
/// let v = FieldValue::from(Some(2.5f64));
/// assert_eq!(v.into_optional::<f64>(), Some(Some(2.5)));
///
/// let v = FieldValue::composite(vec![1, 2, 3]);
/// assert_eq!(v.into_composite::<Vec<i32>>(), Some(vec![1, 2, 3]));
/// ```
#[derive(Debug)]
pub enum FieldValue {
    /// The value of a scalar field.
    Scalar(Scalar),
    /// The value of an optional scalar field.
    Optional(Option<Scalar>),
    /// Any other value, checked against the field type by [`TypeId`].
    Composite(CompositeValue),
}

impl FieldValue {
    /// Boxes `value` for the generic path.
    #[inline]
    pub fn composite<T: Any>(value: T) -> Self {
        Self::Composite(CompositeValue::new(value))
    }

    /// Returns the scalar if this is [`FieldValue::Scalar`].
    #[inline]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the composite if this is [`FieldValue::Composite`].
    #[inline]
    pub fn as_composite(&self) -> Option<&CompositeValue> {
        match self {
            Self::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// Extracts a `T` from a [`FieldValue::Scalar`] of kind `T::KIND`.
    pub fn into_scalar<T: ScalarType>(self) -> Option<T> {
        match self {
            Self::Scalar(s) => T::from_scalar(s).ok(),
            _ => None,
        }
    }

    /// Extracts an `Option<T>` from a [`FieldValue::Optional`].
    pub fn into_optional<T: ScalarType>(self) -> Option<Option<T>> {
        match self {
            Self::Optional(None) => Some(None),
            Self::Optional(Some(s)) => T::from_scalar(s).ok().map(Some),
            _ => None,
        }
    }

    /// Extracts a `T` from a [`FieldValue::Composite`].
    pub fn into_composite<T: Any>(self) -> Option<T> {
        match self {
            Self::Composite(c) => c.downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Describes the held value's type, for error reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(s) => s.type_name().into(),
            Self::Optional(Some(s)) => format!("Option<{}>", s.type_name()),
            Self::Optional(None) => "Option<_>".into(),
            Self::Composite(c) => c.type_name().into(),
        }
    }
}

impl From<Scalar> for FieldValue {
    #[inline]
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<CompositeValue> for FieldValue {
    #[inline]
    fn from(value: CompositeValue) -> Self {
        Self::Composite(value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(s) => s.serialize(serializer),
            Self::Optional(None) => serializer.serialize_none(),
            Self::Optional(Some(s)) => serializer.serialize_some(s),
            Self::Composite(c) => Err(S::Error::custom(format_args!(
                "cannot serialize type-erased value of `{}`",
                c.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompositeValue, FieldValue, Scalar, ScalarType};
    use crate::kind::ScalarKind;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn scalar_conversions() {
        assert_eq!(i8::KIND, ScalarKind::I8);
        assert_eq!(String::KIND, ScalarKind::String);
        assert_eq!(true.into_scalar(), Scalar::Bool(true));
        assert_eq!(u64::from_scalar(Scalar::U64(9)), Ok(9));
        assert_eq!(u64::from_scalar(Scalar::U32(9)), Err(Scalar::U32(9)));
    }

    #[test]
    fn extractors() {
        assert_eq!(FieldValue::from("abc").into_scalar::<String>(), Some("abc".into()));
        assert_eq!(FieldValue::from(3i64).into_scalar::<i32>(), None);
        assert_eq!(FieldValue::from(None::<u8>).into_optional::<u8>(), Some(None));
        assert_eq!(FieldValue::from(1u8).into_optional::<u8>(), None);
        assert_eq!(
            FieldValue::composite([1u8, 2]).into_composite::<[u8; 2]>(),
            Some([1, 2])
        );
    }

    #[test]
    fn composite_downcast_gives_back() {
        let c = CompositeValue::new(vec![String::from("x")]);
        assert!(c.is::<Vec<String>>());
        let c = c.downcast::<Vec<u8>>().unwrap_err();
        assert_eq!(c.type_name(), core::any::type_name::<Vec<String>>());
        assert_eq!(c.downcast_ref::<Vec<String>>().map(Vec::len), Some(1));
    }

    #[test]
    fn describe() {
        assert_eq!(FieldValue::from(1.0f32).describe(), "f32");
        assert_eq!(FieldValue::from(Some(false)).describe(), "Option<bool>");
        assert_eq!(FieldValue::from(None::<i16>).describe(), "Option<_>");
    }

    #[test]
    fn display() {
        assert_eq!(Scalar::I16(-4).to_string(), "-4");
        assert_eq!(Scalar::String("hi".into()).to_string(), "hi");
    }

    #[test]
    fn serialize() {
        let json = serde_json::to_string(&FieldValue::from(42u32)).unwrap();
        assert_eq!(json, "42");

        let json = serde_json::to_string(&FieldValue::from(Some(String::from("a")))).unwrap();
        assert_eq!(json, "\"a\"");

        let json = serde_json::to_string(&FieldValue::from(None::<bool>)).unwrap();
        assert_eq!(json, "null");

        assert!(serde_json::to_string(&FieldValue::composite(vec![1u8])).is_err());
    }
}
