use core::fmt;

// -----------------------------------------------------------------------------
// ScalarKind

macro_rules! define_scalar_kind {
    ($($variant:ident => $ty:ty,)*) => {
        /// The closed set of scalar kinds served by the typed fast path.
        ///
        /// `Isize`/`Usize` are the platform-width integers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ScalarKind {
            $($variant,)*
        }

        impl ScalarKind {
            /// All scalar kinds, in declaration order.
            pub const ALL: &'static [ScalarKind] = &[$(ScalarKind::$variant,)*];

            /// Returns the name of this kind, e.g. `"I32"`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }

            /// Returns the [`TypeId`](core::any::TypeId) of the Rust type
            /// stored for this kind.
            pub fn type_id(self) -> core::any::TypeId {
                match self {
                    $(Self::$variant => core::any::TypeId::of::<$ty>(),)*
                }
            }
        }
    };
}

crate::for_each_scalar!(define_scalar_kind);

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

// -----------------------------------------------------------------------------
// FieldKind

/// The coarse category of a field's type, used to pick an access strategy.
///
/// For optional fields (`Option<T>`) this is the kind of `T`.
///
/// - [`Scalar`](FieldKind::Scalar): typed fast path for reads and writes.
/// - [`Struct`](FieldKind::Struct), [`List`](FieldKind::List),
///   [`Array`](FieldKind::Array): values are cloned out and assigned through the
///   generic path.
/// - [`Opaque`](FieldKind::Opaque): everything else. Reads are refused,
///   writes go through the generic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Struct,
    List,
    Array,
    Opaque,
}

impl FieldKind {
    /// Returns `true` for the scalar kinds.
    #[inline]
    pub const fn is_scalar(self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Returns `true` for kinds whose values are copied structurally.
    #[inline]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Struct | Self::List | Self::Array)
    }

    /// Returns the scalar kind, if this is one.
    #[inline]
    pub const fn as_scalar(self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<ScalarKind> for FieldKind {
    #[inline]
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => fmt::Display::fmt(kind, f),
            Self::Struct => f.pad("Struct"),
            Self::List => f.pad("List"),
            Self::Array => f.pad("Array"),
            Self::Opaque => f.pad("Opaque"),
        }
    }
}
