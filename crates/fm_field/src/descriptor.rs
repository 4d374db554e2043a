use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};

use crate::error::AccessError;
use crate::tag::StructTag;
use crate::tree::FieldId;
use crate::ty::FieldType;

// -----------------------------------------------------------------------------
// FieldSpec

/// Everything a builder knows about one field before it enters a tree.
///
/// Usually created with [`field_spec!`](crate::field_spec), which computes
/// the offset and checks the field type at compile time.
///
/// # Examples
///
/// ```
/// use fm_field::{FieldSpec, StructTag, field_spec};
///
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// let spec: FieldSpec = field_spec!(User, name: String)
///     .with_tag(r#"json:"name""#)
///     .with_index([1]);
///
/// assert_eq!(spec.name(), "name");
/// assert_eq!(spec.tag(), &StructTag::new(r#"json:"name""#));
/// ```
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: Box<str>,
    scope: Box<str>,
    ty: FieldType,
    tag: StructTag,
    offset: usize,
    index: Vec<usize>,
    anonymous: bool,
    owner_id: TypeId,
    owner_name: &'static str,
}

impl FieldSpec {
    /// Creates a spec for the field `name` of `Owner`, stored at byte `offset`.
    ///
    /// # Safety
    ///
    /// `Owner` must have a field at `offset` whose type is exactly the one
    /// described by `ty`. Descriptors built from this spec read and write
    /// that memory without further checks.
    #[expect(unsafe_code, reason = "The caller vouches for the field layout.")]
    pub unsafe fn new<Owner: Any>(name: impl Into<Box<str>>, offset: usize, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            scope: Box::default(),
            ty,
            tag: StructTag::empty(),
            offset,
            index: Vec::new(),
            anonymous: false,
            owner_id: TypeId::of::<Owner>(),
            owner_name: type_name::<Owner>(),
        }
    }

    /// Sets the declaring scope. An empty scope marks an exported field.
    pub fn with_scope(mut self, scope: impl Into<Box<str>>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<StructTag>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Sets the index path from the root record down to this field.
    pub fn with_index(mut self, index: impl Into<Vec<usize>>) -> Self {
        self.index = index.into();
        self
    }

    /// Marks the field as embedded.
    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    #[inline]
    pub fn tag(&self) -> &StructTag {
        &self.tag
    }

    #[inline]
    pub fn owner_id(&self) -> TypeId {
        self.owner_id
    }

    #[inline]
    pub fn owner_name(&self) -> &'static str {
        self.owner_name
    }
}

/// Creates a [`FieldSpec`] for a named field of a record.
///
/// The offset comes from [`offset_of!`](core::mem::offset_of) and the field
/// type is checked at compile time, so this is the safe way to describe a
/// field.
///
/// - `field_spec!(Owner, field: Type)` takes the [`FieldType`] from
///   [`FieldTyped`](crate::FieldTyped).
/// - `field_spec!(Owner, field: Type => expr)` uses an explicit
///   [`FieldType`], which must describe `Type` exactly (checked at runtime).
///
/// ```
/// use fm_field::{FieldKind, FieldType, field_spec};
///
/// #[derive(Clone)]
/// struct Point { x: i32, y: i32 }
///
/// struct Shape {
///     origin: Point,
///     tags: Vec<String>,
/// }
///
/// let origin = field_spec!(Shape, origin: Point => FieldType::record::<Point>());
/// let tags = field_spec!(Shape, tags: Vec<String>);
///
/// assert_eq!(origin.ty().kind(), FieldKind::Struct);
/// assert_eq!(tags.ty().kind(), FieldKind::List);
/// ```
///
/// A wrong field type does not compile:
///
/// ```compile_fail
/// use fm_field::field_spec;
///
/// struct User { id: u64 }
///
/// let spec = field_spec!(User, id: u32);
/// ```
#[macro_export]
macro_rules! field_spec {
    ($owner:ty, $field:ident : $fty:ty) => {
        $crate::field_spec!($owner, $field: $fty => <$fty as $crate::FieldTyped>::field_type())
    };
    ($owner:ty, $field:ident : $fty:ty => $ty:expr) => {{
        let _: fn(&$owner) -> &$fty = |record| &record.$field;
        let ty: $crate::FieldType = $ty;
        assert!(
            ty.is::<$fty>(),
            "field type `{}` does not describe `{}`",
            ty.type_name(),
            ::core::any::type_name::<$fty>(),
        );
        #[allow(unsafe_code)]
        // SAFETY: The offset comes from `offset_of!` and the type was checked above.
        let spec = unsafe {
            $crate::FieldSpec::new::<$owner>(
                ::core::stringify!($field),
                $crate::__macro_exports::offset_of!($owner, $field),
                ty,
            )
        };
        spec
    }};
}

// -----------------------------------------------------------------------------
// FieldDescriptor

/// Immutable metadata and accessor for one field of a record type.
///
/// A descriptor is built once and then only read. [`get`](Self::get) and
/// [`set`](Self::set) touch the record passed to them, never the descriptor,
/// so a descriptor can be shared freely between threads.
///
/// Nested fields are created by a [`FieldTree`](crate::FieldTree), which
/// also fills in the parent link and the struct path.
///
/// # Examples
///
/// ```
/// use fm_field::{FieldDescriptor, FieldValue, field_spec};
///
/// struct Config {
///     port: u16,
///     host: Option<String>,
/// }
///
/// let port = FieldDescriptor::new(field_spec!(Config, port: u16));
/// let mut config = Config { port: 80, host: None };
///
/// port.set(&mut config, 8080u16).unwrap();
/// assert_eq!(config.port, 8080);
/// assert_eq!(port.get(&config).unwrap().into_scalar::<u16>(), Some(8080));
/// ```
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: Box<str>,
    scope: Box<str>,
    ty: FieldType,
    tag: StructTag,
    offset: usize,
    index: Box<[usize]>,
    anonymous: bool,
    owner_id: TypeId,
    owner_name: &'static str,
    parent: Option<FieldId>,
    struct_path: Box<str>,
    // `None` once an optional record sits between the root and this field.
    root_offset: Option<usize>,
}

impl FieldDescriptor {
    /// Creates a descriptor for a top-level field.
    pub fn new(spec: FieldSpec) -> Self {
        Self::from_spec(spec, None)
    }

    pub(crate) fn from_spec(spec: FieldSpec, parent: Option<(FieldId, &FieldDescriptor)>) -> Self {
        let FieldSpec {
            name,
            scope,
            ty,
            tag,
            offset,
            index,
            anonymous,
            owner_id,
            owner_name,
        } = spec;

        let (parent, struct_path, root_offset) = match parent {
            None => (None, name.clone(), Some(offset)),
            Some((id, p)) => {
                let struct_path = format!("{}.{}", p.struct_path, name).into_boxed_str();
                let root_offset = match p.root_offset {
                    Some(base) if !p.ty.is_optional() => Some(base + offset),
                    _ => None,
                };
                (Some(id), struct_path, root_offset)
            }
        };

        Self {
            name,
            scope,
            ty,
            tag,
            offset,
            index: index.into_boxed_slice(),
            anonymous,
            owner_id,
            owner_name,
            parent,
            struct_path,
            root_offset,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declaring scope, empty for exported fields.
    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[inline]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    #[inline]
    pub fn tag(&self) -> &StructTag {
        &self.tag
    }

    /// Returns the byte offset inside the immediately enclosing record.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the index path from the root record down to this field.
    #[inline]
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    #[inline]
    pub fn is_exported(&self) -> bool {
        self.scope.is_empty()
    }

    /// Returns the enclosing field, if any.
    #[inline]
    pub fn parent_id(&self) -> Option<FieldId> {
        self.parent
    }

    /// Returns the dotted field-name path from the root record.
    #[inline]
    pub fn struct_path(&self) -> &str {
        &self.struct_path
    }

    /// Returns the [`TypeId`] of the record this field is declared in.
    #[inline]
    pub fn owner_id(&self) -> TypeId {
        self.owner_id
    }

    #[inline]
    pub fn owner_name(&self) -> &'static str {
        self.owner_name
    }

    /// Returns the byte offset from the root record.
    ///
    /// `None` if an optional record lies on the way, since the field is then
    /// not stored inline.
    #[inline]
    pub fn root_offset(&self) -> Option<usize> {
        self.root_offset
    }

    /// Returns the leading segment of this field's `key` tag, if non-empty.
    #[inline]
    pub fn tag_name(&self, key: &str) -> Option<Cow<'_, str>> {
        self.tag.name(key)
    }

    // -------------------------------------------------------------------------
    // Error helpers

    pub(crate) fn check_owner<R: Any>(&self) -> Result<(), AccessError> {
        if self.owner_id == TypeId::of::<R>() {
            Ok(())
        } else {
            Err(self.owner_mismatch(self.owner_name, type_name::<R>()))
        }
    }

    pub(crate) fn check_type<T: Any>(&self) -> Result<(), AccessError> {
        if self.ty.is::<T>() {
            Ok(())
        } else {
            Err(self.type_mismatch(type_name::<T>().into()))
        }
    }

    pub(crate) fn owner_mismatch(
        &self,
        expected: &'static str,
        found: &'static str,
    ) -> AccessError {
        AccessError::OwnerMismatch {
            field: self.struct_path.clone(),
            expected,
            found,
        }
    }

    #[cold]
    pub(crate) fn unsupported_kind(&self) -> AccessError {
        log::debug!(
            "cannot read field `{}`: kind {} of `{}` is unsupported",
            self.struct_path,
            self.ty.kind(),
            self.ty.type_name(),
        );
        AccessError::UnsupportedKind {
            field: self.struct_path.clone(),
            kind: self.ty.kind(),
            type_name: self.ty.type_name(),
        }
    }

    #[cold]
    pub(crate) fn type_mismatch(&self, found: String) -> AccessError {
        log::debug!(
            "type mismatch on field `{}`: expected `{}`, found `{found}`",
            self.struct_path,
            self.ty.type_name(),
        );
        AccessError::TypeMismatch {
            field: self.struct_path.clone(),
            expected: self.ty.type_name(),
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldDescriptor, FieldSpec};
    use crate::ty::FieldType;
    use crate::{FieldKind, FieldValue, ScalarKind};
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::any::TypeId;
    use core::mem::offset_of;

    #[expect(dead_code, reason = "only the layout is used")]
    struct Account {
        id: u64,
        email: String,
        nickname: Option<String>,
    }

    #[test]
    fn spec_from_macro() {
        let spec = field_spec!(Account, nickname: Option<String>)
            .with_scope("accounts")
            .with_tag(r#"json:"nick""#)
            .with_index([2])
            .with_anonymous(true);

        let desc = FieldDescriptor::new(spec);
        assert_eq!(desc.name(), "nickname");
        assert_eq!(desc.scope(), "accounts");
        assert!(!desc.is_exported());
        assert!(desc.is_anonymous());
        assert_eq!(desc.offset(), offset_of!(Account, nickname));
        assert_eq!(desc.index(), &[2]);
        assert_eq!(desc.ty().kind(), FieldKind::Scalar(ScalarKind::String));
        assert!(desc.ty().is_optional());
        assert_eq!(desc.owner_id(), TypeId::of::<Account>());
        assert_eq!(desc.tag_name("json").as_deref(), Some("nick"));
    }

    #[test]
    fn top_level_paths() {
        let desc = FieldDescriptor::new(field_spec!(Account, email: String));
        assert_eq!(desc.struct_path(), "email");
        assert_eq!(desc.parent_id(), None);
        assert_eq!(desc.root_offset(), Some(offset_of!(Account, email)));
        assert!(desc.is_exported());
    }

    #[test]
    fn macro_spec_drives_access() {
        #[derive(Default)]
        struct Settings {
            port: u16,
            tags: Vec<String>,
        }

        let port = FieldDescriptor::new(field_spec!(Settings, port: u16));
        let tags = FieldDescriptor::new(field_spec!(Settings, tags: Vec<String>));
        let mut settings = Settings::default();

        port.set(&mut settings, 8080u16).unwrap();
        tags.set(&mut settings, FieldValue::composite(vec![String::from("a")]))
            .unwrap();

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.tags, ["a"]);
        let value = port.get(&settings).unwrap();
        assert_eq!(value.into_scalar::<u16>(), Some(8080));
    }

    #[test]
    #[should_panic(expected = "does not describe")]
    fn macro_rejects_wrong_field_type() {
        let _ = field_spec!(Account, id: u64 => FieldType::scalar::<i64>());
    }

    #[test]
    fn owner_check() {
        let desc = FieldDescriptor::new(field_spec!(Account, id: u64));
        assert!(desc.check_owner::<Account>().is_ok());
        assert!(desc.check_owner::<u64>().is_err());
        assert!(desc.check_type::<u64>().is_ok());
        assert!(desc.check_type::<i64>().is_err());
    }

    #[test]
    fn send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FieldSpec>();
        assert_send_sync::<FieldDescriptor>();
    }
}
