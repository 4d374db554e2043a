use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};
use core::fmt;
use core::ops::Deref;

use foldhash::fast::FixedState;
use hashbrown::HashMap;

use crate::descriptor::{FieldDescriptor, FieldSpec};
use crate::error::BuildError;

const PATH_HASH_STATE: FixedState = FixedState::with_seed(0x3C6E_F372_FE94_F82B);

// -----------------------------------------------------------------------------
// FieldId

/// The position of a descriptor inside its [`FieldTree`].
///
/// Only meaningful for the tree that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({})", self.0)
    }
}

// -----------------------------------------------------------------------------
// FieldTree

/// All field descriptors of one root record type.
///
/// The tree owns every descriptor. A nested field refers to its enclosing
/// field by [`FieldId`], and a parent has to be inserted before its children,
/// so the parent chain always ends at a top-level field.
///
/// Once built, the tree is only read and can be shared between threads.
///
/// # Examples
///
/// ```
/// use fm_field::{FieldTree, FieldType, FieldTyped, field_spec};
///
/// #[derive(Clone, Default)]
/// struct Meta { version: u32 }
///
/// impl FieldTyped for Meta {
///     fn field_type() -> FieldType { FieldType::record::<Self>() }
/// }
///
/// #[derive(Default)]
/// struct Package { name: String, meta: Meta }
///
/// let mut tree = FieldTree::new::<Package>();
/// let meta = tree
///     .insert(field_spec!(Package, meta: Meta).with_tag(r#"toml:"meta""#), None)
///     .unwrap();
/// let version = tree
///     .insert(field_spec!(Meta, version: u32).with_tag(r#"toml:"v""#), Some(meta))
///     .unwrap();
///
/// let version = tree.get(version).unwrap();
/// assert_eq!(version.struct_path(), "meta.version");
/// assert_eq!(version.tag_path("toml", false), "meta.v");
///
/// let mut package = Package::default();
/// version.set_on_root(&mut package, 3u32).unwrap();
/// assert_eq!(package.meta.version, 3);
/// ```
pub struct FieldTree {
    root_id: TypeId,
    root_name: &'static str,
    fields: Vec<FieldDescriptor>,
    by_path: HashMap<Box<str>, FieldId, FixedState>,
}

impl FieldTree {
    /// Creates an empty tree for the root record `Root`.
    pub fn new<Root: Any>() -> Self {
        Self {
            root_id: TypeId::of::<Root>(),
            root_name: type_name::<Root>(),
            fields: Vec::new(),
            by_path: HashMap::with_hasher(PATH_HASH_STATE),
        }
    }

    /// Adds a field below `parent`, or at the top level for `None`.
    ///
    /// The parent must already be in the tree and be a record. The spec's
    /// owner must be the root record (top level) or the parent's record type.
    pub fn insert(
        &mut self,
        spec: FieldSpec,
        parent: Option<FieldId>,
    ) -> Result<FieldId, BuildError> {
        let parent = match parent {
            None => None,
            Some(id) => {
                let Some(desc) = self.fields.get(id.0) else {
                    return reject(BuildError::UnknownParent(id));
                };
                if !desc.ty().is_record() {
                    return reject(BuildError::ParentNotRecord {
                        parent: desc.struct_path().into(),
                        kind: desc.ty().kind(),
                    });
                }
                Some((id, desc))
            }
        };

        let (owner_id, owner_name) = match parent {
            None => (self.root_id, self.root_name),
            Some((_, desc)) => (desc.ty().elem_id(), desc.ty().elem_name()),
        };
        if spec.owner_id() != owner_id {
            let field = match parent {
                None => spec.name().into(),
                Some((_, desc)) => format!("{}.{}", desc.struct_path(), spec.name()).into(),
            };
            return reject(BuildError::OwnerMismatch {
                field,
                expected: owner_name,
                found: spec.owner_name(),
            });
        }

        let desc = FieldDescriptor::from_spec(spec, parent);
        if self.by_path.contains_key(desc.struct_path()) {
            return reject(BuildError::DuplicatePath(desc.struct_path().into()));
        }

        let id = FieldId(self.fields.len());
        log::trace!(
            "{}: inserted `{}` as {id} ({})",
            self.root_name,
            desc.struct_path(),
            desc.ty().kind(),
        );
        self.by_path.insert(desc.struct_path().into(), id);
        self.fields.push(desc);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: FieldId) -> Option<Field<'_>> {
        let found = id.0 < self.fields.len();
        found.then_some(Field { tree: self, id })
    }

    /// Finds a field by its dotted struct path, e.g. `"meta.version"`.
    pub fn find(&self, struct_path: &str) -> Option<Field<'_>> {
        self.by_path
            .get(struct_path)
            .map(|&id| Field { tree: self, id })
    }

    /// Finds a field by its index path.
    pub fn find_by_index(&self, index: &[usize]) -> Option<Field<'_>> {
        self.iter().find(|f| f.index() == index)
    }

    /// Iterates over all fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Field<'_>> {
        (0..self.fields.len()).map(|i| Field {
            tree: self,
            id: FieldId(i),
        })
    }

    /// Iterates over the top-level fields.
    pub fn roots(&self) -> impl Iterator<Item = Field<'_>> {
        self.iter().filter(|f| f.parent_id().is_none())
    }

    /// Iterates over the fields directly nested in `id`.
    pub fn children(&self, id: FieldId) -> impl Iterator<Item = Field<'_>> {
        self.iter().filter(move |f| f.parent_id() == Some(id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the [`TypeId`] of the root record.
    #[inline]
    pub fn root_id(&self) -> TypeId {
        self.root_id
    }

    #[inline]
    pub fn root_name(&self) -> &'static str {
        self.root_name
    }
}

impl fmt::Debug for FieldTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTree")
            .field("root", &self.root_name)
            .field("fields", &self.fields)
            .finish()
    }
}

#[cold]
fn reject<T>(err: BuildError) -> Result<T, BuildError> {
    log::warn!("rejected field descriptor: {err}");
    Err(err)
}

// -----------------------------------------------------------------------------
// Field

/// A descriptor borrowed from its [`FieldTree`].
///
/// Derefs to [`FieldDescriptor`] and adds what needs the rest of the tree:
/// the parent link, the tag path and access through the root record.
#[derive(Clone, Copy)]
pub struct Field<'t> {
    tree: &'t FieldTree,
    id: FieldId,
}

impl<'t> Field<'t> {
    #[inline]
    pub fn id(&self) -> FieldId {
        self.id
    }

    #[inline]
    pub fn tree(&self) -> &'t FieldTree {
        self.tree
    }

    /// Returns the descriptor with the lifetime of the tree.
    #[inline]
    pub fn descriptor(&self) -> &'t FieldDescriptor {
        &self.tree.fields[self.id.0]
    }

    /// Returns the enclosing field.
    #[inline]
    pub fn parent(&self) -> Option<Field<'t>> {
        let tree = self.tree;
        self.descriptor().parent_id().map(|id| Field { tree, id })
    }

    /// Iterates from the parent up to the top-level field.
    pub fn ancestors(&self) -> impl Iterator<Item = Field<'t>> + use<'t> {
        core::iter::successors(self.parent(), Field::parent)
    }

    pub fn children(&self) -> impl Iterator<Item = Field<'t>> + use<'t> {
        self.tree.children(self.id)
    }

    /// Resolves the dotted path of `key` tag names from the top down to
    /// this field.
    ///
    /// - If this field has no non-empty name under `key`, the result is
    ///   empty whatever the ancestors hold.
    /// - A top-level field yields its own name.
    /// - Otherwise the parent's path is resolved first. If it is empty, the
    ///   result is empty, or just this field's name when
    ///   `ignore_parent_tag_missing` is set.
    ///
    /// ```
    /// use fm_field::{FieldTree, FieldType, FieldTyped, field_spec};
    ///
    /// #[derive(Clone)]
    /// struct Inner { id: u8 }
    /// impl FieldTyped for Inner {
    ///     fn field_type() -> FieldType { FieldType::record::<Self>() }
    /// }
    /// struct Outer { inner: Inner }
    ///
    /// let mut tree = FieldTree::new::<Outer>();
    /// let inner = tree.insert(field_spec!(Outer, inner: Inner), None).unwrap();
    /// let id = tree
    ///     .insert(field_spec!(Inner, id: u8).with_tag(r#"json:"id""#), Some(inner))
    ///     .unwrap();
    ///
    /// let id = tree.get(id).unwrap();
    /// assert_eq!(id.tag_path("json", false), "");
    /// assert_eq!(id.tag_path("json", true), "id");
    /// ```
    pub fn tag_path(&self, key: &str, ignore_parent_tag_missing: bool) -> String {
        let Some(name) = self.tag_name(key) else {
            return String::new();
        };
        let Some(parent) = self.parent() else {
            return name.into_owned();
        };

        let parent_path = parent.tag_path(key, ignore_parent_tag_missing);
        if !parent_path.is_empty() {
            format!("{parent_path}.{name}")
        } else if ignore_parent_tag_missing {
            name.into_owned()
        } else {
            String::new()
        }
    }
}

impl Deref for Field<'_> {
    type Target = FieldDescriptor;

    #[inline]
    fn deref(&self) -> &FieldDescriptor {
        self.descriptor()
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("struct_path", &self.struct_path())
            .field("kind", &self.ty().kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldId, FieldTree};
    use crate::{
        AccessError, BuildError, FieldKind, FieldSpec, FieldType, FieldTyped, FieldValue,
        field_spec,
    };
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::mem::offset_of;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Leaf {
        x: u32,
        label: String,
    }

    #[derive(Clone, Default)]
    struct Middle {
        flag: bool,
        leaf: Leaf,
    }

    #[derive(Default)]
    struct Root {
        id: u64,
        middle: Middle,
        extra: Option<Middle>,
        names: Vec<String>,
    }

    impl FieldTyped for Leaf {
        fn field_type() -> FieldType {
            FieldType::record::<Self>()
        }
    }

    impl FieldTyped for Middle {
        fn field_type() -> FieldType {
            FieldType::record::<Self>()
        }
    }

    struct Ids {
        middle: FieldId,
        leaf: FieldId,
        x: FieldId,
        extra: FieldId,
        extra_flag: FieldId,
    }

    /// `tag_key` is `g`/`p`/`x` on `middle`/`leaf`/`x`, only on the tags
    /// given in `tagged`.
    fn build(tagged: [bool; 3]) -> (FieldTree, Ids) {
        let tag = |on: bool, name: &str| {
            if on {
                alloc::format!(r#"json:"{name},omitempty""#)
            } else {
                String::from(r#"db:"other""#)
            }
        };

        let mut tree = FieldTree::new::<Root>();
        let mut insert = |spec: FieldSpec, parent: Option<FieldId>| {
            tree.insert(spec, parent).unwrap()
        };

        insert(field_spec!(Root, id: u64).with_index([0]), None);
        let middle = field_spec!(Root, middle: Middle)
            .with_tag(tag(tagged[0], "g"))
            .with_index([1]);
        let middle = insert(middle, None);
        let leaf = field_spec!(Middle, leaf: Leaf)
            .with_tag(tag(tagged[1], "p"))
            .with_index([1, 1]);
        let leaf = insert(leaf, Some(middle));
        let x = field_spec!(Leaf, x: u32)
            .with_tag(tag(tagged[2], "x"))
            .with_index([1, 1, 0]);
        let x = insert(x, Some(leaf));
        insert(field_spec!(Leaf, label: String), Some(leaf));

        let optional = FieldType::optional_record::<Middle>();
        let extra = insert(field_spec!(Root, extra: Option<Middle> => optional), None);
        let extra_flag = insert(field_spec!(Middle, flag: bool), Some(extra));
        insert(field_spec!(Root, names: Vec<String>), None);

        let ids = Ids {
            middle,
            leaf,
            x,
            extra,
            extra_flag,
        };
        (tree, ids)
    }

    #[test]
    fn struct_paths() {
        let (tree, ids) = build([true; 3]);
        let x = tree.get(ids.x).unwrap();
        assert_eq!(x.struct_path(), "middle.leaf.x");
        assert_eq!(tree.get(ids.leaf).unwrap().struct_path(), "middle.leaf");
        assert_eq!(tree.find("middle.leaf.x").map(|f| f.id()), Some(ids.x));
        assert_eq!(tree.find("leaf.x").map(|f| f.id()), None);
        assert_eq!(tree.find_by_index(&[1, 1, 0]).map(|f| f.id()), Some(ids.x));

        let flag = tree.find("extra.flag").unwrap();
        assert_eq!(flag.id(), ids.extra_flag);
    }

    #[test]
    fn tag_path_full_chain() {
        let (tree, ids) = build([true; 3]);
        let x = tree.get(ids.x).unwrap();
        assert_eq!(x.tag_path("json", false), "g.p.x");
        assert_eq!(x.tag_path("json", true), "g.p.x");
    }

    #[test]
    fn tag_path_leaf_missing() {
        let (tree, ids) = build([true, true, false]);
        let x = tree.get(ids.x).unwrap();
        assert_eq!(x.tag_path("json", true), "");
        assert_eq!(x.tag_path("json", false), "");
        assert_eq!(x.tag_path("yaml", true), "");
    }

    #[test]
    fn tag_path_parent_missing() {
        let (tree, ids) = build([true, false, true]);
        let x = tree.get(ids.x).unwrap();
        assert_eq!(x.tag_path("json", false), "");
        assert_eq!(x.tag_path("json", true), "x");

        let (tree, ids) = build([false, true, true]);
        let x = tree.get(ids.x).unwrap();
        assert_eq!(x.tag_path("json", false), "");
        assert_eq!(x.tag_path("json", true), "p.x");
    }

    #[test]
    fn tag_path_empty_name_counts_as_missing() {
        let mut tree = FieldTree::new::<Root>();
        let middle = field_spec!(Root, middle: Middle).with_tag(r#"json:",omitempty""#);
        let middle = tree.insert(middle, None).unwrap();
        let flag = field_spec!(Middle, flag: bool).with_tag(r#"json:"f""#);
        let flag = tree.insert(flag, Some(middle)).unwrap();

        let flag = tree.get(flag).unwrap();
        assert_eq!(tree.get(middle).unwrap().tag_path("json", true), "");
        assert_eq!(flag.tag_path("json", false), "");
        assert_eq!(flag.tag_path("json", true), "f");
    }

    #[test]
    fn navigation() {
        let (tree, ids) = build([true; 3]);
        let x = tree.get(ids.x).unwrap();

        let up: Vec<_> = x.ancestors().map(|f| f.id()).collect();
        assert_eq!(up, [ids.leaf, ids.middle]);

        let names: Vec<&str> = tree.roots().map(|f| f.descriptor().name()).collect();
        assert_eq!(names, ["id", "middle", "extra", "names"]);

        let leaf = tree.get(ids.leaf).unwrap();
        assert_eq!(leaf.children().count(), 2);
        assert_eq!(tree.len(), 8);
        assert!(!tree.is_empty());
        assert!(tree.get(FieldId(8)).is_none());
    }

    #[test]
    fn root_offsets() {
        let (tree, ids) = build([true; 3]);
        let x = tree.get(ids.x).unwrap();
        assert_eq!(x.offset(), offset_of!(Leaf, x));
        assert_eq!(
            x.root_offset(),
            Some(offset_of!(Root, middle) + offset_of!(Middle, leaf) + offset_of!(Leaf, x))
        );

        let extra = tree.get(ids.extra).unwrap();
        assert_eq!(extra.root_offset(), Some(offset_of!(Root, extra)));
        assert_eq!(tree.get(ids.extra_flag).unwrap().root_offset(), None);
    }

    #[test]
    fn access_through_root() {
        let (tree, ids) = build([true; 3]);
        let mut root = Root::default();

        let x = tree.get(ids.x).unwrap();
        x.set_on_root(&mut root, 17u32).unwrap();
        assert_eq!(root.middle.leaf.x, 17);
        let value = x.get_from_root(&root).unwrap();
        assert_eq!(value.into_scalar::<u32>(), Some(17));

        let label = tree.find("middle.leaf.label").unwrap();
        label.set_on_root(&mut root, "leaf").unwrap();
        assert_eq!(root.middle.leaf.label, "leaf");

        // The descriptor itself works on the immediately enclosing record.
        let value = x.get(&root.middle.leaf).unwrap();
        assert_eq!(value.into_scalar::<u32>(), Some(17));

        let leaf = tree.get(ids.leaf).unwrap();
        let copy = leaf.get_from_root(&root).unwrap();
        assert_eq!(copy.into_composite::<Leaf>(), Some(root.middle.leaf.clone()));

        let names = tree.find("names").unwrap();
        let value = FieldValue::composite(alloc::vec![String::from("a")]);
        names.set_on_root(&mut root, value).unwrap();
        assert_eq!(root.names, ["a"]);
    }

    #[test]
    fn access_through_root_fails() {
        let (tree, ids) = build([true; 3]);
        let mut root = Root::default();

        let flag = tree.get(ids.extra_flag).unwrap();
        assert_eq!(
            flag.set_on_root(&mut root, true),
            Err(AccessError::Detached {
                field: "extra.flag".into()
            })
        );

        let x = tree.get(ids.x).unwrap();
        let mut leaf = Leaf::default();
        assert!(matches!(
            x.set_on_root(&mut leaf, 1u32),
            Err(AccessError::OwnerMismatch { .. })
        ));
        assert_eq!(leaf.x, 0);
    }

    #[test]
    fn build_errors() {
        let (mut tree, ids) = build([true; 3]);

        assert_eq!(
            tree.insert(field_spec!(Leaf, x: u32), Some(FieldId(99))),
            Err(BuildError::UnknownParent(FieldId(99)))
        );

        let names = tree.find("names").unwrap().id();
        assert_eq!(
            tree.insert(field_spec!(Leaf, x: u32), Some(names)),
            Err(BuildError::ParentNotRecord {
                parent: "names".into(),
                kind: FieldKind::List,
            })
        );

        assert!(matches!(
            tree.insert(field_spec!(Leaf, x: u32), None),
            Err(BuildError::OwnerMismatch { .. })
        ));
        assert!(matches!(
            tree.insert(field_spec!(Leaf, x: u32), Some(ids.middle)),
            Err(BuildError::OwnerMismatch { .. })
        ));

        assert_eq!(
            tree.insert(field_spec!(Leaf, x: u32), Some(ids.leaf)),
            Err(BuildError::DuplicatePath("middle.leaf.x".into()))
        );
        assert_eq!(tree.len(), 8);
    }

    #[test]
    fn send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FieldTree>();
        assert_send_sync::<super::Field<'static>>();
    }

    #[cfg(feature = "std")]
    #[test]
    fn shared_between_threads() {
        let (tree, ids) = build([true; 3]);
        let x = tree.get(ids.x).unwrap();

        std::thread::scope(|s| {
            for n in 0..4u32 {
                s.spawn(move || {
                    let mut root = Root::default();
                    x.set_on_root(&mut root, n).unwrap();
                    assert_eq!(x.tag_path("json", false), "g.p.x");
                    assert_eq!(root.middle.leaf.x, n);
                });
            }
        });
    }
}
