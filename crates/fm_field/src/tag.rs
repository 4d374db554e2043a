use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

// -----------------------------------------------------------------------------
// StructTag

/// The raw annotation text attached to a field.
///
/// By convention it is a space separated list of `key:"value"` entries.
/// The value is a double-quoted string with backslash escapes. Tags that do
/// not follow the convention can still be stored, lookups simply stop at the
/// first malformed entry.
///
/// # Examples
///
/// ```
/// use fm_field::StructTag;
///
/// let tag = StructTag::new(r#"json:"user_id,omitempty" db:"uid""#);
///
/// assert_eq!(tag.get("db"), "uid");
/// assert_eq!(tag.lookup("yaml"), None);
///
/// let json = tag.value("json").unwrap();
/// assert_eq!(json.name(), "user_id");
/// assert!(json.has_option("omitempty"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructTag(Box<str>);

impl StructTag {
    /// Wraps raw tag text.
    #[inline]
    pub fn new(raw: impl Into<Box<str>>) -> Self {
        Self(raw.into())
    }

    /// An empty tag.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds canonical tag text from `key`/`value` pairs.
    ///
    /// Values are quoted and escaped. Keys are taken as they are, so they
    /// should not contain spaces, `:` or `"`.
    ///
    /// ```
    /// use fm_field::StructTag;
    ///
    /// let tag = StructTag::from_pairs([("json", "a"), ("note", r#"say "hi""#)]);
    /// assert_eq!(tag.as_str(), r#"json:"a" note:"say \"hi\"""#);
    /// assert_eq!(tag.get("note"), r#"say "hi""#);
    /// ```
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut raw = String::new();
        for (key, value) in pairs {
            if !raw.is_empty() {
                raw.push(' ');
            }
            raw.push_str(key);
            raw.push_str(":\"");
            for c in value.chars() {
                match c {
                    '"' => raw.push_str("\\\""),
                    '\\' => raw.push_str("\\\\"),
                    '\n' => raw.push_str("\\n"),
                    '\r' => raw.push_str("\\r"),
                    '\t' => raw.push_str("\\t"),
                    c => raw.push(c),
                }
            }
            raw.push('"');
        }
        Self(raw.into_boxed_str())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the value associated with `key`.
    ///
    /// `None` if the key is absent, if a malformed entry precedes it, or if
    /// its quoted value cannot be decoded. An explicitly empty value
    /// (`key:""`) is `Some("")`.
    pub fn lookup(&self, key: &str) -> Option<Cow<'_, str>> {
        for (name, quoted) in Entries(&self.0) {
            if name == key {
                return unquote(quoted);
            }
        }
        None
    }

    /// Returns the value associated with `key`, or `""` if there is none.
    #[inline]
    pub fn get(&self, key: &str) -> Cow<'_, str> {
        self.lookup(key).unwrap_or(Cow::Borrowed(""))
    }

    /// Looks up `key` and splits its value into a name and options.
    #[inline]
    pub fn value(&self, key: &str) -> Option<TagValue<'_>> {
        self.lookup(key).map(TagValue)
    }

    /// Returns the first comma separated segment of `key`'s value.
    ///
    /// `None` if the key is absent or the segment is empty. This is the
    /// segment a tag path is made of.
    pub fn name(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = self.lookup(key)?;
        let name = match value {
            Cow::Borrowed(s) => Cow::Borrowed(first_segment(s)),
            Cow::Owned(mut s) => {
                let len = first_segment(&s).len();
                s.truncate(len);
                Cow::Owned(s)
            }
        };
        if name.is_empty() { None } else { Some(name) }
    }

    /// Iterates over the well-formed entries in order.
    ///
    /// Stops at the first malformed entry. Entries whose value cannot be
    /// decoded are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        Entries(&self.0).filter_map(|(key, quoted)| Some((key, unquote(quoted)?)))
    }
}

impl From<&str> for StructTag {
    #[inline]
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for StructTag {
    #[inline]
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

#[inline]
fn first_segment(s: &str) -> &str {
    s.split(',').next().unwrap_or_default()
}

// -----------------------------------------------------------------------------
// TagValue

/// A tag value split on commas: the leading name and trailing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagValue<'a>(Cow<'a, str>);

impl TagValue<'_> {
    /// The first segment. Empty for values like `",omitempty"`.
    #[inline]
    pub fn name(&self) -> &str {
        first_segment(&self.0)
    }

    /// The segments after the name.
    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').skip(1)
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options().any(|o| o == option)
    }

    /// The whole value, unsplit.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// -----------------------------------------------------------------------------
// Scanning

/// Yields `(key, quoted_value)` pairs, the quoted value still including its
/// surrounding quotes. Ends at the first malformed entry.
struct Entries<'a>(&'a str);

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.0.trim_start_matches(' ');
        let bytes = tag.as_bytes();

        let mut i = 0;
        while i < bytes.len()
            && bytes[i] > b' '
            && bytes[i] != b':'
            && bytes[i] != b'"'
            && bytes[i] != 0x7f
        {
            i += 1;
        }
        if i == 0 || i + 1 >= bytes.len() || bytes[i] != b':' || bytes[i + 1] != b'"' {
            self.0 = "";
            return None;
        }
        let key = &tag[..i];
        let rest = &tag[i + 1..];
        let rest_bytes = rest.as_bytes();

        let mut j = 1;
        while j < rest_bytes.len() && rest_bytes[j] != b'"' {
            if rest_bytes[j] == b'\\' {
                j += 1;
            }
            j += 1;
        }
        if j >= rest_bytes.len() {
            self.0 = "";
            return None;
        }

        // `j` indexes an ASCII quote, so both slices sit on char boundaries.
        let quoted = &rest[..=j];
        self.0 = &rest[j + 1..];
        Some((key, quoted))
    }
}

/// Decodes a double-quoted value with backslash escapes.
///
/// Borrows when no escape is present. `None` on raw newlines, unknown
/// escapes, invalid code points, or escaped bytes that are not UTF-8.
fn unquote(quoted: &str) -> Option<Cow<'_, str>> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    if inner.contains('\n') {
        return None;
    }
    if !inner.contains('\\') {
        return if inner.contains('"') {
            None
        } else {
            Some(Cow::Borrowed(inner))
        };
    }

    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return None,
            '\\' => {}
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                continue;
            }
        }

        let escaped = match chars.next()? {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\\' => '\\',
            '"' => '"',
            'x' => {
                out.push(hex_digits(&mut chars, 2)? as u8);
                continue;
            }
            d @ '0'..='7' => {
                let mut value = d.to_digit(8)?;
                for _ in 0..2 {
                    value = value * 8 + chars.next()?.to_digit(8)?;
                }
                out.push(u8::try_from(value).ok()?);
                continue;
            }
            'u' => char::from_u32(hex_digits(&mut chars, 4)?)?,
            'U' => char::from_u32(hex_digits(&mut chars, 8)?)?,
            _ => return None,
        };
        let mut buf = [0u8; 4];
        out.extend_from_slice(escaped.encode_utf8(&mut buf).as_bytes());
    }

    String::from_utf8(out).ok().map(Cow::Owned)
}

fn hex_digits(chars: &mut core::str::Chars<'_>, count: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}
