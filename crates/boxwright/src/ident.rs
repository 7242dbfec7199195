//! Identifier normalization.
//!
//! Parts, part types and attributes can be named with plain text or with
//! enumerated tokens declared through [`ident_enum!`](crate::ident_enum).
//! Both are converted to a [`CanonicalKey`] at every boundary, so the rest of
//! the crate only ever compares canonical keys.
//!
//! Canonicalization lower-cases the text and does nothing else. Text that is
//! empty after trimming is rejected.

use std::borrow::{Borrow, Cow};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EntryKind, Error, Result};

/// Lower-cased identifier text used for every key comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// The canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        normalize(value.as_str())
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}

/// How an identifier was originally written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Plain text.
    Text,
    /// A variant of an enumerated identifier type.
    Token,
}

/// Anything convertible to non-empty identifier text.
///
/// Implemented for `str`, `String`, [`CanonicalKey`], [`Declared`] and every
/// type declared with [`ident_enum!`](crate::ident_enum).
pub trait Ident {
    /// The identifier text as written.
    fn ident_text(&self) -> Cow<'_, str>;

    /// How the identifier was written.
    fn origin(&self) -> Origin {
        Origin::Text
    }
}

impl Ident for str {
    fn ident_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Ident for String {
    fn ident_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl Ident for CanonicalKey {
    fn ident_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: Ident + ?Sized> Ident for &T {
    fn ident_text(&self) -> Cow<'_, str> {
        (**self).ident_text()
    }

    fn origin(&self) -> Origin {
        (**self).origin()
    }
}

/// Canonicalize an identifier.
///
/// Fails with [`Error::InvalidIdentifier`] when the text is empty after
/// trimming.
pub fn normalize(id: impl Ident) -> Result<CanonicalKey> {
    let text = id.ident_text();
    if text.trim().is_empty() {
        return Err(Error::InvalidIdentifier {
            raw: text.into_owned(),
        });
    }
    Ok(CanonicalKey(text.to_lowercase()))
}

/// Check whether two identifiers share a canonical key.
///
/// Invalid identifiers are never equal to anything.
pub fn equal(a: impl Ident, b: impl Ident) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// An identifier as originally declared, with its canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    raw: String,
    origin: Origin,
    key: CanonicalKey,
}

impl Declared {
    /// Normalize `id` and remember how it was written.
    pub fn new(id: impl Ident) -> Result<Self> {
        let key = normalize(&id)?;
        Ok(Self {
            raw: id.ident_text().into_owned(),
            origin: id.origin(),
            key,
        })
    }

    /// The text as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The canonical key.
    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    /// How the identifier was written.
    pub fn origin_kind(&self) -> Origin {
        self.origin
    }

    /// Two declarations name the same entity when their raw text matches.
    pub fn same_entity(&self, other: &Declared) -> bool {
        self.raw == other.raw
    }
}

impl Ident for Declared {
    fn ident_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.raw)
    }

    fn origin(&self) -> Origin {
        self.origin
    }
}

/// Declare an enumerated identifier type.
///
/// Variants without explicit text use their name in `snake_case`.
///
/// ```
/// boxwright::ident_enum! {
///     pub enum PartType {
///         Bottom,
///         LongSidePanel,
///         Lid = "top lid",
///     }
/// }
///
/// assert!(boxwright::equal(PartType::LongSidePanel, "long_side_panel"));
/// assert!(boxwright::equal(PartType::Lid, "Top Lid"));
/// ```
#[macro_export]
macro_rules! ident_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident $(= $text:literal)? ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),*
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),*];
        }

        impl $crate::Ident for $name {
            fn ident_text(&self) -> ::std::borrow::Cow<'_, str> {
                match self {
                    $( $name::$variant => $crate::ident_enum!(@text $variant $(, $text)?) ),*
                }
            }

            fn origin(&self) -> $crate::Origin {
                $crate::Origin::Token
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&$crate::Ident::ident_text(self))
            }
        }
    };
    (@text $variant:ident, $text:literal) => {
        ::std::borrow::Cow::Borrowed($text)
    };
    (@text $variant:ident) => {
        ::std::borrow::Cow::Owned($crate::__heck::ToSnakeCase::to_snake_case(stringify!($variant)))
    };
}

/// How a universe reacts when an identifier collides with an existing member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with [`Error::AmbiguousMapping`].
    #[default]
    Reject,
    /// Replace the existing declaration.
    Replace,
}

/// A member of a [`Universe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// The identifier as declared.
    pub declared: Declared,
    /// Type that declared it.
    pub declared_by: String,
}

/// Ordered set of declared identifiers, keyed by canonical key.
///
/// Re-declaring the same text is a no-op. Declaring different text that
/// normalizes to an existing key is a collision.
#[derive(Debug, Clone)]
pub struct Universe {
    kind: EntryKind,
    members: IndexMap<CanonicalKey, Member>,
}

impl Universe {
    /// Create an empty universe of the given kind.
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            members: IndexMap::new(),
        }
    }

    /// Build a universe from identifiers, rejecting collisions.
    pub fn from_idents<I: Ident>(
        kind: EntryKind,
        owner: &str,
        ids: impl IntoIterator<Item = I>,
    ) -> Result<Self> {
        let mut universe = Self::new(kind);
        universe.extend(owner, ids, DuplicatePolicy::Reject)?;
        Ok(universe)
    }

    /// What the members identify.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Add one identifier. Returns `true` if the key was new.
    pub fn insert(&mut self, owner: &str, id: impl Ident) -> Result<bool> {
        self.insert_declared(owner, Declared::new(id)?, DuplicatePolicy::Reject)
    }

    /// Add an already declared identifier under `policy`.
    pub fn insert_declared(
        &mut self,
        owner: &str,
        declared: Declared,
        policy: DuplicatePolicy,
    ) -> Result<bool> {
        if let Some(existing) = self.members.get_mut(declared.key()) {
            if existing.declared.same_entity(&declared) {
                return Ok(false);
            }
            return match policy {
                DuplicatePolicy::Reject => Err(Error::AmbiguousMapping {
                    owner: owner.to_string(),
                    kind: self.kind,
                    key: declared.key().clone(),
                    first: existing.declared.raw().to_string(),
                    second: declared.raw().to_string(),
                }),
                DuplicatePolicy::Replace => {
                    *existing = Member {
                        declared,
                        declared_by: owner.to_string(),
                    };
                    Ok(false)
                }
            };
        }
        self.members.insert(
            declared.key().clone(),
            Member {
                declared,
                declared_by: owner.to_string(),
            },
        );
        Ok(true)
    }

    /// Add many identifiers under `policy`.
    pub fn extend<I: Ident>(
        &mut self,
        owner: &str,
        ids: impl IntoIterator<Item = I>,
        policy: DuplicatePolicy,
    ) -> Result<()> {
        for id in ids {
            self.insert_declared(owner, Declared::new(id)?, policy)?;
        }
        Ok(())
    }

    /// Check membership by canonical key.
    pub fn contains(&self, id: impl Ident) -> bool {
        normalize(id).is_ok_and(|key| self.members.contains_key(&key))
    }

    /// Look up a member.
    pub fn get(&self, id: impl Ident) -> Option<&Member> {
        normalize(id).ok().and_then(|key| self.members.get(&key))
    }

    /// Position of a key in declaration order.
    pub fn position(&self, key: &CanonicalKey) -> Option<usize> {
        self.members.get_index_of(key)
    }

    /// Canonical keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.members.keys()
    }

    /// Members in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the universe has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if both universes hold the same canonical keys.
    pub fn same_keys(&self, other: &Universe) -> bool {
        self.len() == other.len() && self.keys().all(|k| other.members.contains_key(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::ident_enum! {
        enum Token {
            Top,
            LongSidePanel,
            Explicit = "Short Side",
        }
    }

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize("Top").unwrap().as_str(), "top");
        assert_eq!(normalize(Token::Top).unwrap().as_str(), "top");
        assert_eq!(normalize(Token::Explicit).unwrap().as_str(), "short side");
        assert_eq!(normalize(String::from("BOTTOM")).unwrap().as_str(), "bottom");
    }

    #[test]
    fn test_normalize_applies_no_other_transformation() {
        assert_eq!(normalize(" Top ").unwrap().as_str(), " top ");
        assert_ne!(normalize(" top").unwrap(), normalize("top").unwrap());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(matches!(normalize(""), Err(Error::InvalidIdentifier { .. })));
        assert!(matches!(normalize("  \t"), Err(Error::InvalidIdentifier { .. })));
        assert!(!equal("", ""));
    }

    #[test]
    fn test_equal_across_representations() {
        assert!(equal("long_side_panel", Token::LongSidePanel));
        assert!(equal(Token::Top, "TOP"));
        assert!(!equal(Token::Top, Token::LongSidePanel));
        let key = normalize("top").unwrap();
        assert!(equal(&key, Token::Top));
    }

    crate::ident_enum! {
        enum Acronym {
            LongSideInverse,
            Panel2Left,
            HTTPServer,
        }
    }

    #[test]
    fn test_variant_names_become_snake_case() {
        let texts: Vec<_> = Acronym::ALL.iter().map(|a| a.ident_text().into_owned()).collect();
        assert_eq!(texts, ["long_side_inverse", "panel2_left", "http_server"]);
    }

    #[test]
    fn test_token_metadata() {
        assert_eq!(Token::ALL.len(), 3);
        assert_eq!(Token::LongSidePanel.to_string(), "long_side_panel");
        assert_eq!(Token::Top.origin(), Origin::Token);
        assert_eq!("top".origin(), Origin::Text);
    }

    #[test]
    fn test_universe_redeclaration_is_idempotent() {
        let mut universe = Universe::new(EntryKind::PartType);
        assert!(universe.insert("Base", "top").unwrap());
        // Same text through a token names the same entity.
        assert!(!universe.insert("Child", Token::Top).unwrap());
        assert_eq!(universe.len(), 1);
        assert_eq!(universe.get("TOP").unwrap().declared_by, "Base");
    }

    #[test]
    fn test_universe_collision() {
        let err = Universe::from_idents(EntryKind::Part, "Box", ["Top", "top"]).unwrap_err();
        match err {
            Error::AmbiguousMapping {
                owner,
                key,
                first,
                second,
                ..
            } => {
                assert_eq!(owner, "Box");
                assert_eq!(key.as_str(), "top");
                assert_eq!(first, "Top");
                assert_eq!(second, "top");
            }
            other => panic!("expected AmbiguousMapping, got {other:?}"),
        }
    }

    #[test]
    fn test_universe_replace_policy() {
        let mut universe =
            Universe::from_idents(EntryKind::PartType, "Base", ["Apple", "Banana"]).unwrap();
        universe
            .extend("Ext", ["banana", "cherry"], DuplicatePolicy::Replace)
            .unwrap();
        assert_eq!(universe.len(), 3);
        let banana = universe.get("BANANA").unwrap();
        assert_eq!(banana.declared.raw(), "banana");
        assert_eq!(banana.declared_by, "Ext");
        let keys: Vec<_> = universe.keys().map(CanonicalKey::as_str).collect();
        assert_eq!(keys, ["apple", "banana", "cherry"]);
    }

    #[test]
    fn test_same_keys() {
        let a = Universe::from_idents(EntryKind::Part, "A", ["x", "y"]).unwrap();
        let b = Universe::from_idents(EntryKind::PartType, "B", ["Y", "X"]).unwrap();
        let c = Universe::from_idents(EntryKind::PartType, "C", ["x"]).unwrap();
        assert!(a.same_keys(&b));
        assert!(!a.same_keys(&c));
    }

    #[test]
    fn test_canonical_key_serde() {
        let key: CanonicalKey = serde_json::from_str(r#""Bottom""#).unwrap();
        assert_eq!(key.as_str(), "bottom");
        assert!(serde_json::from_str::<CanonicalKey>(r#""  ""#).is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""bottom""#);
    }
}
