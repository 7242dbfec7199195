//! Error types for definition, dimension and assembly operations.

use std::fmt;

use thiserror::Error;

use crate::ident::CanonicalKey;

/// Which kind of key or entry an error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A member of a part universe.
    Part,
    /// A member of a part type universe.
    PartType,
    /// A part type construction routine.
    Routine,
    /// A part placement / metadata record.
    Placement,
    /// A part to part type mapping.
    PartTypeMapping,
    /// A key of a [`NormalizedMap`](crate::NormalizedMap).
    MapKey,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Part => write!(f, "part"),
            Self::PartType => write!(f, "part type"),
            Self::Routine => write!(f, "construction routine"),
            Self::Placement => write!(f, "placement"),
            Self::PartTypeMapping => write!(f, "part type mapping"),
            Self::MapKey => write!(f, "map key"),
        }
    }
}

/// A key that lacks an entry, with the type that put it in the universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingKey {
    /// Canonical key without an entry.
    pub key: CanonicalKey,
    /// Type whose universe declaration introduced the key.
    pub declared_by: String,
}

/// Display helper for a list of [`MissingKey`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingKeys(pub Vec<MissingKey>);

impl MissingKeys {
    /// Canonical keys, in reporting order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.0.iter().map(|m| &m.key)
    }

    /// Check if `key` is among the missing keys.
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|m| m.key.as_str() == key)
    }
}

impl fmt::Display for MissingKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, missing) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}' (declared by {})", missing.key, missing.declared_by)?;
        }
        Ok(())
    }
}

/// Errors returned by boxwright operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Identifier text is empty or whitespace only.
    #[error("invalid identifier {raw:?}: identifiers must be non-empty text")]
    InvalidIdentifier {
        /// The rejected text.
        raw: String,
    },

    /// Two distinct declared identifiers normalize to the same key.
    #[error("{owner}: {kind} identifiers {first:?} and {second:?} both normalize to '{key}'")]
    AmbiguousMapping {
        /// Type declaring the second identifier.
        owner: String,
        /// Universe or table the collision happened in.
        kind: EntryKind,
        /// Shared canonical key.
        key: CanonicalKey,
        /// Identifier declared first.
        first: String,
        /// Identifier declared second.
        second: String,
    },

    /// Required keys have no entry.
    #[error("{owner}: missing {kind} for {missing}")]
    IncompleteMapping {
        /// Type being finalized or assembled.
        owner: String,
        /// What kind of entry is missing.
        kind: EntryKind,
        /// Keys without an entry.
        missing: MissingKeys,
    },

    /// A part maps to a part type its builder never declares.
    #[error(
        "{owner}: part '{part}' maps to part type '{part_type}', which builder {builder} does not declare"
    )]
    UnregisteredPartType {
        /// Assembler type being finalized.
        owner: String,
        /// Part whose mapping is invalid.
        part: CanonicalKey,
        /// Mapped part type.
        part_type: CanonicalKey,
        /// Builder type of the assembler.
        builder: String,
    },

    /// Lookup of a part type that is not available.
    #[error("{owner}: unknown part type '{key}' (requested as {requested:?})")]
    UnknownPartType {
        /// Store or type that was queried.
        owner: String,
        /// Canonical key of the request.
        key: CanonicalKey,
        /// Identifier text as passed in.
        requested: String,
    },

    /// Lookup of a part that is not available.
    #[error("{owner}: unknown part '{key}' (requested as {requested:?})")]
    UnknownPart {
        /// Assembler type that was queried.
        owner: String,
        /// Canonical key of the request.
        key: CanonicalKey,
        /// Identifier text as passed in.
        requested: String,
    },

    /// Malformed per-part-type dimensions.
    #[error("part type '{part_type}': malformed dimensions: {reason}")]
    DimensionShape {
        /// Part type whose dimensions were rejected.
        part_type: String,
        /// What was wrong.
        reason: String,
    },

    /// An entry names a key outside the universe of the declaring chain.
    #[error("{owner}: {kind} '{key}' is not declared in the universe of {owner}")]
    UndeclaredKey {
        /// Type declaring the entry.
        owner: String,
        /// Universe the key was looked up in.
        kind: EntryKind,
        /// Offending key.
        key: CanonicalKey,
    },

    /// No level of an ancestor chain declares any universe members.
    #[error("{owner}: no type in the inheritance chain declares any {kind}")]
    MissingUniverse {
        /// Type being finalized.
        owner: String,
        /// Universe kind.
        kind: EntryKind,
    },

    /// No level of an assembler chain names a builder type.
    #[error("{owner}: no type in the inheritance chain names a builder")]
    MissingBuilder {
        /// Assembler type being finalized.
        owner: String,
    },

    /// Parents cannot be ordered into a single ancestor chain.
    #[error("{owner}: cannot order parents [{parents}] into one ancestor chain")]
    InconsistentHierarchy {
        /// Type being finalized.
        owner: String,
        /// Parent names as declared.
        parents: String,
    },

    /// A parent type belongs to a different registry.
    #[error("{owner}: parent {parent} was defined in a different registry")]
    ForeignParent {
        /// Type being finalized.
        owner: String,
        /// Offending parent.
        parent: String,
    },

    /// Another type in the same registry already has this name.
    #[error("type {owner} is already defined in this registry")]
    DuplicateType {
        /// Name declared twice.
        owner: String,
    },

    /// A numeric attribute was requested but absent or not a number.
    #[error("{owner}: attribute '{name}' is missing or not a number")]
    Attribute {
        /// Record that was queried.
        owner: String,
        /// Attribute name.
        name: String,
    },

    /// Project configuration could not be parsed.
    #[error("invalid project configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// An I/O error occurred while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for boxwright operations.
pub type Result<T> = std::result::Result<T, Error>;
