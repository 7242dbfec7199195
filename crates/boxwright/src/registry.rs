//! Definition registry.
//!
//! Builder and assembler types are declared level by level: each level names
//! its parents, adds members to a universe (part types or parts) and declares
//! entries keyed by those members. Levels live in an arena indexed by
//! declaration order, so a parent always precedes its children.
//!
//! Resolving a type walks its ancestor chain from the root-most ancestor to
//! the type itself. Universe members accumulate; entries are written into a
//! table where a more derived level replaces the whole entry of a less
//! derived one for the same canonical key. With several parents the chain is
//! the reverse of the C3 linearization, so the first listed parent overrides
//! later ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::{EntryKind, Error, MissingKey, Result};
use crate::ident::{normalize, CanonicalKey, Declared, DuplicatePolicy, Ident, Universe};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a type definition within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(usize);

impl DefId {
    /// Declaration order within the registry.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One declared type: parents, local universe members and local entries.
pub(crate) struct Level<E> {
    pub(crate) name: String,
    pub(crate) parents: Vec<DefId>,
    pub(crate) universe: Vec<Declared>,
    pub(crate) entries: Vec<(Declared, E)>,
}

impl<E> Level<E> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            parents: Vec::new(),
            universe: Vec::new(),
            entries: Vec::new(),
        }
    }
}

/// An entry that survived resolution, with the level that declared it.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// Key as written by the declaring level.
    pub declared: Declared,
    /// Name of the declaring level.
    pub declared_by: String,
    /// The entry itself.
    pub entry: T,
}

/// Flattened, inheritance-merged entries of one concrete type.
#[derive(Debug, Clone)]
pub struct ResolvedTable<T> {
    owner: String,
    kind: EntryKind,
    entries: IndexMap<CanonicalKey, Resolved<T>>,
}

impl<T> ResolvedTable<T> {
    /// Type the table was resolved for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Kind of entries held.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Resolved entry for a key.
    pub fn get(&self, key: impl Ident) -> Option<&Resolved<T>> {
        normalize(key).ok().and_then(|k| self.entries.get(&k))
    }

    /// The entry value for a key.
    pub fn entry(&self, key: impl Ident) -> Option<&T> {
        self.get(key).map(|r| &r.entry)
    }

    /// Check if a key has an entry.
    pub fn contains(&self, key: impl Ident) -> bool {
        self.get(key).is_some()
    }

    /// Keys in first-declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.entries.keys()
    }

    /// Entries in first-declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalKey, &Resolved<T>)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Universe members without an entry, in universe order.
    pub fn missing(&self, universe: &Universe) -> Vec<MissingKey> {
        universe
            .members()
            .filter(|m| !self.entries.contains_key(m.declared.key()))
            .map(|m| MissingKey {
                key: m.declared.key().clone(),
                declared_by: m.declared_by.clone(),
            })
            .collect()
    }
}

/// Arena of type levels plus their linearizations.
pub(crate) struct Lineage<E> {
    id: u64,
    kind: EntryKind,
    levels: Vec<Level<E>>,
    /// Most derived first, the level itself included.
    linearizations: Vec<Vec<DefId>>,
}

impl<E> Lineage<E> {
    pub(crate) fn new(kind: EntryKind) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            levels: Vec::new(),
            linearizations: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn level(&self, id: DefId) -> &Level<E> {
        &self.levels[id.0]
    }

    /// Append a level and compute its ancestor chain.
    pub(crate) fn push(&mut self, level: Level<E>) -> Result<DefId> {
        if self.levels.iter().any(|l| l.name == level.name) {
            return Err(Error::DuplicateType { owner: level.name });
        }
        let id = DefId(self.levels.len());
        let mut sequences: Vec<Vec<DefId>> = level
            .parents
            .iter()
            .map(|p| self.linearizations[p.0].clone())
            .collect();
        sequences.push(level.parents.clone());

        let Some(merged) = c3_merge(sequences) else {
            let parents = level
                .parents
                .iter()
                .map(|p| self.levels[p.0].name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InconsistentHierarchy {
                owner: level.name,
                parents,
            });
        };

        let mut linearization = Vec::with_capacity(merged.len() + 1);
        linearization.push(id);
        linearization.extend(merged);
        self.levels.push(level);
        self.linearizations.push(linearization);
        Ok(id)
    }

    /// Drop the most recently pushed level after a failed finalization.
    pub(crate) fn rollback(&mut self, id: DefId) {
        debug_assert_eq!(id.0 + 1, self.levels.len());
        self.levels.truncate(id.0);
        self.linearizations.truncate(id.0);
    }

    /// Ancestor chain ids, root-most first, `id` last.
    pub(crate) fn chain_ids(&self, id: DefId) -> impl Iterator<Item = DefId> + '_ {
        self.linearizations[id.0].iter().rev().copied()
    }

    /// Ancestor chain, root-most first, `id` last.
    pub(crate) fn chain(&self, id: DefId) -> impl Iterator<Item = &Level<E>> + '_ {
        self.chain_ids(id).map(move |d| &self.levels[d.0])
    }

    pub(crate) fn chain_names(&self, id: DefId) -> Vec<String> {
        self.chain(id).map(|l| l.name.clone()).collect()
    }

    /// Union of every universe declaration along the chain.
    pub(crate) fn universe(&self, id: DefId) -> Result<Universe> {
        let mut universe = Universe::new(self.kind);
        for level in self.chain(id) {
            for declared in &level.universe {
                universe.insert_declared(&level.name, declared.clone(), DuplicatePolicy::Reject)?;
            }
        }
        if universe.is_empty() {
            return Err(Error::MissingUniverse {
                owner: self.level(id).name.clone(),
                kind: self.kind,
            });
        }
        Ok(universe)
    }

    /// Last-write-wins accumulation of the entries selected by `project`.
    ///
    /// Fails if one level declares a key twice or declares a key outside
    /// `universe`.
    pub(crate) fn resolve<T>(
        &self,
        id: DefId,
        universe: &Universe,
        kind: EntryKind,
        project: impl Fn(&E) -> Option<T>,
    ) -> Result<ResolvedTable<T>> {
        let mut entries: IndexMap<CanonicalKey, Resolved<T>> = IndexMap::new();
        for level in self.chain(id) {
            let mut local: HashMap<&CanonicalKey, &Declared> = HashMap::new();
            for (declared, entry) in &level.entries {
                let Some(entry) = project(entry) else {
                    continue;
                };
                let key = declared.key();
                if let Some(first) = local.insert(key, declared) {
                    return Err(Error::AmbiguousMapping {
                        owner: level.name.clone(),
                        kind,
                        key: key.clone(),
                        first: first.raw().to_string(),
                        second: declared.raw().to_string(),
                    });
                }
                if !universe.contains(key) {
                    return Err(Error::UndeclaredKey {
                        owner: level.name.clone(),
                        kind: universe.kind(),
                        key: key.clone(),
                    });
                }
                let resolved = Resolved {
                    declared: declared.clone(),
                    declared_by: level.name.clone(),
                    entry,
                };
                if let Some(replaced) = entries.insert(key.clone(), resolved) {
                    tracing::trace!(
                        %key,
                        %kind,
                        by = %level.name,
                        replaces = %replaced.declared_by,
                        "entry overridden"
                    );
                }
            }
        }
        Ok(ResolvedTable {
            owner: self.level(id).name.clone(),
            kind,
            entries,
        })
    }
}

/// C3 merge of parent linearizations. `None` if no consistent order exists.
fn c3_merge(mut sequences: Vec<Vec<DefId>>) -> Option<Vec<DefId>> {
    let mut out = Vec::new();
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Some(out);
        }
        let head = sequences
            .iter()
            .map(|s| s[0])
            .find(|candidate| sequences.iter().all(|s| !s[1..].contains(candidate)))?;
        out.push(head);
        for sequence in &mut sequences {
            if sequence[0] == head {
                sequence.remove(0);
            }
        }
    }
}
