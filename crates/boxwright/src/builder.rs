//! Builder types: part type universes with inherited construction routines.
//!
//! A builder type is declared through a [`BuilderRegistry`]. Each definition
//! may extend earlier ones, add part types and register construction
//! routines; [`BuilderDefinition::finish`] resolves the inheritance chain and
//! validates the result before the type can be used.
//!
//! ```
//! use boxwright::{BuilderRegistry, DimensionStore, GlobalDimensions};
//!
//! let mut builders = BuilderRegistry::<(), f64>::new();
//! let base = builders
//!     .define("Base")
//!     .part_types(["panel"])
//!     .register("panel", |dims| Ok(dims.x_len()))
//!     .finish()
//!     .unwrap();
//! let wide = builders
//!     .define("Wide")
//!     .extends(&base)
//!     .register("Panel", |dims| Ok(dims.x_len() * 2.0))
//!     .finish()
//!     .unwrap();
//!
//! let store = DimensionStore::basic(GlobalDimensions::new(10.0, 1.0, 1.0)).unwrap();
//! assert_eq!(base.get_part(&store, "panel").unwrap(), 10.0);
//! assert_eq!(wide.get_part(&store, "PANEL").unwrap(), 20.0);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dimensions::{AttrValue, Attributes, DimensionStore};
use crate::error::{EntryKind, Error, MissingKeys, Result};
use crate::ident::{normalize, CanonicalKey, Declared, Ident, Universe};
use crate::registry::{DefId, Level, Lineage, ResolvedTable};

/// A construction routine: dimensions and bound arguments in, shape out.
///
/// Routines read the store with [`DimensionStore::get`] and `?`, so a
/// missing record surfaces as [`Error::UnknownPartType`].
pub type Routine<X, S> = Arc<dyn Fn(&DimensionStore<X>, &RoutineArgs) -> Result<S> + Send + Sync>;

/// Arguments bound to a routine at registration time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutineArgs {
    positional: Vec<AttrValue>,
    keyword: Attributes,
}

impl RoutineArgs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<AttrValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Ident, value: impl Into<AttrValue>) -> Result<Self> {
        self.keyword.insert(name, value.into())?;
        Ok(self)
    }

    /// Positional argument by index.
    pub fn get(&self, index: usize) -> Option<&AttrValue> {
        self.positional.get(index)
    }

    /// Keyword argument by name.
    pub fn keyword(&self, name: impl Ident) -> Option<&AttrValue> {
        self.keyword.get(name)
    }

    /// Keyword flag; absent or non-boolean values read as `false`.
    pub fn flag(&self, name: impl Ident) -> bool {
        self.keyword(name).and_then(AttrValue::as_bool).unwrap_or(false)
    }

    /// All positional arguments.
    pub fn positional(&self) -> &[AttrValue] {
        &self.positional
    }

    /// Check if no arguments are bound.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// A routine together with its bound arguments.
pub struct ConstructionEntry<X, S> {
    routine: Routine<X, S>,
    args: RoutineArgs,
}

impl<X, S> Clone for ConstructionEntry<X, S> {
    fn clone(&self) -> Self {
        Self {
            routine: Arc::clone(&self.routine),
            args: self.args.clone(),
        }
    }
}

impl<X, S> fmt::Debug for ConstructionEntry<X, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructionEntry")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl<X, S> ConstructionEntry<X, S> {
    /// Bound arguments.
    pub fn args(&self) -> &RoutineArgs {
        &self.args
    }

    /// Run the routine.
    pub fn invoke(&self, store: &DimensionStore<X>) -> Result<S> {
        (self.routine)(store, &self.args)
    }
}

pub(crate) struct BuilderTable<X, S> {
    registry: u64,
    id: DefId,
    name: String,
    chain: Vec<String>,
    partial: bool,
    part_types: Universe,
    routines: ResolvedTable<ConstructionEntry<X, S>>,
}

/// A finalized builder type. Cheap to clone.
pub struct BuilderType<X, S> {
    table: Arc<BuilderTable<X, S>>,
}

impl<X, S> Clone for BuilderType<X, S> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<X, S> fmt::Debug for BuilderType<X, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderType")
            .field("name", &self.table.name)
            .field("chain", &self.table.chain)
            .field("part_types", &self.table.part_types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<X, S> BuilderType<X, S> {
    /// Type name.
    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Ancestor chain, root-most first, ending with this type.
    pub fn chain(&self) -> &[String] {
        &self.table.chain
    }

    /// Whether routines may be missing for some part types.
    pub fn is_partial(&self) -> bool {
        self.table.partial
    }

    /// Resolved part type universe.
    pub fn part_types(&self) -> &Universe {
        &self.table.part_types
    }

    /// Resolved routines by part type.
    pub fn routines(&self) -> &ResolvedTable<ConstructionEntry<X, S>> {
        &self.table.routines
    }

    /// Check if a part type has a routine.
    pub fn has_routine(&self, part_type: impl Ident) -> bool {
        self.table.routines.contains(part_type)
    }

    /// Resolved routine for a part type.
    pub fn routine(&self, part_type: impl Ident) -> Option<&ConstructionEntry<X, S>> {
        self.table.routines.entry(part_type)
    }

    /// Bind the type to a dimension store.
    pub fn instantiate<'a>(&self, store: &'a DimensionStore<X>) -> Builder<'a, X, S> {
        Builder::new(self.clone(), store)
    }

    /// Build one shape without keeping an instance around.
    pub fn get_part(&self, store: &DimensionStore<X>, part_type: impl Ident) -> Result<S> {
        self.instantiate(store).build_part(part_type)
    }

    pub(crate) fn registry_id(&self) -> u64 {
        self.table.registry
    }
}

/// Declares and owns builder types.
pub struct BuilderRegistry<X, S> {
    lineage: Lineage<ConstructionEntry<X, S>>,
    types: Vec<BuilderType<X, S>>,
}

impl<X: 'static, S: 'static> Default for BuilderRegistry<X, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: 'static, S: 'static> BuilderRegistry<X, S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            lineage: Lineage::new(EntryKind::PartType),
            types: Vec::new(),
        }
    }

    /// Start declaring a builder type.
    pub fn define(&mut self, name: impl Into<String>) -> BuilderDefinition<'_, X, S> {
        BuilderDefinition {
            level: Level::new(name.into()),
            registry: self,
            partial: false,
            error: None,
        }
    }

    /// A finalized type by name.
    pub fn find(&self, name: &str) -> Option<&BuilderType<X, S>> {
        self.types.iter().find(|t| t.name() == name)
    }

    /// Finalized types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &BuilderType<X, S>> {
        self.types.iter()
    }

    fn finalize(&mut self, level: Level<ConstructionEntry<X, S>>, partial: bool) -> Result<BuilderType<X, S>> {
        let name = level.name.clone();
        let id = self.lineage.push(level)?;
        match self.resolve(id, name, partial) {
            Ok(table) => {
                let ty = BuilderType {
                    table: Arc::new(table),
                };
                self.types.push(ty.clone());
                Ok(ty)
            }
            Err(e) => {
                self.lineage.rollback(id);
                Err(e)
            }
        }
    }

    fn resolve(&self, id: DefId, name: String, partial: bool) -> Result<BuilderTable<X, S>> {
        let part_types = self.lineage.universe(id)?;
        let routines = self
            .lineage
            .resolve(id, &part_types, EntryKind::Routine, |e| Some(e.clone()))?;

        let missing = routines.missing(&part_types);
        if !missing.is_empty() && !partial {
            return Err(Error::IncompleteMapping {
                owner: name,
                kind: EntryKind::Routine,
                missing: MissingKeys(missing),
            });
        }

        let chain = self.lineage.chain_names(id);
        tracing::debug!(
            builder = %name,
            chain = ?chain,
            part_types = part_types.len(),
            routines = routines.len(),
            "builder type finalized"
        );
        Ok(BuilderTable {
            registry: self.lineage.id(),
            id,
            name,
            chain,
            partial,
            part_types,
            routines,
        })
    }
}

/// An in-progress builder type declaration.
///
/// Errors are held until [`finish`](Self::finish).
#[must_use = "a definition does nothing until finish() is called"]
pub struct BuilderDefinition<'r, X, S> {
    registry: &'r mut BuilderRegistry<X, S>,
    level: Level<ConstructionEntry<X, S>>,
    partial: bool,
    error: Option<Error>,
}

impl<'r, X: 'static, S: 'static> BuilderDefinition<'r, X, S> {
    fn record(&mut self, error: Error) {
        self.error.get_or_insert(error);
    }

    /// Add a parent type. Earlier parents take precedence over later ones.
    pub fn extends(mut self, parent: &BuilderType<X, S>) -> Self {
        if parent.registry_id() != self.registry.lineage.id() {
            let err = Error::ForeignParent {
                owner: self.level.name.clone(),
                parent: parent.name().to_string(),
            };
            self.record(err);
        } else {
            self.level.parents.push(parent.table.id);
        }
        self
    }

    /// Declare part types.
    pub fn part_types<I: Ident>(mut self, ids: impl IntoIterator<Item = I>) -> Self {
        for id in ids {
            match Declared::new(id) {
                Ok(declared) => self.level.universe.push(declared),
                Err(e) => self.record(e),
            }
        }
        self
    }

    /// Register a routine that needs no bound arguments.
    pub fn register<F>(self, part_type: impl Ident, routine: F) -> Self
    where
        F: Fn(&DimensionStore<X>) -> Result<S> + Send + Sync + 'static,
    {
        self.register_with(part_type, RoutineArgs::new(), move |store, _| routine(store))
    }

    /// Register a routine with arguments bound now and passed on every call.
    pub fn register_with<F>(mut self, part_type: impl Ident, args: RoutineArgs, routine: F) -> Self
    where
        F: Fn(&DimensionStore<X>, &RoutineArgs) -> Result<S> + Send + Sync + 'static,
    {
        let entry = ConstructionEntry {
            routine: Arc::new(routine),
            args,
        };
        match Declared::new(part_type) {
            Ok(declared) => self.level.entries.push((declared, entry)),
            Err(e) => self.record(e),
        }
        self
    }

    /// Allow part types without routines.
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Resolve and validate the type.
    pub fn finish(self) -> Result<BuilderType<X, S>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.registry.finalize(self.level, self.partial)
    }
}

/// A builder type bound to a dimension store.
pub struct Builder<'a, X, S> {
    ty: BuilderType<X, S>,
    store: &'a DimensionStore<X>,
    cache: RefCell<HashMap<CanonicalKey, S>>,
}

impl<'a, X, S> Builder<'a, X, S> {
    /// Bind `ty` to `store`.
    pub fn new(ty: BuilderType<X, S>, store: &'a DimensionStore<X>) -> Self {
        Self {
            ty,
            store,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The builder type.
    pub fn builder_type(&self) -> &BuilderType<X, S> {
        &self.ty
    }

    /// The bound dimension store.
    pub fn store(&self) -> &'a DimensionStore<X> {
        self.store
    }

    /// Global length along X.
    pub fn x_len(&self) -> f64 {
        self.store.x_len()
    }

    /// Global length along Y.
    pub fn y_len(&self) -> f64 {
        self.store.y_len()
    }

    /// Global length along Z.
    pub fn z_len(&self) -> f64 {
        self.store.z_len()
    }

    /// Provider extension of the store.
    pub fn ext(&self) -> &'a X {
        self.store.ext()
    }

    fn lookup(&self, part_type: impl Ident) -> Result<(CanonicalKey, &ConstructionEntry<X, S>)> {
        let key = normalize(&part_type)?;
        match self.ty.routine(&key) {
            Some(entry) => Ok((key, entry)),
            None => Err(Error::UnknownPartType {
                owner: self.ty.name().to_string(),
                key,
                requested: part_type.ident_text().into_owned(),
            }),
        }
    }

    /// Run the resolved routine for a part type.
    pub fn build_part(&self, part_type: impl Ident) -> Result<S> {
        let (key, entry) = self.lookup(part_type)?;
        tracing::trace!(builder = %self.ty.name(), part_type = %key, "building part");
        entry.invoke(self.store)
    }

    /// Number of cached shapes.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Forget cached shapes.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl<X, S: Clone> Builder<'_, X, S> {
    /// Like [`build_part`](Self::build_part), but builds each part type at
    /// most once per instance.
    pub fn build_cached(&self, part_type: impl Ident) -> Result<S> {
        let (key, entry) = self.lookup(part_type)?;
        if let Some(shape) = self.cache.borrow().get(&key) {
            return Ok(shape.clone());
        }
        tracing::trace!(builder = %self.ty.name(), part_type = %key, "building part (cached)");
        let shape = entry.invoke(self.store)?;
        self.cache.borrow_mut().insert(key, shape.clone());
        Ok(shape)
    }
}
