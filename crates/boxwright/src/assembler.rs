//! Assembler types: part universes mapped onto a builder and placed.
//!
//! An assembler type names the parts of an assembly, maps each part to a
//! part type of its builder and gives every part a placement. Like builder
//! types, assembler types inherit from earlier definitions; the most derived
//! level wins for every key and for the builder itself.
//!
//! A part without an explicit mapping maps to the part type with the same
//! canonical key, if the builder declares one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::builder::{Builder, BuilderType};
use crate::dimensions::DimensionStore;
use crate::error::{EntryKind, Error, MissingKey, MissingKeys, Result};
use crate::ident::{normalize, CanonicalKey, Declared, Ident, Universe};
use crate::kernel::{palette_color, GeometryKernel, Metadata, PlacedPart};
use crate::normalized::NormalizedMap;
use crate::registry::{DefId, Level, Lineage, ResolvedTable};

/// Placement routine for a single part.
pub type PlacementRoutine<X> = Arc<dyn Fn(&DimensionStore<X>) -> Result<Metadata> + Send + Sync>;

/// Placement routine covering several parts at once.
pub type MetadataProvider<X> =
    Arc<dyn Fn(&DimensionStore<X>) -> Result<NormalizedMap<Metadata>> + Send + Sync>;

/// Where a part's metadata comes from.
pub enum PlacementSource<X> {
    /// A routine for this part alone.
    Single(PlacementRoutine<X>),
    /// A shared provider; the part's record is looked up in its output.
    Provider(MetadataProvider<X>),
}

impl<X> Clone for PlacementSource<X> {
    fn clone(&self) -> Self {
        match self {
            Self::Single(f) => Self::Single(Arc::clone(f)),
            Self::Provider(f) => Self::Provider(Arc::clone(f)),
        }
    }
}

impl<X> fmt::Debug for PlacementSource<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Single(..)"),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

enum Declaration<X> {
    MapsTo(Declared),
    Place(PlacementSource<X>),
}

pub(crate) struct AssemblerTable<X, S> {
    registry: u64,
    id: DefId,
    name: String,
    chain: Vec<String>,
    builder: BuilderType<X, S>,
    parts: Universe,
    part_map: IndexMap<CanonicalKey, CanonicalKey>,
    placements: ResolvedTable<PlacementSource<X>>,
}

/// A finalized assembler type. Cheap to clone.
pub struct AssemblerType<X, S> {
    table: Arc<AssemblerTable<X, S>>,
}

impl<X, S> Clone for AssemblerType<X, S> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<X, S> fmt::Debug for AssemblerType<X, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblerType")
            .field("name", &self.table.name)
            .field("chain", &self.table.chain)
            .field("builder", &self.table.builder.name())
            .field("part_map", &self.table.part_map)
            .finish()
    }
}

impl<X, S> AssemblerType<X, S> {
    /// Type name.
    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Ancestor chain, root-most first, ending with this type.
    pub fn chain(&self) -> &[String] {
        &self.table.chain
    }

    /// Resolved builder type.
    pub fn builder(&self) -> &BuilderType<X, S> {
        &self.table.builder
    }

    /// Resolved part universe.
    pub fn parts(&self) -> &Universe {
        &self.table.parts
    }

    /// Resolved part to part type map, explicit and implicit entries alike.
    pub fn part_map(&self) -> &IndexMap<CanonicalKey, CanonicalKey> {
        &self.table.part_map
    }

    /// Resolved placement sources by part.
    pub fn placements(&self) -> &ResolvedTable<PlacementSource<X>> {
        &self.table.placements
    }

    /// Part type a part is built from.
    pub fn part_type_of(&self, part: impl Ident) -> Result<&CanonicalKey> {
        let key = normalize(&part)?;
        self.table.part_map.get(&key).ok_or_else(|| Error::UnknownPart {
            owner: self.table.name.clone(),
            key,
            requested: part.ident_text().into_owned(),
        })
    }

    /// Bind the type to a dimension store.
    pub fn instantiate<'a>(&self, store: &'a DimensionStore<X>) -> Assembler<'a, X, S> {
        Assembler::new(self.clone(), store)
    }

    /// Build the full assembly without keeping an instance around.
    pub fn get_assembly<K>(&self, store: &DimensionStore<X>, kernel: &K) -> Result<K::Assembly>
    where
        K: GeometryKernel<Shape = S>,
    {
        self.instantiate(store).assemble(kernel)
    }

    fn registry_id(&self) -> u64 {
        self.table.registry
    }
}

/// Declares and owns assembler types.
pub struct AssemblerRegistry<X, S> {
    lineage: Lineage<Declaration<X>>,
    builders: Vec<Option<BuilderType<X, S>>>,
    types: Vec<AssemblerType<X, S>>,
}

impl<X: 'static, S: 'static> Default for AssemblerRegistry<X, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: 'static, S: 'static> AssemblerRegistry<X, S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            lineage: Lineage::new(EntryKind::Part),
            builders: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Start declaring an assembler type.
    pub fn define(&mut self, name: impl Into<String>) -> AssemblerDefinition<'_, X, S> {
        AssemblerDefinition {
            level: Level::new(name.into()),
            builder: None,
            registry: self,
            error: None,
        }
    }

    /// A finalized type by name.
    pub fn find(&self, name: &str) -> Option<&AssemblerType<X, S>> {
        self.types.iter().find(|t| t.name() == name)
    }

    /// Finalized types in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &AssemblerType<X, S>> {
        self.types.iter()
    }

    fn finalize(
        &mut self,
        level: Level<Declaration<X>>,
        builder: Option<BuilderType<X, S>>,
    ) -> Result<AssemblerType<X, S>> {
        let name = level.name.clone();
        let id = self.lineage.push(level)?;
        self.builders.push(builder);
        match self.resolve(id, name) {
            Ok(table) => {
                let ty = AssemblerType {
                    table: Arc::new(table),
                };
                self.types.push(ty.clone());
                Ok(ty)
            }
            Err(e) => {
                self.lineage.rollback(id);
                self.builders.truncate(id.index());
                Err(e)
            }
        }
    }

    fn resolve(&self, id: DefId, name: String) -> Result<AssemblerTable<X, S>> {
        let builder = self
            .lineage
            .chain_ids(id)
            .filter_map(|d| self.builders[d.index()].clone())
            .last()
            .ok_or_else(|| Error::MissingBuilder { owner: name.clone() })?;

        let parts = self.lineage.universe(id)?;
        let mapped = self.lineage.resolve(id, &parts, EntryKind::PartTypeMapping, |d| match d {
            Declaration::MapsTo(part_type) => Some(part_type.clone()),
            Declaration::Place(_) => None,
        })?;
        let placements = self.lineage.resolve(id, &parts, EntryKind::Placement, |d| match d {
            Declaration::Place(source) => Some(source.clone()),
            Declaration::MapsTo(_) => None,
        })?;

        let part_types = builder.part_types();
        let mut part_map = IndexMap::new();
        let mut unmapped = Vec::new();
        let mut unbuilt: Vec<MissingKey> = Vec::new();
        for member in parts.members() {
            let part = member.declared.key();
            let part_type = match mapped.get(part) {
                Some(explicit) => {
                    let part_type = explicit.entry.key();
                    if !part_types.contains(part_type) {
                        return Err(Error::UnregisteredPartType {
                            owner: explicit.declared_by.clone(),
                            part: part.clone(),
                            part_type: part_type.clone(),
                            builder: builder.name().to_string(),
                        });
                    }
                    part_type.clone()
                }
                None if part_types.contains(part) => part.clone(),
                None => {
                    unmapped.push(MissingKey {
                        key: part.clone(),
                        declared_by: member.declared_by.clone(),
                    });
                    continue;
                }
            };
            if !builder.has_routine(&part_type) && !unbuilt.iter().any(|m| m.key == part_type) {
                let declared_by = part_types
                    .get(&part_type)
                    .map(|m| m.declared_by.clone())
                    .unwrap_or_default();
                unbuilt.push(MissingKey {
                    key: part_type.clone(),
                    declared_by,
                });
            }
            part_map.insert(part.clone(), part_type);
        }

        if !unmapped.is_empty() {
            return Err(Error::IncompleteMapping {
                owner: name,
                kind: EntryKind::PartTypeMapping,
                missing: MissingKeys(unmapped),
            });
        }
        if !unbuilt.is_empty() {
            return Err(Error::IncompleteMapping {
                owner: format!("{name} (builder {})", builder.name()),
                kind: EntryKind::Routine,
                missing: MissingKeys(unbuilt),
            });
        }
        let unplaced = placements.missing(&parts);
        if !unplaced.is_empty() {
            return Err(Error::IncompleteMapping {
                owner: name,
                kind: EntryKind::Placement,
                missing: MissingKeys(unplaced),
            });
        }

        let chain = self.lineage.chain_names(id);
        tracing::debug!(
            assembler = %name,
            builder = %builder.name(),
            chain = ?chain,
            parts = parts.len(),
            "assembler type finalized"
        );
        Ok(AssemblerTable {
            registry: self.lineage.id(),
            id,
            name,
            chain,
            builder,
            parts,
            part_map,
            placements,
        })
    }
}

/// An in-progress assembler type declaration.
///
/// Errors are held until [`finish`](Self::finish).
#[must_use = "a definition does nothing until finish() is called"]
pub struct AssemblerDefinition<'r, X, S> {
    registry: &'r mut AssemblerRegistry<X, S>,
    level: Level<Declaration<X>>,
    builder: Option<BuilderType<X, S>>,
    error: Option<Error>,
}

impl<'r, X: 'static, S: 'static> AssemblerDefinition<'r, X, S> {
    fn record(&mut self, error: Error) {
        self.error.get_or_insert(error);
    }

    fn declare(&mut self, part: impl Ident, declaration: Declaration<X>) {
        match Declared::new(part) {
            Ok(declared) => self.level.entries.push((declared, declaration)),
            Err(e) => self.record(e),
        }
    }

    /// Add a parent type. Earlier parents take precedence over later ones.
    pub fn extends(mut self, parent: &AssemblerType<X, S>) -> Self {
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

    /// Set the builder type; overrides any inherited one.
    pub fn builder(mut self, builder: &BuilderType<X, S>) -> Self {
        self.builder = Some(builder.clone());
        self
    }

    /// Declare parts.
    pub fn parts<I: Ident>(mut self, ids: impl IntoIterator<Item = I>) -> Self {
        for id in ids {
            match Declared::new(id) {
                Ok(declared) => self.level.universe.push(declared),
                Err(e) => self.record(e),
            }
        }
        self
    }

    /// Map a part to a builder part type.
    pub fn map_part(mut self, part: impl Ident, part_type: impl Ident) -> Self {
        match Declared::new(part_type) {
            Ok(part_type) => self.declare(part, Declaration::MapsTo(part_type)),
            Err(e) => self.record(e),
        }
        self
    }

    /// Map several parts at once.
    pub fn map_parts<P: Ident, T: Ident>(mut self, pairs: impl IntoIterator<Item = (P, T)>) -> Self {
        for (part, part_type) in pairs {
            self = self.map_part(part, part_type);
        }
        self
    }

    /// Register the placement routine of one part.
    pub fn place<F>(mut self, part: impl Ident, routine: F) -> Self
    where
        F: Fn(&DimensionStore<X>) -> Result<Metadata> + Send + Sync + 'static,
    {
        self.declare(part, Declaration::Place(PlacementSource::Single(Arc::new(routine))));
        self
    }

    /// Register one routine that places all of `parts`.
    ///
    /// The routine runs once per assembly; a listed part missing from its
    /// output fails at assembly time.
    pub fn place_all<I, F>(mut self, parts: impl IntoIterator<Item = I>, provider: F) -> Self
    where
        I: Ident,
        F: Fn(&DimensionStore<X>) -> Result<NormalizedMap<Metadata>> + Send + Sync + 'static,
    {
        let provider: MetadataProvider<X> = Arc::new(provider);
        for part in parts {
            let source = PlacementSource::Provider(Arc::clone(&provider));
            self.declare(part, Declaration::Place(source));
        }
        self
    }

    /// Resolve and validate the type.
    pub fn finish(self) -> Result<AssemblerType<X, S>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.registry.finalize(self.level, self.builder)
    }
}

/// Provider outputs memoized for one resolution pass, keyed by identity.
struct ProviderCache<'s, X> {
    store: &'s DimensionStore<X>,
    outputs: HashMap<*const (), NormalizedMap<Metadata>>,
}

impl<'s, X> ProviderCache<'s, X> {
    fn new(store: &'s DimensionStore<X>) -> Self {
        Self {
            store,
            outputs: HashMap::new(),
        }
    }

    fn metadata(&mut self, source: &PlacementSource<X>, part: &CanonicalKey) -> Result<Option<Metadata>> {
        match source {
            PlacementSource::Single(routine) => routine(self.store).map(Some),
            PlacementSource::Provider(provider) => {
                let key = Arc::as_ptr(provider) as *const ();
                let output = match self.outputs.entry(key) {
                    Entry::Occupied(slot) => slot.into_mut(),
                    Entry::Vacant(slot) => slot.insert(provider(self.store)?),
                };
                Ok(output.get(part).cloned())
            }
        }
    }
}

/// An assembler type bound to a dimension store.
pub struct Assembler<'a, X, S> {
    ty: AssemblerType<X, S>,
    builder: Builder<'a, X, S>,
}

impl<'a, X, S> Assembler<'a, X, S> {
    /// Bind `ty` to `store`, instantiating its builder on the same store.
    pub fn new(ty: AssemblerType<X, S>, store: &'a DimensionStore<X>) -> Self {
        let builder = ty.builder().instantiate(store);
        Self { ty, builder }
    }

    /// The assembler type.
    pub fn assembler_type(&self) -> &AssemblerType<X, S> {
        &self.ty
    }

    /// The builder instance used for every part.
    pub fn builder(&self) -> &Builder<'a, X, S> {
        &self.builder
    }

    /// The bound dimension store.
    pub fn store(&self) -> &'a DimensionStore<X> {
        self.builder.store()
    }

    /// Global length along X.
    pub fn x_len(&self) -> f64 {
        self.builder.x_len()
    }

    /// Global length along Y.
    pub fn y_len(&self) -> f64 {
        self.builder.y_len()
    }

    /// Global length along Z.
    pub fn z_len(&self) -> f64 {
        self.builder.z_len()
    }

    /// Resolved part universe.
    pub fn resolved_parts(&self) -> &Universe {
        self.ty.parts()
    }

    /// Resolved part to part type map.
    pub fn resolved_part_map(&self) -> &IndexMap<CanonicalKey, CanonicalKey> {
        self.ty.part_map()
    }

    /// Placement of every part with defaults applied, in part order.
    pub fn resolved_metadata(&self) -> Result<IndexMap<CanonicalKey, PlacedPart>> {
        let mut cache = ProviderCache::new(self.store());
        let mut placed = IndexMap::new();
        for part in self.ty.parts().keys() {
            placed.insert(part.clone(), self.place(part, &mut cache)?);
        }
        Ok(placed)
    }

    fn place(&self, part: &CanonicalKey, cache: &mut ProviderCache<'a, X>) -> Result<PlacedPart> {
        let incomplete = |kind| Error::IncompleteMapping {
            owner: self.ty.name().to_string(),
            kind,
            missing: MissingKeys(vec![MissingKey {
                key: part.clone(),
                declared_by: self
                    .ty
                    .parts()
                    .get(part)
                    .map(|m| m.declared_by.clone())
                    .unwrap_or_default(),
            }]),
        };

        let part_type = self
            .ty
            .part_map()
            .get(part)
            .ok_or_else(|| incomplete(EntryKind::PartTypeMapping))?;
        let source = self
            .ty
            .placements()
            .entry(part)
            .ok_or_else(|| incomplete(EntryKind::Placement))?;
        let metadata = cache
            .metadata(source, part)?
            .ok_or_else(|| incomplete(EntryKind::Placement))?;
        let position = self.ty.builder().part_types().position(part_type).unwrap_or(0);
        Ok(PlacedPart::new(
            part.clone(),
            part_type.clone(),
            metadata,
            palette_color(position),
        ))
    }

    /// Build and place every part.
    pub fn assemble<K>(&self, kernel: &K) -> Result<K::Assembly>
    where
        K: GeometryKernel<Shape = S>,
    {
        let parts: Vec<CanonicalKey> = self.ty.parts().keys().cloned().collect();
        self.assemble_keys(kernel, &parts)
    }

    /// Build and place only the named parts, in the order given.
    pub fn assemble_parts<K, I>(&self, kernel: &K, parts: impl IntoIterator<Item = I>) -> Result<K::Assembly>
    where
        K: GeometryKernel<Shape = S>,
        I: Ident,
    {
        let mut keys = Vec::new();
        for part in parts {
            let key = normalize(&part)?;
            if !self.ty.parts().contains(&key) {
                return Err(Error::UnknownPart {
                    owner: self.ty.name().to_string(),
                    key,
                    requested: part.ident_text().into_owned(),
                });
            }
            keys.push(key);
        }
        self.assemble_keys(kernel, &keys)
    }

    fn assemble_keys<K>(&self, kernel: &K, parts: &[CanonicalKey]) -> Result<K::Assembly>
    where
        K: GeometryKernel<Shape = S>,
    {
        let mut cache = ProviderCache::new(self.store());
        let mut assembly = kernel.new_assembly(self.ty.name());
        for part in parts {
            let placed = self.place(part, &mut cache)?;
            let shape = self.builder.build_part(&placed.part_type)?;
            tracing::debug!(
                assembler = %self.ty.name(),
                %part,
                part_type = %placed.part_type,
                "placing part"
            );
            kernel.add(&mut assembly, shape, &placed);
        }
        tracing::debug!(assembler = %self.ty.name(), parts = parts.len(), "assembly built");
        Ok(assembly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderRegistry;
    use crate::dimensions::GlobalDimensions;
    use crate::kernel::Location;

    /// Kernel that records part names and shape labels.
    struct Recorder;

    impl GeometryKernel for Recorder {
        type Shape = String;
        type Assembly = Vec<(String, String)>;

        fn new_assembly(&self, _name: &str) -> Self::Assembly {
            Vec::new()
        }

        fn add(&self, assembly: &mut Self::Assembly, shape: String, part: &PlacedPart) {
            assembly.push((part.name.clone(), shape));
        }
    }

    fn builder(reg: &mut BuilderRegistry<(), String>) -> BuilderType<(), String> {
        reg.define("Panels")
            .part_types(["top", "side_panel"])
            .register("top", |_| Ok("top".to_string()))
            .register("side_panel", |_| Ok("side".to_string()))
            .finish()
            .unwrap()
    }

    fn store() -> DimensionStore {
        DimensionStore::basic(GlobalDimensions::new(1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_missing_builder() {
        let mut asm = AssemblerRegistry::<(), String>::new();
        let err = asm
            .define("Orphan")
            .parts(["top"])
            .place("top", |_| Ok(Metadata::default()))
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::MissingBuilder { ref owner } if owner == "Orphan"));
    }

    #[test]
    fn test_unregistered_part_type() {
        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let mut asm = AssemblerRegistry::new();
        let err = asm
            .define("Bad")
            .builder(&panels)
            .parts(["lid"])
            .map_part("lid", "door")
            .place("lid", |_| Ok(Metadata::default()))
            .finish()
            .unwrap_err();
        match err {
            Error::UnregisteredPartType { part, part_type, builder, .. } => {
                assert_eq!(part.as_str(), "lid");
                assert_eq!(part_type.as_str(), "door");
                assert_eq!(builder, "Panels");
            }
            other => panic!("expected UnregisteredPartType, got {other:?}"),
        }
    }

    #[test]
    fn test_unmapped_part() {
        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let mut asm = AssemblerRegistry::new();
        let err = asm
            .define("Gap")
            .builder(&panels)
            .parts(["top", "left"])
            .place("top", |_| Ok(Metadata::default()))
            .place("left", |_| Ok(Metadata::default()))
            .finish()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteMapping { kind: EntryKind::PartTypeMapping, ref missing, .. }
                if missing.contains("left")
        ));
    }

    #[test]
    fn test_missing_placement() {
        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let mut asm = AssemblerRegistry::new();
        let err = asm
            .define("Unplaced")
            .builder(&panels)
            .parts(["top"])
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::IncompleteMapping { kind: EntryKind::Placement, .. }));
    }

    #[test]
    fn test_partial_builder_routine_gap() {
        let mut reg = BuilderRegistry::<(), String>::new();
        let partial = reg
            .define("Half")
            .part_types(["top", "bottom"])
            .register("top", |_| Ok("top".to_string()))
            .partial()
            .finish()
            .unwrap();
        let mut asm = AssemblerRegistry::new();
        let err = asm
            .define("UsesBottom")
            .builder(&partial)
            .parts(["bottom"])
            .place("bottom", |_| Ok(Metadata::default()))
            .finish()
            .unwrap_err();
        match err {
            Error::IncompleteMapping { kind, missing, .. } => {
                assert_eq!(kind, EntryKind::Routine);
                assert_eq!(missing.0[0].declared_by, "Half");
            }
            other => panic!("expected IncompleteMapping, got {other:?}"),
        }
    }

    #[test]
    fn test_provider_runs_once_per_assembly() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut asm = AssemblerRegistry::new();
        let ty = asm
            .define("Shared")
            .builder(&panels)
            .parts(["top", "left", "right"])
            .map_parts([("left", "side_panel"), ("right", "side_panel")])
            .place_all(["top", "left", "right"], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                NormalizedMap::try_from_iter([
                    ("top", Metadata::at(Location::new(0.0, 0.0, 1.0))),
                    ("left", Metadata::at(Location::new(-1.0, 0.0, 0.0))),
                    ("right", Metadata::at(Location::new(1.0, 0.0, 0.0)).named("Right")),
                ])
            })
            .finish()
            .unwrap();

        let out = ty.get_assembly(&store(), &Recorder).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            out,
            [
                ("top".to_string(), "top".to_string()),
                ("left".to_string(), "side".to_string()),
                ("Right".to_string(), "side".to_string()),
            ]
        );
    }

    #[test]
    fn test_provider_missing_part_fails_at_assembly() {
        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let mut asm = AssemblerRegistry::new();
        let ty = asm
            .define("Short")
            .builder(&panels)
            .parts(["top"])
            .place_all(["top"], |_| Ok(NormalizedMap::new()))
            .finish()
            .unwrap();
        let err = ty.get_assembly(&store(), &Recorder).unwrap_err();
        assert!(matches!(err, Error::IncompleteMapping { kind: EntryKind::Placement, .. }));
    }

    #[test]
    fn test_routine_reading_absent_record_returns_error() {
        let mut reg = BuilderRegistry::<(), String>::new();
        let lids = reg
            .define("Lids")
            .part_types(["lid"])
            .register("lid", |dims| Ok(format!("lid {}", dims.get("lid")?.x_len)))
            .finish()
            .unwrap();
        let mut asm = AssemblerRegistry::new();
        let ty = asm
            .define("Jar")
            .builder(&lids)
            .parts(["lid"])
            .place("lid", |_| Ok(Metadata::default()))
            .finish()
            .unwrap();

        // The store has no part type records at all.
        let err = ty.get_assembly(&store(), &Recorder).unwrap_err();
        match err {
            Error::UnknownPartType { owner, key, requested } => {
                assert_eq!(owner, "DimensionStore");
                assert_eq!(key.as_str(), "lid");
                assert_eq!(requested, "lid");
            }
            other => panic!("expected UnknownPartType, got {other:?}"),
        }
    }

    #[test]
    fn test_placement_error_propagates() {
        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let mut asm = AssemblerRegistry::new();
        let ty = asm
            .define("Shelf")
            .builder(&panels)
            .parts(["top"])
            .place("top", |dims| {
                let z = dims.number_for("top", "mat_thickness")?;
                Ok(Metadata::at(Location::new(0.0, 0.0, z)))
            })
            .finish()
            .unwrap();
        let err = ty.instantiate(&store()).resolved_metadata().unwrap_err();
        assert!(matches!(err, Error::Attribute { ref name, .. } if name == "mat_thickness"));
    }

    #[test]
    fn test_assemble_parts_subset() {
        let mut reg = BuilderRegistry::new();
        let panels = builder(&mut reg);
        let mut asm = AssemblerRegistry::new();
        let ty = asm
            .define("Two")
            .builder(&panels)
            .parts(["top", "left"])
            .map_part("left", "side_panel")
            .place("top", |_| Ok(Metadata::default()))
            .place("left", |_| Ok(Metadata::default()))
            .finish()
            .unwrap();
        let store = store();
        let assembler = ty.instantiate(&store);
        let out = assembler.assemble_parts(&Recorder, ["LEFT"]).unwrap();
        assert_eq!(out, [("left".to_string(), "side".to_string())]);

        let err = assembler.assemble_parts(&Recorder, ["Lid"]).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPart { ref key, ref requested, .. } if key.as_str() == "lid" && requested == "Lid"
        ));
        assert!(matches!(ty.part_type_of("door"), Err(Error::UnknownPart { .. })));
        assert_eq!(ty.part_type_of("Left").unwrap().as_str(), "side_panel");
    }
}
