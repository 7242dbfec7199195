#![warn(missing_docs)]

//! Declarative parametric assemblies.
//!
//! A project is described in three layers:
//!
//! - a [`DimensionStore`] holding global and per-part-type dimensions,
//! - [`BuilderType`]s that map part types to construction routines,
//! - [`AssemblerType`]s that map parts to part types and placements.
//!
//! Builder and assembler types are declared through registries and may
//! extend earlier types; every inherited table is resolved and validated
//! when a definition is finished. Identifiers are case-insensitive and may
//! be plain strings or tokens declared with [`ident_enum!`].
//!
//! ```
//! use boxwright::primitives::BasicBox;
//!
//! let basic = BasicBox::define().unwrap();
//! let store = BasicBox::store(400.0, 200.0, 200.0, 9.0, 4.5).unwrap();
//! let doc = basic.assemble(&store).unwrap();
//! assert_eq!(doc.len(), 6);
//! ```

pub mod assembler;
pub mod builder;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod ident;
pub mod kernel;
pub mod normalized;
pub mod primitives;
pub mod registry;
pub mod scene;

pub use assembler::{Assembler, AssemblerDefinition, AssemblerRegistry, AssemblerType, PlacementSource};
pub use builder::{Builder, BuilderDefinition, BuilderRegistry, BuilderType, ConstructionEntry, RoutineArgs};
pub use config::{ConfiguredPartTypes, PartTypeConfig, ProjectConfig};
pub use dimensions::{
    AttrValue, Attributes, DimensionProvider, DimensionStore, Extents, GlobalDimensions,
    PartTypeDimensions, PartTypeTable, RawDimensions,
};
pub use error::{EntryKind, Error, MissingKey, MissingKeys, Result};
pub use ident::{equal, normalize, CanonicalKey, Declared, DuplicatePolicy, Ident, Member, Origin, Universe};
pub use kernel::{GeometryKernel, Location, Metadata, PlacedPart};
pub use normalized::NormalizedMap;
pub use registry::{Resolved, ResolvedTable};
pub use scene::SceneKernel;

pub use boxwright_ir as ir;

#[doc(hidden)]
pub use heck as __heck;
