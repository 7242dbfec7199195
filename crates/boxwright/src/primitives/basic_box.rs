//! Open-top style box of five panels plus a lid.
//!
//! The long side panels carry grooves the short side panels sit in; the
//! bottom and top are sized so they overlap the walls by the routing depth.
//! Material thickness comes from the `mat_thickness` attribute, either per
//! part type or as a global fallback. A global `visual_offset` attribute
//! pushes the walls outward for exploded views.

use boxwright_ir::{Rgba, Shape};
use nalgebra::Vector3;

use crate::assembler::{AssemblerRegistry, AssemblerType};
use crate::builder::{BuilderRegistry, BuilderType};
use crate::dimensions::{DimensionProvider, DimensionStore, GlobalDimensions, PartTypeTable};
use crate::error::Result;
use crate::kernel::{Location, Metadata};
use crate::scene::SceneKernel;
use crate::ident_enum;

ident_enum! {
    /// Parts of a basic box.
    pub enum Part {
        /// Bottom panel.
        Bottom,
        /// Front long side.
        LongSide,
        /// Back long side, turned around.
        LongSideInverse,
        /// Left short side.
        ShortSide,
        /// Right short side, turned around.
        ShortSideInverse,
        /// Lid.
        Top,
    }
}

ident_enum! {
    /// Part types of a basic box.
    pub enum PartType {
        /// Bottom panel.
        Bottom,
        /// Grooved long side panel.
        LongSidePanel,
        /// Short side panel.
        ShortSidePanel,
        /// Lid.
        Top,
    }
}

/// Material thickness attribute name.
pub const MAT_THICKNESS: &str = "mat_thickness";
/// Exploded-view offset attribute name.
pub const VISUAL_OFFSET: &str = "visual_offset";

/// Derived box dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxDimensions {
    route_depth: f64,
    thickness: [f64; 4],
    routed_x_len: f64,
    routed_y_len: f64,
    routed_z_len: f64,
    panel_z_len: f64,
}

impl BoxDimensions {
    /// Provider routing grooves `route_depth` deep.
    pub fn new(route_depth: f64) -> Self {
        Self {
            route_depth,
            ..Default::default()
        }
    }

    /// Groove depth.
    pub fn route_depth(&self) -> f64 {
        self.route_depth
    }

    /// Material thickness of a part type.
    pub fn thickness(&self, part_type: PartType) -> f64 {
        self.thickness[part_type as usize]
    }

    /// How far the bottom reaches past the short sides' grooves along X.
    pub fn routed_x_len(&self) -> f64 {
        self.routed_x_len
    }

    /// How far the bottom reaches past the long sides' grooves along Y.
    pub fn routed_y_len(&self) -> f64 {
        self.routed_y_len
    }

    /// Lid thickness above the routed depth.
    pub fn routed_z_len(&self) -> f64 {
        self.routed_z_len
    }

    /// Height of the side panels.
    pub fn panel_z_len(&self) -> f64 {
        self.panel_z_len
    }
}

impl DimensionProvider for BoxDimensions {
    fn derive(&mut self, globals: &GlobalDimensions) -> Result<()> {
        for part_type in PartType::ALL {
            self.thickness[*part_type as usize] = globals.part_type_number(part_type, MAT_THICKNESS)?;
        }
        self.routed_x_len = self.thickness(PartType::ShortSidePanel) - self.route_depth;
        self.routed_y_len = self.thickness(PartType::LongSidePanel) - self.route_depth;
        self.routed_z_len = self.thickness(PartType::Top) - self.route_depth;
        self.panel_z_len = globals.z_len() - self.routed_z_len;
        Ok(())
    }

    fn part_types(&self, globals: &GlobalDimensions) -> Result<PartTypeTable> {
        let panel_y = globals.y_len() - 2.0 * self.routed_y_len;
        PartTypeTable::new()
            .with(
                PartType::Bottom,
                (
                    globals.x_len() - 2.0 * self.routed_x_len,
                    panel_y,
                    self.thickness(PartType::Bottom),
                ),
            )?
            .with(
                PartType::LongSidePanel,
                (globals.x_len(), self.thickness(PartType::LongSidePanel), self.panel_z_len),
            )?
            .with(
                PartType::ShortSidePanel,
                (self.thickness(PartType::ShortSidePanel), panel_y, self.panel_z_len),
            )?
            .with(
                PartType::Top,
                (globals.x_len(), globals.y_len(), self.thickness(PartType::Top)),
            )
    }
}

/// Dimension store of a basic box.
pub type BoxStore = DimensionStore<BoxDimensions>;

fn slab(store: &BoxStore, part_type: PartType) -> Result<Shape> {
    let dims = store.get(part_type)?;
    Ok(Shape::cuboid(&part_type.to_string(), dims.x_len, dims.y_len, dims.z_len))
}

fn long_side_panel(store: &BoxStore) -> Result<Shape> {
    let panel = slab(store, PartType::LongSidePanel)?;
    let box_dims = store.ext();
    let depth = box_dims.route_depth();
    if depth <= 0.0 {
        return Ok(panel);
    }
    let dims = store.get(PartType::LongSidePanel)?;
    let width = box_dims.thickness(PartType::ShortSidePanel);
    let x = dims.x_len / 2.0 - width / 2.0;
    let y = dims.y_len / 2.0 - depth / 2.0;
    Ok([x, -x].into_iter().fold(panel, |panel, x| {
        let groove = Shape::cuboid("groove", width, depth, dims.z_len).translate(x, y, 0.0);
        panel.difference(groove)
    }))
}

fn visual_offset(store: &BoxStore) -> f64 {
    store
        .attribute(VISUAL_OFFSET)
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

fn burlywood(shade: u8) -> Rgba {
    match shade {
        2 => Rgba::rgb(238.0 / 255.0, 197.0 / 255.0, 145.0 / 255.0),
        4 => Rgba::rgb(139.0 / 255.0, 115.0 / 255.0, 85.0 / 255.0),
        _ => Rgba::rgb(222.0 / 255.0, 184.0 / 255.0, 135.0 / 255.0),
    }
}

fn long_side(store: &BoxStore, sign: f64) -> Location {
    let ext = store.ext();
    let y = store.y_len() / 2.0 - ext.thickness(PartType::LongSidePanel) / 2.0 + visual_offset(store);
    Location::new(0.0, sign * y, ext.panel_z_len() / 2.0)
}

fn short_side(store: &BoxStore, sign: f64) -> Location {
    let ext = store.ext();
    let x = store.x_len() / 2.0 - ext.thickness(PartType::ShortSidePanel) / 2.0 + visual_offset(store);
    Location::new(sign * x, 0.0, ext.panel_z_len() / 2.0)
}

/// Registries and finalized types of the basic box.
///
/// Derive variants by defining new types in [`builders`](Self::builders)
/// and [`assemblers`](Self::assemblers) that extend [`builder`](Self::builder)
/// and [`assembler`](Self::assembler).
pub struct BasicBox {
    /// Registry holding the box builder type.
    pub builders: BuilderRegistry<BoxDimensions, Shape>,
    /// Registry holding the box assembler type.
    pub assemblers: AssemblerRegistry<BoxDimensions, Shape>,
    /// Builds every part type.
    pub builder: BuilderType<BoxDimensions, Shape>,
    /// Places every part.
    pub assembler: AssemblerType<BoxDimensions, Shape>,
}

impl BasicBox {
    /// Declare the box builder and assembler types.
    pub fn define() -> Result<Self> {
        let mut builders = BuilderRegistry::<BoxDimensions, Shape>::new();
        let builder = builders
            .define("BasicBoxBuilder")
            .part_types(PartType::ALL)
            .register(PartType::Bottom, |s| slab(s, PartType::Bottom))
            .register(PartType::LongSidePanel, long_side_panel)
            .register(PartType::ShortSidePanel, |s| slab(s, PartType::ShortSidePanel))
            .register(PartType::Top, |s| slab(s, PartType::Top))
            .finish()?;

        let mut assemblers = AssemblerRegistry::<BoxDimensions, Shape>::new();
        let assembler = assemblers
            .define("BasicBox")
            .builder(&builder)
            .parts(Part::ALL)
            .map_parts([
                (Part::LongSide, PartType::LongSidePanel),
                (Part::LongSideInverse, PartType::LongSidePanel),
                (Part::ShortSide, PartType::ShortSidePanel),
                (Part::ShortSideInverse, PartType::ShortSidePanel),
            ])
            .place(Part::Bottom, |s| {
                let z = s.ext().thickness(PartType::Bottom) / 2.0;
                Ok(Metadata::at(Location::new(0.0, 0.0, z))
                    .named("Bottom panel")
                    .colored(burlywood(1)))
            })
            .place(Part::LongSide, |s| {
                Ok(Metadata::at(long_side(s, 1.0))
                    .named("Long side panel")
                    .colored(burlywood(2)))
            })
            .place(Part::LongSideInverse, |s| {
                Ok(Metadata::at(long_side(s, -1.0).rotated(Vector3::z(), 180.0))
                    .named("Long side panel inverse")
                    .colored(burlywood(2)))
            })
            .place(Part::ShortSide, |s| {
                Ok(Metadata::at(short_side(s, 1.0))
                    .named("Short side panel")
                    .colored(burlywood(4)))
            })
            .place(Part::ShortSideInverse, |s| {
                Ok(Metadata::at(short_side(s, -1.0).rotated(Vector3::z(), 180.0))
                    .named("Short side panel inverse")
                    .colored(burlywood(4)))
            })
            .place(Part::Top, |s| {
                let z = s.z_len() - s.ext().thickness(PartType::Top) / 2.0;
                Ok(Metadata::at(Location::new(0.0, 0.0, z)).named("Top panel"))
            })
            .finish()?;

        Ok(Self {
            builders,
            assemblers,
            builder,
            assembler,
        })
    }

    /// Store for a box of uniform material thickness.
    pub fn store(x_len: f64, y_len: f64, z_len: f64, thickness: f64, route_depth: f64) -> Result<BoxStore> {
        let globals = GlobalDimensions::new(x_len, y_len, z_len).with_attribute(MAT_THICKNESS, thickness)?;
        DimensionStore::new(globals, BoxDimensions::new(route_depth))
    }

    /// Assemble the box on the reference kernel.
    pub fn assemble(&self, store: &BoxStore) -> Result<boxwright_ir::AssemblyDocument> {
        self.assembler.get_assembly(store, &SceneKernel)
    }
}
