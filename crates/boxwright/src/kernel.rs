//! Geometry kernel seam: placement metadata and the trait assemblers drive.

use std::collections::BTreeMap;

use boxwright_ir::{Placement, Rgba, Vec3};
use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::dimensions::AttrValue;
use crate::ident::CanonicalKey;

/// Colors handed out by part type position when a placement sets none.
pub const DEFAULT_PALETTE: [Rgba; 6] = [
    Rgba { r: 0.87, g: 0.72, b: 0.53, a: 1.0 },
    Rgba { r: 0.55, g: 0.71, b: 0.67, a: 1.0 },
    Rgba { r: 0.80, g: 0.52, b: 0.25, a: 1.0 },
    Rgba { r: 0.62, g: 0.62, b: 0.75, a: 1.0 },
    Rgba { r: 0.76, g: 0.60, b: 0.42, a: 1.0 },
    Rgba { r: 0.45, g: 0.55, b: 0.40, a: 1.0 },
];

/// Rigid placement: a rotation about an axis through the origin, then a
/// translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    translation: Vector3<f64>,
    axis: Vector3<f64>,
    angle_deg: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self::origin()
    }
}

impl Location {
    /// Identity placement.
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Pure translation.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: Vector3::new(x, y, z),
            axis: Vector3::z(),
            angle_deg: 0.0,
        }
    }

    /// Replace the rotation. A zero axis means no rotation.
    pub fn rotated(mut self, axis: impl Into<Vector3<f64>>, angle_deg: f64) -> Self {
        self.axis = axis.into();
        self.angle_deg = angle_deg;
        self
    }

    /// Translation component.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Rotation angle in degrees.
    pub fn angle_deg(&self) -> f64 {
        self.angle_deg
    }

    /// Rotation component.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        match Unit::try_new(self.axis, 1e-12) {
            Some(axis) => UnitQuaternion::from_axis_angle(&axis, self.angle_deg.to_radians()),
            None => UnitQuaternion::identity(),
        }
    }

    /// As a nalgebra isometry.
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation())
    }

    /// Map a point from part space into assembly space.
    pub fn transform_point(&self, point: Point3<f64>) -> Point3<f64> {
        self.isometry() * point
    }

    /// IR form.
    pub fn to_placement(&self) -> Placement {
        let t = self.translation;
        Placement {
            translation: Vec3::new(t.x, t.y, t.z),
            axis: Vec3::new(self.axis.x, self.axis.y, self.axis.z),
            angle_deg: self.angle_deg,
        }
    }
}

/// Placement record returned by an assembler's placement routine.
///
/// Only `location` is required; unset fields fall back to defaults when the
/// part is placed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Where the part goes.
    pub location: Location,
    /// Display name.
    pub name: Option<String>,
    /// Display color.
    pub color: Option<Rgba>,
    /// Kernel-specific extras.
    pub extra: BTreeMap<String, AttrValue>,
}

impl Metadata {
    /// Metadata with only a location.
    pub fn at(location: Location) -> Self {
        Self {
            location,
            ..Default::default()
        }
    }

    /// Set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the display color.
    pub fn colored(mut self, color: Rgba) -> Self {
        self.color = Some(color);
        self
    }

    /// Add a kernel-specific extra.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A part ready to be added to an assembly, defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedPart {
    /// Part key.
    pub part: CanonicalKey,
    /// Part type the shape was built from.
    pub part_type: CanonicalKey,
    /// Display name; the part key unless overridden.
    pub name: String,
    /// Display color.
    pub color: Rgba,
    /// Placement.
    pub location: Location,
    /// Kernel-specific extras.
    pub extra: BTreeMap<String, AttrValue>,
}

impl PlacedPart {
    /// Apply defaults to a metadata record.
    pub fn new(
        part: CanonicalKey,
        part_type: CanonicalKey,
        metadata: Metadata,
        default_color: Rgba,
    ) -> Self {
        Self {
            name: metadata.name.unwrap_or_else(|| part.to_string()),
            color: metadata.color.unwrap_or(default_color),
            location: metadata.location,
            extra: metadata.extra,
            part,
            part_type,
        }
    }
}

/// Backend that turns built shapes into an assembly.
///
/// Assemblers never inspect shapes; they only hand each one to the kernel
/// together with its placement.
pub trait GeometryKernel {
    /// Shape produced by construction routines.
    type Shape;
    /// Assembly container.
    type Assembly;

    /// Start an empty assembly.
    fn new_assembly(&self, name: &str) -> Self::Assembly;

    /// Place a shape into the assembly.
    fn add(&self, assembly: &mut Self::Assembly, shape: Self::Shape, part: &PlacedPart);
}

/// Default color for the part type at `position` in a builder universe.
pub(crate) fn palette_color(position: usize) -> Rgba {
    DEFAULT_PALETTE[position % DEFAULT_PALETTE.len()]
}
