#![warn(missing_docs)]

//! Intermediate representation for boxwright assemblies.
//!
//! This crate defines the serializable output of the reference geometry
//! kernel: a small DAG of solid operations plus a flat list of placed,
//! named and colored assembly entries.
//!
//! The IR is purely declarative. No tessellation happens here; a downstream
//! CAD kernel is expected to evaluate [`ShapeOp`] graphs into real solids.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a node in the IR graph.
pub type NodeId = u64;

/// Global atomic counter for unique IR node IDs.
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn alloc_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// 3D vector with f64 components (conventionally millimeters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

/// Linear RGBA color, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
    /// Alpha channel.
    pub a: f64,
}

impl Rgba {
    /// Opaque color from RGB channels.
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// Solid operation, the building block of the IR DAG.
///
/// Each variant is either a leaf primitive or a cut/transform operation
/// that references child nodes by [`NodeId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShapeOp {
    /// Axis-aligned box centered at origin.
    Cuboid {
        /// Size along each axis.
        size: Vec3,
    },
    /// Boolean difference (left minus right).
    Difference {
        /// Left operand (base).
        left: NodeId,
        /// Right operand (subtracted).
        right: NodeId,
    },
    /// Translation by an offset vector.
    Translate {
        /// Child node to translate.
        child: NodeId,
        /// Translation offset.
        offset: Vec3,
    },
}

/// A node in the IR graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier.
    pub id: NodeId,
    /// Optional human-readable name.
    pub name: Option<String>,
    /// The operation this node represents.
    pub op: ShapeOp,
}

/// A detached solid: a root node plus every node it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Root node of this shape.
    pub root: NodeId,
    /// All nodes reachable from `root`.
    pub nodes: HashMap<NodeId, Node>,
}

impl Shape {
    fn leaf(name: &str, op: ShapeOp) -> Self {
        let id = alloc_node_id();
        let mut nodes = HashMap::new();
        nodes.insert(
            id,
            Node {
                id,
                name: Some(name.to_string()),
                op,
            },
        );
        Self { root: id, nodes }
    }

    fn unary(self, op_fn: impl FnOnce(NodeId) -> ShapeOp) -> Self {
        let id = alloc_node_id();
        let mut nodes = self.nodes;
        nodes.insert(
            id,
            Node {
                id,
                name: None,
                op: op_fn(self.root),
            },
        );
        Self { root: id, nodes }
    }

    fn binary(self, other: Shape, op_fn: impl FnOnce(NodeId, NodeId) -> ShapeOp) -> Self {
        let id = alloc_node_id();
        let mut nodes = self.nodes;
        nodes.extend(other.nodes);
        nodes.insert(
            id,
            Node {
                id,
                name: None,
                op: op_fn(self.root, other.root),
            },
        );
        Self { root: id, nodes }
    }

    /// Axis-aligned box centered at origin.
    pub fn cuboid(name: &str, x: f64, y: f64, z: f64) -> Self {
        Self::leaf(
            name,
            ShapeOp::Cuboid {
                size: Vec3::new(x, y, z),
            },
        )
    }

    /// Boolean difference (self - other).
    pub fn difference(self, other: Shape) -> Self {
        self.binary(other, |left, right| ShapeOp::Difference { left, right })
    }

    /// Translate the shape.
    pub fn translate(self, x: f64, y: f64, z: f64) -> Self {
        self.unary(|child| ShapeOp::Translate {
            child,
            offset: Vec3::new(x, y, z),
        })
    }

    /// The root node.
    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.get(&self.root)
    }

    /// Number of leaf primitives in this shape.
    pub fn primitive_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n.op, ShapeOp::Cuboid { .. }))
            .count()
    }
}

/// Rigid placement: rotation about `axis` by `angle_deg`, then translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Translation applied after rotation.
    pub translation: Vec3,
    /// Rotation axis.
    pub axis: Vec3,
    /// Rotation angle in degrees.
    pub angle_deg: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            translation: Vec3::zero(),
            axis: Vec3::new(0.0, 0.0, 1.0),
            angle_deg: 0.0,
        }
    }
}

/// One placed part in an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyEntry {
    /// Display name of the part.
    pub name: String,
    /// Canonical part key.
    pub part: String,
    /// Canonical part type key the shape was built from.
    pub part_type: String,
    /// Root node of the part's shape.
    pub root: NodeId,
    /// Where the part sits in the assembly.
    pub placement: Placement,
    /// Display color.
    pub color: Rgba,
    /// Kernel-specific keys forwarded verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An assembly document.
///
/// Contains the merged node graph of every placed shape and the entries that
/// reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyDocument {
    /// Format version string (e.g. "0.1").
    pub version: String,
    /// Assembly name.
    pub name: String,
    /// All nodes in the graph, keyed by [`NodeId`].
    pub nodes: HashMap<NodeId, Node>,
    /// Placed parts, in assembly order.
    pub entries: Vec<AssemblyEntry>,
}

impl Default for AssemblyDocument {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            name: String::new(),
            nodes: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl AssemblyDocument {
    /// Create a new empty document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Merge a shape's nodes into the document and return its root.
    pub fn insert_shape(&mut self, shape: Shape) -> NodeId {
        self.nodes.extend(shape.nodes);
        shape.root
    }

    /// Look up an entry by canonical part key.
    pub fn entry(&self, part: &str) -> Option<&AssemblyEntry> {
        self.entries.iter().find(|e| e.part == part)
    }

    /// Number of placed parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the document has no placed parts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
