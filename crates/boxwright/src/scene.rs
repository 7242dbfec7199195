//! Reference kernel producing a serializable [`AssemblyDocument`].

use boxwright_ir::{AssemblyDocument, AssemblyEntry, Shape};

use crate::kernel::{GeometryKernel, PlacedPart};

/// Kernel whose shapes are IR solid graphs and whose assemblies are
/// [`AssemblyDocument`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneKernel;

impl GeometryKernel for SceneKernel {
    type Shape = Shape;
    type Assembly = AssemblyDocument;

    fn new_assembly(&self, name: &str) -> AssemblyDocument {
        AssemblyDocument::new(name)
    }

    fn add(&self, assembly: &mut AssemblyDocument, shape: Shape, part: &PlacedPart) {
        let root = assembly.insert_shape(shape);
        assembly.entries.push(AssemblyEntry {
            name: part.name.clone(),
            part: part.part.to_string(),
            part_type: part.part_type.to_string(),
            root,
            placement: part.location.to_placement(),
            color: part.color,
            extra: part
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                .collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::normalize;
    use crate::kernel::{Location, Metadata, DEFAULT_PALETTE};

    #[test]
    fn test_add_entry() {
        let kernel = SceneKernel;
        let mut doc = kernel.new_assembly("Crate");
        let part = PlacedPart::new(
            normalize("Lid").unwrap(),
            normalize("top").unwrap(),
            Metadata::at(Location::new(0.0, 0.0, 5.0)).with("finish", "oiled"),
            DEFAULT_PALETTE[0],
        );
        kernel.add(&mut doc, Shape::cuboid("top", 10.0, 10.0, 1.0), &part);

        assert_eq!(doc.name, "Crate");
        let entry = doc.entry("lid").unwrap();
        assert_eq!(entry.part_type, "top");
        assert_eq!(entry.placement.translation.z, 5.0);
        assert_eq!(entry.extra["finish"], serde_json::json!("oiled"));
        assert!(doc.nodes.contains_key(&entry.root));
    }
}
