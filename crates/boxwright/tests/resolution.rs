//! End-to-end definition, resolution and assembly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use boxwright::ir::Shape;
use boxwright::{
    equal, ident_enum, normalize, AssemblerRegistry, BuilderRegistry, DimensionStore, EntryKind, Error,
    GlobalDimensions, Location, Metadata, NormalizedMap, PartTypeTable, ProjectConfig, SceneKernel,
};

ident_enum! {
    enum Panel {
        Top,
        SidePanel,
    }
}

fn store() -> DimensionStore<PartTypeTable> {
    let table = PartTypeTable::new()
        .with("bottom", (380.0, 180.0, 9.0))
        .unwrap()
        .with(Panel::SidePanel, (400.0, 9.0, 191.0))
        .unwrap();
    DimensionStore::new(GlobalDimensions::new(400.0, 200.0, 200.0), table).unwrap()
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&calls), calls)
}

#[test]
fn tokens_and_text_normalize_alike() {
    assert_eq!(normalize(Panel::SidePanel).unwrap(), normalize("Side_Panel").unwrap());
    assert!(equal(Panel::Top, "TOP"));
    assert!(!equal(Panel::Top, " top"));
    assert!(matches!(normalize("   "), Err(Error::InvalidIdentifier { .. })));
}

#[test]
fn store_round_trip() {
    let store = store();
    assert_eq!(store["bottom"].z_len, 9.0);
    assert_eq!(store.x_len(), 400.0);
    assert!(matches!(
        store.get("lid"),
        Err(Error::UnknownPartType { ref key, .. }) if key.as_str() == "lid"
    ));
}

#[test]
fn end_to_end_assembly() {
    let (side_calls, side_count) = counter();
    let (bottom_calls, bottom_count) = counter();

    let mut builders = BuilderRegistry::<PartTypeTable, Shape>::new();
    let builder = builders
        .define("CrateBuilder")
        .part_types(["bottom", "side_panel"])
        .register("bottom", move |dims| {
            bottom_calls.fetch_add(1, Ordering::SeqCst);
            let d = dims.get("bottom")?;
            Ok(Shape::cuboid("bottom", d.x_len, d.y_len, d.z_len))
        })
        .register(Panel::SidePanel, move |dims| {
            side_calls.fetch_add(1, Ordering::SeqCst);
            let d = dims.get(Panel::SidePanel)?;
            Ok(Shape::cuboid("side", d.x_len, d.y_len, d.z_len))
        })
        .finish()
        .unwrap();

    let mut assemblers = AssemblerRegistry::new();
    let assembler = assemblers
        .define("Crate")
        .builder(&builder)
        .parts(["bottom", "left_side", "right_side"])
        .map_parts([("left_side", "side_panel"), ("right_side", "side_panel")])
        .place_all(["bottom", "left_side", "right_side"], |dims| {
            let y = dims.y_len() / 2.0 - 4.5;
            NormalizedMap::try_from_iter([
                ("bottom", Metadata::at(Location::new(0.0, 0.0, 4.5))),
                ("left_side", Metadata::at(Location::new(0.0, -y, 100.0))),
                ("right_side", Metadata::at(Location::new(0.0, y, 100.0))),
            ])
        })
        .finish()
        .unwrap();

    let doc = assembler.get_assembly(&store(), &SceneKernel).unwrap();
    assert_eq!(side_count.load(Ordering::SeqCst), 2);
    assert_eq!(bottom_count.load(Ordering::SeqCst), 1);
    assert_eq!(doc.len(), 3);

    let placements: Vec<_> = doc.entries.iter().map(|e| e.placement).collect();
    for (i, a) in placements.iter().enumerate() {
        for b in &placements[i + 1..] {
            assert_ne!(a, b);
        }
    }
    assert_eq!(doc.entry("left_side").unwrap().part_type, "side_panel");
    assert_relative_eq!(doc.entry("right_side").unwrap().placement.translation.y, 95.5);
    // Both sides share one part type, so they share a default color.
    assert_eq!(doc.entry("left_side").unwrap().color, doc.entry("right_side").unwrap().color);
}

#[test]
fn three_level_override() {
    let mut builders = BuilderRegistry::<(), &'static str>::new();
    let root = builders
        .define("Root")
        .part_types(["a", "b", "c"])
        .register("a", |_| Ok("root"))
        .register("b", |_| Ok("root"))
        .register("c", |_| Ok("root"))
        .finish()
        .unwrap();
    let mid = builders
        .define("Mid")
        .extends(&root)
        .register("b", |_| Ok("mid"))
        .register("c", |_| Ok("mid"))
        .finish()
        .unwrap();
    let leaf = builders
        .define("Leaf")
        .extends(&mid)
        .register("C", |_| Ok("leaf"))
        .finish()
        .unwrap();

    let store = DimensionStore::basic(GlobalDimensions::new(1.0, 1.0, 1.0)).unwrap();
    let built = leaf.instantiate(&store);
    assert_eq!(built.build_part("a").unwrap(), "root");
    assert_eq!(built.build_part("b").unwrap(), "mid");
    assert_eq!(built.build_part("c").unwrap(), "leaf");
    assert_eq!(leaf.routines().get("b").unwrap().declared_by, "Mid");
    assert_eq!(leaf.chain(), ["Root", "Mid", "Leaf"]);

    // Ancestors are unaffected by their descendants.
    assert_eq!(mid.get_part(&store, "c").unwrap(), "mid");
    assert_eq!(root.get_part(&store, "c").unwrap(), "root");
}

#[test]
fn metadata_override_replaces_whole_record() {
    let mut builders = BuilderRegistry::<(), u8>::new();
    let builder = builders
        .define("B")
        .part_types(["top"])
        .register("top", |_| Ok(0))
        .finish()
        .unwrap();
    let mut assemblers = AssemblerRegistry::new();
    let base = assemblers
        .define("Base")
        .builder(&builder)
        .parts(["top"])
        .place("top", |_| Ok(Metadata::at(Location::new(0.0, 0.0, 10.0)).named("Lid")))
        .finish()
        .unwrap();
    let child = assemblers
        .define("Child")
        .extends(&base)
        .place("Top", |_| Ok(Metadata::at(Location::new(0.0, 0.0, 20.0))))
        .finish()
        .unwrap();

    let store = DimensionStore::basic(GlobalDimensions::new(1.0, 1.0, 1.0)).unwrap();
    let placed = child.instantiate(&store).resolved_metadata().unwrap();
    let top = &placed[&normalize("top").unwrap()];
    assert_relative_eq!(top.location.translation().z, 20.0);
    // The parent's name is not merged in.
    assert_eq!(top.name, "top");
    assert_eq!(child.builder().name(), "B");
}

#[test]
fn collision_between_text_and_token() {
    let mut builders = BuilderRegistry::<(), u8>::new();
    let err = builders
        .define("Clash")
        .part_types(["Top"])
        .part_types([Panel::Top])
        .finish()
        .unwrap_err();
    match err {
        Error::AmbiguousMapping { owner, kind, key, first, second } => {
            assert_eq!(owner, "Clash");
            assert_eq!(kind, EntryKind::PartType);
            assert_eq!(key.as_str(), "top");
            assert_eq!((first.as_str(), second.as_str()), ("Top", "top"));
        }
        other => panic!("expected AmbiguousMapping, got {other:?}"),
    }
}

#[test]
fn missing_routine_names_part_type() {
    let mut builders = BuilderRegistry::<(), u8>::new();
    let err = builders
        .define("Half")
        .part_types(["bottom", "side_panel"])
        .register("bottom", |_| Ok(0))
        .finish()
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("side_panel"), "{message}");
    assert!(message.contains("Half"), "{message}");
}

#[test]
fn identity_mapping_shortcut() {
    let mut builders = BuilderRegistry::<(), String>::new();
    let builder = builders
        .define("Same")
        .part_types(["top", "bottom"])
        .register("top", |_| Ok("top".into()))
        .register("bottom", |_| Ok("bottom".into()))
        .finish()
        .unwrap();
    let mut assemblers = AssemblerRegistry::new();
    let assembler = assemblers
        .define("SameParts")
        .builder(&builder)
        .parts(["Top", "Bottom"])
        .place("top", |_| Ok(Metadata::default()))
        .place("bottom", |_| Ok(Metadata::default()))
        .finish()
        .unwrap();

    let store = DimensionStore::basic(GlobalDimensions::new(1.0, 1.0, 1.0)).unwrap();
    let instance = assembler.instantiate(&store);
    let map = instance.resolved_part_map();
    assert_eq!(map[&normalize("top").unwrap()].as_str(), "top");
    assert_eq!(map[&normalize("bottom").unwrap()].as_str(), "bottom");
    assert_eq!(instance.builder().build_part("BOTTOM").unwrap(), "bottom");
}

#[test]
fn diamond_inheritance() {
    let mut builders = BuilderRegistry::<(), &'static str>::new();
    let base = builders
        .define("Base")
        .part_types(["panel", "lid"])
        .register("panel", |_| Ok("base"))
        .register("lid", |_| Ok("base"))
        .finish()
        .unwrap();
    let grooved = builders
        .define("Grooved")
        .extends(&base)
        .register("panel", |_| Ok("grooved"))
        .finish()
        .unwrap();
    let hinged = builders
        .define("Hinged")
        .extends(&base)
        .register("panel", |_| Ok("hinged"))
        .register("lid", |_| Ok("hinged"))
        .finish()
        .unwrap();
    let both = builders
        .define("Both")
        .extends(&grooved)
        .extends(&hinged)
        .finish()
        .unwrap();

    let store = DimensionStore::basic(GlobalDimensions::new(1.0, 1.0, 1.0)).unwrap();
    assert_eq!(both.chain(), ["Base", "Hinged", "Grooved", "Both"]);
    assert_eq!(both.get_part(&store, "panel").unwrap(), "grooved");
    assert_eq!(both.get_part(&store, "lid").unwrap(), "hinged");

    let err = builders
        .define("Backwards")
        .extends(&base)
        .extends(&grooved)
        .finish()
        .unwrap_err();
    assert!(matches!(err, Error::InconsistentHierarchy { .. }));
}

#[test]
fn derived_assembler_swaps_builder() {
    let mut builders = BuilderRegistry::<(), &'static str>::new();
    let plain = builders
        .define("Plain")
        .part_types(["panel"])
        .register("panel", |_| Ok("plain"))
        .finish()
        .unwrap();
    let fancy = builders
        .define("Fancy")
        .extends(&plain)
        .register("panel", |_| Ok("fancy"))
        .finish()
        .unwrap();

    let mut assemblers = AssemblerRegistry::new();
    let base = assemblers
        .define("Shelf")
        .builder(&plain)
        .parts(["left", "right"])
        .map_parts([("left", "panel"), ("right", "panel")])
        .place("left", |_| Ok(Metadata::at(Location::new(-1.0, 0.0, 0.0))))
        .place("right", |_| Ok(Metadata::at(Location::new(1.0, 0.0, 0.0))))
        .finish()
        .unwrap();
    let derived = assemblers
        .define("FancyShelf")
        .extends(&base)
        .builder(&fancy)
        .finish()
        .unwrap();

    let store = DimensionStore::basic(GlobalDimensions::new(1.0, 1.0, 1.0)).unwrap();
    let instance = derived.instantiate(&store);
    assert_eq!(instance.builder().build_part("panel").unwrap(), "fancy");
    assert_eq!(base.builder().name(), "Plain");
}

#[test]
fn configured_project_store() {
    let config = ProjectConfig::from_toml_str(
        r#"
        [dimensions]
        x_len = 400.0
        y_len = 200.0
        z_len = 200.0

        [dimensions.attributes]
        mat_thickness = 9.0

        [part_types.bottom]
        extents = [380.0, 180.0, 9.0]
        "#,
    )
    .unwrap();
    let store = DimensionStore::from_config(config).unwrap();
    assert_eq!(store["Bottom"].z_len, 9.0);
    assert_eq!(store.number_for("bottom", "mat_thickness").unwrap(), 9.0);
}
