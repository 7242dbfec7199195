//! Assemble the basic box and print the assembly document as JSON.
//!
//! Run with `RUST_LOG=boxwright=trace` to see type resolution and placement.

use anyhow::Result;
use boxwright::primitives::basic_box::{BasicBox, Part};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let basic = BasicBox::define()?;
    let store = BasicBox::store(400.0, 200.0, 200.0, 9.0, 4.5)?;

    let assembler = basic.assembler.instantiate(&store);
    for (part, part_type) in assembler.resolved_part_map() {
        println!("{part:>20} -> {part_type}");
    }

    let lid_only = assembler.assemble_parts(&boxwright::SceneKernel, [Part::Top])?;
    println!("lid-only assembly has {} entry", lid_only.len());

    let doc = basic.assemble(&store)?;
    println!("{}", doc.to_json()?);
    Ok(())
}
