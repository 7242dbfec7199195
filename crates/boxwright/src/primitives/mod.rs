//! Ready-made parametric assemblies built on the reference kernel.

pub mod basic_box;

pub use basic_box::BasicBox;
