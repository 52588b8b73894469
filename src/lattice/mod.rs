//! The abstract domains this crate computes over: the scalar lattice
//! (`IRType`), the reference domain (`DexTypeDomain`), and their product
//! as a per-register environment (`TypeEnvironment`).

mod environment;
mod reference;
mod scalar;

pub use environment::TypeEnvironment;
pub use reference::{DexTypeDomain, Nullness};
pub use scalar::IRType;
