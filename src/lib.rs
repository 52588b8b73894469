//! Per-method type inference, type checking, and reference resolution for
//! a register-based Dalvik-style bytecode IR.
//!
//! This crate has no file format and no pass manager of its own: it
//! consumes a method's CFG and class hierarchy through the traits in
//! [`ir`], and exposes a [`checker::TypeChecker`] and a
//! [`resolver::ReferenceResolver`] that a host optimizer drives, one
//! method at a time (or, with the `parallel` feature, across many methods
//! at once via [`analyze_scope`]).

pub mod checker;
pub mod config;
pub mod error;
pub mod fixpoint;
pub mod ir;
pub mod lattice;
pub mod metrics;
pub mod resolver;
pub mod transfer;

#[cfg(feature = "parallel")]
mod parallel;
#[cfg(feature = "parallel")]
pub use parallel::analyze_scope;

pub mod prelude {
    //! Commonly imported items for a host optimizer integrating this crate.
    pub use crate::checker::TypeChecker;
    pub use crate::config::{CheckerConfig, ResolverConfig};
    pub use crate::error::{CheckFailure, FatalError, TypeError};
    pub use crate::ir::{Cfg, CfgMut, ClassHierarchy, MethodSignature, MinSdkSurface};
    pub use crate::lattice::{DexTypeDomain, IRType, Nullness, TypeEnvironment};
    pub use crate::metrics::ResolverMetrics;
    pub use crate::resolver::ReferenceResolver;

    #[cfg(feature = "parallel")]
    pub use crate::analyze_scope;
}
