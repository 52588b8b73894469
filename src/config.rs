//! Configuration for the type checker and reference resolver.
//!
//! `CheckerConfig` mirrors the teacher's `Checks` bitflags
//! (`checked_transaction.rs`): a small set of independently-toggleable
//! validation modes rather than a boolean per option.

use bitflags::bitflags;

bitflags! {
    /// Validation modes for [`crate::checker::TypeChecker`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CheckerConfig: u8 {
        /// Reject a referenced field/method that is inaccessible from the
        /// caller.
        const VALIDATE_ACCESS = 1 << 0;
        /// Reject a `move`/`move-wide`/`move-object` whose source is `TOP`.
        /// When unset, such a move propagates `TOP` silently (matching the
        /// platform verifier's permissive behavior).
        const VERIFY_MOVES = 1 << 1;
        /// Reject any write to the receiver register of an instance method.
        const CHECK_NO_OVERWRITE_THIS = 1 << 2;
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self::VALIDATE_ACCESS | Self::CHECK_NO_OVERWRITE_THIS
    }
}

/// Configuration for [`crate::resolver::ReferenceResolver`], spec §6.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Permit rewriting refs to targets owned by platform/external classes,
    /// still gated by the configured `MinSdkSurface`.
    pub refine_to_external: bool,
    /// Enable the `invoke-super` -> `invoke-virtual` rewrite when the
    /// resolved callee is `final` and non-external.
    pub desuperify: bool,
    /// Collect and apply return-type specializations, then re-run virtual
    /// refinement once.
    pub specialize_rtype: bool,
    /// Fully-qualified-name prefixes that veto an inferred rewrite whose
    /// target name starts with one of them.
    pub excluded_externals: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            refine_to_external: false,
            desuperify: true,
            specialize_rtype: false,
            excluded_externals: Vec::new(),
        }
    }
}

impl ResolverConfig {
    /// Whether `name` is vetoed by `excluded_externals`.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_externals.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}
