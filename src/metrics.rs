//! Resolver counters, spec §6.
//!
//! Each field is a plain `u64` rather than an atomic: per spec §5 every
//! method is resolved by exactly one thread, so per-method metrics are
//! built single-threaded and only combined (summed) after the parallel
//! phase, mirroring the teacher's per-thread-then-reduce pattern for gas
//! accounting.

/// Counters emitted by [`crate::resolver::ReferenceResolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolverMetrics {
    /// Method references rewritten to a more specific non-null definition.
    pub method_refs_resolved: u64,
    /// Field references rewritten to a more specific non-null definition.
    pub field_refs_resolved: u64,
    /// `invoke-virtual` sites narrowed to a more specific override.
    pub num_invoke_virtual_refined: u64,
    /// `invoke-interface` sites rewritten to `invoke-virtual`.
    pub num_invoke_interface_replaced: u64,
    /// `invoke-super` sites rewritten to `invoke-virtual` (desuperified).
    pub num_invoke_super_removed: u64,
    /// Methods recorded as return-type specialization candidates.
    pub num_rtype_specialization_candidates: u64,
    /// Instructions visited by the resolver, for test sanity-checking of
    /// coverage; not part of spec.md's counter set.
    pub sites_visited: u64,
}

impl ResolverMetrics {
    /// Combine two thread-local counter sets. Commutative and associative,
    /// so the parallel reduction (spec §5) can fold in any order.
    pub fn combine(self, other: Self) -> Self {
        Self {
            method_refs_resolved: self.method_refs_resolved + other.method_refs_resolved,
            field_refs_resolved: self.field_refs_resolved + other.field_refs_resolved,
            num_invoke_virtual_refined: self.num_invoke_virtual_refined + other.num_invoke_virtual_refined,
            num_invoke_interface_replaced: self.num_invoke_interface_replaced + other.num_invoke_interface_replaced,
            num_invoke_super_removed: self.num_invoke_super_removed + other.num_invoke_super_removed,
            num_rtype_specialization_candidates: self.num_rtype_specialization_candidates
                + other.num_rtype_specialization_candidates,
            sites_visited: self.sites_visited + other.sites_visited,
        }
    }
}
