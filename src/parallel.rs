//! Parallel-across-methods analysis entry point, spec §5.
//!
//! Gated behind the `parallel` feature; the teacher's own production code
//! does not use `rayon` (only its dev-dependencies do), so this is an
//! enrichment drawn from the pack's other examples rather than from the
//! teacher itself (see `DESIGN.md`).

use rayon::prelude::*;

use crate::config::ResolverConfig;
use crate::error::FatalResult;
use crate::ir::{CfgMut, ClassHierarchy, MethodRef, MethodSignature, MinSdkSurface};
use crate::metrics::ResolverMetrics;
use crate::resolver::ReferenceResolver;

/// Run the reference resolver over every method in `methods`, in parallel,
/// and combine their metrics.
///
/// `hierarchy` and `min_sdk` are shared, read-only across the whole scope
/// (spec §5); each method's CFG is exclusively owned by the thread
/// processing it, so no two threads ever touch the same method.
pub fn analyze_scope<C>(
    methods: &mut [(C, MethodRef, MethodSignature)],
    hierarchy: &(dyn ClassHierarchy + Sync),
    min_sdk: &(dyn MinSdkSurface + Sync),
    config: &ResolverConfig,
) -> FatalResult<ResolverMetrics>
where
    C: CfgMut + Send,
{
    methods
        .par_iter_mut()
        .map(|(cfg, method, sig)| {
            let mut resolver = ReferenceResolver::new(hierarchy, min_sdk, config.clone());
            resolver.run(cfg, method, sig)?;
            Ok(resolver.metrics())
        })
        .try_reduce(ResolverMetrics::default, |a, b| Ok(a.combine(b)))
}
