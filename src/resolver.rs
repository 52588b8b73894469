//! Consumes inferred types to rebind method/field references, devirtualize,
//! desuperify, and (optionally) specialize return types, spec §4.5.
//!
//! Every rewrite is conservative: any uncertainty leaves the site
//! unchanged. The resolver never errors; outcomes are only ever reflected
//! in [`ResolverMetrics`].

use itertools::Itertools;
use tracing::{instrument, trace};

use crate::config::{CheckerConfig, ResolverConfig};
use crate::error::FatalResult;
use crate::fixpoint;
use crate::ir::{CfgMut, ClassHierarchy, FieldRef, InvokeKind, MemberKind, MethodRef, MethodSignature, MinSdkSurface, Opcode};
use crate::metrics::ResolverMetrics;

/// Runs the reference resolver over one method at a time.
pub struct ReferenceResolver<'a> {
    hierarchy: &'a dyn ClassHierarchy,
    min_sdk: &'a dyn MinSdkSurface,
    config: ResolverConfig,
    metrics: ResolverMetrics,
}

impl<'a> ReferenceResolver<'a> {
    /// Build a resolver over a shared, read-only class hierarchy and
    /// min-SDK surface.
    pub fn new(hierarchy: &'a dyn ClassHierarchy, min_sdk: &'a dyn MinSdkSurface, config: ResolverConfig) -> Self {
        Self { hierarchy, min_sdk, config, metrics: ResolverMetrics::default() }
    }

    /// Counters accumulated across every [`Self::run`] call so far.
    pub fn metrics(&self) -> ResolverMetrics {
        self.metrics
    }

    /// Resolve and rewrite every instruction of one method in place.
    ///
    /// `method` identifies the method being analyzed (used to look up its
    /// overriders when considering a return-type specialization).
    #[instrument(skip(self, cfg), fields(declaring_class = %sig.declaring_class))]
    pub fn run(&mut self, cfg: &mut dyn CfgMut, method: &MethodRef, sig: &MethodSignature) -> FatalResult<()> {
        let result = fixpoint::analyze(&*cfg, self.hierarchy, sig, CheckerConfig::empty())?;
        let mut specialization_sources: Vec<String> = Vec::new();

        for block in cfg.blocks() {
            for index in 0..cfg.instructions(block).len() {
                let insn = cfg.instruction_id(block, index);
                self.metrics.sites_visited += 1;
                let opcode = cfg.instructions(block)[index].clone();
                match &opcode {
                    Opcode::FieldGet { field, kind, .. } => {
                        if let Some(rewritten) = self.resolve_field(field, *kind) {
                            let mut next = opcode.clone();
                            if let Opcode::FieldGet { field, .. } = &mut next {
                                *field = rewritten;
                            }
                            cfg.set_instruction(block, index, next);
                        }
                    }
                    Opcode::FieldPut { field, kind, .. } => {
                        if let Some(rewritten) = self.resolve_field(field, *kind) {
                            let mut next = opcode.clone();
                            if let Opcode::FieldPut { field, .. } = &mut next {
                                *field = rewritten;
                            }
                            cfg.set_instruction(block, index, next);
                        }
                    }
                    Opcode::Invoke { receiver, method, kind, .. } => {
                        let entry = result.entry_environment(insn);
                        let receiver_class = receiver.and_then(|r| entry.get(r).1.class);
                        if let Some(rewritten) = self.resolve_invoke(method, *kind, &sig.declaring_class, receiver_class) {
                            let mut next = opcode.clone();
                            if let Opcode::Invoke { method, kind, .. } = &mut next {
                                *method = rewritten.method;
                                *kind = rewritten.kind;
                            }
                            cfg.set_instruction(block, index, next);
                        }
                    }
                    Opcode::ReturnObject { src } => {
                        if self.config.specialize_rtype {
                            let entry = result.entry_environment(insn);
                            if let Some(class) = entry.get(*src).1.class {
                                specialization_sources.push(class);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.config.specialize_rtype {
            self.collect_specialization(method, sig, specialization_sources);
        }

        Ok(())
    }

    fn resolve_field(&mut self, field: &FieldRef, kind: MemberKind) -> Option<FieldRef> {
        let resolved = self.hierarchy.resolve_field(field, kind)?;
        if &resolved == field {
            return None;
        }
        if !self.accept_target(&resolved.owner) {
            return None;
        }
        if self.hierarchy.is_external(&resolved.owner)
            && !(self.config.refine_to_external && self.min_sdk.has_field(&resolved))
        {
            return None;
        }
        self.hierarchy.set_public(&resolved.owner);
        self.metrics.field_refs_resolved += 1;
        trace!(?field, ?resolved, "resolved field reference");
        Some(resolved)
    }

    fn resolve_invoke(
        &mut self,
        method: &MethodRef,
        kind: InvokeKind,
        caller: &str,
        receiver_class: Option<String>,
    ) -> Option<ResolvedInvoke> {
        let base = self.hierarchy.resolve_method(method, kind, &caller.to_string())?;
        let mut target = base.clone();
        let mut target_kind = kind;
        let mut rewrote_base = &base != method;
        let mut refined_virtual = false;
        let mut replaced_interface = false;
        let mut removed_super = false;

        if matches!(kind, InvokeKind::Virtual | InvokeKind::Interface) {
            if let Some(class) = receiver_class {
                if let Some(refined) = self.hierarchy.resolve_method(&base, InvokeKind::Virtual, &class) {
                    if &refined != &target
                        && self.accept_target(&refined.owner)
                        && self.hierarchy.is_accessible(&refined, &caller.to_string())
                    {
                        target = refined;
                        rewrote_base = true;
                        refined_virtual = true;
                    }
                }
            }
            if kind == InvokeKind::Interface && !self.hierarchy.is_interface(&target.owner) {
                target_kind = InvokeKind::Virtual;
                replaced_interface = true;
                rewrote_base = true;
            }
        }

        if kind == InvokeKind::Super
            && self.config.desuperify
            && self.hierarchy.is_final_method(&target)
            && !self.hierarchy.is_external(&target.owner)
            && !self.hierarchy.is_interface(&target.owner)
        {
            target_kind = InvokeKind::Virtual;
            removed_super = true;
            rewrote_base = true;
        }

        if !rewrote_base {
            return None;
        }
        if self.hierarchy.is_external(&target.owner) && !(self.config.refine_to_external && self.min_sdk.has_method(&target)) {
            return None;
        }
        if !self.accept_target(&target.owner) {
            return None;
        }
        self.hierarchy.set_public(&target.owner);
        self.metrics.method_refs_resolved += 1;
        if refined_virtual {
            self.metrics.num_invoke_virtual_refined += 1;
        }
        if replaced_interface {
            self.metrics.num_invoke_interface_replaced += 1;
        }
        if removed_super {
            self.metrics.num_invoke_super_removed += 1;
        }
        Some(ResolvedInvoke { method: target, kind: target_kind })
    }

    fn accept_target(&self, owner: &str) -> bool {
        !self.config.is_excluded(owner)
    }

    fn collect_specialization(&mut self, method: &MethodRef, sig: &MethodSignature, sources: Vec<String>) {
        let Some(declared) = &sig.return_type else { return };
        let mut sources = sources.into_iter().unique();
        let Some(first) = sources.next() else { return };
        let joined = sources.fold(Some(first), |acc, class| match acc {
            Some(current) => self.hierarchy.least_common_supertype(&current, &class),
            None => None,
        });
        let Some(joined) = joined else { return };
        if &joined == declared || !self.hierarchy.is_subtype(&joined, declared) {
            return;
        }
        // A narrowed return type must still be compatible with what every
        // overrider promises its callers, spec §4.5.
        let compatible_with_overriders = self
            .hierarchy
            .overriding_methods(method)
            .iter()
            .all(|overrider| self.hierarchy.is_subtype(&overrider.return_type, &joined));
        if compatible_with_overriders {
            self.metrics.num_rtype_specialization_candidates += 1;
        }
    }
}

struct ResolvedInvoke {
    method: MethodRef,
    kind: InvokeKind,
}
