//! Monotone forward dataflow over a method's CFG, spec §4.3.
//!
//! The engine itself never errors: precondition violations are swallowed
//! into `TOP` destinations (spec's permissive-engine design). Violations are
//! still recorded per instruction so the checker sweep doesn't have to
//! recompute the transfer function a second time.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::config::CheckerConfig;
use crate::error::{FatalError, FatalResult, TypeError};
use crate::ir::{BlockId, Cfg, ClassHierarchy, InstructionId, MethodSignature, RegisterId};
use crate::lattice::TypeEnvironment;
use crate::transfer;

/// Per-instruction entry environment, plus the violation (if any) that the
/// transfer function observed when stepping across that instruction.
pub struct FixpointResult {
    entry_environments: HashMap<InstructionId, TypeEnvironment>,
    violations: HashMap<InstructionId, TypeError>,
}

impl FixpointResult {
    /// The environment in effect just before `insn` executes.
    pub fn entry_environment(&self, insn: InstructionId) -> &TypeEnvironment {
        self.entry_environments.get(&insn).expect("instruction id from the analyzed CFG")
    }

    /// The first-observed precondition violation at `insn`, if any.
    pub fn violation(&self, insn: InstructionId) -> Option<&TypeError> {
        self.violations.get(&insn)
    }

    /// All instructions with a recorded violation, in no particular order.
    pub fn violating_instructions(&self) -> impl Iterator<Item = InstructionId> + '_ {
        self.violations.keys().copied()
    }
}

fn entry_environment_for_method<C: Cfg + ?Sized>(cfg: &C, sig: &MethodSignature) -> FatalResult<TypeEnvironment> {
    let mut env = TypeEnvironment::live();
    for (reg, class) in &sig.parameters {
        if let RegisterId::Local(r) = reg {
            if *r as usize >= cfg.register_count() {
                return Err(FatalError::OutOfBoundsRegister { reg: *reg });
            }
        }
        env.set(*reg, crate::lattice::IRType::Reference, crate::lattice::DexTypeDomain::exact(class.clone()));
    }
    if let Some(receiver) = sig.receiver_register {
        let dex = if sig.is_constructor {
            crate::lattice::DexTypeDomain::uninitialized(sig.declaring_class.clone())
        } else {
            crate::lattice::DexTypeDomain::exact(sig.declaring_class.clone())
        };
        env.set(receiver, crate::lattice::IRType::Reference, dex);
    }
    Ok(env)
}

fn block_exit<C: Cfg + ?Sized>(
    cfg: &C,
    block: BlockId,
    entry: &TypeEnvironment,
    hierarchy: &dyn ClassHierarchy,
    sig: &MethodSignature,
    config: CheckerConfig,
    entry_environments: &mut HashMap<InstructionId, TypeEnvironment>,
    violations: &mut HashMap<InstructionId, TypeError>,
) -> TypeEnvironment {
    let mut state = entry.clone();
    for (index, opcode) in cfg.instructions(block).iter().enumerate() {
        let insn = cfg.instruction_id(block, index);
        entry_environments.insert(insn, state.clone());
        let (next, violation) = transfer::step(opcode, &state, hierarchy, sig, config);
        match violation {
            Some(err) => {
                violations.insert(insn, err);
            }
            None => {
                violations.remove(&insn);
            }
        }
        state = next;
    }
    state
}

/// Run the fixpoint computation for one method.
pub fn analyze<C: Cfg + ?Sized>(
    cfg: &C,
    hierarchy: &dyn ClassHierarchy,
    sig: &MethodSignature,
    config: CheckerConfig,
) -> FatalResult<FixpointResult> {
    let Some(entry_block) = cfg.entry_block() else {
        return Err(FatalError::MissingEntryBlock);
    };
    let entry_env = entry_environment_for_method(cfg, sig)?;

    let rpo = cfg.reverse_postorder();
    let mut exit_states: HashMap<BlockId, TypeEnvironment> = HashMap::new();
    let mut worklist: VecDeque<BlockId> = rpo.into_iter().collect();
    let mut entry_environments = HashMap::new();
    let mut violations = HashMap::new();

    while let Some(block) = worklist.pop_front() {
        let entry = if block == entry_block {
            entry_env.clone()
        } else {
            let preds = cfg.predecessors(block);
            preds.iter().fold(TypeEnvironment::bottom(), |acc, &pred| {
                let pred_exit = exit_states.get(&pred).cloned().unwrap_or_else(TypeEnvironment::bottom);
                acc.join(&pred_exit, hierarchy)
            })
        };

        let previous = exit_states.get(&block).cloned();
        let next =
            block_exit(cfg, block, &entry, hierarchy, sig, config, &mut entry_environments, &mut violations);

        if previous.as_ref() != Some(&next) {
            trace!(?block, "fixpoint: block exit state changed");
            exit_states.insert(block, next);
            for succ in cfg.successors(block) {
                if !worklist.contains(&succ) {
                    worklist.push_back(succ);
                }
            }
        }
    }

    Ok(FixpointResult { entry_environments, violations })
}
