//! Drives the fixpoint engine on one method and validates every instruction
//! against its preconditions, spec §4.4.

use tracing::{info, instrument};

use crate::config::CheckerConfig;
use crate::error::{CheckFailure, FatalResult, TypeError};
use crate::fixpoint::{self, FixpointResult};
use crate::ir::{Cfg, ClassHierarchy, ClassName, InstructionId, MethodSignature, RegisterId};
use crate::lattice::IRType;
use crate::transfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckerState {
    Pending,
    Complete,
}

/// Type checks one method: runs the fixpoint engine, then sweeps
/// instructions for the first precondition violation.
pub struct TypeChecker<'a> {
    cfg: &'a dyn Cfg,
    hierarchy: &'a dyn ClassHierarchy,
    sig: MethodSignature,
    config: CheckerConfig,
    state: CheckerState,
    result: Option<FixpointResult>,
    failure: Option<CheckFailure>,
}

impl<'a> TypeChecker<'a> {
    /// Build a checker for `sig`'s method over `cfg`, configured with the
    /// validation modes in `config`.
    pub fn new(cfg: &'a dyn Cfg, hierarchy: &'a dyn ClassHierarchy, sig: MethodSignature, config: CheckerConfig) -> Self {
        Self { cfg, hierarchy, sig, config, state: CheckerState::Pending, result: None, failure: None }
    }

    /// Run the analysis and the validation sweep. Idempotent: the second and
    /// later calls are a no-op.
    #[instrument(skip(self), fields(declaring_class = %self.sig.declaring_class))]
    pub fn run(&mut self) -> FatalResult<()> {
        if self.state == CheckerState::Complete {
            return Ok(());
        }
        let result = fixpoint::analyze(self.cfg, self.hierarchy, &self.sig, self.config)?;
        self.failure = self.sweep(&result);
        if let Some(f) = &self.failure {
            info!(?f, "type check failed");
        }
        self.result = Some(result);
        self.state = CheckerState::Complete;
        Ok(())
    }

    fn sweep(&self, result: &FixpointResult) -> Option<CheckFailure> {
        for block in self.cfg.blocks() {
            for (index, opcode) in self.cfg.instructions(block).iter().enumerate() {
                let insn = self.cfg.instruction_id(block, index);
                if let Some(err) = result.violation(insn) {
                    return Some(CheckFailure::new(insn, err.clone()));
                }
                if self.config.contains(CheckerConfig::CHECK_NO_OVERWRITE_THIS) {
                    for dst in transfer::destinations(opcode) {
                        if let Some(err) = transfer::check_no_overwrite_this(&self.sig, dst) {
                            return Some(CheckFailure::new(insn, err));
                        }
                    }
                }
                if self.config.contains(CheckerConfig::VALIDATE_ACCESS) {
                    if let Some(err) = self.check_access(opcode) {
                        return Some(CheckFailure::new(insn, err));
                    }
                }
            }
        }
        None
    }

    fn check_access(&self, opcode: &crate::ir::Opcode) -> Option<TypeError> {
        use crate::ir::Opcode::*;
        match opcode {
            Invoke { method, .. } if !self.hierarchy.is_accessible(method, &self.sig.declaring_class) => {
                Some(TypeError::InaccessibleMember)
            }
            _ => None,
        }
    }

    /// Whether `run()` found no violation. Panics if called before `run()`.
    pub fn good(&self) -> bool {
        self.expect_complete();
        self.failure.is_none()
    }

    /// The negation of [`Self::good`].
    pub fn fail(&self) -> bool {
        !self.good()
    }

    /// A human-readable description of the first violation, or `"OK"`.
    pub fn what(&self) -> String {
        self.expect_complete();
        match &self.failure {
            Some(f) => f.to_string(),
            None => "OK".to_string(),
        }
    }

    /// The scalar type of `reg` at `insn`'s entry.
    pub fn get_type(&self, insn: InstructionId, reg: RegisterId) -> IRType {
        self.expect_complete();
        self.result.as_ref().unwrap().entry_environment(insn).get(reg).0
    }

    /// The concrete declared class of `reg` at `insn`'s entry, if known.
    pub fn get_dex_type(&self, insn: InstructionId, reg: RegisterId) -> Option<ClassName> {
        self.expect_complete();
        self.result.as_ref().unwrap().entry_environment(insn).get(reg).1.class
    }

    fn expect_complete(&self) {
        assert_eq!(self.state, CheckerState::Complete, "TypeChecker::run must be called before querying results");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FieldRef, MemberKind, MethodRef, Opcode};

    struct NoHierarchy;
    impl ClassHierarchy for NoHierarchy {
        fn resolve_method(&self, _: &MethodRef, _: crate::ir::InvokeKind, _: &ClassName) -> Option<MethodRef> {
            None
        }
        fn resolve_field(&self, _: &FieldRef, _: MemberKind) -> Option<FieldRef> {
            None
        }
        fn is_subtype(&self, a: &ClassName, b: &ClassName) -> bool {
            a == b
        }
        fn least_common_supertype(&self, _: &ClassName, _: &ClassName) -> Option<ClassName> {
            None
        }
        fn is_external(&self, _: &ClassName) -> bool {
            false
        }
        fn is_public(&self, _: &ClassName) -> bool {
            true
        }
        fn set_public(&self, _: &ClassName) {}
        fn is_interface(&self, _: &ClassName) -> bool {
            false
        }
        fn is_final_method(&self, _: &MethodRef) -> bool {
            false
        }
        fn is_accessible(&self, _: &MethodRef, _: &ClassName) -> bool {
            true
        }
        fn overriding_methods(&self, _: &MethodRef) -> Vec<MethodRef> {
            Vec::new()
        }
    }

    struct OneBlockCfg {
        register_count: usize,
        instructions: Vec<Opcode>,
    }

    impl Cfg for OneBlockCfg {
        fn register_count(&self) -> usize {
            self.register_count
        }
        fn entry_block(&self) -> Option<crate::ir::BlockId> {
            Some(crate::ir::BlockId(0))
        }
        fn blocks(&self) -> Vec<crate::ir::BlockId> {
            vec![crate::ir::BlockId(0)]
        }
        fn instructions(&self, _: crate::ir::BlockId) -> &[Opcode] {
            &self.instructions
        }
        fn predecessors(&self, _: crate::ir::BlockId) -> Vec<crate::ir::BlockId> {
            Vec::new()
        }
        fn successors(&self, _: crate::ir::BlockId) -> Vec<crate::ir::BlockId> {
            Vec::new()
        }
    }

    #[test]
    fn overwriting_receiver_register_fails_when_checked() {
        let cfg = OneBlockCfg {
            register_count: 1,
            instructions: vec![Opcode::Const { dst: RegisterId::Local(0), value: 0 }],
        };
        let sig = MethodSignature {
            receiver_register: Some(RegisterId::Local(0)),
            declaring_class: "LFoo;".to_string(),
            is_constructor: false,
            parameters: Vec::new(),
            return_type: None,
        };
        let hierarchy = NoHierarchy;
        let mut checker = TypeChecker::new(&cfg, &hierarchy, sig, CheckerConfig::CHECK_NO_OVERWRITE_THIS);
        checker.run().expect("no fatal error");

        assert!(checker.fail());
        assert!(matches!(
            checker.failure.as_ref().map(|f| &f.kind),
            Some(TypeError::OverwriteThis { .. })
        ));
    }

    #[test]
    fn wide_write_to_the_register_before_the_receiver_fails_when_checked() {
        let cfg = OneBlockCfg {
            register_count: 2,
            instructions: vec![Opcode::ConstWide { dst: RegisterId::Local(0), value: 0 }],
        };
        let sig = MethodSignature {
            receiver_register: Some(RegisterId::Local(1)),
            declaring_class: "LFoo;".to_string(),
            is_constructor: false,
            parameters: Vec::new(),
            return_type: None,
        };
        let hierarchy = NoHierarchy;
        let mut checker = TypeChecker::new(&cfg, &hierarchy, sig, CheckerConfig::CHECK_NO_OVERWRITE_THIS);
        checker.run().expect("no fatal error");

        assert!(checker.fail());
        assert!(matches!(
            checker.failure.as_ref().map(|f| &f.kind),
            Some(TypeError::OverwriteThis { .. })
        ));
    }

    #[test]
    fn overwriting_receiver_register_is_allowed_when_unchecked() {
        let cfg = OneBlockCfg {
            register_count: 1,
            instructions: vec![Opcode::Const { dst: RegisterId::Local(0), value: 0 }],
        };
        let sig = MethodSignature {
            receiver_register: Some(RegisterId::Local(0)),
            declaring_class: "LFoo;".to_string(),
            is_constructor: false,
            parameters: Vec::new(),
            return_type: None,
        };
        let hierarchy = NoHierarchy;
        let mut checker = TypeChecker::new(&cfg, &hierarchy, sig, CheckerConfig::empty());
        checker.run().expect("no fatal error");

        assert!(checker.good());
    }
}
