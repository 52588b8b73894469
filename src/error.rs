//! Error types for the type checker and reference resolver.
//!
//! Mirrors the split the teacher draws between a recoverable,
//! well-formed outcome (`PanicReason`, here `TypeError`) and a halting,
//! programmer-error outcome (`RuntimeError::Halt`, here `FatalError`).

use thiserror::Error;

use crate::ir::{InstructionId, RegisterId};

/// A single reportable type-checking failure.
///
/// Only the first error encountered by [`crate::checker::TypeChecker::run`]
/// is ever surfaced; see spec §7.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeError {
    /// A `TOP` (undefined) value was used as an instruction operand.
    #[error("register {reg:?} is undefined (TOP) at this use")]
    UndefinedOperand {
        /// Register that held `TOP`.
        reg: RegisterId,
    },

    /// A wide value's register pairing was broken: either a half was read
    /// narrow, or one half of a live wide pair was overwritten alone.
    #[error("wide register pairing broken at {reg:?}")]
    WideMismatch {
        /// Register where the mismatch was observed.
        reg: RegisterId,
    },

    /// An operand's scalar type did not satisfy the opcode's precondition.
    #[error("register {reg:?} has scalar type {found:?}, expected one satisfying the opcode's precondition")]
    ScalarTypeMismatch {
        /// Offending register.
        reg: RegisterId,
        /// The scalar type actually found.
        found: crate::lattice::IRType,
    },

    /// An operand's reference type did not satisfy the opcode's precondition
    /// (e.g. not a subtype of the expected class).
    #[error("register {reg:?} does not carry a reference type compatible with this use")]
    ReferenceTypeMismatch {
        /// Offending register.
        reg: RegisterId,
    },

    /// A `return`/`return-object`/`return-wide` value is incompatible with
    /// the method's declared return type.
    #[error("return value in register {reg:?} is incompatible with the declared return type")]
    ReturnTypeMismatch {
        /// Register holding the returned value.
        reg: RegisterId,
    },

    /// A referenced field or method is inaccessible from the caller under
    /// `validate_access`.
    #[error("referenced member is inaccessible from the caller")]
    InaccessibleMember,

    /// A write to the receiver register of an instance method, while
    /// `check_no_overwrite_this` is enabled.
    #[error("write to receiver register {reg:?} of an instance method")]
    OverwriteThis {
        /// The receiver register.
        reg: RegisterId,
    },
}

/// The first error observed while checking one method, paired with the
/// instruction at which it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at {instruction:?})")]
pub struct CheckFailure {
    /// Instruction at which the failure was observed.
    pub instruction: InstructionId,
    /// The kind of failure.
    pub kind: TypeError,
}

impl CheckFailure {
    /// Build a new failure record.
    pub fn new(instruction: InstructionId, kind: TypeError) -> Self {
        Self { instruction, kind }
    }
}

/// Programmer errors: a malformed CFG or a broken lattice invariant. These
/// are never produced by well-formed input and always abort the whole
/// process rather than being reported per-method (spec §7).
#[derive(Debug, Error)]
pub enum FatalError {
    /// The CFG has no entry block.
    #[error("CFG is missing an entry block")]
    MissingEntryBlock,

    /// The CFG's declared register count disagrees with an instruction's
    /// operand.
    #[error("register count mismatch: declared {declared}, referenced {referenced}")]
    RegisterCountMismatch {
        /// Declared register count (`N`).
        declared: usize,
        /// The out-of-range register index that was referenced.
        referenced: usize,
    },

    /// An instruction referenced a register outside `0..N`.
    #[error("out-of-bounds register access: {reg:?}")]
    OutOfBoundsRegister {
        /// The offending register.
        reg: RegisterId,
    },

    /// An internal lattice invariant (e.g. `join` not idempotent) was
    /// violated; indicates a bug in this crate, not in the analyzed method.
    #[error("internal lattice invariant broken: {0}")]
    LatticeInvariantBroken(String),
}

/// Convenience alias for a checker/resolver result that may hit a fatal,
/// process-aborting condition.
pub type FatalResult<T> = Result<T, FatalError>;
