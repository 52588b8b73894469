//! Interfaces consumed from the crate's external collaborators.
//!
//! Nothing in this module parses DEX files, builds a CFG, or constructs a
//! class hierarchy — those are external responsibilities (spec §1). This
//! module only declares the traits the core needs from them, in the style
//! of the teacher's `InterpreterStorage` trait (`storage/interpreter.rs`):
//! a minimal capability interface the core is generic over.

use std::fmt;

use crate::lattice::IRType;

/// Identifies a virtual register within one method, or the special
/// `RESULT` pseudo-register that holds the source of the last
/// `move-result*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterId {
    /// An ordinary virtual register, `0..register_count`.
    Local(u16),
    /// The pseudo-register holding the last `move-result*` source.
    Result,
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(r) => write!(f, "v{r}"),
            Self::Result => write!(f, "RESULT"),
        }
    }
}

impl RegisterId {
    /// The register immediately following this one, used for wide pairs.
    /// Returns `None` for the `RESULT` pseudo-register.
    pub fn next(self) -> Option<RegisterId> {
        match self {
            Self::Local(r) => Some(Self::Local(r.checked_add(1)?)),
            Self::Result => None,
        }
    }

    /// The register immediately preceding this one.
    pub fn prev(self) -> Option<RegisterId> {
        match self {
            Self::Local(r) => r.checked_sub(1).map(Self::Local),
            Self::Result => None,
        }
    }
}

/// Opaque identifier for one basic block within a method's CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Opaque identifier for one instruction within a method's CFG. Stable for
/// the lifetime of the analysis of a single method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionId {
    /// Block the instruction lives in.
    pub block: BlockId,
    /// Index of the instruction within its block.
    pub index: u32,
}

/// Dispatch kind for an `invoke-*` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// `invoke-virtual`: dynamic dispatch via the class vtable.
    Virtual,
    /// `invoke-super`: dispatch through the caller's supertype chain.
    Super,
    /// `invoke-interface`: dispatch via an interface method table.
    Interface,
    /// `invoke-static`: no receiver.
    Static,
    /// `invoke-direct`: private methods and constructors.
    Direct,
}

/// A fully-qualified class name, e.g. `Ljava/lang/Object;`.
pub type ClassName = String;

/// A method reference: owning class, name, and prototype (parameter and
/// return types), exactly as it appears in the instruction stream before
/// (or after) resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Declaring/owning class of the reference.
    pub owner: ClassName,
    /// Method name.
    pub name: String,
    /// Parameter types, in order.
    pub params: Vec<ClassName>,
    /// Return type.
    pub return_type: ClassName,
}

/// A field reference: owning class, name, and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Declaring/owning class of the reference.
    pub owner: ClassName,
    /// Field name.
    pub name: String,
    /// Field type.
    pub field_type: ClassName,
}

/// Search kind for field/method resolution: whether the member is looked
/// up as a static or instance member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Static field or method.
    Static,
    /// Instance field or method.
    Instance,
}

/// One simplified DEX opcode, covering the rule table in spec §4.2. Real
/// IR builders carry many more variants (and pack operands differently);
/// this is the subset the transfer function has rules for. Unhandled
/// opcodes fall through to a conservative `Unknown` rule (destination
/// becomes `TOP`, matching spec §4.3's permissive-engine philosophy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// `const/4`, `const/16`, `const`: load a 32-bit literal.
    Const { dst: RegisterId, value: i64 },
    /// `const-wide`, `const-wide/16`, `const-wide/32`: load a 64-bit literal.
    ConstWide { dst: RegisterId, value: i64 },
    /// `const-string`, `const-class`: load a known-class reference.
    ConstReference { dst: RegisterId, class: ClassName },
    /// `move`.
    Move { dst: RegisterId, src: RegisterId },
    /// `move-wide`.
    MoveWide { dst: RegisterId, src: RegisterId },
    /// `move-object`.
    MoveObject { dst: RegisterId, src: RegisterId },
    /// `move-result`, `move-result-object`, `move-result-wide`.
    MoveResult { dst: RegisterId, wide: bool },
    /// Binary integer arithmetic/logic (`add-int`, `and-int`, ...).
    BinaryIntOp { dst: RegisterId, lhs: RegisterId, rhs: RegisterId },
    /// Comparison producing an `int` (`cmp-long`, `cmpg-float`, ...).
    Compare { dst: RegisterId, lhs: RegisterId, rhs: RegisterId },
    /// `int-to-long`, `long-to-int`, `float-to-double`, `double-to-int`, ...:
    /// narrows or widens a scalar to `to`, consuming the wide pair at `src`
    /// if `from` is wide and producing a wide pair at `dst` if `to` is wide.
    Convert { dst: RegisterId, src: RegisterId, from: IRType, to: IRType },
    /// `if-eq`/`if-ne`/... comparing two (possibly object) operands.
    IfCompare { lhs: RegisterId, rhs: RegisterId },
    /// `check-cast T`.
    CheckCast { src: RegisterId, class: ClassName },
    /// `instance-of T`.
    InstanceOf { dst: RegisterId, src: RegisterId, class: ClassName },
    /// `new-instance T`.
    NewInstance { dst: RegisterId, class: ClassName },
    /// `new-array T`.
    NewArray { dst: RegisterId, size: RegisterId, element: ClassName },
    /// `array-length`.
    ArrayLength { dst: RegisterId, array: RegisterId },
    /// `aget`/`aget-object`/`aget-wide`/...
    ArrayGet { dst: RegisterId, array: RegisterId, index: RegisterId, element: ClassName },
    /// `aput`/`aput-object`/...
    ArrayPut { src: RegisterId, array: RegisterId, index: RegisterId, element: ClassName },
    /// `sget`/`iget` family.
    FieldGet { dst: RegisterId, obj: Option<RegisterId>, field: FieldRef, kind: MemberKind },
    /// `sput`/`iput` family.
    FieldPut { src: RegisterId, obj: Option<RegisterId>, field: FieldRef, kind: MemberKind },
    /// `invoke-*`.
    Invoke { receiver: Option<RegisterId>, args: Vec<RegisterId>, method: MethodRef, kind: InvokeKind },
    /// `return-void`.
    ReturnVoid,
    /// `return`/`return-wide`.
    Return { src: RegisterId, wide: bool },
    /// `return-object`.
    ReturnObject { src: RegisterId },
    /// `throw`.
    Throw { src: RegisterId },
    /// `monitor-enter`/`monitor-exit`.
    Monitor { src: RegisterId },
    /// `filled-new-array`: builds an array of `element` from `args`,
    /// leaving the result in the `RESULT` pseudo-register for a following
    /// `move-result-object`.
    FilledNewArray { args: Vec<RegisterId>, element: ClassName },
    /// `fill-array-data`: populates a previously-allocated array in place;
    /// no register is written.
    FillArrayData { array: RegisterId },
    /// Anything not modeled above: transfer is the identity except the
    /// (optional) destination becomes `TOP`.
    Unknown { dst: Option<RegisterId> },
}

/// Read-only access to one method's control-flow graph of instructions.
///
/// Implemented by the IR/CFG-builder collaborator; this crate only reads
/// through this trait (spec §6).
pub trait Cfg {
    /// Number of virtual registers declared for this method (`N`).
    fn register_count(&self) -> usize;

    /// The CFG's entry block.
    fn entry_block(&self) -> Option<BlockId>;

    /// All blocks in the CFG, in an arbitrary but stable order.
    fn blocks(&self) -> Vec<BlockId>;

    /// The instructions in one block, in execution order.
    fn instructions(&self, block: BlockId) -> &[Opcode];

    /// Map an `(block, index)` pair to its global instruction identity.
    fn instruction_id(&self, block: BlockId, index: usize) -> InstructionId {
        InstructionId { block, index: index as u32 }
    }

    /// Predecessor blocks of `block`.
    fn predecessors(&self, block: BlockId) -> Vec<BlockId>;

    /// Successor blocks of `block`.
    fn successors(&self, block: BlockId) -> Vec<BlockId>;

    /// Blocks in reverse postorder from the entry block.
    fn reverse_postorder(&self) -> Vec<BlockId> {
        let Some(entry) = self.entry_block() else {
            return Vec::new();
        };
        let mut visited = std::collections::HashSet::new();
        let mut postorder = Vec::new();
        self.dfs_postorder(entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    #[doc(hidden)]
    fn dfs_postorder(
        &self,
        block: BlockId,
        visited: &mut std::collections::HashSet<BlockId>,
        out: &mut Vec<BlockId>,
    ) {
        if !visited.insert(block) {
            return;
        }
        for succ in self.successors(block) {
            self.dfs_postorder(succ, visited, out);
        }
        out.push(block);
    }
}

/// Write access to one method's CFG, for the reference resolver's
/// instruction rewrites (spec §4.5). A separate trait from [`Cfg`] because
/// most consumers (the checker) only ever need read access.
pub trait CfgMut: Cfg {
    /// Replace the opcode at `(block, index)`.
    fn set_instruction(&mut self, block: BlockId, index: usize, opcode: Opcode);
}

/// Declared method signature, used to build the entry `TypeEnvironment`.
pub struct MethodSignature {
    /// Register holding the receiver (`None` for static methods).
    pub receiver_register: Option<RegisterId>,
    /// The declaring class, used as the receiver's type (or the basis for
    /// `UNINITIALIZED_THIS` in a constructor).
    pub declaring_class: ClassName,
    /// Whether this method is a constructor (`<init>`).
    pub is_constructor: bool,
    /// Parameter registers, in order, paired with their declared type.
    pub parameters: Vec<(RegisterId, ClassName)>,
    /// Declared return type, or `None` for `void`.
    pub return_type: Option<ClassName>,
}

/// Read-only access to the whole-program class hierarchy and member
/// resolution, built once before the parallel analysis phase begins and
/// immutable thereafter except for [`ClassHierarchy::set_public`] (spec
/// §5, §6).
pub trait ClassHierarchy {
    /// Resolve a method reference against the hierarchy for the given
    /// dispatch kind, starting the search from `caller`'s perspective.
    fn resolve_method(&self, method: &MethodRef, kind: InvokeKind, caller: &ClassName) -> Option<MethodRef>;

    /// Resolve a field reference via static or instance field search.
    fn resolve_field(&self, field: &FieldRef, kind: MemberKind) -> Option<FieldRef>;

    /// Whether `sub` is a (reflexive) subtype of `sup`.
    fn is_subtype(&self, sub: &ClassName, sup: &ClassName) -> bool;

    /// The least common supertype of two classes, if any is known.
    fn least_common_supertype(&self, a: &ClassName, b: &ClassName) -> Option<ClassName>;

    /// Whether `class` is external (defined by the platform/SDK, not the
    /// program being optimized).
    fn is_external(&self, class: &ClassName) -> bool;

    /// Whether `class` is public.
    fn is_public(&self, class: &ClassName) -> bool;

    /// Promote `class` to public. Must be idempotent and safe to call
    /// concurrently from multiple analysis threads (spec §5).
    fn set_public(&self, class: &ClassName);

    /// Whether `class` is an interface.
    fn is_interface(&self, class: &ClassName) -> bool;

    /// Whether `method` is declared `final`.
    fn is_final_method(&self, method: &MethodRef) -> bool;

    /// Whether `method` is accessible from `caller` under normal visibility
    /// rules.
    fn is_accessible(&self, method: &MethodRef, caller: &ClassName) -> bool;

    /// All concrete overriders of `method` across the hierarchy, in a
    /// deterministic order (spec §9's open question on tie-breaking is
    /// resolved by deferring entirely to this order).
    fn overriding_methods(&self, method: &MethodRef) -> Vec<MethodRef>;
}

/// Membership test against the configured minimum-SDK API surface (spec §6).
pub trait MinSdkSurface {
    /// Whether `method` is present at the configured minimum SDK level.
    fn has_method(&self, method: &MethodRef) -> bool;

    /// Whether `field` is present at the configured minimum SDK level.
    /// Not named in spec.md's external-interfaces table, but required to
    /// fully implement its own external-field-gate scenario (spec §8,
    /// scenario 5): an external field rewrite needs the same min-SDK
    /// membership test an external method rewrite gets.
    fn has_field(&self, field: &FieldRef) -> bool;
}
