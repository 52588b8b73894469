//! Shared test fixtures for the end-to-end scenarios in `tests/`.
//!
//! Mirrors the teacher's `tests/test_helpers.rs`: one `pub fn`/struct per
//! reusable piece of test setup, imported with `mod support;` per test file.

use std::collections::HashMap;

use dex_typeflow::ir::{
    BlockId, Cfg, CfgMut, ClassHierarchy, ClassName, FieldRef, InstructionId, InvokeKind, MemberKind, MethodRef,
    MinSdkSurface, Opcode,
};

/// A single straight-line method body with no branches — every scenario in
/// spec §8 fits in one block.
pub struct LinearCfg {
    register_count: usize,
    block: BlockId,
    instructions: Vec<Opcode>,
}

impl LinearCfg {
    pub fn new(register_count: usize, instructions: Vec<Opcode>) -> Self {
        Self { register_count, block: BlockId(0), instructions }
    }
}

impl Cfg for LinearCfg {
    fn register_count(&self) -> usize {
        self.register_count
    }

    fn entry_block(&self) -> Option<BlockId> {
        Some(self.block)
    }

    fn blocks(&self) -> Vec<BlockId> {
        vec![self.block]
    }

    fn instructions(&self, block: BlockId) -> &[Opcode] {
        assert_eq!(block, self.block);
        &self.instructions
    }

    fn predecessors(&self, _block: BlockId) -> Vec<BlockId> {
        Vec::new()
    }

    fn successors(&self, _block: BlockId) -> Vec<BlockId> {
        Vec::new()
    }
}

impl CfgMut for LinearCfg {
    fn set_instruction(&mut self, block: BlockId, index: usize, opcode: Opcode) {
        assert_eq!(block, self.block);
        self.instructions[index] = opcode;
    }
}

/// Helper to address the Nth instruction of a [`LinearCfg`] in assertions.
pub fn insn(index: usize) -> InstructionId {
    InstructionId { block: BlockId(0), index: index as u32 }
}

/// A two-block method body (one conditional branch merging back), used by
/// tests that exercise join points.
pub struct BranchingCfg {
    register_count: usize,
    blocks: HashMap<BlockId, Vec<Opcode>>,
    preds: HashMap<BlockId, Vec<BlockId>>,
    succs: HashMap<BlockId, Vec<BlockId>>,
}

impl BranchingCfg {
    pub fn new(register_count: usize, blocks: Vec<(BlockId, Vec<Opcode>, Vec<BlockId>)>) -> Self {
        let mut block_map = HashMap::new();
        let mut succs = HashMap::new();
        let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for (id, insns, block_succs) in blocks {
            for &s in &block_succs {
                preds.entry(s).or_default().push(id);
            }
            block_map.insert(id, insns);
            succs.insert(id, block_succs);
        }
        Self { register_count, blocks: block_map, preds, succs }
    }
}

impl Cfg for BranchingCfg {
    fn register_count(&self) -> usize {
        self.register_count
    }

    fn entry_block(&self) -> Option<BlockId> {
        Some(BlockId(0))
    }

    fn blocks(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.blocks.keys().copied().collect();
        ids.sort_by_key(|b| b.0);
        ids
    }

    fn instructions(&self, block: BlockId) -> &[Opcode] {
        self.blocks.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.preds.get(&block).cloned().unwrap_or_default()
    }

    fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.succs.get(&block).cloned().unwrap_or_default()
    }
}

/// A class hierarchy that accepts everything: every method/field ref
/// already names its own resolution, nothing is external, everything is
/// public and accessible. Scenarios that need a specific resolution or
/// accessibility outcome define their own small `ClassHierarchy` instead
/// (as `lattice::reference`'s unit tests do with `NoHierarchy`).
pub struct PermissiveHierarchy;

impl ClassHierarchy for PermissiveHierarchy {
    fn resolve_method(&self, method: &MethodRef, _kind: InvokeKind, _caller: &ClassName) -> Option<MethodRef> {
        Some(method.clone())
    }

    fn resolve_field(&self, field: &FieldRef, _kind: MemberKind) -> Option<FieldRef> {
        Some(field.clone())
    }

    fn is_subtype(&self, sub: &ClassName, sup: &ClassName) -> bool {
        sub == sup
    }

    fn least_common_supertype(&self, a: &ClassName, b: &ClassName) -> Option<ClassName> {
        if a == b {
            Some(a.clone())
        } else {
            None
        }
    }

    fn is_external(&self, _class: &ClassName) -> bool {
        false
    }

    fn is_public(&self, _class: &ClassName) -> bool {
        true
    }

    fn set_public(&self, _class: &ClassName) {}

    fn is_interface(&self, _class: &ClassName) -> bool {
        false
    }

    fn is_final_method(&self, _method: &MethodRef) -> bool {
        false
    }

    fn is_accessible(&self, _method: &MethodRef, _caller: &ClassName) -> bool {
        true
    }

    fn overriding_methods(&self, _method: &MethodRef) -> Vec<MethodRef> {
        Vec::new()
    }
}

/// A min-SDK surface that either contains everything or nothing,
/// configurable per test.
pub struct FixedMinSdk {
    pub present: bool,
}

impl MinSdkSurface for FixedMinSdk {
    fn has_method(&self, _method: &MethodRef) -> bool {
        self.present
    }

    fn has_field(&self, _field: &FieldRef) -> bool {
        self.present
    }
}
