//! The per-program-point abstract state (`TypeEnvironment`), spec §3.
//!
//! A `RegisterId -> (IRType, DexTypeDomain)` mapping, itself forming a
//! lattice: the whole environment can be `Bottom` (this program point is
//! unreachable), or `Live` with a pointwise join over individual registers.

use std::collections::{HashMap, HashSet};

use crate::ir::{ClassHierarchy, RegisterId};
use crate::lattice::{DexTypeDomain, IRType};

/// The abstract state of all registers at one program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEnvironment {
    /// This program point has no reachable predecessor yet.
    Bottom,
    /// A reachable state; registers absent from the map are implicitly
    /// `(IRType::Top, DexTypeDomain::unknown())` — unconstrained.
    Live(HashMap<RegisterId, (IRType, DexTypeDomain)>),
}

impl TypeEnvironment {
    /// The unreachable environment.
    pub fn bottom() -> Self {
        Self::Bottom
    }

    /// An empty, reachable environment (every register unconstrained).
    pub fn live() -> Self {
        Self::Live(HashMap::new())
    }

    /// Whether this is the unreachable (`Bottom`) environment.
    pub fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }

    fn map(&self) -> Option<&HashMap<RegisterId, (IRType, DexTypeDomain)>> {
        match self {
            Self::Bottom => None,
            Self::Live(m) => Some(m),
        }
    }

    /// The abstract value of `reg`. `Bottom` on an unreachable environment
    /// propagates: every register reads as unreachable too.
    pub fn get(&self, reg: RegisterId) -> (IRType, DexTypeDomain) {
        match self.map().and_then(|m| m.get(&reg)) {
            Some(v) => v.clone(),
            None if self.is_bottom() => (IRType::Bottom, DexTypeDomain::unknown()),
            None => (IRType::Top, DexTypeDomain::unknown()),
        }
    }

    fn ensure_live(&mut self) -> &mut HashMap<RegisterId, (IRType, DexTypeDomain)> {
        if self.is_bottom() {
            *self = Self::Live(HashMap::new());
        }
        match self {
            Self::Live(m) => m,
            Self::Bottom => unreachable!("ensure_live just converted Bottom to Live"),
        }
    }

    /// Bind a narrow (single-register) value.
    pub fn set(&mut self, reg: RegisterId, scalar: IRType, dex: DexTypeDomain) {
        debug_assert!(!scalar.is_wide());
        self.invalidate_wide_pair_through(reg);
        self.ensure_live().insert(reg, (scalar, dex));
    }

    /// Bind a wide value, occupying `reg` and `reg.next()`.
    pub fn set_wide(&mut self, reg: RegisterId, low: IRType, high: IRType) {
        debug_assert!(low.is_wide() && high.is_wide());
        self.invalidate_wide_pair_through(reg);
        if let Some(next) = reg.next() {
            self.invalidate_wide_pair_through(next);
        }
        let map = self.ensure_live();
        map.insert(reg, (low, DexTypeDomain::unknown()));
        if let Some(next) = reg.next() {
            map.insert(next, (high, DexTypeDomain::unknown()));
        }
    }

    /// Clear `reg` to `TOP`. Used for destinations of unmodeled opcodes and
    /// for registers whose wide pairing was just broken.
    pub fn invalidate(&mut self, reg: RegisterId) {
        self.ensure_live().insert(reg, (IRType::Top, DexTypeDomain::unknown()));
    }

    /// If `reg` was the second half of a wide pair rooted at `reg.prev()`,
    /// or its own second half is about to be overwritten independently,
    /// break that pairing by invalidating the other half too.
    fn invalidate_wide_pair_through(&mut self, reg: RegisterId) {
        if let Some(prev) = reg.prev() {
            if let Some((ty, _)) = self.map().and_then(|m| m.get(&prev)).cloned() {
                if ty.is_wide() {
                    self.ensure_live().insert(prev, (IRType::Top, DexTypeDomain::unknown()));
                }
            }
        }
    }

    /// Pointwise least upper bound. `Bottom` is the identity element.
    pub fn join(&self, other: &Self, hierarchy: &dyn ClassHierarchy) -> Self {
        match (self, other) {
            (Self::Bottom, x) | (x, Self::Bottom) => x.clone(),
            (Self::Live(a), Self::Live(b)) => {
                let keys: HashSet<RegisterId> = a.keys().chain(b.keys()).copied().collect();
                let mut out = HashMap::with_capacity(keys.len());
                for reg in keys {
                    let (sa, da) = self.get(reg);
                    let (sb, db) = other.get(reg);
                    out.insert(reg, (sa.join(sb), da.join(&db, hierarchy)));
                }
                Self::Live(out)
            }
        }
    }

    /// Whether `self` is at least as precise as `other`.
    pub fn leq(&self, other: &Self, hierarchy: &dyn ClassHierarchy) -> bool {
        self.join(other, hierarchy) == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FieldRef, InvokeKind, MemberKind, MethodRef};

    struct NoHierarchy;
    impl ClassHierarchy for NoHierarchy {
        fn resolve_method(&self, _: &MethodRef, _: InvokeKind, _: &String) -> Option<MethodRef> {
            None
        }
        fn resolve_field(&self, _: &FieldRef, _: MemberKind) -> Option<FieldRef> {
            None
        }
        fn is_subtype(&self, a: &String, b: &String) -> bool {
            a == b
        }
        fn least_common_supertype(&self, _: &String, _: &String) -> Option<String> {
            None
        }
        fn is_external(&self, _: &String) -> bool {
            false
        }
        fn is_public(&self, _: &String) -> bool {
            true
        }
        fn set_public(&self, _: &String) {}
        fn is_interface(&self, _: &String) -> bool {
            false
        }
        fn is_final_method(&self, _: &MethodRef) -> bool {
            false
        }
        fn is_accessible(&self, _: &MethodRef, _: &String) -> bool {
            true
        }
        fn overriding_methods(&self, _: &MethodRef) -> Vec<MethodRef> {
            Vec::new()
        }
    }

    #[test]
    fn bottom_is_join_identity() {
        let h = NoHierarchy;
        let mut live = TypeEnvironment::live();
        live.set(RegisterId::Local(0), IRType::Int, DexTypeDomain::unknown());
        assert_eq!(TypeEnvironment::bottom().join(&live, &h), live);
        assert_eq!(live.join(&TypeEnvironment::bottom(), &h), live);
    }

    #[test]
    fn unmapped_register_reads_as_top() {
        let env = TypeEnvironment::live();
        assert_eq!(env.get(RegisterId::Local(5)).0, IRType::Top);
    }

    #[test]
    fn setting_one_half_of_wide_pair_invalidates_it() {
        let mut env = TypeEnvironment::live();
        env.set_wide(RegisterId::Local(0), IRType::Long1, IRType::Long2);
        assert_eq!(env.get(RegisterId::Local(1)).0, IRType::Long2);
        env.set(RegisterId::Local(0), IRType::Int, DexTypeDomain::unknown());
        assert_eq!(env.get(RegisterId::Local(0)).0, IRType::Int);
    }

    #[test]
    fn overwriting_second_half_alone_breaks_pairing() {
        let mut env = TypeEnvironment::live();
        env.set_wide(RegisterId::Local(0), IRType::Long1, IRType::Long2);
        env.set(RegisterId::Local(1), IRType::Int, DexTypeDomain::unknown());
        assert_eq!(env.get(RegisterId::Local(0)).0, IRType::Top);
    }

    #[test]
    fn join_combines_registers_from_both_sides() {
        let h = NoHierarchy;
        let mut a = TypeEnvironment::live();
        a.set(RegisterId::Local(0), IRType::Int, DexTypeDomain::unknown());
        let mut b = TypeEnvironment::live();
        b.set(RegisterId::Local(1), IRType::Short, DexTypeDomain::unknown());
        let joined = a.join(&b, &h);
        assert_eq!(joined.get(RegisterId::Local(0)).0, IRType::Top);
        assert_eq!(joined.get(RegisterId::Local(1)).0, IRType::Top);
    }
}
