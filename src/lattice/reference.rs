//! The reference-type domain (`DexTypeDomain`), spec §3.
//!
//! Unlike the scalar lattice, class joins require consulting the external
//! class hierarchy (least-common-superclass), so `DexTypeDomain::join`/`leq`
//! take a `&dyn ClassHierarchy` rather than being pure.

use crate::ir::{ClassHierarchy, ClassName};

/// Nullness component of a reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Nullness {
    /// No information yet (the bottom of this sub-lattice).
    Unknown,
    /// Definitely not null.
    NotNull,
    /// Definitely null.
    Null,
    /// Null on some incoming path, not-null on another.
    MaybeNull,
}

impl Nullness {
    fn join(self, other: Self) -> Self {
        use Nullness::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => x,
            (MaybeNull, _) | (_, MaybeNull) => MaybeNull,
            (NotNull, NotNull) => NotNull,
            (Null, Null) => Null,
            (NotNull, Null) | (Null, NotNull) => MaybeNull,
        }
    }
}

/// The reference-type abstract domain: an optional concrete class plus
/// nullness, plus (not in spec.md's scalar lattice; see `SPEC_FULL.md` §3)
/// whether this register holds an object that has not yet completed
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DexTypeDomain {
    /// The most specific known class, or `None` if undetermined.
    pub class: Option<ClassName>,
    /// Nullness of this register.
    pub nullness: Nullness,
    /// Whether this register holds an object that has not yet completed
    /// construction: `this` before the chained `<init>` call in a
    /// constructor, or the immediate result of `new-instance` before its
    /// `<init>` call. Cleared by the transfer function once that call is
    /// observed; never set back.
    pub uninitialized: bool,
}

impl DexTypeDomain {
    /// No information: bottom of this domain.
    pub fn unknown() -> Self {
        Self { class: None, nullness: Nullness::Unknown, uninitialized: false }
    }

    /// The null constant.
    pub fn null() -> Self {
        Self { class: None, nullness: Nullness::Null, uninitialized: false }
    }

    /// A definitely-non-null instance of `class`.
    pub fn exact(class: ClassName) -> Self {
        Self { class: Some(class), nullness: Nullness::NotNull, uninitialized: false }
    }

    /// An object that has not yet completed construction.
    pub fn uninitialized(class: ClassName) -> Self {
        Self { class: Some(class), nullness: Nullness::NotNull, uninitialized: true }
    }

    /// Mark the chained `<init>` call as having run.
    pub fn initialize(&self) -> Self {
        Self { uninitialized: false, ..self.clone() }
    }

    /// Least upper bound under the given class hierarchy.
    pub fn join(&self, other: &Self, hierarchy: &dyn ClassHierarchy) -> Self {
        let class = match (&self.class, &other.class) {
            (None, c) | (c, None) => c.clone(),
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            (Some(a), Some(b)) => hierarchy.least_common_supertype(a, b),
        };
        Self {
            class,
            nullness: self.nullness.join(other.nullness),
            uninitialized: self.uninitialized || other.uninitialized,
        }
    }

    /// Whether `self` is at least as precise a fact as `other`.
    pub fn leq(&self, other: &Self, hierarchy: &dyn ClassHierarchy) -> bool {
        self.join(other, hierarchy) == *other
    }
}
