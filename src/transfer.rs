//! Per-instruction abstract semantics, spec §4.2.
//!
//! [`step`] is the one function the fixpoint engine calls for every
//! instruction. It never errors: a violated precondition is reported back
//! to the caller as an `Option<TypeError>` alongside a next environment in
//! which the destination became `TOP`, matching the permissive-engine
//! design (spec §4.3) — the [`crate::checker::TypeChecker`] sweep is what
//! turns the first such report into a hard failure.

use crate::config::CheckerConfig;
use crate::error::TypeError;
use crate::ir::{ClassHierarchy, InvokeKind, MethodSignature, Opcode, RegisterId};
use crate::lattice::{DexTypeDomain, IRType, TypeEnvironment};

type Step = (TypeEnvironment, Option<TypeError>);

fn require_defined(env: &TypeEnvironment, reg: RegisterId) -> Result<(IRType, DexTypeDomain), TypeError> {
    let (ty, dex) = env.get(reg);
    if ty == IRType::Top {
        Err(TypeError::UndefinedOperand { reg })
    } else {
        Ok((ty, dex))
    }
}

fn fail(mut env: TypeEnvironment, dst: RegisterId, err: TypeError) -> Step {
    env.invalidate(dst);
    (env, Some(err))
}

/// Advance `env` across one instruction.
pub fn step(
    opcode: &Opcode,
    env: &TypeEnvironment,
    hierarchy: &dyn ClassHierarchy,
    sig: &MethodSignature,
    config: CheckerConfig,
) -> Step {
    let mut env = env.clone();
    match opcode {
        Opcode::Const { dst, value } => {
            let ty = if *value == 0 { IRType::Zero } else { IRType::Const1 };
            let dex = if *value == 0 { DexTypeDomain::null() } else { DexTypeDomain::unknown() };
            env.set(*dst, ty, dex);
            (env, None)
        }

        Opcode::ConstWide { dst, .. } => {
            env.set_wide(*dst, IRType::Const2, IRType::Const2);
            (env, None)
        }

        Opcode::ConstReference { dst, class } => {
            env.set(*dst, IRType::Reference, DexTypeDomain::exact(class.clone()));
            (env, None)
        }

        Opcode::Move { dst, src } => match require_defined(&env, *src) {
            Ok((ty, dex)) if !ty.is_wide() => {
                env.set(*dst, ty, dex);
                (env, None)
            }
            Ok(_) => fail(env, *dst, TypeError::WideMismatch { reg: *src }),
            Err(_) if !config.contains(CheckerConfig::VERIFY_MOVES) => {
                env.set(*dst, IRType::Top, DexTypeDomain::unknown());
                (env, None)
            }
            Err(e) => fail(env, *dst, e),
        },

        Opcode::MoveWide { dst, src } => {
            let (low, _) = env.get(*src);
            let high = src.next().map(|r| env.get(r).0).unwrap_or(IRType::Top);
            if low.is_wide() && high.is_wide() {
                env.set_wide(*dst, low, high);
                (env, None)
            } else if low == IRType::Top {
                if config.contains(CheckerConfig::VERIFY_MOVES) {
                    fail(env, *dst, TypeError::UndefinedOperand { reg: *src })
                } else {
                    env.invalidate(*dst);
                    (env, None)
                }
            } else {
                fail(env, *dst, TypeError::WideMismatch { reg: *src })
            }
        }

        Opcode::MoveObject { dst, src } => match require_defined(&env, *src) {
            Ok((ty, dex)) if ty.is_reference() => {
                env.set(*dst, ty, dex);
                (env, None)
            }
            Ok(_) => fail(env, *dst, TypeError::ReferenceTypeMismatch { reg: *src }),
            Err(_) if !config.contains(CheckerConfig::VERIFY_MOVES) => {
                env.set(*dst, IRType::Top, DexTypeDomain::unknown());
                (env, None)
            }
            Err(e) => fail(env, *dst, e),
        },

        Opcode::MoveResult { dst, wide } => {
            if *wide {
                let (low, _) = env.get(RegisterId::Result);
                let high = RegisterId::Result.next().map(|r| env.get(r).0).unwrap_or(IRType::Top);
                env.set_wide(*dst, low, high);
            } else {
                let (ty, dex) = env.get(RegisterId::Result);
                env.set(*dst, ty, dex);
            }
            (env, None)
        }

        Opcode::BinaryIntOp { dst, lhs, rhs } => {
            for reg in [*lhs, *rhs] {
                match require_defined(&env, reg) {
                    Ok((ty, _)) if ty.is_integer() && !ty.is_wide() => {}
                    Ok((ty, _)) => return fail(env, *dst, TypeError::ScalarTypeMismatch { reg, found: ty }),
                    Err(e) => return fail(env, *dst, e),
                }
            }
            env.set(*dst, IRType::Int, DexTypeDomain::unknown());
            (env, None)
        }

        Opcode::Compare { dst, lhs, rhs } => {
            for reg in [*lhs, *rhs] {
                if let Err(e) = require_defined(&env, reg) {
                    return fail(env, *dst, e);
                }
            }
            env.set(*dst, IRType::Int, DexTypeDomain::unknown());
            (env, None)
        }

        Opcode::Convert { dst, src, from, to } => {
            let found = if from.is_wide() {
                env.get(*src).0
            } else {
                match require_defined(&env, *src) {
                    Ok((ty, _)) => ty,
                    Err(e) => return fail(env, *dst, e),
                }
            };
            let compatible = if from.is_wide() {
                found.leq(*from) || found == IRType::Top
            } else {
                found.leq(*from)
            };
            if !compatible {
                return fail(env, *dst, TypeError::ScalarTypeMismatch { reg: *src, found });
            }
            if to.is_wide() {
                env.set_wide(*dst, *to, *to);
            } else {
                env.set(*dst, *to, DexTypeDomain::unknown());
            }
            (env, None)
        }

        Opcode::IfCompare { lhs, rhs } => {
            for reg in [*lhs, *rhs] {
                if let Err(e) = require_defined(&env, reg) {
                    return (env, Some(e));
                }
            }
            (env, None)
        }

        Opcode::CheckCast { src, class } => match require_defined(&env, *src) {
            Ok((ty, _)) if ty.is_reference() => {
                env.set(*src, IRType::Reference, DexTypeDomain::exact(class.clone()));
                (env, None)
            }
            Ok(_) => fail(env, *src, TypeError::ReferenceTypeMismatch { reg: *src }),
            Err(e) => fail(env, *src, e),
        },

        Opcode::InstanceOf { dst, src, class: _ } => match require_defined(&env, *src) {
            Ok((ty, _)) if ty.is_reference() => {
                env.set(*dst, IRType::Boolean, DexTypeDomain::unknown());
                (env, None)
            }
            Ok(_) => fail(env, *dst, TypeError::ReferenceTypeMismatch { reg: *src }),
            Err(e) => fail(env, *dst, e),
        },

        Opcode::NewInstance { dst, class } => {
            env.set(*dst, IRType::Reference, DexTypeDomain::uninitialized(class.clone()));
            (env, None)
        }

        Opcode::NewArray { dst, size, element } => match require_defined(&env, *size) {
            Ok((ty, _)) if ty.is_integer() && !ty.is_wide() => {
                env.set(*dst, IRType::Reference, DexTypeDomain::exact(format!("[{element}")));
                (env, None)
            }
            Ok((ty, _)) => fail(env, *dst, TypeError::ScalarTypeMismatch { reg: *size, found: ty }),
            Err(e) => fail(env, *dst, e),
        },

        Opcode::ArrayLength { dst, array } => match require_defined(&env, *array) {
            Ok((ty, _)) if ty.is_reference() => {
                env.set(*dst, IRType::Int, DexTypeDomain::unknown());
                (env, None)
            }
            Ok(_) => fail(env, *dst, TypeError::ReferenceTypeMismatch { reg: *array }),
            Err(e) => fail(env, *dst, e),
        },

        Opcode::ArrayGet { dst, array, index, element } => {
            match require_defined(&env, *array) {
                Ok((ty, _)) if ty.is_reference() => {}
                Ok(_) => return fail(env, *dst, TypeError::ReferenceTypeMismatch { reg: *array }),
                Err(e) => return fail(env, *dst, e),
            }
            match require_defined(&env, *index) {
                Ok((ty, _)) if ty.is_integer() && !ty.is_wide() => {}
                Ok((ty, _)) => return fail(env, *dst, TypeError::ScalarTypeMismatch { reg: *index, found: ty }),
                Err(e) => return fail(env, *dst, e),
            }
            env.set(*dst, IRType::Reference, DexTypeDomain::exact(element.clone()));
            (env, None)
        }

        Opcode::ArrayPut { src, array, index, element: _ } => {
            match require_defined(&env, *array) {
                Ok((ty, _)) if ty.is_reference() => {}
                Ok(_) => return fail(env, *src, TypeError::ReferenceTypeMismatch { reg: *array }),
                Err(e) => return (env, Some(e)),
            }
            match require_defined(&env, *index) {
                Ok((ty, _)) if ty.is_integer() && !ty.is_wide() => {}
                Ok((ty, _)) => return (env, Some(TypeError::ScalarTypeMismatch { reg: *index, found: ty })),
                Err(e) => return (env, Some(e)),
            }
            if let Err(e) = require_defined(&env, *src) {
                return (env, Some(e));
            }
            (env, None)
        }

        Opcode::FieldGet { dst, obj, field, kind: _ } => {
            if let Some(obj) = obj {
                match require_defined(&env, *obj) {
                    Ok((ty, _)) if ty.is_reference() => {}
                    Ok(_) => return fail(env, *dst, TypeError::ReferenceTypeMismatch { reg: *obj }),
                    Err(e) => return fail(env, *dst, e),
                }
            }
            env.set(*dst, IRType::Reference, DexTypeDomain::exact(field.field_type.clone()));
            (env, None)
        }

        Opcode::FieldPut { src, obj, field: _, kind: _ } => {
            if let Some(obj) = obj {
                if let Err(e) = require_defined(&env, *obj) {
                    return (env, Some(e));
                }
            }
            if let Err(e) = require_defined(&env, *src) {
                return (env, Some(e));
            }
            (env, None)
        }

        Opcode::Invoke { receiver, args, method, kind } => {
            if let Some(receiver) = receiver {
                match require_defined(&env, *receiver) {
                    Ok((ty, _)) if ty.is_reference() => {}
                    Ok(_) => return fail(env, RegisterId::Result, TypeError::ReferenceTypeMismatch { reg: *receiver }),
                    Err(e) => return fail(env, RegisterId::Result, e),
                }
                if *kind == InvokeKind::Direct && method.name == "<init>" {
                    let (_, dex) = env.get(*receiver);
                    if dex.uninitialized {
                        env.set(*receiver, IRType::Reference, dex.initialize());
                    }
                }
            }
            for arg in args {
                if let Err(e) = require_defined(&env, *arg) {
                    return fail(env, RegisterId::Result, e);
                }
            }
            env.invalidate(RegisterId::Result);
            (env, None)
        }

        Opcode::ReturnVoid => (env, None),

        Opcode::Return { src, wide: _ } => {
            let reg_ty = env.get(*src).0;
            if reg_ty == IRType::Top {
                return (env, Some(TypeError::UndefinedOperand { reg: *src }));
            }
            if sig.return_type.is_none() {
                return (env, Some(TypeError::ReturnTypeMismatch { reg: *src }));
            }
            (env, None)
        }

        Opcode::ReturnObject { src } => match require_defined(&env, *src) {
            Ok((ty, dex)) if ty.is_reference() => {
                let compatible = match (&dex.class, &sig.return_type) {
                    (Some(actual), Some(declared)) => hierarchy.is_subtype(actual, declared),
                    _ => true,
                };
                if compatible {
                    (env, None)
                } else {
                    (env, Some(TypeError::ReturnTypeMismatch { reg: *src }))
                }
            }
            Ok(_) => (env, Some(TypeError::ReturnTypeMismatch { reg: *src })),
            Err(e) => (env, Some(e)),
        },

        Opcode::Throw { src } => match require_defined(&env, *src) {
            Ok((ty, _)) if ty.is_reference() => (env, None),
            Ok(_) => (env, Some(TypeError::ReferenceTypeMismatch { reg: *src })),
            Err(e) => (env, Some(e)),
        },

        Opcode::Monitor { src } => match require_defined(&env, *src) {
            Ok((ty, _)) if ty.is_reference() => (env, None),
            Ok(_) => (env, Some(TypeError::ReferenceTypeMismatch { reg: *src })),
            Err(e) => (env, Some(e)),
        },

        Opcode::FilledNewArray { args, element } => {
            let element_is_reference = element.starts_with('L') || element.starts_with('[');
            for arg in args {
                match require_defined(&env, *arg) {
                    Ok((ty, _)) if element_is_reference && !ty.is_reference() => {
                        return fail(env, RegisterId::Result, TypeError::ReferenceTypeMismatch { reg: *arg });
                    }
                    Ok((ty, _)) if !element_is_reference && (ty.is_wide() || !ty.is_integer() && ty != IRType::Float) => {
                        return fail(env, RegisterId::Result, TypeError::ScalarTypeMismatch { reg: *arg, found: ty });
                    }
                    Ok(_) => {}
                    Err(e) => return fail(env, RegisterId::Result, e),
                }
            }
            env.set(RegisterId::Result, IRType::Reference, DexTypeDomain::exact(format!("[{element}")));
            (env, None)
        }

        Opcode::FillArrayData { array } => match require_defined(&env, *array) {
            Ok((ty, _)) if ty.is_reference() => (env, None),
            Ok(_) => (env, Some(TypeError::ReferenceTypeMismatch { reg: *array })),
            Err(e) => (env, Some(e)),
        },

        Opcode::Unknown { dst } => {
            if let Some(dst) = dst {
                env.invalidate(*dst);
            }
            (env, None)
        }
    }
}

/// Check the write-to-receiver constraint separately from [`step`], since it
/// is about the *destination* of arbitrary opcodes, not one opcode's own
/// precondition. Call once per instruction with its write-set.
pub fn check_no_overwrite_this(sig: &MethodSignature, written: RegisterId) -> Option<TypeError> {
    if sig.receiver_register == Some(written) {
        Some(TypeError::OverwriteThis { reg: written })
    } else {
        None
    }
}


/// Destination registers written by `opcode`, used by the checker sweep to
/// apply [`check_no_overwrite_this`] uniformly across all opcode kinds.
pub fn destinations(opcode: &Opcode) -> Vec<RegisterId> {
    use Opcode::*;
    match opcode {
        ConstWide { dst, .. } | MoveWide { dst, .. } => wide_pair(*dst),
        Convert { dst, to, .. } => {
            if to.is_wide() {
                wide_pair(*dst)
            } else {
                vec![*dst]
            }
        }
        Const { dst, .. }
        | ConstReference { dst, .. }
        | Move { dst, .. }
        | MoveObject { dst, .. }
        | MoveResult { dst, .. }
        | BinaryIntOp { dst, .. }
        | Compare { dst, .. }
        | InstanceOf { dst, .. }
        | NewInstance { dst, .. }
        | NewArray { dst, .. }
        | ArrayLength { dst, .. }
        | ArrayGet { dst, .. }
        | FieldGet { dst, .. } => vec![*dst],
        Unknown { dst: Some(dst) } => vec![*dst],
        _ => Vec::new(),
    }
}

/// `dst` plus its paired register, for instructions that write a wide
/// (64-bit) value across two consecutive registers.
fn wide_pair(dst: RegisterId) -> Vec<RegisterId> {
    match dst.next() {
        Some(hi) => vec![dst, hi],
        None => vec![dst],
    }
}
