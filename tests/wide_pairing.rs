//! Spec §8 scenario 2: reading a wide value's low half as a narrow operand
//! is a `WIDE_MISMATCH`, regardless of `verify_moves`.

mod support;

use dex_typeflow::checker::TypeChecker;
use dex_typeflow::config::CheckerConfig;
use dex_typeflow::ir::{MethodSignature, Opcode, RegisterId};

use support::{LinearCfg, PermissiveHierarchy};

#[test]
fn reading_wide_low_half_as_narrow_fails() {
    let cfg = LinearCfg::new(
        3,
        vec![
            Opcode::ConstWide { dst: RegisterId::Local(0), value: 1 },
            Opcode::Move { dst: RegisterId::Local(2), src: RegisterId::Local(0) },
        ],
    );
    let sig = MethodSignature {
        receiver_register: None,
        declaring_class: "LCaller;".to_string(),
        is_constructor: false,
        parameters: Vec::new(),
        return_type: None,
    };
    let hierarchy = PermissiveHierarchy;

    let mut checker = TypeChecker::new(&cfg, &hierarchy, sig, CheckerConfig::default());
    checker.run().expect("no fatal error");

    assert!(checker.fail());
    assert!(checker.what().contains("wide"), "expected a wide-mismatch message, got: {}", checker.what());
}
