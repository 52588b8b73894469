//! Spec §8 scenario 4: an `invoke-super` to a `final`, non-external,
//! non-interface callee is rewritten to `invoke-virtual`.

mod support;

use dex_typeflow::config::ResolverConfig;
use dex_typeflow::ir::{
    BlockId, Cfg, ClassHierarchy, ClassName, FieldRef, InvokeKind, MemberKind, MethodRef, MethodSignature, Opcode,
    RegisterId,
};
use dex_typeflow::resolver::ReferenceResolver;

use support::{FixedMinSdk, LinearCfg};

/// `LB;.f:()V` is the only resolvable method, and it is `final`.
struct FinalSuperHierarchy;

impl ClassHierarchy for FinalSuperHierarchy {
    fn resolve_method(&self, method: &MethodRef, kind: InvokeKind, _caller: &ClassName) -> Option<MethodRef> {
        if kind == InvokeKind::Super && method.owner == "LB;" && method.name == "f" {
            Some(method.clone())
        } else {
            None
        }
    }

    fn resolve_field(&self, _field: &FieldRef, _kind: MemberKind) -> Option<FieldRef> {
        None
    }

    fn is_subtype(&self, sub: &ClassName, sup: &ClassName) -> bool {
        sub == sup
    }

    fn least_common_supertype(&self, _a: &ClassName, _b: &ClassName) -> Option<ClassName> {
        None
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

    fn is_final_method(&self, method: &MethodRef) -> bool {
        method.owner == "LB;" && method.name == "f"
    }

    fn is_accessible(&self, _method: &MethodRef, _caller: &ClassName) -> bool {
        true
    }

    fn overriding_methods(&self, _method: &MethodRef) -> Vec<MethodRef> {
        Vec::new()
    }
}

#[test]
fn final_super_callee_desuperifies_to_virtual() {
    let mut cfg = LinearCfg::new(
        1,
        vec![Opcode::Invoke {
            receiver: Some(RegisterId::Local(0)),
            args: Vec::new(),
            method: MethodRef {
                owner: "LB;".to_string(),
                name: "f".to_string(),
                params: Vec::new(),
                return_type: "V".to_string(),
            },
            kind: InvokeKind::Super,
        }],
    );
    let sig = MethodSignature {
        receiver_register: Some(RegisterId::Local(0)),
        declaring_class: "LC;".to_string(),
        is_constructor: false,
        parameters: Vec::new(),
        return_type: None,
    };
    let hierarchy = FinalSuperHierarchy;
    let min_sdk = FixedMinSdk { present: true };

    let mut resolver = ReferenceResolver::new(&hierarchy, &min_sdk, ResolverConfig { desuperify: true, ..ResolverConfig::default() });
    resolver.run(&mut cfg, &sig).expect("no fatal error");

    assert_eq!(resolver.metrics().num_invoke_super_removed, 1);
    match &cfg.instructions(BlockId(0))[0] {
        Opcode::Invoke { kind, .. } => assert_eq!(*kind, InvokeKind::Virtual),
        other => panic!("expected an Invoke opcode, got {other:?}"),
    }
}
