mod common;

use common::*;
use pyslot::pyslot_vm::{
    Interpreter, Settings, VirtualMachine,
    dispatch::CacheState,
    native::NoNativeBridge,
    types::{BUILTIN_CALL_TARGETS, SlotKind, SlotValue},
};
use std::sync::Arc;

fn with_cache_limit<R>(limit: usize, f: impl FnOnce(&VirtualMachine) -> R) -> R {
    let settings = Settings::default().with_inline_cache_limit(limit);
    Interpreter::with_settings(settings, Arc::new(NoNativeBridge)).enter(f)
}

#[test]
fn call_site_goes_megamorphic_and_keeps_working() {
    with_cache_limit(1, |vm| {
        let cache = vm.sites.hash.cache();
        assert_eq!(cache.limit(), 1);
        assert_eq!(cache.state(), CacheState::Uninitialized);

        assert_eq!(vm.hash(&int(vm, 5)).unwrap(), 5);
        assert_eq!(cache.state(), CacheState::Polymorphic(1));

        let text = vm.ctx.new_str("spam").into();
        let expected = vm.hash(&vm.ctx.new_str("spam").into()).unwrap();
        assert_eq!(vm.hash(&text).unwrap(), expected);
        assert!(cache.is_megamorphic());

        // every later builtin goes through its boxed call target
        assert_eq!(vm.hash(&int(vm, 5)).unwrap(), 5);
        let pair = vm.ctx.new_tuple(vec![int(vm, 1), int(vm, 2)]).into();
        assert_eq!(vm.hash(&pair).unwrap(), vm.hash(&pair).unwrap());
        assert_eq!(cache.state(), CacheState::Megamorphic);

        let SlotValue::Builtin(int_hash) = vm.ctx.types.int_type.slot(SlotKind::TpHash).unwrap() else {
            panic!("int hash is a builtin slot");
        };
        let index = int_hash.call_target().unwrap();
        let target = vm.call_target(index);
        assert!(target.call_count() > 0);
        assert!(target.qualname().contains("hash"), "{}", target.qualname());
    })
}

#[test]
fn sites_are_per_interpreter() {
    with_cache_limit(1, |vm| {
        vm.hash(&int(vm, 1)).unwrap();
        vm.hash(&vm.ctx.new_str("a").into()).unwrap();
        assert!(vm.sites.hash.cache().is_megamorphic());
    });
    Interpreter::without_native().enter(|vm| {
        assert_eq!(vm.sites.hash.cache().limit(), Settings::default().inline_cache_limit);
        assert!(!vm.sites.hash.cache().is_megamorphic());
    });
}

#[test]
fn polymorphic_sites_call_builtins_directly() {
    with_cache_limit(3, |vm| {
        let site = vm.sites.binary_op.get(SlotKind::NbAdd);
        for i in 0..10 {
            let sum = vm.binary_op(&int(vm, i), &int(vm, 1), SlotKind::NbAdd).unwrap();
            assert_eq!(str_of(vm, &sum), (i + 1).to_string());
        }
        let joined = vm
            .binary_op(&vm.ctx.new_str("a").into(), &vm.ctx.new_str("b").into(), SlotKind::NbAdd)
            .unwrap();
        assert_eq!(str_of(vm, &joined), "ab");
        assert!(matches!(site.cache().state(), CacheState::Polymorphic(n) if n <= 3));
    })
}

#[test]
fn starting_an_interpreter_freezes_the_registry() {
    Interpreter::without_native().enter(|_vm| {
        assert!(BUILTIN_CALL_TARGETS.is_frozen());
        assert!(!BUILTIN_CALL_TARGETS.is_empty());
    })
}
