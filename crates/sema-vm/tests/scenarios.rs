//! End-to-end scenarios over small hand-built SSA modules, exercising
//! the instruction loop, memory layout and host-callback plumbing
//! together rather than in isolation.

use sema_core::{BasicKind, ExactValue, TypeInterner, TypeKind};
use sema_vm::{
    BinOp, HostTable, Instr, SsaBlock, SsaModule, SsaProcedure, SsaValue, TargetSizes,
    VirtualMachine, VmValue,
};

#[test]
fn array_of_structs_round_trips_through_store_and_load() {
    let mut types = TypeInterner::new();
    let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
    let point_ty = types.intern(TypeKind::Struct {
        fields: vec![
            sema_core::Field { name: "x".into(), ty: i32_ty, field_index: 0 },
            sema_core::Field { name: "y".into(), ty: i32_ty, field_index: 1 },
        ],
    });
    let array_ty = types.intern(TypeKind::Array { elem: point_ty, count: 2 });

    let module = SsaModule::new(TargetSizes::host_64bit_little_endian());
    let mut vm = VirtualMachine::new(module, types, HostTable::new());

    let ptr = vm.alloc_storage(array_ty);
    let value = VmValue::Comp(vec![
        VmValue::Comp(vec![VmValue::Int(1), VmValue::Int(2)]),
        VmValue::Comp(vec![VmValue::Int(3), VmValue::Int(4)]),
    ]);
    vm.store(ptr, &value, array_ty);

    let loaded = vm.load(ptr, array_ty);
    let comp = loaded.as_comp();
    assert_eq!(comp[0].as_comp()[0].as_int(), 1);
    assert_eq!(comp[0].as_comp()[1].as_int(), 2);
    assert_eq!(comp[1].as_comp()[0].as_int(), 3);
    assert_eq!(comp[1].as_comp()[1].as_int(), 4);
}

#[test]
fn string_constant_materializes_as_data_pointer_and_length() {
    let mut types = TypeInterner::new();
    let string_ty = types.string_type();
    let module = SsaModule::new(TargetSizes::host_64bit_little_endian());
    let mut vm = VirtualMachine::new(module, types, HostTable::new());

    let value = vm.exact_value(None, &ExactValue::String("hello".into()), string_ty);
    let comp = value.as_comp();
    assert_eq!(comp[1].as_int(), 5);
    assert!(!comp[0].as_ptr().is_null());
}

#[test]
fn calling_an_external_procedure_dispatches_through_the_host_table() {
    let mut types = TypeInterner::new();
    let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
    let mut module = SsaModule::new(TargetSizes::host_64bit_little_endian());

    let external = module.push_value(SsaValue::ExternalProc { name: "double".into() });
    let arg = module.push_value(SsaValue::Constant {
        value: ExactValue::Integer(21),
        ty: i32_ty,
        node: None,
    });
    let call = module.push_value(SsaValue::Instr {
        kind: Instr::Call { callee: external, args: vec![arg] },
        ty: i32_ty,
    });
    let ret = module.push_value(SsaValue::Instr { kind: Instr::Return { value: Some(call) }, ty: i32_ty });
    let block = module.push_block(SsaBlock { instrs: vec![call, ret] });
    let proc = module.push_proc(SsaProcedure {
        name: "calls_double".into(),
        params: vec![],
        param_types: vec![],
        result_types: vec![i32_ty],
        blocks: vec![block],
        local_count: 0,
    });

    let mut host = HostTable::new();
    host.register("double", |args: &[VmValue]| VmValue::Int(args[0].as_int() * 2));

    let mut vm = VirtualMachine::new(module, types, host);
    let result = vm.call_procedure(proc, &[]);
    assert_eq!(result.as_int(), 42);
}

fn build_div_proc(module: &mut SsaModule, ty: sema_core::TypeId) -> sema_vm::ProcId {
    let p0 = module.push_value(SsaValue::Param { ty });
    let p1 = module.push_value(SsaValue::Param { ty });
    let div = module.push_value(SsaValue::Instr {
        kind: Instr::BinaryOp { op: BinOp::Quo, ty, left: p0, right: p1 },
        ty,
    });
    let ret = module.push_value(SsaValue::Instr { kind: Instr::Return { value: Some(div) }, ty });
    let block = module.push_block(SsaBlock { instrs: vec![div, ret] });
    module.push_proc(SsaProcedure {
        name: "div".into(),
        params: vec![p0, p1],
        param_types: vec![ty, ty],
        result_types: vec![ty],
        blocks: vec![block],
        local_count: 0,
    })
}

#[test]
fn signed_division_truncates_toward_zero() {
    let mut types = TypeInterner::new();
    let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
    let mut module = SsaModule::new(TargetSizes::host_64bit_little_endian());
    let proc = build_div_proc(&mut module, i32_ty);

    let mut vm = VirtualMachine::new(module, types, HostTable::new());
    let result = vm.call_procedure(proc, &[VmValue::Int(-4), VmValue::Int(2)]);
    assert_eq!(result.as_int(), -2);
}

#[test]
fn unsigned_division_reinterprets_a_negative_bit_pattern_as_large() {
    let mut types = TypeInterner::new();
    let u32_ty = types.intern(TypeKind::Basic(BasicKind::U32));
    let mut module = SsaModule::new(TargetSizes::host_64bit_little_endian());
    let proc = build_div_proc(&mut module, u32_ty);

    let mut vm = VirtualMachine::new(module, types, HostTable::new());
    let result = vm.call_procedure(proc, &[VmValue::Int(-4), VmValue::Int(2)]);
    assert_eq!(result.as_int() as u64, (u32::MAX as u64 - 3) / 2);
}
