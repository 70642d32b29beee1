//! The tree-walking interpreter.
//!
//! [`VirtualMachine::call_procedure`] pushes a frame, runs the current
//! block's instructions until `Return` marks the frame finished, then
//! pops it — mirroring `vm_call_procedure`'s `while (f->curr_block !=
//! NULL)` loop.

use std::collections::HashMap;

use sema_core::{BasicKind, ExactValue, TypeId, TypeInterner, TypeKind};

use crate::frame::VmFrame;
use crate::host::HostTable;
use crate::ssa::{BinOp, BlockId, ConvKind, Instr, ProcId, SsaModule, SsaValue, ValueId};
use crate::target::Endian;
use crate::value::{ProcRef, VmValue};

pub struct VirtualMachine {
    pub module: SsaModule,
    pub types: TypeInterner,
    pub host: HostTable,
    globals: HashMap<ValueId, VmValue>,
    global_storage: Vec<Box<[u8]>>,
    const_compound_lits: HashMap<ValueId, VmValue>,
    frames: Vec<VmFrame>,
}

impl VirtualMachine {
    /// Allocate and initialize every `Global` value in `module`.
    /// Mirrors `vm_init`'s pass over `module->values`.
    pub fn new(module: SsaModule, types: TypeInterner, host: HostTable) -> Self {
        let mut vm = VirtualMachine {
            module,
            types,
            host,
            globals: HashMap::new(),
            global_storage: Vec::new(),
            const_compound_lits: HashMap::new(),
            frames: Vec::new(),
        };

        let global_ids: Vec<(ValueId, TypeId, Option<ValueId>)> = vm
            .module
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| match v {
                SsaValue::Global { ty, init, .. } => Some((ValueId(i as u32), *ty, *init)),
                _ => None,
            })
            .collect();

        for (id, ty, init) in global_ids {
            let ptr = vm.alloc_storage(ty);
            vm.globals.insert(id, VmValue::Ptr(ptr));
            if let Some(init_id) = init {
                if let SsaValue::Constant { .. } = vm.module.value(init_id) {
                    let val = vm.operand_value(init_id);
                    let target_ty = sema_core::type_deref(&vm.types, ty);
                    vm.store(ptr, &val, target_ty);
                }
            }
        }

        vm
    }

    /// Allocate zeroed, VM-owned storage sized for `ty` and return a
    /// pointer into it. Used for globals at construction time and
    /// available to embedders that need scratch storage outside any
    /// procedure's frame.
    pub fn alloc_storage(&mut self, ty: TypeId) -> *mut u8 {
        let size = self.module.sizes.size_of(&self.types, ty).max(1) as usize;
        let mut buf = vec![0u8; size].into_boxed_slice();
        let ptr = buf.as_mut_ptr();
        self.global_storage.push(buf);
        ptr
    }

    fn back_frame(&self) -> &VmFrame {
        self.frames.last().expect("no active frame")
    }

    fn back_frame_mut(&mut self) -> &mut VmFrame {
        self.frames.last_mut().expect("no active frame")
    }

    fn push_frame(&mut self, proc: ProcId) {
        let entry = self.module.proc(proc).blocks[0];
        self.frames.push(VmFrame::new(proc, entry));
    }

    fn pop_frame(&mut self) -> VmFrame {
        self.frames.pop().expect("no active frame to pop")
    }

    /// Run `proc` to completion with `args` bound to its parameters,
    /// returning its result (or the zero value for a `void`
    /// procedure). Mirrors `vm_call_procedure`.
    pub fn call_procedure(&mut self, proc: ProcId, args: &[VmValue]) -> VmValue {
        let proc_data = self.module.proc(proc).clone();
        assert_eq!(
            proc_data.params.len(),
            args.len(),
            "incorrect number of arguments passed to `{}`",
            proc_data.name
        );

        eprintln!("call: {}", proc_data.name);

        self.push_frame(proc);
        for (p, a) in proc_data.params.iter().zip(args) {
            self.back_frame_mut().set_value(*p, a.clone());
        }

        loop {
            let (block, index) = {
                let f = self.back_frame();
                (f.curr_block, f.instr_index)
            };
            if self.back_frame().finished {
                break;
            }
            let instr_value = self.module.block(block).instrs[index];
            self.back_frame_mut().instr_index += 1;
            self.exec_instr(instr_value);
            if self.back_frame().finished {
                break;
            }
        }

        let result = self.back_frame().result.clone();
        if !proc_data.result_types.is_empty() {
            let rt = proc_data.result_types[0];
            if sema_core::is_type_integer(&self.types, rt) {
                eprintln!("-> {}", result.as_int());
            } else if sema_core::is_type_boolean(&self.types, rt) {
                eprintln!("-> {}", result.as_bool());
            }
        }

        self.pop_frame();
        result
    }

    fn resolve_call_target(&self, id: ValueId) -> ProcRef {
        match self.module.value(id) {
            SsaValue::Proc(pid) => ProcRef::Internal(*pid),
            SsaValue::ExternalProc { name } => ProcRef::External(name.clone()),
            _ => panic!("call target is not a procedure"),
        }
    }

    /// Resolve an SSA value to its runtime [`VmValue`]. Mirrors
    /// `vm_operand_value`.
    pub fn operand_value(&mut self, id: ValueId) -> VmValue {
        match self.module.value(id).clone() {
            SsaValue::Constant { value, ty, .. } => self.exact_value(Some(id), &value, ty),
            SsaValue::ConstantSlice {
                backing_array,
                count,
            } => {
                let data = self.operand_value(backing_array);
                VmValue::Comp(vec![data, VmValue::Int(count), VmValue::Int(count)])
            }
            SsaValue::Global { .. } => self.globals.get(&id).cloned().expect("global not initialized"),
            SsaValue::Param { .. } => self
                .back_frame()
                .get_value(id)
                .cloned()
                .expect("parameter value not bound"),
            SsaValue::Proc(pid) => VmValue::Proc(ProcRef::Internal(pid)),
            SsaValue::ExternalProc { name } => VmValue::Proc(ProcRef::External(name)),
            SsaValue::Instr { .. } => self
                .back_frame()
                .get_value(id)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Fold a checked constant into a [`VmValue`], memoizing compound
    /// literals by their defining [`ValueId`]. Mirrors `vm_exact_value`.
    pub fn exact_value(&mut self, key: Option<ValueId>, value: &ExactValue, ty: TypeId) -> VmValue {
        let base = sema_core::base_type(&self.types, ty);
        if sema_core::is_type_boolean(&self.types, base) {
            return VmValue::Int(matches!(value, ExactValue::Bool(true)) as i64);
        }
        if sema_core::is_type_integer(&self.types, base) {
            if let ExactValue::Integer(i) = value {
                return VmValue::Int(*i as i64);
            }
        }
        if sema_core::is_type_float(&self.types, base) {
            if let ExactValue::Float(f) = value {
                return match &self.types.get(base).kind {
                    TypeKind::Basic(BasicKind::F32) => VmValue::F32(*f as f32),
                    _ => VmValue::F64(*f),
                };
            }
        }
        if sema_core::is_type_pointer(&self.types, base) {
            if let ExactValue::Pointer(p) = value {
                return VmValue::Ptr(*p as *mut u8);
            }
        }
        if sema_core::is_type_string(&self.types, base) {
            if let ExactValue::String(s) = value {
                let mut buf = s.clone().into_bytes().into_boxed_slice();
                let ptr = buf.as_mut_ptr();
                self.global_storage.push(buf);
                return VmValue::Comp(vec![VmValue::Ptr(ptr), VmValue::Int(s.len() as i64)]);
            }
        }
        if let ExactValue::Compound(node) = value {
            if let Some(k) = key {
                if let Some(found) = self.const_compound_lits.get(&k) {
                    return found.clone();
                }
            }
            let elems = self.module.compound_elems.get(node).cloned().unwrap_or_default();
            let result = VmValue::Comp(elems.into_iter().map(|e| self.operand_value(e)).collect());
            if let Some(k) = key {
                self.const_compound_lits.insert(k, result.clone());
            }
            return result;
        }
        VmValue::default()
    }

    fn store_integer(&self, dst: *mut u8, val: i64, store_bytes: u64) {
        let n = (store_bytes as usize).min(8);
        let le = val.to_le_bytes();
        unsafe {
            match self.module.sizes.endian {
                Endian::Little => std::ptr::copy_nonoverlapping(le.as_ptr(), dst, n),
                Endian::Big => {
                    let mut buf = le[..n].to_vec();
                    buf.reverse();
                    std::ptr::copy_nonoverlapping(buf.as_ptr(), dst, n);
                }
            }
        }
    }

    fn load_integer(&self, ptr: *const u8, store_bytes: u64) -> i64 {
        let n = (store_bytes as usize).min(8);
        let mut buf = [0u8; 8];
        unsafe {
            match self.module.sizes.endian {
                Endian::Little => std::ptr::copy_nonoverlapping(ptr, buf.as_mut_ptr(), n),
                Endian::Big => {
                    let mut tmp = vec![0u8; n];
                    std::ptr::copy_nonoverlapping(ptr, tmp.as_mut_ptr(), n);
                    tmp.reverse();
                    buf[..n].copy_from_slice(&tmp);
                }
            }
        }
        i64::from_le_bytes(buf)
    }

    /// Write `val` into raw memory at `dst`, according to `ty`'s
    /// layout. Mirrors `vm_store`.
    pub fn store(&mut self, dst: *mut u8, val: &VmValue, ty: TypeId) {
        let base = sema_core::base_type(&self.types, ty);
        let word = self.module.sizes.pointer_size as u64;
        match self.types.get(base).kind.clone() {
            TypeKind::Basic(b) => match b {
                BasicKind::RawPtr => self.store_integer(dst, val.as_ptr() as i64, word),
                BasicKind::String | BasicKind::Any => {
                    let comp = val.as_comp();
                    let data_ptr = comp[0].as_ptr();
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            (&data_ptr as *const *mut u8) as *const u8,
                            dst,
                            word as usize,
                        );
                    }
                    self.store_integer(unsafe { dst.add(word as usize) }, comp[1].as_int(), word);
                }
                BasicKind::F32 => unsafe { *(dst as *mut f32) = val.as_f32() },
                BasicKind::F64 => unsafe { *(dst as *mut f64) = val.as_f64() },
                other => {
                    let size = other.fixed_size().map(|n| n as u64).unwrap_or(word);
                    self.store_integer(dst, val.as_int(), size);
                }
            },
            TypeKind::Pointer(_) => self.store_integer(dst, val.as_ptr() as i64, word),
            TypeKind::Struct { fields } | TypeKind::RawUnion { fields } => {
                let comp = val.as_comp().to_vec();
                for (i, f) in fields.iter().enumerate() {
                    if i >= comp.len() {
                        break;
                    }
                    let offset = self.module.sizes.offset_of(&self.types, base, i);
                    let field_ptr = unsafe { dst.add(offset as usize) };
                    self.store(field_ptr, &comp[i], f.ty);
                }
            }
            TypeKind::Array { elem, count } => {
                let comp = val.as_comp().to_vec();
                let elem_size = self.module.sizes.size_of(&self.types, elem);
                let n = comp.len().min(count);
                for i in 0..n {
                    let ptr = unsafe { dst.add((elem_size as usize) * i) };
                    self.store(ptr, &comp[i], elem);
                }
            }
            TypeKind::Slice(elem) => {
                let _ = elem;
                let comp = val.as_comp();
                unsafe {
                    let data_ptr = comp[0].as_ptr();
                    std::ptr::copy_nonoverlapping(
                        (&data_ptr as *const *mut u8) as *const u8,
                        dst,
                        word as usize,
                    );
                }
                self.store_integer(unsafe { dst.add(word as usize) }, comp[1].as_int(), word);
            }
            TypeKind::Union { .. } => {
                let comp = val.as_comp();
                self.store_integer(dst, comp[0].as_int(), word);
            }
            TypeKind::Proc { .. } | TypeKind::Tuple(_) | TypeKind::Invalid | TypeKind::Named { .. } => {}
        }
    }

    /// Read a [`VmValue`] back out of raw memory at `ptr`, according
    /// to `ty`'s layout. Mirrors `vm_load`.
    pub fn load(&mut self, ptr: *const u8, ty: TypeId) -> VmValue {
        let base = sema_core::base_type(&self.types, ty);
        let word = self.module.sizes.pointer_size as u64;
        match self.types.get(base).kind.clone() {
            TypeKind::Basic(b) => match b {
                BasicKind::RawPtr => VmValue::Ptr(self.load_integer(ptr, word) as *mut u8),
                BasicKind::String => {
                    let data = unsafe { *(ptr as *const *mut u8) };
                    let len = self.load_integer(unsafe { ptr.add(word as usize) }, word);
                    VmValue::Comp(vec![VmValue::Ptr(data), VmValue::Int(len)])
                }
                BasicKind::Any => {
                    let type_info = unsafe { *(ptr as *const *mut u8) };
                    let data = unsafe { *((ptr.add(word as usize)) as *const *mut u8) };
                    VmValue::Comp(vec![VmValue::Ptr(type_info), VmValue::Ptr(data)])
                }
                BasicKind::F32 => VmValue::F32(unsafe { *(ptr as *const f32) }),
                BasicKind::F64 => VmValue::F64(unsafe { *(ptr as *const f64) }),
                other => {
                    let size = other.fixed_size().map(|n| n as u64).unwrap_or(word);
                    VmValue::Int(self.load_integer(ptr, size))
                }
            },
            TypeKind::Pointer(_) => VmValue::Ptr(self.load_integer(ptr, word) as *mut u8),
            TypeKind::Struct { fields } | TypeKind::RawUnion { fields } => {
                let mut comp = Vec::with_capacity(fields.len());
                for (i, f) in fields.iter().enumerate() {
                    let offset = self.module.sizes.offset_of(&self.types, base, i);
                    let field_ptr = unsafe { ptr.add(offset as usize) };
                    comp.push(self.load(field_ptr, f.ty));
                }
                VmValue::Comp(comp)
            }
            TypeKind::Array { elem, count } => {
                let elem_size = self.module.sizes.size_of(&self.types, elem);
                let mut comp = Vec::with_capacity(count);
                for i in 0..count {
                    let elem_ptr = unsafe { ptr.add((elem_size as usize) * i) };
                    comp.push(self.load(elem_ptr, elem));
                }
                VmValue::Comp(comp)
            }
            TypeKind::Slice(_) => {
                let data = unsafe { *(ptr as *const *mut u8) };
                let len = self.load_integer(unsafe { ptr.add(word as usize) }, word);
                VmValue::Comp(vec![VmValue::Ptr(data), VmValue::Int(len), VmValue::Int(len)])
            }
            TypeKind::Union { .. } => {
                let tag = self.load_integer(ptr, word);
                VmValue::Comp(vec![VmValue::Int(tag)])
            }
            TypeKind::Proc { .. } | TypeKind::Tuple(_) | TypeKind::Invalid | TypeKind::Named { .. } => {
                VmValue::default()
            }
        }
    }

    /// Execute the instruction-kind SSA value `id` against the back
    /// frame. Mirrors `vm_exec_instr`'s per-kind dispatch.
    fn exec_instr(&mut self, id: ValueId) {
        let instr = match self.module.value(id).clone() {
            SsaValue::Instr { kind, .. } => kind,
            _ => panic!("exec_instr called on a non-instruction value"),
        };

        match instr {
            Instr::Comment(_) => {}

            Instr::Local { ty: local_ty } => {
                let size = self.module.sizes.size_of(&self.types, local_ty).max(1);
                let align = self.module.sizes.align_of(&self.types, local_ty).max(1);
                let ptr = self.back_frame_mut().alloc(size, align);
                self.back_frame_mut().set_value(id, VmValue::Ptr(ptr));
                self.back_frame_mut().locals.push(ptr);
            }

            Instr::ZeroInit { address } => {
                let t = sema_core::type_deref(&self.types, self.module.type_of(address));
                let addr = self.operand_value(address);
                let size = self.module.sizes.size_of(&self.types, t) as usize;
                unsafe { std::ptr::write_bytes(addr.as_ptr(), 0, size) };
            }

            Instr::Store { address, value } => {
                let t = self.module.type_of(value);
                let addr = self.operand_value(address);
                let val = self.operand_value(value);
                self.store(addr.as_ptr(), &val, t);
            }

            Instr::Load { address, ty: load_ty } => {
                let addr = self.operand_value(address);
                let val = self.load(addr.as_ptr(), load_ty);
                self.back_frame_mut().set_value(id, val);
            }

            Instr::ArrayElementPtr { address, elem_index } => {
                let t = self.module.type_of(address);
                let elem_ty = sema_core::type_deref(&self.types, t);
                let elem_size = self.module.sizes.size_of(&self.types, elem_ty);
                let base = self.operand_value(address);
                let index = self.operand_value(elem_index);
                let ptr = unsafe { base.as_ptr().add((elem_size as i64 * index.as_int()) as usize) };
                self.back_frame_mut().set_value(id, VmValue::Ptr(ptr));
            }

            Instr::StructElementPtr { address, elem_index } => {
                let t = self.module.type_of(address);
                let record_ty = sema_core::type_deref(&self.types, t);
                let offset = self.module.sizes.offset_of(&self.types, record_ty, elem_index);
                let base = self.operand_value(address);
                let ptr = unsafe { base.as_ptr().add(offset as usize) };
                self.back_frame_mut().set_value(id, VmValue::Ptr(ptr));
            }

            Instr::PtrOffset { address, offset } => {
                let t = self.module.type_of(address);
                let elem_ty = sema_core::type_deref(&self.types, t);
                let elem_size = self.module.sizes.size_of(&self.types, elem_ty);
                let base = self.operand_value(address);
                let off = self.operand_value(offset);
                let ptr = unsafe { base.as_ptr().add((elem_size as i64 * off.as_int()) as usize) };
                self.back_frame_mut().set_value(id, VmValue::Ptr(ptr));
            }

            Instr::Phi { incoming } => {
                let prev = self.back_frame().prev_block.expect("phi reached with no predecessor");
                let value_id = incoming
                    .iter()
                    .find(|(block, _)| *block == prev)
                    .map(|(_, v)| *v)
                    .unwrap_or_else(|| panic!("phi has no incoming value for predecessor block"));
                let val = self.operand_value(value_id);
                self.back_frame_mut().set_value(id, val);
            }

            Instr::ArrayExtractValue { address, index } => {
                let s = self.operand_value(address);
                let v = s.as_comp()[index].clone();
                self.back_frame_mut().set_value(id, v);
            }

            Instr::StructExtractValue { address, index } => {
                let s = self.operand_value(address);
                let v = s.as_comp()[index].clone();
                self.back_frame_mut().set_value(id, v);
            }

            Instr::Jump { block } => self.back_frame_mut().jump_to(block),

            Instr::If { cond, true_block, false_block } => {
                let c = self.operand_value(cond);
                let target = if c.as_bool() { true_block } else { false_block };
                self.back_frame_mut().jump_to(target);
            }

            Instr::Return { value } => {
                let result = match value {
                    Some(v) => self.operand_value(v),
                    None => VmValue::default(),
                };
                let f = self.back_frame_mut();
                f.result = result;
                f.finished = true;
            }

            Instr::Conv { kind, value, from, to } => {
                let src = self.operand_value(value);
                let to_size = self.module.sizes.size_of(&self.types, to);
                let dst = self.conv(kind, &src, to_size, from, to);
                self.back_frame_mut().set_value(id, dst);
            }

            Instr::Unreachable => panic!("reached `unreachable` instruction"),

            Instr::BinaryOp { op, ty: operand_ty, left, right } => {
                let l = self.operand_value(left);
                let r = self.operand_value(right);
                let result = self.binary_op(op, operand_ty, &l, &r);
                self.back_frame_mut().set_value(id, result);
            }

            Instr::Call { callee, args } => {
                let arg_values: Vec<VmValue> = args.iter().map(|&a| self.operand_value(a)).collect();
                let target = self.operand_value(callee).as_proc();
                let result = match target {
                    ProcRef::Internal(pid) => self.call_procedure(pid, &arg_values),
                    ProcRef::External(name) => self.host.call(&name, &arg_values),
                };
                self.back_frame_mut().set_value(id, result);
            }

            Instr::Select { cond, true_value, false_value } => {
                let c = self.operand_value(cond);
                let v = if c.as_bool() {
                    self.operand_value(true_value)
                } else {
                    self.operand_value(false_value)
                };
                self.back_frame_mut().set_value(id, v);
            }

            Instr::BoundsCheck(info) => {
                let index = self.operand_value(info.index);
                let len = self.operand_value(info.len);
                let str_ty = self.types.string_type();
                let file = self.exact_value(None, &ExactValue::String(info.pos.file.clone()), str_ty);
                let line = VmValue::Int(info.pos.line as i64);
                let column = VmValue::Int(info.pos.column as i64);
                self.host
                    .call("__bounds_check_error", &[file, line, column, index, len]);
            }

            Instr::SliceBoundsCheck(info) => {
                let low = self.operand_value(info.low);
                let high = self.operand_value(info.high);
                let str_ty = self.types.string_type();
                let file = self.exact_value(None, &ExactValue::String(info.pos.file.clone()), str_ty);
                let line = VmValue::Int(info.pos.line as i64);
                let column = VmValue::Int(info.pos.column as i64);
                if info.is_substring {
                    self.host
                        .call("__substring_expr_error", &[file, line, column, low, high]);
                } else {
                    let max = self.operand_value(info.max.expect("slice bounds check requires `max`"));
                    self.host
                        .call("__slice_expr_error", &[file, line, column, low, high, max]);
                }
            }
        }
    }

    fn conv(&self, kind: ConvKind, src: &VmValue, to_size: u64, from: TypeId, to: TypeId) -> VmValue {
        match kind {
            ConvKind::Trunc => {
                let v = src.as_int();
                if to_size >= 8 {
                    VmValue::Int(v)
                } else {
                    let bits = to_size * 8;
                    let mask = if bits == 0 { 0 } else { (1i64 << bits) - 1 };
                    VmValue::Int(v & mask)
                }
            }
            ConvKind::Zext => VmValue::Int(src.as_int()),
            ConvKind::Fptrunc => VmValue::F32(src.as_f64() as f32),
            ConvKind::Fpext => VmValue::F64(src.as_f32() as f64),
            ConvKind::Fptoui => {
                let base = sema_core::base_type(&self.types, from);
                let f = if matches!(self.types.get(base).kind, TypeKind::Basic(BasicKind::F64)) {
                    src.as_f64()
                } else {
                    src.as_f32() as f64
                };
                VmValue::Int((f as u64) as i64)
            }
            ConvKind::Fptosi => {
                let base = sema_core::base_type(&self.types, from);
                let f = if matches!(self.types.get(base).kind, TypeKind::Basic(BasicKind::F64)) {
                    src.as_f64()
                } else {
                    src.as_f32() as f64
                };
                VmValue::Int(f as i64)
            }
            ConvKind::Uitofp => {
                let to_base = sema_core::base_type(&self.types, to);
                let u = src.as_int() as u64;
                if matches!(self.types.get(to_base).kind, TypeKind::Basic(BasicKind::F64)) {
                    VmValue::F64(u as f64)
                } else {
                    VmValue::F32(u as f32)
                }
            }
            ConvKind::Sitofp => {
                let to_base = sema_core::base_type(&self.types, to);
                let i = src.as_int();
                if matches!(self.types.get(to_base).kind, TypeKind::Basic(BasicKind::F64)) {
                    VmValue::F64(i as f64)
                } else {
                    VmValue::F32(i as f32)
                }
            }
            ConvKind::Ptrtoint => VmValue::Int(src.as_ptr() as i64),
            ConvKind::Inttoptr => VmValue::Ptr(src.as_int() as *mut u8),
            ConvKind::Bitcast => src.clone(),
        }
    }

    /// `BinaryOp`. Comparisons perform a real per-type comparison
    /// (signed/unsigned integer, or IEEE-754 float) rather than the
    /// reference VM's always-`true` placeholder; integer division and
    /// modulus honor the operand type's declared signedness rather
    /// than panicking as `TODO`.
    fn binary_op(&self, op: BinOp, ty: TypeId, l: &VmValue, r: &VmValue) -> VmValue {
        let base = sema_core::base_type(&self.types, ty);
        if op.is_comparison() {
            return VmValue::Int(self.compare(op, base, l, r) as i64);
        }
        if sema_core::is_type_integer(&self.types, base) {
            let unsigned = matches!(&self.types.get(base).kind, TypeKind::Basic(b) if b.is_unsigned());
            return VmValue::Int(self.integer_binary_op(op, unsigned, l.as_int(), r.as_int()));
        }
        if sema_core::is_type_float(&self.types, base) {
            let is_f32 = matches!(self.types.get(base).kind, TypeKind::Basic(BasicKind::F32));
            if is_f32 {
                let (a, b) = (l.as_f32(), r.as_f32());
                return VmValue::F32(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Quo => a / b,
                    _ => panic!("unsupported float binary op {op:?}"),
                });
            }
            let (a, b) = (l.as_f64(), r.as_f64());
            return VmValue::F64(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Quo => a / b,
                _ => panic!("unsupported float binary op {op:?}"),
            });
        }
        panic!("binary op on unsupported operand type");
    }

    fn integer_binary_op(&self, op: BinOp, unsigned: bool, l: i64, r: i64) -> i64 {
        match op {
            BinOp::Add => l.wrapping_add(r),
            BinOp::Sub => l.wrapping_sub(r),
            BinOp::Mul => l.wrapping_mul(r),
            BinOp::And => l & r,
            BinOp::Or => l | r,
            BinOp::Xor => l ^ r,
            BinOp::AndNot => l & !r,
            BinOp::Shl => l.wrapping_shl(r as u32),
            BinOp::Shr => {
                if unsigned {
                    ((l as u64) >> (r as u32)) as i64
                } else {
                    l.wrapping_shr(r as u32)
                }
            }
            BinOp::Quo => {
                if unsigned {
                    ((l as u64) / (r as u64)) as i64
                } else {
                    l.wrapping_div(r)
                }
            }
            BinOp::Mod => {
                if unsigned {
                    ((l as u64) % (r as u64)) as i64
                } else {
                    l.wrapping_rem(r)
                }
            }
            _ => unreachable!("comparison ops are handled by `compare`"),
        }
    }

    fn compare(&self, op: BinOp, ty: TypeId, l: &VmValue, r: &VmValue) -> bool {
        if sema_core::is_type_float(&self.types, ty) {
            let is_f32 = matches!(self.types.get(ty).kind, TypeKind::Basic(BasicKind::F32));
            let (a, b) = if is_f32 {
                (l.as_f32() as f64, r.as_f32() as f64)
            } else {
                (l.as_f64(), r.as_f64())
            };
            return match op {
                BinOp::CmpEq => a == b,
                BinOp::CmpNe => a != b,
                BinOp::CmpLt => a < b,
                BinOp::CmpLe => a <= b,
                BinOp::CmpGt => a > b,
                BinOp::CmpGe => a >= b,
                _ => unreachable!(),
            };
        }
        let unsigned = matches!(&self.types.get(ty).kind, TypeKind::Basic(b) if b.is_unsigned());
        if unsigned {
            let (a, b) = (l.as_int() as u64, r.as_int() as u64);
            match op {
                BinOp::CmpEq => a == b,
                BinOp::CmpNe => a != b,
                BinOp::CmpLt => a < b,
                BinOp::CmpLe => a <= b,
                BinOp::CmpGt => a > b,
                BinOp::CmpGe => a >= b,
                _ => unreachable!(),
            }
        } else {
            let (a, b) = (l.as_int(), r.as_int());
            match op {
                BinOp::CmpEq => a == b,
                BinOp::CmpNe => a != b,
                BinOp::CmpLt => a < b,
                BinOp::CmpLe => a <= b,
                BinOp::CmpGt => a > b,
                BinOp::CmpGe => a >= b,
                _ => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use sema_core::{Field, Pos};

    use crate::ssa::{BoundsCheckInfo, SsaBlock, SsaProcedure};
    use crate::target::TargetSizes;

    fn sizes() -> TargetSizes {
        TargetSizes::host_64bit_little_endian()
    }

    #[test]
    fn call_procedure_runs_binary_add_and_returns_result() {
        let mut types = TypeInterner::new();
        let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
        let mut module = SsaModule::new(sizes());

        let p0 = module.push_value(SsaValue::Param { ty: i32_ty });
        let p1 = module.push_value(SsaValue::Param { ty: i32_ty });
        let add = module.push_value(SsaValue::Instr {
            kind: Instr::BinaryOp { op: BinOp::Add, ty: i32_ty, left: p0, right: p1 },
            ty: i32_ty,
        });
        let ret = module.push_value(SsaValue::Instr {
            kind: Instr::Return { value: Some(add) },
            ty: i32_ty,
        });
        let block = module.push_block(SsaBlock { instrs: vec![add, ret] });
        let proc = module.push_proc(SsaProcedure {
            name: "add".into(),
            params: vec![p0, p1],
            param_types: vec![i32_ty, i32_ty],
            result_types: vec![i32_ty],
            blocks: vec![block],
            local_count: 0,
        });

        let mut vm = VirtualMachine::new(module, types, HostTable::new());
        let result = vm.call_procedure(proc, &[VmValue::Int(3), VmValue::Int(4)]);
        assert_eq!(result.as_int(), 7);
    }

    #[test]
    fn phi_selects_value_from_the_taken_branch() {
        let mut types = TypeInterner::new();
        let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
        let mut module = SsaModule::new(sizes());

        let p0 = module.push_value(SsaValue::Param { ty: i32_ty });
        let const_true = module.push_value(SsaValue::Constant {
            value: ExactValue::Integer(10),
            ty: i32_ty,
            node: None,
        });
        let const_false = module.push_value(SsaValue::Constant {
            value: ExactValue::Integer(20),
            ty: i32_ty,
            node: None,
        });

        let entry = module.push_block(SsaBlock::default());
        let true_block = module.push_block(SsaBlock::default());
        let false_block = module.push_block(SsaBlock::default());
        let merge = module.push_block(SsaBlock::default());

        let if_instr = module.push_value(SsaValue::Instr {
            kind: Instr::If { cond: p0, true_block, false_block },
            ty: i32_ty,
        });
        module.blocks[entry.0 as usize].instrs = vec![if_instr];

        let jump_true = module.push_value(SsaValue::Instr {
            kind: Instr::Jump { block: merge },
            ty: i32_ty,
        });
        module.blocks[true_block.0 as usize].instrs = vec![jump_true];

        let jump_false = module.push_value(SsaValue::Instr {
            kind: Instr::Jump { block: merge },
            ty: i32_ty,
        });
        module.blocks[false_block.0 as usize].instrs = vec![jump_false];

        let phi = module.push_value(SsaValue::Instr {
            kind: Instr::Phi { incoming: vec![(true_block, const_true), (false_block, const_false)] },
            ty: i32_ty,
        });
        let ret = module.push_value(SsaValue::Instr {
            kind: Instr::Return { value: Some(phi) },
            ty: i32_ty,
        });
        module.blocks[merge.0 as usize].instrs = vec![phi, ret];

        let proc = module.push_proc(SsaProcedure {
            name: "branch".into(),
            params: vec![p0],
            param_types: vec![i32_ty],
            result_types: vec![i32_ty],
            blocks: vec![entry, true_block, false_block, merge],
            local_count: 0,
        });

        let mut vm = VirtualMachine::new(module, types, HostTable::new());
        assert_eq!(vm.call_procedure(proc, &[VmValue::Int(1)]).as_int(), 10);
        assert_eq!(vm.call_procedure(proc, &[VmValue::Int(0)]).as_int(), 20);
    }

    #[test]
    fn struct_store_then_load_round_trips_every_field() {
        let mut types = TypeInterner::new();
        let u8_ty = types.intern(TypeKind::Basic(BasicKind::U8));
        let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
        let struct_ty = types.intern(TypeKind::Struct {
            fields: vec![
                Field { name: "a".into(), ty: u8_ty, field_index: 0 },
                Field { name: "b".into(), ty: i32_ty, field_index: 1 },
            ],
        });

        let mut vm = VirtualMachine::new(SsaModule::new(sizes()), types, HostTable::new());
        let ptr = vm.alloc_storage(struct_ty);
        vm.store(ptr, &VmValue::Comp(vec![VmValue::Int(5), VmValue::Int(-1)]), struct_ty);
        let loaded = vm.load(ptr, struct_ty);
        assert_eq!(loaded.as_comp()[0].as_int(), 5);
        assert_eq!(loaded.as_comp()[1].as_int(), -1);
    }

    #[test]
    fn unsigned_comparison_treats_negative_bit_pattern_as_large() {
        let mut types = TypeInterner::new();
        let i8_ty = types.intern(TypeKind::Basic(BasicKind::I8));
        let u8_ty = types.intern(TypeKind::Basic(BasicKind::U8));
        let vm = VirtualMachine::new(SsaModule::new(sizes()), types, HostTable::new());

        assert!(vm.compare(BinOp::CmpLt, i8_ty, &VmValue::Int(-1), &VmValue::Int(1)));
        assert!(!vm.compare(BinOp::CmpLt, u8_ty, &VmValue::Int(-1), &VmValue::Int(1)));
    }

    #[test]
    fn unsigned_division_treats_operands_as_unsigned() {
        let mut types = TypeInterner::new();
        let u32_ty = types.intern(TypeKind::Basic(BasicKind::U32));
        let vm = VirtualMachine::new(SsaModule::new(sizes()), types, HostTable::new());

        let result = vm.binary_op(BinOp::Quo, u32_ty, &VmValue::Int(-1), &VmValue::Int(2));
        assert_eq!(result.as_int() as u64, (u32::MAX as u64) / 2);
    }

    #[test]
    fn bounds_check_instruction_invokes_the_registered_host_callback() {
        let mut types = TypeInterner::new();
        let i32_ty = types.intern(TypeKind::Basic(BasicKind::I32));
        let mut module = SsaModule::new(sizes());

        let index = module.push_value(SsaValue::Constant {
            value: ExactValue::Integer(5),
            ty: i32_ty,
            node: None,
        });
        let len = module.push_value(SsaValue::Constant {
            value: ExactValue::Integer(3),
            ty: i32_ty,
            node: None,
        });
        let check = module.push_value(SsaValue::Instr {
            kind: Instr::BoundsCheck(BoundsCheckInfo { pos: Pos::synthetic(), index, len }),
            ty: i32_ty,
        });
        let ret = module.push_value(SsaValue::Instr { kind: Instr::Return { value: None }, ty: i32_ty });
        let block = module.push_block(SsaBlock { instrs: vec![check, ret] });
        let proc = module.push_proc(SsaProcedure {
            name: "checked".into(),
            params: vec![],
            param_types: vec![],
            result_types: vec![],
            blocks: vec![block],
            local_count: 0,
        });

        let triggered = Rc::new(Cell::new(false));
        let flag = triggered.clone();
        let mut host = HostTable::new();
        host.register("__bounds_check_error", move |_args| {
            flag.set(true);
            VmValue::default()
        });

        let mut vm = VirtualMachine::new(module, types, host);
        vm.call_procedure(proc, &[]);
        assert!(triggered.get());
    }
}
