use super::{
    BasicBlockId, CallingConvention, LirBasicBlock, LirConstant, LirFunction,
    LirFunctionSignature, LirId, LirInstruction, LirInstructionKind, LirTerminator, LirType,
    LirValue, Linkage, Name, RuntimeSymbol,
};
use crate::span::Span;

/// Incrementally emits the body of one LIR function.
///
/// Registers `0..params.len()` hold the incoming arguments; every instruction
/// defines the register matching its id.
pub struct FunctionBuilder {
    function: LirFunction,
    terminated: Vec<bool>,
    current: BasicBlockId,
    next_id: LirId,
    entry_allocas: usize,
    span: Option<Span>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<Name>, params: Vec<LirType>, return_type: LirType) -> Self {
        let next_id = params.len() as LirId;
        let function = LirFunction {
            name: name.into(),
            signature: LirFunctionSignature {
                params,
                return_type,
            },
            basic_blocks: vec![LirBasicBlock::new(0, Some(Name::new("entry")))],
            linkage: Linkage::External,
        };
        Self {
            function,
            terminated: vec![false],
            current: 0,
            next_id,
            entry_allocas: 0,
            span: None,
        }
    }

    pub fn param(&self, index: usize) -> LirValue {
        if index >= self.function.signature.params.len() {
            bug!(
                "function `{}` has no parameter #{}",
                self.function.name,
                index
            );
        }
        LirValue::Register(index as u32)
    }

    /// Attach `span` to subsequently emitted instructions; returns the previous span.
    pub fn set_span(&mut self, span: Option<Span>) -> Option<Span> {
        std::mem::replace(&mut self.span, span)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated[self.current as usize]
    }

    pub fn create_block(&mut self, label: &str) -> BasicBlockId {
        let id = self.function.basic_blocks.len() as BasicBlockId;
        self.function
            .basic_blocks
            .push(LirBasicBlock::new(id, Some(Name::new(format!("{label}{id}")))));
        self.terminated.push(false);
        id
    }

    pub fn switch_to_block(&mut self, id: BasicBlockId) {
        if id as usize >= self.function.basic_blocks.len() {
            bug!("switching to unknown block bb{}", id);
        }
        self.current = id;
    }

    fn next_instruction(&mut self, kind: LirInstructionKind, ty: Option<LirType>) -> LirInstruction {
        let id = self.next_id;
        self.next_id += 1;
        LirInstruction {
            id,
            kind,
            type_hint: ty,
            span: self.span,
        }
    }

    fn push(&mut self, instruction: LirInstruction) {
        if self.is_terminated() {
            bug!(
                "emitting into terminated block bb{} of `{}`",
                self.current,
                self.function.name
            );
        }
        self.function.basic_blocks[self.current as usize]
            .instructions
            .push(instruction);
    }

    /// Emit an instruction producing a value of type `ty`.
    pub fn emit(&mut self, kind: LirInstructionKind, ty: LirType) -> LirValue {
        let instruction = self.next_instruction(kind, Some(ty));
        let id = instruction.id;
        self.push(instruction);
        LirValue::Register(id)
    }

    pub fn terminate(&mut self, terminator: LirTerminator) {
        if self.is_terminated() {
            bug!("block bb{} terminated twice", self.current);
        }
        let current = self.current;
        let successors = terminator.successors();
        for successor in &successors {
            let block = &mut self.function.basic_blocks[*successor as usize];
            if !block.predecessors.contains(&current) {
                block.predecessors.push(current);
            }
        }
        let block = &mut self.function.basic_blocks[current as usize];
        block.successors = successors;
        block.terminator = terminator;
        self.terminated[current as usize] = true;
    }

    pub fn ret(&mut self, value: Option<LirValue>) {
        self.terminate(LirTerminator::Return(value));
    }

    pub fn br(&mut self, target: BasicBlockId) {
        self.terminate(LirTerminator::Br(target));
    }

    pub fn cond_br(&mut self, condition: LirValue, if_true: BasicBlockId, if_false: BasicBlockId) {
        self.terminate(LirTerminator::CondBr {
            condition,
            if_true,
            if_false,
        });
    }

    pub fn unreachable(&mut self) {
        self.terminate(LirTerminator::Unreachable);
    }

    pub fn finish(self) -> LirFunction {
        self.function
    }

    // Arithmetic on i64 lengths and indices folds when both operands are constant.

    pub fn add(&mut self, lhs: LirValue, rhs: LirValue, ty: LirType) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) if ty == LirType::I64 => LirValue::i64(a.wrapping_add(b)),
            (_, Some(0)) => lhs,
            (Some(0), _) => rhs,
            _ => self.emit(LirInstructionKind::Add(lhs, rhs), ty),
        }
    }

    pub fn sub(&mut self, lhs: LirValue, rhs: LirValue, ty: LirType) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) if ty == LirType::I64 => LirValue::i64(a.wrapping_sub(b)),
            (_, Some(0)) => lhs,
            _ => self.emit(LirInstructionKind::Sub(lhs, rhs), ty),
        }
    }

    pub fn mul(&mut self, lhs: LirValue, rhs: LirValue, ty: LirType) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) if ty == LirType::I64 => LirValue::i64(a.wrapping_mul(b)),
            (_, Some(1)) => lhs,
            (Some(1), _) => rhs,
            _ => self.emit(LirInstructionKind::Mul(lhs, rhs), ty),
        }
    }

    pub fn udiv(&mut self, lhs: LirValue, rhs: LirValue, ty: LirType) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) if ty == LirType::I64 && b != 0 => LirValue::i64(a / b),
            (_, Some(1)) => lhs,
            _ => self.emit(LirInstructionKind::UDiv(lhs, rhs), ty),
        }
    }

    pub fn urem(&mut self, lhs: LirValue, rhs: LirValue, ty: LirType) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) if ty == LirType::I64 && b != 0 => LirValue::i64(a % b),
            _ => self.emit(LirInstructionKind::URem(lhs, rhs), ty),
        }
    }

    /// Emit a comparison; `kind` must be one of the comparison instructions.
    pub fn cmp(&mut self, kind: LirInstructionKind) -> LirValue {
        self.emit(kind, LirType::I1)
    }

    pub fn and(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.emit(LirInstructionKind::And(lhs, rhs), LirType::I1)
    }

    pub fn or(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.emit(LirInstructionKind::Or(lhs, rhs), LirType::I1)
    }

    pub fn not(&mut self, value: LirValue) -> LirValue {
        self.emit(
            LirInstructionKind::Xor(value, LirValue::bool(true)),
            LirType::I1,
        )
    }

    pub fn select(
        &mut self,
        condition: LirValue,
        if_true: LirValue,
        if_false: LirValue,
        ty: LirType,
    ) -> LirValue {
        self.emit(
            LirInstructionKind::Select {
                condition,
                if_true,
                if_false,
            },
            ty,
        )
    }

    pub fn load(&mut self, ty: LirType, address: LirValue) -> LirValue {
        self.emit(
            LirInstructionKind::Load {
                address,
                alignment: None,
                volatile: false,
            },
            ty,
        )
    }

    pub fn store(&mut self, ty: LirType, value: LirValue, address: LirValue) {
        let instruction = self.next_instruction(
            LirInstructionKind::Store {
                value,
                address,
                alignment: None,
                volatile: false,
            },
            Some(ty),
        );
        self.push(instruction);
    }

    /// Reserve a stack slot for one `ty` in the entry block so that slots
    /// requested inside loops are allocated once.
    pub fn alloca(&mut self, ty: &LirType) -> LirValue {
        let instruction = self.next_instruction(
            LirInstructionKind::Alloca {
                size: LirValue::i64(super::layout::size_of(ty).max(1)),
                alignment: super::layout::align_of(ty),
            },
            Some(LirType::ptr_to(ty.clone())),
        );
        let id = instruction.id;
        self.function.basic_blocks[0]
            .instructions
            .insert(self.entry_allocas, instruction);
        self.entry_allocas += 1;
        LirValue::Register(id)
    }

    /// Address of element `index` in the array of `elem_ty` starting at `ptr`.
    pub fn gep(&mut self, elem_ty: &LirType, ptr: LirValue, index: LirValue) -> LirValue {
        if index.as_const_u64() == Some(0) {
            return ptr;
        }
        self.gep_path(elem_ty, ptr, vec![index])
    }

    /// Address of field `field` of the struct `struct_ty` at `ptr`.
    pub fn gep_field(&mut self, struct_ty: &LirType, ptr: LirValue, field: u32) -> LirValue {
        self.gep_path(
            struct_ty,
            ptr,
            vec![LirValue::i64(0), LirValue::i64(field as u64)],
        )
    }

    pub fn gep_path(
        &mut self,
        elem_ty: &LirType,
        ptr: LirValue,
        indices: Vec<LirValue>,
    ) -> LirValue {
        self.emit(
            LirInstructionKind::GetElementPtr {
                ptr,
                elem_ty: elem_ty.clone(),
                indices,
                inbounds: true,
            },
            LirType::byte_ptr(),
        )
    }

    pub fn ptr_to_int(&mut self, ptr: LirValue) -> LirValue {
        self.emit(LirInstructionKind::PtrToInt(ptr), LirType::I64)
    }

    pub fn bitcast(&mut self, value: LirValue, ty: LirType) -> LirValue {
        self.emit(LirInstructionKind::Bitcast(value, ty.clone()), ty)
    }

    pub fn zext(&mut self, value: LirValue, ty: LirType) -> LirValue {
        self.emit(LirInstructionKind::ZExt(value, ty.clone()), ty)
    }

    pub fn trunc(&mut self, value: LirValue, ty: LirType) -> LirValue {
        self.emit(LirInstructionKind::Trunc(value, ty.clone()), ty)
    }

    pub fn extract_value(&mut self, aggregate: LirValue, index: u32, ty: LirType) -> LirValue {
        if let LirValue::Constant(LirConstant::Struct(fields, _) | LirConstant::Array(fields, _)) =
            &aggregate
        {
            if let Some(field) = fields.get(index as usize) {
                return LirValue::Constant(field.clone());
            }
        }
        self.emit(
            LirInstructionKind::ExtractValue {
                aggregate,
                indices: vec![index],
            },
            ty,
        )
    }

    pub fn insert_value(
        &mut self,
        aggregate: LirValue,
        element: LirValue,
        index: u32,
        ty: LirType,
    ) -> LirValue {
        self.emit(
            LirInstructionKind::InsertValue {
                aggregate,
                element,
                indices: vec![index],
            },
            ty,
        )
    }

    pub fn call(&mut self, name: &str, args: Vec<LirValue>, return_type: LirType) -> LirValue {
        self.emit(
            LirInstructionKind::Call {
                function: LirValue::Function(name.to_string()),
                args,
                calling_convention: CallingConvention::C,
                tail_call: false,
            },
            return_type,
        )
    }

    /// Call into the runtime-support interface. Calls to failure hooks close the
    /// current block with `unreachable`.
    pub fn call_runtime(&mut self, symbol: RuntimeSymbol, args: Vec<LirValue>) -> LirValue {
        trace!("emitting runtime call {}", symbol.as_str());
        let result = self.call(symbol.as_str(), args, symbol.return_type());
        if symbol.is_noreturn() {
            self.unreachable();
        }
        result
    }
}
