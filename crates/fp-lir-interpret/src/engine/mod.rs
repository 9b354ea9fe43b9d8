mod operators;
mod runtime;

use std::collections::HashMap;
use std::sync::Arc;

use fp_core::lir::{
    layout, BasicBlockId, LirConstant, LirFunction, LirInstruction, LirInstructionKind,
    LirProgram, LirTerminator, LirType, LirValue, RuntimeSymbol,
};
use itertools::Itertools;
use tracing::{debug, trace};

use crate::error::{Result, Trap};
use crate::memory::Memory;
use crate::value::Value;
use crate::{bail_fault, ensure_fault};
use operators::Operator;

/// A function provided by the embedder, called by symbol from interpreted code.
pub type HostFn = Box<dyn FnMut(&mut Memory, &[Value]) -> eyre::Result<Value>>;

pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Executes a `LirProgram` over a simulated heap.
///
/// Calls resolve first to functions of the program, then to registered host
/// functions, then to the runtime-support interface.
pub struct LirInterpreter {
    program: Arc<LirProgram>,
    memory: Memory,
    globals: HashMap<String, u64>,
    hosts: HashMap<String, HostFn>,
    step_limit: u64,
    steps: u64,
}

#[derive(Default)]
struct Frame {
    registers: HashMap<u32, Value>,
    allocas: Vec<u64>,
}

impl LirInterpreter {
    /// Load `program`, materializing its globals in memory. Constant globals are
    /// read-only.
    pub fn new(program: LirProgram) -> Result<Self> {
        let mut interpreter = Self {
            program: Arc::new(program),
            memory: Memory::new(),
            globals: HashMap::new(),
            hosts: HashMap::new(),
            step_limit: DEFAULT_STEP_LIMIT,
            steps: 0,
        };
        let program = Arc::clone(&interpreter.program);
        for global in &program.globals {
            let size = layout::size_of(&global.ty) as usize;
            let address = interpreter.memory.allocate_data(vec![0; size], false);
            interpreter
                .globals
                .insert(global.name.as_str().to_string(), address);
        }
        // initializers may refer to each other, so every address exists first
        for global in &program.globals {
            let address = interpreter.globals[global.name.as_str()];
            if let Some(initializer) = &global.initializer {
                let value = interpreter.constant(initializer)?;
                interpreter.memory.store(&global.ty, address, &value)?;
            }
            if global.is_constant {
                interpreter.memory.protect(address);
            }
        }
        debug!("loaded {} globals", program.globals.len());
        trace!("{}", program);
        Ok(interpreter)
    }

    pub fn register_host(&mut self, name: impl Into<String>, host: HostFn) {
        self.hosts.insert(name.into(), host);
    }

    pub fn set_step_limit(&mut self, limit: u64) {
        self.step_limit = limit;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn global_address(&self, name: &str) -> Option<u64> {
        self.globals.get(name).copied()
    }

    /// Call `name` with `args` and return its result (`Value::Void` for void functions).
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let program = Arc::clone(&self.program);
        if let Some(function) = program.function(name) {
            return self.run(function, args);
        }
        if let Some(host) = self.hosts.get_mut(name) {
            trace!("host {}({})", name, args.iter().join(", "));
            return host(&mut self.memory, &args).map_err(Trap::from);
        }
        match RuntimeSymbol::from_name(name) {
            Some(symbol) => runtime::call(&mut self.memory, symbol, &args),
            None => bail_fault!("call to unknown function `{}`", name),
        }
    }

    fn run(&mut self, function: &LirFunction, args: Vec<Value>) -> Result<Value> {
        ensure_fault!(
            args.len() == function.signature.params.len(),
            "`{}` takes {} arguments, got {}",
            function.name,
            function.signature.params.len(),
            args.len()
        );
        let mut frame = Frame::default();
        for (index, arg) in args.into_iter().enumerate() {
            frame.registers.insert(index as u32, arg);
        }
        let result = self.run_blocks(function, &mut frame);
        for base in frame.allocas {
            self.memory.release(base);
        }
        result
    }

    fn run_blocks(&mut self, function: &LirFunction, frame: &mut Frame) -> Result<Value> {
        let Some(entry) = function.basic_blocks.first() else {
            bail_fault!("`{}` has no body", function.name);
        };
        let mut current: BasicBlockId = entry.id;
        loop {
            let Some(block) = function.get_basic_block(current) else {
                bail_fault!("`{}` has no block bb{}", function.name, current);
            };
            for instruction in &block.instructions {
                self.steps += 1;
                if self.steps > self.step_limit {
                    return Err(Trap::StepLimit(self.step_limit));
                }
                let value = self.execute(frame, instruction)?;
                frame.registers.insert(instruction.id, value);
            }
            current = match &block.terminator {
                LirTerminator::Return(None) => return Ok(Value::Void),
                LirTerminator::Return(Some(value)) => return self.operand(frame, value),
                LirTerminator::Br(target) => *target,
                LirTerminator::CondBr {
                    condition,
                    if_true,
                    if_false,
                } => match self.operand(frame, condition)?.as_bool() {
                    Some(true) => *if_true,
                    Some(false) => *if_false,
                    None => bail_fault!("branch on a non-boolean in `{}`", function.name),
                },
                LirTerminator::Switch {
                    value,
                    default,
                    cases,
                } => {
                    let Some(value) = self.operand(frame, value)?.as_u64() else {
                        bail_fault!("switch on a non-integer in `{}`", function.name);
                    };
                    cases
                        .iter()
                        .find(|(case, _)| *case == value)
                        .map(|(_, target)| *target)
                        .unwrap_or(*default)
                }
                LirTerminator::Unreachable => {
                    return Err(Trap::Unreachable {
                        function: function.name.to_string(),
                        block: current,
                    })
                }
            };
        }
    }

    fn execute(&mut self, frame: &mut Frame, instruction: &LirInstruction) -> Result<Value> {
        use LirInstructionKind as K;
        if let Some((operator, lhs, rhs)) = operators::classify(&instruction.kind) {
            let lhs = self.operand(frame, lhs)?;
            let rhs = self.operand(frame, rhs)?;
            return match operator {
                Operator::Binary(op) => operators::binary(op, &lhs, &rhs),
                Operator::Compare(op) => operators::compare(op, &lhs, &rhs),
            };
        }
        let ty = instruction.type_hint.as_ref();
        match &instruction.kind {
            K::Load { address, .. } => {
                let address = self.address(frame, address)?;
                self.memory.load(result_type(ty)?, address)
            }
            K::Store { value, address, .. } => {
                let value = self.operand(frame, value)?;
                let address = self.address(frame, address)?;
                self.memory.store(result_type(ty)?, address, &value)?;
                Ok(Value::Void)
            }
            K::Alloca { size, .. } => {
                let Some(size) = self.operand(frame, size)?.as_u64() else {
                    bail_fault!("alloca of a non-integer size");
                };
                let base = self.memory.allocate(size, false);
                frame.allocas.push(base);
                Ok(Value::Ptr(base))
            }
            K::GetElementPtr {
                ptr,
                elem_ty,
                indices,
                ..
            } => {
                let base = self.address(frame, ptr)?;
                let Some((first, rest)) = indices.split_first() else {
                    return Ok(Value::Ptr(base));
                };
                let Some(first) = self.operand(frame, first)?.as_i64() else {
                    bail_fault!("non-integer element index");
                };
                let stride = layout::size_of(elem_ty) as i64;
                let mut path = Vec::with_capacity(rest.len());
                for index in rest {
                    let Some(index) = self.operand(frame, index)?.as_u64() else {
                        bail_fault!("non-integer field index");
                    };
                    path.push(index);
                }
                let Some(offset) = layout::offset_of_path(elem_ty, &path) else {
                    bail_fault!("invalid element path {:?} into {:?}", path, elem_ty);
                };
                let address = base
                    .wrapping_add(first.wrapping_mul(stride) as u64)
                    .wrapping_add(offset);
                Ok(Value::Ptr(address))
            }
            K::PtrToInt(value) => {
                let address = self.address(frame, value)?;
                Ok(Value::int(64, address))
            }
            K::IntToPtr(value) => {
                let address = self.address(frame, value)?;
                Ok(Value::Ptr(address))
            }
            K::Trunc(value, target) => operators::trunc(&self.operand(frame, value)?, target),
            K::ZExt(value, target) => operators::zext(&self.operand(frame, value)?, target),
            K::SExt(value, target) => operators::sext(&self.operand(frame, value)?, target),
            K::Bitcast(value, target) => operators::bitcast(&self.operand(frame, value)?, target),
            K::ExtractValue { aggregate, indices } => {
                let mut value = self.operand(frame, aggregate)?;
                for index in indices {
                    value = match value {
                        Value::Aggregate(mut fields) if (*index as usize) < fields.len() => {
                            fields.swap_remove(*index as usize)
                        }
                        other => bail_fault!("extractvalue {} from {}", index, other),
                    };
                }
                Ok(value)
            }
            K::InsertValue {
                aggregate,
                element,
                indices,
            } => {
                let mut value = self.operand(frame, aggregate)?;
                let element = self.operand(frame, element)?;
                insert(&mut value, indices, element)?;
                Ok(value)
            }
            K::Call { function, args, .. } => {
                let LirValue::Function(name) = function else {
                    bail_fault!("indirect calls are not supported");
                };
                let args = args
                    .iter()
                    .map(|arg| self.operand(frame, arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call(name, args)
            }
            K::Select {
                condition,
                if_true,
                if_false,
            } => match self.operand(frame, condition)?.as_bool() {
                Some(true) => self.operand(frame, if_true),
                Some(false) => self.operand(frame, if_false),
                None => bail_fault!("select on a non-boolean"),
            },
            other => bail_fault!("unsupported instruction {:?}", other),
        }
    }

    fn operand(&self, frame: &Frame, value: &LirValue) -> Result<Value> {
        match value {
            LirValue::Register(id) => match frame.registers.get(id) {
                Some(value) => Ok(value.clone()),
                None => bail_fault!("read of undefined register %{}", id),
            },
            LirValue::Constant(constant) => self.constant(constant),
            LirValue::Global(name, _) => self.global(name),
            LirValue::Function(name) => bail_fault!("function `{}` used as a value", name),
            LirValue::Null(_) => Ok(Value::Ptr(0)),
            LirValue::Undef(ty) => Ok(Value::zero(ty)),
        }
    }

    fn address(&self, frame: &Frame, value: &LirValue) -> Result<u64> {
        match self.operand(frame, value)?.as_u64() {
            Some(address) => Ok(address),
            None => bail_fault!("expected an address, found {:?}", value),
        }
    }

    fn global(&self, name: &str) -> Result<Value> {
        match self.globals.get(name) {
            Some(address) => Ok(Value::Ptr(*address)),
            None => bail_fault!("unknown global `{}`", name),
        }
    }

    fn constant(&self, constant: &LirConstant) -> Result<Value> {
        Ok(match constant {
            LirConstant::Int(value, ty) => Value::int(int_bits(ty), *value as u64),
            LirConstant::UInt(value, ty) => Value::int(int_bits(ty), *value),
            LirConstant::Float(value, LirType::F32) => Value::Float(*value as f32 as f64),
            LirConstant::Float(value, _) => Value::Float(*value),
            LirConstant::Bool(value) => Value::bool(*value),
            LirConstant::Array(elements, _) | LirConstant::Struct(elements, _) => Value::Aggregate(
                elements
                    .iter()
                    .map(|element| self.constant(element))
                    .collect::<Result<Vec<_>>>()?,
            ),
            LirConstant::GlobalRef(name, _, path) => {
                let Value::Ptr(base) = self.global(name.as_str())? else {
                    bail_fault!("global `{}` has no address", name);
                };
                let Some(ty) = self
                    .program
                    .globals
                    .iter()
                    .find(|global| global.name == *name)
                    .map(|global| &global.ty)
                else {
                    bail_fault!("unknown global `{}`", name);
                };
                let Some(offset) = layout::offset_of_path(ty, path) else {
                    bail_fault!("invalid path {:?} into `{}`", path, name);
                };
                Value::Ptr(base + offset)
            }
            LirConstant::Null(_) => Value::Ptr(0),
            LirConstant::Zeroed(ty) | LirConstant::Undef(ty) => Value::zero(ty),
        })
    }
}

fn result_type(ty: Option<&LirType>) -> Result<&LirType> {
    match ty {
        Some(ty) => Ok(ty),
        None => bail_fault!("memory access without a type"),
    }
}

fn int_bits(ty: &LirType) -> u32 {
    match ty {
        LirType::Ptr(_) => 64,
        other => other.int_bits().unwrap_or(64),
    }
}

fn insert(aggregate: &mut Value, path: &[u32], element: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *aggregate = element;
        return Ok(());
    };
    match aggregate {
        Value::Aggregate(fields) if (*first as usize) < fields.len() => {
            insert(&mut fields[*first as usize], rest, element)
        }
        other => bail_fault!("insertvalue {} into {}", first, other),
    }
}
