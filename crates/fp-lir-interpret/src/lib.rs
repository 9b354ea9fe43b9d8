//! Reference interpreter for LIR programs.
//!
//! Runs lowered code against a simulated heap and an in-process implementation
//! of the runtime-support interface, so that emitted array code can be checked
//! by executing it.

pub mod error;
pub mod memory;
pub mod value;

mod engine;

pub use engine::{HostFn, LirInterpreter, DEFAULT_STEP_LIMIT};
pub use error::{Result, Trap};
pub use memory::{Memory, POISON};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use fp_core::lir::{
        FunctionBuilder, LirConstant, LirGlobal, LirInstructionKind, LirProgram, LirType,
        LirValue, Linkage, Name, RuntimeSymbol,
    };
    use fp_core::span::Span;

    fn program(functions: Vec<FunctionBuilder>) -> LirProgram {
        LirProgram {
            functions: functions.into_iter().map(FunctionBuilder::finish).collect(),
            globals: Vec::new(),
        }
    }

    #[test]
    fn loops_run_to_completion() {
        // sum of 0..n
        let mut f = FunctionBuilder::new("sum", vec![LirType::I64], LirType::I64);
        let acc = f.alloca(&LirType::I64);
        let counter = f.alloca(&LirType::I64);
        f.store(LirType::I64, LirValue::i64(0), acc.clone());
        f.store(LirType::I64, LirValue::i64(0), counter.clone());
        let cond = f.create_block("cond");
        let body = f.create_block("body");
        let exit = f.create_block("exit");
        f.br(cond);
        f.switch_to_block(cond);
        let i = f.load(LirType::I64, counter.clone());
        let more = f.cmp(LirInstructionKind::ULt(i.clone(), f.param(0)));
        f.cond_br(more, body, exit);
        f.switch_to_block(body);
        let sum = f.load(LirType::I64, acc.clone());
        let sum = f.add(sum, i.clone(), LirType::I64);
        f.store(LirType::I64, sum, acc.clone());
        let next = f.add(i, LirValue::i64(1), LirType::I64);
        f.store(LirType::I64, next, counter);
        f.br(cond);
        f.switch_to_block(exit);
        let total = f.load(LirType::I64, acc);
        f.ret(Some(total));

        let mut interpreter = LirInterpreter::new(program(vec![f])).unwrap();
        let result = interpreter.call("sum", vec![Value::i64(5)]).unwrap();
        assert_eq!(result, Value::i64(10));
        // frame slots are released on return
        assert_eq!(interpreter.memory().live_blocks(), 0);
    }

    #[test]
    fn failure_hooks_report_their_location() {
        let mut f = FunctionBuilder::new("oob", Vec::new(), LirType::Void);
        f.call_runtime(
            RuntimeSymbol::ArrayBoundsFail,
            vec![
                LirValue::i64(7),
                LirValue::i64(10),
                LirValue::i64(3_000_000_000),
                LirValue::i64(5),
                LirValue::i64(5),
            ],
        );
        let mut interpreter = LirInterpreter::new(program(vec![f])).unwrap();
        let trap = interpreter.call("oob", Vec::new()).unwrap_err();
        assert_eq!(
            trap,
            Trap::BoundsViolation {
                span: Span::new(7, 10, 3_000_000_000),
                index: 5,
                len: 5
            }
        );
        assert_eq!(trap.span(), Some(Span::new(7, 10, 3_000_000_000)));
    }

    #[test]
    fn overlapping_memcpy_faults() {
        let mut f = FunctionBuilder::new("copy", vec![LirType::byte_ptr()], LirType::Void);
        let src = f.param(0);
        let dst = f.gep(&LirType::I8, src.clone(), LirValue::i64(2));
        f.call_runtime(RuntimeSymbol::Memcpy, vec![dst, src, LirValue::i64(4)]);
        f.ret(None);

        let mut interpreter = LirInterpreter::new(program(vec![f])).unwrap();
        let buffer = interpreter.memory_mut().allocate(8, true);
        let trap = interpreter.call("copy", vec![Value::Ptr(buffer)]).unwrap_err();
        assert!(matches!(trap, Trap::Fault(message) if message.contains("overlapping")));
    }

    #[test]
    fn constant_globals_are_materialized_read_only() {
        let data = LirConstant::Array(
            vec![
                LirConstant::UInt(1, LirType::I32),
                LirConstant::UInt(2, LirType::I32),
            ],
            LirType::Array(Box::new(LirType::I32), 2),
        );
        let global = LirGlobal {
            name: Name::new(".data"),
            ty: data.ty(),
            initializer: Some(data),
            linkage: Linkage::Private,
            is_constant: true,
            alignment: Some(4),
        };
        let mut f = FunctionBuilder::new("second", Vec::new(), LirType::I32);
        let base = LirValue::Constant(LirConstant::GlobalRef(
            Name::new(".data"),
            LirType::ptr_to(LirType::I32),
            Vec::new(),
        ));
        let slot = f.gep(&LirType::I32, base, LirValue::i64(1));
        let value = f.load(LirType::I32, slot);
        f.ret(Some(value));

        let mut lir = program(vec![f]);
        lir.globals.push(global);
        let mut interpreter = LirInterpreter::new(lir).unwrap();
        assert_eq!(interpreter.call("second", Vec::new()).unwrap(), Value::i32(2));
        let address = interpreter.global_address(".data").unwrap();
        assert!(interpreter.memory_mut().write_bytes(address, &[0]).is_err());
    }

    #[test]
    fn host_functions_are_called_by_name() {
        let mut f = FunctionBuilder::new("twice", vec![LirType::I32], LirType::I32);
        let once = f.call("probe", vec![f.param(0)], LirType::I32);
        let twice = f.call("probe", vec![once], LirType::I32);
        f.ret(Some(twice));

        let mut interpreter = LirInterpreter::new(program(vec![f])).unwrap();
        interpreter.register_host(
            "probe",
            Box::new(|_: &mut Memory, args: &[Value]| -> eyre::Result<Value> {
                let value = args[0].as_i64().unwrap_or_default();
                Ok(Value::i32(value as i32 + 1))
            }),
        );
        assert_eq!(interpreter.call("twice", vec![Value::i32(40)]).unwrap(), Value::i32(42));
    }

    #[test]
    fn runaway_loops_hit_the_step_limit() {
        let mut f = FunctionBuilder::new("spin", Vec::new(), LirType::Void);
        let body = f.create_block("body");
        f.br(body);
        f.switch_to_block(body);
        let slot = f.alloca(&LirType::I64);
        f.store(LirType::I64, LirValue::i64(1), slot);
        f.br(body);

        let mut interpreter = LirInterpreter::new(program(vec![f])).unwrap();
        interpreter.set_step_limit(1_000);
        assert_eq!(
            interpreter.call("spin", Vec::new()).unwrap_err(),
            Trap::StepLimit(1_000)
        );
    }
}
