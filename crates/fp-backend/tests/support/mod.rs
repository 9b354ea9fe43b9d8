#![allow(dead_code)]

pub mod assertions;
pub mod heap;
pub mod types;

use fp_backend::transforms::{ArrayBuilder, ArrayLowering};
use fp_core::config::{ArrayConfig, BoundsCheckMode};
use fp_core::diagnostics::{Diagnostic, DiagnosticLevel};
use fp_core::error::Error;
use fp_core::lir::{FunctionBuilder, LirProgram, LirType, LirValue};
use fp_core::types::{Ty, TyKind};
use fp_core::value::DValue;
use fp_lir_interpret::{LirInterpreter, Trap, Value};

/// Name of the function every lowering helper emits.
pub const ENTRY: &str = "test_entry";

/// Result of lowering one test function.
pub struct Lowered {
    pub program: LirProgram,
    pub diagnostics: Vec<Diagnostic>,
    pub has_errors: bool,
    pub outcome: fp_core::Result<()>,
}

impl Lowered {
    /// Interpreter over the lowered program; panics if lowering failed.
    pub fn interpreter(&self) -> LirInterpreter {
        if let Err(err) = &self.outcome {
            panic!("lowering failed: {} ({:?})", err, self.diagnostics);
        }
        LirInterpreter::new(self.program.clone()).expect("program should load")
    }

    pub fn error(&self) -> &Error {
        match &self.outcome {
            Err(err) => err,
            Ok(()) => panic!("expected lowering to fail"),
        }
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.level == DiagnosticLevel::Warning)
            .collect()
    }

    /// Direct callees of the test function.
    pub fn callees(&self) -> Vec<&str> {
        self.program
            .function(ENTRY)
            .map(|function| function.callees())
            .unwrap_or_default()
    }
}

pub fn config() -> ArrayConfig {
    ArrayConfig::default()
}

pub fn unchecked() -> ArrayConfig {
    ArrayConfig {
        bounds_checks: BoundsCheckMode::Off,
        ..ArrayConfig::default()
    }
}

/// Lower a function taking `params` and returning `ret`. `body` receives the
/// parameters as immediates and returns the value to return.
pub fn lower<F>(params: &[Ty], ret: &Ty, body: F) -> Lowered
where
    F: FnOnce(&mut ArrayBuilder<'_>, &[DValue]) -> fp_core::Result<Option<LirValue>>,
{
    lower_with(config(), params, ret, body)
}

pub fn lower_with<F>(config: ArrayConfig, params: &[Ty], ret: &Ty, body: F) -> Lowered
where
    F: FnOnce(&mut ArrayBuilder<'_>, &[DValue]) -> fp_core::Result<Option<LirValue>>,
{
    let mut lowering = ArrayLowering::with_config(config);
    let param_tys = params
        .iter()
        .map(|ty| lowering.types().lower_ty(ty))
        .collect();
    let ret_ty = match ret.kind {
        TyKind::Void => LirType::Void,
        _ => lowering.types().lower_ty(ret),
    };
    let mut func = FunctionBuilder::new(ENTRY, param_tys, ret_ty);
    let args: Vec<DValue> = params
        .iter()
        .enumerate()
        .map(|(index, ty)| DValue::imm(ty.clone(), func.param(index)))
        .collect();

    let outcome = {
        let mut builder = lowering.builder(&mut func);
        body(&mut builder, &args).map(|ret| {
            if !builder.func().is_terminated() {
                builder.func().ret(ret);
            }
        })
    };
    let (diagnostics, has_errors) = lowering.take_diagnostics();
    Lowered {
        program: lowering.finish_program(vec![func.finish()]),
        diagnostics,
        has_errors,
        outcome,
    }
}

/// Store `value` in a fresh stack slot and return the slot as an lvalue.
pub fn lval(builder: &mut ArrayBuilder<'_>, value: &DValue) -> DValue {
    let lowered = builder.types().lower_ty(&value.ty);
    let imm = builder.to_imm(value);
    let slot = builder.func().alloca(&lowered);
    builder.func().store(lowered, imm, slot.clone());
    DValue::lval(value.ty.clone(), slot)
}

pub fn run(interpreter: &mut LirInterpreter, args: Vec<Value>) -> Result<Value, Trap> {
    interpreter.call(ENTRY, args)
}
