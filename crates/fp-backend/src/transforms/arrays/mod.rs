//! Lowering of static and dynamic array operations into LIR.
//!
//! `ArrayLowering` holds the state that outlives a single function body: the
//! memoized type mapper, constant data contributed as globals, configuration and
//! diagnostics. `ArrayBuilder` pairs it with the `FunctionBuilder` of the body
//! currently being emitted; every array primitive is a method on it.
//!
//! Compile-time errors are recorded as diagnostics and returned as `Err`, which
//! aborts only the expression being lowered. Failures that can only be detected
//! at run time become calls into the runtime-support interface.

mod alloc;
mod assign;
mod bounds;
mod cast;
mod compare;
mod concat;
mod consts;
mod expr;
mod init;
mod types;

pub use assign::AssignOp;
pub use compare::{EqOp, IdentityOp, OrdOp};
pub use types::{ElemInfo, TypeMapper};

use fp_core::config::ArrayConfig;
use std::sync::Arc;

use fp_core::diagnostics::{Diagnostic, DiagnosticManager};
use fp_core::error::{Error, Result};
use fp_core::lir::{
    layout, FunctionBuilder, LirConstant, LirFunction, LirGlobal, LirInstructionKind,
    LirProgram, LirType, LirValue, Linkage, Name,
};
use fp_core::span::Span;
use fp_core::types::Ty;

const DIAGNOSTIC_CONTEXT: &str = "arrays";

pub struct ArrayLowering {
    types: TypeMapper,
    config: ArrayConfig,
    globals: Vec<LirGlobal>,
    next_global: u32,
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
    shared: Option<Arc<DiagnosticManager>>,
}

impl ArrayLowering {
    pub fn new() -> Self {
        Self::with_config(ArrayConfig::global().clone())
    }

    pub fn with_config(config: ArrayConfig) -> Self {
        Self {
            types: TypeMapper::new(),
            config,
            globals: Vec::new(),
            next_global: 0,
            diagnostics: Vec::new(),
            has_errors: false,
            shared: None,
        }
    }

    /// Also report every diagnostic to `manager`, shared with the rest of the pipeline.
    pub fn with_diagnostics(mut self, manager: Arc<DiagnosticManager>) -> Self {
        self.shared = Some(manager);
        self
    }

    pub fn types(&self) -> &TypeMapper {
        &self.types
    }

    pub fn config(&self) -> &ArrayConfig {
        &self.config
    }

    pub fn globals(&self) -> &[LirGlobal] {
        &self.globals
    }

    /// Start emitting array operations into `func`.
    pub fn builder<'a>(&'a mut self, func: &'a mut FunctionBuilder) -> ArrayBuilder<'a> {
        ArrayBuilder {
            lowering: self,
            func,
            span: Span::DUMMY,
        }
    }

    pub fn take_diagnostics(&mut self) -> (Vec<Diagnostic>, bool) {
        let diagnostics = std::mem::take(&mut self.diagnostics);
        let has_errors = std::mem::replace(&mut self.has_errors, false);
        (diagnostics, has_errors)
    }

    /// Assemble `functions` and the constant data they reference into a program.
    pub fn finish_program(self, functions: Vec<LirFunction>) -> LirProgram {
        LirProgram {
            functions,
            globals: self.globals,
        }
    }

    /// Define a private constant global holding `data` and return its name.
    fn define_constant_data(&mut self, data: LirConstant) -> Name {
        let name = Name::new(format!(".arr.{}", self.next_global));
        self.next_global += 1;
        let ty = data.ty();
        debug!("defining constant array data {} : {:?}", name, ty);
        self.globals.push(LirGlobal {
            name: name.clone(),
            alignment: Some(layout::align_of(&ty)),
            ty,
            initializer: Some(data),
            linkage: Linkage::Private,
            is_constant: true,
        });
        name
    }

    /// Record `error` and hand it back for propagation.
    fn emit_error(&mut self, error: Error) -> Error {
        self.has_errors = true;
        self.record(Diagnostic::from_error(&error).with_source_context(DIAGNOSTIC_CONTEXT));
        error
    }

    fn emit_warning(&mut self, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(message.into())
            .with_source_context(DIAGNOSTIC_CONTEXT)
            .with_span(span)
            .with_suggestion("the access always fails at run time");
        self.record(diagnostic);
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        if let Some(shared) = &self.shared {
            shared.add_diagnostic(diagnostic.clone());
        }
        self.diagnostics.push(diagnostic);
    }
}

impl Default for ArrayLowering {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ArrayBuilder<'a> {
    lowering: &'a mut ArrayLowering,
    func: &'a mut FunctionBuilder,
    span: Span,
}

impl<'a> ArrayBuilder<'a> {
    /// Location reported by diagnostics and runtime failure hooks for the
    /// operations that follow.
    pub fn set_span(&mut self, span: Span) {
        self.span = span;
        self.func.set_span(Some(span));
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn func(&mut self) -> &mut FunctionBuilder {
        self.func
    }

    pub fn types(&self) -> &TypeMapper {
        &self.lowering.types
    }

    pub fn config(&self) -> &ArrayConfig {
        &self.lowering.config
    }

    fn lir(&self, ty: &Ty) -> LirType {
        self.lowering.types.lower_ty(ty)
    }

    fn fail<T>(&mut self, error: Error) -> Result<T> {
        Err(self.lowering.emit_error(error))
    }

    fn fail_lowering<T>(&mut self, message: impl Into<String>) -> Result<T> {
        let span = self.span;
        self.fail(Error::Lowering {
            span,
            message: message.into(),
        })
    }

    fn warn(&mut self, message: impl Into<String>) {
        let span = self.span;
        self.lowering.emit_warning(span, message);
    }

    /// `(file, lo, hi)` arguments identifying the current location to a failure hook.
    fn location_args(&self) -> Vec<LirValue> {
        vec![
            LirValue::i64(self.span.file),
            LirValue::i64(u64::from(self.span.lo)),
            LirValue::i64(u64::from(self.span.hi)),
        ]
    }

    // Unsigned i64 comparisons; fold when both sides are constant.

    fn cmp_u64(
        &mut self,
        lhs: LirValue,
        rhs: LirValue,
        fold: fn(u64, u64) -> bool,
        kind: fn(LirValue, LirValue) -> LirInstructionKind,
    ) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) => LirValue::bool(fold(a, b)),
            _ => self.func.cmp(kind(lhs, rhs)),
        }
    }

    fn ult(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.cmp_u64(lhs, rhs, |a, b| a < b, LirInstructionKind::ULt)
    }

    fn ule(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.cmp_u64(lhs, rhs, |a, b| a <= b, LirInstructionKind::ULe)
    }

    fn ugt(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.cmp_u64(lhs, rhs, |a, b| a > b, LirInstructionKind::UGt)
    }

    fn ieq(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.cmp_u64(lhs, rhs, |a, b| a == b, LirInstructionKind::Eq)
    }

    fn ine(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.cmp_u64(lhs, rhs, |a, b| a != b, LirInstructionKind::Ne)
    }

    fn and(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        match (const_bool(&lhs), const_bool(&rhs)) {
            (Some(false), _) | (_, Some(false)) => LirValue::bool(false),
            (Some(true), _) => rhs,
            (_, Some(true)) => lhs,
            _ => self.func.and(lhs, rhs),
        }
    }

    fn not(&mut self, value: LirValue) -> LirValue {
        match const_bool(&value) {
            Some(value) => LirValue::bool(!value),
            None => self.func.not(value),
        }
    }

    fn umin(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        match (lhs.as_const_u64(), rhs.as_const_u64()) {
            (Some(a), Some(b)) => LirValue::i64(a.min(b)),
            _ => {
                let lt = self.ult(lhs.clone(), rhs.clone());
                self.func.select(lt, lhs, rhs, LirType::I64)
            }
        }
    }

    /// Run `body` in a block entered only when `condition` holds. Constant
    /// conditions emit the body inline or not at all.
    fn emit_if<F>(&mut self, condition: LirValue, label: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        match const_bool(&condition) {
            Some(true) => return body(self),
            Some(false) => return Ok(()),
            None => {}
        }
        let then_bb = self.func.create_block(label);
        let join_bb = self.func.create_block("arr.endif");
        self.func.cond_br(condition, then_bb, join_bb);
        self.func.switch_to_block(then_bb);
        body(self)?;
        if !self.func.is_terminated() {
            self.func.br(join_bb);
        }
        self.func.switch_to_block(join_bb);
        Ok(())
    }

    /// Emit a call to a failure hook taken when `failed` holds; emission
    /// continues in the success block.
    fn emit_trap_if(
        &mut self,
        failed: LirValue,
        symbol: fp_core::lir::RuntimeSymbol,
        extra: Vec<LirValue>,
    ) {
        if const_bool(&failed) == Some(false) {
            return;
        }
        let mut args = self.location_args();
        args.extend(extra);
        if const_bool(&failed) == Some(true) {
            self.func.call_runtime(symbol, args);
            let dead = self.func.create_block("arr.dead");
            self.func.switch_to_block(dead);
            return;
        }
        let fail_bb = self.func.create_block("arr.fail");
        let ok_bb = self.func.create_block("arr.ok");
        self.func.cond_br(failed, fail_bb, ok_bb);
        self.func.switch_to_block(fail_bb);
        self.func.call_runtime(symbol, args);
        self.func.switch_to_block(ok_bb);
    }

    /// Emit a counted loop over `0..len`, calling `body` with the current index.
    /// `reverse` walks from `len - 1` down to `0`.
    fn emit_loop<F>(&mut self, len: LirValue, reverse: bool, mut body: F) -> Result<()>
    where
        F: FnMut(&mut Self, LirValue) -> Result<()>,
    {
        match len.as_const_u64() {
            Some(0) => return Ok(()),
            Some(1) => return body(self, LirValue::i64(0)),
            _ => {}
        }
        let counter = self.func.alloca(&LirType::I64);
        let start = if reverse { len.clone() } else { LirValue::i64(0) };
        self.func.store(LirType::I64, start, counter.clone());

        let cond_bb = self.func.create_block("arr.loop.cond");
        let body_bb = self.func.create_block("arr.loop.body");
        let exit_bb = self.func.create_block("arr.loop.exit");
        self.func.br(cond_bb);

        self.func.switch_to_block(cond_bb);
        let current = self.func.load(LirType::I64, counter.clone());
        let more = if reverse {
            self.func
                .cmp(LirInstructionKind::UGt(current.clone(), LirValue::i64(0)))
        } else {
            self.func
                .cmp(LirInstructionKind::ULt(current.clone(), len))
        };
        self.func.cond_br(more, body_bb, exit_bb);

        self.func.switch_to_block(body_bb);
        if reverse {
            let index = self.func.sub(current, LirValue::i64(1), LirType::I64);
            self.func.store(LirType::I64, index.clone(), counter);
            body(self, index)?;
        } else {
            body(self, current.clone())?;
            let next = self.func.add(current, LirValue::i64(1), LirType::I64);
            self.func.store(LirType::I64, next, counter);
        }
        self.func.br(cond_bb);

        self.func.switch_to_block(exit_bb);
        Ok(())
    }

    /// Run the copy fixup of `ty` on the value stored at `address`.
    fn emit_fixup(&mut self, ty: &Ty, address: LirValue) -> Result<()> {
        use fp_core::types::TyKind;
        if !ty.needs_postblit() {
            return Ok(());
        }
        match &ty.kind {
            TyKind::Adt(def) => {
                if let Some(hook) = &def.hooks.postblit {
                    self.func.call(hook, vec![address], LirType::Void);
                    return Ok(());
                }
                let struct_ty = self.lir(ty);
                for (index, field) in def.fields.iter().enumerate() {
                    if field.needs_postblit() {
                        let field_addr =
                            self.func
                                .gep_field(&struct_ty, address.clone(), index as u32);
                        self.emit_fixup(field, field_addr)?;
                    }
                }
                Ok(())
            }
            TyKind::Array(elem, len) => self.fixup_range(elem, address, LirValue::i64(*len), false),
            _ => Ok(()),
        }
    }

    /// Run copy fixups on `len` consecutive elements of type `elem` at `ptr`.
    fn fixup_range(
        &mut self,
        elem: &Ty,
        ptr: LirValue,
        len: LirValue,
        reverse: bool,
    ) -> Result<()> {
        if !elem.needs_postblit() {
            return Ok(());
        }
        let elem_lir = self.lir(elem);
        self.emit_loop(len, reverse, |b, index| {
            let address = b.func.gep(&elem_lir, ptr.clone(), index);
            b.emit_fixup(elem, address)
        })
    }
}

fn const_bool(value: &LirValue) -> Option<bool> {
    match value {
        LirValue::Constant(LirConstant::Bool(value)) => Some(*value),
        _ => None,
    }
}
