//! Operand evaluation and conversions between value forms.

use fp_core::error::Result;
use fp_core::expr::{Expr, ExprKind, Lit};
use fp_core::lir::{LirConstant, LirType, LirValue};
use fp_core::types::{Ty, TyKind};
use fp_core::value::{DValue, DValueKind, SliceValue};

use super::ArrayBuilder;

impl<'a> ArrayBuilder<'a> {
    /// Evaluate `expr` into a value. Side effects run in source order.
    pub fn lower_operand(&mut self, expr: &Expr) -> Result<DValue> {
        match &expr.kind {
            ExprKind::Literal(Lit::Str(_)) if expr.ty.is_slice() => {
                self.lower_array_literal(expr, &expr.ty)
            }
            ExprKind::Literal(_) => {
                let constant = self.lowering.expr_to_const(expr, &expr.ty)?;
                Ok(DValue::imm(expr.ty.clone(), LirValue::Constant(constant)))
            }
            ExprKind::Array(_) | ExprKind::ArrayRepeat { .. } => {
                self.lower_array_literal(expr, &expr.ty)
            }
            ExprKind::Struct(fields) => {
                if self.lowering.is_const_data(expr, &expr.ty) {
                    let constant = self.lowering.expr_to_const(expr, &expr.ty)?;
                    return Ok(DValue::imm(expr.ty.clone(), LirValue::Constant(constant)));
                }
                let struct_ty = self.lir(&expr.ty);
                let mut aggregate = LirValue::Constant(LirConstant::Undef(struct_ty.clone()));
                for (index, field) in fields.iter().enumerate() {
                    let value = self.lower_operand(field)?;
                    let value = self.to_imm(&value);
                    aggregate =
                        self.func
                            .insert_value(aggregate, value, index as u32, struct_ty.clone());
                }
                Ok(DValue::imm(expr.ty.clone(), aggregate))
            }
            ExprKind::Value(value) => Ok(value.clone()),
            ExprKind::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let value = self.lower_operand(arg)?;
                    values.push(self.to_imm(&value));
                }
                if matches!(expr.ty.kind, TyKind::Void) {
                    self.func.call(callee, values, LirType::Void);
                    return Ok(DValue::imm(
                        expr.ty.clone(),
                        LirValue::Undef(LirType::Void),
                    ));
                }
                let ret = self.lir(&expr.ty);
                let result = self.func.call(callee, values, ret);
                Ok(DValue::imm(expr.ty.clone(), result))
            }
        }
    }

    /// The value held by `value` as an SSA value of its lowered type.
    pub fn to_imm(&mut self, value: &DValue) -> LirValue {
        match &value.kind {
            DValueKind::Imm(imm) => imm.clone(),
            DValueKind::Lval(address) => {
                let ty = self.lir(&value.ty);
                self.func.load(ty, address.clone())
            }
            DValueKind::Slice { len, ptr } => {
                let slice = SliceValue::new(value.ty.clone(), len.clone(), ptr.clone());
                self.slice_imm(&slice)
            }
        }
    }

    /// Pack a slice into its `{ i64, ptr }` aggregate.
    pub fn slice_imm(&mut self, slice: &SliceValue) -> LirValue {
        let slice_ty = LirType::slice_of(self.lir(slice.elem_ty()));
        if let (LirValue::Constant(len), LirValue::Constant(ptr)) = (&slice.len, &slice.ptr) {
            return LirValue::Constant(LirConstant::Struct(
                vec![len.clone(), ptr.clone()],
                slice_ty,
            ));
        }
        let undef = LirValue::Constant(LirConstant::Undef(slice_ty.clone()));
        let with_len = self
            .func
            .insert_value(undef, slice.len.clone(), 0, slice_ty.clone());
        self.func
            .insert_value(with_len, slice.ptr.clone(), 1, slice_ty)
    }

    /// Store `value` of type `ty` at `address`.
    fn store_value(&mut self, ty: &Ty, value: &DValue, address: LirValue) {
        let imm = self.to_imm(value);
        let lowered = self.lir(ty);
        self.func.store(lowered, imm, address);
    }

    /// Store the result of evaluating `expr` at `address`, running the copy fixup
    /// when the value was copied out of existing storage.
    pub(super) fn store_expr(&mut self, expr: &Expr, elem: &Ty, address: LirValue) -> Result<()> {
        if elem.is_static_array() && expr.literal_len().is_some() {
            return self.initialize_array_literal(expr, address);
        }
        if self.lowering.config.fold_constants && self.lowering.is_const_data(expr, elem) {
            let constant = self.lowering.expr_to_const(expr, elem)?;
            let lowered = self.lir(elem);
            self.func
                .store(lowered, LirValue::Constant(constant), address);
            return Ok(());
        }
        let value = self.lower_operand(expr)?;
        self.store_value(elem, &value, address.clone());
        if value.is_lval() {
            self.emit_fixup(elem, address)?;
        }
        Ok(())
    }

    /// Put `value` in a stack slot and return its address.
    pub(super) fn spill(&mut self, value: &DValue) -> LirValue {
        if let DValueKind::Lval(address) = &value.kind {
            return address.clone();
        }
        let lowered = self.lir(&value.ty);
        let slot = self.func.alloca(&lowered);
        let imm = self.to_imm(value);
        self.func.store(lowered, imm, slot.clone());
        slot
    }
}
