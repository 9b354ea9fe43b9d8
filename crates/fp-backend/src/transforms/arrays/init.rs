use fp_core::error::{Error, Result};
use fp_core::expr::{Expr, ExprKind, Lit};
use fp_core::lir::{LirConstant, LirType, LirValue};
use fp_core::types::Ty;
use fp_core::value::{DValue, SliceValue};

use super::consts::encode_str;
use super::ArrayBuilder;

impl<'a> ArrayBuilder<'a> {
    /// Write the elements of `literal` into the storage at `dst`, in source order.
    pub fn initialize_array_literal(&mut self, literal: &Expr, dst: LirValue) -> Result<()> {
        let Some(elem) = literal.ty.array_elem().cloned() else {
            bug!("array literal of non-array type `{}`", literal.ty);
        };
        debug!("initializing `{}` literal at {}", literal.ty, literal.span);
        let elem_ty = self.lir(&elem);

        let foldable = self.lowering.is_const_data(literal, &elem)
            && (self.config().fold_constants || matches!(literal.kind, ExprKind::Literal(_)));
        if foldable {
            let elements = self.lowering.literal_elements(literal, &elem)?;
            let len = elements.len() as u64;
            if len == 0 {
                return Ok(());
            }
            let data_ty = LirType::Array(Box::new(elem_ty.clone()), len);
            let data = LirConstant::Array(elements, data_ty.clone());
            self.func.store(data_ty, LirValue::Constant(data), dst);
            return Ok(());
        }

        match &literal.kind {
            ExprKind::Array(elements) => {
                for (index, element) in elements.iter().enumerate() {
                    let address = self
                        .func
                        .gep(&elem_ty, dst.clone(), LirValue::i64(index as u64));
                    self.store_expr(element, &elem, address)?;
                }
                Ok(())
            }
            ExprKind::ArrayRepeat { elem: value, len } => {
                // evaluated once, then copied into every slot
                let value = self.lower_operand(value)?;
                let value = self.to_imm(&value);
                self.emit_loop(LirValue::i64(*len), false, |b, index| {
                    let address = b.func.gep(&elem_ty, dst.clone(), index);
                    b.func.store(elem_ty.clone(), value.clone(), address.clone());
                    b.emit_fixup(&elem, address)
                })
            }
            ExprKind::Value(value) => {
                let len = self.array_len(value);
                let target = SliceValue::new(Ty::slice(elem.clone()), len, dst);
                self.copy_to_slice(&target, value)
            }
            _ => self.fail_lowering(format!(
                "expression of type `{}` is not an array literal",
                literal.ty
            )),
        }
    }

    /// Evaluate an array literal into a value of type `ty`. Static targets get a
    /// stack slot; dynamic targets receive fresh, writable storage from the
    /// runtime, filled with one bulk store when the literal is constant.
    pub fn lower_array_literal(&mut self, literal: &Expr, ty: &Ty) -> Result<DValue> {
        if !ty.is_array() {
            bug!("array literal lowered as `{}`", ty);
        }
        let len = match &literal.kind {
            ExprKind::Literal(Lit::Str(text)) => match ty.array_elem().and_then(Ty::char_width) {
                Some(width) => encode_str(text, width).len() as u64,
                None => {
                    return self.fail_lowering(format!("string literal cannot be used as `{}`", ty))
                }
            },
            _ => match literal.literal_len() {
                Some(len) => len,
                None => bug!("array literal without a length: {:?}", literal.kind),
            },
        };

        if let Some(static_len) = ty.static_len() {
            if static_len != len {
                let span = literal.span;
                return self.fail(Error::LengthMismatch {
                    span,
                    dst_len: static_len,
                    src_len: len,
                });
            }
            let lowered = self.lir(ty);
            let slot = self.func.alloca(&lowered);
            self.initialize_array_literal(literal, slot.clone())?;
            return Ok(DValue::lval(ty.clone(), slot));
        }

        if len == 0 && self.lowering.is_const_literal(literal) {
            let empty = self.types().default_value(ty);
            return Ok(DValue::imm(ty.clone(), LirValue::Constant(empty)));
        }
        let slice = self.new_dyn_array(ty, LirValue::i64(len), false)?;
        self.initialize_array_literal(literal, slice.ptr.clone())?;
        Ok(slice.into())
    }
}
