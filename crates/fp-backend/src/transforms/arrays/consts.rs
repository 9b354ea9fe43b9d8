//! Compile-time folding of array literals and initializers.

use fp_core::error::{Error, Result};
use fp_core::expr::{ArrayInitializer, Expr, ExprKind, Lit};
use fp_core::lir::{LirConstant, LirType};
use fp_core::span::Span;
use fp_core::types::{CharTy, Ty, TyKind};

use super::ArrayLowering;

/// Largest element count a sparse initializer may fold to.
const MAX_INITIALIZER_LEN: u64 = 1 << 20;

impl ArrayLowering {
    /// Whether `expr` can be folded: scalar literals and literals built from them.
    pub fn is_const_literal(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Array(elements) | ExprKind::Struct(elements) => {
                elements.iter().all(|element| self.is_const_literal(element))
            }
            ExprKind::ArrayRepeat { elem, .. } => self.is_const_literal(elem),
            ExprKind::Value(_) | ExprKind::Call { .. } => false,
        }
    }

    /// Whether `expr` of type `ty` folds to plain constant data. Literals holding
    /// dynamic arrays are excluded: their elements must live in writable storage.
    pub(super) fn is_const_data(&self, expr: &Expr, ty: &Ty) -> bool {
        !ty.contains_slice() && self.is_const_literal(expr)
    }

    /// Fold a constant array literal. Static arrays fold to their aggregate,
    /// dynamic arrays to a `{len, ptr}` constant whose data lives in a private global.
    pub fn array_literal_to_const(&mut self, literal: &Expr) -> Result<LirConstant> {
        if !self.is_const_literal(literal) {
            return Err(self.emit_error(Error::Lowering {
                span: literal.span,
                message: format!("array literal of type `{}` is not constant", literal.ty),
            }));
        }
        self.expr_to_const(literal, &literal.ty)
    }

    /// Constant slice over `elements`, which become a private constant global.
    /// No data is emitted for an empty slice.
    pub fn const_slice(&mut self, slice_ty: &Ty, elements: Vec<LirConstant>) -> LirConstant {
        let Some(elem) = slice_ty.array_elem() else {
            bug!("const_slice of non-array type `{}`", slice_ty);
        };
        let elem_ty = self.types.lower_ty(elem);
        let ptr_ty = LirType::ptr_to(elem_ty.clone());
        let lowered = LirType::slice_of(elem_ty.clone());
        let len = elements.len() as u64;
        if elements.is_empty() {
            return LirConstant::Struct(
                vec![LirConstant::UInt(0, LirType::I64), LirConstant::Null(ptr_ty)],
                lowered,
            );
        }
        let data = LirConstant::Array(elements, LirType::Array(Box::new(elem_ty), len));
        let name = self.define_constant_data(data);
        LirConstant::Struct(
            vec![
                LirConstant::UInt(len, LirType::I64),
                LirConstant::GlobalRef(name, ptr_ty, Vec::new()),
            ],
            lowered,
        )
    }

    /// Fold a sparse initializer; slots not mentioned hold the element default.
    pub fn const_array_initializer(&mut self, init: &ArrayInitializer) -> Result<LirConstant> {
        let Some(elem) = init.ty.array_elem().cloned() else {
            bug!("array initializer for non-array type `{}`", init.ty);
        };

        let limit = match init.ty.static_len() {
            Some(len) if len > MAX_INITIALIZER_LEN => {
                return Err(self.emit_error(Error::Lowering {
                    span: init.span,
                    message: format!("initializer for `{}` is too large to fold", init.ty),
                }));
            }
            Some(len) => len,
            None => MAX_INITIALIZER_LEN,
        };
        let mut slots = Vec::with_capacity(init.entries.len());
        let mut next = 0u64;
        for (index, expr) in &init.entries {
            let slot = index.unwrap_or(next);
            if slot >= limit {
                return Err(self.emit_error(Error::Lowering {
                    span: expr.span.to(init.span),
                    message: format!(
                        "initializer index {} is out of bounds for `{}`",
                        slot, init.ty
                    ),
                }));
            }
            slots.push(slot);
            next = slot + 1;
        }
        let len = match init.ty.static_len() {
            Some(len) => len,
            None => slots.iter().map(|slot| slot + 1).max().unwrap_or(0),
        };

        let default = self.types.default_value(&elem);
        let mut elements = vec![default; len as usize];
        for (slot, (_, expr)) in slots.into_iter().zip(&init.entries) {
            elements[slot as usize] = self.expr_to_const(expr, &elem)?;
        }

        if init.ty.is_slice() {
            return Ok(self.const_slice(&init.ty, elements));
        }
        let lowered = self.types.lower_ty(&init.ty);
        Ok(LirConstant::Array(elements, lowered))
    }

    /// Element constants of an array literal folded against element type `elem`.
    pub(super) fn literal_elements(&mut self, expr: &Expr, elem: &Ty) -> Result<Vec<LirConstant>> {
        match &expr.kind {
            ExprKind::Array(elements) => elements
                .iter()
                .map(|element| self.expr_to_const(element, elem))
                .collect(),
            ExprKind::ArrayRepeat { elem: value, len } => {
                let value = self.expr_to_const(value, elem)?;
                Ok(vec![value; *len as usize])
            }
            ExprKind::Literal(Lit::Str(text)) => match elem.char_width() {
                Some(width) => Ok(encode_str(text, width)
                    .into_iter()
                    .map(|unit| LirConstant::UInt(unit as u64, self.types.lower_ty(elem)))
                    .collect()),
                None => Err(self.not_constant(expr, elem)),
            },
            _ => Err(self.not_constant(expr, elem)),
        }
    }

    pub(super) fn expr_to_const(&mut self, expr: &Expr, ty: &Ty) -> Result<LirConstant> {
        match (&expr.kind, &ty.kind) {
            (
                ExprKind::Literal(Lit::Str(_)) | ExprKind::Array(_) | ExprKind::ArrayRepeat { .. },
                TyKind::Array(elem, _) | TyKind::Slice(elem),
            ) => {
                let elements = self.literal_elements(expr, elem)?;
                match ty.static_len() {
                    Some(len) if len != elements.len() as u64 => {
                        Err(self.emit_error(Error::LengthMismatch {
                            span: expr.span,
                            dst_len: len,
                            src_len: elements.len() as u64,
                        }))
                    }
                    Some(_) => Ok(LirConstant::Array(elements, self.types.lower_ty(ty))),
                    None => Ok(self.const_slice(ty, elements)),
                }
            }
            (ExprKind::Literal(lit), _) => self.lit_to_const(lit, ty, expr.span),
            (ExprKind::Struct(fields), TyKind::Adt(def)) if fields.len() == def.fields.len() => {
                let values = fields
                    .iter()
                    .zip(&def.fields)
                    .map(|(field, field_ty)| self.expr_to_const(field, field_ty))
                    .collect::<Result<Vec<_>>>()?;
                Ok(LirConstant::Struct(values, self.types.lower_ty(ty)))
            }
            _ => Err(self.not_constant(expr, ty)),
        }
    }

    fn lit_to_const(&mut self, lit: &Lit, ty: &Ty, span: Span) -> Result<LirConstant> {
        let lowered = self.types.lower_ty(ty);
        let constant = match (lit, &ty.kind) {
            (Lit::Bool(value), TyKind::Bool) => LirConstant::Bool(*value),
            (Lit::Int(value), TyKind::Bool) => LirConstant::Bool(*value != 0),
            (Lit::Int(value), TyKind::Int(_)) => LirConstant::Int(*value, lowered),
            (Lit::Int(value), TyKind::Uint(_)) => {
                LirConstant::UInt(truncate(*value as u64, &lowered), lowered)
            }
            (Lit::Int(value), TyKind::Float(_)) => LirConstant::Float(*value as f64, lowered),
            (Lit::Float(value), TyKind::Float(_)) => LirConstant::Float(*value, lowered),
            (Lit::Int(value), TyKind::Char(width)) => {
                return self.char_unit(*value as u32, *width, lowered, span)
            }
            (Lit::Char(code_point), TyKind::Char(width)) => {
                return self.char_unit(*code_point, *width, lowered, span)
            }
            (Lit::Char(code_point), TyKind::Int(_)) => {
                LirConstant::Int(*code_point as i64, lowered)
            }
            (Lit::Char(code_point), TyKind::Uint(_)) => {
                LirConstant::UInt(truncate(*code_point as u64, &lowered), lowered)
            }
            (Lit::Null, TyKind::RawPtr(_)) => LirConstant::Null(lowered),
            (Lit::Null, TyKind::Slice(_)) => self.types.default_value(ty),
            _ => {
                return Err(self.emit_error(Error::Lowering {
                    span,
                    message: format!("literal {:?} cannot be used as `{}`", lit, ty),
                }))
            }
        };
        Ok(constant)
    }

    /// A code point stored in a single code unit of `width`.
    fn char_unit(
        &mut self,
        code_point: u32,
        width: CharTy,
        lowered: LirType,
        span: Span,
    ) -> Result<LirConstant> {
        match width.encode(code_point).as_deref() {
            Some([unit]) => Ok(LirConstant::UInt(*unit as u64, lowered)),
            Some(_) => Err(self.emit_error(Error::Lowering {
                span,
                message: format!(
                    "code point {:#x} does not fit in a single `{}` code unit",
                    code_point, width
                ),
            })),
            None => Err(self.emit_error(Error::InvalidCodePoint { span, code_point })),
        }
    }

    fn not_constant(&mut self, expr: &Expr, ty: &Ty) -> Error {
        self.emit_error(Error::Lowering {
            span: expr.span,
            message: format!("expression cannot be folded to a constant `{}`", ty),
        })
    }
}

/// Code units of `text` in the encoding of `width`.
pub(super) fn encode_str(text: &str, width: CharTy) -> Vec<u32> {
    text.chars()
        .flat_map(|ch| width.encode(ch as u32).unwrap_or_default())
        .collect()
}

fn truncate(value: u64, ty: &LirType) -> u64 {
    match ty.int_bits() {
        Some(bits) if bits < 64 => value & ((1u64 << bits) - 1),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_core::config::ArrayConfig;
    use fp_core::types::IntTy;

    fn lowering() -> ArrayLowering {
        ArrayLowering::with_config(ArrayConfig::default())
    }

    #[test]
    fn strings_fold_to_code_units_of_the_target_width() {
        assert_eq!(encode_str("aé", CharTy::Utf8), vec![0x61, 0xC3, 0xA9]);
        assert_eq!(encode_str("aé", CharTy::Utf16), vec![0x61, 0xE9]);
        assert_eq!(encode_str("😀", CharTy::Utf16).len(), 2);
    }

    #[test]
    fn sparse_initializer_fills_gaps_with_defaults() {
        let mut lowering = lowering();
        let int = Ty::int(IntTy::I32);
        let init = ArrayInitializer {
            ty: Ty::array(int.clone(), 4),
            entries: vec![
                (Some(1), Expr::int(7, int.clone())),
                (None, Expr::int(8, int.clone())),
            ],
            span: Span::DUMMY,
        };
        let folded = lowering.const_array_initializer(&init).unwrap();
        let LirConstant::Array(elements, _) = folded else {
            panic!("expected an array constant, got {:?}", folded);
        };
        let values: Vec<_> = elements.iter().map(|e| e.as_u64().unwrap()).collect();
        assert_eq!(values, vec![0, 7, 8, 0]);
    }

    #[test]
    fn initializer_index_past_the_end_is_an_error() {
        let mut lowering = lowering();
        let int = Ty::int(IntTy::I32);
        let init = ArrayInitializer {
            ty: Ty::array(int.clone(), 2),
            entries: vec![(Some(2), Expr::int(1, int))],
            span: Span::new(1, 4, 9),
        };
        assert!(lowering.const_array_initializer(&init).is_err());
        let (diagnostics, has_errors) = lowering.take_diagnostics();
        assert!(has_errors);
        assert_eq!(diagnostics[0].source_context.as_deref(), Some("arrays"));
    }

    #[test]
    fn initializer_indices_are_checked_before_use() {
        let mut lowering = lowering();
        let int = Ty::int(IntTy::I32);
        for ty in [Ty::array(int.clone(), 2), Ty::slice(int.clone())] {
            let init = ArrayInitializer {
                ty,
                entries: vec![
                    (Some(u64::MAX), Expr::int(1, int.clone())),
                    (None, Expr::int(2, int.clone())),
                ],
                span: Span::new(1, 0, 12),
            };
            let err = lowering.const_array_initializer(&init).unwrap_err();
            assert!(matches!(err, Error::Lowering { .. }), "{:?}", err);
        }
        assert!(lowering.globals().is_empty());
    }

    #[test]
    fn dynamic_initializer_spans_up_to_its_highest_index() {
        let mut lowering = lowering();
        let int = Ty::int(IntTy::I32);
        let init = ArrayInitializer {
            ty: Ty::slice(int.clone()),
            entries: vec![(Some(2), Expr::int(5, int))],
            span: Span::DUMMY,
        };
        let folded = lowering.const_array_initializer(&init).unwrap();
        let LirConstant::Struct(fields, _) = folded else {
            panic!("expected a slice constant, got {:?}", folded);
        };
        assert_eq!(fields[0], LirConstant::UInt(3, LirType::I64));
        assert_eq!(lowering.globals().len(), 1);
    }

    #[test]
    fn errors_reach_a_shared_manager() {
        let manager = std::sync::Arc::new(fp_core::diagnostics::DiagnosticManager::new());
        let mut lowering = lowering().with_diagnostics(manager.clone());
        let int = Ty::int(IntTy::I32);
        let literal = Expr::array(vec![Expr::int(1, int.clone())], Ty::array(int, 2));
        assert!(lowering.array_literal_to_const(&literal).is_err());
        assert!(manager.has_errors());
        assert_eq!(
            manager.get_diagnostics()[0].code.as_deref(),
            Some("E-ARRAY-LEN")
        );
    }
}
