use fp_core::error::{Error, Result};
use fp_core::expr::Expr;
use fp_core::lir::{LirConstant, LirInstructionKind, LirTerminator, LirType, LirValue, RuntimeSymbol};
use fp_core::types::{CharTy, Ty};
use fp_core::value::{DValue, SliceValue};
use itertools::Itertools;

use super::ArrayBuilder;

impl<'a> ArrayBuilder<'a> {
    /// `e1 ~ e2` producing a fresh array of type `ty`.
    pub fn cat_arrays(&mut self, ty: &Ty, lhs: &Expr, rhs: &Expr) -> Result<SliceValue> {
        self.cat_array_list(ty, &[lhs.clone(), rhs.clone()])
    }

    /// `e1 ~ e2 ~ ... ~ en`. Operands are evaluated left to right and may be
    /// arrays or single elements; none of them is modified.
    pub fn cat_array_list(&mut self, ty: &Ty, exprs: &[Expr]) -> Result<SliceValue> {
        let Some(elem) = ty.array_elem().cloned() else {
            bug!("concatenation producing `{}`", ty);
        };
        debug!(
            "concatenating [{}] into `{}` at {}",
            exprs.iter().map(|expr| &expr.ty).join(", "),
            ty,
            self.span
        );

        let mut parts = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let value = self.lower_operand(expr)?;
            let part = if value.ty == elem {
                let slot = self.spill(&value);
                SliceValue::new(ty.clone(), LirValue::i64(1), slot)
            } else if value.ty.array_elem() == Some(&elem) {
                self.to_slice(&value)
            } else {
                return self.fail_lowering(format!(
                    "cannot concatenate `{}` onto `{}`",
                    value.ty, ty
                ));
            };
            parts.push(part);
        }

        let total = parts.iter().fold(LirValue::i64(0), |total, part| {
            self.func.add(total, part.len.clone(), LirType::I64)
        });
        let result = self.new_dyn_array(&Ty::slice(elem.clone()), total.clone(), false)?;

        let elem_ty = self.lir(&elem);
        let size = LirValue::i64(self.types().size_of(&elem));
        let mut offset = LirValue::i64(0);
        for part in &parts {
            let dst = self.func.gep(&elem_ty, result.ptr.clone(), offset.clone());
            let bytes = self.func.mul(part.len.clone(), size.clone(), LirType::I64);
            if bytes.as_const_u64() != Some(0) {
                self.func
                    .call_runtime(RuntimeSymbol::Memcpy, vec![dst, part.ptr.clone(), bytes]);
            }
            offset = self.func.add(offset, part.len.clone(), LirType::I64);
        }
        self.fixup_range(&elem, result.ptr.clone(), total.clone(), false)?;
        Ok(SliceValue::new(ty.clone(), total, result.ptr))
    }

    /// `arr ~= exp` for a single element. `exp` is evaluated before `arr` grows.
    pub fn cat_assign_element(&mut self, arr: &DValue, exp: &Expr) -> Result<SliceValue> {
        let Some(elem) = arr.ty.array_elem().cloned() else {
            bug!("append to `{}`", arr.ty);
        };
        let value = self.lower_operand(exp)?;
        let value = self.to_imm(&value);

        let current = self.to_slice(arr);
        let new_len = self
            .func
            .add(current.len.clone(), LirValue::i64(1), LirType::I64);
        let grown = self.resize(&arr.ty, &current, new_len, false)?;

        let elem_ty = self.lir(&elem);
        let slot = self.func.gep(&elem_ty, grown.ptr.clone(), current.len.clone());
        self.func.store(elem_ty, value, slot.clone());
        self.emit_fixup(&elem, slot)?;
        self.store_back(arr, grown)
    }

    /// `arr ~= exp` for an array operand. The operand is captured before `arr`
    /// grows, so appending an array to itself is well defined.
    pub fn cat_assign_array(&mut self, arr: &DValue, exp: &Expr) -> Result<SliceValue> {
        let Some(elem) = arr.ty.array_elem().cloned() else {
            bug!("append to `{}`", arr.ty);
        };
        let value = self.lower_operand(exp)?;
        if value.ty.array_elem() != Some(&elem) {
            return self.fail_lowering(format!("cannot append `{}` to `{}`", value.ty, arr.ty));
        }
        let source = self.to_slice(&value);

        let current = self.to_slice(arr);
        let new_len = self
            .func
            .add(current.len.clone(), source.len.clone(), LirType::I64);
        let grown = self.resize(&arr.ty, &current, new_len, false)?;

        let elem_ty = self.lir(&elem);
        let size = self.types().size_of(&elem);
        let tail = self.func.gep(&elem_ty, grown.ptr.clone(), current.len.clone());
        let bytes = self
            .func
            .mul(source.len.clone(), LirValue::i64(size), LirType::I64);
        self.func.call_runtime(
            RuntimeSymbol::Memmove,
            vec![tail.clone(), source.ptr.clone(), bytes],
        );
        self.fixup_range(&elem, tail, source.len, false)?;
        self.store_back(arr, grown)
    }

    /// Append one code point to a UTF-8 string, re-encoding it as 1 to 4 code units.
    pub fn append_dchar_to_string(&mut self, arr: &DValue, exp: &Expr) -> Result<SliceValue> {
        self.append_code_point(arr, exp, CharTy::Utf8)
    }

    /// Append one code point to a UTF-16 string, re-encoding it as 1 or 2 code units.
    pub fn append_dchar_to_unicode_string(&mut self, arr: &DValue, exp: &Expr) -> Result<SliceValue> {
        self.append_code_point(arr, exp, CharTy::Utf16)
    }

    fn append_code_point(&mut self, arr: &DValue, exp: &Expr, width: CharTy) -> Result<SliceValue> {
        let target = arr.ty.array_elem().and_then(Ty::char_width);
        if target != Some(width) {
            bug!("appending a code point as `{}` to `{}`", width, arr.ty);
        }
        let value = self.lower_operand(exp)?;
        let code_point = self.to_imm(&value);

        if let Some(code_point) = const_code_point(&code_point) {
            let Some(units) = width.encode(code_point) else {
                let span = exp.span;
                return self.fail(Error::InvalidCodePoint { span, code_point });
            };
            let unit_ty = self.lir(&Ty::char(width));
            let current = self.to_slice(arr);
            let new_len = self.func.add(
                current.len.clone(),
                LirValue::i64(units.len() as u64),
                LirType::I64,
            );
            let grown = self.resize(&arr.ty, &current, new_len, false)?;
            for (offset, unit) in units.into_iter().enumerate() {
                let index = self
                    .func
                    .add(current.len.clone(), LirValue::i64(offset as u64), LirType::I64);
                let slot = self.func.gep(&unit_ty, grown.ptr.clone(), index);
                let unit = LirValue::Constant(LirConstant::UInt(unit as u64, unit_ty.clone()));
                self.func.store(unit_ty.clone(), unit, slot);
            }
            return self.store_back(arr, grown);
        }

        self.check_code_point(code_point.clone());
        let unit_count = self.unit_count(code_point.clone(), width);
        let current = self.to_slice(arr);
        let new_len = self
            .func
            .add(current.len.clone(), unit_count.clone(), LirType::I64);
        let grown = self.resize(&arr.ty, &current, new_len, false)?;
        let unit_ty = self.lir(&Ty::char(width));
        let base = self
            .func
            .gep(&unit_ty, grown.ptr.clone(), current.len.clone());
        self.store_code_units(code_point, unit_count, base, width);
        self.store_back(arr, grown)
    }

    /// Trap through `fp_invalid_code_point` on surrogates and values past U+10FFFF.
    fn check_code_point(&mut self, code_point: LirValue) {
        let too_large = self.func.cmp(LirInstructionKind::UGt(
            code_point.clone(),
            LirValue::i32(0x10FFFF),
        ));
        let surrogate_lo = self.func.cmp(LirInstructionKind::UGe(
            code_point.clone(),
            LirValue::i32(0xD800),
        ));
        let surrogate_hi = self.func.cmp(LirInstructionKind::ULe(
            code_point.clone(),
            LirValue::i32(0xDFFF),
        ));
        let surrogate = self.func.and(surrogate_lo, surrogate_hi);
        let invalid = self.func.or(too_large, surrogate);
        self.emit_trap_if(invalid, RuntimeSymbol::InvalidCodePoint, vec![code_point]);
    }

    /// Number of code units `code_point` encodes to, as an i64.
    fn unit_count(&mut self, code_point: LirValue, width: CharTy) -> LirValue {
        let thresholds: &[(i32, u64)] = match width {
            CharTy::Utf8 => &[(0x80, 1), (0x800, 2), (0x10000, 3)],
            CharTy::Utf16 => &[(0x10000, 1)],
            CharTy::Utf32 => return LirValue::i64(1),
        };
        let widest = thresholds.len() as u64 + 1;
        thresholds
            .iter()
            .rev()
            .fold(LirValue::i64(widest), |wider, (limit, units)| {
                let below = self.func.cmp(LirInstructionKind::ULt(
                    code_point.clone(),
                    LirValue::i32(*limit),
                ));
                self.func
                    .select(below, LirValue::i64(*units), wider, LirType::I64)
            })
    }

    /// Store the encoding of `code_point` at `base`, switching on its unit count.
    fn store_code_units(
        &mut self,
        code_point: LirValue,
        unit_count: LirValue,
        base: LirValue,
        width: CharTy,
    ) {
        let unit_ty = self.lir(&Ty::char(width));
        let max_units: u64 = match width {
            CharTy::Utf8 => 4,
            _ => 2,
        };
        let join_bb = self.func.create_block("arr.utf.end");
        let invalid_bb = self.func.create_block("arr.utf.invalid");
        let cases: Vec<_> = (1..=max_units)
            .map(|units| (units, self.func.create_block("arr.utf.units")))
            .collect();
        self.func.terminate(LirTerminator::Switch {
            value: unit_count,
            default: invalid_bb,
            cases: cases.clone(),
        });

        self.func.switch_to_block(invalid_bb);
        self.func.unreachable();

        for (units, block) in cases {
            self.func.switch_to_block(block);
            let encoded = match width {
                CharTy::Utf8 => self.utf8_units(code_point.clone(), units),
                _ => self.utf16_units(code_point.clone(), units),
            };
            for (offset, unit) in encoded.into_iter().enumerate() {
                let unit = self.func.trunc(unit, unit_ty.clone());
                let slot = self
                    .func
                    .gep(&unit_ty, base.clone(), LirValue::i64(offset as u64));
                self.func.store(unit_ty.clone(), unit, slot);
            }
            self.func.br(join_bb);
        }
        self.func.switch_to_block(join_bb);
    }

    fn utf8_units(&mut self, cp: LirValue, units: u64) -> Vec<LirValue> {
        if units == 1 {
            return vec![cp];
        }
        let lead_mark: i32 = match units {
            2 => 0xC0,
            3 => 0xE0,
            _ => 0xF0,
        };
        let mut encoded = Vec::with_capacity(units as usize);
        let lead_shift = 6 * (units as i32 - 1);
        let lead = self.bin32(LirInstructionKind::LShr(cp.clone(), LirValue::i32(lead_shift)));
        encoded.push(self.bin32(LirInstructionKind::Or(lead, LirValue::i32(lead_mark))));
        for shift in (0..units as i32 - 1).rev().map(|step| step * 6) {
            let shifted = if shift == 0 {
                cp.clone()
            } else {
                self.bin32(LirInstructionKind::LShr(cp.clone(), LirValue::i32(shift)))
            };
            let low = self.bin32(LirInstructionKind::And(shifted, LirValue::i32(0x3F)));
            encoded.push(self.bin32(LirInstructionKind::Or(low, LirValue::i32(0x80))));
        }
        encoded
    }

    fn utf16_units(&mut self, cp: LirValue, units: u64) -> Vec<LirValue> {
        if units == 1 {
            return vec![cp];
        }
        let offset = self.bin32(LirInstructionKind::Sub(cp, LirValue::i32(0x10000)));
        let high = self.bin32(LirInstructionKind::LShr(offset.clone(), LirValue::i32(10)));
        let low = self.bin32(LirInstructionKind::And(offset, LirValue::i32(0x3FF)));
        vec![
            self.bin32(LirInstructionKind::Or(high, LirValue::i32(0xD800))),
            self.bin32(LirInstructionKind::Or(low, LirValue::i32(0xDC00))),
        ]
    }

    fn bin32(&mut self, kind: LirInstructionKind) -> LirValue {
        self.func.emit(kind, LirType::I32)
    }

    /// Write `grown` back into `arr` when it names storage, and return it.
    fn store_back(&mut self, arr: &DValue, grown: SliceValue) -> Result<SliceValue> {
        if arr.is_lval() {
            self.set_array(arr, &grown)?;
        }
        Ok(SliceValue::new(arr.ty.clone(), grown.len, grown.ptr))
    }
}

/// The code point held by `value` when it is a compile-time constant.
fn const_code_point(value: &LirValue) -> Option<u32> {
    let value = match value {
        LirValue::Constant(LirConstant::Int(value, _)) => *value as u64,
        LirValue::Constant(LirConstant::UInt(value, _)) => *value,
        _ => return None,
    };
    // out-of-range values are reported as invalid code points
    Some(u32::try_from(value).unwrap_or(u32::MAX))
}
