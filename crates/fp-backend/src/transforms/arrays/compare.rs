use derive_more::Display;
use fp_core::error::Result;
use fp_core::lir::{LirInstructionKind, LirType, LirValue, RuntimeSymbol};
use fp_core::types::{Ty, TyKind};
use fp_core::value::{DValue, SliceValue};

use super::ArrayBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EqOp {
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OrdOp {
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IdentityOp {
    #[display("is")]
    Is,
    #[display("!is")]
    NotIs,
}

impl<'a> ArrayBuilder<'a> {
    /// Element-wise equality of two arrays with the same element type.
    pub fn array_equals(&mut self, op: EqOp, lhs: &DValue, rhs: &DValue) -> Result<LirValue> {
        let elem = self.common_elem(lhs, rhs)?;
        debug!("comparing `{}` {} `{}` at {}", lhs.ty, op, rhs.ty, self.span);
        let lhs = self.to_slice(lhs);
        let rhs = self.to_slice(rhs);
        let equal = self.slices_equal(&elem, &lhs, &rhs)?;
        Ok(match op {
            EqOp::Eq => equal,
            EqOp::Ne => self.not(equal),
        })
    }

    /// Lexicographic ordering of two arrays with the same element type.
    pub fn array_compare(&mut self, op: OrdOp, lhs: &DValue, rhs: &DValue) -> Result<LirValue> {
        let elem = self.common_elem(lhs, rhs)?;
        debug!("ordering `{}` {} `{}` at {}", lhs.ty, op, rhs.ty, self.span);
        self.check_orderable(&elem)?;
        let lhs = self.to_slice(lhs);
        let rhs = self.to_slice(rhs);
        let order = self.slices_three_way(&elem, &lhs, &rhs)?;
        let zero = LirValue::i32(0);
        let kind = match op {
            OrdOp::Lt => LirInstructionKind::Lt(order, zero),
            OrdOp::Le => LirInstructionKind::Le(order, zero),
            OrdOp::Gt => LirInstructionKind::Gt(order, zero),
            OrdOp::Ge => LirInstructionKind::Ge(order, zero),
        };
        Ok(self.func.cmp(kind))
    }

    /// Identity: both arrays have the same length and point at the same storage.
    pub fn dyn_array_is(&mut self, op: IdentityOp, lhs: &DValue, rhs: &DValue) -> Result<LirValue> {
        let lhs = self.to_slice(lhs);
        let rhs = self.to_slice(rhs);
        let same_len = self.ieq(lhs.len, rhs.len);
        let lhs_addr = self.func.ptr_to_int(lhs.ptr);
        let rhs_addr = self.func.ptr_to_int(rhs.ptr);
        let same_ptr = self.func.cmp(LirInstructionKind::Eq(lhs_addr, rhs_addr));
        let same = self.and(same_len, same_ptr);
        Ok(match op {
            IdentityOp::Is => same,
            IdentityOp::NotIs => self.not(same),
        })
    }

    fn common_elem(&mut self, lhs: &DValue, rhs: &DValue) -> Result<Ty> {
        match (lhs.ty.array_elem(), rhs.ty.array_elem()) {
            (Some(l), Some(r)) if l == r => Ok(l.clone()),
            _ => self.fail_lowering(format!("cannot compare `{}` with `{}`", lhs.ty, rhs.ty)),
        }
    }

    fn check_orderable(&mut self, elem: &Ty) -> Result<()> {
        match &elem.kind {
            TyKind::Adt(def) if def.hooks.cmp.is_none() => self.fail_lowering(format!(
                "`{}` has no ordering; arrays of it cannot be compared with `<`",
                def.name
            )),
            TyKind::Array(inner, _) | TyKind::Slice(inner) => self.check_orderable(inner),
            _ => Ok(()),
        }
    }

    fn slices_equal(&mut self, elem: &Ty, lhs: &SliceValue, rhs: &SliceValue) -> Result<LirValue> {
        if let (Some(l), Some(r)) = (lhs.len.as_const_u64(), rhs.len.as_const_u64()) {
            if l != r {
                return Ok(LirValue::bool(false));
            }
        }
        let result = self.func.alloca(&LirType::I1);
        self.func
            .store(LirType::I1, LirValue::bool(false), result.clone());
        let same_len = self.ieq(lhs.len.clone(), rhs.len.clone());
        self.emit_if(same_len, "arr.eq.body", |b| {
            if b.types().is_bitwise_comparable(elem) {
                let size = b.types().size_of(elem);
                let bytes = b
                    .func
                    .mul(lhs.len.clone(), LirValue::i64(size), LirType::I64);
                let diff = b.func.call_runtime(
                    RuntimeSymbol::Memcmp,
                    vec![lhs.ptr.clone(), rhs.ptr.clone(), bytes],
                );
                let equal = b.func.cmp(LirInstructionKind::Eq(diff, LirValue::i32(0)));
                b.func.store(LirType::I1, equal, result.clone());
                return Ok(());
            }
            b.func
                .store(LirType::I1, LirValue::bool(true), result.clone());
            let elem_ty = b.lir(elem);
            // elements after the first mismatch are not compared
            b.emit_loop(lhs.len.clone(), false, |b, index| {
                let so_far = b.func.load(LirType::I1, result.clone());
                b.emit_if(so_far, "arr.eq.elem", |b| {
                    let l = b.func.gep(&elem_ty, lhs.ptr.clone(), index.clone());
                    let r = b.func.gep(&elem_ty, rhs.ptr.clone(), index.clone());
                    let equal = b.elem_equal(elem, l, r)?;
                    b.func.store(LirType::I1, equal, result.clone());
                    Ok(())
                })
            })
        })?;
        Ok(self.func.load(LirType::I1, result))
    }

    /// Equality of the two elements of type `elem` stored at `lhs` and `rhs`.
    fn elem_equal(&mut self, elem: &Ty, lhs: LirValue, rhs: LirValue) -> Result<LirValue> {
        match &elem.kind {
            TyKind::Adt(def) => {
                if let Some(hook) = &def.hooks.eq {
                    return Ok(self.func.call(hook, vec![lhs, rhs], LirType::I1));
                }
                let struct_ty = self.lir(elem);
                let mut equal = LirValue::bool(true);
                for (index, field) in def.fields.iter().enumerate() {
                    let l = self.func.gep_field(&struct_ty, lhs.clone(), index as u32);
                    let r = self.func.gep_field(&struct_ty, rhs.clone(), index as u32);
                    let field_equal = self.elem_equal(field, l, r)?;
                    equal = self.and(equal, field_equal);
                }
                Ok(equal)
            }
            TyKind::Array(..) | TyKind::Slice(_) => {
                let (l, r) = self.nested_slices(elem, lhs, rhs);
                let Some(inner) = elem.array_elem() else {
                    bug!("array type without element type");
                };
                self.slices_equal(inner, &l, &r)
            }
            _ => {
                let elem_ty = self.lir(elem);
                let l = self.func.load(elem_ty.clone(), lhs);
                let r = self.func.load(elem_ty, rhs);
                Ok(self.func.cmp(LirInstructionKind::Eq(l, r)))
            }
        }
    }

    /// Three-way comparison of two slices: negative, zero or positive i32.
    fn slices_three_way(&mut self, elem: &Ty, lhs: &SliceValue, rhs: &SliceValue) -> Result<LirValue> {
        let result = self.func.alloca(&LirType::I32);
        self.func.store(LirType::I32, LirValue::i32(0), result.clone());
        let common = self.umin(lhs.len.clone(), rhs.len.clone());
        let elem_ty = self.lir(elem);

        self.emit_loop(common, false, |b, index| {
            let so_far = b.func.load(LirType::I32, result.clone());
            let undecided = b.func.cmp(LirInstructionKind::Eq(so_far, LirValue::i32(0)));
            b.emit_if(undecided, "arr.cmp.elem", |b| {
                let l = b.func.gep(&elem_ty, lhs.ptr.clone(), index.clone());
                let r = b.func.gep(&elem_ty, rhs.ptr.clone(), index.clone());
                let order = b.elem_three_way(elem, l, r)?;
                b.func.store(LirType::I32, order, result.clone());
                Ok(())
            })
        })?;

        // equal prefixes: the shorter array orders first
        let so_far = self.func.load(LirType::I32, result.clone());
        let undecided = self.func.cmp(LirInstructionKind::Eq(so_far, LirValue::i32(0)));
        self.emit_if(undecided, "arr.cmp.len", |b| {
            let order = b.three_way_unsigned(lhs.len.clone(), rhs.len.clone());
            b.func.store(LirType::I32, order, result.clone());
            Ok(())
        })?;
        Ok(self.func.load(LirType::I32, result))
    }

    fn elem_three_way(&mut self, elem: &Ty, lhs: LirValue, rhs: LirValue) -> Result<LirValue> {
        match &elem.kind {
            TyKind::Adt(def) => match &def.hooks.cmp {
                Some(hook) => Ok(self.func.call(hook, vec![lhs, rhs], LirType::I32)),
                None => self.fail_lowering(format!("`{}` has no ordering", def.name)),
            },
            TyKind::Array(..) | TyKind::Slice(_) => {
                let (l, r) = self.nested_slices(elem, lhs, rhs);
                let Some(inner) = elem.array_elem() else {
                    bug!("array type without element type");
                };
                self.slices_three_way(inner, &l, &r)
            }
            _ => {
                let elem_ty = self.lir(elem);
                let l = self.func.load(elem_ty.clone(), lhs);
                let r = self.func.load(elem_ty, rhs);
                let (less, greater) = if elem.is_signed() || elem.is_float() {
                    (
                        LirInstructionKind::Lt(l.clone(), r.clone()),
                        LirInstructionKind::Gt(l, r),
                    )
                } else {
                    (
                        LirInstructionKind::ULt(l.clone(), r.clone()),
                        LirInstructionKind::UGt(l, r),
                    )
                };
                let less = self.func.cmp(less);
                let greater = self.func.cmp(greater);
                Ok(self.three_way(less, greater))
            }
        }
    }

    fn three_way_unsigned(&mut self, lhs: LirValue, rhs: LirValue) -> LirValue {
        let less = self.ult(lhs.clone(), rhs.clone());
        let greater = self.ugt(lhs, rhs);
        self.three_way(less, greater)
    }

    fn three_way(&mut self, less: LirValue, greater: LirValue) -> LirValue {
        let above =
            self.func
                .select(greater, LirValue::i32(1), LirValue::i32(0), LirType::I32);
        self.func
            .select(less, LirValue::i32(-1), above, LirType::I32)
    }

    /// Slices over the nested arrays of type `ty` stored at `lhs` and `rhs`.
    fn nested_slices(&mut self, ty: &Ty, lhs: LirValue, rhs: LirValue) -> (SliceValue, SliceValue) {
        let l = self.to_slice(&DValue::lval(ty.clone(), lhs));
        let r = self.to_slice(&DValue::lval(ty.clone(), rhs));
        (l, r)
    }
}
