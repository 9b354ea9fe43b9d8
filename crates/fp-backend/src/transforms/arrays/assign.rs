use derive_more::Display;
use fp_core::error::{Error, Result};
use fp_core::lir::{LirInstructionKind, LirType, LirValue, RuntimeSymbol};
use fp_core::types::Ty;
use fp_core::value::{DValue, SliceValue};

use super::ArrayBuilder;

/// Operator of a compound assignment `a[] op= b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AssignOp {
    #[display("+=")]
    Add,
    #[display("-=")]
    Sub,
    #[display("*=")]
    Mul,
    #[display("/=")]
    Div,
    #[display("%=")]
    Rem,
    #[display("&=")]
    And,
    #[display("|=")]
    Or,
    #[display("^=")]
    Xor,
    #[display("<<=")]
    Shl,
    #[display(">>=")]
    Shr,
}

impl AssignOp {
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            AssignOp::And | AssignOp::Or | AssignOp::Xor | AssignOp::Shl | AssignOp::Shr
        )
    }
}

impl<'a> ArrayBuilder<'a> {
    /// Require `dst_len == src_len`: a compile-time error when both are known,
    /// otherwise a call to `fp_array_length_mismatch` on the failing path.
    pub(super) fn check_lengths(&mut self, dst_len: LirValue, src_len: LirValue) -> Result<()> {
        if let (Some(dst), Some(src)) = (dst_len.as_const_u64(), src_len.as_const_u64()) {
            if dst != src {
                let span = self.span;
                return self.fail(Error::LengthMismatch {
                    span,
                    dst_len: dst,
                    src_len: src,
                });
            }
            return Ok(());
        }
        if !self.config().bounds_checks.enabled() {
            return Ok(());
        }
        let mismatch = self.ine(dst_len.clone(), src_len.clone());
        self.emit_trap_if(
            mismatch,
            RuntimeSymbol::ArrayLengthMismatch,
            vec![dst_len, src_len],
        );
        Ok(())
    }

    /// Copy the elements of `src` into `dst`. The lengths must match; the ranges
    /// may overlap.
    pub fn copy_slices(&mut self, dst: &SliceValue, src: &SliceValue) -> Result<()> {
        debug!("copying slices at {}", self.span);
        self.check_lengths(dst.len.clone(), src.len.clone())?;
        let len = dst.len.clone();
        if len.as_const_u64() == Some(0) {
            return Ok(());
        }
        let elem = dst.elem_ty().clone();
        let elem_ty = self.lir(&elem);
        let size = self.types().size_of(&elem);
        let bytes = self.func.mul(len.clone(), LirValue::i64(size), LirType::I64);

        let dst_addr = self.func.ptr_to_int(dst.ptr.clone());
        let src_addr = self.func.ptr_to_int(src.ptr.clone());
        let dst_end = self.func.add(dst_addr.clone(), bytes.clone(), LirType::I64);
        let src_end = self.func.add(src_addr.clone(), bytes.clone(), LirType::I64);
        let starts_before = self.ult(dst_addr.clone(), src_end);
        let ends_after = self.ult(src_addr.clone(), dst_end);
        let overlaps = self.and(starts_before, ends_after);

        let disjoint_bb = self.func.create_block("arr.copy.disjoint");
        let overlap_bb = self.func.create_block("arr.copy.overlap");
        let backward_bb = self.func.create_block("arr.copy.backward");
        let forward_bb = self.func.create_block("arr.copy.forward");
        let join_bb = self.func.create_block("arr.copy.end");
        self.func.cond_br(overlaps, overlap_bb, disjoint_bb);

        self.func.switch_to_block(disjoint_bb);
        self.func.call_runtime(
            RuntimeSymbol::Memcpy,
            vec![dst.ptr.clone(), src.ptr.clone(), bytes],
        );
        self.fixup_range(&elem, dst.ptr.clone(), len.clone(), false)?;
        self.func.br(join_bb);

        // overlapping ranges: copy away from the side being overwritten
        self.func.switch_to_block(overlap_bb);
        let backward = self
            .func
            .cmp(LirInstructionKind::UGt(dst_addr, src_addr));
        self.func.cond_br(backward, backward_bb, forward_bb);

        for (block, reverse) in [(backward_bb, true), (forward_bb, false)] {
            self.func.switch_to_block(block);
            self.emit_loop(len.clone(), reverse, |b, index| {
                let from = b.func.gep(&elem_ty, src.ptr.clone(), index.clone());
                let to = b.func.gep(&elem_ty, dst.ptr.clone(), index);
                let value = b.func.load(elem_ty.clone(), from);
                b.func.store(elem_ty.clone(), value, to.clone());
                b.emit_fixup(&elem, to)
            })?;
            self.func.br(join_bb);
        }

        self.func.switch_to_block(join_bb);
        Ok(())
    }

    /// Copy the array value `src` into `dst`.
    pub fn copy_to_slice(&mut self, dst: &SliceValue, src: &DValue) -> Result<()> {
        let src = self.to_slice(src);
        self.copy_slices(dst, &src)
    }

    /// Copy one static array over another of the same type.
    pub fn static_array_copy(&mut self, dst: &DValue, src: &DValue) -> Result<()> {
        let (Some(dst_len), Some(src_len)) = (dst.ty.static_len(), src.ty.static_len()) else {
            bug!("static_array_copy of `{}` and `{}`", dst.ty, src.ty);
        };
        self.check_lengths(LirValue::i64(dst_len), LirValue::i64(src_len))?;
        let Some(dst_ptr) = dst.address().cloned() else {
            return self.fail_lowering(format!("cannot assign to an rvalue `{}`", dst.ty));
        };
        let src_ptr = self.array_ptr(src);
        let bytes = self.types().size_of(&dst.ty);
        if bytes == 0 {
            return Ok(());
        }
        self.func.call_runtime(
            RuntimeSymbol::Memmove,
            vec![dst_ptr.clone(), src_ptr, LirValue::i64(bytes)],
        );
        match dst.ty.array_elem() {
            Some(elem) => self.fixup_range(elem, dst_ptr, LirValue::i64(dst_len), false),
            None => Ok(()),
        }
    }

    /// `array[] = value` or `array[] op= value`: evaluate `value` once and apply
    /// it to every element.
    pub fn set_assign(&mut self, array: &DValue, value: &DValue, op: Option<AssignOp>) -> Result<()> {
        let target = self.writable_slice(array)?;
        let elem = target.elem_ty().clone();
        debug!("broadcasting `{}` into `{}` at {}", value.ty, array.ty, self.span);

        // broadcast into the innermost static arrays: `int[2][] a; a[] = 0;`
        if value.ty != elem && elem.is_static_array() {
            let inner_len = elem.static_len().unwrap_or_default();
            let elem_ty = self.lir(&elem);
            let value = DValue::imm(value.ty.clone(), self.to_imm(value));
            let Some(inner_elem) = elem.array_elem().cloned() else {
                bug!("static array without element type");
            };
            return self.emit_loop(target.len.clone(), false, |b, index| {
                let address = b.func.gep(&elem_ty, target.ptr.clone(), index);
                let inner = DValue::lval(Ty::array(inner_elem.clone(), inner_len), address);
                b.set_assign(&inner, &value, op)
            });
        }

        if let Some(op) = op {
            self.check_arith(op, &elem)?;
        }
        let value = self.to_imm(value);
        let elem_ty = self.lir(&elem);
        self.emit_loop(target.len.clone(), false, |b, index| {
            let address = b.func.gep(&elem_ty, target.ptr.clone(), index);
            let stored = match op {
                Some(op) => {
                    let current = b.func.load(elem_ty.clone(), address.clone());
                    b.arith(op, &elem, current, value.clone())
                }
                None => value.clone(),
            };
            b.func.store(elem_ty.clone(), stored, address.clone());
            if op.is_none() {
                b.emit_fixup(&elem, address)?;
            }
            Ok(())
        })
    }

    /// Assign `src` to the array `dst`, optionally combining through `op`.
    /// Array sources are copied (or combined element-wise), anything else is
    /// broadcast.
    pub fn assign(&mut self, src: &DValue, dst: &DValue, op: Option<AssignOp>) -> Result<()> {
        let Some(elem) = dst.ty.array_elem().cloned() else {
            bug!("array assignment to `{}`", dst.ty);
        };
        let src_is_array = src.ty.array_elem() == Some(&elem);
        if !src_is_array {
            return self.set_assign(dst, src, op);
        }

        match op {
            None if dst.ty.is_static_array() && src.ty.is_static_array() => {
                self.static_array_copy(dst, src)
            }
            None => {
                let target = self.writable_slice(dst)?;
                self.copy_to_slice(&target, src)
            }
            Some(op) => {
                self.check_arith(op, &elem)?;
                let target = self.writable_slice(dst)?;
                let source = self.to_slice(src);
                self.check_lengths(target.len.clone(), source.len.clone())?;
                let elem_ty = self.lir(&elem);
                self.emit_loop(target.len.clone(), false, |b, index| {
                    let to = b.func.gep(&elem_ty, target.ptr.clone(), index.clone());
                    let from = b.func.gep(&elem_ty, source.ptr.clone(), index);
                    let lhs = b.func.load(elem_ty.clone(), to.clone());
                    let rhs = b.func.load(elem_ty.clone(), from);
                    let result = b.arith(op, &elem, lhs, rhs);
                    b.func.store(elem_ty.clone(), result, to);
                    Ok(())
                })
            }
        }
    }

    /// The slice an assignment writes through. Static arrays must be lvalues so
    /// that the writes land in their storage.
    fn writable_slice(&mut self, array: &DValue) -> Result<SliceValue> {
        if array.ty.is_static_array() && !array.is_lval() {
            return self.fail_lowering(format!("cannot assign to an rvalue `{}`", array.ty));
        }
        Ok(self.to_slice(array))
    }

    fn check_arith(&mut self, op: AssignOp, elem: &Ty) -> Result<()> {
        let supported = if op.is_bitwise() {
            elem.is_numeric() && !elem.is_float()
        } else {
            elem.is_numeric()
        };
        if supported {
            return Ok(());
        }
        self.fail_lowering(format!("`{}` is not supported on elements of `{}`", op, elem))
    }

    fn arith(&mut self, op: AssignOp, elem: &Ty, lhs: LirValue, rhs: LirValue) -> LirValue {
        let signed = elem.is_signed() || elem.is_float();
        let kind = match op {
            AssignOp::Add => LirInstructionKind::Add(lhs, rhs),
            AssignOp::Sub => LirInstructionKind::Sub(lhs, rhs),
            AssignOp::Mul => LirInstructionKind::Mul(lhs, rhs),
            AssignOp::Div if signed => LirInstructionKind::Div(lhs, rhs),
            AssignOp::Div => LirInstructionKind::UDiv(lhs, rhs),
            AssignOp::Rem if signed => LirInstructionKind::Rem(lhs, rhs),
            AssignOp::Rem => LirInstructionKind::URem(lhs, rhs),
            AssignOp::And => LirInstructionKind::And(lhs, rhs),
            AssignOp::Or => LirInstructionKind::Or(lhs, rhs),
            AssignOp::Xor => LirInstructionKind::Xor(lhs, rhs),
            AssignOp::Shl => LirInstructionKind::Shl(lhs, rhs),
            AssignOp::Shr if signed => LirInstructionKind::Shr(lhs, rhs),
            AssignOp::Shr => LirInstructionKind::LShr(lhs, rhs),
        };
        let ty = self.lir(elem);
        self.func.emit(kind, ty)
    }
}
