use fp_core::error::Result;
use fp_core::lir::{LirType, LirValue, RuntimeSymbol};
use fp_core::types::{Ty, TyKind};
use fp_core::value::{DValue, SliceValue};

use super::ArrayBuilder;

impl<'a> ArrayBuilder<'a> {
    /// Allocate storage for `len` elements of the dynamic array type `ty`.
    pub fn new_dyn_array(&mut self, ty: &Ty, len: LirValue, default_init: bool) -> Result<SliceValue> {
        let Some(elem) = slice_elem(ty) else {
            bug!("new_dyn_array of `{}`", ty);
        };
        debug!("allocating `{}` at {}", ty, self.span);
        let info = self.types().elem_info(elem);
        let zeroed = default_init && info.zero_default;
        let ptr = self.func.call_runtime(
            RuntimeSymbol::ArrayAlloc,
            vec![LirValue::i64(info.size), len.clone(), LirValue::bool(zeroed)],
        );
        if default_init && !info.zero_default {
            self.default_fill(elem, ptr.clone(), LirValue::i64(0), len.clone())?;
        }
        Ok(SliceValue::new(ty.clone(), len, ptr))
    }

    /// Allocate a nested dynamic array with one length per dimension, outermost
    /// first. Every inner array gets storage of its own.
    pub fn new_mul_dim_dyn_array(
        &mut self,
        ty: &Ty,
        dims: &[LirValue],
        default_init: bool,
    ) -> Result<SliceValue> {
        let depth = slice_depth(ty);
        if dims.is_empty() || dims.len() > depth {
            return self.fail_lowering(format!(
                "cannot allocate `{}` with {} dimensions",
                ty,
                dims.len()
            ));
        }
        if dims.len() == 1 {
            return self.new_dyn_array(ty, dims[0].clone(), default_init);
        }

        let outer = self.new_dyn_array(ty, dims[0].clone(), false)?;
        let Some(inner_ty) = slice_elem(ty).cloned() else {
            bug!("`{}` lost its element type", ty);
        };
        let inner_lir = self.lir(&inner_ty);
        let inner_dims = &dims[1..];
        self.emit_loop(outer.len.clone(), false, |b, index| {
            let inner = b.new_mul_dim_dyn_array(&inner_ty, inner_dims, default_init)?;
            let value = b.slice_imm(&inner);
            let slot = b.func.gep(&inner_lir, outer.ptr.clone(), index);
            b.func.store(inner_lir.clone(), value, slot);
            Ok(())
        })?;
        Ok(outer)
    }

    /// Resize `current` to `new_len` elements. Elements past the old length are
    /// default-initialized; elements moved to fresh storage get their copy fixup.
    pub fn resize_dyn_array(&mut self, ty: &Ty, current: &SliceValue, new_len: LirValue) -> Result<SliceValue> {
        self.resize(ty, current, new_len, true)
    }

    /// Resize the dynamic array stored in `array` and store the result back.
    pub fn set_array_length(&mut self, array: &DValue, new_len: LirValue) -> Result<SliceValue> {
        let current = self.to_slice(array);
        let resized = self.resize_dyn_array(&array.ty, &current, new_len)?;
        self.set_array(array, &resized)?;
        Ok(resized)
    }

    /// `init_tail` is false for callers that overwrite the new elements themselves.
    pub(super) fn resize(
        &mut self,
        ty: &Ty,
        current: &SliceValue,
        new_len: LirValue,
        init_tail: bool,
    ) -> Result<SliceValue> {
        let Some(elem) = slice_elem(ty) else {
            bug!("resize of `{}`", ty);
        };
        debug!("resizing `{}` at {}", ty, self.span);
        let info = self.types().elem_info(elem);
        let old_ptr = current.ptr.clone();
        let old_len = current.len.clone();
        let new_ptr = self.func.call_runtime(
            RuntimeSymbol::ArrayRealloc,
            vec![
                old_ptr.clone(),
                old_len.clone(),
                new_len.clone(),
                LirValue::i64(info.size),
            ],
        );

        if info.needs_fixup {
            let old_addr = self.func.ptr_to_int(old_ptr);
            let new_addr = self.func.ptr_to_int(new_ptr.clone());
            let moved = self.ine(old_addr, new_addr);
            let kept = self.umin(old_len.clone(), new_len.clone());
            self.emit_if(moved, "arr.resize.moved", |b| {
                b.fixup_range(elem, new_ptr.clone(), kept, false)
            })?;
        }

        if init_tail {
            let grows = self.ult(old_len.clone(), new_len.clone());
            let target = new_len.clone();
            self.emit_if(grows, "arr.resize.grow", |b| {
                let count = b.func.sub(target, old_len.clone(), LirType::I64);
                b.default_fill(elem, new_ptr.clone(), old_len.clone(), count)
            })?;
        }
        Ok(SliceValue::new(ty.clone(), new_len, new_ptr))
    }

    /// Store the default value of `elem` into `count` elements starting at `ptr[start]`.
    fn default_fill(
        &mut self,
        elem: &Ty,
        ptr: LirValue,
        start: LirValue,
        count: LirValue,
    ) -> Result<()> {
        let info = self.types().elem_info(elem);
        let elem_ty = self.lir(elem);
        let default = LirValue::Constant(info.default);
        self.emit_loop(count, false, |b, index| {
            let slot_index = b.func.add(start.clone(), index, LirType::I64);
            let slot = b.func.gep(&elem_ty, ptr.clone(), slot_index);
            b.func.store(elem_ty.clone(), default.clone(), slot);
            Ok(())
        })
    }
}

fn slice_elem(ty: &Ty) -> Option<&Ty> {
    match &ty.kind {
        TyKind::Slice(elem) => Some(elem),
        _ => None,
    }
}

/// Number of directly nested dynamic array levels in `ty`.
fn slice_depth(ty: &Ty) -> usize {
    match slice_elem(ty) {
        Some(elem) => 1 + slice_depth(elem),
        None => 0,
    }
}
