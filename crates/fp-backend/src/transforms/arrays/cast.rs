use fp_core::error::{Error, Result};
use fp_core::lir::{LirType, LirValue, RuntimeSymbol};
use fp_core::types::{Ty, TyKind};
use fp_core::value::{DValue, DValueKind, SliceValue};

use super::ArrayBuilder;

impl<'a> ArrayBuilder<'a> {
    /// Number of elements in a static or dynamic array value.
    pub fn array_len(&mut self, value: &DValue) -> LirValue {
        if let Some(len) = value.ty.static_len() {
            return LirValue::i64(len);
        }
        match &value.kind {
            DValueKind::Slice { len, .. } => len.clone(),
            DValueKind::Imm(imm) => self.func.extract_value(imm.clone(), 0, LirType::I64),
            DValueKind::Lval(address) => {
                let slice_ty = self.lir(&value.ty);
                let len_addr = self.func.gep_field(&slice_ty, address.clone(), 0);
                self.func.load(LirType::I64, len_addr)
            }
        }
    }

    /// Pointer to the first element of a static or dynamic array value.
    pub fn array_ptr(&mut self, value: &DValue) -> LirValue {
        let Some(elem) = value.ty.array_elem() else {
            bug!("array_ptr of non-array type `{}`", value.ty);
        };
        let ptr_ty = LirType::ptr_to(self.lir(elem));
        if value.ty.is_static_array() {
            return self.spill(value);
        }
        match &value.kind {
            DValueKind::Slice { ptr, .. } => ptr.clone(),
            DValueKind::Imm(imm) => self.func.extract_value(imm.clone(), 1, ptr_ty),
            DValueKind::Lval(address) => {
                let slice_ty = self.lir(&value.ty);
                let ptr_addr = self.func.gep_field(&slice_ty, address.clone(), 1);
                self.func.load(ptr_ty, ptr_addr)
            }
        }
    }

    /// View any array value as a `(len, ptr)` pair. Static rvalues are spilled
    /// to a stack slot first.
    pub fn to_slice(&mut self, value: &DValue) -> SliceValue {
        let Some(elem) = value.ty.array_elem().cloned() else {
            bug!("`{}` is not an array type", value.ty);
        };
        let len = self.array_len(value);
        let ptr = self.array_ptr(value);
        SliceValue::new(Ty::slice(elem), len, ptr)
    }

    /// Store `slice` into the dynamic array lvalue `array`.
    pub fn set_array(&mut self, array: &DValue, slice: &SliceValue) -> Result<()> {
        let Some(address) = array.address().cloned() else {
            return self.fail_lowering(format!(
                "cannot assign to a `{}` that is not an lvalue",
                array.ty
            ));
        };
        if !array.ty.is_slice() {
            bug!("set_array on `{}`", array.ty);
        }
        let slice_ty = self.lir(&array.ty);
        let elem_ptr = LirType::ptr_to(self.lir(slice.elem_ty()));
        let len_addr = self.func.gep_field(&slice_ty, address.clone(), 0);
        self.func.store(LirType::I64, slice.len.clone(), len_addr);
        let ptr_addr = self.func.gep_field(&slice_ty, address, 1);
        self.func.store(elem_ptr, slice.ptr.clone(), ptr_addr);
        Ok(())
    }

    pub fn set_array_to_null(&mut self, array: &DValue) -> Result<()> {
        let Some(elem) = array.ty.array_elem() else {
            bug!("set_array_to_null on `{}`", array.ty);
        };
        let null = LirValue::Null(LirType::ptr_to(self.lir(elem)));
        let empty = SliceValue::new(array.ty.clone(), LirValue::i64(0), null);
        self.set_array(array, &empty)
    }

    /// Length of a `len`-element span of `elem` reinterpreted as `new_elem`s.
    pub fn array_cast_length(&mut self, len: LirValue, elem: &Ty, new_elem: &Ty) -> Result<LirValue> {
        let old_size = self.types().size_of(elem);
        let new_size = self.types().size_of(new_elem);
        if old_size == new_size {
            return Ok(len);
        }
        if new_size == 0 {
            return self.fail_lowering(format!(
                "cannot reinterpret an array as elements of zero-sized `{}`",
                new_elem
            ));
        }
        if let Some(len) = len.as_const_u64() {
            let Some(bytes) = len.checked_mul(old_size) else {
                return self.fail_lowering(format!(
                    "{} elements of `{}` exceed the addressable size",
                    len, elem
                ));
            };
            if bytes % new_size != 0 {
                let span = self.span;
                return self.fail(Error::LengthMisalignment {
                    span,
                    bytes,
                    elem_size: new_size,
                });
            }
            return Ok(LirValue::i64(bytes / new_size));
        }

        let bytes = self
            .func
            .mul(len, LirValue::i64(old_size), LirType::I64);
        if old_size % new_size != 0 {
            let rem = self
                .func
                .urem(bytes.clone(), LirValue::i64(new_size), LirType::I64);
            let misaligned = self.ine(rem, LirValue::i64(0));
            self.emit_trap_if(
                misaligned,
                RuntimeSymbol::ArrayCastFail,
                vec![bytes.clone(), LirValue::i64(new_size)],
            );
        }
        Ok(self
            .func
            .udiv(bytes, LirValue::i64(new_size), LirType::I64))
    }

    /// Reinterpret an array value as `to`: another slice type, a static array
    /// (checking the length), or a pointer to its first element.
    pub fn cast_array(&mut self, value: &DValue, to: &Ty) -> Result<DValue> {
        let Some(from_elem) = value.ty.array_elem().cloned() else {
            bug!("cast_array from non-array type `{}`", value.ty);
        };
        debug!("casting `{}` to `{}` at {}", value.ty, to, self.span);
        match &to.kind {
            TyKind::Slice(to_elem) => {
                let slice = self.to_slice(value);
                let len = self.array_cast_length(slice.len, &from_elem, to_elem)?;
                Ok(SliceValue::new(to.clone(), len, slice.ptr).into())
            }
            TyKind::Array(to_elem, to_len) => {
                let slice = self.to_slice(value);
                let len = self.array_cast_length(slice.len, &from_elem, to_elem)?;
                self.check_lengths(LirValue::i64(*to_len), len)?;
                Ok(DValue::lval(to.clone(), slice.ptr))
            }
            TyKind::RawPtr(_) => {
                let ptr = self.array_ptr(value);
                Ok(DValue::imm(to.clone(), ptr))
            }
            _ => self.fail_lowering(format!("cannot cast `{}` to `{}`", value.ty, to)),
        }
    }
}
