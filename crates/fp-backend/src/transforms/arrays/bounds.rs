use fp_core::error::Result;
use fp_core::lir::{LirType, LirValue, RuntimeSymbol};
use fp_core::value::DValue;

use super::ArrayBuilder;

impl<'a> ArrayBuilder<'a> {
    /// Check `lower_bound <= index < len(array)`, trapping through
    /// `fp_array_bounds_fail` otherwise. All comparisons are unsigned.
    pub fn array_bounds_check(
        &mut self,
        array: &DValue,
        index: LirValue,
        lower_bound: Option<LirValue>,
    ) -> Result<()> {
        if !self.config().bounds_checks.enabled() {
            return Ok(());
        }
        let len = self.array_len(array);
        let below_len = self.ult(index.clone(), len.clone());
        let in_range = match lower_bound {
            Some(lower) => {
                let above_lower = self.ule(lower, index.clone());
                self.and(above_lower, below_len)
            }
            None => below_len,
        };
        if in_range == LirValue::bool(false) {
            let index = index.as_const_u64().unwrap_or_default();
            self.warn(format!(
                "index {} is out of bounds for `{}` of length {}",
                index,
                array.ty,
                len.as_const_u64().unwrap_or_default()
            ));
        }
        let failed = self.not(in_range);
        self.emit_trap_if(failed, RuntimeSymbol::ArrayBoundsFail, vec![index, len]);
        Ok(())
    }

    /// Check `lower <= upper <= len(array)` before slicing `array[lower..upper]`.
    pub fn slice_bounds_check(
        &mut self,
        array: &DValue,
        lower: LirValue,
        upper: LirValue,
    ) -> Result<()> {
        if !self.config().bounds_checks.enabled() {
            return Ok(());
        }
        let len = self.array_len(array);
        let ordered = self.ule(lower.clone(), upper.clone());
        let upper_in_range = self.ule(upper.clone(), len.clone());
        let in_range = self.and(ordered, upper_in_range.clone());
        if in_range == LirValue::bool(false) {
            self.warn(format!(
                "slice [{}..{}] is out of bounds for `{}` of length {}",
                lower.as_const_u64().unwrap_or_default(),
                upper.as_const_u64().unwrap_or_default(),
                array.ty,
                len.as_const_u64().unwrap_or_default()
            ));
        }
        // report the offending bound
        let index = match upper_in_range.as_const_u64() {
            Some(1) => lower,
            Some(_) => upper,
            None => self
                .func
                .select(upper_in_range, lower, upper, LirType::I64),
        };
        let failed = self.not(in_range);
        self.emit_trap_if(failed, RuntimeSymbol::ArrayBoundsFail, vec![index, len]);
        Ok(())
    }
}
