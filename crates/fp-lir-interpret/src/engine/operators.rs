use fp_core::lir::{LirInstructionKind, LirType, LirValue};

use crate::bail_fault;
use crate::error::Result;
use crate::value::{mask, sign_extend, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    UDiv,
    URem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    LShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    ULt,
    ULe,
    UGt,
    UGe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operator {
    Binary(BinOp),
    Compare(CmpOp),
}

/// Split an arithmetic, bitwise or comparison instruction into its operator
/// and operands.
pub(super) fn classify(kind: &LirInstructionKind) -> Option<(Operator, &LirValue, &LirValue)> {
    use LirInstructionKind as K;
    use Operator::{Binary, Compare};
    let (op, lhs, rhs) = match kind {
        K::Add(l, r) => (Binary(BinOp::Add), l, r),
        K::Sub(l, r) => (Binary(BinOp::Sub), l, r),
        K::Mul(l, r) => (Binary(BinOp::Mul), l, r),
        K::Div(l, r) => (Binary(BinOp::Div), l, r),
        K::Rem(l, r) => (Binary(BinOp::Rem), l, r),
        K::UDiv(l, r) => (Binary(BinOp::UDiv), l, r),
        K::URem(l, r) => (Binary(BinOp::URem), l, r),
        K::And(l, r) => (Binary(BinOp::And), l, r),
        K::Or(l, r) => (Binary(BinOp::Or), l, r),
        K::Xor(l, r) => (Binary(BinOp::Xor), l, r),
        K::Shl(l, r) => (Binary(BinOp::Shl), l, r),
        K::Shr(l, r) => (Binary(BinOp::Shr), l, r),
        K::LShr(l, r) => (Binary(BinOp::LShr), l, r),
        K::Eq(l, r) => (Compare(CmpOp::Eq), l, r),
        K::Ne(l, r) => (Compare(CmpOp::Ne), l, r),
        K::Lt(l, r) => (Compare(CmpOp::Lt), l, r),
        K::Le(l, r) => (Compare(CmpOp::Le), l, r),
        K::Gt(l, r) => (Compare(CmpOp::Gt), l, r),
        K::Ge(l, r) => (Compare(CmpOp::Ge), l, r),
        K::ULt(l, r) => (Compare(CmpOp::ULt), l, r),
        K::ULe(l, r) => (Compare(CmpOp::ULe), l, r),
        K::UGt(l, r) => (Compare(CmpOp::UGt), l, r),
        K::UGe(l, r) => (Compare(CmpOp::UGe), l, r),
        _ => return None,
    };
    Some((op, lhs, rhs))
}

pub(super) fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Float(l), Value::Float(r)) => float_binary(op, *l, *r),
        (Value::Int { bits, value: l }, _) => {
            let Some(r) = rhs.as_u64() else {
                bail_fault!("integer operation on {} and {}", lhs, rhs);
            };
            int_binary(op, *bits, *l, mask(*bits, r))
        }
        // pointer arithmetic happens in i64 after ptrtoint; tolerate raw addresses
        (Value::Ptr(l), _) => {
            let Some(r) = rhs.as_u64() else {
                bail_fault!("integer operation on {} and {}", lhs, rhs);
            };
            int_binary(op, 64, *l, r)
        }
        _ => bail_fault!("unsupported operands {:?} for {} and {}", op, lhs, rhs),
    }
}

fn int_binary(op: BinOp, bits: u32, l: u64, r: u64) -> Result<Value> {
    let (sl, sr) = (sign_extend(bits, l), sign_extend(bits, r));
    let shift = (r % bits.max(1) as u64) as u32;
    let value = match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div | BinOp::Rem | BinOp::UDiv | BinOp::URem if r == 0 => {
            bail_fault!("integer division by zero")
        }
        BinOp::Div => sl.wrapping_div(sr) as u64,
        BinOp::Rem => sl.wrapping_rem(sr) as u64,
        BinOp::UDiv => l / r,
        BinOp::URem => l % r,
        BinOp::And => l & r,
        BinOp::Or => l | r,
        BinOp::Xor => l ^ r,
        BinOp::Shl => l.wrapping_shl(shift),
        BinOp::Shr => (sl >> shift) as u64,
        BinOp::LShr => l >> shift,
    };
    Ok(Value::int(bits, value))
}

fn float_binary(op: BinOp, l: f64, r: f64) -> Result<Value> {
    Ok(Value::Float(match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div | BinOp::UDiv => l / r,
        BinOp::Rem | BinOp::URem => l % r,
        _ => bail_fault!("bitwise {:?} on floating-point operands", op),
    }))
}

pub(super) fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if let (Value::Float(l), Value::Float(r)) = (lhs, rhs) {
        // ordered comparisons: NaN compares unequal to everything
        let result = match op {
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            CmpOp::Lt | CmpOp::ULt => l < r,
            CmpOp::Le | CmpOp::ULe => l <= r,
            CmpOp::Gt | CmpOp::UGt => l > r,
            CmpOp::Ge | CmpOp::UGe => l >= r,
        };
        return Ok(Value::bool(result));
    }
    let (Some(l), Some(r), Some(sl), Some(sr)) =
        (lhs.as_u64(), rhs.as_u64(), lhs.as_i64(), rhs.as_i64())
    else {
        bail_fault!("cannot compare {} with {}", lhs, rhs);
    };
    let result = match op {
        CmpOp::Eq => l == r,
        CmpOp::Ne => l != r,
        CmpOp::Lt => sl < sr,
        CmpOp::Le => sl <= sr,
        CmpOp::Gt => sl > sr,
        CmpOp::Ge => sl >= sr,
        CmpOp::ULt => l < r,
        CmpOp::ULe => l <= r,
        CmpOp::UGt => l > r,
        CmpOp::UGe => l >= r,
    };
    Ok(Value::bool(result))
}

pub(super) fn trunc(value: &Value, ty: &LirType) -> Result<Value> {
    match (value.as_u64(), ty.int_bits()) {
        (Some(raw), Some(bits)) => Ok(Value::int(bits, raw)),
        _ => bail_fault!("cannot truncate {} to {:?}", value, ty),
    }
}

pub(super) fn zext(value: &Value, ty: &LirType) -> Result<Value> {
    trunc(value, ty)
}

pub(super) fn sext(value: &Value, ty: &LirType) -> Result<Value> {
    match (value.as_i64(), ty.int_bits()) {
        (Some(raw), Some(bits)) => Ok(Value::int(bits, raw as u64)),
        _ => bail_fault!("cannot sign-extend {} to {:?}", value, ty),
    }
}

pub(super) fn bitcast(value: &Value, ty: &LirType) -> Result<Value> {
    Ok(match (value, ty) {
        (Value::Float(float), LirType::I64) => Value::int(64, float.to_bits()),
        (Value::Float(float), LirType::I32) => Value::int(32, (*float as f32).to_bits() as u64),
        (Value::Int { value, .. }, LirType::F64) => Value::Float(f64::from_bits(*value)),
        (Value::Int { value, .. }, LirType::F32) => {
            Value::Float(f32::from_bits(*value as u32) as f64)
        }
        (Value::Ptr(address), LirType::Ptr(_)) => Value::Ptr(*address),
        (other, _) => other.clone(),
    })
}
