use std::fmt::{self, Display, Formatter};

use fp_core::lir::LirType;
use itertools::Itertools;

/// A runtime value held in a register.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer of `bits` width; `value` holds the low `bits` bits, zero-extended.
    Int { bits: u32, value: u64 },
    Float(f64),
    Ptr(u64),
    Aggregate(Vec<Value>),
    Void,
}

impl Value {
    pub fn int(bits: u32, value: u64) -> Value {
        Value::Int {
            bits,
            value: mask(bits, value),
        }
    }

    pub fn i64(value: i64) -> Value {
        Value::int(64, value as u64)
    }

    pub fn i32(value: i32) -> Value {
        Value::int(32, value as u32 as u64)
    }

    pub fn bool(value: bool) -> Value {
        Value::int(1, value as u64)
    }

    pub fn ptr(address: u64) -> Value {
        Value::Ptr(address)
    }

    /// The `{ len, ptr }` pair of a dynamic array.
    pub fn slice(len: u64, ptr: u64) -> Value {
        Value::Aggregate(vec![Value::int(64, len), Value::Ptr(ptr)])
    }

    /// All-zero value of `ty`; also stands in for `undef`.
    pub fn zero(ty: &LirType) -> Value {
        match ty {
            LirType::F32 | LirType::F64 => Value::Float(0.0),
            LirType::Ptr(_) => Value::Ptr(0),
            LirType::Array(elem, len) => {
                Value::Aggregate((0..*len).map(|_| Value::zero(elem)).collect())
            }
            LirType::Struct { fields, .. } => {
                Value::Aggregate(fields.iter().map(Value::zero).collect())
            }
            LirType::Void => Value::Void,
            int => Value::int(int.int_bits().unwrap_or(64), 0),
        }
    }

    /// Integer or address payload, zero-extended.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int { value, .. } => Some(*value),
            Value::Ptr(address) => Some(*address),
            _ => None,
        }
    }

    /// Integer payload, sign-extended from its width.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int { bits, value } => Some(sign_extend(*bits, *value)),
            Value::Ptr(address) => Some(*address as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_u64().map(|value| value != 0)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&[Value]> {
        match self {
            Value::Aggregate(fields) => Some(fields),
            _ => None,
        }
    }

    /// `(len, ptr)` of a dynamic array value.
    pub fn as_slice(&self) -> Option<(u64, u64)> {
        match self.fields()? {
            [len, ptr] => Some((len.as_u64()?, ptr.as_u64()?)),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int { bits: 1, value } => write!(f, "{}", *value != 0),
            Value::Int { bits, value } => write!(f, "i{} {}", bits, sign_extend(*bits, *value)),
            Value::Float(value) => write!(f, "{}", value),
            Value::Ptr(0) => write!(f, "null"),
            Value::Ptr(address) => write!(f, "{:#x}", address),
            Value::Aggregate(fields) => write!(f, "{{{}}}", fields.iter().join(", ")),
            Value::Void => write!(f, "void"),
        }
    }
}

pub(crate) fn mask(bits: u32, value: u64) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

pub(crate) fn sign_extend(bits: u32, value: u64) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
