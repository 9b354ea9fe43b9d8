use std::cmp::Ordering;

use fp_core::lir::RuntimeSymbol;
use fp_core::span::Span;
use itertools::Itertools;
use tracing::trace;

use crate::error::{Result, Trap};
use crate::memory::Memory;
use crate::value::Value;
use crate::{bail_fault, ensure_fault};

/// Execute one entry point of the runtime-support interface.
pub(super) fn call(memory: &mut Memory, symbol: RuntimeSymbol, args: &[Value]) -> Result<Value> {
    trace!("runtime {}({})", symbol.as_str(), args.iter().join(", "));
    match symbol {
        RuntimeSymbol::ArrayAlloc => {
            let bytes = byte_count(arg(args, 0)?, arg(args, 1)?)?;
            let zeroed = arg(args, 2)? != 0;
            Ok(Value::Ptr(if bytes == 0 {
                0
            } else {
                memory.allocate(bytes, zeroed)
            }))
        }
        RuntimeSymbol::ArrayRealloc => {
            let ptr = arg(args, 0)?;
            let size = arg(args, 3)?;
            let old = byte_count(arg(args, 1)?, size)?;
            let new = byte_count(arg(args, 2)?, size)?;
            Ok(Value::Ptr(memory.realloc(ptr, old, new)?))
        }
        RuntimeSymbol::Memcpy => {
            let (dst, src, len) = (arg(args, 0)?, arg(args, 1)?, arg(args, 2)?);
            if len > 0 {
                ensure_fault!(
                    dst.saturating_add(len) <= src || src.saturating_add(len) <= dst,
                    "memcpy of {} bytes between overlapping {:#x} and {:#x}",
                    len,
                    src,
                    dst
                );
            }
            copy(memory, dst, src, len)?;
            Ok(Value::Void)
        }
        RuntimeSymbol::Memmove => {
            copy(memory, arg(args, 0)?, arg(args, 1)?, arg(args, 2)?)?;
            Ok(Value::Void)
        }
        RuntimeSymbol::Memcmp => {
            let len = arg(args, 2)?;
            let lhs = memory.read_bytes(arg(args, 0)?, len)?;
            let rhs = memory.read_bytes(arg(args, 1)?, len)?;
            Ok(Value::i32(match lhs.cmp(&rhs) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        RuntimeSymbol::ArrayBoundsFail => Err(Trap::BoundsViolation {
            span: span(args)?,
            index: arg(args, 3)?,
            len: arg(args, 4)?,
        }),
        RuntimeSymbol::ArrayLengthMismatch => Err(Trap::LengthMismatch {
            span: span(args)?,
            dst_len: arg(args, 3)?,
            src_len: arg(args, 4)?,
        }),
        RuntimeSymbol::ArrayCastFail => Err(Trap::CastMisalignment {
            span: span(args)?,
            bytes: arg(args, 3)?,
            elem_size: arg(args, 4)?,
        }),
        RuntimeSymbol::InvalidCodePoint => Err(Trap::InvalidCodePoint {
            span: span(args)?,
            code_point: arg(args, 3)? as u32,
        }),
    }
}

fn arg(args: &[Value], index: usize) -> Result<u64> {
    match args.get(index).and_then(Value::as_u64) {
        Some(value) => Ok(value),
        None => bail_fault!("runtime call is missing integer argument #{}", index),
    }
}

/// Location passed as the leading `(file, lo, hi)` arguments of a failure hook.
fn span(args: &[Value]) -> Result<Span> {
    Ok(Span::new(arg(args, 0)?, arg(args, 1)? as u32, arg(args, 2)? as u32))
}

fn byte_count(elem_size: u64, len: u64) -> Result<u64> {
    match elem_size.checked_mul(len) {
        Some(bytes) => Ok(bytes),
        None => bail_fault!("allocation of {} elements of {} bytes overflows", len, elem_size),
    }
}

fn copy(memory: &mut Memory, dst: u64, src: u64, len: u64) -> Result<()> {
    let bytes = memory.read_bytes(src, len)?;
    memory.write_bytes(dst, &bytes)
}
