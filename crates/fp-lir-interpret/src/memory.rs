//! Simulated byte-addressed heap.
//!
//! Every allocation is a separate block with a fixed capacity and a "used"
//! prefix; accesses must stay inside the used prefix of one live block. Blocks
//! are separated by unmapped gaps so that running off the end of one never lands
//! in another. Reallocation keeps the old block alive, like a garbage-collected
//! runtime would, so stale slices stay readable.

use std::collections::BTreeMap;

use fp_core::lir::{layout, LirType};
use tracing::trace;

use crate::error::Result;
use crate::value::{mask, Value};
use crate::{bail_fault, ensure_fault};

/// Byte written into fresh storage that was not requested zeroed.
pub const POISON: u8 = 0xAA;

const FIRST_BASE: u64 = 0x1000;
const GAP: u64 = 0x100;
const MIN_CAPACITY: u64 = 16;

#[derive(Debug)]
struct Block {
    data: Vec<u8>,
    used: u64,
    readonly: bool,
}

#[derive(Debug)]
pub struct Memory {
    blocks: BTreeMap<u64, Block>,
    next_base: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
            next_base: FIRST_BASE,
        }
    }

    /// Allocate `bytes` of storage, zero-filled or poisoned. The block may grow
    /// in place up to the next power of two.
    pub fn allocate(&mut self, bytes: u64, zeroed: bool) -> u64 {
        let capacity = bytes.next_power_of_two().max(MIN_CAPACITY);
        self.insert_block(bytes, capacity, if zeroed { 0 } else { POISON }, false)
    }

    /// Allocate an exactly-sized block holding `data`.
    pub fn allocate_data(&mut self, data: Vec<u8>, readonly: bool) -> u64 {
        let len = data.len() as u64;
        let base = self.insert_block(len, len.max(1), 0, readonly);
        if let Some(block) = self.blocks.get_mut(&base) {
            block.data[..data.len()].copy_from_slice(&data);
        }
        base
    }

    fn insert_block(&mut self, used: u64, capacity: u64, fill: u8, readonly: bool) -> u64 {
        let base = self.next_base;
        self.next_base = align_up(base + capacity + GAP, 16);
        self.blocks.insert(
            base,
            Block {
                data: vec![fill; capacity as usize],
                used,
                readonly,
            },
        );
        trace!("allocated {} bytes at {:#x}", used, base);
        base
    }

    /// Make the block starting at `base` read-only.
    pub fn protect(&mut self, base: u64) {
        if let Some(block) = self.blocks.get_mut(&base) {
            block.readonly = true;
        }
    }

    /// Drop the block starting at `base`; later accesses through it fault.
    pub fn release(&mut self, base: u64) {
        self.blocks.remove(&base);
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Resize the `old_bytes` starting at `ptr` to `new_bytes`. Shrinking, and
    /// growing a region that ends at its block's used end with enough capacity,
    /// keep the pointer; anything else copies into a fresh block.
    pub fn realloc(&mut self, ptr: u64, old_bytes: u64, new_bytes: u64) -> Result<u64> {
        if ptr == 0 {
            ensure_fault!(old_bytes == 0, "realloc of {} bytes at null", old_bytes);
            return Ok(if new_bytes == 0 {
                0
            } else {
                self.allocate(new_bytes, false)
            });
        }
        if new_bytes <= old_bytes {
            self.check(ptr, old_bytes)?;
            return Ok(ptr);
        }

        let (base, block) = self.block_at(ptr)?;
        let offset = ptr - base;
        let end = offset + old_bytes;
        ensure_fault!(end <= block.used, "realloc past the used end of {:#x}", base);
        let capacity = block.data.len() as u64;
        if end == block.used && offset + new_bytes <= capacity && !block.readonly {
            if let Some(block) = self.blocks.get_mut(&base) {
                block.data[end as usize..(offset + new_bytes) as usize].fill(POISON);
                block.used = offset + new_bytes;
            }
            trace!("grew {:#x} in place to {} bytes", ptr, new_bytes);
            return Ok(ptr);
        }

        let old = self.read_bytes(ptr, old_bytes)?;
        let fresh = self.allocate(new_bytes, false);
        self.write_bytes(fresh, &old)?;
        trace!("moved {:#x} to {:#x}", ptr, fresh);
        Ok(fresh)
    }

    fn block_at(&self, address: u64) -> Result<(u64, &Block)> {
        ensure_fault!(address != 0, "null pointer access");
        match self.blocks.range(..=address).next_back() {
            Some((base, block)) if address < base + block.data.len() as u64 => Ok((*base, block)),
            _ => bail_fault!("access to unmapped address {:#x}", address),
        }
    }

    /// Fault unless `[address, address + len)` lies in the used part of one block.
    fn check(&self, address: u64, len: u64) -> Result<(u64, &Block)> {
        let (base, block) = self.block_at(address)?;
        let end = address - base + len;
        ensure_fault!(
            end <= block.used,
            "access of {} bytes at {:#x} overruns its {}-byte block at {:#x}",
            len,
            address,
            block.used,
            base
        );
        Ok((base, block))
    }

    pub fn read_bytes(&self, address: u64, len: u64) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let (base, block) = self.check(address, len)?;
        let start = (address - base) as usize;
        Ok(block.data[start..start + len as usize].to_vec())
    }

    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let (base, block) = self.check(address, bytes.len() as u64)?;
        ensure_fault!(!block.readonly, "write to constant data at {:#x}", address);
        if let Some(block) = self.blocks.get_mut(&base) {
            let start = (address - base) as usize;
            block.data[start..start + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    pub fn load(&self, ty: &LirType, address: u64) -> Result<Value> {
        let bytes = self.read_bytes(address, layout::size_of(ty))?;
        decode(ty, &bytes)
    }

    pub fn store(&mut self, ty: &LirType, address: u64, value: &Value) -> Result<()> {
        let mut bytes = vec![0u8; layout::size_of(ty) as usize];
        encode(ty, value, &mut bytes)?;
        self.write_bytes(address, &bytes)
    }
}

fn decode(ty: &LirType, bytes: &[u8]) -> Result<Value> {
    let word = || {
        let mut raw = [0u8; 8];
        raw[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
        u64::from_le_bytes(raw)
    };
    Ok(match ty {
        LirType::I1 => Value::bool(bytes[0] != 0),
        LirType::I8 | LirType::I16 | LirType::I32 | LirType::I64 => {
            Value::int(ty.int_bits().unwrap_or(64), word())
        }
        LirType::F32 => Value::Float(f32::from_bits(word() as u32) as f64),
        LirType::F64 => Value::Float(f64::from_bits(word())),
        LirType::Ptr(_) => Value::Ptr(word()),
        LirType::Array(elem, len) => {
            let size = layout::size_of(elem) as usize;
            let elements = (0..*len as usize)
                .map(|index| decode(elem, &bytes[index * size..(index + 1) * size]))
                .collect::<Result<Vec<_>>>()?;
            Value::Aggregate(elements)
        }
        LirType::Struct { fields, .. } => {
            let Some(struct_layout) = layout::struct_layout(ty) else {
                bail_fault!("no layout for {:?}", ty);
            };
            let fields = fields
                .iter()
                .zip(&struct_layout.field_offsets)
                .map(|(field, offset)| {
                    let start = *offset as usize;
                    decode(field, &bytes[start..start + layout::size_of(field) as usize])
                })
                .collect::<Result<Vec<_>>>()?;
            Value::Aggregate(fields)
        }
        LirType::Void => Value::Void,
    })
}

fn encode(ty: &LirType, value: &Value, out: &mut [u8]) -> Result<()> {
    match (ty, value) {
        (LirType::F32, Value::Float(float)) => {
            out.copy_from_slice(&(*float as f32).to_bits().to_le_bytes())
        }
        (LirType::F64, Value::Float(float)) => out.copy_from_slice(&float.to_bits().to_le_bytes()),
        (LirType::Array(elem, _), Value::Aggregate(elements)) => {
            let size = layout::size_of(elem) as usize;
            for (index, element) in elements.iter().enumerate() {
                encode(elem, element, &mut out[index * size..(index + 1) * size])?;
            }
        }
        (LirType::Struct { fields, .. }, Value::Aggregate(values)) => {
            let Some(struct_layout) = layout::struct_layout(ty) else {
                bail_fault!("no layout for {:?}", ty);
            };
            for ((field, offset), value) in fields
                .iter()
                .zip(&struct_layout.field_offsets)
                .zip(values)
            {
                let start = *offset as usize;
                let end = start + layout::size_of(field) as usize;
                encode(field, value, &mut out[start..end])?;
            }
        }
        (LirType::Void, _) => {}
        (_, scalar) => {
            let Some(raw) = scalar.as_u64() else {
                bail_fault!("cannot store {} as {:?}", value, ty);
            };
            let bits = (out.len() * 8) as u32;
            let bytes = mask(bits, raw).to_le_bytes();
            out.copy_from_slice(&bytes[..out.len()]);
        }
    }
    Ok(())
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}
