use super::LirType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub size: u64,
    pub align: u32,
    pub field_offsets: Vec<u64>,
}

/// Allocation size in bytes, including tail padding for structs.
pub fn size_of(ty: &LirType) -> u64 {
    match ty {
        LirType::I1 | LirType::I8 => 1,
        LirType::I16 => 2,
        LirType::I32 | LirType::F32 => 4,
        LirType::I64 | LirType::F64 => 8,
        LirType::Ptr(_) => 8,
        LirType::Array(elem, len) => size_of(elem) * *len,
        LirType::Struct { .. } => struct_layout(ty).map(|layout| layout.size).unwrap_or(0),
        LirType::Void => 0,
    }
}

pub fn align_of(ty: &LirType) -> u32 {
    match ty {
        LirType::I1 | LirType::I8 => 1,
        LirType::I16 => 2,
        LirType::I32 | LirType::F32 => 4,
        LirType::I64 | LirType::F64 => 8,
        LirType::Ptr(_) => 8,
        LirType::Array(elem, _) => align_of(elem),
        LirType::Struct { .. } => struct_layout(ty).map(|layout| layout.align).unwrap_or(1),
        LirType::Void => 1,
    }
}

pub fn struct_layout(ty: &LirType) -> Option<StructLayout> {
    let LirType::Struct { fields, packed, .. } = ty else {
        return None;
    };
    if fields.is_empty() {
        return Some(StructLayout {
            size: 0,
            align: 1,
            field_offsets: Vec::new(),
        });
    }

    let mut offsets = Vec::with_capacity(fields.len());
    let mut offset = 0u64;
    let mut max_align = 1u32;

    for field in fields {
        let field_align = if *packed { 1 } else { align_of(field) };
        max_align = max_align.max(field_align);
        if !*packed && field_align > 1 {
            offset = align_to(offset, field_align as u64);
        }
        offsets.push(offset);
        offset = offset.saturating_add(size_of(field));
    }

    let align = if *packed { 1 } else { max_align.max(1) };
    let size = if *packed {
        offset
    } else {
        align_to(offset, align as u64)
    };

    Some(StructLayout {
        size,
        align,
        field_offsets: offsets,
    })
}

/// Byte offset of the element addressed by `indices` inside a value of `ty`.
/// Indices follow aggregate nesting: array indices scale by element size,
/// struct indices select a field.
pub fn offset_of_path(ty: &LirType, indices: &[u64]) -> Option<u64> {
    let mut current = ty;
    let mut offset = 0u64;
    for &index in indices {
        match current {
            LirType::Array(elem, _) => {
                offset += size_of(elem) * index;
                current = elem;
            }
            LirType::Struct { fields, .. } => {
                let layout = struct_layout(current)?;
                offset += *layout.field_offsets.get(index as usize)?;
                current = fields.get(index as usize)?;
            }
            _ => return None,
        }
    }
    Some(offset)
}

fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    let rem = value % alignment;
    if rem == 0 {
        value
    } else {
        value + (alignment - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slice_pair_is_sixteen_bytes() {
        let slice = LirType::slice_of(LirType::I32);
        let layout = struct_layout(&slice).unwrap();
        assert_eq!(layout.size, 16);
        assert_eq!(layout.align, 8);
        assert_eq!(layout.field_offsets, vec![0, 8]);
    }

    #[test]
    fn struct_fields_are_padded_to_alignment() {
        let ty = LirType::Struct {
            fields: vec![LirType::I8, LirType::I32, LirType::I16],
            packed: false,
            name: None,
        };
        let layout = struct_layout(&ty).unwrap();
        assert_eq!(layout.field_offsets, vec![0, 4, 8]);
        assert_eq!(layout.size, 12);
    }

    #[test]
    fn offset_path_walks_nested_aggregates() {
        let inner = LirType::Struct {
            fields: vec![LirType::I8, LirType::F64],
            packed: false,
            name: None,
        };
        let ty = LirType::Array(Box::new(inner), 4);
        assert_eq!(offset_of_path(&ty, &[2, 1]), Some(2 * 16 + 8));
        assert_eq!(offset_of_path(&LirType::I32, &[0]), None);
    }
}
