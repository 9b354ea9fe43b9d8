//! Typed values exchanged between expression lowering and the array passes.

use crate::lir::LirValue;
use crate::types::Ty;

#[derive(Debug, Clone, PartialEq)]
pub enum DValueKind {
    /// An SSA value of the lowered type.
    Imm(LirValue),
    /// Address of storage holding a value of the source type.
    Lval(LirValue),
    /// A dynamic array already split into its length and pointer.
    Slice { len: LirValue, ptr: LirValue },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DValue {
    pub ty: Ty,
    pub kind: DValueKind,
}

impl DValue {
    pub fn imm(ty: Ty, value: LirValue) -> Self {
        Self {
            ty,
            kind: DValueKind::Imm(value),
        }
    }

    pub fn lval(ty: Ty, address: LirValue) -> Self {
        Self {
            ty,
            kind: DValueKind::Lval(address),
        }
    }

    pub fn is_lval(&self) -> bool {
        matches!(self.kind, DValueKind::Lval(_))
    }

    pub fn address(&self) -> Option<&LirValue> {
        match &self.kind {
            DValueKind::Lval(address) => Some(address),
            _ => None,
        }
    }
}

/// The result of every slice-producing primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceValue {
    /// The dynamic array type, not the element type.
    pub ty: Ty,
    pub len: LirValue,
    pub ptr: LirValue,
}

impl SliceValue {
    pub fn new(ty: Ty, len: LirValue, ptr: LirValue) -> Self {
        Self { ty, len, ptr }
    }

    pub fn elem_ty(&self) -> &Ty {
        match self.ty.array_elem() {
            Some(elem) => elem,
            None => bug!("slice value of non-array type {}", self.ty),
        }
    }
}

impl From<SliceValue> for DValue {
    fn from(slice: SliceValue) -> Self {
        DValue {
            ty: slice.ty,
            kind: DValueKind::Slice {
                len: slice.len,
                ptr: slice.ptr,
            },
        }
    }
}
