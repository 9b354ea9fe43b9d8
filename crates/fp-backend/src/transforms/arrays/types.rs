use std::sync::Arc;

use fp_core::collections::ConcurrentMap;
use fp_core::lir::{layout, LirConstant, LirType};
use fp_core::types::{CharTy, FloatTy, IntTy, Ty, TyKind, UintTy};

/// What bulk operations need to know about an element type.
#[derive(Debug, Clone, PartialEq)]
pub struct ElemInfo {
    pub size: u64,
    pub align: u32,
    pub default: LirConstant,
    /// The default value is all zero bytes, so zeroed storage is already initialized.
    pub zero_default: bool,
    pub needs_fixup: bool,
}

/// Maps source types to their LIR representation.
///
/// Results are memoized per structural type identity: asking twice for the same
/// type yields the same `Arc`.
#[derive(Default)]
pub struct TypeMapper {
    cache: ConcurrentMap<Ty, Arc<LirType>>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self {
            cache: ConcurrentMap::new(),
        }
    }

    pub fn lower(&self, ty: &Ty) -> Arc<LirType> {
        if let Some(lowered) = self.cache.get_cloned(ty) {
            return lowered;
        }
        let lowered = Arc::new(self.lower_uncached(ty));
        self.cache.get_or_insert_with(ty.clone(), || lowered)
    }

    pub fn lower_ty(&self, ty: &Ty) -> LirType {
        self.lower(ty).as_ref().clone()
    }

    /// Representation of a static or dynamic array type.
    pub fn array_type(&self, ty: &Ty) -> Arc<LirType> {
        if !ty.is_array() {
            bug!("`{}` is not an array type", ty);
        }
        self.lower(ty)
    }

    /// Fixed element count of a static array; `None` for slices.
    pub fn static_len(&self, ty: &Ty) -> Option<u64> {
        ty.static_len()
    }

    pub fn array_element_type(&self, ty: &Ty) -> LirType {
        match ty.array_elem() {
            Some(elem) => self.lower_ty(elem),
            None => bug!("`{}` has no element type", ty),
        }
    }

    pub fn array_needs_fixup(&self, ty: &Ty) -> bool {
        ty.array_elem().is_some_and(Ty::needs_postblit)
    }

    pub fn size_of(&self, ty: &Ty) -> u64 {
        layout::size_of(&self.lower(ty))
    }

    pub fn elem_info(&self, elem: &Ty) -> ElemInfo {
        let lowered = self.lower(elem);
        let default = self.default_value(elem);
        ElemInfo {
            size: layout::size_of(&lowered),
            align: layout::align_of(&lowered),
            zero_default: default.is_zero(),
            default,
            needs_fixup: elem.needs_postblit(),
        }
    }

    /// Value of a default-initialized `ty`.
    pub fn default_value(&self, ty: &Ty) -> LirConstant {
        let lowered = self.lower_ty(ty);
        match &ty.kind {
            TyKind::Bool => LirConstant::Bool(false),
            TyKind::Int(_) => LirConstant::Int(0, lowered),
            TyKind::Uint(_) => LirConstant::UInt(0, lowered),
            TyKind::Float(_) => LirConstant::Float(f64::NAN, lowered),
            TyKind::Char(width) => LirConstant::UInt(width.default_unit() as u64, lowered),
            TyKind::RawPtr(_) => LirConstant::Null(lowered),
            TyKind::Adt(def) => LirConstant::Struct(
                def.fields.iter().map(|field| self.default_value(field)).collect(),
                lowered,
            ),
            TyKind::Array(elem, len) => {
                LirConstant::Array(vec![self.default_value(elem); *len as usize], lowered)
            }
            TyKind::Slice(elem) => {
                LirConstant::Struct(vec![
                    LirConstant::UInt(0, LirType::I64),
                    LirConstant::Null(LirType::ptr_to(self.lower_ty(elem))),
                ], lowered)
            }
            TyKind::Void | TyKind::Opaque(_) => bug!("no default value for `{}`", ty),
        }
    }

    /// Whether two values of `ty` are equal exactly when their bytes are.
    ///
    /// Aggregates qualify only when they have no `eq` hook, every field
    /// qualifies, and the layout has no padding bytes.
    pub fn is_bitwise_comparable(&self, ty: &Ty) -> bool {
        match &ty.kind {
            TyKind::Adt(def) => {
                def.hooks.eq.is_none()
                    && def.fields.iter().all(|field| self.is_bitwise_comparable(field))
                    && self.size_of(ty)
                        == def.fields.iter().map(|field| self.size_of(field)).sum::<u64>()
            }
            TyKind::Array(elem, _) => self.is_bitwise_comparable(elem),
            _ => ty.is_bitwise_comparable(),
        }
    }

    fn lower_uncached(&self, ty: &Ty) -> LirType {
        match &ty.kind {
            TyKind::Bool => LirType::I1,
            TyKind::Int(int) => match int {
                IntTy::I8 => LirType::I8,
                IntTy::I16 => LirType::I16,
                IntTy::I32 => LirType::I32,
                IntTy::I64 | IntTy::Isize => LirType::I64,
            },
            TyKind::Uint(uint) => match uint {
                UintTy::U8 => LirType::I8,
                UintTy::U16 => LirType::I16,
                UintTy::U32 => LirType::I32,
                UintTy::U64 | UintTy::Usize => LirType::I64,
            },
            TyKind::Float(FloatTy::F32) => LirType::F32,
            TyKind::Float(FloatTy::F64) => LirType::F64,
            TyKind::Char(CharTy::Utf8) => LirType::I8,
            TyKind::Char(CharTy::Utf16) => LirType::I16,
            TyKind::Char(CharTy::Utf32) => LirType::I32,
            TyKind::RawPtr(pointee) => match &pointee.kind {
                TyKind::Void | TyKind::Opaque(_) => LirType::byte_ptr(),
                _ => LirType::ptr_to(self.lower_ty(pointee)),
            },
            TyKind::Adt(def) => LirType::Struct {
                fields: def.fields.iter().map(|field| self.lower_ty(field)).collect(),
                packed: false,
                name: Some(def.name.clone()),
            },
            TyKind::Array(elem, len) => LirType::Array(Box::new(self.lower_ty(elem)), *len),
            TyKind::Slice(elem) => LirType::slice_of(self.lower_ty(elem)),
            TyKind::Void | TyKind::Opaque(_) => bug!("type `{}` has no LIR representation", ty),
        }
    }
}
