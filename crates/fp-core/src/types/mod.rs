//! Source-level view of the types array lowering consumes.
//!
//! Only the shape the array passes query is modelled here: element types, their
//! copy hooks, and the static/dynamic array duality.

use derive_more::Display;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntTy {
    Isize,
    I8,
    I16,
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UintTy {
    Usize,
    U8,
    U16,
    U32,
    U64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatTy {
    F32,
    F64,
}

/// Character code unit width. Strings are arrays of code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CharTy {
    #[display("char")]
    Utf8,
    #[display("wchar")]
    Utf16,
    #[display("dchar")]
    Utf32,
}

impl CharTy {
    /// Default value of an uninitialized code unit: an invalid unit for each encoding.
    pub fn default_unit(self) -> u32 {
        match self {
            CharTy::Utf8 => 0xFF,
            CharTy::Utf16 | CharTy::Utf32 => 0xFFFF,
        }
    }

    /// Encode `code_point` into code units of this width.
    pub fn encode(self, code_point: u32) -> Option<Vec<u32>> {
        let ch = char::from_u32(code_point)?;
        let units = match self {
            CharTy::Utf8 => {
                let mut buf = [0u8; 4];
                ch.encode_utf8(&mut buf).bytes().map(u32::from).collect()
            }
            CharTy::Utf16 => {
                let mut buf = [0u16; 2];
                ch.encode_utf16(&mut buf).iter().map(|unit| *unit as u32).collect()
            }
            CharTy::Utf32 => vec![code_point],
        };
        Some(units)
    }
}

/// User hooks attached to an aggregate, each naming a function symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CopyHooks {
    /// `fn(*mut Self)`, run on the destination after its bytes were copied.
    pub postblit: Option<String>,
    /// `fn(*const Self, *const Self) -> i1`.
    pub eq: Option<String>,
    /// `fn(*const Self, *const Self) -> i32`, negative/zero/positive.
    pub cmp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdtDef {
    pub name: String,
    pub fields: Vec<Ty>,
    pub hooks: CopyHooks,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ty {
    pub kind: TyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TyKind {
    Void,
    Bool,
    Int(IntTy),
    Uint(UintTy),
    Float(FloatTy),
    Char(CharTy),
    RawPtr(Box<Ty>),
    Adt(Arc<AdtDef>),
    /// Fixed-length array stored inline.
    Array(Box<Ty>, u64),
    /// Dynamic array: a `(length, pointer)` pair.
    Slice(Box<Ty>),
    /// A type the frontend could not give a layout to.
    Opaque(String),
}

impl Ty {
    pub fn new(kind: TyKind) -> Self {
        Self { kind }
    }

    pub fn void() -> Self {
        Ty::new(TyKind::Void)
    }

    pub fn bool() -> Self {
        Ty::new(TyKind::Bool)
    }

    pub fn int(int: IntTy) -> Self {
        Ty::new(TyKind::Int(int))
    }

    pub fn uint(uint: UintTy) -> Self {
        Ty::new(TyKind::Uint(uint))
    }

    pub fn float(float: FloatTy) -> Self {
        Ty::new(TyKind::Float(float))
    }

    pub fn char(width: CharTy) -> Self {
        Ty::new(TyKind::Char(width))
    }

    pub fn ptr(pointee: Ty) -> Self {
        Ty::new(TyKind::RawPtr(Box::new(pointee)))
    }

    pub fn adt(def: AdtDef) -> Self {
        Ty::new(TyKind::Adt(Arc::new(def)))
    }

    pub fn array(elem: Ty, len: u64) -> Self {
        Ty::new(TyKind::Array(Box::new(elem), len))
    }

    pub fn slice(elem: Ty) -> Self {
        Ty::new(TyKind::Slice(Box::new(elem)))
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        Ty::new(TyKind::Opaque(name.into()))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TyKind::Array(..) | TyKind::Slice(_))
    }

    pub fn is_static_array(&self) -> bool {
        matches!(self.kind, TyKind::Array(..))
    }

    pub fn is_slice(&self) -> bool {
        matches!(self.kind, TyKind::Slice(_))
    }

    /// Element type of a static or dynamic array.
    pub fn array_elem(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Array(elem, _) | TyKind::Slice(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn static_len(&self) -> Option<u64> {
        match &self.kind {
            TyKind::Array(_, len) => Some(*len),
            _ => None,
        }
    }

    pub fn char_width(&self) -> Option<CharTy> {
        match &self.kind {
            TyKind::Char(width) => Some(*width),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, TyKind::Float(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.kind, TyKind::Int(_))
    }

    /// Types arithmetic assignment operators apply to.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.kind,
            TyKind::Int(_) | TyKind::Uint(_) | TyKind::Float(_)
        )
    }

    /// Whether copying a value of this type must be followed by the copy-fixup pass.
    pub fn needs_postblit(&self) -> bool {
        match &self.kind {
            TyKind::Adt(def) => {
                def.hooks.postblit.is_some() || def.fields.iter().any(Ty::needs_postblit)
            }
            TyKind::Array(elem, len) => *len > 0 && elem.needs_postblit(),
            _ => false,
        }
    }

    /// Whether a value of this type holds a dynamic array, directly or through
    /// fields and static arrays. Such values cannot be folded into read-only data.
    pub fn contains_slice(&self) -> bool {
        match &self.kind {
            TyKind::Slice(_) => true,
            TyKind::Array(elem, _) => elem.contains_slice(),
            TyKind::Adt(def) => def.fields.iter().any(Ty::contains_slice),
            _ => false,
        }
    }

    /// Equality of two values is equality of their bytes. Aggregates are excluded
    /// since their padding bytes are unspecified.
    pub fn is_bitwise_comparable(&self) -> bool {
        match &self.kind {
            TyKind::Bool | TyKind::Int(_) | TyKind::Uint(_) | TyKind::Char(_) | TyKind::RawPtr(_) => {
                true
            }
            TyKind::Array(elem, _) => elem.is_bitwise_comparable(),
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TyKind::Void => write!(f, "void"),
            TyKind::Bool => write!(f, "bool"),
            TyKind::Int(int) => write!(f, "{}", format!("{:?}", int).to_lowercase()),
            TyKind::Uint(uint) => write!(f, "{}", format!("{:?}", uint).to_lowercase()),
            TyKind::Float(float) => write!(f, "{}", format!("{:?}", float).to_lowercase()),
            TyKind::Char(width) => write!(f, "{}", width),
            TyKind::RawPtr(pointee) => write!(f, "{}*", pointee),
            TyKind::Adt(def) => write!(f, "{}", def.name),
            TyKind::Array(elem, len) => write!(f, "{}[{}]", elem, len),
            TyKind::Slice(elem) => write!(f, "{}[]", elem),
            TyKind::Opaque(name) => write!(f, "opaque {}", name),
        }
    }
}
