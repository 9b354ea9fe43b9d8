#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr(Box<Ty>),
    Array(Box<Ty>, u64),
    Struct {
        fields: Vec<Ty>,
        packed: bool,
        name: Option<String>,
    },
    Void,
}

impl Ty {
    pub fn ptr_to(pointee: Ty) -> Ty {
        Ty::Ptr(Box::new(pointee))
    }

    /// Pointer to bytes, the type of raw storage handed out by the runtime.
    pub fn byte_ptr() -> Ty {
        Ty::Ptr(Box::new(Ty::I8))
    }

    /// The `{ i64, T* }` pair a dynamic array lowers to.
    pub fn slice_of(elem: Ty) -> Ty {
        Ty::Struct {
            fields: vec![Ty::I64, Ty::ptr_to(elem)],
            packed: false,
            name: None,
        }
    }

    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Ty::I1 => Some(1),
            Ty::I8 => Some(8),
            Ty::I16 => Some(16),
            Ty::I32 => Some(32),
            Ty::I64 => Some(64),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&Ty> {
        match self {
            Ty::Ptr(inner) => Some(inner),
            _ => None,
        }
    }
}
