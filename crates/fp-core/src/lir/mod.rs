pub mod builder;
pub mod ident;
pub mod layout;
pub mod pretty;
pub mod ty;

use crate::span::Span;

pub use builder::FunctionBuilder;
pub use ident::Name;
pub use ty::Ty;
pub type LirType = Ty;
pub type LirId = u32;
pub type RegisterId = u32;
pub type BasicBlockId = u32;

/// Entry points of the runtime-support interface that lowered code calls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeSymbol {
    ArrayAlloc,
    ArrayRealloc,
    Memcpy,
    Memmove,
    Memcmp,
    ArrayBoundsFail,
    ArrayLengthMismatch,
    ArrayCastFail,
    InvalidCodePoint,
}

impl RuntimeSymbol {
    pub const ALL: [RuntimeSymbol; 9] = [
        RuntimeSymbol::ArrayAlloc,
        RuntimeSymbol::ArrayRealloc,
        RuntimeSymbol::Memcpy,
        RuntimeSymbol::Memmove,
        RuntimeSymbol::Memcmp,
        RuntimeSymbol::ArrayBoundsFail,
        RuntimeSymbol::ArrayLengthMismatch,
        RuntimeSymbol::ArrayCastFail,
        RuntimeSymbol::InvalidCodePoint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeSymbol::ArrayAlloc => "fp_array_alloc",
            RuntimeSymbol::ArrayRealloc => "fp_array_realloc",
            RuntimeSymbol::Memcpy => "memcpy",
            RuntimeSymbol::Memmove => "memmove",
            RuntimeSymbol::Memcmp => "memcmp",
            RuntimeSymbol::ArrayBoundsFail => "fp_array_bounds_fail",
            RuntimeSymbol::ArrayLengthMismatch => "fp_array_length_mismatch",
            RuntimeSymbol::ArrayCastFail => "fp_array_cast_fail",
            RuntimeSymbol::InvalidCodePoint => "fp_invalid_code_point",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|symbol| symbol.as_str() == name)
    }

    /// Failure hooks never return; the caller terminates the block with `unreachable`.
    pub fn is_noreturn(self) -> bool {
        matches!(
            self,
            RuntimeSymbol::ArrayBoundsFail
                | RuntimeSymbol::ArrayLengthMismatch
                | RuntimeSymbol::ArrayCastFail
                | RuntimeSymbol::InvalidCodePoint
        )
    }

    pub fn return_type(self) -> LirType {
        match self {
            RuntimeSymbol::ArrayAlloc | RuntimeSymbol::ArrayRealloc => LirType::byte_ptr(),
            RuntimeSymbol::Memcmp => LirType::I32,
            _ => LirType::Void,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LirProgram {
    pub functions: Vec<LirFunction>,
    pub globals: Vec<LirGlobal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirFunction {
    pub name: Name,
    pub signature: LirFunctionSignature,
    pub basic_blocks: Vec<LirBasicBlock>,
    pub linkage: Linkage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirFunctionSignature {
    pub params: Vec<LirType>,
    pub return_type: LirType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirBasicBlock {
    pub id: BasicBlockId,
    pub label: Option<Name>,
    pub instructions: Vec<LirInstruction>,
    pub terminator: LirTerminator,
    pub predecessors: Vec<BasicBlockId>,
    pub successors: Vec<BasicBlockId>,
}

/// One instruction. `type_hint` is the result type; for `Store` it is the type
/// of the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct LirInstruction {
    pub id: LirId,
    pub kind: LirInstructionKind,
    pub type_hint: Option<LirType>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirInstructionKind {
    // Arithmetic operations
    Add(LirValue, LirValue),
    Sub(LirValue, LirValue),
    Mul(LirValue, LirValue),
    Div(LirValue, LirValue),
    Rem(LirValue, LirValue),
    UDiv(LirValue, LirValue),
    URem(LirValue, LirValue),

    // Bitwise operations
    And(LirValue, LirValue),
    Or(LirValue, LirValue),
    Xor(LirValue, LirValue),
    Shl(LirValue, LirValue),
    Shr(LirValue, LirValue),
    LShr(LirValue, LirValue),

    // Comparison operations; the plain forms are signed for integers
    Eq(LirValue, LirValue),
    Ne(LirValue, LirValue),
    Lt(LirValue, LirValue),
    Le(LirValue, LirValue),
    Gt(LirValue, LirValue),
    Ge(LirValue, LirValue),
    ULt(LirValue, LirValue),
    ULe(LirValue, LirValue),
    UGt(LirValue, LirValue),
    UGe(LirValue, LirValue),

    // Memory operations
    Load {
        address: LirValue,
        alignment: Option<u32>,
        volatile: bool,
    },
    Store {
        value: LirValue,
        address: LirValue,
        alignment: Option<u32>,
        volatile: bool,
    },
    Alloca {
        size: LirValue,
        alignment: u32,
    },

    // Pointer operations
    GetElementPtr {
        ptr: LirValue,
        elem_ty: LirType,
        indices: Vec<LirValue>,
        inbounds: bool,
    },
    PtrToInt(LirValue),
    IntToPtr(LirValue),

    // Type conversion operations
    Trunc(LirValue, LirType),
    ZExt(LirValue, LirType),
    SExt(LirValue, LirType),
    Bitcast(LirValue, LirType),

    // Aggregate operations
    ExtractValue {
        aggregate: LirValue,
        indices: Vec<u32>,
    },
    InsertValue {
        aggregate: LirValue,
        element: LirValue,
        indices: Vec<u32>,
    },

    // Function operations
    Call {
        function: LirValue,
        args: Vec<LirValue>,
        calling_convention: CallingConvention,
        tail_call: bool,
    },

    Select {
        condition: LirValue,
        if_true: LirValue,
        if_false: LirValue,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirTerminator {
    Return(Option<LirValue>),
    Br(BasicBlockId),
    CondBr {
        condition: LirValue,
        if_true: BasicBlockId,
        if_false: BasicBlockId,
    },
    Switch {
        value: LirValue,
        default: BasicBlockId,
        cases: Vec<(u64, BasicBlockId)>,
    },
    Unreachable,
}

impl LirTerminator {
    pub fn successors(&self) -> Vec<BasicBlockId> {
        match self {
            LirTerminator::Return(_) | LirTerminator::Unreachable => Vec::new(),
            LirTerminator::Br(target) => vec![*target],
            LirTerminator::CondBr {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            LirTerminator::Switch { default, cases, .. } => {
                let mut targets = vec![*default];
                targets.extend(cases.iter().map(|(_, target)| *target));
                targets
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirValue {
    // Registers/SSA values
    Register(RegisterId),

    // Constants
    Constant(LirConstant),

    // Global references
    Global(String, Ty),

    // Function references
    Function(String),

    // Null pointer
    Null(LirType),

    // Undefined value
    Undef(LirType),
}

impl LirValue {
    pub fn i64(value: u64) -> Self {
        LirValue::Constant(LirConstant::UInt(value, LirType::I64))
    }

    pub fn i32(value: i32) -> Self {
        LirValue::Constant(LirConstant::Int(value as i64, LirType::I32))
    }

    pub fn bool(value: bool) -> Self {
        LirValue::Constant(LirConstant::Bool(value))
    }

    /// The unsigned value of an integer constant, if this is one.
    pub fn as_const_u64(&self) -> Option<u64> {
        match self {
            LirValue::Constant(constant) => constant.as_u64(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirConstant {
    Int(i64, LirType),
    UInt(u64, LirType),
    Float(f64, LirType),
    Bool(bool),
    Array(Vec<LirConstant>, LirType),
    Struct(Vec<LirConstant>, LirType),
    GlobalRef(Name, LirType, Vec<u64>),
    Null(LirType),
    Zeroed(LirType),
    Undef(LirType),
}

impl LirConstant {
    pub fn ty(&self) -> LirType {
        match self {
            LirConstant::Int(_, ty)
            | LirConstant::UInt(_, ty)
            | LirConstant::Float(_, ty)
            | LirConstant::Array(_, ty)
            | LirConstant::Struct(_, ty)
            | LirConstant::GlobalRef(_, ty, _)
            | LirConstant::Null(ty)
            | LirConstant::Zeroed(ty)
            | LirConstant::Undef(ty) => ty.clone(),
            LirConstant::Bool(_) => LirType::I1,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            LirConstant::Int(value, _) => u64::try_from(*value).ok(),
            LirConstant::UInt(value, _) => Some(*value),
            LirConstant::Bool(value) => Some(*value as u64),
            _ => None,
        }
    }

    /// Whether every byte of this constant's representation is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            LirConstant::Int(value, _) => *value == 0,
            LirConstant::UInt(value, _) => *value == 0,
            LirConstant::Float(value, _) => value.to_bits() == 0,
            LirConstant::Bool(value) => !*value,
            LirConstant::Array(elements, _) | LirConstant::Struct(elements, _) => {
                elements.iter().all(LirConstant::is_zero)
            }
            LirConstant::Null(_) | LirConstant::Zeroed(_) => true,
            LirConstant::GlobalRef(..) | LirConstant::Undef(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirGlobal {
    pub name: Name,
    pub ty: LirType,
    pub initializer: Option<LirConstant>,
    pub linkage: Linkage,
    pub is_constant: bool,
    pub alignment: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingConvention {
    #[default]
    C,
    Fast,
    Cold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Private,
}

// Implementation helpers
impl LirProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, name: &str) -> Option<&LirFunction> {
        self.functions.iter().find(|func| func.name.as_str() == name)
    }
}

impl LirFunction {
    pub fn get_basic_block(&self, id: BasicBlockId) -> Option<&LirBasicBlock> {
        self.basic_blocks.iter().find(|bb| bb.id == id)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &LirInstruction> {
        self.basic_blocks
            .iter()
            .flat_map(|block| block.instructions.iter())
    }

    /// Names of every function called directly from this body, in emission order.
    pub fn callees(&self) -> Vec<&str> {
        self.instructions()
            .filter_map(|instr| match &instr.kind {
                LirInstructionKind::Call {
                    function: LirValue::Function(name),
                    ..
                } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl LirBasicBlock {
    pub fn new(id: BasicBlockId, label: Option<Name>) -> Self {
        Self {
            id,
            label,
            instructions: Vec::new(),
            terminator: LirTerminator::Unreachable,
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }
}

impl LirInstruction {
    pub fn new(id: LirId, kind: LirInstructionKind) -> Self {
        Self {
            id,
            kind,
            type_hint: None,
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl LirType {
    pub fn is_float(&self) -> bool {
        matches!(self, LirType::F32 | LirType::F64)
    }
}
