//! Expressions handed to the array passes by the expression lowering layer.
//!
//! The layout of a literal (explicit list, repeated value, sparse initializer)
//! is decided by the type checker and preserved here as-is.

use crate::span::Span;
use crate::types::Ty;
use crate::value::DValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A code point; encoded according to the target character width.
    Char(u32),
    Str(String),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Lit),
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `[v; len]`: one value repeated `len` times.
    ArrayRepeat { elem: Box<Expr>, len: u64 },
    /// Field initializers in declaration order.
    Struct(Vec<Expr>),
    /// A value the caller already lowered.
    Value(DValue),
    /// A call evaluated at run time; the only expressions with side effects.
    Call { callee: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Ty,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Ty, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn literal(lit: Lit, ty: Ty) -> Self {
        Expr::new(ExprKind::Literal(lit), ty, Span::DUMMY)
    }

    pub fn int(value: i64, ty: Ty) -> Self {
        Expr::literal(Lit::Int(value), ty)
    }

    pub fn array(elements: Vec<Expr>, ty: Ty) -> Self {
        Expr::new(ExprKind::Array(elements), ty, Span::DUMMY)
    }

    pub fn repeat(elem: Expr, len: u64, ty: Ty) -> Self {
        Expr::new(
            ExprKind::ArrayRepeat {
                elem: Box::new(elem),
                len,
            },
            ty,
            Span::DUMMY,
        )
    }

    pub fn value(value: DValue) -> Self {
        let ty = value.ty.clone();
        Expr::new(ExprKind::Value(value), ty, Span::DUMMY)
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>, ty: Ty) -> Self {
        Expr::new(
            ExprKind::Call {
                callee: callee.into(),
                args,
            },
            ty,
            Span::DUMMY,
        )
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Number of elements an array-literal expression produces.
    pub fn literal_len(&self) -> Option<u64> {
        match &self.kind {
            ExprKind::Array(elements) => Some(elements.len() as u64),
            ExprKind::ArrayRepeat { len, .. } => Some(*len),
            _ => None,
        }
    }
}

/// Sparse initializer for a static array: `[1: a, b, 4: c]`.
///
/// An entry without an index fills the slot after the previous entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInitializer {
    pub ty: Ty,
    pub entries: Vec<(Option<u64>, Expr)>,
    pub span: Span,
}
