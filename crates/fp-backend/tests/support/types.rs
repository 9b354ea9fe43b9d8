use fp_core::expr::{Expr, Lit};
use fp_core::span::Span;
use fp_core::types::{AdtDef, CharTy, CopyHooks, FloatTy, IntTy, Ty, UintTy};
use fp_core::value::DValue;

pub fn int() -> Ty {
    Ty::int(IntTy::I32)
}

pub fn uint() -> Ty {
    Ty::uint(UintTy::U32)
}

pub fn usize() -> Ty {
    Ty::uint(UintTy::Usize)
}

pub fn byte() -> Ty {
    Ty::uint(UintTy::U8)
}

pub fn double() -> Ty {
    Ty::float(FloatTy::F64)
}

pub fn char8() -> Ty {
    Ty::char(CharTy::Utf8)
}

pub fn char16() -> Ty {
    Ty::char(CharTy::Utf16)
}

pub fn char32() -> Ty {
    Ty::char(CharTy::Utf32)
}

pub fn slice(elem: Ty) -> Ty {
    Ty::slice(elem)
}

/// `struct Counted { int value; }` whose copies run `Counted_postblit`.
pub fn counted() -> Ty {
    Ty::adt(AdtDef {
        name: "Counted".into(),
        fields: vec![int()],
        hooks: CopyHooks {
            postblit: Some("Counted_postblit".into()),
            ..CopyHooks::default()
        },
    })
}

/// `struct Key { int value; }` compared through `Key_eq` / `Key_cmp`.
pub fn key() -> Ty {
    Ty::adt(AdtDef {
        name: "Key".into(),
        fields: vec![int()],
        hooks: CopyHooks {
            eq: Some("Key_eq".into()),
            cmp: Some("Key_cmp".into()),
            ..CopyHooks::default()
        },
    })
}

/// `struct Padded { ubyte tag; int value; }` with three padding bytes.
pub fn padded() -> Ty {
    Ty::adt(AdtDef {
        name: "Padded".into(),
        fields: vec![byte(), int()],
        hooks: CopyHooks::default(),
    })
}

pub fn int_lit(value: i64) -> Expr {
    Expr::int(value, int())
}

/// `[v0, v1, ...]` of type `ty`.
pub fn int_array(values: &[i64], ty: Ty) -> Expr {
    Expr::array(values.iter().map(|value| int_lit(*value)).collect(), ty)
}

pub fn str_lit(text: &str, ty: Ty) -> Expr {
    Expr::literal(Lit::Str(text.into()), ty)
}

pub fn char_lit(code_point: u32) -> Expr {
    Expr::literal(Lit::Char(code_point), char32())
}

/// Call of the host function `probe(arg) -> int`.
pub fn probe(arg: i64) -> Expr {
    Expr::call("probe", vec![int_lit(arg)], int())
}

pub fn value(value: &DValue) -> Expr {
    Expr::value(value.clone())
}

pub fn span() -> Span {
    Span::new(3, 120, 131)
}
