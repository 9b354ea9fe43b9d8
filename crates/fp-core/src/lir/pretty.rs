use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use super::ty::Ty;
use super::{
    LirBasicBlock, LirConstant, LirFunction, LirGlobal, LirInstruction, LirInstructionKind,
    LirProgram, LirTerminator, LirValue, Linkage,
};

const INDENT: usize = 4;

/// Line-oriented writer for LIR listings.
pub struct LirPrinter<'f, 'a> {
    out: &'f mut Formatter<'a>,
    depth: usize,
    /// Append ` : ty` to instructions that carry a type hint.
    pub show_types: bool,
}

impl<'f, 'a> LirPrinter<'f, 'a> {
    pub fn new(out: &'f mut Formatter<'a>) -> Self {
        Self {
            out,
            depth: 0,
            show_types: true,
        }
    }

    fn line(&mut self, text: impl AsRef<str>) -> fmt::Result {
        writeln!(self.out, "{:pad$}{}", "", text.as_ref(), pad = self.depth * INDENT)
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    pub fn program(&mut self, program: &LirProgram) -> fmt::Result {
        self.line("lir::Program {")?;
        self.nested(|p| {
            if !program.globals.is_empty() {
                p.line("globals:")?;
                p.nested(|p| program.globals.iter().try_for_each(|global| p.global(global)))?;
            }
            if !program.functions.is_empty() {
                p.line("functions:")?;
                p.nested(|p| {
                    for (idx, func) in program.functions.iter().enumerate() {
                        if idx > 0 {
                            writeln!(p.out)?;
                        }
                        p.function(func)?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        self.line("}")
    }

    pub fn function(&mut self, func: &LirFunction) -> fmt::Result {
        let params = func
            .signature
            .params
            .iter()
            .enumerate()
            .map(|(idx, ty)| format!("%r{}: {}", idx, format_type(ty)))
            .join(", ");
        self.line(format!(
            "fn {}({}) -> {} [linkage: {}] {{",
            func.name,
            params,
            format_type(&func.signature.return_type),
            format_linkage(func.linkage)
        ))?;
        self.nested(|p| func.basic_blocks.iter().try_for_each(|block| p.block(block)))?;
        self.line("}")
    }

    fn global(&mut self, global: &LirGlobal) -> fmt::Result {
        let mut text = format!(
            "@{}: {} [linkage: {}]",
            global.name,
            format_type(&global.ty),
            format_linkage(global.linkage)
        );
        if global.is_constant {
            text.push_str(" const");
        }
        if let Some(align) = global.alignment {
            text.push_str(&format!(" align {}", align));
        }
        if let Some(initializer) = &global.initializer {
            text.push_str(" = ");
            text.push_str(&format_constant(initializer));
        }
        self.line(text)
    }

    fn block(&mut self, block: &LirBasicBlock) -> fmt::Result {
        let mut header = format!("bb{}", block.id);
        if let Some(label) = &block.label {
            header.push_str(&format!(" // label: {}", label));
        }
        if !block.predecessors.is_empty() {
            let preds = block.predecessors.iter().map(|id| format!("bb{}", id)).join(", ");
            header.push_str(&format!(" // preds: [{}]", preds));
        }
        self.line(header + ":")?;
        let show_types = self.show_types;
        self.nested(|p| {
            for inst in &block.instructions {
                let mut text = summarize_instruction(inst);
                if let (true, Some(ty)) = (show_types, &inst.type_hint) {
                    text.push_str(&format!(" : {}", format_type(ty)));
                }
                p.line(text)?;
            }
            p.line(summarize_terminator(&block.terminator))
        })
    }
}

impl Display for LirProgram {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        LirPrinter::new(f).program(self)
    }
}

impl Display for LirFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        LirPrinter::new(f).function(self)
    }
}

fn binary_mnemonic(kind: &LirInstructionKind) -> Option<(&'static str, &LirValue, &LirValue)> {
    use LirInstructionKind::*;

    let (name, lhs, rhs) = match kind {
        Add(l, r) => ("add", l, r),
        Sub(l, r) => ("sub", l, r),
        Mul(l, r) => ("mul", l, r),
        Div(l, r) => ("div", l, r),
        Rem(l, r) => ("rem", l, r),
        UDiv(l, r) => ("udiv", l, r),
        URem(l, r) => ("urem", l, r),
        And(l, r) => ("and", l, r),
        Or(l, r) => ("or", l, r),
        Xor(l, r) => ("xor", l, r),
        Shl(l, r) => ("shl", l, r),
        Shr(l, r) => ("ashr", l, r),
        LShr(l, r) => ("lshr", l, r),
        Eq(l, r) => ("eq", l, r),
        Ne(l, r) => ("ne", l, r),
        Lt(l, r) => ("lt", l, r),
        Le(l, r) => ("le", l, r),
        Gt(l, r) => ("gt", l, r),
        Ge(l, r) => ("ge", l, r),
        ULt(l, r) => ("ult", l, r),
        ULe(l, r) => ("ule", l, r),
        UGt(l, r) => ("ugt", l, r),
        UGe(l, r) => ("uge", l, r),
        _ => return None,
    };
    Some((name, lhs, rhs))
}

pub fn summarize_instruction(inst: &LirInstruction) -> String {
    use LirInstructionKind::*;

    let id = inst.id;
    if let Some((name, lhs, rhs)) = binary_mnemonic(&inst.kind) {
        return format!("%r{id} = {name} {}, {}", format_value(lhs), format_value(rhs));
    }
    match &inst.kind {
        Load { address, .. } => format!("%r{id} = load {}", format_value(address)),
        Store { value, address, .. } => {
            format!("store {}, {}", format_value(value), format_value(address))
        }
        Alloca { size, alignment } => {
            format!("%r{id} = alloca {} align {}", format_value(size), alignment)
        }
        GetElementPtr {
            ptr,
            elem_ty,
            indices,
            ..
        } => format!(
            "%r{id} = gep {}, {} [{}]",
            format_type(elem_ty),
            format_value(ptr),
            indices.iter().map(format_value).join(", ")
        ),
        PtrToInt(value) => format!("%r{id} = ptrtoint {}", format_value(value)),
        IntToPtr(value) => format!("%r{id} = inttoptr {}", format_value(value)),
        Trunc(value, ty) => format!("%r{id} = trunc {} to {}", format_value(value), format_type(ty)),
        ZExt(value, ty) => format!("%r{id} = zext {} to {}", format_value(value), format_type(ty)),
        SExt(value, ty) => format!("%r{id} = sext {} to {}", format_value(value), format_type(ty)),
        Bitcast(value, ty) => {
            format!("%r{id} = bitcast {} to {}", format_value(value), format_type(ty))
        }
        ExtractValue { aggregate, indices } => format!(
            "%r{id} = extractvalue {}, {}",
            format_value(aggregate),
            indices.iter().join(", ")
        ),
        InsertValue {
            aggregate,
            element,
            indices,
        } => format!(
            "%r{id} = insertvalue {}, {}, {}",
            format_value(aggregate),
            format_value(element),
            indices.iter().join(", ")
        ),
        Call { function, args, .. } => format!(
            "%r{id} = call {}({})",
            format_value(function),
            args.iter().map(format_value).join(", ")
        ),
        Select {
            condition,
            if_true,
            if_false,
        } => format!(
            "%r{id} = select {}, {}, {}",
            format_value(condition),
            format_value(if_true),
            format_value(if_false)
        ),
        other => unreachable!("binary instruction {:?} handled above", other),
    }
}

fn summarize_terminator(term: &LirTerminator) -> String {
    match term {
        LirTerminator::Return(None) => "ret void".to_string(),
        LirTerminator::Return(Some(value)) => format!("ret {}", format_value(value)),
        LirTerminator::Br(target) => format!("br bb{}", target),
        LirTerminator::CondBr {
            condition,
            if_true,
            if_false,
        } => format!(
            "br {}, bb{}, bb{}",
            format_value(condition),
            if_true,
            if_false
        ),
        LirTerminator::Switch {
            value,
            default,
            cases,
        } => format!(
            "switch {}, default bb{} [{}]",
            format_value(value),
            default,
            cases
                .iter()
                .map(|(case, target)| format!("{} => bb{}", case, target))
                .join(", ")
        ),
        LirTerminator::Unreachable => "unreachable".to_string(),
    }
}

pub fn format_value(value: &LirValue) -> String {
    match value {
        LirValue::Register(id) => format!("%r{}", id),
        LirValue::Constant(constant) => format_constant(constant),
        LirValue::Global(name, _) | LirValue::Function(name) => format!("@{}", name),
        LirValue::Null(ty) => format!("null {}", format_type(ty)),
        LirValue::Undef(ty) => format!("undef {}", format_type(ty)),
    }
}

pub fn format_constant(constant: &LirConstant) -> String {
    match constant {
        LirConstant::Int(value, ty) => format!("{} {}", format_type(ty), value),
        LirConstant::UInt(value, ty) => format!("{} {}", format_type(ty), value),
        LirConstant::Float(value, ty) => format!("{} {}", format_type(ty), value),
        LirConstant::Bool(value) => format!("i1 {}", value),
        LirConstant::Array(elements, ty) => format!(
            "{} [{}]",
            format_type(ty),
            elements.iter().map(format_constant).join(", ")
        ),
        LirConstant::Struct(fields, ty) => format!(
            "{} {{ {} }}",
            format_type(ty),
            fields.iter().map(format_constant).join(", ")
        ),
        LirConstant::GlobalRef(name, _, indices) if indices.is_empty() => format!("@{}", name),
        LirConstant::GlobalRef(name, _, indices) => {
            format!("@{} [{}]", name, indices.iter().join(", "))
        }
        LirConstant::Null(ty) => format!("null {}", format_type(ty)),
        LirConstant::Zeroed(ty) => format!("zeroinitializer {}", format_type(ty)),
        LirConstant::Undef(ty) => format!("undef {}", format_type(ty)),
    }
}

pub fn format_type(ty: &Ty) -> String {
    match ty {
        Ty::I1 => "i1".into(),
        Ty::I8 => "i8".into(),
        Ty::I16 => "i16".into(),
        Ty::I32 => "i32".into(),
        Ty::I64 => "i64".into(),
        Ty::F32 => "f32".into(),
        Ty::F64 => "f64".into(),
        Ty::Void => "void".into(),
        Ty::Ptr(inner) => format!("ptr {}", format_type(inner)),
        Ty::Array(inner, count) => format!("[{} x {}]", count, format_type(inner)),
        Ty::Struct {
            fields,
            packed,
            name,
        } => {
            let body = fields.iter().map(format_type).join(", ");
            let body = if *packed {
                format!("<{{ {} }}>", body)
            } else {
                format!("{{ {} }}", body)
            };
            match name {
                Some(name) => format!("%{} = {}", name, body),
                None => body,
            }
        }
    }
}

fn format_linkage(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::External => "external",
        Linkage::Internal => "internal",
        Linkage::Private => "private",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::lir::{FunctionBuilder, LirType};

    #[test]
    fn prints_function_with_types() {
        let mut builder = FunctionBuilder::new("len_plus_one", vec![LirType::I64], LirType::I64);
        let sum = builder.emit(
            LirInstructionKind::Add(builder.param(0), LirValue::i64(1)),
            LirType::I64,
        );
        builder.ret(Some(sum));
        let function = builder.finish();

        let text = function.to_string();
        assert_eq!(
            text,
            "fn len_plus_one(%r0: i64) -> i64 [linkage: external] {\n    \
             bb0 // label: entry:\n        \
             %r1 = add %r0, i64 1 : i64\n        \
             ret %r1\n\
             }\n"
        );
    }

    #[test]
    fn formats_slice_constant() {
        let slice_ty = LirType::slice_of(LirType::I32);
        let constant = LirConstant::Struct(
            vec![
                LirConstant::UInt(3, LirType::I64),
                LirConstant::GlobalRef("arr.0".into(), LirType::ptr_to(LirType::I32), vec![]),
            ],
            slice_ty,
        );
        assert_eq!(
            format_constant(&constant),
            "{ i64, ptr i32 } { i64 3, @arr.0 }"
        );
    }
}
