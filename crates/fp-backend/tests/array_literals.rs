use std::cell::RefCell;
use std::rc::Rc;

use fp_backend::transforms::ArrayLowering;
use fp_core::config::ArrayConfig;
use fp_core::error::Error;
use fp_core::expr::{Expr, Lit};
use fp_core::lir::{LirConstant, LirType, LirValue};
use fp_core::types::Ty;
use fp_core::value::DValue;
use fp_lir_interpret::{LirInterpreter, Memory, Value};
use pretty_assertions::assert_eq;

mod support;

use support::assertions::{assert_i32_aggregate, count_stores};
use support::heap::{load_slice, read_i32_slice, read_units};
use support::types::{char16, char32, int, int_array, int_lit, probe, slice, str_lit};

fn i32_const(value: i64) -> LirConstant {
    LirConstant::Int(value, LirType::I32)
}

/// Registers `probe(x) = 10 * x` and returns the log of its arguments.
fn install_probe(interpreter: &mut LirInterpreter) -> Rc<RefCell<Vec<i64>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let calls = Rc::clone(&log);
    interpreter.register_host(
        "probe",
        Box::new(move |_: &mut Memory, args: &[Value]| -> eyre::Result<Value> {
            let arg = args[0].as_i64().unwrap_or_default();
            calls.borrow_mut().push(arg);
            Ok(Value::i32(arg as i32 * 10))
        }),
    );
    log
}

#[test]
fn static_literal_folds_to_its_elements() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let folded = lowering
        .array_literal_to_const(&int_array(&[1, 2, 3], Ty::array(int(), 3)))
        .expect("constant literal");
    assert_eq!(
        folded,
        LirConstant::Array(
            vec![i32_const(1), i32_const(2), i32_const(3)],
            LirType::Array(Box::new(LirType::I32), 3),
        )
    );
    assert!(lowering.globals().is_empty());
}

#[test]
fn dynamic_literal_folds_to_a_constant_global_slice() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let folded = lowering
        .array_literal_to_const(&int_array(&[4, 5], slice(int())))
        .expect("constant literal");

    let globals = lowering.globals();
    assert_eq!(globals.len(), 1);
    let data = &globals[0];
    assert!(data.is_constant);
    assert_eq!(
        data.initializer,
        Some(LirConstant::Array(
            vec![i32_const(4), i32_const(5)],
            LirType::Array(Box::new(LirType::I32), 2),
        ))
    );
    assert_eq!(
        folded,
        LirConstant::Struct(
            vec![
                LirConstant::UInt(2, LirType::I64),
                LirConstant::GlobalRef(data.name.clone(), LirType::ptr_to(LirType::I32), Vec::new()),
            ],
            LirType::slice_of(LirType::I32),
        )
    );
}

#[test]
fn empty_dynamic_literal_folds_to_the_null_slice() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let folded = lowering
        .array_literal_to_const(&Expr::array(Vec::new(), slice(int())))
        .expect("constant literal");
    assert_eq!(
        folded,
        LirConstant::Struct(
            vec![
                LirConstant::UInt(0, LirType::I64),
                LirConstant::Null(LirType::ptr_to(LirType::I32)),
            ],
            LirType::slice_of(LirType::I32),
        )
    );
    assert!(lowering.globals().is_empty());
}

#[test]
fn constant_dynamic_literals_read_back_as_their_elements() {
    let samples: [&[i64]; 4] = [&[], &[7], &[1, 2, 3], &[-5, 0, 5, 2147483647]];
    for sample in samples {
        let lowered = support::lower(&[], &slice(int()), |b, _| {
            let value = b.lower_array_literal(&int_array(sample, slice(int())), &slice(int()))?;
            Ok(Some(b.to_imm(&value)))
        });
        assert!(lowered.program.globals.is_empty());
        let mut interpreter = lowered.interpreter();
        let result = support::run(&mut interpreter, Vec::new()).expect("run");
        let expected: Vec<i32> = sample.iter().map(|value| *value as i32).collect();
        assert_eq!(read_i32_slice(&interpreter, &result), expected);
    }
}

#[test]
fn constant_dynamic_literal_storage_is_writable() {
    let lowered = support::lower(&[], &slice(int()), |b, _| {
        let array = b.lower_array_literal(&int_array(&[1, 2, 3], slice(int())), &slice(int()))?;
        b.set_assign(&array, &DValue::imm(int(), LirValue::i32(0)), None)?;
        Ok(Some(b.to_imm(&array)))
    });
    let function = lowered.program.function(support::ENTRY).expect("entry");
    assert_eq!(count_stores(function, &LirType::Array(Box::new(LirType::I32), 3)), 1);
    assert!(lowered.callees().contains(&"fp_array_alloc"));

    let mut interpreter = lowered.interpreter();
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_eq!(read_i32_slice(&interpreter, &result), vec![0, 0, 0]);
}

#[test]
fn nested_dynamic_literals_get_storage_of_their_own() {
    let rows = Expr::array(
        vec![int_array(&[1, 2], slice(int())), int_array(&[3], slice(int()))],
        slice(slice(int())),
    );
    let lowered = support::lower(&[], &slice(slice(int())), |b, _| {
        let value = b.lower_array_literal(&rows, &slice(slice(int())))?;
        Ok(Some(b.to_imm(&value)))
    });
    assert!(lowered.program.globals.is_empty());

    let mut interpreter = lowered.interpreter();
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    let inner = load_slice(&interpreter, &LirType::slice_of(LirType::I32), &result);
    let inner: Vec<Vec<i32>> = inner
        .iter()
        .map(|row| read_i32_slice(&interpreter, row))
        .collect();
    assert_eq!(inner, vec![vec![1, 2], vec![3]]);
}

#[test]
fn string_literal_operands_are_copied_into_writable_storage() {
    let lowered = support::lower(&[], &slice(char16()), |b, _| {
        let text = b.lower_operand(&str_lit("ab", slice(char16())))?;
        let z = LirValue::Constant(LirConstant::UInt(0x7A, LirType::I16));
        b.set_assign(&text, &DValue::imm(char16(), z), None)?;
        Ok(Some(b.to_imm(&text)))
    });
    assert!(lowered.program.globals.is_empty());
    let mut interpreter = lowered.interpreter();
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_eq!(read_units(&interpreter, &LirType::I16, &result), vec![0x7A, 0x7A]);
}

#[test]
fn repeat_literal_folds_once_per_slot() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let literal = Expr::repeat(int_lit(7), 3, Ty::array(int(), 3));
    let folded = lowering.array_literal_to_const(&literal).expect("constant literal");
    assert_eq!(
        folded,
        LirConstant::Array(
            vec![i32_const(7); 3],
            LirType::Array(Box::new(LirType::I32), 3),
        )
    );
}

#[test]
fn string_literals_fold_to_code_units_of_the_element_width() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let folded = lowering
        .array_literal_to_const(&str_lit("hé😀", Ty::array(char16(), 4)))
        .expect("constant literal");
    let units: Vec<u64> = match &folded {
        LirConstant::Array(units, _) => units.iter().filter_map(LirConstant::as_u64).collect(),
        other => panic!("expected an array constant, got {:?}", other),
    };
    assert_eq!(units, vec![0x68, 0xE9, 0xD83D, 0xDE00]);

    let lowered = support::lower(&[], &slice(char16()), |b, _| {
        let value = b.lower_array_literal(&str_lit("añ", slice(char16())), &slice(char16()))?;
        Ok(Some(b.to_imm(&value)))
    });
    let mut interpreter = lowered.interpreter();
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_eq!(read_units(&interpreter, &LirType::I16, &result), vec![0x61, 0xF1]);
}

#[test]
fn static_literal_of_the_wrong_length_is_rejected() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let err = lowering
        .array_literal_to_const(&int_array(&[1, 2], Ty::array(int(), 3)))
        .unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { dst_len: 3, src_len: 2, .. }));
    let (diagnostics, has_errors) = lowering.take_diagnostics();
    assert!(has_errors);
    assert_eq!(diagnostics[0].code.as_deref(), Some("E-ARRAY-LEN"));
}

#[test]
fn surrogate_code_points_do_not_fold() {
    let mut lowering = ArrayLowering::with_config(ArrayConfig::default());
    let literal = Expr::array(
        vec![Expr::literal(Lit::Char(0x41), char32()), Expr::literal(Lit::Char(0xD800), char32())],
        slice(char32()),
    );
    let err = lowering.array_literal_to_const(&literal).unwrap_err();
    assert!(matches!(err, Error::InvalidCodePoint { code_point: 0xD800, .. }));
}

#[test]
fn runtime_elements_are_stored_in_source_order() {
    let literal = Expr::array(vec![probe(1), int_lit(2), probe(3)], Ty::array(int(), 3));
    let lowered = support::lower(&[], &Ty::array(int(), 3), |b, _| {
        let value = b.lower_array_literal(&literal, &Ty::array(int(), 3))?;
        Ok(Some(b.to_imm(&value)))
    });
    let mut interpreter = lowered.interpreter();
    let log = install_probe(&mut interpreter);
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_i32_aggregate(&result, &[10, 2, 30]);
    assert_eq!(*log.borrow(), vec![1, 3]);
}

#[test]
fn repeat_literal_evaluates_its_value_once() {
    let literal = Expr::repeat(probe(4), 3, Ty::array(int(), 3));
    let lowered = support::lower(&[], &Ty::array(int(), 3), |b, _| {
        let value = b.lower_array_literal(&literal, &Ty::array(int(), 3))?;
        Ok(Some(b.to_imm(&value)))
    });
    let mut interpreter = lowered.interpreter();
    let log = install_probe(&mut interpreter);
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_i32_aggregate(&result, &[40, 40, 40]);
    assert_eq!(*log.borrow(), vec![4]);
}

#[test]
fn nested_static_literals_fill_their_subregions() {
    let row = Ty::array(int(), 2);
    let grid = Ty::array(row.clone(), 2);
    let literal = Expr::array(
        vec![
            Expr::array(vec![int_lit(1), probe(2)], row.clone()),
            int_array(&[3, 4], row.clone()),
        ],
        grid.clone(),
    );
    let lowered = support::lower(&[], &grid, |b, _| {
        let value = b.lower_array_literal(&literal, &grid)?;
        Ok(Some(b.to_imm(&value)))
    });
    let mut interpreter = lowered.interpreter();
    install_probe(&mut interpreter);
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    let rows = result.fields().expect("outer aggregate");
    assert_i32_aggregate(&rows[0], &[1, 20]);
    assert_i32_aggregate(&rows[1], &[3, 4]);
}

#[test]
fn dynamic_literal_with_runtime_elements_gets_fresh_storage() {
    let literal = Expr::array(vec![probe(5), int_lit(6)], slice(int()));
    let lowered = support::lower(&[], &slice(int()), |b, _| {
        let value = b.lower_array_literal(&literal, &slice(int()))?;
        Ok(Some(b.to_imm(&value)))
    });
    assert!(lowered.program.globals.is_empty());
    assert!(lowered.callees().contains(&"fp_array_alloc"));
    let mut interpreter = lowered.interpreter();
    install_probe(&mut interpreter);
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_eq!(read_i32_slice(&interpreter, &result), vec![50, 6]);
}

#[test]
fn constant_static_literal_is_one_bulk_store() {
    let ty = Ty::array(int(), 3);
    let lowered = support::lower(&[], &ty, |b, _| {
        let value = b.lower_array_literal(&int_array(&[1, 2, 3], ty.clone()), &ty)?;
        Ok(Some(b.to_imm(&value)))
    });
    let function = lowered.program.function(support::ENTRY).expect("entry");
    assert_eq!(count_stores(function, &LirType::Array(Box::new(LirType::I32), 3)), 1);
    assert_eq!(count_stores(function, &LirType::I32), 0);
    assert!(lowered.callees().is_empty());
}

#[test]
fn disabled_folding_stores_elements_individually() {
    let config = ArrayConfig {
        fold_constants: false,
        ..ArrayConfig::default()
    };
    let lowered = support::lower_with(config, &[], &slice(int()), |b, _| {
        let value = b.lower_array_literal(&int_array(&[1, 2, 3], slice(int())), &slice(int()))?;
        Ok(Some(b.to_imm(&value)))
    });
    assert!(lowered.program.globals.is_empty());
    let function = lowered.program.function(support::ENTRY).expect("entry");
    assert_eq!(count_stores(function, &LirType::I32), 3);

    let mut interpreter = lowered.interpreter();
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_eq!(read_i32_slice(&interpreter, &result), vec![1, 2, 3]);
}

#[test]
fn value_literal_copies_into_static_storage() {
    let ty = Ty::array(int(), 2);
    let lowered = support::lower(&[slice(int())], &ty, |b, args| {
        let slot = b.func().alloca(&LirType::Array(Box::new(LirType::I32), 2));
        b.initialize_array_literal(&Expr::value(args[0].clone()), slot.clone())?;
        Ok(Some(b.func().load(LirType::Array(Box::new(LirType::I32), 2), slot)))
    });
    let mut interpreter = lowered.interpreter();
    let source = support::heap::i32_slice(&mut interpreter, &[8, 9]);
    let result = support::run(&mut interpreter, vec![source]).expect("run");
    assert_i32_aggregate(&result, &[8, 9]);
}
