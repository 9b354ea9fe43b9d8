use fp_backend::transforms::{AssignOp, EqOp};
use fp_core::error::Error;
use fp_core::lir::{LirConstant, LirType, LirValue};
use fp_core::types::Ty;
use fp_core::value::DValue;
use fp_lir_interpret::{Memory, Trap, Value};
use pretty_assertions::assert_eq;

mod support;

use support::assertions::{assert_bool, assert_i32_aggregate};
use support::heap::{f64_slice, i32_slice, read_i32_slice, read_units, store_slice};
use support::types::{counted, double, int, int_array, slice, span, uint};

fn int_slices() -> [Ty; 2] {
    [slice(int()), slice(int())]
}

#[test]
fn three_elements_into_four_is_a_compile_time_mismatch() {
    let lowered = support::lower(&[], &Ty::void(), |b, _| {
        let dst_ty = Ty::array(int(), 4);
        let slot = b.func().alloca(&LirType::Array(Box::new(LirType::I32), 4));
        let dst = DValue::lval(dst_ty, slot);
        let src = b.lower_array_literal(&int_array(&[1, 2, 3], Ty::array(int(), 3)), &Ty::array(int(), 3))?;
        b.assign(&src, &dst, None)?;
        Ok(None)
    });
    assert!(matches!(
        lowered.error(),
        Error::LengthMismatch { dst_len: 4, src_len: 3, .. }
    ));
    assert_eq!(lowered.diagnostics[0].code.as_deref(), Some("E-ARRAY-LEN"));
}

#[test]
fn static_arrays_copy_by_value() {
    let ty = Ty::array(int(), 3);
    let lowered = support::lower(&[], &ty, |b, _| {
        let slot = b.func().alloca(&LirType::Array(Box::new(LirType::I32), 3));
        let dst = DValue::lval(ty.clone(), slot);
        let src = b.lower_array_literal(&int_array(&[4, 5, 6], ty.clone()), &ty)?;
        b.assign(&src, &dst, None)?;
        Ok(Some(b.to_imm(&dst)))
    });
    assert!(lowered.callees().contains(&"memmove"));
    let mut interpreter = lowered.interpreter();
    let result = support::run(&mut interpreter, Vec::new()).expect("run");
    assert_i32_aggregate(&result, &[4, 5, 6]);
}

#[test]
fn assigning_to_a_static_rvalue_is_rejected() {
    let ty = Ty::array(int(), 2);
    let lowered = support::lower(&[], &Ty::void(), |b, _| {
        let folded = LirConstant::Array(
            vec![LirConstant::Int(0, LirType::I32); 2],
            LirType::Array(Box::new(LirType::I32), 2),
        );
        let dst = DValue::imm(ty.clone(), LirValue::Constant(folded));
        let src = b.lower_array_literal(&int_array(&[1, 2], ty.clone()), &ty)?;
        b.assign(&src, &dst, None)?;
        Ok(None)
    });
    assert!(matches!(lowered.error(), Error::Lowering { .. }));
}

#[test]
fn equal_length_copies_compare_equal() {
    let lowered = support::lower(&int_slices(), &Ty::bool(), |b, args| {
        b.assign(&args[1], &args[0], None)?;
        let equal = b.array_equals(EqOp::Eq, &args[0], &args[1])?;
        Ok(Some(equal))
    });
    let mut interpreter = lowered.interpreter();
    let dst = i32_slice(&mut interpreter, &[0, 0, 0]);
    let src = i32_slice(&mut interpreter, &[7, 8, 9]);
    let result = support::run(&mut interpreter, vec![dst.clone(), src.clone()]).expect("run");
    assert_bool(&result, true);
    assert_eq!(read_i32_slice(&interpreter, &dst), vec![7, 8, 9]);
    assert_eq!(read_i32_slice(&interpreter, &src), vec![7, 8, 9]);
}

#[test]
fn runtime_length_mismatch_traps_at_the_assignment() {
    let lowered = support::lower(&int_slices(), &Ty::void(), |b, args| {
        b.set_span(span());
        b.assign(&args[1], &args[0], None)?;
        Ok(None)
    });
    let mut interpreter = lowered.interpreter();
    let dst = i32_slice(&mut interpreter, &[0, 0]);
    let src = i32_slice(&mut interpreter, &[1, 2, 3]);
    let trap = support::run(&mut interpreter, vec![dst.clone(), src]).unwrap_err();
    assert_eq!(
        trap,
        Trap::LengthMismatch {
            span: span(),
            dst_len: 2,
            src_len: 3
        }
    );
    // nothing was written before the check failed
    assert_eq!(read_i32_slice(&interpreter, &dst), vec![0, 0]);
}

#[test]
fn runtime_length_check_is_omitted_when_bounds_checks_are_off() {
    let lowered = support::lower_with(support::unchecked(), &int_slices(), &Ty::void(), |b, args| {
        b.assign(&args[1], &args[0], None)?;
        Ok(None)
    });
    assert!(!lowered.callees().contains(&"fp_array_length_mismatch"));
    let checked = support::lower(&int_slices(), &Ty::void(), |b, args| {
        b.assign(&args[1], &args[0], None)?;
        Ok(None)
    });
    assert!(checked.callees().contains(&"fp_array_length_mismatch"));
}

#[test]
fn overlapping_copies_read_the_source_before_overwriting_it() {
    let lowered = support::lower(&int_slices(), &Ty::void(), |b, args| {
        b.assign(&args[1], &args[0], None)?;
        Ok(None)
    });

    // destination after the source: copied back to front
    let mut interpreter = lowered.interpreter();
    let buffer = i32_slice(&mut interpreter, &[1, 2, 3, 4, 5, 6]);
    let (_, base) = buffer.as_slice().expect("slice");
    let dst = Value::slice(4, base + 8);
    let src = Value::slice(4, base);
    support::run(&mut interpreter, vec![dst, src]).expect("backward copy");
    assert_eq!(read_i32_slice(&interpreter, &buffer), vec![1, 2, 1, 2, 3, 4]);

    // destination before the source: copied front to back
    let mut interpreter = lowered.interpreter();
    let buffer = i32_slice(&mut interpreter, &[1, 2, 3, 4, 5, 6]);
    let (_, base) = buffer.as_slice().expect("slice");
    let dst = Value::slice(4, base);
    let src = Value::slice(4, base + 8);
    support::run(&mut interpreter, vec![dst, src]).expect("forward copy");
    assert_eq!(read_i32_slice(&interpreter, &buffer), vec![3, 4, 5, 6, 5, 6]);

    // exact self-assignment
    let mut interpreter = lowered.interpreter();
    let buffer = i32_slice(&mut interpreter, &[1, 2, 3]);
    support::run(&mut interpreter, vec![buffer.clone(), buffer.clone()]).expect("self copy");
    assert_eq!(read_i32_slice(&interpreter, &buffer), vec![1, 2, 3]);
}

#[test]
fn compound_assignment_combines_elementwise() {
    let lowered = support::lower(&int_slices(), &Ty::void(), |b, args| {
        b.assign(&args[1], &args[0], Some(AssignOp::Add))?;
        Ok(None)
    });
    let mut interpreter = lowered.interpreter();
    let dst = i32_slice(&mut interpreter, &[1, 2, 3]);
    let src = i32_slice(&mut interpreter, &[10, 20, 30]);
    support::run(&mut interpreter, vec![dst.clone(), src]).expect("run");
    assert_eq!(read_i32_slice(&interpreter, &dst), vec![11, 22, 33]);
}

#[test]
fn broadcast_applies_the_operator_to_every_element() {
    let cases = [
        (AssignOp::Mul, 2, vec![-6, 7, 0], vec![-12, 14, 0]),
        (AssignOp::Div, 2, vec![-6, 7, 0], vec![-3, 3, 0]),
        (AssignOp::Rem, 4, vec![-6, 7, 0], vec![-2, 3, 0]),
        (AssignOp::Shr, 2, vec![-16, 16, 1], vec![-4, 4, 0]),
        (AssignOp::Xor, 1, vec![0, 1, 2], vec![1, 0, 3]),
    ];
    for (op, operand, input, expected) in cases {
        let lowered = support::lower(&[slice(int())], &Ty::void(), |b, args| {
            let value = DValue::imm(int(), LirValue::i32(operand));
            b.set_assign(&args[0], &value, Some(op))?;
            Ok(None)
        });
        let mut interpreter = lowered.interpreter();
        let dst = i32_slice(&mut interpreter, &input);
        support::run(&mut interpreter, vec![dst.clone()]).expect("run");
        assert_eq!(read_i32_slice(&interpreter, &dst), expected, "{}", op);
    }
}

#[test]
fn unsigned_elements_shift_logically() {
    let lowered = support::lower(&[slice(uint())], &Ty::void(), |b, args| {
        let value = DValue::imm(uint(), LirValue::Constant(LirConstant::UInt(4, LirType::I32)));
        b.set_assign(&args[0], &value, Some(AssignOp::Shr))?;
        Ok(None)
    });
    let mut interpreter = lowered.interpreter();
    let values = [Value::int(32, 0x8000_0000), Value::int(32, 0x10)];
    let dst = store_slice(&mut interpreter, &LirType::I32, &values);
    support::run(&mut interpreter, vec![dst.clone()]).expect("run");
    assert_eq!(read_units(&interpreter, &LirType::I32, &dst), vec![0x0800_0000, 0x1]);
}

#[test]
fn bitwise_operators_on_float_elements_are_rejected() {
    let lowered = support::lower(&[slice(double())], &Ty::void(), |b, args| {
        let value = DValue::imm(double(), LirValue::Constant(LirConstant::Float(1.0, LirType::F64)));
        b.set_assign(&args[0], &value, Some(AssignOp::Xor))?;
        Ok(None)
    });
    assert!(matches!(lowered.error(), Error::Lowering { .. }));

    let lowered = support::lower(&[slice(double())], &Ty::void(), |b, args| {
        let value = DValue::imm(double(), LirValue::Constant(LirConstant::Float(0.5, LirType::F64)));
        b.set_assign(&args[0], &value, Some(AssignOp::Mul))?;
        Ok(None)
    });
    let mut interpreter = lowered.interpreter();
    let dst = f64_slice(&mut interpreter, &[3.0, -1.0]);
    support::run(&mut interpreter, vec![dst.clone()]).expect("run");
    let values: Vec<f64> = support::heap::load_slice(&interpreter, &LirType::F64, &dst)
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    assert_eq!(values, vec![1.5, -0.5]);
}

#[test]
fn broadcast_reaches_inner_static_arrays() {
    let pairs = slice(Ty::array(int(), 2));
    let lowered = support::lower(&[pairs.clone()], &Ty::void(), |b, args| {
        b.set_assign(&args[0], &DValue::imm(int(), LirValue::i32(9)), None)?;
        Ok(None)
    });
    let mut interpreter = lowered.interpreter();
    let storage = i32_slice(&mut interpreter, &[1, 2, 3, 4]);
    let (_, base) = storage.as_slice().expect("slice");
    support::run(&mut interpreter, vec![Value::slice(2, base)]).expect("run");
    assert_eq!(read_i32_slice(&interpreter, &storage), vec![9, 9, 9, 9]);
}

#[test]
fn copies_run_the_fixup_on_each_destination_element() {
    let counted_lir = LirType::Struct {
        fields: vec![LirType::I32],
        packed: false,
        name: Some("Counted".into()),
    };
    let lowered = support::lower(&[slice(counted()), slice(counted())], &Ty::void(), |b, args| {
        b.assign(&args[1], &args[0], None)?;
        Ok(None)
    });
    let mut interpreter = lowered.interpreter();
    interpreter.register_host(
        "Counted_postblit",
        Box::new(|memory: &mut Memory, args: &[Value]| -> eyre::Result<Value> {
            let address = args[0].as_u64().unwrap_or_default();
            let value = memory.load(&LirType::I32, address)?.as_i64().unwrap_or_default();
            memory.store(&LirType::I32, address, &Value::i32(value as i32 + 100))?;
            Ok(Value::Void)
        }),
    );
    let element = |value: i32| Value::Aggregate(vec![Value::i32(value)]);
    let dst = store_slice(&mut interpreter, &counted_lir, &[element(0), element(0)]);
    let src = store_slice(&mut interpreter, &counted_lir, &[element(1), element(2)]);
    support::run(&mut interpreter, vec![dst.clone(), src.clone()]).expect("run");
    // a one-field struct shares the layout of its field
    assert_eq!(read_i32_slice(&interpreter, &dst), vec![101, 102]);
    assert_eq!(read_i32_slice(&interpreter, &src), vec![1, 2]);
}
