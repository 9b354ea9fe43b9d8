use fp_core::lir::{LirFunction, LirInstructionKind, LirType};
use fp_lir_interpret::{Trap, Value};

pub fn assert_slice_len(value: &Value, expected: u64) {
    match value.as_slice() {
        Some((len, _)) => assert_eq!(len, expected, "slice length of {}", value),
        None => panic!("expected a slice, got {}", value),
    }
}

pub fn assert_bool(value: &Value, expected: bool) {
    assert_eq!(value.as_bool(), Some(expected), "boolean result {}", value);
}

pub fn assert_i32_aggregate(value: &Value, expected: &[i32]) {
    let fields = value
        .fields()
        .unwrap_or_else(|| panic!("expected an aggregate, got {}", value));
    let actual: Vec<i32> = fields
        .iter()
        .map(|field| field.as_i64().expect("integer field") as i32)
        .collect();
    assert_eq!(actual, expected);
}

pub fn assert_bounds_trap(trap: &Trap, expected_index: u64, expected_len: u64) {
    match trap {
        Trap::BoundsViolation { index, len, .. } => {
            assert_eq!((*index, *len), (expected_index, expected_len));
        }
        other => panic!("expected a bounds violation, got {}", other),
    }
}

/// Stores in `function` whose stored type is `ty`.
pub fn count_stores(function: &LirFunction, ty: &LirType) -> usize {
    function
        .instructions()
        .filter(|instruction| {
            matches!(instruction.kind, LirInstructionKind::Store { .. })
                && instruction.type_hint.as_ref() == Some(ty)
        })
        .count()
}
