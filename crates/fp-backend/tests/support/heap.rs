use fp_core::lir::{layout, LirType};
use fp_lir_interpret::{LirInterpreter, Value};

/// Copy `values` into fresh heap storage and return the `{len, ptr}` slice.
///
/// The block is sized exactly, so growing the result always relocates unless
/// it still fits the allocator's rounding.
pub fn store_slice(interpreter: &mut LirInterpreter, elem: &LirType, values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::slice(0, 0);
    }
    let size = layout::size_of(elem);
    let base = interpreter
        .memory_mut()
        .allocate(size * values.len() as u64, false);
    for (index, value) in values.iter().enumerate() {
        interpreter
            .memory_mut()
            .store(elem, base + index as u64 * size, value)
            .expect("element store");
    }
    Value::slice(values.len() as u64, base)
}

pub fn load_slice(interpreter: &LirInterpreter, elem: &LirType, slice: &Value) -> Vec<Value> {
    let (len, ptr) = slice.as_slice().expect("slice value");
    let size = layout::size_of(elem);
    (0..len)
        .map(|index| {
            interpreter
                .memory()
                .load(elem, ptr + index * size)
                .expect("element load")
        })
        .collect()
}

pub fn i32_slice(interpreter: &mut LirInterpreter, values: &[i32]) -> Value {
    let values: Vec<Value> = values.iter().copied().map(Value::i32).collect();
    store_slice(interpreter, &LirType::I32, &values)
}

pub fn read_i32_slice(interpreter: &LirInterpreter, slice: &Value) -> Vec<i32> {
    load_slice(interpreter, &LirType::I32, slice)
        .iter()
        .map(|value| value.as_i64().expect("integer element") as i32)
        .collect()
}

pub fn read_units(interpreter: &LirInterpreter, elem: &LirType, slice: &Value) -> Vec<u64> {
    load_slice(interpreter, elem, slice)
        .iter()
        .map(|value| value.as_u64().expect("code unit"))
        .collect()
}

pub fn f64_slice(interpreter: &mut LirInterpreter, values: &[f64]) -> Value {
    let values: Vec<Value> = values.iter().copied().map(Value::Float).collect();
    store_slice(interpreter, &LirType::F64, &values)
}

pub fn read_i32(interpreter: &LirInterpreter, address: u64) -> i32 {
    interpreter
        .memory()
        .load(&LirType::I32, address)
        .expect("i32 load")
        .as_i64()
        .expect("integer") as i32
}
