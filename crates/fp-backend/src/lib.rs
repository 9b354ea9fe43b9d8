// fp-backend: lowering passes that turn typed expressions into LIR
//
// Architecture:
// - transforms: one module per lowering concern; `arrays` owns every
//   operation on static and dynamic arrays

#[macro_use]
extern crate fp_core;

pub mod transforms;

pub use transforms as transformations;
