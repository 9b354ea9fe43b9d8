pub mod arrays;

pub use arrays::*;
