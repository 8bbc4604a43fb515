pub mod address;
pub mod shape;

pub use address::*;
pub use shape::*;
