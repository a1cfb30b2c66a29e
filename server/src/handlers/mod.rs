//! Request handlers over the mapper.

mod associations;
mod records;

pub use associations::*;
pub use records::*;
