//! PostgreSQL persistence for collections on a SQL connection.

mod adapter;
mod pool;
mod records;

pub use adapter::*;
pub use pool::*;
pub use records::*;
