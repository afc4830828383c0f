pub mod cpu;
pub mod error;
pub mod memory;
pub mod platform;
pub mod snapshot;

pub use error::QueryError;
