//! query sequences management

pub mod pool;

pub use pool::QueryPool;
