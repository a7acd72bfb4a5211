//! contains utils used in parsing files and parameters

pub mod files;
pub mod parameters;

pub use files::*;
pub use parameters::*;
