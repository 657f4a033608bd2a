//! Remote store backends.

pub mod memory;
pub mod redis;
pub mod traits;
