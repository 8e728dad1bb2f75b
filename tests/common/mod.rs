//! Common test utilities for sharelink integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod navigator;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use navigator::*;
