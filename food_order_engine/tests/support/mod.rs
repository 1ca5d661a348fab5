#![allow(dead_code)]
//! Helpers shared by the integration test binaries. Each binary pulls them in with `mod support;`, and uses a
//! different subset, hence the `dead_code` allowance.
pub mod catalog;
pub mod prepare_env;
pub mod system;
