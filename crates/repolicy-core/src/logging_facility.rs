//! Structured logging
//!
//! Every public operation brackets itself with `log_op_start!` and either
//! `log_op_end!` or `log_op_error!`. Binaries call `init` once; tests call
//! `init_test_capture` and assert on what was emitted.
//!
//! ```rust
//! use repolicy_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
