//! The three user-facing flows of the `atm` binary.
//!
//! Each flow prints its progress on stdout with a `[CLI]` prefix and returns an [`AtmError`]
//! when it could not complete. Reporting the error is left to the caller.
//!
//! [`AtmError`]: crate::error::AtmError

pub mod gen;
pub mod submit;

pub use gen::{build_workspace, gen_contest};
pub use submit::{guess_contest_and_task, submit_source, SubmitTarget, CPP_LANGUAGE_ID};
pub use test::{render_sample, test_source};
