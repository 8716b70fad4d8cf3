//! # atcoder-tools-mini
//!
//! A small contest helper made of two programs sharing this crate:
//!
//! - `atm-native-host`, a Native Messaging host started by the browser. It relays framed messages
//!   from the browser extension to every CLI connected on `127.0.0.1:49153`, and forwards the
//!   CLI requests back to the extension.
//! - `atm`, the command line front end: `gen` downloads the samples of a contest, `test` compiles
//!   and judges a solution locally, `submit` sends it through the browser.
//!
//! # Documentation Overview
//!
//! - The relay and its threads: [`bridge`], wire format in [`framing`] and [`message`].
//! - Talking to the relay from a CLI: [`client`].
//! - Which compiler and interpreter to use: [`language`].
//! - Local judging: [`samples`] then [`judge`].
//! - Runtime settings and persisted files: [`configuration`].
//!
//! # Usage Example
//!
//! Judging a solution against the samples of a task directory:
//!
//! ```no_run
//! use std::path::Path;
//! use atcoder_tools_mini::prelude::*;
//!
//! # fn main() -> atcoder_tools_mini::error::Result<()> {
//! let task_dir = Path::new("abc300/A");
//! let profile = LanguageQuery::new(Path::new("main.py")).resolve_profile()?;
//! let commands = CommandSet::templates(profile, None).for_source(Path::new("main.py"));
//!
//! let store = SampleStore::open(task_dir).expect("no samples");
//! let report = Judge::new(commands, task_dir).run(&store, |sample| {
//!     println!("{} ... {}", sample.name, sample.verdict);
//! })?;
//! println!("{:?}", report.aggregate());
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod commands;
pub mod configuration;
pub mod error;
pub mod framing;
pub mod judge;
pub mod language;
pub mod logger;
pub mod message;
pub mod samples;

/// Commonly used types and traits.
///
/// ```rust
/// use atcoder_tools_mini::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::AtmError;
    pub use crate::judge::{Judge, Verdict};
    pub use crate::language::{CommandSet, LanguageQuery};
    pub use crate::samples::{SampleSource, SampleStore};
}
