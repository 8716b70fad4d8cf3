//! Error taxonomy shared by the bridge, the transport client and the judge harness.
//!
//! Per-sample failures (runtime errors, timeouts) are not errors: they are reported as
//! [`Verdict`](crate::judge::Verdict)s and never abort a run.

use std::io;

/// Errors that abort an operation before (or instead of) producing a result.
#[derive(Debug, thiserror::Error)]
pub enum AtmError {
    /// The bridge is not listening. User-correctable: restart the browser / bridge.
    #[error("could not connect to the native host at {addr}: {source}")]
    ConnectionUnavailable {
        /// Address that refused the connection.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Missing directories, undeterminable language, empty fallback sample set...
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The compile step exited with a non-zero status. Carries the toolchain's stderr verbatim.
    #[error("compilation failed")]
    CompileFailure {
        /// Captured error stream of the compiler.
        stderr: String,
    },

    /// Malformed message on one of the transports, or a flow ended without the expected reply.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The agent reported an error through a terminal event.
    #[error("agent error: {0}")]
    Agent(String),

    /// Unrecoverable I/O failure (framed peer lost, bind failure, socket write failure...).
    #[error("{context}: {source}")]
    FatalIo {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl AtmError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        AtmError::FatalIo {
            context: context.into(),
            source,
        }
    }
}

/// Shorthand used across the library.
pub type Result<T, E = AtmError> = std::result::Result<T, E>;

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_configuration_is_displayed() {
        let err = AtmError::Configuration("no language".into());
        assert_eq!(err.to_string(), "configuration error: no language");
    }

    #[test]
    fn test_io_context_is_displayed() {
        let err = AtmError::io(
            "could not bind",
            io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        );
        assert_eq!(err.to_string(), "could not bind: in use");
    }
}
