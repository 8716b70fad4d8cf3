//! Local judge: compile once, run every sample, classify each run.
//!
//! Samples run one at a time in file name order. A failing sample never stops the run; only a
//! failed compilation does, before any sample is executed.

mod process;
mod verdict;

use std::{
    fs,
    path::PathBuf,
    time::Duration,
};

use tracing::{error, info, instrument, warn};

pub use process::{run_to_completion, run_with_timeout, ProcessOutput, RunOutcome};
pub use verdict::{normalize, outputs_match, AggregateResult, Verdict};

use crate::{
    configuration::DEFAULT_TIMEOUT,
    error::{AtmError, Result},
    language::CommandSet,
    samples::{SampleCase, SampleStore},
};

/// Everything known about one sample after it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReport {
    pub name: String,
    pub verdict: Verdict,
    pub input: String,
    pub expected: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

/// Reports of one run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JudgeReport {
    pub samples: Vec<SampleReport>,
}

impl JudgeReport {
    pub fn aggregate(&self) -> AggregateResult {
        AggregateResult::from_verdicts(self.samples.iter().map(|s| &s.verdict))
    }

    pub fn verdicts(&self) -> Vec<Verdict> {
        self.samples.iter().map(|s| s.verdict).collect()
    }
}

/// Compiles and runs one source file.
#[derive(Debug, Clone)]
pub struct Judge {
    commands: CommandSet,
    workdir: PathBuf,
    timeout: Duration,
}

impl Judge {
    /// `commands` must already be substituted for the source file. They run in `workdir`.
    pub fn new(commands: CommandSet, workdir: impl Into<PathBuf>) -> Self {
        Judge {
            commands,
            workdir: workdir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the compile command, if any.
    #[instrument(skip(self), fields(command = ?self.commands.compile))]
    pub fn compile(&self) -> Result<bool> {
        let Some(compile) = &self.commands.compile else {
            return Ok(false);
        };

        let output = run_to_completion(compile, &self.workdir).map_err(|e| {
            error!("could not launch compiler: {e}");
            AtmError::CompileFailure {
                stderr: format!("could not run '{}': {e}", compile.join(" ")),
            }
        })?;
        if !output.status.success() {
            error!("compilation error: {}", output.stderr.trim());
            return Err(AtmError::CompileFailure {
                stderr: output.stderr,
            });
        }
        info!(elapsed = ?output.elapsed, "compiled");
        Ok(true)
    }

    /// Run one sample.
    #[instrument(skip(self, case), fields(sample = %case.name))]
    pub fn run_case(&self, case: &SampleCase) -> Result<SampleReport> {
        let input = fs::read(&case.input)
            .map_err(|e| AtmError::io(format!("could not read {}", case.input.display()), e))?;
        let input_text = String::from_utf8_lossy(&input).into_owned();

        let Some(expected_path) = &case.expected else {
            warn!("missing expected output");
            return Ok(SampleReport {
                name: case.name.clone(),
                verdict: Verdict::MissingExpected,
                input: input_text,
                expected: None,
                stdout: String::new(),
                stderr: String::new(),
            });
        };
        let expected = fs::read(expected_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|e| AtmError::io(format!("could not read {}", expected_path.display()), e))?;

        let (verdict, stdout, stderr) =
            match run_with_timeout(&self.commands.run, &self.workdir, &input, self.timeout) {
                Ok(RunOutcome::TimedOut { .. }) => {
                    (Verdict::TimeLimitExceeded, String::new(), String::new())
                }
                Ok(RunOutcome::Exited(output)) => {
                    let elapsed_ms = output.elapsed.as_millis() as u64;
                    let verdict = if !output.status.success() {
                        Verdict::RuntimeError { elapsed_ms }
                    } else if outputs_match(&output.stdout, &expected) {
                        Verdict::Passed { elapsed_ms }
                    } else {
                        Verdict::WrongAnswer { elapsed_ms }
                    };
                    (verdict, output.stdout, output.stderr)
                }
                Err(e) => {
                    warn!("could not launch program: {e}");
                    (
                        Verdict::RuntimeError { elapsed_ms: 0 },
                        String::new(),
                        format!("could not run '{}': {e}", self.commands.run.join(" ")),
                    )
                }
            };
        info!(%verdict, "sample done");

        Ok(SampleReport {
            name: case.name.clone(),
            verdict,
            input: input_text,
            expected: Some(expected),
            stdout,
            stderr,
        })
    }

    /// Compile, then run every sample of `store`, calling `on_sample` after each one.
    pub fn run<F>(&self, store: &SampleStore, on_sample: F) -> Result<JudgeReport>
    where
        F: FnMut(&SampleReport),
    {
        self.compile()?;
        self.run_cases(store, on_sample)
    }

    /// Run every sample of `store` against an already compiled program.
    pub fn run_cases<F>(&self, store: &SampleStore, mut on_sample: F) -> Result<JudgeReport>
    where
        F: FnMut(&SampleReport),
    {
        let mut report = JudgeReport::default();
        for case in store.cases()? {
            let sample = self.run_case(&case)?;
            on_sample(&sample);
            report.samples.push(sample);
        }
        info!(aggregate = ?report.aggregate(), "run finished");
        Ok(report)
    }
}
