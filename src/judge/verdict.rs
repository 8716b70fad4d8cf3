use std::fmt;

/// Classification of one sample run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed { elapsed_ms: u64 },
    WrongAnswer { elapsed_ms: u64 },
    RuntimeError { elapsed_ms: u64 },
    TimeLimitExceeded,
    /// No expected output next to the input. Not counted in the totals.
    MissingExpected,
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed { .. })
    }

    /// Whether the sample counts towards the total.
    pub fn is_counted(&self) -> bool {
        !matches!(self, Verdict::MissingExpected)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Verdict::Passed { .. } => "PASSED",
            Verdict::WrongAnswer { .. } => "WA",
            Verdict::RuntimeError { .. } => "RE",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::MissingExpected => "MISSING",
        };
        f.write_str(code)
    }
}

/// Passed and counted samples of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateResult {
    pub passed: usize,
    pub total: usize,
}

impl AggregateResult {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Self {
        verdicts
            .into_iter()
            .filter(|v| v.is_counted())
            .fold(AggregateResult::default(), |acc, v| AggregateResult {
                passed: acc.passed + usize::from(v.is_passed()),
                total: acc.total + 1,
            })
    }

    /// Every counted sample passed, and there was at least one.
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

/// Whole text trimmed, every line right-trimmed, lines joined with `\n`.
pub fn normalize(text: &str) -> String {
    text.trim()
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare a program's output with the expected one, ignoring trailing whitespace.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}
