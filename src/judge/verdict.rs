//! Verdict types and output comparison

use serde::Serialize;

/// Sentinel elapsed time for runs that were cut off before a measurement
/// made sense
pub const TIME_NOT_MEASURED: f64 = -1.0;

/// Final structured grading outcome
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    /// Did the submission produce the expected output?
    pub correct: bool,
    /// One of "Correct", "Incorrect", "Time limit exceeded", "Runtime error"
    pub message: String,
    /// Elapsed wall-clock seconds, or -1 for a timed-out run
    pub time_secs: f64,
}

impl Verdict {
    pub fn correct(time_secs: f64) -> Self {
        Verdict {
            correct: true,
            message: "Correct".to_string(),
            time_secs,
        }
    }

    pub fn incorrect(time_secs: f64) -> Self {
        Verdict {
            correct: false,
            message: "Incorrect".to_string(),
            time_secs,
        }
    }

    pub fn time_limit_exceeded() -> Self {
        Verdict {
            correct: false,
            message: "Time limit exceeded".to_string(),
            time_secs: TIME_NOT_MEASURED,
        }
    }

    pub fn runtime_error(time_secs: f64) -> Self {
        Verdict {
            correct: false,
            message: "Runtime error".to_string(),
            time_secs,
        }
    }
}

/// Byte-wise comparison modulo leading/trailing whitespace on both sides.
///
/// `"5\n"` matches `"5"` and `"5 \n"`; interior bytes must be identical.
pub fn outputs_match(produced: &[u8], expected: &[u8]) -> bool {
    produced.trim_ascii() == expected.trim_ascii()
}
