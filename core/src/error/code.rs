use serde::Serialize;

/// Stable numeric codes attached to errors in structured reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ValidationError = 3,
    DependencyError = 11,
    CircularDependency = 12,
    EmptyPlan = 13,
    ConfigError = 14,
    RunnerError = 20,
    Timeout = 30,
    Cancelled = 31,
    Skipped = 32,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.as_u16()
    }
}
