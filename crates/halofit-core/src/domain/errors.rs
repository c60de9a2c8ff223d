use crate::numerics::spline::SplineError;

pub type NonlinearResult<T> = Result<T, NonlinearError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NonlinearError {
    #[error("invalid grid: {0}")]
    InvalidGrid(#[from] SplineError),
    #[error("scale search did not converge at z={z} after {iterations} iterations (sigma={sigma})")]
    Convergence {
        z: f64,
        iterations: usize,
        sigma: f64,
    },
    #[error("no non-linear spectra requested, {operation} is unavailable")]
    UnsupportedMethod { operation: &'static str },
    #[error("non-linear method selector '{selector}' is out of range, expected {expected}")]
    ConfigurationRange {
        selector: String,
        expected: &'static str,
    },
    #[error("non-linear spectrum table is not ready for {operation}")]
    TableNotReady { operation: &'static str },
    #[error("{context}: {message}")]
    InvalidInput {
        context: &'static str,
        message: String,
    },
}

impl NonlinearError {
    pub fn invalid_input(context: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            context,
            message: message.into(),
        }
    }

    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidGrid(_)
            | Self::UnsupportedMethod { .. }
            | Self::ConfigurationRange { .. }
            | Self::InvalidInput { .. } => ErrorCategory::InputValidationError,
            Self::Convergence { .. } => ErrorCategory::ComputationError,
            Self::TableNotReady { .. } => ErrorCategory::InternalError,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidGrid(_) => "INPUT.INVALID_GRID",
            Self::Convergence { .. } => "RUN.CONVERGENCE",
            Self::UnsupportedMethod { .. } => "INPUT.UNSUPPORTED_METHOD",
            Self::ConfigurationRange { .. } => "INPUT.METHOD_RANGE",
            Self::TableNotReady { .. } => "SYS.TABLE_NOT_READY",
            Self::InvalidInput { .. } => "INPUT.INVALID",
        }
    }

    pub const fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code(), self)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}
