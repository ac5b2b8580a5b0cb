// Processing Result

use super::ErrorEvent;

/// Outcome of one `process()` attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingResult<O> {
    Success(O),
    Error(ErrorEvent),
}

impl<O> ProcessingResult<O> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success(_))
    }

    pub fn error(&self) -> Option<ErrorEvent> {
        match self {
            ProcessingResult::Success(_) => None,
            ProcessingResult::Error(event) => Some(*event),
        }
    }
}

impl<O, E: Into<ErrorEvent>> From<Result<O, E>> for ProcessingResult<O> {
    fn from(result: Result<O, E>) -> Self {
        match result {
            Ok(output) => ProcessingResult::Success(output),
            Err(e) => ProcessingResult::Error(e.into()),
        }
    }
}
