/// Wire-level error taxonomy for the admin and correlation APIs.
/// Codes are stable strings the admin UI and correlation tooling match on.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotAuthenticated,
    CsrfViolation,
    InvalidCredentials,
    ExistingInjectionKey,
    InvalidRequest,
    WhyAreYouShouting,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NotAuthenticated => "NOT_AUTHENTICATED",
            ErrorCode::CsrfViolation => "CSRF_VIOLATION",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::ExistingInjectionKey => "EXISTING_INJECTION_KEY",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::WhyAreYouShouting => "WHY_ARE_YOU_SHOUTING",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_serializes_to_as_str() {
        for code in [
            ErrorCode::NotAuthenticated,
            ErrorCode::CsrfViolation,
            ErrorCode::InvalidCredentials,
            ErrorCode::ExistingInjectionKey,
            ErrorCode::InvalidRequest,
            ErrorCode::WhyAreYouShouting,
            ErrorCode::NotFound,
            ErrorCode::Internal,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json.as_str(), Some(code.as_str()));
        }
    }
}
