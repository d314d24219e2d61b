//! Canonical error codes and handler outcomes.
//!
//! Handlers report domain failures through [`HandlerError::Code`] instead of
//! returning negative sentinels in place of data. The numeric values are
//! still what goes on the wire (in the `result` field of the exception
//! envelope), so clients written against the sentinel convention keep working.

use serde_json::Value;
use thiserror::Error;

pub const CONNECT_ERROR: i32 = -100;
pub const PERMISSION_ERROR: i32 = -101;
pub const SQL_ERROR: i32 = -102;
pub const UPDATE_ERROR: i32 = -103;
pub const PARAMETER_ERROR: i32 = -104;
pub const VULNERABILITY_ERROR: i32 = -105;
pub const COMPATIBILITY_ERROR: i32 = -106;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Required data-access capability absent, or caller not authenticated.
    Connect,
    Permission,
    Sql,
    /// Targeted record of an update could not be found.
    Update,
    /// Required identifying field missing, or argument count mismatch.
    Parameter,
    /// Rejected by the sanitizer.
    Vulnerability,
    /// Host version below the configured floor.
    Compatibility,
    /// Any other negative code, usually passed through from the host business layer.
    Other(i32),
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::Connect => CONNECT_ERROR,
            ErrorCode::Permission => PERMISSION_ERROR,
            ErrorCode::Sql => SQL_ERROR,
            ErrorCode::Update => UPDATE_ERROR,
            ErrorCode::Parameter => PARAMETER_ERROR,
            ErrorCode::Vulnerability => VULNERABILITY_ERROR,
            ErrorCode::Compatibility => COMPATIBILITY_ERROR,
            ErrorCode::Other(code) => code,
        }
    }

    /// `None` for non-negative values: those are data, not errors.
    pub fn from_code(code: i32) -> Option<Self> {
        let known = match code {
            c if c >= 0 => return None,
            CONNECT_ERROR => ErrorCode::Connect,
            PERMISSION_ERROR => ErrorCode::Permission,
            SQL_ERROR => ErrorCode::Sql,
            UPDATE_ERROR => ErrorCode::Update,
            PARAMETER_ERROR => ErrorCode::Parameter,
            VULNERABILITY_ERROR => ErrorCode::Vulnerability,
            COMPATIBILITY_ERROR => ErrorCode::Compatibility,
            other => ErrorCode::Other(other),
        };
        Some(known)
    }

    /// Human-readable message for a failed call.
    pub fn message(self, method: &str, action: &str) -> String {
        let label = match self {
            ErrorCode::Connect => "Connect Error",
            ErrorCode::Permission => "Permission Error",
            ErrorCode::Sql => "SQL Error",
            ErrorCode::Update => "Update Error",
            ErrorCode::Parameter => "Parameter Error",
            ErrorCode::Vulnerability => "Vulnerability Error",
            ErrorCode::Compatibility => "Compatibility Error",
            // codes between the canonical block and zero come from the host layer
            ErrorCode::Other(code) if code > CONNECT_ERROR => {
                return format!("Error {code} from host: {method} on action {action}")
            }
            ErrorCode::Other(code) => {
                return format!("Error {code} from server: {method} on action {action}")
            }
        };
        format!("{label}: {method} on action {action}")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    #[error("error code {}", .0.code())]
    Code(ErrorCode),
    /// Uncaught fault; the text becomes the exception message.
    #[error("{0}")]
    Fault(String),
}

impl From<ErrorCode> for HandlerError {
    fn from(code: ErrorCode) -> Self {
        HandlerError::Code(code)
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_codes_round_trip() {
        for code in [
            ErrorCode::Connect,
            ErrorCode::Permission,
            ErrorCode::Sql,
            ErrorCode::Update,
            ErrorCode::Parameter,
            ErrorCode::Vulnerability,
            ErrorCode::Compatibility,
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ErrorCode::from_code(0), None);
        assert_eq!(ErrorCode::from_code(7), None);
    }

    #[test]
    fn messages() {
        assert_eq!(
            ErrorCode::Connect.message("readOrder", "Order"),
            "Connect Error: readOrder on action Order"
        );
        assert_eq!(
            ErrorCode::Other(-3).message("readOrder", "Order"),
            "Error -3 from host: readOrder on action Order"
        );
        assert_eq!(
            ErrorCode::Other(-500).message("readOrder", "Order"),
            "Error -500 from server: readOrder on action Order"
        );
    }
}
