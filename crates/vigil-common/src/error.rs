//! Error types for Vigil

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Memory access error at {address:#x}: {message}")]
    MemoryAccess { address: u64, message: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No range contains address {0:#x}")]
    RangeNotFound(u64),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Decode failed at {0:#x}")]
    DecodeFailed(u64),

    #[error("{0}")]
    Hook(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Patch error: {0}")]
    Patch(String),

    #[error("Protection change failed at {address:#x}: {message}")]
    Protection { address: u64, message: String },

    #[error("Unknown value type: {0}")]
    UnknownType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_access_error_display() {
        let err = Error::MemoryAccess {
            address: 0x7fff1000,
            message: "page unmapped".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("0x7fff1000"));
        assert!(msg.contains("page unmapped"));
    }

    #[test]
    fn test_range_not_found_display() {
        let err = Error::RangeNotFound(0xdead0000);
        assert!(format!("{}", err).contains("0xdead0000"));
    }

    #[test]
    fn test_hook_error_is_bare_message() {
        let err = Error::Hook("Invalid or non-executable address".to_string());
        assert_eq!(format!("{}", err), "Invalid or non-executable address");
    }

    #[test]
    fn test_unknown_type_display() {
        let err = Error::UnknownType("quadword".to_string());
        assert!(format!("{}", err).contains("quadword"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }
}
