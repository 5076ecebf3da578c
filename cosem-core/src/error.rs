use crate::enums::ErrorCode;
use thiserror::Error;

/// Main error type for the COSEM stack
#[derive(Error, Debug)]
pub enum DlmsError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("ASN.1 encoding error: {0}")]
    Asn1Encoding(String),

    #[error("ASN.1 decoding error: {0}")]
    Asn1Decoding(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A fixed-width read ran past the logical end of a buffer.
    ///
    /// Decoders that support resuming never surface this: they check the
    /// remaining length first and report an incomplete value instead.
    #[error("Not enough data: needed {needed} bytes, {available} available")]
    NotEnoughData { needed: usize, available: usize },

    /// The peer answered with a data-access-result other than success.
    #[error("Device reported error: {0}")]
    Device(ErrorCode),

    /// The association was rejected by the peer.
    #[error("Association rejected: {0}")]
    Rejected(String),
}

impl DlmsError {
    /// Error code to report back to a peer for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DlmsError::Device(code) => *code,
            DlmsError::AccessDenied(_) => ErrorCode::ReadWriteDenied,
            _ => ErrorCode::HardwareFault,
        }
    }
}

/// Result type alias for COSEM operations
pub type DlmsResult<T> = Result<T, DlmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            DlmsError::Device(ErrorCode::UndefinedObject).error_code(),
            ErrorCode::UndefinedObject
        );
        assert_eq!(
            DlmsError::AccessDenied("attribute 2".into()).error_code(),
            ErrorCode::ReadWriteDenied
        );
        assert_eq!(
            DlmsError::InvalidData("x".into()).error_code(),
            ErrorCode::HardwareFault
        );
    }
}
