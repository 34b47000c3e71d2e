use thiserror::Error;

/// CTAP2 status codes relevant to this core, with their published wire values.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CtapError {
    #[error("invalid command")]
    InvalidCommand,
    #[error("CBOR parsing failed")]
    CborParsing,
    #[error("missing required parameter")]
    MissingParameter,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("credential excluded")]
    CredentialExcluded,
    #[error("no valid credential for this relying party")]
    CredentialNotValid,
    #[error("operation not allowed in current state")]
    NotAllowed,
    #[error("PIN invalid")]
    PinInvalid,
    #[error("PIN auth invalid")]
    PinAuthInvalid,
    #[error("PIN blocked (device locked out)")]
    PinAuthBlocked,
    #[error("PIN not set")]
    PinNotSet,
    #[error("PIN required")]
    PinRequired,
    #[error("PIN policy violation")]
    PinPolicyViolation,
    #[error("vendor or unspecified error")]
    Other,
}

impl CtapError {
    /// Numeric status byte per the published CTAP2 error table.
    pub fn status_byte(self) -> u8 {
        match self {
            CtapError::InvalidCommand => 0x01,
            CtapError::CborParsing => 0x12,
            CtapError::MissingParameter => 0x14,
            CtapError::InvalidParameter => 0x02,
            CtapError::CredentialExcluded => 0x19,
            CtapError::CredentialNotValid => 0x22,
            CtapError::NotAllowed => 0x30,
            CtapError::PinInvalid => 0x31,
            CtapError::PinAuthBlocked => 0x34,
            CtapError::PinNotSet => 0x35,
            CtapError::PinRequired => 0x36,
            CtapError::PinAuthInvalid => 0x33,
            CtapError::PinPolicyViolation => 0x37,
            CtapError::Other => 0x7f,
        }
    }
}

pub type Result<T> = std::result::Result<T, CtapError>;
