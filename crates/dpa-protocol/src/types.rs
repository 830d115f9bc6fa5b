//! Common types used in the protocol.

use crate::constants::*;
use crate::error::CodecError;

/// Outcome reported by a device in the response code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Request processed.
    NoError,
    /// General failure.
    Fail,
    /// Incorrect PCMD.
    Pcmd,
    /// Incorrect PNUM or PCMD.
    Pnum,
    /// Incorrect address value.
    Addr,
    /// Incorrect data length.
    DataLen,
    /// Incorrect data.
    Data,
    /// Incorrect HWPID.
    HwProfile,
    /// Incorrect NADR.
    Nadr,
    /// IFACE data consumed by the custom DPA handler.
    IfaceCustomHandler,
    /// Custom DPA handler is missing.
    MissingCustomDpaHandler,
    /// User-defined error in `0x80..=0xFE`.
    User(u8),
    /// Confirmation status, never carried by a response.
    Confirmation,
}

impl ResponseCode {
    /// Returns true for [`ResponseCode::NoError`].
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::NoError)
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            STATUS_NO_ERROR => ResponseCode::NoError,
            ERROR_FAIL => ResponseCode::Fail,
            ERROR_PCMD => ResponseCode::Pcmd,
            ERROR_PNUM => ResponseCode::Pnum,
            ERROR_ADDR => ResponseCode::Addr,
            ERROR_DATA_LEN => ResponseCode::DataLen,
            ERROR_DATA => ResponseCode::Data,
            ERROR_HWPID => ResponseCode::HwProfile,
            ERROR_NADR => ResponseCode::Nadr,
            ERROR_IFACE_CUSTOM_HANDLER => ResponseCode::IfaceCustomHandler,
            ERROR_MISSING_CUSTOM_DPA_HANDLER => ResponseCode::MissingCustomDpaHandler,
            ERROR_USER_FROM..=ERROR_USER_TO => ResponseCode::User(code),
            STATUS_CONFIRMATION => ResponseCode::Confirmation,
            _ => return Err(CodecError::UnknownResponseCode(code)),
        })
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::NoError => STATUS_NO_ERROR,
            ResponseCode::Fail => ERROR_FAIL,
            ResponseCode::Pcmd => ERROR_PCMD,
            ResponseCode::Pnum => ERROR_PNUM,
            ResponseCode::Addr => ERROR_ADDR,
            ResponseCode::DataLen => ERROR_DATA_LEN,
            ResponseCode::Data => ERROR_DATA,
            ResponseCode::HwProfile => ERROR_HWPID,
            ResponseCode::Nadr => ERROR_NADR,
            ResponseCode::IfaceCustomHandler => ERROR_IFACE_CUSTOM_HANDLER,
            ResponseCode::MissingCustomDpaHandler => ERROR_MISSING_CUSTOM_DPA_HANDLER,
            ResponseCode::User(code) => code,
            ResponseCode::Confirmation => STATUS_CONFIRMATION,
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseCode::NoError => write!(f, "no error"),
            ResponseCode::Fail => write!(f, "general failure"),
            ResponseCode::Pcmd => write!(f, "incorrect PCMD"),
            ResponseCode::Pnum => write!(f, "incorrect PNUM or PCMD"),
            ResponseCode::Addr => write!(f, "incorrect address"),
            ResponseCode::DataLen => write!(f, "incorrect data length"),
            ResponseCode::Data => write!(f, "incorrect data"),
            ResponseCode::HwProfile => write!(f, "incorrect HWPID"),
            ResponseCode::Nadr => write!(f, "incorrect NADR"),
            ResponseCode::IfaceCustomHandler => write!(f, "data consumed by custom handler"),
            ResponseCode::MissingCustomDpaHandler => write!(f, "custom DPA handler missing"),
            ResponseCode::User(code) => write!(f, "user error (0x{:02X})", code),
            ResponseCode::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Kind of an inbound frame, decided by its response code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Network confirmation of a remote request.
    Confirmation,
    /// Final response.
    Response,
}

impl MessageKind {
    /// Classify an inbound frame.
    ///
    /// Fails with [`CodecError::BadLength`] when the frame is too short to
    /// carry a response code.
    pub fn of(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < RESPONSE_CODE_POS + 1 {
            return Err(CodecError::BadLength {
                kind: "message",
                min: RESPONSE_CODE_POS + 1,
                max: RESPONSE_MAX_LENGTH,
                actual: frame.len(),
            });
        }

        if frame[RESPONSE_CODE_POS] == STATUS_CONFIRMATION {
            Ok(MessageKind::Confirmation)
        } else {
            Ok(MessageKind::Response)
        }
    }
}

/// Returns true if the address designates the locally attached device.
pub fn is_local_device_address(nadr: u16) -> bool {
    nadr == COORDINATOR_ADDRESS || nadr == LOCAL_DEVICE_ADDRESS
}
