//! DPA messages and their wire encoding.
//!
//! Outbound traffic is always a [`Request`]. Inbound traffic is either a
//! [`Confirmation`] (the coordinator accepted a remote request and reports the
//! routing parameters) or a [`Response`] (the final answer of the addressed
//! device). Both are recognized by the response code byte at offset 6.

use bytes::{Buf, BufMut};

use crate::constants::*;
use crate::error::CodecError;
use crate::types::*;

// ============================================================================
// Header
// ============================================================================

/// NADR, PNUM, PCMD and HWPID, present at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Foursome {
    address: u16,
    peripheral: u8,
    command: u8,
    hw_profile_id: u16,
}

impl Foursome {
    /// Read the header. The caller guarantees at least [`FOURSOME_LENGTH`] bytes.
    fn read(frame: &[u8]) -> Self {
        let mut buf = &frame[..FOURSOME_LENGTH];
        Foursome {
            address: buf.get_u16_le(),
            peripheral: buf.get_u8(),
            command: buf.get_u8(),
            hw_profile_id: buf.get_u16_le(),
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_u16_le(self.address);
        buf.put_u8(self.peripheral);
        buf.put_u8(self.command);
        buf.put_u16_le(self.hw_profile_id);
    }
}

// ============================================================================
// Request
// ============================================================================

/// A request addressed to a peripheral of a mesh device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Node address.
    pub address: u16,
    /// Peripheral number.
    pub peripheral: u8,
    /// Peripheral command.
    pub command: u8,
    /// Hardware profile id.
    pub hw_profile_id: u16,
    /// Request data, at most [`PDATA_MAX_LENGTH`] bytes.
    pub payload: Vec<u8>,
}

impl Request {
    /// Create a request without payload that matches any hardware profile.
    pub fn new(address: u16, peripheral: u8, command: u8) -> Self {
        Request {
            address,
            peripheral,
            command,
            hw_profile_id: HWPID_DO_NOT_CHECK,
            payload: Vec::new(),
        }
    }

    /// Set the hardware profile id.
    pub fn with_hw_profile(mut self, hw_profile_id: u16) -> Self {
        self.hw_profile_id = hw_profile_id;
        self
    }

    /// Set the request data.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let payload = payload.into();
        if payload.len() > PDATA_MAX_LENGTH {
            return Err(CodecError::PayloadTooLong {
                max: PDATA_MAX_LENGTH,
                actual: payload.len(),
            });
        }
        self.payload = payload;
        Ok(self)
    }

    /// Returns true if the request targets the locally attached device, which
    /// answers without a network confirmation.
    pub fn is_local_device(&self) -> bool {
        is_local_device_address(self.address)
    }

    /// Returns true for operations whose duration cannot be bounded up front.
    pub fn is_long_lasting(&self) -> bool {
        self.peripheral == PNUM_COORDINATOR
            && matches!(
                self.command,
                CMD_COORDINATOR_BOND_NODE | CMD_COORDINATOR_DISCOVERY
            )
    }

    fn foursome(&self) -> Foursome {
        Foursome {
            address: self.address,
            peripheral: self.peripheral,
            command: self.command,
            hw_profile_id: self.hw_profile_id,
        }
    }

    /// Encode the request to its wire frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOURSOME_LENGTH + self.payload.len());
        self.foursome().write(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a request frame, as seen by the device side.
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < FOURSOME_LENGTH || frame.len() > REQUEST_MAX_LENGTH {
            return Err(CodecError::BadLength {
                kind: "request",
                min: FOURSOME_LENGTH,
                max: REQUEST_MAX_LENGTH,
                actual: frame.len(),
            });
        }

        let header = Foursome::read(frame);
        if header.command & RESPONSE_FLAG != 0 {
            return Err(CodecError::MalformedCommandFlag(header.command));
        }

        Ok(Request {
            address: header.address,
            peripheral: header.peripheral,
            command: header.command,
            hw_profile_id: header.hw_profile_id,
            payload: frame[PDATA_START_POS..].to_vec(),
        })
    }
}

// ============================================================================
// Confirmation
// ============================================================================

/// Network confirmation of a request sent to a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Node address.
    pub address: u16,
    /// Peripheral number.
    pub peripheral: u8,
    /// Peripheral command.
    pub command: u8,
    /// Hardware profile id.
    pub hw_profile_id: u16,
    /// DPA value of the coordinator.
    pub dpa_value: u8,
    /// Number of hops used to deliver the request.
    pub hops: u8,
    /// Timeslot length in 10 ms units.
    pub timeslot_length: u8,
    /// Number of hops the response will use.
    pub hops_response: u8,
}

impl Confirmation {
    /// Encode the confirmation to its wire frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CONFIRMATION_LENGTH);
        Foursome {
            address: self.address,
            peripheral: self.peripheral,
            command: self.command,
            hw_profile_id: self.hw_profile_id,
        }
        .write(&mut buf);
        buf.put_u8(STATUS_CONFIRMATION);
        buf.put_u8(self.dpa_value);
        buf.put_u8(self.hops);
        buf.put_u8(self.timeslot_length);
        buf.put_u8(self.hops_response);
        buf
    }
}

// ============================================================================
// Response
// ============================================================================

/// Final response of the addressed device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Node address.
    pub address: u16,
    /// Peripheral number.
    pub peripheral: u8,
    /// Peripheral command, with [`RESPONSE_FLAG`] set.
    pub command: u8,
    /// Hardware profile id.
    pub hw_profile_id: u16,
    /// Processing result.
    pub response_code: ResponseCode,
    /// DPA value of the responding device.
    pub dpa_value: u8,
    /// Response data. Empty unless `response_code` is [`ResponseCode::NoError`].
    pub payload: Vec<u8>,
}

impl Response {
    /// Build the response a device would send for `request`.
    ///
    /// The payload is dropped for any code other than [`ResponseCode::NoError`].
    pub fn for_request(
        request: &Request,
        response_code: ResponseCode,
        dpa_value: u8,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        let payload = if response_code.is_ok() {
            payload.into()
        } else {
            Vec::new()
        };

        Response {
            address: request.address,
            peripheral: request.peripheral,
            command: request.command | RESPONSE_FLAG,
            hw_profile_id: request.hw_profile_id,
            response_code,
            dpa_value,
            payload,
        }
    }

    /// Command byte without the response flag.
    pub fn request_command(&self) -> u8 {
        self.command & !RESPONSE_FLAG
    }

    /// Encode the response to its wire frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RESPONSE_MIN_LENGTH + self.payload.len());
        Foursome {
            address: self.address,
            peripheral: self.peripheral,
            command: self.command,
            hw_profile_id: self.hw_profile_id,
        }
        .write(&mut buf);
        buf.put_u8(self.response_code.into());
        buf.put_u8(self.dpa_value);
        if self.response_code.is_ok() {
            buf.extend_from_slice(&self.payload);
        }
        buf
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// An inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Network confirmation.
    Confirmation(Confirmation),
    /// Final response.
    Response(Response),
}

/// Parse an inbound frame into a confirmation or a response.
pub fn parse(frame: &[u8]) -> Result<Message, CodecError> {
    match MessageKind::of(frame)? {
        MessageKind::Confirmation => parse_confirmation(frame).map(Message::Confirmation),
        MessageKind::Response => parse_response(frame).map(Message::Response),
    }
}

/// Parse a confirmation frame.
pub fn parse_confirmation(frame: &[u8]) -> Result<Confirmation, CodecError> {
    if frame.len() != CONFIRMATION_LENGTH {
        return Err(CodecError::BadLength {
            kind: "confirmation",
            min: CONFIRMATION_LENGTH,
            max: CONFIRMATION_LENGTH,
            actual: frame.len(),
        });
    }

    let code = frame[RESPONSE_CODE_POS];
    if code != STATUS_CONFIRMATION {
        return Err(CodecError::BadConfirmationCode(code));
    }

    let header = Foursome::read(frame);
    Ok(Confirmation {
        address: header.address,
        peripheral: header.peripheral,
        command: header.command,
        hw_profile_id: header.hw_profile_id,
        dpa_value: frame[DPA_VALUE_POS],
        hops: frame[HOPS_POS],
        timeslot_length: frame[TIMESLOT_LENGTH_POS],
        hops_response: frame[HOPS_RESPONSE_POS],
    })
}

/// Parse a response frame.
pub fn parse_response(frame: &[u8]) -> Result<Response, CodecError> {
    if frame.len() < RESPONSE_MIN_LENGTH || frame.len() > RESPONSE_MAX_LENGTH {
        return Err(CodecError::BadLength {
            kind: "response",
            min: RESPONSE_MIN_LENGTH,
            max: RESPONSE_MAX_LENGTH,
            actual: frame.len(),
        });
    }

    let header = Foursome::read(frame);
    if header.command & RESPONSE_FLAG == 0 {
        return Err(CodecError::MalformedCommandFlag(header.command));
    }

    let response_code = ResponseCode::try_from(frame[RESPONSE_CODE_POS])?;
    if response_code == ResponseCode::Confirmation {
        return Err(CodecError::UnexpectedConfirmationCode);
    }

    let payload = if response_code.is_ok() {
        frame[RESPONSE_PDATA_START_POS..].to_vec()
    } else {
        Vec::new()
    };

    Ok(Response {
        address: header.address,
        peripheral: header.peripheral,
        command: header.command,
        hw_profile_id: header.hw_profile_id,
        response_code,
        dpa_value: frame[DPA_VALUE_POS],
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn led_pulse(address: u16) -> Request {
        Request::new(address, PNUM_LEDR, CMD_LED_PULSE)
    }

    #[test]
    fn test_request_encode() {
        let request = Request::new(0x0102, PNUM_OS, CMD_OS_READ)
            .with_hw_profile(0xABCD)
            .with_payload(vec![0x11, 0x22])
            .unwrap();

        assert_eq!(
            request.encode(),
            vec![0x02, 0x01, 0x02, 0x00, 0xCD, 0xAB, 0x11, 0x22]
        );
    }

    #[test]
    fn test_request_decode() {
        let frame = [0x03, 0x00, 0x06, 0x03, 0xFF, 0xFF];
        let request = Request::decode(&frame).unwrap();
        assert_eq!(request, led_pulse(3));

        assert!(matches!(
            Request::decode(&[0x03, 0x00, 0x06, 0x83, 0xFF, 0xFF]),
            Err(CodecError::MalformedCommandFlag(0x83))
        ));
        assert!(matches!(
            Request::decode(&[0x03, 0x00, 0x06]),
            Err(CodecError::BadLength { kind: "request", .. })
        ));
    }

    #[test]
    fn test_request_payload_limit() {
        assert!(led_pulse(1).with_payload(vec![0u8; PDATA_MAX_LENGTH]).is_ok());
        assert_eq!(
            led_pulse(1).with_payload(vec![0u8; PDATA_MAX_LENGTH + 1]),
            Err(CodecError::PayloadTooLong {
                max: PDATA_MAX_LENGTH,
                actual: PDATA_MAX_LENGTH + 1
            })
        );
    }

    #[test]
    fn test_request_local_device() {
        assert!(led_pulse(COORDINATOR_ADDRESS).is_local_device());
        assert!(led_pulse(LOCAL_DEVICE_ADDRESS).is_local_device());
        assert!(!led_pulse(0x01).is_local_device());
        assert!(!led_pulse(0x0100).is_local_device());
    }

    #[test]
    fn test_request_long_lasting() {
        assert!(Request::new(0, PNUM_COORDINATOR, CMD_COORDINATOR_BOND_NODE).is_long_lasting());
        assert!(Request::new(0, PNUM_COORDINATOR, CMD_COORDINATOR_DISCOVERY).is_long_lasting());
        assert!(!Request::new(0, PNUM_COORDINATOR, CMD_COORDINATOR_BONDED_DEVICES).is_long_lasting());
        assert!(!Request::new(0, PNUM_NODE, CMD_COORDINATOR_BOND_NODE).is_long_lasting());
    }

    #[test]
    fn test_parse_confirmation() {
        let frame = [0x05, 0x00, 0x06, 0x03, 0xFF, 0xFF, 0xFF, 0x44, 0x02, 0x06, 0x03];

        let message = parse(&frame).unwrap();
        assert_eq!(
            message,
            Message::Confirmation(Confirmation {
                address: 5,
                peripheral: PNUM_LEDR,
                command: CMD_LED_PULSE,
                hw_profile_id: HWPID_DO_NOT_CHECK,
                dpa_value: 0x44,
                hops: 2,
                timeslot_length: 6,
                hops_response: 3,
            })
        );

        if let Message::Confirmation(confirmation) = message {
            assert_eq!(confirmation.encode(), frame.to_vec());
        }
    }

    #[test]
    fn test_parse_confirmation_bad_length() {
        let short = [0x05, 0x00, 0x06, 0x03, 0xFF, 0xFF, 0xFF, 0x44, 0x02, 0x06];
        assert!(matches!(
            parse(&short),
            Err(CodecError::BadLength { kind: "confirmation", actual: 10, .. })
        ));

        let long = [0x05, 0x00, 0x06, 0x03, 0xFF, 0xFF, 0xFF, 0x44, 0x02, 0x06, 0x03, 0x00];
        assert!(matches!(
            parse(&long),
            Err(CodecError::BadLength { kind: "confirmation", actual: 12, .. })
        ));
    }

    #[test]
    fn test_parse_confirmation_bad_code() {
        let frame = [0x05, 0x00, 0x06, 0x03, 0xFF, 0xFF, 0x00, 0x44, 0x02, 0x06, 0x03];
        assert_eq!(
            parse_confirmation(&frame),
            Err(CodecError::BadConfirmationCode(0x00))
        );
    }

    #[test]
    fn test_parse_response() {
        let frame = [0x00, 0x00, 0x0A, 0x80, 0xFF, 0xFF, 0x00, 0x40, 0x80, 0x01];
        let response = parse_response(&frame).unwrap();

        assert_eq!(response.address, COORDINATOR_ADDRESS);
        assert_eq!(response.peripheral, PNUM_THERMOMETER);
        assert_eq!(response.request_command(), CMD_THERMOMETER_READ);
        assert_eq!(response.response_code, ResponseCode::NoError);
        assert_eq!(response.dpa_value, 0x40);
        assert_eq!(response.payload, vec![0x80, 0x01]);
    }

    #[test]
    fn test_response_encode_then_parse() {
        let request = led_pulse(0x0A).with_hw_profile(0x1234);

        let ok = Response::for_request(&request, ResponseCode::NoError, 0x33, vec![1, 2, 3]);
        assert_eq!(parse(&ok.encode()).unwrap(), Message::Response(ok.clone()));

        let failed = Response::for_request(&request, ResponseCode::Pcmd, 0x33, vec![1, 2, 3]);
        assert!(failed.payload.is_empty());
        assert_eq!(failed.encode().len(), RESPONSE_MIN_LENGTH);
        assert_eq!(parse(&failed.encode()).unwrap(), Message::Response(failed));

        let user = Response::for_request(&request, ResponseCode::User(0x90), 0, Vec::new());
        assert_eq!(parse(&user.encode()).unwrap(), Message::Response(user));
    }

    #[test]
    fn test_response_error_code_drops_payload() {
        let frame = [0x01, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x05, 0x00, 0xAA, 0xBB];
        let response = parse_response(&frame).unwrap();
        assert_eq!(response.response_code, ResponseCode::DataLen);
        assert!(response.payload.is_empty());
    }

    #[test]
    fn test_parse_response_bad_length() {
        let mut frame = vec![0x01, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x00];
        assert!(matches!(
            parse_response(&frame),
            Err(CodecError::BadLength { kind: "response", actual: 7, .. })
        ));

        frame.push(0x00);
        assert!(parse_response(&frame).is_ok());

        frame.extend_from_slice(&[0u8; PDATA_MAX_LENGTH]);
        assert_eq!(frame.len(), RESPONSE_MAX_LENGTH);
        assert!(parse_response(&frame).is_ok());

        frame.push(0x00);
        assert!(matches!(
            parse(&frame),
            Err(CodecError::BadLength { kind: "response", .. })
        ));
    }

    #[test]
    fn test_parse_too_short() {
        assert!(matches!(parse(&[]), Err(CodecError::BadLength { actual: 0, .. })));
        assert!(matches!(
            parse(&[0x01, 0x00, 0x06, 0x83, 0xFF, 0xFF]),
            Err(CodecError::BadLength { actual: 6, .. })
        ));
    }

    #[test]
    fn test_parse_response_missing_flag() {
        let frame = [0x01, 0x00, 0x06, 0x03, 0xFF, 0xFF, 0x00, 0x00];
        assert_eq!(parse(&frame), Err(CodecError::MalformedCommandFlag(0x03)));
    }

    #[test]
    fn test_parse_response_unknown_code() {
        let frame = [0x01, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x0B, 0x00];
        assert_eq!(parse(&frame), Err(CodecError::UnknownResponseCode(0x0B)));

        let frame = [0x01, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0x7F, 0x00];
        assert_eq!(parse(&frame), Err(CodecError::UnknownResponseCode(0x7F)));
    }

    #[test]
    fn test_parse_response_confirmation_code() {
        let frame = [0x01, 0x00, 0x06, 0x83, 0xFF, 0xFF, 0xFF, 0x00];
        assert_eq!(
            parse_response(&frame),
            Err(CodecError::UnexpectedConfirmationCode)
        );
    }
}
