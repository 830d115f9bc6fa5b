//! DPA Byte-Level Protocol
//!
//! This crate provides the frame layout, the peripheral catalog and the message
//! codec of DPA, the protocol spoken by devices of a coordinator/node wireless
//! mesh. Devices expose numbered peripherals with numbered commands.
//!
//! # Protocol Overview
//!
//! Every frame starts with the same six bytes: node address (NADR), peripheral
//! number (PNUM), peripheral command (PCMD) and hardware profile id (HWPID).
//!
//! - **Requests** (host → mesh): header followed by up to 56 bytes of data
//! - **Confirmations** (coordinator → host): response code `0xFF`, followed by
//!   the routing parameters of a remote request
//! - **Responses** (device → host): command with bit 7 set, response code,
//!   DPA value and, on success, response data
//!
//! # Example
//!
//! ```rust,ignore
//! use dpa_protocol::{parse, Message, Request, PNUM_LEDR, CMD_LED_PULSE};
//!
//! let frame = Request::new(0x01, PNUM_LEDR, CMD_LED_PULSE).encode();
//!
//! match parse(&received)? {
//!     Message::Confirmation(confirmation) => { /* routing info */ }
//!     Message::Response(response) => { /* final answer */ }
//! }
//! ```

mod constants;
mod error;
mod messages;
mod types;

pub use constants::*;
pub use error::*;
pub use messages::*;
pub use types::*;
