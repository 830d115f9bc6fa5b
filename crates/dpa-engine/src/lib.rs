//! DPA Request Engine
//!
//! This crate sends DPA requests over a [`Transport`] and waits for the answer
//! the way the mesh delivers it: a confirmation from the coordinator for remote
//! requests, then the response of the addressed device. Waiting windows come
//! from [`dpa_timing::TimingModel`], which keeps learning from the traffic.
//!
//! # Example
//!
//! ```rust,ignore
//! use dpa_engine::{EngineConfig, RequestEngine, TransportRegistry};
//! use dpa_protocol::{Request, PNUM_LEDR, CMD_LED_PULSE};
//!
//! let config = EngineConfig::load(Path::new("engine.yaml"))?;
//! let mut engine = RequestEngine::from_config(&config, &TransportRegistry::with_defaults())?;
//! engine.start()?;
//!
//! let outcome = engine.send(&Request::new(0x01, PNUM_LEDR, CMD_LED_PULSE));
//! ```

mod config;
mod engine;
mod error;
mod inbox;
mod outcome;
pub mod transport;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use outcome::*;
pub use transport::*;
