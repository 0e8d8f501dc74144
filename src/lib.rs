//! Temperature sensor → serial relay.
//!
//! Board independent part of the firmware: the interrupt/loop handshake, the
//! acquisition cycle, the outbound relay, the inbound ring and the display
//! encoder. The RTIC application in `main.rs` wires these to the STM32F103.

#![cfg_attr(not(test), no_std)]

// must come first, the logging macros are textually scoped
#[macro_use]
mod fmt;

pub mod acquisition;
pub mod bus;
pub mod config;
pub mod display;
pub mod error;
pub mod handshake;
pub mod inbound;
pub mod relay;
pub mod sample;
pub mod stream;

pub use acquisition::{Acquisition, Health, HealthState};
pub use bus::{BusStatus, HwError, Reset, TwoWireMaster};
pub use error::{AcquisitionError, RelayError, SetupError};
pub use handshake::{Handshake, Notifier, Observation};
pub use inbound::{Feed, InboundBuffer};
pub use relay::SerialRelay;
pub use sample::Sample;
