//! Floracom is a utility to set up ESP32 based flora sensors over their USB
//! serial connection: it flashes the firmware, then walks the device through
//! its configuration dialog (wifi, MQTT broker, reporting interval, sensors and
//! their calibration) without having to type anything in a serial terminal.
//!
//! The configuration dialog is driven by the device. After a reset, the
//! firmware prints a `setup start` banner followed by one prompt per value it
//! needs, and waits for an answer line to each of them. `floracom` recognizes
//! the prompts by their prefix and answers from a [`ProvisioningConfig`]. The
//! calibration prompts require the sensors to be handled, so those are
//! forwarded to the operator who acknowledges them with the `<Enter>` key.
//!
//! The dialog is implemented as a state machine in terms of **states** and
//! **transitions** between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * Data shared by all states (the serial link, the configuration) is handed
//!   to each state when it runs.
//! * Transitions between states are triggered via typed **events** and only
//!   explicitly defined transitions compile.
//! * Transitioning from one state to another consumes the original state.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern: the target state implements `From` for the event that leads to it.

mod commands;
mod error;
mod line_reader;
mod link;
mod provision;
mod settings;
mod utils;

pub use commands::{configure, list, monitor, reset, write};
pub use error::{ProvisionError, Result};
pub use line_reader::read_line;
pub use link::Link;
pub use provision::{Outcome, Session};
pub use settings::{
    ProvisioningConfig, ProvisioningConfigBuilder, SensorType, Settings, SettingsBuilder,
};
pub use utils::PortEntry;
