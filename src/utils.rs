//! Helpers dealing with the serial ports, the keyboard and the flashing tool.

mod flasher;
mod keyboard;
mod ports;

pub(crate) use flasher::write_firmware;
pub(crate) use keyboard::*;
pub(crate) use ports::{
    enumerate_ports, monitor, open_and_setup_port, reset_device, resolve_port,
};
pub use ports::PortEntry;
