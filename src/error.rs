//! Errors reported by `floracom` commands.

use std::io;

use thiserror::Error;

/// Everything that can make a `floracom` command fail.
///
/// End-of-stream during the configuration dialog is deliberately absent: the
/// device reboots once configured, which closes the link, and that is reported
/// as [`Outcome::Disconnected`](crate::Outcome::Disconnected) instead.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The wifi SSID was not provided.
    #[error("no ssid")]
    MissingSsid,

    /// The MQTT broker address was not provided.
    #[error("no mqtt broker address")]
    MissingBrokerAddress,

    /// No serial port was given or selected.
    #[error("no serial port")]
    NoPort,

    /// The serial port could not be opened or configured.
    #[error("failed to open serial port `{path}`: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Toggling the reset control line (or setting the read timeout) failed.
    #[error("failed to reset the device: {0}")]
    Reset(#[source] serialport::Error),

    /// A read or a write on the serial link failed.
    #[error("serial link error: {0}")]
    Io(#[from] io::Error),

    /// Reading from the operator terminal failed: a calibration
    /// acknowledgement or the interactive port selection.
    #[error("failed to read operator input: {0}")]
    Operator(#[source] io::Error),

    /// The device stayed silent for too many consecutive read timeouts.
    #[error("no data from the device after {reads} read timeouts")]
    Idle { reads: u32 },

    /// Listing the serial ports of the system failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    /// esptool could not be located.
    #[error("esptool not found")]
    ToolNotFound,

    /// esptool is a python script but no python interpreter was found.
    #[error("python not found")]
    PythonNotFound,

    /// esptool could not be started or waited on.
    #[error("failed to run esptool: {0}")]
    Tool(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn terminal_errors_are_not_blamed_on_the_serial_link() {
    let terminal = io::Error::new(io::ErrorKind::Other, "not a terminal");
    let message = ProvisionError::Operator(terminal).to_string();
    assert!(message.starts_with("failed to read operator input"));
    assert!(!message.contains("serial link"));
}
