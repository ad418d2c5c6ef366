//! The duplex byte channel to the device.

use std::{io, time::Duration};

use serialport::SerialPort;

/// What the provisioning session needs from the serial connection: reading
/// and writing bytes, driving the reset control line and bounding reads with
/// a timeout.
///
/// Implemented for the ports opened by the `serialport` crate. Reads that time
/// out must fail with [`io::ErrorKind::TimedOut`]. A closed link reads zero
/// bytes or fails with [`io::ErrorKind::UnexpectedEof`], or with
/// [`io::ErrorKind::BrokenPipe`] when the tty hangs up as `serialport` reports
/// it; the session treats all three as the end of the stream.
pub trait Link: io::Read + io::Write {
    /// Set the level of the control line wired to the device reset (DTR on
    /// ESP32 boards). `false` holds the device in reset.
    fn set_reset_line(&mut self, level: bool) -> Result<(), serialport::Error>;

    /// Set the maximum time a single read waits for data.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), serialport::Error>;
}

impl Link for Box<dyn SerialPort> {
    fn set_reset_line(&mut self, level: bool) -> Result<(), serialport::Error> {
        self.write_data_terminal_ready(level)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), serialport::Error> {
        self.set_timeout(timeout)
    }
}
