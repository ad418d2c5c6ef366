//! Serial port device manipulation.

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serialport::{available_ports, SerialPort, SerialPortType};

use std::{
    io::{self, Read, Write},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use crate::{
    error::{ProvisionError, Result},
    line_reader::{is_end_of_stream, read_line},
    utils::poll_escape,
    Link, Settings,
};

//==============================================================================
// Public Interface
//==============================================================================

/// A serial port detected on the system.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PortEntry {
    pub name: String,
    /// Vendor id, product id and serial number of USB adapters.
    pub usb: Option<(u16, u16, Option<String>)>,
}
impl PortEntry {
    /// `name (vid/pid:serial)` for USB adapters, the bare name otherwise.
    pub fn describe(&self) -> String {
        match &self.usb {
            Some((vid, pid, serial)) => format!(
                "{} ({:04x}/{:04x}:{})",
                self.name,
                vid,
                pid,
                serial.as_deref().unwrap_or("")
            ),
            None => self.name.clone(),
        }
    }
}

/// Enumerates the serial devices on the system.
pub(crate) fn enumerate_ports() -> Result<Vec<PortEntry>> {
    let ports = available_ports().map_err(ProvisionError::Enumerate)?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => PortEntry {
                name: p.port_name,
                usb: Some((info.vid, info.pid, info.serial_number)),
            },
            // Virtual ports are kept, they are handy for testing
            _ => PortEntry {
                name: p.port_name,
                usb: None,
            },
        })
        .collect())
}

/// Decide which port to use: the one in `settings` once it shows up, or one
/// selected interactively by the user.
pub(crate) fn resolve_port(settings: &Settings) -> Result<String> {
    if let Some(path) = &settings.path {
        if !wait_for_port(path) {
            return Ok(path.clone());
        }
        info!("waiting for {} cancelled, selecting another port", path);
    }
    loop {
        if let Some(path) = select_port()? {
            return Ok(path);
        }
    }
}

/// Open the port at `path` with the line settings from `settings`, and raise
/// DTR and RTS so the device is not held in reset.
pub(crate) fn open_and_setup_port(path: &str, settings: &Settings) -> Result<Box<dyn SerialPort>> {
    let open_error = |source| ProvisionError::Open {
        path: path.to_owned(),
        source,
    };

    let mut port = serialport::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .stop_bits(settings.stop_bits)
        .parity(settings.parity)
        .flow_control(settings.flow_control)
        .timeout(settings.read_timeout)
        .open()
        .map_err(open_error)?;

    port.write_request_to_send(true).map_err(open_error)?;
    port.write_data_terminal_ready(true).map_err(open_error)?;

    info!("Connected to {} at {} baud", path, settings.baud_rate);
    debug!("data_bits    : {:?}", settings.data_bits);
    debug!("stop_bits    : {:?}", settings.stop_bits);
    debug!("parity       : {:?}", settings.parity);
    debug!("flow control : {:?}", settings.flow_control);

    Ok(port)
}

/// Reboot the device by holding its reset line low for `hold`.
pub(crate) fn reset_device(link: &mut dyn Link, hold: Duration) -> Result<()> {
    link.set_reset_line(false).map_err(ProvisionError::Reset)?;
    thread::sleep(hold);
    link.set_reset_line(true).map_err(ProvisionError::Reset)
}

/// Print every line coming from the device until the link closes.
pub(crate) fn monitor<R: Read + ?Sized>(conn: &mut R, console: &mut dyn Write) -> Result<()> {
    loop {
        match read_line(conn) {
            Ok(line) if line.is_empty() => {}
            Ok(line) => writeln!(console, "{}", line)?,
            Err(ref e) if is_end_of_stream(e) => {
                info!("End of stream, device disconnected.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

//==============================================================================
// Private stuff
//==============================================================================

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            // For more spinners check out the cli-spinners project:
            // https://github.com/sindresorhus/cli-spinners/blob/master/spinners.json
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[FC] {spinner:.blue} {msg}"),
    );
    pb
}

/// Wait until at least one serial port is present, then let the user pick
/// one. Returns `None` when the user cancels the selection, so the list can be
/// refreshed.
fn select_port() -> Result<Option<String>> {
    let pb = spinner();
    let mut waited: usize = 0;

    let _ = Term::stdout().hide_cursor();
    let found_ports = loop {
        let ports = enumerate_ports()?;
        if !ports.is_empty() {
            pb.finish_with_message("Select the port the flora sensor is on:");
            break ports;
        }
        pb.set_message(format!(
            "[{:03}s] ⌛ Waiting for a serial adapter to be connected...",
            style(waited).dim(),
        ));
        thread::sleep(Duration::from_secs(1));
        waited += 1;
    };
    let _ = Term::stdout().show_cursor();

    let selection = select_port_interactive(&found_ports)?;
    match &selection {
        Some(path) => {
            pb.finish_with_message(format!("👍 Serial port {} is ready", style(path).green()));
        }
        None => {
            pb.finish_with_message("❌ Selection canceled -> refreshing...");
        }
    }
    Ok(selection)
}

fn select_port_interactive(ports: &[PortEntry]) -> Result<Option<String>> {
    use dialoguer::{theme::ColorfulTheme, Select};

    let term = Term::buffered_stderr();
    let theme = ColorfulTheme::default();

    let mut select = Select::with_theme(&theme);
    for port in ports {
        select.item(port.describe());
    }

    let selection = select
        .default(0)
        .interact_on_opt(&term)
        .map_err(ProvisionError::Operator)?;
    Ok(selection.and_then(|i| ports.get(i)).map(|p| p.name.clone()))
}

/// Check for a device with the given path in the system. If not immediately
/// found, check again every couple of seconds until it shows up. The user can
/// cancel the wait by pressing the `ESC` key.
///
/// Returns `true` when the wait was cancelled.
fn wait_for_port(path: &str) -> bool {
    let waiting_period: u64 = 2;

    if is_port_present(path) {
        return false;
    }

    let pb = spinner();
    pb.set_message(format!(
        "⏳ Waiting for {} to be plugged in (ESC to cancel)...",
        style(path).cyan()
    ));

    // The main thread polls the system ports while another one watches the
    // keyboard for `ESC`. `cancel` goes from the watcher to the main thread,
    // `done` the other way around, so each side knows when to stop.
    let (cancel_tx, cancel_rx) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let watcher = thread::spawn(move || loop {
        if done_rx.try_recv().is_ok() {
            break;
        }
        if let Ok(true) = poll_escape() {
            let _ = cancel_tx.send(());
            break;
        }
    });

    let mut waited = 0;
    let cancelled = loop {
        match cancel_rx.recv_timeout(Duration::from_secs(waiting_period)) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                pb.finish_with_message(format!(
                    "❌ Waiting on port {} canceled after {} seconds",
                    style(path).cyan(),
                    style(waited).dim()
                ));
                break true;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        waited += waiting_period;

        if is_port_present(path) {
            let _ = done_tx.send(());
            pb.finish_with_message(format!("👍 Serial port {} is ready", style(path).green()));
            break false;
        }
        pb.set_message(format!(
            "[{:03}s] ⏳ Waiting for {} to be plugged in (ESC to cancel)...",
            style(waited).dim(),
            style(path).cyan()
        ));
    };

    if watcher.join().is_err() {
        debug!("the keyboard watcher thread panicked");
    }
    cancelled
}

fn is_port_present(path: &str) -> bool {
    match enumerate_ports() {
        Ok(ports) => ports.iter().any(|p| p.name == path),
        Err(e) => {
            info!("error: {}", e);
            false
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

#[test]
fn describe_usb_adapter() {
    let port = PortEntry {
        name: "/dev/ttyACM0".into(),
        usb: Some((0x303a, 0x1001, Some("F4:12:FA".into()))),
    };
    assert_eq!(port.describe(), "/dev/ttyACM0 (303a/1001:F4:12:FA)");
}

#[test]
fn describe_virtual_port() {
    let port = PortEntry {
        name: "/dev/pts/3".into(),
        usb: None,
    };
    assert_eq!(port.describe(), "/dev/pts/3");
}

#[test]
fn monitor_prints_lines_until_eof() {
    let mut conn = io::Cursor::new(b"boot\r\n\r\nsetup start\nenter ssid:".to_vec());
    let mut console = Vec::new();
    monitor(&mut conn, &mut console).unwrap();
    assert_eq!(
        String::from_utf8(console).unwrap(),
        "boot\nsetup start\nenter ssid:\n"
    );
}
