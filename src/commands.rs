//! The `floracom` commands, each running over its own serial connection which
//! is closed when the command returns.

use std::{
    io,
    process::ExitStatus,
    time::Duration,
};

use console::style;
use log::info;

use crate::{
    error::Result,
    settings::{ProvisioningConfig, Settings},
    utils::{self, PortEntry},
    Outcome, Session,
};

/// How long `reset` holds the device in reset.
const RESET_PULSE: Duration = Duration::from_millis(100);

/// The serial adapters on the system. USB adapters come with their ids.
pub fn list() -> Result<Vec<PortEntry>> {
    utils::enumerate_ports()
}

/// Echo every line printed by the device until it disconnects.
pub fn monitor(settings: &Settings) -> Result<()> {
    let path = utils::resolve_port(settings)?;
    let mut port = utils::open_and_setup_port(&path, settings)?;
    utils::monitor(&mut port, &mut io::stdout())
}

/// Reset the device and answer its configuration prompts with `config`.
///
/// Calibration steps are acknowledged by the operator on the standard input.
/// The configuration is checked before any port is touched.
pub fn configure(settings: &Settings, config: ProvisioningConfig) -> Result<Outcome> {
    config.validate()?;
    let path = utils::resolve_port(settings)?;
    let port = utils::open_and_setup_port(&path, settings)?;

    println!(
        "[FC] ⚙️  Configuring the device on {}, waiting for it to enter setup...",
        style(&path).cyan()
    );
    let stdin = io::stdin();
    let mut operator = stdin.lock();
    let outcome = Session::new(port, config, settings.clone())
        .run(&mut operator, &mut io::stdout())?;
    info!("Session finished: {:?}", outcome);
    Ok(outcome)
}

/// Reboot the device.
pub fn reset(settings: &Settings) -> Result<()> {
    let path = utils::resolve_port(settings)?;
    let mut port = utils::open_and_setup_port(&path, settings)?;
    utils::reset_device(&mut port, RESET_PULSE)
}

/// Flash the firmware found in the firmware directory with esptool.
pub fn write(settings: &Settings) -> Result<ExitStatus> {
    let path = utils::resolve_port(settings)?;
    utils::write_firmware(&path, settings)
}
