//! `floracom` provisioning state machine.
//!
//! After a reset, the flora firmware prints its boot messages, then the
//! `setup start` banner, then one prompt per configuration value. Each prompt
//! is answered on the same serial link until the firmware confirms the new
//! configuration with a `Config ssid=...` line and reboots.
//!
//! ```text
//!                    START
//!                      |
//!                   (reset)
//!                      v
//!             .----------------.  other lines
//!             | AwaitingStart  |<-----.
//!             '----------------'------'
//!                |          |
//!         "setup start"    EOF / error
//!                v          |
//!             .-----------. |   prompt -> answer
//!             | Answering |-+------.
//!             '-----------'<-------'
//!                |          |
//!        "Config ssid="   EOF / error
//!                v          v
//!             .----------------.
//!             |      Done      |
//!             '----------------'
//! ```

use std::{
    io::{BufRead, Write},
    thread,
};

use log::{debug, info};

use super::events::*;
use super::states::*;
use crate::{
    error::{ProvisionError, Result},
    settings::{ProvisioningConfig, Settings},
    Link,
};

// =============================================================================
// Public Interface
// =============================================================================

/// How a provisioning session that did not fail came to an end.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// The device confirmed the configuration.
    Configured,
    /// The link was closed during the dialog, which is what a device
    /// rebooting after being configured looks like.
    Disconnected,
}

/// One run of the configuration dialog over one serial link.
///
/// **Example**
/// ```no_run
/// use std::io;
/// use floracom::{ProvisioningConfigBuilder, Session, SettingsBuilder};
///
/// let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
/// let config = ProvisioningConfigBuilder::new()
///     .ssid("garden")
///     .broker_address("192.168.1.10")
///     .finalize();
/// let port = serialport::new("/dev/ttyUSB0", settings.baud_rate).open().unwrap();
///
/// let stdin = io::stdin();
/// let outcome = Session::new(port, config, settings).run(&mut stdin.lock(), &mut io::stdout());
/// println!("{:?}", outcome);
/// ```
pub struct Session<L: Link> {
    link: L,
    config: ProvisioningConfig,
    settings: Settings,
}
impl<L: Link> Session<L> {
    pub fn new(link: L, config: ProvisioningConfig, settings: Settings) -> Self {
        Session {
            link,
            config,
            settings,
        }
    }

    /// Reset the device and drive the dialog to its end.
    ///
    /// `operator` provides the acknowledgements for the calibration steps and
    /// `console` receives every device line and operator instruction. The
    /// link is closed when the session returns, whatever the outcome.
    pub fn run(mut self, operator: &mut dyn BufRead, console: &mut dyn Write) -> Result<Outcome> {
        self.config.validate()?;
        self.reset()?;

        let mut ctx = Context {
            link: &mut self.link,
            config: &self.config,
            settings: &self.settings,
            operator,
            console,
            idle_reads: 0,
        };

        let mut sm = ProvisionStates::AwaitingStart(ProvisionSM::new());
        loop {
            sm = sm.step(&mut ctx);
            if let ProvisionStates::Done(done) = &mut sm {
                return done.state.finish();
            }
        }
    }

    /// Pulse the reset line to reboot the device into configuration mode,
    /// then arm the read timeout for the dialog.
    fn reset(&mut self) -> Result<()> {
        info!("Resetting the device");
        self.link
            .set_reset_line(false)
            .map_err(ProvisionError::Reset)?;
        thread::sleep(self.settings.reset_settle);
        self.link
            .set_reset_line(true)
            .map_err(ProvisionError::Reset)?;
        thread::sleep(self.settings.reset_boot);

        debug!("read timeout: {:?}", self.settings.read_timeout);
        self.link
            .set_read_timeout(self.settings.read_timeout)
            .map_err(ProvisionError::Reset)
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine driving the dialog. The shared data lives in the
/// [`Context`] handed to each step.
#[derive(Debug)]
struct ProvisionSM<S> {
    state: S,
}
impl<S: Runnable> ProvisionSM<S> {
    fn run(&mut self, ctx: &mut Context<'_>) -> Event {
        self.state.run(ctx)
    }
}

/// The state machine starts in the `AwaitingStartState`.
impl ProvisionSM<AwaitingStartState> {
    fn new() -> Self {
        ProvisionSM {
            state: AwaitingStartState {},
        }
    }
}

enum ProvisionStates {
    AwaitingStart(ProvisionSM<AwaitingStartState>),
    Answering(ProvisionSM<AnsweringState>),
    Done(ProvisionSM<DoneState>),
}
impl ProvisionStates {
    /// Run the current state and turn the event it returns into the next
    /// state. Only transitions with a `From` implementation compile.
    fn step(self, ctx: &mut Context<'_>) -> Self {
        match self {
            ProvisionStates::AwaitingStart(mut sm) => match sm.run(ctx) {
                Event::Start(ev) => ProvisionStates::Answering(ev.into()),
                Event::Done(ev) => ProvisionStates::Done(ev.into()),
            },
            ProvisionStates::Answering(mut sm) => match sm.run(ctx) {
                Event::Done(ev) => ProvisionStates::Done(ev.into()),
                event => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
            },
            ProvisionStates::Done(sm) => ProvisionStates::Done(sm),
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<StartEvent> for ProvisionSM<AnsweringState> {
    fn from(event: StartEvent) -> ProvisionSM<AnsweringState> {
        debug!("synchronized on `{}`", event.banner);
        ProvisionSM {
            state: AnsweringState { answered: 0 },
        }
    }
}

impl From<DoneEvent> for ProvisionSM<DoneState> {
    fn from(event: DoneEvent) -> ProvisionSM<DoneState> {
        ProvisionSM {
            state: DoneState {
                result: Some(event.result),
            },
        }
    }
}
