//! States for the `floracom` provisioning state machine.
//!
//! This modules is private and restricted to the
//! [`provision`](crate::provision) scope. The public interface of the
//! provisioning session is provided by [`provision`](crate::provision).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{
    io::{BufRead, Write},
    thread,
};

use hexplay::HexViewBuilder;
use log::{debug, info, log_enabled, trace, warn, Level::Debug};

use super::events::*;
use super::prompts::{self, Prompt, Reply, BANNER};
use crate::{
    error::{ProvisionError, Result},
    line_reader::{is_end_of_stream, read_line},
    settings::{ProvisioningConfig, Settings},
    Link, Outcome,
};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Everything the states share while the dialog runs: the link to the device,
/// the values to push, the session timing and the operator's terminal.
pub(crate) struct Context<'a> {
    pub link: &'a mut dyn Link,
    pub config: &'a ProvisioningConfig,
    pub settings: &'a Settings,
    pub operator: &'a mut dyn BufRead,
    pub console: &'a mut dyn Write,
    /// Consecutive reads that timed out without any data.
    pub idle_reads: u32,
}
impl Context<'_> {
    /// Pull the next non-empty line from the device and echo it.
    ///
    /// Returns `None` when the link reached the end of the stream. Read
    /// timeouts are skipped, unless `max_idle_reads` of them happen in a row.
    pub(crate) fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            match read_line(&mut *self.link) {
                Ok(line) if line.is_empty() => {
                    self.idle_reads += 1;
                    trace!("read timeout #{}", self.idle_reads);
                    if let Some(max) = self.settings.max_idle_reads {
                        if self.idle_reads > max {
                            return Err(ProvisionError::Idle { reads: max });
                        }
                    }
                }
                Ok(line) => {
                    self.idle_reads = 0;
                    self.echo(&line);
                    return Ok(Some(line));
                }
                Err(ref e) if is_end_of_stream(e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn echo(&mut self, line: &str) {
        // The console is for the operator only; failing to print is not a
        // reason to abandon the device half configured.
        if let Err(e) = writeln!(self.console, "{}", line) {
            debug!("console error: {}", e);
        }
        if log_enabled!(Debug) {
            let view = HexViewBuilder::new(line.as_bytes())
                .address_offset(0)
                .row_width(16)
                .finish();
            debug!("\n{}", view);
        }
    }

    /// Send `text` and a line terminator to the device, after the answer
    /// delay.
    fn send(&mut self, text: &str) -> Result<()> {
        thread::sleep(self.settings.answer_delay);
        self.link.write_all(text.as_bytes())?;
        self.link.write_all(b"\n")?;
        self.link.flush()?;
        Ok(())
    }

    /// Print the instruction and block until the operator acknowledges it.
    fn ask_operator(&mut self, instruction: &str) -> Result<()> {
        if let Err(e) = writeln!(self.console, "{}", instruction) {
            debug!("console error: {}", e);
        }
        if let Err(e) = self.console.flush() {
            debug!("console error: {}", e);
        }

        let mut ack = String::new();
        self.operator
            .read_line(&mut ack)
            .map_err(ProvisionError::Operator)?;
        Ok(())
    }

    /// Answer one recognized prompt. Returns `true` when the device confirmed
    /// the configuration.
    fn answer(&mut self, prompt: &Prompt, line: &str) -> Result<bool> {
        match prompt.answer.reply(self.config) {
            Reply::Send(value) => {
                debug!("`{}` -> `{}`", prompt.prefix, value);
                self.send(&value)?;
            }
            Reply::AskOperator(instruction) => {
                self.ask_operator(instruction)?;
                self.send("")?;
            }
            Reply::Finished => {
                if !prompts::confirms_ssid(line, &self.config.ssid) {
                    warn!(
                        "device confirmed `{}` but ssid `{}` was sent",
                        line, self.config.ssid
                    );
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state reads and answers lines until it requests
    /// a transition to a `new state` by returning the appropriate `event`.
    fn run(&mut self, ctx: &mut Context<'_>) -> Event;
}

/// End of stream while in the dialog is what a device rebooting with its new
/// configuration looks like.
fn disconnected() -> Event {
    info!("End of stream, assuming config finished or device disconnected.");
    Event::done(Ok(Outcome::Disconnected))
}

// AwaitingStart State =========================================================

/// The initial state: the device is booting and prints whatever it wants.
/// Every line is echoed and ignored until the `setup start` banner.
///
///  * **[`StartEvent`] => `AnsweringState`** when the banner is seen,
///  * **[`DoneEvent`] => `DoneState`** on end of stream or link errors.
#[derive(Debug)]
pub(crate) struct AwaitingStartState {}
impl Runnable for AwaitingStartState {
    fn run(&mut self, ctx: &mut Context<'_>) -> Event {
        info!("=> Awaiting Start");
        loop {
            match ctx.next_line() {
                Ok(Some(line)) => {
                    if line.starts_with(BANNER) {
                        return Event::Start(StartEvent { banner: line });
                    }
                }
                Ok(None) => return disconnected(),
                Err(e) => return Event::done(Err(e)),
            }
        }
    }
}

// Answering State =============================================================

/// The device is in configuration mode and prompts for values. Recognized
/// prompts are answered, anything else is only echoed.
///
///  * **[`DoneEvent`] => `DoneState`** when the device confirms the
///    configuration, on end of stream, or on link errors.
#[derive(Debug)]
pub(crate) struct AnsweringState {
    /// Number of prompts answered so far.
    pub answered: usize,
}
impl Runnable for AnsweringState {
    fn run(&mut self, ctx: &mut Context<'_>) -> Event {
        info!("=> Answering");
        loop {
            let line = match ctx.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return disconnected(),
                Err(e) => return Event::done(Err(e)),
            };
            let prompt = match prompts::lookup(&line) {
                Some(prompt) => prompt,
                None => {
                    trace!("no prompt matches `{}`", line);
                    continue;
                }
            };
            match ctx.answer(prompt, &line) {
                Ok(true) => {
                    info!("Config successful after {} answers.", self.answered);
                    return Event::done(Ok(Outcome::Configured));
                }
                Ok(false) => self.answered += 1,
                Err(e) => return Event::done(Err(e)),
            }
        }
    }
}

// Done State ==================================================================

/// Reached when the dialog is over, successfully or not. Terminal: nothing is
/// read from or written to the device anymore.
#[derive(Debug)]
pub(crate) struct DoneState {
    /// Taken by the state machine when it returns to its caller.
    pub result: Option<Result<Outcome>>,
}
impl DoneState {
    pub(crate) fn finish(&mut self) -> Result<Outcome> {
        let result = self
            .result
            .take()
            .unwrap_or(Ok(Outcome::Disconnected));
        match &result {
            Ok(outcome) => info!("=> Done with no errors ({:?})", outcome),
            Err(e) => info!("=> Done with errors: {}", e),
        }
        result
    }
}
