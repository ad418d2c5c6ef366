//! Events for the `floracom` provisioning state machine.
//!
//! This modules is private and restricted to the
//! [`provision`](crate::provision) scope.
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::{error::Result, Outcome};

// =============================================================================
// Crate-Public Interface
// =============================================================================

// StartEvent ==================================================================

/// Event fired to trigger a transition to the `Answering` state.
///
/// It happens only while at the `AwaitingStart` state, when the device prints
/// the `setup start` banner.
#[derive(Debug)]
pub(crate) struct StartEvent {
    /// The banner line as printed by the device.
    pub banner: String,
}

// DoneEvent ===================================================================

/// Event fired when the dialog is over, triggering the transition to the
/// `Done` state.
///
/// This event can happen at any state: after the device confirmed the
/// configuration, when the link was closed, or because of an unrecoverable
/// error.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub result: Result<Outcome>,
}

// Events enum =================================================================

/// Events that can be triggered within the provisioning state machine.
#[derive(Debug)]
pub(crate) enum Event {
    Start(StartEvent),
    Done(DoneEvent),
}
impl Event {
    pub(crate) fn done(result: Result<Outcome>) -> Self {
        Event::Done(DoneEvent { result })
    }
}
