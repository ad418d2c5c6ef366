//! `floracom` serial provisioning protocol.
//!
//! **Example** - Provisioning a device over an already open port:
//! ```ignore
//! let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
//! let config = ProvisioningConfigBuilder::new()
//!     .ssid("garden")
//!     .broker_address("192.168.1.10")
//!     .finalize();
//! let port = open_and_setup_port(&settings)?;
//! let outcome = Session::new(port, config, settings).run(&mut operator, &mut console)?;
//! ```

mod events;
mod prompts;
mod state_machine;
mod states;

pub use state_machine::{Outcome, Session};
