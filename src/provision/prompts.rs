//! The prompts the flora firmware prints during setup and how each one is
//! answered.
//!
//! Prompts are matched by prefix, in table order, and the first match wins.
//! Supporting a new prompt is a matter of adding an entry to [`PROMPTS`].

use crate::settings::ProvisioningConfig;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Line printed by the firmware when it enters configuration mode.
pub(crate) const BANNER: &str = "setup start";

/// Prefix of the line the firmware prints once the configuration is saved.
pub(crate) const SUCCESS_MARKER: &str = "Config ssid=";

/// How a recognized prompt is answered.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Answer {
    Ssid,
    Password,
    BrokerAddress,
    BrokerPort,
    Interval,
    SensorType,
    RainSensor,
    /// Show the instruction to the operator, wait for the acknowledgement and
    /// send an empty line.
    Operator(&'static str),
    /// The configuration was accepted by the device.
    Finished,
}

/// What the session does in response to a prompt.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Reply {
    /// Send the value followed by a line terminator.
    Send(String),
    /// Ask the operator, then send a bare line terminator.
    AskOperator(&'static str),
    Finished,
}

impl Answer {
    pub(crate) fn reply(self, config: &ProvisioningConfig) -> Reply {
        match self {
            Answer::Ssid => Reply::Send(config.ssid.clone()),
            Answer::Password => Reply::Send(config.password.clone()),
            Answer::BrokerAddress => Reply::Send(config.broker_address.clone()),
            Answer::BrokerPort => Reply::Send(config.broker_port.to_string()),
            Answer::Interval => Reply::Send(config.interval.to_string()),
            Answer::SensorType => Reply::Send(config.sensor_type.tag().into()),
            Answer::RainSensor => {
                Reply::Send(if config.has_rain_sensor { "yes" } else { "no" }.into())
            }
            Answer::Operator(instruction) => Reply::AskOperator(instruction),
            Answer::Finished => Reply::Finished,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Prompt {
    pub prefix: &'static str,
    pub answer: Answer,
}

pub(crate) const PROMPTS: &[Prompt] = &[
    Prompt {
        prefix: "enter ssid:",
        answer: Answer::Ssid,
    },
    Prompt {
        prefix: "enter password:",
        answer: Answer::Password,
    },
    Prompt {
        prefix: "enter mqtt ip:",
        answer: Answer::BrokerAddress,
    },
    Prompt {
        prefix: "enter mqtt port",
        answer: Answer::BrokerPort,
    },
    Prompt {
        prefix: "enter monitor interval",
        answer: Answer::Interval,
    },
    Prompt {
        prefix: "enter sensor type",
        answer: Answer::SensorType,
    },
    Prompt {
        prefix: "Has rain sensor?",
        answer: Answer::RainSensor,
    },
    Prompt {
        prefix: "Prepare for calibration",
        answer: Answer::Operator(
            "ACTION: Remove the soil moisture sensor from the soil and dry it. \
             Then press the <Enter> key.",
        ),
    },
    Prompt {
        prefix: "Place the soil moisture sensor in water",
        answer: Answer::Operator(
            "ACTION: Place the soil moisture sensor in water, then press the <Enter> key.",
        ),
    },
    Prompt {
        prefix: "Dry the rain sensor",
        answer: Answer::Operator("ACTION: Dry the rain sensor, then press the <Enter> key."),
    },
    Prompt {
        prefix: "Drop water on the rain sensor",
        answer: Answer::Operator(
            "ACTION: Drop water on the rain sensor, then press the <Enter> key.",
        ),
    },
    Prompt {
        prefix: SUCCESS_MARKER,
        answer: Answer::Finished,
    },
];

/// Find the first prompt whose prefix starts `line`.
pub(crate) fn lookup(line: &str) -> Option<&'static Prompt> {
    PROMPTS.iter().find(|p| line.starts_with(p.prefix))
}

/// Whether the ssid echoed in the success line matches the configured one.
pub(crate) fn confirms_ssid(line: &str, ssid: &str) -> bool {
    line.strip_prefix(SUCCESS_MARKER)
        .map_or(false, |echoed| echoed.starts_with(ssid))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use crate::settings::{ProvisioningConfigBuilder, SensorType};

#[test]
fn prefixes_are_unambiguous() {
    for (i, a) in PROMPTS.iter().enumerate() {
        for b in PROMPTS.iter().skip(i + 1) {
            assert!(
                !a.prefix.starts_with(b.prefix) && !b.prefix.starts_with(a.prefix),
                "`{}` and `{}` overlap",
                a.prefix,
                b.prefix
            );
        }
    }
}

#[test]
fn prompts_match_by_prefix() {
    assert_eq!(lookup("enter ssid: ").unwrap().answer, Answer::Ssid);
    assert_eq!(
        lookup("enter mqtt port(1883):").unwrap().answer,
        Answer::BrokerPort
    );
    assert_eq!(
        lookup("Config ssid=garden mqtt=10.0.0.2:1883").unwrap().answer,
        Answer::Finished
    );
    assert!(lookup("  enter ssid:").is_none());
    assert!(lookup("ENTER SSID:").is_none());
    assert!(lookup("wifi connecting...").is_none());
}

#[test]
fn replies_render_the_config() {
    let config = ProvisioningConfigBuilder::new()
        .ssid("garden")
        .password("hunter2")
        .broker_address("10.0.0.2")
        .broker_port(8883)
        .interval(120)
        .sensor_type(SensorType::Bme280)
        .rain_sensor(true)
        .finalize();

    let reply = |line: &str| lookup(line).unwrap().answer.reply(&config);

    assert_eq!(reply("enter ssid:"), Reply::Send("garden".into()));
    assert_eq!(reply("enter password:"), Reply::Send("hunter2".into()));
    assert_eq!(reply("enter mqtt ip:"), Reply::Send("10.0.0.2".into()));
    assert_eq!(reply("enter mqtt port"), Reply::Send("8883".into()));
    assert_eq!(reply("enter monitor interval"), Reply::Send("120".into()));
    assert_eq!(reply("enter sensor type"), Reply::Send("BME280".into()));
    assert_eq!(reply("Has rain sensor?"), Reply::Send("yes".into()));
    assert!(matches!(
        reply("Dry the rain sensor"),
        Reply::AskOperator(_)
    ));
    assert_eq!(reply("Config ssid=garden"), Reply::Finished);
}

#[test]
fn no_rain_sensor_answers_no() {
    let config = ProvisioningConfigBuilder::new().finalize();
    assert_eq!(
        Answer::RainSensor.reply(&config),
        Reply::Send("no".into())
    );
}

#[test]
fn success_line_ssid_check() {
    assert!(confirms_ssid("Config ssid=garden", "garden"));
    assert!(confirms_ssid("Config ssid=garden, mqtt=10.0.0.2", "garden"));
    assert!(!confirms_ssid("Config ssid=kitchen", "garden"));
}
