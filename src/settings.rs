//! Settings related to the `floracom` serial port, the provisioning session
//! timing and the configuration pushed to the device.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::{fmt, str::FromStr, time::Duration};

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::error::{ProvisionError, Result};

// =============================================================================
// Public Interface
// =============================================================================

// Settings ====================================================================

/// Groups all settings related to the serial port used by `floracom` and to
/// the pacing of the provisioning session, and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Number of bits used to represent a character sent on the line.
    pub data_bits: DataBits,
    /// The type of signalling to use for controlling data transfer.
    pub flow_control: FlowControl,
    /// The type of parity to use for error checking.
    pub parity: Parity,
    /// Number of bits to use to signal the end of a character.
    pub stop_bits: StopBits,

    /// How long DTR is held low when resetting the device.
    pub reset_settle: Duration,
    /// How long to wait after DTR goes high again for the device to boot.
    pub reset_boot: Duration,
    /// Timeout of a single read on the serial port. A read that times out
    /// yields an empty line which the session ignores.
    pub read_timeout: Duration,
    /// Delay before answering a recognized prompt. The firmware is not
    /// necessarily listening right after it printed the prompt.
    pub answer_delay: Duration,
    /// When set, the session gives up after that many consecutive read
    /// timeouts. Unbounded otherwise.
    pub max_idle_reads: Option<u32>,

    /// Path to `esptool` (or `esptool.py`). When not set, `floracom` looks for
    /// `esptool` in the `PATH` and then in the current directory.
    pub esptool: Option<String>,
    /// Directory holding the firmware images to be flashed.
    pub firmware_dir: String,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// use floracom::SettingsBuilder;
///
/// let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
/// assert_eq!(settings.baud_rate, 115_200);
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: 115_200,
                data_bits: DataBits::Eight,
                flow_control: FlowControl::None,
                parity: Parity::None,
                stop_bits: StopBits::One,
                reset_settle: Duration::from_millis(500),
                reset_boot: Duration::from_millis(1000),
                read_timeout: Duration::from_secs(60),
                answer_delay: Duration::from_millis(100),
                max_idle_reads: None,
                esptool: None,
                firmware_dir: ".".into(),
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the number of bits used to represent a character sent on the line
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.settings.data_bits = data_bits;
        self
    }

    /// Set the type of signalling to use for controlling data transfer
    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    /// Set the type of parity to use for error checking
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// Set the number of bits to use to signal the end of a character
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    /// Set how long DTR stays low, then how long the device gets to boot
    pub fn reset_timing(mut self, settle: Duration, boot: Duration) -> Self {
        self.settings.reset_settle = settle;
        self.settings.reset_boot = boot;
        self
    }

    /// Set the timeout of a single read on the serial port
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.settings.read_timeout = read_timeout;
        self
    }

    /// Set the delay before answering a prompt
    pub fn answer_delay(mut self, answer_delay: Duration) -> Self {
        self.settings.answer_delay = answer_delay;
        self
    }

    /// Give up after `reads` consecutive read timeouts
    pub fn max_idle_reads(mut self, reads: u32) -> Self {
        self.settings.max_idle_reads = Some(reads);
        self
    }

    /// Set the path to the esptool executable or script
    pub fn esptool<'a>(mut self, esptool: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.esptool = Some(esptool.into().as_ref().to_owned());
        self
    }

    /// Set the directory holding the firmware images
    pub fn firmware_dir<'a>(mut self, dir: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.firmware_dir = dir.into().as_ref().to_owned();
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// SensorType ==================================================================

/// The temperature and humidity sensor fitted on the device.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SensorType {
    Dht22,
    Bme280,
}
impl SensorType {
    /// The tag the firmware expects for this sensor.
    pub fn tag(self) -> &'static str {
        match self {
            SensorType::Dht22 => "DHT22",
            SensorType::Bme280 => "BME280",
        }
    }
}
impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
impl FromStr for SensorType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DHT22" => Ok(SensorType::Dht22),
            "BME280" => Ok(SensorType::Bme280),
            _ => Err(format!("unknown sensor type `{}`", s)),
        }
    }
}

// ProvisioningConfig ==========================================================

/// The values written to the device during the configuration dialog.
///
/// Built once with [`ProvisioningConfigBuilder`] and never mutated afterwards.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProvisioningConfig {
    /// The wifi network the device joins.
    pub ssid: String,
    /// The wifi password.
    pub password: String,
    /// The MQTT broker IP address.
    pub broker_address: String,
    /// The MQTT broker port.
    pub broker_port: u16,
    /// How often the device reports, in seconds.
    pub interval: u32,
    /// The temperature and humidity sensor type.
    pub sensor_type: SensorType,
    /// Whether a rain sensor is attached.
    pub has_rain_sensor: bool,

    #[doc(hidden)]
    _private_use_builder: (),
}
impl ProvisioningConfig {
    /// Check that the values the device cannot work without are present.
    pub fn validate(&self) -> Result<()> {
        if self.ssid.is_empty() {
            return Err(ProvisionError::MissingSsid);
        }
        if self.broker_address.is_empty() {
            return Err(ProvisionError::MissingBrokerAddress);
        }
        Ok(())
    }
}

/// The builder for [`ProvisioningConfig`].
///
/// **Example**
///
/// ```
/// use floracom::ProvisioningConfigBuilder;
///
/// let config = ProvisioningConfigBuilder::new()
///     .ssid("garden")
///     .broker_address("192.168.1.10")
///     .finalize();
/// assert!(config.validate().is_ok());
/// ```
pub struct ProvisioningConfigBuilder {
    config: ProvisioningConfig,
}
impl ProvisioningConfigBuilder {
    /// Start with an empty ssid, password and broker address, the default
    /// MQTT port (1883), a 60 seconds interval, a DHT22 sensor and no rain
    /// sensor.
    pub fn new() -> Self {
        ProvisioningConfigBuilder {
            config: ProvisioningConfig {
                ssid: String::new(),
                password: String::new(),
                broker_address: String::new(),
                broker_port: 1883,
                interval: 60,
                sensor_type: SensorType::Dht22,
                has_rain_sensor: false,
                _private_use_builder: (),
            },
        }
    }

    pub fn ssid<'a>(mut self, ssid: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.config.ssid = ssid.into().into_owned();
        self
    }

    pub fn password<'a>(mut self, password: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.config.password = password.into().into_owned();
        self
    }

    pub fn broker_address<'a>(mut self, address: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.config.broker_address = address.into().into_owned();
        self
    }

    pub fn broker_port(mut self, port: u16) -> Self {
        self.config.broker_port = port;
        self
    }

    /// Set the report interval in seconds
    pub fn interval(mut self, interval: u32) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn sensor_type(mut self, sensor_type: SensorType) -> Self {
        self.config.sensor_type = sensor_type;
        self
    }

    pub fn rain_sensor(mut self, present: bool) -> Self {
        self.config.has_rain_sensor = present;
        self
    }

    pub fn finalize(self) -> ProvisioningConfig {
        self.config
    }
}
impl Default for ProvisioningConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            reset_settle: Duration::from_millis(500),
            reset_boot: Duration::from_millis(1000),
            read_timeout: Duration::from_secs(60),
            answer_delay: Duration::from_millis(100),
            max_idle_reads: None,
            esptool: None,
            firmware_dir: ".".into(),
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn session_timing() {
    let settings = SettingsBuilder::new()
        .reset_timing(Duration::from_millis(10), Duration::from_millis(20))
        .read_timeout(Duration::from_secs(5))
        .answer_delay(Duration::from_millis(0))
        .max_idle_reads(3)
        .finalize();
    assert_eq!(settings.reset_settle, Duration::from_millis(10));
    assert_eq!(settings.reset_boot, Duration::from_millis(20));
    assert_eq!(settings.read_timeout, Duration::from_secs(5));
    assert_eq!(settings.answer_delay, Duration::from_millis(0));
    assert_eq!(settings.max_idle_reads, Some(3));
}

#[test]
fn esptool_and_firmware_dir() {
    let settings = SettingsBuilder::new()
        .esptool("/opt/esptool.py")
        .firmware_dir("build")
        .finalize();
    assert_eq!(settings.esptool.unwrap(), "/opt/esptool.py");
    assert_eq!(settings.firmware_dir, "build");
}

#[test]
fn config_defaults() {
    let config = ProvisioningConfigBuilder::new().finalize();
    assert_eq!(config.broker_port, 1883);
    assert_eq!(config.interval, 60);
    assert_eq!(config.sensor_type, SensorType::Dht22);
    assert!(!config.has_rain_sensor);
}

#[test]
fn config_without_ssid_is_rejected() {
    let config = ProvisioningConfigBuilder::new()
        .broker_address("10.0.0.2")
        .password("secret")
        .finalize();
    assert!(matches!(
        config.validate(),
        Err(ProvisionError::MissingSsid)
    ));
}

#[test]
fn config_without_broker_is_rejected() {
    let config = ProvisioningConfigBuilder::new().ssid("garden").finalize();
    assert!(matches!(
        config.validate(),
        Err(ProvisionError::MissingBrokerAddress)
    ));
}

#[test]
fn sensor_type_tags() {
    assert_eq!("bme280".parse::<SensorType>(), Ok(SensorType::Bme280));
    assert_eq!("DHT22".parse::<SensorType>(), Ok(SensorType::Dht22));
    assert!("SHT31".parse::<SensorType>().is_err());
    assert_eq!(SensorType::Bme280.to_string(), "BME280");
}
