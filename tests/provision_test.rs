//! Provisioning sessions replayed against scripted device transcripts.

use std::{
    cell::RefCell,
    collections::VecDeque,
    io::{self, Read, Write},
    rc::Rc,
    time::Duration,
};

use pretty_assertions::assert_eq;

use floracom::{
    Link, Outcome, ProvisionError, ProvisioningConfig, ProvisioningConfigBuilder, SensorType,
    Session, Settings, SettingsBuilder,
};

// =============================================================================
// Scripted device
// =============================================================================

enum Step {
    Bytes(Vec<u8>),
    Timeout,
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct Wire {
    incoming: VecDeque<Step>,
    written: Vec<u8>,
    control: Vec<String>,
    fail_writes: bool,
    fail_reset: bool,
}

/// A device replaying a transcript. Once the transcript is exhausted the link
/// reads as closed.
#[derive(Clone, Default)]
struct ScriptedDevice(Rc<RefCell<Wire>>);

impl ScriptedDevice {
    fn lines(lines: &[&str]) -> Self {
        let device = ScriptedDevice::default();
        for line in lines {
            device.emit(line);
        }
        device
    }

    fn emit(&self, line: &str) -> &Self {
        self.0
            .borrow_mut()
            .incoming
            .push_back(Step::Bytes(format!("{}\r\n", line).into_bytes()));
        self
    }

    fn step(&self, step: Step) -> &Self {
        self.0.borrow_mut().incoming.push_back(step);
        self
    }

    fn written(&self) -> String {
        String::from_utf8(self.0.borrow().written.clone()).unwrap()
    }

    fn control(&self) -> Vec<String> {
        self.0.borrow().control.clone()
    }
}

impl Read for ScriptedDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.0.borrow_mut();
        match wire.incoming.pop_front() {
            None => Ok(0),
            Some(Step::Timeout) => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "link failure")),
            Some(Step::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    wire.incoming.push_front(Step::Bytes(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.0.borrow_mut();
        if wire.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        wire.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for ScriptedDevice {
    fn set_reset_line(&mut self, level: bool) -> Result<(), serialport::Error> {
        let mut wire = self.0.borrow_mut();
        if wire.fail_reset {
            return Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                "no device",
            ));
        }
        wire.control.push(format!("dtr={}", level));
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), serialport::Error> {
        self.0
            .borrow_mut()
            .control
            .push(format!("timeout={:?}", timeout));
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn settings() -> Settings {
    SettingsBuilder::new()
        .reset_timing(Duration::from_millis(0), Duration::from_millis(0))
        .answer_delay(Duration::from_millis(0))
        .read_timeout(Duration::from_secs(60))
        .finalize()
}

fn config() -> ProvisioningConfig {
    ProvisioningConfigBuilder::new()
        .ssid("garden")
        .password("hunter2")
        .broker_address("10.0.0.2")
        .broker_port(1883)
        .interval(120)
        .sensor_type(SensorType::Bme280)
        .rain_sensor(true)
        .finalize()
}

struct Run {
    result: floracom::Result<Outcome>,
    console: String,
}

fn run_with(
    device: &ScriptedDevice,
    config: ProvisioningConfig,
    settings: Settings,
    operator: &str,
) -> Run {
    let mut operator = io::Cursor::new(operator.as_bytes().to_vec());
    let mut console = Vec::new();
    let result = Session::new(device.clone(), config, settings).run(&mut operator, &mut console);
    Run {
        result,
        console: String::from_utf8(console).unwrap(),
    }
}

fn run(device: &ScriptedDevice) -> Run {
    run_with(device, config(), settings(), "")
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn full_dialog_answers_every_prompt_in_order() {
    let device = ScriptedDevice::lines(&[
        "ESP-ROM:esp32c3-api1-20210207",
        "setup start",
        "enter ssid:",
        "enter password:",
        "enter mqtt ip:",
        "enter mqtt port(1883):",
        "enter monitor interval(sec):",
        "enter sensor type(DHT22|BME280):",
        "Has rain sensor?(yes|no)",
        "Config ssid=garden mqtt=10.0.0.2:1883",
        "enter ssid:",
    ]);

    let run = run(&device);

    assert_eq!(run.result.unwrap(), Outcome::Configured);
    assert_eq!(
        device.written(),
        "garden\nhunter2\n10.0.0.2\n1883\n120\nBME280\nyes\n"
    );
    assert!(run.console.contains("ESP-ROM:esp32c3-api1-20210207\n"));
    assert!(run.console.contains("Config ssid=garden mqtt=10.0.0.2:1883\n"));
}

#[test]
fn device_is_reset_before_the_dialog() {
    let device = ScriptedDevice::lines(&["setup start"]);
    run(&device).result.unwrap();
    assert_eq!(
        device.control(),
        vec!["dtr=false", "dtr=true", "timeout=60s"]
    );
}

#[test]
fn nothing_is_sent_without_the_banner() {
    let device = ScriptedDevice::lines(&[
        "rst:0x1 (POWERON),boot:0xc (SPI_FAST_FLASH_BOOT)",
        "enter ssid:",
        "enter password:",
        "Has rain sensor?",
        "Config ssid=garden",
    ]);

    let run = run(&device);

    assert_eq!(run.result.unwrap(), Outcome::Disconnected);
    assert_eq!(device.written(), "");
    assert!(run.console.contains("enter ssid:\n"));
}

#[test]
fn end_of_stream_after_banner_is_a_success() {
    let device = ScriptedDevice::lines(&["setup start"]);
    let run = run(&device);
    assert_eq!(run.result.unwrap(), Outcome::Disconnected);
    assert_eq!(device.written(), "");
}

#[test]
fn missing_ssid_fails_before_touching_the_device() {
    let device = ScriptedDevice::lines(&["setup start", "enter ssid:"]);
    let config = ProvisioningConfigBuilder::new()
        .broker_address("10.0.0.2")
        .password("hunter2")
        .finalize();

    let run = run_with(&device, config, settings(), "");

    assert!(matches!(run.result, Err(ProvisionError::MissingSsid)));
    assert!(device.control().is_empty());
    assert_eq!(device.written(), "");
}

#[test]
fn missing_ssid_fails_before_opening_the_port() {
    let settings = SettingsBuilder::new()
        .path("/dev/floracom-does-not-exist")
        .finalize();
    let config = ProvisioningConfigBuilder::new()
        .broker_address("10.0.0.2")
        .finalize();

    let result = floracom::configure(&settings, config);

    assert!(matches!(result, Err(ProvisionError::MissingSsid)));
}

#[test]
fn missing_broker_address_is_rejected() {
    let device = ScriptedDevice::lines(&["setup start"]);
    let config = ProvisioningConfigBuilder::new().ssid("garden").finalize();

    let run = run_with(&device, config, settings(), "");

    assert!(matches!(
        run.result,
        Err(ProvisionError::MissingBrokerAddress)
    ));
    assert!(device.control().is_empty());
}

#[test]
fn unknown_lines_are_echoed_and_ignored() {
    let device = ScriptedDevice::lines(&[
        "setup start",
        "enter ssid:",
        "wifi scan: 3 networks",
        "enter password:",
        "Config ssid=garden",
    ]);

    let run = run(&device);

    assert_eq!(run.result.unwrap(), Outcome::Configured);
    assert_eq!(device.written(), "garden\nhunter2\n");
    assert!(run.console.contains("wifi scan: 3 networks\n"));
}

#[test]
fn interval_is_written_in_decimal() {
    let device = ScriptedDevice::lines(&["setup start", "enter monitor interval"]);
    run(&device).result.unwrap();
    assert_eq!(device.written(), "120\n");
}

#[test]
fn rain_sensor_absent_answers_no() {
    let device = ScriptedDevice::lines(&["setup start", "Has rain sensor?"]);
    let config = ProvisioningConfigBuilder::new()
        .ssid("garden")
        .broker_address("10.0.0.2")
        .finalize();

    run_with(&device, config, settings(), "").result.unwrap();

    assert_eq!(device.written(), "no\n");
}

#[test]
fn calibration_waits_for_the_operator() {
    let device = ScriptedDevice::lines(&[
        "setup start",
        "Prepare for calibration",
        "Place the soil moisture sensor in water",
        "Dry the rain sensor",
        "Drop water on the rain sensor",
        "Config ssid=garden",
    ]);

    let run = run_with(&device, config(), settings(), "\n\n\n\n");

    assert_eq!(run.result.unwrap(), Outcome::Configured);
    assert_eq!(device.written(), "\n\n\n\n");
    for instruction in &[
        "ACTION: Remove the soil moisture sensor from the soil and dry it.",
        "ACTION: Place the soil moisture sensor in water",
        "ACTION: Dry the rain sensor",
        "ACTION: Drop water on the rain sensor",
    ] {
        assert!(run.console.contains(instruction), "missing `{}`", instruction);
    }
}

/// A terminal that accepts nothing.
struct BrokenConsole;

impl Write for BrokenConsole {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "console closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "console closed"))
    }
}

#[test]
fn console_failures_do_not_stop_the_dialog() {
    let device = ScriptedDevice::lines(&[
        "setup start",
        "Prepare for calibration",
        "enter ssid:",
        "Config ssid=garden",
    ]);
    let mut operator = io::Cursor::new(b"\n".to_vec());

    let result = Session::new(device.clone(), config(), settings())
        .run(&mut operator, &mut BrokenConsole);

    assert_eq!(result.unwrap(), Outcome::Configured);
    assert_eq!(device.written(), "\ngarden\n");
}

#[test]
fn read_timeouts_are_ignored() {
    let device = ScriptedDevice::default();
    device
        .step(Step::Timeout)
        .emit("setup start")
        .step(Step::Timeout)
        .step(Step::Timeout)
        .emit("enter ssid:")
        .step(Step::Timeout)
        .emit("Config ssid=garden");

    let run = run(&device);

    assert_eq!(run.result.unwrap(), Outcome::Configured);
    assert_eq!(device.written(), "garden\n");
}

#[test]
fn lines_split_across_reads_are_reassembled() {
    let device = ScriptedDevice::default();
    device
        .step(Step::Bytes(b"setup st".to_vec()))
        .step(Step::Bytes(b"art\r\nenter mq".to_vec()))
        .step(Step::Bytes(b"tt ip:\n".to_vec()));

    run(&device).result.unwrap();

    assert_eq!(device.written(), "10.0.0.2\n");
}

#[test]
fn too_many_silent_reads_give_up() {
    let device = ScriptedDevice::lines(&["setup start"]);
    for _ in 0..5 {
        device.step(Step::Timeout);
    }
    let settings = SettingsBuilder::new()
        .reset_timing(Duration::from_millis(0), Duration::from_millis(0))
        .answer_delay(Duration::from_millis(0))
        .max_idle_reads(2)
        .finalize();

    let run = run_with(&device, config(), settings, "");

    assert!(matches!(run.result, Err(ProvisionError::Idle { reads: 2 })));
}

#[test]
fn tty_hangup_after_banner_is_a_disconnection() {
    // `serialport` reports a hung up tty as a broken pipe on read
    let device = ScriptedDevice::lines(&["setup start"]);
    device.step(Step::Fail(io::ErrorKind::BrokenPipe));
    device.emit("enter ssid:");

    let run = run(&device);

    assert_eq!(run.result.unwrap(), Outcome::Disconnected);
    assert_eq!(device.written(), "");
}

#[test]
fn tty_hangup_mid_dialog_is_a_disconnection() {
    let device = ScriptedDevice::lines(&["setup start", "enter ssid:"]);
    device.step(Step::Fail(io::ErrorKind::BrokenPipe));

    let run = run(&device);

    assert_eq!(run.result.unwrap(), Outcome::Disconnected);
    assert_eq!(device.written(), "garden\n");
}

#[test]
fn link_failure_aborts_the_session() {
    let device = ScriptedDevice::lines(&["setup start", "enter ssid:"]);
    device.step(Step::Fail(io::ErrorKind::PermissionDenied));
    device.emit("enter password:");

    let run = run(&device);

    match run.result {
        Err(ProvisionError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(device.written(), "garden\n");
}

#[test]
fn write_failure_aborts_the_session() {
    let device = ScriptedDevice::lines(&["setup start", "enter ssid:", "enter password:"]);
    device.0.borrow_mut().fail_writes = true;

    let run = run(&device);

    assert!(matches!(run.result, Err(ProvisionError::Io(_))));
}

#[test]
fn reset_failure_is_fatal() {
    let device = ScriptedDevice::lines(&["setup start", "enter ssid:"]);
    device.0.borrow_mut().fail_reset = true;

    let run = run(&device);

    assert!(matches!(run.result, Err(ProvisionError::Reset(_))));
    assert_eq!(device.written(), "");
}
