//! Floracom command line interface.

use std::process;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*,
    Arg, ArgMatches, SubCommand,
};
use console::style;
use log::{debug, trace, LevelFilter};
use simplelog::*;

use floracom::{self as fc, Outcome, ProvisionError, SensorType};

fn main() {
    ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        process::exit(0);
    })
    .expect("Failed to install my Ctrl-C handler!");

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Floracom flashes and configures ESP32 flora sensors over their \
            serial port. Options come before the command.\n\
            \n\
            The `config` command resets the device into its setup mode and \
            answers every prompt it prints with the values given on the \
            command line: \n\
               \t* wifi ssid and password \n\
               \t* MQTT broker address and port \n\
               \t* reporting interval \n\
               \t* temperature/humidity sensor type and rain sensor \n\
            \n\
            Calibration steps need the sensors to be handled, `floracom` \
            prints what to do and waits for the <Enter> key.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .setting(SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the serial port the device is on")
                .long_help(
                    "the serial port the device is on; when not set, the \
                     detected ports are offered for selection.",
                )
                .short("t")
                .long("port")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .short("b")
                .long("baud-rate")
                .takes_value(true)
                .default_value("115200"),
        )
        .arg(
            Arg::with_name("ESPTOOL")
                .help("path to esptool")
                .long_help(
                    "path to esptool or esptool.py; when not set, `esptool` is \
                     looked up in the PATH and in the current directory.",
                )
                .long("esptool")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FIRMWARE_DIR")
                .help("directory holding the firmware images")
                .long("firmware-dir")
                .takes_value(true)
                .default_value("."),
        )
        .arg(
            Arg::with_name("SSID")
                .help("wifi ssid")
                .long("ssid")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PASSWORD")
                .help("wifi password")
                .long("password")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MQTT_IP")
                .help("MQTT broker IP address")
                .long("mqtt-ip")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MQTT_PORT")
                .help("MQTT broker port")
                .long("mqtt-port")
                .takes_value(true)
                .default_value("1883"),
        )
        .arg(
            Arg::with_name("INTERVAL")
                .help("MQTT send interval (sec)")
                .long("interval")
                .takes_value(true)
                .default_value("60"),
        )
        .arg(
            Arg::with_name("SENSOR")
                .help("temperature and humidity sensor type")
                .long("sensor")
                .takes_value(true)
                .possible_values(&["DHT22", "BME280"])
                .case_insensitive(true)
                .default_value("DHT22"),
        )
        .arg(
            Arg::with_name("RAIN")
                .help("the device has a rain sensor")
                .long("rain"),
        )
        .arg(
            Arg::with_name("IDLE_READS")
                .help("give up after that many silent read timeouts")
                .long_help(
                    "give up the configuration after that many consecutive \
                     read timeouts (60s each) without a line from the device; \
                     waits forever when not set.",
                )
                .long("idle-reads")
                .takes_value(true),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .subcommand(SubCommand::with_name("list").about("list serial ports"))
        .subcommand(SubCommand::with_name("monitor").about("monitor serial port"))
        .subcommand(SubCommand::with_name("config").about("config ESP32"))
        .subcommand(SubCommand::with_name("write").about("write firmware to ESP32"))
        .subcommand(SubCommand::with_name("reset").about("reset ESP32"))
        .subcommand(SubCommand::with_name("version").about("show version"))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'floracom -v -v -v' or 'floracom -vvv' vs 'floracom -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if TermLogger::init(log_level, Config::default(), TerminalMode::Mixed).is_err() {
        eprintln!("logging is not available");
    }

    trace!("{:#?}", matches);

    let exit_code = match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            println!("{}: {}", style("error").red(), e);
            1
        }
    };
    debug!("exit code: {}", exit_code);
    process::exit(exit_code);
}

fn run(matches: &ArgMatches) -> Result<i32, ProvisionError> {
    let settings = settings_from(matches);

    match matches.subcommand_name() {
        Some("list") => {
            // Only USB adapters can be an ESP32 board
            for port in fc::list()?.iter().filter(|p| p.usb.is_some()) {
                println!("{}", port.describe());
            }
            Ok(0)
        }
        Some("monitor") => fc::monitor(&settings).map(|_| 0),
        Some("config") => {
            let config = config_from(matches);
            match fc::configure(&settings, config)? {
                Outcome::Configured => {
                    println!("[FC] 👍 {}", style("Config successful.").green())
                }
                Outcome::Disconnected => println!(
                    "[FC] 🔌 Device disconnected, assuming the config is finished."
                ),
            }
            Ok(0)
        }
        Some("write") => {
            let status = fc::write(&settings)?;
            if status.success() {
                Ok(0)
            } else {
                println!("{}: esptool {}", style("error").red(), status);
                Ok(status.code().unwrap_or(1))
            }
        }
        Some("reset") => fc::reset(&settings).map(|_| 0),
        Some("version") => {
            println!("{} v{}", crate_name!(), crate_version!());
            Ok(0)
        }
        _ => unreachable!(),
    }
}

/// Parse a numeric argument, exiting with a formatted message when it is not
/// a number.
macro_rules! numeric_arg {
    ($matches:ident, $name:expr, $flag:expr, $ty:ty) => {
        value_t!($matches.value_of($name), $ty).unwrap_or_else(|_| {
            println!(
                "{}: `{}` needs to be a numeric value",
                style("error").red(),
                style($flag).cyan()
            );
            println!(
                "   {} `{}` is not a valid value",
                style("-->").cyan(),
                style($matches.value_of($name).unwrap_or_default()).on_red()
            );
            process::exit(-1);
        })
    };
}

fn settings_from(matches: &ArgMatches) -> fc::Settings {
    // Arguments with default values always have a value.
    let baud_rate = numeric_arg!(matches, "BAUD_RATE", "baud-rate", u32);

    let mut builder = fc::SettingsBuilder::default()
        .baud_rate(baud_rate)
        .firmware_dir(matches.value_of("FIRMWARE_DIR").unwrap_or("."));

    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }
    if let Some(esptool) = matches.value_of("ESPTOOL") {
        builder = builder.esptool(esptool);
    }
    if matches.is_present("IDLE_READS") {
        builder = builder.max_idle_reads(numeric_arg!(matches, "IDLE_READS", "idle-reads", u32));
    }

    builder.finalize()
}

fn config_from(matches: &ArgMatches) -> fc::ProvisioningConfig {
    let broker_port = numeric_arg!(matches, "MQTT_PORT", "mqtt-port", u16);
    let interval = numeric_arg!(matches, "INTERVAL", "interval", u32);
    let sensor_type = matches
        .value_of("SENSOR")
        .and_then(|s| s.parse().ok())
        .unwrap_or(SensorType::Dht22);

    fc::ProvisioningConfigBuilder::new()
        .ssid(matches.value_of("SSID").unwrap_or_default())
        .password(matches.value_of("PASSWORD").unwrap_or_default())
        .broker_address(matches.value_of("MQTT_IP").unwrap_or_default())
        .broker_port(broker_port)
        .interval(interval)
        .sensor_type(sensor_type)
        .rain_sensor(matches.is_present("RAIN"))
        .finalize()
}
