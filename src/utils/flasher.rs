//! Flashing the flora firmware with Espressif's `esptool`.
//!
//! `floracom` does not know anything about the flashing protocol, it only
//! locates the tool, runs it with the layout of the XIAO ESP32C3 images and
//! forwards everything it prints.

use std::{
    env,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread,
};

use log::{debug, info};

use crate::{
    error::{ProvisionError, Result},
    Settings,
};

/// Flash offsets and image names, as produced by the Arduino build of the
/// firmware.
const IMAGES: &[(&str, &str)] = &[
    ("0x0", "twESP32Flora.ino.bootloader.bin"),
    ("0x8000", "twESP32Flora.ino.partitions.bin"),
    ("0xe000", "boot_app0.bin"),
    ("0x10000", "twESP32Flora.ino.bin"),
];

//==============================================================================
// Public Interface
//==============================================================================

/// Run esptool against the device on `port` and wait for it to exit. Its
/// standard output and error are forwarded as they come.
pub(crate) fn write_firmware(port: &str, settings: &Settings) -> Result<ExitStatus> {
    let esptool = match &settings.esptool {
        Some(path) => PathBuf::from(path),
        None => find_esptool().ok_or(ProvisionError::ToolNotFound)?,
    };
    let (program, mut args) = interpreter_for(&esptool)?;
    args.extend(esptool_args(port, Path::new(&settings.firmware_dir)));

    info!("{} {}", program.display(), args.join(" "));
    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ProvisionError::Tool)?;

    let stdout = child.stdout.take().map(|out| {
        thread::spawn(move || forward(out, io::stdout()))
    });
    let stderr = child.stderr.take().map(|err| {
        thread::spawn(move || forward(err, io::stderr()))
    });

    let status = child.wait().map_err(ProvisionError::Tool)?;
    for handle in stdout.into_iter().chain(stderr) {
        if handle.join().is_err() {
            debug!("an output forwarding thread panicked");
        }
    }
    info!("esptool exited with {}", status);
    Ok(status)
}

//==============================================================================
// Private stuff
//==============================================================================

/// Arguments for a full flash of the XIAO ESP32C3 at 921600 baud.
fn esptool_args(port: &str, firmware_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "--chip",
        "esp32c3",
        "--port",
        port,
        "--baud",
        "921600",
        "--before",
        "default-reset",
        "--after",
        "hard-reset",
        "write-flash",
        "-z",
        "--flash-mode",
        "dio",
        "--flash-freq",
        "80m",
        "--flash-size",
        "4MB",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for (offset, image) in IMAGES {
        args.push(offset.to_string());
        args.push(firmware_dir.join(image).to_string_lossy().into_owned());
    }
    args
}

/// A `.py` esptool runs through the python interpreter; anything else is
/// executed directly.
fn interpreter_for(esptool: &Path) -> Result<(PathBuf, Vec<String>)> {
    if esptool.extension().map_or(false, |ext| ext == "py") {
        let python = find_in_path("python")
            .or_else(|| find_in_path("python3"))
            .ok_or(ProvisionError::PythonNotFound)?;
        Ok((python, vec![esptool.to_string_lossy().into_owned()]))
    } else {
        Ok((esptool.to_owned(), vec![]))
    }
}

/// Look for `esptool` in the `PATH`, then in the current directory.
fn find_esptool() -> Option<PathBuf> {
    find_in_path("esptool").or_else(|| {
        let local = Path::new(".").join(executable_name("esptool"));
        if local.is_file() {
            Some(local)
        } else {
            None
        }
    })
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(executable_name(name)))
        .find(|candidate| candidate.is_file())
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_owned()
    }
}

fn forward<R: Read, W: Write>(mut from: R, mut to: W) {
    let mut buf = [0u8; 1024];
    loop {
        match from.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if to.write_all(&buf[..n]).and_then(|_| to.flush()).is_err() {
                    return;
                }
            }
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

#[test]
fn flash_layout_follows_the_port_and_firmware_dir() {
    let args = esptool_args("/dev/ttyACM0", Path::new("build"));
    assert_eq!(&args[..4], &["--chip", "esp32c3", "--port", "/dev/ttyACM0"]);
    assert!(args.contains(&"write-flash".to_string()));

    let tail: Vec<&str> = args[args.len() - 8..].iter().map(String::as_str).collect();
    let expected: Vec<String> = IMAGES
        .iter()
        .flat_map(|(offset, image)| {
            vec![
                offset.to_string(),
                Path::new("build").join(image).to_string_lossy().into_owned(),
            ]
        })
        .collect();
    assert_eq!(tail, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn binary_esptool_runs_directly() {
    let (program, args) = interpreter_for(Path::new("/usr/local/bin/esptool")).unwrap();
    assert_eq!(program, PathBuf::from("/usr/local/bin/esptool"));
    assert!(args.is_empty());
}

#[test]
fn forward_copies_everything() {
    let mut out = Vec::new();
    forward(&b"Connecting....\nChip is ESP32-C3\n"[..], &mut out);
    assert_eq!(out, b"Connecting....\nChip is ESP32-C3\n");
}
