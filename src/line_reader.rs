//! Split the byte stream coming from the device into text lines.
//!
//! The firmware terminates its lines with any mix of `\n` and `\r\n`, so the
//! reader treats both `\r` and `\n` as terminators and collapses runs of them
//! into a single line boundary.

use std::io::{self, Read};

/// Read the next line from `conn`, one byte at a time.
///
/// * A terminator (`\r` or `\n`) completes the line if some bytes were
///   accumulated; otherwise it is skipped.
/// * A read timeout returns what was accumulated so far, which may be the
///   empty string. An empty line means "no data for now", not a protocol
///   event.
/// * A read of zero bytes is the end of the stream. Pending bytes are still
///   returned as a last line, the next call then fails with
///   [`io::ErrorKind::UnexpectedEof`].
/// * Any other error is returned as is.
///
/// Terminators are consumed and never part of the returned line. Bytes are
/// decoded as UTF-8, replacing invalid sequences.
pub fn read_line<R: Read + ?Sized>(conn: &mut R) -> io::Result<String> {
    let mut line: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match conn.read(&mut byte) {
            Ok(0) => {
                if line.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "end of serial stream",
                    ));
                }
                break;
            }
            Ok(_) => match byte[0] {
                b'\n' | b'\r' => {
                    if !line.is_empty() {
                        break;
                    }
                }
                b => line.push(b),
            },
            Err(ref e) if is_timeout(e) => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Whether the error means the device went away: the stream ended, or the
/// tty hung up, which `serialport` reports as [`io::ErrorKind::BrokenPipe`].
pub(crate) fn is_end_of_stream(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe
    )
}

/// Whether the error is a read timeout of the serial port rather than a
/// failure of the link.
pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
use std::collections::VecDeque;

/// Replays a list of reads, one chunk per call, then reports the end of the
/// stream.
#[cfg(test)]
struct Replay(VecDeque<io::Result<Vec<u8>>>);

#[cfg(test)]
impl Replay {
    fn bytes(data: &[u8]) -> Self {
        Replay(vec![Ok(data.to_vec())].into())
    }
}

#[cfg(test)]
impl Read for Replay {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.0.push_front(Ok(chunk.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

#[cfg(test)]
fn lines_until_eof(conn: &mut Replay) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match read_line(conn) {
            Ok(line) => lines.push(line),
            Err(e) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
                return lines;
            }
        }
    }
}

#[test]
fn mixed_terminators_collapse() {
    let mut conn = Replay::bytes(b"\r\nsetup start\r\n\r\nenter ssid:\n\n\rfoo\rbar\n");
    assert_eq!(
        lines_until_eof(&mut conn),
        vec!["setup start", "enter ssid:", "foo", "bar"]
    );
}

#[test]
fn terminators_only_yield_nothing() {
    let mut conn = Replay::bytes(b"\r\n\n\r\r\r\n");
    assert!(lines_until_eof(&mut conn).is_empty());
}

#[test]
fn trailing_bytes_are_flushed_at_eof() {
    let mut conn = Replay::bytes(b"first\nConfig ssid=garden");
    assert_eq!(
        lines_until_eof(&mut conn),
        vec!["first", "Config ssid=garden"]
    );
}

#[test]
fn every_maximal_run_is_a_line() {
    // Build a stream by interleaving runs with every kind of terminator
    // separator and check the runs come back in order.
    let runs = ["a", "bc", "enter mqtt port", "x y", "Has rain sensor?", "z"];
    let separators: [&[u8]; 5] = [b"\r", b"\n", b"\r\n", b"\n\r\n", b"\r\r"];
    for offset in 0..separators.len() {
        let mut stream = Vec::new();
        for (i, run) in runs.iter().enumerate() {
            stream.extend_from_slice(separators[(i + offset) % separators.len()]);
            stream.extend_from_slice(run.as_bytes());
        }
        stream.extend_from_slice(separators[offset]);
        let mut conn = Replay::bytes(&stream);
        assert_eq!(lines_until_eof(&mut conn), runs.to_vec());
    }
}

#[test]
fn timeout_returns_partial_line() {
    let mut conn = Replay(
        vec![
            Ok(b"enter pa".to_vec()),
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            Ok(b"ssword:\n".to_vec()),
        ]
        .into(),
    );
    assert_eq!(read_line(&mut conn).unwrap(), "enter pa");
    assert_eq!(read_line(&mut conn).unwrap(), "ssword:");
}

#[test]
fn timeout_with_no_data_returns_empty_line() {
    let mut conn = Replay(vec![Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))].into());
    assert_eq!(read_line(&mut conn).unwrap(), "");
}

#[test]
fn link_errors_are_not_swallowed() {
    let mut conn = Replay(
        vec![
            Ok(b"abc".to_vec()),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
        ]
        .into(),
    );
    let err = read_line(&mut conn).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}

#[test]
fn interrupted_reads_are_retried() {
    let mut conn = Replay(
        vec![
            Ok(b"ab".to_vec()),
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
            Ok(b"c\n".to_vec()),
        ]
        .into(),
    );
    assert_eq!(read_line(&mut conn).unwrap(), "abc");
}

#[test]
fn hangup_and_eof_end_the_stream() {
    let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
    let hangup = io::Error::new(io::ErrorKind::BrokenPipe, "hangup");
    let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
    assert!(is_end_of_stream(&eof));
    assert!(is_end_of_stream(&hangup));
    assert!(!is_end_of_stream(&denied));
    assert!(!is_end_of_stream(&io::Error::new(io::ErrorKind::TimedOut, "t")));
}

#[cfg(unix)]
#[test]
fn pty_hangup_after_last_line_is_end_of_stream() {
    use serialport::{SerialPort, TTYPort};
    use std::{io::Write, time::Duration};

    let (mut master, mut slave) = TTYPort::pair().expect("unable to create a pty pair");
    slave.set_timeout(Duration::from_secs(2)).unwrap();
    master.write_all(b"setup start\r\n").unwrap();
    master.flush().unwrap();

    assert_eq!(read_line(&mut slave).unwrap(), "setup start");

    drop(master);
    let err = read_line(&mut slave).unwrap_err();
    assert!(is_end_of_stream(&err), "unexpected error {:?}", err);
}

#[test]
fn invalid_utf8_is_replaced() {
    let mut conn = Replay::bytes(b"temp \xff\n");
    assert_eq!(read_line(&mut conn).unwrap(), "temp \u{fffd}");
}
