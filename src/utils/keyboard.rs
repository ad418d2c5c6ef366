use std::io::stdout;
use std::{process, time::Duration};

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
    Result,
};

/// Wait up to half a second for a key press and report whether it was `ESC`.
pub(crate) fn poll_escape() -> Result<bool> {
    enable_raw_mode()?;
    execute!(stdout(), Hide)?;
    let ready = poll(Duration::from_millis(500));
    execute!(stdout(), MoveToColumn(0), Show)?;
    disable_raw_mode()?;

    if !ready? {
        return Ok(false);
    }

    // `read()` does not block once `poll` returned `Ok(true)`
    match read()? {
        Event::Key(KeyEvent {
            code: KeyCode::Esc, ..
        }) => Ok(true),
        Event::Key(KeyEvent {
            code: KeyCode::Char('c'),
            modifiers,
        }) if modifiers.contains(KeyModifiers::CONTROL) => {
            // Raw mode swallows the Ctrl+C signal
            process::exit(0);
        }
        _ => Ok(false),
    }
}
