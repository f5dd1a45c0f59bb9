// Operator key input for the calibration procedure
//
// Keys map to four actions: Left/Right arrows nudge the joint, Enter confirms, q quits.

use std::io::{self, Read};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Left,
    Right,
    Confirm,
    Quit,
}

const ESC: u8 = 0x1b;

impl KeyAction {
    /// Map one captured key sequence to an action
    ///
    /// Arrow keys arrive as `ESC [ C` / `ESC [ D`; anything unrecognised maps to `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [ESC, b'[', b'D'] => Some(KeyAction::Left),
            [ESC, b'[', b'C'] => Some(KeyAction::Right),
            [b'\r'] | [b'\n'] => Some(KeyAction::Confirm),
            [b'q'] | [b'Q'] => Some(KeyAction::Quit),
            _ => None,
        }
    }

    /// Map a terminal key event to an action (presses and repeats only)
    pub fn from_key_event(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
            return None;
        }
        match key.code {
            KeyCode::Left => Some(KeyAction::Left),
            KeyCode::Right => Some(KeyAction::Right),
            KeyCode::Enter => Some(KeyAction::Confirm),
            // Raw mode swallows SIGINT, so Ctrl-C has to quit explicitly
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(KeyAction::Quit)
            }
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(KeyAction::Quit),
            _ => None,
        }
    }
}

/// Source of operator actions
pub trait KeySource {
    /// Block until the next recognised action; `None` once input is closed
    fn next_action(&mut self) -> Result<Option<KeyAction>>;
}

/// Scripted actions, mostly for tests and non-interactive runs
impl KeySource for std::vec::IntoIter<KeyAction> {
    fn next_action(&mut self) -> Result<Option<KeyAction>> {
        Ok(self.next())
    }
}

/// Live terminal input; the terminal is in raw mode for as long as this exists
pub struct TerminalKeys {
    _private: (),
}

impl TerminalKeys {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl KeySource for TerminalKeys {
    fn next_action(&mut self) -> Result<Option<KeyAction>> {
        loop {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = KeyAction::from_key_event(&key) {
                    return Ok(Some(action));
                }
            }
        }
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Raw byte stream input, e.g. stdin when it is not a terminal
pub struct ByteKeys<R> {
    reader: R,
    // Byte read past a lone ESC, handed out before reading again
    pending: Option<u8>,
}

impl<R: Read> ByteKeys<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
        }
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pending.take() {
            return Ok(Some(byte));
        }
        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

impl<R: Read> KeySource for ByteKeys<R> {
    fn next_action(&mut self) -> Result<Option<KeyAction>> {
        while let Some(byte) = self.read_byte()? {
            let action = if byte == ESC {
                // Escape sequence: ESC [ <code>; a lone ESC is dropped
                match self.read_byte()? {
                    Some(b'[') => match self.read_byte()? {
                        Some(code) => KeyAction::from_bytes(&[ESC, b'[', code]),
                        None => return Ok(None),
                    },
                    Some(other) => {
                        self.pending = Some(other);
                        None
                    }
                    None => return Ok(None),
                }
            } else {
                KeyAction::from_bytes(&[byte])
            };

            if action.is_some() {
                return Ok(action);
            }
        }
        Ok(None)
    }
}
