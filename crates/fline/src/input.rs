#![forbid(unsafe_code)]

//! Input sources feeding the read loop.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use fline_core::key::RawUnit;

/// One event from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A raw input unit.
    Unit(RawUnit),
    /// Pasted text, inserted as-is without decoding or key bindings.
    Paste(String),
    /// The terminal changed size.
    Resize {
        /// New width in cells.
        width: u16,
        /// New height in rows.
        height: u16,
    },
}

/// Result of waiting for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPoll {
    /// An event arrived.
    Event(InputEvent),
    /// The timeout elapsed first.
    Timeout,
    /// No more input will arrive.
    Closed,
}

/// Where the read loop pulls events from.
pub trait InputSource {
    /// Wait up to `timeout` for the next event; `None` waits indefinitely.
    fn next_event(&mut self, timeout: Option<Duration>) -> io::Result<InputPoll>;
}

/// Events from an mpsc channel, for input produced on another thread.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Receiver<InputEvent>,
}

impl ChannelSource {
    /// Read events from `receiver`.
    #[must_use]
    pub fn new(receiver: Receiver<InputEvent>) -> Self {
        Self { receiver }
    }
}

impl InputSource for ChannelSource {
    fn next_event(&mut self, timeout: Option<Duration>) -> io::Result<InputPoll> {
        let received = match timeout {
            Some(timeout) => self.receiver.recv_timeout(timeout),
            None => self
                .receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        Ok(match received {
            Ok(event) => InputPoll::Event(event),
            Err(RecvTimeoutError::Timeout) => InputPoll::Timeout,
            Err(RecvTimeoutError::Disconnected) => InputPoll::Closed,
        })
    }
}

/// A fixed event script. Every wait with a timeout while the script has a
/// pending pause reports `Timeout` once.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    events: VecDeque<Option<InputEvent>>,
}

impl ScriptedInput {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit per char of `text`.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.events
            .extend(text.chars().map(|c| Some(InputEvent::Unit(RawUnit::char(c)))));
        self
    }

    /// Append one unit.
    #[must_use]
    pub fn unit(mut self, unit: RawUnit) -> Self {
        self.events.push_back(Some(InputEvent::Unit(unit)));
        self
    }

    /// Append a paste of `text`.
    #[must_use]
    pub fn paste(mut self, text: &str) -> Self {
        self.events.push_back(Some(InputEvent::Paste(text.to_string())));
        self
    }

    /// Append a resize.
    #[must_use]
    pub fn resize(mut self, width: u16, height: u16) -> Self {
        self.events.push_back(Some(InputEvent::Resize { width, height }));
        self
    }

    /// Append a pause long enough for any timeout to expire.
    #[must_use]
    pub fn pause(mut self) -> Self {
        self.events.push_back(None);
        self
    }

    /// Events left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl InputSource for ScriptedInput {
    fn next_event(&mut self, timeout: Option<Duration>) -> io::Result<InputPoll> {
        loop {
            match self.events.pop_front() {
                Some(Some(event)) => return Ok(InputPoll::Event(event)),
                Some(None) if timeout.is_some() => return Ok(InputPoll::Timeout),
                // Nothing is waiting on a deadline; skip the pause.
                Some(None) => continue,
                None => return Ok(InputPoll::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn channel_source_reports_timeout_and_close() {
        let (tx, rx) = mpsc::channel();
        let mut source = ChannelSource::new(rx);
        assert_eq!(
            source.next_event(Some(Duration::from_millis(1))).unwrap(),
            InputPoll::Timeout
        );
        tx.send(InputEvent::Resize { width: 80, height: 24 }).unwrap();
        assert_eq!(
            source.next_event(None).unwrap(),
            InputPoll::Event(InputEvent::Resize { width: 80, height: 24 })
        );
        drop(tx);
        assert_eq!(source.next_event(None).unwrap(), InputPoll::Closed);
    }

    #[test]
    fn scripted_pause_only_times_out_when_waiting() {
        let mut script = ScriptedInput::new().text("a").pause().text("b").pause();
        assert!(matches!(script.next_event(None).unwrap(), InputPoll::Event(_)));
        assert_eq!(
            script.next_event(Some(Duration::from_millis(50))).unwrap(),
            InputPoll::Timeout
        );
        assert!(matches!(script.next_event(None).unwrap(), InputPoll::Event(_)));
        assert_eq!(script.next_event(None).unwrap(), InputPoll::Closed);
    }
}
