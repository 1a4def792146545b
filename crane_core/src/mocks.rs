//! Test and helper transports for crane_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crane_traits::{CanFrame, FrameSink, FrameSource};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A source that never delivers anything; each `recv` just waits out its timeout.
pub struct IdleSource;

impl FrameSource for IdleSource {
    fn recv(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BoxError> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

/// One scripted `recv` result.
pub enum Scripted {
    Frame(CanFrame),
    Error(String),
}

/// Plays back a fixed script, then behaves like [`IdleSource`].
pub struct ScriptedSource {
    script: VecDeque<Scripted>,
    /// Delay before each scripted item is returned.
    pub gap: Duration,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: script.into_iter().collect(),
            gap: Duration::ZERO,
        }
    }

    pub fn frames(frames: impl IntoIterator<Item = CanFrame>) -> Self {
        Self::new(frames.into_iter().map(Scripted::Frame))
    }

    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }
}

impl FrameSource for ScriptedSource {
    fn recv(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BoxError> {
        match self.script.pop_front() {
            Some(item) => {
                if !self.gap.is_zero() {
                    std::thread::sleep(self.gap);
                }
                match item {
                    Scripted::Frame(f) => Ok(Some(f)),
                    Scripted::Error(msg) => Err(Box::new(std::io::Error::other(msg))),
                }
            }
            None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}

/// Records every sent frame; clones share the record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<CanFrame>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<CanFrame> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl FrameSink for RecordingSink {
    fn send(&mut self, frame: &CanFrame) -> Result<(), BoxError> {
        if let Ok(mut v) = self.sent.lock() {
            v.push(*frame);
        }
        Ok(())
    }
}

/// A sink whose bus is always down.
pub struct FailingSink;

impl FrameSink for FailingSink {
    fn send(&mut self, _frame: &CanFrame) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("bus down")))
    }
}
