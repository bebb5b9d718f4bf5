//! Recording [`AudioBackend`] double.
//!
//! Every acquisition and release of a session resource is appended to a
//! shared event log so tests can assert exact ordering and counts.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::storage::ClipSource;

use super::{AudioBackend, AudioOutput, DecodeStep, Decoder, PlaybackError};

pub type EventLog = Rc<RefCell<Vec<&'static str>>>;

/// Backend whose output and decoder only record what happens to them.
pub struct MockBackend {
    events: EventLog,
    gain: Rc<Cell<f32>>,
    fail_output: bool,
    fail_start: bool,
    finish_after: Option<usize>,
    fail_after: Option<usize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            events: EventLog::default(),
            gain: Rc::new(Cell::new(-1.0)),
            fail_output: false,
            fail_start: false,
            finish_after: None,
            fail_after: None,
        }
    }

    /// Claiming the output fails.
    pub fn failing_output(mut self) -> Self {
        self.fail_output = true;
        self
    }

    /// Decoder construction fails.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Decoders report [`DecodeStep::Finished`] on their `steps`-th step.
    pub fn finishing_after(mut self, steps: usize) -> Self {
        self.finish_after = Some(steps);
        self
    }

    /// Decoders report [`DecodeStep::Failed`] on their `steps`-th step.
    pub fn failing_after(mut self, steps: usize) -> Self {
        self.fail_after = Some(steps);
        self
    }

    /// Shared handle to the event log.
    pub fn events(&self) -> EventLog {
        Rc::clone(&self.events)
    }

    /// Gain most recently applied to any output (`-1.0` before the first).
    pub fn gain_handle(&self) -> Rc<Cell<f32>> {
        Rc::clone(&self.gain)
    }
}

impl AudioBackend for MockBackend {
    fn claim_output(&mut self, gain: f32) -> Result<Box<dyn AudioOutput>, PlaybackError> {
        self.events.borrow_mut().push("claim_output");
        if self.fail_output {
            return Err(PlaybackError::DecodeStartFailed("no output device".into()));
        }
        self.gain.set(gain);
        Ok(Box::new(MockOutput {
            events: Rc::clone(&self.events),
            gain: Rc::clone(&self.gain),
        }))
    }

    fn start_decoder(
        &mut self,
        source: Box<dyn ClipSource>,
        _output: &mut dyn AudioOutput,
    ) -> Result<Box<dyn Decoder>, PlaybackError> {
        self.events.borrow_mut().push("start_decoder");
        let source = TrackedSource {
            _inner: source,
            events: Rc::clone(&self.events),
        };
        if self.fail_start {
            return Err(PlaybackError::DecodeStartFailed("not an mp3 stream".into()));
        }
        Ok(Box::new(MockDecoder {
            _source: source,
            events: Rc::clone(&self.events),
            steps: 0,
            finish_after: self.finish_after,
            fail_after: self.fail_after,
        }))
    }
}

struct MockOutput {
    events: EventLog,
    gain: Rc<Cell<f32>>,
}

impl AudioOutput for MockOutput {
    fn set_gain(&mut self, gain: f32) {
        self.gain.set(gain);
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn channels(&self) -> u16 {
        2
    }

    fn write(&mut self, samples: &[f32]) -> usize {
        samples.len()
    }

    fn queued(&self) -> usize {
        0
    }
}

impl Drop for MockOutput {
    fn drop(&mut self) {
        self.events.borrow_mut().push("release_output");
    }
}

struct MockDecoder {
    _source: TrackedSource,
    events: EventLog,
    steps: usize,
    finish_after: Option<usize>,
    fail_after: Option<usize>,
}

impl Decoder for MockDecoder {
    fn step(&mut self, _output: &mut dyn AudioOutput) -> DecodeStep {
        self.steps += 1;
        if self.fail_after == Some(self.steps) {
            return DecodeStep::Failed("corrupt frame".into());
        }
        if self.finish_after == Some(self.steps) {
            return DecodeStep::Finished;
        }
        DecodeStep::Continue
    }

    fn stop(&mut self) {
        self.events.borrow_mut().push("stop_decoder");
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        // Fields drop after this body, so the source is logged last.
        self.events.borrow_mut().push("release_decoder");
    }
}

struct TrackedSource {
    _inner: Box<dyn ClipSource>,
    events: EventLog,
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.events.borrow_mut().push("release_source");
    }
}
