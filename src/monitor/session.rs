//! One monitoring run: capture, recognise, decide, type.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::capture::{capture, ScreenSource};
use crate::config::{MonitorParameters, SharedParameters, MIN_INTERVAL};
use crate::error::MonitorError;
use crate::input::{inject, InjectionTiming, KeyboardSink};
use crate::logging::LogSender;
use crate::monitor::gate::TriggerState;
use crate::ocr::{build_command, recognize_code, CodeMatcher, RecognitionResult, TextRecognizer};

/// Pause after a failed tick before the next attempt.
pub const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Platform services a session drives.
pub struct MonitorBackends {
    pub screen: Box<dyn ScreenSource>,
    pub recognizer: Box<dyn TextRecognizer>,
    pub keyboard: Box<dyn KeyboardSink>,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No verification command on screen.
    NoCode,
    /// The code was typed.
    Triggered(String),
    /// The code was typed recently and skipped.
    Suppressed(String),
}

/// State of a single Running period. Created on start, dropped on stop, so
/// the cooldown memory never outlives a run.
pub struct MonitorSession {
    params: SharedParameters,
    backends: MonitorBackends,
    matcher: CodeMatcher,
    timing: InjectionTiming,
    trigger: TriggerState,
    log: LogSender,
}

impl MonitorSession {
    pub fn new(params: SharedParameters, backends: MonitorBackends, log: LogSender) -> Result<Self> {
        Ok(Self {
            params,
            backends,
            matcher: CodeMatcher::new()?,
            timing: InjectionTiming::default(),
            trigger: TriggerState::new(),
            log,
        })
    }

    #[cfg(test)]
    pub fn with_timing(mut self, timing: InjectionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn log(&self, message: impl Into<String>) {
        self.log.send(message);
    }

    /// Runs one tick against the current parameters and reports through the
    /// status stream. Returns how long to wait before the next tick.
    pub fn run_tick(&mut self) -> Duration {
        let params = self.params.snapshot();
        match self.tick(&params) {
            Ok(_) => params.interval.max(MIN_INTERVAL),
            Err(e) => {
                self.log.send(format!("Error: {}", e));
                ERROR_BACKOFF
            }
        }
    }

    /// Captures the region, runs OCR and types the reply when warranted.
    pub fn tick(&mut self, params: &MonitorParameters) -> Result<TickOutcome, MonitorError> {
        let frame =
            capture(self.backends.screen.as_mut(), &params.region).map_err(MonitorError::capture)?;
        let result = recognize_code(&frame, self.backends.recognizer.as_ref(), &self.matcher)
            .map_err(MonitorError::recognition)?;

        let raw = result.raw_text.trim();
        if !raw.is_empty() {
            self.log.send(format!("OCR: {}", raw));
        }

        self.respond(params, result, Instant::now())
    }

    /// Decides on a recognition result observed at `now` and injects the
    /// reply. The trigger state only changes once the reply went out in full.
    pub fn respond(
        &mut self,
        params: &MonitorParameters,
        result: RecognitionResult,
        now: Instant,
    ) -> Result<TickOutcome, MonitorError> {
        let Some(code) = result.code else {
            return Ok(TickOutcome::NoCode);
        };

        if !self.trigger.should_trigger(&code, now, params.cooldown) {
            self.log
                .send(format!("Code {} was entered recently, skipping.", code));
            return Ok(TickOutcome::Suppressed(code));
        }

        let command = build_command(&code);
        self.log.send(format!("Sending: {}", command));
        inject(
            self.backends.keyboard.as_mut(),
            params.chat_key,
            &command,
            &self.timing,
        )
        .map_err(MonitorError::injection)?;

        self.trigger.record(&code, now);
        Ok(TickOutcome::Triggered(code))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::capture::CaptureRegion;
    use crate::input::testing::RecordingKeyboard;
    use crate::input::Key;
    use anyhow::anyhow;
    use image::{GrayImage, RgbImage};
    use std::sync::{Arc, Mutex};

    pub struct BlankScreen;

    impl ScreenSource for BlankScreen {
        fn grab(&mut self, region: &CaptureRegion) -> Result<RgbImage> {
            Ok(RgbImage::new(region.width as u32, region.height as u32))
        }
    }

    pub struct FailingScreen;

    impl ScreenSource for FailingScreen {
        fn grab(&mut self, _region: &CaptureRegion) -> Result<RgbImage> {
            Err(anyhow!("desktop locked"))
        }
    }

    /// Returns the same text for every image.
    pub struct FixedText(pub String);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _img: &GrayImage) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    /// Recognizer whose engine always fails.
    pub struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&self, _img: &GrayImage) -> Result<String> {
            Err(anyhow!("engine crashed"))
        }
    }

    /// Keyboard whose recording outlives the session that owns it.
    #[derive(Clone, Default)]
    pub struct SharedKeyboard(pub Arc<Mutex<RecordingKeyboard>>);

    impl SharedKeyboard {
        pub fn failing_on(key: Key) -> Self {
            let keyboard = RecordingKeyboard {
                fail_on: Some(key),
                ..Default::default()
            };
            Self(Arc::new(Mutex::new(keyboard)))
        }

        pub fn typed_text(&self) -> String {
            self.0.lock().unwrap().typed_text()
        }
    }

    impl KeyboardSink for SharedKeyboard {
        fn send_key(&mut self, key: Key) -> Result<()> {
            self.0.lock().unwrap().send_key(key)
        }

        fn send_chord(&mut self, keys: &[Key]) -> Result<()> {
            self.0.lock().unwrap().send_chord(keys)
        }

        fn release_keys(&mut self, keys: &[Key]) -> Result<()> {
            self.0.lock().unwrap().release_keys(keys)
        }

        fn type_char(&mut self, c: char) -> Result<()> {
            self.0.lock().unwrap().type_char(c)
        }
    }

    pub fn parameters(cooldown: Duration) -> MonitorParameters {
        MonitorParameters::new(
            CaptureRegion::new(10, 600, 40, 20),
            0.05,
            cooldown.as_secs_f64(),
            "t",
        )
        .unwrap()
    }

    pub fn backends(text: &str, keyboard: &SharedKeyboard) -> MonitorBackends {
        MonitorBackends {
            screen: Box::new(BlankScreen),
            recognizer: Box::new(FixedText(text.to_string())),
            keyboard: Box::new(keyboard.clone()),
        }
    }
}
