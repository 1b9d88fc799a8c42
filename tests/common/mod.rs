//! Shared test utilities: hardware and network fakes for the assistant
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use hark::voice::{
    CommandBuffer, FrameSource, InputDevice, NO_KEYWORD, Speaker, TranscribeResult, Transcriber,
    WakeWordEngine,
};
use hark::{
    Assistant, AssistantSettings, ChatError, Error, PERSONA_INSTRUCTION, Responder, Result,
    Session, ShutdownSignal, TranscribeError,
};

/// Resource release calls, in the order they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    StreamClosed,
    DeviceTerminated,
    EngineDeleted,
}

/// Everything the fakes observed
#[derive(Default)]
pub struct Witness {
    pub frames_read: Cell<usize>,
    pub frames_processed: Cell<usize>,
    /// Spoken text with the number of frames read at that moment
    pub spoken: RefCell<Vec<(String, usize)>>,
    /// Sample counts of every transcribed buffer
    pub transcribed: RefCell<Vec<usize>>,
    /// (persona, user text) of every chat request
    pub chats: RefCell<Vec<(String, String)>>,
    pub releases: RefCell<Vec<Release>>,
    /// (sample rate, frame length) of every stream opened
    pub opened: RefCell<Vec<(u32, usize)>>,
}

impl Witness {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn spoken_text(&self) -> Vec<String> {
        self.spoken.borrow().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn releases(&self) -> Vec<Release> {
        self.releases.borrow().clone()
    }
}

/// Silent frames; raises shutdown and reports an interrupt after `limit` reads
pub struct FakeSource {
    pub witness: Rc<Witness>,
    pub shutdown: ShutdownSignal,
    pub sample_rate: u32,
    pub frame_length: usize,
    pub limit: Option<usize>,
    pub fail_at: Option<usize>,
}

impl FrameSource for FakeSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn read_frame(&mut self) -> Result<Vec<i16>> {
        let reads = self.witness.frames_read.get();
        if self.fail_at == Some(reads) {
            return Err(Error::Audio("device unplugged".to_string()));
        }
        if self.limit.is_some_and(|limit| reads >= limit) {
            self.shutdown.trigger();
        }
        if self.shutdown.is_triggered() {
            return Err(Error::Interrupted);
        }

        self.witness.frames_read.set(reads + 1);
        Ok(vec![0; self.frame_length])
    }

    fn close(&mut self) {
        self.witness.releases.borrow_mut().push(Release::StreamClosed);
    }
}

pub struct FakeDevice {
    pub witness: Rc<Witness>,
    pub shutdown: ShutdownSignal,
    pub limit: Option<usize>,
    pub fail_at: Option<usize>,
    pub fail_open: bool,
}

impl InputDevice for FakeDevice {
    fn open_stream(
        &mut self,
        sample_rate: u32,
        frame_length: usize,
    ) -> Result<Box<dyn FrameSource>> {
        if self.fail_open {
            return Err(Error::Audio("no mono input config".to_string()));
        }
        self.witness
            .opened
            .borrow_mut()
            .push((sample_rate, frame_length));

        Ok(Box::new(FakeSource {
            witness: Rc::clone(&self.witness),
            shutdown: self.shutdown.clone(),
            sample_rate,
            frame_length,
            limit: self.limit,
            fail_at: self.fail_at,
        }))
    }

    fn terminate(&mut self) {
        self.witness.releases.borrow_mut().push(Release::DeviceTerminated);
    }
}

/// Fires keyword 0 on the given processed-frame counts (1-based)
pub struct FakeEngine {
    pub witness: Rc<Witness>,
    pub sample_rate: u32,
    pub frame_length: usize,
    pub triggers: Vec<usize>,
}

#[async_trait(?Send)]
impl WakeWordEngine for FakeEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    async fn process(&mut self, frame: &[i16]) -> Result<i32> {
        if frame.len() != self.frame_length {
            return Err(Error::WakeWord("wrong frame length".to_string()));
        }
        let count = self.witness.frames_processed.get() + 1;
        self.witness.frames_processed.set(count);

        Ok(if self.triggers.contains(&count) {
            0
        } else {
            NO_KEYWORD
        })
    }

    fn delete(&mut self) {
        self.witness.releases.borrow_mut().push(Release::EngineDeleted);
    }
}

/// Replays scripted results; anything past the script is `NoSpeech`
///
/// With `interrupt` set, raises shutdown while the request is in flight.
pub struct FakeTranscriber {
    pub witness: Rc<Witness>,
    pub script: RefCell<VecDeque<TranscribeResult>>,
    pub interrupt: Option<ShutdownSignal>,
}

#[async_trait(?Send)]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &CommandBuffer) -> TranscribeResult {
        self.witness.transcribed.borrow_mut().push(audio.samples.len());
        if let Some(signal) = &self.interrupt {
            signal.trigger();
        }
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(TranscribeError::NoSpeech))
    }
}

/// With `hang` set, raises shutdown and then never answers, like a stalled
/// connection
pub struct FakeResponder {
    pub witness: Rc<Witness>,
    pub reply: std::result::Result<String, ChatError>,
    pub hang: Option<ShutdownSignal>,
}

#[async_trait(?Send)]
impl Responder for FakeResponder {
    async fn complete(
        &self,
        persona: &str,
        user_text: &str,
    ) -> std::result::Result<String, ChatError> {
        self.witness
            .chats
            .borrow_mut()
            .push((persona.to_string(), user_text.to_string()));
        if let Some(signal) = &self.hang {
            signal.trigger();
            std::future::pending::<()>().await;
        }
        self.reply.clone()
    }
}

/// Records what would have been said; optionally raises shutdown on a phrase
pub struct FakeSpeaker {
    pub witness: Rc<Witness>,
    pub interrupt_on: Option<(String, ShutdownSignal)>,
}

#[async_trait(?Send)]
impl Speaker for FakeSpeaker {
    async fn speak(&mut self, text: &str) {
        self.witness
            .spoken
            .borrow_mut()
            .push((text.to_string(), self.witness.frames_read.get()));

        if let Some((phrase, signal)) = &self.interrupt_on
            && phrase == text
        {
            signal.trigger();
        }
    }
}

/// Knobs for building an assistant out of fakes
pub struct Scenario {
    pub triggers: Vec<usize>,
    pub transcripts: Vec<TranscribeResult>,
    pub reply: std::result::Result<String, ChatError>,
    pub frame_length: usize,
    pub record_seconds: u32,
    pub limit: Option<usize>,
    pub fail_at: Option<usize>,
    pub interrupt_on: Option<String>,
    pub interrupt_in_transcriber: bool,
    pub hang_in_responder: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            triggers: Vec::new(),
            transcripts: Vec::new(),
            reply: Ok("It is sunny in Cleveland.".to_string()),
            frame_length: 512,
            record_seconds: 10,
            limit: None,
            fail_at: None,
            interrupt_on: None,
            interrupt_in_transcriber: false,
            hang_in_responder: false,
        }
    }
}

impl Scenario {
    pub fn session(&self, witness: &Rc<Witness>, shutdown: &ShutdownSignal) -> Session {
        Session::open(
            || {
                let engine: Box<dyn WakeWordEngine> = Box::new(FakeEngine {
                    witness: Rc::clone(witness),
                    sample_rate: 16000,
                    frame_length: self.frame_length,
                    triggers: self.triggers.clone(),
                });
                Ok(engine)
            },
            || {
                let device: Box<dyn InputDevice> = Box::new(FakeDevice {
                    witness: Rc::clone(witness),
                    shutdown: shutdown.clone(),
                    limit: self.limit,
                    fail_at: self.fail_at,
                    fail_open: false,
                });
                Ok(device)
            },
        )
        .expect("fake session opens")
    }

    pub fn build(self) -> (Assistant, Rc<Witness>, ShutdownSignal) {
        let witness = Witness::new();
        let shutdown = ShutdownSignal::new();
        let session = self.session(&witness, &shutdown);

        let assistant = Assistant::new(
            session,
            Box::new(FakeTranscriber {
                witness: Rc::clone(&witness),
                script: RefCell::new(self.transcripts.into_iter().collect()),
                interrupt: self.interrupt_in_transcriber.then(|| shutdown.clone()),
            }),
            Box::new(FakeResponder {
                witness: Rc::clone(&witness),
                reply: self.reply,
                hang: self.hang_in_responder.then(|| shutdown.clone()),
            }),
            Box::new(FakeSpeaker {
                witness: Rc::clone(&witness),
                interrupt_on: self.interrupt_on.map(|p| (p, shutdown.clone())),
            }),
            AssistantSettings {
                keyword: "Krishna".to_string(),
                persona: PERSONA_INSTRUCTION.to_string(),
                record_seconds: self.record_seconds,
            },
            shutdown.clone(),
        );

        (assistant, witness, shutdown)
    }
}

/// Collects the message of every log event emitted on this thread
#[derive(Clone, Default)]
pub struct LogCapture {
    messages: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    /// Install as the thread's default subscriber until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Position of the first message equal to `text`
    pub fn position(&self, text: &str) -> Option<usize> {
        self.messages().iter().position(|m| m == text)
    }
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.messages.lock().unwrap().push(message);
        }
    }
}
