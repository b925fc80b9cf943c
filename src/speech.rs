//! Speech output and voice command input.
//!
//! - `SpeechEngine`: text-to-speech seam. `CommandSpeech` runs an external TTS
//!   program per utterance; `SilentSpeech` is the no-op fallback.
//! - `SpeechRecognizer`: voice transcript seam. `LineRecognizer` reads one
//!   recognition result per line.
//! - `VoiceCommand`: transcript matching.
//!
//! Engines never touch narration state directly. Progress is reported as
//! `UtteranceEvent`s through a callback, which the app forwards onto its event
//! channel.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const CHILD_POLL: Duration = Duration::from_millis(20);
const LISTEN_ERROR_BACKOFF: Duration = Duration::from_millis(500);
const MAX_LISTEN_ERRORS: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started(String),
    Done(String),
    Failed(String),
}

impl UtteranceEvent {
    pub fn utterance_id(&self) -> &str {
        match self {
            UtteranceEvent::Started(id) | UtteranceEvent::Done(id) | UtteranceEvent::Failed(id) => {
                id
            }
        }
    }
}

/// Text-to-speech engine.
///
/// `speak` always flushes: any utterance still playing is interrupted.
pub trait SpeechEngine: Send {
    fn speak(&mut self, text: &str, utterance_id: &str) -> Result<()>;
    fn stop(&mut self);
    fn shutdown(&mut self);
}

pub type UtteranceCallback = Arc<dyn Fn(UtteranceEvent) + Send + Sync>;

struct Playback {
    cancel: Arc<AtomicBool>,
    watcher: JoinHandle<()>,
}

/// Speaks by running an external program (for example `espeak-ng`) with the
/// sentence as its last argument.
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    notify: UtteranceCallback,
    current: Option<Playback>,
    utterances: u64,
}

impl CommandSpeech {
    pub fn new(command_line: &str, notify: UtteranceCallback) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("speech command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            notify,
            current: None,
            utterances: 0,
        })
    }

    pub fn utterances(&self) -> u64 {
        self.utterances
    }

    fn interrupt(&mut self) {
        if let Some(playback) = self.current.take() {
            playback.cancel.store(true, Ordering::SeqCst);
            if playback.watcher.join().is_err() {
                log::warn!("tts watcher thread panicked");
            }
        }
    }
}

fn watch(mut child: Child, utterance_id: String, cancel: Arc<AtomicBool>, notify: UtteranceCallback) {
    notify(UtteranceEvent::Started(utterance_id.clone()));
    loop {
        if cancel.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            notify(UtteranceEvent::Failed(utterance_id));
            return;
        }
        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                notify(UtteranceEvent::Done(utterance_id));
                return;
            }
            Ok(Some(status)) => {
                log::warn!("tts program exited with {}", status);
                notify(UtteranceEvent::Failed(utterance_id));
                return;
            }
            Ok(None) => std::thread::sleep(CHILD_POLL),
            Err(err) => {
                log::warn!("tts wait failed: {}", err);
                notify(UtteranceEvent::Failed(utterance_id));
                return;
            }
        }
    }
}

impl SpeechEngine for CommandSpeech {
    fn speak(&mut self, text: &str, utterance_id: &str) -> Result<()> {
        self.interrupt();

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("start tts program {}", self.program))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let watcher = {
            let cancel = Arc::clone(&cancel);
            let notify = Arc::clone(&self.notify);
            let id = utterance_id.to_string();
            std::thread::Builder::new()
                .name("tts".to_string())
                .spawn(move || watch(child, id, cancel, notify))
                .context("spawn tts thread")?
        };
        self.current = Some(Playback { cancel, watcher });
        self.utterances += 1;
        log::debug!("speaking utterance {}", utterance_id);
        Ok(())
    }

    fn stop(&mut self) {
        self.interrupt();
    }

    fn shutdown(&mut self) {
        self.interrupt();
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.interrupt();
    }
}

/// Fallback engine when no TTS is available. Narration still composes text; it
/// is just never voiced.
#[derive(Default)]
pub struct SilentSpeech {
    warned: bool,
}

impl SpeechEngine for SilentSpeech {
    fn speak(&mut self, text: &str, _utterance_id: &str) -> Result<()> {
        if !self.warned {
            log::warn!("no speech engine available; narration is text only");
            self.warned = true;
        }
        log::info!("narration: {}", text);
        Ok(())
    }

    fn stop(&mut self) {}

    fn shutdown(&mut self) {}
}

// ----------------------------------------------------------------------------
// Voice commands
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceCommand {
    /// Narrate the current scene.
    Scan,
}

impl VoiceCommand {
    pub fn parse(transcript: &str) -> Option<Self> {
        let lower = transcript.to_lowercase();
        if lower.contains("scan") || lower.contains("detect") {
            Some(VoiceCommand::Scan)
        } else {
            None
        }
    }

    /// First command found among recognition alternatives.
    pub fn first_match(alternatives: &[String]) -> Option<Self> {
        alternatives.iter().find_map(|text| Self::parse(text))
    }
}

/// Source of recognition results.
pub trait SpeechRecognizer: Send {
    /// Block until the next result. `Ok(None)` means the input is finished.
    fn listen(&mut self) -> Result<Option<Vec<String>>>;
}

/// Reads one result per line; alternatives are separated by `|`.
pub struct LineRecognizer<R: BufRead> {
    reader: R,
}

impl<R: BufRead> LineRecognizer<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineRecognizer<BufReader<File>> {
    /// Open a transcript file. For a FIFO this blocks until a writer connects.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open voice input {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> SpeechRecognizer for LineRecognizer<R> {
    fn listen(&mut self) -> Result<Option<Vec<String>>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("read voice transcript")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(
            line.split('|')
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}

/// Listen continuously, restarting after every result or error, until input ends
/// or `on_results` returns false.
///
/// `open` runs on the listener thread, so a recognizer whose source blocks on
/// open (a FIFO without a writer) never holds up the caller.
pub fn spawn_voice_listener<S, O, F>(open: O, on_results: F) -> Result<JoinHandle<()>>
where
    S: SpeechRecognizer + 'static,
    O: FnOnce() -> Result<S> + Send + 'static,
    F: Fn(Vec<String>) -> bool + Send + 'static,
{
    std::thread::Builder::new()
        .name("voice".to_string())
        .spawn(move || {
            let mut recognizer = match open() {
                Ok(recognizer) => recognizer,
                Err(err) => {
                    log::error!("voice input unavailable: {:#}", err);
                    return;
                }
            };
            log::info!("voice input connected");
            let mut errors = 0;
            loop {
                match recognizer.listen() {
                    Ok(Some(results)) => {
                        errors = 0;
                        if results.is_empty() {
                            continue;
                        }
                        if !on_results(results) {
                            return;
                        }
                    }
                    Ok(None) => {
                        log::info!("voice input closed");
                        return;
                    }
                    Err(err) => {
                        errors += 1;
                        log::warn!("voice recognition failed: {:#}", err);
                        if errors >= MAX_LISTEN_ERRORS {
                            log::error!("voice recognition stopped after {} errors", errors);
                            return;
                        }
                        std::thread::sleep(LISTEN_ERROR_BACKOFF);
                    }
                }
            }
        })
        .context("spawn voice listener thread")
}
