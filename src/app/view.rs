use crate::narration::NarrationMode;

/// On-screen widgets the app writes to: the caption label, the mode badge and
/// transient toasts.
pub trait StatusView {
    fn set_caption(&mut self, text: &str);
    fn set_mode(&mut self, mode: NarrationMode);
    fn toast(&mut self, message: &str);
}

/// Writes every view update to the log.
#[derive(Default)]
pub struct LogView;

impl StatusView for LogView {
    fn set_caption(&mut self, text: &str) {
        log::info!("{}", text.replace('\n', " "));
    }

    fn set_mode(&mut self, mode: NarrationMode) {
        log::info!("mode: {}", mode.label());
    }

    fn toast(&mut self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Keeps the latest view state in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryView {
    pub caption: Option<String>,
    pub mode: Option<NarrationMode>,
    pub toasts: Vec<String>,
    pub caption_updates: usize,
}

impl StatusView for MemoryView {
    fn set_caption(&mut self, text: &str) {
        self.caption = Some(text.to_string());
        self.caption_updates += 1;
    }

    fn set_mode(&mut self, mode: NarrationMode) {
        self.mode = Some(mode);
    }

    fn toast(&mut self, message: &str) {
        self.toasts.push(message.to_string());
    }
}
