//! The boundary between the compiler and the program hosting it.
//!
//! The host owns the message sink, the progress display, and the loaders for
//! objects, textures and sounds. Loaded assets are only ever seen by the
//! compiler as opaque handles.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {} at line {}, column {} in file {}",
               self.severity, self.text, self.line, self.column, self.file.display())
    }
}

/// Opaque reference to a 3D object file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub PathBuf);

/// Opaque reference to a texture file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub PathBuf);

/// Opaque reference to a sound file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SoundHandle(pub PathBuf);

pub trait Host {
    fn add_message(&mut self, message: Message);

    /// Called once per processed expression with a value in [0, 1).
    fn report_progress(&mut self, _progress: f64) {}

    fn set_loading(&mut self, _loading: bool) {}

    fn load_object(&mut self, path: &Path) -> Result<ObjectHandle, String> {
        Ok(ObjectHandle(path.to_path_buf()))
    }

    fn load_texture(&mut self, path: &Path) -> Result<TextureHandle, String> {
        Ok(TextureHandle(path.to_path_buf()))
    }

    fn load_sound(&mut self, path: &Path) -> Result<SoundHandle, String> {
        Ok(SoundHandle(path.to_path_buf()))
    }
}

/// Host that keeps every message in memory.
#[derive(Debug, Default)]
pub struct CollectingHost {
    pub messages: Vec<Message>,
    pub progress: Vec<f64>,
    pub loading: bool,
}

impl CollectingHost {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.severity == Severity::Warning)
    }
}

impl Host for CollectingHost {
    fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn report_progress(&mut self, progress: f64) {
        self.progress.push(progress);
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

/// Shared flag through which a caller asks a running compilation to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[test]
fn test_cancel_token_is_shared() {
    let token = CancelToken::new();
    let clone = token.clone();
    assert!(!token.is_cancelled());
    clone.cancel();
    assert!(token.is_cancelled());
}
