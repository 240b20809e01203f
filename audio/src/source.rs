//! Audio sources feeding an [`InputTap`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SourceError;
use crate::format::Format;
use crate::tap::InputTap;

/// A live audio source.
///
/// `connect` acquires the underlying device and starts delivering samples
/// into the tap; `disconnect` releases it. Connecting an already connected
/// source replaces the tap.
pub trait AudioSource: Send {
    fn format(&self) -> Format;

    fn connect(&mut self, tap: InputTap) -> Result<(), SourceError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// A source driven by its owner.
///
/// Clones share the connection, so one clone can be handed to the engine
/// while the host keeps another to [`PushSource::feed`] samples from a file,
/// a network stream or a test.
#[derive(Clone)]
pub struct PushSource {
    format: Format,
    tap: Arc<Mutex<Option<InputTap>>>,
    denied: bool,
}

impl PushSource {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            tap: Arc::new(Mutex::new(None)),
            denied: false,
        }
    }

    /// A source whose `connect` always fails with `PermissionDenied`.
    pub fn denied(format: Format) -> Self {
        Self {
            denied: true,
            ..Self::new(format)
        }
    }

    /// Pushes samples to the connected tap. Returns false when disconnected.
    pub fn feed(&self, samples: &[f32]) -> bool {
        match self.tap.lock().as_ref() {
            Some(tap) => {
                tap.push(samples);
                true
            }
            None => false,
        }
    }
}

impl AudioSource for PushSource {
    fn format(&self) -> Format {
        self.format
    }

    fn connect(&mut self, tap: InputTap) -> Result<(), SourceError> {
        if self.denied {
            return Err(SourceError::PermissionDenied);
        }
        *self.tap.lock() = Some(tap);
        Ok(())
    }

    fn disconnect(&mut self) {
        *self.tap.lock() = None;
    }

    fn is_connected(&self) -> bool {
        self.tap.lock().is_some()
    }
}
