//! In-memory radio that hands out queued [`SimulatedTag`]s.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filomat_tag::{NdefMessage, SimulatedTag, TagDevice, TagError, TagResult, TagTechnology};
use tokio::sync::mpsc;

use crate::radio::{RadioMode, TagRadio};

pub type SharedTag = Arc<Mutex<SimulatedTag>>;

/// A [`TagRadio`] fed by [`present`](SimulatedRadio::present).
///
/// `next_tag` waits until a tag has been presented. Writes land on the shared
/// tag, so the caller can inspect or save it afterwards.
pub struct SimulatedRadio {
    available: bool,
    enabled: Mutex<Option<RadioMode>>,
    history: Mutex<Vec<RadioMode>>,
    tx: mpsc::UnboundedSender<SharedTag>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SharedTag>>,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            available: true,
            enabled: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// A device without NFC hardware.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Queue a tag for the next `next_tag` call.
    pub fn present(&self, tag: SimulatedTag) -> SharedTag {
        let shared = Arc::new(Mutex::new(tag));
        self.present_shared(shared.clone());
        shared
    }

    /// Queue an already-presented tag again.
    pub fn present_shared(&self, tag: SharedTag) {
        // The receiver lives as long as `self`.
        let _ = self.tx.send(tag);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.lock().expect("lock poisoned").is_some()
    }

    /// Every mode the radio was enabled in, oldest first.
    pub fn history(&self) -> Vec<RadioMode> {
        self.history.lock().expect("lock poisoned").clone()
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagRadio for SimulatedRadio {
    fn is_available(&self) -> bool {
        self.available
    }

    fn enable(&self, mode: RadioMode) -> TagResult<()> {
        if !self.available {
            return Err(TagError::HardwareUnavailable);
        }
        *self.enabled.lock().expect("lock poisoned") = Some(mode);
        self.history.lock().expect("lock poisoned").push(mode);
        Ok(())
    }

    fn disable(&self) {
        *self.enabled.lock().expect("lock poisoned") = None;
    }

    async fn next_tag(&self) -> TagResult<Box<dyn TagDevice>> {
        if !self.is_enabled() {
            return Err(TagError::Device("radio is not enabled".into()));
        }
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(tag) => Ok(Box::new(PresentedTag::new(tag))),
            None => Err(TagError::Device("radio closed".into())),
        }
    }
}

/// A tag in the field, backed by a shared [`SimulatedTag`].
pub struct PresentedTag {
    hardware_id: Vec<u8>,
    tag: SharedTag,
}

impl PresentedTag {
    pub fn new(tag: SharedTag) -> Self {
        let hardware_id = tag.lock().expect("lock poisoned").hardware_id().to_vec();
        Self { hardware_id, tag }
    }
}

impl TagDevice for PresentedTag {
    fn hardware_id(&self) -> &[u8] {
        &self.hardware_id
    }

    fn technology(&self) -> TagTechnology {
        self.tag.lock().expect("lock poisoned").technology()
    }

    fn read_message(&mut self) -> TagResult<Option<NdefMessage>> {
        self.tag.lock().expect("lock poisoned").read_message()
    }

    fn write_message(&mut self, message: &NdefMessage) -> TagResult<()> {
        self.tag.lock().expect("lock poisoned").write_message(message)
    }

    fn format_and_write(&mut self, message: &NdefMessage) -> TagResult<()> {
        self.tag.lock().expect("lock poisoned").format_and_write(message)
    }
}
