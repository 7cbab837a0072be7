//! The NFC radio boundary.
//!
//! The radio is only powered while a [`RadioSession`] is alive. Every read or
//! write races a [`CancelToken`]; a cancelled operation returns `None` and the
//! session is torn down before any late tag can be delivered.

use std::time::Duration;

use async_trait::async_trait;
use filomat_tag::{read_tag, write_message, DecodedTag, NdefMessage, TagError, TagResult, WriteReport};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::ScanResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioMode {
    Read,
    Write,
}

/// An NFC reader that delivers one tag at a time.
#[async_trait]
pub trait TagRadio: Send + Sync {
    fn is_available(&self) -> bool;

    fn enable(&self, mode: RadioMode) -> TagResult<()>;

    fn disable(&self);

    /// Wait for the next tag to come into range.
    async fn next_tag(&self) -> TagResult<Box<dyn filomat_tag::TagDevice>>;
}

/// Keeps the radio enabled for its lifetime and disables it on drop.
pub struct RadioSession<'a> {
    radio: &'a dyn TagRadio,
    mode: RadioMode,
}

impl<'a> RadioSession<'a> {
    pub fn acquire(radio: &'a dyn TagRadio, mode: RadioMode) -> TagResult<Self> {
        if !radio.is_available() {
            return Err(TagError::HardwareUnavailable);
        }
        radio.enable(mode)?;
        debug!(?mode, "radio enabled");
        Ok(Self { radio, mode })
    }

    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Read a single tag, or `None` if cancelled first.
    pub async fn read_one(self, cancel: &mut CancelToken) -> TagResult<Option<DecodedTag>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("read cancelled");
                Ok(None)
            }
            next = self.radio.next_tag() => {
                let mut device = next?;
                Ok(Some(read_tag(device.as_mut())))
            }
        }
    }

    /// Write `message` to a single tag, or `None` if cancelled first.
    pub async fn write_one(
        self,
        message: &NdefMessage,
        cancel: &mut CancelToken,
    ) -> TagResult<Option<WriteReport>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("write cancelled");
                Ok(None)
            }
            next = self.radio.next_tag() => {
                let mut device = next?;
                write_message(device.as_mut(), message).map(Some)
            }
        }
    }
}

impl Drop for RadioSession<'_> {
    fn drop(&mut self) {
        self.radio.disable();
        debug!(mode = ?self.mode, "radio disabled");
    }
}

/// Requests cancellation of every linked [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken(Option<watch::Receiver<bool>>);

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(Some(rx)))
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self(None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Completes once cancelled. Pending forever if the handle was dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.0.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

/// A successful write and the read that followed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub report: WriteReport,
    pub tag: DecodedTag,
}

/// Write `message`, release the radio, wait `settle`, then read the tag back.
///
/// Returns `None` if cancelled at any stage.
pub async fn write_then_verify(
    radio: &dyn TagRadio,
    message: &NdefMessage,
    settle: Duration,
    cancel: &mut CancelToken,
) -> ScanResult<Option<Verification>> {
    let session = RadioSession::acquire(radio, RadioMode::Write)?;
    let Some(report) = session.write_one(message, cancel).await? else {
        return Ok(None);
    };
    info!(bytes = report.bytes_written, formatted = report.formatted, "tag written");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(None),
        _ = tokio::time::sleep(settle) => {}
    }

    let session = RadioSession::acquire(radio, RadioMode::Read)?;
    let Some(tag) = session.read_one(cancel).await? else {
        return Ok(None);
    };
    info!(identifier = %tag.identifier, "tag verified");
    Ok(Some(Verification { report, tag }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedRadio;
    use filomat_tag::{metadata_message, EncodeOptions, SimulatedTag, TagContent};
    use filomat_types::FilamentMetadata;

    fn make_meta() -> FilamentMetadata {
        FilamentMetadata {
            material: Some("PETG".into()),
            color_hex: Some("00FF00".into()),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Session guard
    // -----------------------------------------------------------------------

    #[test]
    fn unavailable_radio_is_rejected() {
        let radio = SimulatedRadio::unavailable();
        let err = RadioSession::acquire(&radio, RadioMode::Read).err().unwrap();
        assert!(matches!(err, TagError::HardwareUnavailable));
        assert!(!radio.is_enabled());
    }

    #[test]
    fn guard_disables_on_drop() {
        let radio = SimulatedRadio::new();
        {
            let session = RadioSession::acquire(&radio, RadioMode::Write).unwrap();
            assert_eq!(session.mode(), RadioMode::Write);
            assert!(radio.is_enabled());
        }
        assert!(!radio.is_enabled());
    }

    #[tokio::test]
    async fn read_one_decodes_presented_tag() {
        let radio = SimulatedRadio::new();
        radio.present(SimulatedTag::ndef(vec![0xAA, 0x11], 512));

        let session = RadioSession::acquire(&radio, RadioMode::Read).unwrap();
        let tag = session.read_one(&mut CancelToken::never()).await.unwrap().unwrap();
        assert_eq!(tag.identifier, "AA11");
        assert_eq!(tag.content, TagContent::Blank);
        assert!(!radio.is_enabled());
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancel_before_tag_returns_none() {
        let radio = SimulatedRadio::new();
        let (handle, mut token) = cancel_pair();
        handle.cancel();

        radio.present(SimulatedTag::ndef(vec![1], 64));
        let session = RadioSession::acquire(&radio, RadioMode::Read).unwrap();
        assert!(session.read_one(&mut token).await.unwrap().is_none());
        assert!(!radio.is_enabled());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_while_waiting_returns_none() {
        let radio = SimulatedRadio::new();
        let (handle, mut token) = cancel_pair();

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        };
        let session = RadioSession::acquire(&radio, RadioMode::Read).unwrap();
        let (read, ()) = tokio::join!(session.read_one(&mut token), canceller);
        assert!(read.unwrap().is_none());
        assert!(!radio.is_enabled());
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, mut token) = cancel_pair();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
    }

    // -----------------------------------------------------------------------
    // Write then verify
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_then_verify_reads_back_metadata() {
        let radio = SimulatedRadio::new();
        let tag = radio.present(SimulatedTag::ndef(vec![0xBE, 0xEF], 512));
        radio.present_shared(tag.clone());

        let message = metadata_message(&make_meta(), EncodeOptions::default()).unwrap();
        let verified = write_then_verify(
            &radio,
            &message,
            Duration::from_millis(1),
            &mut CancelToken::never(),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!verified.report.formatted);
        assert_eq!(verified.tag.identifier, "BEEF");
        assert_eq!(verified.tag.metadata(), Some(&make_meta()));
        assert!(tag.lock().unwrap().raw_message().is_some());
        assert_eq!(radio.history(), vec![RadioMode::Write, RadioMode::Read]);
        assert!(!radio.is_enabled());
    }

    #[tokio::test]
    async fn write_to_read_only_tag_fails_and_disables() {
        let radio = SimulatedRadio::new();
        radio.present(SimulatedTag::ndef(vec![7], 512).read_only());

        let message = metadata_message(&make_meta(), EncodeOptions::default()).unwrap();
        let err = write_then_verify(&radio, &message, Duration::ZERO, &mut CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ScanError::Tag(TagError::NotWritable)));
        assert!(!radio.is_enabled());
    }

    #[tokio::test]
    async fn cancel_during_settle_skips_verification() {
        let radio = SimulatedRadio::new();
        let tag = radio.present(SimulatedTag::ndef(vec![9], 512));
        radio.present_shared(tag);
        let (handle, mut token) = cancel_pair();

        let message = metadata_message(&make_meta(), EncodeOptions::default()).unwrap();
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        };
        let (out, ()) = tokio::join!(
            write_then_verify(&radio, &message, Duration::from_secs(30), &mut token),
            canceller
        );
        assert!(out.unwrap().is_none());
        assert_eq!(radio.history(), vec![RadioMode::Write]);
    }
}
