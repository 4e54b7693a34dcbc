//! Frame capture loop for merchant QR codes.
//!
//! The frame source is exclusively owned by one scan and is stopped on every
//! exit path: first successful parse, cancellation, end of stream, or the scan
//! future being dropped.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::model::MerchantSession;
use crate::qr::parse_payload;

/// One captured image.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A live frame source, e.g. a camera stream.
#[async_trait]
pub trait Camera: Send {
    /// Wait for the next frame. `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Release the underlying device. Called exactly once per scan.
    fn stop(&mut self);
}

/// External QR decoding primitive: image in, decoded text out.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("scan cancelled")]
    Cancelled,
    #[error("camera stream ended before a merchant code was read")]
    StreamEnded,
}

/// A successful scan: the session plus the raw payload it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCode {
    pub session: MerchantSession,
    pub raw: String,
}

/// Stops the camera when dropped.
struct CaptureGuard<C: Camera> {
    camera: C,
}

impl<C: Camera> Drop for CaptureGuard<C> {
    fn drop(&mut self) {
        self.camera.stop();
    }
}

/// Read frames until one decodes to a valid merchant payload.
///
/// Frames that decode to something unrecognized are skipped; there is no
/// attempt limit. The camera is owned by the returned future from the moment
/// of the call, so dropping it unpolled also releases the device.
pub fn scan_merchant<'a, C, D>(
    camera: C,
    decoder: &'a D,
    cancel: &'a CancellationToken,
) -> impl Future<Output = Result<ScannedCode, ScanError>> + 'a
where
    C: Camera + 'a,
    D: QrDecoder + ?Sized + 'a,
{
    capture(CaptureGuard { camera }, decoder, cancel)
}

async fn capture<C: Camera, D: QrDecoder + ?Sized>(
    mut guard: CaptureGuard<C>,
    decoder: &D,
    cancel: &CancellationToken,
) -> Result<ScannedCode, ScanError> {
    let mut frames = 0u64;

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            frame = guard.camera.next_frame() => frame,
        };
        let Some(frame) = frame else {
            return Err(ScanError::StreamEnded);
        };
        frames += 1;

        let Some(raw) = decoder.decode(&frame) else {
            continue;
        };

        match parse_payload(&raw) {
            Ok(session) => {
                info!(
                    merchant = %session.merchant_id,
                    store = %session.store_id,
                    frames,
                    "merchant code scanned"
                );
                return Ok(ScannedCode { session, raw });
            }
            Err(e) => {
                debug!(frames, reason = %e, "decoded code is not a merchant payload");
            }
        }
    }
}
