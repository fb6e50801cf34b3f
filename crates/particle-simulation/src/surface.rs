//! Presentation hand-off

use crate::canvas::CanvasSnapshot;
use crossbeam::channel::{Sender, TrySendError};

/// Receives every finished canvas.
///
/// Called from whichever worker thread released the frame barrier, at most
/// once per completed frame. Implementations must not block: the next frame
/// cannot start until `present` returns.
pub trait PresentationSurface: Send + Sync {
    fn present(&self, snapshot: CanvasSnapshot);
}

/// Forwards snapshots over a channel; a full bounded channel drops the frame.
impl PresentationSurface for Sender<CanvasSnapshot> {
    fn present(&self, snapshot: CanvasSnapshot) {
        match self.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(snapshot)) => {
                log::trace!("presentation queue full, dropping frame {}", snapshot.frame);
            }
            Err(TrySendError::Disconnected(snapshot)) => {
                log::debug!("presentation receiver gone, dropping frame {}", snapshot.frame);
            }
        }
    }
}
