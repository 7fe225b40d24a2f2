use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use webrtc::track::track_local::TrackLocal;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

struct LocalMediaInner {
    tracks: Vec<LocalTrack>,
    released: AtomicBool,
}

/// Local capture shared read-only by every session of one client.
#[derive(Clone)]
pub struct LocalMedia {
    inner: Arc<LocalMediaInner>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self {
            inner: Arc::new(LocalMediaInner {
                tracks,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Receive-only participation.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Tracks to attach. Empty once released.
    pub fn tracks(&self) -> &[LocalTrack] {
        if self.is_released() {
            &[]
        } else {
            &self.inner.tracks
        }
    }

    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::SeqCst) {
            info!("Released {} local tracks", self.inner.tracks.len());
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMedia")
            .field("tracks", &self.inner.tracks.len())
            .field("released", &self.is_released())
            .finish()
    }
}
