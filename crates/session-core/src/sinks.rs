//! Remote stream sinks, one per media kind

use crate::types::{MediaKind, StreamId};

/// Streams currently rendered for each kind
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemoteSinks {
    audio: Option<StreamId>,
    video: Option<StreamId>,
}

impl RemoteSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `stream` to the sink for `kind`
    ///
    /// Returns `false` when the sink already holds that stream.
    pub fn attach(&mut self, kind: MediaKind, stream: &StreamId) -> bool {
        let slot = self.slot_mut(kind);
        if slot.as_ref() == Some(stream) {
            return false;
        }
        *slot = Some(stream.clone());
        true
    }

    pub fn get(&self, kind: MediaKind) -> Option<&StreamId> {
        match kind {
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Video => self.video.as_ref(),
        }
    }

    pub fn clear(&mut self) {
        self.audio = None;
        self.video = None;
    }

    fn slot_mut(&mut self, kind: MediaKind) -> &mut Option<StreamId> {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }
}
