//! Playlist and advance policy
//!
//! The playlist only decides *what* plays next; the engine acts on the
//! returned [`AdvanceAction`].

use crate::media::MediaKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tapedeck_core::{RepeatMode, Track, TrackId, TrackMetadata};

/// What the engine should do after a track ends or the user skips
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceAction {
    /// Nothing to play
    None,
    /// Play the current track again from the start
    RestartCurrent,
    /// Play this local track
    PlayTrack(Track),
    /// Hand this non-local track to an external player
    HandOffToExternalPlayer(Track),
    /// Sequential playback reached the end
    EndOfPlaylist,
}

/// Ordered track list with shuffle and repeat
#[derive(Debug)]
pub struct Playlist {
    tracks: Vec<Track>,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    ended: bool,
    rng: StdRng,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new(false, RepeatMode::Off)
    }
}

impl Playlist {
    /// Create an empty playlist
    pub fn new(shuffle: bool, repeat: RepeatMode) -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            shuffle,
            repeat,
            ended: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the shuffle generator with a seeded one
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ===== Edits =====

    /// Append a track
    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
        self.ended = false;
    }

    /// Remove a track by id
    ///
    /// Removing the current track makes its predecessor current, so the next
    /// sequential step lands on the track that took its place.
    pub fn remove(&mut self, id: &TrackId) -> Option<Track> {
        let index = self.position_of(id)?;
        let removed = self.tracks.remove(index);
        self.current = match self.current {
            Some(current) if current > index => Some(current - 1),
            Some(current) if current == index => index.checked_sub(1),
            other => other,
        };
        Some(removed)
    }

    /// Remove every track
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.ended = false;
    }

    /// Apply resolved metadata to a track
    ///
    /// Returns whether the track existed and accepted the metadata.
    pub fn apply_metadata(&mut self, id: &TrackId, metadata: &TrackMetadata) -> bool {
        self.tracks
            .iter_mut()
            .find(|track| &track.id == id)
            .is_some_and(|track| track.apply_metadata(metadata))
    }

    /// Make `id` the current track
    pub fn select(&mut self, id: &TrackId) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.current = Some(index);
                self.ended = false;
                true
            }
            None => false,
        }
    }

    // ===== Modes =====

    /// Enable or disable shuffle
    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    /// Shuffle setting
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Set the repeat mode
    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    /// Repeat mode
    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    // ===== Queries =====

    /// All tracks in order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track by id
    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| &track.id == id)
    }

    /// Index of a track
    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| &track.id == id)
    }

    /// Current index
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Current track
    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    /// Whether sequential playback ran off the end
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the playlist is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // ===== Advance policy =====

    /// Decide what follows the current track
    ///
    /// Repeat-One restarts only on a natural end, never on a manual skip.
    /// Shuffle picks uniformly among all tracks. Sequential mode wraps to
    /// the first track only under Repeat-All.
    pub fn next_action(&mut self, manual_skip: bool) -> AdvanceAction {
        if self.tracks.is_empty() {
            return AdvanceAction::None;
        }

        if self.repeat == RepeatMode::One && !manual_skip && self.current().is_some() {
            return AdvanceAction::RestartCurrent;
        }

        let index = if self.shuffle {
            self.rng.gen_range(0..self.tracks.len())
        } else {
            match self.current {
                None => 0,
                Some(current) if current + 1 < self.tracks.len() => current + 1,
                Some(_) if self.repeat == RepeatMode::All => 0,
                Some(_) => {
                    self.ended = true;
                    return AdvanceAction::EndOfPlaylist;
                }
            }
        };

        self.play_index(index)
    }

    /// Decide what precedes the current track
    ///
    /// At the first track this wraps under Repeat-All and restarts the
    /// track otherwise.
    pub fn previous_action(&mut self) -> AdvanceAction {
        let Some(current) = self.current else {
            return AdvanceAction::None;
        };
        if self.tracks.is_empty() {
            return AdvanceAction::None;
        }

        let index = match current.checked_sub(1) {
            Some(index) => index,
            None if self.repeat == RepeatMode::All => self.tracks.len() - 1,
            None => return AdvanceAction::RestartCurrent,
        };

        self.play_index(index)
    }

    fn play_index(&mut self, index: usize) -> AdvanceAction {
        self.current = Some(index);
        self.ended = false;
        let track = self.tracks[index].clone();
        match MediaKind::detect(&track.locator) {
            MediaKind::Stream => AdvanceAction::HandOffToExternalPlayer(track),
            MediaKind::Audio | MediaKind::Video => AdvanceAction::PlayTrack(track),
        }
    }
}
