//! Playback engine - core orchestration
//!
//! Owns the authoritative playback state and the live seek epoch. All
//! methods run on the control context; the render graph reports back only
//! through its completion channel, drained in [`PlaybackEngine::pump`].
//!
//! Ordering rule: the live epoch is invalidated *before* any call that
//! makes the graph emit a completion (`stop`), so that completion is always
//! stale by the time it is drained.

use crate::clock::Clock;
use crate::epoch::{EpochSource, SeekEpoch};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::media::MediaKind;
use crate::metadata::MetadataTasks;
use crate::playlist::{AdvanceAction, Playlist};
use crate::render::{AudioFileInfo, Completion, RenderGraph};
use crate::state::{PlaybackState, StopReason};
use crate::timer::TaggedTimers;
use crossbeam_channel::Receiver;
use tapedeck_core::{PlaybackSettings, RepeatMode, Track, TrackId};
use tracing::{debug, info, warn};

/// Engine timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKey {
    /// Periodic position report
    Progress,
    /// Release of the completion re-entrancy guard
    CompletionGrace,
    /// Release of the seek guard
    SeekGuard,
}

/// Sample-accurate playback state machine
pub struct PlaybackEngine<G: RenderGraph> {
    graph: G,
    completions: Receiver<Completion>,
    clock: Box<dyn Clock>,
    settings: PlaybackSettings,

    // Scheduling
    epochs: EpochSource,
    live_epoch: Option<SeekEpoch>,
    file: Option<AudioFileInfo>,
    segment_start_frame: u64,

    // State
    state: PlaybackState,
    is_playing: bool,
    is_paused: bool,
    current_track: Option<Track>,
    current_time: f64,
    duration: f64,
    progress: f64,
    volume: f32,
    balance: f32,

    // Guards
    completion_guard: bool,
    seek_guard: bool,
    deferred_completion: Option<SeekEpoch>,
    timers: TaggedTimers<TimerKey>,

    // Collaborators
    playlist: Playlist,
    metadata: Option<MetadataTasks>,

    // Event queue for UI synchronization
    pending_events: Vec<PlaybackEvent>,
}

impl<G: RenderGraph> PlaybackEngine<G> {
    /// Create an idle engine driving `graph`
    pub fn new(mut graph: G, settings: &PlaybackSettings, clock: Box<dyn Clock>) -> Self {
        let completions = graph.completions();
        let volume = settings.volume.clamp(0.0, 1.0);
        let balance = settings.balance.clamp(-1.0, 1.0);
        graph.set_volume(volume);
        graph.set_balance(balance);

        Self {
            graph,
            completions,
            clock,
            settings: settings.clone(),
            epochs: EpochSource::new(),
            live_epoch: None,
            file: None,
            segment_start_frame: 0,
            state: PlaybackState::Idle,
            is_playing: false,
            is_paused: false,
            current_track: None,
            current_time: 0.0,
            duration: 0.0,
            progress: 0.0,
            volume,
            balance,
            completion_guard: false,
            seek_guard: false,
            deferred_completion: None,
            timers: TaggedTimers::new(),
            playlist: Playlist::new(settings.shuffle, settings.repeat),
            metadata: None,
            pending_events: Vec::new(),
        }
    }

    /// Attach a metadata loader for placeholder tracks
    #[must_use]
    pub fn with_metadata(mut self, tasks: MetadataTasks) -> Self {
        self.metadata = Some(tasks);
        self
    }

    // ===== Track loading =====

    /// Load and start `track`
    ///
    /// Stream locators are a contract violation here and are rejected
    /// before any state changes. Video is handed to an external player. A
    /// file that fails to open leaves the engine stopped on the track with
    /// duration 0 and queues [`PlaybackEvent::LoadFailed`].
    pub fn play_track(&mut self, track: Track) -> Result<()> {
        let kind = MediaKind::detect(&track.locator);
        if kind == MediaKind::Stream {
            return Err(PlaybackError::StreamNotSchedulable(track.id));
        }

        // Invalidate before stopping so the stop's completion is stale.
        self.live_epoch = None;
        self.graph.stop();
        self.timers.cancel(TimerKey::Progress);
        self.timers.cancel(TimerKey::SeekGuard);
        self.seek_guard = false;
        self.deferred_completion = None;
        self.file = None;
        self.segment_start_frame = 0;

        self.current_time = 0.0;
        self.progress = 0.0;
        self.duration = 0.0;

        self.playlist.select(&track.id);
        let previous_track_id = self.current_track.as_ref().map(|t| t.id.clone());
        self.current_track = Some(track.clone());
        self.set_state(PlaybackState::Preparing);
        self.pending_events.push(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            previous_track_id,
        });

        if kind == MediaKind::Video {
            info!("Handing off video track {}", track.id);
            self.pending_events
                .push(PlaybackEvent::HandOffToExternalPlayer { track, kind });
            self.set_state(PlaybackState::Idle);
            return Ok(());
        }

        let Some(path) = track.locator.local_path() else {
            return Err(PlaybackError::StreamNotSchedulable(track.id));
        };
        let info = match self.graph.open(path) {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to load '{}': {}", track.title, e);
                self.pending_events.push(PlaybackEvent::LoadFailed {
                    track_id: track.id,
                    reason: e.to_string(),
                });
                self.set_state(PlaybackState::Stopped(StopReason::Manual));
                return Ok(());
            }
        };

        debug!(
            "Opened '{}': {} Hz, {} ch, {} frames",
            track.title, info.sample_rate, info.channels, info.length_frames
        );
        self.file = Some(info);
        self.duration = info.duration_secs();
        self.start_from(0.0, true)
    }

    /// Schedule the open file from `time` seconds under `epoch`
    ///
    /// Returns false (and stops the graph) when `time` lies within the
    /// end-of-file epsilon; the caller decides whether that is a completion.
    pub fn schedule_from(&mut self, time: f64, epoch: SeekEpoch) -> Result<bool> {
        let info = self.file.ok_or(PlaybackError::NoTrackLoaded)?;
        let sample_rate = f64::from(info.sample_rate);

        let target = ((time.max(0.0) * sample_rate).round() as u64).min(info.length_frames);
        let remaining = info.length_frames - target;
        let epsilon_frames = (self.settings.end_of_file_epsilon_secs() * sample_rate) as u64;

        if remaining <= epsilon_frames {
            debug!("Schedule target {:.3}s is at end of file", time);
            self.graph.stop();
            return Ok(false);
        }

        self.graph.schedule_segment(target, remaining, epoch)?;
        self.segment_start_frame = target;
        Ok(true)
    }

    // Fresh epoch, reschedule from `time`, optionally resume.
    fn start_from(&mut self, time: f64, resume: bool) -> Result<()> {
        self.live_epoch = None;
        self.graph.stop();
        self.timers.cancel(TimerKey::Progress);

        // A new epoch ends the previous completion's grace period.
        let epoch = self.epochs.next();
        self.live_epoch = Some(epoch);
        self.completion_guard = false;
        self.timers.cancel(TimerKey::CompletionGrace);
        self.current_time = time;
        self.progress = if self.duration > 0.0 {
            (time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if self.schedule_from(time, epoch)? {
            if resume {
                self.graph.play()?;
                self.set_state(PlaybackState::Playing);
                self.arm_progress();
            } else {
                self.set_state(PlaybackState::Paused);
            }
        } else {
            self.finish_at_end(epoch);
        }
        Ok(())
    }

    // Nothing scheduled at end of file: stop now, complete once the seek
    // guard relaxes (or immediately when no guard is raised).
    fn finish_at_end(&mut self, epoch: SeekEpoch) {
        self.current_time = self.duration;
        self.progress = 1.0;
        self.set_state(PlaybackState::Stopped(StopReason::Completed));
        if self.seek_guard {
            self.deferred_completion = Some(epoch);
        } else {
            self.on_playback_ended(epoch);
        }
    }

    // ===== Completion =====

    /// Handle a hardware completion tagged with `epoch`
    ///
    /// Ignored while the re-entrancy guard is held, when `epoch` is not the
    /// live epoch, or when playback was intentionally stopped. The guard is
    /// released after the completion grace delay or as soon as a new epoch
    /// is scheduled.
    pub fn on_playback_ended(&mut self, epoch: SeekEpoch) {
        if self.completion_guard {
            debug!("Completion ignored: guard active");
            return;
        }
        if self.live_epoch != Some(epoch) {
            debug!("Completion ignored: stale epoch");
            return;
        }
        if self.state.is_intentionally_stopped() {
            debug!("Completion ignored: stopped intentionally");
            return;
        }
        if self.seek_guard {
            self.deferred_completion = Some(epoch);
            return;
        }

        self.completion_guard = true;
        let grace = self.clock.now() + self.settings.completion_grace();
        self.timers.start(TimerKey::CompletionGrace, grace);
        self.timers.cancel(TimerKey::Progress);
        self.live_epoch = None;

        self.current_time = self.duration;
        self.progress = 1.0;
        self.emit_progress();
        if let Some(track) = &self.current_track {
            self.pending_events.push(PlaybackEvent::PlaybackEnded {
                track_id: track.id.clone(),
            });
        }
        self.set_state(PlaybackState::Stopped(StopReason::Completed));

        let action = self.playlist.next_action(false);
        self.apply_action(action);
    }

    fn apply_action(&mut self, action: AdvanceAction) {
        match action {
            AdvanceAction::None => {}
            AdvanceAction::RestartCurrent => {
                if let Err(e) = self.restart_current() {
                    warn!("Failed to restart current track: {}", e);
                }
            }
            AdvanceAction::PlayTrack(track) => {
                if let Err(e) = self.play_track(track) {
                    warn!("Failed to advance: {}", e);
                }
            }
            AdvanceAction::HandOffToExternalPlayer(track) => {
                info!("Handing off stream {}", track.id);
                self.halt();
                self.file = None;
                self.current_time = 0.0;
                self.duration = 0.0;
                self.progress = 0.0;
                let previous_track_id = self.current_track.as_ref().map(|t| t.id.clone());
                self.current_track = Some(track.clone());
                self.pending_events.push(PlaybackEvent::TrackChanged {
                    track_id: track.id.clone(),
                    previous_track_id,
                });
                self.pending_events.push(PlaybackEvent::HandOffToExternalPlayer {
                    track,
                    kind: MediaKind::Stream,
                });
                self.set_state(PlaybackState::Idle);
            }
            AdvanceAction::EndOfPlaylist => {
                if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
                    self.stop();
                }
                self.pending_events.push(PlaybackEvent::PlaylistEnded);
            }
        }
    }

    fn restart_current(&mut self) -> Result<()> {
        if self.file.is_some() {
            return self.start_from(0.0, true);
        }
        match self.current_track.clone() {
            Some(track) => self.play_track(track),
            None => Ok(()),
        }
    }

    // ===== Playback control =====

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Preparing => Ok(()),
            PlaybackState::Paused => {
                self.graph.play()?;
                self.set_state(PlaybackState::Playing);
                self.arm_progress();
                Ok(())
            }
            PlaybackState::Idle | PlaybackState::Stopped(_) => {
                if self.file.is_some() {
                    return self.start_from(0.0, true);
                }
                if let Some(track) = self.current_track.clone() {
                    if track.is_local() {
                        return self.play_track(track);
                    }
                }
                let action = self.playlist.next_action(true);
                self.apply_action(action);
                Ok(())
            }
        }
    }

    /// Pause playback
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.update_position();
        self.graph.pause();
        self.timers.cancel(TimerKey::Progress);
        self.set_state(PlaybackState::Paused);
    }

    /// Stop playback
    ///
    /// The track stays loaded; `play` restarts it from the beginning.
    pub fn stop(&mut self) {
        self.halt();
        self.current_time = 0.0;
        self.progress = 0.0;
        self.set_state(PlaybackState::Stopped(StopReason::Manual));
    }

    // Epoch first, then graph, then timers and guards.
    fn halt(&mut self) {
        self.live_epoch = None;
        self.graph.stop();
        self.timers.cancel(TimerKey::Progress);
        self.timers.cancel(TimerKey::SeekGuard);
        self.seek_guard = false;
        self.deferred_completion = None;
    }

    /// Stop, clear the playlist and cancel outstanding metadata loads
    pub fn eject(&mut self) {
        self.halt();
        self.timers.cancel_all();
        self.completion_guard = false;
        if let Some(tasks) = self.metadata.as_mut() {
            tasks.cancel_all();
        }
        self.playlist.clear();
        self.current_track = None;
        self.file = None;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.progress = 0.0;
        self.set_state(PlaybackState::Stopped(StopReason::Ejected));
    }

    // ===== Seek =====

    /// Seek to `time` seconds
    ///
    /// `resume` defaults to whether playback is currently running. The
    /// target progress is computed from the file length, never from track
    /// metadata. Seeking to the end stops with `Stopped(Completed)` and the
    /// completion is processed once the seek guard relaxes.
    pub fn seek(&mut self, time: f64, resume: Option<bool>) -> Result<()> {
        let info = self.file.ok_or(PlaybackError::NoTrackLoaded)?;
        let resume = resume.unwrap_or(self.state == PlaybackState::Playing);

        self.seek_guard = true;
        let release = self.clock.now() + self.settings.seek_guard();
        self.timers.start(TimerKey::SeekGuard, release);
        self.deferred_completion = None;

        self.duration = info.duration_secs();
        let target = time.clamp(0.0, self.duration);
        self.start_from(target, resume)
    }

    /// Seek to a fraction of the file length
    pub fn seek_to_percent(&mut self, percent: f64, resume: Option<bool>) -> Result<()> {
        let info = self.file.ok_or(PlaybackError::NoTrackLoaded)?;
        self.seek(percent.clamp(0.0, 1.0) * info.duration_secs(), resume)
    }

    // ===== Navigation =====

    /// Advance to the next track
    pub fn next_track(&mut self, is_manual_skip: bool) {
        let action = self.playlist.next_action(is_manual_skip);
        self.apply_action(action);
    }

    /// Go back
    ///
    /// Past the restart threshold this restarts the current track instead.
    pub fn previous_track(&mut self) {
        self.update_position();
        if self.file.is_some() && self.current_time > self.settings.previous_restart_threshold_secs
        {
            if let Err(e) = self.seek(0.0, None) {
                warn!("Failed to restart current track: {}", e);
            }
            return;
        }
        let action = self.playlist.previous_action();
        self.apply_action(action);
    }

    // ===== Playlist =====

    /// Append a track, requesting metadata for unresolved local files
    pub fn add_track(&mut self, track: Track) {
        if !track.is_metadata_resolved() {
            if let (Some(tasks), Some(path)) = (self.metadata.as_mut(), track.locator.local_path())
            {
                if let Err(e) = tasks.request(track.id.clone(), path) {
                    warn!("Metadata request failed for {}: {}", track.id, e);
                }
            }
        }
        self.playlist.add(track);
    }

    /// Remove a track, cancelling its metadata load
    ///
    /// Removing the playing track stops playback.
    pub fn remove_track(&mut self, id: &TrackId) -> Result<Track> {
        if let Some(tasks) = self.metadata.as_mut() {
            tasks.cancel(id);
        }
        let removed = self
            .playlist
            .remove(id)
            .ok_or_else(|| PlaybackError::TrackNotFound(id.clone()))?;
        if self.current_track.as_ref().is_some_and(|t| &t.id == id) {
            self.stop();
            self.current_track = None;
            self.file = None;
            self.duration = 0.0;
        }
        Ok(removed)
    }

    /// Remove every track without stopping the current one
    pub fn clear_playlist(&mut self) {
        if let Some(tasks) = self.metadata.as_mut() {
            tasks.cancel_all();
        }
        self.playlist.clear();
    }

    /// Play a playlist entry by id
    pub fn play_track_id(&mut self, id: &TrackId) -> Result<()> {
        let track = self
            .playlist
            .track(id)
            .cloned()
            .ok_or_else(|| PlaybackError::TrackNotFound(id.clone()))?;
        self.play_track(track)
    }

    /// Enable or disable shuffle
    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.playlist.set_shuffle(shuffle);
    }

    /// Set the repeat mode
    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.playlist.set_repeat(repeat);
    }

    /// Seed the shuffle generator
    pub fn seed_shuffle(&mut self, seed: u64) {
        self.playlist.reseed(seed);
    }

    // ===== Output =====

    /// Set output volume, applying it to the graph immediately
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.graph.set_volume(self.volume);
    }

    /// Set stereo balance, applying it to the graph immediately
    pub fn set_balance(&mut self, balance: f32) {
        self.balance = balance.clamp(-1.0, 1.0);
        self.graph.set_balance(self.balance);
    }

    // ===== Main-context tick =====

    /// Drain completions and metadata results, then fire due timers
    pub fn pump(&mut self) {
        while let Ok(completion) = self.completions.try_recv() {
            self.on_playback_ended(completion.epoch);
        }

        self.apply_metadata_results();

        let now = self.clock.now();
        for key in self.timers.take_due(now) {
            match key {
                TimerKey::Progress => {
                    if self.state == PlaybackState::Playing {
                        self.update_position();
                        self.emit_progress();
                        self.arm_progress();
                    }
                }
                TimerKey::CompletionGrace => {
                    self.completion_guard = false;
                }
                TimerKey::SeekGuard => {
                    self.seek_guard = false;
                    if let Some(epoch) = self.deferred_completion.take() {
                        self.on_playback_ended(epoch);
                    }
                }
            }
        }
    }

    fn apply_metadata_results(&mut self) {
        let Some(tasks) = self.metadata.as_mut() else {
            return;
        };
        for outcome in tasks.poll() {
            match outcome.result {
                Ok((metadata, properties)) => {
                    let applied = self.playlist.apply_metadata(&outcome.track_id, &metadata);
                    if let Some(track) = self
                        .current_track
                        .as_mut()
                        .filter(|t| t.id == outcome.track_id)
                    {
                        track.apply_metadata(&metadata);
                    }
                    if applied {
                        debug!(
                            "Metadata for {}: {} ch, {} kbps, {} Hz",
                            outcome.track_id,
                            properties.channel_count,
                            properties.bitrate_kbps,
                            properties.sample_rate_hz
                        );
                        self.pending_events.push(PlaybackEvent::MetadataResolved {
                            track_id: outcome.track_id,
                        });
                    }
                }
                Err(reason) => {
                    warn!("Metadata load failed for {}: {}", outcome.track_id, reason);
                }
            }
        }
    }

    fn arm_progress(&mut self) {
        let deadline = self.clock.now() + self.settings.progress_interval();
        self.timers.start(TimerKey::Progress, deadline);
    }

    fn update_position(&mut self) {
        let Some(info) = self.file else {
            return;
        };
        if !matches!(self.state, PlaybackState::Playing) || info.sample_rate == 0 {
            return;
        }
        let frame = self.segment_start_frame + self.graph.rendered_frames();
        let frame = frame.min(info.length_frames);
        self.current_time = frame as f64 / f64::from(info.sample_rate);
        self.progress = if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    fn emit_progress(&mut self) {
        self.pending_events.push(PlaybackEvent::Progress {
            current_time: self.current_time,
            duration: self.duration,
            progress: self.progress,
        });
    }

    // Derived flags and the event change only on an actual transition.
    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.is_playing = state == PlaybackState::Playing;
        self.is_paused = state == PlaybackState::Paused;
        self.pending_events
            .push(PlaybackEvent::StateChanged { state });
    }

    // ===== State queries =====

    /// Current state
    pub fn playback_state(&self) -> PlaybackState {
        self.state
    }

    /// Whether audio is rendering
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Position in seconds as of the last progress update
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// File length in seconds (0 when nothing is loaded)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Position as a fraction of the file length
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Track being played
    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    /// Output volume
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Stereo balance
    pub fn balance(&self) -> f32 {
        self.balance
    }

    /// The playlist
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Whether a seek has not yet relaxed
    pub fn is_seek_guarded(&self) -> bool {
        self.seek_guard
    }

    /// The render graph
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable access to the render graph
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    // ===== Events =====

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Whether events are queued
    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }
}

impl<G: RenderGraph> std::fmt::Debug for PlaybackEngine<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state)
            .field("current_time", &self.current_time)
            .field("duration", &self.duration)
            .field("live_epoch", &self.live_epoch)
            .finish_non_exhaustive()
    }
}
