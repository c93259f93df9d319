//! Property-based tests for the playback engine
//!
//! Uses proptest to verify invariants across random command sequences.

use proptest::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tapedeck_core::{PlaybackSettings, RepeatMode, Track, TrackLocator};
use tapedeck_playback::test_utils::{ManualClock, MockRenderGraph};
use tapedeck_playback::{
    AdvanceAction, PlaybackEngine, PlaybackEvent, PlaybackState, Playlist, RenderGraph,
    StopReason,
};

const RATE: u32 = 8_000;

// ===== Helpers =====

fn create_test_track(index: usize) -> Track {
    Track::new(
        TrackLocator::LocalFile(PathBuf::from(format!("/music/{index}.wav"))),
        format!("Track {index}"),
        "Artist",
        2.0,
    )
}

#[derive(Debug, Clone)]
enum Command {
    Play,
    Pause,
    Stop,
    Seek(f64),
    Next,
    Previous,
    Render(u64),
    Wait(u64),
}

fn arbitrary_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Play),
        Just(Command::Pause),
        Just(Command::Stop),
        (0.0f64..3.0).prop_map(Command::Seek),
        Just(Command::Next),
        Just(Command::Previous),
        (1u64..1500).prop_map(Command::Render),
        (1u64..400).prop_map(Command::Wait),
    ]
}

fn arbitrary_repeat() -> impl Strategy<Value = RepeatMode> {
    prop_oneof![
        Just(RepeatMode::Off),
        Just(RepeatMode::All),
        Just(RepeatMode::One)
    ]
}

fn engine_with_tracks(
    count: usize,
    repeat: RepeatMode,
) -> (PlaybackEngine<MockRenderGraph>, ManualClock) {
    let mut graph = MockRenderGraph::new();
    for index in 0..count {
        graph = graph.with_file(format!("/music/{index}.wav"), RATE, 2 * u64::from(RATE));
    }
    let clock = ManualClock::new();
    let mut engine =
        PlaybackEngine::new(graph, &PlaybackSettings::default(), Box::new(clock.clone()));
    engine.set_repeat(repeat);
    for index in 0..count {
        engine.add_track(create_test_track(index));
    }
    (engine, clock)
}

fn playlist_of(count: usize, shuffle: bool, repeat: RepeatMode) -> Playlist {
    let mut playlist = Playlist::new(shuffle, repeat);
    for index in 0..count {
        playlist.add(create_test_track(index));
    }
    playlist
}

// ===== Property Tests =====

proptest! {
    /// Property: derived flags, time and progress stay consistent with state
    #[test]
    fn engine_state_stays_consistent(
        count in 1usize..4,
        repeat in arbitrary_repeat(),
        commands in prop::collection::vec(arbitrary_command(), 1..50)
    ) {
        let (mut engine, clock) = engine_with_tracks(count, repeat);

        for command in commands {
            match command {
                Command::Play => { let _ = engine.play(); }
                Command::Pause => engine.pause(),
                Command::Stop => engine.stop(),
                Command::Seek(time) => { let _ = engine.seek(time, None); }
                Command::Next => engine.next_track(true),
                Command::Previous => engine.previous_track(),
                Command::Render(ms) => {
                    let by = Duration::from_millis(ms);
                    engine.graph_mut().advance(by);
                    clock.advance(by);
                    engine.pump();
                }
                Command::Wait(ms) => {
                    clock.advance(Duration::from_millis(ms));
                    engine.pump();
                }
            }

            let state = engine.playback_state();
            prop_assert_eq!(engine.is_playing(), state == PlaybackState::Playing);
            prop_assert_eq!(engine.is_paused(), state == PlaybackState::Paused);
            prop_assert!((0.0..=1.0).contains(&engine.progress()));
            prop_assert!(engine.current_time() <= engine.duration() + 1e-9);
            if state == PlaybackState::Playing {
                prop_assert!(engine.graph().is_running() || engine.graph().segment().is_none());
            }
        }
    }

    /// Property: StateChanged is only emitted for an actual transition
    #[test]
    fn state_events_are_transitions(
        commands in prop::collection::vec(arbitrary_command(), 1..40)
    ) {
        let (mut engine, clock) = engine_with_tracks(2, RepeatMode::All);
        let mut last = engine.playback_state();

        for command in commands {
            match command {
                Command::Play => { let _ = engine.play(); }
                Command::Pause => engine.pause(),
                Command::Stop => engine.stop(),
                Command::Seek(time) => { let _ = engine.seek(time, None); }
                Command::Next => engine.next_track(true),
                Command::Previous => engine.previous_track(),
                Command::Render(ms) | Command::Wait(ms) => {
                    let by = Duration::from_millis(ms);
                    engine.graph_mut().advance(by);
                    clock.advance(by);
                    engine.pump();
                }
            }

            for event in engine.drain_events() {
                if let PlaybackEvent::StateChanged { state } = event {
                    prop_assert_ne!(state, last);
                    last = state;
                }
            }
            prop_assert_eq!(last, engine.playback_state());
        }
    }

    /// Property: after a manual stop no completion is ever accepted
    #[test]
    fn manual_stop_is_never_overridden(
        render_ms in 1u64..5000,
        repeat in arbitrary_repeat()
    ) {
        let (mut engine, clock) = engine_with_tracks(2, repeat);
        engine.play().unwrap();
        engine.stop();
        engine.drain_events();

        let by = Duration::from_millis(render_ms);
        engine.graph_mut().advance(by);
        clock.advance(by);
        engine.pump();

        let events = engine.drain_events();
        prop_assert!(
            !events.iter().any(|e| matches!(e, PlaybackEvent::PlaybackEnded { .. })),
            "unexpected PlaybackEnded event"
        );
        prop_assert_eq!(
            engine.playback_state(),
            PlaybackState::Stopped(StopReason::Manual)
        );
        prop_assert!(!engine.is_playing());
    }

    /// Property: sequential playback visits every track once, in order, then ends
    #[test]
    fn sequential_visits_each_track_once(count in 1usize..30) {
        let mut playlist = playlist_of(count, false, RepeatMode::Off);
        for index in 0..count {
            match playlist.next_action(false) {
                AdvanceAction::PlayTrack(track) => {
                    prop_assert_eq!(track.title, format!("Track {index}"));
                }
                other => prop_assert!(false, "unexpected action {:?}", other),
            }
        }
        prop_assert_eq!(playlist.next_action(false), AdvanceAction::EndOfPlaylist);
    }

    /// Property: Repeat-All never reports the end of the playlist
    #[test]
    fn repeat_all_never_ends(
        count in 1usize..10,
        shuffle in any::<bool>(),
        steps in 1usize..100,
        seed in any::<u64>()
    ) {
        let mut playlist = playlist_of(count, shuffle, RepeatMode::All);
        playlist.reseed(seed);
        for _ in 0..steps {
            let action = playlist.next_action(true);
            prop_assert!(matches!(action, AdvanceAction::PlayTrack(_)));
            prop_assert!(playlist.current_index().unwrap() < count);
        }
    }

    /// Property: Repeat-One restarts on every natural end once a track is current
    #[test]
    fn repeat_one_restarts_on_natural_end(count in 1usize..10, ends in 1usize..20) {
        let mut playlist = playlist_of(count, false, RepeatMode::One);
        let first = playlist.next_action(false);
        prop_assert!(matches!(first, AdvanceAction::PlayTrack(_)));
        for _ in 0..ends {
            prop_assert_eq!(playlist.next_action(false), AdvanceAction::RestartCurrent);
        }
        prop_assert_eq!(playlist.current_index(), Some(0));
    }
}
