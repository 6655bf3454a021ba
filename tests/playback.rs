use std::path::Path;
use std::sync::Arc;

use scenereel::{
    AudioChannel, AudioPcm, AudioSync, FnPacer, ManualClock, NullAudioChannel, PcmChannel,
    PlaybackState, Player, PlayerEvent, SceneDocument, StaticPcmDecoder, SvgRenderer, TickOutcome,
};

fn fixture(name: &str) -> SceneDocument {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name);
    SceneDocument::from_path(path).unwrap()
}

fn silent_player(clock: Arc<ManualClock>) -> Player {
    Player::new(
        clock,
        Box::new(SvgRenderer::default()),
        AudioSync::new(
            Box::new(NullAudioChannel::new()),
            Box::new(NullAudioChannel::new()),
        ),
    )
}

fn tone(seconds: usize) -> AudioPcm {
    AudioPcm {
        sample_rate: 1000,
        channels: 2,
        interleaved_f32: vec![0.2; seconds * 2000],
    }
}

/// Player over two shared `PcmChannel`s (background, scene) so tests can observe them.
fn audible_player(clock: Arc<ManualClock>) -> (Player, PcmChannel, PcmChannel) {
    let decoder = Arc::new(
        StaticPcmDecoder::new()
            .with_source("music.wav", tone(60))
            .with_source("voice.wav", tone(10)),
    );
    let bg = PcmChannel::new(clock.clone(), decoder.clone());
    let sc = PcmChannel::new(clock.clone(), decoder);
    let player = Player::new(
        clock,
        Box::new(SvgRenderer::default()),
        AudioSync::new(Box::new(bg.clone()), Box::new(sc.clone())),
    );
    (player, bg, sc)
}

#[test]
fn two_scene_document_ends_once_at_three_seconds() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut player = silent_player(clock.clone());
    let events = player.subscribe();
    player.load_document(fixture("two_scenes.json")).unwrap();
    assert_eq!(player.duration_ms(), 3000.0);

    let mut pacer = FnPacer(|| clock.advance_ms(16.0));
    let end = player.run(&mut pacer);
    assert_eq!(end, PlaybackState::Ended);
    assert_eq!(player.current_time_ms(), 3000.0);
    assert!(player.paused());

    let events: Vec<PlayerEvent> = events.try_iter().collect();
    assert_eq!(
        events.first(),
        Some(&PlayerEvent::LoadedMetadata {
            duration_ms: 3000.0
        })
    );
    let ended: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == PlayerEvent::Ended)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(ended.len(), 1);
    assert_eq!(
        events[ended[0] - 1],
        PlayerEvent::TimeUpdate {
            current_ms: 3000.0
        }
    );
    assert!(events.contains(&PlayerEvent::SceneChange { index: 1 }));
    assert_eq!(events.iter().filter(|e| **e == PlayerEvent::Play).count(), 1);
}

#[test]
fn variable_tick_pacing_lands_on_the_same_scene() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut player = silent_player(clock.clone());
    player.load_document(fixture("two_scenes.json")).unwrap();
    player.play();
    for step in [3.0, 250.0, 1.0, 700.0, 46.0] {
        clock.advance_ms(step);
        assert_eq!(player.tick(), TickOutcome::Continue);
    }
    assert_eq!(player.current_time_ms(), 1000.0);
    assert_eq!(player.scene_index(), 1);
}

#[test]
fn seek_reads_back_clamped_time() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut player = silent_player(clock);
    player.load_document(fixture("two_scenes.json")).unwrap();
    for (t, want) in [(-10.0, 0.0), (999.9, 999.9), (1000.0, 1000.0), (4000.0, 3000.0)] {
        player.set_current_time_ms(t);
        assert_eq!(player.current_time_ms(), want);
    }
    assert_eq!(player.scene_index(), 1);
}

#[test]
fn seeking_twice_matches_seeking_once() {
    let clock = Arc::new(ManualClock::new(0.0));
    let (mut player, bg, sc) = audible_player(clock);
    player
        .load_document(fixture("suppressed_background.json"))
        .unwrap();

    for t in [500.0, 2300.0, 4100.0, 6499.0] {
        player.seek_to(t);
        let once = (
            player.scene_index(),
            bg.position_ms(),
            sc.position_ms(),
            sc.source(),
            player.audio().state(),
        );
        player.seek_to(t);
        let twice = (
            player.scene_index(),
            bg.position_ms(),
            sc.position_ms(),
            sc.source(),
            player.audio().state(),
        );
        assert_eq!(once, twice, "t={t}");
    }
}

#[test]
fn suppressing_scene_pauses_and_restores_background() {
    let clock = Arc::new(ManualClock::new(0.0));
    let (mut player, bg, sc) = audible_player(clock.clone());
    player
        .load_document(fixture("suppressed_background.json"))
        .unwrap();
    player.play();
    assert!(bg.is_playing());

    let advance_to = |target: f64, player: &mut Player| {
        while player.current_time_ms() < target {
            clock.advance_ms(10.0);
            player.tick();
        }
    };

    advance_to(2000.0, &mut player);
    assert_eq!(player.scene_index(), 1);
    assert!(!bg.is_playing());
    assert!(player.audio().state().paused_by_scene);
    assert_eq!(bg.position_ms(), 2000.0);
    assert_eq!(sc.source().as_deref(), Some("voice.wav"));
    assert!(sc.is_playing());

    advance_to(4000.0, &mut player);
    assert_eq!(player.scene_index(), 2);
    assert!(bg.is_playing());
    assert_eq!(bg.position_ms(), 2000.0);
    assert!(!sc.is_playing());

    advance_to(4500.0, &mut player);
    assert_eq!(bg.position_ms(), 2500.0);
}

#[test]
fn pause_stops_both_channels_and_play_resumes() {
    let clock = Arc::new(ManualClock::new(0.0));
    let (mut player, bg, sc) = audible_player(clock.clone());
    player
        .load_document(fixture("suppressed_background.json"))
        .unwrap();
    player.seek_to(2500.0);
    player.play();
    assert!(sc.is_playing());
    assert!(!bg.is_playing());

    clock.advance_ms(100.0);
    player.tick();
    player.pause();
    assert!(!sc.is_playing());
    assert!(!bg.is_playing());
    assert_eq!(sc.position_ms(), 600.0);

    player.play();
    assert!(sc.is_playing());
    assert!(!bg.is_playing());
}

#[test]
fn seek_out_of_ended_goes_to_paused() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut player = silent_player(clock.clone());
    player.load_document(fixture("two_scenes.json")).unwrap();
    player.play();
    clock.advance_ms(10_000.0);
    assert_eq!(player.tick(), TickOutcome::Ended);

    player.seek_to(3000.0);
    assert_eq!(player.state(), PlaybackState::Ended);
    player.seek_to(1200.0);
    assert_eq!(player.state(), PlaybackState::Paused);
}

#[test]
fn volume_and_mute_reach_both_channels() {
    let clock = Arc::new(ManualClock::new(0.0));
    let (mut player, bg, sc) = audible_player(clock);
    player
        .load_document(fixture("suppressed_background.json"))
        .unwrap();
    player.set_volume(0.25);
    player.set_muted(true);
    assert_eq!((bg.volume(), sc.volume()), (0.0, 0.0));
    player.set_muted(false);
    assert_eq!((bg.volume(), sc.volume()), (0.25, 0.25));
    assert_eq!(player.volume(), 0.25);
}
