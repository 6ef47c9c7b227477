//! Transport integration tests
//!
//! Start/stop, MIDI clock, tempo changes and quantized clip launches.

use approx::assert_relative_eq;
use cadenza::core::Error as CoreError;
use cadenza::midi::ClockMessage;
use cadenza::prelude::*;
use cadenza::Error;

use crate::helpers::*;

#[test]
fn test_transport_start_sends_clock_start_and_ticks() {
    let (sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();

    sequencer.toggle_play_stop();
    assert!(!sequencer.is_playing(), "starts at the next block");

    run_blocks(&mut engine, &mut output, 1);
    assert!(sequencer.is_playing());
    assert_eq!(output.clock.as_slice()[0].msg, ClockMessage::Start);
    assert_eq!(output.clock.as_slice()[0].frame_offset, 0);
    // 24 pulses per beat over half a beat
    assert_eq!(ticks(&output), 12);
    assert_relative_eq!(
        sequencer.context().position(),
        BEATS_PER_BLOCK,
        epsilon = BEAT_EPSILON
    );
}

#[test]
fn test_clock_can_be_disabled() {
    let (sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();
    sequencer.set_send_midi_clock(false);

    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 2);
    assert!(output.clock.is_empty());
}

#[test]
fn test_transport_stop_flushes_notes_and_rewinds() {
    let (mut sequencer, mut engine) = test_sequencer(1, 2);
    let mut output = engine.new_output();
    let address = ClipAddress::new(0, 0);
    load_note(&mut sequencer, address, 4.0, 60, 0.0, 2.0);

    sequencer.play_clip(address).unwrap();
    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(note_ons(&output.tracks[0]), vec![(0, 60)]);
    assert_eq!(output.tracks[0].as_slice()[0].channel, Channel::Ch1);

    run_blocks(&mut engine, &mut output, 1);
    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);

    assert_eq!(
        note_offs(&output.tracks[0]),
        vec![(TEST_BLOCK_SIZE - 1, 60)]
    );
    assert_eq!(clock_messages(&output)[0].msg, ClockMessage::Stop);
    assert_eq!(ticks(&output), 0);
    assert!(!sequencer.is_playing());
    assert_eq!(sequencer.context().position(), 0.0);
    // Playing clips are re-cued from the top
    assert_eq!(status(&sequencer, 0, 0), "cne|4.000|0");

    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(note_ons(&output.tracks[0]), vec![(0, 60)]);
}

#[test]
fn test_play_clip_waits_for_next_bar() {
    let (mut sequencer, mut engine) = test_sequencer(1, 2);
    let mut output = engine.new_output();
    let first = ClipAddress::new(0, 0);
    let second = ClipAddress::new(0, 1);
    load_note(&mut sequencer, first, 4.0, 60, 0.0, 1.0);
    load_note(&mut sequencer, second, 4.0, 67, 0.0, 1.0);

    sequencer.play_clip(first).unwrap();
    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 4);
    assert_eq!(sequencer.next_bar(), 4.0);

    sequencer.play_clip(second).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "Cne|4.000|0");
    assert_eq!(status(&sequencer, 0, 1), "cne|4.000|0");

    // Up to the bar line nothing changes
    for _ in 0..4 {
        run_blocks(&mut engine, &mut output, 1);
        assert!(note_ons(&output.tracks[0]).is_empty());
    }

    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(note_ons(&output.tracks[0]), vec![(0, 67)]);
    assert_eq!(status(&sequencer, 0, 0), "sne|4.000|0");
    assert_eq!(status(&sequencer, 0, 1), "pne|4.000|0");
}

#[test]
fn test_tempo_change_applies_at_block_boundary() {
    let (sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();
    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);

    sequencer.set_bpm(60.0).unwrap();
    assert_eq!(sequencer.context().bpm(), TEST_BPM);

    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(sequencer.context().bpm(), 60.0);
    assert_relative_eq!(
        sequencer.context().position(),
        BEATS_PER_BLOCK * 1.5,
        epsilon = BEAT_EPSILON
    );

    assert!(matches!(
        sequencer.set_bpm(0.0),
        Err(Error::Core(CoreError::InvalidTempo(_)))
    ));
}

#[test]
fn test_metronome_accents_downbeat() {
    let (sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();
    sequencer.toggle_play_stop();

    let mut clicks = Vec::new();
    for _ in 0..BLOCKS_PER_BAR + 1 {
        run_blocks(&mut engine, &mut output, 1);
        clicks.extend(note_ons(&output.metronome).into_iter().map(|(_, note)| note));
    }
    assert_eq!(clicks, vec![80, 67, 67, 67, 80]);

    sequencer.set_metronome(false);
    run_blocks(&mut engine, &mut output, 2);
    assert!(note_ons(&output.metronome).is_empty());
}

#[test]
fn test_bar_counter_follows_transport() {
    let (sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();
    sequencer.toggle_play_stop();

    run_blocks(&mut engine, &mut output, BLOCKS_PER_BAR * 2);
    assert_eq!(sequencer.context().bar_count(), 2);
    assert_eq!(sequencer.next_bar(), 12.0);

    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(sequencer.context().bar_count(), 0);
    assert_eq!(sequencer.next_bar(), 0.0);
}

proptest::proptest! {
    #[test]
    fn test_position_advances_one_slice_per_block(bpm in 30.0f64..300.0, blocks in 1usize..32) {
        let (sequencer, mut engine) = test_sequencer(1, 1);
        let mut output = engine.new_output();
        sequencer.set_bpm(bpm).unwrap();
        sequencer.toggle_play_stop();
        run_blocks(&mut engine, &mut output, blocks);

        let slice = TEST_BLOCK_SIZE as f64 * bpm / (60.0 * TEST_SAMPLE_RATE);
        let expected = slice * blocks as f64;
        proptest::prop_assert!((sequencer.context().position() - expected).abs() < 1e-6);
    }
}
