//! Recording integration tests
//!
//! Count-in, recording into empty clips, pre-recorded notes and fixed-length recording.

use approx::assert_relative_eq;
use cadenza::core::Error as CoreError;
use cadenza::prelude::*;
use cadenza::{ClockEvent, Error, EventKind};

use crate::helpers::*;

fn note_timestamps(sequencer: &Sequencer, address: ClipAddress) -> Vec<(u8, f64, f64)> {
    sequencer
        .clip(address)
        .unwrap()
        .events()
        .iter()
        .filter_map(|event| match event.kind {
            EventKind::Note { note, duration, .. } => Some((note, event.timestamp, duration)),
            EventKind::Midi { .. } => None,
        })
        .collect()
}

#[test]
fn test_count_in_then_record_into_empty_clip() {
    let (mut sequencer, mut engine) = test_sequencer(1, 2);
    let mut output = engine.new_output();
    let address = ClipAddress::new(0, 0);

    sequencer.toggle_record_clip(address).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "cwE|0.000|0");

    sequencer.toggle_play_stop();
    assert!(sequencer.is_counting_in());
    assert!(matches!(
        sequencer.set_meter(3),
        Err(Error::Core(CoreError::MeterLocked))
    ));

    // One bar of clicks, transport still stopped
    let mut clicks = Vec::new();
    for block in 0..BLOCKS_PER_BAR {
        run_blocks(&mut engine, &mut output, 1);
        assert!(!sequencer.is_playing());
        assert!(output.tracks[0].is_empty());
        assert!(output.clock.is_empty());
        clicks.extend(
            note_ons(&output.metronome)
                .into_iter()
                .map(|(frame, note)| (block, frame, note)),
        );
    }
    assert_eq!(clicks, vec![(0, 0, 80), (2, 0, 67), (4, 0, 67), (6, 0, 67)]);

    // The bar line: transport starts and recording begins on beat 0
    let mut input = MidiBuffer::with_capacity(8);
    input.push(MidiEvent::note_on(1024, 0, 64, 100));
    input.push(MidiEvent::note_off(1536, 0, 64, 0));
    engine.process_block(&input, &mut output);

    assert!(sequencer.is_playing());
    assert!(!sequencer.is_counting_in());
    assert_eq!(note_ons(&output.metronome), vec![(0, 80)]);
    assert_eq!(clock_messages(&output)[0], ClockEvent::start(0));
    assert_eq!(status(&sequencer, 0, 0), "prE|0.000|0");

    run_blocks(&mut engine, &mut output, 7);
    assert_relative_eq!(sequencer.context().position(), 4.0, epsilon = BEAT_EPSILON);

    sequencer.toggle_record_clip(address).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "pnE|0.000|0");

    // Stopping inside [4, 4.5) rounds the new length up to 5 beats
    run_blocks(&mut engine, &mut output, 1);
    let report = sequencer.poll();
    assert_eq!(report.merged, 1);
    assert!(report.published);
    assert_eq!(status(&sequencer, 0, 0), "pne|5.000|0");
    assert_eq!(note_timestamps(&sequencer, address), vec![(64, 0.25, 0.125)]);

    // Loops back to its start at global beat 5
    run_blocks(&mut engine, &mut output, 1);
    assert!(note_ons(&output.tracks[0]).is_empty());
    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(note_ons(&output.tracks[0]), vec![(1024, 64)]);
    assert_eq!(note_offs(&output.tracks[0]), vec![(1536, 64)]);
}

#[test]
fn test_toggle_during_count_in_cancels_it() {
    let (mut sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();
    sequencer.toggle_record_clip(ClipAddress::new(0, 0)).unwrap();

    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 3);
    sequencer.toggle_play_stop();
    assert!(!sequencer.is_counting_in());

    run_blocks(&mut engine, &mut output, BLOCKS_PER_BAR);
    assert!(!sequencer.is_playing());
    assert!(note_ons(&output.metronome).is_empty());
    sequencer.set_meter(3).unwrap();
}

#[test]
fn test_note_played_just_before_record_start_is_kept() {
    let (mut sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();
    let address = ClipAddress::new(0, 0);
    sequencer.clip_mut(address).unwrap().set_length(4.0).unwrap();
    sequencer.poll();

    sequencer.play_clip(address).unwrap();
    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 2);

    // Armed at local beat 1.0: recording starts on beat 2
    sequencer.toggle_record_clip(address).unwrap();
    assert_eq!(sequencer.clip(address).unwrap().state().next_record_beat(), 2.0);
    run_blocks(&mut engine, &mut output, 1);

    let mut input = MidiBuffer::with_capacity(8);
    input.push(MidiEvent::note_on(1843, 0, 62, 90));
    engine.process_block(&input, &mut output);
    assert!(!sequencer.clip(address).unwrap().state().is_recording());

    input.clear();
    input.push(MidiEvent::note_off(512, 0, 62, 0));
    engine.process_block(&input, &mut output);
    assert_eq!(status(&sequencer, 0, 0), "pre|4.000|0");

    sequencer.poll();
    assert_eq!(note_timestamps(&sequencer, address), vec![(62, 2.0, 0.125)]);
}

#[test]
fn test_fixed_length_recording_skips_automation_when_disabled() {
    init_tracing();
    let (mut sequencer, mut engine) = Sequencer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_size(TEST_BLOCK_SIZE)
        .tracks(1)
        .scenes(1)
        .fixed_length_bars(1)
        .record_automation(false)
        .sweep_interval(None)
        .build()
        .unwrap();
    let mut output = engine.new_output();
    let address = ClipAddress::new(0, 0);

    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);

    sequencer.toggle_record_clip(address).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "cwe|4.000|0");
    sequencer.poll();
    run_blocks(&mut engine, &mut output, 7);

    let mut input = MidiBuffer::with_capacity(8);
    input.push(MidiEvent::control_change(0, 0, 1, 64));
    input.push(MidiEvent::note_on(0, 0, 60, 100));
    input.push(MidiEvent::note_off(1024, 0, 60, 0));
    engine.process_block(&input, &mut output);
    assert_eq!(status(&sequencer, 0, 0), "pre|4.000|0");

    let report = sequencer.poll();
    assert_eq!(report.merged, 1);
    let clip = sequencer.clip(address).unwrap();
    assert_eq!(clip.events().len(), 1);
    assert!(clip.events()[0].is_note());
    assert_eq!(clip.length(), 4.0);
}

#[test]
fn test_fixed_velocity_and_input_monitoring() {
    let (sequencer, mut engine) = test_sequencer(2, 1);
    let mut output = engine.new_output();
    sequencer.set_fixed_velocity(Some(100)).unwrap();
    sequencer.set_input_monitoring(1, true).unwrap();

    let mut input = MidiBuffer::with_capacity(8);
    input.push(MidiEvent::note_on(10, 4, 60, 20));
    input.push(MidiEvent::control_change(20, 4, 74, 20));
    engine.process_block(&input, &mut output);

    assert!(output.tracks[0].is_empty());
    let echoed = output.tracks[1].as_slice();
    assert_eq!(echoed.len(), 2);
    assert_eq!(echoed[0].channel, Channel::Ch2);
    assert_eq!(echoed[0].velocity(), Some(100));
    assert_eq!(echoed[1].controller(), Some((74, 20)));

    assert!(matches!(
        sequencer.set_fixed_velocity(Some(0)),
        Err(Error::InvalidConfig(_))
    ));
}
