//! Shared helpers for sequencer integration tests.

#![allow(dead_code)]

use cadenza::prelude::*;
use cadenza::ClockEvent;

/// Powers of two keep beat arithmetic exact: 4096 samples per beat at 120 BPM.
pub const TEST_SAMPLE_RATE: f64 = 8192.0;
pub const TEST_BLOCK_SIZE: usize = 2048;
pub const TEST_BPM: f64 = 120.0;

/// Beats covered by one block.
pub const BEATS_PER_BLOCK: f64 = 0.5;
pub const SAMPLES_PER_BEAT: usize = 4096;

/// Blocks in one 4/4 bar.
pub const BLOCKS_PER_BAR: usize = 8;

pub const BEAT_EPSILON: f64 = 1e-9;

/// Deterministic sequencer without the background sweeper.
pub fn test_sequencer(tracks: usize, scenes: usize) -> (Sequencer, SequencerEngine) {
    init_tracing();
    Sequencer::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_size(TEST_BLOCK_SIZE)
        .bpm(TEST_BPM)
        .tracks(tracks)
        .scenes(scenes)
        .seed(7)
        .sweep_interval(None)
        .build()
        .expect("Failed to build test sequencer")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Publishes a one-note clip of `length` beats.
pub fn load_note(
    sequencer: &mut Sequencer,
    address: ClipAddress,
    length: f64,
    note: u8,
    timestamp: f64,
    duration: f64,
) {
    sequencer
        .clip_mut(address)
        .expect("clip exists")
        .set_sequence(length, vec![SequenceEvent::note(timestamp, note, 1.0, duration)])
        .expect("valid sequence");
    sequencer.poll();
}

pub fn no_input() -> MidiBuffer {
    MidiBuffer::with_capacity(0)
}

/// Runs `blocks` blocks without input. `output` holds the last one.
pub fn run_blocks(engine: &mut SequencerEngine, output: &mut BlockOutput, blocks: usize) {
    let input = no_input();
    for _ in 0..blocks {
        engine.process_block(&input, output);
    }
}

/// `(frame, note)` of every note-on in `buffer`.
pub fn note_ons(buffer: &MidiBuffer) -> Vec<(usize, u8)> {
    buffer
        .iter()
        .filter(|event| event.is_note_on())
        .filter_map(|event| event.note().map(|note| (event.frame_offset, note)))
        .collect()
}

/// `(frame, note)` of every note-off in `buffer`.
pub fn note_offs(buffer: &MidiBuffer) -> Vec<(usize, u8)> {
    buffer
        .iter()
        .filter(|event| event.is_note_off())
        .filter_map(|event| event.note().map(|note| (event.frame_offset, note)))
        .collect()
}

pub fn ticks(output: &BlockOutput) -> usize {
    output.clock.iter().filter(|event| event.is_tick()).count()
}

pub fn clock_messages(output: &BlockOutput) -> Vec<ClockEvent> {
    output
        .clock
        .iter()
        .filter(|event| !event.is_tick())
        .copied()
        .collect()
}

pub fn status(sequencer: &Sequencer, track: usize, clip: usize) -> String {
    sequencer
        .clip_status(ClipAddress::new(track, clip))
        .expect("clip exists")
        .to_string()
}
