//! A loopable clip: control handle ([`Clip`]) and realtime engine ([`ClipEngine`]).
//!
//! Both halves share a [`ClipState`] made of atomics. The control half owns the editable
//! events, rebuilds [`Sequence`] snapshots and publishes them; the engine swaps the newest one
//! in at each block boundary and renders it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cadenza_core::{
    publication_channel_with_capacity, AtomicCue, AtomicDouble, AtomicFlag, BlockContext,
    EdgeLatch, Playhead, Publisher, ReleasePool, Subscriber, DEFAULT_PUBLISH_CAPACITY,
    DEFAULT_RETIRE_CAPACITY,
};
use cadenza_midi::{ActiveNotes, MidiBuffer, MidiEvent};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use ringbuf::{traits::*, HeapCons, HeapProd};
use serde::{Deserialize, Serialize};

use crate::builder::SequenceBuilder;
use crate::event::{EventEdit, EventId, SequenceEvent};
use crate::recording::{
    record_channel, RecentNoteOns, RecordedEvent, RecordingMerger, DEFAULT_RECORD_CAPACITY,
    PRE_RECORDING_THRESHOLD,
};
use crate::sequence::Sequence;
use crate::status::{ClipStatus, PlayStatus, RecordStatus};
use crate::{Error, Result};

/// Undo snapshots kept per clip.
pub const UNDO_LEVELS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipOptions {
    pub publish_capacity: usize,
    pub retire_capacity: usize,
    pub record_capacity: usize,
    pub wrap_events_across_loop: bool,
    /// Seed for chance rolls. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            publish_capacity: DEFAULT_PUBLISH_CAPACITY,
            retire_capacity: DEFAULT_RETIRE_CAPACITY,
            record_capacity: DEFAULT_RECORD_CAPACITY,
            wrap_events_across_loop: true,
            seed: None,
        }
    }
}

/// State shared by a [`Clip`] and its [`ClipEngine`].
///
/// Play cues are in global beats, record cues in clip-local beats.
#[derive(Debug, Default)]
pub struct ClipState {
    playhead: Playhead,
    recording: AtomicFlag,
    start_recording_at: AtomicCue,
    stop_recording_at: AtomicCue,
    just_stopped_recording: EdgeLatch,
    length: AtomicDouble,
    quantization: AtomicDouble,
    flush_request: AtomicFlag,
    requested_length: AtomicCue,
    dropped_recordings: AtomicU32,
    record_session: AtomicU32,
}

impl ClipState {
    #[inline]
    pub fn playhead(&self) -> &Playhead {
        &self.playhead
    }

    #[inline]
    pub fn play_now(&self) {
        self.playhead.play_now();
    }

    #[inline]
    pub fn play_at(&self, position: f64) {
        self.playhead.play_at(position);
    }

    /// Stops playback and recording immediately and rewinds the playhead.
    #[inline]
    pub fn stop_now(&self) {
        if self.is_recording() {
            self.stop_recording_now();
        }
        self.playhead.stop_now();
        self.playhead.reset_slice();
    }

    #[inline]
    pub fn stop_at(&self, position: f64) {
        self.playhead.stop_at(position);
    }

    #[inline]
    pub fn clear_play_cue(&self) {
        self.playhead.clear_play_cue();
    }

    #[inline]
    pub fn clear_stop_cue(&self) {
        self.playhead.clear_stop_cue();
    }

    #[inline]
    pub fn start_recording_now(&self) {
        self.record_session.fetch_add(1, Ordering::AcqRel);
        self.start_recording_at.clear();
        self.stop_recording_at.clear();
        self.recording.set(true);
        self.just_stopped_recording.reset();
    }

    #[inline]
    pub fn stop_recording_now(&self) {
        self.stop_recording_at.clear();
        self.recording.set(false);
        self.just_stopped_recording.set();
    }

    #[inline]
    pub fn start_recording_at(&self, position: f64) {
        self.start_recording_at.arm(position);
    }

    #[inline]
    pub fn stop_recording_at(&self, position: f64) {
        self.stop_recording_at.arm(position);
    }

    #[inline]
    pub fn clear_start_recording_cue(&self) {
        self.start_recording_at.clear();
    }

    #[inline]
    pub fn clear_stop_recording_cue(&self) {
        self.stop_recording_at.clear();
    }

    pub fn clear_all_cues(&self) {
        self.clear_play_cue();
        self.clear_stop_cue();
        self.clear_start_recording_cue();
        self.clear_stop_recording_cue();
    }

    pub fn stop_now_and_clear_all_cues(&self) {
        self.clear_all_cues();
        self.stop_now();
    }

    /// Cues a stop at `next_bar` when playing (or cancels a pending stop), cancels a pending
    /// start, or cues a start at `next_bar` when the clip has a length.
    pub fn toggle_play_stop(&self, next_bar: f64) {
        if self.is_playing() {
            if self.is_cued_to_stop() {
                self.clear_stop_cue();
            } else {
                self.stop_at(next_bar);
            }
        } else if self.is_cued_to_play() {
            self.clear_play_cue();
            self.clear_start_recording_cue();
        } else if !self.has_zero_length() {
            self.play_at(next_bar);
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playhead.is_playing()
    }

    #[inline]
    pub fn is_cued_to_play(&self) -> bool {
        self.playhead.is_cued_to_play()
    }

    #[inline]
    pub fn is_cued_to_stop(&self) -> bool {
        self.playhead.is_cued_to_stop()
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording.get()
    }

    #[inline]
    pub fn is_cued_to_start_recording(&self) -> bool {
        self.start_recording_at.is_armed()
    }

    #[inline]
    pub fn is_cued_to_stop_recording(&self) -> bool {
        self.stop_recording_at.is_armed()
    }

    /// True once after each recording stop.
    #[inline]
    pub fn has_just_stopped_recording(&self) -> bool {
        self.just_stopped_recording.take()
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length.get()
    }

    #[inline]
    pub fn has_zero_length(&self) -> bool {
        self.length.get() == 0.0
    }

    #[inline]
    pub fn quantization(&self) -> f64 {
        self.quantization.get()
    }

    /// Local beat where a recording armed now would start.
    pub fn next_record_beat(&self) -> f64 {
        let start = self.playhead.position();
        if start == 0.0 {
            return 0.0;
        }
        let next = start.floor() + 1.0;
        let length = self.length();
        if length > 0.0 {
            next % length
        } else {
            next
        }
    }

    pub fn status(&self) -> ClipStatus {
        let play = if self.is_cued_to_play() {
            PlayStatus::CuedToPlay
        } else if self.is_cued_to_stop() {
            PlayStatus::CuedToStop
        } else if self.is_playing() {
            PlayStatus::Playing
        } else {
            PlayStatus::Stopped
        };
        let record = if self.is_cued_to_start_recording() {
            RecordStatus::CuedToRecord
        } else if self.is_cued_to_stop_recording() {
            RecordStatus::CuedToStopRecording
        } else if self.is_recording() {
            RecordStatus::Recording
        } else {
            RecordStatus::None
        };
        ClipStatus {
            play,
            record,
            length: self.length(),
            quantization: self.quantization(),
        }
    }
}

/// Events, length and quantization of a clip, detached from any engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipContents {
    pub events: Vec<SequenceEvent>,
    pub length: f64,
    pub quantization: f64,
}

/// Outcome of one [`Clip::poll`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Recorded events folded into the sequence.
    pub merged: usize,
    /// A new snapshot reached the publication ring.
    pub published: bool,
    /// Recorded messages lost to a full record ring since the last poll.
    pub dropped_recordings: u32,
}

#[derive(Debug, Clone)]
struct UndoEntry {
    events: Vec<SequenceEvent>,
    length: f64,
}

/// Control-thread half of a clip.
pub struct Clip {
    state: Arc<ClipState>,
    events: Vec<SequenceEvent>,
    length: f64,
    quantization: f64,
    wrap_events_across_loop: bool,
    undo_stack: VecDeque<UndoEntry>,
    publisher: Publisher<Sequence>,
    recorded: HeapCons<RecordedEvent>,
    merger: RecordingMerger,
    dirty: bool,
}

/// Realtime half of a clip.
pub struct ClipEngine {
    state: Arc<ClipState>,
    subscriber: Subscriber<Sequence>,
    recorder: HeapProd<RecordedEvent>,
    sounding: ActiveNotes,
    suppressed: u128,
    rng: SmallRng,
}

impl Clip {
    /// Creates a clip pair. Retired snapshots are reclaimed by `pool`.
    pub fn new(pool: &ReleasePool<Sequence>, options: ClipOptions) -> (Clip, ClipEngine) {
        let (publisher, subscriber) = publication_channel_with_capacity(
            pool,
            options.publish_capacity,
            options.retire_capacity,
        );
        let (recorder, recorded) = record_channel(options.record_capacity);
        let state = Arc::new(ClipState::default());
        let rng = match options.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let mut clip = Clip {
            state: Arc::clone(&state),
            events: Vec::new(),
            length: 0.0,
            quantization: 0.0,
            wrap_events_across_loop: options.wrap_events_across_loop,
            undo_stack: VecDeque::with_capacity(UNDO_LEVELS),
            publisher,
            recorded,
            merger: RecordingMerger::new(),
            dirty: true,
        };
        clip.publish();

        let engine = ClipEngine {
            state,
            subscriber,
            recorder,
            sounding: ActiveNotes::new(),
            suppressed: 0,
            rng,
        };
        (clip, engine)
    }

    #[inline]
    pub fn state(&self) -> &ClipState {
        &self.state
    }

    pub fn status(&self) -> ClipStatus {
        self.state.status()
    }

    pub fn events(&self) -> &[SequenceEvent] {
        &self.events
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn quantization(&self) -> f64 {
        self.quantization
    }

    pub fn wraps_events_across_loop(&self) -> bool {
        self.wrap_events_across_loop
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    // --- transport ---

    pub fn play_now(&self) {
        self.state.play_now();
    }

    pub fn play_at(&self, position: f64) {
        self.state.play_at(position);
    }

    pub fn stop_now(&self) {
        self.state.stop_now();
    }

    pub fn stop_at(&self, position: f64) {
        self.state.stop_at(position);
    }

    pub fn toggle_play_stop(&self, next_bar: f64) {
        self.state.toggle_play_stop(next_bar);
    }

    pub fn start_recording_at(&self, position: f64) {
        self.state.start_recording_at(position);
    }

    pub fn stop_recording_at(&self, position: f64) {
        self.state.stop_recording_at(position);
    }

    /// Arms or disarms recording.
    ///
    /// Arming cues the recording at the next whole local beat and, when stopped, cues playback
    /// at `next_bar`. An empty clip takes `fixed_length` (in beats) when one is given.
    pub fn toggle_record(&mut self, next_bar: f64, fixed_length: Option<f64>) {
        if self.state.is_recording() {
            self.state.stop_recording_now();
            tracing::debug!("recording stopped");
            return;
        }

        let next_beat = self.state.next_record_beat();
        self.push_undo();

        if self.length == 0.0 {
            if let Some(length) = fixed_length.filter(|l| *l > 0.0 && l.is_finite()) {
                self.apply_length(length);
            }
        }

        if self.state.is_cued_to_start_recording() {
            self.state.clear_start_recording_cue();
            if self.state.is_cued_to_play() {
                self.state.clear_play_cue();
            }
        } else {
            self.state.start_recording_at(next_beat);
            if !self.state.is_playing() {
                self.state.play_at(next_bar);
            }
            tracing::debug!(next_beat, next_bar, "recording cued");
        }
    }

    // --- editing ---

    pub fn set_length(&mut self, length: f64) -> Result<()> {
        if !length.is_finite() || length < 0.0 {
            return Err(Error::InvalidLength(length));
        }
        self.apply_length(length);
        Ok(())
    }

    pub fn set_quantization(&mut self, step: f64) -> Result<()> {
        if !step.is_finite() || step < 0.0 {
            return Err(Error::InvalidQuantization(step));
        }
        self.quantization = step;
        self.state.quantization.set(step);
        self.dirty = true;
        Ok(())
    }

    pub fn set_wrap_events_across_loop(&mut self, wrap: bool) {
        if self.wrap_events_across_loop != wrap {
            self.wrap_events_across_loop = wrap;
            self.dirty = true;
        }
    }

    /// Removes every event, zeroes the length and silences sounding notes.
    pub fn clear(&mut self) {
        self.events.clear();
        self.apply_length(0.0);
        self.state.flush_request.set(true);
        self.dirty = true;
    }

    /// Repeats the clip once, doubling its length.
    pub fn double(&mut self) {
        if self.length == 0.0 {
            return;
        }
        self.push_undo();
        let length = self.length;
        let copies: Vec<_> = self
            .events
            .iter()
            .map(|event| {
                let mut copy = event.clone().with_id(EventId::new());
                copy.timestamp += length;
                copy
            })
            .collect();
        self.events.extend(copies);
        self.apply_length(length * 2.0);
    }

    /// Restores the events and length saved by the last undoable action.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop_back() else {
            return false;
        };
        self.events = entry.events;
        self.state.flush_request.set(true);
        self.apply_length(entry.length);
        true
    }

    /// Replaces all events and the length.
    pub fn set_sequence(&mut self, length: f64, events: Vec<SequenceEvent>) -> Result<()> {
        if !length.is_finite() || length < 0.0 {
            return Err(Error::InvalidLength(length));
        }
        for event in &events {
            event.validate()?;
        }
        self.events = events;
        self.state.flush_request.set(true);
        self.apply_length(length);
        Ok(())
    }

    pub fn add_event(&mut self, event: SequenceEvent) -> Result<EventId> {
        event.validate()?;
        let id = event.id;
        self.events.push(event);
        self.dirty = true;
        Ok(id)
    }

    pub fn remove_event(&mut self, id: EventId) -> Result<SequenceEvent> {
        let index = self.index_of(id)?;
        self.dirty = true;
        Ok(self.events.remove(index))
    }

    pub fn edit_event(&mut self, id: EventId, edit: &EventEdit) -> Result<()> {
        let index = self.index_of(id)?;
        self.events[index].apply(edit)?;
        self.dirty = true;
        Ok(())
    }

    pub fn contents(&self) -> ClipContents {
        ClipContents {
            events: self.events.clone(),
            length: self.length,
            quantization: self.quantization,
        }
    }

    /// Replaces this clip's contents with a copy of `contents`. Copied events get fresh ids.
    pub fn load_contents(&mut self, contents: &ClipContents) -> Result<()> {
        let events = contents
            .events
            .iter()
            .map(|event| event.clone().with_id(EventId::new()))
            .collect();
        self.set_quantization(contents.quantization)?;
        self.set_sequence(contents.length, events)
    }

    /// Merges recorded events, applies a length requested by the engine and publishes a new
    /// snapshot when anything changed.
    pub fn poll(&mut self) -> PollReport {
        let mut report = PollReport::default();

        while let Some(recorded) = self.recorded.try_pop() {
            if self.merger.merge(recorded, self.length, &mut self.events) {
                report.merged += 1;
            }
        }
        if report.merged > 0 {
            self.dirty = true;
        }

        if let Some(length) = self.state.requested_length.get() {
            self.state.requested_length.clear();
            if self.length == 0.0 && self.has_events() {
                tracing::debug!(length, "setting length from recording");
                self.apply_length(length);
            }
        }

        report.dropped_recordings = self.state.dropped_recordings.swap(0, Ordering::AcqRel);
        if report.dropped_recordings > 0 {
            tracing::warn!(
                dropped = report.dropped_recordings,
                "record ring full, recorded events lost"
            );
        }
        let overflows = self.publisher.take_retire_overflows();
        if overflows > 0 {
            tracing::warn!(overflows, "retire ring full, snapshots left to the pool");
        }

        if self.dirty {
            report.published = self.publish();
        }
        report
    }

    /// Snapshot the engine would render after the next publish.
    pub fn build_sequence(&self) -> Sequence {
        SequenceBuilder::new(self.length)
            .quantization(self.quantization)
            .wrap_events_across_loop(self.wrap_events_across_loop)
            .build(&self.events)
    }

    fn publish(&mut self) -> bool {
        let sequence = Arc::new(self.build_sequence());
        let events = sequence.len();
        if self.publisher.publish(sequence) {
            self.dirty = false;
            tracing::debug!(events, length = self.length, "sequence published");
            true
        } else {
            false
        }
    }

    fn apply_length(&mut self, length: f64) {
        self.length = length;
        self.state.length.set(length);
        if length == 0.0 {
            self.state.stop_now_and_clear_all_cues();
        }
        self.dirty = true;
    }

    fn push_undo(&mut self) {
        if self.undo_stack.len() == UNDO_LEVELS {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(UndoEntry {
            events: self.events.clone(),
            length: self.length,
        });
    }

    fn index_of(&self, id: EventId) -> Result<usize> {
        self.events
            .iter()
            .position(|event| event.id == id)
            .ok_or(Error::EventNotFound(id))
    }
}

impl ClipEngine {
    #[inline]
    pub fn state(&self) -> &ClipState {
        &self.state
    }

    /// The snapshot currently rendered.
    #[inline]
    pub fn active_sequence(&self) -> Option<&Arc<Sequence>> {
        self.subscriber.current()
    }

    #[inline]
    pub fn sounding_notes(&self) -> &ActiveNotes {
        &self.sounding
    }

    /// Swaps in the newest published sequence. Call at the block boundary.
    #[inline]
    pub fn prepare_slice(&mut self) {
        self.subscriber.try_pop_newest();
    }

    /// Emits note-offs for every sounding note at the last frame of the block.
    ///
    /// Used when the global transport stops and clips no longer get a `process_slice` call.
    pub fn render_remaining_note_offs(&mut self, ctx: &BlockContext, out: &mut MidiBuffer) {
        let last_frame = ctx.block_size.saturating_sub(1);
        flush_notes(&mut self.sounding, &mut self.suppressed, ctx, last_frame, out);
    }

    /// Renders one block: emits due events into `out` and records `incoming`.
    ///
    /// `recent_note_ons` holds the track's latest note-ons in global beats, used to catch notes
    /// played just before a recording starts.
    pub fn process_slice(
        &mut self,
        ctx: &BlockContext,
        incoming: &MidiBuffer,
        recent_note_ons: &RecentNoteOns,
        out: &mut MidiBuffer,
    ) {
        let last_frame = ctx.block_size.saturating_sub(1);

        // The replacement snapshot arrives through the channel; only sounding notes go here.
        if self.state.flush_request.swap(false) {
            flush_notes(&mut self.sounding, &mut self.suppressed, ctx, last_frame, out);
        }

        let state = &*self.state;
        let playhead = state.playhead();
        let parent = ctx.parent;
        let sequence = self.subscriber.current();
        let length = sequence.map_or(0.0, |s| s.length());

        let play_cue = playhead.play_cue().filter(|&cue| parent.contains(cue));
        let stop_cue = playhead.stop_cue().filter(|&cue| parent.contains(cue));

        if let Some(cue) = play_cue {
            playhead.play_now_with_offset(cue - parent.start);
        }

        if playhead.is_playing() {
            playhead.capture_slice(parent.len());
            let slice = playhead.current_slice();
            let looping = length > 0.0 && slice.contains(length);
            let wrap = |beat: f64| {
                if looping && beat < slice.start {
                    beat + length
                } else {
                    beat
                }
            };

            if let Some(sequence) = sequence {
                for (message, annotation) in sequence.iter() {
                    let beat = wrap(message.beat);
                    if !slice.contains(beat) {
                        continue;
                    }
                    let in_slice = beat - slice.start;
                    let global = parent.start + in_slice;
                    if stop_cue.is_some_and(|cue| global >= cue)
                        || play_cue.is_some_and(|cue| global < cue)
                    {
                        continue;
                    }

                    let event = message.event;
                    if let Some(note) = event.note() {
                        let bit = 1u128 << (note & 0x7F);
                        if event.is_note_on() {
                            let chance = annotation.map_or(1.0, |a| a.chance);
                            if chance < 1.0 && self.rng.gen::<f32>() >= chance {
                                self.suppressed |= bit;
                                continue;
                            }
                            self.suppressed &= !bit;
                        } else if event.is_note_off() && self.suppressed & bit != 0 {
                            self.suppressed &= !bit;
                            continue;
                        }
                    }

                    let Some(channel) = ctx.out_channel else {
                        continue;
                    };
                    let event = event.on_channel(channel).at(ctx.sample_offset(in_slice));
                    if out.push(event) {
                        self.sounding.track(&event);
                    }
                }
            }

            let start_recording = state.start_recording_at.get().map(wrap);
            let start_recording = start_recording.filter(|&beat| slice.contains(beat));
            let stop_recording = state.stop_recording_at.get().map(wrap);
            let stop_recording = stop_recording.filter(|&beat| slice.contains(beat));

            if let Some(start) = start_recording {
                state.start_recording_now();
                let start_global = parent.start + (start - slice.start);
                for recent in recent_note_ons.iter() {
                    let early = start_global - recent.beat;
                    if early > 0.0 && early < PRE_RECORDING_THRESHOLD {
                        push_recorded(&mut self.recorder, state, start, recent.event);
                    }
                }
            }

            if state.is_recording() {
                for event in incoming {
                    let beat = ctx.beat_at_sample(slice, event.frame_offset);
                    if !slice.contains(beat)
                        || (event.is_controller() && !ctx.record_automation)
                        || start_recording.is_some_and(|start| beat < start)
                        || stop_recording.is_some_and(|stop| beat > stop)
                    {
                        continue;
                    }
                    push_recorded(&mut self.recorder, state, beat, *event);
                }
            }

            if stop_recording.is_some() {
                state.stop_recording_now();
            }

            if length > 0.0 && (slice.contains(length) || length < slice.start) {
                playhead.reset_slice_with_offset(length - slice.end);
            }
            playhead.release_slice();
        }

        if stop_cue.is_some() {
            state.stop_now();
        }

        if playhead.has_just_stopped() {
            flush_notes(&mut self.sounding, &mut self.suppressed, ctx, last_frame, out);
        }

        if state.has_just_stopped_recording() && length == 0.0 {
            let end = playhead.current_slice().end;
            let new_length = end.ceil();
            if new_length > 0.0 {
                state.requested_length.arm(new_length);
                if new_length > end {
                    playhead.reset_slice_with_offset(new_length - end);
                }
            }
        }
    }
}

fn flush_notes(
    sounding: &mut ActiveNotes,
    suppressed: &mut u128,
    ctx: &BlockContext,
    frame: usize,
    out: &mut MidiBuffer,
) {
    *suppressed = 0;
    match ctx.out_channel {
        Some(channel) => {
            sounding.render_note_offs(channel as u8, frame, out);
        }
        None => sounding.clear(),
    }
}

#[inline]
fn push_recorded(
    recorder: &mut HeapProd<RecordedEvent>,
    state: &ClipState,
    beat: f64,
    event: MidiEvent,
) {
    let recorded = RecordedEvent {
        beat,
        event,
        session: state.record_session.load(Ordering::Acquire),
    };
    if recorder.try_push(recorded).is_err() {
        state.dropped_recordings.fetch_add(1, Ordering::Relaxed);
    }
}
