//! Tracks: a column of clip slots sharing one output channel.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use cadenza_clip::{Clip, ClipEngine, ClipOptions, ClipState, RecentNoteOns, Sequence};
use cadenza_core::{AtomicFlag, BlockContext, ReleasePool};
use cadenza_midi::{Channel, MidiBuffer};

use crate::Result;

const NO_CHANNEL: u8 = u8::MAX;

/// How [`Track::stop_all_except`] treats the other clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopOptions {
    /// Stop immediately instead of at the next bar.
    pub now: bool,
    /// Drop play and record cues of clips that have not started yet.
    pub de_cue: bool,
    /// Cue stopped non-empty clips to play again from global beat 0.
    pub re_cue: bool,
}

/// Settings shared by a [`Track`] and its [`TrackEngine`].
#[derive(Debug)]
pub struct TrackState {
    output_channel: AtomicU8,
    input_monitoring: AtomicFlag,
}

impl TrackState {
    fn new(channel: Option<Channel>) -> Self {
        Self {
            output_channel: AtomicU8::new(channel.map_or(NO_CHANNEL, |c| c as u8)),
            input_monitoring: AtomicFlag::new(false),
        }
    }

    /// `None` when no output is assigned; clips then render nothing.
    #[inline]
    pub fn output_channel(&self) -> Option<Channel> {
        match self.output_channel.load(Ordering::Acquire) {
            NO_CHANNEL => None,
            channel => Some(Channel::from_u8(channel)),
        }
    }

    #[inline]
    pub fn set_output_channel(&self, channel: Option<Channel>) {
        self.output_channel
            .store(channel.map_or(NO_CHANNEL, |c| c as u8), Ordering::Release);
    }

    #[inline]
    pub fn input_monitoring(&self) -> bool {
        self.input_monitoring.get()
    }

    #[inline]
    pub fn set_input_monitoring(&self, enabled: bool) {
        self.input_monitoring.set(enabled);
    }
}

/// Control-thread half of a track.
pub struct Track {
    state: Arc<TrackState>,
    clips: Vec<Clip>,
}

/// Realtime half of a track.
pub struct TrackEngine {
    state: Arc<TrackState>,
    clips: Vec<ClipEngine>,
}

impl Track {
    /// Creates a track with `scenes` empty clip slots.
    pub fn new(
        scenes: usize,
        channel: Option<Channel>,
        pool: &ReleasePool<Sequence>,
        options: ClipOptions,
    ) -> (Track, TrackEngine) {
        let state = Arc::new(TrackState::new(channel));
        let (clips, engines) = (0..scenes)
            .map(|slot| {
                let options = ClipOptions {
                    seed: options.seed.map(|seed| seed.wrapping_add(slot as u64)),
                    ..options
                };
                Clip::new(pool, options)
            })
            .unzip();

        (
            Track {
                state: Arc::clone(&state),
                clips,
            },
            TrackEngine {
                state,
                clips: engines,
            },
        )
    }

    #[inline]
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn output_channel(&self) -> Option<Channel> {
        self.state.output_channel()
    }

    pub fn set_output_channel(&self, channel: Option<Channel>) {
        self.state.set_output_channel(channel);
    }

    pub fn input_monitoring(&self) -> bool {
        self.state.input_monitoring()
    }

    pub fn set_input_monitoring(&self, enabled: bool) {
        self.state.set_input_monitoring(enabled);
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clips_mut(&mut self) -> &mut [Clip] {
        &mut self.clips
    }

    pub fn clip(&self, slot: usize) -> Option<&Clip> {
        self.clips.get(slot)
    }

    pub fn clip_mut(&mut self, slot: usize) -> Option<&mut Clip> {
        self.clips.get_mut(slot)
    }

    #[inline]
    pub fn num_clips(&self) -> usize {
        self.clips.len()
    }

    pub fn has_clips_cued_to_record(&self) -> bool {
        self.clips
            .iter()
            .any(|clip| clip.state().is_cued_to_start_recording())
    }

    pub fn playing_clips(&self) -> Vec<usize> {
        self.clips
            .iter()
            .enumerate()
            .filter(|(_, clip)| clip.state().is_playing())
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Stops every playing clip except `except`; when not `now`, they stop at `next_bar`.
    pub fn stop_all_except(&self, except: Option<usize>, options: StopOptions, next_bar: f64) {
        stop_clips_except(
            self.clips.iter().map(Clip::state),
            except,
            options,
            next_bar,
        );
    }

    /// Copies the clip at `slot` into `slot + 1`, shifting the following clips down by one.
    ///
    /// The contents of the last clip are lost. Duplicating the last slot does nothing.
    pub fn duplicate_clip_at(&mut self, slot: usize) -> Result<bool> {
        if slot + 1 >= self.clips.len() {
            return Ok(false);
        }
        let mut carried = self.clips[slot].contents();
        for clip in &mut self.clips[slot + 1..] {
            let next = clip.contents();
            clip.load_contents(&carried)?;
            carried = next;
        }
        Ok(true)
    }
}

impl TrackEngine {
    #[inline]
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn clips(&self) -> &[ClipEngine] {
        &self.clips
    }

    /// Echoes `input` to the track output when monitoring is on.
    pub fn monitor_input(&self, input: &MidiBuffer, out: &mut MidiBuffer) {
        if !self.state.input_monitoring() {
            return;
        }
        let Some(channel) = self.state.output_channel() else {
            return;
        };
        for event in input {
            out.push(event.on_channel(channel));
        }
    }

    /// Flushes sounding notes and stops all clips for a transport stop.
    pub fn stop_for_transport(&mut self, block: &BlockContext, out: &mut MidiBuffer) {
        let ctx = self.context(block);
        for clip in &mut self.clips {
            clip.render_remaining_note_offs(&ctx, out);
        }
        stop_clips_except(
            self.clips.iter().map(ClipEngine::state),
            None,
            StopOptions {
                now: true,
                de_cue: true,
                re_cue: true,
            },
            0.0,
        );
    }

    /// Rewinds every clip playhead to `[0, 0)` for a transport start.
    pub fn reset_playheads(&self) {
        for clip in &self.clips {
            clip.state().playhead().reset_slice();
        }
    }

    /// Swaps in newly published sequences. Call at every block boundary.
    pub fn prepare_clips(&mut self) {
        for clip in &mut self.clips {
            clip.prepare_slice();
        }
    }

    /// Renders every clip for a playing block.
    pub fn process_clips(
        &mut self,
        block: &BlockContext,
        input: &MidiBuffer,
        recent_note_ons: &RecentNoteOns,
        out: &mut MidiBuffer,
    ) {
        let ctx = self.context(block);
        for clip in &mut self.clips {
            clip.process_slice(&ctx, input, recent_note_ons, out);
        }
    }

    #[inline]
    fn context(&self, block: &BlockContext) -> BlockContext {
        BlockContext {
            out_channel: self.state.output_channel(),
            ..*block
        }
    }
}

fn stop_clips_except<'a>(
    clips: impl Iterator<Item = &'a ClipState>,
    except: Option<usize>,
    options: StopOptions,
    next_bar: f64,
) {
    for (slot, clip) in clips.enumerate() {
        if except == Some(slot) {
            continue;
        }
        let was_playing = clip.is_playing();
        if was_playing {
            if options.now {
                clip.stop_now();
            } else if !clip.is_cued_to_stop() {
                clip.toggle_play_stop(next_bar);
            }
        }
        if options.de_cue {
            clip.clear_play_cue();
            clip.clear_start_recording_cue();
        }
        if options.re_cue && was_playing && !clip.has_zero_length() {
            clip.play_at(0.0);
        }
    }
}
