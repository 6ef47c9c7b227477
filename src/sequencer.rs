//! The sequencer: tracks, scenes and the global transport.
//!
//! [`Sequencer`] lives on the control thread and owns every editable clip. [`SequencerEngine`]
//! lives on the audio thread and renders one block per [`SequencerEngine::process_block`] call.
//! They share the [`MusicalContext`], a handful of atomic settings and, per clip, the clip's
//! own lock-free state.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use cadenza_clip::{Clip, ClipStatus, PollReport, RecentNoteOns, Sequence};
use cadenza_core::{
    AtomicFlag, BlockContext, Metronome, MidiClock, MusicalContext, ReleasePool, Slice,
    SweeperGuard,
};
use cadenza_midi::{Channel, ChannelVoiceMsg, ClockBuffer, MidiBuffer, MidiEvent};

use crate::builder::SequencerBuilder;
use crate::config::validate_velocity;
use crate::track::{StopOptions, Track, TrackEngine};
use crate::{Error, Result};

/// Position of a clip in the track/scene grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipAddress {
    pub track: usize,
    pub clip: usize,
}

impl ClipAddress {
    pub fn new(track: usize, clip: usize) -> Self {
        Self { track, clip }
    }
}

/// Invoked from [`Sequencer::poll`] with the new status of every clip whose status changed.
pub type StatusHook = Box<dyn FnMut(ClipAddress, ClipStatus) + Send>;

/// Settings written by the control thread and read by the audio thread.
#[derive(Debug)]
pub(crate) struct Settings {
    fixed_length_bars: AtomicU32,
    /// 0 disables.
    fixed_velocity: AtomicU8,
    record_automation: AtomicFlag,
    send_midi_clock: AtomicFlag,
    toggle_playing: AtomicFlag,
}

impl Settings {
    pub(crate) fn new(
        fixed_length_bars: u32,
        fixed_velocity: Option<u8>,
        record_automation: bool,
        send_midi_clock: bool,
    ) -> Self {
        Self {
            fixed_length_bars: AtomicU32::new(fixed_length_bars),
            fixed_velocity: AtomicU8::new(fixed_velocity.unwrap_or(0)),
            record_automation: AtomicFlag::new(record_automation),
            send_midi_clock: AtomicFlag::new(send_midi_clock),
            toggle_playing: AtomicFlag::new(false),
        }
    }

    #[inline]
    fn fixed_velocity(&self) -> Option<u8> {
        match self.fixed_velocity.load(Ordering::Acquire) {
            0 => None,
            velocity => Some(velocity),
        }
    }
}

/// MIDI produced by one block.
#[derive(Debug, Clone)]
pub struct BlockOutput {
    /// One buffer per track, on the track's output channel.
    pub tracks: Vec<MidiBuffer>,
    pub metronome: MidiBuffer,
    pub clock: ClockBuffer,
}

impl BlockOutput {
    pub fn new(tracks: usize, capacity: usize) -> Self {
        Self {
            tracks: (0..tracks).map(|_| MidiBuffer::with_capacity(capacity)).collect(),
            metronome: MidiBuffer::with_capacity(capacity),
            clock: ClockBuffer::with_capacity(capacity),
        }
    }

    pub fn track(&self, track: usize) -> Option<&MidiBuffer> {
        self.tracks.get(track)
    }

    pub fn clear(&mut self) {
        for buffer in &mut self.tracks {
            buffer.clear();
        }
        self.metronome.clear();
        self.clock.clear();
    }
}

/// Control-thread half of the sequencer.
pub struct Sequencer {
    context: Arc<MusicalContext>,
    settings: Arc<Settings>,
    tracks: Vec<Track>,
    pool: ReleasePool<Sequence>,
    statuses: Vec<Vec<ClipStatus>>,
    status_hook: Option<StatusHook>,
    _sweeper: Option<SweeperGuard>,
}

/// Realtime half of the sequencer.
pub struct SequencerEngine {
    context: Arc<MusicalContext>,
    settings: Arc<Settings>,
    tracks: Vec<TrackEngine>,
    sample_rate: f64,
    block_size: usize,
    buffer_capacity: usize,
    input: MidiBuffer,
    recent_note_ons: RecentNoteOns,
    metronome: Metronome,
    clock: MidiClock,
}

impl Sequencer {
    pub fn builder() -> SequencerBuilder {
        SequencerBuilder::default()
    }

    pub(crate) fn from_parts(
        context: Arc<MusicalContext>,
        settings: Arc<Settings>,
        tracks: Vec<Track>,
        pool: ReleasePool<Sequence>,
        sweeper: Option<SweeperGuard>,
    ) -> Self {
        let statuses = tracks
            .iter()
            .map(|track| track.clips().iter().map(Clip::status).collect())
            .collect();
        Self {
            context,
            settings,
            tracks,
            pool,
            statuses,
            status_hook: None,
            _sweeper: sweeper,
        }
    }

    #[inline]
    pub fn context(&self) -> &MusicalContext {
        &self.context
    }

    pub fn release_pool(&self) -> &ReleasePool<Sequence> {
        &self.pool
    }

    // --- grid ---

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn num_scenes(&self) -> usize {
        self.tracks.first().map_or(0, Track::num_clips)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track: usize) -> Result<&Track> {
        self.tracks.get(track).ok_or(Error::TrackNotFound(track))
    }

    pub fn track_mut(&mut self, track: usize) -> Result<&mut Track> {
        self.tracks.get_mut(track).ok_or(Error::TrackNotFound(track))
    }

    pub fn clip(&self, address: ClipAddress) -> Result<&Clip> {
        self.track(address.track)?
            .clip(address.clip)
            .ok_or(Error::ClipNotFound {
                track: address.track,
                clip: address.clip,
            })
    }

    pub fn clip_mut(&mut self, address: ClipAddress) -> Result<&mut Clip> {
        self.track_mut(address.track)?
            .clip_mut(address.clip)
            .ok_or(Error::ClipNotFound {
                track: address.track,
                clip: address.clip,
            })
    }

    pub fn clip_status(&self, address: ClipAddress) -> Result<ClipStatus> {
        self.clip(address).map(Clip::status)
    }

    // --- transport ---

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.context.is_playing()
    }

    #[inline]
    pub fn is_counting_in(&self) -> bool {
        self.context.is_counting_in()
    }

    /// Starts or stops the transport at the next block.
    ///
    /// Starting with clips cued to record counts in one bar first. Toggling during a count-in
    /// cancels it.
    pub fn toggle_play_stop(&self) {
        if self.context.is_playing() {
            self.settings.toggle_playing.set(true);
            tracing::debug!("transport stop requested");
        } else if self.context.is_counting_in() {
            self.context.set_counting_in(false);
            self.context.set_count_in_position(0.0);
            tracing::debug!("count-in cancelled");
        } else if self.tracks.iter().any(Track::has_clips_cued_to_record) {
            self.context.set_counting_in(true);
            tracing::debug!("count-in started");
        } else {
            self.settings.toggle_playing.set(true);
            tracing::debug!("transport start requested");
        }
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        Ok(self.context.set_bpm(bpm)?)
    }

    pub fn set_meter(&self, meter: u32) -> Result<()> {
        Ok(self.context.set_meter(meter)?)
    }

    pub fn set_metronome(&self, on: bool) {
        self.context.set_metronome(on);
    }

    /// Returns the new state.
    pub fn toggle_metronome(&self) -> bool {
        self.context.toggle_metronome()
    }

    /// Global beat where quantized clip actions land.
    #[inline]
    pub fn next_bar(&self) -> f64 {
        self.context.next_quantized_bar_position()
    }

    // --- settings ---

    pub fn fixed_length_bars(&self) -> u32 {
        self.settings.fixed_length_bars.load(Ordering::Acquire)
    }

    /// Length in beats given to empty clips armed for recording, if any.
    pub fn fixed_length_beats(&self) -> Option<f64> {
        match self.fixed_length_bars() {
            0 => None,
            bars => Some(bars as f64 * self.context.meter() as f64),
        }
    }

    /// Also resizes empty clips that are armed but have not started playing or recording.
    pub fn set_fixed_length_bars(&mut self, bars: u32) -> Result<()> {
        self.settings.fixed_length_bars.store(bars, Ordering::Release);
        let Some(length) = self.fixed_length_beats() else {
            return Ok(());
        };
        for clip in self.tracks.iter_mut().flat_map(Track::clips_mut) {
            let state = clip.state();
            if !clip.has_events()
                && state.is_cued_to_start_recording()
                && !state.is_recording()
                && !state.is_playing()
            {
                clip.set_length(length)?;
            }
        }
        Ok(())
    }

    pub fn fixed_velocity(&self) -> Option<u8> {
        self.settings.fixed_velocity()
    }

    pub fn set_fixed_velocity(&self, velocity: Option<u8>) -> Result<()> {
        if let Some(velocity) = velocity {
            validate_velocity(velocity)?;
        }
        self.settings
            .fixed_velocity
            .store(velocity.unwrap_or(0), Ordering::Release);
        Ok(())
    }

    pub fn record_automation(&self) -> bool {
        self.settings.record_automation.get()
    }

    pub fn set_record_automation(&self, enabled: bool) {
        self.settings.record_automation.set(enabled);
    }

    /// Returns the new state.
    pub fn toggle_record_automation(&self) -> bool {
        self.settings.record_automation.toggle()
    }

    pub fn send_midi_clock(&self) -> bool {
        self.settings.send_midi_clock.get()
    }

    pub fn set_send_midi_clock(&self, enabled: bool) {
        self.settings.send_midi_clock.set(enabled);
    }

    // --- tracks ---

    pub fn set_input_monitoring(&self, track: usize, enabled: bool) -> Result<()> {
        self.track(track)?.set_input_monitoring(enabled);
        Ok(())
    }

    pub fn set_output_channel(&self, track: usize, channel: Option<Channel>) -> Result<()> {
        self.track(track)?.set_output_channel(channel);
        Ok(())
    }

    // --- clips ---

    /// Cues the clip to play at the next bar, stopping the other clips of its track there.
    pub fn play_clip(&self, address: ClipAddress) -> Result<()> {
        let clip = self.clip(address)?;
        if !clip.state().is_playing() {
            self.stop_track_except(address)?;
            clip.toggle_play_stop(self.next_bar());
        }
        Ok(())
    }

    pub fn stop_clip(&self, address: ClipAddress) -> Result<()> {
        let clip = self.clip(address)?;
        if clip.state().is_playing() {
            clip.toggle_play_stop(self.next_bar());
        }
        Ok(())
    }

    pub fn play_stop_clip(&self, address: ClipAddress) -> Result<()> {
        let clip = self.clip(address)?;
        if !clip.state().is_playing() {
            self.stop_track_except(address)?;
        }
        clip.toggle_play_stop(self.next_bar());
        Ok(())
    }

    pub fn toggle_record_clip(&mut self, address: ClipAddress) -> Result<()> {
        if !self.clip(address)?.state().is_playing() {
            self.stop_track_except(address)?;
        }
        let next_bar = self.next_bar();
        let fixed_length = self.fixed_length_beats();
        self.clip_mut(address)?.toggle_record(next_bar, fixed_length);
        Ok(())
    }

    fn stop_track_except(&self, address: ClipAddress) -> Result<()> {
        self.track(address.track)?.stop_all_except(
            Some(address.clip),
            StopOptions {
                de_cue: true,
                ..Default::default()
            },
            self.next_bar(),
        );
        Ok(())
    }

    // --- scenes ---

    /// Cues every clip of scene `scene` to play and the rest to stop at the next bar.
    pub fn play_scene(&self, scene: usize) -> Result<()> {
        if scene >= self.num_scenes() {
            return Err(Error::SceneNotFound(scene));
        }
        let next_bar = self.next_bar();
        for track in &self.tracks {
            track.stop_all_except(
                Some(scene),
                StopOptions {
                    de_cue: true,
                    ..Default::default()
                },
                next_bar,
            );
            if let Some(clip) = track.clip(scene) {
                let state = clip.state();
                state.clear_stop_cue();
                if !state.is_playing() && !state.is_cued_to_play() {
                    state.toggle_play_stop(next_bar);
                }
            }
        }
        tracing::debug!(scene, next_bar, "scene cued");
        Ok(())
    }

    /// Inserts a copy of scene `scene` below it, shifting later scenes down. The last scene's
    /// contents are lost.
    ///
    /// Returns `false` when `scene` is the last scene.
    pub fn duplicate_scene(&mut self, scene: usize) -> Result<bool> {
        let scenes = self.num_scenes();
        if scene >= scenes {
            return Err(Error::SceneNotFound(scene));
        }
        if scene + 1 == scenes {
            return Ok(false);
        }
        for track in &mut self.tracks {
            track.duplicate_clip_at(scene)?;
        }
        tracing::debug!(scene, "scene duplicated");
        Ok(true)
    }

    // --- housekeeping ---

    /// Registers the callback invoked by [`poll`](Self::poll) on clip status changes.
    pub fn on_clip_status_change<F>(&mut self, hook: F)
    where
        F: FnMut(ClipAddress, ClipStatus) + Send + 'static,
    {
        self.status_hook = Some(Box::new(hook));
    }

    /// Polls every clip (recording merge, rebuild, publish) and reports status changes.
    ///
    /// Call periodically from the control thread.
    pub fn poll(&mut self) -> PollReport {
        let mut total = PollReport::default();
        for (track_index, track) in self.tracks.iter_mut().enumerate() {
            for (clip_index, clip) in track.clips_mut().iter_mut().enumerate() {
                let report = clip.poll();
                total.merged += report.merged;
                total.published |= report.published;
                total.dropped_recordings += report.dropped_recordings;

                let status = clip.status();
                let last = &mut self.statuses[track_index][clip_index];
                if *last != status {
                    *last = status;
                    if let Some(hook) = self.status_hook.as_mut() {
                        hook(ClipAddress::new(track_index, clip_index), status);
                    }
                }
            }
        }
        total
    }

    /// Releases retired sequences now. Returns how many were freed.
    pub fn sweep(&self) -> usize {
        self.pool.sweep()
    }
}

impl SequencerEngine {
    pub(crate) fn from_parts(
        context: Arc<MusicalContext>,
        settings: Arc<Settings>,
        tracks: Vec<TrackEngine>,
        config: &crate::SequencerConfig,
    ) -> Self {
        Self {
            context,
            settings,
            tracks,
            sample_rate: config.engine.sample_rate,
            block_size: config.engine.block_size,
            buffer_capacity: config.buffer_capacity,
            input: MidiBuffer::with_capacity(config.buffer_capacity),
            recent_note_ons: RecentNoteOns::new(),
            metronome: Metronome::new(config.metronome),
            clock: MidiClock::new(),
        }
    }

    /// An output sized for this engine. Allocate once, before starting the audio callback.
    pub fn new_output(&self) -> BlockOutput {
        BlockOutput::new(self.tracks.len(), self.buffer_capacity)
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn context(&self) -> &MusicalContext {
        &self.context
    }

    pub fn tracks(&self) -> &[TrackEngine] {
        &self.tracks
    }

    /// Renders one block of `block_size` samples.
    ///
    /// `incoming` holds this block's MIDI input; `output` is cleared first. Never allocates.
    pub fn process_block(&mut self, incoming: &MidiBuffer, output: &mut BlockOutput) {
        debug_assert_eq!(output.tracks.len(), self.tracks.len());
        output.clear();

        let context = &*self.context;
        let settings = &*self.settings;
        let block_size = self.block_size;

        context.apply_pending_changes();
        let slice_len = context.slice_length_beats(block_size, self.sample_rate);
        let meter = context.meter();

        // Count-in ends inside this block: start the transport so beat 0 lands on the right sample
        if !context.is_playing() && context.is_counting_in() {
            let count_in = context.count_in_position();
            let bar = meter as f64;
            if bar >= count_in && bar < count_in + slice_len {
                context.set_position(-(bar - count_in));
                settings.toggle_playing.set(true);
                context.set_counting_in(false);
                context.set_count_in_position(0.0);
            }
        }

        context.update_bars_counter(Slice::from_start(context.position(), slice_len));

        let input_origin = if !context.is_playing() && context.is_counting_in() {
            context.count_in_position() - meter as f64
        } else {
            context.position()
        };
        collect_input(
            incoming,
            settings.fixed_velocity(),
            input_origin,
            slice_len,
            block_size,
            &mut self.input,
            &mut self.recent_note_ons,
        );

        let block = BlockContext {
            parent: Slice::from_start(context.position(), slice_len),
            bpm: context.bpm(),
            sample_rate: self.sample_rate,
            block_size,
            out_channel: None,
            record_automation: settings.record_automation.get(),
        };

        for (track, out) in self.tracks.iter().zip(output.tracks.iter_mut()) {
            track.monitor_input(&self.input, out);
        }

        let send_clock = settings.send_midi_clock.get();
        if settings.toggle_playing.swap(false) {
            if context.is_playing() {
                for (track, out) in self.tracks.iter_mut().zip(output.tracks.iter_mut()) {
                    track.stop_for_transport(&block, out);
                }
                context.set_playing(false);
                context.set_position(0.0);
                context.reset_counters();
                if send_clock {
                    self.clock.render_stop(&mut output.clock);
                }
            } else {
                for track in &self.tracks {
                    track.reset_playheads();
                }
                context.set_playing(true);
                if send_clock {
                    self.clock.render_start(&mut output.clock);
                }
            }
        }

        for track in &mut self.tracks {
            track.prepare_clips();
        }

        let playing = context.is_playing();
        let counting_in = context.is_counting_in();
        if playing {
            for (track, out) in self.tracks.iter_mut().zip(output.tracks.iter_mut()) {
                track.process_clips(&block, &self.input, &self.recent_note_ons, out);
            }
        }

        let beats_per_sample = slice_len / block_size as f64;
        let metronome_start = if playing {
            context.position()
        } else {
            context.count_in_position()
        };
        self.metronome.render(
            metronome_start,
            meter,
            beats_per_sample,
            block_size,
            context.is_metronome_on() && (playing || counting_in),
            &mut output.metronome,
        );
        if playing && send_clock {
            self.clock.render(
                context.position(),
                beats_per_sample,
                block_size,
                &mut output.clock,
            );
        }

        if playing {
            context.set_position(context.position() + slice_len);
        } else if counting_in {
            context.set_count_in_position(context.count_in_position() + slice_len);
        }
    }
}

/// Copies `incoming` into `input`, forcing `fixed_velocity` onto note-ons, and remembers the
/// note-ons with their global beat.
fn collect_input(
    incoming: &MidiBuffer,
    fixed_velocity: Option<u8>,
    origin: f64,
    slice_len: f64,
    block_size: usize,
    input: &mut MidiBuffer,
    recent_note_ons: &mut RecentNoteOns,
) {
    input.clear();
    for event in incoming {
        let event = match fixed_velocity {
            Some(velocity) if event.is_note_on() => with_velocity(*event, velocity),
            _ => *event,
        };
        if !input.push(event) {
            break;
        }
        if event.is_note_on() {
            let beat = origin + slice_len * event.frame_offset as f64 / block_size as f64;
            recent_note_ons.push(beat, event);
        }
    }
}

#[inline]
fn with_velocity(event: MidiEvent, velocity: u8) -> MidiEvent {
    match event.msg {
        ChannelVoiceMsg::NoteOn { note, .. } => MidiEvent {
            msg: ChannelVoiceMsg::NoteOn { note, velocity },
            ..event
        },
        _ => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_velocity_only_touches_note_ons() {
        let on = with_velocity(MidiEvent::note_on(0, 0, 60, 20), 100);
        assert_eq!(on.velocity(), Some(100));

        let cc = MidiEvent::control_change(0, 0, 1, 20);
        assert_eq!(with_velocity(cc, 100), cc);
    }

    #[test]
    fn test_collect_input_stamps_recent_note_ons() {
        let mut incoming = MidiBuffer::with_capacity(8);
        incoming.push(MidiEvent::note_on(100, 0, 60, 20));
        incoming.push(MidiEvent::note_off(300, 0, 60, 0));

        let mut input = MidiBuffer::with_capacity(8);
        let mut recent = RecentNoteOns::new();
        collect_input(&incoming, Some(90), 8.0, 4.0, 400, &mut input, &mut recent);

        assert_eq!(input.len(), 2);
        assert_eq!(input.as_slice()[0].velocity(), Some(90));
        let stamped: Vec<_> = recent.iter().map(|r| r.beat).collect();
        assert_eq!(stamped, vec![9.0]);
    }

    #[test]
    fn test_block_output_shape() {
        let mut output = BlockOutput::new(3, 16);
        assert_eq!(output.tracks.len(), 3);
        output.tracks[1].push(MidiEvent::note_on(0, 0, 60, 1));
        output.clear();
        assert!(output.track(1).unwrap().is_empty());
        assert!(output.track(3).is_none());
    }
}
