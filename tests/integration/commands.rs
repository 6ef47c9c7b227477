//! Command surface and control-thread housekeeping tests

use std::sync::Arc;

use parking_lot::Mutex;

use cadenza::prelude::*;
use cadenza::Error;

use crate::helpers::*;

const SEQUENCE_JSON: &str = r#"{"clipLength": 4, "sequenceEvents": [
    {"type": "note", "midiNote": 60, "midiVelocity": 1.0, "timestamp": 0, "duration": 1},
    {"type": "midi", "eventMidiBytes": "176,1,56", "timestamp": 0.25}
]}"#;

#[test]
fn test_handle_drives_playback() {
    let (mut sequencer, mut engine) = test_sequencer(2, 2);
    let mut output = engine.new_output();

    sequencer
        .handle("/clip/setSequence", &["1", "0", SEQUENCE_JSON])
        .unwrap();
    sequencer.handle("/clip/play", &["1", "0"]).unwrap();
    sequencer.handle("/track/setOutputChannel", &["1", "10"]).unwrap();
    sequencer.handle::<&str>("/transport/playStop", &[]).unwrap();
    sequencer.poll();

    run_blocks(&mut engine, &mut output, 1);
    let events = output.tracks[1].as_slice();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].note(), Some(60));
    assert_eq!(events[0].channel, Channel::Ch10);
    assert_eq!(events[1].controller(), Some((1, 56)));
    assert_eq!(events[1].frame_offset, SAMPLES_PER_BEAT / 4);

    sequencer.handle("/track/setOutputChannel", &["1", "-1"]).unwrap();
    run_blocks(&mut engine, &mut output, 8);
    assert!(output.tracks[1].is_empty());
}

#[test]
fn test_clip_editing_commands() {
    let (mut sequencer, _engine) = test_sequencer(1, 1);
    let address = ClipAddress::new(0, 0);
    sequencer
        .handle("/clip/setSequence", &["0", "0", SEQUENCE_JSON])
        .unwrap();

    sequencer.handle("/clip/double", &["0", "0"]).unwrap();
    assert_eq!(sequencer.clip(address).unwrap().length(), 8.0);
    assert_eq!(sequencer.clip(address).unwrap().events().len(), 4);

    sequencer.handle("/clip/undo", &["0", "0"]).unwrap();
    assert_eq!(sequencer.clip(address).unwrap().length(), 4.0);

    sequencer.handle("/clip/quantize", &["0", "0", "0.5"]).unwrap();
    sequencer.handle("/clip/setLength", &["0", "0", "6"]).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "sne|6.000|0.5");

    let id = sequencer.clip(address).unwrap().events()[0].id;
    let edit = format!(
        r#"{{"action": "editEvent", "eventUUID": "{id}", "eventData": {{"midiNote": 72}}}}"#
    );
    sequencer
        .handle("/clip/editSequence", &["0", "0", edit.as_str()])
        .unwrap();
    assert_eq!(sequencer.clip(address).unwrap().events()[0].id, id);

    let remove = format!(r#"{{"action": "removeEvent", "eventUUID": "{id}"}}"#);
    sequencer
        .handle("/clip/editSequence", &["0", "0", remove.as_str()])
        .unwrap();
    assert_eq!(sequencer.clip(address).unwrap().events().len(), 1);
    assert!(sequencer
        .handle("/clip/editSequence", &["0", "0", remove.as_str()])
        .is_err());

    sequencer.handle("/clip/clear", &["0", "0"]).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "snE|0.000|0.5");
}

#[test]
fn test_settings_commands() {
    let (mut sequencer, _engine) = test_sequencer(1, 2);

    sequencer.handle("/clip/recordOnOff", &["0", "1"]).unwrap();
    assert_eq!(status(&sequencer, 0, 1), "cwE|0.000|0");

    // Armed empty clips take the new fixed length
    sequencer.handle("/settings/fixedLength", &["2"]).unwrap();
    assert_eq!(sequencer.fixed_length_bars(), 2);
    assert_eq!(status(&sequencer, 0, 1), "cwe|8.000|0");

    sequencer.handle("/settings/fixedVelocity", &["110"]).unwrap();
    assert_eq!(sequencer.fixed_velocity(), Some(110));
    sequencer.handle("/settings/fixedVelocity", &["-1"]).unwrap();
    assert_eq!(sequencer.fixed_velocity(), None);

    assert!(sequencer.record_automation());
    sequencer
        .handle::<&str>("/settings/toggleRecordAutomation", &[])
        .unwrap();
    assert!(!sequencer.record_automation());

    sequencer.handle::<&str>("/metronome/onOff", &[]).unwrap();
    assert!(!sequencer.context().is_metronome_on());
    sequencer.handle::<&str>("/metronome/on", &[]).unwrap();
    assert!(sequencer.context().is_metronome_on());

    sequencer.handle("/track/setInputMonitoring", &["0", "1"]).unwrap();
    assert!(sequencer.tracks()[0].input_monitoring());
}

#[test]
fn test_bad_addresses_are_rejected() {
    let (mut sequencer, _engine) = test_sequencer(2, 2);

    assert!(matches!(
        sequencer.handle("/clip/play", &["5", "0"]),
        Err(Error::TrackNotFound(5))
    ));
    assert!(matches!(
        sequencer.handle("/clip/play", &["0", "7"]),
        Err(Error::ClipNotFound { track: 0, clip: 7 })
    ));
    assert!(matches!(
        sequencer.handle("/scene/play", &["2"]),
        Err(Error::SceneNotFound(2))
    ));
    assert!(matches!(
        sequencer.handle::<&str>("/transport/rewind", &[]),
        Err(Error::UnknownAddress(_))
    ));
    assert!(matches!(
        sequencer.apply(Command::TrackSetInputMonitoring {
            track: 3,
            enabled: true
        }),
        Err(Error::TrackNotFound(3))
    ));
}

#[test]
fn test_status_hook_reports_changes_once() {
    let (mut sequencer, mut engine) = test_sequencer(1, 2);
    let mut output = engine.new_output();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    sequencer.on_clip_status_change(move |address, status| {
        sink.lock().push((address, status.to_string()));
    });

    sequencer.handle("/clip/setSequence", &["0", "1", SEQUENCE_JSON]).unwrap();
    sequencer.handle("/clip/play", &["0", "1"]).unwrap();
    sequencer.poll();
    sequencer.poll();
    assert_eq!(
        *seen.lock(),
        vec![(ClipAddress::new(0, 1), "cne|4.000|0".to_string())]
    );

    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 1);
    sequencer.poll();
    assert_eq!(
        seen.lock().last(),
        Some(&(ClipAddress::new(0, 1), "pne|4.000|0".to_string()))
    );
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_sweep_frees_replaced_sequences() {
    let (mut sequencer, mut engine) = test_sequencer(1, 1);
    let mut output = engine.new_output();

    for length in ["2", "4", "8"] {
        let json = format!(r#"{{"clipLength": {length}, "sequenceEvents": []}}"#);
        sequencer
            .handle("/clip/setSequence", &["0", "0", json.as_str()])
            .unwrap();
        sequencer.poll();
        run_blocks(&mut engine, &mut output, 1);
    }

    // The initial snapshot and the first two replacements are retired
    assert_eq!(sequencer.sweep(), 3);
    assert_eq!(sequencer.sweep(), 0);
}
