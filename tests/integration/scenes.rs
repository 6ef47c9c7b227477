//! Scene integration tests

use cadenza::prelude::*;
use cadenza::Error;

use crate::helpers::*;

#[test]
fn test_play_scene_cues_row_and_stops_others() {
    let (mut sequencer, mut engine) = test_sequencer(3, 3);
    let mut output = engine.new_output();
    load_note(&mut sequencer, ClipAddress::new(0, 1), 4.0, 60, 0.0, 1.0);
    load_note(&mut sequencer, ClipAddress::new(1, 1), 4.0, 62, 0.0, 1.0);
    load_note(&mut sequencer, ClipAddress::new(2, 0), 4.0, 64, 0.0, 1.0);

    sequencer.play_clip(ClipAddress::new(2, 0)).unwrap();
    sequencer.toggle_play_stop();
    run_blocks(&mut engine, &mut output, 2);
    assert_eq!(status(&sequencer, 2, 0), "pne|4.000|0");

    sequencer.play_scene(1).unwrap();
    assert_eq!(status(&sequencer, 0, 1), "cne|4.000|0");
    assert_eq!(status(&sequencer, 1, 1), "cne|4.000|0");
    assert_eq!(status(&sequencer, 2, 0), "Cne|4.000|0");
    // Empty slots stay empty
    assert_eq!(status(&sequencer, 2, 1), "snE|0.000|0");

    run_blocks(&mut engine, &mut output, 6);
    run_blocks(&mut engine, &mut output, 1);
    assert_eq!(note_ons(&output.tracks[0]), vec![(0, 60)]);
    assert_eq!(note_ons(&output.tracks[1]), vec![(0, 62)]);
    assert!(note_ons(&output.tracks[2]).is_empty());
    assert_eq!(output.tracks[0].as_slice()[0].channel, Channel::Ch1);
    assert_eq!(output.tracks[1].as_slice()[0].channel, Channel::Ch2);
    assert_eq!(status(&sequencer, 2, 0), "sne|4.000|0");
}

#[test]
fn test_play_scene_twice_keeps_cue() {
    let (mut sequencer, _engine) = test_sequencer(1, 2);
    load_note(&mut sequencer, ClipAddress::new(0, 0), 4.0, 60, 0.0, 1.0);

    sequencer.play_scene(0).unwrap();
    sequencer.play_scene(0).unwrap();
    assert_eq!(status(&sequencer, 0, 0), "cne|4.000|0");
}

#[test]
fn test_play_scene_out_of_range() {
    let (sequencer, _engine) = test_sequencer(2, 2);
    assert!(matches!(sequencer.play_scene(2), Err(Error::SceneNotFound(2))));
}

#[test]
fn test_duplicate_scene_shifts_scenes_down() {
    let (mut sequencer, _engine) = test_sequencer(2, 3);
    load_note(&mut sequencer, ClipAddress::new(0, 0), 4.0, 60, 0.0, 1.0);
    load_note(&mut sequencer, ClipAddress::new(0, 1), 2.0, 62, 0.5, 1.0);
    load_note(&mut sequencer, ClipAddress::new(1, 2), 8.0, 64, 1.0, 1.0);

    assert!(sequencer.duplicate_scene(0).unwrap());
    sequencer.poll();

    let lengths = |track: usize| -> Vec<f64> {
        sequencer.tracks()[track]
            .clips()
            .iter()
            .map(|clip| clip.length())
            .collect()
    };
    assert_eq!(lengths(0), vec![4.0, 4.0, 2.0]);
    // The last scene falls off the grid
    assert_eq!(lengths(1), vec![0.0, 0.0, 0.0]);

    let original = &sequencer.clip(ClipAddress::new(0, 0)).unwrap().events()[0];
    let copy = &sequencer.clip(ClipAddress::new(0, 1)).unwrap().events()[0];
    assert_eq!(copy.kind, original.kind);
    assert_ne!(copy.id, original.id);

    assert!(!sequencer.duplicate_scene(2).unwrap());
    assert!(matches!(
        sequencer.duplicate_scene(3),
        Err(Error::SceneNotFound(3))
    ));
}
