//! End-to-end tests for the capture → detect → export pipeline, driven
//! without audio hardware by feeding the capture bridge directly.

use jet_core::sequencer::AbortReason;
use jet_core::{
    CaptureBridge, CaptureControls, CaptureMode, ExportOutcome, FrameExchange, SharedThresholds,
    Transcriber, TranscriberConfig,
};
use midly::{MidiMessage, Smf, TrackEventKind};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::sync::Arc;
use std::thread;

struct Rig {
    bridge: CaptureBridge,
    controls: Arc<CaptureControls>,
    transcriber: Transcriber,
}

fn rig(config: TranscriberConfig) -> Rig {
    let frame_len = config.audio.buffer_size;
    let exchange = Arc::new(FrameExchange::new(frame_len, frame_len / 2));
    let controls = Arc::new(CaptureControls::default());
    let thresholds = Arc::new(SharedThresholds::new(&config));
    let bridge = CaptureBridge::new(frame_len, Arc::clone(&exchange), Arc::clone(&controls), 42);
    let transcriber = Transcriber::new(config, exchange, thresholds);
    Rig { bridge, controls, transcriber }
}

/// (tick, is_note_on, key) for every note event in the first track.
fn note_events(bytes: &[u8]) -> Vec<(u32, bool, u8)> {
    let smf = Smf::parse(bytes).expect("exported file should parse");
    assert_eq!(smf.tracks.len(), 1);
    let mut tick = 0;
    let mut out = Vec::new();
    for event in &smf.tracks[0] {
        tick += event.delta.as_int();
        if let TrackEventKind::Midi { message, .. } = event.kind {
            match message {
                MidiMessage::NoteOn { key, vel } => {
                    assert_eq!(vel.as_int(), 127);
                    out.push((tick, true, key.as_int()));
                }
                MidiMessage::NoteOff { key, .. } => out.push((tick, false, key.as_int())),
                _ => {}
            }
        }
    }
    out
}

#[test]
fn silent_capture_aborts_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("midi.mid");
    let mut rig = rig(TranscriberConfig::default());

    rig.bridge.process(&vec![0.0; 2048]);
    assert!(rig.transcriber.tick());

    assert!(rig.transcriber.frame().spectrum.iter().all(|&b| b == 0.0));
    assert!(rig.transcriber.time_markers().is_empty());
    assert!(rig.transcriber.midi_notes().is_empty());

    let outcome = rig.transcriber.export(&path, &mut Pcg32::seed_from_u64(0)).unwrap();
    assert!(matches!(outcome, ExportOutcome::Aborted { reason: AbortReason::NoNotes, .. }));
    assert!(note_events(&std::fs::read(&path).unwrap()).is_empty());
}

#[test]
fn tone_capture_exports_playable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("midi.mid");
    let mut rig = rig(TranscriberConfig::default());

    // 440 Hz at 44.1 kHz is 440 / 22050 of Nyquist
    rig.controls.set_mode(CaptureMode::Tone);
    rig.controls.set_tone(440.0 / 22050.0);
    rig.bridge.process(&[]);
    rig.transcriber.tick();

    let notes = rig.transcriber.midi_notes().real().to_vec();
    assert!(!notes.is_empty());
    assert!(notes.iter().all(|&n| (67..=71).contains(&n)), "notes: {:?}", notes);
    assert!(!rig.transcriber.time_markers().is_empty());

    let outcome = rig.transcriber.export(&path, &mut Pcg32::seed_from_u64(3)).unwrap();
    let pairs = match &outcome {
        ExportOutcome::Written { pairs, .. } => pairs.clone(),
        other => panic!("expected a written file, got {:?}", other),
    };

    let events = note_events(&std::fs::read(&path).unwrap());
    assert_eq!(events.len(), pairs.len() * 2);
    let total = pairs.last().unwrap().off_step;
    assert_eq!(events.last().unwrap().0, total);
    assert!(pairs.iter().all(|p| p.duration() % 96 == 0 && p.duration() <= 384));
}

#[test]
fn seeded_exports_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let mut rig = rig(TranscriberConfig::default());
    rig.controls.set_mode(CaptureMode::Noise);
    rig.bridge.process(&[]);
    rig.transcriber.thresholds().set_time(-40.0);
    rig.transcriber.thresholds().set_freq(40.0);
    rig.transcriber.tick();

    let a = dir.path().join("a.mid");
    let b = dir.path().join("b.mid");
    rig.transcriber.export(&a, &mut Pcg32::seed_from_u64(77)).unwrap();
    rig.transcriber.export(&b, &mut Pcg32::seed_from_u64(77)).unwrap();
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

#[test]
fn capture_and_consumer_run_concurrently() {
    let rig = rig(TranscriberConfig::default());
    rig.controls.set_mode(CaptureMode::Noise);

    let Rig { mut bridge, mut transcriber, .. } = rig;
    let producer = thread::spawn(move || {
        for _ in 0..200 {
            bridge.process(&[]);
        }
    });

    for _ in 0..200 {
        transcriber.tick();
        let frame = transcriber.frame();
        assert_eq!(frame.audio.len(), 2048);
        assert_eq!(frame.spectrum.len(), 1024);
        assert_eq!(transcriber.time_markers()[0], 0.0);
        assert_eq!(transcriber.midi_notes()[0], 0);
    }
    producer.join().unwrap();

    transcriber.tick();
    assert_eq!(transcriber.frame().sequence, 200);
}
