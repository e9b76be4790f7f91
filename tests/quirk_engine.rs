mod common;

use common::{last_corrected, observe, recording_chip};
use sidemu::{ChipRevision, EmulationConfig, SidBackend, SidEmu};

const CONTROL: [u8; 3] = [0x04, 0x0b, 0x12];

#[test]
fn muted_voice_never_receives_gate() {
    for revision in ChipRevision::ALL {
        for (voice, &addr) in CONTROL.iter().enumerate() {
            let mut sid = recording_chip(revision);
            let log = observe(&mut sid);
            sid.set_voice_mute(voice, true);

            for data in 0..=0xffu8 {
                sid.write(addr, data);
                assert_eq!(last_corrected(&log) & 0x01, 0, "{revision:?} voice {voice} {data:#04x}");
                assert_eq!(sid.read(addr), data);
            }
        }
    }
}

#[test]
fn master_mute_forces_full_volume() {
    let mut sid = recording_chip(ChipRevision::Mos6581);
    let log = observe(&mut sid);
    sid.set_voice_mute(3, true);

    for data in 0..=0xffu8 {
        sid.write(0x18, data);
        let out = last_corrected(&log);
        assert_eq!(out & 0x0f, 0x0f);
        assert_eq!(out & 0xf0, data & 0xf0);
    }
}

#[test]
fn pulse_only_becomes_sawtooth() {
    for revision in ChipRevision::ALL {
        let mut sid = recording_chip(revision);
        sid.set_trigger_waves(true);
        for &addr in &CONTROL {
            sid.write(addr, 0x41);
        }
        assert_eq!(
            sid.pipeline().writes,
            vec![(0x04, 0x21), (0x0b, 0x21), (0x12, 0x21)]
        );
    }
}

#[test]
fn filter_bypass_only_affects_writes() {
    let mut sid = recording_chip(ChipRevision::Mos8580);
    let log = observe(&mut sid);
    sid.set_filter(false);

    sid.write(0x17, 0xf7);
    assert_eq!(last_corrected(&log), 0x00);
    assert_eq!(sid.read(0x17), 0xf7);

    // Re-enabling is not retroactive
    sid.set_filter(true);
    assert_eq!(sid.pipeline().writes.last(), Some(&(0x17, 0x00)));
    sid.write(0x17, 0xf7);
    assert_eq!(last_corrected(&log), 0xf7);
}

#[test]
fn observer_sees_raw_and_flags() {
    let mut sid = recording_chip(ChipRevision::Mos6581);
    let log = observe(&mut sid);
    sid.set_envelope(false);
    sid.set_kinks(false);
    sid.set_voice_trigger_waves(2, true);
    sid.set_trigger_filter(true);

    sid.write(0x12, 0x41);
    sid.write(0x05, 0x9a);

    let log = log.lock();
    let events = log.events();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].raw, events[0].corrected), (0x41, 0x21));
    assert!(events[0].was_rewritten());
    assert!(events[0].env_disable);
    assert!(events[0].kinks_disabled);
    assert!(events[0].trigger_waves);
    assert!(events[0].trigger_filter);
    assert!(!events[1].was_rewritten());
    assert!(!events[1].trigger_waves);
}

#[test]
fn configured_defaults_survive_reset() {
    let config = EmulationConfig::from_json(
        r#"{ "revision": "Mos8580", "muted": [true, false, false, false], "trigger_waves": [true, true, true], "trigger_filter": true }"#,
    )
    .unwrap();
    let mut sid = SidEmu::with_config(&config, common::RecordingPipeline::default());
    assert_eq!(sid.core().revision(), ChipRevision::Mos8580);

    sid.set_voice_mute(0, false);
    sid.set_trigger_waves(false);
    sid.reset(0x00);

    let log = observe(&mut sid);
    sid.write(0x04, 0x41);
    assert_eq!(last_corrected(&log), 0x20);
    assert!(log.lock().events()[0].trigger_filter);
}

#[test]
fn invalid_voice_indices_are_ignored() {
    let mut sid = recording_chip(ChipRevision::Mos6581);
    let before = *sid.core().quirks();
    sid.set_voice_mute(4, true);
    sid.set_voice_filter(3, false);
    sid.set_voice_trigger_waves(17, true);
    assert_eq!(*sid.core().quirks(), before);
}
