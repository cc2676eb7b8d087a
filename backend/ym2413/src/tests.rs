use super::*;
use crate::rhythm::{TOM_TOM, TOP_CYMBAL};
use test_log::test;

// User instrument with a silent modulator (AR 0) and a carrier that attacks instantly and holds
const SINE_PATCH: [u8; 8] = [0x21, 0x21, 0x3F, 0x00, 0x00, 0xF0, 0x00, 0x00];

// Both slots attack instantly and hold at full level
const HOLD_PATCH: [u8; 8] = [0x21, 0x21, 0x00, 0x00, 0xF0, 0xF0, 0x00, 0x00];

// HOLD_PATCH with the strongest modulator feedback
const FEEDBACK_PATCH: [u8; 8] = [0x21, 0x21, 0x00, 0x07, 0xF0, 0xF0, 0x00, 0x00];

// Key on, block 3, F-number bit 8
const KEY_ON_BLOCK_3_F_256: u8 = 0x10 | (3 << 1) | 0x01;
const KEY_OFF_BLOCK_3_F_256: u8 = (3 << 1) | 0x01;

fn new_chip() -> Ym2413 {
    Ym2413::new(Ym2413Tables::shared(), msx_music_config::MSX_BASE_CLOCK_HZ)
}

fn load_user_patch(chip: &mut Ym2413, patch: [u8; 8]) {
    for (address, value) in patch.into_iter().enumerate() {
        chip.write_register(address as u8, value);
    }
}

fn render(chip: &mut Ym2413, samples: usize) -> Vec<i32> {
    (0..samples).map(|_| chip.next_sample()).collect()
}

fn play_song(chip: &mut Ym2413) -> Vec<i32> {
    let mut output = Vec::new();

    // Melodic channels with ROM instruments
    let notes = [(1, 0x0AC), (3, 0x120), (12, 0x16B)];
    for (channel, (instrument, f_number)) in notes.into_iter().enumerate() {
        let channel = channel as u8;
        chip.write_register(0x10 + channel, f_number as u8);
        chip.write_register(0x30 + channel, (instrument << 4) | 0x02);
        chip.write_register(0x20 + channel, 0x10 | (4 << 1) | ((f_number >> 8) as u8));
    }
    output.extend(render(chip, 700));

    // Rhythm section on top
    chip.write_register(0x16, 0x20);
    chip.write_register(0x26, 0x05);
    chip.write_register(0x17, 0x50);
    chip.write_register(0x27, 0x05);
    chip.write_register(0x18, 0xC0);
    chip.write_register(0x28, 0x01);
    chip.write_register(0x36, 0x01);
    chip.write_register(0x37, 0x11);
    chip.write_register(0x38, 0x11);
    chip.write_register(0x0E, 0x20 | 0x1F);
    output.extend(render(chip, 1500));

    chip.write_register(0x21, 0x00);
    chip.write_register(0x0E, 0x20 | 0x0A);
    output.extend(render(chip, 1100));

    output
}

#[test]
fn first_sample_after_key_on_is_silent_and_attack_reaches_peak() {
    let mut chip = new_chip();
    load_user_patch(&mut chip, SINE_PATCH);
    chip.write_register(0x10, 0x00);
    chip.write_register(0x30, 0x00);
    chip.write_register(0x20, KEY_ON_BLOCK_3_F_256);

    assert_eq!(chip.next_sample(), 0, "damp step must output silence");
    assert_eq!(chip.operator_view(1).unwrap().envelope_step, EnvelopeStep::Attack);
    assert_eq!(chip.operator_view(1).unwrap().phase_increment, 2048);

    let samples = render(&mut chip, 15);
    assert_eq!(chip.operator_view(1).unwrap().envelope_level, 8);
    assert!(samples.iter().all(|&sample| sample.abs() <= 256));

    chip.next_sample();
    assert_eq!(chip.operator_view(1).unwrap().envelope_level, 0, "attack done after 17 samples");

    // Carrier phase index is 4 * sample number; index 252 sits on the peak of the sine
    let samples = render(&mut chip, 256);
    assert_eq!(samples[62 - 17], 255);
    assert_eq!(samples.iter().copied().max(), Some(255));
    // Arithmetic shift rounds the negative peak down
    assert_eq!(samples.iter().copied().min(), Some(-256));
}

#[test]
fn identical_sequences_are_deterministic() {
    let mut a = new_chip();
    let mut b = new_chip();
    let output_a = play_song(&mut a);
    let output_b = play_song(&mut b);

    assert!(output_a.iter().any(|&sample| sample != 0), "song should produce sound");
    assert_eq!(output_a, output_b);
    assert_eq!(a.save_state(), b.save_state());
}

#[test]
fn reset_matches_fresh_chip() {
    let mut chip = new_chip();
    play_song(&mut chip);
    chip.reset();

    assert_eq!(chip.save_state(), new_chip().save_state());
    assert_eq!(render(&mut chip, 100), vec![0; 100]);
}

#[test]
fn repeated_writes_are_idempotent() {
    let mut once = new_chip();
    let mut twice = new_chip();

    for chip in [&mut once, &mut twice] {
        load_user_patch(chip, HOLD_PATCH);
        chip.write_register(0x10, 0x80);
    }

    assert_ne!(once.write_register(0x20, KEY_ON_BLOCK_3_F_256), 0);
    render(&mut once, 10);

    assert_ne!(twice.write_register(0x20, KEY_ON_BLOCK_3_F_256), 0);
    assert_eq!(twice.write_register(0x20, KEY_ON_BLOCK_3_F_256), 0, "no bits changed");
    render(&mut twice, 10);

    assert_eq!(render(&mut once, 500), render(&mut twice, 500));
}

#[test]
fn key_off_only_releases_carrier() {
    let mut chip = new_chip();
    load_user_patch(&mut chip, HOLD_PATCH);
    chip.write_register(0x20, KEY_ON_BLOCK_3_F_256);
    render(&mut chip, 100);

    let modulator_before = chip.operator_view(0).unwrap();
    assert_eq!(modulator_before.envelope_step, EnvelopeStep::Sustain);

    chip.write_register(0x20, KEY_OFF_BLOCK_3_F_256);
    chip.next_sample();

    let modulator_after = chip.operator_view(0).unwrap();
    let carrier_after = chip.operator_view(1).unwrap();
    assert_eq!(carrier_after.envelope_step, EnvelopeStep::Release);
    assert_eq!(modulator_after.envelope_step, modulator_before.envelope_step);
    assert_eq!(modulator_after.envelope_level, modulator_before.envelope_level);
    assert!(!modulator_after.key_on);
}

#[test]
fn feedback_averages_last_two_modulator_outputs() {
    let mut chip = new_chip();
    load_user_patch(&mut chip, FEEDBACK_PATCH);
    chip.write_register(0x20, KEY_ON_BLOCK_3_F_256);
    render(&mut chip, 100);

    let channel = chip.channel_view(0).unwrap();
    assert_eq!(channel.feedback_shift, 1);
    assert_ne!(channel.feedback, [0, 0]);

    for _ in 0..50 {
        let history = chip.channel_view(0).unwrap().feedback;
        chip.next_sample();

        let modulator = chip.operator_view(0).unwrap();
        let phase = (modulator.phase_counter >> 9) as i32 - 1;
        let feedback = ((history[0] + history[1]) >> 1) >> 1;
        let expected =
            chip.tables().operator_output(false, phase + feedback, modulator.total_attenuation);
        assert_eq!(chip.channel_view(0).unwrap().feedback, [expected, history[0]]);
    }
}

#[test]
fn zero_feedback_keeps_history_empty() {
    let mut chip = new_chip();
    load_user_patch(&mut chip, HOLD_PATCH);
    chip.write_register(0x20, KEY_ON_BLOCK_3_F_256);
    let samples = render(&mut chip, 200);

    assert!(samples.iter().any(|&sample| sample != 0));
    let channel = chip.channel_view(0).unwrap();
    assert_eq!(channel.feedback_shift, FEEDBACK_DISABLED);
    assert_eq!(channel.feedback, [0, 0]);
}

#[test]
fn rhythm_mode_round_trip_restores_channels() {
    let mut chip = new_chip();
    for channel in 6..9 {
        chip.write_register(0x10 + channel, 0x40 + channel);
        chip.write_register(0x20 + channel, 0x05);
        chip.write_register(0x30 + channel, ((channel - 3) << 4) | 0x04);
    }

    let before: Vec<_> = chip.channel_views().skip(6).collect();
    let increments_before: Vec<_> =
        chip.operator_views().skip(12).map(|operator| operator.phase_increment).collect();

    chip.write_register(0x0E, 0x20);
    assert!(chip.rhythm_mode_enabled());
    assert_eq!(chip.channel_view(6).unwrap().instrument, tables::BASS_DRUM_INSTRUMENT);
    assert_eq!(chip.channel_view(7).unwrap().instrument, tables::SNARE_HIGH_HAT_INSTRUMENT);
    assert_eq!(chip.channel_view(8).unwrap().instrument, tables::TOM_CYMBAL_INSTRUMENT);

    chip.write_register(0x0E, 0x00);
    assert!(!chip.rhythm_mode_enabled());

    let after: Vec<_> = chip.channel_views().skip(6).collect();
    let increments_after: Vec<_> =
        chip.operator_views().skip(12).map(|operator| operator.phase_increment).collect();
    assert_eq!(before.len(), 3);
    assert_eq!(before, after);
    assert_eq!(increments_before, increments_after);
    assert!(
        chip.operator_views().skip(12).all(|operator| operator.envelope_step == EnvelopeStep::Idle)
    );
}

#[test]
fn rhythm_voices_sound_only_in_rhythm_mode() {
    let mut chip = new_chip();
    chip.write_register(0x16, 0x20);
    chip.write_register(0x26, 0x05);
    chip.write_register(0x36, 0x00);

    // Key bits are ignored while rhythm mode is off
    chip.write_register(0x0E, 0x10);
    assert_eq!(chip.operator_view(13).unwrap().envelope_step, EnvelopeStep::Idle);
    assert_eq!(render(&mut chip, 200), vec![0; 200]);

    chip.write_register(0x0E, 0x00);
    chip.write_register(0x0E, 0x30);
    assert_eq!(chip.operator_view(12).unwrap().envelope_step, EnvelopeStep::Damp);
    assert_eq!(chip.operator_view(13).unwrap().envelope_step, EnvelopeStep::Damp);
    assert!(render(&mut chip, 2000).iter().any(|&sample| sample != 0), "bass drum is silent");
}

#[test]
fn rhythm_volume_register_targets_both_slots() {
    let mut chip = new_chip();
    chip.write_register(0x0E, 0x20);
    chip.write_register(0x38, 0x5A);

    assert_eq!(chip.operator_view(TOM_TOM).unwrap().volume_attenuation, 5 << 7);
    assert_eq!(chip.operator_view(TOP_CYMBAL).unwrap().volume_attenuation, 10 << 7);
    assert_eq!(chip.channel_view(8).unwrap().instrument, tables::TOM_CYMBAL_INSTRUMENT);
}

#[test]
fn aliased_addresses_share_the_channel_register() {
    let mut chip = new_chip();
    chip.write_register(0x39, 0x30);

    assert_eq!(chip.channel_view(0).unwrap().instrument, 3);
    assert_eq!(chip.registers()[0x30], 0x30);
    assert_eq!(chip.registers()[0x39], 0x00);
    assert_eq!(chip.write_register(0x30, 0x30), 0, "same value through the canonical address");
}

#[test]
fn restore_keeps_last_write_across_aliases() {
    let mut chip = new_chip();
    load_user_patch(&mut chip, HOLD_PATCH);
    chip.write_register(0x39, 0x10);
    chip.write_register(0x30, 0x20);
    chip.write_register(0x10, 0x80);
    chip.write_register(0x29, KEY_ON_BLOCK_3_F_256);
    render(&mut chip, 50);

    let saved = chip.save_state();
    let mut restored = new_chip();
    restored.load_state(&saved).unwrap();

    assert_eq!(restored.channel_view(0).unwrap().instrument, 2);
    assert_eq!(restored.save_state(), saved);
    assert_eq!(render(&mut restored, 500), render(&mut chip, 500));
}

#[test]
fn rhythm_exit_restores_instrument_written_through_alias() {
    let mut chip = new_chip();
    chip.write_register(0x36, 0x30);
    chip.write_register(0x3F, 0x50);
    assert_eq!(chip.channel_view(6).unwrap().instrument, 5);

    chip.write_register(0x0E, 0x20);
    chip.write_register(0x0E, 0x00);
    assert_eq!(chip.channel_view(6).unwrap().instrument, 5);
}

#[test]
fn user_instrument_changes_apply_to_channels_using_it() {
    let mut chip = new_chip();
    chip.write_register(0x31, 0x20);
    chip.write_register(0x00, 0x0F);

    // Multiple 15 is doubled to 30
    chip.write_register(0x10, 0x80);
    assert_eq!(chip.operator_view(0).unwrap().phase_increment, (0x80 * 2 * 30) >> 2);
    // Channel 1 uses a ROM instrument and is unaffected
    assert_eq!(chip.channel_view(1).unwrap().instrument, 2);
    assert_eq!(chip.operator_view(2).unwrap().phase_increment, 0);
}

#[test]
fn vibrato_moves_phase_increment() {
    let mut chip = new_chip();
    // Vibrato on both slots, sustained carrier that attacks instantly
    load_user_patch(&mut chip, [0x61, 0x21, 0x3F, 0x00, 0x00, 0xF0, 0x00, 0x00]);
    chip.write_register(0x10, 0xFF);
    chip.write_register(0x20, 0x10 | (4 << 1) | 0x01);

    let mut increments = Vec::new();
    for _ in 0..8 {
        render(&mut chip, 1024);
        increments.push(chip.operator_view(1).unwrap().phase_increment);
    }
    increments.sort_unstable();
    increments.dedup();
    assert!(increments.len() > 1, "vibrato should modulate the phase increment");
}

#[test]
fn save_and_restore_round_trip() {
    let mut chip = new_chip();
    play_song(&mut chip);
    let saved = chip.save_state();
    let reference = render(&mut chip, 4000);

    // Diverge, then restore
    chip.write_register(0x0E, 0x00);
    chip.write_register(0x30, 0xF0);
    chip.write_register(0x20, 0x1F);
    render(&mut chip, 321);

    chip.load_state(&saved).unwrap();
    assert_eq!(chip.save_state(), saved);
    assert_eq!(render(&mut chip, 4000), reference);
}

#[test]
fn restored_state_survives_bincode() {
    let mut chip = new_chip();
    play_song(&mut chip);
    let saved = chip.save_state();

    let config = bincode::config::standard();
    let bytes = bincode::encode_to_vec(&saved, config).unwrap();
    let (decoded, _): (Ym2413State, usize) = bincode::decode_from_slice(&bytes, config).unwrap();
    assert_eq!(decoded, saved);

    let mut restored = new_chip();
    restored.load_state(&decoded).unwrap();
    assert_eq!(render(&mut restored, 1000), render(&mut chip, 1000));
}

#[test]
fn invalid_state_is_rejected_without_side_effects() {
    let mut chip = new_chip();
    play_song(&mut chip);
    let before = chip.save_state();

    let mut short = before.clone();
    short.phase_counter.pop();
    assert_eq!(
        chip.load_state(&short),
        Err(StateError::LengthMismatch { field: "phase_counter", expected: 18, actual: 17 })
    );

    let mut out_of_range = before.clone();
    out_of_range.envelope_level[3] = 200;
    assert!(matches!(
        chip.load_state(&out_of_range),
        Err(StateError::OutOfRange { field: "envelope_level", .. })
    ));

    let mut runaway_feedback = before.clone();
    runaway_feedback.feedback_last[0] = i32::MAX;
    runaway_feedback.feedback_previous[0] = 1;
    assert!(matches!(
        chip.load_state(&runaway_feedback),
        Err(StateError::OutOfRange { field: "feedback_last", .. })
    ));

    let mut negative_feedback = before.clone();
    negative_feedback.feedback_previous[4] = -(tables::MAX_OPERATOR_OUTPUT + 1);
    assert!(matches!(
        chip.load_state(&negative_feedback),
        Err(StateError::OutOfRange { field: "feedback_previous", .. })
    ));

    let mut bad_registers = before.clone();
    bad_registers.registers.truncate(0x38);
    assert!(chip.load_state(&bad_registers).is_err());

    assert_eq!(chip.save_state(), before);
}
