//! Rhythm mode percussion voices and the noise generator that drives them

use crate::{EnvelopeStep, Ym2413};

const NOISE_SEED: u32 = 0xFFFF;
const NOISE_TAPS: u32 = 0x800_3020;

pub(crate) const BASS_DRUM_MODULATOR: usize = 12;
pub(crate) const BASS_DRUM_CARRIER: usize = 13;
pub(crate) const HIGH_HAT: usize = 14;
pub(crate) const SNARE_DRUM: usize = 15;
pub(crate) const TOM_TOM: usize = 16;
pub(crate) const TOP_CYMBAL: usize = 17;

// Fixed log-sine indices used in place of a phase for the noisy voices
const SNARE_DRUM_INDEX: i32 = 100;
const TOP_CYMBAL_INDEX: i32 = 200;
const HIGH_HAT_NOISE_INDEX: i32 = 40;
const HIGH_HAT_TONE_INDEX: i32 = 10;
const LAST_INDEX: i32 = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NoiseGenerator {
    pub(crate) register: u32,
    pub(crate) output: bool,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self { register: NOISE_SEED, output: false }
    }
}

impl NoiseGenerator {
    #[inline]
    pub(crate) fn clock(&mut self) {
        self.register >>= 1;
        self.output = self.register & 1 != 0;
        if self.output {
            self.register ^= NOISE_TAPS;
        }
    }
}

/// Shared square-ish signal that the top cymbal and high hat derive from the two phases.
fn cymbal_high_hat_phase(high_hat_phase: i32, top_cymbal_phase: i32) -> bool {
    let cymbal_bits = top_cymbal_phase & 0x04 != 0 && top_cymbal_phase & 0x10 == 0;
    let high_hat_bits = ((high_hat_phase & 0x02 != 0) != (high_hat_phase & 0x100 != 0))
        || high_hat_phase & 0x04 != 0;
    cymbal_bits != high_hat_bits
}

impl Ym2413 {
    fn clock_rhythm_envelope(&mut self, operator: usize) {
        let sustain = self.channels[operator >> 1].sustain;
        self.operators[operator].clock_envelope(self.clock, sustain, &self.tables);
    }

    pub(crate) fn rhythm_sample(&mut self) -> i32 {
        self.bass_drum_sample()
            + self.snare_drum_sample()
            + self.tom_tom_sample()
            + self.cymbal_and_high_hat_sample()
    }

    fn bass_drum_sample(&mut self) -> i32 {
        if self.operators[BASS_DRUM_CARRIER].envelope.is_idle() {
            return 0;
        }

        self.clock_rhythm_envelope(BASS_DRUM_MODULATOR);
        self.clock_rhythm_envelope(BASS_DRUM_CARRIER);

        let tables = &*self.tables;
        let modulator_phase = self.operators[BASS_DRUM_MODULATOR].phase.advance() - 1;
        let carrier_phase = self.operators[BASS_DRUM_CARRIER].phase.advance();

        // Full sine with no feedback regardless of instrument settings
        let modulation = tables.operator_output(
            false,
            modulator_phase,
            self.operators[BASS_DRUM_MODULATOR].attenuation.total,
        );
        tables.operator_output(
            false,
            carrier_phase + modulation,
            self.operators[BASS_DRUM_CARRIER].attenuation.total,
        ) >> 3
    }

    fn snare_drum_sample(&mut self) -> i32 {
        if self.operators[SNARE_DRUM].envelope.is_idle() {
            return 0;
        }

        self.clock_rhythm_envelope(SNARE_DRUM);
        let phase = self.operators[SNARE_DRUM].phase.advance();

        let noise = self.noise.output;
        let index = match (phase & 0x100 != 0, noise) {
            (_, true) => 0,
            (true, false) => SNARE_DRUM_INDEX,
            (false, false) => LAST_INDEX - SNARE_DRUM_INDEX,
        };
        self.tables.operator_output(false, index, self.operators[SNARE_DRUM].attenuation.total) >> 3
    }

    fn tom_tom_sample(&mut self) -> i32 {
        if self.operators[TOM_TOM].envelope.is_idle() {
            return 0;
        }

        self.clock_rhythm_envelope(TOM_TOM);
        let phase = self.operators[TOM_TOM].phase.advance();
        self.tables.operator_output(false, phase, self.operators[TOM_TOM].attenuation.total) >> 3
    }

    fn cymbal_and_high_hat_sample(&mut self) -> i32 {
        let cymbal_idle = self.operators[TOP_CYMBAL].envelope.is_idle();
        let high_hat_idle = self.operators[HIGH_HAT].envelope.is_idle();
        if cymbal_idle && high_hat_idle {
            return 0;
        }

        // Both phases run whenever either voice is sounding
        let high_hat_phase = self.operators[HIGH_HAT].phase.advance();
        let top_cymbal_phase = self.operators[TOP_CYMBAL].phase.advance();
        let shared = cymbal_high_hat_phase(high_hat_phase, top_cymbal_phase);

        let mut sample = 0;

        if !cymbal_idle {
            self.clock_rhythm_envelope(TOP_CYMBAL);
            let index = if shared { TOP_CYMBAL_INDEX } else { LAST_INDEX - TOP_CYMBAL_INDEX };
            sample += self.tables.operator_output(
                false,
                index,
                self.operators[TOP_CYMBAL].attenuation.total,
            ) >> 3;
        }

        if !high_hat_idle {
            self.clock_rhythm_envelope(HIGH_HAT);
            let index = match (shared, self.noise.output) {
                (true, true) => HIGH_HAT_NOISE_INDEX,
                (true, false) => HIGH_HAT_TONE_INDEX,
                (false, true) => LAST_INDEX - HIGH_HAT_NOISE_INDEX,
                (false, false) => LAST_INDEX - HIGH_HAT_TONE_INDEX,
            };
            sample += self.tables.operator_output(
                false,
                index,
                self.operators[HIGH_HAT].attenuation.total,
            ) >> 3;
        }

        sample
    }

    pub(crate) fn set_rhythm_key_on(&mut self, operator: usize, key_on: bool) {
        let sustain = self.channels[operator >> 1].sustain;
        let operator_state = &mut self.operators[operator];
        operator_state.key_on = key_on;

        if key_on {
            operator_state.set_envelope_step(EnvelopeStep::Damp, self.clock, sustain, &self.tables);
        } else if !operator_state.envelope.is_idle() {
            operator_state.set_envelope_step(
                EnvelopeStep::Release,
                self.clock,
                sustain,
                &self.tables,
            );
        }
    }
}
