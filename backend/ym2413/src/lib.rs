//! Yamaha YM2413 (OPLL) FM synthesis sound chip, as found in the MSX-MUSIC cartridge
//!
//! The chip is stepped one output sample (72 master clocks) at a time. Register writes only
//! recompute the per-operator values affected by the bits that actually changed, and the sample
//! loop combines each operator's precomputed attenuation with lookups into log-sine and
//! exponential tables that are shared between chip instances.

mod attenuation;
pub mod debug;
mod envelope;
mod instrument;
mod lfo;
mod operator;
mod phase;
pub mod ports;
mod registers;
mod rhythm;
pub mod state;
pub mod tables;

#[cfg(test)]
mod tests;

use crate::instrument::FEEDBACK_DISABLED;
use crate::lfo::Lfo;
use crate::operator::Operator;
use crate::rhythm::NoiseGenerator;
use msx_music_config::{MsxMusicConfig, YM2413_CLOCK_DIVIDER};
use std::sync::Arc;

pub use envelope::EnvelopeStep;
pub use ports::MsxMusic;
pub use registers::REGISTER_FILE_LEN;
pub use state::{StateError, Ym2413State};
pub use tables::Ym2413Tables;

pub const CHANNELS: usize = 9;
pub const OPERATORS: usize = 2 * CHANNELS;

// Channels 6-8 are taken over by the rhythm voices when rhythm mode is on
const MELODIC_CHANNELS_IN_RHYTHM_MODE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Channel {
    pub(crate) sustain: bool,
    pub(crate) instrument: u8,
    pub(crate) feedback_shift: u8,
    // Last two modulator outputs, most recent first
    pub(crate) feedback: [i32; 2],
}

impl Default for Channel {
    fn default() -> Self {
        Self { sustain: false, instrument: 0, feedback_shift: FEEDBACK_DISABLED, feedback: [0; 2] }
    }
}

#[inline]
pub(crate) const fn operator_indices(channel: usize) -> (usize, usize) {
    (channel << 1, (channel << 1) + 1)
}

#[derive(Debug, Clone)]
pub struct Ym2413 {
    tables: Arc<Ym2413Tables>,
    base_clock_hz: u32,
    registers: [u8; REGISTER_FILE_LEN],
    address_latch: u8,
    rhythm_mode: bool,
    clock: u64,
    lfo: Lfo,
    noise: NoiseGenerator,
    channels: [Channel; CHANNELS],
    operators: [Operator; OPERATORS],
}

impl Ym2413 {
    #[must_use]
    pub fn new(tables: Arc<Ym2413Tables>, base_clock_hz: u32) -> Self {
        let mut chip = Self {
            tables,
            base_clock_hz,
            registers: [0; REGISTER_FILE_LEN],
            address_latch: 0,
            rhythm_mode: false,
            clock: 0,
            lfo: Lfo::default(),
            noise: NoiseGenerator::default(),
            channels: [Channel::default(); CHANNELS],
            operators: [Operator::default(); OPERATORS],
        };
        chip.reset();
        chip
    }

    #[must_use]
    pub fn from_config(config: &MsxMusicConfig) -> Self {
        Self::new(Ym2413Tables::shared(), config.base_clock_hz)
    }

    /// Returns the chip to its power-on state. Lookup tables are left untouched.
    pub fn reset(&mut self) {
        log::debug!("Resetting YM2413");

        self.registers = [0; REGISTER_FILE_LEN];
        self.address_latch = 0;
        self.rhythm_mode = false;
        self.clock = 0;
        self.lfo = Lfo::default();
        self.noise = NoiseGenerator::default();
        self.channels = [Channel::default(); CHANNELS];
        self.operators = [Operator::default(); OPERATORS];

        // Derive every channel from the zeroed register file: user instrument, volume 0
        for channel in 0..CHANNELS {
            self.set_instrument(channel, 0);

            let (modulator, carrier) = operator_indices(channel);
            self.operators[carrier].set_volume(0);
            self.operators[modulator].update_envelope_attenuation();
            self.operators[carrier].update_envelope_attenuation();
        }
    }

    #[inline]
    #[must_use]
    pub fn base_clock_hz(&self) -> u32 {
        self.base_clock_hz
    }

    #[inline]
    #[must_use]
    pub fn sample_rate_hz(&self) -> f64 {
        f64::from(self.base_clock_hz) / f64::from(YM2413_CLOCK_DIVIDER)
    }

    #[inline]
    #[must_use]
    pub fn tables(&self) -> &Arc<Ym2413Tables> {
        &self.tables
    }

    /// Advances the chip by one output clock and returns the mixed signed sample.
    pub fn next_sample(&mut self) -> i32 {
        self.clock += 1;

        let am_changed = self.lfo.clock_am(self.clock);
        let vibrato_changed = am_changed && self.lfo.clock_vibrato(self.clock);

        let melodic_channels =
            if self.rhythm_mode { MELODIC_CHANNELS_IN_RHYTHM_MODE } else { CHANNELS };

        let mut sample = 0;
        for channel in (0..melodic_channels).rev() {
            sample += self.melodic_channel_sample(channel, am_changed, vibrato_changed);
        }

        if self.rhythm_mode {
            self.noise.clock();
            sample += self.rhythm_sample();
        }

        sample
    }

    fn melodic_channel_sample(
        &mut self,
        channel: usize,
        am_changed: bool,
        vibrato_changed: bool,
    ) -> i32 {
        let (modulator, carrier) = operator_indices(channel);
        if self.operators[carrier].envelope.is_idle() {
            return 0;
        }

        if am_changed {
            self.refresh_modulation(modulator, vibrato_changed);
            self.refresh_modulation(carrier, vibrato_changed);
        }

        let tables = &*self.tables;
        let clock = self.clock;
        let sustain = self.channels[channel].sustain;

        if !self.operators[modulator].envelope.is_idle() {
            self.operators[modulator].clock_envelope(clock, sustain, tables);
        }
        self.operators[carrier].clock_envelope(clock, sustain, tables);

        // The modulator is sampled one phase step behind the carrier
        let modulator_phase = self.operators[modulator].phase.advance() - 1;
        let carrier_phase = self.operators[carrier].phase.advance();

        let channel = &mut self.channels[channel];
        let modulation = if channel.feedback_shift < FEEDBACK_DISABLED {
            let feedback =
                ((channel.feedback[0] + channel.feedback[1]) >> 1) >> channel.feedback_shift;
            let output = self.operators[modulator].output(modulator_phase + feedback, tables);
            channel.feedback = [output, channel.feedback[0]];
            output
        } else {
            self.operators[modulator].output(modulator_phase, tables)
        };

        self.operators[carrier].output(carrier_phase + modulation, tables) >> 4
    }

    // AM and vibrato only need recomputing on the clocks where the LFOs stepped
    fn refresh_modulation(&mut self, operator: usize, vibrato_changed: bool) {
        let operator_state = &mut self.operators[operator];
        if operator_state.settings.tremolo {
            operator_state.update_am_attenuation(self.lfo.am_level);
        }
        if vibrato_changed && operator_state.settings.vibrato {
            operator_state.update_frequency(self.lfo.vibrato_phase, &self.tables);
        }
    }
}
