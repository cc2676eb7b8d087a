use crate::attenuation::Attenuation;
use crate::envelope::{EnvelopeGenerator, EnvelopeRates, EnvelopeStep, EnvelopeTick};
use crate::instrument::OperatorSettings;
use crate::phase::PhaseGenerator;
use crate::tables::Ym2413Tables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Operator {
    pub(crate) settings: OperatorSettings,
    // Only meaningful for modulators
    pub(crate) total_level: u8,
    pub(crate) volume: u8,
    pub(crate) key_on: bool,
    pub(crate) phase: PhaseGenerator,
    pub(crate) envelope: EnvelopeGenerator,
    pub(crate) attenuation: Attenuation,
}

impl Operator {
    pub(crate) fn load_settings(&mut self, settings: OperatorSettings, tables: &Ym2413Tables) {
        self.settings = settings;
        self.phase.multiplier = tables.multiplier(settings.multiple);
    }

    fn envelope_rates(&self) -> EnvelopeRates {
        EnvelopeRates {
            attack_rate: self.settings.attack_rate,
            decay_rate: self.settings.decay_rate,
            sustain_level: self.settings.sustain_level,
            release_rate: self.settings.release_rate,
            sustained_tone: self.settings.sustained_tone,
            key_scale_rate_offset: self.phase.key_scale_rate_offset,
        }
    }

    pub(crate) fn set_envelope_step(
        &mut self,
        step: EnvelopeStep,
        clock: u64,
        channel_sustain: bool,
        tables: &Ym2413Tables,
    ) {
        self.envelope.enter(step, clock, self.envelope_rates(), channel_sustain, tables);
        if step == EnvelopeStep::Attack {
            self.phase.counter = 0;
        }
    }

    pub(crate) fn clock_envelope(
        &mut self,
        clock: u64,
        channel_sustain: bool,
        tables: &Ym2413Tables,
    ) {
        match self.envelope.clock(clock) {
            EnvelopeTick::Advance(next_step) => {
                self.set_envelope_step(next_step, clock, channel_sustain, tables);
            }
            EnvelopeTick::LevelChanged => self.update_envelope_attenuation(),
            EnvelopeTick::Hold => {}
        }
    }

    pub(crate) fn update_envelope_attenuation(&mut self) {
        self.attenuation.set_envelope(self.envelope.attenuation());
    }

    pub(crate) fn update_am_attenuation(&mut self, am_level: u8) {
        self.attenuation.set_am(self.settings.tremolo, am_level);
    }

    /// Recomputes phase increment, key scale level and key scale rate offset.
    pub(crate) fn update_frequency(&mut self, vibrato_phase: u8, tables: &Ym2413Tables) {
        let vibrato_delta = if self.settings.vibrato {
            tables.vibrato_delta(self.phase.f_number, vibrato_phase)
        } else {
            0
        };
        self.phase.update_increment(vibrato_delta);

        let key_scale_level = tables.key_scale_level(
            self.settings.key_scale_level,
            self.phase.block,
            self.phase.f_number,
        );
        self.attenuation.set_key_scale(key_scale_level);

        self.phase.update_key_scale_rate_offset(self.settings.key_scale_rate);
    }

    pub(crate) fn update_total_level_attenuation(&mut self) {
        self.attenuation.set_total_level(self.total_level);
    }

    pub(crate) fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        self.attenuation.set_volume(volume);
    }

    #[inline]
    pub(crate) fn output(&self, phase: i32, tables: &Ym2413Tables) -> i32 {
        tables.operator_output(self.settings.half_wave, phase, self.attenuation.total)
    }
}
