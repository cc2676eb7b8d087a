//! Per-operator envelope state machine
//!
//! The envelope is modeled as a sequence of linear steps: each step adds a fixed increment to the
//! level every `step_duration` clocks until the level reaches the trigger level of the step, at
//! which point the next step begins.

use crate::tables::{NEVER, Ym2413Tables};
use bincode::{Decode, Encode};

pub const MAX_ENVELOPE_LEVEL: u8 = 128;

const DAMP_RATE: u8 = 12;
const CHANNEL_SUSTAIN_RELEASE_RATE: u8 = 5;
const PERCUSSIVE_RELEASE_RATE: u8 = 7;

const ATTACK_INCREMENT: i8 = -8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnvelopeStep {
    #[default]
    Idle,
    Damp,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Instrument rates plus the frequency-dependent rate offset needed to schedule a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct EnvelopeRates {
    pub(crate) attack_rate: u8,
    pub(crate) decay_rate: u8,
    pub(crate) sustain_level: u8,
    pub(crate) release_rate: u8,
    pub(crate) sustained_tone: bool,
    pub(crate) key_scale_rate_offset: u8,
}

impl EnvelopeRates {
    fn table_index(self, rate: u8) -> usize {
        (usize::from(rate) << 2) + usize::from(self.key_scale_rate_offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvelopeTick {
    Hold,
    LevelChanged,
    Advance(EnvelopeStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnvelopeGenerator {
    pub(crate) step: EnvelopeStep,
    pub(crate) level: u8,
    pub(crate) level_increment: i8,
    pub(crate) next_step: Option<EnvelopeStep>,
    pub(crate) next_step_level: Option<u8>,
    pub(crate) step_duration: u64,
    pub(crate) next_increment_clock: u64,
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self {
            step: EnvelopeStep::Idle,
            level: MAX_ENVELOPE_LEVEL,
            level_increment: 0,
            next_step: None,
            next_step_level: None,
            step_duration: NEVER,
            next_increment_clock: NEVER,
        }
    }
}

impl EnvelopeGenerator {
    pub(crate) fn enter(
        &mut self,
        step: EnvelopeStep,
        clock: u64,
        rates: EnvelopeRates,
        channel_sustain: bool,
        tables: &Ym2413Tables,
    ) {
        self.step = step;

        match step {
            EnvelopeStep::Damp => {
                let duration = tables.decay_duration(rates.table_index(DAMP_RATE));
                self.schedule(clock, duration, 1, Some((MAX_ENVELOPE_LEVEL, EnvelopeStep::Attack)));
            }
            EnvelopeStep::Attack => {
                let duration = tables.attack_duration(rates.table_index(rates.attack_rate));
                self.schedule(clock, duration, ATTACK_INCREMENT, Some((0, EnvelopeStep::Decay)));
            }
            EnvelopeStep::Decay => {
                let duration = tables.decay_duration(rates.table_index(rates.decay_rate));
                let sustain_level = rates.sustain_level << 3;
                self.schedule(clock, duration, 1, Some((sustain_level, EnvelopeStep::Sustain)));
            }
            EnvelopeStep::Sustain if rates.sustained_tone => {
                self.schedule(clock, NEVER, 0, None);
            }
            EnvelopeStep::Sustain => {
                // Percussive tones keep decaying at the release rate while the key is held
                let duration = tables.decay_duration(rates.table_index(rates.release_rate));
                self.schedule(clock, duration, 1, Some((MAX_ENVELOPE_LEVEL, EnvelopeStep::Idle)));
            }
            EnvelopeStep::Release => {
                let rate = if channel_sustain {
                    CHANNEL_SUSTAIN_RELEASE_RATE
                } else if rates.sustained_tone {
                    rates.release_rate
                } else {
                    PERCUSSIVE_RELEASE_RATE
                };
                let duration = tables.decay_duration(rates.table_index(rate));
                self.schedule(clock, duration, 1, Some((MAX_ENVELOPE_LEVEL, EnvelopeStep::Idle)));
            }
            EnvelopeStep::Idle => {
                self.level = MAX_ENVELOPE_LEVEL;
                self.schedule(clock, NEVER, 0, None);
            }
        }
    }

    fn schedule(
        &mut self,
        clock: u64,
        duration: u64,
        increment: i8,
        next: Option<(u8, EnvelopeStep)>,
    ) {
        self.step_duration = duration;
        self.next_increment_clock = clock.saturating_add(duration);
        self.level_increment = increment;
        self.next_step_level = next.map(|(level, _)| level);
        self.next_step = next.map(|(_, step)| step);
    }

    pub(crate) fn clock(&mut self, clock: u64) -> EnvelopeTick {
        if let (Some(trigger_level), Some(next_step)) = (self.next_step_level, self.next_step) {
            if self.level == trigger_level {
                return EnvelopeTick::Advance(next_step);
            }
        }

        if clock < self.next_increment_clock {
            return EnvelopeTick::Hold;
        }

        self.next_increment_clock = self.next_increment_clock.saturating_add(self.step_duration);
        let level = i16::from(self.level) + i16::from(self.level_increment);
        self.level = level.clamp(0, MAX_ENVELOPE_LEVEL.into()) as u8;
        EnvelopeTick::LevelChanged
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_idle(&self) -> bool {
        self.step == EnvelopeStep::Idle
    }

    /// Attenuation contribution of the current level; level 128 is forced to full silence.
    #[inline]
    #[must_use]
    pub(crate) fn attenuation(&self) -> u32 {
        let level = if self.level == MAX_ENVELOPE_LEVEL { 256 } else { u32::from(self.level) };
        level << 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> std::sync::Arc<Ym2413Tables> {
        Ym2413Tables::shared()
    }

    fn run_until_tick(envelope: &mut EnvelopeGenerator, clock: &mut u64) -> EnvelopeStep {
        for _ in 0..1_000_000 {
            *clock += 1;
            if let EnvelopeTick::Advance(next) = envelope.clock(*clock) {
                return next;
            }
        }
        panic!("envelope never advanced from {:?}", envelope.step);
    }

    #[test]
    fn damp_then_fast_attack() {
        let tables = tables();
        let rates = EnvelopeRates { attack_rate: 15, decay_rate: 0, ..EnvelopeRates::default() };
        let mut envelope = EnvelopeGenerator::default();
        let mut clock = 0;

        envelope.enter(EnvelopeStep::Damp, clock, rates, false, &tables);
        assert_eq!(envelope.level, MAX_ENVELOPE_LEVEL);
        assert_eq!(envelope.clock(1), EnvelopeTick::Advance(EnvelopeStep::Attack));

        clock = 1;
        envelope.enter(EnvelopeStep::Attack, clock, rates, false, &tables);
        for expected in (0..16).rev() {
            clock += 1;
            assert_eq!(envelope.clock(clock), EnvelopeTick::LevelChanged);
            assert_eq!(envelope.level, expected * 8);
        }
        assert_eq!(run_until_tick(&mut envelope, &mut clock), EnvelopeStep::Decay);
    }

    #[test]
    fn sustained_tone_holds_at_sustain_level() {
        let tables = tables();
        let rates = EnvelopeRates {
            decay_rate: 15,
            sustain_level: 4,
            sustained_tone: true,
            ..EnvelopeRates::default()
        };
        let mut envelope = EnvelopeGenerator { level: 0, ..EnvelopeGenerator::default() };
        let mut clock = 0;

        envelope.enter(EnvelopeStep::Decay, clock, rates, false, &tables);
        assert_eq!(run_until_tick(&mut envelope, &mut clock), EnvelopeStep::Sustain);
        assert_eq!(envelope.level, 32);

        envelope.enter(EnvelopeStep::Sustain, clock, rates, false, &tables);
        for _ in 0..10_000 {
            clock += 1;
            assert_eq!(envelope.clock(clock), EnvelopeTick::Hold);
        }
        assert_eq!(envelope.level, 32);
    }

    #[test]
    fn percussive_sustain_decays_to_idle_while_held() {
        let tables = tables();
        let rates =
            EnvelopeRates { sustain_level: 4, release_rate: 15, ..EnvelopeRates::default() };
        let mut envelope = EnvelopeGenerator { level: 32, ..EnvelopeGenerator::default() };
        let mut clock = 0;

        envelope.enter(EnvelopeStep::Sustain, clock, rates, false, &tables);
        assert_eq!(envelope.step_duration, tables.decay_duration(60));
        assert_eq!(envelope.level_increment, 1);

        assert_eq!(run_until_tick(&mut envelope, &mut clock), EnvelopeStep::Idle);
        assert_eq!(envelope.level, MAX_ENVELOPE_LEVEL);
        assert_eq!(clock, 96 + 1, "one level per clock, then the step change");
    }

    #[test]
    fn release_rate_selection() {
        let tables = tables();
        let rates = EnvelopeRates { release_rate: 15, ..EnvelopeRates::default() };
        let mut envelope = EnvelopeGenerator { level: 0, ..EnvelopeGenerator::default() };

        envelope.enter(EnvelopeStep::Release, 0, rates, false, &tables);
        assert_eq!(
            envelope.step_duration,
            tables.decay_duration(PERCUSSIVE_RELEASE_RATE as usize * 4)
        );

        envelope.enter(EnvelopeStep::Release, 0, rates, true, &tables);
        assert_eq!(
            envelope.step_duration,
            tables.decay_duration(CHANNEL_SUSTAIN_RELEASE_RATE as usize * 4)
        );

        let sustained = EnvelopeRates { sustained_tone: true, ..rates };
        envelope.enter(EnvelopeStep::Release, 0, sustained, false, &tables);
        assert_eq!(envelope.step_duration, tables.decay_duration(60));
        assert_eq!(envelope.next_step, Some(EnvelopeStep::Idle));
    }

    #[test]
    fn idle_forces_silence() {
        let tables = tables();
        let mut envelope = EnvelopeGenerator { level: 17, ..EnvelopeGenerator::default() };
        envelope.enter(EnvelopeStep::Idle, 100, EnvelopeRates::default(), false, &tables);

        assert!(envelope.is_idle());
        assert_eq!(envelope.attenuation(), 256 << 4);
        assert_eq!(envelope.clock(u64::MAX - 1), EnvelopeTick::Hold);
    }
}
