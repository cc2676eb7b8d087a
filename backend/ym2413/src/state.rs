//! Save state snapshot of all dynamic chip state
//!
//! A snapshot holds the register file plus every value that evolves over time. Static per-operator
//! parameters are not stored; restoring replays the register file through the decoder to rebuild
//! them and then overwrites the dynamic values.

use crate::attenuation::Attenuation;
use crate::envelope::{EnvelopeStep, MAX_ENVELOPE_LEVEL};
use crate::lfo::{MAX_AM_LEVEL, VIBRATO_PHASES};
use crate::registers::{ADDRESS_MASK, REGISTER_FILE_LEN, canonical_address};
use crate::rhythm::NoiseGenerator;
use crate::tables::{DURATION_TABLE_LEN, MAX_OPERATOR_OUTPUT, NEGATIVE_FLAG};
use crate::{CHANNELS, OPERATORS, Ym2413};
use bincode::{Decode, Encode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("saved field '{field}' has length {actual}, expected {expected}")]
    LengthMismatch { field: &'static str, expected: usize, actual: usize },
    #[error("saved field '{field}' has out of range value {value} (max {max})")]
    OutOfRange { field: &'static str, value: i64, max: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ym2413State {
    pub registers: Vec<u8>,
    pub address_latch: u8,
    pub clock: u64,
    pub noise_register: u32,
    pub noise_output: bool,
    pub am_level: u8,
    pub am_increment: i8,
    pub vibrato_phase: u8,
    pub am_attenuation: Vec<u32>,
    pub key_scale_attenuation: Vec<u32>,
    pub envelope_attenuation: Vec<u32>,
    pub volume_attenuation: Vec<u32>,
    pub total_attenuation: Vec<u32>,
    pub envelope_step: Vec<EnvelopeStep>,
    pub envelope_level: Vec<u8>,
    pub envelope_level_increment: Vec<i8>,
    pub envelope_next_step: Vec<Option<EnvelopeStep>>,
    pub envelope_next_step_level: Vec<Option<u8>>,
    pub envelope_step_duration: Vec<u64>,
    pub envelope_next_increment_clock: Vec<u64>,
    pub key_scale_rate_offset: Vec<u8>,
    pub feedback_last: Vec<i32>,
    pub feedback_previous: Vec<i32>,
    pub phase_increment: Vec<u32>,
    pub phase_counter: Vec<u32>,
}

fn check_len<T>(field: &'static str, values: &[T], expected: usize) -> Result<(), StateError> {
    if values.len() != expected {
        return Err(StateError::LengthMismatch { field, expected, actual: values.len() });
    }
    Ok(())
}

fn check_max(
    field: &'static str,
    value: impl Into<i64>,
    max: impl Into<i64>,
) -> Result<(), StateError> {
    let (value, max) = (value.into(), max.into());
    if value > max {
        return Err(StateError::OutOfRange { field, value, max });
    }
    Ok(())
}

// Largest attenuation that still indexes inside the exponential table after adding a sine entry
const MAX_TOTAL_ATTENUATION: u32 = NEGATIVE_FLAG - 0x1000 - 1;

impl Ym2413State {
    /// Checks every length and range invariant without touching any chip.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first field that does not fit the chip's fixed layout.
    pub fn validate(&self) -> Result<(), StateError> {
        check_len("registers", &self.registers, REGISTER_FILE_LEN)?;
        for (field, values) in [
            ("am_attenuation", &self.am_attenuation),
            ("key_scale_attenuation", &self.key_scale_attenuation),
            ("envelope_attenuation", &self.envelope_attenuation),
            ("volume_attenuation", &self.volume_attenuation),
            ("total_attenuation", &self.total_attenuation),
            ("phase_increment", &self.phase_increment),
            ("phase_counter", &self.phase_counter),
        ] {
            check_len(field, values, OPERATORS)?;
        }
        check_len("envelope_step", &self.envelope_step, OPERATORS)?;
        check_len("envelope_level", &self.envelope_level, OPERATORS)?;
        check_len("envelope_level_increment", &self.envelope_level_increment, OPERATORS)?;
        check_len("envelope_next_step", &self.envelope_next_step, OPERATORS)?;
        check_len("envelope_next_step_level", &self.envelope_next_step_level, OPERATORS)?;
        check_len("envelope_step_duration", &self.envelope_step_duration, OPERATORS)?;
        check_len(
            "envelope_next_increment_clock",
            &self.envelope_next_increment_clock,
            OPERATORS,
        )?;
        check_len("key_scale_rate_offset", &self.key_scale_rate_offset, OPERATORS)?;
        check_len("feedback_last", &self.feedback_last, CHANNELS)?;
        check_len("feedback_previous", &self.feedback_previous, CHANNELS)?;

        check_max("address_latch", self.address_latch, ADDRESS_MASK)?;
        check_max("am_level", self.am_level, MAX_AM_LEVEL)?;
        if !matches!(self.am_increment, -1 | 1) {
            return Err(StateError::OutOfRange {
                field: "am_increment",
                value: self.am_increment.into(),
                max: 1,
            });
        }
        check_max("vibrato_phase", self.vibrato_phase, VIBRATO_PHASES - 1)?;

        for operator in 0..OPERATORS {
            check_max("envelope_level", self.envelope_level[operator], MAX_ENVELOPE_LEVEL)?;
            if let Some(level) = self.envelope_next_step_level[operator] {
                check_max("envelope_next_step_level", level, MAX_ENVELOPE_LEVEL)?;
            }
            check_max(
                "key_scale_rate_offset",
                self.key_scale_rate_offset[operator],
                (DURATION_TABLE_LEN - 1 - 15 * 4) as u8,
            )?;
            check_max(
                "total_attenuation",
                self.total_attenuation[operator],
                MAX_TOTAL_ATTENUATION,
            )?;
        }

        // Feedback history holds past modulator outputs
        for (field, values) in
            [("feedback_last", &self.feedback_last), ("feedback_previous", &self.feedback_previous)]
        {
            for &value in values {
                check_max(field, value.unsigned_abs(), MAX_OPERATOR_OUTPUT)?;
            }
        }

        Ok(())
    }
}

impl Ym2413 {
    #[must_use]
    pub fn save_state(&self) -> Ym2413State {
        let operators = &self.operators;
        Ym2413State {
            registers: self.registers.to_vec(),
            address_latch: self.address_latch,
            clock: self.clock,
            noise_register: self.noise.register,
            noise_output: self.noise.output,
            am_level: self.lfo.am_level,
            am_increment: self.lfo.am_increment,
            vibrato_phase: self.lfo.vibrato_phase,
            am_attenuation: operators.iter().map(|op| op.attenuation.am).collect(),
            key_scale_attenuation: operators.iter().map(|op| op.attenuation.key_scale).collect(),
            envelope_attenuation: operators.iter().map(|op| op.attenuation.envelope).collect(),
            volume_attenuation: operators.iter().map(|op| op.attenuation.volume).collect(),
            total_attenuation: operators.iter().map(|op| op.attenuation.total).collect(),
            envelope_step: operators.iter().map(|op| op.envelope.step).collect(),
            envelope_level: operators.iter().map(|op| op.envelope.level).collect(),
            envelope_level_increment: operators
                .iter()
                .map(|op| op.envelope.level_increment)
                .collect(),
            envelope_next_step: operators.iter().map(|op| op.envelope.next_step).collect(),
            envelope_next_step_level: operators
                .iter()
                .map(|op| op.envelope.next_step_level)
                .collect(),
            envelope_step_duration: operators.iter().map(|op| op.envelope.step_duration).collect(),
            envelope_next_increment_clock: operators
                .iter()
                .map(|op| op.envelope.next_increment_clock)
                .collect(),
            key_scale_rate_offset: operators
                .iter()
                .map(|op| op.phase.key_scale_rate_offset)
                .collect(),
            feedback_last: self.channels.iter().map(|channel| channel.feedback[0]).collect(),
            feedback_previous: self.channels.iter().map(|channel| channel.feedback[1]).collect(),
            phase_increment: operators.iter().map(|op| op.phase.increment).collect(),
            phase_counter: operators.iter().map(|op| op.phase.counter).collect(),
        }
    }

    /// Restores a snapshot taken with [`Self::save_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not fit the chip layout; the chip is left unchanged
    /// in that case.
    pub fn load_state(&mut self, state: &Ym2413State) -> Result<(), StateError> {
        state.validate()?;

        self.reset();

        // Rebuild static parameters through the decoder before overwriting dynamic state.
        // Alias slots are never written, so only canonical addresses are replayed.
        for (address, &value) in state.registers.iter().enumerate() {
            let address = address as u8;
            if canonical_address(address) == address {
                self.write_register(address, value);
            }
        }

        self.address_latch = state.address_latch;
        self.clock = state.clock;
        self.noise = NoiseGenerator { register: state.noise_register, output: state.noise_output };
        self.lfo.am_level = state.am_level;
        self.lfo.am_increment = state.am_increment;
        self.lfo.vibrato_phase = state.vibrato_phase;

        for (i, operator) in self.operators.iter_mut().enumerate() {
            operator.attenuation = Attenuation {
                am: state.am_attenuation[i],
                key_scale: state.key_scale_attenuation[i],
                envelope: state.envelope_attenuation[i],
                volume: state.volume_attenuation[i],
                total: state.total_attenuation[i],
            };

            let envelope = &mut operator.envelope;
            envelope.step = state.envelope_step[i];
            envelope.level = state.envelope_level[i];
            envelope.level_increment = state.envelope_level_increment[i];
            envelope.next_step = state.envelope_next_step[i];
            envelope.next_step_level = state.envelope_next_step_level[i];
            envelope.step_duration = state.envelope_step_duration[i];
            envelope.next_increment_clock = state.envelope_next_increment_clock[i];

            operator.phase.key_scale_rate_offset = state.key_scale_rate_offset[i];
            operator.phase.increment = state.phase_increment[i];
            operator.phase.counter = state.phase_counter[i];
        }

        for (i, channel) in self.channels.iter_mut().enumerate() {
            channel.feedback = [state.feedback_last[i], state.feedback_previous[i]];
        }

        log::debug!("Loaded YM2413 state at clock {}", self.clock);

        Ok(())
    }
}
