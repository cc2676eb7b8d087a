//! Read-only views of internal chip state for debuggers and tests

use crate::envelope::EnvelopeStep;
use crate::registers::REGISTER_FILE_LEN;
use crate::{CHANNELS, OPERATORS, Ym2413};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorView {
    pub key_on: bool,
    pub volume: u8,
    pub f_number: u16,
    pub block: u8,
    pub envelope_step: EnvelopeStep,
    pub envelope_level: u8,
    pub next_envelope_step: Option<EnvelopeStep>,
    pub am_attenuation: u32,
    pub key_scale_attenuation: u32,
    pub envelope_attenuation: u32,
    pub volume_attenuation: u32,
    pub total_attenuation: u32,
    pub phase_increment: u32,
    pub phase_counter: u32,
    pub key_scale_rate_offset: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelView {
    pub instrument: u8,
    pub sustain: bool,
    pub feedback_shift: u8,
    pub feedback: [i32; 2],
}

impl Ym2413 {
    #[must_use]
    pub fn operator_view(&self, operator: usize) -> Option<OperatorView> {
        let op = self.operators.get(operator)?;
        Some(OperatorView {
            key_on: op.key_on,
            volume: op.volume,
            f_number: op.phase.f_number,
            block: op.phase.block,
            envelope_step: op.envelope.step,
            envelope_level: op.envelope.level,
            next_envelope_step: op.envelope.next_step,
            am_attenuation: op.attenuation.am,
            key_scale_attenuation: op.attenuation.key_scale,
            envelope_attenuation: op.attenuation.envelope,
            volume_attenuation: op.attenuation.volume,
            total_attenuation: op.attenuation.total,
            phase_increment: op.phase.increment,
            phase_counter: op.phase.counter,
            key_scale_rate_offset: op.phase.key_scale_rate_offset,
        })
    }

    #[must_use]
    pub fn channel_view(&self, channel: usize) -> Option<ChannelView> {
        let channel = self.channels.get(channel)?;
        Some(ChannelView {
            instrument: channel.instrument,
            sustain: channel.sustain,
            feedback_shift: channel.feedback_shift,
            feedback: channel.feedback,
        })
    }

    pub fn operator_views(&self) -> impl Iterator<Item = OperatorView> + '_ {
        (0..OPERATORS).filter_map(|operator| self.operator_view(operator))
    }

    pub fn channel_views(&self) -> impl Iterator<Item = ChannelView> + '_ {
        (0..CHANNELS).filter_map(|channel| self.channel_view(channel))
    }

    #[inline]
    #[must_use]
    pub fn registers(&self) -> &[u8; REGISTER_FILE_LEN] {
        &self.registers
    }

    #[inline]
    #[must_use]
    pub fn address_latch(&self) -> u8 {
        self.address_latch
    }

    #[inline]
    #[must_use]
    pub fn rhythm_mode_enabled(&self) -> bool {
        self.rhythm_mode
    }

    #[inline]
    #[must_use]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    #[inline]
    #[must_use]
    pub fn am_level(&self) -> u8 {
        self.lfo.am_level
    }

    #[inline]
    #[must_use]
    pub fn vibrato_phase(&self) -> u8 {
        self.lfo.vibrato_phase
    }

    #[inline]
    #[must_use]
    pub fn noise_output(&self) -> bool {
        self.noise.output
    }
}
