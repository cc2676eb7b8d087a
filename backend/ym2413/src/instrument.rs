use msx_common::num::GetBit;

/// Feedback shift value meaning the modulator has no self-feedback
pub const FEEDBACK_DISABLED: u8 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct OperatorSettings {
    pub(crate) tremolo: bool,
    pub(crate) vibrato: bool,
    pub(crate) sustained_tone: bool,
    pub(crate) key_scale_rate: bool,
    pub(crate) multiple: u8,
    pub(crate) key_scale_level: u8,
    pub(crate) half_wave: bool,
    pub(crate) attack_rate: u8,
    pub(crate) decay_rate: u8,
    pub(crate) sustain_level: u8,
    pub(crate) release_rate: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Instrument {
    pub(crate) modulator: OperatorSettings,
    pub(crate) carrier: OperatorSettings,
    pub(crate) modulator_total_level: u8,
    pub(crate) feedback_shift: u8,
}

impl Instrument {
    // AM and vibrato are taken from byte 0 for both slots
    pub(crate) fn from_patch(patch: [u8; 8]) -> Self {
        let feedback = patch[3] & 0x07;

        Self {
            modulator: OperatorSettings {
                tremolo: patch[0].bit(7),
                vibrato: patch[0].bit(6),
                sustained_tone: patch[0].bit(5),
                key_scale_rate: patch[0].bit(4),
                multiple: patch[0] & 0x0F,
                key_scale_level: patch[2] >> 6,
                half_wave: patch[3].bit(3),
                attack_rate: patch[4] >> 4,
                decay_rate: patch[4] & 0x0F,
                sustain_level: patch[6] >> 4,
                release_rate: patch[6] & 0x0F,
            },
            carrier: OperatorSettings {
                tremolo: patch[0].bit(7),
                vibrato: patch[0].bit(6),
                sustained_tone: patch[1].bit(5),
                key_scale_rate: patch[1].bit(4),
                multiple: patch[1] & 0x0F,
                key_scale_level: patch[3] >> 6,
                half_wave: patch[3].bit(4),
                attack_rate: patch[5] >> 4,
                decay_rate: patch[5] & 0x0F,
                sustain_level: patch[7] >> 4,
                release_rate: patch[7] & 0x0F,
            },
            modulator_total_level: patch[2] & 0x3F,
            feedback_shift: if feedback != 0 { 8 - feedback } else { FEEDBACK_DISABLED },
        }
    }
}
