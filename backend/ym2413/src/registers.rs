//! Register file and write decoding
//!
//! Every write is compared against the last value written to the same address, and only the
//! state derived from the changed bits is recomputed.

use crate::instrument::Instrument;
use crate::rhythm::{
    BASS_DRUM_CARRIER, BASS_DRUM_MODULATOR, HIGH_HAT, SNARE_DRUM, TOM_TOM, TOP_CYMBAL,
};
use crate::tables::{BASS_DRUM_INSTRUMENT, SNARE_HIGH_HAT_INSTRUMENT, TOM_CYMBAL_INSTRUMENT};
use crate::{CHANNELS, EnvelopeStep, MELODIC_CHANNELS_IN_RHYTHM_MODE, Ym2413, operator_indices};
use msx_common::num::{GetBit, U16Ext};

/// The register address space is 6 bits wide
pub const REGISTER_FILE_LEN: usize = 0x40;
pub const ADDRESS_MASK: u8 = 0x3F;

const USER_INSTRUMENT_LAST: u8 = 0x07;
const RHYTHM_CONTROL: u8 = 0x0E;

// $0E
const RHYTHM_MODE_BIT: u8 = 5;
const BASS_DRUM_KEY_BIT: u8 = 4;
const SNARE_DRUM_KEY_BIT: u8 = 3;
const TOM_TOM_KEY_BIT: u8 = 2;
const TOP_CYMBAL_KEY_BIT: u8 = 1;
const HIGH_HAT_KEY_BIT: u8 = 0;

// $20-$2F
const SUSTAIN_BIT: u8 = 5;
const KEY_ON_BIT: u8 = 4;
const F_NUMBER_HIGH_BIT: u8 = 0;
const BLOCK_MASK: u8 = 0x0E;
const FREQUENCY_MASK: u8 = 0x0F;

// $30-$3F
const INSTRUMENT_MASK: u8 = 0xF0;
const VOLUME_MASK: u8 = 0x0F;

// Addresses $x9-$xF alias channels 0-6
fn channel_for_address(address: u8) -> usize {
    let channel = usize::from(address & 0x0F);
    if channel >= CHANNELS { channel - CHANNELS } else { channel }
}

// Channel registers share one mirror slot with their aliases
pub(crate) fn canonical_address(address: u8) -> u8 {
    match address {
        0x10..=0x3F => (address & 0xF0) | channel_for_address(address) as u8,
        _ => address,
    }
}

impl Ym2413 {
    /// Latches the register address for a following [`Self::write_data`] call.
    pub fn select_register(&mut self, value: u8) {
        self.address_latch = value & ADDRESS_MASK;
    }

    pub fn write_data(&mut self, value: u8) {
        self.write_register(self.address_latch, value);
    }

    /// Writes a register directly and returns the mask of bits that changed.
    pub fn write_register(&mut self, address: u8, value: u8) -> u8 {
        let address = canonical_address(address & ADDRESS_MASK);
        let changed = self.registers[address as usize] ^ value;
        self.registers[address as usize] = value;

        log::trace!("Write to register {address:02X}: {value:02X} (changed bits {changed:02X})");

        if changed == 0 {
            return 0;
        }

        let channel = channel_for_address(address);
        match address {
            0x00..=USER_INSTRUMENT_LAST => self.reload_user_instrument_channels(),
            RHYTHM_CONTROL => self.write_rhythm_control(value, changed),
            0x10..=0x1F => self.write_f_number_low(channel, value),
            0x20..=0x2F => self.write_frequency_control(channel, value, changed),
            0x30..=0x3F => self.write_instrument_volume(channel, value, changed),
            _ => {}
        }

        changed
    }

    fn user_instrument_patch(&self) -> [u8; 8] {
        let mut patch = [0; 8];
        patch.copy_from_slice(&self.registers[..=USER_INSTRUMENT_LAST as usize]);
        patch
    }

    fn reload_user_instrument_channels(&mut self) {
        for channel in 0..CHANNELS {
            if self.channels[channel].instrument == 0 {
                self.set_instrument(channel, 0);
            }
        }
    }

    fn write_rhythm_control(&mut self, value: u8, changed: u8) {
        if changed.bit(RHYTHM_MODE_BIT) {
            self.set_rhythm_mode(value.bit(RHYTHM_MODE_BIT));
        }

        if !self.rhythm_mode {
            return;
        }

        if changed.bit(BASS_DRUM_KEY_BIT) {
            let key_on = value.bit(BASS_DRUM_KEY_BIT);
            self.set_rhythm_key_on(BASS_DRUM_MODULATOR, key_on);
            self.set_rhythm_key_on(BASS_DRUM_CARRIER, key_on);
        }

        for (bit, operator) in [
            (SNARE_DRUM_KEY_BIT, SNARE_DRUM),
            (TOM_TOM_KEY_BIT, TOM_TOM),
            (TOP_CYMBAL_KEY_BIT, TOP_CYMBAL),
            (HIGH_HAT_KEY_BIT, HIGH_HAT),
        ] {
            if changed.bit(bit) {
                self.set_rhythm_key_on(operator, value.bit(bit));
            }
        }
    }

    fn set_rhythm_mode(&mut self, enabled: bool) {
        log::debug!("Rhythm mode enabled: {enabled}");

        self.rhythm_mode = enabled;

        for channel in MELODIC_CHANNELS_IN_RHYTHM_MODE..CHANNELS {
            self.set_channel_envelope_step(channel, EnvelopeStep::Idle);

            let (modulator, carrier) = operator_indices(channel);
            self.operators[modulator].update_envelope_attenuation();
            self.operators[carrier].update_envelope_attenuation();
        }

        if enabled {
            self.set_instrument(6, BASS_DRUM_INSTRUMENT);
            self.set_instrument(7, SNARE_HIGH_HAT_INSTRUMENT);
            self.set_instrument(8, TOM_CYMBAL_INSTRUMENT);
        } else {
            for channel in MELODIC_CHANNELS_IN_RHYTHM_MODE..CHANNELS {
                let instrument = self.registers[0x30 + channel] >> 4;
                self.set_instrument(channel, instrument);
            }
        }
    }

    fn write_f_number_low(&mut self, channel: usize, value: u8) {
        let (modulator, carrier) = operator_indices(channel);
        for operator in [modulator, carrier] {
            self.operators[operator].phase.f_number.set_lsb(value);
        }
        self.update_frequency(channel);
    }

    fn write_frequency_control(&mut self, channel: usize, value: u8, changed: u8) {
        if changed.bit(SUSTAIN_BIT) {
            self.channels[channel].sustain = value.bit(SUSTAIN_BIT);
        }

        // Key on/off is applied before the new F-number and block take effect
        if changed.bit(KEY_ON_BIT) {
            self.set_key_on(channel, value.bit(KEY_ON_BIT));
        }

        let (modulator, carrier) = operator_indices(channel);
        for operator in [modulator, carrier] {
            let phase = &mut self.operators[operator].phase;
            if changed.bit(F_NUMBER_HIGH_BIT) {
                phase.f_number.set_msb(u8::from(value.bit(F_NUMBER_HIGH_BIT)));
            }
            if changed & BLOCK_MASK != 0 {
                phase.block = value.bits(1..=3);
            }
        }

        if changed & FREQUENCY_MASK != 0 {
            self.update_frequency(channel);
        }
    }

    fn write_instrument_volume(&mut self, channel: usize, value: u8, changed: u8) {
        let (modulator, carrier) = operator_indices(channel);

        if changed & INSTRUMENT_MASK != 0 {
            if self.rhythm_mode && channel >= MELODIC_CHANNELS_IN_RHYTHM_MODE {
                // Rhythm voices take a second volume from the high nibble instead
                self.operators[modulator].set_volume(value >> 4);
            } else {
                self.set_instrument(channel, value >> 4);
            }
        }

        if changed & VOLUME_MASK != 0 {
            self.operators[carrier].set_volume(value & VOLUME_MASK);
        }
    }

    pub(crate) fn set_instrument(&mut self, channel: usize, instrument: u8) {
        let patch = match instrument {
            0 => self.user_instrument_patch(),
            _ => self.tables.rom_patch(instrument),
        };
        let instrument_settings = Instrument::from_patch(patch);

        log::trace!("Channel {channel} instrument: {instrument}");

        let channel_state = &mut self.channels[channel];
        channel_state.instrument = instrument;
        channel_state.feedback_shift = instrument_settings.feedback_shift;

        let (modulator, carrier) = operator_indices(channel);
        self.operators[modulator].load_settings(instrument_settings.modulator, &self.tables);
        self.operators[modulator].total_level = instrument_settings.modulator_total_level;
        self.operators[carrier].load_settings(instrument_settings.carrier, &self.tables);

        for operator in [modulator, carrier] {
            self.operators[operator].update_am_attenuation(self.lfo.am_level);
        }
        self.update_frequency(channel);
        self.operators[modulator].update_total_level_attenuation();
    }

    fn update_frequency(&mut self, channel: usize) {
        let (modulator, carrier) = operator_indices(channel);
        for operator in [modulator, carrier] {
            self.operators[operator].update_frequency(self.lfo.vibrato_phase, &self.tables);
        }
    }

    fn set_channel_envelope_step(&mut self, channel: usize, step: EnvelopeStep) {
        let sustain = self.channels[channel].sustain;
        let (modulator, carrier) = operator_indices(channel);
        for operator in [modulator, carrier] {
            self.operators[operator].set_envelope_step(step, self.clock, sustain, &self.tables);
        }
    }

    fn set_key_on(&mut self, channel: usize, key_on: bool) {
        let (modulator, carrier) = operator_indices(channel);
        self.operators[modulator].key_on = key_on;
        self.operators[carrier].key_on = key_on;

        if key_on {
            self.set_channel_envelope_step(channel, EnvelopeStep::Damp);
        } else if !self.operators[carrier].envelope.is_idle() {
            // Key off only releases the carrier; the modulator keeps running its envelope
            let sustain = self.channels[channel].sustain;
            self.operators[carrier].set_envelope_step(
                EnvelopeStep::Release,
                self.clock,
                sustain,
                &self.tables,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliased_channels() {
        assert_eq!(channel_for_address(0x10), 0);
        assert_eq!(channel_for_address(0x28), 8);
        assert_eq!(channel_for_address(0x39), 0);
        assert_eq!(channel_for_address(0x3F), 6);
    }

    #[test]
    fn aliases_share_canonical_slot() {
        assert_eq!(canonical_address(0x0E), 0x0E);
        assert_eq!(canonical_address(0x19), 0x10);
        assert_eq!(canonical_address(0x2F), 0x26);
        assert_eq!(canonical_address(0x38), 0x38);
        assert_eq!(canonical_address(0x39), 0x30);
    }
}
