//! Operator frequency: phase increment, phase accumulator and key-scale-rate offset

use msx_common::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct PhaseGenerator {
    pub(crate) f_number: u16,
    pub(crate) block: u8,
    // Doubled frequency multiple
    pub(crate) multiplier: u32,
    pub(crate) increment: u32,
    pub(crate) counter: u32,
    pub(crate) key_scale_rate_offset: u8,
}

impl PhaseGenerator {
    pub(crate) fn update_increment(&mut self, vibrato_delta: i32) {
        let base = (i32::from(self.f_number) << 1) + vibrato_delta;
        self.increment = (((base * self.multiplier as i32) << self.block) >> 2) as u32;
    }

    pub(crate) fn update_key_scale_rate_offset(&mut self, key_scale_rate: bool) {
        self.key_scale_rate_offset = if key_scale_rate {
            (self.block << 1) | u8::from(self.f_number.bit(8))
        } else {
            self.block >> 1
        };
    }

    /// Advances the accumulator by one sample and returns the 10-bit-relevant phase.
    #[inline]
    pub(crate) fn advance(&mut self) -> i32 {
        self.counter = self.counter.wrapping_add(self.increment);
        (self.counter >> 9) as i32
    }
}
