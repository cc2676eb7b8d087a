//! Global amplitude (AM) and frequency (vibrato) modulation oscillators

const AM_PERIOD_MASK: u64 = 511;
const VIBRATO_PERIOD_MASK: u64 = 1023;
pub const MAX_AM_LEVEL: u8 = 13;
pub const VIBRATO_PHASES: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lfo {
    pub(crate) am_level: u8,
    pub(crate) am_increment: i8,
    pub(crate) vibrato_phase: u8,
}

impl Default for Lfo {
    fn default() -> Self {
        Self { am_level: 0, am_increment: -1, vibrato_phase: 0 }
    }
}

impl Lfo {
    /// Steps the AM level every 512 clocks, bouncing between 0 and 13. Returns whether it stepped.
    pub(crate) fn clock_am(&mut self, clock: u64) -> bool {
        if clock & AM_PERIOD_MASK != 0 {
            return false;
        }

        if self.am_level == 0 || self.am_level == MAX_AM_LEVEL {
            self.am_increment = -self.am_increment;
        }
        self.am_level = self.am_level.wrapping_add_signed(self.am_increment);
        true
    }

    /// Moves to the next vibrato phase every 1024 clocks. Returns whether the phase changed.
    pub(crate) fn clock_vibrato(&mut self, clock: u64) -> bool {
        if clock & VIBRATO_PERIOD_MASK != 0 {
            return false;
        }

        self.vibrato_phase = ((clock >> 10) % u64::from(VIBRATO_PHASES)) as u8;
        true
    }
}
