//! Operator attenuation, kept as four independently updated terms plus their sum

/// Carrier volume 15 is treated as 30 so that it reaches full silence
const MUTED_VOLUME: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attenuation {
    pub(crate) am: u32,
    pub(crate) key_scale: u32,
    pub(crate) envelope: u32,
    pub(crate) volume: u32,
    pub(crate) total: u32,
}

impl Default for Attenuation {
    fn default() -> Self {
        let mut attenuation =
            Self { am: 0, key_scale: 0, envelope: 256 << 4, volume: 0, total: 0 };
        attenuation.recombine();
        attenuation
    }
}

impl Attenuation {
    #[inline]
    fn recombine(&mut self) {
        self.total = self.am + self.key_scale + self.envelope + self.volume;
    }

    pub(crate) fn set_am(&mut self, enabled: bool, am_level: u8) {
        self.am = if enabled { u32::from(am_level) << 4 } else { 0 };
        self.recombine();
    }

    pub(crate) fn set_key_scale(&mut self, key_scale_level: u32) {
        self.key_scale = key_scale_level << 4;
        self.recombine();
    }

    pub(crate) fn set_envelope(&mut self, envelope_attenuation: u32) {
        self.envelope = envelope_attenuation;
        self.recombine();
    }

    /// Modulators are attenuated by the instrument total level in 0.75 dB units
    pub(crate) fn set_total_level(&mut self, total_level: u8) {
        self.volume = u32::from(total_level) << 5;
        self.recombine();
    }

    /// Carriers and rhythm slots are attenuated by the 4-bit volume in 3 dB units
    pub(crate) fn set_volume(&mut self, volume: u8) {
        let volume = if volume == 15 { MUTED_VOLUME } else { u32::from(volume) };
        self.volume = volume << 7;
        self.recombine();
    }
}
