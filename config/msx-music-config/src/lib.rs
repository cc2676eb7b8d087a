use bincode::{Decode, Encode};

/// Master clock fed to the MSX-MUSIC cartridge, in Hz
pub const MSX_BASE_CLOCK_HZ: u32 = 3_584_160;

/// The YM2413 produces one sample every 72 master clocks
pub const YM2413_CLOCK_DIVIDER: u32 = 72;

pub const DEFAULT_ADDRESS_PORT: u8 = 0x7C;
pub const DEFAULT_DATA_PORT: u8 = 0x7D;

// 80% of full scale spread over 9 channels, with the carrier output in 1/256 steps
pub const DEFAULT_OUTPUT_VOLUME: f64 = 0.80 / 9.0 / 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MsxMusicConfig {
    pub base_clock_hz: u32,
    pub address_port: u8,
    pub data_port: u8,
    /// Multiplier applied to raw chip samples to bring them into -1.0..=1.0
    pub output_volume: f64,
}

impl Default for MsxMusicConfig {
    fn default() -> Self {
        Self {
            base_clock_hz: MSX_BASE_CLOCK_HZ,
            address_port: DEFAULT_ADDRESS_PORT,
            data_port: DEFAULT_DATA_PORT,
            output_volume: DEFAULT_OUTPUT_VOLUME,
        }
    }
}

impl MsxMusicConfig {
    #[inline]
    #[must_use]
    pub fn sample_rate_hz(&self) -> f64 {
        f64::from(self.base_clock_hz) / f64::from(YM2413_CLOCK_DIVIDER)
    }
}
