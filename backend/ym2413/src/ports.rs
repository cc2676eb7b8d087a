//! MSX-MUSIC cartridge I/O device: two write-only ports in front of the YM2413

use crate::Ym2413;
use msx_common::audio::SampleSink;
use msx_music_config::MsxMusicConfig;

pub const SOURCE_NAME: &str = "MSX-MUSIC";

/// Value returned for reads from either port; the chip has no readable registers
pub const OPEN_BUS: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct MsxMusic {
    chip: Ym2413,
    address_port: u8,
    data_port: u8,
}

impl MsxMusic {
    #[must_use]
    pub fn new(config: &MsxMusicConfig) -> Self {
        let chip = Ym2413::from_config(config);

        log::info!(
            "MSX-MUSIC on ports {:02X}h/{:02X}h, {} Hz clock, {:.0} Hz output",
            config.address_port,
            config.data_port,
            chip.base_clock_hz(),
            chip.sample_rate_hz()
        );

        Self {
            chip,
            address_port: config.address_port,
            data_port: config.data_port,
        }
    }

    #[must_use]
    pub fn handles_port(&self, port: u8) -> bool {
        port == self.address_port || port == self.data_port
    }

    #[inline]
    #[must_use]
    pub fn read_port(&self, port: u8) -> u8 {
        if !self.handles_port(port) {
            log::warn!("MSX-MUSIC read from unmapped port {port:02X}h");
        }
        OPEN_BUS
    }

    pub fn write_port(&mut self, port: u8, value: u8) {
        if port == self.address_port {
            self.chip.select_register(value);
        } else if port == self.data_port {
            self.chip.write_data(value);
        } else {
            log::warn!("Ignoring MSX-MUSIC write to unmapped port {port:02X}h: {value:02X}");
        }
    }

    /// Generates one sample and pushes it to the sink.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the sink.
    pub fn tick<S: SampleSink>(&mut self, sink: &mut S) -> Result<(), S::Err> {
        let sample = self.chip.next_sample();
        sink.push_sample(SOURCE_NAME, sample)
    }

    pub fn reset(&mut self) {
        self.chip.reset();
    }

    #[inline]
    #[must_use]
    pub fn chip(&self) -> &Ym2413 {
        &self.chip
    }

    #[inline]
    pub fn chip_mut(&mut self) -> &mut Ym2413 {
        &mut self.chip
    }
}
