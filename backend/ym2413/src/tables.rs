//! Read-only lookup tables shared by every chip instance

use std::sync::{Arc, LazyLock};
use std::{array, fmt};

pub const SINE_TABLE_LEN: usize = 1024;
const PHASE_MASK: i32 = SINE_TABLE_LEN as i32 - 1;

/// Flag carried by log-sine entries from the negative half of the wave; the exponential table
/// negates any attenuation that has it set
pub const NEGATIVE_FLAG: u32 = 0x4000;
pub(crate) const EXP_TABLE_LEN: usize = 2 * NEGATIVE_FLAG as usize;

/// Largest magnitude the exponential table produces
pub const MAX_OPERATOR_OUTPUT: i32 = 4084;

// Any attenuation >= 16 * 256 decodes to an amplitude of 0
const HALF_SINE_SILENCE: u32 = 0x1000;

/// Duration tables are indexed by `rate * 4 + key_scale_rate_offset`
pub const DURATION_TABLE_LEN: usize = 76;

/// Step duration that never elapses
pub const NEVER: u64 = u64::MAX;

pub const ROM_INSTRUMENTS: usize = 19;
pub const BASS_DRUM_INSTRUMENT: u8 = 16;
pub const SNARE_HIGH_HAT_INSTRUMENT: u8 = 17;
pub const TOM_CYMBAL_INSTRUMENT: u8 = 18;

// Tables from https://www.smspower.org/Development/YM2413ReverseEngineeringNotes2015-03-20
#[rustfmt::skip]
const ENVELOPE_INCREMENT_TABLES: [[u8; 8]; 4] =
    [
        [0, 1, 0, 1, 0, 1, 0, 1],
        [0, 1, 0, 1, 1, 1, 0, 1],
        [0, 1, 1, 1, 0, 1, 1, 1],
        [0, 1, 1, 1, 1, 1, 1, 1],
    ];

// Multiples are doubled so that the 0.5x setting stays integral
const MULTIPLIER_TABLE: [u32; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

// Attenuation for key_scale_level=3 at block 7; lower blocks subtract 16 per octave
const KEY_SCALE_TABLE: [u32; 16] =
    [0, 48, 64, 74, 80, 86, 90, 94, 96, 100, 102, 104, 106, 108, 110, 112];

// Vibrato phase increment deltas, indexed by [f_number >> 6][vibrato_phase]
#[rustfmt::skip]
const VIBRATO_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0,  0,  0,  0],
    [0, 0, 1, 0, 0,  0, -1,  0],
    [0, 1, 2, 1, 0, -1, -2, -1],
    [0, 1, 3, 1, 0, -1, -3, -1],
    [0, 2, 4, 2, 0, -2, -4, -2],
    [0, 2, 5, 2, 0, -2, -5, -2],
    [0, 3, 6, 3, 0, -3, -6, -3],
    [0, 3, 7, 3, 0, -3, -7, -3],
];

// YM2413 built-in instrument and rhythm patches from:
//   https://siliconpr0n.org/archive/doku.php?id=vendor:yamaha:opl2#ym2413_instrument_rom
// Entry 0 is the user instrument, which lives in registers $00-$07 instead
#[rustfmt::skip]
const INSTRUMENT_ROM: [[u8; 8]; ROM_INSTRUMENTS] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $01: Violin
    [0x71, 0x61, 0x1E, 0x17, 0xD0, 0x78, 0x00, 0x17],
    // $02: Guitar
    [0x13, 0x41, 0x1A, 0x0D, 0xD8, 0xF7, 0x23, 0x13],
    // $03: Piano
    [0x13, 0x01, 0x99, 0x00, 0xF2, 0xC4, 0x11, 0x23],
    // $04: Flute
    [0x31, 0x61, 0x0E, 0x07, 0xA8, 0x64, 0x70, 0x27],
    // $05: Clarinet
    [0x32, 0x21, 0x1E, 0x06, 0xE0, 0x76, 0x00, 0x28],
    // $06: Oboe
    [0x31, 0x22, 0x16, 0x05, 0xE0, 0x71, 0x00, 0x18],
    // $07: Trumpet
    [0x21, 0x61, 0x1D, 0x07, 0x82, 0x81, 0x10, 0x07],
    // $08: Organ
    [0x23, 0x21, 0x2D, 0x14, 0xA2, 0x72, 0x00, 0x07],
    // $09: Horn
    [0x61, 0x61, 0x1B, 0x06, 0x64, 0x65, 0x10, 0x17],
    // $0A: Synthesizer
    [0x41, 0x61, 0x0B, 0x18, 0x85, 0xF7, 0x71, 0x07],
    // $0B: Harpsichord
    [0x13, 0x01, 0x83, 0x11, 0xFA, 0xE4, 0x10, 0x04],
    // $0C: Vibraphone
    [0x17, 0xC1, 0x24, 0x07, 0xF8, 0xF8, 0x22, 0x12],
    // $0D: Synth bass
    [0x61, 0x50, 0x0C, 0x05, 0xC2, 0xF5, 0x20, 0x42],
    // $0E: Acoustic bass
    [0x01, 0x01, 0x55, 0x03, 0xC9, 0x95, 0x03, 0x02],
    // $0F: Electric guitar
    [0x61, 0x41, 0x89, 0x03, 0xF1, 0xE4, 0x40, 0x13],
    // Bass drum
    [0x01, 0x01, 0x18, 0x0F, 0xDF, 0xF8, 0x6A, 0x6D],
    // Snare drum / high hat
    [0x01, 0x01, 0x00, 0x00, 0xC8, 0xD8, 0xA7, 0x68],
    // Tom-tom / top cymbal
    [0x05, 0x01, 0x00, 0x00, 0xF8, 0xAA, 0x59, 0x55],
];

pub struct Ym2413Tables {
    sine: [u32; SINE_TABLE_LEN],
    half_sine: [u32; SINE_TABLE_LEN],
    exp: Box<[i32]>,
    key_scale_levels: [[[u32; 16]; 8]; 4],
    attack_durations: [u64; DURATION_TABLE_LEN],
    decay_durations: [u64; DURATION_TABLE_LEN],
}

impl fmt::Debug for Ym2413Tables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ym2413Tables").finish_non_exhaustive()
    }
}

static SHARED_TABLES: LazyLock<Arc<Ym2413Tables>> =
    LazyLock::new(|| Arc::new(Ym2413Tables::new()));

impl Ym2413Tables {
    #[must_use]
    pub fn new() -> Self {
        // Returns the *attenuation* for a quarter wave, in log2 decibels units
        //   log-sin[i] = -log2(sin((i + 0.5) / 256 * PI/2)) * 256
        // Source: https://www.smspower.org/Development/YM2413ReverseEngineeringNotes2015-04-09
        let quarter_table: [u32; 256] = array::from_fn(|i| {
            let sine = ((i as f64 + 0.5) / 256.0 * std::f64::consts::PI / 2.0).sin();
            (-sine.log2() * 256.0).round() as u32
        });

        let sine: [u32; SINE_TABLE_LEN] = array::from_fn(|i| match i {
            0..=255 => quarter_table[i],
            256..=511 => quarter_table[255 - (i & 0xFF)],
            512..=767 => quarter_table[i & 0xFF] | NEGATIVE_FLAG,
            _ => quarter_table[255 - (i & 0xFF)] | NEGATIVE_FLAG,
        });
        let half_sine: [u32; SINE_TABLE_LEN] =
            array::from_fn(|i| if i < 512 { sine[i] } else { HALF_SINE_SILENCE });

        let pow2_table: [u32; 256] = array::from_fn(|i| {
            (2.0_f64.powf((255 - i) as f64 / 256.0) * 1024.0).round() as u32 - 1024
        });
        let exp: Box<[i32]> = (0..EXP_TABLE_LEN)
            .map(|i| {
                let attenuation = i & (NEGATIVE_FLAG as usize - 1);
                let shift = attenuation >> 8;
                let magnitude = if shift >= 16 {
                    0
                } else {
                    (((pow2_table[attenuation & 0xFF] + 1024) << 1) >> shift) as i32
                };
                if i & NEGATIVE_FLAG as usize != 0 { -magnitude } else { magnitude }
            })
            .collect();

        let key_scale_levels: [[[u32; 16]; 8]; 4] = array::from_fn(|key_scale_level| {
            array::from_fn(|block| {
                array::from_fn(|f_number_high| {
                    if key_scale_level == 0 {
                        return 0;
                    }
                    KEY_SCALE_TABLE[f_number_high].saturating_sub(((7 - block) as u32) << 4)
                        >> (3 - key_scale_level)
                })
            })
        });

        Self {
            sine,
            half_sine,
            exp,
            key_scale_levels,
            attack_durations: array::from_fn(attack_duration),
            decay_durations: array::from_fn(decay_duration),
        }
    }

    /// Tables built once per process and shared between chips.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED_TABLES)
    }

    /// Amplitude of an operator at the given phase (wrapped to 10 bits) and attenuation.
    #[inline]
    #[must_use]
    pub fn operator_output(&self, half_wave: bool, phase: i32, attenuation: u32) -> i32 {
        let sine_table = if half_wave { &self.half_sine } else { &self.sine };
        let index = sine_table[(phase & PHASE_MASK) as usize] + attenuation;
        self.exp[index as usize & (EXP_TABLE_LEN - 1)]
    }

    #[inline]
    #[must_use]
    pub fn sine(&self, phase: usize) -> u32 {
        self.sine[phase & (SINE_TABLE_LEN - 1)]
    }

    #[inline]
    #[must_use]
    pub fn half_sine(&self, phase: usize) -> u32 {
        self.half_sine[phase & (SINE_TABLE_LEN - 1)]
    }

    #[inline]
    #[must_use]
    pub fn exp(&self, attenuation: u32) -> i32 {
        self.exp[attenuation as usize & (EXP_TABLE_LEN - 1)]
    }

    #[inline]
    #[must_use]
    pub fn multiplier(&self, multiple: u8) -> u32 {
        MULTIPLIER_TABLE[(multiple & 0x0F) as usize]
    }

    #[inline]
    #[must_use]
    pub fn vibrato_delta(&self, f_number: u16, vibrato_phase: u8) -> i32 {
        VIBRATO_TABLE[((f_number >> 6) & 0x07) as usize][(vibrato_phase & 0x07) as usize]
    }

    #[inline]
    #[must_use]
    pub fn key_scale_level(&self, key_scale_level: u8, block: u8, f_number: u16) -> u32 {
        self.key_scale_levels[(key_scale_level & 0x03) as usize][(block & 0x07) as usize]
            [((f_number >> 5) & 0x0F) as usize]
    }

    /// Clocks per 8-level attack step for the given `rate * 4 + ksr_offset` index
    #[inline]
    #[must_use]
    pub fn attack_duration(&self, index: usize) -> u64 {
        self.attack_durations[index.min(DURATION_TABLE_LEN - 1)]
    }

    /// Clocks per 1-level decay/release step for the given `rate * 4 + ksr_offset` index
    #[inline]
    #[must_use]
    pub fn decay_duration(&self, index: usize) -> u64 {
        self.decay_durations[index.min(DURATION_TABLE_LEN - 1)]
    }

    /// 8-byte patch for a ROM instrument; index 0 returns an all-zero patch.
    #[inline]
    #[must_use]
    pub fn rom_patch(&self, instrument: u8) -> [u8; 8] {
        INSTRUMENT_ROM.get(instrument as usize).copied().unwrap_or_default()
    }
}

impl Default for Ym2413Tables {
    fn default() -> Self {
        Self::new()
    }
}

fn divide_rounded(numerator: u64, denominator: u64) -> u64 {
    ((numerator + denominator / 2) / denominator).max(1)
}

// Envelope behaviors from:
//   https://www.smspower.org/Development/YM2413ReverseEngineeringNotes2015-03-20
//   https://www.smspower.org/Development/YM2413ReverseEngineeringNotes2015-03-27
// Each increment table row averages (4 + rate % 4) increments per 8 table periods
fn decay_duration(index: usize) -> u64 {
    let rate = index.min(63);
    let increments_per_8 = 4 + (rate & 0x03) as u64;
    match rate {
        0..=3 => NEVER,
        4..=51 => {
            let period = 1_u64 << (13 - rate / 4);
            divide_rounded(period * 8, increments_per_8)
        }
        52..=55 => divide_rounded(8, increments_per_8),
        _ => 1,
    }
}

// Hardware attack is exponential, while the stepped envelope moves 8 levels at a time, so the
// full attack time is measured and spread evenly over the 16 steps
fn attack_duration(index: usize) -> u64 {
    const ATTACK_STEPS: u64 = 16;

    let rate = index.min(63);
    let row = rate & 0x03;
    match rate {
        0..=3 => NEVER,
        4..=47 => {
            // 4 attack updates per 2^shift clocks whenever the increment table says 1
            let updates = exponential_attack_updates();
            let period = 1_u64 << (11 - rate / 4);
            let total_clocks = updates * period * 8 / (4 + row as u64);
            divide_rounded(total_clocks, ATTACK_STEPS)
        }
        48..=59 => {
            let mut attenuation = 127_u32;
            let mut clocks = 0_u64;
            while attenuation > 0 {
                clocks += 1;
                let increment_idx = ((clocks >> 1) & 0x06) as usize;
                let increment = u32::from(ENVELOPE_INCREMENT_TABLES[row][increment_idx]);
                let shift = 16 - (rate / 4) as u32 - increment;
                attenuation = attenuation.saturating_sub((attenuation >> shift) + 1);
            }
            divide_rounded(clocks, ATTACK_STEPS)
        }
        _ => 1,
    }
}

fn exponential_attack_updates() -> u64 {
    let mut attenuation = 127_u32;
    let mut updates = 0;
    while attenuation > 0 {
        attenuation -= (attenuation >> 4) + 1;
        updates += 1;
    }
    updates
}
