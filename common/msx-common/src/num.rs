use std::ops::RangeInclusive;

pub trait GetBit {
    #[must_use]
    fn bit(self, i: u8) -> bool;

    #[must_use]
    fn bits(self, range: RangeInclusive<u8>) -> Self;
}

macro_rules! impl_get_bit {
    ($($t:ty),* $(,)?) => {
        $(
            impl GetBit for $t {
                #[inline]
                fn bit(self, i: u8) -> bool {
                    debug_assert!(i < (<$t>::BITS as u8));
                    self & (1 << i) != 0
                }

                #[inline]
                fn bits(self, range: RangeInclusive<u8>) -> Self {
                    let (start, end) = (*range.start(), *range.end());
                    debug_assert!(start <= end && end < (<$t>::BITS as u8));

                    let width = end - start + 1;
                    if width as u32 == <$t>::BITS {
                        return self;
                    }
                    (self >> start) & ((1 << width) - 1)
                }
            }
        )*
    };
}

impl_get_bit!(u8, u16, u32, u64);

/// Byte access for the 9-bit F-number style registers that are split across two writes.
pub trait U16Ext {
    fn lsb(self) -> u8;

    fn msb(self) -> u8;

    fn set_lsb(&mut self, value: u8);

    fn set_msb(&mut self, value: u8);
}

impl U16Ext for u16 {
    #[inline(always)]
    fn lsb(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    fn msb(self) -> u8 {
        (self >> 8) as u8
    }

    #[inline(always)]
    fn set_lsb(&mut self, value: u8) {
        *self = (*self & 0xFF00) | u16::from(value);
    }

    #[inline(always)]
    fn set_msb(&mut self, value: u8) {
        *self = (*self & 0x00FF) | (u16::from(value) << 8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_ranges() {
        assert!(0x20_u8.bit(5));
        assert!(!0x20_u8.bit(4));
        assert_eq!(0xB6_u8.bits(1..=3), 0x03);
        assert_eq!(0xB6_u8.bits(4..=7), 0x0B);
        assert_eq!(0xB6_u8.bits(0..=7), 0xB6);
    }

    #[test]
    fn f_number_bytes() {
        let mut f_number = 0x0100_u16;
        f_number.set_lsb(0xAB);
        assert_eq!(f_number, 0x01AB);
        f_number.set_msb(0x00);
        assert_eq!(f_number, 0x00AB);
        assert_eq!(f_number.lsb(), 0xAB);
        assert_eq!(f_number.msb(), 0x00);
    }
}
