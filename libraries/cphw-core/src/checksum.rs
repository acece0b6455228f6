//! Bit-serial CRC16 used to authenticate ride-mode payloads
//!
//! The wheel does not use a table-driven CRC. Its firmware swaps every byte
//! pair, feeds the bits LSB-first through a 16-bit shift register with the
//! `0x8005` polynomial, flushes 16 zero bits and finally bit-reverses the
//! register. This module reproduces that bit for bit.

const POLYNOMIAL: u16 = 0x8005;

/// Number of zero bits pushed through the register after the payload.
const FLUSH_BITS: usize = 16;

/// Compute the checksum of `data`.
///
/// Returns `(low_byte, high_byte)`, which is also the order the bytes are
/// appended to a protected payload.
///
/// # Example
///
/// ```rust
/// use cphw_core::crc16;
///
/// assert_eq!(crc16(&[]), (0, 0));
/// assert_eq!(crc16(&[0x01, 0x02]), (0xC0, 0xA0));
/// ```
pub fn crc16(data: &[u8]) -> (u8, u8) {
    let mut register = 0u16;

    for byte in swap_pairs(data) {
        for bit in 0..8 {
            register = shift_in(register, (byte >> bit) & 1);
        }
    }

    for _ in 0..FLUSH_BITS {
        register = shift_in(register, 0);
    }

    let crc = register.reverse_bits();
    ((crc & 0xFF) as u8, (crc >> 8) as u8)
}

/// Append the two checksum bytes of `buf` to `buf`.
pub fn append_crc16(buf: &mut Vec<u8>) {
    let (low, high) = crc16(buf);
    buf.extend_from_slice(&[low, high]);
}

/// One register step: shift left, OR in `bit`, XOR the polynomial on carry.
#[inline]
fn shift_in(register: u16, bit: u8) -> u16 {
    let carry = register & 0x8000 != 0;
    let shifted = (register << 1) | u16::from(bit);
    if carry {
        shifted ^ POLYNOMIAL
    } else {
        shifted
    }
}

/// Copy of `data` with each adjacent pair swapped; an odd trailing byte stays put.
fn swap_pairs(data: &[u8]) -> Vec<u8> {
    let mut swapped = data.to_vec();
    for pair in swapped.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    swapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(crc16(&[]), (0, 0));
    }

    #[test]
    fn test_all_zero_even_length_is_zero() {
        assert_eq!(crc16(&[0u8; 2]), (0, 0));
        assert_eq!(crc16(&[0u8; 18]), (0, 0));
        assert_eq!(crc16(&[0u8; 64]), (0, 0));
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(crc16(&[0x01]), (0xC1, 0xC0));
        assert_eq!(crc16(&[0x01, 0x02]), (0xC0, 0xA0));
        assert_eq!(crc16(&[0x01, 0x02, 0x03]), (0xE0, 0x51));
    }

    #[test]
    fn test_swap_pairs_leaves_odd_tail() {
        assert_eq!(swap_pairs(&[1, 2, 3, 4, 5]), vec![2, 1, 4, 3, 5]);
        assert!(swap_pairs(&[]).is_empty());
    }

    #[test]
    fn test_shift_in_applies_polynomial_on_carry() {
        assert_eq!(shift_in(0x0001, 1), 0x0003);
        assert_eq!(shift_in(0x8000, 0), POLYNOMIAL);
        assert_eq!(shift_in(0x8000, 1), 0x0001 ^ POLYNOMIAL);
    }

    #[test]
    fn test_append_crc16() {
        let mut buf = vec![0x01, 0x02];
        append_crc16(&mut buf);
        assert_eq!(buf, vec![0x01, 0x02, 0xC0, 0xA0]);
    }
}
