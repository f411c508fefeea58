// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

/// Upper half is the exponent of 2^52, lower half flips the sign bit of the stored value.
const FLOAT_BIAS: u64 = 0x4330_0000_8000_0000;

/// Floats are stored as 20.12 fixed point.
const FLOAT_SCALE: f64 = 1.0 / 4096.0;

/// Decrypts a name or string section in place.
///
/// Each of the two running keys starts as the inverted key byte and is advanced by every
/// ciphertext byte it decrypts.
pub fn decrypt_section(keys: [u8; 2], data: &mut [u8]) {
    let mut current = [!keys[0], !keys[1]];
    for (i, byte) in data.iter_mut().enumerate() {
        let cipher = *byte;
        *byte ^= current[i % 2];
        current[i % 2] = current[i % 2].wrapping_add(cipher);
    }
}

/// The inverse of [`decrypt_section`].
pub fn encrypt_section(keys: [u8; 2], data: &mut [u8]) {
    let mut current = [!keys[0], !keys[1]];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= current[i % 2];
        current[i % 2] = current[i % 2].wrapping_add(*byte);
    }
}

/// Recovers a float stored in the obfuscated fixed point encoding.
pub fn deobfuscate_float(raw: u32) -> f32 {
    let value = f64::from_bits(FLOAT_BIAS ^ raw as u64) - f64::from_bits(FLOAT_BIAS);
    (value * FLOAT_SCALE) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_known_name() {
        let mut data = [0xFC, 0xB4, 0xFC, 0xCB, 0xE3, 0x1E, 0xDD, 0x38, 0x6D];
        decrypt_section([0x4A, 0x1F], &mut data);
        assert_eq!(&data, b"ITM_NAME\0");
    }

    #[test]
    fn encrypt_matches_decrypt() {
        let mut data = *b"EnemyParam";
        encrypt_section([0x12, 0xF0], &mut data);
        assert_ne!(&data, b"EnemyParam");
        decrypt_section([0x12, 0xF0], &mut data);
        assert_eq!(&data, b"EnemyParam");
    }

    #[test]
    fn deobfuscate() {
        assert_eq!(deobfuscate_float(0x0001_3800), 19.5);
        assert_eq!(deobfuscate_float(0x0000_1000), 1.0);
        assert_eq!(deobfuscate_float(0xFFFF_F000), -1.0);
        assert_eq!(deobfuscate_float(0), 0.0);
    }
}
