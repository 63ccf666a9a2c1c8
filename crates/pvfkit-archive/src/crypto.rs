//! PVF word cipher.
//!
//! Every 32-bit little-endian word is XORed with a fixed key and the
//! caller's checksum and rotated by a fixed amount. The directory is keyed by
//! the directory checksum, each entry block by that entry's checksum.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// The fixed key mixed into every word.
///
/// This is hardcoded in the game client and is not a secret.
const PVF_KEY: u32 = 0x81A7_9011;

/// Rotation applied after (decrypt) or before (encrypt) the XOR.
const ROTATE_BITS: u32 = 6;

fn check_aligned(data: &[u8]) -> Result<()> {
    if data.len() % 4 != 0 {
        return Err(Error::UnalignedLength(data.len()));
    }
    Ok(())
}

/// Decrypt PVF data in place.
///
/// The data length must be a multiple of 4.
pub fn decrypt_in_place(data: &mut [u8], checksum: u32) -> Result<()> {
    check_aligned(data)?;
    let mask = PVF_KEY ^ checksum;
    for word in data.chunks_exact_mut(4) {
        let value = LittleEndian::read_u32(word);
        LittleEndian::write_u32(word, (value ^ mask).rotate_right(ROTATE_BITS));
    }
    Ok(())
}

/// Encrypt PVF data in place. Inverse of [`decrypt_in_place`].
pub fn encrypt_in_place(data: &mut [u8], checksum: u32) -> Result<()> {
    check_aligned(data)?;
    let mask = PVF_KEY ^ checksum;
    for word in data.chunks_exact_mut(4) {
        let value = LittleEndian::read_u32(word);
        LittleEndian::write_u32(word, value.rotate_left(ROTATE_BITS) ^ mask);
    }
    Ok(())
}

/// Decrypt PVF data to a new buffer.
pub fn decrypt(data: &[u8], checksum: u32) -> Result<Vec<u8>> {
    let mut buffer = data.to_vec();
    decrypt_in_place(&mut buffer, checksum)?;
    Ok(buffer)
}

/// Encrypt PVF data to a new buffer.
pub fn encrypt(data: &[u8], checksum: u32) -> Result<Vec<u8>> {
    let mut buffer = data.to_vec();
    encrypt_in_place(&mut buffer, checksum)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let plain: Vec<u8> = (0..64u8).collect();
        for checksum in [0, 1, 0xDEAD_BEEF, u32::MAX] {
            let cipher = encrypt(&plain, checksum).unwrap();
            assert_ne!(cipher, plain);
            assert_eq!(decrypt(&cipher, checksum).unwrap(), plain);
        }
    }

    #[test]
    fn test_deterministic() {
        let plain = b"abcdefgh";
        assert_eq!(encrypt(plain, 42).unwrap(), encrypt(plain, 42).unwrap());
        assert_ne!(encrypt(plain, 42).unwrap(), encrypt(plain, 43).unwrap());
    }

    #[test]
    fn test_known_word() {
        // A zero word with a zero checksum encrypts to the bare key.
        assert_eq!(encrypt(&[0; 4], 0).unwrap(), PVF_KEY.to_le_bytes());
        // Decrypting the key back rotates zero, which stays zero.
        assert_eq!(decrypt(&PVF_KEY.to_le_bytes(), 0).unwrap(), [0; 4]);
    }

    #[test]
    fn test_empty() {
        assert!(decrypt(&[], 7).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_length() {
        let mut data = vec![0u8; 6];
        assert!(matches!(
            decrypt_in_place(&mut data, 0),
            Err(Error::UnalignedLength(6))
        ));
        assert!(encrypt(&data, 0).is_err());
    }
}
