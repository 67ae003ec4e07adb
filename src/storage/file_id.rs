//! Chunk Address Codec
//!
//! A chunk is addressed by `(volume id, needle key, cookie)`. The binary
//! form is 16 bytes in network byte order; the string form is
//! `<volumeId>,<keyHex><cookieHex>` with leading zero bytes of the key
//! stripped and the cookie always written as 8 hex digits.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use super::types::{Cookie, NeedleId, VolumeId, COOKIE_SIZE, NEEDLE_ID_SIZE};
use crate::error::{Error, Result};

/// Physical address of a chunk on a storage volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    pub volume_id: VolumeId,
    pub key: NeedleId,
    pub cookie: Cookie,
}

impl FileId {
    /// Width of the binary form
    pub const SIZE: usize = 4 + NEEDLE_ID_SIZE + COOKIE_SIZE;

    pub fn new(volume_id: VolumeId, key: NeedleId, cookie: Cookie) -> Self {
        Self {
            volume_id,
            key,
            cookie,
        }
    }

    /// Encode to the fixed-width binary form
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        BigEndian::write_u32(&mut bytes[0..4], self.volume_id);
        BigEndian::write_u64(&mut bytes[4..4 + NEEDLE_ID_SIZE], self.key);
        BigEndian::write_u32(&mut bytes[4 + NEEDLE_ID_SIZE..], self.cookie);
        bytes
    }

    /// Decode from the fixed-width binary form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(malformed(
                &hex::encode(bytes),
                format!("expected {} bytes, got {}", Self::SIZE, bytes.len()),
            ));
        }

        Ok(Self {
            volume_id: BigEndian::read_u32(&bytes[0..4]),
            key: BigEndian::read_u64(&bytes[4..4 + NEEDLE_ID_SIZE]),
            cookie: BigEndian::read_u32(&bytes[4 + NEEDLE_ID_SIZE..]),
        })
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.volume_id,
            format_needle_id_cookie(self.key, self.cookie)
        )
    }
}

impl FromStr for FileId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (vid, key_cookie) = match s.find(',') {
            Some(idx) if idx > 0 => (&s[..idx], &s[idx + 1..]),
            _ => return Err(malformed(s, "missing volume id separator")),
        };

        let volume_id = vid
            .parse::<VolumeId>()
            .map_err(|e| malformed(s, format!("bad volume id: {}", e)))?;
        let (key, cookie) = parse_needle_id_cookie(key_cookie).map_err(|e| match e {
            Error::MalformedAddress { reason, .. } => malformed(s, reason),
            other => other,
        })?;

        Ok(Self::new(volume_id, key, cookie))
    }
}

/// Hex-encode key and cookie, dropping leading zero bytes of the key
///
/// At least one key byte is kept so the cookie boundary stays unambiguous.
pub fn format_needle_id_cookie(key: NeedleId, cookie: Cookie) -> String {
    let mut bytes = [0u8; NEEDLE_ID_SIZE + COOKIE_SIZE];
    BigEndian::write_u64(&mut bytes[0..NEEDLE_ID_SIZE], key);
    BigEndian::write_u32(&mut bytes[NEEDLE_ID_SIZE..], cookie);

    let first_nonzero = bytes[..NEEDLE_ID_SIZE - 1]
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(NEEDLE_ID_SIZE - 1);
    hex::encode(&bytes[first_nonzero..])
}

/// Split `<keyHex><cookieHex>` into its parts
pub fn parse_needle_id_cookie(key_cookie: &str) -> Result<(NeedleId, Cookie)> {
    if key_cookie.len() <= COOKIE_SIZE * 2 {
        return Err(malformed(key_cookie, "key hash is too short"));
    }
    if key_cookie.len() > (NEEDLE_ID_SIZE + COOKIE_SIZE) * 2 {
        return Err(malformed(key_cookie, "key hash is too long"));
    }
    if !key_cookie.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed(key_cookie, "key hash is not hex"));
    }

    let split = key_cookie.len() - COOKIE_SIZE * 2;
    let key = NeedleId::from_str_radix(&key_cookie[..split], 16)
        .map_err(|e| malformed(key_cookie, format!("bad needle key: {}", e)))?;
    let cookie = Cookie::from_str_radix(&key_cookie[split..], 16)
        .map_err(|e| malformed(key_cookie, format!("bad cookie: {}", e)))?;

    Ok((key, cookie))
}

/// Volume id part of a string address, or the whole input when it has none
pub fn volume_id_of(file_id: &str) -> &str {
    match file_id.rfind(',') {
        Some(idx) if idx > 0 => &file_id[..idx],
        _ => file_id,
    }
}

fn malformed(input: &str, reason: impl Into<String>) -> Error {
    Error::MalformedAddress {
        input: input.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_string_form() {
        let fid = FileId::new(3, 0x01637037, 0xd6a1b2c3);
        assert_eq!(fid.to_string(), "3,01637037d6a1b2c3");
        assert_eq!("3,01637037d6a1b2c3".parse::<FileId>().unwrap(), fid);
    }

    #[test]
    fn test_zero_key_keeps_one_byte() {
        let fid = FileId::new(9, 0, 0x00000001);
        assert_eq!(fid.to_string(), "9,0000000001");
        assert_eq!(fid.to_string().parse::<FileId>().unwrap(), fid);
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..2000 {
            let fid = FileId::new(rng.gen(), rng.gen(), rng.gen());
            let decoded = FileId::from_bytes(&fid.to_bytes()).unwrap();
            let parsed: FileId = decoded.to_string().parse().unwrap();
            assert_eq!(parsed, fid);
        }
    }

    #[test]
    fn test_malformed_inputs() {
        for input in [
            "",
            "3",
            ",01637037d6",
            "x,01637037d6",
            "3,d6",
            "3,12345678",
            "3,zz637037d6a1b2c3",
            "3,+1637037d6a1b2c3",
            "3,1637037d+a1b2c3a",
            "3,0102030405060708090a0b0c0d",
        ] {
            let err = input.parse::<FileId>().unwrap_err();
            assert!(
                matches!(err, Error::MalformedAddress { .. }),
                "{:?} should be malformed",
                input
            );
        }

        assert!(matches!(
            FileId::from_bytes(&[0u8; 5]),
            Err(Error::MalformedAddress { .. })
        ));
    }

    #[test]
    fn test_volume_id_of() {
        assert_eq!(volume_id_of("3,01637037d6"), "3");
        assert_eq!(volume_id_of("17"), "17");
    }
}
