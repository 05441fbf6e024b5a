// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire form of an encrypted value: `base64(iv):base64(ciphertext):base64(tag)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use proxyvault_core::DecryptError;

/// IV length in bytes.
pub const IV_LEN: usize = 16;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A parsed encrypted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl EncryptedBlob {
    /// Render as the three-segment wire form.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}",
            BASE64.encode(self.iv),
            BASE64.encode(&self.ciphertext),
            BASE64.encode(self.tag)
        )
    }

    /// Parse the wire form. Anything but exactly three valid segments with a
    /// 16-byte IV and a 16-byte tag is [`DecryptError::InvalidFormat`].
    pub fn parse(encoded: &str) -> Result<Self, DecryptError> {
        let mut parts = encoded.split(':');
        let (Some(iv), Some(ciphertext), Some(tag), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecryptError::InvalidFormat);
        };

        let decode = |s: &str| BASE64.decode(s).map_err(|_| DecryptError::InvalidFormat);
        let iv: [u8; IV_LEN] = decode(iv)?
            .try_into()
            .map_err(|_| DecryptError::InvalidFormat)?;
        let tag: [u8; TAG_LEN] = decode(tag)?
            .try_into()
            .map_err(|_| DecryptError::InvalidFormat)?;
        let ciphertext = decode(ciphertext)?;

        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedBlob {
        EncryptedBlob {
            iv: [1u8; IV_LEN],
            ciphertext: b"opaque".to_vec(),
            tag: [2u8; TAG_LEN],
        }
    }

    #[test]
    fn encodes_three_segments() {
        let encoded = sample().encode();
        assert_eq!(encoded.split(':').count(), 3);
        assert_eq!(EncryptedBlob::parse(&encoded).unwrap(), sample());
    }

    #[test]
    fn empty_ciphertext_is_allowed() {
        let blob = EncryptedBlob {
            ciphertext: Vec::new(),
            ..sample()
        };
        assert_eq!(EncryptedBlob::parse(&blob.encode()).unwrap(), blob);
    }

    #[test]
    fn wrong_segment_count_is_invalid() {
        let encoded = sample().encode();
        for bad in [
            "".to_string(),
            "abc".to_string(),
            "a:b".to_string(),
            format!("{encoded}:extra"),
        ] {
            assert_eq!(EncryptedBlob::parse(&bad), Err(DecryptError::InvalidFormat));
        }
    }

    #[test]
    fn wrong_lengths_and_bad_base64_are_invalid() {
        let short_iv = format!(
            "{}:{}:{}",
            BASE64.encode([0u8; 12]),
            BASE64.encode(b"x"),
            BASE64.encode([0u8; TAG_LEN])
        );
        let short_tag = format!(
            "{}:{}:{}",
            BASE64.encode([0u8; IV_LEN]),
            BASE64.encode(b"x"),
            BASE64.encode([0u8; 8])
        );
        let not_base64 = format!(
            "{}:!!!:{}",
            BASE64.encode([0u8; IV_LEN]),
            BASE64.encode([0u8; TAG_LEN])
        );
        for bad in [short_iv, short_tag, not_base64] {
            assert_eq!(EncryptedBlob::parse(&bad), Err(DecryptError::InvalidFormat));
        }
    }
}
