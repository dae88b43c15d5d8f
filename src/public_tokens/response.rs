//! Response implementation of the Publicly Verifiable Token protocol.

use tls_codec_derive::{TlsSerialize, TlsSize};

use crate::common::errors::SerializationError;

use super::NK;

/// Token response as defined in the Privacy Pass issuance protocol:
///
/// ```c
/// struct {
///     uint8_t blind_sig[Nk];
///  } TokenResponse;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TlsSerialize, TlsSize)]
pub struct TokenResponse {
    blind_sig: [u8; NK],
}

impl TokenResponse {
    /// Creates a new token response.
    ///
    /// # Errors
    /// Returns an error if the blind signature is not `Nk` bytes long.
    pub fn new(blind_sig: &[u8]) -> Result<Self, SerializationError> {
        let blind_sig = blind_sig
            .try_into()
            .map_err(|_| SerializationError::InvalidLength {
                expected: NK,
                actual: blind_sig.len(),
            })?;
        Ok(Self { blind_sig })
    }

    /// Returns the blind signature.
    #[must_use]
    pub fn blind_sig(&self) -> &[u8] {
        &self.blind_sig
    }

    /// Deserializes a token response.
    ///
    /// # Errors
    /// Returns an error if the input is not exactly `Nk` bytes long.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SerializationError> {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tls_codec::Serialize;

    #[test]
    fn response_encoding() {
        let response = TokenResponse::new(&[3u8; NK]).unwrap();
        let bytes = response.tls_serialize_detached().unwrap();
        assert_eq!(bytes, vec![3u8; NK]);
        assert_eq!(TokenResponse::deserialize(&bytes).unwrap(), response);

        assert_eq!(
            TokenResponse::new(&[0u8; 255]),
            Err(SerializationError::InvalidLength {
                expected: NK,
                actual: 255
            })
        );
        assert!(TokenResponse::deserialize(&[]).is_err());
    }
}
