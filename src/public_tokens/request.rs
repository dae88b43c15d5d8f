//! Request implementation of the Publicly Verifiable Token protocol.

use tls_codec_derive::{TlsSerialize, TlsSize};

use crate::{
    TokenType, TruncatedTokenKeyId, common::errors::SerializationError, split_token_type,
};

use super::NK;

/// Token request as defined in the Privacy Pass issuance protocol:
///
/// ```c
/// struct {
///     uint16_t token_type = 0x0002;
///     uint8_t truncated_token_key_id;
///     uint8_t blinded_msg[Nk];
///  } TokenRequest;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TlsSerialize, TlsSize)]
pub struct TokenRequest {
    token_type: TokenType,
    truncated_token_key_id: TruncatedTokenKeyId,
    blinded_msg: [u8; NK],
}

impl TokenRequest {
    /// Size of the serialized request.
    pub const SIZE: usize = 3 + NK;

    /// Creates a new token request.
    ///
    /// # Errors
    /// Returns an error if the blinded message is not `Nk` bytes long.
    pub fn new(
        truncated_token_key_id: TruncatedTokenKeyId,
        blinded_msg: &[u8],
    ) -> Result<Self, SerializationError> {
        let blinded_msg = blinded_msg
            .try_into()
            .map_err(|_| SerializationError::InvalidLength {
                expected: NK,
                actual: blinded_msg.len(),
            })?;
        Ok(Self {
            token_type: TokenType::Public,
            truncated_token_key_id,
            blinded_msg,
        })
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// Returns the truncated ID of the key the request was made for.
    #[must_use]
    pub const fn truncated_token_key_id(&self) -> TruncatedTokenKeyId {
        self.truncated_token_key_id
    }

    /// Returns the blinded message.
    #[must_use]
    pub fn blinded_msg(&self) -> &[u8] {
        &self.blinded_msg
    }

    /// Deserializes a token request.
    ///
    /// # Errors
    /// Returns an error if the token type is not `0x0002` or the blinded
    /// message is not exactly `Nk` bytes long.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SerializationError> {
        let (_token_type, rest) = split_token_type(bytes)?;
        let (truncated_token_key_id, blinded_msg) =
            rest.split_first()
                .ok_or(SerializationError::InvalidLength {
                    expected: Self::SIZE,
                    actual: bytes.len(),
                })?;
        Self::new(*truncated_token_key_id, blinded_msg)
    }
}
