//! # Privacy Pass: Publicly Verifiable Tokens
//!
//! A Rust implementation of the publicly verifiable token type of the Privacy
//! Pass protocol as specified in Privacy Pass IETF WG
//! [documents](https://datatracker.ietf.org/wg/privacypass/documents/).
//!
//! Tokens are issued with blind RSA signatures (RSABSSA-SHA384-PSS-Deterministic,
//! 2048-bit modulus), so that any party holding the issuer's public key can
//! verify them while the issuer cannot link a token to its issuance.
//!
//! The library implements the following components:
//!
//!  - Client: turns a challenge into a blinded token request and finalizes
//!    the issuer's response into a token
//!  - Issuer: blind-signs token requests
//!  - Verifier: checks finalized tokens against the issuer's public key
//!  - HTTP framing for the issuance and authentication exchanges

#![warn(missing_docs)]
#![deny(unreachable_pub)]
#![deny(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod common;
pub mod public_tokens;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod transport;

use common::errors::SerializationError;
use tls_codec_derive::{TlsSerialize, TlsSize};

pub use tls_codec::{Deserialize, Serialize};

/// Size of the blinded message, blind signature and authenticator.
pub const NK: usize = 256;
/// Size of the key identifier.
pub const NID: usize = 32;

/// Token type
#[derive(TlsSize, TlsSerialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TokenType {
    /// Publicly verifiable token (Blind RSA, 2048-bit)
    Public = 2,
}

impl TokenType {
    /// Returns the static parameters of the token type.
    #[must_use]
    pub const fn descriptor(self) -> &'static TokenTypeDescriptor {
        match self {
            Self::Public => &PUBLIC_TOKEN_TYPE,
        }
    }
}

impl TryFrom<u16> for TokenType {
    type Error = SerializationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            v if v == PUBLIC_TOKEN_TYPE.value => Ok(Self::Public),
            found => Err(SerializationError::TypeMismatch {
                expected: PUBLIC_TOKEN_TYPE.value,
                found,
            }),
        }
    }
}

impl tls_codec::Deserialize for TokenType {
    fn tls_deserialize<R: std::io::Read>(bytes: &mut R) -> Result<Self, tls_codec::Error>
    where
        Self: Sized,
    {
        let value = u16::tls_deserialize(bytes)?;
        Self::try_from(value).map_err(|_| tls_codec::Error::UnknownValue(value.into()))
    }
}

/// Static parameters of a token type, as registered in the Privacy Pass token
/// type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTypeDescriptor {
    /// Numeric value on the wire
    pub value: u16,
    /// Human readable name
    pub name: &'static str,
    /// Whether tokens can be verified with the issuer's public key
    pub publicly_verifiable: bool,
    /// Whether the issuance binds public metadata
    pub public_metadata: bool,
    /// Whether the issuance binds private metadata
    pub private_metadata: bool,
    /// Size of the authenticator in bytes
    pub nk: usize,
    /// Size of the key identifier in bytes
    pub nid: usize,
}

/// Blind RSA (2048-bit)
pub const PUBLIC_TOKEN_TYPE: TokenTypeDescriptor = TokenTypeDescriptor {
    value: 0x0002,
    name: "Blind RSA (2048-bit)",
    publicly_verifiable: true,
    public_metadata: false,
    private_metadata: false,
    nk: NK,
    nid: NID,
};

/// Truncated token key ID
pub type TruncatedTokenKeyId = u8;
/// Token key ID
pub type TokenKeyId = [u8; NID];
/// Nonce
pub type Nonce = [u8; 32];
/// Challenge digest
pub type ChallengeDigest = [u8; 32];

/// Returns the last byte of the token key ID. Several keys can share the same
/// truncated ID; it only serves as a hint for key selection.
#[must_use]
pub fn truncate_token_key_id(token_key_id: &TokenKeyId) -> TruncatedTokenKeyId {
    *token_key_id.iter().last().unwrap_or(&0)
}

/// Splits the leading token type off a serialized message.
pub(crate) fn split_token_type(bytes: &[u8]) -> Result<(TokenType, &[u8]), SerializationError> {
    let (value, rest) =
        bytes
            .split_first_chunk::<2>()
            .ok_or(SerializationError::InvalidLength {
                expected: 2,
                actual: bytes.len(),
            })?;
    let token_type = TokenType::try_from(u16::from_be_bytes(*value))?;
    Ok((token_type, rest))
}

/// The data that gets blindly signed by the issuer and later verified:
///
/// ```text
/// struct {
///     uint16_t token_type = 0x0002;
///     uint8_t nonce[32];
///     uint8_t challenge_digest[32];
///     uint8_t token_key_id[Nid];
/// } TokenPayload;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, TlsSize, TlsSerialize)]
pub struct TokenPayload {
    token_type: TokenType,
    nonce: Nonce,
    challenge_digest: ChallengeDigest,
    token_key_id: TokenKeyId,
}

impl TokenPayload {
    /// Size of the serialized payload.
    pub const SIZE: usize = 2 + 32 + 32 + NID;

    /// Creates a new payload.
    #[must_use]
    pub const fn new(
        token_type: TokenType,
        nonce: Nonce,
        challenge_digest: ChallengeDigest,
        token_key_id: TokenKeyId,
    ) -> Self {
        Self {
            token_type,
            nonce,
            challenge_digest,
            token_key_id,
        }
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// Returns the nonce.
    #[must_use]
    pub const fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Returns the challenge digest.
    #[must_use]
    pub const fn challenge_digest(&self) -> &ChallengeDigest {
        &self.challenge_digest
    }

    /// Returns the token key ID.
    #[must_use]
    pub const fn token_key_id(&self) -> &TokenKeyId {
        &self.token_key_id
    }

    /// Serializes the payload. The result is the input of both the blind
    /// signature and the final verification.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        // token_input = concat(0x0002, nonce, challenge_digest, token_key_id)
        let mut token_input: Vec<u8> = Vec::with_capacity(Self::SIZE);
        token_input.extend_from_slice((self.token_type as u16).to_be_bytes().as_slice());
        token_input.extend_from_slice(self.nonce.as_slice());
        token_input.extend_from_slice(self.challenge_digest.as_slice());
        token_input.extend_from_slice(self.token_key_id.as_slice());
        token_input
    }

    /// Deserializes a payload.
    ///
    /// # Errors
    /// Returns an error if the token type is unknown or the input is not
    /// exactly [`TokenPayload::SIZE`] bytes long.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SerializationError> {
        let (token_type, rest) = split_token_type(bytes)?;
        let invalid_length = SerializationError::InvalidLength {
            expected: Self::SIZE,
            actual: bytes.len(),
        };
        if bytes.len() != Self::SIZE {
            return Err(invalid_length);
        }
        let (nonce, rest) = rest.split_first_chunk::<32>().ok_or(invalid_length)?;
        let (challenge_digest, rest) = rest.split_first_chunk::<32>().ok_or(invalid_length)?;
        let token_key_id: TokenKeyId = rest.try_into().map_err(|_| invalid_length)?;
        Ok(Self::new(token_type, *nonce, *challenge_digest, token_key_id))
    }
}
