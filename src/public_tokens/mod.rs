//! # Publicly Verifiable Tokens

use blind_rsa_signatures::Options;
use log::warn;
use sha2::{Digest, Sha256};

use crate::{
    TokenKeyId, TokenType, TruncatedTokenKeyId,
    auth::authenticate::{PrivateToken, RedemptionContext, TokenChallenge},
    common::errors::KeyMaterialError,
    truncate_token_key_id,
};

pub mod client;
mod request;
mod response;
pub mod server;
pub mod verifier;

pub use blind_rsa_signatures::{KeyPair, PublicKey};
pub use request::*;
pub use response::*;

pub use crate::NK;

/// Size of the RSA modulus in bits
pub const KEYSIZE_IN_BITS: usize = 2048;

/// Serializes a public key as a DER-encoded SubjectPublicKeyInfo with the
/// RSASSA-PSS parameters of the token type.
///
/// # Errors
/// Returns an error if the key cannot be encoded.
pub fn serialize_public_key(public_key: &PublicKey) -> Result<Vec<u8>, KeyMaterialError> {
    public_key
        .to_spki(Some(&Options::default()))
        .inspect_err(|e| warn!(error:% = e; "Failed to export public key"))
        .map_err(|_| KeyMaterialError::Export)
}

/// Deserializes a public key from a DER-encoded SubjectPublicKeyInfo.
///
/// # Errors
/// Returns an error if the bytes are not a valid RSA public key.
pub fn deserialize_public_key(token_key: &[u8]) -> Result<PublicKey, KeyMaterialError> {
    PublicKey::from_spki(token_key, Some(&Options::default()))
        .inspect_err(|e| warn!(error:% = e; "Failed to import token key"))
        .map_err(|_| KeyMaterialError::Import)
}

/// Converts a serialized token key to a token key ID
#[must_use]
pub fn token_key_to_token_key_id(token_key: &[u8]) -> TokenKeyId {
    Sha256::digest(token_key).into()
}

/// Converts a public key to a token key ID
///
/// # Errors
/// Returns an error if the key cannot be encoded.
pub fn public_key_to_token_key_id(public_key: &PublicKey) -> Result<TokenKeyId, KeyMaterialError> {
    Ok(token_key_to_token_key_id(&serialize_public_key(public_key)?))
}

/// Converts a public key to a truncated token key ID
///
/// # Errors
/// Returns an error if the key cannot be encoded.
pub fn public_key_to_truncated_token_key_id(
    public_key: &PublicKey,
) -> Result<TruncatedTokenKeyId, KeyMaterialError> {
    Ok(truncate_token_key_id(&public_key_to_token_key_id(public_key)?))
}

/// Assembles the [`PrivateToken`] a client needs to request a token from the
/// issuer `issuer_name`. An absent redemption context is encoded as an empty
/// string.
///
/// # Errors
/// Returns an error if the public key cannot be exported.
pub fn build_private_token(
    issuer_name: &str,
    public_key: &PublicKey,
    redemption_context: Option<RedemptionContext>,
    origin_info: &[String],
    max_age: Option<usize>,
) -> Result<PrivateToken, KeyMaterialError> {
    let challenge = TokenChallenge::new(
        TokenType::Public,
        issuer_name,
        redemption_context,
        origin_info,
    );
    let token_key = serialize_public_key(public_key)?;
    Ok(PrivateToken::new(challenge, token_key, max_age))
}
