//! Common error types

use http::StatusCode;
use thiserror::Error;

/// Serialization error
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    /// A fixed-size field or message has the wrong length.
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },
    #[error("Token type mismatch: expected {expected:#06x}, found {found:#06x}")]
    /// The serialized token type is not the expected one.
    TypeMismatch {
        /// Expected token type value
        expected: u16,
        /// Token type value found in the input
        found: u16,
    },
    #[error("Invalid serialized data")]
    /// Invalid serialized data
    InvalidData,
}

/// Errors that can occur when importing or exporting key material.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterialError {
    #[error("Invalid token key")]
    /// The token key could not be imported.
    Import,
    #[error("Token key could not be exported")]
    /// The public key could not be exported.
    Export,
}

/// Errors that can occur when creating a keypair.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CreateKeypairError {
    #[error("Key generation failed")]
    /// Error when generating the RSA keypair.
    KeyGenerationError,
    #[error(transparent)]
    /// Error when exporting the generated public key.
    KeyMaterial(#[from] KeyMaterialError),
}

/// Errors that can occur when issuing token requests.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IssueTokenRequestError {
    #[error(transparent)]
    /// Error when the token key cannot be imported.
    KeyMaterial(#[from] KeyMaterialError),
    #[error("Invalid TokenChallenge")]
    /// Error when the token challenge is invalid.
    InvalidTokenChallenge,
    #[error("Token blinding error")]
    /// Error when blinding the token.
    BlindingError,
}

/// Errors that can occur when issuing tokens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IssueTokenError {
    #[error("No pending token request")]
    /// Error when no token request is waiting for a response.
    NoPendingRequest,
    #[error("Invalid TokenResponse")]
    /// Error when the token response cannot be finalized.
    InvalidTokenResponse,
}

/// Errors that can occur when issuing the token response.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IssueTokenResponseError {
    #[error("Key ID mismatch")]
    /// Error when the request was made for a different key.
    KeyIdMismatch,
    #[error("Blind signing error")]
    /// Error when blind signing the request fails.
    BlindSigningError,
}

/// Errors that can occur when verifying a token.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerifyTokenError {
    #[error(transparent)]
    /// Error when the issuer key cannot be imported.
    KeyMaterial(#[from] KeyMaterialError),
}

/// Errors that can occur when exchanging messages with an issuer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid issuer URI")]
    /// The issuer name or request URI does not form a valid URI.
    InvalidUri,
    #[error("Invalid issuer directory")]
    /// The issuer directory could not be parsed.
    InvalidDirectory,
    #[error("Invalid request")]
    /// The HTTP request is not a token request.
    InvalidRequest,
    #[error("Unexpected status code: {0}")]
    /// The issuer answered with a non-success status.
    UnexpectedStatus(StatusCode),
    #[error("Unexpected content type")]
    /// The message does not carry the expected media type.
    UnexpectedContentType,
    #[error("Invalid message: {0}")]
    /// The message body could not be decoded.
    InvalidMessage(#[from] SerializationError),
    #[error(transparent)]
    /// The issuer rejected the token request.
    Issuer(#[from] IssueTokenResponseError),
}

/// Errors that can occur when fetching a token from an issuer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FetchTokenError {
    #[error(transparent)]
    /// Error when creating the token request.
    Request(#[from] IssueTokenRequestError),
    #[error(transparent)]
    /// Error when exchanging messages with the issuer.
    Transport(#[from] TransportError),
    #[error(transparent)]
    /// Error when finalizing the token.
    Token(#[from] IssueTokenError),
}
