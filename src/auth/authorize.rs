//! This module contains the authorization logic for redemption phase of the
//! protocol.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use http::{HeaderValue, header::HeaderName};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, tag_no_case},
    character::complete::space1,
    multi::separated_list1,
};
use std::io::Write;
use thiserror::Error;
use tls_codec::{Error, Serialize, Size};

use crate::{NK, TokenPayload, TokenType, common::errors::SerializationError, split_token_type};

use super::{any_value, base64_value, failure, key_name, opt_spaces};

/// A Token as defined in The Privacy Pass HTTP Authentication Scheme:
///
/// ```text
/// struct {
///     uint16_t token_type = 0x0002
///     uint8_t nonce[32];
///     uint8_t challenge_digest[32];
///     uint8_t token_key_id[32];
///     uint8_t authenticator[Nk];
/// } Token;
/// ```
///
/// The first four fields form the [`TokenPayload`] the authenticator was
/// computed over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    payload: TokenPayload,
    authenticator: [u8; NK],
}

impl Size for Token {
    fn tls_serialized_len(&self) -> usize {
        self.payload.tls_serialized_len() + NK
    }
}

impl Serialize for Token {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, Error> {
        let written = self.payload.tls_serialize(writer)?;
        writer.write_all(&self.authenticator[..])?;
        Ok(written + NK)
    }
}

impl Token {
    /// Size of the serialized token.
    pub const SIZE: usize = TokenPayload::SIZE + NK;

    /// Creates a new Token from a payload and its authenticator.
    #[must_use]
    pub const fn new(payload: TokenPayload, authenticator: [u8; NK]) -> Self {
        Self {
            payload,
            authenticator,
        }
    }

    /// Creates a new Token, checking the length of the authenticator.
    ///
    /// # Errors
    /// Returns an error if the authenticator is not `Nk` bytes long.
    pub fn from_slice(payload: TokenPayload, authenticator: &[u8]) -> Result<Self, SerializationError> {
        let authenticator =
            authenticator
                .try_into()
                .map_err(|_| SerializationError::InvalidLength {
                    expected: NK,
                    actual: authenticator.len(),
                })?;
        Ok(Self::new(payload, authenticator))
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> TokenType {
        self.payload.token_type()
    }

    /// Returns the payload the authenticator was computed over.
    #[must_use]
    pub const fn payload(&self) -> &TokenPayload {
        &self.payload
    }

    /// Returns the authenticator.
    #[must_use]
    pub fn authenticator(&self) -> &[u8] {
        self.authenticator.as_ref()
    }

    /// Serializes the token.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = self.payload.serialize();
        bytes.extend_from_slice(&self.authenticator);
        bytes
    }

    /// Deserializes a token.
    ///
    /// # Errors
    /// Returns an error if the token type is not the expected one or the
    /// input does not have the size of a token.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SerializationError> {
        split_token_type(bytes)?;
        if bytes.len() != Self::SIZE {
            return Err(SerializationError::InvalidLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let (payload, authenticator) = bytes.split_at(TokenPayload::SIZE);
        Self::from_slice(TokenPayload::deserialize(payload)?, authenticator)
    }
}

/// Builds a `Authorize` header according to the following scheme:
///
/// `PrivateToken token=...`
///
/// # Errors
/// Returns an error if the token is not valid.
pub fn build_authorization_header(token: &Token) -> Result<(HeaderName, HeaderValue), BuildError> {
    let value = format!("PrivateToken token={}", URL_SAFE.encode(token.serialize()));
    let header_name = http::header::AUTHORIZATION;
    let header_value = HeaderValue::from_str(&value).map_err(|_| BuildError::InvalidToken)?;
    Ok((header_name, header_value))
}

/// Building error for the `Authorization` header values
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid token")]
    /// Invalid token
    InvalidToken,
}

/// Parses an `Authorization` header according to the following scheme:
///
/// `PrivateToken token=...`
///
/// # Errors
/// Returns an error if the header value is not valid.
pub fn parse_authorization_header(value: &HeaderValue) -> Result<Token, ParseError> {
    let s = value.to_str().map_err(|_| ParseError::InvalidInput)?;
    let tokens = parse_header_value(s)?;
    tokens.into_iter().next().ok_or(ParseError::InvalidInput)
}

/// Parsing error for the `Authorization` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid token")]
    /// Invalid token
    InvalidToken,
    #[error("Invalid input string")]
    /// Invalid input string
    InvalidInput,
}

fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = opt_spaces(input)?;
    let (input, key) = key_name(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag("=").parse(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, value) = match key.to_lowercase().as_str() {
        "token" => base64_value(input)?,
        _ => any_value(input)?,
    };
    Ok((input, (key, value)))
}

fn parse_private_token(input: &str) -> IResult<&str, &str> {
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag_no_case("PrivateToken").parse(input)?;
    let (input, _) = space1(input)?;
    let (input, key_values) = separated_list1(tag(","), parse_key_value).parse(input)?;

    let mut token = None;

    for (key, value) in key_values {
        if key.eq_ignore_ascii_case("token") && token.replace(value).is_some() {
            return Err(failure(input));
        }
    }
    let token = token.ok_or_else(|| failure(input))?;

    Ok((input, token))
}

fn parse_private_tokens(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, tokens) = separated_list1(tag(","), parse_private_token).parse(input)?;
    let (input, _) = opt_spaces(input)?;
    Ok((input, tokens))
}

fn parse_header_value(input: &str) -> Result<Vec<Token>, ParseError> {
    let (output, tokens) = parse_private_tokens(input).map_err(|_| ParseError::InvalidInput)?;
    if !output.is_empty() {
        return Err(ParseError::InvalidInput);
    }
    tokens
        .into_iter()
        .map(|token_value| {
            let bytes = URL_SAFE
                .decode(token_value)
                .map_err(|_| ParseError::InvalidToken)?;
            Token::deserialize(&bytes).map_err(|_| ParseError::InvalidToken)
        })
        .collect()
}
