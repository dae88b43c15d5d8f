//! This module contains the authentication logic for the challenge phase of the
//! protocol.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use http::{HeaderValue, header::HeaderName};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, tag_no_case},
    character::complete::space1,
    multi::separated_list1,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tls_codec::{Deserialize, Serialize, TlsByteVecU8, TlsByteVecU16};
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};

use crate::{ChallengeDigest, TokenType, common::errors::SerializationError};

use super::{any_value, base64_value, failure, key_name, number_value, opt_spaces};

/// Redemption context field of a `TokenChallenge`
pub type RedemptionContext = [u8; REDEMPTION_CONTEXT_SIZE];

const REDEMPTION_CONTEXT_SIZE: usize = 32;

/// A `TokenChallenge`, as defined in The Privacy Pass HTTP Authentication Scheme:
///
/// ```text
/// struct {
///     uint16_t token_type;
///     opaque issuer_name<1..2^16-1>;
///     opaque redemption_context<0..32>;
///     opaque origin_info<0..2^16-1>;
/// } TokenChallenge;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, TlsSize, TlsDeserialize, TlsSerialize)]
pub struct TokenChallenge {
    token_type: TokenType,
    issuer_name: TlsByteVecU16,
    redemption_context: TlsByteVecU8,
    origin_info: TlsByteVecU16,
}

impl TokenChallenge {
    /// Creates a new `TokenChallenge`. An absent redemption context is encoded
    /// as an empty string, origins are joined with `,`.
    #[must_use]
    pub fn new(
        token_type: TokenType,
        issuer_name: &str,
        redemption_context: Option<RedemptionContext>,
        origin_info: &[String],
    ) -> Self {
        Self {
            token_type,
            issuer_name: issuer_name.as_bytes().into(),
            redemption_context: redemption_context
                .map(|rc| rc.to_vec().into())
                .unwrap_or_default(),
            origin_info: origin_info.join(",").as_bytes().into(),
        }
    }

    /// Returns the token type.
    #[must_use]
    pub const fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// Returns the issuer name.
    #[must_use]
    pub fn issuer_name(&self) -> String {
        String::from_utf8_lossy(self.issuer_name.as_slice()).into_owned()
    }

    /// Returns the redemption context, empty if none was set.
    #[must_use]
    pub fn redemption_context(&self) -> &[u8] {
        self.redemption_context.as_slice()
    }

    /// Returns the list of origins the challenge is valid for.
    #[must_use]
    pub fn origin_info(&self) -> Vec<String> {
        if self.origin_info.as_slice().is_empty() {
            return Vec::new();
        }
        String::from_utf8_lossy(self.origin_info.as_slice())
            .split(',')
            .map(str::to_string)
            .collect()
    }

    /// Serializes the `TokenChallenge`.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be serialized.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializationError> {
        if !self.is_well_formed() {
            return Err(SerializationError::InvalidData);
        }
        self.tls_serialize_detached()
            .map_err(|_| SerializationError::InvalidData)
    }

    /// Deserializes the `TokenChallenge`.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be deserialized.
    pub fn deserialize(mut data: &[u8]) -> Result<Self, SerializationError> {
        let challenge =
            Self::tls_deserialize(&mut data).map_err(|_| SerializationError::InvalidData)?;
        if !data.is_empty() || !challenge.is_well_formed() {
            return Err(SerializationError::InvalidData);
        }
        Ok(challenge)
    }

    // issuer_name<1..2^16-1>, redemption_context is either empty or 32 bytes
    fn is_well_formed(&self) -> bool {
        !self.issuer_name.as_slice().is_empty()
            && matches!(
                self.redemption_context.as_slice().len(),
                0 | REDEMPTION_CONTEXT_SIZE
            )
    }

    /// Serializes the `TokenChallenge` as a base64url encoded string.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be serialized.
    pub fn to_base64(&self) -> Result<String, SerializationError> {
        Ok(URL_SAFE.encode(self.serialize()?))
    }

    /// Deserializes a `TokenChallenge` from a base64url encoded string.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be deserialized.
    pub fn from_base64(s: &str) -> Result<Self, SerializationError> {
        URL_SAFE
            .decode(s)
            .map_err(|_| SerializationError::InvalidData)
            .and_then(|data| Self::deserialize(&data))
    }

    /// Serializes and hashes the `TokenChallenge` with SHA256.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be serialized.
    pub fn digest(&self) -> Result<ChallengeDigest, SerializationError> {
        Ok(Sha256::digest(self.serialize()?).into())
    }
}

/// Everything a client needs to request a token: the challenge, the issuer's
/// token key and how long the challenge stays valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateToken {
    challenge: TokenChallenge,
    token_key: Vec<u8>,
    max_age: Option<usize>,
}

impl PrivateToken {
    /// Creates a new `PrivateToken` from a challenge and the serialized
    /// token key of the issuer.
    #[must_use]
    pub const fn new(challenge: TokenChallenge, token_key: Vec<u8>, max_age: Option<usize>) -> Self {
        Self {
            challenge,
            token_key,
            max_age,
        }
    }

    /// Returns the token challenge
    #[must_use]
    pub const fn challenge(&self) -> &TokenChallenge {
        &self.challenge
    }

    /// Returns the token key as bytes
    #[must_use]
    pub fn token_key(&self) -> &[u8] {
        &self.token_key
    }

    /// Returns the optional max-age
    #[must_use]
    pub const fn max_age(&self) -> Option<usize> {
        self.max_age
    }
}

/// Builds a `WWW-Authenticate` header according to the following scheme:
///
/// `PrivateToken challenge=... token-key=... [max-age=...]`
///
/// # Errors
/// Returns an error if the `TokenChallenge` cannot be serialized.
pub fn build_www_authenticate_header(
    private_token: &PrivateToken,
) -> Result<(HeaderName, HeaderValue), BuildError> {
    let challenge_value = private_token
        .challenge
        .to_base64()
        .map_err(|_| BuildError::InvalidTokenChallenge)?;
    let token_key_value = URL_SAFE.encode(&private_token.token_key);
    let max_age_string = private_token
        .max_age
        .map_or_else(String::new, |max_age| format!(", max-age={max_age}"));

    let value = format!(
        "PrivateToken challenge={challenge_value}, token-key={token_key_value}{max_age_string}"
    );
    let header_name = http::header::WWW_AUTHENTICATE;
    let header_value =
        HeaderValue::from_str(&value).map_err(|_| BuildError::InvalidTokenChallenge)?;
    Ok((header_name, header_value))
}

/// Building error for the `WWW-Authenticate` header values
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid TokenChallenge")]
    /// Invalid TokenChallenge
    InvalidTokenChallenge,
}

/// Parses a `WWW-Authenticate` header according to the following scheme:
///
/// `PrivateToken challenge=... token-key=... [max-age=...]`
///
/// Several challenges can be listed in the same header, separated by `,`.
///
/// # Errors
/// Returns an error if the `WWW-Authenticate` header cannot be parsed.
pub fn parse_www_authenticate_header(value: &HeaderValue) -> Result<Vec<PrivateToken>, ParseError> {
    let s = value.to_str().map_err(|_| ParseError::InvalidInput)?;
    parse_header_value(s)
}

/// Parsing error for the `WWW-Authenticate` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid challenge")]
    /// Invalid challenge
    InvalidChallenge,
    #[error("Invalid token key")]
    /// Invalid token key
    InvalidTokenKey,
    #[error("Invalid max age")]
    /// Invalid max-age
    InvalidMaxAge,
    #[error("Invalid input string")]
    /// Invalid input string
    InvalidInput,
}

type RawChallenge<'a> = (&'a str, &'a str, Option<&'a str>);

fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = opt_spaces(input)?;
    let (input, key) = key_name(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag("=").parse(input)?;
    let (input, _) = opt_spaces(input)?;
    let (input, value) = match key.to_lowercase().as_str() {
        "challenge" | "token-key" => base64_value(input)?,
        "max-age" => number_value(input)?,
        _ => any_value(input)?,
    };
    Ok((input, (key, value)))
}

fn parse_private_token(input: &str) -> IResult<&str, RawChallenge<'_>> {
    let (input, _) = opt_spaces(input)?;
    let (input, _) = tag_no_case("PrivateToken").parse(input)?;
    let (input, _) = space1(input)?;
    let (input, key_values) = separated_list1(tag(","), parse_key_value).parse(input)?;

    let mut challenge = None;
    let mut token_key = None;
    let mut max_age = None;

    for (key, value) in key_values {
        let slot = match key.to_lowercase().as_str() {
            "challenge" => &mut challenge,
            "token-key" => &mut token_key,
            "max-age" => &mut max_age,
            _ => continue,
        };
        if slot.replace(value).is_some() {
            return Err(failure(input));
        }
    }
    let challenge = challenge.ok_or_else(|| failure(input))?;
    let token_key = token_key.ok_or_else(|| failure(input))?;

    Ok((input, (challenge, token_key, max_age)))
}

fn parse_private_tokens(input: &str) -> IResult<&str, Vec<RawChallenge<'_>>> {
    let (input, challenges) = separated_list1(tag(","), parse_private_token).parse(input)?;
    let (input, _) = opt_spaces(input)?;
    Ok((input, challenges))
}

fn parse_header_value(input: &str) -> Result<Vec<PrivateToken>, ParseError> {
    let (output, challenges) = parse_private_tokens(input).map_err(|_| ParseError::InvalidInput)?;
    if !output.is_empty() {
        return Err(ParseError::InvalidInput);
    }
    challenges
        .into_iter()
        .map(|(challenge, token_key, max_age)| {
            let challenge = TokenChallenge::from_base64(challenge)
                .map_err(|_| ParseError::InvalidChallenge)?;
            let token_key = URL_SAFE
                .decode(token_key)
                .map_err(|_| ParseError::InvalidTokenKey)?;
            let max_age = max_age
                .map(str::parse::<usize>)
                .transpose()
                .map_err(|_| ParseError::InvalidMaxAge)?;
            Ok(PrivateToken::new(challenge, token_key, max_age))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_token(issuer: &str, token_key: &[u8], max_age: Option<usize>) -> PrivateToken {
        let challenge = TokenChallenge::new(
            TokenType::Public,
            issuer,
            None,
            &["origin".to_string()],
        );
        PrivateToken::new(challenge, token_key.to_vec(), max_age)
    }

    #[test]
    fn challenge_encoding() {
        let challenge = TokenChallenge::new(TokenType::Public, "issuer.example", None, &[]);
        let bytes = challenge.serialize().unwrap();

        let mut expected = vec![0x00, 0x02, 0x00, 14];
        expected.extend_from_slice(b"issuer.example");
        // empty redemption context and origin info
        expected.extend_from_slice(&[0x00, 0x00, 0x00]);
        assert_eq!(bytes, expected);
        assert_eq!(TokenChallenge::deserialize(&bytes).unwrap(), challenge);
        assert_eq!(challenge.digest().unwrap(), <[u8; 32]>::from(Sha256::digest(&bytes)));
    }

    #[test]
    fn challenge_fields() {
        let challenge = TokenChallenge::new(
            TokenType::Public,
            "issuer.example",
            Some([9u8; 32]),
            &["a.example".to_string(), "b.example".to_string()],
        );
        assert_eq!(challenge.issuer_name(), "issuer.example");
        assert_eq!(challenge.redemption_context(), &[9u8; 32]);
        assert_eq!(challenge.origin_info(), vec!["a.example", "b.example"]);

        let decoded = TokenChallenge::from_base64(&challenge.to_base64().unwrap()).unwrap();
        assert_eq!(decoded, challenge);

        let mut bytes = challenge.serialize().unwrap();
        bytes.push(0);
        assert_eq!(
            TokenChallenge::deserialize(&bytes),
            Err(SerializationError::InvalidData)
        );
    }

    #[test]
    fn challenge_rejects_malformed_fields() {
        // 5-byte redemption context
        let mut bytes = vec![0x00, 0x02, 0x00, 0x01, b'i', 0x05, 1, 2, 3, 4, 5, 0x00, 0x00];
        assert_eq!(
            TokenChallenge::deserialize(&bytes),
            Err(SerializationError::InvalidData)
        );
        // same challenge with an empty redemption context decodes
        bytes.drain(5..11);
        bytes.insert(5, 0x00);
        let challenge = TokenChallenge::deserialize(&bytes).unwrap();
        assert_eq!(challenge.issuer_name(), "i");

        // empty issuer name
        let bytes = [0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            TokenChallenge::deserialize(&bytes),
            Err(SerializationError::InvalidData)
        );
        let challenge = TokenChallenge::new(TokenType::Public, "", None, &[]);
        assert_eq!(challenge.serialize(), Err(SerializationError::InvalidData));
        assert!(challenge.digest().is_err());
    }

    #[test]
    fn builder_test() {
        let private_token = private_token("issuer", b"sample token key", Some(100));
        let (header_name, header_value) = build_www_authenticate_header(&private_token).unwrap();

        let expected_value = format!(
            "PrivateToken challenge={}, token-key={}, max-age=100",
            private_token.challenge().to_base64().unwrap(),
            URL_SAFE.encode(b"sample token key"),
        );
        assert_eq!(header_name, http::header::WWW_AUTHENTICATE);
        assert_eq!(header_value.as_bytes(), expected_value.as_bytes());
    }

    #[test]
    fn parser_test() {
        let first = private_token("issuer1", b"sample token key 1", Some(10));
        let second = private_token("issuer2", b"sample token key 2", None);

        let input = HeaderValue::from_str(&format!(
            "PrivateToken challenge=\"{}\", token-key={}, max-age=10, PrivateToken challenge={}, token-key=\"{}\", unknown=\"x, y\"",
            first.challenge().to_base64().unwrap(),
            URL_SAFE.encode(first.token_key()),
            second.challenge().to_base64().unwrap(),
            URL_SAFE.encode(second.token_key()),
        ))
        .unwrap();

        let challenges = parse_www_authenticate_header(&input).unwrap();
        assert_eq!(challenges, vec![first, second]);
    }

    #[test]
    fn builder_parser_test() {
        let private_token = private_token("issuer", b"token key", Some(3600));
        let (_header_name, header_value) = build_www_authenticate_header(&private_token).unwrap();
        let challenges = parse_www_authenticate_header(&header_value).unwrap();
        assert_eq!(challenges, vec![private_token]);
    }

    #[test]
    fn parser_rejects_malformed_input() {
        let token = private_token("issuer", b"token key", None);
        let challenge = token.challenge().to_base64().unwrap();
        let token_key = URL_SAFE.encode(token.token_key());

        let cases = [
            ("Basic realm=x".to_string(), ParseError::InvalidInput),
            (format!("PrivateToken challenge={challenge}"), ParseError::InvalidInput),
            (
                format!("PrivateToken challenge={challenge}, challenge={challenge}, token-key={token_key}"),
                ParseError::InvalidInput,
            ),
            (
                format!("PrivateToken challenge=AAAA, token-key={token_key}"),
                ParseError::InvalidChallenge,
            ),
            (
                format!(
                    "PrivateToken challenge={challenge}, token-key={token_key}, max-age=99999999999999999999999"
                ),
                ParseError::InvalidMaxAge,
            ),
        ];
        for (value, error) in cases {
            let value = HeaderValue::from_str(&value).unwrap();
            assert_eq!(parse_www_authenticate_header(&value), Err(error));
        }
    }
}
