//! The Privacy Pass HTTP authentication scheme: challenges sent by origins
//! and tokens presented by clients.

pub mod authenticate;
pub mod authorize;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{digit1, space0},
    sequence::delimited,
};

pub(crate) fn opt_spaces(input: &str) -> IResult<&str, &str> {
    space0(input)
}

pub(crate) fn key_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-').parse(input)
}

fn base64_char(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-' | '_' | '='))
        .parse(input)
}

/// A base64 value, optionally wrapped in a quoted string.
pub(crate) fn base64_value(input: &str) -> IResult<&str, &str> {
    alt((delimited(tag("\""), base64_char, tag("\"")), base64_char)).parse(input)
}

pub(crate) fn number_value(input: &str) -> IResult<&str, &str> {
    alt((delimited(tag("\""), digit1, tag("\"")), digit1)).parse(input)
}

/// Any parameter value, used for parameters that are skipped.
pub(crate) fn any_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(tag("\""), take_while(|c: char| c != '"'), tag("\"")),
        take_while1(|c: char| c != ',' && !c.is_whitespace()),
    ))
    .parse(input)
}

pub(crate) fn failure(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::make_error(input, nom::error::ErrorKind::Tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_parsers() {
        assert_eq!(base64_value("\"YWJj\", rest"), Ok((", rest", "YWJj")));
        assert_eq!(base64_value("YW-_=="), Ok(("", "YW-_==")));
        assert_eq!(number_value("3600"), Ok(("", "3600")));
        assert_eq!(key_name("token-key=abc"), Ok(("=abc", "token-key")));
        assert!(key_name("=abc").is_err());
        assert_eq!(any_value("\"a, b\", c"), Ok((", c", "a, b")));
    }
}
