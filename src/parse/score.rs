use crate::error::{Result, ScoreError};
use crate::model::ParsedMatch;
use nom::{
    character::complete::digit1,
    combinator::{all_consuming, map_res},
    IResult, Parser,
};

use super::normalize;

/// Accepted separators for a combined score, in priority order
pub const SEPARATORS: [char; 3] = ['-', ':', '/'];

/// A run of ASCII digits that fits a point count
fn points(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>).parse(input)
}

fn parse_points(s: &str) -> Result<u32> {
    all_consuming(points)
        .parse(s)
        .map(|(_, p)| p)
        .map_err(|_| ScoreError::InvalidScore(s.to_string()))
}

/// Split a combined score like "9-10", "9:10" or "9/10".
///
/// The first separator present (by priority) is used; the split must yield
/// exactly two parts.
pub fn split_score(score: &str) -> Result<(&str, &str)> {
    let sep = SEPARATORS
        .iter()
        .copied()
        .find(|sep| score.contains(*sep))
        .ok_or_else(|| ScoreError::InvalidScore(score.to_string()))?;

    let parts: Vec<&str> = score.split(sep).collect();
    match parts.as_slice() {
        [a, b] => Ok((a, b)),
        _ => Err(ScoreError::InvalidScore(score.to_string())),
    }
}

/// Parse normalized tokens into a match.
///
/// Four tokens carry the points separately, three tokens carry a combined
/// score. The token count alone decides the form.
pub fn parse_tokens(tokens: &[String]) -> Result<ParsedMatch> {
    let (raw_a, raw_b) = match tokens {
        [_, _, a, b] => (a.as_str(), b.as_str()),
        [_, _, score] => split_score(score)?,
        _ => return Err(ScoreError::MalformedInput(tokens.join(" "))),
    };

    let (name_a, name_b) = (&tokens[0], &tokens[1]);
    if name_a.to_lowercase() == name_b.to_lowercase() {
        return Err(ScoreError::DuplicateParticipant(tokens.join(" ")));
    }

    let points_a = parse_points(raw_a)?;
    let points_b = parse_points(raw_b)?;

    Ok(ParsedMatch {
        name_a: name_a.clone(),
        name_b: name_b.clone(),
        points_a,
        points_b,
    })
}

/// Normalize and parse one line of user input
pub fn parse_line(line: &str) -> Result<ParsedMatch> {
    parse_tokens(&normalize(line))
}
