//! Ion text reader.
//!
//! Covers the subset of Ion text the ledger service emits for query rows,
//! block addresses, and audit proofs: null (and typed nulls), bool, int,
//! float, decimal, timestamp, string, symbol, blob, list, and struct.
//! Annotations, s-expressions, clobs, long strings, and comments are rejected
//! as syntax errors.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate};
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while, take_while_m_n};
use nom::character::complete::{char, multispace0, satisfy};
use nom::combinator::{map, map_opt, map_res, opt, recognize, success, value};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::IResult;
use revcheck_types::Value;

use crate::error::{IonError, IonResult};

/// Parse exactly one top-level value, surrounded by optional whitespace.
pub fn parse(text: &str) -> IonResult<Value> {
    let (rest, parsed) = ws(ion_value)(text).map_err(|e| syntax_error(text, e))?;
    if !rest.is_empty() {
        return Err(IonError::TrailingInput {
            offset: text.len() - rest.len(),
        });
    }
    Ok(parsed)
}

/// Parse a stream of top-level values, as returned for a multi-row query.
pub fn parse_all(text: &str) -> IonResult<Vec<Value>> {
    let (rest, values) = preceded(multispace0, many0(ws(ion_value)))(text)
        .map_err(|e| syntax_error(text, e))?;
    if !rest.is_empty() {
        // Re-parse at the stop point to report the real syntax error.
        if let Err(e) = ion_value(rest) {
            return Err(syntax_error(text, e));
        }
        return Err(IonError::TrailingInput {
            offset: text.len() - rest.len(),
        });
    }
    Ok(values)
}

/// Parse one top-level value that must be a list.
pub fn parse_list(text: &str) -> IonResult<Vec<Value>> {
    match parse(text)? {
        Value::List(items) => Ok(items),
        other => Err(IonError::UnexpectedType {
            expected: "list",
            found: other.type_name(),
        }),
    }
}

/// Parse one top-level value that must be a struct.
pub fn parse_struct(text: &str) -> IonResult<Value> {
    let parsed = parse(text)?;
    if !parsed.is_struct() {
        return Err(IonError::UnexpectedType {
            expected: "struct",
            found: parsed.type_name(),
        });
    }
    Ok(parsed)
}

fn syntax_error(text: &str, err: nom::Err<nom::error::Error<&str>>) -> IonError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => IonError::Syntax {
            offset: text.len() - e.input.len(),
            reason: e.code.description().to_string(),
        },
        nom::Err::Incomplete(_) => IonError::Syntax {
            offset: text.len(),
            reason: "incomplete input".into(),
        },
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn ion_value(input: &str) -> IResult<&str, Value> {
    alt((
        blob,
        structure,
        list,
        map(string_literal, Value::String),
        map(quoted_symbol, Value::Symbol),
        scalar,
        keyword_or_symbol,
    ))(input)
}

fn blob(input: &str) -> IResult<&str, Value> {
    map_res(
        delimited(tag("{{"), take_while(|c: char| c != '}'), tag("}}")),
        |body: &str| {
            let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(compact).map(Value::Blob)
        },
    )(input)
}

fn list(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('['),
            alt((
                terminated(separated_list1(char(','), ws(ion_value)), opt(char(','))),
                success(Vec::new()),
            )),
            preceded(multispace0, char(']')),
        ),
        Value::List,
    )(input)
}

fn structure(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            char('{'),
            alt((
                terminated(separated_list1(char(','), field), opt(char(','))),
                success(Vec::new()),
            )),
            preceded(multispace0, char('}')),
        ),
        Value::Struct,
    )(input)
}

fn field(input: &str) -> IResult<&str, (String, Value)> {
    separated_pair(ws(field_name), char(':'), ws(ion_value))(input)
}

fn field_name(input: &str) -> IResult<&str, String> {
    alt((
        string_literal,
        quoted_symbol,
        map(identifier, str::to_string),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(is_not("\"\\"), '\\', escape_sequence)),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn quoted_symbol(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(
            opt(escaped_transform(is_not("'\\"), '\\', escape_sequence)),
            Option::unwrap_or_default,
        ),
        char('\''),
    )(input)
}

fn escape_sequence(input: &str) -> IResult<&str, char> {
    alt((
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
        value('/', char('/')),
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\0', char('0')),
        preceded(char('u'), unicode_escape),
        preceded(char('x'), byte_escape),
    ))(input)
}

fn unicode_escape(input: &str) -> IResult<&str, char> {
    map_opt(
        take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
        |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
    )(input)
}

fn byte_escape(input: &str) -> IResult<&str, char> {
    map_opt(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn keyword_or_symbol(input: &str) -> IResult<&str, Value> {
    let (rest, word) = identifier(input)?;
    match word {
        "null" => {
            // Typed nulls (`null.struct`, `null.int`, ...) carry no value.
            let (rest, _) = opt(preceded(char('.'), identifier))(rest)?;
            Ok((rest, Value::Null))
        }
        "true" => Ok((rest, Value::Bool(true))),
        "false" => Ok((rest, Value::Bool(false))),
        "nan" => Ok((rest, Value::Float(f64::NAN))),
        _ => Ok((rest, Value::Symbol(word.to_string()))),
    }
}

/// Numbers and timestamps share a leading character set, so both are read as
/// one token and classified afterwards.
fn scalar(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(pair(
            satisfy(|c| c.is_ascii_digit() || c == '-' || c == '+'),
            take_while(|c: char| {
                c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | ':' | '_')
            }),
        )),
        classify_scalar,
    )(input)
}

fn classify_scalar(token: &str) -> Result<Value, String> {
    match token {
        "+inf" => return Ok(Value::Float(f64::INFINITY)),
        "-inf" => return Ok(Value::Float(f64::NEG_INFINITY)),
        _ => {}
    }
    if looks_like_timestamp(token) {
        return parse_timestamp(token).map(Value::Timestamp);
    }

    let digits = token.replace('_', "");
    let (negative, body) = match digits.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, digits.as_str()),
    };

    let radix = if body.starts_with("0x") || body.starts_with("0X") {
        Some(16)
    } else if body.starts_with("0b") || body.starts_with("0B") {
        Some(2)
    } else {
        None
    };
    if let Some(radix) = radix {
        let magnitude = &body[2..];
        let signed = if negative {
            format!("-{magnitude}")
        } else {
            magnitude.to_string()
        };
        return i128::from_str_radix(&signed, radix)
            .map(Value::Int)
            .map_err(|e| format!("invalid int {token}: {e}"));
    }

    if body.contains(['e', 'E']) {
        return digits
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("invalid float {token}: {e}"));
    }
    if body.contains(['d', 'D', '.']) {
        digits
            .replace(['d', 'D'], "e")
            .parse::<f64>()
            .map_err(|e| format!("invalid decimal {token}: {e}"))?;
        return Ok(Value::Decimal(digits));
    }
    digits
        .parse::<i128>()
        .map(Value::Int)
        .map_err(|e| format!("invalid int {token}: {e}"))
}

fn looks_like_timestamp(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() >= 5
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && matches!(bytes[4], b'-' | b'T')
}

/// Ion timestamps range from year precision (`2019T`) to arbitrary fractional
/// seconds. Date-only forms are taken as midnight UTC.
fn parse_timestamp(token: &str) -> Result<DateTime<FixedOffset>, String> {
    let invalid = || format!("invalid timestamp: {token}");
    let number = |range: std::ops::Range<usize>| {
        token
            .get(range)
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(invalid)
    };
    let midnight = |month: u32, day: u32| -> Result<DateTime<FixedOffset>, String> {
        let year = number(0..4)? as i32;
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset())
            .ok_or_else(invalid)
    };

    let bytes = token.as_bytes();
    match bytes.len() {
        5 if bytes[4] == b'T' => midnight(1, 1),
        8 if bytes[4] == b'-' && bytes[7] == b'T' => midnight(number(5..7)?, 1),
        10 => midnight(number(5..7)?, number(8..10)?),
        11 if bytes[10] == b'T' => midnight(number(5..7)?, number(8..10)?),
        len if len > 11 && bytes[10] == b'T' => {
            let (date, rest) = token.split_at(11);
            let (time, offset) = if rest.ends_with('Z') || rest.ends_with('z') {
                (&rest[..rest.len() - 1], "Z")
            } else if rest.len() > 6 {
                rest.split_at(rest.len() - 6)
            } else {
                return Err(invalid());
            };
            let time = if time.len() == 5 {
                format!("{time}:00")
            } else {
                time.to_string()
            };
            DateTime::parse_from_rfc3339(&format!("{date}{time}{offset}"))
                .map_err(|e| format!("invalid timestamp {token}: {e}"))
        }
        _ => Err(invalid()),
    }
}
