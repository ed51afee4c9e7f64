use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::SecondsFormat;
use revcheck_types::Value;

/// Render a value as compact Ion text that [`crate::parse`] reads back.
pub fn to_text(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Append the Ion text form of `value` to `out`.
pub fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => write_float(out, *f),
        Value::Decimal(text) => out.push_str(text),
        Value::Timestamp(ts) => out.push_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::String(s) => write_quoted(out, s, '"'),
        Value::Symbol(s) => write_symbol(out, s),
        Value::Blob(bytes) => {
            out.push_str("{{");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("}}");
        }
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Struct(fields) => {
            out.push('{');
            for (i, (name, item)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_symbol(out, name);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("nan");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "+inf" } else { "-inf" });
    } else {
        // Ion requires an exponent to mark a float.
        let _ = write!(out, "{f:e}");
    }
}

fn write_symbol(out: &mut String, s: &str) {
    if is_bare_symbol(s) {
        out.push_str(s);
    } else {
        write_quoted(out, s, '\'');
    }
}

fn is_bare_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !matches!(s, "null" | "true" | "false" | "nan")
}

fn write_quoted(out: &mut String, s: &str, quote: char) {
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::reader::parse;

    #[test]
    fn proof_list_text() {
        let v = Value::List(vec![Value::Blob(vec![0, 1, 2]), Value::Blob(vec![3, 4, 5])]);
        assert_eq!(to_text(&v), "[{{AAEC}},{{AwQF}}]");
    }

    #[test]
    fn block_address_text() {
        let v = Value::structure([
            ("strandId", Value::from("JdxjkR9bSYB5jMHWcI464T")),
            ("sequenceNo", Value::from(14)),
        ]);
        assert_eq!(
            to_text(&v),
            r#"{strandId:"JdxjkR9bSYB5jMHWcI464T",sequenceNo:14}"#
        );
    }

    #[test]
    fn keywords_and_odd_names_are_quoted() {
        let v = Value::structure([("null", Value::Symbol("a b".into()))]);
        assert_eq!(to_text(&v), "{'null':'a b'}");
    }

    #[test]
    fn floats_carry_exponent() {
        assert_eq!(to_text(&Value::Float(1.5)), "1.5e0");
        assert_eq!(to_text(&Value::Float(f64::NEG_INFINITY)), "-inf");
    }

    #[test]
    fn document_reads_back() {
        let ts = DateTime::parse_from_rfc3339("2019-06-05T21:43:48.506Z").unwrap();
        let doc = Value::structure([
            ("name", Value::from("quote \" and \\ and\nnewline")),
            ("count", Value::from(-3)),
            ("price", Value::Decimal("24.50".into())),
            ("ratio", Value::Float(0.25)),
            ("when", Value::Timestamp(ts)),
            ("raw", Value::Blob(vec![0xde, 0xad])),
            ("tags", Value::List(vec![Value::Symbol("x".into()), Value::Null])),
            ("ok", Value::Bool(true)),
        ]);
        assert_eq!(parse(&to_text(&doc)).unwrap(), doc);
    }
}
