//! Bounded, never-failing textual rendering of captured values.
//!
//! Values come from learner code, so their size and their representation hooks
//! are both untrusted. [`SafeRepr`] caps string length, container width and
//! nesting depth, and contains any failure of a dynamic object's hook behind a
//! placeholder.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::value::{ObjectRepr, Value};

/// Limits applied by [`SafeRepr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReprLimits {
    /// Longest rendering (in characters) of a single scalar before it is
    /// middle-truncated with `...`.
    pub max_string_len: usize,
    /// Maximum number of items shown per container.
    pub max_parts: usize,
    /// Maximum container nesting depth.
    pub max_level: usize,
}

impl Default for ReprLimits {
    fn default() -> Self {
        Self {
            max_string_len: 60,
            max_parts: 6,
            max_level: 3,
        }
    }
}

/// Safe value renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeRepr {
    limits: ReprLimits,
}

impl SafeRepr {
    #[must_use]
    pub const fn new(limits: ReprLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> ReprLimits {
        self.limits
    }

    /// Renders `value`. Never fails and never panics on behalf of the value.
    #[must_use]
    pub fn render(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_value(value, self.limits.max_level, &mut out);
        out
    }

    fn write_value(&self, value: &Value, level: usize, out: &mut String) {
        match value {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&float_repr(*f)),
            Value::Str(s) => out.push_str(&self.truncate(&str_repr(s))),
            Value::Bytes(b) => out.push_str(&self.truncate(&bytes_repr(b))),
            Value::List(items) => self.write_items(items, "[", "]", level, out),
            Value::Tuple(items) if items.len() == 1 && level > 0 => {
                out.push('(');
                self.write_value(&items[0], level - 1, out);
                out.push_str(",)");
            }
            Value::Tuple(items) => self.write_items(items, "(", ")", level, out),
            Value::Set(items) if items.is_empty() => out.push_str("set()"),
            Value::Set(items) => self.write_items(items, "{", "}", level, out),
            Value::Dict(pairs) => self.write_dict(pairs, level, out),
            Value::Opaque { type_name, repr } => match repr {
                Some(repr) => out.push_str(&self.truncate(repr)),
                None => out.push_str(&failed_repr(type_name)),
            },
            Value::Dynamic(object) => out.push_str(&self.dynamic_repr(object.as_ref())),
        }
    }

    fn write_items(&self, items: &[Value], open: &str, close: &str, level: usize, out: &mut String) {
        out.push_str(open);
        if !items.is_empty() {
            if level == 0 {
                out.push_str("...");
            } else {
                let mut first = true;
                for item in items.iter().take(self.limits.max_parts) {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    self.write_value(item, level - 1, out);
                }
                if items.len() > self.limits.max_parts {
                    out.push_str(if first { "..." } else { ", ..." });
                }
            }
        }
        out.push_str(close);
    }

    fn write_dict(&self, pairs: &[(Value, Value)], level: usize, out: &mut String) {
        out.push('{');
        if !pairs.is_empty() {
            if level == 0 {
                out.push_str("...");
            } else {
                let mut first = true;
                for (key, value) in pairs.iter().take(self.limits.max_parts) {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    self.write_value(key, level - 1, out);
                    out.push_str(": ");
                    self.write_value(value, level - 1, out);
                }
                if pairs.len() > self.limits.max_parts {
                    out.push_str(if first { "..." } else { ", ..." });
                }
            }
        }
        out.push('}');
    }

    fn dynamic_repr(&self, object: &dyn ObjectRepr) -> String {
        match panic::catch_unwind(AssertUnwindSafe(|| object.repr())) {
            Ok(Ok(repr)) => self.truncate(&repr),
            Ok(Err(err)) => {
                warn!(%err, "object repr raised, using placeholder");
                failed_repr(&safe_type_name(object))
            }
            Err(_) => {
                warn!("object repr panicked, using placeholder");
                failed_repr(&safe_type_name(object))
            }
        }
    }

    fn truncate(&self, text: &str) -> String {
        truncate_middle(text, self.limits.max_string_len)
    }
}

fn safe_type_name(object: &dyn ObjectRepr) -> String {
    panic::catch_unwind(AssertUnwindSafe(|| object.type_name().to_owned())).unwrap_or_else(|_| "object".to_owned())
}

fn failed_repr(type_name: &str) -> String {
    format!("<{type_name} instance (exception in repr)>")
}

/// Keeps the start and end of `text`, replacing the middle with `...` so the
/// result is at most `max_len` characters.
fn truncate_middle(text: &str, max_len: usize) -> String {
    let len = text.chars().count();
    if len <= max_len {
        return text.to_owned();
    }
    let keep = max_len.saturating_sub(3);
    let left = keep / 2;
    let right = keep - left;
    let head: String = text.chars().take(left).collect();
    let tail: String = text.chars().skip(len - right).collect();
    format!("{head}...{tail}")
}

/// Returns the learner-language repr of a string, quoting like CPython.
fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() && u32::from(c) < 0x100 => out.push_str(&format!("\\x{:02x}", u32::from(c))),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Returns a CPython-compatible repr string for bytes.
fn bytes_repr(bytes: &[u8]) -> String {
    // Determine quote character: use double quotes if single quote present but not double
    let has_single = bytes.contains(&b'\'');
    let has_double = bytes.contains(&b'"');
    let quote = if has_single && !has_double { '"' } else { '\'' };

    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\'' if quote == '\'' => out.push_str("\\'"),
            b'"' if quote == '"' => out.push_str("\\\""),
            // Printable ASCII (32-126)
            0x20..=0x7e => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push(quote);
    out
}

/// Returns a float's repr matching CPython: `inf`, `nan`, `1.0`, `1e+20`,
/// `1e-05`.
///
/// ryu finds the shortest round-tripping digits; the layout is then redone
/// with CPython's rule of exponent notation below `1e-4` and from `1e16` up,
/// with at least two exponent digits.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }

    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format(f);
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (mantissa, exponent) = match unsigned.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all_digits = format!("{int_part}{frac_part}");
    let digits = all_digits.trim_start_matches('0');
    let leading_zeros = all_digits.len() - digits.len();
    let digits = digits.trim_end_matches('0');
    if digits.is_empty() {
        return format!("{sign}0.0");
    }
    // position of the decimal point relative to the first significant digit
    let point = i32::try_from(int_part.len()).unwrap_or(i32::MAX) + exponent
        - i32::try_from(leading_zeros).unwrap_or(i32::MAX);
    let scientific = point - 1;

    if !(-4..16).contains(&scientific) {
        let (first, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() { String::new() } else { format!(".{rest}") };
        let exp_sign = if scientific < 0 { '-' } else { '+' };
        return format!("{sign}{first}{fraction}e{exp_sign}{:02}", scientific.unsigned_abs());
    }

    let count = i32::try_from(digits.len()).unwrap_or(i32::MAX);
    let body = if point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else if point >= count {
        format!("{digits}{}.0", "0".repeat((point - count).unsigned_abs() as usize))
    } else {
        let (whole, fraction) = digits.split_at(point.unsigned_abs() as usize);
        format!("{whole}.{fraction}")
    };
    format!("{sign}{body}")
}
