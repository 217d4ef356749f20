//! Message templates and plain-text flattening
//!
//! Templates contain `{name}` placeholders. Rendering is a single left-to-right pass:
//! a placeholder whose name is in the payload becomes the payload value, anything else
//! is copied through untouched. Substituted values are never scanned again.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::EventPayload;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"));

/// Legacy `§` formatting codes used by older chat components.
static LEGACY_FORMATTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)§[0-9a-fk-orx]").expect("formatting pattern is valid"));

/// Substitute payload values into `template`.
pub fn render(template: &str, payload: &EventPayload) -> String {
    if payload.is_empty() {
        return template.to_string();
    }

    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match payload.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Collapse a structured chat component into text without styling.
///
/// Accepts the JSON text-component shape: a plain string, an array of components,
/// or an object with `text`, `translate`/`with`, `keybind`, `selector`, `score` and
/// `extra` children. Styling fields are ignored. `None` and `null` yield `""`.
pub fn plain_text(component: Option<&Value>) -> String {
    let mut out = String::new();
    if let Some(component) = component {
        append_plain(&mut out, component);
    }
    LEGACY_FORMATTING.replace_all(&out, "").into_owned()
}

fn append_plain(out: &mut String, component: &Value) {
    match component {
        Value::Null => {}
        Value::String(text) => out.push_str(text),
        Value::Bool(_) | Value::Number(_) => out.push_str(&component.to_string()),
        Value::Array(children) => {
            for child in children {
                append_plain(out, child);
            }
        }
        Value::Object(fields) => {
            if let Some(Value::String(text)) = fields.get("text") {
                out.push_str(text);
            } else if let Some(Value::String(key)) = fields.get("translate") {
                let args = fields
                    .get("with")
                    .and_then(Value::as_array)
                    .map(|args| {
                        args.iter()
                            .map(|arg| {
                                let mut text = String::new();
                                append_plain(&mut text, arg);
                                text
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                out.push_str(&apply_translation_args(key, &args));
            } else if let Some(Value::String(key)) = fields.get("keybind") {
                out.push_str(key);
            } else if let Some(Value::String(selector)) = fields.get("selector") {
                out.push_str(selector);
            } else if let Some(score) = fields.get("score") {
                if let Some(Value::String(value)) = score.get("value") {
                    out.push_str(value);
                }
            }

            if let Some(extra) = fields.get("extra") {
                append_plain(out, extra);
            }
        }
    }
}

/// Fill `%s` and `%1$s` style slots of a translation key with its arguments.
///
/// Without a translation table the key itself is the format string; a key with no
/// slots is followed by its arguments so no information is dropped.
fn apply_translation_args(format: &str, args: &[String]) -> String {
    if !format.contains('%') {
        if args.is_empty() {
            return format.to_string();
        }
        return format!("{} {}", format, args.join(" "));
    }

    let mut out = String::with_capacity(format.len());
    let mut next_arg = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') => {
                chars.next();
                out.push_str(args.get(next_arg).map(String::as_str).unwrap_or_default());
                next_arg += 1;
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                // positional form is `%<n>$s`
                if chars.peek() == Some(&'$') {
                    chars.next();
                    if chars.peek() == Some(&'s') {
                        chars.next();
                    }
                    let index = digits.parse::<usize>().unwrap_or(1).saturating_sub(1);
                    out.push_str(args.get(index).map(String::as_str).unwrap_or_default());
                } else {
                    out.push('%');
                    out.push_str(&digits);
                }
            }
            _ => out.push('%'),
        }
    }

    out
}
