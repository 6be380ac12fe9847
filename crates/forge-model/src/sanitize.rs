// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider compatibility rewrites for messages and tool schemas.
//!
//! Everything here is a pure function: input in, rewritten copy out.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::types::{ContentPart, Message, MessageContent, ToolSchema};

/// Image formats the Bedrock Converse API accepts.
pub const BEDROCK_IMAGE_FORMATS: &[&str] = &["gif", "jpeg", "png", "webp"];

const ATTACHMENT_NOTE: &str = "See attached content.";

// ─── Tool schemas ────────────────────────────────────────────────────────────

/// Remove `key` from every object nested anywhere inside `value`.
pub fn strip_key_recursive(value: &mut Value, key: &str) {
    match value {
        Value::Object(map) => {
            map.remove(key);
            for v in map.values_mut() {
                strip_key_recursive(v, key);
            }
        }
        Value::Array(items) => {
            for v in items {
                strip_key_recursive(v, key);
            }
        }
        _ => {}
    }
}

/// Apply [`strip_key_recursive`] to the parameter schema of every tool.
pub fn strip_schema_key(tools: Vec<ToolSchema>, key: &str) -> Vec<ToolSchema> {
    tools
        .into_iter()
        .map(|mut t| {
            strip_key_recursive(&mut t.parameters, key);
            t
        })
        .collect()
}

// ─── Bedrock content ─────────────────────────────────────────────────────────

/// Rewrite message content into a shape the Bedrock Converse API accepts.
///
/// - images in an unsupported format, or without bytes, become a text note
/// - document names are sanitized with [`sanitize_document_name`]
/// - every multi-part message carries at least one text block
/// - multi-part messages left without parts are dropped
pub fn adapt_for_bedrock(messages: Vec<Message>) -> Vec<Message> {
    messages.into_iter().filter_map(adapt_message).collect()
}

fn adapt_message(mut m: Message) -> Option<Message> {
    let parts = match m.content {
        MessageContent::ContentParts(parts) => parts,
        other => {
            m.content = other;
            return Some(m);
        }
    };
    let mut has_text = false;
    let mut adapted: Vec<ContentPart> = parts
        .into_iter()
        .map(|p| match p {
            ContentPart::Image { format, data } => {
                let format = format.to_ascii_lowercase();
                if BEDROCK_IMAGE_FORMATS.contains(&format.as_str()) && data.is_some() {
                    ContentPart::Image { format, data }
                } else {
                    has_text = true;
                    ContentPart::text(format!(
                        "[User uploaded a binary file of type '{format}' that cannot be displayed.]"
                    ))
                }
            }
            ContentPart::Document { name, format, data } => ContentPart::Document {
                name: sanitize_document_name(&name),
                format,
                data,
            },
            ContentPart::Text { text } => {
                has_text = true;
                ContentPart::Text { text }
            }
        })
        .collect();
    if adapted.is_empty() {
        return None;
    }
    if !has_text {
        adapted.push(ContentPart::text(ATTACHMENT_NOTE));
    }
    m.content = MessageContent::ContentParts(adapted);
    Some(m)
}

// ─── Document names ──────────────────────────────────────────────────────────

/// Turn an arbitrary file path into a Bedrock-legal document name.
///
/// Bedrock allows alphanumerics, whitespace, hyphens, parentheses and square
/// brackets.  Directories become a bracketed prefix (`[-docs-2024]` for a
/// relative path), extensions a bracketed suffix (`report[pdf]`).
pub fn sanitize_document_name(raw: &str) -> String {
    match raw {
        "" | "./" => return "document".to_string(),
        "/" => return "[-]".to_string(),
        _ => {}
    }

    let (dir, base) = match raw.rsplit_once('/') {
        Some((dir, base)) => (dir, base),
        None => ("", raw),
    };

    let mut stem = base;
    let mut extensions = Vec::new();
    while let Some(dot) = stem.rfind('.').filter(|&d| d > 0) {
        extensions.push(&stem[dot + 1..]);
        stem = &stem[..dot];
    }
    extensions.reverse();

    let mut out = String::new();
    let has_dir = raw.contains('/');
    if has_dir {
        let relative = dir.starts_with("./") || dir == ".";
        let segments: Vec<String> = dir
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(sanitize_part)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            if relative || raw.starts_with('/') {
                out.push_str("[-]");
            }
        } else if relative {
            out.push_str(&format!("[-{}]", segments.join("-")));
        } else {
            out.push_str(&format!("[{}]", segments.join("-")));
        }
    }

    let stem = sanitize_part(stem);
    if !stem.is_empty() {
        out.push_str(&stem);
    }
    for ext in extensions {
        let ext = sanitize_part(ext);
        if !ext.is_empty() {
            out.push_str(&format!("[{ext}]"));
        }
    }

    if out.is_empty() {
        "document".to_string()
    } else {
        out
    }
}

fn collapse_re() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| (Regex::new(r"-{2,}").unwrap(), Regex::new(r"\s{2,}").unwrap()))
}

fn sanitize_part(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '_' {
            out.push('-');
        } else if let Some(folded) = fold_accent(c) {
            out.push_str(folded);
        } else if c.is_ascii_alphanumeric() || c.is_whitespace() || "-()[]".contains(c) {
            out.push(c);
        }
    }
    let (hyphens, spaces) = collapse_re();
    let out = hyphens.replace_all(&out, "-");
    let out = spaces.replace_all(&out, " ");
    out.trim_matches(|c| c == '-' || c == ' ').to_string()
}

/// ASCII replacement for the common Latin-1 and Latin Extended-A letters.
fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'à'..='å' | 'ā' | 'ă' | 'ą' => "a",
        'Æ' => "AE",
        'æ' => "ae",
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'Ð' | 'Ď' | 'Đ' => "D",
        'ð' | 'ď' | 'đ' => "d",
        'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "G",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'Ĥ' | 'Ħ' => "H",
        'ĥ' | 'ħ' => "h",
        'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "I",
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'Ĵ' => "J",
        'ĵ' => "j",
        'Ķ' => "K",
        'ķ' | 'ĸ' => "k",
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "L",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => "N",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'ŉ' => "n",
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'Œ' => "OE",
        'œ' => "oe",
        'Ŕ' | 'Ŗ' | 'Ř' => "R",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => "S",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'Ţ' | 'Ť' | 'Ŧ' => "T",
        'ţ' | 'ť' | 'ŧ' => "t",
        'Þ' => "TH",
        'þ' => "th",
        'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ŵ' => "W",
        'ŵ' => "w",
        'Ý' | 'Ŷ' | 'Ÿ' => "Y",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ── Schema stripping ──────────────────────────────────────────────────────

    #[test]
    fn strips_key_at_every_depth() {
        let mut schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "items": {
                    "type": "array",
                    "items": {"type": "object", "additionalProperties": true}
                },
                "choice": {"anyOf": [{"type": "object", "additionalProperties": false}]}
            }
        });
        strip_key_recursive(&mut schema, "additionalProperties");
        assert!(!schema.to_string().contains("additionalProperties"));
        assert_eq!(schema["properties"]["items"]["type"], "array");
    }

    #[test]
    fn strip_schema_key_keeps_names_and_descriptions() {
        let tools = vec![ToolSchema {
            name: "t".into(),
            description: "d".into(),
            parameters: json!({"type": "object", "additionalProperties": false}),
        }];
        let out = strip_schema_key(tools, "additionalProperties");
        assert_eq!(out[0].name, "t");
        assert_eq!(out[0].parameters, json!({"type": "object"}));
    }

    // ── Bedrock content ───────────────────────────────────────────────────────

    #[test]
    fn unsupported_image_becomes_placeholder() {
        let msg = Message::user_with_parts(vec![
            ContentPart::text("what is this"),
            ContentPart::image("bmp", "Qk0="),
        ]);
        let out = adapt_for_bedrock(vec![msg]);
        match &out[0].content {
            MessageContent::ContentParts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[1], ContentPart::Text { text } if text.contains("'bmp'")));
            }
            other => panic!("expected ContentParts, got {other:?}"),
        }
    }

    #[test]
    fn supported_image_without_text_gets_note() {
        let msg = Message::user_with_parts(vec![ContentPart::image("PNG", "iVBOR")]);
        let out = adapt_for_bedrock(vec![msg]);
        match &out[0].content {
            MessageContent::ContentParts(parts) => {
                assert!(matches!(&parts[0], ContentPart::Image { format, .. } if format == "png"));
                assert!(matches!(&parts[1], ContentPart::Text { text } if text == ATTACHMENT_NOTE));
            }
            other => panic!("expected ContentParts, got {other:?}"),
        }
    }

    #[test]
    fn image_without_bytes_is_replaced() {
        let msg = Message::user_with_parts(vec![ContentPart::Image { format: "png".into(), data: None }]);
        let out = adapt_for_bedrock(vec![msg]);
        assert!(matches!(
            &out[0].content,
            MessageContent::ContentParts(p) if p.len() == 1 && matches!(&p[0], ContentPart::Text { .. })
        ));
    }

    #[test]
    fn document_names_are_sanitized_and_empty_messages_dropped() {
        let msgs = vec![
            Message::user_with_parts(vec![ContentPart::document("my_report.pdf", "pdf", "JVBER")]),
            Message::user_with_parts(vec![]),
            Message::assistant("plain text passes"),
        ];
        let out = adapt_for_bedrock(msgs);
        assert_eq!(out.len(), 2);
        match &out[0].content {
            MessageContent::ContentParts(parts) => {
                assert!(matches!(&parts[0], ContentPart::Document { name, .. } if name == "my-report[pdf]"));
            }
            other => panic!("expected ContentParts, got {other:?}"),
        }
        assert_eq!(out[1].as_text(), Some("plain text passes"));
    }

    // ── Document names ────────────────────────────────────────────────────────

    #[test]
    fn document_name_examples() {
        assert_eq!(sanitize_document_name("notes"), "notes");
        assert_eq!(sanitize_document_name("Café_menu.txt"), "Cafe-menu[txt]");
        assert_eq!(sanitize_document_name("archive.tar.gz"), "archive[tar][gz]");
        assert_eq!(sanitize_document_name("./docs/2024/plan.md"), "[-docs-2024]plan[md]");
        assert_eq!(sanitize_document_name("/etc/hosts"), "[etc]hosts");
        assert_eq!(sanitize_document_name(".hidden"), "hidden");
        assert_eq!(sanitize_document_name("/"), "[-]");
        assert_eq!(sanitize_document_name(""), "document");
        assert_eq!(sanitize_document_name("***.pdf"), "[pdf]");
        assert_eq!(sanitize_document_name("a  --  b"), "a - b");
    }
}
