//! Source adapters: turn each supported input shape into plain infotext.
//!
//! All per-origin differences live here. Everything downstream only ever
//! sees WebUI-style text.

use crate::defaults::novelai_sampler_name;
use crate::params::RawSource;
use crate::serializer::{format_metadata_to_auto1111, quote_value};
use serde_json::Value;

const GENERATED_USING_BANNER: &str = "generated using";
const PROMPT_PREFIX: &str = "prompt:";
/// Fixed options NovelAI images were generated with.
const NOVELAI_TRAILER: &str = "Clip skip: 2, ENSD: 31337";

/// Normalizes a source to infotext. `None` means no adapter applies.
pub fn normalize_source(source: &RawSource) -> Option<String> {
    match source {
        RawSource::PlainText(text) => Some(normalize_plain_text(text)),
        RawSource::CivitaiMeta(meta) => {
            if meta.is_object() {
                Some(format_metadata_to_auto1111(meta))
            } else {
                log::warn!("Civitai metadata is not a JSON object; ignoring it");
                None
            }
        }
        RawSource::NovelAiComment {
            description,
            comment,
            width,
            height,
        } => Some(normalize_novelai(description, comment, *width, *height)),
        RawSource::Unsupported { origin } => {
            log::debug!("No adapter for metadata source: {}", origin);
            None
        }
    }
}

/// Drops `Generated using …` banners and leading `Prompt:` labels.
///
/// Stripping repeats until neither marker leads the text, so the prompt that
/// comes out can never start with one and be dropped on a second parse.
pub fn normalize_plain_text(text: &str) -> String {
    let mut body = text.trim_start();

    loop {
        let (first_line, rest) = split_first_line(body);
        if first_line
            .trim()
            .to_ascii_lowercase()
            .starts_with(GENERATED_USING_BANNER)
        {
            body = rest.trim_start();
        } else if starts_with_ignore_case(body, PROMPT_PREFIX) {
            body = body[PROMPT_PREFIX.len()..].trim_start();
        } else {
            break;
        }
    }

    body.to_string()
}

fn split_first_line(text: &str) -> (&str, &str) {
    match text.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (text, ""),
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Rebuilds WebUI infotext from NovelAI `Description` and `Comment` chunks.
///
/// A comment that is not a JSON object is handed to the plain-text adapter.
pub fn normalize_novelai(
    description: &str,
    comment: &str,
    width: Option<u32>,
    height: Option<u32>,
) -> String {
    let comment_json = match serde_json::from_str::<Value>(comment) {
        Ok(value) if value.is_object() => value,
        Ok(_) => {
            log::warn!("NovelAI comment is not a JSON object; treating it as plain text");
            return normalize_plain_text(comment);
        }
        Err(error) => {
            log::warn!(
                "Error parsing NovelAI generation parameters, treating comment as plain text: {}",
                error
            );
            return normalize_plain_text(comment);
        }
    };

    let mut lines = Vec::with_capacity(3);
    let description = description.trim();
    if !description.is_empty() {
        lines.push(description.to_string());
    }

    if let Some(negative) = comment_text(&comment_json, "uc").filter(|text| !text.is_empty()) {
        lines.push(format!("Negative prompt: {}", negative));
    }

    let sampler = comment_text(&comment_json, "sampler").unwrap_or_default();
    let mut params = Vec::new();
    if let Some(steps) = comment_text(&comment_json, "steps") {
        params.push(format!("Steps: {}", quote_value(&steps)));
    }
    params.push(format!("Sampler: {}", novelai_sampler_name(&sampler)));
    if let Some(scale) = comment_text(&comment_json, "scale") {
        params.push(format!("CFG scale: {}", quote_value(&scale)));
    }
    if let Some(seed) = comment_text(&comment_json, "seed") {
        params.push(format!("Seed: {}", quote_value(&seed)));
    }

    let width = width.or_else(|| comment_u32(&comment_json, "width"));
    let height = height.or_else(|| comment_u32(&comment_json, "height"));
    if let (Some(width), Some(height)) = (width, height) {
        params.push(format!("Size: {}x{}", width, height));
    }
    params.push(NOVELAI_TRAILER.to_string());

    lines.push(params.join(", "));
    lines.join("\n")
}

fn comment_text(comment: &Value, key: &str) -> Option<String> {
    match comment.get(key)? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        _ => None,
    }
}

fn comment_u32(comment: &Value, key: &str) -> Option<u32> {
    comment
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}
