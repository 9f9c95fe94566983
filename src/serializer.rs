use crate::classify::clean_prompt_text;
use crate::params::ParameterSet;
use indexmap::IndexMap;
use serde_json::{Map, Value};

const STEPS: &str = "Steps";
const ADETAILER_PREFIX: &str = "ADetailer ";

/// Renders a parameter set as WebUI infotext.
///
/// ```text
/// {prompt}
/// Negative prompt: {negative prompt}
/// Steps: 20, Sampler: Euler a, ...
/// ```
///
/// Empty prompt or negative prompt lines are omitted. Options keep their
/// order except `Steps`, which always leads the parameter line.
pub fn to_canonical_text(params: &ParameterSet) -> String {
    let mut lines = Vec::with_capacity(3);
    if !params.prompt().is_empty() {
        lines.push(params.prompt().to_string());
    }
    if !params.negative_prompt().is_empty() {
        lines.push(format!("Negative prompt: {}", params.negative_prompt()));
    }

    let options_line = options_line(params.options());
    if !options_line.is_empty() {
        lines.push(options_line);
    }

    lines.join("\n")
}

/// Joins options into a single `Key: value, ...` line, `Steps` first.
pub fn options_line(options: &IndexMap<String, String>) -> String {
    let steps = options.get(STEPS).map(|value| format_pair(STEPS, value));
    steps
        .into_iter()
        .chain(
            options
                .iter()
                .filter(|(key, _)| key.as_str() != STEPS)
                .map(|(key, value)| format_pair(key, value)),
        )
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_pair(key: &str, value: &str) -> String {
    format!("{}: {}", key, quote_value(value))
}

/// Quotes a value the way WebUI does, so it tokenizes back to itself.
///
/// Values holding separators, quotes, control characters or surrounding
/// whitespace become JSON string literals; everything else is written bare.
pub fn quote_value(value: &str) -> String {
    let needs_quotes = value.trim() != value
        || value
            .chars()
            .any(|c| matches!(c, ',' | ':' | '"') || c.is_control());
    if !needs_quotes {
        return value.to_string();
    }
    Value::String(value.to_string()).to_string()
}

/// Renders a Civitai image `meta` object as WebUI infotext.
///
/// Only a fixed subset of fields is emitted, in a fixed order; everything
/// else in the object is dropped. `ADetailer *` keys follow the order in
/// which they appear in the object.
pub fn format_metadata_to_auto1111(meta: &Value) -> String {
    let Some(object) = meta.as_object() else {
        log::debug!("Civitai metadata is not an object; nothing to format");
        return String::new();
    };

    let mut lines = Vec::with_capacity(3);
    if let Some(prompt) = prompt_field(object, "prompt") {
        lines.push(prompt);
    }
    if let Some(negative) = prompt_field(object, "negativePrompt") {
        lines.push(format!("Negative prompt: {}", negative));
    }

    let mut pairs = Vec::new();
    push_field(&mut pairs, object, "Steps", &["steps"]);
    push_field(&mut pairs, object, "Sampler", &["sampler"]);
    push_field(&mut pairs, object, "Schedule type", &["Schedule type", "scheduler"]);
    push_field(&mut pairs, object, "CFG scale", &["cfgScale"]);
    push_field(&mut pairs, object, "Seed", &["seed"]);
    if let Some(size) = civitai_size(object) {
        pairs.push(format_pair("Size", &size));
    }
    push_field(&mut pairs, object, "Model hash", &["Model hash"]);
    push_field(&mut pairs, object, "Model", &["Model"]);
    push_field(&mut pairs, object, "Denoising strength", &["Denoising strength"]);
    push_field(&mut pairs, object, "Clip skip", &["Clip skip"]);
    for (key, value) in object {
        if key.starts_with(ADETAILER_PREFIX) {
            if let Some(text) = scalar_text(value) {
                pairs.push(format_pair(key, &text));
            }
        }
    }
    push_field(&mut pairs, object, "Hires upscale", &["Hires upscale"]);
    push_field(&mut pairs, object, "Hires steps", &["Hires steps"]);
    push_field(&mut pairs, object, "Hires upscaler", &["Hires upscaler"]);
    push_field(&mut pairs, object, "Lora hashes", &["Lora hashes"]);
    push_field(&mut pairs, object, "Version", &["Version"]);

    if !pairs.is_empty() {
        lines.push(pairs.join(", "));
    }
    lines.join("\n")
}

fn push_field(pairs: &mut Vec<String>, object: &Map<String, Value>, label: &str, keys: &[&str]) {
    if let Some(text) = text_field(object, keys) {
        pairs.push(format_pair(label, &text));
    }
}

/// Prompt text cleaned the same way the line classifier cleans it.
fn prompt_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    text_field(object, &[key])
        .map(|text| clean_prompt_text(&text))
        .filter(|text| !text.is_empty())
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(if *boolean { "True" } else { "False" }.to_string()),
        _ => None,
    }
}

fn civitai_size(object: &Map<String, Value>) -> Option<String> {
    if let Some(size) = text_field(object, &["Size"]).filter(|text| !text.is_empty()) {
        return Some(size);
    }
    let width = object.get("width").and_then(Value::as_u64)?;
    let height = object.get("height").and_then(Value::as_u64)?;
    Some(format!("{}x{}", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(prompt: &str, negative: &str, pairs: &[(&str, &str)]) -> ParameterSet {
        pairs
            .iter()
            .fold(ParameterSet::new(prompt, negative, IndexMap::new()), |set, (key, value)| {
                set.with_option(*key, *value)
            })
    }

    #[test]
    fn test_three_line_shape() {
        let set = params(
            "a cat",
            "lowres",
            &[("Sampler", "Euler a"), ("Steps", "20"), ("Seed", "42")],
        );
        assert_eq!(
            to_canonical_text(&set),
            "a cat\nNegative prompt: lowres\nSteps: 20, Sampler: Euler a, Seed: 42"
        );
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let set = params("", "", &[("Seed", "1"), ("Sampler", "Euler")]);
        assert_eq!(to_canonical_text(&set), "Seed: 1, Sampler: Euler");

        let set = params("", "lowres", &[("Steps", "5")]);
        assert_eq!(to_canonical_text(&set), "Negative prompt: lowres\nSteps: 5");

        let set = params("only prompt", "", &[]);
        assert_eq!(to_canonical_text(&set), "only prompt");
    }

    #[test]
    fn test_values_with_separators_are_quoted() {
        assert_eq!(quote_value("Euler a"), "Euler a");
        assert_eq!(quote_value("model, v2"), r#""model, v2""#);
        assert_eq!(quote_value("a: 1"), r#""a: 1""#);
        assert_eq!(quote_value(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote_value(" padded"), r#"" padded""#);
        assert_eq!(quote_value("two\nlines"), r#""two\nlines""#);
        assert_eq!(quote_value(""), "");
    }

    #[test]
    fn test_civitai_fixed_order_and_dropped_keys() {
        let meta = json!({
            "Version": "v1.9.4",
            "seed": 123,
            "unknownKey": "dropped",
            "ADetailer model": "face_yolov8n.pt",
            "prompt": "a cat",
            "Lora hashes": "styleA: 0a1b, styleB: 2c3d",
            "cfgScale": 7.5,
            "steps": 28,
            "ADetailer confidence": 0.3,
            "negativePrompt": "lowres",
            "sampler": "DPM++ 2M Karras",
            "Size": "512x768",
            "Model": "anything-v5",
            "Hires upscale": 2,
            "Model hash": "abc123"
        });

        assert_eq!(
            format_metadata_to_auto1111(&meta),
            "a cat\nNegative prompt: lowres\n\
             Steps: 28, Sampler: DPM++ 2M Karras, CFG scale: 7.5, Seed: 123, Size: 512x768, \
             Model hash: abc123, Model: anything-v5, ADetailer model: face_yolov8n.pt, \
             ADetailer confidence: 0.3, Hires upscale: 2, \
             Lora hashes: \"styleA: 0a1b, styleB: 2c3d\", Version: v1.9.4"
        );
    }

    #[test]
    fn test_civitai_prompts_drop_trailing_commas() {
        let meta = json!({
            "prompt": "masterpiece, best quality,",
            "negativePrompt": "lowres, bad hands, ",
            "steps": 20
        });
        assert_eq!(
            format_metadata_to_auto1111(&meta),
            "masterpiece, best quality\nNegative prompt: lowres, bad hands\nSteps: 20"
        );

        let meta = json!({"prompt": ",", "steps": 20});
        assert_eq!(format_metadata_to_auto1111(&meta), "Steps: 20");
    }

    #[test]
    fn test_civitai_size_from_dimensions() {
        let meta = json!({"prompt": "x", "steps": 10, "width": 832, "height": 1216});
        assert_eq!(
            format_metadata_to_auto1111(&meta),
            "x\nSteps: 10, Size: 832x1216"
        );
    }

    #[test]
    fn test_civitai_non_object_is_empty() {
        assert_eq!(format_metadata_to_auto1111(&json!("text")), "");
    }
}
