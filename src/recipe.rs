//! Shapes consumed by the recipe editor and the "send to recipe" flow.

use crate::config::ParseOptions;
use crate::params::ParameterSet;
use crate::parser::parse_options_line;
use crate::serializer::options_line;
use serde::{Deserialize, Serialize};

/// The three fields the recipe editor edits: prompt, negative prompt and
/// all other options as one comma-joined line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeFields {
    pub prompt: String,
    pub negative_prompt: String,
    pub options: String,
}

impl RecipeFields {
    pub fn from_params(params: &ParameterSet) -> Self {
        Self {
            prompt: params.prompt().to_string(),
            negative_prompt: params.negative_prompt().to_string(),
            options: options_line(params.options()),
        }
    }

    /// Re-reads edited fields with the same tokenizer and defaults as infotext.
    pub fn to_params(&self, options: &ParseOptions) -> ParameterSet {
        parse_options_line(&self.prompt, &self.negative_prompt, &self.options, options)
    }
}

/// Image reference carried in front of a send-to-recipe payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeImageRef {
    pub shortcut_id: String,
    pub filename: String,
}

/// Builds `"{shortcut_id}:{filename}\n{canonical text}"`.
pub fn compose_recipe_payload(shortcut_id: &str, filename: &str, canonical_text: &str) -> String {
    format!("{}:{}\n{}", shortcut_id.trim(), filename.trim(), canonical_text)
}

/// Splits a send-to-recipe payload at its first newline.
///
/// The header is split at its first `:`; a header without one is not an
/// image reference and yields `None` for it. The text part is returned as is.
pub fn split_recipe_payload(payload: &str) -> (Option<RecipeImageRef>, &str) {
    let (header, text) = payload.split_once('\n').unwrap_or((payload, ""));
    let image = header
        .split_once(':')
        .map(|(shortcut_id, filename)| (shortcut_id.trim(), filename.trim()))
        .filter(|(shortcut_id, filename)| !shortcut_id.is_empty() && !filename.is_empty())
        .map(|(shortcut_id, filename)| RecipeImageRef {
            shortcut_id: shortcut_id.to_string(),
            filename: filename.to_string(),
        });

    if image.is_none() {
        log::debug!("Recipe payload header {:?} is not an image reference", header);
    }
    (image, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_generation_parameters;
    use crate::serializer::to_canonical_text;

    const INFOTEXT: &str = "a cat\nNegative prompt: lowres\nSteps: 20, Sampler: Euler a, Seed: 7, Size: 512x768, ADetailer prompt: \"smile, eyes\"";

    #[test]
    fn test_fields_round_trip_through_editor() {
        let params = parse_generation_parameters(INFOTEXT);
        let fields = RecipeFields::from_params(&params);

        assert_eq!(fields.prompt, "a cat");
        assert_eq!(fields.negative_prompt, "lowres");
        assert!(fields.options.starts_with("Steps: 20, Sampler: Euler a, Seed: 7"));
        assert!(fields.options.contains(r#"ADetailer prompt: "smile, eyes""#));

        let restored = fields.to_params(&ParseOptions::default());
        assert_eq!(restored, params);
    }

    #[test]
    fn test_edited_options_line_is_reparsed() {
        let fields = RecipeFields {
            prompt: "a dog".to_string(),
            negative_prompt: String::new(),
            options: "Seed: 1, Steps: 12".to_string(),
        };
        let params = fields.to_params(&ParseOptions::raw());
        assert_eq!(params.get("Steps"), Some("12"));
        assert_eq!(params.options().len(), 2);
    }

    #[test]
    fn test_payload_round_trip() {
        let canonical = to_canonical_text(&parse_generation_parameters(INFOTEXT));
        let payload = compose_recipe_payload("12345", "image_01.png", &canonical);
        assert!(payload.starts_with("12345:image_01.png\n"));

        let (image, text) = split_recipe_payload(&payload);
        let image = image.expect("payload should carry an image reference");
        assert_eq!(image.shortcut_id, "12345");
        assert_eq!(image.filename, "image_01.png");
        assert_eq!(text, canonical);
        assert_eq!(parse_generation_parameters(text).prompt(), "a cat");
    }

    #[test]
    fn test_filename_may_contain_colons() {
        let (image, text) = split_recipe_payload("9:weird:name.png\nprompt");
        let image = image.expect("expected image reference");
        assert_eq!(image.shortcut_id, "9");
        assert_eq!(image.filename, "weird:name.png");
        assert_eq!(text, "prompt");
    }

    #[test]
    fn test_header_without_reference() {
        let (image, text) = split_recipe_payload("no reference here");
        assert!(image.is_none());
        assert_eq!(text, "");
    }
}
