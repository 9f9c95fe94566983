use crate::classify::classify_lines;
use crate::config::ParseOptions;
use crate::defaults::{apply_default_table, apply_hypernet_tag};
use crate::params::{ImageInfo, ParameterSet, RawSource};
use crate::source::{normalize_plain_text, normalize_source};
use crate::tokenizer::tokenize_parameters;
use indexmap::IndexMap;

/// Parses A1111/Forge infotext into a `ParameterSet` with default options.
///
/// Format: `{prompt}\nNegative prompt: {neg}\nSteps: N, Sampler: X, ...`
///
/// Handles:
/// - colons in prompt weights like `(masterpiece:1.2)`
/// - commas within prompt text and within quoted parameter values
/// - a leading `Prompt:` label or `Generated using …` banner
/// - missing negative prompt section
/// - metadata with only a parameter line (no prompt text)
pub fn parse_generation_parameters(text: &str) -> ParameterSet {
    parse_text_with(text, &ParseOptions::default())
}

pub fn parse_text_with(text: &str, options: &ParseOptions) -> ParameterSet {
    parse_normalized(&normalize_plain_text(text), options)
}

/// Parses any supported source. Unsupported sources give an empty set.
pub fn parse_source(source: &RawSource) -> ParameterSet {
    parse_source_with(source, &ParseOptions::default())
}

pub fn parse_source_with(source: &RawSource, options: &ParseOptions) -> ParameterSet {
    match normalize_source(source) {
        Some(text) => parse_normalized(&text, options),
        None => ParameterSet::empty(),
    }
}

/// Parses the text chunks of an image (PNG `parameters` or NovelAI).
pub fn parse_image_info(info: &ImageInfo, options: &ParseOptions) -> ParameterSet {
    parse_source_with(&RawSource::from_image_info(info), options)
}

/// Parses a bare options line (`Steps: 20, Sampler: ...`) on top of a
/// prompt pair, as the recipe editor stores them.
pub fn parse_options_line(
    prompt: &str,
    negative_prompt: &str,
    options_line: &str,
    options: &ParseOptions,
) -> ParameterSet {
    let pairs = tokenize_parameters(options_line.trim());
    let has_parameters = !pairs.is_empty();
    finish(
        prompt.trim().to_string(),
        negative_prompt.trim().to_string(),
        pairs,
        has_parameters,
        options,
    )
}

fn parse_normalized(text: &str, options: &ParseOptions) -> ParameterSet {
    let classified = classify_lines(text, options);
    let (pairs, has_parameters) = match classified.parameter_line.as_deref() {
        Some(line) => (tokenize_parameters(line), true),
        None => (IndexMap::new(), false),
    };
    finish(
        classified.prompt,
        classified.negative_prompt,
        pairs,
        has_parameters,
        options,
    )
}

fn finish(
    prompt: String,
    negative_prompt: String,
    mut pairs: IndexMap<String, String>,
    has_parameters: bool,
    options: &ParseOptions,
) -> ParameterSet {
    if has_parameters && options.inject_defaults {
        apply_default_table(&mut pairs);
    }
    let prompt = apply_hypernet_tag(&prompt, &pairs);
    ParameterSet::new(prompt, negative_prompt, pairs)
}
