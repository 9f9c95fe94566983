//! Splits normalized infotext into prompt, negative prompt and parameter line.
//!
//! Only the last line may be the parameter line, and whether it is one is a
//! heuristic: it must hold at least `param_line_threshold` `Key: value`
//! tokens, or start with `Steps: <number>` when the Steps anchor is enabled.
//! A prompt full of colons can fool it; the threshold is the knob for that.

use crate::config::ParseOptions;
use crate::tokenizer::count_parameter_pairs;
use once_cell::sync::Lazy;
use regex::Regex;

const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt:";

static STEPS_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*Steps:\s*\d+\s*(?:,|$)").expect("steps anchor pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CollectingPrompt,
    CollectingNegative,
    Done,
}

/// The three buckets of an infotext block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedText {
    pub prompt: String,
    pub negative_prompt: String,
    pub parameter_line: Option<String>,
}

/// Returns true if `line` qualifies as the parameter line.
pub fn is_parameter_line(line: &str, options: &ParseOptions) -> bool {
    if options.steps_anchor && STEPS_ANCHOR.is_match(line) {
        return true;
    }
    count_parameter_pairs(line) >= options.param_line_threshold.max(1)
}

pub fn classify_lines(text: &str, options: &ParseOptions) -> ClassifiedText {
    let text = text.trim();
    if text.is_empty() {
        return ClassifiedText::default();
    }

    let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
    let last_index = lines.len() - 1;
    let has_parameter_line = is_parameter_line(lines[last_index], options);

    let mut state = State::CollectingPrompt;
    let mut prompt_lines = Vec::new();
    let mut negative_lines = Vec::new();
    let mut parameter_line = None;

    for (index, line) in lines.iter().enumerate() {
        if index == last_index && has_parameter_line {
            parameter_line = Some(line.to_string());
            state = State::Done;
            break;
        }

        let mut line = *line;
        if let Some(rest) = line.strip_prefix(NEGATIVE_PROMPT_MARKER) {
            state = State::CollectingNegative;
            line = rest.trim();
        }

        match state {
            State::CollectingPrompt => prompt_lines.push(line),
            State::CollectingNegative => negative_lines.push(line),
            State::Done => break,
        }
    }

    log::debug!(
        "Classified {} line(s), parameter line {}, finished in {:?}",
        lines.len(),
        if parameter_line.is_some() { "found" } else { "absent" },
        state
    );

    ClassifiedText {
        prompt: clean_prompt_text(&prompt_lines.join("\n")),
        negative_prompt: clean_prompt_text(&negative_lines.join("\n")),
        parameter_line,
    }
}

/// Trims every line and drops the trailing commas some tools leave behind.
///
/// This is what a prompt looks like after classification, so serializers
/// use it too when they want their output to re-parse unchanged.
pub fn clean_prompt_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}
