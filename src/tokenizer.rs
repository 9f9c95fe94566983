use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// One `Key: value` token of a parameter line. A value is either a
/// double-quoted span (escapes allowed, commas kept) or runs to the next comma.
static PARAM_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s*(\w[\w \-/]+):\s*("(?:\\.|[^\\"])+"|[^,]*)(?:,|$)"#)
        .expect("parameter pair pattern is valid")
});

static IMAGE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)x(\d+)$").expect("image size pattern is valid"));

/// Counts the `Key: value` tokens in a line.
pub fn count_parameter_pairs(line: &str) -> usize {
    PARAM_PAIR.find_iter(line).count()
}

/// Splits a parameter line into ordered key/value pairs.
///
/// - quoted values are unquoted with JSON string rules; malformed quoting
///   keeps the raw quoted text
/// - `WxH` values are split into `{key}-1` / `{key}-2`, for any key
/// - text that does not form a token is logged and skipped
///
/// A repeated key keeps its first position and takes the last value.
pub fn tokenize_parameters(line: &str) -> IndexMap<String, String> {
    let mut pairs = IndexMap::new();
    let mut cursor = 0usize;

    for captures in PARAM_PAIR.captures_iter(line) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        skip_fragment(&line[cursor..whole.start()]);
        cursor = whole.end();

        let key = captures.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let raw_value = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if key.is_empty() {
            skip_fragment(whole.as_str());
            continue;
        }

        insert_pair(&mut pairs, key, unquote_value(raw_value));
    }

    skip_fragment(&line[cursor..]);
    pairs
}

fn insert_pair(pairs: &mut IndexMap<String, String>, key: &str, value: String) {
    if let Some(size) = IMAGE_SIZE.captures(&value) {
        pairs.insert(format!("{}-1", key), size[1].to_string());
        pairs.insert(format!("{}-2", key), size[2].to_string());
    } else {
        pairs.insert(key.to_string(), value);
    }
}

/// Decodes a JSON-quoted value. Anything that is not a well-formed JSON
/// string literal is returned unchanged.
pub fn unquote_value(raw: &str) -> String {
    let is_quoted = raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"');
    if !is_quoted {
        return raw.to_string();
    }

    match serde_json::from_str::<String>(raw) {
        Ok(value) => value,
        Err(error) => {
            log::debug!("Keeping malformed quoted value {} as-is: {}", raw, error);
            raw.to_string()
        }
    }
}

fn skip_fragment(fragment: &str) {
    let leftover = fragment.trim_matches(|c: char| c.is_whitespace() || c == ',');
    if !leftover.is_empty() {
        log::warn!("Skipping malformed parameter token: {:?}", leftover);
    }
}
