use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured representation of A1111/Forge generation parameters.
///
/// Options keep the order in which they were parsed. The value is immutable
/// once built: the `with_*` helpers consume it and return an edited copy,
/// which is how editors are expected to work on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    prompt: String,
    negative_prompt: String,
    options: IndexMap<String, String>,
}

impl ParameterSet {
    pub fn new(
        prompt: impl Into<String>,
        negative_prompt: impl Into<String>,
        options: IndexMap<String, String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            options,
        }
    }

    /// An empty set: no prompt, no negative prompt, no options.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn negative_prompt(&self) -> &str {
        &self.negative_prompt
    }

    pub fn options(&self) -> &IndexMap<String, String> {
        &self.options
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.prompt.is_empty() && self.negative_prompt.is_empty() && self.options.is_empty()
    }

    /// Reads a size-shaped option back as a numeric pair.
    ///
    /// `Size: 640x384` is stored as `Size-1` / `Size-2`, so `size_pair("Size")`
    /// returns `Some((640, 384))`.
    pub fn size_pair(&self, key: &str) -> Option<(u32, u32)> {
        let first = self.get(&format!("{}-1", key))?.trim().parse().ok()?;
        let second = self.get(&format!("{}-2", key))?.trim().parse().ok()?;
        Some((first, second))
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    /// Sets an option, keeping its position if the key already exists.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Removes an option while preserving the order of the remaining ones.
    pub fn without_option(mut self, key: &str) -> Self {
        self.options.shift_remove(key);
        self
    }

    /// Converts the set back into a Civitai `meta` object.
    ///
    /// Keys the Civitai API spells differently (`steps`, `cfgScale`, ...) are
    /// renamed; `Size-1`/`Size-2` are folded back into `Size`. Everything else
    /// keeps its WebUI name and insertion order.
    pub fn to_civitai_meta(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("prompt".to_string(), Value::String(self.prompt.clone()));
        meta.insert(
            "negativePrompt".to_string(),
            Value::String(self.negative_prompt.clone()),
        );

        for (key, value) in &self.options {
            let target = match key.as_str() {
                "Steps" => "steps",
                "Sampler" => "sampler",
                "CFG scale" => "cfgScale",
                "Seed" => "seed",
                "Size-1" => {
                    if let Some((width, height)) = self.size_pair("Size") {
                        meta.insert(
                            "Size".to_string(),
                            Value::String(format!("{}x{}", width, height)),
                        );
                    }
                    continue;
                }
                "Size-2" => continue,
                other => other,
            };
            meta.insert(target.to_string(), Value::String(value.clone()));
        }

        Value::Object(meta)
    }
}

/// Text metadata of a single image plus its pixel dimensions.
///
/// This is what an image reader hands to the engine: the PNG text chunks
/// (`parameters`, `Software`, `Comment`, ...) and the IHDR size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub text: IndexMap<String, String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.text.get(key).map(String::as_str)
    }

    /// Case-insensitive lookup, preferring an exact key match.
    pub fn get_any_case(&self, key: &str) -> Option<&str> {
        self.get(key).or_else(|| {
            self.text
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
                .map(|(_, value)| value.as_str())
        })
    }
}

/// One of the input shapes the engine knows how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSource {
    /// A1111-style text, as stored in the PNG `parameters` chunk or pasted by a user.
    PlainText(String),
    /// A `meta` object returned by the Civitai image API.
    CivitaiMeta(Value),
    /// NovelAI PNG metadata: `Description` prompt plus JSON `Comment`.
    NovelAiComment {
        description: String,
        comment: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Anything none of the adapters recognize. Parses to an empty set.
    Unsupported { origin: String },
}

impl RawSource {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::PlainText(text.into())
    }

    /// Classifies the text chunks of an image.
    pub fn from_image_info(info: &ImageInfo) -> Self {
        let is_novelai = info
            .get("Software")
            .map(|software| software.trim().eq_ignore_ascii_case("novelai"))
            .unwrap_or(false);
        if is_novelai {
            return Self::NovelAiComment {
                description: info.get_any_case("Description").unwrap_or_default().to_string(),
                comment: info.get_any_case("Comment").unwrap_or_default().to_string(),
                width: info.width,
                height: info.height,
            };
        }

        match info
            .get_any_case("parameters")
            .filter(|text| !text.trim().is_empty())
        {
            Some(text) => Self::PlainText(text.to_string()),
            None => Self::Unsupported {
                origin: "image without a parameters or NovelAI chunk".to_string(),
            },
        }
    }

    /// Wraps a JSON payload; only objects are treated as Civitai metadata.
    pub fn from_json(value: Value) -> Self {
        if value.is_object() {
            Self::CivitaiMeta(value)
        } else {
            Self::Unsupported {
                origin: format!("non-object JSON metadata ({})", json_kind(&value)),
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
