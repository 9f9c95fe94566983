//! Parsing and serialization of Stable Diffusion generation parameters
//! ("infotext") as written by AUTOMATIC1111 WebUI, Civitai and NovelAI.
//!
//! Every parse entry point is a pure function returning a best-effort
//! [`ParameterSet`]; malformed input degrades to missing fields, never to an
//! error. Filesystem access is confined to [`scanner`].

pub mod classify;
pub mod config;
pub mod defaults;
pub mod error;
pub mod params;
pub mod parser;
pub mod recipe;
pub mod scanner;
pub mod serializer;
pub mod source;
pub mod tokenizer;

pub use config::ParseOptions;
pub use error::{InfotextError, Result};
pub use params::{ImageInfo, ParameterSet, RawSource};
pub use parser::{
    parse_generation_parameters, parse_image_info, parse_source, parse_source_with,
    parse_text_with,
};
pub use recipe::{compose_recipe_payload, split_recipe_payload, RecipeFields, RecipeImageRef};
pub use serializer::{format_metadata_to_auto1111, to_canonical_text};
