//! WebUI implicit defaults and the NovelAI sampler table.
//!
//! Infotext written by older WebUI versions omits options that were at their
//! default value; these tables restore them.

use indexmap::IndexMap;

/// Options WebUI assumes when they are missing from the infotext.
pub const DEFAULT_TABLE: &[(&str, &str)] = &[
    ("Clip skip", "1"),
    ("Hires resize-1", "0"),
    ("Hires resize-2", "0"),
    ("Hires sampler", "Use same sampler"),
    ("Hires schedule type", "Use same scheduler"),
    ("Hires checkpoint", "Use same checkpoint"),
    ("Hires prompt", ""),
    ("Hires negative prompt", ""),
    ("Mask mode", "Inpaint masked"),
    ("Masked content", "original"),
    ("Inpaint area", "Whole picture"),
    ("Masked area padding", "32"),
    ("RNG", "GPU"),
    ("Schedule type", "Automatic"),
    ("Schedule max sigma", "0"),
    ("Schedule min sigma", "0"),
    ("Schedule rho", "0"),
    ("VAE Encoder", "Full"),
    ("VAE Decoder", "Full"),
    ("FP8 weight", "Disable"),
    ("Emphasis", "Original"),
    ("Refiner switch by sampling steps", "False"),
];

const FP8_WEIGHT: &str = "FP8 weight";
const FP8_DISABLED: &str = "Disable";
const CACHE_FP16_LORA: &str = "Cache FP16 weight for LoRA";
const HYPERNET: &str = "Hypernet";
const HYPERNET_STRENGTH: &str = "Hypernet strength";
const DEFAULT_HYPERNET_STRENGTH: &str = "1.0";

/// NovelAI sampler ids and their WebUI names.
const NOVELAI_SAMPLERS: &[(&str, &str)] = &[
    ("k_euler_a", "Euler a"),
    ("k_euler_ancestral", "Euler a"),
    ("k_euler", "Euler"),
    ("k_lms", "LMS"),
    ("k_heun", "Heun"),
    ("k_dpm_2", "DPM2"),
    ("k_dpm_2_a", "DPM2 a"),
    ("k_dpm_2_ancestral", "DPM2 a"),
    ("k_dpmpp_2s_a", "DPM++ 2S a"),
    ("k_dpmpp_2s_ancestral", "DPM++ 2S a"),
    ("k_dpmpp_2m", "DPM++ 2M"),
    ("k_dpmpp_sde", "DPM++ SDE"),
    ("k_dpmpp_2m_sde", "DPM++ 2M SDE"),
    ("k_dpmpp_3m_sde", "DPM++ 3M SDE"),
    ("k_dpm_fast", "DPM fast"),
    ("k_dpm_ad", "DPM adaptive"),
    ("k_dpm_adaptive", "DPM adaptive"),
    ("k_lcm", "LCM"),
    ("ddim", "DDIM"),
    ("ddim_v3", "DDIM"),
    ("plms", "PLMS"),
];

pub const NOVELAI_FALLBACK_SAMPLER: &str = "Euler a";

/// Maps a NovelAI sampler id to its WebUI name, `Euler a` when unknown.
pub fn novelai_sampler_name(id: &str) -> &'static str {
    let id = id.trim();
    NOVELAI_SAMPLERS
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(id))
        .map(|(_, name)| *name)
        .unwrap_or(NOVELAI_FALLBACK_SAMPLER)
}

/// Adds every table default whose key is absent. Present keys win, even
/// when their value is an empty string.
pub fn apply_default_table(options: &mut IndexMap<String, String>) {
    for (key, value) in DEFAULT_TABLE {
        if !options.contains_key(*key) {
            options.insert((*key).to_string(), (*value).to_string());
        }
    }

    // Must run after the table so a defaulted `FP8 weight` is seen.
    let fp8_enabled = options
        .get(FP8_WEIGHT)
        .map(|value| value != FP8_DISABLED)
        .unwrap_or(false);
    if fp8_enabled && !options.contains_key(CACHE_FP16_LORA) {
        options.insert(CACHE_FP16_LORA.to_string(), "False".to_string());
    }
}

/// Appends the `<hypernet:NAME:STRENGTH>` tag WebUI puts in the prompt when
/// a `Hypernet` option is present.
///
/// Legacy behaviour kept for compatibility. The tag is not appended again if
/// the prompt already ends with it, so re-parsing serialized output is stable.
pub fn apply_hypernet_tag(prompt: &str, options: &IndexMap<String, String>) -> String {
    let Some(name) = options.get(HYPERNET) else {
        return prompt.to_string();
    };
    let strength = options
        .get(HYPERNET_STRENGTH)
        .map(String::as_str)
        .unwrap_or(DEFAULT_HYPERNET_STRENGTH);

    let tag = format!("<hypernet:{}:{}>", name, strength);
    if prompt.ends_with(&tag) {
        return prompt.to_string();
    }
    format!("{}{}", prompt, tag)
}
