use clap::Parser;
use std::path::PathBuf;

use crate::loader::DecodeLimits;
use crate::model::DEFAULT_MAX_NEW_TOKENS;
use crate::persistence::DEFAULT_CAPTION_EXTENSION;

/// Caption images and write each caption next to its file.
///
/// Without PATHS a file picker opens repeatedly until it is cancelled.
#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Images or directories to caption as a single batch, skipping the picker
    pub paths: Vec<PathBuf>,

    /// Directory holding vision_encoder.onnx, text_decoder.onnx and tokenizer.json
    #[arg(short, long, default_value = "models/blip")]
    pub model_dir: PathBuf,

    /// GPU ordinal for TensorRT/CUDA execution; falls back to CPU when unavailable
    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Upper bound on generated caption tokens
    #[arg(long, default_value_t = DEFAULT_MAX_NEW_TOKENS, value_parser = check_token_budget)]
    pub max_new_tokens: usize,

    /// Refuse images with more pixels than this. Unlimited when omitted
    #[arg(long)]
    pub max_image_pixels: Option<u64>,

    /// Extension of the caption file written next to each image
    #[arg(long, default_value = DEFAULT_CAPTION_EXTENSION, value_parser = check_extension)]
    pub caption_extension: String,
}

impl Config {
    pub fn decode_limits(&self) -> DecodeLimits {
        self.max_image_pixels
            .map_or_else(DecodeLimits::unbounded, DecodeLimits::with_max_pixels)
    }
}

fn check_token_budget(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("at least one token must be generated".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("`{s}` is not a token count: {e}")),
    }
}

fn check_extension(s: &str) -> Result<String, String> {
    let extension = s.trim_start_matches('.');
    if extension.is_empty() || extension.contains(['/', '\\', '.']) {
        return Err(format!("`{s}` is not a valid file extension"));
    }
    Ok(extension.to_string())
}
