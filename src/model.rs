use std::path::Path;

use crate::{
    errors::{BatchCaptionError, Result},
    loader::ImageAsset,
    traits::CaptionEngine,
};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;
use tokenizers::Tokenizer;

pub const VISION_ENCODER_FILE: &str = "vision_encoder.onnx";
pub const TEXT_DECODER_FILE: &str = "text_decoder.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub const DEFAULT_IMAGE_SIZE: u32 = 384;
pub const DEFAULT_MAX_NEW_TOKENS: usize = 100;

const IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const IMAGE_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

const BOS_CANDIDATES: &[&str] = &["[DEC]", "[CLS]", "<s>", "[BOS]"];
const EOS_CANDIDATES: &[&str] = &["[SEP]", "</s>", "[EOS]"];

struct Sessions {
    encoder: Session,
    decoder: Session,
}

/// Image captioning with an exported vision encoder / text decoder pair.
///
/// Decoding is greedy and re-runs the decoder over the whole prefix at every
/// step, so the decoder export needs no KV cache inputs.
pub struct CaptionModel {
    pub image_size: u32,
    max_new_tokens: usize,
    bos_token_id: u32,
    eos_token_id: u32,
    tokenizer: Tokenizer,
    sessions: Mutex<Option<Sessions>>,
}

impl CaptionModel {
    pub fn new(model_dir: &Path, device_id: i32, max_new_tokens: usize) -> Result<Self> {
        log::info!(
            "Requesting TensorRT/CUDA execution on device {device_id} (CPU fallback enabled)"
        );
        let encoder = build_session(&model_dir.join(VISION_ENCODER_FILE), device_id)?;
        let decoder = build_session(&model_dir.join(TEXT_DECODER_FILE), device_id)?;

        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            BatchCaptionError::engine(
                format!("tokenizer load: {}", tokenizer_path.display()),
                e,
            )
        })?;
        let bos_token_id = find_token(&tokenizer, BOS_CANDIDATES)?;
        let eos_token_id = find_token(&tokenizer, EOS_CANDIDATES)?;

        let image_size = encoder
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .and_then(|shape| shape.get(2).copied())
            .and_then(|side| u32::try_from(side).ok())
            .filter(|&side| side > 0)
            .unwrap_or(DEFAULT_IMAGE_SIZE);
        log::debug!("Caption model input size: {image_size}x{image_size}");

        Ok(Self {
            image_size,
            max_new_tokens,
            bos_token_id,
            eos_token_id,
            tokenizer,
            sessions: Mutex::new(Some(Sessions { encoder, decoder })),
        })
    }

    fn encode(sessions: &mut Sessions, pixel_values: ArrayView4<f32>) -> Result<Array3<f32>> {
        let outputs = sessions.encoder.run(ort::inputs![
            "pixel_values" => TensorRef::from_array_view(&pixel_values.as_standard_layout())?
        ])?;
        Ok(outputs["last_hidden_state"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?
            .to_owned())
    }

    fn next_token(
        sessions: &mut Sessions,
        tokens: &[i64],
        hidden: &Array3<f32>,
    ) -> Result<u32> {
        let input_ids = Array2::from_shape_vec((1, tokens.len()), tokens.to_vec())?;
        let attention_mask = Array2::<i64>::ones((1, tokens.len()));
        let outputs = sessions.decoder.run(ort::inputs![
            "input_ids" => TensorRef::from_array_view(&input_ids)?,
            "attention_mask" => TensorRef::from_array_view(&attention_mask)?,
            "encoder_hidden_states" => TensorRef::from_array_view(hidden)?
        ])?;
        let logits = outputs["logits"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?;

        let last = logits.slice(s![0, -1, ..]);
        argmax(last).ok_or_else(|| BatchCaptionError::engine("token selection", "empty logits"))
    }

    fn generate(&self, pixel_values: ArrayView4<f32>) -> Result<Vec<u32>> {
        let mut guard = self.sessions.lock();
        let sessions = guard.as_mut().ok_or_else(|| {
            BatchCaptionError::engine("caption generation", "model resources already released")
        })?;

        let hidden = Self::encode(sessions, pixel_values)?;
        let mut tokens = vec![i64::from(self.bos_token_id)];
        let mut generated = Vec::with_capacity(self.max_new_tokens);

        for _ in 0..self.max_new_tokens {
            let token = Self::next_token(sessions, &tokens, &hidden)?;
            if token == self.eos_token_id {
                break;
            }
            generated.push(token);
            tokens.push(i64::from(token));
        }

        Ok(generated)
    }
}

impl CaptionEngine for CaptionModel {
    fn caption(&self, asset: &ImageAsset) -> Result<String> {
        let tensor = preprocess(&asset.pixels, self.image_size);
        let generated = self.generate(tensor.view())?;
        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| BatchCaptionError::engine("token decoding", e))?;
        Ok(text.trim().to_string())
    }

    fn release(&mut self) -> Result<()> {
        if self.sessions.get_mut().take().is_some() {
            log::info!("Released caption model sessions");
        }
        Ok(())
    }
}

fn build_session(model_path: &Path, device_id: i32) -> Result<Session> {
    SessionBuilder::new()
        .map_err(|e| BatchCaptionError::engine("session builder init", e))?
        .with_execution_providers([
            TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
        ])
        .map_err(|e| BatchCaptionError::engine("execution provider setup", e))?
        .with_memory_pattern(true)
        .map_err(|e| BatchCaptionError::engine("memory pattern setup", e))?
        .commit_from_file(model_path)
        .map_err(|e| {
            BatchCaptionError::engine(format!("model load: {}", model_path.display()), e)
        })
}

fn find_token(tokenizer: &Tokenizer, candidates: &[&str]) -> Result<u32> {
    candidates
        .iter()
        .find_map(|token| tokenizer.token_to_id(token))
        .ok_or_else(|| BatchCaptionError::Configuration {
            message: format!("tokenizer defines none of {candidates:?}"),
        })
}

fn argmax(values: ArrayView1<f32>) -> Option<u32> {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .and_then(|(index, _)| u32::try_from(index).ok())
}

/// Resize to the model's square input and normalize into a `[1, 3, S, S]` tensor.
pub fn preprocess(image: &RgbImage, image_size: u32) -> Array4<f32> {
    let image = imageops::resize(image, image_size, image_size, FilterType::CatmullRom);
    let mut tensor = image
        .as_ndarray3()
        .slice_move(s![NewAxis, .., .., ..])
        .mapv(|v| f32::from(v) / 255.0);

    for (channel, (mean, std)) in IMAGE_MEAN.iter().zip(IMAGE_STD).enumerate() {
        tensor
            .slice_mut(s![0, channel, .., ..])
            .mapv_inplace(|v| (v - mean) / std);
    }

    tensor
}
