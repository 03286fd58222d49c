//! Vector encoder: a process-wide, lazily-initialized CLIP model exposing
//! two pure operations, `encode_image` and `encode_text`, each returning a
//! unit-norm 512-float vector.
//!
//! The double-checked-init shape (an `OnceLock` guarding a `Mutex`-wrapped
//! model handle, loaded once via `hf_hub`) mirrors
//! `daemon::content_filter::nsfw::NsfwFilter` in this codebase: a `Mutex`
//! around a `candle` model downloaded from the Hugging Face hub on first
//! use, callable from multiple worker threads afterward.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use hf_hub::api::sync::Api;
use image::GenericImageView;
use std::sync::{Mutex, OnceLock};
use tokenizers::Tokenizer;

pub const EMBEDDING_DIM: usize = 512;
const IMAGE_SIZE: usize = 224;
/// CLIP's byte-pair-encoding special tokens (openai/clip-vit-base-patch32).
const BOS_TOKEN_ID: u32 = 49406;
const EOS_TOKEN_ID: u32 = 49407;
const MAX_TEXT_TOKENS: usize = 77;

struct Encoder {
    model: Mutex<ClipModel>,
    tokenizer: Tokenizer,
    device: Device,
}

static ENCODER: OnceLock<Result<Encoder, String>> = OnceLock::new();

fn encoder(clip_model: &str, cpu_only: bool) -> Result<&'static Encoder, String> {
    // `OnceLock::get_or_init` already gives us the double-checked-init
    // behavior the nsfw detector implements by hand with a `Mutex`: only
    // the first caller across all threads runs the closure.
    ENCODER
        .get_or_init(|| load_encoder(clip_model, cpu_only))
        .as_ref()
        .map_err(|e| e.clone())
}

fn load_encoder(clip_model: &str, cpu_only: bool) -> Result<Encoder, String> {
    let device = if cpu_only {
        Device::Cpu
    } else {
        Device::cuda_if_available(0).unwrap_or(Device::Cpu)
    };
    println!("[encoder] Loading {} on {:?}", clip_model, device);

    let api = Api::new().map_err(|e| format!("hf_hub api init failed: {e}"))?;
    let repo = api.model(clip_model.to_string());

    let weights_path = repo
        .get("model.safetensors")
        .map_err(|e| format!("failed to fetch model.safetensors: {e}"))?;
    let tokenizer_path = repo
        .get("tokenizer.json")
        .map_err(|e| format!("failed to fetch tokenizer.json: {e}"))?;

    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| format!("failed to load tokenizer: {e}"))?;

    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
            .map_err(|e| format!("failed to mmap weights: {e}"))?
    };
    let config = ClipConfig::vit_base_patch32();
    let model =
        ClipModel::new(vb, &config).map_err(|e| format!("failed to build CLIP model: {e}"))?;

    println!("[encoder] Model loaded successfully");

    Ok(Encoder {
        model: Mutex::new(model),
        tokenizer,
        device,
    })
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Encode a short text query into a unit-norm 512-float vector.
pub fn encode_text(
    text: &str,
    clip_model: &str,
    cpu_only: bool,
) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
    let enc = encoder(clip_model, cpu_only)?;

    let encoding = enc
        .tokenizer
        .encode(text, false)
        .map_err(|e| format!("tokenize failed: {e}"))?;

    let mut ids: Vec<u32> = std::iter::once(BOS_TOKEN_ID)
        .chain(encoding.get_ids().iter().copied())
        .chain(std::iter::once(EOS_TOKEN_ID))
        .collect();
    ids.truncate(MAX_TEXT_TOKENS);
    while ids.len() < MAX_TEXT_TOKENS {
        ids.push(0);
    }

    let input_ids = Tensor::new(ids.as_slice(), &enc.device)?.unsqueeze(0)?;

    let model = enc.model.lock().map_err(|_| "encoder lock poisoned")?;
    let features = model.get_text_features(&input_ids)?;
    let mut vector: Vec<f32> = features.flatten_all()?.to_vec1()?;
    l2_normalize(&mut vector);
    Ok(vector)
}

/// Encode an already-generated thumbnail (or any image file) into a
/// unit-norm 512-float vector.
pub fn encode_image(
    image_path: &std::path::Path,
    clip_model: &str,
    cpu_only: bool,
) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
    let enc = encoder(clip_model, cpu_only)?;

    let img = image::open(image_path)?;
    let resized = img.resize_exact(
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        image::imageops::FilterType::Triangle,
    );
    let rgb = resized.to_rgb8();

    // CLIP's published preprocessing: scale to [0, 1], then normalize per
    // channel with the published mean/std.
    const MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
    const STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

    let (width, height) = rgb.dimensions();
    let mut data = vec![0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x, y);
            let idx = (y * width + x) as usize;
            for c in 0..3 {
                data[c * IMAGE_SIZE * IMAGE_SIZE + idx] =
                    (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }

    let pixel_values = Tensor::from_vec(data, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &enc.device)?;

    let model = enc.model.lock().map_err(|_| "encoder lock poisoned")?;
    let features = model.get_image_features(&pixel_values)?;
    let mut vector: Vec<f32> = features.flatten_all()?.to_vec1()?;
    l2_normalize(&mut vector);
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
