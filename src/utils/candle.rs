use anyhow::{Context, Result as AnyhowResult};
use candle_core::{Device, Tensor};
use once_cell::sync::Lazy;

static CANDLE_DEVICE: Lazy<Device> = Lazy::new(|| {
    // Device::new_metal(0) only succeeds when candle-core is built with "metal"
    // and a Metal GPU is present.
    match Device::new_metal(0) {
        Ok(metal_device) if metal_device.is_metal() => {
            log::info!("Successfully initialized Candle Metal device (GPU).");
            metal_device
        }
        Ok(_) => {
            log::warn!("Device::new_metal(0) succeeded but device.is_metal() is false. Using CPU.");
            Device::Cpu
        }
        Err(err) => {
            log::debug!(
                "Candle Metal device unavailable: {:?}. Falling back to CPU device.",
                err
            );
            Device::Cpu
        }
    }
});

/// Device shared by every tensor the matcher creates.
pub fn device() -> &'static Device {
    &CANDLE_DEVICE
}

pub fn cosine_similarity_candle(v1_slice: &[f32], v2_slice: &[f32]) -> AnyhowResult<f64> {
    if v1_slice.len() != v2_slice.len() {
        return Err(anyhow::anyhow!(
            "Input vector lengths differ: {} vs {}",
            v1_slice.len(),
            v2_slice.len()
        ));
    }
    if v1_slice.is_empty() {
        return Err(anyhow::anyhow!("Input vectors must not be empty"));
    }

    let v1 = Tensor::from_slice(v1_slice, (v1_slice.len(),), device()).with_context(|| {
        format!("Failed to create tensor v1 from slice with len {}", v1_slice.len())
    })?;
    let v2 = Tensor::from_slice(v2_slice, (v2_slice.len(),), device()).with_context(|| {
        format!("Failed to create tensor v2 from slice with len {}", v2_slice.len())
    })?;

    let dot_product = (&v1 * &v2)
        .context("Tensor element-wise multiplication for dot product failed")?
        .sum_all()
        .context("Summing tensor for dot product failed")?
        .to_scalar::<f32>()
        .context("Converting dot_product tensor to scalar failed")? as f64;

    let mag1 = v1
        .sqr()
        .context("Squaring v1 failed")?
        .sum_all()
        .context("Summing tensor for v1 magnitude squared failed")?
        .sqrt()
        .context("Sqrt for v1 magnitude failed")?
        .to_scalar::<f32>()
        .context("Converting v1 magnitude tensor to scalar failed")? as f64;

    let mag2 = v2
        .sqr()
        .context("Squaring v2 failed")?
        .sum_all()
        .context("Summing tensor for v2 magnitude squared failed")?
        .sqrt()
        .context("Sqrt for v2 magnitude failed")?
        .to_scalar::<f32>()
        .context("Converting v2 magnitude tensor to scalar failed")? as f64;

    if mag1 == 0.0 || mag2 == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot_product / (mag1 * mag2);

    if similarity.is_nan() || similarity.is_infinite() {
        log::warn!(
            "Calculated similarity is NaN or Infinite. dot_product: {}, mag1: {}, mag2: {}. v1_slice (first 5): {:?}, v2_slice (first 5): {:?}",
            dot_product, mag1, mag2,
            v1_slice.iter().take(5).collect::<Vec<_>>(),
            v2_slice.iter().take(5).collect::<Vec<_>>()
        );
        return Ok(0.0);
    }

    // f32 accumulation can overshoot by an ulp on identical vectors.
    Ok(similarity.clamp(-1.0, 1.0))
}

/// Row-wise L2 normalization of a (rows, dim) tensor.
pub fn l2_normalize(tensor: &Tensor) -> AnyhowResult<Tensor> {
    let norm = tensor
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(1e-12, f64::MAX)?;
    Ok(tensor.broadcast_div(&norm)?)
}

/// L2-normalizes a single vector, leaving an all-zero vector untouched.
pub fn l2_normalize_vec(values: Vec<f32>) -> AnyhowResult<Vec<f32>> {
    let dim = values.len();
    if dim == 0 || values.iter().all(|v| *v == 0.0) {
        return Ok(values);
    }
    let tensor = Tensor::from_vec(values, (1, dim), device())
        .context("Failed to create tensor for normalization")?;
    let normalized = l2_normalize(&tensor).context("L2 normalization failed")?;
    let mut rows = normalized
        .to_vec2::<f32>()
        .context("Failed to read normalized tensor")?;
    rows.pop()
        .ok_or_else(|| anyhow::anyhow!("Normalized tensor had no rows"))
}
