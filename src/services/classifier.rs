use image::imageops::FilterType;
use std::path::Path;
use tract_onnx::prelude::*;

/// Probability of "not food" above which an upload is rejected.
const NON_FOOD_THRESHOLD: f32 = 0.5;

/// The screen model expects 224x224 RGB input.
const INPUT_SIZE: u32 = 224;

/// On-device food/non-food screen, run before any cloud spend.
///
/// Wraps a MobileNetV2-style binary classifier exported to ONNX: 224x224 RGB
/// normalized to 0..1, single sigmoid output giving the probability that the
/// image is not food.
pub struct FoodGate {
    model: TypedSimplePlan<TypedModel>,
}

impl FoodGate {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(model_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
                ),
            )
            .map_err(model_err)?
            .into_optimized()
            .map_err(model_err)?
            .into_runnable()
            .map_err(model_err)?;

        Ok(Self { model })
    }

    /// True iff the photo looks like food.
    pub fn is_food(&self, image_bytes: &[u8]) -> Result<bool, ClassifierError> {
        let input = preprocess(image_bytes)?;
        let outputs = self.model.run(tvec!(input.into())).map_err(model_err)?;
        let view = outputs[0].to_array_view::<f32>().map_err(model_err)?;
        let non_food = view.iter().next().copied().unwrap_or(1.0);

        tracing::debug!(non_food_probability = non_food, "food screen ran");
        Ok(non_food < NON_FOOD_THRESHOLD)
    }
}

/// Decode, resize to 224x224 and normalize pixel values to 0..1, matching the
/// screen model's training preprocessing.
fn preprocess(image_bytes: &[u8]) -> Result<Tensor, ClassifierError> {
    let decoded = image::load_from_memory(image_bytes)?.to_rgb8();
    let resized = image::imageops::resize(&decoded, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let tensor = tract_ndarray::Array4::from_shape_fn(
        (1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize),
        |(_, c, y, x)| resized[(x as u32, y as u32)][c] as f32 / 255.0,
    );

    Ok(tensor.into())
}

fn model_err(e: TractError) -> ClassifierError {
    ClassifierError::Model(e.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("food screen inference failed: {0}")]
    Model(String),
}
