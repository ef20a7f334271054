pub mod ml_model;
pub mod inference;

pub use ml_model::{InputTensor, CLASS_NAMES, IMAGE_SIZE, MEAN_PIXEL_BGR, format_class_name, preprocess_image, load_and_preprocess_image};
pub use inference::{AppState, InferenceEngine, PredictOutcome, Prediction, Predictor, top_prediction};
