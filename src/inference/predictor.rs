//! Inference Predictor Module
//!
//! Reloads a trained classifier with its label space, runs one image through
//! the evaluation preprocessing and a single forward pass, and enriches the
//! winning class with advisory text.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::tensor::{activation::softmax, backend::Backend, Tensor, TensorData};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{open_image, LabelSpace, PreprocessConfig, Preprocessor};
use crate::inference::metadata::{DiseaseTable, HealthStatus};
use crate::model::{load_classifier, DiseaseClassifier, Mode, ModelArtifact};
use crate::utils::error::{PlantDocError, Result};

/// Winning class of one forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub class_name: String,
    /// Softmax probability of the winning class
    pub confidence: f32,
    /// Full probability distribution, indexed like the label space
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Pick the most probable class
    ///
    /// Ties resolve to the lowest index.
    pub fn from_probabilities(probabilities: Vec<f32>, labels: &LabelSpace) -> Result<Self> {
        if probabilities.len() != labels.len() {
            return Err(PlantDocError::ShapeMismatch(format!(
                "network produced {} scores for {} classes",
                probabilities.len(),
                labels.len()
            )));
        }

        let (class_index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, best_p)) if p <= best_p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| PlantDocError::Inference("empty probability vector".to_string()))?;

        let class_name = labels
            .name(class_index)
            .ok_or_else(|| PlantDocError::Inference(format!("no class at index {}", class_index)))?
            .to_string();

        Ok(Self {
            class_index,
            class_name,
            confidence,
            probabilities,
        })
    }

    /// The `k` most probable (index, probability) pairs, best first
    pub fn top_k(&self, k: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> = self.probabilities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        indexed.truncate(k);
        indexed
    }
}

/// Result document printed by `plantdoc infer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Raw class name
    pub detected: String,
    pub confidence: f32,
    pub status: HealthStatus,
    /// Display name of the condition, or the raw class name without an entry
    pub disease: String,
    pub prevention: Vec<String>,
    pub causes: Vec<String>,
}

/// Attach advisory text to a prediction
pub fn enrich(prediction: &Prediction, table: &DiseaseTable) -> PredictionResult {
    let detected = prediction.class_name.clone();

    match table.get(&detected) {
        Some(record) => PredictionResult {
            disease: record.name.clone().unwrap_or_else(|| detected.clone()),
            detected,
            confidence: prediction.confidence,
            status: record.status,
            prevention: record.prevention.clone(),
            causes: record.causes.clone(),
        },
        None => PredictionResult {
            disease: detected.clone(),
            detected,
            confidence: prediction.confidence,
            status: HealthStatus::Unknown,
            prevention: Vec::new(),
            causes: Vec::new(),
        },
    }
}

/// Softmax over the class axis of a `[1, num_classes]` logits tensor
pub fn probabilities<B: Backend>(logits: Tensor<B, 2>) -> Result<Vec<f32>> {
    softmax(logits, 1)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| PlantDocError::Inference(format!("Failed to read probabilities: {:?}", e)))
}

/// Predictor bound to one trained model
pub struct Predictor<B: Backend> {
    model: DiseaseClassifier<B>,
    labels: LabelSpace,
    preprocessor: Preprocessor,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Load the model at `artifact`, optionally cross-checking its label
    /// space against the class directories of `dataset_dir`
    pub fn load(artifact: &ModelArtifact, dataset_dir: Option<&Path>, device: &B::Device) -> Result<Self> {
        let loaded = load_classifier::<B>(artifact, dataset_dir, device)?;
        Self::new(loaded.model, loaded.labels, loaded.image_size, device.clone())
    }

    pub fn new(
        model: DiseaseClassifier<B>,
        labels: LabelSpace,
        image_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        model.check_parameter_shapes(labels.len())?;
        let preprocessor = Preprocessor::new(PreprocessConfig::eval(image_size as u32))?;

        Ok(Self {
            model,
            labels,
            preprocessor,
            device,
        })
    }

    pub fn labels(&self) -> &LabelSpace {
        &self.labels
    }

    /// Classify an image file
    pub fn predict_path(&self, path: &Path) -> Result<Prediction> {
        let img = open_image(path)?;
        self.predict_image(img)
    }

    /// Classify a decoded image
    pub fn predict_image(&self, img: DynamicImage) -> Result<Prediction> {
        let size = self.preprocessor.config().image_size as usize;
        let data = self.preprocessor.apply(img, None);
        let input = Tensor::<B, 4>::from_floats(TensorData::new(data, [1, 3, size, size]), &self.device);

        let start = Instant::now();
        let probs = probabilities(self.model.forward(input, Mode::Evaluating))?;
        debug!("Forward pass took {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);

        Prediction::from_probabilities(probs, &self.labels)
    }
}

/// Inputs of one inference call
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    pub artifact: ModelArtifact,
    /// Dataset split to cross-check the persisted label space against
    pub dataset_dir: Option<PathBuf>,
    pub metadata_path: PathBuf,
}

/// Classify one image and enrich the result
///
/// Every failure is terminal; nothing is returned on error.
pub fn run_inference<B: Backend>(
    image: &Path,
    options: &InferenceOptions,
    device: &B::Device,
) -> Result<PredictionResult> {
    let predictor = Predictor::<B>::load(&options.artifact, options.dataset_dir.as_deref(), device)?;
    let table = DiseaseTable::load(&options.metadata_path)?;

    let prediction = predictor.predict_path(image)?;
    info!(
        "Predicted '{}' with confidence {:.2}%",
        prediction.class_name,
        prediction.confidence * 100.0
    );
    for (index, p) in prediction.top_k(3) {
        if let Some(name) = predictor.labels().name(index) {
            debug!("  {:<45} {:.2}%", name, p * 100.0);
        }
    }

    Ok(enrich(&prediction, &table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{save_model, DiseaseClassifierConfig, ModelManifest};
    use burn_ndarray::NdArray;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn two_classes() -> LabelSpace {
        LabelSpace::from_names(["Apple___healthy", "Tomato___Late_blight"]).unwrap()
    }

    fn save_fresh(dir: &Path) -> ModelArtifact {
        let device = Default::default();
        let labels = two_classes();
        let artifact = ModelArtifact::new(dir.join("Models/plant_disease_model_final"));
        let model = DiseaseClassifierConfig::new(labels.len()).init::<TestBackend>(&device);
        save_model(&model, &artifact, &ModelManifest::new(labels, 72)).unwrap();
        artifact
    }

    fn write_leaf(path: &Path) {
        ImageBuffer::from_fn(96, 64, |x, y| Rgb([(x * 2) as u8, 150, (y * 3) as u8]))
            .save(path)
            .unwrap();
    }

    fn options(artifact: ModelArtifact, metadata_path: PathBuf) -> InferenceOptions {
        InferenceOptions {
            artifact,
            dataset_dir: None,
            metadata_path,
        }
    }

    #[test]
    fn test_known_scores_select_healthy_apple() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[2.0, 0.5]], &device);

        let prediction = Prediction::from_probabilities(probabilities(logits).unwrap(), &two_classes()).unwrap();
        assert_eq!(prediction.class_name, "Apple___healthy");
        assert!((prediction.confidence - 0.8176).abs() < 1e-3);

        let result = enrich(&prediction, &DiseaseTable::builtin().unwrap());
        assert_eq!(result.detected, "Apple___healthy");
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.disease, "Healthy Apple");
        assert!(result.causes.is_empty());
    }

    #[test]
    fn test_missing_entry_falls_back_to_unknown() {
        let labels = LabelSpace::from_names(["Mystery___leaf", "Other"]).unwrap();
        let prediction = Prediction::from_probabilities(vec![0.9, 0.1], &labels).unwrap();

        let result = enrich(&prediction, &DiseaseTable::builtin().unwrap());
        assert_eq!(result.status, HealthStatus::Unknown);
        assert_eq!(result.disease, "Mystery___leaf");
        assert!(result.prevention.is_empty());
        assert!(result.causes.is_empty());
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let labels = LabelSpace::from_names(["a", "b", "c"]).unwrap();
        let prediction = Prediction::from_probabilities(vec![0.25, 0.375, 0.375], &labels).unwrap();
        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.top_k(2), vec![(1, 0.375), (2, 0.375)]);
    }

    #[test]
    fn test_score_count_must_match_labels() {
        let err = Prediction::from_probabilities(vec![1.0], &two_classes()).unwrap_err();
        assert!(matches!(err, PlantDocError::ShapeMismatch(_)));
    }

    #[test]
    fn test_result_document_shape() {
        let result = PredictionResult {
            detected: "Tomato___Late_blight".to_string(),
            confidence: 0.5,
            status: HealthStatus::Unhealthy,
            disease: "Tomato Late Blight".to_string(),
            prevention: vec!["Fungicides".to_string()],
            causes: vec![],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"detected":"Tomato___Late_blight","confidence":0.5,"status":"Unhealthy","disease":"Tomato Late Blight","prevention":["Fungicides"],"causes":[]}"#
        );
    }

    #[test]
    fn test_predict_path_probabilities() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());
        let image = tmp.path().join("leaf.png");
        write_leaf(&image);

        let device = Default::default();
        let predictor = Predictor::<TestBackend>::load(&artifact, None, &device).unwrap();
        let prediction = predictor.predict_path(&image).unwrap();

        assert!((0.0..=1.0).contains(&prediction.confidence));
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(predictor.labels().index_of(&prediction.class_name).is_some());
    }

    #[test]
    fn test_reloaded_model_scores_identically() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());
        let image = tmp.path().join("leaf.png");
        write_leaf(&image);

        let device = Default::default();
        let first = Predictor::<TestBackend>::load(&artifact, None, &device)
            .unwrap()
            .predict_path(&image)
            .unwrap();
        let second = Predictor::<TestBackend>::load(&artifact, None, &device)
            .unwrap()
            .predict_path(&image)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_inference_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());
        let metadata = tmp.path().join("Models/disease_info.json");
        DiseaseTable::builtin().unwrap().write_to(&metadata).unwrap();
        let image = tmp.path().join("leaf.png");
        write_leaf(&image);

        let device = Default::default();
        let result = run_inference::<TestBackend>(&image, &options(artifact, metadata), &device).unwrap();
        assert!(result.detected == "Apple___healthy" || result.detected == "Tomato___Late_blight");
        assert_ne!(result.status, HealthStatus::Unknown);
        assert_ne!(result.disease, result.detected);
    }

    #[test]
    fn test_run_inference_without_metadata_file() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());
        let image = tmp.path().join("leaf.png");
        write_leaf(&image);

        let device = Default::default();
        let result =
            run_inference::<TestBackend>(&image, &options(artifact, tmp.path().join("none.json")), &device)
                .unwrap();
        assert_eq!(result.status, HealthStatus::Unknown);
        assert_eq!(result.disease, result.detected);
    }

    #[test]
    fn test_missing_image_is_image_not_found() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());

        let device = Default::default();
        let err = run_inference::<TestBackend>(
            &tmp.path().join("missing.jpg"),
            &options(artifact, tmp.path().join("none.json")),
            &device,
        )
        .unwrap_err();
        assert!(matches!(err, PlantDocError::ImageNotFound(_)));
    }

    #[test]
    fn test_corrupt_image_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());
        let image = tmp.path().join("leaf.jpg");
        fs::write(&image, b"not really a jpeg").unwrap();

        let device = Default::default();
        let err = run_inference::<TestBackend>(&image, &options(artifact, tmp.path().join("none.json")), &device)
            .unwrap_err();
        assert!(matches!(err, PlantDocError::Decode(..)));
    }

    #[test]
    fn test_missing_model_is_model_not_found() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("leaf.png");
        write_leaf(&image);

        let device = Default::default();
        let artifact = ModelArtifact::new(tmp.path().join("Models/absent"));
        let err = run_inference::<TestBackend>(&image, &options(artifact, tmp.path().join("none.json")), &device)
            .unwrap_err();
        assert!(matches!(err, PlantDocError::ModelNotFound(_)));
    }

    #[test]
    fn test_dataset_cross_check_with_extra_class() {
        let tmp = TempDir::new().unwrap();
        let artifact = save_fresh(tmp.path());
        let train = tmp.path().join("train");
        for name in ["Apple___healthy", "Grape___healthy", "Tomato___Late_blight"] {
            fs::create_dir_all(train.join(name)).unwrap();
        }

        let device = Default::default();
        let err = Predictor::<TestBackend>::load(&artifact, Some(&train), &device)
            .err()
            .unwrap();
        assert!(matches!(err, PlantDocError::ShapeMismatch(_)));
    }
}
