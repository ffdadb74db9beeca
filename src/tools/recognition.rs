use std::{path::{Path, PathBuf}, sync::Arc};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::{inputs, GraphOptimizationLevel, Session, ValueType};

use crate::{domain::face::{FaceBBox, FaceDetection, FaceExpressions}, Error, Result};

use super::{image_tools::{crop_face, decode_image, is_unsupported_mime, l2_normalize, resize_rgb, to_nchw_tensor}, log::{log_error, log_info, log_warn, LogServiceType}};

pub const DETECTION_MODEL: &str = "face_detection.onnx";
pub const EMBEDDING_MODEL: &str = "face_embedding.onnx";
pub const EXPRESSION_MODEL: &str = "face_expression.onnx";

const NMS_IOU: f32 = 0.3;

/// Turns an image into face boxes and embeddings.
/// Implementations never fail: anything going wrong is logged and reported as no face.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect_faces(&self, image: Vec<u8>, mime_type: Option<String>) -> Vec<FaceDetection>;
}

/// Installed when the models could not be loaded at start
pub struct UnavailableFaceDetector;

#[async_trait]
impl FaceDetector for UnavailableFaceDetector {
    async fn detect_faces(&self, _image: Vec<u8>, _mime_type: Option<String>) -> Vec<FaceDetection> {
        log_warn(LogServiceType::Recognition, "Face detection requested but no model is loaded".to_string());
        vec![]
    }
}

pub fn load_face_detector(models_dir: &Path, min_confidence: f32) -> Arc<dyn FaceDetector> {
    match OrtFaceDetector::load(models_dir, min_confidence) {
        Ok(detector) => {
            log_info(LogServiceType::Recognition, format!("Face models loaded from {:?}", models_dir));
            Arc::new(detector)
        }
        Err(error) => {
            log_error(LogServiceType::Recognition, format!("Unable to load face models from {:?}: {:#}", models_dir, error));
            Arc::new(UnavailableFaceDetector)
        }
    }
}

pub fn preload_model(path: &PathBuf) -> Result<Session> {
    if !path.exists() {
        return Err(Error::ModelNotFound(path.to_string_lossy().to_string()));
    }
    Ok(Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)?)
}

struct FaceModels {
    detection: Session,
    embedding: Session,
    expression: Option<Session>,
}

pub struct OrtFaceDetector {
    models: Arc<FaceModels>,
    min_confidence: f32,
}

impl OrtFaceDetector {
    pub fn load(models_dir: &Path, min_confidence: f32) -> Result<Self> {
        let detection = preload_model(&models_dir.join(DETECTION_MODEL))?;
        let embedding = preload_model(&models_dir.join(EMBEDDING_MODEL))?;
        let expression = match preload_model(&models_dir.join(EXPRESSION_MODEL)) {
            Ok(session) => Some(session),
            Err(error) => {
                log_warn(LogServiceType::Recognition, format!("Expression model not loaded, continuing without expressions: {:#}", error));
                None
            }
        };
        Ok(Self {
            models: Arc::new(FaceModels { detection, embedding, expression }),
            min_confidence,
        })
    }
}

#[async_trait]
impl FaceDetector for OrtFaceDetector {
    async fn detect_faces(&self, image: Vec<u8>, mime_type: Option<String>) -> Vec<FaceDetection> {
        if is_unsupported_mime(mime_type.as_deref()) {
            log_warn(LogServiceType::Recognition, format!("Unsupported image type for detection: {:?}", mime_type));
            return vec![];
        }
        let models = self.models.clone();
        let min_confidence = self.min_confidence;
        let result = tokio::task::spawn_blocking(move || models.detect_and_embed(&image, min_confidence)).await;
        match result {
            Ok(Ok(detections)) => {
                log_info(LogServiceType::Recognition, format!("Detected {} face(s)", detections.len()));
                detections
            }
            Ok(Err(error)) => {
                log_error(LogServiceType::Recognition, format!("Face detection failed: {:#}", error));
                vec![]
            }
            Err(error) => {
                log_error(LogServiceType::Recognition, format!("Face detection task failed: {:#}", error));
                vec![]
            }
        }
    }
}

/// Name and spatial size `(width, height)` of the first NCHW input
fn input_shape(session: &Session, default: (u32, u32)) -> Result<(String, u32, u32)> {
    let input = session.inputs.first().ok_or(Error::Error { message: "Face model does not have inputs".into() })?;
    let (width, height) = match &input.input_type {
        ValueType::Tensor { dimensions, .. } if dimensions.len() == 4 => {
            let height = dimensions[2];
            let width = dimensions[3];
            if width > 0 && height > 0 { (width as u32, height as u32) } else { default }
        }
        _ => default,
    };
    Ok((input.name.to_string(), width, height))
}

fn output_name(session: &Session, hint: &str, index: usize) -> Result<String> {
    session.outputs.iter()
        .find(|o| o.name.to_lowercase().contains(hint))
        .or_else(|| session.outputs.get(index))
        .map(|o| o.name.to_string())
        .ok_or(Error::Error { message: format!("Face model does not have a {} output", hint) })
}

impl FaceModels {
    fn detect_and_embed(&self, buffer: &[u8], min_confidence: f32) -> Result<Vec<FaceDetection>> {
        let img = decode_image(buffer)?;
        let boxes = self.detect(&img, min_confidence)?;
        Ok(describe_faces(boxes, |bbox| {
            let face = crop_face(&img, bbox)?;
            let embedding = self.embed(&face)?;
            let expressions = match self.expressions(&face) {
                Ok(expressions) => expressions,
                Err(error) => {
                    log_warn(LogServiceType::Recognition, format!("Unable to compute expressions: {:#}", error));
                    None
                }
            };
            Ok((embedding, expressions))
        }))
    }

    /// Boxes in source image pixels with their score
    fn detect(&self, img: &DynamicImage, min_confidence: f32) -> Result<Vec<(FaceBBox, f32)>> {
        let (src_width, src_height) = img.dimensions();
        let (input_name, width, height) = input_shape(&self.detection, (320, 240))?;
        let resized = resize_rgb(img, width, height);
        let tensor = to_nchw_tensor(&resized, 127.0, 128.0);

        let scores_name = output_name(&self.detection, "score", 0)?;
        let boxes_name = output_name(&self.detection, "box", 1)?;
        let outputs = self.detection.run(inputs![input_name => tensor.view()]?)?;
        let scores = outputs[scores_name.as_str()].try_extract_tensor::<f32>()?;
        let boxes = outputs[boxes_name.as_str()].try_extract_tensor::<f32>()?;

        let count = scores.shape().get(1).copied().unwrap_or(0);
        if boxes.shape().get(1).copied().unwrap_or(0) != count || boxes.shape().get(2) != Some(&4) {
            return Err(Error::Error { message: format!("Unexpected detection output shapes {:?} {:?}", scores.shape(), boxes.shape()) });
        }

        let mut candidates = vec![];
        for i in 0..count {
            let confidence = scores[[0, i, 1]];
            if confidence < min_confidence {
                continue;
            }
            let x1 = boxes[[0, i, 0]] * src_width as f32;
            let y1 = boxes[[0, i, 1]] * src_height as f32;
            let x2 = boxes[[0, i, 2]] * src_width as f32;
            let y2 = boxes[[0, i, 3]] * src_height as f32;
            candidates.push((FaceBBox { x: x1, y: y1, width: x2 - x1, height: y2 - y1 }, confidence));
        }
        Ok(non_max_suppression(candidates, NMS_IOU))
    }

    fn embed(&self, face: &DynamicImage) -> Result<Vec<f32>> {
        let (input_name, width, height) = input_shape(&self.embedding, (112, 112))?;
        let resized = resize_rgb(face, width, height);
        let tensor = to_nchw_tensor(&resized, 127.5, 128.0);
        let output_name = output_name(&self.embedding, "embedding", 0)?;
        let outputs = self.embedding.run(inputs![input_name => tensor.view()]?)?;
        let values = outputs[output_name.as_str()].try_extract_tensor::<f32>()?;
        let mut embedding: Vec<f32> = values.iter().copied().collect();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    /// FER+ style model: 64x64 grayscale in, 8 logits out
    fn expressions(&self, face: &DynamicImage) -> Result<Option<FaceExpressions>> {
        let Some(session) = &self.expression else { return Ok(None) };
        let (input_name, width, height) = input_shape(session, (64, 64))?;
        let gray = face.resize_exact(width, height, image::imageops::FilterType::Triangle).to_luma8();
        let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));
        for (x, y, pixel) in gray.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32;
        }
        let output_name = output_name(session, "", 0)?;
        let outputs = session.run(inputs![input_name => tensor.view()]?)?;
        let logits: Vec<f32> = outputs[output_name.as_str()].try_extract_tensor::<f32>()?.iter().copied().collect();
        Ok(expressions_from_logits(&logits))
    }
}

pub fn expressions_from_logits(logits: &[f32]) -> Option<FaceExpressions> {
    if logits.len() < 7 {
        return None;
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    let p = |i: usize| exps[i] / total;
    Some(FaceExpressions {
        neutral: p(0),
        happy: p(1),
        surprised: p(2),
        sad: p(3),
        angry: p(4),
        disgusted: p(5),
        fearful: p(6),
    })
}

/// Greedy suppression keeping the highest scores first
pub fn non_max_suppression(mut candidates: Vec<(FaceBBox, f32)>, iou_threshold: f32) -> Vec<(FaceBBox, f32)> {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<(FaceBBox, f32)> = vec![];
    for candidate in candidates {
        if kept.iter().all(|(k, _)| k.iou(&candidate.0) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Faces that can not be cropped or embedded are skipped, the others are kept
fn describe_faces<F>(boxes: Vec<(FaceBBox, f32)>, mut describe: F) -> Vec<FaceDetection>
where F: FnMut(&FaceBBox) -> Result<(Vec<f32>, Option<FaceExpressions>)> {
    boxes.into_iter().filter_map(|(bbox, confidence)| match describe(&bbox) {
        Ok((embedding, expressions)) => Some(FaceDetection { bbox, embedding, confidence, expressions }),
        Err(error) => {
            log_warn(LogServiceType::Recognition, format!("Skipping face at {:?}: {:#}", bbox, error));
            None
        }
    }).collect()
}
