use serde::{Deserialize, Serialize};

use super::{person::PersonRef, photo::PhotoSummary};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct FaceBBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBBox {
    /// Boxes are persisted on whole pixels
    pub fn rounded(&self) -> Self {
        FaceBBox {
            x: self.x.round(),
            y: self.y.round(),
            width: self.width.round(),
            height: self.height.round(),
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &FaceBBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FaceExpressions {
    pub neutral: f32,
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
    pub fearful: f32,
    pub disgusted: f32,
    pub surprised: f32,
}

/// Output of the detection model for one face.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetection {
    pub bbox: FaceBBox,
    pub embedding: Vec<f32>,
    pub confidence: f32,
    pub expressions: Option<FaceExpressions>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceDescriptor {
    pub id: String,
    pub photo_id: String,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub bbox: FaceBBox,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expressions: Option<FaceExpressions>,
    pub person_id: Option<String>,
    pub created: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FaceDescriptorForInsert {
    pub id: String,
    pub photo_id: String,
    pub embedding: Vec<f32>,
    pub bbox: FaceBBox,
    pub confidence: f32,
    pub expressions: Option<FaceExpressions>,
    pub created: i64,
}

impl FaceDescriptorForInsert {
    pub fn into_descriptor(self) -> FaceDescriptor {
        FaceDescriptor {
            id: self.id,
            photo_id: self.photo_id,
            embedding: self.embedding,
            bbox: self.bbox,
            confidence: self.confidence,
            expressions: self.expressions,
            person_id: None,
            created: self.created,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FaceWithPerson {
    pub id: String,
    pub photo_id: String,
    pub bbox: FaceBBox,
    pub confidence: f32,
    pub person_id: Option<String>,
    pub person: Option<PersonRef>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatch {
    pub id: String,
    pub photo_id: String,
    pub person_id: Option<String>,
    pub distance: f32,
    pub photo: Option<PhotoSummary>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFace {
    pub id: String,
    pub photo_id: String,
    pub bbox: FaceBBox,
    pub confidence: f32,
    pub photo: Option<PhotoSummary>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FaceCluster {
    pub id: String,
    pub count: usize,
    pub faces: Vec<ClusterFace>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnalysis {
    pub faces: Vec<FaceDescriptor>,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnalysisResult {
    pub photo_id: String,
    pub faces_detected: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub processed: usize,
    pub errors: usize,
    pub results: Vec<PhotoAnalysisResult>,
}
