use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Named facial contours a detector can report, in the detector's
/// `SCREAMING_SNAKE_CASE` naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Contour {
    Face,
    LeftEyebrowTop,
    LeftEyebrowBottom,
    RightEyebrowTop,
    RightEyebrowBottom,
    LeftEye,
    RightEye,
    UpperLipTop,
    UpperLipBottom,
    LowerLipTop,
    LowerLipBottom,
    NoseBridge,
    NoseBottom,
    LeftCheek,
    RightCheek,
}

impl Contour {
    pub fn as_str(&self) -> &'static str {
        match self {
            Contour::Face => "FACE",
            Contour::LeftEyebrowTop => "LEFT_EYEBROW_TOP",
            Contour::LeftEyebrowBottom => "LEFT_EYEBROW_BOTTOM",
            Contour::RightEyebrowTop => "RIGHT_EYEBROW_TOP",
            Contour::RightEyebrowBottom => "RIGHT_EYEBROW_BOTTOM",
            Contour::LeftEye => "LEFT_EYE",
            Contour::RightEye => "RIGHT_EYE",
            Contour::UpperLipTop => "UPPER_LIP_TOP",
            Contour::UpperLipBottom => "UPPER_LIP_BOTTOM",
            Contour::LowerLipTop => "LOWER_LIP_TOP",
            Contour::LowerLipBottom => "LOWER_LIP_BOTTOM",
            Contour::NoseBridge => "NOSE_BRIDGE",
            Contour::NoseBottom => "NOSE_BOTTOM",
            Contour::LeftCheek => "LEFT_CHEEK",
            Contour::RightCheek => "RIGHT_CHEEK",
        }
    }
}

/// One detected face: its box and contour points, all in the coordinate
/// space of the image that was handed to the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    pub bounds: BoundingBox,
    pub contours: BTreeMap<Contour, Vec<Point>>,
    pub confidence: f32,
}

impl FaceDescriptor {
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            contours: BTreeMap::new(),
            confidence: 1.0,
        }
    }

    pub fn with_contour(mut self, contour: Contour, points: Vec<Point>) -> Self {
        self.contours.insert(contour, points);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Points of `contour`, empty if the detector did not report it.
    pub fn contour(&self, contour: Contour) -> &[Point] {
        self.contours.get(&contour).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Left eye followed by right eye contour points.
    pub fn eye_points(&self) -> Vec<Point> {
        let mut points = self.contour(Contour::LeftEye).to_vec();
        points.extend_from_slice(self.contour(Contour::RightEye));
        points
    }
}

/// Pick the highest-confidence face out of a detector's candidates.
pub fn best_face(faces: Vec<FaceDescriptor>) -> Option<FaceDescriptor> {
    faces
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}
