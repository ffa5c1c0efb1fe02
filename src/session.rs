//! Two-phase face processing.
//!
//! A session starts `Idle`. Every [`FaceProcessingSession::detect`] call
//! replaces the whole stored state (input path, decoded image, face) in one
//! assignment, moving the session to `Detected` (with or without a face) or
//! to `Failed` when the image could not be loaded. [`FaceProcessingSession::process`]
//! only reads that state. There is no internal locking: callers run
//! `detect` then `process` for one image at a time.
//!
//! Errors never cross this boundary. Every failure is logged and turned into
//! a passthrough of the input path or a fallback output, described by the
//! `message` of the returned [`ProcessOutcome`].

use crate::config::Config;
use crate::storage::{OutputKind, StorageGateway};
use crate::uri;
use anyhow::{Context, Result};
use autocrop_vision::compositor::{self, Marker, Stroke};
use autocrop_vision::geometry::{self, TOP_THIRD_BIAS};
use autocrop_vision::{codec, BoundingBox, Contour, DetectorError, FaceDescriptor, FaceDetector};
use image::RgbaImage;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const NO_FACE_MESSAGE: &str = "No face detected in the image";
pub const NO_IMAGE_MESSAGE: &str = "no image to process";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load image";
pub const NO_PATH_MESSAGE: &str = "No image path provided or stored";

/// Result handed back to the UI shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub face_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProcessOutcome {
    fn saved(path: &Path, face_detected: bool) -> Self {
        Self {
            success: true,
            path: Some(path.to_string_lossy().into_owned()),
            face_detected,
            message: None,
        }
    }

    fn passthrough(input: &str, face_detected: bool, message: impl Into<String>) -> Self {
        Self {
            success: true,
            path: Some(input.to_string()),
            face_detected,
            message: Some(message.into()),
        }
    }

    fn failure(path: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            path: path.map(str::to_string),
            face_detected: false,
            message: Some(message.into()),
        }
    }

    /// The path as a `file://` URI, for URI-aware callers.
    pub fn uri(&self) -> Option<String> {
        self.path.as_deref().map(uri::to_file_uri)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// The last `detect` could not load its image.
    Failed,
    Detected { face: bool },
}

#[derive(Default)]
struct SessionState {
    image_path: Option<String>,
    image: Option<RgbaImage>,
    face: Option<FaceDescriptor>,
}

/// Output prefixes for one rendering run.
#[derive(Clone, Copy)]
struct Naming {
    face: OutputKind,
    no_face: OutputKind,
}

const TWO_PHASE: Naming = Naming {
    face: OutputKind::Processed,
    no_face: OutputKind::FallbackProcessed,
};

const ONE_SHOT: Naming = Naming {
    face: OutputKind::Full,
    no_face: OutputKind::Fallback,
};

pub struct FaceProcessingSession {
    config: Config,
    storage: StorageGateway,
    detector: Box<dyn FaceDetector>,
    state: SessionState,
}

impl FaceProcessingSession {
    /// Validate `config` and create the output directories under its data root.
    pub fn new(config: Config, detector: Box<dyn FaceDetector>) -> Result<Self> {
        config.validate().context("invalid session config")?;
        let storage = StorageGateway::from_config(&config);
        storage
            .ensure_layout()
            .context("preparing output directories")?;
        debug!(
            "face session ready, outputs in {}",
            storage.processed_dir().display()
        );
        Ok(Self {
            config,
            storage,
            detector,
            state: SessionState::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &StorageGateway {
        &self.storage
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.state.image_path, &self.state.image) {
            (None, _) => SessionPhase::Idle,
            (Some(_), None) => SessionPhase::Failed,
            (Some(_), Some(_)) => SessionPhase::Detected {
                face: self.state.face.is_some(),
            },
        }
    }

    pub fn last_face(&self) -> Option<&FaceDescriptor> {
        self.state.face.as_ref()
    }

    pub fn last_image_path(&self) -> Option<&str> {
        self.state.image_path.as_deref()
    }

    /// Drop the stored image and face once the caller has consumed the outputs.
    pub fn release(&mut self) {
        self.state = SessionState::default();
    }

    /// Find the face in `image_path` and save a preview with the padded face
    /// box outlined.
    ///
    /// Without a face the input path comes back unchanged with
    /// [`NO_FACE_MESSAGE`]. If the image cannot be loaded the outcome is
    /// unsuccessful but still carries the input path.
    pub fn detect(&mut self, image_path: &str) -> ProcessOutcome {
        info!("detecting face in {}", image_path);

        let image = match load(image_path) {
            Ok(image) => image,
            Err(e) => {
                error!("failed to load {}: {:#}", image_path, e);
                self.state = SessionState {
                    image_path: Some(image_path.to_string()),
                    image: None,
                    face: None,
                };
                return ProcessOutcome::failure(Some(image_path), LOAD_FAILED_MESSAGE);
            }
        };

        let face = self.locate(&image);
        let outcome = match &face {
            None => {
                info!("no face in {}, returning it unchanged", image_path);
                ProcessOutcome::passthrough(image_path, false, NO_FACE_MESSAGE)
            }
            Some(face) => match self.preview(&image, face) {
                Ok(path) => {
                    info!("face preview saved to {}", path.display());
                    ProcessOutcome::saved(&path, true)
                }
                Err(e) => {
                    warn!("could not save face preview for {}: {:#}", image_path, e);
                    ProcessOutcome::passthrough(
                        image_path,
                        true,
                        "Face detected but the preview could not be saved",
                    )
                }
            },
        };

        self.state = SessionState {
            image_path: Some(image_path.to_string()),
            image: Some(image),
            face,
        };
        outcome
    }

    /// Crop the face found by the last [`detect`](Self::detect) call and mark
    /// its eye contours, or fall back to a biased center crop with
    /// placeholder markers when that call found no face.
    pub fn process(&self) -> ProcessOutcome {
        let Some(image) = self.state.image.as_ref() else {
            warn!("process called without a loaded image");
            return ProcessOutcome::failure(None, NO_IMAGE_MESSAGE);
        };
        self.render(image, self.state.face.as_ref(), TWO_PHASE)
    }

    /// Detect and process in one go, without touching the session state.
    ///
    /// Uses `image_path`, or the path of the last `detect` call when `None`.
    pub fn process_image(&self, image_path: Option<&str>) -> ProcessOutcome {
        let Some(path) = image_path.or(self.state.image_path.as_deref()) else {
            warn!("process_image called without a path");
            return ProcessOutcome::failure(None, NO_PATH_MESSAGE);
        };
        info!("processing {} in one shot", path);

        let image = match load(path) {
            Ok(image) => image,
            Err(e) => {
                error!("failed to load {}: {:#}", path, e);
                return ProcessOutcome::failure(Some(path), LOAD_FAILED_MESSAGE);
            }
        };
        let face = self.locate(&image);
        self.render(&image, face.as_ref(), ONE_SHOT)
    }

    /// Run the detector on a synthetic face; `true` if it answered in time.
    pub fn check_detector(&self) -> bool {
        let probe = compositor::draw_probe_face();
        match self.detector.locate(&probe, self.config.detect_timeout()) {
            Ok(face) => {
                info!("detector check passed (face found: {})", face.is_some());
                true
            }
            Err(e) => {
                warn!("detector check failed: {}", e);
                false
            }
        }
    }

    fn stroke(&self) -> Stroke {
        Stroke {
            width: self.config.box_stroke,
            ..Stroke::default()
        }
    }

    fn marker(&self) -> Marker {
        Marker {
            radius: self.config.marker_radius,
            ..Marker::default()
        }
    }

    /// Timeouts, detector failures and faces that fall outside the frame
    /// count as "no face".
    fn locate(&self, image: &RgbaImage) -> Option<FaceDescriptor> {
        let face = match self.detector.locate(image, self.config.detect_timeout()) {
            Ok(face) => face?,
            Err(DetectorError::Timeout(after)) => {
                warn!("face detection timed out after {:?}, treating as no face", after);
                return None;
            }
            Err(e) => {
                error!("face detection failed, treating as no face: {}", e);
                return None;
            }
        };

        if self.face_region(image, &face).is_empty() {
            warn!(
                "face box {:?} lies outside the {}x{} image, treating as no face",
                face.bounds,
                image.width(),
                image.height()
            );
            return None;
        }
        Some(face)
    }

    fn face_region(&self, image: &RgbaImage, face: &FaceDescriptor) -> BoundingBox {
        geometry::pad(face.bounds, image.width(), image.height(), self.config.padding)
    }

    fn preview(&self, image: &RgbaImage, face: &FaceDescriptor) -> Result<PathBuf> {
        let region = self.face_region(image, face);
        debug!("face box {:?} padded to {:?}", face.bounds, region);
        let preview = compositor::draw_bounding_box(image, &region, self.stroke());
        self.save(&preview, OutputKind::Detected)
    }

    fn render(&self, image: &RgbaImage, face: Option<&FaceDescriptor>, naming: Naming) -> ProcessOutcome {
        let face_detected = face.is_some();
        let attempt = match face {
            Some(face) => self
                .annotate_face(image, face)
                .and_then(|out| self.save(&out, naming.face)),
            None => self
                .annotate_fallback(image)
                .and_then(|out| self.save(&out, naming.no_face)),
        };

        let err = match attempt {
            Ok(path) => {
                info!("processed image saved to {}", path.display());
                return ProcessOutcome::saved(&path, face_detected);
            }
            Err(err) => err,
        };

        warn!("processing failed, using fallback crop: {:#}", err);
        match self
            .annotate_fallback(image)
            .and_then(|out| self.save(&out, OutputKind::ErrorFallback))
        {
            Ok(path) => ProcessOutcome {
                success: true,
                path: Some(path.to_string_lossy().into_owned()),
                face_detected,
                message: Some(format!("Processed with fallback after error: {err}")),
            },
            Err(fallback_err) => {
                error!("fallback processing failed too: {:#}", fallback_err);
                ProcessOutcome::failure(None, "Failed to process the face")
            }
        }
    }

    /// Crop to the padded face box and mark both eye contours in crop space.
    fn annotate_face(&self, image: &RgbaImage, face: &FaceDescriptor) -> Result<RgbaImage> {
        let region = self.face_region(image, face);
        if region.is_empty() {
            anyhow::bail!(
                "face box {:?} is empty inside {}x{}",
                face.bounds,
                image.width(),
                image.height()
            );
        }

        let cropped = geometry::crop(image, &region);
        let eyes = geometry::translate(&face.eye_points(), region.left as f32, region.top as f32);
        let reported: Vec<&str> = face.contours.keys().map(Contour::as_str).collect();
        debug!(
            "marking {} eye point(s) in {:?}, contours reported: {}",
            eyes.len(),
            region,
            reported.join(", ")
        );
        Ok(compositor::draw_points(&cropped, &eyes, self.marker()))
    }

    fn annotate_fallback(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let region = geometry::center_crop(
            image.width(),
            image.height(),
            self.config.fallback_keep,
            TOP_THIRD_BIAS,
        );
        if region.is_empty() {
            anyhow::bail!(
                "fallback crop is empty for {}x{}",
                image.width(),
                image.height()
            );
        }
        let cropped = geometry::crop(image, &region);
        Ok(compositor::draw_simulated_eye_markers(&cropped, self.marker()))
    }

    fn save(&self, image: &RgbaImage, kind: OutputKind) -> Result<PathBuf> {
        self.storage
            .write_output(image, kind)
            .with_context(|| format!("saving {} output", kind.prefix()))
    }
}

fn load(image_path: &str) -> Result<RgbaImage> {
    let path = Path::new(uri::strip_file_scheme(image_path));
    Ok(codec::decode(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ProcessOutcome::passthrough("/in.jpg", false, NO_FACE_MESSAGE);
        let json: serde_json::Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["path"], "/in.jpg");
        assert_eq!(json["faceDetected"], false);
        assert_eq!(json["message"], NO_FACE_MESSAGE);

        let failure = ProcessOutcome::failure(None, NO_IMAGE_MESSAGE);
        let json: serde_json::Value = serde_json::from_str(&failure.to_json().unwrap()).unwrap();
        assert!(json.get("path").is_none());
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_outcome_uri() {
        let outcome = ProcessOutcome::saved(Path::new("/data/ProcessedFaces/processed_1.jpg"), true);
        assert_eq!(
            outcome.uri().as_deref(),
            Some("file:///data/ProcessedFaces/processed_1.jpg")
        );
        assert_eq!(ProcessOutcome::failure(None, "x").uri(), None);
    }
}
