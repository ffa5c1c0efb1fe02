pub mod config;
pub mod session;
pub mod storage;
pub mod uri;

pub use session::{FaceProcessingSession, ProcessOutcome, SessionPhase};
pub use storage::{OutputKind, SavedFace, StorageGateway};

// Re-export vision types for convenience
pub use autocrop_vision::{
    codec, compositor, geometry, BoundingBox, Contour, DeadlineDetector, DetectorError,
    DetectorOptions, FaceDescriptor, FaceDetector, Point,
};
