pub mod codec;
pub mod compositor;
pub mod detector;
pub mod error;
pub mod face;
pub mod geometry;

// Re-export commonly used types
pub use detector::{DeadlineDetector, DetectorOptions, FaceDetector};
pub use error::{DecodeError, DetectorError, EncodeError};
pub use face::{Contour, FaceDescriptor};
pub use geometry::{BoundingBox, Point};
