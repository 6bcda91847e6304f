//! Model-side building blocks for body language inference: landmark records,
//! feature flattening, the class registry, and ONNX-backed collaborators.

pub mod classifier;
pub mod features;
pub mod holistic;
pub mod landmarks;
pub mod registry;
mod session;

pub use classifier::{Classification, Classifier, OnnxClassifier, OnnxClassifierConfig};
pub use features::{FeatureError, FeatureVector, HOLISTIC_FEATURE_LEN};
pub use holistic::{HolisticConfig, OnnxHolisticExtractor};
pub use landmarks::{
    FACE_LANDMARK_COUNT, HolisticLandmarks, Landmark, LandmarkError, LandmarkExtractor,
    LandmarkKind, LandmarkSet, POSE_LANDMARK_COUNT,
};
pub use registry::{ClassRegistry, RegistryError};
