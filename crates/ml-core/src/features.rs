use thiserror::Error;

use crate::landmarks::{
    FACE_LANDMARK_COUNT, LANDMARK_COMPONENTS, Landmark, LandmarkError, LandmarkSet,
    POSE_LANDMARK_COUNT,
};

/// Feature length produced by a full holistic detection.
pub const HOLISTIC_FEATURE_LEN: usize =
    LANDMARK_COMPONENTS * (POSE_LANDMARK_COUNT + FACE_LANDMARK_COUNT);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeatureError {
    #[error(transparent)]
    Landmarks(#[from] LandmarkError),
    #[error("feature vector has {actual} values but the classifier expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Flat classifier input: pose landmarks then face landmarks, four values each.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// Flatten `pose` followed by `face`, keeping landmark order within each set.
    pub fn build(pose: &LandmarkSet, face: &LandmarkSet) -> Self {
        let mut values = Vec::with_capacity(LANDMARK_COMPONENTS * (pose.len() + face.len()));
        for landmark in pose.points().iter().chain(face.points()) {
            values.extend_from_slice(&landmark.components());
        }
        Self { values }
    }

    /// Like [`FeatureVector::build`], but rejects sets that do not match the
    /// detector layout and vectors the classifier cannot consume.
    pub fn build_for(
        pose: &LandmarkSet,
        face: &LandmarkSet,
        expected_len: usize,
    ) -> Result<Self, FeatureError> {
        pose.validate()?;
        face.validate()?;
        let features = Self::build(pose, face);
        if features.len() != expected_len {
            return Err(FeatureError::DimensionMismatch {
                expected: expected_len,
                actual: features.len(),
            });
        }
        Ok(features)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reshape the flat values back into landmark tuples.
    pub fn landmarks(&self) -> Vec<Landmark> {
        self.values
            .chunks_exact(LANDMARK_COMPONENTS)
            .map(|c| Landmark::new(c[0], c[1], c[2], c[3]))
            .collect()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }
}
