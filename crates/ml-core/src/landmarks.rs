use image::RgbImage;
use thiserror::Error;

/// Number of points in a MediaPipe holistic pose landmark set.
pub const POSE_LANDMARK_COUNT: usize = 33;
/// Number of points in a MediaPipe face mesh (without iris refinement).
pub const FACE_LANDMARK_COUNT: usize = 468;
/// Values each landmark contributes to a feature vector: x, y, z, visibility.
pub const LANDMARK_COMPONENTS: usize = 4;

/// Single detector point in image-normalised coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    /// Components in feature order.
    pub fn components(&self) -> [f32; LANDMARK_COMPONENTS] {
        [self.x, self.y, self.z, self.visibility]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkKind {
    Pose,
    Face,
}

impl LandmarkKind {
    /// Point count the classifier was trained against for this kind.
    pub fn expected_len(self) -> usize {
        match self {
            LandmarkKind::Pose => POSE_LANDMARK_COUNT,
            LandmarkKind::Face => FACE_LANDMARK_COUNT,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LandmarkKind::Pose => "pose",
            LandmarkKind::Face => "face",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LandmarkError {
    #[error("{kind} landmark set is empty")]
    Empty { kind: &'static str },
    #[error("{kind} landmark set has {actual} points, expected {expected}")]
    UnexpectedLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Ordered landmarks of one kind; position in `points` is the anatomical index.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    kind: LandmarkKind,
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(kind: LandmarkKind, points: Vec<Landmark>) -> Self {
        Self { kind, points }
    }

    pub fn kind(&self) -> LandmarkKind {
        self.kind
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check the set against the detector layout expected for its kind.
    pub fn validate(&self) -> Result<(), LandmarkError> {
        let kind = self.kind.label();
        if self.points.is_empty() {
            return Err(LandmarkError::Empty { kind });
        }
        let expected = self.kind.expected_len();
        if self.points.len() != expected {
            return Err(LandmarkError::UnexpectedLength {
                kind,
                expected,
                actual: self.points.len(),
            });
        }
        Ok(())
    }
}

/// Pose and face detections for one image. Either may be missing.
#[derive(Debug, Clone, Default)]
pub struct HolisticLandmarks {
    pub pose: Option<LandmarkSet>,
    pub face: Option<LandmarkSet>,
}

impl HolisticLandmarks {
    /// Both sets, or `None` when the detection is partial.
    pub fn both(&self) -> Option<(&LandmarkSet, &LandmarkSet)> {
        match (&self.pose, &self.face) {
            (Some(pose), Some(face)) if !pose.is_empty() && !face.is_empty() => Some((pose, face)),
            _ => None,
        }
    }
}

/// Capability to turn an RGB image into holistic landmarks.
pub trait LandmarkExtractor: Send + Sync {
    fn extract(&self, image: &RgbImage) -> anyhow::Result<HolisticLandmarks>;
}
