//! In-memory collaborators for handler and pipeline tests.

use std::io::Cursor;

use anyhow::{Result, bail};
use image::{DynamicImage, ImageFormat, RgbImage};
use ml_core::{
    ClassRegistry, Classification, Classifier, FACE_LANDMARK_COUNT, FeatureVector,
    HOLISTIC_FEATURE_LEN, HolisticLandmarks, Landmark, LandmarkExtractor, LandmarkKind,
    LandmarkSet, POSE_LANDMARK_COUNT,
};

use crate::api::models::Models;

/// Chooses its detection from the red channel of the top-left pixel.
pub(crate) struct FakeExtractor;

impl FakeExtractor {
    pub(crate) const NOTHING: u8 = 10;
    pub(crate) const POSE_ONLY: u8 = 100;
    pub(crate) const FULL: u8 = 200;
    pub(crate) const FAILING: u8 = 250;
}

fn landmark_set(kind: LandmarkKind, len: usize) -> LandmarkSet {
    let points = (0..len)
        .map(|i| Landmark::new(i as f32 / len as f32, 0.5, -0.01, 0.9))
        .collect();
    LandmarkSet::new(kind, points)
}

impl LandmarkExtractor for FakeExtractor {
    fn extract(&self, image: &RgbImage) -> Result<HolisticLandmarks> {
        let shade = image.get_pixel(0, 0).0[0];
        let landmarks = match shade {
            Self::FAILING => bail!("detector crashed"),
            s if s >= Self::FULL => HolisticLandmarks {
                pose: Some(landmark_set(LandmarkKind::Pose, POSE_LANDMARK_COUNT)),
                face: Some(landmark_set(LandmarkKind::Face, FACE_LANDMARK_COUNT)),
            },
            s if s >= Self::POSE_ONLY => HolisticLandmarks {
                pose: Some(landmark_set(LandmarkKind::Pose, POSE_LANDMARK_COUNT)),
                face: None,
            },
            _ => HolisticLandmarks::default(),
        };
        Ok(landmarks)
    }
}

/// Returns a fixed distribution regardless of input.
pub(crate) struct FakeClassifier {
    registry: ClassRegistry,
    input_len: usize,
}

impl FakeClassifier {
    pub(crate) const PROBABILITIES: [f32; 3] = [0.1234, 0.6543, 0.2223];

    pub(crate) fn new(input_len: usize) -> Self {
        let registry =
            ClassRegistry::new(vec!["Happy".into(), "Sad".into(), "Victorious".into()])
                .expect("static labels");
        Self {
            registry,
            input_len,
        }
    }
}

impl Classifier for FakeClassifier {
    fn classes(&self) -> &ClassRegistry {
        &self.registry
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn classify(&self, features: &FeatureVector) -> Result<Classification> {
        if features.len() != self.input_len {
            bail!("unexpected feature length {}", features.len());
        }
        Classification::from_probabilities(&self.registry, &Self::PROBABILITIES)
    }
}

pub(crate) fn models() -> Models {
    models_with_input_len(HOLISTIC_FEATURE_LEN)
}

pub(crate) fn models_with_input_len(input_len: usize) -> Models {
    Models::new(FakeExtractor, FakeClassifier::new(input_len))
}

/// A small PNG filled with `shade`.
pub(crate) fn encode_png(shade: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(16, 12, image::Rgb([shade, shade, shade]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("png encoding");
    buffer.into_inner()
}
