//! Holistic (pose + face) landmark extraction backed by MediaPipe models
//! exported to ONNX.
//!
//! The pose landmark model runs on the whole image, letterboxed to a square.
//! The face mesh model runs on a region derived from the pose head keypoints,
//! the same hand-off MediaPipe holistic performs. Both models are supplied
//! externally; this module only prepares tensors and decodes outputs.

use std::{path::PathBuf, sync::Mutex};

use anyhow::{Result, anyhow, bail};
use image::{RgbImage, imageops};
use ndarray::Array4;
use ort::session::Session;
use tracing::debug;

use crate::{
    landmarks::{
        HolisticLandmarks, Landmark, LandmarkExtractor, LandmarkKind, LandmarkSet,
        POSE_LANDMARK_COUNT,
    },
    session,
};

/// Values per pose point: x, y, z, visibility logit, presence logit.
const POSE_STRIDE: usize = 5;
/// Values per face point: x, y, z.
const FACE_STRIDE: usize = 3;
/// Pose indices covering nose, eyes, ears and mouth.
const POSE_HEAD_KEYPOINTS: std::ops::RangeInclusive<usize> = 0..=10;
/// Face region edge relative to the head keypoint extent.
const FACE_ROI_SCALE: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct HolisticConfig {
    pub pose_model_path: PathBuf,
    pub face_model_path: PathBuf,
    pub pose_input_size: u32,
    pub face_input_size: u32,
    pub min_detection_confidence: f32,
    pub intra_threads: usize,
}

impl HolisticConfig {
    pub fn new(pose_model_path: impl Into<PathBuf>, face_model_path: impl Into<PathBuf>) -> Self {
        Self {
            pose_model_path: pose_model_path.into(),
            face_model_path: face_model_path.into(),
            pose_input_size: 256,
            face_input_size: 192,
            min_detection_confidence: 0.5,
            intra_threads: 1,
        }
    }
}

pub struct OnnxHolisticExtractor {
    pose_session: Mutex<Session>,
    face_session: Mutex<Session>,
    pose_input_size: u32,
    face_input_size: u32,
    min_detection_confidence: f32,
}

impl OnnxHolisticExtractor {
    pub fn load(config: &HolisticConfig) -> Result<Self> {
        if config.pose_input_size == 0 || config.face_input_size == 0 {
            bail!("landmark model input sizes must be positive");
        }
        if !(0.0..=1.0).contains(&config.min_detection_confidence) {
            bail!("min detection confidence must lie in [0, 1]");
        }
        let pose_session = session::load_session(&config.pose_model_path, config.intra_threads)?;
        let face_session = session::load_session(&config.face_model_path, config.intra_threads)?;
        Ok(Self {
            pose_session: Mutex::new(pose_session),
            face_session: Mutex::new(face_session),
            pose_input_size: config.pose_input_size,
            face_input_size: config.face_input_size,
            min_detection_confidence: config.min_detection_confidence,
        })
    }

    fn detect_pose(&self, image: &RgbImage) -> Result<Option<LandmarkSet>> {
        let letterbox = Letterbox::new(image.width(), image.height());
        let input = to_input_tensor(&letterbox.apply(image), self.pose_input_size)?;

        let mut guard = self
            .pose_session
            .lock()
            .map_err(|_| anyhow!("pose session poisoned"))?;
        let outputs = session::run_f32(&mut guard, input, &[0, 1])?;
        drop(guard);

        let presence = outputs[1].first().copied().unwrap_or(0.0);
        decode_pose(
            &outputs[0],
            presence,
            &letterbox,
            self.pose_input_size,
            self.min_detection_confidence,
        )
    }

    fn detect_face(&self, image: &RgbImage, roi: FaceRoi) -> Result<Option<LandmarkSet>> {
        let crop = imageops::crop_imm(image, roi.x, roi.y, roi.width, roi.height).to_image();
        let input = to_input_tensor(&crop, self.face_input_size)?;

        let mut guard = self
            .face_session
            .lock()
            .map_err(|_| anyhow!("face session poisoned"))?;
        let outputs = session::run_f32(&mut guard, input, &[0, 1])?;
        drop(guard);

        let presence_logit = outputs[1].first().copied().unwrap_or(f32::NEG_INFINITY);
        decode_face(
            &outputs[0],
            presence_logit,
            roi,
            self.face_input_size,
            (image.width(), image.height()),
            self.min_detection_confidence,
        )
    }
}

impl LandmarkExtractor for OnnxHolisticExtractor {
    fn extract(&self, image: &RgbImage) -> Result<HolisticLandmarks> {
        if image.width() == 0 || image.height() == 0 {
            bail!("image has no pixels");
        }

        let Some(pose) = self.detect_pose(image)? else {
            debug!("no pose above detection threshold");
            return Ok(HolisticLandmarks::default());
        };

        let face = match FaceRoi::from_pose(&pose, image.width(), image.height()) {
            Some(roi) => self.detect_face(image, roi)?,
            None => None,
        };

        Ok(HolisticLandmarks {
            pose: Some(pose),
            face,
        })
    }
}

/// Placement of an image inside the square canvas fed to the pose model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Letterbox {
    width: u32,
    height: u32,
    side: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        let side = width.max(height);
        Self {
            width,
            height,
            side,
            pad_x: (side - width) / 2,
            pad_y: (side - height) / 2,
        }
    }

    pub(crate) fn apply(&self, image: &RgbImage) -> RgbImage {
        if self.pad_x == 0 && self.pad_y == 0 {
            return image.clone();
        }
        let mut canvas = RgbImage::new(self.side, self.side);
        imageops::overlay(&mut canvas, image, self.pad_x as i64, self.pad_y as i64);
        canvas
    }

    /// Map model-input pixel coordinates back to image-normalised ones.
    pub(crate) fn to_image(&self, x: f32, y: f32, z: f32, input_size: u32) -> (f32, f32, f32) {
        let scale = self.side as f32 / input_size as f32;
        let width = self.width as f32;
        let height = self.height as f32;
        (
            (x * scale - self.pad_x as f32) / width,
            (y * scale - self.pad_y as f32) / height,
            z * scale / width,
        )
    }
}

/// Pixel rectangle handed to the face mesh model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FaceRoi {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl FaceRoi {
    /// Square region around the pose head keypoints, clamped to the image.
    pub(crate) fn from_pose(
        pose: &LandmarkSet,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let head = pose.points().get(POSE_HEAD_KEYPOINTS)?;
        let (w, h) = (image_width as f32, image_height as f32);

        let mut x_min = f32::MAX;
        let mut y_min = f32::MAX;
        let mut x_max = f32::MIN;
        let mut y_max = f32::MIN;
        for p in head {
            x_min = x_min.min(p.x * w);
            y_min = y_min.min(p.y * h);
            x_max = x_max.max(p.x * w);
            y_max = y_max.max(p.y * h);
        }

        let side = ((x_max - x_min).max(y_max - y_min) * FACE_ROI_SCALE).max(1.0);
        let center_x = (x_min + x_max) / 2.0;
        let center_y = (y_min + y_max) / 2.0;

        let left = (center_x - side / 2.0).clamp(0.0, w);
        let top = (center_y - side / 2.0).clamp(0.0, h);
        let right = (center_x + side / 2.0).clamp(0.0, w);
        let bottom = (center_y + side / 2.0).clamp(0.0, h);

        let roi = Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        };
        (roi.width > 0 && roi.height > 0).then_some(roi)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Resize to a square model input, NHWC, scaled to `[0, 1]`.
pub(crate) fn to_input_tensor(image: &RgbImage, size: u32) -> Result<Array4<f32>> {
    let resized = imageops::resize(image, size, size, imageops::FilterType::Triangle);
    let data: Vec<f32> = resized
        .pixels()
        .flat_map(|p| p.0)
        .map(|v| v as f32 / 255.0)
        .collect();
    let side = size as usize;
    Ok(Array4::from_shape_vec((1, side, side, 3), data)?)
}

/// Decode the pose model's landmark row; `None` when presence is below threshold.
pub(crate) fn decode_pose(
    raw: &[f32],
    presence: f32,
    letterbox: &Letterbox,
    input_size: u32,
    min_confidence: f32,
) -> Result<Option<LandmarkSet>> {
    if presence < min_confidence {
        return Ok(None);
    }
    if raw.is_empty() || raw.len() % POSE_STRIDE != 0 {
        bail!(
            "pose model returned {} values, not a multiple of {POSE_STRIDE}",
            raw.len()
        );
    }

    let points = raw
        .chunks_exact(POSE_STRIDE)
        .take(POSE_LANDMARK_COUNT)
        .map(|c| {
            let (x, y, z) = letterbox.to_image(c[0], c[1], c[2], input_size);
            Landmark::new(x, y, z, sigmoid(c[3]))
        })
        .collect();
    Ok(Some(LandmarkSet::new(LandmarkKind::Pose, points)))
}

/// Decode the face mesh row relative to `roi`; `None` when presence is below threshold.
pub(crate) fn decode_face(
    raw: &[f32],
    presence_logit: f32,
    roi: FaceRoi,
    input_size: u32,
    (image_width, image_height): (u32, u32),
    min_confidence: f32,
) -> Result<Option<LandmarkSet>> {
    if sigmoid(presence_logit) < min_confidence {
        return Ok(None);
    }
    if raw.is_empty() || raw.len() % FACE_STRIDE != 0 {
        bail!(
            "face model returned {} values, not a multiple of {FACE_STRIDE}",
            raw.len()
        );
    }

    let input = input_size as f32;
    let (w, h) = (image_width as f32, image_height as f32);
    let points = raw
        .chunks_exact(FACE_STRIDE)
        .map(|c| {
            let x = (roi.x as f32 + c[0] / input * roi.width as f32) / w;
            let y = (roi.y as f32 + c[1] / input * roi.height as f32) / h;
            let z = c[2] / input * roi.width as f32 / w;
            Landmark::new(x, y, z, 0.0)
        })
        .collect();
    Ok(Some(LandmarkSet::new(LandmarkKind::Face, points)))
}
