//! Landmark geometry: eye/mouth aspect ratios and head pose

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DmsConfig;

/// Normalized image-space landmark (x, y in [0, 1])
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &LandmarkPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Head pose (Euler angles)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Yaw (left-right rotation) in degrees
    pub yaw: f32,
    /// Pitch (up-down tilt) in degrees
    pub pitch: f32,
    /// Roll (side tilt) in degrees
    pub roll: f32,
}

impl HeadPose {
    /// Largest of |pitch| and |yaw|
    pub fn max_tilt(&self) -> f32 {
        self.pitch.abs().max(self.yaw.abs())
    }
}

/// Ratios derived from a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMeasurement {
    /// Whether a face was present in the frame
    pub face_detected: bool,
    /// Eye aspect ratio, averaged over both eyes
    pub ear: f32,
    /// Mouth aspect ratio
    pub mar: f32,
    pub head_pose: HeadPose,
}

impl FrameMeasurement {
    /// Measurement for a frame with no usable face
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Fixed landmark indices of the upstream face model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkScheme {
    /// p1..p6, p1/p4 are the horizontal corners
    pub left_eye: [usize; 6],
    pub right_eye: [usize; 6],
    /// p1/p5 are the mouth corners, (p2,p8) (p3,p7) (p4,p6) the vertical pairs
    pub mouth: [usize; 8],
    pub nose_tip: usize,
}

impl LandmarkScheme {
    /// MediaPipe face mesh (468 landmarks)
    pub fn face_mesh() -> Self {
        Self {
            left_eye: [33, 160, 158, 133, 153, 144],
            right_eye: [362, 385, 387, 263, 373, 380],
            mouth: [61, 81, 13, 311, 291, 402, 14, 178],
            nose_tip: 1,
        }
    }

    /// Minimum number of landmarks a frame must carry
    pub fn required_len(&self) -> usize {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .chain(self.mouth.iter())
            .chain(std::iter::once(&self.nose_tip))
            .max()
            .map_or(0, |max| max + 1)
    }
}

impl Default for LandmarkScheme {
    fn default() -> Self {
        Self::face_mesh()
    }
}

/// Eye aspect ratio: (|p2-p6| + |p3-p5|) / (2 |p1-p4|)
///
/// Returns 0.0 when the horizontal distance is zero.
pub fn eye_aspect_ratio(eye: &[LandmarkPoint; 6]) -> f32 {
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal == 0.0 {
        return 0.0;
    }
    let vertical = eye[1].distance(&eye[5]) + eye[2].distance(&eye[4]);
    vertical / (2.0 * horizontal)
}

/// Mouth aspect ratio: (|p2-p8| + |p3-p7| + |p4-p6|) / (2 |p1-p5|)
///
/// Returns 0.0 when the corners coincide.
pub fn mouth_aspect_ratio(mouth: &[LandmarkPoint; 8]) -> f32 {
    let horizontal = mouth[0].distance(&mouth[4]);
    if horizontal == 0.0 {
        return 0.0;
    }
    let vertical = mouth[1].distance(&mouth[7])
        + mouth[2].distance(&mouth[6])
        + mouth[3].distance(&mouth[5]);
    vertical / (2.0 * horizontal)
}

fn clamp_degrees(radians: f32) -> f32 {
    let degrees = radians.to_degrees();
    if degrees.is_finite() {
        degrees.clamp(-90.0, 90.0)
    } else {
        0.0
    }
}

fn centroid(points: &[LandmarkPoint]) -> LandmarkPoint {
    let n = points.len().max(1) as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    LandmarkPoint::new(sx / n, sy / n)
}

/// Approximate head pose from eye centres and nose tip
///
/// Yaw and pitch come from the nose tip's offset from the eye midpoint, not
/// from the inter-eye distance: `atan2(eye_dx, depth)` would read about 11°
/// on a frontal face and trip the tilt threshold. Roll follows the eye line.
pub fn head_pose(
    left_eye_center: LandmarkPoint,
    right_eye_center: LandmarkPoint,
    nose: LandmarkPoint,
    depth: f32,
) -> HeadPose {
    let eye_dx = right_eye_center.x - left_eye_center.x;
    let eye_dy = right_eye_center.y - left_eye_center.y;
    let mid = LandmarkPoint::new(
        (left_eye_center.x + right_eye_center.x) / 2.0,
        (left_eye_center.y + right_eye_center.y) / 2.0,
    );

    HeadPose {
        yaw: clamp_degrees((nose.x - mid.x).atan2(depth)),
        pitch: clamp_degrees((nose.y - mid.y).atan2(depth)),
        roll: if eye_dx == 0.0 && eye_dy == 0.0 {
            0.0
        } else {
            clamp_degrees(eye_dy.atan2(eye_dx))
        },
    }
}

/// Stateless converter from landmarks to a [`FrameMeasurement`]
#[derive(Debug, Clone)]
pub struct RatioExtractor {
    scheme: LandmarkScheme,
    pose_depth: f32,
}

impl RatioExtractor {
    pub fn new(config: &DmsConfig) -> Self {
        Self::with_scheme(LandmarkScheme::default(), config.pose_depth)
    }

    pub fn with_scheme(scheme: LandmarkScheme, pose_depth: f32) -> Self {
        Self { scheme, pose_depth }
    }

    pub fn scheme(&self) -> &LandmarkScheme {
        &self.scheme
    }

    /// Extract ratios from one frame of landmarks
    ///
    /// Missing, truncated or non-finite input yields [`FrameMeasurement::empty`].
    pub fn extract(&self, landmarks: &[LandmarkPoint]) -> FrameMeasurement {
        if landmarks.is_empty() {
            return FrameMeasurement::empty();
        }
        if landmarks.len() < self.scheme.required_len() {
            debug!(
                "Landmark set too short ({} < {}), treating as no face",
                landmarks.len(),
                self.scheme.required_len()
            );
            return FrameMeasurement::empty();
        }

        let left = self.scheme.left_eye.map(|i| landmarks[i]);
        let right = self.scheme.right_eye.map(|i| landmarks[i]);
        let mouth = self.scheme.mouth.map(|i| landmarks[i]);
        let nose = landmarks[self.scheme.nose_tip];

        let all_finite = left
            .iter()
            .chain(right.iter())
            .chain(mouth.iter())
            .chain(std::iter::once(&nose))
            .all(LandmarkPoint::is_finite);
        if !all_finite {
            debug!("Non-finite landmark coordinates, treating as no face");
            return FrameMeasurement::empty();
        }

        let ear = (eye_aspect_ratio(&left) + eye_aspect_ratio(&right)) / 2.0;
        let mar = mouth_aspect_ratio(&mouth);
        let head_pose = head_pose(centroid(&left), centroid(&right), nose, self.pose_depth);

        FrameMeasurement {
            face_detected: true,
            ear,
            mar,
            head_pose,
        }
    }
}

impl Default for RatioExtractor {
    fn default() -> Self {
        Self::new(&DmsConfig::default())
    }
}
