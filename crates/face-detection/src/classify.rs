//! Frame classification policy

use media_capture::VideoFrame;
use crate::analysis::FaceStatus;
use crate::detector::{FaceDetection, Point};

/// Both eyes fully inside the visible frame with positive coordinates
pub fn eyes_visible(face: &FaceDetection, frame: &VideoFrame) -> bool {
    match (face.left_eye(), face.right_eye()) {
        (Some(left), Some(right)) => left
            .iter()
            .chain(right.iter())
            .all(|p| frame.contains(p.x, p.y)),
        _ => false,
    }
}

/// Nose tip horizontally centred between the eyes, within
/// `threshold * frame.width` pixels
pub fn facing_screen(face: &FaceDetection, frame: &VideoFrame, threshold: f32) -> bool {
    let (Some(left), Some(right), Some(nose)) = (face.left_eye(), face.right_eye(), face.nose_tip())
    else {
        return false;
    };
    let (Some(left), Some(right)) = (Point::centroid(left), Point::centroid(right)) else {
        return false;
    };
    let eye_mid_x = (left.x + right.x) / 2.0;
    (nose.x - eye_mid_x).abs() < threshold * frame.width as f32
}

/// Classify one frame's detections
pub fn classify(faces: &[FaceDetection], frame: &VideoFrame, orientation_threshold: f32) -> FaceStatus {
    match faces {
        [] => FaceStatus::NoFace,
        [face] => {
            if eyes_visible(face, frame) && facing_screen(face, frame, orientation_threshold) {
                FaceStatus::Aligned
            } else {
                FaceStatus::Misaligned
            }
        }
        _ => FaceStatus::MultipleFaces,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use media_capture::VideoFrame;

    pub use crate::testing::frontal_face;

    pub fn frame() -> VideoFrame {
        VideoFrame::blank(640, 480, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use proptest::prelude::*;

    const THRESHOLD: f32 = 0.015;

    #[test]
    fn test_zero_faces_is_no_user() {
        assert_eq!(classify(&[], &frame(), THRESHOLD), FaceStatus::NoFace);
    }

    #[test]
    fn test_two_faces_is_multiple_people() {
        let faces = vec![frontal_face(200.0), frontal_face(420.0)];
        assert_eq!(classify(&faces, &frame(), THRESHOLD), FaceStatus::MultipleFaces);
    }

    #[test]
    fn test_frontal_face_is_aligned() {
        assert_eq!(
            classify(&[frontal_face(320.0)], &frame(), THRESHOLD),
            FaceStatus::Aligned
        );
    }

    #[test]
    fn test_eye_with_zero_coordinate_is_misaligned() {
        let mut face = frontal_face(320.0);
        face.landmarks[37].y = 0.0;
        assert_eq!(classify(&[face], &frame(), THRESHOLD), FaceStatus::Misaligned);
    }

    #[test]
    fn test_turned_head_is_misaligned() {
        let mut face = frontal_face(320.0);
        // 640 * 0.015 = 9.6px tolerance
        face.landmarks[30].x = 335.0;
        assert!(eyes_visible(&face, &frame()));
        assert_eq!(classify(&[face], &frame(), THRESHOLD), FaceStatus::Misaligned);
    }

    #[test]
    fn test_truncated_landmarks_are_misaligned() {
        let face = FaceDetection::new(0.9, vec![Point::new(10.0, 10.0); 20]);
        assert_eq!(classify(&[face], &frame(), THRESHOLD), FaceStatus::Misaligned);
    }

    proptest! {
        #[test]
        fn prop_any_non_positive_eye_point_is_misaligned(
            idx in 36usize..48,
            x in -100.0f32..=0.0,
        ) {
            let mut face = frontal_face(320.0);
            face.landmarks[idx].x = x;
            prop_assert_eq!(classify(&[face], &frame(), THRESHOLD), FaceStatus::Misaligned);
        }

        #[test]
        fn prop_more_than_one_face_is_multiple(n in 2usize..6) {
            let faces: Vec<_> = (0..n).map(|i| frontal_face(100.0 + i as f32 * 80.0)).collect();
            prop_assert_eq!(classify(&faces, &frame(), THRESHOLD), FaceStatus::MultipleFaces);
        }
    }
}
