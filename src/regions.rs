//! Static region tables.
//!
//! A [`RegionIndexMap`] ties each [`FaceRegion`] to the landmark indices of a
//! detector convention and to the class ids of a face-parsing convention.
//! Tables are fixed lookup data; nothing here is mutated at runtime.
//!
//! "Left" and "right" in anchor names refer to the image, not the subject:
//! the left eye is the one with the smaller x coordinate in a frontal face.

use serde::{Deserialize, Serialize};

/// A named anatomical grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceRegion {
    Eyes,
    Brows,
    Nose,
    Mouth,
    Jaw,
    Skin,
    Hair,
    Ears,
    Neck,
}

impl FaceRegion {
    pub const ALL: [FaceRegion; 9] = [
        FaceRegion::Eyes,
        FaceRegion::Brows,
        FaceRegion::Nose,
        FaceRegion::Mouth,
        FaceRegion::Jaw,
        FaceRegion::Skin,
        FaceRegion::Hair,
        FaceRegion::Ears,
        FaceRegion::Neck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FaceRegion::Eyes => "eyes",
            FaceRegion::Brows => "brows",
            FaceRegion::Nose => "nose",
            FaceRegion::Mouth => "mouth",
            FaceRegion::Jaw => "jaw",
            FaceRegion::Skin => "skin",
            FaceRegion::Hair => "hair",
            FaceRegion::Ears => "ears",
            FaceRegion::Neck => "neck",
        }
    }
}

impl std::fmt::Display for FaceRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single landmarks and landmark groups used by pose, normalization and jaw
/// synthesis.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkAnchors {
    /// Contour of the eye on the image-left side.
    pub left_eye: &'static [usize],
    /// Contour of the eye on the image-right side.
    pub right_eye: &'static [usize],
    pub nose_tip: usize,
    pub left_cheek: usize,
    pub right_cheek: usize,
    /// Lower face contour ordered from the image-left cheek to the image-right cheek.
    pub jaw_outline: &'static [usize],
    pub left_gonion: usize,
    pub right_gonion: usize,
}

impl LandmarkAnchors {
    /// Every index pose estimation depends on.
    pub fn pose_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .copied()
            .chain([self.nose_tip, self.left_cheek, self.right_cheek])
    }
}

/// Read-only mapping from regions to landmark indices and parsing class ids.
#[derive(Debug, Clone, Copy)]
pub struct RegionIndexMap {
    name: &'static str,
    landmark_count: usize,
    landmarks: &'static [(FaceRegion, &'static [usize])],
    classes: &'static [(FaceRegion, &'static [u8])],
    anchors: LandmarkAnchors,
}

impl RegionIndexMap {
    /// Build a custom table. The built-in tables are [`RegionIndexMap::mediapipe`]
    /// and [`RegionIndexMap::ibug68`].
    pub const fn new(
        name: &'static str,
        landmark_count: usize,
        landmarks: &'static [(FaceRegion, &'static [usize])],
        classes: &'static [(FaceRegion, &'static [u8])],
        anchors: LandmarkAnchors,
    ) -> Self {
        Self {
            name,
            landmark_count,
            landmarks,
            classes,
            anchors,
        }
    }

    /// MediaPipe 468-point face mesh with CelebAMask-HQ parsing classes.
    pub fn mediapipe() -> &'static RegionIndexMap {
        &MEDIAPIPE_468
    }

    /// iBUG 68-point annotation with CelebAMask-HQ parsing classes.
    pub fn ibug68() -> &'static RegionIndexMap {
        &IBUG_68
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of landmarks the convention produces.
    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    pub fn anchors(&self) -> &LandmarkAnchors {
        &self.anchors
    }

    /// Landmark indices for a region (empty when the region has none).
    pub fn landmark_indices(&self, region: FaceRegion) -> &'static [usize] {
        self.landmarks
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, idx)| *idx)
            .unwrap_or(&[])
    }

    /// Parsing class ids for a region (empty when the region has none).
    pub fn class_ids(&self, region: FaceRegion) -> &'static [u8] {
        self.classes
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, ids)| *ids)
            .unwrap_or(&[])
    }

    /// Regions with a landmark subset, in table order.
    pub fn landmark_regions(&self) -> impl Iterator<Item = (FaceRegion, &'static [usize])> + '_ {
        self.landmarks.iter().copied()
    }

    /// Regions with a class-id subset, in table order.
    pub fn mask_regions(&self) -> impl Iterator<Item = (FaceRegion, &'static [u8])> + '_ {
        self.classes.iter().copied()
    }
}

impl Default for RegionIndexMap {
    fn default() -> Self {
        MEDIAPIPE_468
    }
}

/// CelebAMask-HQ face parsing class ids.
pub mod class {
    pub const BACKGROUND: u8 = 0;
    pub const SKIN: u8 = 1;
    pub const LEFT_BROW: u8 = 2;
    pub const RIGHT_BROW: u8 = 3;
    pub const LEFT_EYE: u8 = 4;
    pub const RIGHT_EYE: u8 = 5;
    pub const EYE_GLASSES: u8 = 6;
    pub const LEFT_EAR: u8 = 7;
    pub const RIGHT_EAR: u8 = 8;
    pub const EARRING: u8 = 9;
    pub const NOSE: u8 = 10;
    pub const MOUTH: u8 = 11;
    pub const UPPER_LIP: u8 = 12;
    pub const LOWER_LIP: u8 = 13;
    pub const NECK: u8 = 14;
    pub const NECKLACE: u8 = 15;
    pub const CLOTH: u8 = 16;
    pub const HAIR: u8 = 17;
    pub const HAT: u8 = 18;
}

const CELEBAMASK_CLASSES: &[(FaceRegion, &[u8])] = &[
    (FaceRegion::Eyes, &[class::LEFT_EYE, class::RIGHT_EYE]),
    (FaceRegion::Brows, &[class::LEFT_BROW, class::RIGHT_BROW]),
    (FaceRegion::Nose, &[class::NOSE]),
    (
        FaceRegion::Mouth,
        &[class::MOUTH, class::UPPER_LIP, class::LOWER_LIP],
    ),
    (FaceRegion::Skin, &[class::SKIN]),
    (FaceRegion::Hair, &[class::HAIR]),
    (FaceRegion::Ears, &[class::LEFT_EAR, class::RIGHT_EAR]),
    (FaceRegion::Neck, &[class::NECK]),
];

// MediaPipe face mesh (468 points).
const MP_LEFT_EYE: &[usize] = &[
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];
const MP_RIGHT_EYE: &[usize] = &[
    263, 249, 390, 373, 374, 380, 381, 382, 362, 398, 384, 385, 386, 387, 388, 466,
];
const MP_EYES: &[usize] = &[
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246, //
    263, 249, 390, 373, 374, 380, 381, 382, 362, 398, 384, 385, 386, 387, 388, 466,
];
const MP_BROWS: &[usize] = &[
    70, 63, 105, 66, 107, 55, 65, 52, 53, 46, //
    300, 293, 334, 296, 336, 285, 295, 282, 283, 276,
];
const MP_NOSE: &[usize] = &[
    168, 6, 197, 195, 5, 4, 1, 19, 94, 2, 98, 97, 326, 327, 64, 294, 48, 278, 115, 344,
];
const MP_MOUTH: &[usize] = &[
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
];
const MP_JAW: &[usize] = &[
    234, 93, 132, 58, 172, 136, 150, 149, 176, 148, 152, 377, 400, 378, 379, 365, 397, 288, 361,
    323, 454,
];

static MEDIAPIPE_468: RegionIndexMap = RegionIndexMap::new(
    "mediapipe-468",
    468,
    &[
        (FaceRegion::Eyes, MP_EYES),
        (FaceRegion::Brows, MP_BROWS),
        (FaceRegion::Nose, MP_NOSE),
        (FaceRegion::Mouth, MP_MOUTH),
        (FaceRegion::Jaw, MP_JAW),
    ],
    CELEBAMASK_CLASSES,
    LandmarkAnchors {
        left_eye: MP_LEFT_EYE,
        right_eye: MP_RIGHT_EYE,
        nose_tip: 1,
        left_cheek: 234,
        right_cheek: 454,
        jaw_outline: MP_JAW,
        left_gonion: 172,
        right_gonion: 397,
    },
);

// iBUG 68-point annotation: jaw 0-16, brows 17-26, nose 27-35, eyes 36-47,
// outer lip 48-59, inner lip 60-67.
const IB_JAW: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
const IB_BROWS: &[usize] = &[17, 18, 19, 20, 21, 22, 23, 24, 25, 26];
const IB_NOSE: &[usize] = &[27, 28, 29, 30, 31, 32, 33, 34, 35];
const IB_LEFT_EYE: &[usize] = &[36, 37, 38, 39, 40, 41];
const IB_RIGHT_EYE: &[usize] = &[42, 43, 44, 45, 46, 47];
const IB_EYES: &[usize] = &[36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47];
const IB_MOUTH: &[usize] = &[48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59];

static IBUG_68: RegionIndexMap = RegionIndexMap::new(
    "ibug-68",
    68,
    &[
        (FaceRegion::Eyes, IB_EYES),
        (FaceRegion::Brows, IB_BROWS),
        (FaceRegion::Nose, IB_NOSE),
        (FaceRegion::Mouth, IB_MOUTH),
        (FaceRegion::Jaw, IB_JAW),
    ],
    CELEBAMASK_CLASSES,
    LandmarkAnchors {
        left_eye: IB_LEFT_EYE,
        right_eye: IB_RIGHT_EYE,
        nose_tip: 30,
        left_cheek: 1,
        right_cheek: 15,
        jaw_outline: IB_JAW,
        left_gonion: 4,
        right_gonion: 12,
    },
);
