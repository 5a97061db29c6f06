//! Post-processing filter modes.

use std::fmt;

use glam::UVec2;
use serde::{Deserialize, Serialize};

/// A screen-space stage applied to the scene image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStage {
    /// Luma conversion, in place in the primary target.
    Greyscale,
    /// Separable blur through the downscaled secondary target.
    Blur,
}

/// The active post-processing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Shaded scene presented as-is.
    #[default]
    Standard,
    /// Scene blurred.
    Blur,
    /// Scene converted to grey.
    Greyscale,
    /// Scene converted to grey, then blurred.
    ComboGreyscaleBlur,
}

impl FilterMode {
    /// All modes, in digit order.
    pub const ALL: [FilterMode; 4] = [
        FilterMode::Standard,
        FilterMode::Blur,
        FilterMode::Greyscale,
        FilterMode::ComboGreyscaleBlur,
    ];

    /// Stages to run after the scene pass, in order.
    #[must_use]
    pub fn stages(self) -> &'static [FilterStage] {
        match self {
            FilterMode::Standard => &[],
            FilterMode::Blur => &[FilterStage::Blur],
            FilterMode::Greyscale => &[FilterStage::Greyscale],
            FilterMode::ComboGreyscaleBlur => &[FilterStage::Greyscale, FilterStage::Blur],
        }
    }

    /// Whether the mode renders through a downscaled secondary target.
    #[must_use]
    pub fn downscales(self) -> bool {
        self.stages().contains(&FilterStage::Blur)
    }

    /// Size of the secondary target this mode needs for a given window size.
    #[must_use]
    pub fn secondary_target_size(self, width: u32, height: u32, downscale_level: u32) -> UVec2 {
        if self.downscales() {
            UVec2::new(
                width.checked_shr(downscale_level).unwrap_or(0).max(1),
                height.checked_shr(downscale_level).unwrap_or(0).max(1),
            )
        } else {
            UVec2::new(width.max(1), height.max(1))
        }
    }

    /// Maps a digit key to its mode (0 Standard, 1 Blur, 2 Greyscale, 3 Combo).
    #[must_use]
    pub fn from_digit(digit: u8) -> Option<Self> {
        Self::ALL.get(usize::from(digit)).copied()
    }

    /// Digit key bound to the mode.
    #[must_use]
    pub fn digit(self) -> u8 {
        match self {
            FilterMode::Standard => 0,
            FilterMode::Blur => 1,
            FilterMode::Greyscale => 2,
            FilterMode::ComboGreyscaleBlur => 3,
        }
    }

    /// Returns display name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FilterMode::Standard => "standard",
            FilterMode::Blur => "blur",
            FilterMode::Greyscale => "greyscale",
            FilterMode::ComboGreyscaleBlur => "greyscale + blur",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lists() {
        assert!(FilterMode::Standard.stages().is_empty());
        assert_eq!(FilterMode::Blur.stages(), &[FilterStage::Blur]);
        assert_eq!(FilterMode::Greyscale.stages(), &[FilterStage::Greyscale]);
        assert_eq!(
            FilterMode::ComboGreyscaleBlur.stages(),
            &[FilterStage::Greyscale, FilterStage::Blur]
        );
    }

    #[test]
    fn test_digits_round_trip() {
        for mode in FilterMode::ALL {
            assert_eq!(FilterMode::from_digit(mode.digit()), Some(mode));
        }
        assert_eq!(FilterMode::from_digit(4), None);
    }

    #[test]
    fn test_secondary_target_size() {
        assert_eq!(
            FilterMode::Blur.secondary_target_size(800, 600, 4),
            UVec2::new(50, 37)
        );
        assert_eq!(
            FilterMode::ComboGreyscaleBlur.secondary_target_size(800, 600, 4),
            UVec2::new(50, 37)
        );
        assert_eq!(
            FilterMode::Greyscale.secondary_target_size(800, 600, 4),
            UVec2::new(800, 600)
        );
        assert_eq!(
            FilterMode::Standard.secondary_target_size(800, 600, 4),
            UVec2::new(800, 600)
        );
    }

    #[test]
    fn test_tiny_window_never_yields_empty_target() {
        assert_eq!(
            FilterMode::Blur.secondary_target_size(8, 8, 4),
            UVec2::new(1, 1)
        );
    }
}
