//! Price list for AI generation actions.
//!
//! Prices are VND per generated image (or per video). Pro rendering replaces the
//! per-action price with a flat rate that depends on the output resolution.
//! Analysis-only actions are free.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pro rate for standard (2K) output.
pub const PRO_STANDARD_COST: i64 = 7_000;
/// Pro rate for high (4K) output.
pub const PRO_HIGH_COST: i64 = 12_000;

const IMAGE_COST: i64 = 5_000;
const VIDEO_COST: i64 = 8_000;

/// A priced action, named as clients send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    GenerateImages,
    Upscale,
    EditImage,
    GenerateFromText,
    GenerateVideo,
    VirtualTour,
    MoodImages,
    MergeFurniture,
    ChangeMaterial,
    ReplaceModel,
    InsertBuilding,
    GeneratePrompts,
    AddCharacter,
    AnalyzeFloorplan,
    AnalyzeMasterplan,
    ColorizeFloorplan,
}

/// Output resolution tier for Pro rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "2K")]
    Standard,
    #[serde(rename = "4K")]
    High,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl ActionKind {
    pub const ALL: [ActionKind; 16] = [
        ActionKind::GenerateImages,
        ActionKind::Upscale,
        ActionKind::EditImage,
        ActionKind::GenerateFromText,
        ActionKind::GenerateVideo,
        ActionKind::VirtualTour,
        ActionKind::MoodImages,
        ActionKind::MergeFurniture,
        ActionKind::ChangeMaterial,
        ActionKind::ReplaceModel,
        ActionKind::InsertBuilding,
        ActionKind::GeneratePrompts,
        ActionKind::AddCharacter,
        ActionKind::AnalyzeFloorplan,
        ActionKind::AnalyzeMasterplan,
        ActionKind::ColorizeFloorplan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::GenerateImages => "generate-images",
            ActionKind::Upscale => "upscale",
            ActionKind::EditImage => "edit-image",
            ActionKind::GenerateFromText => "generate-from-text",
            ActionKind::GenerateVideo => "generate-video",
            ActionKind::VirtualTour => "virtual-tour",
            ActionKind::MoodImages => "mood-images",
            ActionKind::MergeFurniture => "merge-furniture",
            ActionKind::ChangeMaterial => "change-material",
            ActionKind::ReplaceModel => "replace-model",
            ActionKind::InsertBuilding => "insert-building",
            ActionKind::GeneratePrompts => "generate-prompts",
            ActionKind::AddCharacter => "add-character",
            ActionKind::AnalyzeFloorplan => "analyze-floorplan",
            ActionKind::AnalyzeMasterplan => "analyze-masterplan",
            ActionKind::ColorizeFloorplan => "colorize-floorplan",
        }
    }

    /// Listed price per image (or per video).
    pub fn base_cost(self) -> i64 {
        match self {
            ActionKind::GeneratePrompts
            | ActionKind::AnalyzeFloorplan
            | ActionKind::AnalyzeMasterplan => 0,
            ActionKind::GenerateVideo => VIDEO_COST,
            _ => IMAGE_COST,
        }
    }
}

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Resolution {
    pub fn pro_cost(self) -> i64 {
        match self {
            Resolution::Standard => PRO_STANDARD_COST,
            Resolution::High => PRO_HIGH_COST,
        }
    }
}

/// Cost of running `action` for `image_count` outputs.
///
/// Free actions stay free whatever the other parameters say.
pub fn estimate_cost(
    action: ActionKind,
    image_count: u32,
    use_pro: bool,
    resolution: Resolution,
) -> i64 {
    let base = action.base_cost();
    if base == 0 {
        return 0;
    }

    let unit = if use_pro { resolution.pro_cost() } else { base };
    unit * i64::from(image_count)
}
