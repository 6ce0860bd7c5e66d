use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How to decide whether a word counts as highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum WordSelectionMethod {
    /// The centre of the word box lies in the highlight.
    ///
    /// Robust against lines of text drifting vertically and against overlapping
    /// word boxes, which inflate the covered area.
    #[default]
    Centroid,
    /// More than `area_ratio` of the word box is covered by the highlight.
    AreaRatio,
}

impl WordSelectionMethod {
    pub const ALL: [WordSelectionMethod; 2] =
        [WordSelectionMethod::Centroid, WordSelectionMethod::AreaRatio];

    pub fn name(self) -> &'static str {
        match self {
            WordSelectionMethod::Centroid => "CENTROID",
            WordSelectionMethod::AreaRatio => "AREA_RATIO",
        }
    }
}

impl fmt::Display for WordSelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WordSelectionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|method| method.name() == normalized)
            .ok_or_else(|| Error::UnknownSelectionMethod(s.to_string()))
    }
}

impl TryFrom<String> for WordSelectionMethod {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

pub const DEFAULT_MAX_SKIP_LEN: usize = 3;
pub const DEFAULT_AREA_RATIO: f64 = 0.5;
pub const DEFAULT_CLIP_AREA_THRESHOLD: f64 = 1000.0;
pub const DEFAULT_CLIP_ZOOM: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigFile")]
pub struct ExtractConfig {
    /// Unhighlighted words tolerated between two highlighted stretches.
    pub max_skip_len: usize,
    pub word_selection_method: WordSelectionMethod,
    /// Covered fraction of a word box above which `AreaRatio` selects the word.
    pub area_ratio: f64,
    /// Hole area a closed loop must enclose to count as a clip.
    pub clip_area_threshold: f64,
    /// Render scale for clips.
    pub clip_zoom: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            max_skip_len: DEFAULT_MAX_SKIP_LEN,
            word_selection_method: WordSelectionMethod::default(),
            area_ratio: DEFAULT_AREA_RATIO,
            clip_area_threshold: DEFAULT_CLIP_AREA_THRESHOLD,
            clip_zoom: DEFAULT_CLIP_ZOOM,
        }
    }
}

/// On-disk form of [`ExtractConfig`]; every field is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    max_skip_len: usize,
    word_selection_method: String,
    area_ratio: f64,
    clip_area_threshold: f64,
    clip_zoom: f64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            max_skip_len: DEFAULT_MAX_SKIP_LEN,
            word_selection_method: WordSelectionMethod::default().name().to_string(),
            area_ratio: DEFAULT_AREA_RATIO,
            clip_area_threshold: DEFAULT_CLIP_AREA_THRESHOLD,
            clip_zoom: DEFAULT_CLIP_ZOOM,
        }
    }
}

impl TryFrom<ConfigFile> for ExtractConfig {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self> {
        Ok(ExtractConfig {
            max_skip_len: file.max_skip_len,
            word_selection_method: file.word_selection_method.parse()?,
            area_ratio: file.area_ratio,
            clip_area_threshold: file.clip_area_threshold,
            clip_zoom: file.clip_zoom,
        })
    }
}

impl ExtractConfig {
    /// Read a JSON config, reporting an unknown method name as
    /// [`Error::UnknownSelectionMethod`] rather than a JSON error.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let file: ConfigFile = serde_json::from_reader(reader)?;
        file.try_into()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.area_ratio > 0.0 && self.area_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "area_ratio must be in (0, 1], got {}",
                self.area_ratio
            )));
        }
        if !(self.clip_area_threshold.is_finite() && self.clip_area_threshold > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "clip_area_threshold must be positive, got {}",
                self.clip_area_threshold
            )));
        }
        if !(self.clip_zoom.is_finite() && self.clip_zoom > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "clip_zoom must be positive, got {}",
                self.clip_zoom
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_names() {
        assert_eq!(
            "centroid".parse::<WordSelectionMethod>().unwrap(),
            WordSelectionMethod::Centroid
        );
        assert_eq!(
            "AREA_RATIO".parse::<WordSelectionMethod>().unwrap(),
            WordSelectionMethod::AreaRatio
        );
        assert_eq!(
            "area-ratio".parse::<WordSelectionMethod>().unwrap(),
            WordSelectionMethod::AreaRatio
        );
        let err = "bounding_box".parse::<WordSelectionMethod>().unwrap_err();
        assert!(matches!(err, Error::UnknownSelectionMethod(name) if name == "bounding_box"));
    }

    #[test]
    fn defaults_are_valid() {
        let config = ExtractConfig::default();
        assert_eq!(config.max_skip_len, 3);
        assert_eq!(config.word_selection_method, WordSelectionMethod::Centroid);
        assert_eq!(config.clip_area_threshold, 1000.0);
        assert_eq!(config.clip_zoom, 3.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = [
            ExtractConfig { clip_area_threshold: 0.0, ..Default::default() },
            ExtractConfig { clip_zoom: -1.0, ..Default::default() },
            ExtractConfig { clip_zoom: f64::NAN, ..Default::default() },
            ExtractConfig { area_ratio: 1.5, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ExtractConfig =
            serde_json::from_str(r#"{"max_skip_len": 0, "word_selection_method": "AREA_RATIO"}"#)
                .unwrap();
        assert_eq!(config.max_skip_len, 0);
        assert_eq!(config.word_selection_method, WordSelectionMethod::AreaRatio);
        assert_eq!(config.clip_zoom, DEFAULT_CLIP_ZOOM);

        let unknown = serde_json::from_str::<ExtractConfig>(r#"{"word_selection_method": "FUZZY"}"#)
            .unwrap_err();
        assert!(unknown.to_string().contains("FUZZY"));
    }

    #[test]
    fn unknown_method_in_config_file() {
        let err = ExtractConfig::from_json_reader(r#"{"word_selection_method": "FUZZY"}"#.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSelectionMethod(name) if name == "FUZZY"));

        let config =
            ExtractConfig::from_json_reader(r#"{"word_selection_method": "area-ratio"}"#.as_bytes())
                .unwrap();
        assert_eq!(config.word_selection_method, WordSelectionMethod::AreaRatio);
        assert_eq!(config.max_skip_len, DEFAULT_MAX_SKIP_LEN);

        let method: WordSelectionMethod = serde_json::from_str(r#""CENTROID""#).unwrap();
        assert_eq!(method, WordSelectionMethod::Centroid);
    }
}
