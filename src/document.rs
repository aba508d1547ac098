//! Document assembly: resolution presets and the shells fragments are wrapped in
//!
//! A shell is a complete HTML document with a stylesheet and one root
//! container. The container carries a fixed id so the render engine can find
//! its bounding box after layout. Every length in the slide and card
//! stylesheets is a base value multiplied by the preset's scale factor, so the
//! same fragment reads the same at any preset.

use crate::{Error, Result, Viewport};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Root id of the slide shell
pub const SLIDE_ROOT_ID: &str = "target-slide";
/// Root id of the card shell
pub const CARD_ROOT_ID: &str = "target-card";

/// Named bundle of target dimensions and CSS scale factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ResolutionPreset {
    Low,
    Medium,
    High,
}

impl ResolutionPreset {
    pub fn width(self) -> u32 {
        match self {
            ResolutionPreset::Low => 1280,
            ResolutionPreset::Medium => 1920,
            ResolutionPreset::High => 2400,
        }
    }

    pub fn height(self) -> u32 {
        match self {
            ResolutionPreset::Low => 720,
            ResolutionPreset::Medium => 1080,
            ResolutionPreset::High => 1350,
        }
    }

    /// Multiplier applied to every base length in the shell stylesheet
    pub fn scale(self) -> f64 {
        match self {
            ResolutionPreset::Low => 1.0,
            ResolutionPreset::Medium => 1.5,
            ResolutionPreset::High => 2.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResolutionPreset::Low => "low",
            ResolutionPreset::Medium => "medium",
            ResolutionPreset::High => "high",
        }
    }
}

impl Default for ResolutionPreset {
    fn default() -> Self {
        ResolutionPreset::High
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResolutionPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ResolutionPreset::Low),
            "medium" => Ok(ResolutionPreset::Medium),
            "high" => Ok(ResolutionPreset::High),
            other => Err(Error::ConfigError(format!(
                "Unknown resolution preset '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ResolutionPreset {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Document wrapper placed around a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shell {
    /// Presentation slide: title, text column with bullet points, visual column
    Slide,
    /// Project card: hero image, heading, description, badges, link
    Card,
    /// The fragment is already a full document containing `root_id`
    Raw { root_id: String },
}

impl Shell {
    pub fn root_id(&self) -> &str {
        match self {
            Shell::Slide => SLIDE_ROOT_ID,
            Shell::Card => CARD_ROOT_ID,
            Shell::Raw { root_id } => root_id,
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::Slide
    }
}

impl FromStr for Shell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "slide" => return Ok(Shell::Slide),
            "card" => return Ok(Shell::Card),
            _ => {}
        }
        // Element ids are case-sensitive; only the prefix is not.
        match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("raw:") && trimmed.len() > 4 => Ok(Shell::Raw {
                root_id: trimmed[4..].to_string(),
            }),
            _ => Err(Error::ConfigError(format!(
                "Unknown shell '{}' (expected slide, card or raw:<id>)",
                s
            ))),
        }
    }
}

/// Size and capture parameters for one render
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSpec {
    /// Viewport and container width in CSS pixels
    pub width: u32,
    /// Viewport and container height in CSS pixels
    pub height: u32,
    /// Preset whose scale factor parameterizes the stylesheet
    pub preset: ResolutionPreset,
    /// Output pixels per CSS pixel
    pub device_scale_factor: f64,
    pub shell: Shell,
}

impl Default for SizeSpec {
    fn default() -> Self {
        Self::from_preset(ResolutionPreset::default())
    }
}

impl SizeSpec {
    pub fn new(width: u32, height: u32, preset: ResolutionPreset) -> Self {
        Self {
            width,
            height,
            preset,
            device_scale_factor: 1.0,
            shell: Shell::Slide,
        }
    }

    /// A slide sized to the preset's own dimensions.
    pub fn from_preset(preset: ResolutionPreset) -> Self {
        Self::new(preset.width(), preset.height(), preset)
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::ConfigError(format!(
                "width and height must be positive (got {}x{})",
                self.width, self.height
            )));
        }
        if !(self.device_scale_factor.is_finite() && self.device_scale_factor > 0.0) {
            return Err(Error::ConfigError(format!(
                "device scale factor must be positive (got {})",
                self.device_scale_factor
            )));
        }
        Ok(())
    }
}

/// Wrap `fragment` in the shell selected by `size`.
pub fn wrap(fragment: &str, size: &SizeSpec) -> String {
    match &size.shell {
        Shell::Slide => slide_document(fragment, size.width, size.height, size.preset.scale()),
        Shell::Card => card_document(fragment, size.width, size.height, size.preset.scale()),
        Shell::Raw { .. } => fragment.to_string(),
    }
}

/// Format a scaled length, trimming a trailing `.0`.
fn px(base: f64, scale: f64) -> String {
    let v = base * scale;
    if v.fract() == 0.0 {
        format!("{}px", v as i64)
    } else {
        format!("{}px", (v * 100.0).round() / 100.0)
    }
}

fn slide_document(fragment: &str, width: u32, height: u32, s: f64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
@import url('https://fonts.googleapis.com/css2?family=Inter:wght@400;500;700&display=swap');
* {{ box-sizing: border-box; }}
body {{ margin: 0; padding: 0; background-color: transparent; }}
.slide-container {{
  width: {width}px;
  height: {height}px;
  background-color: #050515;
  background-image:
    linear-gradient(135deg, rgba(0, 200, 255, 0.1) 0%, transparent 25%, transparent 75%, rgba(150, 0, 255, 0.1) 100%),
    radial-gradient(circle at 10% 10%, rgba(0, 150, 255, 0.15) 0%, transparent 40%),
    radial-gradient(circle at 90% 80%, rgba(100, 0, 255, 0.15) 0%, transparent 40%);
  border: {border} solid rgba(50, 150, 255, 0.3);
  box-shadow: 0 0 {inset} rgba(0, 0, 0, 0.8) inset, 0 0 {glow} rgba(0, 225, 255, 0.3);
  border-radius: {radius};
  padding: {pad_y} {pad_x};
  font-family: 'Inter', sans-serif;
  color: #e0e0e0;
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: flex-start;
  text-align: left;
}}
.slide-container h2 {{
  font-size: {h2};
  font-weight: 700;
  width: 100%;
  text-align: left;
  margin: 0 0 {h2_gap} 0;
  padding-bottom: {h2_pad};
  border-bottom: {border} solid rgba(255, 255, 255, 0.2);
  color: #00c6ff;
}}
.content-area {{ display: flex; flex-direction: row; width: 100%; height: 100%; gap: {gap}; align-items: stretch; }}
.text-content {{ flex: 1; display: flex; flex-direction: column; justify-content: center; }}
.text-content ul {{ list-style: none; padding-left: 0; margin: 0; }}
.text-content li {{
  font-size: {li};
  line-height: 1.5;
  color: #b0b8c4;
  padding-left: {li_pad};
  margin-bottom: {li_gap};
  position: relative;
}}
.text-content li::before {{ content: '\00BB'; position: absolute; left: 0; top: 0.05em; color: #00c6ff; font-weight: 700; }}
.visual-content {{ flex: 1.2; display: flex; align-items: center; justify-content: center; }}
.visual-content img {{ max-width: 100%; max-height: 100%; object-fit: contain; border-radius: {img_radius}; }}
</style>
</head>
<body>
<div class="slide-container" id="{root}">{fragment}</div>
</body>
</html>
"#,
        width = width,
        height = height,
        border = px(2.0, s),
        inset = px(50.0, s),
        glow = px(30.0, s),
        radius = px(20.0, s),
        pad_y = px(40.0, s),
        pad_x = px(60.0, s),
        h2 = px(50.0, s),
        h2_gap = px(30.0, s),
        h2_pad = px(15.0, s),
        gap = px(40.0, s),
        li = px(24.0, s),
        li_pad = px(20.0, s),
        li_gap = px(15.0, s),
        img_radius = px(10.0, s),
        root = SLIDE_ROOT_ID,
        fragment = fragment,
    )
}

fn card_document(fragment: &str, width: u32, height: u32, s: f64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
@import url('https://fonts.googleapis.com/css2?family=Roboto:wght@400;500;700&display=swap');
* {{ box-sizing: border-box; }}
body {{ margin: 0; padding: 0; background-color: transparent; }}
.project-card {{
  width: {width}px;
  height: {height}px;
  background-image:
    linear-gradient(135deg, rgba(0, 200, 255, 0.15) 0%, transparent 25%, transparent 75%, rgba(150, 0, 255, 0.15) 100%),
    linear-gradient(45deg, rgba(50, 0, 255, 0.15) 0%, transparent 25%, transparent 75%, rgba(0, 255, 180, 0.15) 100%),
    radial-gradient(circle at top left, rgba(0, 150, 255, 0.08) 0%, transparent 50%),
    radial-gradient(circle at bottom right, rgba(100, 0, 255, 0.08) 0%, transparent 50%);
  background-color: #0a0a2a;
  border: {border} solid rgba(50, 150, 255, 0.2);
  box-shadow: 0 {drop_y} {drop} rgba(0, 0, 0, 0.7), 0 0 {glow} rgba(0, 200, 255, 0.25), 0 0 {glow} rgba(150, 0, 255, 0.25);
  border-radius: {radius};
  padding: {pad};
  font-family: 'Roboto', -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
  color: #e0e0e0;
  display: flex;
  flex-direction: column;
  align-items: flex-start;
  justify-content: flex-start;
}}
.main-image {{ width: 100%; border-radius: {img_radius}; margin-bottom: {img_gap}; box-shadow: 0 {drop_y} {img_shadow} rgba(0, 0, 0, 0.5); }}
h3 {{ color: #00bfff; font-size: {h3}; font-weight: 500; margin: {h3_top} 0 {h3_bottom} 0; }}
p.description {{ font-size: {body}; line-height: 1.5; font-weight: 300; margin: 0 0 {img_gap} 0; color: #ffffff; }}
.tech-badges {{ margin-bottom: {badge_gap}; }}
.tech-badges img {{ height: {badge}; margin-right: {badge_gap}; margin-bottom: {badge_gap}; }}
a.view-project {{ color: #00bfff; text-decoration: none; font-size: {body}; font-weight: 500; margin-top: {link_gap}; }}
</style>
</head>
<body>
<div class="project-card" id="{root}">{fragment}</div>
</body>
</html>
"#,
        width = width,
        height = height,
        border = px(2.0, s),
        drop_y = px(4.0, s),
        drop = px(30.0, s),
        glow = px(20.0, s),
        radius = px(24.0, s),
        pad = px(60.0, s),
        img_radius = px(20.0, s),
        img_gap = px(40.0, s),
        img_shadow = px(15.0, s),
        h3 = px(80.0, s),
        h3_top = px(130.0, s),
        h3_bottom = px(25.0, s),
        body = px(67.0, s),
        badge = px(120.0, s),
        badge_gap = px(20.0, s),
        link_gap = px(50.0, s),
        root = CARD_ROOT_ID,
        fragment = fragment,
    )
}
