//! PDF pagination options
//!
//! Request-level options use the same vocabulary as browser print APIs
//! (`format`, `landscape`, `printBackground`, `margin`, …). They are resolved
//! into [`PrintSettings`] in inches before reaching the browser.

use crate::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;

const PX_PER_INCH: f64 = 96.0;

/// Standard paper sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum PaperFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl PaperFormat {
    /// Portrait width and height in inches
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
            PaperFormat::Ledger => (17.0, 11.0),
            PaperFormat::A0 => (33.1, 46.8),
            PaperFormat::A1 => (23.4, 33.1),
            PaperFormat::A2 => (16.54, 23.4),
            PaperFormat::A3 => (11.7, 16.54),
            PaperFormat::A4 => (8.27, 11.7),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::A6 => (4.13, 5.83),
        }
    }
}

impl Default for PaperFormat {
    fn default() -> Self {
        PaperFormat::A4
    }
}

impl FromStr for PaperFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "letter" => PaperFormat::Letter,
            "legal" => PaperFormat::Legal,
            "tabloid" => PaperFormat::Tabloid,
            "ledger" => PaperFormat::Ledger,
            "a0" => PaperFormat::A0,
            "a1" => PaperFormat::A1,
            "a2" => PaperFormat::A2,
            "a3" => PaperFormat::A3,
            "a4" => PaperFormat::A4,
            "a5" => PaperFormat::A5,
            "a6" => PaperFormat::A6,
            _ => return Err(Error::ConfigError(format!("Unknown paper format: {}", s))),
        };
        Ok(format)
    }
}

impl TryFrom<String> for PaperFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A length given either as a pixel count or as a string with a unit
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Length {
    Pixels(f64),
    Text(String),
}

impl Length {
    /// Convert to inches. Bare numbers and unitless strings are pixels.
    pub fn to_inches(&self) -> Result<f64> {
        let (value, unit) = match self {
            Length::Pixels(px) => (*px, "px"),
            Length::Text(text) => {
                let text = text.trim();
                let split = text
                    .find(|c: char| c.is_ascii_alphabetic())
                    .unwrap_or(text.len());
                let (num, unit) = text.split_at(split);
                let value = num
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| Error::ConfigError(format!("Invalid length: {}", text)))?;
                (value, if unit.is_empty() { "px" } else { unit })
            }
        };
        let inches = match unit.to_ascii_lowercase().as_str() {
            "px" => value / PX_PER_INCH,
            "in" => value,
            "cm" => value / 2.54,
            "mm" => value / 25.4,
            other => return Err(Error::ConfigError(format!("Unknown length unit: {}", other))),
        };
        if inches < 0.0 || !inches.is_finite() {
            return Err(Error::ConfigError(format!("Length must be non-negative: {:?}", self)));
        }
        Ok(inches)
    }
}

/// Page margins; unset sides fall back to zero
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub top: Option<Length>,
    pub right: Option<Length>,
    pub bottom: Option<Length>,
    pub left: Option<Length>,
}

/// Caller-facing pagination options
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfOptions {
    pub format: PaperFormat,
    /// Overrides the format's width
    pub width: Option<Length>,
    /// Overrides the format's height
    pub height: Option<Length>,
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
    pub margin: Margin,
    pub page_ranges: Option<String>,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub prefer_css_page_size: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            width: None,
            height: None,
            landscape: false,
            print_background: true,
            scale: 1.0,
            margin: Margin::default(),
            page_ranges: None,
            display_header_footer: false,
            header_template: None,
            footer_template: None,
            prefer_css_page_size: false,
        }
    }
}

/// Fully resolved print parameters, all lengths in inches
#[derive(Debug, Clone, PartialEq)]
pub struct PrintSettings {
    pub paper_width: f64,
    pub paper_height: f64,
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub page_ranges: Option<String>,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub prefer_css_page_size: bool,
}

fn inches_or_zero(len: &Option<Length>) -> Result<f64> {
    len.as_ref().map(Length::to_inches).transpose().map(|v| v.unwrap_or(0.0))
}

impl PdfOptions {
    pub fn resolve(&self) -> Result<PrintSettings> {
        // Chrome accepts 0.1..=2.0
        if !(0.1..=2.0).contains(&self.scale) {
            return Err(Error::ConfigError(format!("PDF scale must be between 0.1 and 2 (got {})", self.scale)));
        }
        let (fmt_w, fmt_h) = self.format.size_inches();
        let paper_width = match &self.width {
            Some(w) => w.to_inches()?,
            None => fmt_w,
        };
        let paper_height = match &self.height {
            Some(h) => h.to_inches()?,
            None => fmt_h,
        };
        if paper_width == 0.0 || paper_height == 0.0 {
            return Err(Error::ConfigError("PDF page dimensions must be positive".into()));
        }

        Ok(PrintSettings {
            paper_width,
            paper_height,
            landscape: self.landscape,
            print_background: self.print_background,
            scale: self.scale,
            margin_top: inches_or_zero(&self.margin.top)?,
            margin_right: inches_or_zero(&self.margin.right)?,
            margin_bottom: inches_or_zero(&self.margin.bottom)?,
            margin_left: inches_or_zero(&self.margin.left)?,
            page_ranges: self.page_ranges.clone(),
            display_header_footer: self.display_header_footer,
            header_template: self.header_template.clone(),
            footer_template: self.footer_template.clone(),
            prefer_css_page_size: self.prefer_css_page_size,
        })
    }
}
