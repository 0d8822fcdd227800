//! Per-color image cell: `red:#FF0000|https://a,https://b;blue:#0000FF|https://c`.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("hex color pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorImageData {
    /// `#RRGGBB`, upper-cased.
    pub hex: String,
    pub images: Vec<String>,
}

/// Keyed by lower-cased color name, in first-seen order.
pub type ColorImages = IndexMap<String, ColorImageData>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedImages {
    pub data: ColorImages,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageFormatError {
    #[error("Invalid image format \"{group}\": expected color:#hex|url1,url2")]
    InvalidFormat { group: String },
    #[error("Invalid color format \"{color_info}\": expected color:#hex")]
    InvalidColor { color_info: String },
    #[error("Invalid hex color code \"{hex}\" for color \"{color}\"")]
    InvalidHex { color: String, hex: String },
    #[error("No image URLs provided for color \"{color}\"")]
    NoUrls { color: String },
    #[error("Invalid image URL \"{url}\" for color \"{color}\"")]
    InvalidUrl { color: String, url: String },
}

pub fn parse_images(cell: &str) -> ParsedImages {
    let mut parsed = ParsedImages::default();
    for group in cell.split(';').map(str::trim).filter(|g| !g.is_empty()) {
        match parse_group(group) {
            Ok((color, hex, urls)) => {
                let mut images = Vec::with_capacity(urls.len());
                for url in urls {
                    match Url::parse(url) {
                        Ok(_) => images.push(url.to_string()),
                        Err(_) => parsed.errors.push(
                            ImageFormatError::InvalidUrl {
                                color: color.clone(),
                                url: url.to_string(),
                            }
                            .to_string(),
                        ),
                    }
                }
                if !images.is_empty() {
                    parsed.data.insert(color, ColorImageData { hex, images });
                }
            }
            Err(err) => parsed.errors.push(err.to_string()),
        }
    }
    parsed
}

fn parse_group(group: &str) -> Result<(String, String, Vec<&str>), ImageFormatError> {
    let (color_info, url_list) = group
        .split_once('|')
        .ok_or_else(|| ImageFormatError::InvalidFormat {
            group: group.to_string(),
        })?;

    let (color, hex) = color_info
        .split_once(':')
        .map(|(color, hex)| (color.trim(), hex.trim()))
        .filter(|(color, _)| !color.is_empty())
        .ok_or_else(|| ImageFormatError::InvalidColor {
            color_info: color_info.trim().to_string(),
        })?;

    if !HEX_COLOR.is_match(hex) {
        return Err(ImageFormatError::InvalidHex {
            color: color.to_string(),
            hex: hex.to_string(),
        });
    }

    let urls: Vec<&str> = url_list
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .collect();
    if urls.is_empty() {
        return Err(ImageFormatError::NoUrls {
            color: color.to_string(),
        });
    }

    Ok((color.to_lowercase(), hex.to_uppercase(), urls))
}
