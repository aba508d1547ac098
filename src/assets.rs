//! Local asset embedding
//!
//! Pages are loaded from memory, so relative `src` references have no base
//! URL to resolve against. Local images are embedded as `data:` URIs before
//! rendering instead.

use crate::{Error, Result};
use base64::Engine as Base64Engine;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;

static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("src pattern is valid"));

/// MIME type for an image path, by extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Read a local file and encode it as a `data:` URI.
pub fn data_uri(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::AssetNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{};base64,{}", mime_for(path), encoded))
}

/// Whether a `src` value points at something other than a local file.
fn is_external(src: &str) -> bool {
    src.is_empty() || src.starts_with("//") || src.starts_with('#') || url::Url::parse(src).is_ok()
}

/// Rewrite local `src="…"` references in `html` to embedded data URIs.
///
/// Relative paths resolve against `base_dir`. Absolute URLs (including
/// existing `data:` URIs) are left untouched. A reference to a missing file
/// fails with [`Error::AssetNotFound`].
pub fn inline_local_images(html: &str, base_dir: &Path) -> Result<String> {
    let mut failure = None;
    let out = SRC_ATTR.replace_all(html, |caps: &Captures| {
        let (value, quote) = match (caps.get(1), caps.get(2)) {
            (Some(v), _) => (v.as_str(), '"'),
            (None, Some(v)) => (v.as_str(), '\''),
            (None, None) => return caps[0].to_string(),
        };
        if is_external(value) || failure.is_some() {
            return caps[0].to_string();
        }
        let path = base_dir.join(value);
        match data_uri(&path) {
            Ok(uri) => {
                debug!("inlined {} ({} bytes encoded)", path.display(), uri.len());
                format!("src={q}{uri}{q}", q = quote)
            }
            Err(e) => {
                failure = Some(e);
                caps[0].to_string()
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_by_extension() {
        assert_eq!(mime_for(Path::new("a/b.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("icon.svg")), "image/svg+xml");
        assert_eq!(mime_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn encodes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(data_uri(&path).unwrap(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn missing_asset() {
        let err = data_uri("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, Error::AssetNotFound(_)));
    }

    #[test]
    fn rewrites_only_local_references() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/rbt.png"), b"abc").unwrap();

        let html = r#"<img src="./img/rbt.png" class="main-image"><img src='https://img.shields.io/badge/Rust-000'><img src="data:image/png;base64,AAAA">"#;
        let out = inline_local_images(html, dir.path()).unwrap();
        assert!(out.contains(r#"src="data:image/png;base64,YWJj""#));
        assert!(out.contains("src='https://img.shields.io/badge/Rust-000'"));
        assert!(out.contains(r#"src="data:image/png;base64,AAAA""#));
    }

    #[test]
    fn missing_reference_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = inline_local_images(r#"<img src="img/none.png">"#, dir.path()).unwrap_err();
        assert!(matches!(err, Error::AssetNotFound(p) if p.ends_with("none.png")));
    }
}
