//! End-to-end renders against a real headless Chrome

use cardshot::template::{DataRecord, TemplateSource, TemplateResolver, Manifest};
use cardshot::{Error, OutputTarget, PdfOptions, RenderConfig, ResolutionPreset, Shell, SizeSpec};
use sha2::{Digest, Sha256};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

fn config() -> RenderConfig {
    RenderConfig {
        sandbox: std::env::var("CARDSHOT_NO_SANDBOX").is_err(),
        ..Default::default()
    }
}

fn png_size(bytes: &[u8]) -> (u32, u32) {
    let w = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let h = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (w, h)
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_render_slide_png() {
    let engine = cardshot::new_engine(config()).expect("Failed to create engine");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slide.png");

    let size = SizeSpec::from_preset(ResolutionPreset::Low);
    let out = engine
        .render("<h2>Hello</h2><p>world</p>", &OutputTarget::File(path.clone()), &size)
        .expect("render");

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(PNG_MAGIC));
    assert_eq!(bytes, out.bytes);
    assert_eq!(png_size(&bytes), (1280, 720));

    engine.shutdown().unwrap();
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_device_scale_doubles_pixels() {
    let engine = cardshot::new_engine(config()).expect("Failed to create engine");
    let size = SizeSpec::new(400, 300, ResolutionPreset::Low)
        .with_shell(Shell::Card)
        .with_device_scale_factor(2.0);
    let out = engine.render("<h3>Card</h3>", &OutputTarget::Memory, &size).expect("render");
    let (w, h) = png_size(&out.bytes);
    assert_eq!((w, h), (800, 600));
    engine.shutdown().unwrap();
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_identical_input_identical_digest() {
    let engine = cardshot::new_engine(config()).expect("Failed to create engine");
    let size = SizeSpec::new(640, 360, ResolutionPreset::Low).with_shell(Shell::Raw {
        root_id: "box".into(),
    });
    let html = r#"<html><body style="margin:0"><div id="box" style="width:640px;height:360px;background:#123456"></div></body></html>"#;

    let digest = |bytes: &[u8]| hex::encode(Sha256::digest(bytes));
    let a = engine.render(html, &OutputTarget::Memory, &size).expect("first render");
    let b = engine.render(html, &OutputTarget::Memory, &size).expect("second render");
    assert_eq!(digest(&a.bytes), digest(&b.bytes));

    engine.shutdown().unwrap();
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_missing_root_in_chrome() {
    let engine = cardshot::new_engine(config()).expect("Failed to create engine");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("none.png");
    let size = SizeSpec::new(100, 100, ResolutionPreset::Low).with_shell(Shell::Raw {
        root_id: "target-slide".into(),
    });

    let err = engine
        .render("<html><body><p>no root</p></body></html>", &OutputTarget::File(path.clone()), &size)
        .unwrap_err();
    assert!(matches!(err, Error::TargetElementMissing(_)));
    assert!(!path.exists());

    engine.shutdown().unwrap();
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_print_pdf() {
    let engine = cardshot::new_engine(config()).expect("Failed to create engine");
    let out = engine
        .render_document(
            "<html><body><h1>Report</h1><p>Page one</p></body></html>",
            &OutputTarget::Memory,
            &PdfOptions::default(),
        )
        .expect("pdf");
    assert!(out.bytes.starts_with(b"%PDF"));
    engine.shutdown().unwrap();
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_named_template_render() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("title.html"), "<h2>{{TITLE}}</h2><ul>{{POINTS}}</ul>").unwrap();
    let manifest = Manifest::from_json(r#"{"templates": {"title": {"file": "title.html"}}}"#).unwrap();
    let resolver = TemplateResolver::new(manifest, dir.path());

    let mut data = DataRecord::new();
    data.insert("TITLE".into(), "Agenda".into());
    data.insert("POINTS".into(), serde_json::json!(["One", "Two"]));
    let fragment = resolver.resolve(&TemplateSource::Named("title".into()), &data).unwrap();

    let engine = cardshot::new_engine(config()).expect("Failed to create engine");
    let out = engine
        .render(&fragment, &OutputTarget::Memory, &SizeSpec::from_preset(ResolutionPreset::Medium))
        .expect("render");
    assert_eq!(png_size(&out.bytes), (1920, 1080));
    engine.shutdown().unwrap();
}
