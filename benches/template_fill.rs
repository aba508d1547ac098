use cardshot::document::wrap;
use cardshot::template::{fill, DataRecord, DEFAULT_LIST_KEYS};
use cardshot::{ResolutionPreset, SizeSpec};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashSet;

fn slide_template() -> &'static str {
    r#"<h2>{{ TITLE }}</h2>
<div class="content-area">
  <div class="text-content"><ul>{{POINTS}}</ul><p>{{ FOOTNOTE }}</p></div>
  <div class="visual-content"><img src="{{IMAGE}}" alt="{{TITLE}}"></div>
</div>"#
}

fn sample_data() -> DataRecord {
    let mut data = DataRecord::new();
    data.insert("TITLE".into(), "Quarterly architecture review".into());
    data.insert(
        "POINTS".into(),
        serde_json::json!(["Latency down 40%", "Two services retired", "New cache tier", 3, null]),
    );
    data.insert("IMAGE".into(), "data:image/png;base64,iVBORw0KGgo=".into());
    data
}

fn bench_fill(c: &mut Criterion) {
    let list_keys: HashSet<String> = DEFAULT_LIST_KEYS.iter().map(|k| k.to_string()).collect();
    let data = sample_data();
    let template = slide_template();

    c.bench_function("fill_slide_template", |b| {
        b.iter(|| fill(black_box(template), black_box(&data), &list_keys))
    });

    let large = template.repeat(200);
    c.bench_function("fill_large_template", |b| {
        b.iter(|| fill(black_box(&large), black_box(&data), &list_keys))
    });
}

fn bench_wrap(c: &mut Criterion) {
    let list_keys: HashSet<String> = DEFAULT_LIST_KEYS.iter().map(|k| k.to_string()).collect();
    let fragment = fill(slide_template(), &sample_data(), &list_keys);
    let size = SizeSpec::from_preset(ResolutionPreset::High);

    c.bench_function("wrap_slide_high", |b| b.iter(|| wrap(black_box(&fragment), &size)));
}

criterion_group!(benches, bench_fill, bench_wrap);
criterion_main!(benches);
