//! Performance benchmarks for the software painter
//!
//! A frame is painted on every highlight move and every key repeat, so
//! painting has to stay well below the repeat period.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use ring_menu::config::ColorScheme;
use ring_menu::menu::MenuKey;
use ring_menu::renderer::{FontDescriptor, Frame, Renderer, SoftwareRenderer};
use ring_menu::MenuState;

fn items(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("/usr/bin/application-number-{}", i))
        .collect()
}

/// Benchmark painting whole frames
fn bench_render_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_frame");
    let colors = ColorScheme::default();

    for font in ["monospace 8", "monospace 10", "monospace 16"] {
        for item_count in [5, 20, 60] {
            let font_desc = FontDescriptor::parse(font);
            let renderer = SoftwareRenderer::new(&font_desc);
            let items = items(item_count);
            let (width, height) = renderer.metrics().menu_size(&items);
            let mut pixels = vec![0u8; (width * height * 4) as usize];

            group.bench_function(format!("{}_{}_items", font.replace(' ', "_"), item_count), |b| {
                b.iter(|| {
                    let frame = Frame {
                        width,
                        height,
                        stride: width * 4,
                        items: &items,
                        selected: item_count / 2,
                        colors: &colors,
                        font: &font_desc,
                    };
                    renderer.render(black_box(&mut pixels), black_box(&frame));
                })
            });
        }
    }

    group.finish();
}

/// Benchmark the selection state machine under a long repeat burst
fn bench_navigation(c: &mut Criterion) {
    c.bench_function("navigate_1000_keys", |b| {
        b.iter_batched(
            || MenuState::new(items(100)).unwrap(),
            |mut menu| {
                for i in 0..1000 {
                    let key = if i % 3 == 0 { MenuKey::Up } else { MenuKey::Down };
                    black_box(menu.apply(key));
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_render_frame, bench_navigation);
criterion_main!(benches);
