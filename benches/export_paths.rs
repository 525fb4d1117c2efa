//! Map-driven export: literal fast paths against the generic tag loop, and
//! the wire-format packer at a few common depths.
//!
//! ```
//! $ cargo bench --bench=export_paths -- --save-baseline my_baseline
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use zenquantum::{
    Diagnostics, Direction, Image, PixelMap, QuantumInfo, QuantumType, Region, StorageType,
    export_pixel_map, export_quantum_pixels,
};

const WIDTH: usize = 512;
const HEIGHT: usize = 64;

fn gradient(alpha: bool) -> Image {
    let mut image = Image::builder(WIDTH, HEIGHT)
        .with_alpha(alpha)
        .build()
        .unwrap();
    for (i, q) in image.pixels_mut().iter_mut().enumerate() {
        *q = (i % 251) as zenquantum::Quantum;
    }
    image
}

fn bench_map_paths(c: &mut Criterion) {
    let image = gradient(true);
    let region = Region::new(0, 0, WIDTH, HEIGHT);
    let mut group = c.benchmark_group("export_map");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    for literal in ["RGB", "BGRA", "I"] {
        let fast = PixelMap::parse(literal, &image, Direction::Export).unwrap();
        let generic = fast.clone().generic();
        for storage in [StorageType::Char, StorageType::Float] {
            let mut out = vec![0u8; WIDTH * HEIGHT * fast.len() * storage.size()];
            let label = format!("{literal}/{storage}");
            group.bench_with_input(BenchmarkId::new("fast", &label), &fast, |b, map| {
                b.iter(|| export_pixel_map(&image, &region, map, storage, &mut out).unwrap())
            });
            group.bench_with_input(BenchmarkId::new("generic", &label), &generic, |b, map| {
                b.iter(|| export_pixel_map(&image, &region, map, storage, &mut out).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_wire_depths(c: &mut Criterion) {
    let image = gradient(false);
    let region = Region::new(0, 0, WIDTH, HEIGHT);
    let mut group = c.benchmark_group("export_quantum");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    for (depth, pack) in [(1, true), (8, true), (10, false), (12, true), (16, true)] {
        let info = QuantumInfo::new().with_depth(depth).with_pack(pack);
        let extent = info.extent(&image, QuantumType::Rgb, WIDTH).unwrap();
        let mut out = vec![0u8; extent * HEIGHT];
        let mut diagnostics = Diagnostics::new();
        let label = format!("rgb{depth}{}", if pack { "" } else { "-unpacked" });
        group.bench_function(label, |b| {
            b.iter(|| {
                export_quantum_pixels(
                    &image,
                    &region,
                    &info,
                    QuantumType::Rgb,
                    &mut out,
                    &mut diagnostics,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_map_paths, bench_wire_depths);
criterion_main!(benches);
