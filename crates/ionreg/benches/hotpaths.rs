use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ionreg::{estimate_affine, warp, AffineTransform, Image, Interpolation, WarpConfig};

fn make_ion_fixture(width: usize, height: usize, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width * height).map(|_| rng.gen_range(0.0..1000.0)).collect();
    Image::from_vec(width, height, 1, data).expect("fixture shape")
}

fn make_landmarks(n: usize, seed: u64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let t = AffineTransform::from_params([0.12, 0.01, 3.0, -0.02, 0.11, 5.0]);
    let mut rng = StdRng::seed_from_u64(seed);
    let src: Vec<[f64; 2]> = (0..n)
        .map(|_| [rng.gen_range(0.0..2000.0), rng.gen_range(0.0..1500.0)])
        .collect();
    let dst = src
        .iter()
        .map(|&p| {
            let q = t.apply(p);
            [q[0] + rng.gen_range(-0.5..0.5), q[1] + rng.gen_range(-0.5..0.5)]
        })
        .collect();
    (src, dst)
}

fn bench_warp(c: &mut Criterion) {
    let ion = make_ion_fixture(250, 180, 7);
    let t = AffineTransform::from_params([0.12, 0.01, 3.0, -0.02, 0.11, 5.0]);
    let bilinear = WarpConfig::default();
    let nearest = WarpConfig {
        interpolation: Interpolation::Nearest,
        ..WarpConfig::default()
    };

    c.bench_function("warp_bilinear_2000x1500", |b| {
        b.iter(|| {
            let out = warp(black_box(&ion), black_box(&t), [1500, 2000], &bilinear);
            black_box(out.width())
        })
    });

    c.bench_function("warp_nearest_2000x1500", |b| {
        b.iter(|| {
            let out = warp(black_box(&ion), black_box(&t), [1500, 2000], &nearest);
            black_box(out.width())
        })
    });
}

fn bench_estimate(c: &mut Criterion) {
    let (src8, dst8) = make_landmarks(8, 11);
    let (src500, dst500) = make_landmarks(500, 13);

    c.bench_function("estimate_affine_8", |b| {
        b.iter(|| black_box(estimate_affine(black_box(&src8), black_box(&dst8))))
    });

    c.bench_function("estimate_affine_500", |b| {
        b.iter(|| black_box(estimate_affine(black_box(&src500), black_box(&dst500))))
    });
}

criterion_group!(benches, bench_warp, bench_estimate);
criterion_main!(benches);
