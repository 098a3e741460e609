use criterion::{black_box, criterion_group, criterion_main, Criterion};
use substratum_core::decay;
use substratum_core::diffusion;
use substratum_core::grid::Grid;
use substratum_data::{Boundary, DecayKinetics};

fn seeded_grid(shape: &[usize]) -> Grid {
    let mut grid = Grid::lattice(shape, 1.0).unwrap();
    for (i, value) in grid.values_mut().iter_mut().enumerate() {
        *value = (i % 17) as f64;
    }
    grid
}

fn bench_diffusion_2d(c: &mut Criterion) {
    let grid = seeded_grid(&[256, 256]);

    c.bench_function("lod_diffusion_256x256", |b| {
        b.iter(|| {
            let mut next = grid.clone();
            diffusion::apply(&mut next, 1.0, 0.5, Boundary::NoFlux);
            black_box(next)
        })
    });
}

fn bench_diffusion_3d(c: &mut Criterion) {
    let grid = seeded_grid(&[48, 48, 48]);

    c.bench_function("lod_diffusion_48x48x48", |b| {
        b.iter(|| {
            let mut next = grid.clone();
            diffusion::apply(&mut next, 1.0, 0.5, Boundary::Fixed { value: 0.0 });
            black_box(next)
        })
    });
}

fn bench_tridiagonal(c: &mut Criterion) {
    let n = 1024;
    let sub = vec![-0.5; n];
    let sup = vec![-0.5; n];

    c.bench_function("thomas_1024", |b| {
        b.iter(|| {
            let mut diag = vec![2.0; n];
            let mut rhs: Vec<f64> = (0..n).map(|i| i as f64).collect();
            diffusion::solve_tridiagonal(&sub, &mut diag, &sup, &mut rhs);
            black_box(rhs)
        })
    });
}

fn bench_michaelis_menten_decay(c: &mut Criterion) {
    let grid = seeded_grid(&[256, 256]);

    c.bench_function("michaelis_menten_decay_256x256", |b| {
        b.iter(|| {
            let mut next = grid.clone();
            let report = decay::apply(
                &mut next,
                0.1,
                1.0,
                DecayKinetics::MichaelisMenten { km: 2.0 },
                "bench",
            );
            black_box((next, report))
        })
    });
}

criterion_group!(
    benches,
    bench_diffusion_2d,
    bench_diffusion_3d,
    bench_tridiagonal,
    bench_michaelis_menten_decay
);
criterion_main!(benches);
