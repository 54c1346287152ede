use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

use qreig::{
    linalg::{
        evd::{EigenParams, Eigendecomposition},
        qr::{
            BlockHouseholderQr, BlockQrParams, ColPivHouseholderQr, HouseholderColQr,
            HouseholderTranQr, QrDecomposition,
        },
    },
    BlockMat, Mat, Parallelism,
};

fn random_mat(n: usize) -> Mat<f64> {
    let rng = &mut StdRng::seed_from_u64(0);
    Mat::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0))
}

fn bench_qr<D: QrDecomposition<f64>>(c: &mut Criterion, name: &str, mut qr: D) {
    let mut group = c.benchmark_group(name);
    for n in [32, 64, 128, 256, 512] {
        let a = random_mat(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &a, |b, a| {
            b.iter(|| qr.decompose(a.as_ref()).unwrap())
        });
    }
    group.finish();
}

pub fn qr(c: &mut Criterion) {
    bench_qr(c, "qr-tran", HouseholderTranQr::<f64>::new());
    bench_qr(c, "qr-col", HouseholderColQr::<f64>::new());
    bench_qr(c, "qr-col-piv", ColPivHouseholderQr::<f64>::new());
}

pub fn block_qr(c: &mut Criterion) {
    let mut st = BlockQrParams::with_block_len(60);
    st.parallelism = Parallelism::None;
    let mut mt = BlockQrParams::with_block_len(60);
    mt.parallelism = Parallelism::Rayon(0);

    for (name, params) in [("qr-block-st", st), ("qr-block-mt", mt)] {
        let mut group = c.benchmark_group(name);
        for n in [128, 256, 512, 1024] {
            let a = BlockMat::from_mat(random_mat(n).as_ref(), params.block_len);
            let mut qr = BlockHouseholderQr::<f64>::with_params(params);
            group.bench_with_input(BenchmarkId::from_parameter(n), &a, |b, a| {
                b.iter(|| qr.decompose_block(a.clone()))
            });
        }
        group.finish();
    }
}

pub fn evd(c: &mut Criterion) {
    for (name, vectors) in [("evd-values", false), ("evd-vectors", true)] {
        let mut group = c.benchmark_group(name);
        for n in [16, 32, 64, 128] {
            let a = random_mat(n);
            let mut evd = Eigendecomposition::with_params(EigenParams::with_vectors(vectors));
            group.bench_with_input(BenchmarkId::from_parameter(n), &a, |b, a| {
                b.iter(|| evd.decompose(a.as_ref()).unwrap())
            });
        }
        group.finish();
    }
}

criterion_group!(benches, qr, block_qr, evd);
criterion_main!(benches);
