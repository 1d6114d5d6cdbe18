//! Solver benchmarks: SpMV throughput and a preconditioned Poisson
//! solve on the structured unit-square hierarchy.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use parafem::prelude::*;

fn poisson_setup() -> (MatrixStock, DenseVector<f64>) {
    let comm = Arc::new(SerialComm::new());
    let domain = DomainControl::new_unit_square(comm, ShapeType::Simplex2, 1, 5).unwrap();
    let stock = MatrixStock::assemble_poisson(&domain).unwrap();
    let n = stock.finest().matrix.rows();
    let mut rhs = DenseVector::constant(n, 1.0);
    stock.finest().filter.filter_rhs(&mut rhs).unwrap();
    (stock, rhs)
}

fn bench_spmv(c: &mut Criterion) {
    let (stock, rhs) = poisson_setup();
    let matrix = Arc::clone(&stock.finest().matrix);
    let mut out = matrix.create_vector_l();

    c.bench_function("spmv_csr_poisson", |b| {
        b.iter(|| {
            matrix.apply(&mut out, &rhs).unwrap();
        })
    });
}

fn bench_pcg_jacobi(c: &mut Criterion) {
    let (stock, rhs) = poisson_setup();
    let matrix = Arc::clone(&stock.finest().matrix);
    let filter = Arc::clone(&stock.finest().filter);

    c.bench_function("pcg_jacobi_poisson", |b| {
        b.iter(|| {
            let precon: SolverBox<DenseVector<f64>> =
                Box::new(JacobiPrecon::new(Arc::clone(&matrix), 1.0));
            let mut solver = Pcg::new(
                Arc::clone(&matrix) as Arc<dyn LinOp<DenseVector<f64>>>,
                Arc::clone(&filter) as Arc<dyn Filter<DenseVector<f64>>>,
                Some(precon),
            );
            solver.params.set_tol_rel(1e-8).set_max_iter(500);
            let mut x = rhs.clone_layout();
            solver.apply(&mut x, &rhs).unwrap()
        })
    });
}

criterion_group!(benches, bench_spmv, bench_pcg_jacobi);
criterion_main!(benches);
