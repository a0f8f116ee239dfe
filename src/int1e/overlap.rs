//! Overlap integral <i|j> and the 1D polynomial tables shared by all
//! one-electron kernels.
//!
//! Algorithm (follows libcint `CINTg1e_ovlp`):
//!   S(i,j) = eij · (π/aij)^(3/2) · Sx · Sy · Sz
//! where the 1D factors come from the upward recursion
//!   g[n+1, 0] = r0 · g[n, 0] + n·rt · g[n-1, 0]
//! followed by the j-transfer
//!   g[n, j] = g[n+1, j-1] + rb · g[n, j-1]
//! with `r0 = P - A`, `rb = A - B`, `rt = 1/(2·aij)`.

use std::f64::consts::PI;

use super::PrimitiveBase;
use crate::optimizer::PairData;
use crate::types::NDIM;

/// Table `g[m, n]` of one cartesian direction, `m ≤ mmax`, `n ≤ nmax`.
#[derive(Debug, Clone)]
pub(crate) struct Poly1d {
    stride: usize,
    g: Vec<f64>,
}

impl Poly1d {
    pub(crate) fn build(mmax: usize, nmax: usize, r0: f64, rb: f64, rt: f64) -> Self {
        let ntot = mmax + nmax;
        let stride = ntot + 1;
        let mut g = vec![0.0f64; stride * (nmax + 1)];
        g[0] = 1.0;
        if ntot > 0 {
            g[1] = r0;
        }
        for i in 1..ntot {
            g[i + 1] = r0 * g[i] + i as f64 * rt * g[i - 1];
        }
        for j in 1..=nmax {
            for i in 0..=(ntot - j) {
                g[j * stride + i] = g[(j - 1) * stride + i + 1] + rb * g[(j - 1) * stride + i];
            }
        }
        Poly1d { stride, g }
    }

    #[inline]
    pub(crate) fn at(&self, m: usize, n: usize) -> f64 {
        self.g[n * self.stride + m]
    }

    /// The three directions of an overlap-type distribution.
    pub(crate) fn overlap_xyz(
        mmax: usize,
        nmax: usize,
        pair: &PairData,
        ri: &[f64; NDIM],
        rj: &[f64; NDIM],
    ) -> [Poly1d; NDIM] {
        let rt = 0.5 / pair.aij;
        let mk = |d: usize| Poly1d::build(mmax, nmax, pair.rij[d] - ri[d], ri[d] - rj[d], rt);
        [mk(0), mk(1), mk(2)]
    }
}

/// Overlap of one primitive pair.
pub(crate) struct OverlapPrim {
    s: [Poly1d; NDIM],
    fac: f64,
}

impl OverlapPrim {
    pub(crate) fn new(
        mmax: usize,
        nmax: usize,
        pair: &PairData,
        ri: &[f64; NDIM],
        rj: &[f64; NDIM],
    ) -> Self {
        OverlapPrim {
            s: Poly1d::overlap_xyz(mmax, nmax, pair, ri, rj),
            fac: (PI / pair.aij).powf(1.5),
        }
    }
}

impl PrimitiveBase for OverlapPrim {
    #[inline]
    fn value(&self, pb: &[usize; NDIM], pk: &[usize; NDIM]) -> f64 {
        self.fac
            * self.s[0].at(pb[0], pk[0])
            * self.s[1].at(pb[1], pk[1])
            * self.s[2].at(pb[2], pk[2])
    }
}
