//! Kinetic energy integral <i| -½∇² |j>.
//!
//! Uses the Obara-Saika kinetic energy formula, which expresses the 3D
//! kinetic energy integral as a sum of products of 1D overlap integrals:
//!
//!   T_{ij} = T1d(a_x,b_x)·S1d(a_y,b_y)·S1d(a_z,b_z)
//!          + S1d(a_x,b_x)·T1d(a_y,b_y)·S1d(a_z,b_z)
//!          + S1d(a_x,b_x)·S1d(a_y,b_y)·T1d(a_z,b_z)
//!
//! where the 1D kinetic integral is:
//!   T1d(m,n) = aj·(2n+1)·S1d(m,n) − 2·aj²·S1d(m,n+2) − n·(n–1)/2·S1d(m,n–2)
//!
//! The ket table is built two powers deeper than the ket angular momentum.
//!
//! Reference: Obara & Saika, JCP 84, 3963 (1986), eq.(22).

use std::f64::consts::PI;

use super::overlap::Poly1d;
use super::PrimitiveBase;
use crate::optimizer::PairData;
use crate::types::NDIM;

pub(crate) struct KineticPrim {
    s: [Poly1d; NDIM],
    aj: f64,
    fac: f64,
}

impl KineticPrim {
    /// `nmax` is the largest ket power the caller will request.
    pub(crate) fn new(
        mmax: usize,
        nmax: usize,
        aj: f64,
        pair: &PairData,
        ri: &[f64; NDIM],
        rj: &[f64; NDIM],
    ) -> Self {
        KineticPrim {
            s: Poly1d::overlap_xyz(mmax, nmax + 2, pair, ri, rj),
            aj,
            fac: (PI / pair.aij).powf(1.5),
        }
    }

    #[inline]
    fn t1d(&self, d: usize, m: usize, n: usize) -> f64 {
        let s = &self.s[d];
        let aj = self.aj;
        let mut v = aj * (2 * n + 1) as f64 * s.at(m, n) - 2.0 * aj * aj * s.at(m, n + 2);
        if n >= 2 {
            v -= (n * (n - 1)) as f64 * 0.5 * s.at(m, n - 2);
        }
        v
    }
}

impl PrimitiveBase for KineticPrim {
    fn value(&self, pb: &[usize; NDIM], pk: &[usize; NDIM]) -> f64 {
        let sx = self.s[0].at(pb[0], pk[0]);
        let sy = self.s[1].at(pb[1], pk[1]);
        let sz = self.s[2].at(pb[2], pk[2]);
        let tx = self.t1d(0, pb[0], pk[0]);
        let ty = self.t1d(1, pb[1], pk[1]);
        let tz = self.t1d(2, pb[2], pk[2]);
        self.fac * (tx * sy * sz + sx * ty * sz + sx * sy * tz)
    }
}
