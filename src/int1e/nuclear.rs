//! Coulomb-type one-electron integrals, evaluated with Rys quadrature.
//!
//!   nuc:  <i| Σ_A -Z_A / |r - R_A| |j>
//!   rinv: <i| 1 / |r - R0| |j>,  R0 = env[PTR_RINV_ORIG..+3]
//!
//! Follows libcint's `CINTg1e_nuc`: for every centre C the Boys argument is
//! `x = aij·|P - C|²` and each Rys root t² shifts the 1D recursion to
//!   r0 = (P - A) + t²·(C - P),   rt = (1 - t²)/(2·aij)
//! with the overall prefactor `2π/aij · charge`.

use std::f64::consts::PI;

use super::overlap::Poly1d;
use super::PrimitiveBase;
use crate::optimizer::PairData;
use crate::rys::{rys_roots, MXRYSROOTS};
use crate::types::{AtmSlot, Env, ATM_SLOTS, NDIM, POINT_NUC};

/// A point charge seen by the electron.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PointCharge {
    pub charge: f64,
    pub centre: [f64; NDIM],
}

/// All nuclei of the atm table, with the attractive sign folded in.
pub(crate) fn nuclear_charges(atm: &[i32], env: &Env<'_>) -> Result<Vec<PointCharge>, String> {
    let natm = atm.len() / ATM_SLOTS;
    let mut out = Vec::with_capacity(natm);
    for ia in 0..natm {
        let a = AtmSlot::new(atm, ia);
        if a.nuc_mod() != POINT_NUC {
            return Err(format!("atom {ia}: nuclear model {} is not a point charge", a.nuc_mod()));
        }
        if a.charge() == 0 {
            continue;
        }
        out.push(PointCharge {
            charge: -(a.charge() as f64),
            centre: env.coords(a.ptr_coord()),
        });
    }
    Ok(out)
}

/// The unit charge sitting on the rinv origin.
pub(crate) fn rinv_charge(env: &Env<'_>) -> Vec<PointCharge> {
    vec![PointCharge { charge: 1.0, centre: env.rinv_orig() }]
}

struct RysNode {
    weight: f64,
    g: [Poly1d; NDIM],
}

pub(crate) struct CoulombPrim {
    nodes: Vec<RysNode>,
    fac: f64,
}

impl CoulombPrim {
    pub(crate) fn new(
        mmax: usize,
        nmax: usize,
        pair: &PairData,
        ri: &[f64; NDIM],
        rj: &[f64; NDIM],
        charges: &[PointCharge],
    ) -> Result<Self, &'static str> {
        let nroots = (mmax + nmax) / 2 + 1;
        if nroots > MXRYSROOTS {
            return Err("angular momentum too high for Rys quadrature");
        }
        let aij = pair.aij;
        let p = pair.rij;
        let mut nodes = Vec::with_capacity(nroots * charges.len());
        let mut u = [0.0f64; MXRYSROOTS];
        let mut w = [0.0f64; MXRYSROOTS];
        for c in charges {
            let pc = [c.centre[0] - p[0], c.centre[1] - p[1], c.centre[2] - p[2]];
            let x = aij * (pc[0] * pc[0] + pc[1] * pc[1] + pc[2] * pc[2]);
            rys_roots(nroots, x, &mut u[..nroots], &mut w[..nroots])?;
            for k in 0..nroots {
                let t2 = u[k] / (1.0 + u[k]);
                let rt = 0.5 * (1.0 - t2) / aij;
                let mk = |d: usize| Poly1d::build(mmax, nmax, p[d] - ri[d] + t2 * pc[d], ri[d] - rj[d], rt);
                nodes.push(RysNode { weight: w[k] * c.charge, g: [mk(0), mk(1), mk(2)] });
            }
        }
        Ok(CoulombPrim { nodes, fac: 2.0 * PI / aij })
    }
}

impl PrimitiveBase for CoulombPrim {
    fn value(&self, pb: &[usize; NDIM], pk: &[usize; NDIM]) -> f64 {
        let sum: f64 = self
            .nodes
            .iter()
            .map(|n| {
                n.weight * n.g[0].at(pb[0], pk[0]) * n.g[1].at(pb[1], pk[1]) * n.g[2].at(pb[2], pk[2])
            })
            .sum();
        self.fac * sum
    }
}
