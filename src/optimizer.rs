//! CintOpt: pre-computed primitive-pair data for two-center integrals.
//!
//! For every shell pair (i, j) and every primitive pair (ip, jp) the Gaussian
//! product theorem gives
//!   exp(-a·|r-A|²)·exp(-b·|r-B|²) = eij · exp(-(a+b)·|r-P|²)
//! with `eij = exp(-ab/(a+b)·|A-B|²)` and `P = (aA + bB)/(a+b)`.
//!
//! These quantities are independent of the operator, so one optimizer serves
//! every family sharing the same atm/bas/env triple. Pairs whose exponent
//! `ab/(a+b)·|A-B|²` exceeds the env cutoff are marked as screened.

use crate::types::{AtmSlot, BasSlot, Env, NDIM};

/// Gaussian product of one primitive pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairData {
    pub aij: f64,
    pub eij: f64,
    pub rij: [f64; NDIM],
    pub screened: bool,
}

impl PairData {
    pub fn new(ai: f64, aj: f64, ri: &[f64; NDIM], rj: &[f64; NDIM], cutoff: f64) -> Self {
        let aij = ai + aj;
        let rr: f64 = (0..NDIM).map(|d| (ri[d] - rj[d]) * (ri[d] - rj[d])).sum();
        let exponent = ai * aj / aij * rr;
        let rij = [
            (ai * ri[0] + aj * rj[0]) / aij,
            (ai * ri[1] + aj * rj[1]) / aij,
            (ai * ri[2] + aj * rj[2]) / aij,
        ];
        PairData {
            aij,
            eij: if exponent > cutoff { 0.0 } else { (-exponent).exp() },
            rij,
            screened: exponent > cutoff,
        }
    }
}

/// Primitive-pair table of one atm/bas/env triple.
#[derive(Debug, Clone)]
pub struct CintOpt {
    nbas: usize,
    /// `offsets[i*nbas + j]` starts the primitive pairs of shell pair (i, j),
    /// stored with the bra primitive fastest.
    offsets: Vec<usize>,
    pairs: Vec<PairData>,
}

impl CintOpt {
    pub fn build(atm: &[i32], bas: &[i32], env: &[f64]) -> Self {
        let env = Env::new(env);
        let nbas = bas.len() / crate::types::BAS_SLOTS;
        let cutoff = env.expcutoff();
        let mut offsets = Vec::with_capacity(nbas * nbas + 1);
        let mut pairs = Vec::new();
        for i in 0..nbas {
            let bi = BasSlot::new(bas, i);
            let ri = env.coords(AtmSlot::new(atm, bi.atom_of()).ptr_coord());
            let ei = env.exps(bi.ptr_exp(), bi.nprim_of());
            for j in 0..nbas {
                let bj = BasSlot::new(bas, j);
                let rj = env.coords(AtmSlot::new(atm, bj.atom_of()).ptr_coord());
                let ej = env.exps(bj.ptr_exp(), bj.nprim_of());
                offsets.push(pairs.len());
                for &aj in ej {
                    for &ai in ei {
                        pairs.push(PairData::new(ai, aj, &ri, &rj, cutoff));
                    }
                }
            }
        }
        offsets.push(pairs.len());
        CintOpt { nbas, offsets, pairs }
    }

    pub fn nbas(&self) -> usize {
        self.nbas
    }

    /// Primitive pairs of shell pair (i, j), `ip + jp*nprim_i`.
    #[inline]
    pub fn pair(&self, i: usize, j: usize) -> &[PairData] {
        let k = i * self.nbas + j;
        &self.pairs[self.offsets[k]..self.offsets[k + 1]]
    }

    /// `false` when every primitive pair of (i, j) is screened out.
    #[inline]
    pub fn passes(&self, i: usize, j: usize) -> bool {
        self.pair(i, j).iter().any(|p| !p.screened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PTR_ENV_START;

    fn two_s_shells(d: f64) -> (Vec<i32>, Vec<i32>, Vec<f64>) {
        let s = PTR_ENV_START as i32;
        let mut env = vec![0.0; PTR_ENV_START];
        env.extend_from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, d, 0.0, 1.0, 0.5, 1.0, 1.0]);
        let atm = vec![1, s, 1, s + 3, 0, 0, 1, s + 4, 1, s + 7, 0, 0];
        let bas = vec![0, 0, 2, 1, 0, s + 8, s + 10, 0, 1, 0, 1, 1, 0, s + 8, s + 11, 0];
        (atm, bas, env)
    }

    #[test]
    fn pair_counts_follow_primitive_counts() {
        let (atm, bas, env) = two_s_shells(1.0);
        let opt = CintOpt::build(&atm, &bas, &env);
        assert_eq!(opt.pair(0, 0).len(), 4);
        assert_eq!(opt.pair(0, 1).len(), 2);
        assert_eq!(opt.pair(1, 1).len(), 1);
        let p = opt.pair(0, 1)[1];
        assert!((p.aij - 1.5).abs() < 1e-15);
        assert!((p.rij[2] - 1.0 / 1.5).abs() < 1e-15);
    }

    #[test]
    fn distant_pairs_are_screened() {
        let (atm, bas, env) = two_s_shells(40.0);
        let opt = CintOpt::build(&atm, &bas, &env);
        assert!(opt.passes(0, 0));
        assert!(!opt.passes(0, 1));
    }
}
