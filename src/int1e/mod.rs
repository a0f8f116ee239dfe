//! One-electron two-center integrals.
//!
//! Every family is a base operator (`ovlp`, `kin`, `nuc`, `rinv`) sandwiched
//! between basis functions that may carry operators of their own:
//!
//! * `ip`: nabla acting on the basis function, 3 components
//! * `rr`: `|r - R|²` with R the basis centre, 1 component
//!
//! e.g. `int1e_ipovlp` = <∇i|j>, `int1e_ovlprr` = <i| |r-Rj|² j>.
//! Basis operators are applied by expanding each cartesian function into the
//! monomials `(x-A)^p` of the same gaussian, so one polynomial table per
//! primitive pair serves every family.

pub mod driver;
pub mod kinetic;
pub mod nuclear;
pub mod overlap;

use std::fmt;

use tracing::trace;

use crate::error::{CintError, Result};
use crate::native::Int2cIntor;
use crate::optimizer::{CintOpt, PairData};
use crate::transform::cart2sph::cart2sph_2c;
use crate::types::{
    cart_comp_l, cgto_count, common_fac_sp, ncart, nsph, AtmSlot, BasSlot, Env, NDIM,
};

use kinetic::KineticPrim;
use nuclear::{nuclear_charges, rinv_charge, CoulombPrim};
use overlap::OverlapPrim;

/// Value of one primitive pair between two monomials `(r-A)^pb` and `(r-B)^pk`
/// of the pair's gaussians.
pub(crate) trait PrimitiveBase {
    fn value(&self, pb: &[usize; NDIM], pk: &[usize; NDIM]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseOperator {
    Overlap,
    Kinetic,
    Nuclear,
    Rinv,
}

impl BaseOperator {
    pub const ALL: [BaseOperator; 4] =
        [BaseOperator::Overlap, BaseOperator::Kinetic, BaseOperator::Nuclear, BaseOperator::Rinv];

    pub fn name(&self) -> &'static str {
        match self {
            BaseOperator::Overlap => "ovlp",
            BaseOperator::Kinetic => "kin",
            BaseOperator::Nuclear => "nuc",
            BaseOperator::Rinv => "rinv",
        }
    }
}

/// Operator attached to one basis function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasisOp {
    Ip,
    Rr,
}

impl BasisOp {
    pub const ALL: [BasisOp; 2] = [BasisOp::Ip, BasisOp::Rr];

    pub fn name(&self) -> &'static str {
        match self {
            BasisOp::Ip => "ip",
            BasisOp::Rr => "rr",
        }
    }

    pub fn ncomp(&self) -> usize {
        match self {
            BasisOp::Ip => NDIM,
            BasisOp::Rr => 1,
        }
    }

    /// Increase of the polynomial degree.
    pub fn degree(&self) -> usize {
        match self {
            BasisOp::Ip => 1,
            BasisOp::Rr => 2,
        }
    }

    // component `k` of the operator applied to one monomial
    fn apply(&self, k: usize, alpha: f64, t: &Term, out: &mut Vec<Term>) {
        match self {
            BasisOp::Ip => {
                if t.pow[k] > 0 {
                    let mut pow = t.pow;
                    pow[k] -= 1;
                    out.push(Term { coef: t.coef * t.pow[k] as f64, pow });
                }
                let mut pow = t.pow;
                pow[k] += 1;
                out.push(Term { coef: -2.0 * alpha * t.coef, pow });
            }
            BasisOp::Rr => {
                for d in 0..NDIM {
                    let mut pow = t.pow;
                    pow[d] += 2;
                    out.push(Term { coef: t.coef, pow });
                }
            }
        }
    }
}

impl fmt::Display for BasisOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct Term {
    coef: f64,
    pow: [usize; NDIM],
}

// Per cartesian function, per operator component, the monomials it expands to.
// The leftmost operator varies slowest in the component index.
fn expand(l: usize, alpha: f64, ops: &[BasisOp]) -> Vec<Vec<Vec<Term>>> {
    cart_comp_l(l)
        .iter()
        .map(|p| {
            let pow = [p[0] as usize, p[1] as usize, p[2] as usize];
            let mut comps = vec![vec![Term { coef: 1.0, pow }]];
            for op in ops.iter().rev() {
                let mut next = Vec::with_capacity(op.ncomp() * comps.len());
                for k in 0..op.ncomp() {
                    for c in &comps {
                        let mut terms = Vec::with_capacity(3 * c.len());
                        for t in c {
                            op.apply(k, alpha, t, &mut terms);
                        }
                        next.push(terms);
                    }
                }
                comps = next;
            }
            comps
        })
        .collect()
}

fn ops_ncomp(ops: &[BasisOp]) -> usize {
    ops.iter().map(BasisOp::ncomp).product()
}

fn ops_degree(ops: &[BasisOp]) -> usize {
    ops.iter().map(BasisOp::degree).sum()
}

/// Built-in evaluator of one `int1e_*` symbol.
#[derive(Debug, Clone)]
pub struct Int1eKernel {
    name: String,
    base: BaseOperator,
    bra: Vec<BasisOp>,
    ket: Vec<BasisOp>,
    spherical: bool,
}

impl Int1eKernel {
    pub fn new(base: BaseOperator, bra: Vec<BasisOp>, ket: Vec<BasisOp>, spherical: bool) -> Self {
        let mut name = String::from("int1e_");
        bra.iter().for_each(|op| name.push_str(op.name()));
        name.push_str(base.name());
        ket.iter().for_each(|op| name.push_str(op.name()));
        name.push_str(if spherical { "_sph" } else { "_cart" });
        Int1eKernel { name, base, bra, ket, spherical }
    }

    pub fn base(&self) -> BaseOperator {
        self.base
    }

    #[allow(clippy::too_many_arguments)]
    fn primitive(
        &self,
        mmax: usize,
        nmax: usize,
        aj: f64,
        pair: &PairData,
        ri: &[f64; NDIM],
        rj: &[f64; NDIM],
        charges: &[nuclear::PointCharge],
    ) -> Result<Box<dyn PrimitiveBase>> {
        Ok(match self.base {
            BaseOperator::Overlap => Box::new(OverlapPrim::new(mmax, nmax, pair, ri, rj)),
            BaseOperator::Kinetic => Box::new(KineticPrim::new(mmax, nmax, aj, pair, ri, rj)),
            BaseOperator::Nuclear | BaseOperator::Rinv => Box::new(
                CoulombPrim::new(mmax, nmax, pair, ri, rj, charges)
                    .map_err(|e| CintError::native(&self.name, e))?,
            ),
        })
    }
}

impl Int2cIntor for Int1eKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn ncomp(&self) -> usize {
        ops_ncomp(&self.bra) * ops_ncomp(&self.ket)
    }

    fn spherical(&self) -> bool {
        self.spherical
    }

    /// Writes `out[comp][i + j*ni]`, `ni`/`nj` the AO counts of the two shells.
    fn eval_shell_pair(
        &self,
        out: &mut [f64],
        shls: [usize; 2],
        atm: &[i32],
        bas: &[i32],
        env: &[f64],
        opt: Option<&CintOpt>,
    ) -> Result<bool> {
        let ev = Env::new(env);
        let bi = BasSlot::new(bas, shls[0]);
        let bj = BasSlot::new(bas, shls[1]);
        let (li, lj) = (bi.ang_of(), bj.ang_of());
        let (nprim_i, nprim_j) = (bi.nprim_of(), bj.nprim_of());
        let (nctr_i, nctr_j) = (bi.nctr_of(), bj.nctr_of());
        let ni = cgto_count(&bi, self.spherical);
        let nj = cgto_count(&bj, self.spherical);
        let ncomp = self.ncomp();
        let out = &mut out[..ncomp * ni * nj];
        out.fill(0.0);

        let ri = ev.coords(AtmSlot::new(atm, bi.atom_of()).ptr_coord());
        let rj = ev.coords(AtmSlot::new(atm, bj.atom_of()).ptr_coord());
        let expi = ev.exps(bi.ptr_exp(), nprim_i);
        let expj = ev.exps(bj.ptr_exp(), nprim_j);
        let coei = ev.coeffs(bi.ptr_coeff(), nprim_i, nctr_i);
        let coej = ev.coeffs(bj.ptr_coeff(), nprim_j, nctr_j);

        let local;
        let pairs: &[PairData] = match opt {
            Some(o) => o.pair(shls[0], shls[1]),
            None => {
                let cutoff = ev.expcutoff();
                local = expj
                    .iter()
                    .flat_map(|&aj| expi.iter().map(move |&ai| PairData::new(ai, aj, &ri, &rj, cutoff)))
                    .collect::<Vec<_>>();
                &local
            }
        };
        if pairs.iter().all(|p| p.screened) {
            trace!(symbol = %self.name, ?shls, "shell pair screened");
            return Ok(false);
        }

        let charges = match self.base {
            BaseOperator::Nuclear => {
                nuclear_charges(atm, &ev).map_err(|e| CintError::native(&self.name, e))?
            }
            BaseOperator::Rinv => rinv_charge(&ev),
            _ => Vec::new(),
        };

        let (nfi, nfj) = (ncart(li), ncart(lj));
        let (ncb, nck) = (ops_ncomp(&self.bra), ops_ncomp(&self.ket));
        let mmax = li + ops_degree(&self.bra);
        let nmax = lj + ops_degree(&self.ket);
        let common = common_fac_sp(li) * common_fac_sp(lj);

        let nf = nfi * nfj;
        let mut pbuf = vec![0.0f64; ncomp * nf];
        let mut gcart = vec![0.0f64; ncomp * nctr_i * nctr_j * nf];
        for jp in 0..nprim_j {
            let ket = expand(lj, expj[jp], &self.ket);
            for ip in 0..nprim_i {
                let pair = &pairs[ip + jp * nprim_i];
                if pair.screened {
                    continue;
                }
                let bra = expand(li, expi[ip], &self.bra);
                let prim = self.primitive(mmax, nmax, expj[jp], pair, &ri, &rj, &charges)?;
                for cb in 0..ncb {
                    for ck in 0..nck {
                        let comp = cb * nck + ck;
                        for fj in 0..nfj {
                            for fi in 0..nfi {
                                let mut v = 0.0;
                                for tb in &bra[fi][cb] {
                                    for tk in &ket[fj][ck] {
                                        v += tb.coef * tk.coef * prim.value(&tb.pow, &tk.pow);
                                    }
                                }
                                pbuf[comp * nf + fi + fj * nfi] = v;
                            }
                        }
                    }
                }
                let fac = common * pair.eij;
                for comp in 0..ncomp {
                    for jc in 0..nctr_j {
                        for ic in 0..nctr_i {
                            let c = fac * coei[ip + ic * nprim_i] * coej[jp + jc * nprim_j];
                            let dst = ((comp * nctr_j + jc) * nctr_i + ic) * nf;
                            for (g, p) in gcart[dst..dst + nf].iter_mut().zip(&pbuf[comp * nf..(comp + 1) * nf]) {
                                *g += c * p;
                            }
                        }
                    }
                }
            }
        }

        let (noi, noj) = if self.spherical { (nsph(li), nsph(lj)) } else { (nfi, nfj) };
        let mut block = vec![0.0f64; noi * noj];
        for comp in 0..ncomp {
            for jc in 0..nctr_j {
                for ic in 0..nctr_i {
                    let src = ((comp * nctr_j + jc) * nctr_i + ic) * nf;
                    let cart = &gcart[src..src + nf];
                    if self.spherical {
                        cart2sph_2c(&mut block, cart, li, lj);
                    } else {
                        block.copy_from_slice(cart);
                    }
                    let dst = &mut out[comp * ni * nj..(comp + 1) * ni * nj];
                    for j in 0..noj {
                        for i in 0..noi {
                            dst[(ic * noi + i) + (jc * noj + j) * ni] = block[i + j * noi];
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    fn build_optimizer(&self, atm: &[i32], bas: &[i32], env: &[f64]) -> CintOpt {
        CintOpt::build(atm, bas, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::types::PTR_ENV_START;

    // one p shell on the origin, one s shell displaced along z
    fn ps_tables(d: f64) -> (Vec<i32>, Vec<i32>, Vec<f64>) {
        let s = PTR_ENV_START as i32;
        let mut env = vec![0.0; PTR_ENV_START];
        env.extend_from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, d, 0.0, 0.9, 1.0, 1.2, 1.0]);
        let atm = vec![1, s, 1, s + 3, 0, 0, 1, s + 4, 1, s + 7, 0, 0];
        let bas = vec![0, 1, 1, 1, 0, s + 8, s + 9, 0, 1, 0, 1, 1, 0, s + 10, s + 11, 0];
        (atm, bas, env)
    }

    fn eval(k: &Int1eKernel, shls: [usize; 2], t: &(Vec<i32>, Vec<i32>, Vec<f64>)) -> Vec<f64> {
        let n = k.ncomp() * 9;
        let mut out = vec![0.0; n];
        k.eval_shell_pair(&mut out, shls, &t.0, &t.1, &t.2, None).unwrap();
        out
    }

    #[test]
    fn symbol_names_follow_libcint() {
        let k = Int1eKernel::new(BaseOperator::Overlap, vec![BasisOp::Ip], vec![], true);
        assert_eq!(k.name(), "int1e_ipovlp_sph");
        assert_eq!(k.ncomp(), 3);
        let k = Int1eKernel::new(BaseOperator::Nuclear, vec![], vec![BasisOp::Rr], false);
        assert_eq!(k.name(), "int1e_nucrr_cart");
        assert_eq!(k.ncomp(), 1);
    }

    #[test]
    fn ip_expansion_of_px() {
        let e = expand(1, 0.5, &[BasisOp::Ip]);
        // d/dx of x·g = g - 2a·x²·g
        let dx = &e[0][0];
        assert_eq!(dx.len(), 2);
        assert_eq!(dx[0].pow, [0, 0, 0]);
        assert_relative_eq!(dx[0].coef, 1.0);
        assert_eq!(dx[1].pow, [2, 0, 0]);
        assert_relative_eq!(dx[1].coef, -1.0);
        // d/dy of x·g has no lowering term
        assert_eq!(e[0][1].len(), 1);
    }

    #[test]
    fn ps_overlap_is_antisymmetric_in_displacement() {
        let k = Int1eKernel::new(BaseOperator::Overlap, vec![], vec![], false);
        let up = eval(&k, [0, 1], &ps_tables(0.8));
        let down = eval(&k, [0, 1], &ps_tables(-0.8));
        assert_relative_eq!(up[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(up[1], 0.0, epsilon = 1e-15);
        assert!(up[2] > 0.0);
        assert_relative_eq!(up[2], -down[2], epsilon = 1e-14);
    }

    #[test]
    fn ip_on_ket_matches_finite_difference_of_centre() {
        // <i|∇j> = -d/dRj <i|j>
        let k = Int1eKernel::new(BaseOperator::Overlap, vec![], vec![], false);
        let kip = Int1eKernel::new(BaseOperator::Overlap, vec![], vec![BasisOp::Ip], false);
        let h = 1e-5;
        let d = 0.7;
        let fwd = eval(&k, [0, 1], &ps_tables(d + h));
        let bwd = eval(&k, [0, 1], &ps_tables(d - h));
        let ip = eval(&kip, [0, 1], &ps_tables(d));
        // z component is the third block of three
        for i in 0..3 {
            let fd = -(fwd[i] - bwd[i]) / (2.0 * h);
            assert_relative_eq!(ip[6 + i], fd, epsilon = 1e-8);
        }
    }

    #[test]
    fn kinetic_is_hermitian() {
        let k = Int1eKernel::new(BaseOperator::Kinetic, vec![], vec![], true);
        let t = ps_tables(0.6);
        let ij = eval(&k, [0, 1], &t);
        let ji = eval(&k, [1, 0], &t);
        for i in 0..3 {
            assert_relative_eq!(ij[i], ji[i], epsilon = 1e-13);
        }
    }
}
