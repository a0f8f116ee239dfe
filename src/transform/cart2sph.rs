//! Cartesian to real spherical harmonic (RSH) transformation.
//!
//! For l ≤ 1 the transformation is the identity: the angular factors
//! `1/sqrt(4π)` and `sqrt(3/(4π))` are already applied by the integral
//! kernels through `common_fac_sp`, and libcint keeps p functions in
//! (x, y, z) order.
//!
//! For l ≥ 2 the spherical functions are `r^l Y_lm` with `Y_lm` normalized on
//! the unit sphere, ordered m = -l..l, e.g. for d:
//!   d_{-2} ∝ xy, d_{-1} ∝ yz, d_0 ∝ 2zz - xx - yy, d_1 ∝ xz, d_2 ∝ xx - yy
//! Coefficients follow the closed form of the real solid harmonics
//! (Helgaker, Jørgensen & Olsen, eq. 6.4.48) rescaled from Racah to unit-sphere
//! normalization.

use std::f64::consts::PI;

use lazy_static::lazy_static;

use crate::types::{ncart, nsph, CART_LMAX};

lazy_static! {
    static ref C2S: Vec<Vec<f64>> = (0..=CART_LMAX).map(build_c2s).collect();
}

/// Column-major `cart → sph` matrix of angular momentum `l`.
/// Shape `[nfc × nfs]`, storage `mat[c + s*nfc]`.
pub fn c2s_matrix(l: usize) -> &'static [f64] {
    &C2S[l]
}

fn binom(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, i| acc * i as f64)
}

// position of (px, py, pz) in the libcint cartesian order of l = px+py+pz
fn cart_index(px: usize, py: usize, l: usize) -> usize {
    (l - px) * (l - px + 1) / 2 + (l - px - py)
}

fn build_c2s(l: usize) -> Vec<f64> {
    let nfc = ncart(l);
    let nfs = nsph(l);
    let mut mat = vec![0.0f64; nfc * nfs];
    if l <= 1 {
        for c in 0..nfc {
            mat[c + c * nfc] = 1.0;
        }
        return mat;
    }

    let unit_sphere = ((2 * l + 1) as f64 / (4.0 * PI)).sqrt();
    for (s, m) in (-(l as i64)..=l as i64).enumerate() {
        let am = m.unsigned_abs() as usize;
        let racah = (2.0 * factorial(l + am) * factorial(l - am)
            / if m == 0 { 2.0 } else { 1.0 })
            .sqrt()
            / (2f64.powi(am as i32) * factorial(l));
        let norm = racah * unit_sphere;
        // k = 2v runs over even values for m >= 0, odd values for m < 0
        let k0 = if m < 0 { 1 } else { 0 };
        for t in 0..=(l - am) / 2 {
            for u in 0..=t {
                let mut k = k0;
                while k <= am {
                    let sign = if (t + (k - k0) / 2) % 2 == 0 { 1.0 } else { -1.0 };
                    let c = sign
                        * 0.25f64.powi(t as i32)
                        * binom(l, t)
                        * binom(l - t, am + t)
                        * binom(t, u)
                        * binom(am, k);
                    let px = 2 * t + am - 2 * u - k;
                    let py = 2 * u + k;
                    mat[cart_index(px, py, l) + s * nfc] += norm * c;
                    k += 2;
                }
            }
        }
    }
    mat
}

/// Transform one column-major cartesian block `[nci × ncj]` (bra fastest) of
/// a shell pair into the spherical block `[nsi × nsj]`.
pub fn cart2sph_2c(gsph: &mut [f64], gcart: &[f64], li: usize, lj: usize) {
    let (nci, ncj) = (ncart(li), ncart(lj));
    let (nsi, nsj) = (nsph(li), nsph(lj));
    if li <= 1 && lj <= 1 {
        gsph[..nci * ncj].copy_from_slice(&gcart[..nci * ncj]);
        return;
    }
    let mi = c2s_matrix(li);
    let mj = c2s_matrix(lj);

    // bra: tmp[si, cj] = Σ_ci mi[ci, si] · g[ci, cj]
    let mut tmp = vec![0.0f64; nsi * ncj];
    for cj in 0..ncj {
        for si in 0..nsi {
            let mut v = 0.0;
            for ci in 0..nci {
                v += mi[ci + si * nci] * gcart[ci + cj * nci];
            }
            tmp[si + cj * nsi] = v;
        }
    }
    // ket: out[si, sj] = Σ_cj tmp[si, cj] · mj[cj, sj]
    for sj in 0..nsj {
        for si in 0..nsi {
            let mut v = 0.0;
            for cj in 0..ncj {
                v += tmp[si + cj * nsi] * mj[cj + sj * ncj];
            }
            gsph[si + sj * nsi] = v;
        }
    }
}
