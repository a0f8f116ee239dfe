//! Slot constants and read-only views of the libcint atm/bas/env layout.
//!
//! libcint describes a molecular basis with three flat arrays:
//!   atm[natm][ATM_SLOTS]: atom data
//!   bas[nbas][BAS_SLOTS]: shell data
//!   env[]               : floating-point storage for coordinates/exponents/coefficients

// ─── env global offsets (cint.h) ────────────────────────────────────────────
pub const PTR_EXPCUTOFF:     usize = 0;
pub const PTR_RINV_ORIG:     usize = 4;  // 3 floats
pub const PTR_ENV_START:     usize = 20;

// ─── atm slot indices ────────────────────────────────────────────────────────
pub const CHARGE_OF:     usize = 0;
pub const PTR_COORD:     usize = 1;
pub const NUC_MOD_OF:    usize = 2;
pub const PTR_ZETA:      usize = 3;
pub const ATM_SLOTS:     usize = 6;

// ─── bas slot indices ────────────────────────────────────────────────────────
pub const ATOM_OF:       usize = 0;
pub const ANG_OF:        usize = 1;
pub const NPRIM_OF:      usize = 2;
pub const NCTR_OF:       usize = 3;
pub const KAPPA_OF:      usize = 4;
pub const PTR_EXP:       usize = 5;
pub const PTR_COEFF:     usize = 6;
pub const BAS_SLOTS:     usize = 8;

/// Point-charge nuclear model tag written into `atm[NUC_MOD_OF]`.
pub const POINT_NUC:    i32 = 1;

/// Default exponent cutoff when `env[PTR_EXPCUTOFF]` is zero.
pub const EXPCUTOFF:    f64 = 60.0;
pub const MIN_EXPCUTOFF: f64 = 40.0;

/// Number of spatial dimensions.
pub const NDIM: usize = 3;

/// Highest shell angular momentum accepted by the layout builder.
pub const ANG_MAX: usize = CART_LMAX;

// ─── Read-only views into the tables ─────────────────────────────────────────

/// Read-only view of one atom row in the `atm` table.
#[derive(Debug, Clone, Copy)]
pub struct AtmSlot<'a> {
    data: &'a [i32],  // ATM_SLOTS elements
}

impl<'a> AtmSlot<'a> {
    #[inline]
    pub fn new(atm: &'a [i32], iatom: usize) -> Self {
        AtmSlot { data: &atm[iatom * ATM_SLOTS..(iatom + 1) * ATM_SLOTS] }
    }

    #[inline] pub fn charge(&self)    -> i32 { self.data[CHARGE_OF] }
    #[inline] pub fn ptr_coord(&self) -> usize { self.data[PTR_COORD] as usize }
    #[inline] pub fn nuc_mod(&self)   -> i32 { self.data[NUC_MOD_OF] }
}

/// Read-only view of one shell row in the `bas` table.
#[derive(Debug, Clone, Copy)]
pub struct BasSlot<'a> {
    data: &'a [i32],
}

impl<'a> BasSlot<'a> {
    #[inline]
    pub fn new(bas: &'a [i32], ibas: usize) -> Self {
        BasSlot { data: &bas[ibas * BAS_SLOTS..(ibas + 1) * BAS_SLOTS] }
    }

    #[inline] pub fn atom_of(&self)  -> usize { self.data[ATOM_OF]  as usize }
    #[inline] pub fn ang_of(&self)   -> usize { self.data[ANG_OF]   as usize }
    #[inline] pub fn nprim_of(&self) -> usize { self.data[NPRIM_OF] as usize }
    #[inline] pub fn nctr_of(&self)  -> usize { self.data[NCTR_OF]  as usize }
    #[inline] pub fn ptr_exp(&self)  -> usize { self.data[PTR_EXP]  as usize }
    #[inline] pub fn ptr_coeff(&self)-> usize { self.data[PTR_COEFF] as usize }
}

/// Read-only view of the flat `env` array.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    data: &'a [f64],
}

impl<'a> Env<'a> {
    pub fn new(env: &'a [f64]) -> Self {
        Env { data: env }
    }

    /// Three consecutive values starting at `ptr`.
    pub fn coords(&self, ptr: usize) -> [f64; 3] {
        [self.data[ptr], self.data[ptr + 1], self.data[ptr + 2]]
    }

    /// Primitive exponents of a shell.
    pub fn exps(&self, ptr: usize, nprim: usize) -> &'a [f64] {
        &self.data[ptr..ptr + nprim]
    }

    /// Contraction coefficients of a shell (column-major: nprim × nctr).
    pub fn coeffs(&self, ptr: usize, nprim: usize, nctr: usize) -> &'a [f64] {
        &self.data[ptr..ptr + nprim * nctr]
    }

    /// Origin of the `rinv` operator.
    pub fn rinv_orig(&self) -> [f64; 3] { self.coords(PTR_RINV_ORIG) }

    pub fn expcutoff(&self) -> f64 {
        let v = self.data[PTR_EXPCUTOFF];
        if v == 0.0 { EXPCUTOFF } else { v.max(MIN_EXPCUTOFF) + 1.0 }
    }
}

/// l-dependent normalisation factor for s and p orbitals.
/// For l≥2 the factor is absorbed into the cart2sph coefficients.
pub fn common_fac_sp(l: usize) -> f64 {
    match l {
        0 => 0.282094791773878143,  // 1/sqrt(4π)
        1 => 0.488602511902919921,  // sqrt(3/(4π))
        _ => 1.0,
    }
}

/// Number of Cartesian GTOs for angular momentum l: (l+1)(l+2)/2
#[inline]
pub fn ncart(l: usize) -> usize { (l + 1) * (l + 2) / 2 }

/// Number of real spherical GTOs for angular momentum l: 2l+1
#[inline]
pub fn nsph(l: usize) -> usize { 2 * l + 1 }

/// AO count of one shell row, the `CINTcgto_spheric`/`CINTcgto_cart` query.
#[inline]
pub fn cgto_count(bas: &BasSlot<'_>, spherical: bool) -> usize {
    let l = bas.ang_of();
    let nf = if spherical { nsph(l) } else { ncart(l) };
    nf * bas.nctr_of()
}

// Static Cartesian component tables generated by build.rs.
// Provides `CART_LMAX` and `cart_comp_l(l) -> &'static [[u8; 3]]`.
include!(concat!(env!("OUT_DIR"), "/cart_tables.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_tables_follow_libcint_order() {
        assert_eq!(cart_comp_l(0), &[[0, 0, 0]]);
        assert_eq!(cart_comp_l(1), &[[1, 0, 0], [0, 1, 0], [0, 0, 1]]);
        let d = cart_comp_l(2);
        assert_eq!(d.len(), 6);
        assert_eq!(d[0], [2, 0, 0]);
        assert_eq!(d[1], [1, 1, 0]);
        assert_eq!(d[5], [0, 0, 2]);
        for l in 0..=CART_LMAX {
            assert_eq!(cart_comp_l(l).len(), ncart(l));
            assert!(cart_comp_l(l).iter().all(|p| (p[0] + p[1] + p[2]) as usize == l));
        }
    }

    #[test]
    fn expcutoff_defaults_when_unset() {
        let mut env = vec![0.0; PTR_ENV_START];
        assert_eq!(Env::new(&env).expcutoff(), EXPCUTOFF);
        env[PTR_EXPCUTOFF] = 10.0;
        assert_eq!(Env::new(&env).expcutoff(), MIN_EXPCUTOFF + 1.0);
    }
}
