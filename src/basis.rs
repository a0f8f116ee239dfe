//! Caller-side description of a Gaussian basis: shells grouped by atom.
//!
//! Terminology:
//! * primitive: one gaussian (one exponent, one coefficient)
//! * shell: one contracted basis function of a single angular momentum
//! * AO: a shell split into its angular components, e.g. a cartesian p-shell
//!   gives three AOs (x, y, z)

use crate::error::{CintError, Result};
use crate::types::NDIM;

/// Atomic number; fractional values are allowed for alchemical interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtomZ {
    Integer(u32),
    Fractional(f64),
}

impl AtomZ {
    pub fn value(&self) -> f64 {
        match *self {
            AtomZ::Integer(z) => z as f64,
            AtomZ::Fractional(z) => z,
        }
    }

    pub fn is_fractional(&self) -> bool {
        matches!(self, AtomZ::Fractional(_))
    }
}

impl From<u32> for AtomZ {
    fn from(z: u32) -> Self {
        AtomZ::Integer(z)
    }
}

impl From<f64> for AtomZ {
    fn from(z: f64) -> Self {
        AtomZ::Fractional(z)
    }
}

/// One contracted shell.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub angmom: usize,
    pub alphas: Vec<f64>,
    pub coeffs: Vec<f64>,
}

impl Shell {
    /// Unchecked constructor; the layout builder validates the contents.
    pub fn new(angmom: usize, alphas: Vec<f64>, coeffs: Vec<f64>) -> Self {
        Shell { angmom, alphas, coeffs }
    }

    pub fn nprim(&self) -> usize {
        self.alphas.len()
    }

    /// Rescale the coefficients so that the contracted function has unit norm
    /// in the libcint convention (each primitive scaled by `gto_norm`, then the
    /// contraction as a whole).
    pub fn normalized(mut self) -> Result<Self> {
        if self.alphas.len() != self.coeffs.len() || self.alphas.is_empty() {
            return Err(CintError::invalid(format!(
                "cannot normalize a shell with {} exponents and {} coefficients",
                self.alphas.len(),
                self.coeffs.len()
            )));
        }
        let l = self.angmom;
        for (c, &a) in self.coeffs.iter_mut().zip(&self.alphas) {
            *c *= gto_norm(l, a);
        }
        let mut ee = 0.0;
        for (ci, ai) in self.coeffs.iter().zip(&self.alphas) {
            for (cj, aj) in self.coeffs.iter().zip(&self.alphas) {
                ee += ci * cj * gaussian_int(2 * l + 2, ai + aj);
            }
        }
        if !(ee > 0.0) {
            return Err(CintError::invalid("shell has a vanishing norm"));
        }
        let s = 1.0 / ee.sqrt();
        for c in self.coeffs.iter_mut() {
            *c *= s;
        }
        Ok(self)
    }
}

/// All shells centred on one atom.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomBasis {
    pub atomz: AtomZ,
    pub pos: Vec<f64>,
    pub bases: Vec<Shell>,
}

impl AtomBasis {
    pub fn new(atomz: impl Into<AtomZ>, pos: [f64; NDIM], bases: Vec<Shell>) -> Self {
        AtomBasis { atomz: atomz.into(), pos: pos.to_vec(), bases }
    }
}

/// `∫_0^∞ x^n exp(-a x²) dx`
pub fn gaussian_int(n: usize, alpha: f64) -> f64 {
    let n1 = (n as f64 + 1.0) * 0.5;
    libm::tgamma(n1) / (2.0 * alpha.powf(n1))
}

/// Radial normalization of a primitive `r^l exp(-a r²)`.
pub fn gto_norm(l: usize, alpha: f64) -> f64 {
    1.0 / gaussian_int(2 * l + 2, 2.0 * alpha).sqrt()
}
