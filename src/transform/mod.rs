//! Cartesian → spherical-harmonic transformation module.
//!
//! s and p shells pass through unchanged; l ≥ 2 uses the general real solid
//! harmonic coefficients, cached per angular momentum.

pub mod cart2sph;

pub use cart2sph::{c2s_matrix, cart2sph_2c};
