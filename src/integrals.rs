//! Caller-facing entry points for one-electron two-center integrals.

use ndarray::ArrayD;

use crate::dispatch::Intor;
use crate::error::{CintError, Result};
use crate::grad::{GradRequest, Int2cBackward};
use crate::layout::CompactLayout;
use crate::names::IntegralFamily;
use crate::session::CintSession;

/// Evaluate `family` over the bra and ket views in `layouts` (a single view
/// serves as both). The result has shape `[components..., nao0, nao1]`.
pub fn evaluate_integral(
    session: &CintSession,
    family: &IntegralFamily,
    layouts: &[CompactLayout],
    hermitian: bool,
) -> Result<ArrayD<f64>> {
    Intor::new(session, family, layouts, hermitian)?.calc()
}

/// Like [`evaluate_integral`], also returning the record that propagates an
/// upstream gradient to the parameters selected in `request`.
pub fn evaluate_integral_with_gradients(
    session: &CintSession,
    family: &IntegralFamily,
    layouts: &[CompactLayout],
    hermitian: bool,
    request: GradRequest,
) -> Result<(ArrayD<f64>, Int2cBackward)> {
    let value = evaluate_integral(session, family, layouts, hermitian)?;
    let backward = Int2cBackward::new(layouts, family, hermitian, request, value.shape().to_vec())?;
    Ok((value, backward))
}

/// `other` defaults to `wrapper`; when given it must address the same tables.
fn check_and_set(wrapper: &CompactLayout, other: Option<&CompactLayout>) -> Result<CompactLayout> {
    match other {
        None => Ok(wrapper.clone()),
        Some(o) if o.shares_tables(wrapper) => Ok(o.clone()),
        Some(o) => Err(CintError::IdentityMismatch(format!(
            "{o} is not a view of the tables behind {wrapper}"
        ))),
    }
}

/// One-electron integral `int1e_<shortname>` between `wrapper` and `other`.
pub fn int1e(
    session: &CintSession,
    shortname: &str,
    wrapper: &CompactLayout,
    other: Option<&CompactLayout>,
    hermitian: bool,
) -> Result<ArrayD<f64>> {
    let other = check_and_set(wrapper, other)?;
    let family = IntegralFamily::int1e(shortname);
    evaluate_integral(session, &family, &[wrapper.clone(), other], hermitian)
}

pub fn overlap(session: &CintSession, wrapper: &CompactLayout, other: Option<&CompactLayout>) -> Result<ArrayD<f64>> {
    int1e(session, "ovlp", wrapper, other, true)
}

pub fn kinetic(session: &CintSession, wrapper: &CompactLayout, other: Option<&CompactLayout>) -> Result<ArrayD<f64>> {
    int1e(session, "kin", wrapper, other, true)
}

/// Attraction to every nucleus of the layout, point charges `-Z`.
pub fn nuclear(session: &CintSession, wrapper: &CompactLayout, other: Option<&CompactLayout>) -> Result<ArrayD<f64>> {
    int1e(session, "nuc", wrapper, other, true)
}

/// `<i| 1/|r - R0| |j>` with `R0` the layout's current `rinv` origin; see
/// [`CompactLayout::with_rinv_origin`].
pub fn rinv(session: &CintSession, wrapper: &CompactLayout, other: Option<&CompactLayout>) -> Result<ArrayD<f64>> {
    int1e(session, "rinv", wrapper, other, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{AtomBasis, Shell};
    use crate::layout::LayoutOptions;

    fn water_like(session: &CintSession) -> CompactLayout {
        let atoms = vec![
            AtomBasis::new(8u32, [0.0, 0.0, 0.0], vec![
                Shell::new(0, vec![5.0, 1.2], vec![0.4, 0.7]).normalized().unwrap(),
                Shell::new(1, vec![1.1], vec![1.0]).normalized().unwrap(),
            ]),
            AtomBasis::new(1u32, [0.0, 1.4, 1.1], vec![Shell::new(0, vec![0.9], vec![1.0]).normalized().unwrap()]),
        ];
        CompactLayout::build(session, &atoms, LayoutOptions::default(), None).unwrap()
    }

    #[test]
    fn overlap_is_symmetric_with_unit_diagonal() {
        let session = CintSession::new();
        let l = water_like(&session);
        let s = overlap(&session, &l, None).unwrap();
        assert_eq!(s.shape(), &[5, 5]);
        for i in 0..5 {
            assert!((s[[i, i]] - 1.0).abs() < 1e-10);
            for j in 0..5 {
                assert!((s[[i, j]] - s[[j, i]]).abs() < 1e-13);
            }
        }
    }

    #[test]
    fn nuclear_attraction_is_negative_on_the_diagonal() {
        let session = CintSession::new();
        let l = water_like(&session);
        let v = nuclear(&session, &l, None).unwrap();
        let t = kinetic(&session, &l, None).unwrap();
        for i in 0..5 {
            assert!(v[[i, i]] < 0.0);
            assert!(t[[i, i]] > 0.0);
        }
    }

    #[test]
    fn other_view_must_share_tables() {
        let session = CintSession::new();
        let a = water_like(&session);
        let b = water_like(&session);
        let err = overlap(&session, &a, Some(&b)).err().unwrap();
        assert!(matches!(err, CintError::IdentityMismatch(_)));

        let sub = a.subset(2..3).unwrap();
        let s = overlap(&session, &a, Some(&sub)).unwrap();
        assert_eq!(s.shape(), &[5, 1]);
    }

    #[test]
    fn rinv_at_a_nucleus_matches_nuclear_for_one_atom() {
        let session = CintSession::new();
        let atoms = vec![AtomBasis::new(
            3u32,
            [0.2, -0.1, 0.4],
            vec![Shell::new(0, vec![0.8], vec![1.0]), Shell::new(1, vec![0.5], vec![1.0])],
        )];
        let l = CompactLayout::build(&session, &atoms, LayoutOptions::default(), None).unwrap();
        let v = nuclear(&session, &l, None).unwrap();
        let r = l.with_rinv_origin([0.2, -0.1, 0.4], |l| rinv(&session, l, None)).unwrap();
        for (a, b) in v.iter().zip(r.iter()) {
            assert!((a + 3.0 * b).abs() < 1e-12);
        }
        assert_eq!(l.rinv_origin(), [0.0; 3]);
    }
}
