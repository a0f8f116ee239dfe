//! Backward passes checked against central finite differences of a weighted
//! sum of the integral matrix.

use approx::assert_abs_diff_eq;
use ndarray::ArrayD;

use libcint_grad::{
    evaluate_integral, evaluate_integral_with_gradients, AtomBasis, CintSession, CompactLayout,
    GradRequest, IntegralFamily, LayoutOptions, LayoutOptionsBuilder, Shell,
};

const H: f64 = 1e-5;

fn molecule() -> Vec<AtomBasis> {
    vec![
        AtomBasis::new(
            8u32,
            [0.0, 0.1, -0.2],
            vec![
                Shell::new(0, vec![3.4, 0.9], vec![0.45, 0.62]),
                Shell::new(1, vec![1.6, 0.5], vec![0.8, 0.3]),
            ],
        ),
        AtomBasis::new(
            1u32,
            [0.3, 1.2, 0.9],
            vec![Shell::new(0, vec![1.1, 0.35], vec![0.7, 0.4]), Shell::new(2, vec![0.8], vec![1.0])],
        ),
    ]
}

fn build(session: &CintSession, atoms: &[AtomBasis], spherical: bool) -> CompactLayout {
    let options = LayoutOptionsBuilder::default().spherical(spherical).build().unwrap();
    CompactLayout::build(session, atoms, options, None).unwrap()
}

fn weights(shape: &[usize]) -> ArrayD<f64> {
    let n: usize = shape.iter().product();
    ArrayD::from_shape_vec(shape.to_vec(), (0..n).map(|k| (1.0 + 0.37 * k as f64).sin()).collect())
        .unwrap()
}

/// `Σ w ⊙ f(layout)` where the bra is the whole basis and the ket the shells
/// `ket` of it.
fn loss(
    session: &CintSession,
    atoms: &[AtomBasis],
    family: &IntegralFamily,
    ket: Option<std::ops::Range<usize>>,
    w: &ArrayD<f64>,
    origin: [f64; 3],
) -> f64 {
    let l = build(session, atoms, true);
    let views = match ket {
        Some(r) => vec![l.clone(), l.subset(r).unwrap()],
        None => vec![l.clone()],
    };
    let v = l.with_rinv_origin(origin, |_| evaluate_integral(session, family, &views, true)).unwrap();
    (&v * w).sum()
}

fn perturbed(atoms: &[AtomBasis], f: impl Fn(&mut Vec<AtomBasis>)) -> Vec<AtomBasis> {
    let mut out = atoms.to_vec();
    f(&mut out);
    out
}

// every (atom, shell, primitive) in primitive order
fn primitives(atoms: &[AtomBasis]) -> Vec<(usize, usize, usize)> {
    let mut out = Vec::new();
    for (ia, atom) in atoms.iter().enumerate() {
        for (ish, sh) in atom.bases.iter().enumerate() {
            for ip in 0..sh.nprim() {
                out.push((ia, ish, ip));
            }
        }
    }
    out
}

/// `positions = false` skips the position channel, for families whose
/// operator moves with the nuclei.
fn check_family(shortname: &str, ket: Option<std::ops::Range<usize>>, origin: [f64; 3], positions: bool) {
    let session = CintSession::new();
    let atoms = molecule();
    let family = IntegralFamily::int1e(shortname);
    let l = build(&session, &atoms, true);
    let views = match ket.clone() {
        Some(r) => vec![l.clone(), l.subset(r).unwrap()],
        None => vec![l.clone()],
    };
    let (value, backward) = l
        .with_rinv_origin(origin, |_| {
            evaluate_integral_with_gradients(&session, &family, &views, true, GradRequest::all())
        })
        .unwrap();
    let w = weights(value.shape());
    let grads = backward.backward(&session, w.view()).unwrap();
    let fd = |f: &dyn Fn(&mut Vec<AtomBasis>, f64)| {
        let plus = perturbed(&atoms, |a| f(a, H));
        let minus = perturbed(&atoms, |a| f(a, -H));
        (loss(&session, &plus, &family, ket.clone(), &w, origin)
            - loss(&session, &minus, &family, ket.clone(), &w, origin))
            / (2.0 * H)
    };

    let dpos = grads.positions.unwrap();
    assert_eq!(dpos.dim(), (2, 3));
    if positions {
        for ia in 0..2 {
            for d in 0..3 {
                let num = fd(&|a: &mut Vec<AtomBasis>, h: f64| a[ia].pos[d] += h);
                assert_abs_diff_eq!(dpos[[ia, d]], num, epsilon = 1e-6 * (1.0 + num.abs()));
            }
        }
    }

    let dcoef = grads.coefficients.unwrap();
    let dexp = grads.exponents.unwrap();
    let prims = primitives(&atoms);
    assert_eq!(dcoef.len(), prims.len());
    assert_eq!(dexp.len(), prims.len());
    for (k, &(ia, ish, ip)) in prims.iter().enumerate() {
        let num = fd(&|a: &mut Vec<AtomBasis>, h: f64| a[ia].bases[ish].coeffs[ip] += h);
        assert_abs_diff_eq!(dcoef[k], num, epsilon = 1e-6 * (1.0 + num.abs()));
        let num = fd(&|a: &mut Vec<AtomBasis>, h: f64| a[ia].bases[ish].alphas[ip] += h);
        assert_abs_diff_eq!(dexp[k], num, epsilon = 1e-6 * (1.0 + num.abs()));
    }

    // rinv origin restored after the backward pass
    assert_eq!(l.rinv_origin(), [0.0; 3]);
}

#[test]
fn overlap_gradients() {
    check_family("ovlp", None, [0.0; 3], true);
}

#[test]
fn kinetic_gradients() {
    check_family("kin", None, [0.0; 3], true);
}

#[test]
fn rectangular_overlap_gradients() {
    check_family("ovlp", Some(1..3), [0.0; 3], true);
}

#[test]
fn rinv_gradients_use_the_forward_origin() {
    check_family("rinv", Some(0..2), [0.4, -0.3, 0.5], true);
}

#[test]
fn nuclear_coefficient_and_exponent_gradients() {
    check_family("nuc", None, [0.0; 3], false);
    check_family("nuc", Some(2..4), [0.0; 3], false);
}

#[test]
fn rinv_gradients_on_the_full_basis() {
    check_family("rinv", None, [-0.2, 0.6, 0.1], true);
}

#[test]
fn overlap_position_gradient_is_translation_invariant() {
    let session = CintSession::new();
    let l = build(&session, &molecule(), false);
    let family = IntegralFamily::int1e("ovlp");
    let (value, backward) = evaluate_integral_with_gradients(
        &session,
        &family,
        &[l],
        true,
        GradRequest { positions: true, ..Default::default() },
    )
    .unwrap();
    let grads = backward.backward(&session, weights(value.shape()).view()).unwrap();
    assert!(grads.coefficients.is_none() && grads.exponents.is_none());
    let total = grads.positions.unwrap().sum_axis(ndarray::Axis(0));
    for d in 0..3 {
        assert_abs_diff_eq!(total[d], 0.0, epsilon = 1e-12);
    }
}

#[test]
fn uncontracted_overlap_recontracts() {
    let session = CintSession::new();
    let l = build(&session, &molecule(), true);
    let s = evaluate_integral(&session, &IntegralFamily::int1e("ovlp"), &[l.clone()], true).unwrap();
    let (u, map) = l.derive_uncontracted().unwrap();
    assert_eq!(u.nshells(), primitives(&molecule()).len());
    assert_eq!(map.len(), u.nao());
    let su = evaluate_integral(&session, &IntegralFamily::int1e("ovlp"), &[u], true).unwrap();
    let mut back = ndarray::Array2::<f64>::zeros((l.nao(), l.nao()));
    for (a, &ia) in map.iter().enumerate() {
        for (b, &ib) in map.iter().enumerate() {
            back[[ia, ib]] += su[[a, b]];
        }
    }
    for i in 0..l.nao() {
        for j in 0..l.nao() {
            assert_abs_diff_eq!(back[[i, j]], s[[i, j]], epsilon = 1e-12);
        }
    }
}

#[test]
fn options_default_to_spherical() {
    let session = CintSession::new();
    let l = CompactLayout::build(&session, &molecule(), LayoutOptions::default(), None).unwrap();
    assert!(l.spherical());
    assert_eq!(l.nao(), 1 + 3 + 1 + 5);
    let c = build(&session, &molecule(), false);
    assert_eq!(c.nao(), 1 + 3 + 1 + 6);
}
