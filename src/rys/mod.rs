/// Boys function and Rys quadrature roots/weights.
///
/// Boys function:  F_m(t) = ∫₀¹ s^{2m} e^{-t·s²} ds
/// Rys roots uᵢ:  ∫₀¹ f(t²) e^{-x·t²} dt ≈ Σᵢ wᵢ · f(tᵢ²),  tᵢ² = uᵢ/(uᵢ+1)

const SQRTPIE4: f64 = 0.8862269254527580;

/// Largest quadrature order the moment method is used for.
pub const MXRYSROOTS: usize = 8;

/// Boys function: fills f[0..=mmax] with F_0(t)..F_mmax(t).
pub fn boys(f: &mut [f64], t: f64, mmax: usize) {
    const EPS: f64 = 1e-15;
    // Crossover between the downward series and the upward erf recursion.
    const TP: [f64; 40] = [
        0., 0., 0.866, 1.295, 1.705, 2.106, 2.501, 2.892, 3.280, 3.666,
        4.050, 4.433, 4.814, 5.194, 5.573, 5.951, 6.328, 6.704, 7.079, 7.454,
        7.827, 8.200, 8.572, 8.944, 9.315, 9.685,10.054,10.423,10.791,11.159,
       11.526,11.893,12.259,12.624,12.989,13.354,13.718,14.082,14.445,14.808,
    ];
    if t < 1e-15 {
        let mut b = 1.0_f64;
        for fm in f.iter_mut().take(mmax + 1) { *fm = 1.0 / b; b += 2.0; }
        return;
    }
    let tp = if mmax < TP.len() { TP[mmax] } else { 4.0 + mmax as f64 * 0.378 };
    if t <= tp {
        let e = 0.5 * (-t).exp();
        let mut b = mmax as f64 + 0.5;
        let mut x = e; let mut sum = e;
        loop { b += 1.0; x *= t / b; sum += x; if x <= EPS * e { break; } }
        f[mmax] = sum / (mmax as f64 + 0.5);
        let mut bi = mmax as f64 + 0.5;
        for i in (0..mmax).rev() { bi -= 1.0; f[i] = (e + t * f[i + 1]) / bi; }
    } else {
        let sr = t.sqrt();
        f[0] = SQRTPIE4 / sr * libm::erf(sr);
        let e = (-t).exp();
        let b = 0.5 / t;
        for i in 1..=mmax { f[i] = b * ((2 * i - 1) as f64 * f[i - 1] - e); }
    }
}

// Wheeler / modified-Chebyshev: Jacobi (tridiagonal) matrix from the moments.
fn build_jacobi(n: usize, mu: &[f64], alpha: &mut [f64], beta: &mut [f64]) {
    let len = 2 * n;
    let mut s = vec![vec![0.0_f64; len + 1]; n + 2];
    s[1][..len].copy_from_slice(&mu[..len]);
    alpha[0] = mu[1] / mu[0];
    beta[0] = 0.0;
    for j in 1..n {
        for k in j..(len - j) {
            s[j + 1][k] = s[j][k + 1]
                - alpha[j - 1] * s[j][k]
                - beta[j - 1] * s[j - 1][k];
        }
        if s[j + 1][j].abs() < 1e-300 { break; }
        alpha[j] = s[j + 1][j + 1] / s[j + 1][j]
            - s[j][j] / s[j][j - 1];
        beta[j] = s[j + 1][j] / s[j][j - 1];
    }
}

// Symmetric tridiagonal eigensolver, implicit-shift QL.
// d: diagonal in, eigenvalues out (ascending). e: subdiagonal, e[0] unused.
// Returns only the first row of the eigenvector matrix, which is all the
// quadrature weights need.
fn tql_first_row(d: &mut [f64], e: &mut [f64]) -> Result<Vec<f64>, &'static str> {
    let n = d.len();
    let mut z = vec![vec![0.0_f64; n]; n];
    for (i, row) in z.iter_mut().enumerate() { row[i] = 1.0; }
    for i in 1..n { e[i - 1] = e[i]; }
    e[n - 1] = 0.0;
    for l in 0..n {
        let mut iter = 0;
        loop {
            let m = (l..n - 1).find(|&m| {
                let dd = d[m].abs() + d[m + 1].abs();
                e[m].abs() <= f64::EPSILON * dd
            }).unwrap_or(n - 1);
            if m == l { break; }
            if iter == 64 {
                return Err("Rys eigensolver did not converge");
            }
            iter += 1;
            let g0 = (d[l + 1] - d[l]) / (2.0 * e[l]);
            let r0 = (g0 * g0 + 1.0).sqrt();
            let mut g = d[m] - d[l] + e[l] / (g0 + r0.copysign(g0));
            let (mut s, mut c, mut p) = (1.0_f64, 1.0_f64, 0.0_f64);
            let mut done = false;
            for i in (l..m).rev() {
                let f = s * e[i];
                let b = c * e[i];
                let r = (f * f + g * g).sqrt();
                e[i + 1] = r;
                if r.abs() < 1e-300 {
                    d[i + 1] -= p; e[m] = 0.0; done = true; break;
                }
                s = f / r; c = g / r;
                let ge = d[i + 1] - p;
                let r2 = (d[i] - ge) * s + 2.0 * c * b;
                p = s * r2;
                d[i + 1] = ge + p;
                g = c * r2 - b;
                for row in z.iter_mut() {
                    let fv = row[i + 1];
                    row[i + 1] = s * row[i] + c * fv;
                    row[i] = c * row[i] - s * fv;
                }
            }
            if !done { d[l] -= p; e[l] = g; e[m] = 0.0; }
        }
    }
    // ascending eigenvalues, first-row components follow
    let mut first: Vec<f64> = z[0].clone();
    for i in 0..n {
        let (mut k, mut p) = (i, d[i]);
        for j in i + 1..n { if d[j] < p { k = j; p = d[j]; } }
        if k != i {
            d[k] = d[i]; d[i] = p;
            first.swap(i, k);
        }
    }
    Ok(first)
}

/// Compute Rys quadrature nodes u[0..n] and weights w[0..n] for parameter x.
pub fn rys_roots(nroots: usize, x: f64, u: &mut [f64], w: &mut [f64]) -> Result<(), &'static str> {
    if nroots == 0 || nroots > MXRYSROOTS {
        return Err("unsupported number of Rys roots");
    }
    let mut mu = vec![0.0_f64; 2 * nroots];
    if x < 3e-7 {
        for (k, m) in mu.iter_mut().enumerate() {
            *m = 1.0 / (2 * k + 1) as f64 - x / (2 * k + 3) as f64;
        }
    } else {
        boys(&mut mu, x, 2 * nroots - 1);
    }
    rys_from_moments(nroots, &mu, u, w)
}

// nodes and weights from the moments μ_k = F_k(x)
fn rys_from_moments(n: usize, mu: &[f64], u: &mut [f64], w: &mut [f64]) -> Result<(), &'static str> {
    let mu0 = mu[0];
    if n == 1 {
        let t2 = (mu[1] / mu[0]).clamp(0.0, 1.0 - 1e-14);
        u[0] = t2 / (1.0 - t2).max(1e-300);
        w[0] = mu0;
        return Ok(());
    }
    let mut alpha = vec![0.0_f64; n];
    let mut beta  = vec![0.0_f64; n];
    build_jacobi(n, mu, &mut alpha, &mut beta);

    let mut d = alpha;
    let mut e: Vec<f64> = (0..n).map(|i| if i == 0 { 0.0 } else { beta[i].max(0.0).sqrt() }).collect();
    let first = tql_first_row(&mut d, &mut e)?;

    for i in 0..n {
        let t2 = d[i].clamp(0.0, 1.0 - 1e-14);
        u[i] = t2 / (1.0 - t2).max(1e-300);
        w[i] = mu0 * first[i] * first[i];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boys_f0_zero() {
        let mut f = [0.0_f64; 1];
        boys(&mut f, 0.0, 0);
        assert!((f[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn boys_downward_recurrence_holds() {
        // F_{m-1}(x) = (2x·F_m(x) + exp(-x)) / (2m-1)
        for &x in &[0.4_f64, 2.5, 17.0] {
            let mut f = [0.0_f64; 5];
            boys(&mut f, x, 4);
            let e = (-x).exp();
            for m in 1..=4_usize {
                let rhs = (2.0 * x * f[m] + e) / (2 * m - 1) as f64;
                assert!((f[m - 1] - rhs).abs() < 1e-12, "x={x} m={m}: {} vs {rhs}", f[m - 1]);
            }
        }
    }

    #[test]
    fn single_root_reproduces_first_two_moments() {
        let x = 1.5_f64;
        let mut u = [0.0_f64; 1]; let mut w = [0.0_f64; 1];
        rys_roots(1, x, &mut u, &mut w).unwrap();
        let mut f = [0.0_f64; 2];
        boys(&mut f, x, 1);
        assert!((w[0] - f[0]).abs() < 1e-12);
        let t2 = u[0] / (u[0] + 1.0);
        assert!((w[0] * t2 - f[1]).abs() < 1e-12);
    }

    // composite Simpson rule for ∫₀¹ s^{2m} e^{-t s²} ds
    fn boys_by_simpson(m: usize, t: f64) -> f64 {
        let n = 4000;
        let h = 1.0 / n as f64;
        let g = |s: f64| s.powi(2 * m as i32) * (-t * s * s).exp();
        let mut sum = g(0.0) + g(1.0);
        for i in 1..n {
            let c = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += c * g(i as f64 * h);
        }
        sum * h / 3.0
    }

    #[test]
    fn boys_matches_direct_integration() {
        for &t in &[0.01_f64, 0.3, 1.0, 3.0, 5.0] {
            for mmax in [0_usize, 1, 4, 9, 15] {
                let mut f = vec![0.0_f64; mmax + 1];
                boys(&mut f, t, mmax);
                for (m, &fm) in f.iter().enumerate() {
                    let r = boys_by_simpson(m, t);
                    assert!((fm - r).abs() < 1e-9 * r, "t={t} mmax={mmax} m={m}: {fm} vs {r}");
                }
            }
        }
    }

    #[test]
    fn quadrature_reproduces_boys_moments() {
        for n in 1..=MXRYSROOTS {
            for &x in &[0.01_f64, 0.3, 2.0, 7.5] {
                let mut u = vec![0.0; n]; let mut w = vec![0.0; n];
                rys_roots(n, x, &mut u, &mut w).unwrap();
                let mut f = vec![0.0; 2 * n];
                boys(&mut f, x, 2 * n - 1);
                // the moment method loses accuracy with the number of roots
                let tol = 1e-13 * 10f64.powi(n as i32);
                for (k, &fk) in f.iter().enumerate() {
                    let q: f64 = (0..n).map(|i| w[i] * (u[i] / (u[i] + 1.0)).powi(k as i32)).sum();
                    assert!((q - fk).abs() < tol * fk, "n={n} x={x} k={k}: {q} vs {fk}");
                }
            }
        }
    }

    #[test]
    fn too_many_roots_is_an_error() {
        let mut u = [0.0; 9]; let mut w = [0.0; 9];
        assert!(rys_roots(9, 1.0, &mut u, &mut w).is_err());
    }
}
