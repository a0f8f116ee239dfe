//! Conversion of a caller-side basis into the libcint atm/bas/env tables.
//!
//! A [`CompactLayout`] is a cheap handle on one set of shared tables plus the
//! shell range the handle addresses. Several views over the same tables are
//! what a multi-operand integral call expects; identity of the tables (not
//! equality of their values) is what makes two views compatible.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use tracing::debug;

use crate::basis::{AtomBasis, Shell};
use crate::error::{CintError, Result};
use crate::int1e::driver::RawTables;
use crate::native::NativeLibrary;
use crate::optimizer::CintOpt;
use crate::session::CintSession;
use crate::types::{
    ANG_MAX, ANG_OF, ATM_SLOTS, ATOM_OF, BAS_SLOTS, CHARGE_OF, KAPPA_OF, NCTR_OF, NDIM, NPRIM_OF,
    NUC_MOD_OF, POINT_NUC, PTR_COEFF, PTR_COORD, PTR_ENV_START, PTR_EXP, PTR_EXPCUTOFF,
    PTR_RINV_ORIG, PTR_ZETA,
};

#[non_exhaustive]
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct LayoutOptions {
    /// Spherical (`true`) or cartesian AOs.
    #[builder(default = true)]
    pub spherical: bool,

    /// Written into `env[PTR_EXPCUTOFF]`; `None` keeps the library default.
    #[builder(default = "None")]
    pub expcutoff: Option<f64>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions { spherical: true, expcutoff: None }
    }
}

/// Externally computed AO indexing, used instead of the maps derived from the
/// native AO counts.
pub trait IndexHelper {
    fn nshells(&self) -> usize;
    /// Cumulative AO offsets, length `nshells + 1`.
    fn shell_to_aoloc(&self, spherical: bool) -> Vec<usize>;
    fn ao_to_shell(&self, spherical: bool) -> Vec<usize>;
    fn ao_to_atom(&self, spherical: bool) -> Vec<usize>;
}

struct IndexMaps {
    shell_to_aoloc: Vec<usize>,
    ao_to_shell: Vec<usize>,
    ao_to_atom: Vec<usize>,
}

struct Tables {
    atm: Vec<i32>,
    bas: Vec<i32>,
    env: RefCell<Vec<f64>>,
    atombases: Vec<AtomBasis>,
    options: LayoutOptions,
    library: Arc<NativeLibrary>,
    fracz: bool,
    maps: IndexMaps,
    ngauss_at_shell: Vec<usize>,
    coefficients: Array1<f64>,
    exponents: Array1<f64>,
    positions: Array2<f64>,
    optimizers: RefCell<HashMap<String, Rc<CintOpt>>>,
    uncontracted: OnceCell<CompactLayout>,
}

struct LayoutInner {
    tables: Rc<Tables>,
    shells: Range<usize>,
    uncontracted: OnceCell<(CompactLayout, Vec<usize>)>,
}

/// View over shared atm/bas/env tables.
#[derive(Clone)]
pub struct CompactLayout {
    inner: Rc<LayoutInner>,
}

fn validate(atoms: &[AtomBasis], options: &LayoutOptions) -> Result<()> {
    if atoms.is_empty() {
        return Err(CintError::invalid("a layout needs at least one atom"));
    }
    if let Some(cut) = options.expcutoff {
        if !(cut.is_finite() && cut > 0.0) {
            return Err(CintError::invalid(format!("expcutoff must be positive, got {cut}")));
        }
    }
    for (iatom, atom) in atoms.iter().enumerate() {
        if atom.pos.len() != NDIM {
            return Err(CintError::invalid(format!(
                "atom {iatom}: the position is expected to have {NDIM} cartesian components, but {} were found",
                atom.pos.len()
            )));
        }
        if atom.pos.iter().any(|x| !x.is_finite()) {
            return Err(CintError::invalid(format!("atom {iatom}: non-finite position")));
        }
        let z = atom.atomz.value();
        if !(z.is_finite() && z >= 0.0 && z <= i32::MAX as f64) {
            return Err(CintError::invalid(format!("atom {iatom}: invalid atomic number {z}")));
        }
        for (ish, shell) in atom.bases.iter().enumerate() {
            validate_shell(shell).map_err(|msg| {
                CintError::invalid(format!("atom {iatom}, shell {ish}: {msg}"))
            })?;
        }
    }
    Ok(())
}

fn validate_shell(shell: &Shell) -> std::result::Result<(), String> {
    if shell.alphas.len() != shell.coeffs.len() {
        return Err(format!(
            "the number of exponents ({}) and coefficients ({}) must be the same",
            shell.alphas.len(),
            shell.coeffs.len()
        ));
    }
    if shell.alphas.is_empty() {
        return Err("a shell needs at least one primitive".to_string());
    }
    if shell.angmom > ANG_MAX {
        return Err(format!("angular momentum {} exceeds {ANG_MAX}", shell.angmom));
    }
    if shell.alphas.iter().any(|a| !(a.is_finite() && *a > 0.0)) {
        return Err("exponents must be positive and finite".to_string());
    }
    if shell.coeffs.iter().any(|c| !c.is_finite()) {
        return Err("coefficients must be finite".to_string());
    }
    Ok(())
}

fn check_helper(
    helper: &dyn IndexHelper,
    native: &IndexMaps,
    natoms: usize,
    spherical: bool,
) -> Result<IndexMaps> {
    let nshells = native.shell_to_aoloc.len() - 1;
    if helper.nshells() != nshells {
        return Err(CintError::invalid(format!(
            "index helper describes {} shells, the basis has {nshells}",
            helper.nshells()
        )));
    }
    let shell_to_aoloc = helper.shell_to_aoloc(spherical);
    if shell_to_aoloc.len() != nshells + 1 || shell_to_aoloc[0] != 0 {
        return Err(CintError::invalid("index helper AO offsets must start at 0 and have nshells+1 entries"));
    }
    for ish in 0..nshells {
        let got = shell_to_aoloc[ish + 1].checked_sub(shell_to_aoloc[ish]);
        let want = native.shell_to_aoloc[ish + 1] - native.shell_to_aoloc[ish];
        if got != Some(want) {
            return Err(CintError::invalid(format!(
                "index helper gives shell {ish} {got:?} AOs, the library counts {want}"
            )));
        }
    }
    let nao = shell_to_aoloc[nshells];
    let ao_to_shell = helper.ao_to_shell(spherical);
    let ao_to_atom = helper.ao_to_atom(spherical);
    if ao_to_shell.len() != nao || ao_to_atom.len() != nao {
        return Err(CintError::invalid(format!(
            "index helper AO maps have {} and {} entries, expected {nao}",
            ao_to_shell.len(),
            ao_to_atom.len()
        )));
    }
    if ao_to_shell.iter().any(|&s| s >= nshells) || ao_to_atom.iter().any(|&a| a >= natoms) {
        return Err(CintError::invalid("index helper AO maps point outside the basis"));
    }
    Ok(IndexMaps { shell_to_aoloc, ao_to_shell, ao_to_atom })
}

impl Tables {
    fn build(
        library: Arc<NativeLibrary>,
        atoms: &[AtomBasis],
        options: LayoutOptions,
        helper: Option<&dyn IndexHelper>,
    ) -> Result<Tables> {
        validate(atoms, &options)?;

        let mut ptr_env = PTR_ENV_START;
        let mut atm = Vec::with_capacity(atoms.len() * ATM_SLOTS);
        let mut bas = Vec::new();
        let mut env = vec![0.0f64; PTR_ENV_START];
        let mut shell_to_atom = Vec::new();
        let mut ngauss_at_shell = Vec::new();
        let mut coefficients = Vec::new();
        let mut exponents = Vec::new();
        let mut positions = Array2::<f64>::zeros((atoms.len(), NDIM));
        let mut fracz = false;

        if let Some(cut) = options.expcutoff {
            env[PTR_EXPCUTOFF] = cut;
        }

        for (iatom, atom) in atoms.iter().enumerate() {
            let mut row = [0i32; ATM_SLOTS];
            row[CHARGE_OF] = atom.atomz.value() as i32;
            row[PTR_COORD] = ptr_env as i32;
            row[NUC_MOD_OF] = POINT_NUC;
            row[PTR_ZETA] = (ptr_env + NDIM) as i32;
            atm.extend_from_slice(&row);
            env.extend_from_slice(&atom.pos);
            env.push(0.0);
            ptr_env += NDIM + 1;
            fracz |= atom.atomz.is_fractional();
            for d in 0..NDIM {
                positions[[iatom, d]] = atom.pos[d];
            }

            for shell in &atom.bases {
                let ngauss = shell.nprim();
                let mut row = [0i32; BAS_SLOTS];
                row[ATOM_OF] = iatom as i32;
                row[ANG_OF] = shell.angmom as i32;
                row[NPRIM_OF] = ngauss as i32;
                row[NCTR_OF] = 1;
                row[KAPPA_OF] = 0;
                row[PTR_EXP] = ptr_env as i32;
                row[PTR_COEFF] = (ptr_env + ngauss) as i32;
                bas.extend_from_slice(&row);
                env.extend_from_slice(&shell.alphas);
                env.extend_from_slice(&shell.coeffs);
                ptr_env += 2 * ngauss;

                exponents.extend_from_slice(&shell.alphas);
                coefficients.extend_from_slice(&shell.coeffs);
                ngauss_at_shell.push(ngauss);
                shell_to_atom.push(iatom);
            }
        }

        let nshells = ngauss_at_shell.len();
        let mut native = IndexMaps {
            shell_to_aoloc: Vec::with_capacity(nshells + 1),
            ao_to_shell: Vec::new(),
            ao_to_atom: Vec::new(),
        };
        native.shell_to_aoloc.push(0);
        for ish in 0..nshells {
            let nao = library.cgto_count(&bas, ish, options.spherical);
            let last = native.shell_to_aoloc[ish];
            native.shell_to_aoloc.push(last + nao);
            native.ao_to_shell.extend(std::iter::repeat(ish).take(nao));
            native.ao_to_atom.extend(std::iter::repeat(shell_to_atom[ish]).take(nao));
        }
        let maps = match helper {
            Some(h) => check_helper(h, &native, atoms.len(), options.spherical)?,
            None => native,
        };

        debug_assert_eq!(atm.len(), atoms.len() * ATM_SLOTS);
        debug_assert_eq!(bas.len(), nshells * BAS_SLOTS);
        debug!(
            natoms = atoms.len(),
            nshells,
            nao = maps.shell_to_aoloc[nshells],
            nenv = env.len(),
            spherical = options.spherical,
            fracz,
            "built compact layout"
        );

        Ok(Tables {
            atm,
            bas,
            env: RefCell::new(env),
            atombases: atoms.to_vec(),
            options,
            library,
            fracz,
            maps,
            ngauss_at_shell,
            coefficients: Array1::from(coefficients),
            exponents: Array1::from(exponents),
            positions,
            optimizers: RefCell::new(HashMap::new()),
            uncontracted: OnceCell::new(),
        })
    }

    fn nshells(&self) -> usize {
        self.ngauss_at_shell.len()
    }

    // every K-primitive shell split into K one-primitive shells
    fn uncontracted_atoms(&self) -> Vec<AtomBasis> {
        self.atombases
            .iter()
            .map(|atom| AtomBasis {
                atomz: atom.atomz,
                pos: atom.pos.clone(),
                bases: atom
                    .bases
                    .iter()
                    .flat_map(|sh| {
                        sh.alphas
                            .iter()
                            .zip(&sh.coeffs)
                            .map(move |(&a, &c)| Shell::new(sh.angmom, vec![a], vec![c]))
                    })
                    .collect(),
            })
            .collect()
    }
}

impl CompactLayout {
    /// Build the tables and the full view over them.
    pub fn build(
        session: &CintSession,
        atoms: &[AtomBasis],
        options: LayoutOptions,
        helper: Option<&dyn IndexHelper>,
    ) -> Result<CompactLayout> {
        let tables = Tables::build(session.library_handle(), atoms, options, helper)?;
        let nshells = tables.nshells();
        Ok(CompactLayout::view(Rc::new(tables), 0..nshells))
    }

    fn view(tables: Rc<Tables>, shells: Range<usize>) -> CompactLayout {
        CompactLayout {
            inner: Rc::new(LayoutInner { tables, shells, uncontracted: OnceCell::new() }),
        }
    }

    /// View over the shells `shells` (absolute indices) of the same tables.
    pub fn subset(&self, shells: Range<usize>) -> Result<CompactLayout> {
        let n = self.tables().nshells();
        if shells.start > shells.end || shells.end > n {
            return Err(CintError::invalid(format!(
                "shell range {shells:?} is outside the {n} shells of the tables"
            )));
        }
        Ok(CompactLayout::view(Rc::clone(&self.inner.tables), shells))
    }

    fn tables(&self) -> &Tables {
        &self.inner.tables
    }

    /// Same view object.
    pub fn is_same_view(&self, other: &CompactLayout) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Both views address the identical atm/bas/env tables.
    pub fn shares_tables(&self, other: &CompactLayout) -> bool {
        Rc::ptr_eq(&self.inner.tables, &other.inner.tables)
    }

    pub fn natoms(&self) -> usize {
        self.tables().atombases.len()
    }

    /// Number of shells in this view.
    pub fn nshells(&self) -> usize {
        self.inner.shells.len()
    }

    pub fn shell_idxs(&self) -> (usize, usize) {
        (self.inner.shells.start, self.inner.shells.end)
    }

    pub fn ao_idxs(&self) -> (usize, usize) {
        let loc = &self.tables().maps.shell_to_aoloc;
        (loc[self.inner.shells.start], loc[self.inner.shells.end])
    }

    pub fn nao(&self) -> usize {
        let (a0, a1) = self.ao_idxs();
        a1 - a0
    }

    /// Absolute atom index of every AO of this view.
    pub fn ao_to_atom(&self) -> &[usize] {
        let (a0, a1) = self.ao_idxs();
        &self.tables().maps.ao_to_atom[a0..a1]
    }

    /// Absolute shell index of every AO of this view.
    pub fn ao_to_shell(&self) -> &[usize] {
        let (a0, a1) = self.ao_idxs();
        &self.tables().maps.ao_to_shell[a0..a1]
    }

    pub fn full_shell_to_aoloc(&self) -> &[usize] {
        &self.tables().maps.shell_to_aoloc
    }

    pub fn full_ao_to_atom(&self) -> &[usize] {
        &self.tables().maps.ao_to_atom
    }

    pub fn full_ao_to_shell(&self) -> &[usize] {
        &self.tables().maps.ao_to_shell
    }

    /// Primitive count of every shell of the tables.
    pub fn ngauss_at_shell(&self) -> &[usize] {
        &self.tables().ngauss_at_shell
    }

    /// `(coefficients, exponents, positions)` of the whole tables: one entry
    /// per primitive for the first two, `(natoms, 3)` for the positions.
    pub fn params(&self) -> (&Array1<f64>, &Array1<f64>, &Array2<f64>) {
        let t = self.tables();
        (&t.coefficients, &t.exponents, &t.positions)
    }

    /// Some atom was given a fractional atomic number. Informational only;
    /// `atm` always holds the integer part.
    pub fn fracz(&self) -> bool {
        self.tables().fracz
    }

    pub fn spherical(&self) -> bool {
        self.tables().options.spherical
    }

    pub fn atombases(&self) -> &[AtomBasis] {
        &self.tables().atombases
    }

    pub fn atm(&self) -> &[i32] {
        &self.tables().atm
    }

    pub fn bas(&self) -> &[i32] {
        &self.tables().bas
    }

    /// Copy of `env` as it is now; the `rinv` origin may move later.
    pub fn env(&self) -> Vec<f64> {
        self.tables().env.borrow().clone()
    }

    /// Run `f` on the raw tables. `env` stays borrowed for the duration.
    pub(crate) fn with_raw_tables<R>(&self, f: impl FnOnce(RawTables<'_>) -> R) -> R {
        let t = self.tables();
        let env = t.env.borrow();
        f(RawTables { atm: &t.atm, bas: &t.bas, env: &env })
    }

    /// Optimizer `name` of these tables, built on first request.
    pub(crate) fn optimizer(&self, name: &str, build: impl FnOnce(RawTables<'_>) -> CintOpt) -> Rc<CintOpt> {
        if let Some(opt) = self.tables().optimizers.borrow().get(name) {
            return Rc::clone(opt);
        }
        let opt = Rc::new(self.with_raw_tables(build));
        debug!(optimizer = name, nbas = opt.nbas(), "created optimizer");
        self.tables().optimizers.borrow_mut().insert(name.to_string(), Rc::clone(&opt));
        opt
    }

    pub fn rinv_origin(&self) -> [f64; NDIM] {
        let env = self.tables().env.borrow();
        [env[PTR_RINV_ORIG], env[PTR_RINV_ORIG + 1], env[PTR_RINV_ORIG + 2]]
    }

    fn set_rinv_origin(&self, r: [f64; NDIM]) {
        self.tables().env.borrow_mut()[PTR_RINV_ORIG..PTR_RINV_ORIG + NDIM].copy_from_slice(&r);
    }

    /// Evaluate `f` with the `rinv` operator centred on `r`.
    ///
    /// The previous origin is restored when `f` returns or unwinds. Every view
    /// over the same tables sees the moved origin while `f` runs.
    pub fn with_rinv_origin<F, R>(&self, r: [f64; NDIM], f: F) -> R
    where
        F: FnOnce(&CompactLayout) -> R,
    {
        struct Restore<'a> {
            layout: &'a CompactLayout,
            previous: [f64; NDIM],
        }
        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.layout.set_rinv_origin(self.previous);
            }
        }

        let _guard = Restore { layout: self, previous: self.rinv_origin() };
        self.set_rinv_origin(r);
        f(self)
    }

    /// Uncontracted counterpart of this view and the map from each of its AOs
    /// to the AO of this view it was split from.
    ///
    /// All views over the same tables share one set of uncontracted tables.
    pub fn derive_uncontracted(&self) -> Result<(CompactLayout, Vec<usize>)> {
        if let Some((u, map)) = self.inner.uncontracted.get() {
            return Ok((u.clone(), map.clone()));
        }
        let tables = self.tables();
        let full = match tables.uncontracted.get() {
            Some(u) => u.clone(),
            None => {
                let atoms = tables.uncontracted_atoms();
                let utables = Tables::build(
                    Arc::clone(&tables.library),
                    &atoms,
                    tables.options.clone(),
                    None,
                )?;
                let n = utables.nshells();
                let u = CompactLayout::view(Rc::new(utables), 0..n);
                let _ = tables.uncontracted.set(u.clone());
                u
            }
        };

        let (s0, s1) = self.shell_idxs();
        let loc = &tables.maps.shell_to_aoloc;
        let ngauss = &tables.ngauss_at_shell;
        let u0: usize = ngauss[..s0].iter().sum();
        let u1: usize = u0 + ngauss[s0..s1].iter().sum::<usize>();
        let mut uao2ao = Vec::new();
        let mut idx_ao = 0;
        for ish in s0..s1 {
            let nao = loc[ish + 1] - loc[ish];
            for _ in 0..ngauss[ish] {
                uao2ao.extend(idx_ao..idx_ao + nao);
            }
            idx_ao += nao;
        }
        let view = if (u0, u1) == full.shell_idxs() { full } else { full.subset(u0..u1)? };
        debug!(nao = self.nao(), nuao = uao2ao.len(), "derived uncontracted layout");
        let _ = self.inner.uncontracted.set((view.clone(), uao2ao.clone()));
        Ok((view, uao2ao))
    }
}

impl fmt::Display for CompactLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactLayout(nat={}, nsh={}, nao={})", self.natoms(), self.nshells(), self.nao())
    }
}

impl fmt::Debug for CompactLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::AtomZ;
    use crate::types::{AtmSlot, BasSlot, Env};

    fn h2o_like() -> Vec<AtomBasis> {
        vec![
            AtomBasis::new(
                8u32,
                [0.0, 0.0, 0.2],
                vec![
                    Shell::new(0, vec![5.0, 1.2, 0.3], vec![0.2, 0.5, 0.4]),
                    Shell::new(1, vec![1.1, 0.3], vec![0.6, 0.5]),
                    Shell::new(2, vec![0.8], vec![1.0]),
                ],
            ),
            AtomBasis::new(1.5f64, [0.0, 1.4, -0.8], vec![Shell::new(0, vec![1.3, 0.2], vec![0.4, 0.7])]),
        ]
    }

    fn build(spherical: bool) -> CompactLayout {
        let opts = LayoutOptionsBuilder::default().spherical(spherical).build().unwrap();
        CompactLayout::build(&CintSession::new(), &h2o_like(), opts, None).unwrap()
    }

    #[test]
    fn tables_follow_libcint_layout() {
        let l = build(true);
        let env = l.env();
        let a1 = AtmSlot::new(l.atm(), 1);
        assert_eq!(a1.charge(), 1);
        assert_eq!(a1.nuc_mod(), POINT_NUC);
        assert_eq!(Env::new(&env).coords(a1.ptr_coord()), [0.0, 1.4, -0.8]);
        assert_eq!(env[a1.ptr_coord() + 3], 0.0);

        let b1 = BasSlot::new(l.bas(), 1);
        assert_eq!((b1.atom_of(), b1.ang_of(), b1.nprim_of(), b1.nctr_of()), (0, 1, 2, 1));
        assert_eq!(Env::new(&env).exps(b1.ptr_exp(), 2), &[1.1, 0.3]);
        assert_eq!(Env::new(&env).coeffs(b1.ptr_coeff(), 2, 1), &[0.6, 0.5]);
        assert_eq!(b1.ptr_coeff(), b1.ptr_exp() + 2);
        assert!(l.fracz());
    }

    #[test]
    fn ao_maps_sum_native_counts() {
        for (spherical, nao) in [(true, 1 + 3 + 5 + 1), (false, 1 + 3 + 6 + 1)] {
            let l = build(spherical);
            assert_eq!(l.nao(), nao);
            let loc = l.full_shell_to_aoloc();
            assert_eq!(loc[loc.len() - 1] - loc[0], nao);
            assert_eq!(l.ao_to_atom().iter().filter(|&&a| a == 1).count(), 1);
            assert!(loc.windows(2).all(|w| w[0] <= w[1]));
        }
        assert_eq!(build(true).to_string(), "CompactLayout(nat=2, nsh=4, nao=10)");
    }

    #[test]
    fn subset_shares_tables() {
        let l = build(true);
        let s = l.subset(1..3).unwrap();
        assert!(s.shares_tables(&l));
        assert!(!s.is_same_view(&l));
        assert_eq!(s.ao_idxs(), (1, 9));
        assert_eq!(s.ao_to_shell(), &[1, 1, 1, 2, 2, 2, 2, 2]);
        assert!(l.subset(2..7).is_err());
    }

    #[test]
    fn ragged_shell_is_rejected() {
        let atoms = vec![AtomBasis::new(AtomZ::Integer(1), [0.0; 3], vec![Shell::new(0, vec![1.0, 2.0], vec![1.0])])];
        let session = CintSession::new();
        let err = CompactLayout::build(&session, &atoms, LayoutOptions::default(), None).unwrap_err();
        assert!(matches!(err, CintError::InvalidLayout(_)));
    }

    #[test]
    fn uncontracted_view_maps_back() {
        let l = build(true);
        let (u, map) = l.derive_uncontracted().unwrap();
        assert_eq!(u.nshells(), 3 + 2 + 1 + 2);
        assert_eq!(u.nao(), 3 + 2 * 3 + 5 + 2);
        assert_eq!(map.len(), u.nao());
        assert_eq!(&map[..6], &[0, 0, 0, 1, 2, 3]);
        assert_eq!(&map[6..9], &[1, 2, 3]);
        // memoized, and shared between views of the same tables
        let (u2, _) = l.derive_uncontracted().unwrap();
        assert!(u.is_same_view(&u2));
        let (us, smap) = l.subset(1..2).unwrap().derive_uncontracted().unwrap();
        assert!(us.shares_tables(&u));
        assert_eq!(us.shell_idxs(), (3, 5));
        assert_eq!(smap, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn rinv_origin_is_restored() {
        let l = build(true);
        let other = l.subset(0..1).unwrap();
        let seen = l.with_rinv_origin([1.0, 2.0, 3.0], |_| other.rinv_origin());
        assert_eq!(seen, [1.0, 2.0, 3.0]);
        assert_eq!(l.rinv_origin(), [0.0; 3]);

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            l.with_rinv_origin([4.0, 0.0, 0.0], |_| panic!("boom"))
        }));
        assert!(res.is_err());
        assert_eq!(l.rinv_origin(), [0.0; 3]);
    }

    #[test]
    fn env_copy_does_not_block_origin_moves() {
        let l = build(true);
        let before = l.env();
        let during = l.with_rinv_origin([0.5, 0.0, -0.5], |l| l.env());
        assert_eq!(&during[PTR_RINV_ORIG..PTR_RINV_ORIG + NDIM], &[0.5, 0.0, -0.5]);
        assert_eq!(&before[PTR_RINV_ORIG..PTR_RINV_ORIG + NDIM], &[0.0; 3]);
        assert_eq!(l.env(), before);
    }
}
