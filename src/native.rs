//! Symbol table of the integral evaluation library.
//!
//! Integral families are looked up by their libcint symbol name
//! (`int1e_ipovlp_sph`, ...). The built-in table is populated eagerly with the
//! Rust kernels of [`crate::int1e`]; other evaluators can be registered
//! behind the same [`Int2cIntor`] seam.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::debug;

use crate::error::Result;
use crate::int1e::{BaseOperator, BasisOp, Int1eKernel};
use crate::optimizer::CintOpt;
use crate::types::{cgto_count, BasSlot};

/// One two-center integral symbol.
pub trait Int2cIntor: Send + Sync {
    fn name(&self) -> &str;

    /// Number of operator components written per shell pair.
    fn ncomp(&self) -> usize;

    fn spherical(&self) -> bool;

    /// Evaluate the block of shell pair `shls` into `out`, component-major,
    /// each component column-major with the bra shell's AOs fastest.
    ///
    /// Returns `false` when the block is identically zero.
    fn eval_shell_pair(
        &self,
        out: &mut [f64],
        shls: [usize; 2],
        atm: &[i32],
        bas: &[i32],
        env: &[f64],
        opt: Option<&CintOpt>,
    ) -> Result<bool>;

    fn build_optimizer(&self, atm: &[i32], bas: &[i32], env: &[f64]) -> CintOpt;
}

lazy_static! {
    static ref GLOBAL: Arc<NativeLibrary> = Arc::new(NativeLibrary::builtin());
}

/// Name → evaluator map.
pub struct NativeLibrary {
    symbols: HashMap<String, Arc<dyn Int2cIntor>>,
    resolutions: AtomicUsize,
}

impl NativeLibrary {
    pub fn empty() -> Self {
        NativeLibrary { symbols: HashMap::new(), resolutions: AtomicUsize::new(0) }
    }

    /// Every built-in family: each base operator bare, with `ip` or `rr` on
    /// either side, and `ip` on both sides; cartesian and spherical.
    pub fn builtin() -> Self {
        let mut lib = NativeLibrary::empty();
        let mut sides: Vec<(Vec<BasisOp>, Vec<BasisOp>)> = vec![(vec![], vec![])];
        for op in BasisOp::ALL {
            sides.push((vec![op], vec![]));
            sides.push((vec![], vec![op]));
        }
        sides.push((vec![BasisOp::Ip], vec![BasisOp::Ip]));
        for base in BaseOperator::ALL {
            for (bra, ket) in &sides {
                for spherical in [false, true] {
                    lib.register(Arc::new(Int1eKernel::new(base, bra.clone(), ket.clone(), spherical)));
                }
            }
        }
        debug!(nsymbols = lib.symbols.len(), "built-in integral library initialized");
        lib
    }

    /// Process-wide built-in library, initialized on first use.
    pub fn global() -> Arc<NativeLibrary> {
        Arc::clone(&GLOBAL)
    }

    pub fn register(&mut self, intor: Arc<dyn Int2cIntor>) {
        self.symbols.insert(intor.name().to_string(), intor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Look a symbol up. Every call is counted, found or not.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Int2cIntor>> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.symbols.get(name).cloned()
    }

    /// Number of `resolve` calls so far.
    pub fn resolved_symbols(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// The `CINTcgto_spheric` / `CINTcgto_cart` query.
    pub fn cgto_count(&self, bas: &[i32], ibas: usize, spherical: bool) -> usize {
        cgto_count(&BasSlot::new(bas, ibas), spherical)
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("nsymbols", &self.symbols.len())
            .field("resolutions", &self.resolved_symbols())
            .finish()
    }
}
