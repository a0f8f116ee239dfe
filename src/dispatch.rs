//! Evaluation of one integral family over one or two layout views.

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use tracing::debug;

use crate::error::{CintError, Result};
use crate::int1e::driver::{fill_2c, Int2cRequest};
use crate::layout::CompactLayout;
use crate::names::IntegralFamily;
use crate::native::Int2cIntor;
use crate::session::CintSession;

/// A resolved, ready-to-run integral call. Consumed by [`Intor::calc`].
pub struct Intor<'s> {
    session: &'s CintSession,
    family: IntegralFamily,
    layouts: [CompactLayout; 2],
    hermitian: bool,
    intor: Arc<dyn Int2cIntor>,
    comp_shape: Vec<usize>,
}

impl<'s> Intor<'s> {
    /// `layouts` holds the bra and ket views; a single view is used for both.
    ///
    /// `hermitian` is honoured for non-derivative families only.
    pub fn new(
        session: &'s CintSession,
        family: &IntegralFamily,
        layouts: &[CompactLayout],
        hermitian: bool,
    ) -> Result<Self> {
        let layouts = match layouts {
            [a] => [a.clone(), a.clone()],
            [a, b] => [a.clone(), b.clone()],
            _ => {
                return Err(CintError::invalid(format!(
                    "two-center integrals take 1 or 2 layouts, got {}",
                    layouts.len()
                )))
            }
        };
        if !layouts[0].shares_tables(&layouts[1]) {
            return Err(CintError::IdentityMismatch(format!(
                "{} and {} were built separately",
                layouts[0], layouts[1]
            )));
        }

        let symbol = family.native_name(layouts[0].spherical());
        let intor = session.library().resolve(&symbol).ok_or_else(|| {
            CintError::UnsupportedIntegral { family: family.fullname(), symbol: symbol.clone() }
        })?;
        let comp_shape = family.components_shape();
        let ncomp: usize = comp_shape.iter().product();
        if intor.ncomp() != ncomp {
            return Err(CintError::native(
                &symbol,
                format!("evaluator writes {} components, {} declares {ncomp}", intor.ncomp(), family),
            ));
        }
        Ok(Intor {
            session,
            family: family.clone(),
            layouts,
            hermitian: hermitian && family.order() == 0,
            intor,
            comp_shape,
        })
    }

    /// Output shape `[components..., nao0, nao1]`.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.comp_shape.clone();
        shape.extend([self.layouts[0].nao(), self.layouts[1].nao()]);
        shape
    }

    pub fn calc(self) -> Result<ArrayD<f64>> {
        let [l0, l1] = &self.layouts;
        let intor = &self.intor;
        let opt = l0.optimizer(&self.family.optimizer_name(), |t| {
            intor.build_optimizer(t.atm, t.bas, t.env)
        });

        let (s0, s1) = l0.shell_idxs();
        let (s2, s3) = l1.shell_idxs();
        let (nao0, nao1) = (l0.nao(), l1.nao());
        let ncomp: usize = self.comp_shape.iter().product();
        let req = Int2cRequest {
            shls_slice: [s0, s1, s2, s3],
            ao_loc: l0.full_shell_to_aoloc(),
            hermitian: self.hermitian,
            parallel: self.session.config().parallel,
        };
        debug!(symbol = intor.name(), shape = ?self.shape(), hermitian = self.hermitian, "dispatching integral");

        let mut out = vec![0.0f64; ncomp * nao0 * nao1];
        l0.with_raw_tables(|t| fill_2c(intor.as_ref(), &mut out, &req, Some(opt.as_ref()), t))?;

        // the driver writes [comp..., nao1, nao0]
        let mut native_shape = self.comp_shape.clone();
        native_shape.extend([nao1, nao0]);
        let mut arr = ArrayD::from_shape_vec(IxDyn(&native_shape), out)
            .map_err(|e| CintError::native(intor.name(), e.to_string()))?;
        let nd = arr.ndim();
        arr.swap_axes(nd - 2, nd - 1);
        Ok(arr.as_standard_layout().into_owned())
    }
}
