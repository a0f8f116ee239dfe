//! Reverse-mode differentiation of two-center integrals.
//!
//! Three independent channels: atomic positions (through `ip` derivative
//! families), primitive coefficients (integral divided by the coefficient on
//! the uncontracted basis) and primitive exponents (`rr` families on the
//! uncontracted basis). Gradients are accumulated into the parameter arrays
//! held by the layout: `(natoms, 3)` for positions and one entry per
//! primitive for coefficients and exponents.

use ndarray::{Array1, Array2, Array4, ArrayD, ArrayViewD, Axis, IxDyn};
use tracing::{debug, trace};

use crate::dispatch::Intor;
use crate::error::{CintError, Result};
use crate::int1e::BasisOp;
use crate::layout::CompactLayout;
use crate::names::{IntegralFamily, Swap};
use crate::session::CintSession;
use crate::types::NDIM;

/// Which parameter channels the backward pass fills.
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_builder::Builder)]
pub struct GradRequest {
    #[builder(default = false)]
    pub positions: bool,
    #[builder(default = false)]
    pub coefficients: bool,
    #[builder(default = false)]
    pub exponents: bool,
}

impl GradRequest {
    pub fn all() -> Self {
        GradRequest { positions: true, coefficients: true, exponents: true }
    }

    pub fn any(&self) -> bool {
        self.positions || self.coefficients || self.exponents
    }
}

/// Gradients of a scalar loss with respect to the layout parameters. A
/// channel that was not requested is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradientMap {
    pub positions: Option<Array2<f64>>,
    pub coefficients: Option<Array1<f64>>,
    pub exponents: Option<Array1<f64>>,
}

/// Everything the backward pass of one two-center evaluation needs.
///
/// Created by [`crate::evaluate_integral_with_gradients`]. The `rinv` origin
/// in effect during the forward pass is recorded and re-applied while the
/// derivative integrals run.
pub struct Int2cBackward {
    layouts: [CompactLayout; 2],
    family: IntegralFamily,
    hermitian: bool,
    request: GradRequest,
    shape: Vec<usize>,
    coefficients: Array1<f64>,
    positions_shape: (usize, usize),
    rinv_origin: [f64; NDIM],
}

impl Int2cBackward {
    pub(crate) fn new(
        layouts: &[CompactLayout],
        family: &IntegralFamily,
        hermitian: bool,
        request: GradRequest,
        shape: Vec<usize>,
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
        let (coeffs, _, pos) = layouts[0].params();
        Ok(Int2cBackward {
            coefficients: coeffs.clone(),
            positions_shape: pos.dim(),
            rinv_origin: layouts[0].rinv_origin(),
            layouts,
            family: family.clone(),
            hermitian,
            request,
            shape,
        })
    }

    pub fn request(&self) -> &GradRequest {
        &self.request
    }

    /// Shape of the forward value, which `grad_out` must match.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Propagate `grad_out`, the gradient of the loss with respect to the
    /// forward value, to the requested parameters.
    pub fn backward(self, session: &CintSession, grad_out: ArrayViewD<'_, f64>) -> Result<GradientMap> {
        if grad_out.shape() != self.shape.as_slice() {
            return Err(CintError::ShapeMismatch {
                expected: self.shape.clone(),
                found: grad_out.shape().to_vec(),
            });
        }
        let mut grads = GradientMap::default();
        if !self.request.any() {
            return Ok(grads);
        }
        debug!(family = %self.family, request = ?self.request, "int2c backward");

        let origin = self.rinv_origin;
        self.layouts[0].with_rinv_origin(origin, |_| -> Result<()> {
            if self.request.positions {
                grads.positions = Some(self.grad_positions(session, &grad_out)?);
            }
            if self.request.coefficients || self.request.exponents {
                let (u0, map0) = self.layouts[0].derive_uncontracted()?;
                let (u1, map1) = self.layouts[1].derive_uncontracted()?;
                let u_grad = gather_at_dims(&grad_out, &map0, &map1);
                let ulayouts = [u0, u1];
                ulayouts[0].with_rinv_origin(origin, |_| -> Result<()> {
                    if self.request.coefficients {
                        grads.coefficients = Some(self.grad_coefficients(session, &ulayouts, &u_grad)?);
                    }
                    if self.request.exponents {
                        grads.exponents = Some(self.grad_exponents(session, &ulayouts, &u_grad)?);
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(grads)
    }

    fn grad_positions(&self, session: &CintSession, grad_out: &ArrayViewD<'_, f64>) -> Result<Array2<f64>> {
        let families = [self.family.deriv(BasisOp::Ip, 0), self.family.deriv(BasisOp::Ip, 1)];
        let axes = [
            self.family.deriv_new_axis_pos(BasisOp::Ip, 0),
            self.family.deriv_new_axis_pos(BasisOp::Ip, 1),
        ];
        let douts = get_integrals(session, &families, &self.layouts, self.hermitian, &axes)?;
        trace!(family = %self.family, "position channel");

        let g = as_blocks(grad_out.to_owned(), 1)?;
        let mut grad = Array2::<f64>::zeros(self.positions_shape);
        for (ib, dout) in douts.into_iter().enumerate() {
            let d = as_blocks(dout, NDIM)?;
            let per_ao = contract(&g, &d, ib, |_| -1.0);
            scatter_rows(&mut grad, &per_ao, self.layouts[ib].ao_to_atom());
        }
        Ok(grad)
    }

    fn grad_coefficients(
        &self,
        session: &CintSession,
        ulayouts: &[CompactLayout; 2],
        u_grad: &ArrayD<f64>,
    ) -> Result<Array1<f64>> {
        let dout = Intor::new(session, &self.family, ulayouts, self.hermitian)?.calc()?;
        trace!(family = %self.family, nuao = ulayouts[0].nao(), "coefficient channel");
        let g = as_blocks(u_grad.clone(), 1)?;
        let d = as_blocks(dout, 1)?;
        let mut grad = Array1::<f64>::zeros(self.coefficients.len());
        for (ib, layout) in ulayouts.iter().enumerate() {
            let shells = layout.ao_to_shell();
            // a zero coefficient yields a non-finite gradient
            let per_ao = contract(&g, &d, ib, |iao| 1.0 / self.coefficients[shells[iao]]);
            scatter_flat(&mut grad, per_ao.row(0), shells);
        }
        Ok(grad)
    }

    fn grad_exponents(
        &self,
        session: &CintSession,
        ulayouts: &[CompactLayout; 2],
        u_grad: &ArrayD<f64>,
    ) -> Result<Array1<f64>> {
        let families = [self.family.deriv(BasisOp::Rr, 0), self.family.deriv(BasisOp::Rr, 1)];
        let axes = [
            self.family.deriv_new_axis_pos(BasisOp::Rr, 0),
            self.family.deriv_new_axis_pos(BasisOp::Rr, 1),
        ];
        let douts = get_integrals(session, &families, ulayouts, self.hermitian, &axes)?;
        trace!(family = %self.family, "exponent channel");
        let g = as_blocks(u_grad.clone(), 1)?;
        let mut grad = Array1::<f64>::zeros(self.coefficients.len());
        for (ib, dout) in douts.into_iter().enumerate() {
            let d = as_blocks(dout, 1)?;
            let per_ao = contract(&g, &d, ib, |_| -1.0);
            scatter_flat(&mut grad, per_ao.row(0), ulayouts[ib].ao_to_shell());
        }
        Ok(grad)
    }
}

/// Evaluate every family of `families` on `layouts`, reusing an earlier
/// result whenever a family is a transpose of one already computed.
///
/// When the transposed operands are the very same views the earlier array is
/// transposed directly; otherwise the earlier family is evaluated again on
/// the swapped operands, which keeps every native call on a family the
/// library has already answered. Finally each `Some(pos)` axis of
/// `new_axes_pos` is moved to the front of its result.
pub fn get_integrals(
    session: &CintSession,
    families: &[IntegralFamily],
    layouts: &[CompactLayout; 2],
    hermitian: bool,
    new_axes_pos: &[Option<usize>],
) -> Result<Vec<ArrayD<f64>>> {
    let mut res: Vec<ArrayD<f64>> = Vec::with_capacity(families.len());
    let mut int_avail = vec![false; families.len()];

    for (i, family) in families.iter().enumerate() {
        let mut found = None;
        for j in (0..i).rev() {
            let Some(path) = families[j].transpose_path_to(family) else {
                continue;
            };
            let swapped = swap_layouts(layouts, &path);
            let perm = families[j].comp_permute_path(&path);
            if swapped[0].is_same_view(&layouts[0]) && swapped[1].is_same_view(&layouts[1]) {
                trace!(from = %families[j], to = %family, "reusing transposed integral");
                found = Some(permute(transpose(res[j].clone(), &path), &perm));
                break;
            } else if int_avail[j] {
                trace!(from = %families[j], to = %family, "evaluating on swapped operands");
                let r = Intor::new(session, &families[j], &swapped, hermitian)?.calc()?;
                found = Some(permute(transpose(r, &path), &perm));
                break;
            }
        }
        let r = match found {
            Some(r) => r,
            None => {
                let r = Intor::new(session, family, layouts, hermitian)?.calc()?;
                int_avail[i] = true;
                r
            }
        };
        res.push(r);
    }

    Ok(res
        .into_iter()
        .zip(new_axes_pos.iter().copied().chain(std::iter::repeat(None)))
        .map(|(r, pos)| match pos {
            Some(p) => move_axis_to_front(r, p),
            None => r,
        })
        .collect())
}

fn swap_layouts(layouts: &[CompactLayout; 2], path: &[Swap]) -> [CompactLayout; 2] {
    let mut out = layouts.clone();
    for &(a, b) in path {
        out.swap((2 + a) as usize, (2 + b) as usize);
    }
    out
}

fn transpose(mut arr: ArrayD<f64>, path: &[Swap]) -> ArrayD<f64> {
    let nd = arr.ndim() as isize;
    for &(a, b) in path {
        arr.swap_axes((nd + a) as usize, (nd + b) as usize);
    }
    arr
}

fn permute(arr: ArrayD<f64>, perm: &[usize]) -> ArrayD<f64> {
    arr.permuted_axes(IxDyn(perm)).as_standard_layout().into_owned()
}

fn move_axis_to_front(arr: ArrayD<f64>, pos: usize) -> ArrayD<f64> {
    if pos == 0 {
        return arr;
    }
    let mut perm = vec![pos];
    perm.extend((0..arr.ndim()).filter(|&ax| ax != pos));
    permute(arr, &perm)
}

/// Gather the last two axes of `arr` through `map0` and `map1`:
/// `out[..., i, j] = arr[..., map0[i], map1[j]]`.
pub fn gather_at_dims(arr: &ArrayViewD<'_, f64>, map0: &[usize], map1: &[usize]) -> ArrayD<f64> {
    let nd = arr.ndim();
    arr.select(Axis(nd - 2), map0).select(Axis(nd - 1), map1)
}

/// View `arr` as `(lead, S, n0, n1)`, where `lead` is the size of the
/// leading axis (or 1) and `S` collects the remaining component axes.
fn as_blocks(arr: ArrayD<f64>, lead: usize) -> Result<Array4<f64>> {
    let shape = arr.shape().to_vec();
    let nd = shape.len();
    if nd < 2 || (lead > 1 && (nd < 3 || shape[0] != lead)) {
        return Err(CintError::ShapeMismatch { expected: vec![lead], found: shape });
    }
    let (n0, n1) = (shape[nd - 2], shape[nd - 1]);
    let s = shape.iter().product::<usize>() / (lead * n0 * n1).max(1);
    let data: Vec<f64> = arr.iter().copied().collect();
    Array4::from_shape_vec((lead, s, n0, n1), data)
        .map_err(|_| CintError::ShapeMismatch { expected: vec![lead, s, n0, n1], found: shape })
}

/// `out[x, a] = Σ g[0, s, i, j] d[x, s, i, j] * scale(a)`, summing over every
/// index except the AO `a` of operand `ib`.
fn contract(g: &Array4<f64>, d: &Array4<f64>, ib: usize, scale: impl Fn(usize) -> f64) -> Array2<f64> {
    let (lead, ns, n0, n1) = d.dim();
    let nao = if ib == 0 { n0 } else { n1 };
    let mut out = Array2::<f64>::zeros((lead, nao));
    for x in 0..lead {
        for s in 0..ns {
            for i in 0..n0 {
                for j in 0..n1 {
                    let a = if ib == 0 { i } else { j };
                    out[[x, a]] += g[[0, s, i, j]] * d[[x, s, i, j]];
                }
            }
        }
    }
    for a in 0..nao {
        let f = scale(a);
        out.column_mut(a).mapv_inplace(|v| v * f);
    }
    out
}

/// `grad[index[a], x] += per_ao[x, a]`.
fn scatter_rows(grad: &mut Array2<f64>, per_ao: &Array2<f64>, index: &[usize]) {
    for (a, &row) in index.iter().enumerate() {
        for x in 0..per_ao.nrows() {
            grad[[row, x]] += per_ao[[x, a]];
        }
    }
}

fn scatter_flat(grad: &mut Array1<f64>, per_ao: ndarray::ArrayView1<'_, f64>, index: &[usize]) {
    for (v, &k) in per_ao.iter().zip(index) {
        grad[k] += v;
    }
}
