//! libcint-grad: libcint-style atm/bas/env tables, two-center integral
//! dispatch and reverse-mode gradients.
//!
//! A basis given as atoms with contracted shells is packed into the three
//! flat arrays a libcint evaluator reads ([`CompactLayout`]). Integral
//! families are named the libcint way (`int1e_ipovlp_sph`) and resolved
//! through a [`NativeLibrary`] of evaluators held by a [`CintSession`].
//!
//! Derivatives with respect to atomic positions, contraction coefficients and
//! exponents are obtained from further integral families (`ip`, `rr`) on the
//! contracted and uncontracted basis; see [`Int2cBackward`].
//!
//! ```no_run
//! use libcint_grad::{AtomBasis, CintSession, CompactLayout, LayoutOptions, Shell};
//!
//! let session = CintSession::new();
//! let atoms = vec![AtomBasis::new(1u32, [0.0, 0.0, 0.0], vec![Shell::new(0, vec![1.0], vec![1.0])])];
//! let layout = CompactLayout::build(&session, &atoms, LayoutOptions::default(), None)?;
//! let s = libcint_grad::overlap(&session, &layout, None)?;
//! # Ok::<(), libcint_grad::CintError>(())
//! ```

pub mod basis;
pub mod dispatch;
pub mod error;
pub mod grad;
pub mod int1e;
pub mod integrals;
pub mod layout;
pub mod names;
pub mod native;
pub mod optimizer;
pub mod rys;
pub mod session;
pub mod transform;
pub mod types;

pub use basis::{AtomBasis, AtomZ, Shell};
pub use dispatch::Intor;
pub use error::{CintError, Result};
pub use grad::{get_integrals, GradRequest, GradRequestBuilder, GradientMap, Int2cBackward};
pub use int1e::{BaseOperator, BasisOp};
pub use integrals::{
    evaluate_integral, evaluate_integral_with_gradients, int1e, kinetic, nuclear, overlap, rinv,
};
pub use layout::{CompactLayout, IndexHelper, LayoutOptions, LayoutOptionsBuilder};
pub use names::IntegralFamily;
pub use native::{Int2cIntor, NativeLibrary};
pub use session::{CintSession, SessionConfig, SessionConfigBuilder};
