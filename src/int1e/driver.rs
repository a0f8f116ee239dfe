//! Matrix-level driver: fill a `[comp, nao_j, nao_i]` buffer shell pair by
//! shell pair, the `GTOint2c` of libcint.
//!
//! Shell pairs are evaluated independently into private blocks (in parallel
//! with `rayon` when enabled) and scattered serially into the output, so no
//! two workers ever write to the same memory.

use rayon::prelude::*;
use tracing::trace;

use crate::error::{CintError, Result};
use crate::native::Int2cIntor;
use crate::optimizer::CintOpt;

/// The atm/bas/env triple handed to the kernels.
#[derive(Debug, Clone, Copy)]
pub struct RawTables<'a> {
    pub atm: &'a [i32],
    pub bas: &'a [i32],
    pub env: &'a [f64],
}

/// Shell ranges and AO offsets of one 2-center call.
#[derive(Debug, Clone, Copy)]
pub struct Int2cRequest<'a> {
    /// `[i0, i1, j0, j1]`: bra shells `i0..i1`, ket shells `j0..j1`.
    pub shls_slice: [usize; 4],
    /// Absolute AO offset of every shell of the tables, length nbas+1.
    pub ao_loc: &'a [usize],
    /// Evaluate only `jsh <= ish` and mirror. Requires equal ranges.
    pub hermitian: bool,
    pub parallel: bool,
}

type Block = (usize, usize, Vec<f64>);

/// Fill `out[c*nij + i + j*naoi]` for every component `c`.
pub fn fill_2c(
    intor: &dyn Int2cIntor,
    out: &mut [f64],
    req: &Int2cRequest<'_>,
    opt: Option<&CintOpt>,
    tables: RawTables<'_>,
) -> Result<()> {
    let [i0, i1, j0, j1] = req.shls_slice;
    let ao_loc = req.ao_loc;
    let naoi = ao_loc[i1] - ao_loc[i0];
    let naoj = ao_loc[j1] - ao_loc[j0];
    let nij = naoi * naoj;
    let ncomp = intor.ncomp();
    if out.len() != ncomp * nij {
        return Err(CintError::native(
            intor.name(),
            format!("output buffer holds {} values, expected {}", out.len(), ncomp * nij),
        ));
    }
    let symmetric = req.hermitian && i0 == j0 && i1 == j1;

    let pairs: Vec<(usize, usize)> = (j0..j1)
        .flat_map(|j| (i0..i1).filter(move |&i| !symmetric || j <= i).map(move |i| (i, j)))
        .collect();
    trace!(symbol = intor.name(), npairs = pairs.len(), symmetric, "evaluating shell pairs");

    let eval = |&(ish, jsh): &(usize, usize)| -> Result<Block> {
        let di = ao_loc[ish + 1] - ao_loc[ish];
        let dj = ao_loc[jsh + 1] - ao_loc[jsh];
        let mut buf = vec![0.0f64; ncomp * di * dj];
        if opt.map_or(true, |o| o.passes(ish, jsh)) {
            intor.eval_shell_pair(&mut buf, [ish, jsh], tables.atm, tables.bas, tables.env, opt)?;
        }
        Ok((ish, jsh, buf))
    };
    let blocks: Vec<Block> = if req.parallel {
        pairs.par_iter().map(&eval).collect::<Result<_>>()?
    } else {
        pairs.iter().map(&eval).collect::<Result<_>>()?
    };

    for (ish, jsh, buf) in blocks {
        let di = ao_loc[ish + 1] - ao_loc[ish];
        let dj = ao_loc[jsh + 1] - ao_loc[jsh];
        let ioff = ao_loc[ish] - ao_loc[i0];
        let joff = ao_loc[jsh] - ao_loc[j0];
        for c in 0..ncomp {
            let dst = &mut out[c * nij..(c + 1) * nij];
            let src = &buf[c * di * dj..(c + 1) * di * dj];
            for j in 0..dj {
                for i in 0..di {
                    let v = src[i + j * di];
                    dst[(ioff + i) + (joff + j) * naoi] = v;
                    if symmetric && ish != jsh {
                        dst[(joff + j) + (ioff + i) * naoi] = v;
                    }
                }
            }
        }
    }

    if let Some(pos) = out.iter().position(|v| !v.is_finite()) {
        return Err(CintError::native(intor.name(), format!("non-finite value at flat index {pos}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::int1e::{BaseOperator, Int1eKernel};
    use crate::types::PTR_ENV_START;

    // s, p on atom 0; d on atom 1
    fn tables() -> (Vec<i32>, Vec<i32>, Vec<f64>, Vec<usize>) {
        let s = PTR_ENV_START as i32;
        let mut env = vec![0.0; PTR_ENV_START];
        env.extend_from_slice(&[0.0, 0.1, 0.0, 0.0, 0.3, -0.2, 1.1, 0.0]);
        env.extend_from_slice(&[1.3, 0.4, 0.6, 0.5, 0.8, 1.0, 0.7, 1.0]);
        let atm = vec![1, s, 1, s + 3, 0, 0, 2, s + 4, 1, s + 7, 0, 0];
        let bas = vec![
            0, 0, 2, 1, 0, s + 8, s + 10, 0, //
            0, 1, 1, 1, 0, s + 12, s + 13, 0, //
            1, 2, 1, 1, 0, s + 14, s + 15, 0,
        ];
        // spherical AO counts 1, 3, 5
        let ao_loc = vec![0, 1, 4, 9];
        (atm, bas, env, ao_loc)
    }

    fn fill(hermitian: bool, parallel: bool) -> Vec<f64> {
        let (atm, bas, env, ao_loc) = tables();
        let k = Int1eKernel::new(BaseOperator::Nuclear, vec![], vec![], true);
        let req = Int2cRequest { shls_slice: [0, 3, 0, 3], ao_loc: &ao_loc, hermitian, parallel };
        let opt = CintOpt::build(&atm, &bas, &env);
        let mut out = vec![0.0; 81];
        fill_2c(&k, &mut out, &req, Some(&opt), RawTables { atm: &atm, bas: &bas, env: &env })
            .unwrap();
        out
    }

    #[test]
    fn hermitian_path_matches_full_evaluation() {
        let full = fill(false, false);
        let herm = fill(true, false);
        for (a, b) in full.iter().zip(&herm) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
        for i in 0..9 {
            for j in 0..9 {
                assert!((full[i + 9 * j] - full[j + 9 * i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn parallel_and_serial_agree() {
        assert_eq!(fill(false, true), fill(false, false));
    }

    #[test]
    fn wrong_buffer_size_is_a_native_failure() {
        let (atm, bas, env, ao_loc) = tables();
        let k = Int1eKernel::new(BaseOperator::Overlap, vec![], vec![], true);
        let req = Int2cRequest { shls_slice: [0, 2, 1, 3], ao_loc: &ao_loc, hermitian: false, parallel: false };
        let mut out = vec![0.0; 10];
        let err = fill_2c(&k, &mut out, &req, None, RawTables { atm: &atm, bas: &bas, env: &env })
            .unwrap_err();
        assert!(matches!(err, CintError::NativeCallFailure { .. }));
    }
}
