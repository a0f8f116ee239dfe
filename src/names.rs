//! Integral family names and the relations between them.
//!
//! A family such as `ipovlp` is split into the operators on the bra basis
//! (`ip`), the base operator (`ovlp`) and the operators on the ket basis.
//! Component axes of the output appear in that order, one axis of size 3 per
//! `ip`; `rr` adds no axis.

use std::fmt;

use crate::int1e::BasisOp;
use crate::types::NDIM;

/// Swap of two operand positions, counted from the end of the operand list.
pub type Swap = (isize, isize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntegralFamily {
    int_type: String,
    base: String,
    bra_ops: Vec<BasisOp>,
    ket_ops: Vec<BasisOp>,
}

fn strip_prefix_op(s: &str) -> Option<(BasisOp, &str)> {
    BasisOp::ALL.iter().find_map(|op| s.strip_prefix(op.name()).map(|rest| (*op, rest)))
}

fn strip_suffix_op(s: &str) -> Option<(BasisOp, &str)> {
    BasisOp::ALL.iter().find_map(|op| s.strip_suffix(op.name()).map(|rest| (*op, rest)))
}

impl IntegralFamily {
    pub fn new(int_type: &str, base: &str, bra_ops: Vec<BasisOp>, ket_ops: Vec<BasisOp>) -> Self {
        IntegralFamily {
            int_type: int_type.to_string(),
            base: base.to_string(),
            bra_ops,
            ket_ops,
        }
    }

    /// Split a short name such as `ipovlp`, `kinrr` or `ovlp`.
    ///
    /// Unknown names are kept as an opaque base; they fail later, when the
    /// native symbol is resolved.
    pub fn parse(int_type: &str, shortname: &str) -> Self {
        let mut rest = shortname;
        let mut bra_ops = Vec::new();
        while let Some((op, r)) = strip_prefix_op(rest) {
            if r.is_empty() {
                break;
            }
            bra_ops.push(op);
            rest = r;
        }
        let mut ket_ops = Vec::new();
        while let Some((op, r)) = strip_suffix_op(rest) {
            if r.is_empty() {
                break;
            }
            ket_ops.insert(0, op);
            rest = r;
        }
        IntegralFamily::new(int_type, rest, bra_ops, ket_ops)
    }

    pub fn int1e(shortname: &str) -> Self {
        IntegralFamily::parse("int1e", shortname)
    }

    pub fn int_type(&self) -> &str {
        &self.int_type
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn bra_ops(&self) -> &[BasisOp] {
        &self.bra_ops
    }

    pub fn ket_ops(&self) -> &[BasisOp] {
        &self.ket_ops
    }

    /// The short name, e.g. `ipovlp`.
    pub fn shortname(&self) -> String {
        let mut s = String::new();
        self.bra_ops.iter().for_each(|op| s.push_str(op.name()));
        s.push_str(&self.base);
        self.ket_ops.iter().for_each(|op| s.push_str(op.name()));
        s
    }

    /// `<int_type>_<shortname>`, or just `<int_type>` for a bare family such
    /// as `int2c2e`.
    pub fn fullname(&self) -> String {
        let short = self.shortname();
        if short.is_empty() {
            self.int_type.clone()
        } else {
            format!("{}_{short}", self.int_type)
        }
    }

    pub fn native_name(&self, spherical: bool) -> String {
        format!("{}_{}", self.fullname(), if spherical { "sph" } else { "cart" })
    }

    /// Name of the optimizer builder, shared by the cartesian and spherical
    /// variants.
    pub fn optimizer_name(&self) -> String {
        format!("{}_optimizer", self.fullname())
    }

    /// Derivative order: the total polynomial degree added by basis operators.
    pub fn order(&self) -> usize {
        self.bra_ops.iter().chain(&self.ket_ops).map(|op| op.degree()).sum()
    }

    pub fn components_shape(&self) -> Vec<usize> {
        self.bra_ops
            .iter()
            .chain(&self.ket_ops)
            .filter(|op| op.ncomp() > 1)
            .map(|_| NDIM)
            .collect()
    }

    fn ncomp_axes(ops: &[BasisOp]) -> usize {
        ops.iter().filter(|op| op.ncomp() > 1).count()
    }

    /// Family with `op` applied to basis `ibasis` (0 = bra, 1 = ket).
    pub fn deriv(&self, op: BasisOp, ibasis: usize) -> Self {
        let mut d = self.clone();
        if ibasis == 0 {
            d.bra_ops.insert(0, op);
        } else {
            d.ket_ops.insert(0, op);
        }
        d
    }

    /// Axis introduced by [`IntegralFamily::deriv`], `None` when `op` adds no
    /// component axis.
    pub fn deriv_new_axis_pos(&self, op: BasisOp, ibasis: usize) -> Option<usize> {
        if op.ncomp() == 1 {
            return None;
        }
        Some(if ibasis == 0 { 0 } else { Self::ncomp_axes(&self.bra_ops) })
    }

    /// Operand swaps turning `self` into `other`: `Some(vec![])` for the same
    /// family, `Some(vec![(-1, -2)])` for the mirrored one. All one-electron
    /// base operators are symmetric under operand exchange.
    pub fn transpose_path_to(&self, other: &IntegralFamily) -> Option<Vec<Swap>> {
        if self.int_type != other.int_type || self.base != other.base {
            return None;
        }
        if self.bra_ops == other.bra_ops && self.ket_ops == other.ket_ops {
            return Some(Vec::new());
        }
        if self.bra_ops == other.ket_ops && self.ket_ops == other.bra_ops {
            return Some(vec![(-1, -2)]);
        }
        None
    }

    /// Axis permutation that reorders the component axes of `self`, evaluated
    /// on swapped operands and transposed along `path`, into the component
    /// order of the target family. The two AO axes stay last.
    pub fn comp_permute_path(&self, path: &[Swap]) -> Vec<usize> {
        let nb = Self::ncomp_axes(&self.bra_ops);
        let nk = Self::ncomp_axes(&self.ket_ops);
        let mut groups: Vec<Vec<usize>> = vec![(0..nb).collect(), (nb..nb + nk).collect()];
        for &(a, b) in path {
            let n = groups.len() as isize;
            groups.swap((n + a) as usize, (n + b) as usize);
        }
        let ncomp = nb + nk;
        let mut perm: Vec<usize> = groups.into_iter().flatten().collect();
        perm.extend([ncomp, ncomp + 1]);
        perm
    }
}

impl fmt::Display for IntegralFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}
