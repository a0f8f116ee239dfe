//! Generate static Cartesian component tables.
//!
//! Emits `$OUT_DIR/cart_tables.rs` containing one flat table of
//! `(nx, ny, nz)` power triples for every angular momentum up to
//! `CART_LMAX`, the per-l offsets into it, and the accessor
//! `cart_comp_l(l) -> &'static [[u8; 3]]`.
//!
//! The ordering is the libcint one: nx descending, then ny descending.

use std::io::Write;

const CART_LMAX: usize = 6;

fn main() -> std::io::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest = std::path::Path::new(&out_dir).join("cart_tables.rs");
    let mut f = std::io::BufWriter::new(std::fs::File::create(dest)?);

    let mut powers: Vec<[usize; 3]> = Vec::new();
    let mut offsets = vec![0usize];
    for l in 0..=CART_LMAX {
        for ix in (0..=l).rev() {
            for iy in (0..=(l - ix)).rev() {
                powers.push([ix, iy, l - ix - iy]);
            }
        }
        offsets.push(powers.len());
    }

    writeln!(f, "/// Highest angular momentum covered by the generated tables.")?;
    writeln!(f, "pub const CART_LMAX: usize = {CART_LMAX};\n")?;

    let rows = powers
        .iter()
        .map(|p| format!("[{}, {}, {}]", p[0], p[1], p[2]))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(f, "static CART_POWERS: [[u8; 3]; {}] = [{rows}];", powers.len())?;

    let offs = offsets.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(", ");
    writeln!(f, "static CART_OFFSET: [usize; {}] = [{offs}];\n", offsets.len())?;

    writeln!(f, "/// Static `(nx, ny, nz)` Cartesian powers of angular momentum `l`.")?;
    writeln!(f, "///")?;
    writeln!(f, "/// Callers must check `l <= CART_LMAX` first.")?;
    writeln!(f, "#[inline]")?;
    writeln!(f, "pub fn cart_comp_l(l: usize) -> &'static [[u8; 3]] {{")?;
    writeln!(f, "    &CART_POWERS[CART_OFFSET[l]..CART_OFFSET[l + 1]]")?;
    writeln!(f, "}}")?;
    Ok(())
}
