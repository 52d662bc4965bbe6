//! # Allele Atomization
//!
//! Decomposes a multi-allelic, multi-nucleotide site into per-position
//! "atoms": one SNV, insertion or deletion per reference position, each tied
//! back to the source allele it came from, with per-sample genotype codes
//! rewritten to refer to the atom.
//!
//! Per-slot atom codes: `0` the sample carries REF at this atom, `1` the
//! sample carries the atom's ALT, `2` missing, `3` the sample carries some
//! other allele whose reference footprint overlaps this atom.

use std::cmp::Ordering;

use crate::data::site::{Site, CIGAR_INFO_KEY};
use crate::error::{RegattaError, Result};

/// One atomized variant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Atom {
    pub rid: i32,
    /// 0-based reference position of the atom
    pub pos: i64,
    /// Reference footprint length
    pub rlen: i64,
    pub ref_seq: String,
    pub alt_seq: String,
    /// Index of the source allele in the originating site (1..A-1)
    pub anum: usize,
    /// Per-sample, per-ploidy-slot atom codes
    pub gt: Vec<u8>,
}

impl Atom {
    fn key(&self) -> (i32, i64, i64, &str, &str) {
        (self.rid, self.pos, self.rlen, &self.ref_seq, &self.alt_seq)
    }

    fn cmp_key(&self, other: &Atom) -> Ordering {
        self.key().cmp(&other.key())
    }

    /// Reference footprints intersect
    fn overlaps(&self, other: &Atom) -> bool {
        self.pos < other.pos + other.rlen && other.pos < self.pos + self.rlen
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CigarKind {
    Match,
    Ins,
    Del,
}

#[derive(Clone, Copy, Debug)]
struct CigarOp {
    len: usize,
    kind: CigarKind,
}

fn parse_cigar(text: &str) -> Result<Vec<CigarOp>> {
    let mut ops = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if start == i || i == bytes.len() {
            return Err(RegattaError::format(format!("bad CIGAR '{}'", text)));
        }
        let len: usize = text[start..i]
            .parse()
            .map_err(|_| RegattaError::format(format!("bad CIGAR '{}'", text)))?;
        let kind = match bytes[i] {
            b'M' | b'=' | b'X' => CigarKind::Match,
            b'I' => CigarKind::Ins,
            b'D' => CigarKind::Del,
            op => {
                return Err(RegattaError::format(format!(
                    "unsupported CIGAR op '{}' in '{}'",
                    op as char, text
                )))
            }
        };
        ops.push(CigarOp { len, kind });
        i += 1;
    }
    Ok(ops)
}

/// The heuristic alignment for a length-changing ALT with no explicit CIGAR:
/// one anchor match, one indel for the length difference, then matches for
/// whatever remains on the longer side.
fn heuristic_cigar(rlen: usize, alt_len: usize) -> Vec<CigarOp> {
    let mut ops = vec![CigarOp {
        len: 1,
        kind: CigarKind::Match,
    }];
    let (indel, rest) = if alt_len > rlen {
        (
            CigarOp {
                len: alt_len - rlen,
                kind: CigarKind::Ins,
            },
            rlen - 1,
        )
    } else {
        (
            CigarOp {
                len: rlen - alt_len,
                kind: CigarKind::Del,
            },
            alt_len - 1,
        )
    };
    ops.push(indel);
    if rest > 0 {
        ops.push(CigarOp {
            len: rest,
            kind: CigarKind::Match,
        });
    }
    ops
}

/// Decompose one site into atoms.
///
/// `gt` holds the site's FORMAT genotypes as typed bytes, `ploidy` slots per
/// sample, each `(allele_index + 1) << 1 | phase` with `0` meaning missing.
/// Pass an empty slice to atomize the alleles without genotype rewriting.
pub fn atomize(site: &Site, gt: &[u8], ploidy: usize) -> Result<Vec<Atom>> {
    if ploidy == 0 || gt.len() % ploidy != 0 {
        return Err(RegattaError::format(
            "genotype buffer is not a whole number of samples",
        ));
    }

    let n_alleles = site.n_alleles();
    let ref_seq = match site.alleles.first() {
        Some(r) => r.as_str(),
        None => return Ok(Vec::new()),
    };
    let l_ref = ref_seq.len();

    // explicit per-ALT alignments, when the site carries them
    let mut cigars = site
        .info_str(CIGAR_INFO_KEY)
        .map(|text| text.split(',').map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();
    let has_cigar_info = site.info_str(CIGAR_INFO_KEY).is_some();

    let mut atoms: Vec<Atom> = Vec::new();
    let mut push = |pos: i64, rlen: i64, anum: usize, ref_seq: &str, alt_seq: String| {
        atoms.push(Atom {
            rid: site.rid,
            pos,
            rlen,
            ref_seq: ref_seq.to_string(),
            alt_seq,
            anum,
            gt: Vec::new(),
        });
    };

    for (anum, alt) in site.alleles.iter().enumerate().skip(1) {
        let symbolic = alt.starts_with('<') && alt.ends_with('>');
        if site.rlen != l_ref as i64 || symbolic || l_ref == 0 || alt.is_empty() {
            // no base-level alignment is possible; emit the whole allele
            push(site.pos, site.rlen, anum, ref_seq, alt.clone());
            continue;
        }

        let ops = if has_cigar_info {
            let text = cigars.next().ok_or_else(|| {
                RegattaError::format(format!(
                    "site at pos {} has {} ALTs but fewer CIGARs",
                    site.pos + 1,
                    n_alleles - 1
                ))
            })?;
            parse_cigar(&text)?
        } else if alt.len() == l_ref {
            vec![CigarOp {
                len: l_ref,
                kind: CigarKind::Match,
            }]
        } else {
            heuristic_cigar(l_ref, alt.len())
        };

        let rb = ref_seq.as_bytes();
        let ab = alt.as_bytes();
        let (mut x, mut y) = (0usize, 0usize);
        for op in ops {
            match op.kind {
                CigarKind::Match => {
                    if x + op.len > rb.len() || y + op.len > ab.len() {
                        return Err(RegattaError::format(format!(
                            "CIGAR overruns alleles at pos {}",
                            site.pos + 1
                        )));
                    }
                    for j in 0..op.len {
                        if rb[x + j] != ab[y + j] {
                            push(
                                site.pos + (x + j) as i64,
                                1,
                                anum,
                                &ref_seq[x + j..x + j + 1],
                                alt[y + j..y + j + 1].to_string(),
                            );
                        }
                    }
                    x += op.len;
                    y += op.len;
                }
                CigarKind::Ins => {
                    if x == 0 || y == 0 || y + op.len > ab.len() {
                        return Err(RegattaError::format(format!(
                            "unanchored insertion in CIGAR at pos {}",
                            site.pos + 1
                        )));
                    }
                    let anchor = &ref_seq[x - 1..x];
                    let mut alt_seq = String::with_capacity(op.len + 1);
                    alt_seq.push_str(anchor);
                    alt_seq.push_str(&alt[y..y + op.len]);
                    push(site.pos + x as i64 - 1, 1, anum, anchor, alt_seq);
                    y += op.len;
                }
                CigarKind::Del => {
                    if x == 0 || y == 0 || x + op.len > rb.len() {
                        return Err(RegattaError::format(format!(
                            "unanchored deletion in CIGAR at pos {}",
                            site.pos + 1
                        )));
                    }
                    push(
                        site.pos + x as i64 - 1,
                        op.len as i64 + 1,
                        anum,
                        &ref_seq[x - 1..x + op.len],
                        ref_seq[x - 1..x].to_string(),
                    );
                    x += op.len;
                }
            }
        }
    }

    rewrite_genotypes(site, gt, &mut atoms)?;
    Ok(atoms)
}

/// Sort atoms, collapse duplicates, and rewrite per-sample genotype codes
/// against each representative atom. Quadratic in the atom count, which is
/// tiny per site.
fn rewrite_genotypes(site: &Site, gt: &[u8], atoms: &mut Vec<Atom>) -> Result<()> {
    let n = atoms.len();
    if n == 0 {
        return Ok(());
    }
    atoms.sort_by(|a, b| a.cmp_key(b));

    // eq[i] = index of the first atom equal to atom i
    let mut eq = vec![0usize; n];
    for i in 1..n {
        eq[i] = if atoms[i - 1].cmp_key(&atoms[i]) == Ordering::Equal {
            eq[i - 1]
        } else {
            i
        };
    }

    let n_alleles = site.n_alleles();
    for k in 0..n {
        if eq[k] != k {
            continue;
        }
        // source-allele translation: 1 = this atom, 3 = overlapping other
        let mut tr = vec![0u8; n_alleles];
        for i in 0..n {
            if eq[i] == k {
                tr[atoms[i].anum] = 1;
            } else if atoms[i].overlaps(&atoms[k]) {
                tr[atoms[i].anum] = 3;
            }
        }
        let mut codes = vec![0u8; gt.len()];
        for (m, &g) in gt.iter().enumerate() {
            let c = (g >> 1) as i64 - 1;
            if c < 0 {
                codes[m] = 2;
            } else if (c as usize) < n_alleles {
                codes[m] = tr[c as usize];
            } else {
                return Err(RegattaError::format(format!(
                    "genotype allele index {} out of range at pos {}",
                    c,
                    site.pos + 1
                )));
            }
        }
        atoms[k].gt = codes;
    }

    // keep only representatives, in sorted order
    let mut idx = 0;
    atoms.retain(|_| {
        let keep = eq[idx] == idx;
        idx += 1;
        keep
    });
    Ok(())
}
