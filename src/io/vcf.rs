//! # VCF Text Output
//!
//! Synthesizes the textual form of query results: the output headers for
//! single-store and merged queries, and per-record data lines including the
//! FORMAT GT column.
//!
//! FORMAT genotypes travel as typed bytes, one per haplotype slot:
//! `(allele_index + 1) << 1 | phase_bit`, with `0` meaning missing. The
//! fixed table below maps 2-bit genotype codes straight into that encoding,
//! always unphased.

use std::fmt::Write as _;

use crate::data::site::{InfoValue, Site};
use crate::io::sites::Contig;
use crate::store::reader::MAX_GROUPS;

/// 2-bit genotype code (`(a1<<1)|a0`) to typed GT byte:
/// REF, first ALT, missing, second-or-higher ALT
pub const BITS2GT: [u8; 4] = [(0 + 1) << 1, (1 + 1) << 1, 0, (2 + 1) << 1];

/// The symbolic ALT declarations every merged header carries
const SYMBOLIC_ALTS: [(&str, &str); 8] = [
    ("M", "Multi-allele"),
    ("DEL", "Deletion"),
    ("DUP", "Duplication"),
    ("INS", "Insertion"),
    ("INV", "Inversion"),
    ("DUP:TANDEM", "Tandem duplication"),
    ("DEL:ME", "Deletion of mobile element"),
    ("INS:ME", "Insertion of mobile element"),
];

/// Map one haplotype's bit-plane pair to its typed GT byte
#[inline]
pub fn bits_to_gt(a0: u8, a1: u8) -> u8 {
    BITS2GT[((a1 << 1) | a0) as usize]
}

fn push_column_header(out: &mut String, sample_names: &[&str]) {
    out.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO");
    if !sample_names.is_empty() {
        out.push_str("\tFORMAT");
        for name in sample_names {
            out.push('\t');
            out.push_str(name);
        }
    }
    out.push('\n');
}

/// The output header of a single-store reader: contig dictionary plus the
/// selected sample columns
pub fn store_header(contigs: &[Contig], sample_names: &[&str]) -> String {
    let mut out = String::new();
    out.push_str("##fileformat=VCFv4.1\n");
    out.push_str(
        "##INFO=<ID=_row,Number=1,Type=Integer,Description=\"Genotype-matrix row\">\n",
    );
    out.push_str("##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n");
    for contig in contigs {
        let _ = writeln!(
            out,
            "##contig=<ID={},length={}>",
            contig.name, contig.length
        );
    }
    push_column_header(&mut out, sample_names);
    out
}

/// The synthesized header of a merged query: the fixed preamble declaring
/// AC/AN, the eight group-qualified pairs, END, GT and the symbolic ALT set,
/// then the shared contig dictionary and column headers
pub fn merged_header(contigs: &[Contig], sample_names: &[&str], with_genotypes: bool) -> String {
    let mut out = String::new();
    out.push_str("##fileformat=VCFv4.1\n");
    out.push_str(
        "##INFO=<ID=AC,Number=A,Type=Integer,Description=\"Count of alternate alleles\">\n",
    );
    out.push_str("##INFO=<ID=AN,Number=1,Type=Integer,Description=\"Count of total alleles\">\n");
    for g in 1..=MAX_GROUPS {
        let _ = writeln!(
            out,
            "##INFO=<ID=AC{g},Number=A,Type=Integer,Description=\"Count of alternate alleles for sample group {g}\">"
        );
        let _ = writeln!(
            out,
            "##INFO=<ID=AN{g},Number=1,Type=Integer,Description=\"Count of total alleles for sample group {g}\">"
        );
    }
    out.push_str("##INFO=<ID=END,Number=1,Type=Integer,Description=\"Ending position\">\n");
    out.push_str("##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n");
    for (id, description) in SYMBOLIC_ALTS {
        let _ = writeln!(out, "##ALT=<ID={},Description=\"{}\">", id, description);
    }
    for contig in contigs {
        let _ = writeln!(
            out,
            "##contig=<ID={},length={}>",
            contig.name, contig.length
        );
    }
    if with_genotypes {
        push_column_header(&mut out, sample_names);
    } else {
        push_column_header(&mut out, &[]);
    }
    out
}

fn push_info(out: &mut String, info: &[(String, InfoValue)]) {
    if info.is_empty() {
        out.push('.');
        return;
    }
    for (i, (key, value)) in info.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        match value {
            InfoValue::Flag => out.push_str(key),
            InfoValue::Int(v) => {
                let _ = write!(out, "{}={}", key, v);
            }
            InfoValue::Float(v) => {
                let _ = write!(out, "{}={}", key, v);
            }
            InfoValue::Str(s) => {
                let _ = write!(out, "{}={}", key, s);
            }
            InfoValue::Ints(values) => {
                out.push_str(key);
                out.push('=');
                for (j, v) in values.iter().enumerate() {
                    if j > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}", v);
                }
            }
        }
    }
}

fn push_gt(out: &mut String, genotypes: &[u8]) {
    out.push_str("\tGT");
    for pair in genotypes.chunks(2) {
        out.push('\t');
        for (i, &g) in pair.iter().enumerate() {
            if i > 0 {
                // phase bit of the second slot picks the separator
                out.push(if g & 1 == 1 { '|' } else { '/' });
            }
            let allele = (g >> 1) as i32 - 1;
            if allele < 0 {
                out.push('.');
            } else {
                let _ = write!(out, "{}", allele);
            }
        }
    }
}

/// Render one output record as a VCF data line (no trailing newline)
pub fn format_record(contig: &str, site: &Site, genotypes: Option<&[u8]>) -> String {
    let mut out = String::new();
    let _ = write!(out, "{}\t{}\t", contig, site.pos + 1);
    out.push_str(site.id.as_deref().unwrap_or("."));
    out.push('\t');
    out.push_str(site.alleles.first().map(String::as_str).unwrap_or("."));
    out.push('\t');
    if site.alleles.len() > 1 {
        for (i, alt) in site.alleles[1..].iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(alt);
        }
    } else {
        out.push('.');
    }
    out.push('\t');
    match site.qual {
        Some(q) => {
            let _ = write!(out, "{}", q);
        }
        None => out.push('.'),
    }
    out.push_str("\t.\t");
    push_info(&mut out, &site.info);
    if let Some(genotypes) = genotypes {
        push_gt(&mut out, genotypes);
    }
    out
}
