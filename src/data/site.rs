//! # Site Records
//!
//! One variant-metadata record: contig index, 0-based position, reference
//! length, allele strings (REF first) and site-level info fields. Sites carry
//! no per-sample data; the genotype matrix is keyed by the `_row` info field.

use std::cmp::Ordering;

use crate::error::{RegattaError, Result};

/// Info key holding the dense genotype-matrix row-id. Present on every
/// record in a store's site stream.
pub const ROW_INFO_KEY: &str = "_row";

/// Info key holding per-ALT alignment CIGARs (comma-separated).
pub const CIGAR_INFO_KEY: &str = "CIGAR";

/// The synthetic ALT appended when a merge promotes a site past two alleles.
pub const MULTI_ALLELE: &str = "<M>";

/// A typed site-level info value
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Flag,
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Str(String),
}

/// A variant site
#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    /// Contig index into the store's contig dictionary
    pub rid: i32,
    /// 0-based start position
    pub pos: i64,
    /// Reference length on the contig
    pub rlen: i64,
    /// Site quality, if any
    pub qual: Option<f32>,
    /// Variant ID, if any
    pub id: Option<String>,
    /// REF at index 0, ALTs at 1..
    pub alleles: Vec<String>,
    /// Site-level info fields, in file order
    pub info: Vec<(String, InfoValue)>,
}

impl Site {
    /// Create a bare site with no qual, id or info
    pub fn new(rid: i32, pos: i64, rlen: i64, alleles: Vec<String>) -> Self {
        Self {
            rid,
            pos,
            rlen,
            qual: None,
            id: None,
            alleles,
            info: Vec::new(),
        }
    }

    /// Total number of alleles (REF + ALTs)
    pub fn n_alleles(&self) -> usize {
        self.alleles.len()
    }

    /// Look up an info value by key (linear scan; records carry a handful)
    pub fn info(&self, key: &str) -> Option<&InfoValue> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up an integer info value
    pub fn info_int(&self, key: &str) -> Option<i64> {
        match self.info(key) {
            Some(InfoValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Look up a string info value
    pub fn info_str(&self, key: &str) -> Option<&str> {
        match self.info(key) {
            Some(InfoValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Append an info field
    pub fn push_info(&mut self, key: impl Into<String>, value: InfoValue) {
        self.info.push((key.into(), value));
    }

    /// Decode the genotype-matrix row-id. Its presence is a file-format
    /// invariant, so absence is an error rather than a debug assertion.
    pub fn row_id(&self) -> Result<i64> {
        match self.info_int(ROW_INFO_KEY) {
            Some(row) if row >= 0 => Ok(row),
            _ => Err(RegattaError::format(format!(
                "site at rid {} pos {} has no valid '{}' info",
                self.rid,
                self.pos + 1,
                ROW_INFO_KEY
            ))),
        }
    }

    /// The total order used by the k-way merge: `(rid, pos, rlen, alleles...)`
    /// with alleles compared over the shared prefix only. Two sites that agree
    /// on `(rid, pos, rlen)` and on every allele up to the shorter allele list
    /// compare equal, so a biallelic and a multi-allelic record at the same
    /// site merge into one output row.
    pub fn cmp_order(&self, other: &Site) -> Ordering {
        self.rid
            .cmp(&other.rid)
            .then(self.pos.cmp(&other.pos))
            .then(self.rlen.cmp(&other.rlen))
            .then_with(|| {
                let n = self.alleles.len().min(other.alleles.len());
                for i in 0..n {
                    match self.alleles[i].cmp(&other.alleles[i]) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                Ordering::Equal
            })
    }

    /// Copy this site truncated to REF + first ALT, appending the synthetic
    /// `<M>` allele when the merged site saw more than two alleles. Returns
    /// the copied site and the effective REF length (the caller attaches an
    /// `END` info when it differs from `rlen`).
    pub fn copy_min(&self, max_alleles: usize) -> (Site, usize) {
        let mut alleles: Vec<String> = self.alleles.iter().take(2).cloned().collect();
        if max_alleles > 2 {
            alleles.push(MULTI_ALLELE.to_string());
        }
        let ref_len = alleles.first().map(|a| a.len()).unwrap_or(0);
        let out = Site {
            rid: self.rid,
            pos: self.pos,
            rlen: self.rlen,
            qual: self.qual,
            id: self.id.clone(),
            alleles,
            info: self.info.clone(),
        };
        (out, ref_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(rid: i32, pos: i64, rlen: i64, alleles: &[&str]) -> Site {
        Site::new(rid, pos, rlen, alleles.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn test_order_by_coordinate() {
        let a = site(0, 100, 1, &["A", "T"]);
        let b = site(0, 200, 1, &["A", "T"]);
        let c = site(1, 100, 1, &["A", "T"]);
        assert_eq!(a.cmp_order(&b), Ordering::Less);
        assert_eq!(b.cmp_order(&c), Ordering::Less);
        assert_eq!(a.cmp_order(&a), Ordering::Equal);
    }

    #[test]
    fn test_order_by_alleles() {
        let a = site(0, 100, 1, &["A", "C"]);
        let b = site(0, 100, 1, &["A", "T"]);
        assert_eq!(a.cmp_order(&b), Ordering::Less);

        let short = site(0, 100, 1, &["A", "T"]);
        let long = site(0, 100, 1, &["A", "T", "G"]);
        assert_eq!(short.cmp_order(&long), Ordering::Equal);
    }

    #[test]
    fn test_order_by_rlen() {
        let a = site(0, 100, 1, &["A", "T"]);
        let b = site(0, 100, 2, &["AC", "A"]);
        assert_eq!(a.cmp_order(&b), Ordering::Less);
    }

    #[test]
    fn test_copy_min_biallelic() {
        let s = site(0, 100, 1, &["A", "T"]);
        let (out, ref_len) = s.copy_min(2);
        assert_eq!(out.alleles, vec!["A", "T"]);
        assert_eq!(ref_len, 1);
    }

    #[test]
    fn test_copy_min_promotes_multi_allele() {
        let s = site(0, 100, 1, &["A", "T", "G"]);
        let (out, ref_len) = s.copy_min(3);
        assert_eq!(out.alleles, vec!["A", "T", MULTI_ALLELE]);
        assert_eq!(ref_len, 1);
    }

    #[test]
    fn test_row_id() {
        let mut s = site(0, 100, 1, &["A", "T"]);
        assert!(s.row_id().is_err());
        s.push_info(ROW_INFO_KEY, InfoValue::Int(42));
        assert_eq!(s.row_id().unwrap(), 42);
    }

    #[test]
    fn test_info_lookup() {
        let mut s = site(0, 100, 1, &["A", "T"]);
        s.push_info("AN", InfoValue::Int(4));
        s.push_info("CIGAR", InfoValue::Str("2M".into()));
        assert_eq!(s.info_int("AN"), Some(4));
        assert_eq!(s.info_str("CIGAR"), Some("2M"));
        assert!(s.info("AC").is_none());
    }
}
