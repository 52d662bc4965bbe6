//! # Variant Key Parsing
//!
//! Parses a textual variant key of the form `chr:pos:ref:alt` or
//! `chr:pos:rlen:alt` into a normalized `(chrom, pos, rlen, alt)` tuple.
//! `pos` is 1-based on input and 0-based internally. Normalization shifts
//! any shared REF/ALT prefix into the position and strips any shared suffix,
//! producing the shortest equivalent representation. Symbolic ALTs such as
//! `<DEL>` pass through untouched.

use std::fmt;

use crate::error::{RegattaError, Result};

/// A normalized variant key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlleleKey {
    pub chrom: String,
    /// 0-based position after prefix normalization
    pub pos: i64,
    /// Reference length after normalization
    pub rlen: i64,
    /// ALT sequence (or symbolic allele) after normalization
    pub alt: String,
}

impl AlleleKey {
    /// Parse and normalize a variant key
    pub fn parse(text: &str) -> Result<Self> {
        let err = || RegattaError::malformed_key(text);

        let mut fields = text.splitn(4, ':');
        let chrom = fields.next().filter(|c| !c.is_empty()).ok_or_else(err)?;
        let pos_field = fields.next().ok_or_else(err)?;
        let third = fields.next().ok_or_else(err)?;
        // the ALT is everything after the third separator; symbolic alleles
        // like <DUP:TANDEM> legitimately contain ':'
        let alt_field = fields.next().filter(|a| !a.is_empty()).ok_or_else(err)?;

        if pos_field.is_empty() || !pos_field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let mut pos: i64 = pos_field.parse::<i64>().map_err(|_| err())? - 1;

        let (ref_seq, mut rlen) = if third.bytes().next().is_some_and(|b| b.is_ascii_digit()) {
            if !third.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            (None, third.parse::<i64>().map_err(|_| err())?)
        } else if !third.is_empty() && third.bytes().all(|b| b.is_ascii_alphabetic()) {
            (Some(third), third.len() as i64)
        } else {
            return Err(err());
        };

        let mut alt = alt_field;
        if let Some(ref_seq) = ref_seq {
            // shift the shared leading run into pos; matching is
            // case-insensitive and stops at the first non-alphabetic ALT byte
            let rb = ref_seq.as_bytes();
            let ab = alt.as_bytes();
            let mut off = 0;
            while off < ab.len() && off < rb.len() {
                if !ab[off].is_ascii_alphabetic()
                    || !ab[off].eq_ignore_ascii_case(&rb[off])
                {
                    break;
                }
                off += 1;
            }
            pos += off as i64;
            rlen -= off as i64;
            alt = &alt[off..];
            let rb = &rb[off..];

            // strip the shared trailing run; rlen shrinks, pos does not move
            let ab = alt.as_bytes();
            let min_l = (ab.len() as i64).min(rlen).max(0) as usize;
            let mut suf = 0;
            while suf < min_l {
                let r = rb[rb.len() - 1 - suf];
                let a = ab[ab.len() - 1 - suf];
                if !r.is_ascii_alphabetic() || !r.eq_ignore_ascii_case(&a) {
                    break;
                }
                suf += 1;
            }
            rlen -= suf as i64;
            alt = &alt[..alt.len() - suf];
        }

        Ok(Self {
            chrom: chrom.to_string(),
            pos,
            rlen,
            alt: alt.to_string(),
        })
    }
}

impl fmt::Display for AlleleKey {
    /// Serialize in the REF-less `chr:pos:rlen:alt` form; parsing this
    /// serialization is a fixed point of normalization.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.chrom, self.pos + 1, self.rlen, self.alt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_suffix_trimming() {
        // shared prefix "AC" shifts pos by 2, shared suffix "T" trims rlen
        let key = AlleleKey::parse("chr1:100:ACGT:ACCT").unwrap();
        assert_eq!(key.chrom, "chr1");
        assert_eq!(key.pos, 101);
        assert_eq!(key.rlen, 1);
        assert_eq!(key.alt, "C");
    }

    #[test]
    fn test_rlen_form() {
        let key = AlleleKey::parse("chr1:100:1:T").unwrap();
        assert_eq!(key.chrom, "chr1");
        assert_eq!(key.pos, 99);
        assert_eq!(key.rlen, 1);
        assert_eq!(key.alt, "T");
    }

    #[test]
    fn test_symbolic_alt_untrimmed() {
        let key = AlleleKey::parse("chr1:100:ACGT:<DEL>").unwrap();
        assert_eq!(key.pos, 99);
        assert_eq!(key.rlen, 4);
        assert_eq!(key.alt, "<DEL>");
    }

    #[test]
    fn test_symbolic_alt_with_colon() {
        let key = AlleleKey::parse("chr2:500:10:<DUP:TANDEM>").unwrap();
        assert_eq!(key.alt, "<DUP:TANDEM>");
        assert_eq!(key.rlen, 10);
    }

    #[test]
    fn test_deletion_key() {
        // "AT" vs "A": prefix A shifts pos, leaving a 1-base deletion of T
        let key = AlleleKey::parse("1:1000:AT:A").unwrap();
        assert_eq!(key.pos, 1000);
        assert_eq!(key.rlen, 1);
        assert_eq!(key.alt, "");
    }

    #[test]
    fn test_case_insensitive_trim() {
        let key = AlleleKey::parse("1:100:acGT:ACgt").unwrap();
        assert_eq!(key.pos, 103);
        assert_eq!(key.rlen, 0);
        assert_eq!(key.alt, "");
    }

    #[test]
    fn test_idempotent_normalization() {
        for text in [
            "chr1:100:ACGT:ACCT",
            "chr1:100:1:T",
            "chr1:100:ACGT:<DEL>",
            "chr2:500:10:<DUP:TANDEM>",
        ] {
            let key = AlleleKey::parse(text).unwrap();
            let again = AlleleKey::parse(&key.to_string()).unwrap();
            assert_eq!(key, again, "not idempotent for {}", text);
        }
    }

    #[test]
    fn test_malformed_keys() {
        for text in [
            "chr1",
            "chr1:100",
            "chr1:100:ACGT",
            "chr1:pos:ACGT:A",
            "chr1:100:4x:A",
            "chr1:100:A4:A",
            "chr1:100:ACGT:",
            ":100:1:T",
        ] {
            assert!(
                AlleleKey::parse(text).is_err(),
                "expected failure for {}",
                text
            );
        }
    }
}
