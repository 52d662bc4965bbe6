//! # I/O Module
//!
//! Codecs for the four store artifacts and the textual output format:
//! - `sites`: BGZF-compressed variant-metadata stream (`.bcf`)
//! - `index`: flat coordinate index (`.csi`)
//! - `matrix`: memory-mapped 2-bit-plane genotype matrix (`.pbf`)
//! - `bed`: BED interval masks
//! - `vcf`: VCF text synthesis for query output

pub mod bed;
pub mod index;
pub mod matrix;
pub mod sites;
pub mod vcf;
