//! # Data Module
//!
//! In-memory representations of the store's data model.
//!
//! ## Sub-modules
//! - `site`: variant-metadata records and the merge total order
//! - `sample`: the ordered sample table with structured attributes
//! - `expr`: predicate expressions over sample attributes
//! - `atom`: per-position decomposition of complex alleles
//! - `allele_key`: textual variant-key parsing and normalization

pub mod allele_key;
pub mod atom;
pub mod expr;
pub mod sample;
pub mod site;
