//! # Configuration Logic
//!
//! CLI argument parsing and validation for the query driver, using clap
//! derive.

use clap::Parser;
use std::path::PathBuf;

use crate::error::{RegattaError, Result};
use crate::store::reader::MAX_GROUPS;

/// Regatta: columnar genotype-table query engine
#[derive(Parser, Debug, Clone)]
#[command(name = "regatta")]
#[command(version = "0.1.0")]
#[command(about = "Query columnar genotype-table stores", long_about = None)]
pub struct Config {
    /// Store prefixes to query; each names PREFIX.bcf/.csi/.pbf/.spl
    #[arg(value_name = "PREFIX", required = true)]
    pub stores: Vec<PathBuf>,

    /// Region to query: chrom, chrom:beg or chrom:beg-end (1-based, inclusive)
    #[arg(short = 'r', long, value_name = "REGION")]
    pub region: Option<String>,

    /// Start reading at record N instead of a region
    #[arg(long, value_name = "N", conflicts_with = "region")]
    pub start: Option<i64>,

    /// Sample group: ":name1,name2", a name-list file, or a predicate over
    /// sample attributes (repeatable, up to 8 groups)
    #[arg(short = 's', long = "samples", value_name = "SPEC")]
    pub groups: Vec<String>,

    /// BED file restricting output to overlapping sites
    #[arg(short = 'B', long, value_name = "FILE")]
    pub bed: Option<PathBuf>,

    /// Invert the BED mask: exclude overlapping sites
    #[arg(long, requires = "bed")]
    pub bed_exclude: bool,

    /// Site and info columns only; no FORMAT/sample output
    #[arg(short = 'G', long)]
    pub no_genotypes: bool,

    /// Annotate AC/AN, and AC{g}/AN{g} when groups are declared
    #[arg(short = 'C', long)]
    pub counts: bool,

    /// Drop records whose first-ALT allele count is below N
    #[arg(long, value_name = "N")]
    pub min_ac: Option<i32>,

    /// Keep only records containing this allele
    /// (chr:pos:ref:alt or chr:pos:rlen:alt)
    #[arg(short = 'a', long, value_name = "KEY")]
    pub allele: Option<String>,

    /// Decompose output records into per-position atoms
    #[arg(short = 'A', long)]
    pub atomize: bool,

    /// Output path (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.groups.len() > MAX_GROUPS {
            return Err(RegattaError::TooManyGroups { limit: MAX_GROUPS });
        }
        if let Some(ref bed) = self.bed {
            if !bed.is_file() {
                return Err(RegattaError::FileNotFound { path: bed.clone() });
            }
        }
        if let Some(start) = self.start {
            if start < 0 {
                return Err(RegattaError::format("--start must be non-negative"));
            }
        }
        Ok(())
    }
}
