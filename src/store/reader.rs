//! # Single-Cohort Reader
//!
//! Pulls `(site, haplotype-bit-planes)` pairs out of one store, filtered by
//! region or row start, an optional BED mask, and a sample subset declared
//! as up to eight groups. Groups set bits in a per-sample mask byte; the
//! selected samples are those with a non-zero mask, in sample order, and
//! that order is fixed for the life of the reader once prepared.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use tracing::info_span;

use crate::data::expr::Expr;
use crate::data::site::Site;
use crate::error::{RegattaError, Result};
use crate::io::bed::BedMask;
use crate::io::index::RegionQuery;
use crate::io::matrix::MatrixReader;
use crate::io::sites::SiteReader;
use crate::io::vcf;
use crate::store::store::Store;

/// Group masks are one byte per sample
pub const MAX_GROUPS: usize = 8;

/// One way of declaring a sample group
#[derive(Clone, Debug, PartialEq)]
pub enum GroupSpec {
    /// Every sample in the store
    All,
    /// An explicit name list; names absent from a store are silently ignored
    Names(Vec<String>),
    /// A predicate over sample attributes
    Expr(String),
    /// Union of a name list and a predicate
    Hybrid { names: Vec<String>, expr: String },
}

impl GroupSpec {
    /// Interpret a command-line group argument: `:a,b,c` is an inline name
    /// list, an existing file (not starting with `?`) is a line-delimited
    /// name list, anything else is a predicate expression.
    pub fn from_arg(arg: &str) -> Result<GroupSpec> {
        if let Some(inline) = arg.strip_prefix(':') {
            return Ok(GroupSpec::Names(
                inline
                    .split(',')
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect(),
            ));
        }
        if !arg.starts_with('?') && Path::new(arg).is_file() {
            let file = File::open(arg)?;
            let mut names = Vec::new();
            for line in BufReader::new(file).lines() {
                let line = line?;
                let name = line.trim();
                if !name.is_empty() && !name.starts_with('#') {
                    names.push(name.to_string());
                }
            }
            return Ok(GroupSpec::Names(names));
        }
        Ok(GroupSpec::Expr(
            arg.strip_prefix('?').unwrap_or(arg).to_string(),
        ))
    }
}

/// One record pulled from a reader: the site, its matrix row and the two
/// bit planes restricted to the selected samples
#[derive(Clone, Debug)]
pub struct Rec {
    pub row: i64,
    pub site: Site,
    pub planes: [Vec<u8>; 2],
}

/// A pull-based reader over one store
pub struct Reader {
    store: Arc<Store>,
    sites: SiteReader,
    matrix: MatrixReader,
    /// group-membership mask, one byte per store sample
    mask: Vec<u8>,
    n_groups: usize,
    /// selected source sample indices, fixed at prepare
    samples: Vec<usize>,
    /// per-selected-sample group masks, parallel to `samples`
    group: Vec<u8>,
    header_out: Option<String>,
    region: Option<RegionQuery>,
    bed: Option<(Arc<BedMask>, bool)>,
}

impl Reader {
    /// Bind a reader to a store, opening its own site stream and matrix
    pub fn new(store: Arc<Store>) -> Result<Self> {
        let sites = SiteReader::open(&store.sites_path())?;
        let matrix = MatrixReader::open(&store.matrix_path())?;
        let n_samples = store.samples().len();
        if matrix.n_cols() as usize != 2 * n_samples {
            return Err(RegattaError::format(format!(
                "store '{}': matrix has {} haplotype columns for {} samples",
                store.prefix().display(),
                matrix.n_cols(),
                n_samples
            )));
        }
        Ok(Self {
            mask: vec![0; n_samples],
            n_groups: 0,
            samples: Vec::new(),
            group: Vec::new(),
            header_out: None,
            region: None,
            bed: None,
            store,
            sites,
            matrix,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Declare the next sample group. Groups must be declared before the
    /// first read; the group index is the current count.
    pub fn add_group(&mut self, spec: &GroupSpec) -> Result<()> {
        if self.n_groups >= MAX_GROUPS {
            return Err(RegattaError::TooManyGroups { limit: MAX_GROUPS });
        }
        let bit = 1u8 << self.n_groups;
        let table = self.store.samples();
        match spec {
            GroupSpec::All => {
                for m in &mut self.mask {
                    *m |= bit;
                }
            }
            GroupSpec::Names(names) => {
                for name in names {
                    if let Some(i) = table.position(name) {
                        self.mask[i] |= bit;
                    }
                }
            }
            GroupSpec::Expr(text) => {
                let expr = Expr::parse(text)?;
                for (i, row) in table.rows().iter().enumerate() {
                    if expr.eval(row) {
                        self.mask[i] |= bit;
                    }
                }
            }
            GroupSpec::Hybrid { names, expr } => {
                let expr = Expr::parse(expr)?;
                let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
                for (i, row) in table.rows().iter().enumerate() {
                    if wanted.contains(row.name.as_str()) || expr.eval(row) {
                        self.mask[i] |= bit;
                    }
                }
            }
        }
        self.n_groups += 1;
        Ok(())
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Constrain reads to a region `chrom[:beg[-end]]` (1-based inclusive
    /// text coordinates). Clears any row start.
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        let (name, beg, end) = parse_region(region)?;
        let rid = self
            .store
            .header()
            .rid(name)
            .ok_or_else(|| RegattaError::bad_region(region))?;
        self.region = Some(self.store.index().query(rid, beg, end));
        Ok(())
    }

    /// Start sequential reads at record `row`. Clears any region.
    pub fn set_start(&mut self, row: i64) -> Result<()> {
        let voffset = self.store.index().voffset_of(row).ok_or_else(|| {
            RegattaError::format(format!(
                "row {} out of range (store has {} records)",
                row,
                self.store.index().len()
            ))
        })?;
        self.sites.seek(voffset)?;
        self.region = None;
        Ok(())
    }

    /// Attach an interval mask; sites are kept iff `overlap XOR exclude`
    pub fn set_bed(&mut self, bed: Arc<BedMask>, exclude: bool) {
        self.bed = Some((bed, exclude));
    }

    /// Resolve groups into the fixed sample subset and output header.
    /// Called lazily by the first read; declaring no group selects all
    /// samples as group 0.
    pub fn prepare(&mut self) -> Result<()> {
        if self.header_out.is_some() {
            return Ok(());
        }
        info_span!("reader_prepare", prefix = ?self.store.prefix()).in_scope(|| {
            if self.n_groups == 0 {
                self.add_group(&GroupSpec::All)?;
            }
            self.samples = (0..self.mask.len()).filter(|&i| self.mask[i] != 0).collect();
            self.group = self.samples.iter().map(|&i| self.mask[i]).collect();

            let cols: Vec<u32> = self
                .samples
                .iter()
                .flat_map(|&i| [2 * i as u32, 2 * i as u32 + 1])
                .collect();
            self.matrix.subset_columns(&cols)?;

            let table = self.store.samples();
            let names: Vec<&str> = self
                .samples
                .iter()
                .filter_map(|&i| table.get(i))
                .map(|r| r.name.as_str())
                .collect();
            self.header_out = Some(vcf::store_header(&self.store.header().contigs, &names));
            tracing::debug!(selected = self.samples.len(), groups = self.n_groups, "prepared reader");
            Ok(())
        })
    }

    /// The selected source sample indices (after prepare)
    pub fn samples(&self) -> &[usize] {
        &self.samples
    }

    /// Per-selected-sample group masks (after prepare)
    pub fn group_masks(&self) -> &[u8] {
        &self.group
    }

    /// Number of selected samples (after prepare)
    pub fn n_out(&self) -> usize {
        self.samples.len()
    }

    /// Names of the selected samples, in output order
    pub fn sample_names(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter_map(|&i| self.store.samples().get(i))
            .map(|r| r.name.as_str())
            .collect()
    }

    /// The single-store output header (after prepare)
    pub fn header_out(&self) -> Option<&str> {
        self.header_out.as_deref()
    }

    /// Pull the next record, or `None` at end of stream. An empty sample
    /// selection yields no records.
    pub fn read(&mut self) -> Result<Option<Rec>> {
        if self.header_out.is_none() {
            self.prepare()?;
        }
        if self.samples.is_empty() {
            return Ok(None);
        }
        loop {
            let site = match self.next_site()? {
                Some(site) => site,
                None => return Ok(None),
            };
            let row = site.row_id()?;
            if let Some((bed, exclude)) = &self.bed {
                let name = self.store.header().contig_name(site.rid)?;
                let hit = bed.overlap(name, site.pos, site.pos + site.rlen);
                if hit == *exclude {
                    continue;
                }
            }
            self.matrix.seek(row)?;
            let (a0, a1) = self.matrix.read()?;
            return Ok(Some(Rec {
                row,
                site,
                planes: [a0.to_vec(), a1.to_vec()],
            }));
        }
    }

    /// FORMAT GT typed bytes for one record's planes
    pub fn genotypes(&self, rec: &Rec) -> Vec<u8> {
        rec.planes[0]
            .iter()
            .zip(&rec.planes[1])
            .map(|(&a0, &a1)| vcf::bits_to_gt(a0, a1))
            .collect()
    }

    fn next_site(&mut self) -> Result<Option<Site>> {
        match self.region.as_mut() {
            Some(query) => {
                let row = match query.next_row(self.store.index()) {
                    Some(row) => row,
                    None => return Ok(None),
                };
                let entry = self.store.index().entry(row).ok_or_else(|| {
                    RegattaError::format(format!("dangling index entry {}", row))
                })?;
                self.sites.seek(entry.voffset)?;
                self.sites.read_site()
            }
            None => self.sites.read_site(),
        }
    }
}

/// Parse `chrom`, `chrom:beg` or `chrom:beg-end` (1-based inclusive) into a
/// 0-based half-open interval. The split is at the last `:` so contig names
/// containing `:` keep working when no interval is given.
fn parse_region(region: &str) -> Result<(&str, i64, i64)> {
    if region.is_empty() {
        return Err(RegattaError::bad_region(region));
    }
    if let Some((name, range)) = region.rsplit_once(':') {
        if !name.is_empty() {
            let parsed = match range.split_once('-') {
                Some((b, e)) => b
                    .parse::<i64>()
                    .and_then(|b| e.parse::<i64>().map(|e| (b, e))),
                None => range.parse::<i64>().map(|b| (b, i64::MAX)),
            };
            if let Ok((beg, end)) = parsed {
                if beg < 1 || end < beg {
                    return Err(RegattaError::bad_region(region));
                }
                return Ok((name, beg - 1, end));
            }
        }
    }
    Ok((region, 0, i64::MAX))
}
