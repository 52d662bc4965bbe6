//! # Store Handles
//!
//! A store is one on-disk cohort: four artifacts sharing a filesystem
//! prefix. `Store::open` binds them under a single immutable handle holding
//! the site header, the full coordinate index and the sample table in
//! memory. Readers open their own streams against the same prefix, so a
//! store can back any number of (sequentially used) readers.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info_span;

use crate::data::sample::SampleTable;
use crate::error::{RegattaError, Result};
use crate::io::index::CoordIndex;
use crate::io::sites::{SiteHeader, SiteReader};

/// The four artifact suffixes of a store prefix
const SITES_EXT: &str = ".bcf";
const INDEX_EXT: &str = ".csi";
const MATRIX_EXT: &str = ".pbf";
const SAMPLES_EXT: &str = ".spl";

/// An open, immutable cohort store
pub struct Store {
    prefix: PathBuf,
    header: SiteHeader,
    index: CoordIndex,
    samples: SampleTable,
}

fn artifact(prefix: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = prefix.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}

impl Store {
    /// Open the store at `prefix`, verifying all four artifacts exist and
    /// reading the header, index and sample table fully into memory. No
    /// partial open: any failure returns before a handle is produced.
    pub fn open(prefix: impl AsRef<Path>) -> Result<Arc<Store>> {
        let prefix = prefix.as_ref();
        info_span!("store_open", prefix = ?prefix).in_scope(|| {
            for ext in [SITES_EXT, INDEX_EXT, MATRIX_EXT, SAMPLES_EXT] {
                let path = artifact(prefix, ext);
                if !path.is_file() {
                    return Err(RegattaError::store_open(
                        prefix,
                        format!("missing artifact '{}'", path.display()),
                    ));
                }
            }

            let header = SiteReader::open(&artifact(prefix, SITES_EXT))?
                .header()
                .clone();
            let index = CoordIndex::load(&artifact(prefix, INDEX_EXT))?;
            let samples = SampleTable::load(&artifact(prefix, SAMPLES_EXT))?;

            tracing::debug!(
                contigs = header.contigs.len(),
                records = index.len(),
                samples = samples.len(),
                "opened store"
            );
            Ok(Arc::new(Store {
                prefix: prefix.to_path_buf(),
                header,
                index,
                samples,
            }))
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// The contig dictionary and anything else the site header carries
    pub fn header(&self) -> &SiteHeader {
        &self.header
    }

    pub fn index(&self) -> &CoordIndex {
        &self.index
    }

    pub fn samples(&self) -> &SampleTable {
        &self.samples
    }

    /// Path of the site stream, for readers
    pub fn sites_path(&self) -> PathBuf {
        artifact(&self.prefix, SITES_EXT)
    }

    /// Path of the genotype matrix, for readers
    pub fn matrix_path(&self) -> PathBuf {
        artifact(&self.prefix, MATRIX_EXT)
    }
}
