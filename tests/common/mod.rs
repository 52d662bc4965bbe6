//! Shared fixture: assemble a complete on-disk store (all four artifacts)
//! from in-memory sites, planes and sample rows.

use std::path::{Path, PathBuf};

use regatta::data::sample::{AttrValue, SampleRow, SampleTable};
use regatta::data::site::{InfoValue, Site, ROW_INFO_KEY};
use regatta::io::index::{CoordIndex, IndexEntry};
use regatta::io::matrix::MatrixWriter;
use regatta::io::sites::{Contig, SiteHeader, SiteWriter};

pub struct StoreBuilder {
    contigs: Vec<Contig>,
    samples: Vec<SampleRow>,
    sites: Vec<(Site, Vec<u8>, Vec<u8>)>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            contigs: Vec::new(),
            samples: Vec::new(),
            sites: Vec::new(),
        }
    }

    pub fn contig(mut self, name: &str, length: u32) -> Self {
        self.contigs.push(Contig {
            name: name.to_string(),
            length,
        });
        self
    }

    pub fn sample(mut self, name: &str, attrs: &[(&str, &str)]) -> Self {
        let mut row = SampleRow::new(name);
        for (key, value) in attrs {
            row.push_attr(*key, AttrValue::parse(value));
        }
        self.samples.push(row);
        self
    }

    /// Add a site with its two full-width planes (one 0/1 byte per
    /// haplotype column); `_row` is assigned automatically in add order.
    pub fn site(
        mut self,
        rid: i32,
        pos: i64,
        rlen: i64,
        alleles: &[&str],
        plane0: Vec<u8>,
        plane1: Vec<u8>,
    ) -> Self {
        let row = self.sites.len() as i64;
        let mut site = Site::new(
            rid,
            pos,
            rlen,
            alleles.iter().map(|a| a.to_string()).collect(),
        );
        site.push_info(ROW_INFO_KEY, InfoValue::Int(row));
        self.sites.push((site, plane0, plane1));
        self
    }

    /// Write all four artifacts under `dir/name` and return the prefix
    pub fn build(self, dir: &Path, name: &str) -> PathBuf {
        let prefix = dir.join(name);
        let artifact = |ext: &str| {
            let mut s = prefix.as_os_str().to_os_string();
            s.push(ext);
            PathBuf::from(s)
        };
        let n_cols = 2 * self.samples.len() as u32;

        let header = SiteHeader {
            contigs: self.contigs,
        };
        let mut site_writer = SiteWriter::create(&artifact(".bcf"), &header).unwrap();
        let mut matrix_writer = MatrixWriter::create(&artifact(".pbf"), n_cols).unwrap();
        let mut entries = Vec::with_capacity(self.sites.len());
        for (site, plane0, plane1) in &self.sites {
            let voffset = site_writer.write_site(site).unwrap();
            entries.push(IndexEntry {
                rid: site.rid,
                beg: site.pos,
                end: site.pos + site.rlen,
                voffset,
            });
            matrix_writer.write_row(plane0, plane1).unwrap();
        }
        site_writer.finish().unwrap();
        matrix_writer.finish().unwrap();

        CoordIndex::from_entries(entries)
            .save(&artifact(".csi"))
            .unwrap();
        SampleTable::from_rows(self.samples)
            .unwrap()
            .save(&artifact(".spl"))
            .unwrap();
        prefix
    }
}
