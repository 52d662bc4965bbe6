//! Single-store query scenarios: reading, regions, row starts, sample
//! groups and BED masks against real on-disk stores.

mod common;

use std::sync::Arc;

use common::StoreBuilder;
use regatta::io::vcf;
use regatta::{BedMask, GroupSpec, MultiReader, Reader, RegattaError, Store};

/// Two samples, one biallelic site with codes 00,01,00,10
fn two_sample_store(dir: &std::path::Path) -> std::path::PathBuf {
    StoreBuilder::new()
        .contig("chr1", 1000)
        .sample("A", &[("pop", "CEU"), ("age", "41")])
        .sample("B", &[("pop", "YRI"), ("age", "28")])
        .site(0, 99, 1, &["A", "T"], vec![0, 1, 0, 0], vec![0, 0, 0, 1])
        .build(dir, "cohort")
}

#[test]
fn single_site_two_samples() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_sample_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();

    let rec = reader.read().unwrap().expect("one record");
    assert_eq!(rec.row, 0);
    assert_eq!(rec.site.pos, 99);
    assert_eq!(rec.site.alleles, vec!["A", "T"]);
    assert_eq!(rec.planes[0], vec![0, 1, 0, 0]);
    assert_eq!(rec.planes[1], vec![0, 0, 0, 1]);

    // REF, ALT, REF, missing
    assert_eq!(reader.genotypes(&rec), vec![2, 4, 2, 0]);
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn all_samples_width_matches_sample_table() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_sample_store(dir.path())).unwrap();
    let n_samples = store.samples().len();
    let mut reader = Reader::new(store).unwrap();
    reader.prepare().unwrap();

    assert_eq!(reader.n_out(), n_samples);
    let rec = reader.read().unwrap().unwrap();
    assert_eq!(reader.genotypes(&rec).len(), 2 * n_samples);
}

#[test]
fn counts_on_single_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_sample_store(dir.path())).unwrap();
    let mut reader = MultiReader::new(&[store]).unwrap();
    reader.set_allele_counts(true);

    let rec = reader.read().unwrap().expect("one record");
    // AN = 4 haplotypes - 1 missing, AC = [1]
    assert_eq!(rec.site.info_int("AN"), Some(3));
    assert_eq!(
        rec.site.info("AC"),
        Some(&regatta::InfoValue::Ints(vec![1]))
    );
    assert_eq!(rec.genotypes.as_deref(), Some(&[2u8, 4, 2, 0][..]));
}

fn two_contig_store(dir: &std::path::Path) -> std::path::PathBuf {
    StoreBuilder::new()
        .contig("chr1", 1000)
        .contig("chr2", 1000)
        .sample("A", &[("pop", "CEU")])
        .sample("B", &[("pop", "YRI")])
        .site(0, 99, 1, &["A", "T"], vec![0, 1, 0, 0], vec![0, 0, 0, 0])
        .site(0, 499, 2, &["AC", "A"], vec![1, 1, 0, 0], vec![0, 0, 0, 0])
        .site(1, 42, 1, &["G", "C"], vec![0, 0, 1, 1], vec![0, 0, 0, 0])
        .build(dir, "two_contigs")
}

#[test]
fn region_filter_restricts_to_contig() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    reader.set_region("chr1").unwrap();

    let mut positions = Vec::new();
    while let Some(rec) = reader.read().unwrap() {
        positions.push((rec.site.rid, rec.site.pos));
    }
    assert_eq!(positions, vec![(0, 99), (0, 499)]);
}

#[test]
fn region_filter_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    reader.set_region("chr1:400-600").unwrap();

    let rec = reader.read().unwrap().expect("one record in window");
    assert_eq!(rec.site.pos, 499);
    assert_eq!(rec.row, 1);
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn bad_region_leaves_reader_usable() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    assert!(matches!(
        reader.set_region("chrX:1-2"),
        Err(RegattaError::BadRegion { .. })
    ));
    // prior state (no region) still reads everything
    let mut n = 0;
    while reader.read().unwrap().is_some() {
        n += 1;
    }
    assert_eq!(n, 3);
}

#[test]
fn set_start_skips_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    reader.set_start(1).unwrap();

    let rec = reader.read().unwrap().unwrap();
    assert_eq!(rec.row, 1);
    let rec = reader.read().unwrap().unwrap();
    assert_eq!(rec.row, 2);
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn predicate_group_selects_subset() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    reader
        .add_group(&GroupSpec::Expr("pop==\"YRI\"".into()))
        .unwrap();

    let rec = reader.read().unwrap().unwrap();
    assert_eq!(reader.samples(), &[1]);
    // only B's two columns survive the subset
    assert_eq!(rec.planes[0], vec![0, 0]);
    assert_eq!(reader.sample_names(), vec!["B"]);
}

#[test]
fn name_group_ignores_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    reader
        .add_group(&GroupSpec::Names(vec!["B".into(), "NOPE".into()]))
        .unwrap();
    reader.prepare().unwrap();
    assert_eq!(reader.samples(), &[1]);
}

#[test]
fn group_cap_is_eight() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    for _ in 0..8 {
        reader.add_group(&GroupSpec::All).unwrap();
    }
    assert!(matches!(
        reader.add_group(&GroupSpec::All),
        Err(RegattaError::TooManyGroups { .. })
    ));
    assert_eq!(reader.n_groups(), 8);
}

#[test]
fn bed_mask_include_and_exclude() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_contig_store(dir.path())).unwrap();
    let mask = Arc::new(BedMask::from_intervals([("chr1", 90, 110)]));

    let mut reader = Reader::new(Arc::clone(&store)).unwrap();
    reader.set_bed(Arc::clone(&mask), false);
    let mut kept = Vec::new();
    while let Some(rec) = reader.read().unwrap() {
        kept.push((rec.site.rid, rec.site.pos));
    }
    assert_eq!(kept, vec![(0, 99)]);

    let mut reader = Reader::new(store).unwrap();
    reader.set_bed(mask, true);
    let mut kept = Vec::new();
    while let Some(rec) = reader.read().unwrap() {
        kept.push((rec.site.rid, rec.site.pos));
    }
    assert_eq!(kept, vec![(0, 499), (1, 42)]);
}

#[test]
fn store_header_lists_selected_samples() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_sample_store(dir.path())).unwrap();
    let mut reader = Reader::new(store).unwrap();
    reader.prepare().unwrap();
    let header = reader.header_out().unwrap();
    assert!(header.contains("##contig=<ID=chr1,length=1000>"));
    assert!(header.ends_with("FORMAT\tA\tB\n"));
}

#[test]
fn record_renders_as_vcf_line() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(two_sample_store(dir.path())).unwrap();
    let mut reader = MultiReader::new(&[store]).unwrap();
    reader.set_allele_counts(true);
    let rec = reader.read().unwrap().unwrap();
    let line = vcf::format_record(
        reader.contig_name(rec.site.rid).unwrap(),
        &rec.site,
        rec.genotypes.as_deref(),
    );
    assert_eq!(
        line,
        "chr1\t100\t.\tA\tT\t.\t.\t_row=0;AN=3;AC=1\tGT\t0/1\t0/."
    );
}
