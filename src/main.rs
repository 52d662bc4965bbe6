//! # Application Entry Point
//!
//! Opens the requested stores, wires up a `MultiReader` from the CLI
//! options, and streams the merged query result as VCF text.

use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use regatta::data::atom;
use regatta::data::site::Site;
use regatta::io::vcf;
use regatta::{AlleleKey, BedMask, Config, GroupSpec, MergedRec, MultiReader, Store};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;
    run(&config)
}

fn run(config: &Config) -> anyhow::Result<()> {
    let stores = config
        .stores
        .iter()
        .map(|prefix| Store::open(prefix))
        .collect::<regatta::Result<Vec<Arc<Store>>>>()?;
    let mut reader = MultiReader::new(&stores)?;

    for spec in &config.groups {
        reader.add_group(&GroupSpec::from_arg(spec)?)?;
    }

    let allele = config
        .allele
        .as_deref()
        .map(AlleleKey::parse)
        .transpose()?;
    if let Some(region) = &config.region {
        reader.set_region(region)?;
    } else if let Some(key) = &allele {
        // an allele key narrows the scan to its own footprint
        let end = key.pos + key.rlen.max(1);
        reader.set_region(&format!("{}:{}-{}", key.chrom, key.pos + 1, end))?;
    } else if let Some(start) = config.start {
        reader.set_start(start)?;
    }

    if let Some(path) = &config.bed {
        let mask = Arc::new(BedMask::load(path)?);
        reader.set_bed(mask, config.bed_exclude);
    }

    reader.set_no_genotypes(config.no_genotypes);
    reader.set_allele_counts(config.counts || config.min_ac.is_some());
    if let Some(min_ac) = config.min_ac {
        reader.set_filter(Box::new(move |_site, counts| counts.ac1 < min_ac));
    }

    let mut out: BufWriter<Box<dyn Write>> = BufWriter::new(match &config.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create '{}'", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    });

    reader.prepare()?;
    out.write_all(
        reader
            .header_out()
            .expect("prepared reader has a header")
            .as_bytes(),
    )?;

    let mut n_records = 0u64;
    while let Some(rec) = reader.read()? {
        if let Some(key) = &allele {
            if !record_has_allele(&rec.site, key)? {
                continue;
            }
        }
        let contig = reader.contig_name(rec.site.rid)?.to_string();
        if config.atomize {
            write_atoms(&mut out, &contig, &rec)?;
        } else {
            writeln!(
                out,
                "{}",
                vcf::format_record(&contig, &rec.site, rec.genotypes.as_deref())
            )?;
        }
        n_records += 1;
    }
    out.flush()?;
    tracing::info!(records = n_records, "query finished");
    Ok(())
}

/// Does any atom of the record match the normalized key?
fn record_has_allele(site: &Site, key: &AlleleKey) -> regatta::Result<bool> {
    let atoms = atom::atomize(site, &[], 2)?;
    Ok(atoms.iter().any(|a| {
        a.pos == key.pos && a.rlen == key.rlen && a.alt_seq.eq_ignore_ascii_case(&key.alt)
    }))
}

/// Decompose one merged record and write each atom as its own data line.
/// Atom genotype codes reuse the 2-bit convention, so they map through the
/// same typed-byte table; carriers of overlapping other alleles surface as
/// the `<M>` allele.
fn write_atoms<W: Write>(out: &mut W, contig: &str, rec: &MergedRec) -> anyhow::Result<()> {
    let gt = rec.genotypes.as_deref().unwrap_or(&[]);
    let atoms = atom::atomize(&rec.site, gt, 2)?;
    for a in &atoms {
        let mut alleles = vec![a.ref_seq.clone(), a.alt_seq.clone()];
        if a.gt.iter().any(|&c| c == 3) {
            alleles.push(regatta::data::site::MULTI_ALLELE.to_string());
        }
        let site = Site::new(a.rid, a.pos, a.rlen, alleles);
        let genotypes: Option<Vec<u8>> = rec
            .genotypes
            .is_some()
            .then(|| a.gt.iter().map(|&c| vcf::BITS2GT[c as usize]).collect());
        writeln!(
            out,
            "{}",
            vcf::format_record(contig, &site, genotypes.as_deref())
        )?;
    }
    Ok(())
}
