//! # Variant-Metadata Stream
//!
//! The `.bcf` artifact: a BGZF-compressed stream of site records, header
//! first. The header carries the contig dictionary; each record carries the
//! site fields and typed info values, including the mandatory `_row`
//! genotype-matrix row-id.
//!
//! Stream layout (all integers little-endian, inside the BGZF stream):
//! - magic `RGTS`, format version (1 byte)
//! - `u32` contig count, then per contig: `u16` name length + name, `u32` length
//! - site records until EOF (see `write_site`/`read_site`)
//!
//! Random access uses BGZF virtual positions: `SiteWriter::write_site`
//! returns the record's virtual offset, which the coordinate index stores.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use noodles::bgzf;

use crate::data::site::{InfoValue, Site};
use crate::error::{RegattaError, Result};

const SITES_MAGIC: [u8; 4] = *b"RGTS";
const SITES_VERSION: u8 = 1;

const INFO_TAG_FLAG: u8 = 0;
const INFO_TAG_INT: u8 = 1;
const INFO_TAG_FLOAT: u8 = 2;
const INFO_TAG_STR: u8 = 3;
const INFO_TAG_INTS: u8 = 4;

/// One contig of the site-stream header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub length: u32,
}

/// The in-memory site-stream header: the contig dictionary, whose order
/// defines `rid`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SiteHeader {
    pub contigs: Vec<Contig>,
}

impl SiteHeader {
    /// Resolve a contig name to its rid
    pub fn rid(&self, name: &str) -> Option<i32> {
        self.contigs
            .iter()
            .position(|c| c.name == name)
            .map(|i| i as i32)
    }

    /// Contig by rid
    pub fn contig(&self, rid: i32) -> Option<&Contig> {
        usize::try_from(rid).ok().and_then(|i| self.contigs.get(i))
    }

    /// Contig name by rid, failing on a dangling rid (a file-format error)
    pub fn contig_name(&self, rid: i32) -> Result<&str> {
        self.contig(rid)
            .map(|c| c.name.as_str())
            .ok_or_else(|| RegattaError::format(format!("rid {} not in contig dictionary", rid)))
    }
}

/// Reader over one store's site stream
pub struct SiteReader {
    inner: bgzf::Reader<File>,
    header: SiteHeader,
}

impl SiteReader {
    /// Open a site stream and read its header
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut inner = bgzf::Reader::new(file);

        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;
        if magic != SITES_MAGIC {
            return Err(RegattaError::format(format!(
                "'{}' is not a site stream (bad magic)",
                path.display()
            )));
        }
        let version = read_u8(&mut inner)?;
        if version != SITES_VERSION {
            return Err(RegattaError::format(format!(
                "unsupported site-stream version {}",
                version
            )));
        }

        let n_contigs = read_u32(&mut inner)?;
        let mut contigs = Vec::with_capacity(n_contigs as usize);
        for _ in 0..n_contigs {
            let name = read_str16(&mut inner)?;
            let length = read_u32(&mut inner)?;
            contigs.push(Contig { name, length });
        }

        Ok(Self {
            inner,
            header: SiteHeader { contigs },
        })
    }

    pub fn header(&self) -> &SiteHeader {
        &self.header
    }

    /// Seek to a record's BGZF virtual offset
    pub fn seek(&mut self, voffset: u64) -> Result<()> {
        self.inner.seek(bgzf::VirtualPosition::from(voffset))?;
        Ok(())
    }

    /// Read the next site, or `None` at end of stream
    pub fn read_site(&mut self) -> Result<Option<Site>> {
        let mut rid_buf = [0u8; 4];
        if !try_fill(&mut self.inner, &mut rid_buf)? {
            return Ok(None);
        }
        let rid = i32::from_le_bytes(rid_buf);
        let pos = read_i64(&mut self.inner)?;
        let rlen = read_i64(&mut self.inner)?;
        let qual = read_f32(&mut self.inner)?;
        let qual = if qual.is_nan() { None } else { Some(qual) };
        let id = read_str16(&mut self.inner)?;
        let id = if id.is_empty() { None } else { Some(id) };

        let n_alleles = read_u16(&mut self.inner)?;
        let mut alleles = Vec::with_capacity(n_alleles as usize);
        for _ in 0..n_alleles {
            alleles.push(read_str16(&mut self.inner)?);
        }

        let n_info = read_u16(&mut self.inner)?;
        let mut info = Vec::with_capacity(n_info as usize);
        for _ in 0..n_info {
            let key = read_str16(&mut self.inner)?;
            let value = match read_u8(&mut self.inner)? {
                INFO_TAG_FLAG => InfoValue::Flag,
                INFO_TAG_INT => InfoValue::Int(read_i64(&mut self.inner)?),
                INFO_TAG_FLOAT => InfoValue::Float(read_f32(&mut self.inner)?),
                INFO_TAG_STR => InfoValue::Str(read_str16(&mut self.inner)?),
                INFO_TAG_INTS => {
                    let n = read_u16(&mut self.inner)?;
                    let mut values = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        values.push(read_i64(&mut self.inner)?);
                    }
                    InfoValue::Ints(values)
                }
                tag => {
                    return Err(RegattaError::format(format!(
                        "unknown info value tag {}",
                        tag
                    )))
                }
            };
            info.push((key, value));
        }

        Ok(Some(Site {
            rid,
            pos,
            rlen,
            qual,
            id,
            alleles,
            info,
        }))
    }
}

/// Writer for one store's site stream (the codec's write half; used when
/// assembling stores)
pub struct SiteWriter {
    inner: bgzf::Writer<File>,
}

impl SiteWriter {
    /// Create a site stream and write its header
    pub fn create(path: &Path, header: &SiteHeader) -> Result<Self> {
        let file = File::create(path)?;
        let mut inner = bgzf::Writer::new(file);
        inner.write_all(&SITES_MAGIC)?;
        inner.write_all(&[SITES_VERSION])?;
        write_u32(&mut inner, header.contigs.len() as u32)?;
        for contig in &header.contigs {
            write_str16(&mut inner, &contig.name)?;
            write_u32(&mut inner, contig.length)?;
        }
        Ok(Self { inner })
    }

    /// Append one site; returns the record's BGZF virtual offset for the
    /// coordinate index
    pub fn write_site(&mut self, site: &Site) -> Result<u64> {
        let voffset = u64::from(self.inner.virtual_position());
        self.inner.write_all(&site.rid.to_le_bytes())?;
        write_i64(&mut self.inner, site.pos)?;
        write_i64(&mut self.inner, site.rlen)?;
        write_f32(&mut self.inner, site.qual.unwrap_or(f32::NAN))?;
        write_str16(&mut self.inner, site.id.as_deref().unwrap_or(""))?;

        write_u16(&mut self.inner, site.alleles.len() as u16)?;
        for allele in &site.alleles {
            write_str16(&mut self.inner, allele)?;
        }

        write_u16(&mut self.inner, site.info.len() as u16)?;
        for (key, value) in &site.info {
            write_str16(&mut self.inner, key)?;
            match value {
                InfoValue::Flag => self.inner.write_all(&[INFO_TAG_FLAG])?,
                InfoValue::Int(v) => {
                    self.inner.write_all(&[INFO_TAG_INT])?;
                    write_i64(&mut self.inner, *v)?;
                }
                InfoValue::Float(v) => {
                    self.inner.write_all(&[INFO_TAG_FLOAT])?;
                    write_f32(&mut self.inner, *v)?;
                }
                InfoValue::Str(s) => {
                    self.inner.write_all(&[INFO_TAG_STR])?;
                    write_str16(&mut self.inner, s)?;
                }
                InfoValue::Ints(values) => {
                    self.inner.write_all(&[INFO_TAG_INTS])?;
                    write_u16(&mut self.inner, values.len() as u16)?;
                    for v in values {
                        write_i64(&mut self.inner, *v)?;
                    }
                }
            }
        }
        Ok(voffset)
    }

    /// Flush remaining blocks and close the stream
    pub fn finish(self) -> Result<()> {
        self.inner.finish()?;
        Ok(())
    }
}

/// Fill `buf` exactly, or return `Ok(false)` on a clean EOF before the first
/// byte. EOF mid-buffer is a truncated record.
fn try_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated site record",
            ));
        }
        filled += n;
    }
    Ok(true)
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_str16<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u16(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| RegattaError::format("invalid UTF-8 in site stream"))
}

fn write_u16<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_i64<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_f32<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_str16<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    debug_assert!(bytes.len() <= u16::MAX as usize);
    write_u16(writer, bytes.len() as u16)?;
    writer.write_all(bytes)
}
