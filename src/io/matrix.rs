//! # Genotype Matrix
//!
//! The `.pbf` artifact: a two-plane bit matrix with one row per site and one
//! column per haplotype (two adjacent columns per sample). The combined 2-bit
//! genotype code of column `c` is `(plane1[c] << 1) | plane0[c]`.
//!
//! Rows have a fixed stride, so the file is memory-mapped and addressed
//! directly: row `r` lives at `HEADER_LEN + r * 2 * stride`, plane 0 first.
//! Bits are LSB-first within each byte.
//!
//! File layout: magic `RGTM`, version byte, 3 padding bytes, `u32 n_rows`,
//! `u32 n_cols`, then the rows.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use bitvec::prelude::*;
use bytemuck::pod_read_unaligned;
use memmap2::Mmap;

use crate::error::{RegattaError, Result};

const MATRIX_MAGIC: [u8; 4] = *b"RGTM";
const MATRIX_VERSION: u8 = 1;
const HEADER_LEN: usize = 16;

fn plane_stride(n_cols: u32) -> usize {
    (n_cols as usize + 7) / 8
}

/// Random-access reader over one store's genotype matrix
pub struct MatrixReader {
    mmap: Mmap,
    n_rows: u32,
    n_cols: u32,
    stride: usize,
    /// cursor for the next `read`
    row: u32,
    /// selected haplotype columns, in output order
    subset: Vec<u32>,
    /// decoded planes, reused across reads
    planes: [Vec<u8>; 2],
}

impl MatrixReader {
    /// Open and validate a genotype-matrix file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_LEN || mmap[0..4] != MATRIX_MAGIC {
            return Err(RegattaError::format(format!(
                "'{}' is not a genotype matrix (bad magic)",
                path.display()
            )));
        }
        if mmap[4] != MATRIX_VERSION {
            return Err(RegattaError::format(format!(
                "unsupported genotype-matrix version {}",
                mmap[4]
            )));
        }
        let n_rows: u32 = pod_read_unaligned(&mmap[8..12]);
        let n_cols: u32 = pod_read_unaligned(&mmap[12..16]);
        let stride = plane_stride(n_cols);
        let expected = HEADER_LEN + n_rows as usize * 2 * stride;
        if mmap.len() != expected {
            return Err(RegattaError::format(format!(
                "genotype matrix '{}' is {} bytes, expected {}",
                path.display(),
                mmap.len(),
                expected
            )));
        }

        let subset = (0..n_cols).collect();
        Ok(Self {
            mmap,
            n_rows,
            n_cols,
            stride,
            row: 0,
            subset,
            planes: [Vec::new(), Vec::new()],
        })
    }

    /// Number of rows (sites)
    pub fn n_rows(&self) -> u32 {
        self.n_rows
    }

    /// Number of haplotype columns (2 per sample)
    pub fn n_cols(&self) -> u32 {
        self.n_cols
    }

    /// Restrict subsequent reads to the given columns, in the given order
    pub fn subset_columns(&mut self, cols: &[u32]) -> Result<()> {
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.n_cols) {
            return Err(RegattaError::format(format!(
                "haplotype column {} out of range (matrix has {})",
                bad, self.n_cols
            )));
        }
        self.subset = cols.to_vec();
        Ok(())
    }

    /// Position the cursor on a row
    pub fn seek(&mut self, row: i64) -> Result<()> {
        if row < 0 || row as u64 >= self.n_rows as u64 {
            return Err(RegattaError::format(format!(
                "matrix row {} out of range (matrix has {})",
                row, self.n_rows
            )));
        }
        self.row = row as u32;
        Ok(())
    }

    /// Decode the cursor row's two planes restricted to the column subset
    /// and advance the cursor. The returned slices are valid until the next
    /// call and hold one 0/1 byte per selected column.
    pub fn read(&mut self) -> Result<(&[u8], &[u8])> {
        if self.row >= self.n_rows {
            return Err(RegattaError::format(format!(
                "matrix read past row {}",
                self.n_rows
            )));
        }
        let base = HEADER_LEN + self.row as usize * 2 * self.stride;
        for plane in 0..2 {
            let raw = &self.mmap[base + plane * self.stride..base + (plane + 1) * self.stride];
            let bits = BitSlice::<u8, Lsb0>::from_slice(raw);
            let out = &mut self.planes[plane];
            out.clear();
            out.extend(self.subset.iter().map(|&c| bits[c as usize] as u8));
        }
        self.row += 1;
        Ok((&self.planes[0], &self.planes[1]))
    }
}

/// Writer for a genotype matrix (the codec's write half)
pub struct MatrixWriter {
    file: File,
    n_cols: u32,
    n_rows: u32,
}

impl MatrixWriter {
    /// Create a matrix file for `n_cols` haplotype columns
    pub fn create(path: &Path, n_cols: u32) -> Result<Self> {
        let mut file = File::create(path)?;
        file.write_all(&MATRIX_MAGIC)?;
        file.write_all(&[MATRIX_VERSION, 0, 0, 0])?;
        file.write_all(&0u32.to_le_bytes())?; // n_rows, patched by finish
        file.write_all(&n_cols.to_le_bytes())?;
        Ok(Self {
            file,
            n_cols,
            n_rows: 0,
        })
    }

    /// Append one row from its two full-width planes (0/1 bytes per column)
    pub fn write_row(&mut self, plane0: &[u8], plane1: &[u8]) -> Result<()> {
        if plane0.len() != self.n_cols as usize || plane1.len() != self.n_cols as usize {
            return Err(RegattaError::format(format!(
                "matrix row has {}+{} columns, expected {}",
                plane0.len(),
                plane1.len(),
                self.n_cols
            )));
        }
        for plane in [plane0, plane1] {
            let mut bits = bitvec![u8, Lsb0; 0; self.n_cols as usize];
            for (i, &v) in plane.iter().enumerate() {
                if v != 0 {
                    bits.set(i, true);
                }
            }
            self.file.write_all(bits.as_raw_slice())?;
        }
        self.n_rows += 1;
        Ok(())
    }

    /// Patch the row count into the header and close
    pub fn finish(mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(8))?;
        self.file.write_all(&self.n_rows.to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_matrix(path: &Path, n_cols: u32, rows: &[(Vec<u8>, Vec<u8>)]) {
        let mut w = MatrixWriter::create(path, n_cols).unwrap();
        for (a0, a1) in rows {
            w.write_row(a0, a1).unwrap();
        }
        w.finish().unwrap();
    }

    #[test]
    fn test_roundtrip_full_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        write_matrix(
            &path,
            4,
            &[
                (vec![0, 1, 0, 0], vec![0, 0, 0, 1]),
                (vec![1, 1, 1, 1], vec![0, 0, 0, 0]),
            ],
        );

        let mut r = MatrixReader::open(&path).unwrap();
        assert_eq!(r.n_rows(), 2);
        assert_eq!(r.n_cols(), 4);
        let (a0, a1) = r.read().unwrap();
        assert_eq!(a0, &[0, 1, 0, 0]);
        assert_eq!(a1, &[0, 0, 0, 1]);
        let (a0, _) = r.read().unwrap();
        assert_eq!(a0, &[1, 1, 1, 1]);
        assert!(r.read().is_err());
    }

    #[test]
    fn test_subset_and_seek() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        // 10 columns so the row spans more than one byte
        let a0: Vec<u8> = (0..10).map(|i| (i % 2) as u8).collect();
        let a1: Vec<u8> = (0..10).map(|i| (i % 3 == 0) as u8).collect();
        write_matrix(&path, 10, &[(a0.clone(), a1.clone()), (a1.clone(), a0.clone())]);

        let mut r = MatrixReader::open(&path).unwrap();
        r.subset_columns(&[8, 9, 0, 1]).unwrap();
        r.seek(1).unwrap();
        let (p0, p1) = r.read().unwrap();
        assert_eq!(p0, &[a1[8], a1[9], a1[0], a1[1]]);
        assert_eq!(p1, &[a0[8], a0[9], a0[0], a0[1]]);

        r.seek(0).unwrap();
        let (p0, _) = r.read().unwrap();
        assert_eq!(p0, &[a0[8], a0[9], a0[0], a0[1]]);
    }

    #[test]
    fn test_bounds_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        write_matrix(&path, 2, &[(vec![0, 1], vec![1, 0])]);

        let mut r = MatrixReader::open(&path).unwrap();
        assert!(r.subset_columns(&[2]).is_err());
        assert!(r.seek(1).is_err());
        assert!(r.seek(-1).is_err());
    }

    #[test]
    fn test_truncated_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.pbf");
        write_matrix(&path, 8, &[(vec![0; 8], vec![0; 8])]);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
        assert!(matches!(
            MatrixReader::open(&path),
            Err(RegattaError::Format { .. })
        ));
    }
}
