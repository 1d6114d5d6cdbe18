//! Container serialisation
//!
//! Binary formats are little-endian with `f64` values and `u64` indices
//! regardless of the in-memory types; the MatrixMarket variants are ASCII
//! array/coordinate files. Plain `.exp` export writes one value per line.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::containers::{DenseVector, SparseMatrixCsr, VectorOps};
use crate::error::{FemError, FemResult};
use crate::scalar::{DataType, IndexType};

const MAGIC_DV: u64 = 0x5646_4544_0001;
const MAGIC_CSR: u64 = 0x5253_4344_0001;

fn write_u64<W: Write>(w: &mut W, v: u64) -> FemResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> FemResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u64<R: Read>(r: &mut R) -> FemResult<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> FemResult<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

impl<DT: DataType> DenseVector<DT> {
    /// Writes the vector in the binary `.dv` format.
    pub fn write_dv<W: Write>(&self, w: &mut W) -> FemResult<()> {
        write_u64(w, MAGIC_DV)?;
        write_u64(w, self.size() as u64)?;
        for &v in self.elements() {
            write_f64(w, v.to_f64())?;
        }
        Ok(())
    }

    /// Reads a vector from the binary `.dv` format.
    pub fn read_dv<R: Read>(r: &mut R) -> FemResult<Self> {
        let magic = read_u64(r)?;
        if magic != MAGIC_DV {
            return Err(FemError::FileFormat("not a dv vector file".to_string()));
        }
        let size = read_u64(r)? as usize;
        let mut data = Vec::with_capacity(size);
        for _ in 0..size {
            data.push(DT::of(read_f64(r)?));
        }
        Ok(Self::from_vec(data))
    }

    pub fn write_dv_file(&self, path: impl AsRef<Path>) -> FemResult<()> {
        let mut w = BufWriter::new(std::fs::File::create(path)?);
        self.write_dv(&mut w)
    }

    pub fn read_dv_file(path: impl AsRef<Path>) -> FemResult<Self> {
        let mut r = BufReader::new(std::fs::File::open(path)?);
        Self::read_dv(&mut r)
    }

    /// Writes the vector as a MatrixMarket dense array.
    pub fn write_mtx<W: Write>(&self, w: &mut W) -> FemResult<()> {
        writeln!(w, "%%MatrixMarket matrix array real general")?;
        writeln!(w, "{} 1", self.size())?;
        for &v in self.elements() {
            writeln!(w, "{:.16e}", v.to_f64())?;
        }
        Ok(())
    }

    pub fn read_mtx<R: Read>(r: &mut R) -> FemResult<Self> {
        let reader = BufReader::new(r);
        let mut lines = reader.lines().enumerate();
        let header = next_content_line(&mut lines)?;
        if !header.starts_with("%%MatrixMarket matrix array real") {
            return Err(FemError::FileFormat(
                "not a MatrixMarket array file".to_string(),
            ));
        }
        let dims = next_content_line(&mut lines)?;
        let mut parts = dims.split_whitespace();
        let size: usize = parse_field(parts.next(), 0)?;
        let cols: usize = parse_field(parts.next(), 0)?;
        if cols != 1 {
            return Err(FemError::FileFormat(
                "vector mtx file must have one column".to_string(),
            ));
        }
        let mut data = Vec::with_capacity(size);
        for _ in 0..size {
            let line = next_content_line(&mut lines)?;
            data.push(DT::of(line.trim().parse::<f64>().map_err(|e| {
                FemError::FileFormat(format!("bad value: {e}"))
            })?));
        }
        Ok(Self::from_vec(data))
    }

    /// Plain text export, one value per line.
    pub fn write_exp<W: Write>(&self, w: &mut W) -> FemResult<()> {
        for &v in self.elements() {
            writeln!(w, "{:.16e}", v.to_f64())?;
        }
        Ok(())
    }

    /// Reads a plain text export.
    pub fn read_exp<R: Read>(r: &mut R) -> FemResult<Self> {
        let reader = BufReader::new(r);
        let mut data = Vec::new();
        for (no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            data.push(DT::of(trimmed.parse::<f64>().map_err(|_| {
                FemError::ParseError {
                    line: no + 1,
                    msg: "bad value".to_string(),
                }
            })?));
        }
        Ok(Self::from_vec(data))
    }
}

fn next_content_line(
    lines: &mut impl Iterator<Item = (usize, std::io::Result<String>)>,
) -> FemResult<String> {
    for (no, line) in lines.by_ref() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Comment lines start with a single %; the %% banner is content.
        if trimmed.starts_with('%') && !trimmed.starts_with("%%") {
            continue;
        }
        let _ = no;
        return Ok(line);
    }
    Err(FemError::FileFormat("unexpected end of file".to_string()))
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize) -> FemResult<T> {
    field
        .ok_or(FemError::ParseError {
            line,
            msg: "missing field".to_string(),
        })?
        .parse()
        .map_err(|_| FemError::ParseError {
            line,
            msg: "bad numeric field".to_string(),
        })
}

impl<DT: DataType, IT: IndexType> SparseMatrixCsr<DT, IT> {
    /// Writes the matrix in the binary CSR format.
    pub fn write_csr<W: Write>(&self, w: &mut W) -> FemResult<()> {
        write_u64(w, MAGIC_CSR)?;
        write_u64(w, self.rows() as u64)?;
        write_u64(w, self.columns() as u64)?;
        write_u64(w, self.used_elements() as u64)?;
        for &p in self.row_ptr() {
            write_u64(w, p.to_u64())?;
        }
        for &c in self.col_idx() {
            write_u64(w, c.to_u64())?;
        }
        for &v in self.values() {
            write_f64(w, v.to_f64())?;
        }
        Ok(())
    }

    pub fn read_csr<R: Read>(r: &mut R) -> FemResult<Self> {
        let magic = read_u64(r)?;
        if magic != MAGIC_CSR {
            return Err(FemError::FileFormat("not a csr matrix file".to_string()));
        }
        let rows = read_u64(r)? as usize;
        let columns = read_u64(r)? as usize;
        let nnz = read_u64(r)? as usize;
        let mut row_ptr = Vec::with_capacity(rows + 1);
        for _ in 0..=rows {
            row_ptr.push(IT::from_u64(read_u64(r)?));
        }
        let mut col_idx = Vec::with_capacity(nnz);
        for _ in 0..nnz {
            col_idx.push(IT::from_u64(read_u64(r)?));
        }
        let mut val = Vec::with_capacity(nnz);
        for _ in 0..nnz {
            val.push(DT::of(read_f64(r)?));
        }
        Self::from_raw(rows, columns, row_ptr, col_idx, val)
    }

    pub fn write_csr_file(&self, path: impl AsRef<Path>) -> FemResult<()> {
        let mut w = BufWriter::new(std::fs::File::create(path)?);
        self.write_csr(&mut w)
    }

    pub fn read_csr_file(path: impl AsRef<Path>) -> FemResult<Self> {
        let mut r = BufReader::new(std::fs::File::open(path)?);
        Self::read_csr(&mut r)
    }

    /// Writes the matrix as a MatrixMarket coordinate file (1-based).
    pub fn write_mtx<W: Write>(&self, w: &mut W) -> FemResult<()> {
        writeln!(w, "%%MatrixMarket matrix coordinate real general")?;
        writeln!(
            w,
            "{} {} {}",
            self.rows(),
            self.columns(),
            self.used_elements()
        )?;
        for i in 0..self.rows() {
            let a = self.row_ptr()[i].as_usize();
            let b = self.row_ptr()[i + 1].as_usize();
            for p in a..b {
                writeln!(
                    w,
                    "{} {} {:.16e}",
                    i + 1,
                    self.col_idx()[p].as_usize() + 1,
                    self.values()[p].to_f64()
                )?;
            }
        }
        Ok(())
    }

    pub fn read_mtx<R: Read>(r: &mut R) -> FemResult<Self> {
        let reader = BufReader::new(r);
        let mut lines = reader.lines().enumerate();
        let header = next_content_line(&mut lines)?;
        if !header.starts_with("%%MatrixMarket matrix coordinate real") {
            return Err(FemError::FileFormat(
                "not a MatrixMarket coordinate file".to_string(),
            ));
        }
        let dims = next_content_line(&mut lines)?;
        let mut parts = dims.split_whitespace();
        let rows: usize = parse_field(parts.next(), 0)?;
        let columns: usize = parse_field(parts.next(), 0)?;
        let nnz: usize = parse_field(parts.next(), 0)?;

        let mut builder = crate::containers::csr::CsrBuilder::new(rows, columns);
        for _ in 0..nnz {
            let line = next_content_line(&mut lines)?;
            let mut parts = line.split_whitespace();
            let i: usize = parse_field(parts.next(), 0)?;
            let j: usize = parse_field(parts.next(), 0)?;
            let v: f64 = parse_field(parts.next(), 0)?;
            builder.add(i - 1, j - 1, DT::of(v));
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::csr::CsrBuilder;

    #[test]
    fn test_dv_roundtrip_exact() {
        let v = DenseVector::from_fn(17, |i| (i as f64).sin() * 1e-3 + i as f64);
        let mut buf = Vec::new();
        v.write_dv(&mut buf).unwrap();
        let back = DenseVector::<f64>::read_dv(&mut buf.as_slice()).unwrap();
        assert!(v.bitwise_eq(&back));
    }

    #[test]
    fn test_mtx_roundtrip_vector() {
        let v = DenseVector::from_fn(5, |i| 1.0 / (i as f64 + 1.0));
        let mut buf = Vec::new();
        v.write_mtx(&mut buf).unwrap();
        let back = DenseVector::<f64>::read_mtx(&mut buf.as_slice()).unwrap();
        for i in 0..5 {
            assert!((v.at(i) - back.at(i)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_exp_roundtrip() {
        let v = DenseVector::from_fn(4, |i| (i as f64) * 0.5 - 1.0);
        let mut buf = Vec::new();
        v.write_exp(&mut buf).unwrap();
        let back = DenseVector::<f64>::read_exp(&mut buf.as_slice()).unwrap();
        for i in 0..4 {
            assert!((v.at(i) - back.at(i)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_csr_roundtrip() {
        let mut b = CsrBuilder::new(3, 3);
        b.add(0, 0, 4.0);
        b.add(0, 2, -0.125);
        b.add(1, 1, 2.0);
        b.add(2, 0, 1.0 / 3.0);
        let m: SparseMatrixCsr<f64, u64> = b.build();

        let mut buf = Vec::new();
        m.write_csr(&mut buf).unwrap();
        let back = SparseMatrixCsr::<f64, u64>::read_csr(&mut buf.as_slice()).unwrap();
        assert_eq!(m.rows(), back.rows());
        assert_eq!(m.row_ptr(), back.row_ptr());
        assert_eq!(m.col_idx(), back.col_idx());
        for (a, b) in m.values().iter().zip(back.values()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_mtx_roundtrip_matrix() {
        let mut b = CsrBuilder::new(2, 2);
        b.add(0, 0, 1.5);
        b.add(1, 0, -2.25);
        b.add(1, 1, 0.75);
        let m: SparseMatrixCsr<f64, u32> = b.build();

        let mut buf = Vec::new();
        m.write_mtx(&mut buf).unwrap();
        let back = SparseMatrixCsr::<f64, u32>::read_mtx(&mut buf.as_slice()).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert!((m.get(i, j) - back.get(i, j)).abs() < 1e-12);
            }
        }
    }
}
