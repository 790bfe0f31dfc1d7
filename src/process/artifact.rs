//! On-disk partial results for the process engine.
//!
//! An artifact is a raw dump of `i32` values, little-endian, row-major, with
//! no header or length prefix. The reader has to know how many values to
//! expect; for partition `p` of an n×n product that is `rows(p) * n`.
//!
//! Partition `p` is always stored at `c_parallel{p}.bin` inside the artifact
//! directory. Inputs handed to child processes use the same encoding.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ArtifactFailure, MatmulError, Result};
use crate::matrix::Matrix;
use crate::partition::PartitionPlan;

const CELL_BYTES: usize = std::mem::size_of::<i32>();

/// Where partition `partition` writes its rows inside `dir`.
pub fn artifact_path(dir: &Path, partition: usize) -> PathBuf {
    dir.join(format!("c_parallel{}.bin", partition))
}

/// Where the left operand is dumped for child processes.
pub fn lhs_path(dir: &Path) -> PathBuf {
    dir.join("a.bin")
}

/// Where the (possibly transposed) right operand is dumped for child processes.
pub fn rhs_path(dir: &Path) -> PathBuf {
    dir.join("b.bin")
}

/// Where the serial product is saved when a run keeps its artifacts.
pub fn serial_path(dir: &Path) -> PathBuf {
    dir.join("c_serial.bin")
}

pub fn write_rows(path: &Path, values: &[i32]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    w.flush()
}

/// Read exactly `dst.len()` values from `path` into `dst`.
///
/// A file that is shorter or longer than expected is an error; nothing is
/// written to `dst` in that case.
pub fn read_into(path: &Path, dst: &mut [i32]) -> io::Result<()> {
    let bytes = fs::read(path)?;
    let expected = dst.len() * CELL_BYTES;
    if bytes.len() != expected {
        let kind = if bytes.len() < expected {
            io::ErrorKind::UnexpectedEof
        } else {
            io::ErrorKind::InvalidData
        };
        return Err(io::Error::new(
            kind,
            format!("artifact holds {} bytes, expected {}", bytes.len(), expected),
        ));
    }

    for (v, chunk) in dst.iter_mut().zip(bytes.chunks_exact(CELL_BYTES)) {
        *v = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

pub fn read_rows(path: &Path, len: usize) -> io::Result<Vec<i32>> {
    let mut values = vec![0; len];
    read_into(path, &mut values)?;
    Ok(values)
}

/// Dump a whole matrix.
pub fn write_matrix(path: &Path, m: &Matrix) -> Result<()> {
    write_rows(path, m.as_slice()).map_err(|source| MatmulError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a whole n×n matrix written by [`write_matrix`].
pub fn read_matrix(path: &Path, n: usize) -> Result<Matrix> {
    let mut m = Matrix::try_zeros(n)?;
    read_into(path, m.as_mut_slice()).map_err(|source| MatmulError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(m)
}

/// Delete any artifact a previous run left for the partitions of `plan`,
/// so a worker that never writes cannot be masked by stale data.
pub fn clear(dir: &Path, plan: &PartitionPlan) -> Result<()> {
    for part in plan.partitions() {
        let path = artifact_path(dir, part.index);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(MatmulError::Io { path, source }),
        }
    }
    Ok(())
}

/// Rebuild the full product from one artifact per partition.
///
/// Reads `plan.workers() + 1` artifacts, each into the row offset its
/// partition index implies, so the read order does not matter. Every
/// missing, unreadable or wrongly sized artifact is collected into one
/// [`MatmulError::ArtifactIoFailure`].
pub fn assemble(dir: &Path, plan: &PartitionPlan) -> Result<Matrix> {
    let mut c = Matrix::try_zeros(plan.n())?;
    let mut failures = Vec::new();

    for part in plan.partitions() {
        let path = artifact_path(dir, part.index);
        let dst = c.rows_mut(part.rows.clone());
        if let Err(source) = read_into(&path, dst) {
            tracing::warn!(partition = part.index, path = %path.display(), error = %source, "artifact unreadable");
            failures.push(ArtifactFailure {
                partition: part.index,
                path,
                source,
            });
        }
    }

    if failures.is_empty() {
        Ok(c)
    } else {
        Err(MatmulError::ArtifactIoFailure { failures })
    }
}
