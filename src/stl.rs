//! Binary STL container streaming.
//!
//! The container is an 80-byte opaque header, a little-endian u32 triangle
//! count, and one 50-byte record per triangle (normal, three vertices, a
//! 2-byte attribute). Reading never materializes the whole mesh; writing
//! goes through [`TileStream`], which back-patches the count on close.

use crate::geometry::{Point3D, Triangle};
use crate::{Error, Result};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};

pub const HEADER_LEN: usize = 80;
pub const RECORD_LEN: usize = 50;

/// Input buffer size for the streaming reader
const READ_BUFFER: usize = 64 * 1024;

/// Axis-aligned bounding box of a mesh in world millimeters
#[derive(Debug, Clone, Copy)]
pub struct MeshBounds {
    pub min: Point3D,
    pub max: Point3D,
}

impl MeshBounds {
    fn empty() -> Self {
        Self {
            min: Point3D::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3D::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    fn update(&mut self, p: &Point3D) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Streaming reader over a binary STL byte source.
///
/// Yields triangles one record at a time; the stored facet normal is ignored
/// (normals are recomputed from winding on write).
#[derive(Debug)]
pub struct StlReader<R: Read> {
    input: BufReader<R>,
    total: u32,
    read: u32,
}

impl<R: Read> StlReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        let mut input = BufReader::with_capacity(READ_BUFFER, inner);

        let mut header = [0u8; HEADER_LEN];
        read_fully(&mut input, &mut header, "header")?;

        let mut count = [0u8; 4];
        read_fully(&mut input, &mut count, "triangle count")?;

        Ok(Self {
            input,
            total: u32::from_le_bytes(count),
            read: 0,
        })
    }

    /// Triangle count declared by the container header
    pub fn triangle_count(&self) -> u32 {
        self.total
    }

    fn next_record(&mut self) -> Result<Triangle> {
        let mut record = [0u8; RECORD_LEN];
        self.input.read_exact(&mut record).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::Format(format!(
                    "container truncated: {} of {} records present",
                    self.read, self.total
                ))
            } else {
                Error::Io(e)
            }
        })?;
        self.read += 1;

        // Skip the 12 normal bytes; vertices start at offset 12.
        let mut coords = [0f64; 9];
        for (i, c) in coords.iter_mut().enumerate() {
            let at = 12 + i * 4;
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&record[at..at + 4]);
            *c = f32::from_le_bytes(raw) as f64;
        }

        Ok(Triangle::new(
            Point3D::new(coords[0], coords[1], coords[2]),
            Point3D::new(coords[3], coords[4], coords[5]),
            Point3D::new(coords[6], coords[7], coords[8]),
        ))
    }
}

impl<R: Read> Iterator for StlReader<R> {
    type Item = Result<Triangle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.read >= self.total {
            return None;
        }
        Some(self.next_record())
    }
}

fn read_fully<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::Format(format!("container shorter than its {what}"))
        } else {
            Error::Io(e)
        }
    })
}

/// Scan every vertex of the container and return the world bounding box.
pub fn scan_bounds<R: Read>(reader: StlReader<R>) -> Result<MeshBounds> {
    if reader.triangle_count() == 0 {
        return Err(Error::Format("container holds no triangles".into()));
    }

    let mut bounds = MeshBounds::empty();
    for tri in reader {
        let tri = tri?;
        for v in tri.vertices() {
            bounds.update(&v);
        }
    }
    Ok(bounds)
}

/// Open output stream for one tile.
///
/// Records are appended as they arrive; the header's count field is written
/// once on [`finish`](TileStream::finish), when the final count is known.
pub struct TileStream<W: Write + Seek> {
    out: BufWriter<W>,
    count: u32,
}

impl<W: Write + Seek> TileStream<W> {
    /// Write the 80-byte header (from `note`, zero-padded) and a zero count.
    pub fn create(inner: W, note: &str) -> io::Result<Self> {
        let mut out = BufWriter::with_capacity(READ_BUFFER, inner);

        let mut header = [0u8; HEADER_LEN];
        let bytes = note.as_bytes();
        let n = bytes.len().min(HEADER_LEN);
        header[..n].copy_from_slice(&bytes[..n]);
        out.write_all(&header)?;
        out.write_all(&0u32.to_le_bytes())?;

        Ok(Self { out, count: 0 })
    }

    /// Append one triangle record. The facet normal is recomputed from the
    /// vertex ordering; the attribute field is zero.
    pub fn push(&mut self, tri: &Triangle) -> io::Result<()> {
        let n = tri.normal();
        write_f32(&mut self.out, n.x)?;
        write_f32(&mut self.out, n.y)?;
        write_f32(&mut self.out, n.z)?;
        for v in tri.vertices() {
            write_f32(&mut self.out, v.x)?;
            write_f32(&mut self.out, v.y)?;
            write_f32(&mut self.out, v.z)?;
        }
        self.out.write_all(&0u16.to_le_bytes())?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Flush, rewrite the count field, and return the underlying stream
    /// together with the final triangle count.
    pub fn finish(mut self) -> io::Result<(W, u32)> {
        self.out.flush()?;
        self.out.seek(SeekFrom::Start(HEADER_LEN as u64))?;
        self.out.write_all(&self.count.to_le_bytes())?;
        self.out.flush()?;
        let inner = self.out.into_inner().map_err(|e| e.into_error())?;
        Ok((inner, self.count))
    }
}

fn write_f32<W: Write>(out: &mut W, value: f64) -> io::Result<()> {
    out.write_all(&(value as f32).to_le_bytes())
}
