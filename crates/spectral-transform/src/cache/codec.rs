//! Byte layouts of cached Legendre tables and weight segments.
//!
//! All integers and floats are little-endian.
//!
//! Legendre table: `b"RLEG"`, version `u32`, truncation `u32`, latitude
//! count `u32`, latitudes `f64 * n`, values `f64 * n * (T+1)(T+2)/2`.
//!
//! Weight segment: triplet count `i64`, then `(row: i32, col: i32,
//! weight: f64)` per triplet.

use regrid_common::{RegridError, Result};

use crate::legendre::{triangle_size, LegendreTable};

const LEGENDRE_MAGIC: &[u8; 4] = b"RLEG";
const LEGENDRE_VERSION: u32 = 1;

/// One sparse matrix entry.
pub type Triplet = (i32, i32, f64);

const TRIPLET_SIZE: usize = 4 + 4 + 8;

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.offset + N;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| RegridError::resource_unavailable("truncated cache blob"))?;
        self.offset = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn f64s(&mut self, count: usize) -> Result<Vec<f64>> {
        (0..count).map(|_| self.f64()).collect()
    }
}

/// Serialise a Legendre table.
pub fn encode_legendre(table: &LegendreTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + table.memory_usage());
    out.extend_from_slice(LEGENDRE_MAGIC);
    out.extend_from_slice(&LEGENDRE_VERSION.to_le_bytes());
    out.extend_from_slice(&(table.truncation() as u32).to_le_bytes());
    out.extend_from_slice(&(table.latitudes().len() as u32).to_le_bytes());
    for v in table.latitudes().iter().chain(table.values()) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parse a Legendre table written by [`encode_legendre`].
pub fn decode_legendre(bytes: &[u8]) -> Result<LegendreTable> {
    let mut r = Reader::new(bytes);
    let magic: [u8; 4] = r.take()?;
    if &magic != LEGENDRE_MAGIC {
        return Err(RegridError::resource_unavailable("not a Legendre table"));
    }
    let version = r.u32()?;
    if version != LEGENDRE_VERSION {
        return Err(RegridError::resource_unavailable(format!(
            "unsupported Legendre table version {}",
            version
        )));
    }
    let truncation = r.u32()? as usize;
    let count = r.u32()? as usize;
    let latitudes = r.f64s(count)?;
    let values = r.f64s(count * triangle_size(truncation))?;
    if r.offset != bytes.len() {
        return Err(RegridError::resource_unavailable("trailing bytes after Legendre table"));
    }
    LegendreTable::from_parts(truncation, latitudes, values)
}

/// Serialise weight triplets into the segment layout.
pub fn encode_triplets(triplets: &[Triplet]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + triplets.len() * TRIPLET_SIZE);
    out.extend_from_slice(&(triplets.len() as i64).to_le_bytes());
    for &(row, col, w) in triplets {
        out.extend_from_slice(&row.to_le_bytes());
        out.extend_from_slice(&col.to_le_bytes());
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}

/// Parse a weight segment.
pub fn decode_triplets(bytes: &[u8]) -> Result<Vec<Triplet>> {
    let mut r = Reader::new(bytes);
    let count = r.i64()?;
    let count = usize::try_from(count)
        .map_err(|_| RegridError::resource_unavailable(format!("negative triplet count {}", count)))?;
    if bytes.len() != 8 + count * TRIPLET_SIZE {
        return Err(RegridError::resource_unavailable(format!(
            "weight segment of {} bytes cannot hold {} triplets",
            bytes.len(),
            count
        )));
    }
    (0..count).map(|_| Ok((r.i32()?, r.i32()?, r.f64()?))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legendre_blob_layout() {
        let table = LegendreTable::compute(3, &[60.0, 20.0]);
        let bytes = encode_legendre(&table);
        assert_eq!(&bytes[..4], b"RLEG");
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 3);
        assert_eq!(bytes.len(), 16 + 8 * (2 + 2 * 10));
        assert_eq!(decode_legendre(&bytes).unwrap(), table);
    }

    #[test]
    fn test_legendre_truncated_blob() {
        let bytes = encode_legendre(&LegendreTable::compute(2, &[10.0]));
        assert!(decode_legendre(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode_legendre(b"XXXX").is_err());
    }

    #[test]
    fn test_triplet_segment_layout() {
        let triplets = vec![(0, 3, 0.25), (1, 7, 0.75)];
        let bytes = encode_triplets(&triplets);
        assert_eq!(i64::from_le_bytes(bytes[..8].try_into().unwrap()), 2);
        assert_eq!(bytes.len(), 8 + 2 * 16);
        assert_eq!(decode_triplets(&bytes).unwrap(), triplets);
    }

    #[test]
    fn test_triplet_count_mismatch() {
        let mut bytes = encode_triplets(&[(0, 0, 1.0)]);
        bytes[0] = 5;
        assert!(decode_triplets(&bytes).is_err());
    }
}
