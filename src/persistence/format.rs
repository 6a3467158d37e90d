//! Binary framing primitives for the `.apo` snapshot format.
//!
//! All integers are little-endian, width [`I_SIZE`]. This follows a
//! write-ahead-log framing idiom (`crc32fast::hash` plus explicit
//! `to_le_bytes`/`from_le_bytes`) rather than a self-describing wire
//! format, since the layout here is fixed by page-id references rather
//! than by a serde schema.

pub const MAGIC: [u8; 2] = *b"AP";
pub const VERSION: u8 = 1;
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
pub const I_SIZE: usize = 4;

/// Append a little-endian `u32`.
pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Append a little-endian `f32`.
pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Append a `bool` as a one-word 0/1.
pub fn write_bool(buf: &mut Vec<u8>, v: bool) {
    write_u32(buf, v as u32);
}

/// A cursor over an in-memory byte slice with bounds-checked `I_SIZE` reads.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> crate::error::Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(crate::error::ApoError::BadFormat);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// The raw bytes between `start` (a prior [`Self::pos`]) and the
    /// current position — used to compute a section's CRC32.
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        &self.bytes[start..self.pos]
    }

    pub fn read_u32(&mut self) -> crate::error::Result<u32> {
        if self.remaining() < I_SIZE {
            return Err(crate::error::ApoError::BadFormat);
        }
        let v = u32::from_le_bytes(self.bytes[self.pos..self.pos + I_SIZE].try_into().unwrap());
        self.pos += I_SIZE;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> crate::error::Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_bool(&mut self) -> crate::error::Result<bool> {
        Ok(self.read_u32()? != 0)
    }

    /// Bytes consumed since construction — used to accumulate the
    /// byte range a CRC32 must cover.
    pub fn consumed(&self) -> &'a [u8] {
        &self.bytes[..self.pos]
    }
}

/// A node record: `page_id(4) [layer(4) if with_layer] | n_neighborhoods(4)
/// | for each: layer(4), n_neighbors(4), n_neighbors x page_id(4)`.
pub struct NodeRecord {
    pub page_id: u32,
    pub layer: Option<u32>,
    pub neighborhoods: Vec<(u32, Vec<u32>)>,
}

pub fn write_node_record(buf: &mut Vec<u8>, record: &NodeRecord) {
    write_u32(buf, record.page_id);
    if let Some(layer) = record.layer {
        write_u32(buf, layer);
    }
    write_u32(buf, record.neighborhoods.len() as u32);
    for (layer, neighbor_pids) in &record.neighborhoods {
        write_u32(buf, *layer);
        write_u32(buf, neighbor_pids.len() as u32);
        for pid in neighbor_pids {
            write_u32(buf, *pid);
        }
    }
}

pub fn read_node_record(reader: &mut Reader<'_>, with_layer: bool) -> crate::error::Result<NodeRecord> {
    let page_id = reader.read_u32()?;
    let layer = if with_layer { Some(reader.read_u32()?) } else { None };
    let n_neighborhoods = reader.read_u32()?;
    let mut neighborhoods = Vec::with_capacity(n_neighborhoods as usize);
    for _ in 0..n_neighborhoods {
        let layer = reader.read_u32()?;
        let n_neighbors = reader.read_u32()?;
        let mut neighbor_pids = Vec::with_capacity(n_neighbors as usize);
        for _ in 0..n_neighbors {
            neighbor_pids.push(reader.read_u32()?);
        }
        neighborhoods.push((layer, neighbor_pids));
    }
    Ok(NodeRecord {
        page_id,
        layer,
        neighborhoods,
    })
}
