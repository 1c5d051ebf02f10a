//! IFF primitives: big-endian byte helpers and chunked-container
//! parsing/building. Only what the Quetzal layer needs.
use crate::{
    error::{ErrorCode, RuntimeError},
    recoverable_error,
};

/// Transforms a vector of bytes in big-endian order to a usize
///
/// # Arguments
/// * `v` - slice of bytes
pub fn vec_as_unsigned(v: &[u8]) -> usize {
    let mut u: usize = 0;
    for (i, b) in v.iter().enumerate() {
        u |= (*b as usize) << ((v.len() - 1 - i) * 8);
    }

    u
}

/// Transforms a usize to a vector of bytes in big-endian order.
///
/// # Arguments
/// * `value` - the usize value
/// * `length` - the length of the result
pub fn unsigned_as_vec(value: usize, length: usize) -> Vec<u8> {
    let mut v = Vec::new();
    for i in (0..length).rev() {
        v.push(((value >> (8 * i)) & 0xFF) as u8);
    }
    v
}

/// Translates an IFF id string to a vector of bytes
///
/// Pads the id to ensure it is at least 4 characters long, then returns
/// a byte vector containing the first 4 characters.
pub fn id_as_vec(id: &str) -> Vec<u8> {
    let mut id = String::from(id);
    id.push_str("    ");
    id.as_bytes()[0..4].to_vec()
}

fn vec_to_id(v: &[u8], offset: usize) -> String {
    v[offset..offset + 4].iter().map(|x| *x as char).collect()
}

/// Builds a chunk: 4-byte id, 4-byte big-endian length, data, and a
/// padding byte (not included in the chunk length) when the data length
/// is odd.
pub fn chunk(id: &str, data: &[u8]) -> Vec<u8> {
    let mut c = id_as_vec(id);
    c.extend(unsigned_as_vec(data.len(), 4));
    c.extend(data);
    if data.len() % 2 == 1 {
        c.push(0);
    }

    c
}

/// A non-FORM chunk read from a container
#[derive(Debug)]
pub struct Chunk {
    id: String,
    data: Vec<u8>,
}

impl Chunk {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// An outer FORM container holding a flat sequence of chunks
#[derive(Debug)]
pub struct Form {
    sub_form: String,
    chunks: Vec<Chunk>,
}

impl Form {
    /// Builds a FORM from pre-encoded chunk bodies, back-patching the
    /// total container length.
    ///
    /// # Arguments
    /// * `sub_form` - FORM sub id (e.g. "IFZS")
    /// * `body` - concatenated encoded chunks
    pub fn to_vec(sub_form: &str, body: &[u8]) -> Vec<u8> {
        let mut form = id_as_vec("FORM");
        form.extend(unsigned_as_vec(body.len() + 4, 4));
        form.extend(id_as_vec(sub_form));
        form.extend(body);
        if form.len() % 2 == 1 {
            form.push(0);
        }

        form
    }

    pub fn sub_form(&self) -> &str {
        &self.sub_form
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Finds the (first) chunk with the matching id.
    pub fn find_chunk(&self, id: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|x| x.id() == id)
    }
}

impl TryFrom<&[u8]> for Form {
    type Error = RuntimeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() < 12 || !vec_to_id(value, 0).eq("FORM") {
            return recoverable_error!(ErrorCode::IFFInvalidChunkId, "Not an IFF FORM");
        }

        let length = vec_as_unsigned(&value[4..8]);
        // FORM length counts the sub id and everything after it
        if length < 4 || length + 8 > value.len() {
            return recoverable_error!(
                ErrorCode::IFFInvalidChunkId,
                "FORM length {:#x} exceeds data length {:#x}",
                length,
                value.len()
            );
        }

        let sub_form = vec_to_id(value, 8);
        let mut chunks = Vec::new();
        let mut offset = 12;
        let end = 8 + length;
        while offset + 8 <= end {
            let id = vec_to_id(value, offset);
            let data_length = vec_as_unsigned(&value[offset + 4..offset + 8]);
            if offset + 8 + data_length > end {
                return recoverable_error!(
                    ErrorCode::IFFInvalidChunkId,
                    "Chunk '{}' length {:#x} runs past the end of the container",
                    id,
                    data_length
                );
            }
            let data = value[offset + 8..offset + 8 + data_length].to_vec();
            chunks.push(Chunk { id, data });
            offset += 8 + data_length;
            // Padding byte after an odd-length chunk
            if data_length % 2 == 1 {
                offset += 1;
            }
        }

        Ok(Form { sub_form, chunks })
    }
}
