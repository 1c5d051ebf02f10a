//! CMem/UMem chunks: dynamic memory, compressed against the pristine
//! story image when that actually wins.
use crate::{
    error::RuntimeError,
    iff::{self, Chunk},
    state::memory::Memory,
};

/// The dynamic-memory payload of a save
#[derive(Debug, PartialEq, Eq)]
pub enum Mem {
    Compressed(Vec<u8>),
    Uncompressed(Vec<u8>),
}

impl Mem {
    /// Snapshots dynamic memory, compressed only when the diff is
    /// strictly smaller than the raw region.
    pub fn from_memory(memory: &Memory) -> Mem {
        let cdata = memory.compress();
        if cdata.len() < memory.dynamic_len() {
            Mem::Compressed(cdata)
        } else {
            Mem::Uncompressed(memory.dynamic().to_vec())
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Mem::Compressed(_) => "CMem",
            Mem::Uncompressed(_) => "UMem",
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Mem::Compressed(d) => d,
            Mem::Uncompressed(d) => d,
        }
    }

    /// Applies the payload to dynamic memory.
    pub fn restore_to(&self, memory: &mut Memory) -> Result<(), RuntimeError> {
        match self {
            Mem::Compressed(d) => memory.restore_compressed(d),
            Mem::Uncompressed(d) => memory.restore(d),
        }
    }
}

impl From<&Mem> for Vec<u8> {
    fn from(value: &Mem) -> Self {
        iff::chunk(value.id(), value.data())
    }
}

impl From<&Chunk> for Mem {
    fn from(value: &Chunk) -> Self {
        if value.id() == "CMem" {
            Mem::Compressed(value.data().to_vec())
        } else {
            Mem::Uncompressed(value.data().to_vec())
        }
    }
}
