//! IFhd chunk: identifies the story a save belongs to.
use std::fmt;

use crate::{
    error::{ErrorCode, RuntimeError},
    iff::{self, Chunk},
    recoverable_error,
    state::header::{self, HeaderField},
    state::memory::Memory,
};

/// Release, serial, and checksum from the story header plus the pc at
/// the time of the save. A save is only valid for the exact story that
/// wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IFhd {
    release: u16,
    serial: Vec<u8>,
    checksum: u16,
    pc: u32,
}

impl fmt::Display for IFhd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "IFhd:")?;
        writeln!(f, "\tRelease: {}", self.release)?;
        write!(f, "\tSerial: ")?;
        for b in &self.serial {
            write!(f, "{}", *b as char)?;
        }
        writeln!(f)?;
        writeln!(f, "\tChecksum: {:04x}", self.checksum)?;
        write!(f, "\tPC: ${:06x}", self.pc)
    }
}

impl IFhd {
    pub fn new(release: u16, serial: &[u8], checksum: u16, pc: u32) -> IFhd {
        IFhd {
            release,
            serial: serial.to_vec(),
            checksum,
            pc,
        }
    }

    /// Builds an IFhd from the loaded story.
    ///
    /// # Arguments
    /// * `memory` - story memory
    /// * `pc` - program counter to record, masked to 24 bits
    pub fn from_memory(memory: &Memory, pc: usize) -> Result<IFhd, RuntimeError> {
        let release = header::field_word(memory, HeaderField::Release)?;
        let mut serial = Vec::new();
        for i in 0..6 {
            serial.push(memory.read_byte(HeaderField::Serial as usize + i)?);
        }
        let checksum = header::field_word(memory, HeaderField::Checksum)?;

        Ok(IFhd {
            release,
            serial,
            checksum,
            pc: pc as u32 & 0xFFFFFF,
        })
    }

    pub fn release(&self) -> u16 {
        self.release
    }

    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Story identity comparison: release, serial, and checksum, but
    /// not the pc.
    pub fn is_same_story(&self, other: &IFhd) -> bool {
        self.release == other.release
            && self.serial == other.serial
            && self.checksum == other.checksum
    }
}

impl From<&IFhd> for Vec<u8> {
    fn from(value: &IFhd) -> Self {
        let mut data = iff::unsigned_as_vec(value.release as usize, 2);
        data.extend(&value.serial);
        data.extend(iff::unsigned_as_vec(value.checksum as usize, 2));
        data.extend(iff::unsigned_as_vec(value.pc as usize, 3));

        iff::chunk("IFhd", &data)
    }
}

impl TryFrom<&Chunk> for IFhd {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        if data.len() != 13 {
            return recoverable_error!(
                ErrorCode::IFhdChunkLength,
                "IFhd chunk is {} bytes, expected 13",
                data.len()
            );
        }

        Ok(IFhd {
            release: iff::vec_as_unsigned(&data[0..2]) as u16,
            serial: data[2..8].to_vec(),
            checksum: iff::vec_as_unsigned(&data[8..10]) as u16,
            pc: iff::vec_as_unsigned(&data[10..13]) as u32,
        })
    }
}
