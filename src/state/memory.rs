//! Story memory: the full address space plus a pristine copy of the
//! dynamic region, used for restart and for the Quetzal memory diff.
use std::fmt;

use crate::{error::*, fatal_error, recoverable_error};

use super::header::HeaderField;

pub struct Memory {
    version: u8,
    map: Vec<u8>,
    dynamic: Vec<u8>,
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory: version {}, {} bytes, {} dynamic",
            self.version,
            self.map.len(),
            self.dynamic.len()
        )
    }
}

pub fn word_value(hb: u8, lb: u8) -> u16 {
    (((hb as u16) << 8) & 0xFF00) + ((lb as u16) & 0xFF)
}

fn byte_values(w: u16) -> (u8, u8) {
    ((w >> 8) as u8, w as u8)
}

impl Memory {
    pub fn new(map: Vec<u8>) -> Memory {
        let version = map[0];
        let static_mark = word_value(
            map[HeaderField::StaticMark as usize],
            map[HeaderField::StaticMark as usize + 1],
        ) as usize;
        let dynamic = map[0..static_mark].to_vec();
        Memory {
            version,
            map,
            dynamic,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn size(&self) -> usize {
        self.map.len()
    }

    pub fn dynamic_len(&self) -> usize {
        self.dynamic.len()
    }

    pub fn dynamic(&self) -> &[u8] {
        &self.map[..self.dynamic.len()]
    }

    pub fn checksum(&self) -> Result<u16, RuntimeError> {
        let mut checksum = 0;
        let size = self.read_word(HeaderField::FileLength as usize)? as usize
            * match self.version {
                1..=3 => 2,
                4 | 5 => 4,
                _ => 8,
            };

        for i in 0x40..usize::min(size, self.map.len()) {
            checksum = u16::overflowing_add(checksum, self.map[i] as u16).0;
        }

        Ok(checksum)
    }

    pub fn read_byte(&self, address: usize) -> Result<u8, RuntimeError> {
        if address < self.map.len() {
            Ok(self.map[address])
        } else {
            fatal_error!(
                ErrorCode::InvalidAddress,
                "Byte address {:#06x} beyond end of memory ({:#06x})",
                address,
                self.map.len() - 1
            )
        }
    }

    pub fn read_word(&self, address: usize) -> Result<u16, RuntimeError> {
        if address < self.map.len() - 1 {
            Ok(word_value(self.map[address], self.map[address + 1]))
        } else {
            fatal_error!(
                ErrorCode::InvalidAddress,
                "Word address {:#06x} beyond end of memory ({:#06x})",
                address,
                self.map.len() - 1
            )
        }
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), RuntimeError> {
        if address < self.map.len() {
            debug!(target: "app::memory", "Write {:#04x} to ${:04x}", value, address);
            self.map[address] = value;
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::InvalidAddress,
                "Byte address {:#06x} beyond end of memory ({:#06x})",
                address,
                self.map.len() - 1
            )
        }
    }

    pub fn write_word(&mut self, address: usize, value: u16) -> Result<(), RuntimeError> {
        if address < self.map.len() - 1 {
            debug!(target: "app::memory", "Write {:#06x} to ${:04x}", value, address);
            let (hb, lb) = byte_values(value);
            self.map[address] = hb;
            self.map[address + 1] = lb;
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::InvalidAddress,
                "Word address {:#06x} beyond end of memory ({:#06x})",
                address,
                self.map.len() - 1
            )
        }
    }

    /// Diffs dynamic memory against the pristine image as a sequence of
    /// (zero-run, XOR-byte) pairs. Runs are emitted 256 at a time so a
    /// single length byte suffices, and a run that reaches the end of
    /// dynamic memory is not written at all.
    pub fn compress(&self) -> Vec<u8> {
        let mut cdata: Vec<u8> = Vec::new();
        let len = self.dynamic.len();
        let mut i = 0;
        while i < len {
            let mut run = 0;
            while i < len && self.map[i] ^ self.dynamic[i] == 0 {
                i += 1;
                run += 1;
            }

            if i == len {
                break;
            }

            while run > 0 {
                let n = usize::min(run, 256);
                cdata.push(0);
                cdata.push((n - 1) as u8);
                run -= n;
            }

            cdata.push(self.map[i] ^ self.dynamic[i]);
            i += 1;
        }

        cdata
    }

    /// Reverses [Memory::compress]: XOR each nonzero byte back onto the
    /// pristine image, skip zero runs, and leave any tail pristine.
    ///
    /// # Arguments
    /// * `cdata` - compressed diff
    ///
    /// # Returns
    /// Full dynamic-memory image, or an error if the diff cursor would
    /// run past the end of dynamic memory.
    fn decompress(&self, cdata: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        let mut data = self.dynamic.clone();
        let mut address = 0;
        let mut iter = cdata.iter();

        while let Some(b) = iter.next() {
            if *b == 0 {
                match iter.next() {
                    Some(l) => {
                        address += *l as usize + 1;
                        if address > data.len() {
                            return recoverable_error!(
                                ErrorCode::Restore,
                                "Memory diff runs past the end of dynamic memory ({:#06x} > {:#06x})",
                                address,
                                data.len()
                            );
                        }
                    }
                    None => {
                        return recoverable_error!(
                            ErrorCode::Restore,
                            "Memory diff ends mid zero-run"
                        )
                    }
                }
            } else {
                if address >= data.len() {
                    return recoverable_error!(
                        ErrorCode::Restore,
                        "Memory diff runs past the end of dynamic memory ({:#06x})",
                        data.len()
                    );
                }
                data[address] ^= b;
                address += 1;
            }
        }

        Ok(data)
    }

    /// Resets dynamic memory to the pristine image loaded from the
    /// story file.
    pub fn reset(&mut self) {
        self.map[..self.dynamic.len()].copy_from_slice(&self.dynamic)
    }

    /// Overwrites dynamic memory with an uncompressed image.
    pub fn restore(&mut self, data: &[u8]) -> Result<(), RuntimeError> {
        if data.len() != self.dynamic.len() {
            recoverable_error!(
                ErrorCode::Restore,
                "Dynamic memory size doesn't match: {:#06x} != {:#06x}",
                self.dynamic.len(),
                data.len()
            )
        } else {
            self.map[..data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    /// Overwrites dynamic memory from a compressed diff.
    pub fn restore_compressed(&mut self, cdata: &[u8]) -> Result<(), RuntimeError> {
        let data = self.decompress(cdata)?;
        self.restore(&data)
    }
}
