//! Story-file header fields used by the execution core.
use crate::error::RuntimeError;

use super::memory::Memory;

pub enum HeaderField {
    Version = 0x00,
    Flags1 = 0x01,
    Release = 0x02,
    InitialPC = 0x06,
    GlobalTable = 0x0C,
    StaticMark = 0x0E,
    Flags2 = 0x10,
    Serial = 0x12,
    FileLength = 0x1A,
    Checksum = 0x1C,
    InterpreterNumber = 0x1E,
    InterpreterVersion = 0x1F,
    RoutinesOffset = 0x28,
    Revision = 0x32,
}

pub fn field_byte(memory: &Memory, field: HeaderField) -> Result<u8, RuntimeError> {
    memory.read_byte(field as usize)
}

pub fn field_word(memory: &Memory, field: HeaderField) -> Result<u16, RuntimeError> {
    memory.read_word(field as usize)
}

pub fn set_byte(memory: &mut Memory, field: HeaderField, value: u8) -> Result<(), RuntimeError> {
    memory.write_byte(field as usize, value)
}

pub fn set_word(memory: &mut Memory, field: HeaderField, value: u16) -> Result<(), RuntimeError> {
    memory.write_word(field as usize, value)
}
