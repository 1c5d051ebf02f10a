//! Stks chunk: the call stack, one encoded frame per routine call.
use std::fmt;

use crate::{
    error::{ErrorCode, RuntimeError},
    iff::{self, Chunk},
    recoverable_error,
    state::frame::{Frame, StoreWhere},
};

/// One serialized stack frame: return pc, flags (`nlocals | 0x10` for
/// a procedure call with no store), store variable, argument count,
/// locals, and the frame's evaluation stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stk {
    return_address: u32,
    flags: u8,
    result_variable: u8,
    arguments: u8,
    variables: Vec<u16>,
    stack: Vec<u16>,
}

impl fmt::Display for Stk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\tReturn PC: ${:06x}", self.return_address)?;
        writeln!(f, "\tFlags: {:02x}", self.flags)?;
        writeln!(f, "\tResult variable: {}", self.result_variable)?;
        writeln!(f, "\tArguments: {}", self.arguments)?;
        write!(f, "\tLocal variables:")?;
        for v in &self.variables {
            write!(f, " {:04x}", v)?;
        }
        writeln!(f)?;
        write!(f, "\tStack:")?;
        for v in &self.stack {
            write!(f, " {:04x}", v)?;
        }
        Ok(())
    }
}

impl Stk {
    pub fn new(
        return_address: u32,
        flags: u8,
        result_variable: u8,
        arguments: u8,
        variables: &[u16],
        stack: &[u16],
    ) -> Stk {
        Stk {
            return_address,
            flags,
            result_variable,
            arguments,
            variables: variables.to_vec(),
            stack: stack.to_vec(),
        }
    }

    pub fn return_address(&self) -> u32 {
        self.return_address
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn result_variable(&self) -> u8 {
        self.result_variable
    }

    /// Number of arguments the routine was called with
    pub fn arguments(&self) -> u8 {
        self.arguments
    }

    pub fn variables(&self) -> &[u16] {
        &self.variables
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }
}

impl From<&Frame> for Stk {
    fn from(value: &Frame) -> Self {
        let (flag, result_variable) = match value.store() {
            StoreWhere::Variable(v) => (0x00, v),
            _ => (0x10, 0),
        };
        Stk {
            return_address: value.return_address() as u32 & 0xFFFFFF,
            flags: (value.local_variables().len() as u8 & 0xF) | flag,
            result_variable,
            arguments: value.argument_count(),
            variables: value.local_variables().clone(),
            stack: value.stack().clone(),
        }
    }
}

impl From<&Stk> for Vec<u8> {
    fn from(value: &Stk) -> Self {
        let mut data = iff::unsigned_as_vec(value.return_address as usize, 3);
        data.push(value.flags);
        data.push(value.result_variable);
        // Arguments are stored as a bitmask
        data.push(((1u16 << value.arguments) - 1) as u8);
        data.extend(iff::unsigned_as_vec(value.stack.len(), 2));
        for v in &value.variables {
            data.extend(iff::unsigned_as_vec(*v as usize, 2));
        }
        for v in &value.stack {
            data.extend(iff::unsigned_as_vec(*v as usize, 2));
        }

        data
    }
}

/// The full call stack, oldest frame first
#[derive(Debug, PartialEq, Eq)]
pub struct Stks {
    stks: Vec<Stk>,
}

impl fmt::Display for Stks {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, frame) in self.stks.iter().enumerate() {
            writeln!(f, "Frame {}:", i)?;
            writeln!(f, "{}", frame)?;
        }
        Ok(())
    }
}

impl Stks {
    pub fn new(stks: Vec<Stk>) -> Stks {
        Stks { stks }
    }

    pub fn from_frames(frames: &[Frame]) -> Stks {
        Stks {
            stks: frames.iter().map(Stk::from).collect(),
        }
    }

    pub fn stks(&self) -> &Vec<Stk> {
        &self.stks
    }
}

impl From<&Stks> for Vec<u8> {
    fn from(value: &Stks) -> Self {
        let mut data = Vec::new();
        for stk in value.stks() {
            data.extend(Vec::from(stk));
        }
        iff::chunk("Stks", &data)
    }
}

impl TryFrom<&Chunk> for Stks {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        let mut position = 0;
        let mut stks = Vec::new();

        while position < data.len() {
            if data.len() - position < 8 {
                return recoverable_error!(
                    ErrorCode::Quetzal,
                    "Stks chunk: truncated frame header at offset {:#x}",
                    position
                );
            }

            let return_address = iff::vec_as_unsigned(&data[position..position + 3]) as u32;
            let flags = data[position + 3];
            let result_variable = data[position + 4];
            let arguments = data[position + 5].trailing_ones() as u8;
            let stack_size = iff::vec_as_unsigned(&data[position + 6..position + 8]);
            position += 8;

            let variable_count = flags as usize & 0xF;
            let words = (variable_count + stack_size) * 2;
            if data.len() - position < words {
                return recoverable_error!(
                    ErrorCode::Quetzal,
                    "Stks chunk: frame at offset {:#x} needs {} more bytes",
                    position,
                    words - (data.len() - position)
                );
            }

            let mut variables = Vec::new();
            for _ in 0..variable_count {
                variables.push(iff::vec_as_unsigned(&data[position..position + 2]) as u16);
                position += 2;
            }

            let mut stack = Vec::new();
            for _ in 0..stack_size {
                stack.push(iff::vec_as_unsigned(&data[position..position + 2]) as u16);
                position += 2;
            }

            stks.push(Stk {
                return_address,
                flags,
                result_variable,
                arguments,
                variables,
                stack,
            });
        }

        // Every frame decoded cleanly, but a saved frame count that
        // doesn't tile the chunk exactly means the data is corrupt
        if position != data.len() {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "Stks chunk: stack size mismatch ({} bytes consumed of {})",
                position,
                data.len()
            );
        }

        Ok(Stks { stks })
    }
}
