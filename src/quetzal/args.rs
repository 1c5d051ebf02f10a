//! Args chunk: the operands of the interrupted read opcode, stored in
//! meta saves so the restore can re-enter it.
use crate::{
    error::{ErrorCode, RuntimeError},
    iff::{self, Chunk},
    recoverable_error,
    saves::SaveOpcode,
};

#[derive(Debug, PartialEq, Eq)]
pub struct Args {
    opcode: SaveOpcode,
    operands: Vec<u16>,
}

impl Args {
    pub fn new(opcode: SaveOpcode, operands: &[u16]) -> Args {
        Args {
            opcode,
            operands: operands.to_vec(),
        }
    }

    pub fn opcode(&self) -> SaveOpcode {
        self.opcode
    }

    pub fn operands(&self) -> &[u16] {
        &self.operands
    }

    /// @read takes 1 to 4 operands, @read_char 1 to 3
    pub fn valid_operand_count(opcode: SaveOpcode, count: usize) -> bool {
        match opcode {
            SaveOpcode::Read => (1..=4).contains(&count),
            SaveOpcode::ReadChar => (1..=3).contains(&count),
            SaveOpcode::None => true,
        }
    }
}

impl From<&Args> for Vec<u8> {
    fn from(value: &Args) -> Self {
        let mut data = vec![u8::from(value.opcode)];
        for o in &value.operands {
            data.extend(iff::unsigned_as_vec(*o as usize, 2));
        }

        iff::chunk("Args", &data)
    }
}

impl TryFrom<&Chunk> for Args {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        if data.is_empty() {
            return recoverable_error!(ErrorCode::Quetzal, "Empty Args chunk");
        }

        let opcode = match SaveOpcode::try_from(data[0]) {
            Ok(op) => op,
            Err(_) => {
                return recoverable_error!(
                    ErrorCode::Quetzal,
                    "Args chunk: unknown save opcode {:#04x}",
                    data[0]
                )
            }
        };

        let operand_bytes = data.len() - 1;
        if operand_bytes % 2 != 0 {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "Args chunk: odd operand length {}",
                operand_bytes
            );
        }

        let count = operand_bytes / 2;
        if !Args::valid_operand_count(opcode, count) {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "Args chunk: invalid operand count {} for {:?}",
                count,
                opcode
            );
        }

        let mut operands = Vec::new();
        for i in 0..count {
            operands.push(iff::vec_as_unsigned(&data[1 + i * 2..3 + i * 2]) as u16);
        }

        Ok(Args { opcode, operands })
    }
}
