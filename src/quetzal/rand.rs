//! Rand chunk: the predictable generator's state, persisted in
//! autosaves so a seeded sequence survives a crash.
use crate::{
    error::{ErrorCode, RuntimeError},
    iff::{self, Chunk},
    recoverable_error,
    rng::KIND_XORSHIFT,
};

#[derive(Debug, PartialEq, Eq)]
pub struct Rand {
    state: u32,
}

impl Rand {
    pub fn new(state: u32) -> Rand {
        Rand { state }
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}

impl From<&Rand> for Vec<u8> {
    fn from(value: &Rand) -> Self {
        let mut data = KIND_XORSHIFT.to_vec();
        data.extend(iff::unsigned_as_vec(value.state as usize, 4));

        iff::chunk("Rand", &data)
    }
}

impl TryFrom<&Chunk> for Rand {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        if data.len() != 8 {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "Rand chunk is {} bytes, expected 8",
                data.len()
            );
        }

        if &data[0..4] != KIND_XORSHIFT {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "Rand chunk: unknown generator kind {:?}",
                &data[0..4]
            );
        }

        Ok(Rand {
            state: iff::vec_as_unsigned(&data[4..8]) as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok, iff::Form};

    use super::*;

    #[test]
    fn test_round_trip() {
        let rand = Rand::new(0xDEADBEEF);
        let v = Vec::from(&rand);
        assert_eq!(
            v,
            vec![b'R', b'a', b'n', b'd', 0, 0, 0, 8, b'X', b'O', b'R', b'S', 0xDE, 0xAD, 0xBE, 0xEF]
        );
        let form = assert_ok!(Form::try_from(Form::to_vec("BFZS", &v).as_slice()));
        let decoded = assert_ok!(Rand::try_from(form.find_chunk("Rand").unwrap()));
        assert_eq!(decoded, rand);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let v = iff::chunk("Rand", &[b'M', b'T', b'1', b'9', 0, 0, 0, 1]);
        let form = assert_ok!(Form::try_from(Form::to_vec("BFZS", &v).as_slice()));
        assert!(Rand::try_from(form.find_chunk("Rand").unwrap()).is_err());
    }

    #[test]
    fn test_bad_length_rejected() {
        let v = iff::chunk("Rand", &[b'X', b'O', b'R', b'S', 0, 0]);
        let form = assert_ok!(Form::try_from(Form::to_vec("BFZS", &v).as_slice()));
        assert!(Rand::try_from(form.find_chunk("Rand").unwrap()).is_err());
    }
}
