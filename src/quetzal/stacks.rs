//! Undo/MSav chunks: the in-memory save stacks, embedded in autosaves
//! so undo history survives a crash.
use crate::{
    error::{ErrorCode, RuntimeError},
    iff::{self, Chunk},
    recoverable_error,
    saves::{SaveStack, SaveType},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackChunkId {
    /// The game (undo) stack
    Undo,
    /// The user (story-controlled) stack
    MSav,
}

impl StackChunkId {
    pub fn id(&self) -> &'static str {
        match self {
            StackChunkId::Undo => "Undo",
            StackChunkId::MSav => "MSav",
        }
    }
}

/// One embedded save: Undo entries are tagged with who made them, MSav
/// entries carry their description instead.
#[derive(Debug, PartialEq, Eq)]
pub struct StackEntry {
    savetype: SaveType,
    desc: String,
    data: Vec<u8>,
}

impl StackEntry {
    pub fn savetype(&self) -> SaveType {
        self.savetype
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_parts(self) -> (SaveType, String, Vec<u8>) {
        (self.savetype, self.desc, self.data)
    }
}

/// A serialized save stack, entries oldest first
#[derive(Debug, PartialEq, Eq)]
pub struct StackChunk {
    id: StackChunkId,
    entries: Vec<StackEntry>,
}

impl StackChunk {
    pub fn from_stack(id: StackChunkId, stack: &SaveStack) -> StackChunk {
        let entries = stack
            .iter_oldest_first()
            .map(|s| StackEntry {
                savetype: s.savetype(),
                desc: s.desc().to_string(),
                data: s.data().to_vec(),
            })
            .collect();
        StackChunk { id, entries }
    }

    pub fn id(&self) -> StackChunkId {
        self.id
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<StackEntry> {
        self.entries
    }

    /// Decodes an Undo or MSav chunk. Failures here are expected to be
    /// treated as best-effort by the caller: a valid autorestore with
    /// no undo history beats no autorestore at all.
    pub fn decode(id: StackChunkId, chunk: &Chunk) -> Result<StackChunk, RuntimeError> {
        let data = chunk.data();
        if data.len() < 8 {
            return recoverable_error!(ErrorCode::Quetzal, "{} chunk too short", id.id());
        }

        let version = iff::vec_as_unsigned(&data[0..4]);
        if version != 0 {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "{} chunk version {} not supported",
                id.id(),
                version
            );
        }

        let count = iff::vec_as_unsigned(&data[4..8]);
        let mut position = 8;
        let mut entries = Vec::new();

        for _ in 0..count {
            let mut savetype = SaveType::Meta;
            let mut desc = String::new();

            match id {
                StackChunkId::Undo => {
                    if data.len() - position < 1 {
                        return recoverable_error!(
                            ErrorCode::Quetzal,
                            "Undo chunk: truncated entry"
                        );
                    }
                    savetype = match SaveType::try_from(data[position]) {
                        Ok(t) => t,
                        Err(_) => {
                            return recoverable_error!(
                                ErrorCode::Quetzal,
                                "Undo chunk: unknown save type {:#04x}",
                                data[position]
                            )
                        }
                    };
                    position += 1;
                }
                StackChunkId::MSav => {
                    if data.len() - position < 4 {
                        return recoverable_error!(
                            ErrorCode::Quetzal,
                            "MSav chunk: truncated entry"
                        );
                    }
                    let desc_len = iff::vec_as_unsigned(&data[position..position + 4]);
                    position += 4;
                    if data.len() - position < desc_len {
                        return recoverable_error!(
                            ErrorCode::Quetzal,
                            "MSav chunk: truncated description"
                        );
                    }
                    desc = data[position..position + desc_len]
                        .iter()
                        .map(|b| *b as char)
                        .collect();
                    position += desc_len;
                }
            }

            if data.len() - position < 4 {
                return recoverable_error!(ErrorCode::Quetzal, "{} chunk: truncated entry", id.id());
            }
            let save_len = iff::vec_as_unsigned(&data[position..position + 4]);
            position += 4;
            if data.len() - position < save_len {
                return recoverable_error!(
                    ErrorCode::Quetzal,
                    "{} chunk: entry runs past the end of the chunk",
                    id.id()
                );
            }
            let save = data[position..position + save_len].to_vec();
            position += save_len;

            entries.push(StackEntry {
                savetype,
                desc,
                data: save,
            });
        }

        if position != data.len() {
            return recoverable_error!(
                ErrorCode::Quetzal,
                "{} chunk: size mismatch ({} bytes consumed of {})",
                id.id(),
                position,
                data.len()
            );
        }

        Ok(StackChunk { id, entries })
    }
}

impl From<&StackChunk> for Vec<u8> {
    fn from(value: &StackChunk) -> Self {
        let mut data = iff::unsigned_as_vec(0, 4);
        data.extend(iff::unsigned_as_vec(value.entries.len(), 4));

        for entry in &value.entries {
            match value.id {
                StackChunkId::Undo => data.push(u8::from(entry.savetype)),
                StackChunkId::MSav => {
                    data.extend(iff::unsigned_as_vec(entry.desc.len(), 4));
                    data.extend(entry.desc.bytes());
                }
            }
            data.extend(iff::unsigned_as_vec(entry.data.len(), 4));
            data.extend(&entry.data);
        }

        iff::chunk(value.id.id(), &data)
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok, iff::Form, saves::SaveState};

    use super::*;

    fn stack_with(entries: &[(&str, SaveType)]) -> SaveStack {
        let mut stack = SaveStack::new(10);
        for (desc, t) in entries {
            stack.push(SaveState::new(
                *t,
                Some(desc.to_string()),
                desc.bytes().collect(),
            ));
        }
        stack
    }

    fn round_trip(chunk: &StackChunk) -> Result<StackChunk, RuntimeError> {
        let v = Form::to_vec("BFZS", &Vec::from(chunk));
        let form = Form::try_from(v.as_slice())?;
        StackChunk::decode(chunk.id(), form.find_chunk(chunk.id().id()).unwrap())
    }

    #[test]
    fn test_undo_round_trip() {
        let stack = stack_with(&[("one", SaveType::Meta), ("two", SaveType::Normal)]);
        let chunk = StackChunk::from_stack(StackChunkId::Undo, &stack);
        assert_eq!(chunk.entries().len(), 2);
        // Oldest first
        assert_eq!(chunk.entries()[0].data(), b"one");
        assert_eq!(chunk.entries()[1].savetype(), SaveType::Normal);

        let decoded = assert_ok!(round_trip(&chunk));
        assert_eq!(decoded.entries()[0].savetype(), SaveType::Meta);
        assert_eq!(decoded.entries()[1].savetype(), SaveType::Normal);
        assert_eq!(decoded.entries()[1].data(), b"two");
        // Undo entries don't carry descriptions
        assert_eq!(decoded.entries()[0].desc(), "");
    }

    #[test]
    fn test_msav_round_trip() {
        let stack = stack_with(&[("first save", SaveType::Meta), ("", SaveType::Meta)]);
        let chunk = StackChunk::from_stack(StackChunkId::MSav, &stack);
        let decoded = assert_ok!(round_trip(&chunk));
        assert_eq!(decoded.entries()[0].desc(), "first save");
        assert_eq!(decoded.entries()[1].desc(), "");
        assert_eq!(decoded.entries()[0].data(), b"first save");
    }

    #[test]
    fn test_empty_stack() {
        let chunk = StackChunk::from_stack(StackChunkId::Undo, &SaveStack::new(10));
        let decoded = assert_ok!(round_trip(&chunk));
        assert!(decoded.entries().is_empty());
    }

    #[test]
    fn test_bad_version_rejected() {
        let stack = stack_with(&[("one", SaveType::Meta)]);
        let chunk = StackChunk::from_stack(StackChunkId::Undo, &stack);
        let mut v = Vec::from(&chunk);
        v[8 + 3] = 1;
        let form = assert_ok!(Form::try_from(Form::to_vec("BFZS", &v).as_slice()));
        assert!(StackChunk::decode(StackChunkId::Undo, form.find_chunk("Undo").unwrap()).is_err());
    }

    #[test]
    fn test_bad_savetype_rejected() {
        let stack = stack_with(&[("one", SaveType::Meta)]);
        let chunk = StackChunk::from_stack(StackChunkId::Undo, &stack);
        let mut v = Vec::from(&chunk);
        // The savetype byte follows the version and count words
        v[8 + 8] = 7;
        let form = assert_ok!(Form::try_from(Form::to_vec("BFZS", &v).as_slice()));
        assert!(StackChunk::decode(StackChunkId::Undo, form.find_chunk("Undo").unwrap()).is_err());
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let stack = stack_with(&[("one", SaveType::Meta)]);
        let chunk = StackChunk::from_stack(StackChunkId::Undo, &stack);
        let mut v = Vec::from(&chunk);
        // Append a byte inside the declared chunk length
        let len = iff::vec_as_unsigned(&v[4..8]);
        v[4..8].copy_from_slice(&iff::unsigned_as_vec(len + 1, 4));
        v.insert(8 + len, 0xAA);
        let form = assert_ok!(Form::try_from(Form::to_vec("BFZS", &v).as_slice()));
        assert!(StackChunk::decode(StackChunkId::Undo, form.find_chunk("Undo").unwrap()).is_err());
    }
}
