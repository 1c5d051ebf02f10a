//! Quetzal save files: an IFF FORM of type IFZS (standard saves),
//! BFZS (meta saves and autosaves), or BFMS (the deprecated meta
//! format, accepted on read only).
use std::fmt;

use crate::{
    error::{ErrorCode, RuntimeError},
    iff::{self, Form},
    recoverable_error,
};

use self::{
    args::Args,
    ifhd::IFhd,
    mem::Mem,
    rand::Rand,
    stacks::{StackChunk, StackChunkId},
    stks::Stks,
};

pub mod args;
pub mod ifhd;
pub mod mem;
pub mod rand;
pub mod stacks;
pub mod stks;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormType {
    IFZS,
    BFZS,
    BFMS,
}

impl FormType {
    pub fn id(&self) -> &'static str {
        match self {
            FormType::IFZS => "IFZS",
            FormType::BFZS => "BFZS",
            FormType::BFMS => "BFMS",
        }
    }

    fn from_id(id: &str) -> Option<FormType> {
        match id {
            "IFZS" => Some(FormType::IFZS),
            "BFZS" => Some(FormType::BFZS),
            "BFMS" => Some(FormType::BFMS),
            _ => None,
        }
    }
}

/// IntD chunk: interpreter-dependent data, used to record the story
/// filename.
#[derive(Debug, PartialEq, Eq)]
pub struct IntD {
    story_file: String,
}

impl IntD {
    pub fn new(story_file: &str) -> IntD {
        IntD {
            story_file: story_file.to_string(),
        }
    }

    pub fn story_file(&self) -> &str {
        &self.story_file
    }
}

impl From<&IntD> for Vec<u8> {
    fn from(value: &IntD) -> Self {
        let mut data = b"UNIX".to_vec();
        // Flags 0x02: contents care about the machine they were saved on
        data.push(0x02);
        data.push(0);
        data.extend(iff::unsigned_as_vec(0, 2));
        data.extend(b"    ");
        data.extend(value.story_file.bytes());

        iff::chunk("IntD", &data)
    }
}

/// A parsed or assembled save file
#[derive(Debug)]
pub struct Quetzal {
    form_type: FormType,
    ifhd: IFhd,
    mem: Mem,
    stks: Stks,
    intd: Option<IntD>,
    anno: Option<String>,
    args: Option<Args>,
    undo: Option<StackChunk>,
    msav: Option<StackChunk>,
    rand: Option<Rand>,
    scrn: Option<Vec<u8>>,
    // Chunks owned by other parts of the interpreter (Bfhs, Bfts...),
    // carried through without interpretation
    extra: Vec<(String, Vec<u8>)>,
}

impl fmt::Display for Quetzal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "FORM type: {}", self.form_type.id())?;
        writeln!(f, "{}", self.ifhd)?;
        writeln!(f, "Memory: {} ({} bytes)", self.mem.id(), self.mem.data().len())?;
        write!(f, "{}", self.stks)
    }
}

impl Quetzal {
    pub fn new(form_type: FormType, ifhd: IFhd, mem: Mem, stks: Stks) -> Quetzal {
        Quetzal {
            form_type,
            ifhd,
            mem,
            stks,
            intd: None,
            anno: None,
            args: None,
            undo: None,
            msav: None,
            rand: None,
            scrn: None,
            extra: Vec::new(),
        }
    }

    pub fn form_type(&self) -> FormType {
        self.form_type
    }

    pub fn ifhd(&self) -> &IFhd {
        &self.ifhd
    }

    pub fn mem(&self) -> &Mem {
        &self.mem
    }

    pub fn stks(&self) -> &Stks {
        &self.stks
    }

    pub fn intd(&self) -> Option<&IntD> {
        self.intd.as_ref()
    }

    pub fn anno(&self) -> Option<&str> {
        self.anno.as_deref()
    }

    pub fn args(&self) -> Option<&Args> {
        self.args.as_ref()
    }

    pub fn undo(&self) -> Option<&StackChunk> {
        self.undo.as_ref()
    }

    pub fn msav(&self) -> Option<&StackChunk> {
        self.msav.as_ref()
    }

    pub fn take_undo(&mut self) -> Option<StackChunk> {
        self.undo.take()
    }

    pub fn take_msav(&mut self) -> Option<StackChunk> {
        self.msav.take()
    }

    pub fn rand(&self) -> Option<&Rand> {
        self.rand.as_ref()
    }

    pub fn scrn(&self) -> Option<&[u8]> {
        self.scrn.as_deref()
    }

    pub fn take_scrn(&mut self) -> Option<Vec<u8>> {
        self.scrn.take()
    }

    pub fn extra(&self) -> &[(String, Vec<u8>)] {
        &self.extra
    }

    pub fn set_intd(&mut self, intd: IntD) {
        self.intd = Some(intd);
    }

    pub fn set_anno(&mut self, anno: String) {
        self.anno = Some(anno);
    }

    pub fn set_args(&mut self, args: Args) {
        self.args = Some(args);
    }

    pub fn set_undo(&mut self, undo: StackChunk) {
        self.undo = Some(undo);
    }

    pub fn set_msav(&mut self, msav: StackChunk) {
        self.msav = Some(msav);
    }

    pub fn set_rand(&mut self, rand: Rand) {
        self.rand = Some(rand);
    }

    pub fn set_scrn(&mut self, scrn: Vec<u8>) {
        self.scrn = Some(scrn);
    }
}

impl From<&Quetzal> for Vec<u8> {
    fn from(value: &Quetzal) -> Self {
        let mut body = Vec::from(value.ifhd());
        if let Some(intd) = value.intd() {
            body.extend(Vec::from(intd));
        }
        body.extend(Vec::from(value.mem()));
        body.extend(Vec::<u8>::from(value.stks()));
        if let Some(anno) = value.anno() {
            body.extend(iff::chunk("ANNO", anno.as_bytes()));
        }
        for (id, data) in value.extra() {
            body.extend(iff::chunk(id, data));
        }
        if let Some(args) = value.args() {
            body.extend(Vec::from(args));
        }
        if let Some(scrn) = value.scrn() {
            body.extend(iff::chunk("Scrn", scrn));
        }
        if let Some(undo) = value.undo() {
            body.extend(Vec::from(undo));
        }
        if let Some(msav) = value.msav() {
            body.extend(Vec::from(msav));
        }
        if let Some(rand) = value.rand() {
            body.extend(Vec::from(rand));
        }

        Form::to_vec(value.form_type().id(), &body)
    }
}

impl TryFrom<&[u8]> for Quetzal {
    type Error = RuntimeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let form = Form::try_from(value)?;
        let form_type = match FormType::from_id(form.sub_form()) {
            Some(t) => t,
            None => {
                error!(target: "app::quetzal", "Unexpected FORM type '{}'", form.sub_form());
                return recoverable_error!(
                    ErrorCode::Restore,
                    "Not a Quetzal save file (FORM type '{}')",
                    form.sub_form()
                );
            }
        };

        let mut ifhd = None;
        let mut mem = None;
        let mut stks = None;
        let mut intd = None;
        let mut anno = None;
        let mut args = None;
        let mut undo = None;
        let mut msav = None;
        let mut rand = None;
        let mut scrn = None;
        let mut extra = Vec::new();

        for chunk in form.chunks() {
            match chunk.id() {
                "IFhd" => ifhd = Some(IFhd::try_from(chunk)?),
                "CMem" | "UMem" => mem = Some(Mem::from(chunk)),
                "Stks" => stks = Some(Stks::try_from(chunk)?),
                "IntD" => {
                    if chunk.data().len() >= 12 {
                        let name = chunk.data()[12..].iter().map(|b| *b as char).collect();
                        intd = Some(IntD { story_file: name });
                    }
                }
                "ANNO" => anno = Some(chunk.data().iter().map(|b| *b as char).collect()),
                "Args" => args = Some(Args::try_from(chunk)?),
                // Undo, MSav, and Rand decode best-effort: a damaged
                // history chunk must not sink the whole restore
                "Undo" => match StackChunk::decode(StackChunkId::Undo, chunk) {
                    Ok(c) => undo = Some(c),
                    Err(e) => warn!(target: "app::quetzal", "Ignoring Undo chunk: {}", e),
                },
                "MSav" => match StackChunk::decode(StackChunkId::MSav, chunk) {
                    Ok(c) => msav = Some(c),
                    Err(e) => warn!(target: "app::quetzal", "Ignoring MSav chunk: {}", e),
                },
                "Rand" => match Rand::try_from(chunk) {
                    Ok(c) => rand = Some(c),
                    Err(e) => warn!(target: "app::quetzal", "Ignoring Rand chunk: {}", e),
                },
                "Scrn" => scrn = Some(chunk.data().to_vec()),
                "Bfhs" | "Bfts" => extra.push((chunk.id().to_string(), chunk.data().to_vec())),
                id => debug!(target: "app::quetzal", "Ignoring chunk with id '{}'", id),
            }
        }

        let ifhd = match ifhd {
            Some(i) => i,
            None => {
                return recoverable_error!(ErrorCode::Restore, "Save file is missing IFhd chunk")
            }
        };
        let mem = match mem {
            Some(m) => m,
            None => {
                return recoverable_error!(
                    ErrorCode::Restore,
                    "Save file is missing memory (CMem or UMem) chunk"
                )
            }
        };
        let stks = match stks {
            Some(s) => s,
            None => {
                return recoverable_error!(ErrorCode::Restore, "Save file is missing Stks chunk")
            }
        };

        Ok(Quetzal {
            form_type,
            ifhd,
            mem,
            stks,
            intd,
            anno,
            args,
            undo,
            msav,
            rand,
            scrn,
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        assert_ok, assert_some,
        saves::{SaveOpcode, SaveStack, SaveState, SaveType},
        test_util::test_map_with_pattern,
    };

    use crate::state::memory::Memory;

    use super::{stks::Stk, *};

    fn test_quetzal(form_type: FormType) -> Quetzal {
        let mut memory = Memory::new(test_map_with_pattern(5));
        memory.write_byte(0x200, 0xFC).unwrap();
        let ifhd = IFhd::from_memory(&memory, 0x0404).unwrap();
        let mem = Mem::from_memory(&memory);
        let stks = Stks::new(vec![
            Stk::new(0, 0x10, 0, 0, &[], &[]),
            Stk::new(0x0404, 0x02, 0x80, 1, &[0x11, 0x22], &[0x99]),
        ]);
        Quetzal::new(form_type, ifhd, mem, stks)
    }

    #[test]
    fn test_minimal_round_trip() {
        let quetzal = test_quetzal(FormType::IFZS);
        let v = Vec::from(&quetzal);
        let decoded = assert_ok!(Quetzal::try_from(v.as_slice()));
        assert_eq!(decoded.form_type(), FormType::IFZS);
        assert_eq!(decoded.ifhd(), quetzal.ifhd());
        assert_eq!(decoded.mem(), quetzal.mem());
        assert_eq!(decoded.stks(), quetzal.stks());
        assert!(decoded.args().is_none());
        assert!(decoded.undo().is_none());
        assert!(decoded.rand().is_none());
    }

    #[test]
    fn test_full_round_trip() {
        let mut quetzal = test_quetzal(FormType::BFZS);
        quetzal.set_intd(IntD::new("zork1.z5"));
        quetzal.set_anno("test interpreter".to_string());
        quetzal.set_args(Args::new(SaveOpcode::Read, &[0x1234, 0x5678]));
        quetzal.set_scrn(vec![1, 2, 3, 4]);
        let mut undo_stack = SaveStack::new(10);
        undo_stack.push(SaveState::new(
            SaveType::Normal,
            Some("u1".to_string()),
            vec![9, 9],
        ));
        quetzal.set_undo(StackChunk::from_stack(StackChunkId::Undo, &undo_stack));
        let mut user_stack = SaveStack::new(10);
        user_stack.push(SaveState::new(
            SaveType::Meta,
            Some("m1".to_string()),
            vec![8],
        ));
        quetzal.set_msav(StackChunk::from_stack(StackChunkId::MSav, &user_stack));
        quetzal.set_rand(Rand::new(0x12345678));

        let v = Vec::from(&quetzal);
        let decoded = assert_ok!(Quetzal::try_from(v.as_slice()));
        assert_eq!(decoded.form_type(), FormType::BFZS);
        assert_eq!(assert_some!(decoded.intd()).story_file(), "zork1.z5");
        assert_eq!(assert_some!(decoded.anno()), "test interpreter");
        assert_eq!(
            assert_some!(decoded.args()),
            &Args::new(SaveOpcode::Read, &[0x1234, 0x5678])
        );
        assert_eq!(assert_some!(decoded.scrn()), &[1, 2, 3, 4]);
        let undo = assert_some!(decoded.undo());
        assert_eq!(undo.entries().len(), 1);
        assert_eq!(undo.entries()[0].savetype(), SaveType::Normal);
        assert_eq!(undo.entries()[0].data(), &[9, 9]);
        let msav = assert_some!(decoded.msav());
        assert_eq!(msav.entries()[0].desc(), "m1");
        assert_eq!(assert_some!(decoded.rand()).state(), 0x12345678);
    }

    #[test]
    fn test_bfms_accepted() {
        let quetzal = test_quetzal(FormType::BFMS);
        let v = Vec::from(&quetzal);
        let decoded = assert_ok!(Quetzal::try_from(v.as_slice()));
        assert_eq!(decoded.form_type(), FormType::BFMS);
    }

    #[test]
    fn test_unknown_form_type_rejected() {
        let v = Form::to_vec("IFRS", &iff::chunk("IFhd", &[0; 13]));
        assert!(Quetzal::try_from(v.as_slice()).is_err());
    }

    #[test]
    fn test_missing_chunks_rejected() {
        let quetzal = test_quetzal(FormType::IFZS);

        // Drop each required chunk in turn by rebuilding the body
        let ifhd = Vec::from(quetzal.ifhd());
        let mem = Vec::from(quetzal.mem());
        let stks = Vec::<u8>::from(quetzal.stks());

        let without = |skip: usize| {
            let mut body = Vec::new();
            for (i, c) in [&ifhd, &mem, &stks].iter().enumerate() {
                if i != skip {
                    body.extend(c.iter());
                }
            }
            Form::to_vec("IFZS", &body)
        };

        for skip in 0..3 {
            assert!(Quetzal::try_from(without(skip).as_slice()).is_err(), "{}", skip);
        }
    }

    #[test]
    fn test_damaged_undo_is_ignored() {
        let mut quetzal = test_quetzal(FormType::BFZS);
        let mut undo_stack = SaveStack::new(10);
        undo_stack.push(SaveState::new(
            SaveType::Normal,
            Some("u1".to_string()),
            vec![9],
        ));
        quetzal.set_undo(StackChunk::from_stack(StackChunkId::Undo, &undo_stack));
        let mut v = Vec::from(&quetzal);

        // Corrupt the Undo version word
        let pos = v
            .windows(4)
            .position(|w| w == b"Undo")
            .unwrap();
        v[pos + 8 + 3] = 9;

        let decoded = assert_ok!(Quetzal::try_from(v.as_slice()));
        assert!(decoded.undo().is_none());
        // The rest of the save still parses
        assert_eq!(decoded.form_type(), FormType::BFZS);
    }

    #[test]
    fn test_unknown_chunk_ignored() {
        let quetzal = test_quetzal(FormType::IFZS);
        let mut body = Vec::from(quetzal.ifhd());
        body.extend(iff::chunk("Xtra", &[1, 2, 3]));
        body.extend(Vec::from(quetzal.mem()));
        body.extend(Vec::<u8>::from(quetzal.stks()));
        let v = Form::to_vec("IFZS", &body);
        assert!(Quetzal::try_from(v.as_slice()).is_ok());
    }

    #[test]
    fn test_extra_chunks_carried() {
        let quetzal = test_quetzal(FormType::BFZS);
        let mut body = Vec::from(quetzal.ifhd());
        body.extend(Vec::from(quetzal.mem()));
        body.extend(Vec::<u8>::from(quetzal.stks()));
        body.extend(iff::chunk("Bfhs", &[0xAB, 0xCD]));
        let v = Form::to_vec("BFZS", &body);
        let decoded = assert_ok!(Quetzal::try_from(v.as_slice()));
        assert_eq!(decoded.extra().len(), 1);
        assert_eq!(decoded.extra()[0].0, "Bfhs");
        assert_eq!(decoded.extra()[0].1, vec![0xAB, 0xCD]);

        // And re-encoded
        let v2 = Vec::from(&decoded);
        let decoded2 = assert_ok!(Quetzal::try_from(v2.as_slice()));
        assert_eq!(decoded2.extra().len(), 1);
    }
}
