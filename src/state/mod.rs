//! Execution state: story memory, the frame stack, variable
//! addressing, and the save/restore/undo machinery built on them.
use crate::{
    config::Config,
    error::*,
    fatal_error,
    quetzal::{
        args::Args,
        ifhd::IFhd,
        mem::Mem,
        rand::Rand,
        stacks::{StackChunk, StackChunkId},
        stks::Stks,
        FormType, IntD, Quetzal,
    },
    recoverable_error,
    rng::ZRng,
    saves::{SaveOpcode, SaveResult, SaveStack, SaveState, SaveType},
    stash::Stash,
};

use self::{
    frame::{Frame, StoreWhere},
    header::HeaderField,
    memory::Memory,
};

pub mod frame;
pub mod header;
pub mod memory;

/// User (story-controlled) save-stack capacity
pub const USER_SAVE_SLOTS: usize = 25;

/// Outcome of popping a frame
#[derive(Debug, PartialEq, Eq)]
pub enum Return {
    /// Ordinary return: resume at this pc
    Normal(usize),
    /// Return from an interrupt routine: the value is also pushed for
    /// the interrupt machinery to inspect
    Interrupt(usize, u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RestoreKind {
    Normal,
    Meta,
    Autosave,
}

/// What a successful restore hands back to the interpreter loop
#[derive(Debug)]
pub struct Restored {
    pc: usize,
    opcode: SaveOpcode,
    operands: Vec<u16>,
    scrn: Option<Vec<u8>>,
}

impl Restored {
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn opcode(&self) -> SaveOpcode {
        self.opcode
    }

    pub fn operands(&self) -> &[u16] {
        &self.operands
    }

    /// Screen-state payload for the screen layer. Only present once
    /// every fallible step of the restore has succeeded, because
    /// applying it can't be undone.
    pub fn scrn(&self) -> Option<&[u8]> {
        self.scrn.as_deref()
    }
}

pub struct State {
    version: u8,
    memory: Memory,
    frames: Vec<Frame>,
    rng: ZRng,
    undo_stack: SaveStack,
    user_stack: SaveStack,
    seen_save_undo: bool,
    read_args: Vec<u16>,
    stash: Stash,
    eval_stack_size: usize,
    call_stack_size: usize,
    story_file: String,
}

impl State {
    /// Builds the execution state for a loaded story and sets up the
    /// initial frame.
    ///
    /// # Arguments
    /// * `memory` - story memory
    /// * `config` - runtime configuration
    /// * `story_file` - story filename, recorded in save files
    pub fn new(memory: Memory, config: &Config, story_file: &str) -> Result<State, RuntimeError> {
        let version = memory.version();
        if !(1..=8).contains(&version) {
            return fatal_error!(
                ErrorCode::UnsupportedVersion,
                "Version {} is not supported",
                version
            );
        }

        let mut state = State {
            version,
            memory,
            frames: Vec::new(),
            rng: ZRng::new(),
            undo_stack: SaveStack::new(config.undo_slots()),
            user_stack: SaveStack::new(USER_SAVE_SLOTS),
            seen_save_undo: false,
            read_args: Vec::new(),
            stash: Stash::core(),
            eval_stack_size: config.eval_stack_size(),
            call_stack_size: config.call_stack_size(),
            story_file: story_file.to_string(),
        };
        state.initialize()?;
        Ok(state)
    }

    /// (Re)creates the initial frame. V6 stories start with a call to
    /// a main routine; everything else gets a dummy frame that can
    /// never be returned from.
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        self.frames.clear();
        let initial_pc = header::field_word(&self.memory, HeaderField::InitialPC)?;
        if self.version == 6 {
            self.call_routine(initial_pc, &[], StoreWhere::None, 0)?;
        } else {
            self.frames.push(Frame::new(
                0,
                initial_pc as usize,
                &[],
                0,
                &[],
                StoreWhere::None,
                0,
            ));
        }
        Ok(())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn set_frames(&mut self, frames: Vec<Frame>) {
        self.frames = frames;
    }

    pub fn rng(&self) -> &ZRng {
        &self.rng
    }

    pub fn set_rng(&mut self, rng: ZRng) {
        self.rng = rng;
    }

    pub fn read_args(&self) -> &[u16] {
        &self.read_args
    }

    /// Records the operands of the in-flight read opcode, so meta
    /// saves can restore it.
    pub fn set_read_args(&mut self, args: Vec<u16>) {
        self.read_args = args;
    }

    pub fn undo_stack(&self) -> &SaveStack {
        &self.undo_stack
    }

    pub fn user_stack(&self) -> &SaveStack {
        &self.user_stack
    }

    pub fn seen_save_undo(&self) -> bool {
        self.seen_save_undo
    }

    pub fn read_byte(&self, address: usize) -> Result<u8, RuntimeError> {
        self.memory.read_byte(address)
    }

    pub fn read_word(&self, address: usize) -> Result<u16, RuntimeError> {
        self.memory.read_word(address)
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), RuntimeError> {
        self.memory.write_byte(address, value)
    }

    pub fn write_word(&mut self, address: usize, value: u16) -> Result<(), RuntimeError> {
        self.memory.write_word(address, value)
    }

    pub fn random(&mut self, range: u16) -> u16 {
        self.rng.random(range)
    }

    pub fn seed(&mut self, seed: u16) {
        self.rng.seed(seed)
    }

    fn current_frame(&self) -> Result<&Frame, RuntimeError> {
        if let Some(frame) = self.frames.last() {
            Ok(frame)
        } else {
            fatal_error!(ErrorCode::FrameUnderflow, "No current frame")
        }
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        if let Some(frame) = self.frames.last_mut() {
            Ok(frame)
        } else {
            fatal_error!(ErrorCode::FrameUnderflow, "No current frame")
        }
    }

    pub fn pc(&self) -> Result<usize, RuntimeError> {
        Ok(self.current_frame()?.pc())
    }

    pub fn set_pc(&mut self, pc: usize) -> Result<(), RuntimeError> {
        self.current_frame_mut()?.set_pc(pc);
        Ok(())
    }

    pub fn argument_count(&self) -> Result<u8, RuntimeError> {
        Ok(self.current_frame()?.argument_count())
    }

    fn eval_stack_depth(&self) -> usize {
        self.frames.iter().map(|f| f.stack().len()).sum()
    }

    pub fn push(&mut self, value: u16) -> Result<(), RuntimeError> {
        if self.eval_stack_depth() >= self.eval_stack_size {
            return fatal_error!(
                ErrorCode::StackOverflow,
                "Evaluation stack overflow at {} words",
                self.eval_stack_size
            );
        }
        self.current_frame_mut()?.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, RuntimeError> {
        self.current_frame_mut()?.pop()
    }

    pub fn peek(&self) -> Result<u16, RuntimeError> {
        self.current_frame()?.peek()
    }

    fn global_address(&self, variable: u8) -> Result<usize, RuntimeError> {
        let table = header::field_word(&self.memory, HeaderField::GlobalTable)? as usize;
        Ok(table + ((variable as usize - 16) * 2))
    }

    /// Reads variable `variable`: 0 pops the stack, 1-15 are locals,
    /// 16-255 are globals.
    pub fn variable(&mut self, variable: u8) -> Result<u16, RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?.local_variable(variable)
        } else {
            self.memory.read_word(self.global_address(variable)?)
        }
    }

    /// Like [State::variable], but variable 0 peeks instead of popping.
    pub fn peek_variable(&self, variable: u8) -> Result<u16, RuntimeError> {
        if variable < 16 {
            self.current_frame()?.peek_local_variable(variable)
        } else {
            self.memory.read_word(self.global_address(variable)?)
        }
    }

    pub fn set_variable(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        debug!(target: "app::state", "Set variable {:02x} to {:04x}", variable, value);
        if variable == 0 {
            self.push(value)
        } else if variable < 16 {
            self.current_frame_mut()?.set_local_variable(variable, value)
        } else {
            let address = self.global_address(variable)?;
            self.memory.write_word(address, value)
        }
    }

    /// Indirect variable writes replace the top of the stack in place.
    pub fn set_variable_indirect(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?
                .set_local_variable_indirect(variable, value)
        } else {
            let address = self.global_address(variable)?;
            self.memory.write_word(address, value)
        }
    }

    fn packed_routine_address(&self, address: u16) -> Result<usize, RuntimeError> {
        match self.version {
            1..=3 => Ok(address as usize * 2),
            4 | 5 => Ok(address as usize * 4),
            6 | 7 => Ok(address as usize * 4
                + (header::field_word(&self.memory, HeaderField::RoutinesOffset)? as usize * 8)),
            8 => Ok(address as usize * 8),
            _ => fatal_error!(
                ErrorCode::UnsupportedVersion,
                "Version {} is not supported",
                self.version
            ),
        }
    }

    /// Calls the routine at a packed address. Calling address 0 is a
    /// no-op that stores FALSE.
    ///
    /// # Arguments
    /// * `packed_address` - packed routine address
    /// * `arguments` - call arguments, overlaying the routine's locals
    /// * `store` - where the routine's return value goes
    /// * `return_address` - pc to resume at after the routine returns
    ///
    /// # Returns
    /// The pc of the routine's first instruction
    pub fn call_routine(
        &mut self,
        packed_address: u16,
        arguments: &[u16],
        store: StoreWhere,
        return_address: usize,
    ) -> Result<usize, RuntimeError> {
        if packed_address == 0 {
            if let StoreWhere::Variable(v) = store {
                self.set_variable(v, 0)?;
            }
            return Ok(return_address);
        }

        if self.frames.len() >= self.call_stack_size {
            return fatal_error!(
                ErrorCode::FrameOverflow,
                "Call stack overflow at {} frames",
                self.call_stack_size
            );
        }

        let address = self.packed_routine_address(packed_address)?;
        let count = self.memory.read_byte(address)? as usize;
        if count > 15 {
            return fatal_error!(
                ErrorCode::InvalidRoutine,
                "Routine at ${:06x} declares {} locals",
                address,
                count
            );
        }

        // V1-4 routines carry initial local values; V5+ locals start 0
        let (local_variables, initial_pc) = if self.version < 5 {
            let mut lv = Vec::new();
            for i in 0..count {
                lv.push(self.memory.read_word(address + 1 + (i * 2))?);
            }
            (lv, address + 1 + (count * 2))
        } else {
            (vec![0; count], address + 1)
        };

        debug!(target: "app::state", "Call routine ${:06x} [depth {}]", address, self.frames.len());
        self.frames.push(Frame::call_routine(
            address,
            initial_pc,
            arguments,
            local_variables,
            store,
            return_address,
        ));
        Ok(initial_pc)
    }

    /// Pops the current frame and disposes of the routine's return
    /// value.
    pub fn return_routine(&mut self, value: u16) -> Result<Return, RuntimeError> {
        let frame = match self.frames.pop() {
            Some(f) => f,
            None => return fatal_error!(ErrorCode::FrameUnderflow, "Return with no frame"),
        };
        if self.frames.is_empty() {
            return fatal_error!(ErrorCode::ReturnNoCaller, "Return from the initial frame");
        }

        let pc = frame.return_address();
        debug!(target: "app::state", "Return {:04x} to ${:06x} [depth {}]", value, pc, self.frames.len() - 1);
        self.current_frame_mut()?.set_pc(pc);
        match frame.store() {
            StoreWhere::Variable(v) => {
                self.set_variable(v, value)?;
                Ok(Return::Normal(pc))
            }
            StoreWhere::None => Ok(Return::Normal(pc)),
            StoreWhere::Push => {
                self.push(value)?;
                Ok(Return::Interrupt(pc, value))
            }
        }
    }

    /// The current frame depth, used as an unwind token by `@catch`.
    /// V6 has no initial dummy frame, so its tokens count frames
    /// directly and the main routine's token is 1.
    pub fn catch(&self) -> Result<u16, RuntimeError> {
        if self.frames.is_empty() {
            fatal_error!(ErrorCode::FrameUnderflow, "No current frame")
        } else if self.version == 6 {
            Ok(self.frames.len() as u16)
        } else {
            Ok((self.frames.len() - 1) as u16)
        }
    }

    /// Unwinds to the frame `depth` names and returns from it.
    pub fn throw(&mut self, depth: u16, result: u16) -> Result<Return, RuntimeError> {
        let target = if self.version == 6 {
            depth as usize
        } else {
            // Token 0 is the dummy frame
            depth as usize + 1
        };
        if depth == 0 || target > self.frames.len() {
            return fatal_error!(
                ErrorCode::ThrowDepth,
                "Throw to depth {} with {} frames",
                depth,
                self.frames.len()
            );
        }

        debug!(target: "app::state", "Throw {:04x} to depth {}", result, depth);
        self.frames.truncate(target);
        self.return_routine(result)
    }

    /// Resets the story as `@restart` does: pristine dynamic memory
    /// except Flags 2, and a fresh initial frame.
    pub fn restart(&mut self) -> Result<usize, RuntimeError> {
        let flags2 = header::field_word(&self.memory, HeaderField::Flags2)?;
        self.memory.reset();
        header::set_word(&mut self.memory, HeaderField::Flags2, flags2)?;
        self.initialize()?;
        self.pc()
    }

    fn quetzal(
        &self,
        form_type: FormType,
        pc: usize,
        opcode: SaveOpcode,
        scrn: Option<Vec<u8>>,
    ) -> Result<Quetzal, RuntimeError> {
        let ifhd = IFhd::from_memory(&self.memory, pc)?;
        let mem = Mem::from_memory(&self.memory);
        let stks = Stks::from_frames(&self.frames);
        let mut quetzal = Quetzal::new(form_type, ifhd, mem, stks);
        quetzal.set_intd(IntD::new(&self.story_file));
        quetzal.set_anno(format!("gnusto {}", env!("CARGO_PKG_VERSION")));
        if form_type != FormType::IFZS {
            // A pending-read tag without its operands would produce a
            // save our own decoder rejects
            let opcode = if Args::valid_operand_count(opcode, self.read_args.len()) {
                opcode
            } else {
                SaveOpcode::None
            };
            quetzal.set_args(Args::new(opcode, &self.read_args));
            if let Some(scrn) = scrn {
                quetzal.set_scrn(scrn);
            }
        }
        Ok(quetzal)
    }

    /// Serializes a standard (`@save`) Quetzal image.
    ///
    /// # Arguments
    /// * `pc` - pc to record for the restore to resume at
    pub fn save(&self, pc: usize) -> Result<Vec<u8>, RuntimeError> {
        info!(target: "app::state", "Save at ${:06x}", pc);
        Ok(Vec::from(&self.quetzal(
            FormType::IFZS,
            pc,
            SaveOpcode::None,
            None,
        )?))
    }

    /// Serializes a meta-save image: a BFZS form carrying the read
    /// opcode and operands (and optionally screen state) needed to
    /// resume seamlessly.
    pub fn save_meta(
        &self,
        pc: usize,
        opcode: SaveOpcode,
        scrn: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, RuntimeError> {
        Ok(Vec::from(&self.quetzal(FormType::BFZS, pc, opcode, scrn)?))
    }

    /// Serializes an autosave: a meta save that additionally embeds
    /// both save stacks and the predictable PRNG state.
    pub fn save_autosave(
        &self,
        pc: usize,
        opcode: SaveOpcode,
        scrn: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, RuntimeError> {
        let mut quetzal = self.quetzal(FormType::BFZS, pc, opcode, scrn)?;
        quetzal.set_undo(StackChunk::from_stack(StackChunkId::Undo, &self.undo_stack));
        quetzal.set_msav(StackChunk::from_stack(StackChunkId::MSav, &self.user_stack));
        if let Some(state) = self.rng.predictable_state() {
            quetzal.set_rand(Rand::new(state));
        }
        Ok(Vec::from(&quetzal))
    }

    /// `@save_undo`: pushes a story-requested snapshot. The first call
    /// permanently hands the undo stack over to the story.
    pub fn save_undo(&mut self, pc: usize) -> SaveResult {
        self.seen_save_undo = true;
        match self.save_meta(pc, SaveOpcode::None, None) {
            Ok(data) => self
                .undo_stack
                .push(SaveState::new(SaveType::Normal, None, data)),
            Err(e) => {
                warn!(target: "app::state", "save_undo failed: {}", e);
                SaveResult::Failure
            }
        }
    }

    /// Pushes an interpreter-generated undo snapshot. Unavailable once
    /// the story has used `@save_undo` itself.
    pub fn interpreter_undo(
        &mut self,
        pc: usize,
        opcode: SaveOpcode,
        scrn: Option<Vec<u8>>,
    ) -> SaveResult {
        if self.seen_save_undo {
            return SaveResult::Unavailable;
        }
        match self.save_meta(pc, opcode, scrn) {
            Ok(data) => self
                .undo_stack
                .push(SaveState::new(SaveType::Meta, None, data)),
            Err(e) => {
                warn!(target: "app::state", "interpreter undo failed: {}", e);
                SaveResult::Failure
            }
        }
    }

    /// `@restore_undo`: pops and restores the most recent undo
    /// snapshot. `Ok(None)` when the stack is empty.
    pub fn restore_undo(&mut self) -> Result<Option<Restored>, RuntimeError> {
        match self.undo_stack.pop(0) {
            Some(save) => {
                let data = save.into_data();
                self.restore_from(&data, RestoreKind::Meta).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Pushes a save onto the user save stack.
    pub fn save_user(&mut self, pc: usize, desc: Option<String>) -> SaveResult {
        match self.save_meta(pc, SaveOpcode::None, None) {
            Ok(data) => self
                .user_stack
                .push(SaveState::new(SaveType::Meta, desc, data)),
            Err(e) => {
                warn!(target: "app::state", "user save failed: {}", e);
                SaveResult::Failure
            }
        }
    }

    /// Pops and restores the user save at `index` (0 = most recent).
    pub fn restore_user(&mut self, index: usize) -> Result<Option<Restored>, RuntimeError> {
        match self.user_stack.pop(index) {
            Some(save) => {
                let data = save.into_data();
                self.restore_from(&data, RestoreKind::Meta).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Drops the user save at `index` without restoring it.
    pub fn drop_user(&mut self, index: usize) -> bool {
        self.user_stack.pop(index).is_some()
    }

    pub fn trim_user(&mut self, n: usize) {
        self.user_stack.trim(n)
    }

    pub fn list_user_saves(&self) -> Vec<String> {
        self.user_stack.list()
    }

    /// Restores a standard (`IFZS`) save.
    pub fn restore(&mut self, data: &[u8]) -> Result<Restored, RuntimeError> {
        self.restore_from(data, RestoreKind::Normal)
    }

    /// Restores a meta save (`BFZS`, or the deprecated `BFMS`).
    pub fn restore_meta(&mut self, data: &[u8]) -> Result<Restored, RuntimeError> {
        self.restore_from(data, RestoreKind::Meta)
    }

    /// Restores an autosave, including the embedded save stacks and
    /// PRNG state. A bad autosave is not an error: the interpreter
    /// falls through to a normal start.
    pub fn restore_autosave(&mut self, data: &[u8]) -> Result<Option<Restored>, RuntimeError> {
        match self.restore_from(data, RestoreKind::Autosave) {
            Ok(restored) => Ok(Some(restored)),
            Err(e) => {
                if e.is_recoverable() {
                    warn!(target: "app::state", "Autorestore failed: {}", e);
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Old-style meta saves didn't record the read operands, so a save
    /// whose pending instruction pulled an argument from the stack
    /// can't be resumed. Walks the operand-type byte at `address`.
    fn instruction_has_stack_argument(&self, mut address: usize) -> Result<bool, RuntimeError> {
        // A walk off the end of memory means the save is damaged, not
        // the interpreter
        let byte_at = |address: usize| match self.memory.read_byte(address) {
            Ok(b) => Ok(b),
            Err(_) => recoverable_error!(
                ErrorCode::Restore,
                "Resume instruction at ${:06x} runs past the end of memory",
                address
            ),
        };

        let types = byte_at(address)?;
        address += 1;

        for i in [6u8, 4, 2, 0] {
            match (types >> i) & 0x03 {
                0 => address += 2,
                1 => address += 1,
                2 => {
                    if byte_at(address)? == 0 {
                        return Ok(true);
                    }
                    address += 1;
                }
                _ => return Ok(false),
            }
        }

        Ok(false)
    }

    fn apply_save_stacks(&mut self, quetzal: &mut Quetzal) {
        self.undo_stack.clear();
        self.user_stack.clear();

        if let Some(chunk) = quetzal.take_undo() {
            for entry in chunk.into_entries() {
                let (savetype, _, data) = entry.into_parts();
                if savetype == SaveType::Normal {
                    self.seen_save_undo = true;
                }
                self.undo_stack.push(SaveState::new(savetype, None, data));
            }
        }
        if let Some(chunk) = quetzal.take_msav() {
            for entry in chunk.into_entries() {
                let (_, desc, data) = entry.into_parts();
                self.user_stack
                    .push(SaveState::new(SaveType::Meta, Some(desc), data));
            }
        }
    }

    fn stash_backup(&mut self) {
        let mut stash = std::mem::take(&mut self.stash);
        stash.backup(self);
        self.stash = stash;
    }

    fn stash_restore(&mut self) -> bool {
        let mut stash = std::mem::take(&mut self.stash);
        let ok = stash.restore(self);
        self.stash = stash;
        ok
    }

    fn restore_from(&mut self, data: &[u8], kind: RestoreKind) -> Result<Restored, RuntimeError> {
        let mut quetzal = Quetzal::try_from(data)?;

        let form_ok = match kind {
            RestoreKind::Normal => quetzal.form_type() == FormType::IFZS,
            RestoreKind::Meta | RestoreKind::Autosave => quetzal.form_type() != FormType::IFZS,
        };
        if !form_ok {
            return recoverable_error!(
                ErrorCode::Restore,
                "Unexpected save format {}",
                quetzal.form_type().id()
            );
        }
        let is_bfms = quetzal.form_type() == FormType::BFMS;

        // Everything below validates before anything mutates
        let my_ifhd = IFhd::from_memory(&self.memory, 0)?;
        if !quetzal.ifhd().is_same_story(&my_ifhd) {
            return recoverable_error!(
                ErrorCode::Restore,
                "Save file doesn't match the loaded story"
            );
        }

        let pc = quetzal.ifhd().pc() as usize;
        if pc >= self.memory.size() {
            return recoverable_error!(ErrorCode::Restore, "Save pc ${:06x} is out of range", pc);
        }

        for stk in quetzal.stks().stks() {
            if stk.return_address() as usize >= self.memory.size() {
                return recoverable_error!(
                    ErrorCode::Restore,
                    "Frame pc ${:06x} is out of range",
                    stk.return_address()
                );
            }
        }

        let (opcode, operands) = match kind {
            RestoreKind::Normal => (SaveOpcode::None, Vec::new()),
            _ => {
                if is_bfms {
                    // The operand-types byte follows the opcode byte
                    if self.instruction_has_stack_argument(pc + 1)? {
                        return recoverable_error!(
                            ErrorCode::Restore,
                            "Old-style save pulled read arguments from the stack"
                        );
                    }
                    (SaveOpcode::Read, Vec::new())
                } else {
                    match quetzal.args() {
                        Some(args) => (args.opcode(), args.operands().to_vec()),
                        None => {
                            return recoverable_error!(
                                ErrorCode::Restore,
                                "Meta save has no Args chunk"
                            )
                        }
                    }
                }
            }
        };

        self.stash_backup();
        let flags2 = header::field_word(&self.memory, HeaderField::Flags2)?;

        let applied: Result<(), RuntimeError> = (|| {
            quetzal.mem().restore_to(&mut self.memory)?;
            let frames: Vec<Frame> = Vec::from(quetzal.stks());
            if frames.is_empty() {
                return recoverable_error!(ErrorCode::Restore, "Save file has no stack frames");
            }
            self.frames = frames;
            Ok(())
        })();

        match applied {
            Ok(_) => {
                // Save-stack and PRNG state ride along in autosaves.
                // They are applied only once the memory and frames are
                // in, so a failed restore never leaks them; damage here
                // was already shed during parsing.
                if kind == RestoreKind::Autosave {
                    self.apply_save_stacks(&mut quetzal);
                    if let Some(rand) = quetzal.rand() {
                        self.rng.restore_state(rand.state());
                    }
                }
                // Flags 2 is the player's, not the save file's
                header::set_word(&mut self.memory, HeaderField::Flags2, flags2)?;
                self.stash.free();
                self.current_frame_mut()?.set_pc(pc);
                self.read_args = operands.clone();
                info!(target: "app::state", "Restore to ${:06x}", pc);
                Ok(Restored {
                    pc,
                    opcode,
                    operands,
                    scrn: quetzal.take_scrn(),
                })
            }
            Err(e) => {
                if self.stash_restore() {
                    Err(e)
                } else {
                    fatal_error!(
                        ErrorCode::StashFailed,
                        "Rollback of a failed restore also failed: {}",
                        e.message()
                    )
                }
            }
        }
    }
}
