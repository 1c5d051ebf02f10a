//! Crash safety for restore: every resource a restore mutates backs
//! itself up first, so a save file that turns out to be corrupt
//! mid-restore can be rolled back instead of leaving a half-restored
//! game.
use crate::state::State;

/// A resource that participates in backup/rollback around a restore.
pub trait Stasher {
    /// Snapshot the resource's current state.
    fn backup(&mut self, state: &State);
    /// Put the snapshot back. Returns false when there is nothing to
    /// restore or the restore failed.
    fn restore(&mut self, state: &mut State) -> bool;
    /// Discard the snapshot. Must be idempotent.
    fn free(&mut self);
}

/// Registry of stashers, run as a unit
#[derive(Default)]
pub struct Stash {
    stashers: Vec<Box<dyn Stasher>>,
    exists: bool,
}

impl Stash {
    pub fn new() -> Stash {
        Stash::default()
    }

    /// A stash covering the core execution state: dynamic memory, the
    /// frame stack, the pending read operands, and the PRNG.
    pub fn core() -> Stash {
        let mut stash = Stash::new();
        stash.register(Box::new(MemoryStasher::default()));
        stash.register(Box::new(FrameStasher::default()));
        stash.register(Box::new(ArgsStasher::default()));
        stash.register(Box::new(RngStasher::default()));
        stash
    }

    pub fn register(&mut self, stasher: Box<dyn Stasher>) {
        self.stashers.push(stasher);
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn backup(&mut self, state: &State) {
        for stasher in self.stashers.iter_mut() {
            stasher.backup(state);
        }
        self.exists = true;
    }

    /// Rolls every resource back, stopping at the first failure but
    /// always freeing the snapshots. Returns overall success.
    pub fn restore(&mut self, state: &mut State) -> bool {
        let mut success = self.exists;
        if self.exists {
            for stasher in self.stashers.iter_mut() {
                if !stasher.restore(state) {
                    success = false;
                    break;
                }
            }
        }
        self.free();
        success
    }

    pub fn free(&mut self) {
        for stasher in self.stashers.iter_mut() {
            stasher.free();
        }
        self.exists = false;
    }
}

#[derive(Default)]
struct MemoryStasher {
    memory: Option<Vec<u8>>,
}

impl Stasher for MemoryStasher {
    fn backup(&mut self, state: &State) {
        self.memory = Some(state.memory().dynamic().to_vec());
    }

    fn restore(&mut self, state: &mut State) -> bool {
        match &self.memory {
            Some(memory) => state.memory_mut().restore(memory).is_ok(),
            None => false,
        }
    }

    fn free(&mut self) {
        self.memory = None;
    }
}

#[derive(Default)]
struct FrameStasher {
    frames: Option<Vec<crate::state::frame::Frame>>,
}

impl Stasher for FrameStasher {
    fn backup(&mut self, state: &State) {
        self.frames = Some(state.frames().to_vec());
    }

    fn restore(&mut self, state: &mut State) -> bool {
        match self.frames.take() {
            Some(frames) => {
                state.set_frames(frames);
                true
            }
            None => false,
        }
    }

    fn free(&mut self) {
        self.frames = None;
    }
}

#[derive(Default)]
struct ArgsStasher {
    args: Option<Vec<u16>>,
}

impl Stasher for ArgsStasher {
    fn backup(&mut self, state: &State) {
        self.args = Some(state.read_args().to_vec());
    }

    fn restore(&mut self, state: &mut State) -> bool {
        match self.args.take() {
            Some(args) => {
                state.set_read_args(args);
                true
            }
            None => false,
        }
    }

    fn free(&mut self) {
        self.args = None;
    }
}

#[derive(Default)]
struct RngStasher {
    rng: Option<crate::rng::ZRng>,
}

impl Stasher for RngStasher {
    fn backup(&mut self, state: &State) {
        self.rng = Some(state.rng().clone());
    }

    fn restore(&mut self, state: &mut State) -> bool {
        match self.rng.take() {
            Some(rng) => {
                state.set_rng(rng);
                true
            }
            None => false,
        }
    }

    fn free(&mut self) {
        self.rng = None;
    }
}
