//! Execution-state core for a Z-machine interpreter: story memory and
//! the frame stack, variable addressing, Quetzal save/restore, the
//! undo and user save stacks, and the persistable PRNG.
#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod files;
pub mod iff;
pub mod quetzal;
pub mod rng;
pub mod saves;
pub mod stash;
pub mod state;

#[cfg(test)]
pub mod test_util;
