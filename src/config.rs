//! Runtime configuration
use serde_yaml::{self, Value};
use std::fs::File;

use crate::{
    error::{ErrorCode, RuntimeError},
    recoverable_error,
};

/// Frame-count ceiling: unwind targets must fit in 16 bits
pub const MAX_CALL_STACK: usize = 0xFFFE;

const DEFAULT_UNDO_SLOTS: usize = 100;
const DEFAULT_EVAL_STACK: usize = 16384;
const DEFAULT_CALL_STACK: usize = 1024;

#[derive(Debug)]
/// Runtime configuration data
pub struct Config {
    /// Is logging enabled?
    logging: bool,
    /// Undo (game) save-stack capacity; 0 disables interpreter undo
    undo_slots: usize,
    /// Evaluation stack capacity, in words, across all frames
    eval_stack_size: usize,
    /// Call stack capacity, in frames
    call_stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: false,
            undo_slots: DEFAULT_UNDO_SLOTS,
            eval_stack_size: DEFAULT_EVAL_STACK,
            call_stack_size: DEFAULT_CALL_STACK,
        }
    }
}

impl TryFrom<File> for Config {
    type Error = RuntimeError;

    fn try_from(value: File) -> Result<Self, Self::Error> {
        match serde_yaml::from_reader::<File, Value>(value) {
            Ok(data) => {
                let logging = match data["logging"].as_str() {
                    Some(t) => t == "enabled",
                    None => false,
                };
                let undo_slots = match data["undo_slots"].as_u64() {
                    Some(v) => v as usize,
                    None => DEFAULT_UNDO_SLOTS,
                };
                let eval_stack_size = match data["eval_stack_size"].as_u64() {
                    Some(v) => v as usize,
                    None => DEFAULT_EVAL_STACK,
                };
                let call_stack_size = match data["call_stack_size"].as_u64() {
                    Some(v) => v as usize,
                    None => DEFAULT_CALL_STACK,
                };
                Ok(Config::new(
                    logging,
                    undo_slots,
                    eval_stack_size,
                    call_stack_size,
                ))
            }
            Err(e) => recoverable_error!(ErrorCode::ConfigError, "{}", e),
        }
    }
}

impl Config {
    /// Constructor
    ///
    /// # Arguments
    /// * `logging` - Logging enabled flag
    /// * `undo_slots` - Undo save-stack capacity
    /// * `eval_stack_size` - Evaluation stack capacity in words
    /// * `call_stack_size` - Call stack capacity in frames
    pub fn new(
        logging: bool,
        undo_slots: usize,
        eval_stack_size: usize,
        call_stack_size: usize,
    ) -> Self {
        Config {
            logging,
            undo_slots,
            eval_stack_size,
            call_stack_size: usize::min(call_stack_size, MAX_CALL_STACK),
        }
    }

    /// Get the logging flag
    pub fn logging(&self) -> bool {
        self.logging
    }

    /// Get the undo save-stack capacity
    pub fn undo_slots(&self) -> usize {
        self.undo_slots
    }

    /// Get the evaluation stack capacity in words
    pub fn eval_stack_size(&self) -> usize {
        self.eval_stack_size
    }

    /// Get the call stack capacity in frames
    pub fn call_stack_size(&self) -> usize {
        self.call_stack_size
    }
}
