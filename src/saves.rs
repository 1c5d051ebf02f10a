//! In-memory save stacks: bounded stacks of serialized game states
//! backing undo and the story-controlled save stack.
use std::collections::VecDeque;

use time::macros::format_description;
use time::OffsetDateTime;

/// How a stacked save was made: by the story (`@save_undo`) or by the
/// interpreter on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveType {
    Normal,
    Meta,
}

impl From<SaveType> for u8 {
    fn from(value: SaveType) -> Self {
        match value {
            SaveType::Normal => 0,
            SaveType::Meta => 1,
        }
    }
}

impl TryFrom<u8> for SaveType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SaveType::Normal),
            1 => Ok(SaveType::Meta),
            _ => Err(()),
        }
    }
}

/// The read opcode a meta-save interrupted, so a restore can re-run it
/// with the original operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOpcode {
    None,
    Read,
    ReadChar,
}

impl From<SaveOpcode> for u8 {
    fn from(value: SaveOpcode) -> Self {
        match value {
            SaveOpcode::None => 0xFF,
            SaveOpcode::Read => 0,
            SaveOpcode::ReadChar => 1,
        }
    }
}

impl TryFrom<u8> for SaveOpcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xFF => Ok(SaveOpcode::None),
            0 => Ok(SaveOpcode::Read),
            1 => Ok(SaveOpcode::ReadChar),
            _ => Err(()),
        }
    }
}

/// Outcome of a save-stack operation, as the story will see it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveResult {
    Success,
    Failure,
    /// The facility is disabled (capacity 0), which stories may treat
    /// differently from a failed attempt
    Unavailable,
}

fn timestamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    match OffsetDateTime::now_local() {
        Ok(t) => t
            .format(&format)
            .unwrap_or_else(|_| String::from("(unknown time)")),
        Err(_) => String::from("(unknown time)"),
    }
}

/// One stacked save: a serialized Quetzal image plus bookkeeping
#[derive(Debug)]
pub struct SaveState {
    savetype: SaveType,
    desc: String,
    data: Vec<u8>,
}

impl SaveState {
    /// # Arguments
    /// * `savetype` - who made the save
    /// * `desc` - description, defaulting to the current local time
    /// * `data` - serialized Quetzal image
    pub fn new(savetype: SaveType, desc: Option<String>, data: Vec<u8>) -> SaveState {
        SaveState {
            savetype,
            desc: desc.unwrap_or_else(timestamp),
            data,
        }
    }

    pub fn savetype(&self) -> SaveType {
        self.savetype
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// A bounded stack of saves, newest at the front. At capacity the
/// oldest entry is evicted to make room.
#[derive(Debug)]
pub struct SaveStack {
    states: VecDeque<SaveState>,
    max: usize,
}

impl SaveStack {
    pub fn new(max: usize) -> SaveStack {
        SaveStack {
            states: VecDeque::new(),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn is_enabled(&self) -> bool {
        self.max > 0
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn push(&mut self, state: SaveState) -> SaveResult {
        if self.max == 0 {
            return SaveResult::Unavailable;
        }

        while self.states.len() >= self.max {
            self.states.pop_back();
        }
        debug!(target: "app::state", "Stack save '{}' [{} of {}]", state.desc(), self.states.len() + 1, self.max);
        self.states.push_front(state);
        SaveResult::Success
    }

    /// Removes and returns the save at `index` (0 = most recent). Out
    /// of range leaves the stack untouched.
    pub fn pop(&mut self, index: usize) -> Option<SaveState> {
        self.states.remove(index)
    }

    /// Drops the oldest `n` saves.
    pub fn trim(&mut self, n: usize) {
        for _ in 0..n {
            self.states.pop_back();
        }
    }

    pub fn clear(&mut self) {
        self.states.clear()
    }

    /// Descriptions, newest first, numbered from 1 the way they would
    /// be shown to the player.
    pub fn list(&self) -> Vec<String> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.desc()))
            .collect()
    }

    /// Entries oldest-first, the order they serialize in.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &SaveState> {
        self.states.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tag: &str) -> SaveState {
        SaveState::new(
            SaveType::Normal,
            Some(tag.to_string()),
            vec![tag.len() as u8],
        )
    }

    #[test]
    fn test_save_state_default_desc() {
        let s = SaveState::new(SaveType::Meta, None, vec![1, 2, 3]);
        assert_eq!(s.savetype(), SaveType::Meta);
        assert!(!s.desc().is_empty());
        assert_eq!(s.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_save_type_round_trip() {
        for t in [SaveType::Normal, SaveType::Meta] {
            assert_eq!(SaveType::try_from(u8::from(t)), Ok(t));
        }
        assert!(SaveType::try_from(2).is_err());
    }

    #[test]
    fn test_save_opcode_round_trip() {
        for op in [SaveOpcode::None, SaveOpcode::Read, SaveOpcode::ReadChar] {
            assert_eq!(SaveOpcode::try_from(u8::from(op)), Ok(op));
        }
        assert!(SaveOpcode::try_from(2).is_err());
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut stack = SaveStack::new(3);
        for tag in ["one", "two", "three", "four", "five"] {
            assert_eq!(stack.push(state(tag)), SaveResult::Success);
        }
        assert_eq!(stack.len(), 3);
        assert_eq!(
            stack.list(),
            vec![
                "1. five".to_string(),
                "2. four".to_string(),
                "3. three".to_string()
            ]
        );
    }

    #[test]
    fn test_push_unavailable_when_disabled() {
        let mut stack = SaveStack::new(0);
        assert!(!stack.is_enabled());
        assert_eq!(stack.push(state("one")), SaveResult::Unavailable);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_most_recent() {
        let mut stack = SaveStack::new(10);
        stack.push(state("one"));
        stack.push(state("two"));
        let s = stack.pop(0);
        assert!(s.is_some());
        assert_eq!(s.unwrap().desc(), "two");
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_pop_by_index() {
        let mut stack = SaveStack::new(10);
        stack.push(state("one"));
        stack.push(state("two"));
        stack.push(state("three"));
        let s = stack.pop(2);
        assert!(s.is_some());
        assert_eq!(s.unwrap().desc(), "one");
        assert_eq!(
            stack.list(),
            vec!["1. three".to_string(), "2. two".to_string()]
        );
    }

    #[test]
    fn test_pop_out_of_range_no_mutation() {
        let mut stack = SaveStack::new(10);
        stack.push(state("one"));
        stack.push(state("two"));
        assert!(stack.pop(2).is_none());
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.list(), vec!["1. two".to_string(), "2. one".to_string()]);
    }

    #[test]
    fn test_trim() {
        let mut stack = SaveStack::new(10);
        for tag in ["one", "two", "three", "four"] {
            stack.push(state(tag));
        }
        stack.trim(2);
        assert_eq!(
            stack.list(),
            vec!["1. four".to_string(), "2. three".to_string()]
        );
        stack.trim(5);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_iter_oldest_first() {
        let mut stack = SaveStack::new(10);
        stack.push(state("one"));
        stack.push(state("two"));
        stack.push(state("three"));
        let descs: Vec<&str> = stack.iter_oldest_first().map(|s| s.desc()).collect();
        assert_eq!(descs, vec!["one", "two", "three"]);
    }
}
