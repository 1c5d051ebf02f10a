//! Call-stack frames. Each frame carries its own evaluation stack, so
//! popping an empty stack is by definition an underflow across the
//! frame boundary.
use crate::quetzal::stks::{Stk, Stks};
use crate::{error::*, fatal_error};

/// Where a routine's return value goes when the frame is popped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreWhere {
    /// Store to a variable (0 = caller's stack, 1-15 locals, 16+ globals)
    Variable(u8),
    /// Discard the value
    None,
    /// Push onto the caller's stack; marks an interrupt-routine frame
    Push,
}

#[derive(Clone, Debug)]
pub struct Frame {
    address: usize,
    pc: usize,
    local_variables: Vec<u16>,
    argument_count: u8,
    stack: Vec<u16>,
    store: StoreWhere,
    return_address: usize,
}

impl From<&Stk> for Frame {
    fn from(value: &Stk) -> Self {
        let store = if value.flags() & 0x10 == 0x00 {
            StoreWhere::Variable(value.result_variable())
        } else {
            StoreWhere::None
        };
        Frame::new(
            0,
            0,
            value.variables(),
            value.arguments(),
            value.stack(),
            store,
            value.return_address() as usize,
        )
    }
}

impl From<&Stks> for Vec<Frame> {
    fn from(value: &Stks) -> Self {
        value.stks().iter().map(Frame::from).collect()
    }
}

impl Frame {
    pub fn new(
        address: usize,
        pc: usize,
        local_variables: &[u16],
        argument_count: u8,
        stack: &[u16],
        store: StoreWhere,
        return_address: usize,
    ) -> Frame {
        Frame {
            address,
            pc,
            local_variables: local_variables.to_vec(),
            argument_count,
            stack: stack.to_vec(),
            store,
            return_address,
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn local_variables(&self) -> &Vec<u16> {
        &self.local_variables
    }

    pub fn argument_count(&self) -> u8 {
        self.argument_count
    }

    pub fn stack(&self) -> &Vec<u16> {
        &self.stack
    }

    pub fn store(&self) -> StoreWhere {
        self.store
    }

    pub fn return_address(&self) -> usize {
        self.return_address
    }

    pub fn pop(&mut self) -> Result<u16, RuntimeError> {
        if let Some(v) = self.stack.pop() {
            debug!(target: "app::state", "Pop {:04x} [{}]", v, self.stack.len());
            Ok(v)
        } else {
            fatal_error!(ErrorCode::StackUnderflow, "Popped an empty stack")
        }
    }

    pub fn peek(&self) -> Result<u16, RuntimeError> {
        if let Some(v) = self.stack.last() {
            Ok(*v)
        } else {
            fatal_error!(ErrorCode::StackUnderflow, "Peeked an empty stack")
        }
    }

    pub fn push(&mut self, value: u16) {
        self.stack.push(value);
        debug!(target: "app::state", "Push {:04x} [{}]", value, self.stack.len());
    }

    pub fn local_variable(&mut self, variable: u8) -> Result<u16, RuntimeError> {
        if variable == 0 {
            self.pop()
        } else if variable <= self.local_variables.len() as u8 {
            Ok(self.local_variables[variable as usize - 1])
        } else {
            fatal_error!(
                ErrorCode::InvalidLocalVariable,
                "Read from local variable {} out of range: {}",
                variable,
                self.local_variables.len()
            )
        }
    }

    pub fn peek_local_variable(&self, variable: u8) -> Result<u16, RuntimeError> {
        if variable == 0 {
            self.peek()
        } else if variable <= self.local_variables.len() as u8 {
            Ok(self.local_variables[variable as usize - 1])
        } else {
            fatal_error!(
                ErrorCode::InvalidLocalVariable,
                "Peek from local variable {} out of range: {}",
                variable,
                self.local_variables.len()
            )
        }
    }

    pub fn set_local_variable(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        if variable == 0 {
            self.push(value);
            Ok(())
        } else if variable <= self.local_variables.len() as u8 {
            self.local_variables[variable as usize - 1] = value;
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::InvalidLocalVariable,
                "Write to local variable {} out of range: {}",
                variable,
                self.local_variables.len()
            )
        }
    }

    /// Indirect variable references update the top of the stack in
    /// place instead of pushing.
    pub fn set_local_variable_indirect(
        &mut self,
        variable: u8,
        value: u16,
    ) -> Result<(), RuntimeError> {
        if variable == 0 {
            self.pop()?;
            self.push(value);
            Ok(())
        } else if variable <= self.local_variables.len() as u8 {
            self.local_variables[variable as usize - 1] = value;
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::InvalidLocalVariable,
                "Write to local variable {} out of range: {}",
                variable,
                self.local_variables.len()
            )
        }
    }

    /// Builds the frame for a routine call: arguments overlay the
    /// routine's initial local values, extra arguments are dropped.
    pub fn call_routine(
        address: usize,
        initial_pc: usize,
        arguments: &[u16],
        local_variables: Vec<u16>,
        store: StoreWhere,
        return_address: usize,
    ) -> Frame {
        let mut lv = local_variables;

        for (i, arg) in arguments.iter().enumerate() {
            if lv.len() > i {
                lv[i] = *arg;
            }
        }

        Frame::new(
            address,
            initial_pc,
            &lv,
            arguments.len() as u8,
            &[],
            store,
            return_address,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_ok_eq;

    use super::*;

    fn test_frame() -> Frame {
        Frame::new(
            0x1234,
            0x5678,
            &[0x1122, 0x3344, 0x5566, 0x7788],
            3,
            &[0x1111, 0x2222],
            StoreWhere::Variable(0x80),
            0x9876,
        )
    }

    #[test]
    fn test_constructor() {
        let frame = test_frame();
        assert_eq!(frame.address(), 0x1234);
        assert_eq!(frame.pc(), 0x5678);
        assert_eq!(frame.local_variables(), &[0x1122, 0x3344, 0x5566, 0x7788]);
        assert_eq!(frame.argument_count(), 3);
        assert_eq!(frame.stack(), &[0x1111, 0x2222]);
        assert_eq!(frame.store(), StoreWhere::Variable(0x80));
        assert_eq!(frame.return_address(), 0x9876);
    }

    #[test]
    fn test_from_stk() {
        let sf = Stk::new(
            0x1234,
            0x0F,
            0x80,
            3,
            &[0x5678, 0x9abc, 0xf0ad],
            &[0x1111, 0x2222, 0x3333, 0x4444],
        );

        let frame = Frame::from(&sf);
        assert_eq!(frame.address(), 0);
        assert_eq!(frame.pc(), 0);
        assert_eq!(frame.local_variables(), &[0x5678, 0x9abc, 0xf0ad]);
        assert_eq!(frame.argument_count(), 0x3);
        assert_eq!(frame.stack(), &[0x1111, 0x2222, 0x3333, 0x4444]);
        assert_eq!(frame.store(), StoreWhere::Variable(0x80));
        assert_eq!(frame.return_address(), 0x1234);
    }

    #[test]
    fn test_from_stk_no_result() {
        let sf = Stk::new(0x1234, 0x1F, 0x00, 3, &[0x5678], &[]);
        let frame = Frame::from(&sf);
        assert_eq!(frame.store(), StoreWhere::None);
    }

    #[test]
    fn test_vec_from_stks() {
        let stks = Stks::new(vec![
            Stk::new(0x1234, 0x13, 0x00, 1, &[0x5678, 0x9abc, 0xdef0], &[0x1111]),
            Stk::new(0x4321, 0x02, 0x80, 2, &[0x8765, 0xcba9], &[]),
        ]);
        let frames: Vec<Frame> = Vec::from(&stks);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].local_variables(), &[0x5678, 0x9abc, 0xdef0]);
        assert_eq!(frames[0].argument_count(), 0x1);
        assert_eq!(frames[0].stack(), &[0x1111]);
        assert_eq!(frames[0].store(), StoreWhere::None);
        assert_eq!(frames[0].return_address(), 0x1234);
        assert_eq!(frames[1].local_variables(), &[0x8765, 0xcba9]);
        assert_eq!(frames[1].argument_count(), 0x2);
        assert!(frames[1].stack().is_empty());
        assert_eq!(frames[1].store(), StoreWhere::Variable(0x80));
        assert_eq!(frames[1].return_address(), 0x4321);
    }

    #[test]
    fn test_pop() {
        let mut frame = test_frame();
        assert_ok_eq!(frame.pop(), 0x2222);
        assert_ok_eq!(frame.pop(), 0x1111);
        assert!(frame.pop().is_err());
    }

    #[test]
    fn test_peek() {
        let mut frame = test_frame();
        assert_ok_eq!(frame.peek(), 0x2222);
        assert_ok_eq!(frame.pop(), 0x2222);
        assert_ok_eq!(frame.peek(), 0x1111);
        assert_ok_eq!(frame.pop(), 0x1111);
        assert!(frame.peek().is_err());
    }

    #[test]
    fn test_push() {
        let mut frame = test_frame();
        frame.push(0x3456);
        assert_eq!(frame.stack().len(), 3);
        assert_ok_eq!(frame.pop(), 0x3456);
        assert_eq!(frame.stack().len(), 2);
    }

    #[test]
    fn test_local_variable() {
        let mut frame = test_frame();
        assert_ok_eq!(frame.local_variable(1), 0x1122);
        assert_ok_eq!(frame.local_variable(4), 0x7788);
        assert!(frame.local_variable(5).is_err());
        assert_ok_eq!(frame.local_variable(0), 0x2222);
        assert_ok_eq!(frame.local_variable(0), 0x1111);
        assert!(frame.local_variable(0).is_err());
    }

    #[test]
    fn test_peek_local_variable() {
        let frame = test_frame();
        assert_ok_eq!(frame.peek_local_variable(1), 0x1122);
        assert!(frame.peek_local_variable(5).is_err());
        assert_ok_eq!(frame.peek_local_variable(0), 0x2222);
        // Peeking doesn't pop
        assert_eq!(frame.stack().len(), 2);
        assert_ok_eq!(frame.peek_local_variable(0), 0x2222);
    }

    #[test]
    fn test_set_local_variable() {
        let mut frame = test_frame();
        assert!(frame.set_local_variable(2, 0).is_ok());
        assert_ok_eq!(frame.local_variable(2), 0);
        assert!(frame.set_local_variable(5, 0).is_err());
        assert!(frame.set_local_variable(0, 0x3333).is_ok());
        assert_eq!(frame.stack().len(), 3);
        assert_ok_eq!(frame.local_variable(0), 0x3333);
    }

    #[test]
    fn test_set_local_variable_indirect() {
        let mut frame = test_frame();
        assert!(frame.set_local_variable_indirect(2, 0).is_ok());
        assert_ok_eq!(frame.local_variable(2), 0);
        assert!(frame.set_local_variable_indirect(5, 0).is_err());
        assert!(frame.set_local_variable_indirect(0, 0x3333).is_ok());
        assert_eq!(frame.stack().len(), 2);
        assert_ok_eq!(frame.local_variable(0), 0x3333);
        assert_ok_eq!(frame.local_variable(0), 0x1111);
    }

    #[test]
    fn test_call_routine() {
        let frame = Frame::call_routine(
            0x1234,
            0x1235,
            &[0x1122, 0x3344],
            vec![0x9988, 0x7766, 0x5544, 0x3322],
            StoreWhere::None,
            0x4321,
        );
        assert_eq!(frame.address(), 0x1234);
        assert_eq!(frame.pc(), 0x1235);
        // Arguments overlay the first locals
        assert_eq!(frame.local_variables(), &[0x1122, 0x3344, 0x5544, 0x3322]);
        assert_eq!(frame.argument_count(), 2);
        assert_eq!(frame.store(), StoreWhere::None);
        assert_eq!(frame.return_address(), 0x4321);
        assert!(frame.stack().is_empty());
    }

    #[test]
    fn test_call_routine_extra_arguments_dropped() {
        let frame = Frame::call_routine(
            0x1234,
            0x1235,
            &[0x1122, 0x3344, 0x5566],
            vec![0x9988, 0x7766],
            StoreWhere::Variable(0),
            0x4321,
        );
        assert_eq!(frame.local_variables(), &[0x1122, 0x3344]);
        assert_eq!(frame.argument_count(), 3);
    }
}
