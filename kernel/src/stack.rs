//! Per-process value stack.
//!
//! A bounded LIFO byte buffer, one instance per process. The typed
//! encode/decode protocol on top of it lives in [`crate::value`].

use core::fmt;

/// Stack capacity in bytes, fixed at process creation.
pub const STACK_SIZE: usize = 32;

/// Stack operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Push would exceed capacity; the push is discarded.
    Overflow,
    /// Pop on an empty stack.
    Underflow,
    /// Popped tag byte does not match the requested kind.
    ///
    /// The payload below the tag is left on the stack.
    TypeMismatch { found: u8 },
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Overflow => write!(f, "stack overflow"),
            StackError::Underflow => write!(f, "stack underflow"),
            StackError::TypeMismatch { found } => {
                write!(f, "type mismatch (found tag {})", found)
            }
        }
    }
}

/// Bounded LIFO byte storage addressed by a stack pointer (0 = empty).
#[derive(Debug, Clone)]
pub struct Stack {
    buf: [u8; STACK_SIZE],
    sp: usize,
}

impl Stack {
    /// Create an empty stack.
    pub const fn new() -> Self {
        Stack {
            buf: [0; STACK_SIZE],
            sp: 0,
        }
    }

    /// Push one byte.
    pub fn push_byte(&mut self, byte: u8) -> Result<(), StackError> {
        if self.sp == STACK_SIZE {
            return Err(StackError::Overflow);
        }
        self.buf[self.sp] = byte;
        self.sp += 1;
        Ok(())
    }

    /// Remove and return the most recently pushed byte.
    pub fn pop_byte(&mut self) -> Result<u8, StackError> {
        if self.sp == 0 {
            return Err(StackError::Underflow);
        }
        self.sp -= 1;
        Ok(self.buf[self.sp])
    }

    /// Current stack pointer.
    pub fn len(&self) -> usize {
        self.sp
    }

    /// Check for an empty stack.
    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Fail with `Overflow` unless `n` more bytes fit.
    ///
    /// Multi-byte pushes check up front so a failed push commits nothing.
    pub(crate) fn require(&self, n: usize) -> Result<(), StackError> {
        if self.sp + n > STACK_SIZE {
            Err(StackError::Overflow)
        } else {
            Ok(())
        }
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = Stack::new();
        stack.push_byte(1).unwrap();
        stack.push_byte(2).unwrap();
        assert_eq!(stack.pop_byte(), Ok(2));
        assert_eq!(stack.pop_byte(), Ok(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn underflow_on_empty() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop_byte(), Err(StackError::Underflow));
    }

    #[test]
    fn overflow_discards_push() {
        let mut stack = Stack::new();
        for i in 0..STACK_SIZE {
            stack.push_byte(i as u8).unwrap();
        }
        assert_eq!(stack.push_byte(0xAA), Err(StackError::Overflow));
        assert_eq!(stack.len(), STACK_SIZE);
        assert_eq!(stack.pop_byte(), Ok((STACK_SIZE - 1) as u8));
    }
}
