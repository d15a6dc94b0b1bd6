//! Typed value codec over the process stack.
//!
//! Values are encoded self-describing: the payload goes first and a tag
//! byte goes last (strings additionally carry a NUL terminator and a
//! length byte below the tag). Push therefore always ends with the tag,
//! and pop always starts by removing it — the load-bearing invariant of
//! the whole codec. Violating it silently corrupts every later pop.
//!
//! Encodings (bottom to top of stack):
//!
//! ```text
//! char:    payload            CHAR
//! int:     hi lo              INT         (16-bit two's complement, BE)
//! float:   b0 b1 b2 b3        FLOAT       (IEEE-754 single, BE)
//! string:  bytes... NUL len   STRING      (len = byte count + NUL)
//! ```

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::stack::{Stack, StackError};

/// Stack tag bytes, shared with the bytecode literal opcodes.
pub mod tag {
    /// One raw byte.
    pub const CHAR: u8 = 1;
    /// 16-bit signed integer.
    pub const INT: u8 = 2;
    /// NUL-terminated byte string.
    pub const STRING: u8 = 3;
    /// IEEE-754 single-precision float.
    pub const FLOAT: u8 = 4;
}

/// A decoded stack operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Char(u8),
    Int(i16),
    Float(f32),
    Str(String),
}

impl Value {
    /// The tag byte this value encodes with.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Char(_) => tag::CHAR,
            Value::Int(_) => tag::INT,
            Value::Float(_) => tag::FLOAT,
            Value::Str(_) => tag::STRING,
        }
    }

    /// True for every value the interpreter's conditionals treat as true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Char(c) => *c != 0,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Char(c) => write!(f, "{}", *c as char),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Stack {
    /// Push a char: payload byte, then the CHAR tag.
    pub fn push_char(&mut self, c: u8) -> Result<(), StackError> {
        self.require(2)?;
        self.push_byte(c)?;
        self.push_byte(tag::CHAR)
    }

    /// Push an int: two big-endian payload bytes, then the INT tag.
    pub fn push_int(&mut self, i: i16) -> Result<(), StackError> {
        self.require(3)?;
        let [hi, lo] = i.to_be_bytes();
        self.push_byte(hi)?;
        self.push_byte(lo)?;
        self.push_byte(tag::INT)
    }

    /// Push a float: four big-endian payload bytes, then the FLOAT tag.
    pub fn push_float(&mut self, f: f32) -> Result<(), StackError> {
        self.require(5)?;
        for b in f.to_be_bytes() {
            self.push_byte(b)?;
        }
        self.push_byte(tag::FLOAT)
    }

    /// Push a string: bytes, NUL, length byte (covers the NUL), STRING tag.
    pub fn push_str(&mut self, s: &str) -> Result<(), StackError> {
        self.require(s.len() + 3)?;
        for &b in s.as_bytes() {
            self.push_byte(b)?;
        }
        self.push_byte(0)?;
        self.push_byte(s.len() as u8 + 1)?;
        self.push_byte(tag::STRING)
    }

    /// Pop a value of the expected kind, tag first.
    ///
    /// On a tag mismatch the payload stays behind on the stack; callers
    /// are expected to check the tag beforehand or use [`Stack::pop_value`].
    pub fn pop_char(&mut self) -> Result<u8, StackError> {
        self.expect_tag(tag::CHAR)?;
        self.pop_byte()
    }

    /// Pop an int (see [`Stack::pop_char`] for mismatch behavior).
    pub fn pop_int(&mut self) -> Result<i16, StackError> {
        self.expect_tag(tag::INT)?;
        self.decode_int()
    }

    /// Pop a float (see [`Stack::pop_char`] for mismatch behavior).
    pub fn pop_float(&mut self) -> Result<f32, StackError> {
        self.expect_tag(tag::FLOAT)?;
        self.decode_float()
    }

    /// Pop a string (see [`Stack::pop_char`] for mismatch behavior).
    pub fn pop_str(&mut self) -> Result<String, StackError> {
        self.expect_tag(tag::STRING)?;
        self.decode_str()
    }

    /// Pop the tag byte and dispatch to the matching decoder.
    ///
    /// This is the interpreter's generic pop: bytecode does not announce
    /// operand types ahead of time.
    pub fn pop_value(&mut self) -> Result<Value, StackError> {
        match self.pop_byte()? {
            tag::CHAR => Ok(Value::Char(self.pop_byte()?)),
            tag::INT => Ok(Value::Int(self.decode_int()?)),
            tag::FLOAT => Ok(Value::Float(self.decode_float()?)),
            tag::STRING => Ok(Value::Str(self.decode_str()?)),
            found => Err(StackError::TypeMismatch { found }),
        }
    }

    /// Push a value back with its original tag.
    pub fn push_value(&mut self, value: &Value) -> Result<(), StackError> {
        match value {
            Value::Char(c) => self.push_char(*c),
            Value::Int(i) => self.push_int(*i),
            Value::Float(f) => self.push_float(*f),
            Value::Str(s) => self.push_str(s),
        }
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), StackError> {
        let found = self.pop_byte()?;
        if found == expected {
            Ok(())
        } else {
            Err(StackError::TypeMismatch { found })
        }
    }

    /// Decode an int payload; the tag has already been popped.
    fn decode_int(&mut self) -> Result<i16, StackError> {
        let lo = self.pop_byte()?;
        let hi = self.pop_byte()?;
        Ok(i16::from_be_bytes([hi, lo]))
    }

    /// Decode a float payload; the tag has already been popped.
    fn decode_float(&mut self) -> Result<f32, StackError> {
        let mut bytes = [0u8; 4];
        for b in bytes.iter_mut().rev() {
            *b = self.pop_byte()?;
        }
        Ok(f32::from_be_bytes(bytes))
    }

    /// Decode a string payload; the tag has already been popped. The next
    /// byte down is the length (terminator included).
    fn decode_str(&mut self) -> Result<String, StackError> {
        let len = self.pop_byte()? as usize;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.pop_byte()?);
        }
        // Popped top-down: terminator first, then the characters reversed.
        bytes.reverse();
        bytes.pop();
        Ok(match String::from_utf8_lossy(&bytes) {
            Cow::Borrowed(s) => String::from(s),
            Cow::Owned(s) => s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_round_trip() {
        let mut stack = Stack::new();
        stack.push_char(b'a').unwrap();
        assert_eq!(stack.pop_char(), Ok(b'a'));
        assert!(stack.is_empty());
    }

    #[test]
    fn int_round_trip() {
        let mut stack = Stack::new();
        for i in [0i16, 1, -1, 300, i16::MIN, i16::MAX] {
            stack.push_int(i).unwrap();
            assert_eq!(stack.pop_int(), Ok(i));
            assert!(stack.is_empty());
        }
    }

    #[test]
    fn float_round_trip() {
        let mut stack = Stack::new();
        for f in [0.0f32, 1.5, -3.25, 1e-6] {
            stack.push_float(f).unwrap();
            assert_eq!(stack.pop_float(), Ok(f));
            assert!(stack.is_empty());
        }
    }

    #[test]
    fn string_round_trip() {
        let mut stack = Stack::new();
        stack.push_str("hello").unwrap();
        assert_eq!(stack.len(), 8); // 5 bytes + NUL + length + tag
        assert_eq!(stack.pop_str().unwrap(), "hello");
        assert!(stack.is_empty());
    }

    #[test]
    fn empty_string_round_trip() {
        let mut stack = Stack::new();
        stack.push_str("").unwrap();
        assert_eq!(stack.pop_str().unwrap(), "");
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_value_recovers_kind_from_tag() {
        let mut stack = Stack::new();
        stack.push_int(300).unwrap();
        stack.push_char(b'x').unwrap();
        assert_eq!(stack.pop_value(), Ok(Value::Char(b'x')));
        assert_eq!(stack.pop_value(), Ok(Value::Int(300)));
    }

    #[test]
    fn mismatched_pop_leaves_payload_behind() {
        let mut stack = Stack::new();
        stack.push_char(b'a').unwrap();
        // The tag is consumed, the char payload stays: the documented
        // quirk of tag-first decoding.
        assert_eq!(
            stack.pop_int(),
            Err(StackError::TypeMismatch { found: tag::CHAR })
        );
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.pop_byte(), Ok(b'a'));
    }

    #[test]
    fn oversized_push_commits_nothing() {
        let mut stack = Stack::new();
        stack.push_str("0123456789abcdef0123456789").unwrap();
        let before = stack.len();
        assert_eq!(stack.push_float(1.0), Err(StackError::Overflow));
        assert_eq!(stack.len(), before);
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Char(0).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
    }
}
