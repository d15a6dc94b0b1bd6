//! Bytecode wire format.
//!
//! A program is a flat byte stream. Literal opcodes double as the stack
//! tag bytes and are immediately followed by their payload (INT: 2 bytes
//! big-endian, FLOAT: 4 bytes big-endian, STRING: raw bytes plus a
//! terminating zero). Control opcodes carry one or two raw jump-distance
//! bytes. Every other token the host-side converter sees is resolved
//! against the instruction-name table below, or stored as a single raw
//! variable-name byte if unrecognized.

/// Opcode bytes.
pub mod op {
    /// Terminate the process, releasing its variables.
    pub const STOP: u8 = 0;
    /// Literal char; 1 payload byte follows.
    pub const CHAR: u8 = 1;
    /// Literal int; 2 payload bytes follow.
    pub const INT: u8 = 2;
    /// Literal string; bytes up to and including a NUL follow.
    pub const STRING: u8 = 3;
    /// Literal float; 4 payload bytes follow.
    pub const FLOAT: u8 = 4;
    /// Pop a value into the variable table; 1 name byte follows.
    pub const SET: u8 = 5;
    /// Push a copy of a variable; 1 name byte follows.
    pub const GET: u8 = 6;
    pub const INCREMENT: u8 = 7;
    pub const DECREMENT: u8 = 8;
    pub const PLUS: u8 = 9;
    pub const MINUS: u8 = 10;
    pub const TIMES: u8 = 11;
    pub const DIVIDEDBY: u8 = 12;
    pub const EQUALS: u8 = 15;
    pub const NOTEQUALS: u8 = 16;
    pub const LESSTHAN: u8 = 17;
    pub const GREATERTHAN: u8 = 19;
    /// Spawn a stored program; pops the name, pushes the child pid.
    pub const FORK: u8 = 60;
    /// Pop a pid; retry until that process is gone.
    pub const WAITUNTILDONE: u8 = 61;
    pub const PRINT: u8 = 51;
    pub const PRINTLN: u8 = 52;
    /// Conditional; 1 skip-distance byte follows.
    pub const IF: u8 = 128;
    /// Alternative branch; 1 skip-distance byte follows.
    pub const ELSE: u8 = 129;
    pub const ENDIF: u8 = 130;
    /// Loop head; condition-length and body-length bytes follow.
    pub const WHILE: u8 = 131;
    pub const ENDWHILE: u8 = 132;
    /// Unconditional loop head.
    pub const LOOP: u8 = 133;
    pub const ENDLOOP: u8 = 134;
}

/// The fixed instruction-name table shared with the host-side converter.
pub const INSTRUCTION_SET: &[(&str, u8)] = &[
    ("STOP", op::STOP),
    ("CHAR", op::CHAR),
    ("INT", op::INT),
    ("STRING", op::STRING),
    ("FLOAT", op::FLOAT),
    ("SET", op::SET),
    ("GET", op::GET),
    ("INCREMENT", op::INCREMENT),
    ("DECREMENT", op::DECREMENT),
    ("PLUS", op::PLUS),
    ("MINUS", op::MINUS),
    ("TIMES", op::TIMES),
    ("DIVIDEDBY", op::DIVIDEDBY),
    ("EQUALS", op::EQUALS),
    ("NOTEQUALS", op::NOTEQUALS),
    ("LESSTHAN", op::LESSTHAN),
    ("GREATERTHAN", op::GREATERTHAN),
    ("PRINT", op::PRINT),
    ("PRINTLN", op::PRINTLN),
    ("FORK", op::FORK),
    ("WAITUNTILDONE", op::WAITUNTILDONE),
    ("IF", op::IF),
    ("ELSE", op::ELSE),
    ("ENDIF", op::ENDIF),
    ("WHILE", op::WHILE),
    ("ENDWHILE", op::ENDWHILE),
    ("LOOP", op::LOOP),
    ("ENDLOOP", op::ENDLOOP),
];

/// Instruction name for an opcode, for diagnostics.
pub fn name(opcode: u8) -> Option<&'static str> {
    INSTRUCTION_SET
        .iter()
        .find(|&&(_, code)| code == opcode)
        .map(|&(name, _)| name)
}

/// Opcode for an instruction name (case-sensitive), for converters.
pub fn from_name(name: &str) -> Option<u8> {
    INSTRUCTION_SET
        .iter()
        .find(|&&(n, _)| n == name)
        .map(|&(_, code)| code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_opcodes_match_stack_tags() {
        use crate::value::tag;
        assert_eq!(op::CHAR, tag::CHAR);
        assert_eq!(op::INT, tag::INT);
        assert_eq!(op::STRING, tag::STRING);
        assert_eq!(op::FLOAT, tag::FLOAT);
    }

    #[test]
    fn name_table_is_bijective() {
        for &(name_str, code) in INSTRUCTION_SET {
            assert_eq!(from_name(name_str), Some(code));
            assert_eq!(name(code), Some(name_str));
        }
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        assert_eq!(from_name("NOSUCHOP"), None);
        assert_eq!(name(200), None);
    }
}
