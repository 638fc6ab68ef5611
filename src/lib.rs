use std::{error, fmt::Display, path::PathBuf};

use clap::Parser;

pub mod amp;
pub mod int_code;
pub mod nic;

#[derive(Debug)]
pub enum Error {
    IOError(std::io::Error),
    EmptyError,
    ParseIntError(String),
    InvalidAddress(i64),
    MemoryLimitExceeded(usize),
    InvalidWriteMemoryMode(u8),
    InvalidOpcode(i64),
    InvalidOpcodeIndex(u32),
    UnknownParameterMode(u32),
    InvalidJumpTarget(i64),
    NotEnoughInput,
    StepLimitExceeded(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IOError(ioe) => write!(f, "I/O Error: {}", ioe),
            Error::EmptyError => write!(f, "Get empty code in given text"),
            Error::ParseIntError(s) => write!(f, "Failed to parse integer from string({})", s),
            Error::InvalidAddress(a) => write!(f, "Invalid memory address({}) found in execution", a),
            Error::MemoryLimitExceeded(a) => write!(
                f,
                "Memory address({}) exceeds the limit of memory size in execution",
                a
            ),
            Error::InvalidWriteMemoryMode(m) => write!(
                f,
                "Invalid parameter mode({}) found when write into memory",
                m
            ),
            Error::InvalidOpcode(c) => write!(f, "Invalid operation code({}) found", c),
            Error::InvalidOpcodeIndex(c) => {
                write!(f, "Invalid operation code({}) found in execution", c)
            }
            Error::UnknownParameterMode(m) => write!(f, "Unknown parameter mode({}) found", m),
            Error::InvalidJumpTarget(t) => write!(f, "Invalid jump target({})", t),
            Error::NotEnoughInput => write!(f, "Not enough input in execution, inputs exhausted"),
            Error::StepLimitExceeded(n) => {
                write!(f, "Execution doesn't stop within the step limit({})", n)
            }
        }
    }
}

impl error::Error for Error {}

#[derive(Debug, Parser)]
pub struct CLIArgs {
    pub input_path: PathBuf,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    pub input_path: PathBuf,
    /// Values fed to the program's input instructions, in order
    #[arg(short, long = "input", allow_negative_numbers = true)]
    pub inputs: Vec<i64>,
}
