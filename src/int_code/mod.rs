pub mod com;
mod inst;
pub mod io;
mod mem;

use std::{fs, path::Path};

use crate::Error;

pub use com::{run, Machine, WalkState, WalkToken};
pub use inst::{decode, InstOpcodeInd, ParameterMode};
pub use mem::{Memory, MEM_LIMIT};

pub fn read_int_code<P>(path: P) -> Result<Vec<i64>, Error>
where
    P: AsRef<Path>,
{
    let text = fs::read_to_string(path).map_err(Error::IOError)?;
    parse_int_code(&text)
}

pub fn parse_int_code(text: &str) -> Result<Vec<i64>, Error> {
    let code = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .flat_map(|l| l.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| str::parse::<i64>(s).map_err(|_| Error::ParseIntError(s.to_string())))
        .collect::<Result<Vec<_>, Error>>()?;

    if code.is_empty() {
        Err(Error::EmptyError)
    } else {
        Ok(code)
    }
}
