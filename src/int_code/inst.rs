use std::{collections::HashMap, fmt::Debug};

use int_enum::IntEnum;
use once_cell::sync::Lazy;

use crate::Error;

use super::{com::ExecutionState, mem::Memory};

#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, IntEnum, PartialEq, Eq)]
pub enum ParameterMode {
    #[default]
    Position = 0,
    Immediate = 1,
    Relative = 2,
}

pub trait Instruction: Debug {
    fn opcode_ind(&self) -> u32;
    fn length(&self) -> usize;
    fn params(&self) -> &[i64];
    fn params_mut(&mut self) -> &mut [i64];
    fn param_modes(&self) -> &[ParameterMode];
    fn param_modes_mut(&mut self) -> &mut [ParameterMode];
    fn execute(&self, exe_state: &mut dyn ExecutionState) -> Result<(), Error>;

    fn forward_inst_p(&self, exe_state: &mut dyn ExecutionState) {
        *exe_state.inst_p_mut() += self.length();
    }

    fn read_mem(
        exe_state: &mut dyn ExecutionState,
        param: i64,
        param_mode: ParameterMode,
    ) -> Result<i64, Error>
    where
        Self: Sized,
    {
        match param_mode {
            ParameterMode::Position => exe_state.read_mem(param),
            ParameterMode::Relative => {
                let pos = exe_state
                    .rel_base()
                    .checked_add(param)
                    .ok_or(Error::InvalidAddress(param))?;
                exe_state.read_mem(pos)
            }
            ParameterMode::Immediate => Ok(param),
        }
    }

    fn write_mem(
        exe_state: &mut dyn ExecutionState,
        param: i64,
        param_mode: ParameterMode,
        value: i64,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        match param_mode {
            ParameterMode::Position => exe_state.write_mem(param, value),
            ParameterMode::Relative => {
                let pos = exe_state
                    .rel_base()
                    .checked_add(param)
                    .ok_or(Error::InvalidAddress(param))?;
                exe_state.write_mem(pos, value)
            }
            ParameterMode::Immediate => Err(Error::InvalidWriteMemoryMode(param_mode.int_value())),
        }
    }

    fn jump(exe_state: &mut dyn ExecutionState, target: i64) -> Result<(), Error>
    where
        Self: Sized,
    {
        *exe_state.inst_p_mut() =
            usize::try_from(target).map_err(|_| Error::InvalidJumpTarget(target))?;
        Ok(())
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum, Hash)]
pub enum InstOpcodeInd {
    Add = 1,
    Multiply = 2,
    Input = 3,
    Output = 4,
    JumpIfTrue = 5,
    JumpIfFalse = 6,
    LessThan = 7,
    Equals = 8,
    AdjustRelativeBase = 9,
    Halt = 99,
}

type ParseFunc = fn(&Memory, usize, &[ParameterMode; 3]) -> Result<Box<dyn Instruction>, Error>;
static INST_PARSE_MAP: Lazy<HashMap<InstOpcodeInd, ParseFunc>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(InstOpcodeInd::Add, parse_inst::<Add> as ParseFunc);
    map.insert(InstOpcodeInd::Multiply, parse_inst::<Multiply> as ParseFunc);
    map.insert(InstOpcodeInd::Input, parse_inst::<Input> as ParseFunc);
    map.insert(InstOpcodeInd::Output, parse_inst::<Output> as ParseFunc);
    map.insert(
        InstOpcodeInd::JumpIfTrue,
        parse_inst::<JumpIfTrue> as ParseFunc,
    );
    map.insert(
        InstOpcodeInd::JumpIfFalse,
        parse_inst::<JumpIfFalse> as ParseFunc,
    );
    map.insert(InstOpcodeInd::LessThan, parse_inst::<LessThan> as ParseFunc);
    map.insert(InstOpcodeInd::Equals, parse_inst::<Equals> as ParseFunc);
    map.insert(
        InstOpcodeInd::AdjustRelativeBase,
        parse_inst::<AdjustRelativeBase> as ParseFunc,
    );
    map.insert(InstOpcodeInd::Halt, parse_inst::<Halt> as ParseFunc);

    map
});

// Digits above the third parameter mode are ignored.
pub fn decode(word: i64) -> Result<(InstOpcodeInd, [ParameterMode; 3]), Error> {
    if word < 0 {
        return Err(Error::InvalidOpcode(word));
    }

    let opcode_ind = u32::try_from(word % 100).map_err(|_| Error::InvalidOpcode(word))?;
    let opcode = InstOpcodeInd::from_int(opcode_ind)
        .map_err(|_| Error::InvalidOpcodeIndex(opcode_ind))?;

    let mut modes = [ParameterMode::default(); 3];
    let mut cur_ratio = 100;
    for mode in modes.iter_mut() {
        // Always below 10, so the cast is lossless.
        let cur_digit = (word / cur_ratio % 10) as u32;
        *mode = ParameterMode::from_int(cur_digit as u8)
            .map_err(|_| Error::UnknownParameterMode(cur_digit))?;

        cur_ratio *= 10;
    }

    Ok((opcode, modes))
}

pub fn parse_cur_inst(mem: &Memory, inst_p: usize) -> Result<Box<dyn Instruction>, Error> {
    let (opcode, modes) = decode(mem.read_at(inst_p))?;
    let parse_func = INST_PARSE_MAP
        .get(&opcode)
        .ok_or(Error::InvalidOpcodeIndex(opcode.int_value()))?;
    parse_func(mem, inst_p, &modes)
}

fn parse_inst<I>(
    mem: &Memory,
    inst_p: usize,
    modes: &[ParameterMode; 3],
) -> Result<Box<dyn Instruction>, Error>
where
    I: Instruction + Default + 'static,
{
    let mut inst = I::default();
    let param_count = inst.params().len();
    inst.param_modes_mut().copy_from_slice(&modes[..param_count]);
    for i in 0..param_count {
        // Skip operation code
        inst.params_mut()[i] = mem.read_at(inst_p + i + 1);
    }

    Ok(Box::new(inst))
}

macro_rules! def_instruction {
    (name=$name:ident, length=$length:literal, index=$opcode_ind:expr; execute($inst_var:ident, $exe_var:ident) => $exe_block:block) => {
        #[derive(Debug, Default)]
        pub struct $name {
            params: [i64; $length - 1],
            param_modes: [ParameterMode; $length - 1],
        }

        impl Instruction for $name {
            #[inline]
            fn length(&self) -> usize {
                $length
            }

            #[inline]
            fn opcode_ind(&self) -> u32 {
                $opcode_ind
            }

            fn params(&self) -> &[i64] {
                &self.params
            }

            fn params_mut(&mut self) -> &mut [i64] {
                &mut self.params
            }

            fn param_modes(&self) -> &[ParameterMode] {
                &self.param_modes
            }

            fn param_modes_mut(&mut self) -> &mut [ParameterMode] {
                &mut self.param_modes
            }

            fn execute(&self, exe_state: &mut dyn ExecutionState) -> Result<(), Error> {
                let $inst_var = self;
                let $exe_var = exe_state;

                $exe_block
            }
        }
    };
}

def_instruction!(name=Add, length=4, index=InstOpcodeInd::Add.int_value(); execute(inst, exe_state) => {
    let input0 = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    let input1 = Self::read_mem(exe_state, inst.params[1], inst.param_modes[1])?;
    Self::write_mem(
        exe_state,
        inst.params[2],
        inst.param_modes[2],
        input0.wrapping_add(input1),
    )?;
    inst.forward_inst_p(exe_state);

    Ok(())
});

def_instruction!(name=Multiply, length=4, index=InstOpcodeInd::Multiply.int_value(); execute(inst, exe_state) => {
    let input0 = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    let input1 = Self::read_mem(exe_state, inst.params[1], inst.param_modes[1])?;
    Self::write_mem(
        exe_state,
        inst.params[2],
        inst.param_modes[2],
        input0.wrapping_mul(input1),
    )?;
    inst.forward_inst_p(exe_state);

    Ok(())
});

// Halted machine keeps its instruction pointer on the halt instruction.
def_instruction!(name=Halt, length=1, index=InstOpcodeInd::Halt.int_value(); execute(_inst, exe_state) => {
    exe_state.halt();

    Ok(())
});

// Without pending input, fails before touching any state.
def_instruction!(name=Input, length=2, index=InstOpcodeInd::Input.int_value(); execute(inst, exe_state) => {
    let input = exe_state.input().ok_or(Error::NotEnoughInput)?;
    Self::write_mem(exe_state, inst.params[0], inst.param_modes[0], input)?;
    inst.forward_inst_p(exe_state);

    Ok(())
});

def_instruction!(name=Output, length=2, index=InstOpcodeInd::Output.int_value(); execute(inst, exe_state) => {
    let value = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    exe_state.output(value);
    inst.forward_inst_p(exe_state);

    Ok(())
});

def_instruction!(name=JumpIfTrue, length=3, index=InstOpcodeInd::JumpIfTrue.int_value(); execute(inst, exe_state) => {
    let condition = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    if condition != 0 {
        let target = Self::read_mem(exe_state, inst.params[1], inst.param_modes[1])?;
        Self::jump(exe_state, target)?;
    } else {
        inst.forward_inst_p(exe_state);
    }

    Ok(())
});

def_instruction!(name=JumpIfFalse, length=3, index=InstOpcodeInd::JumpIfFalse.int_value(); execute(inst, exe_state) => {
    let condition = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    if condition == 0 {
        let target = Self::read_mem(exe_state, inst.params[1], inst.param_modes[1])?;
        Self::jump(exe_state, target)?;
    } else {
        inst.forward_inst_p(exe_state);
    }

    Ok(())
});

def_instruction!(name=LessThan, length=4, index=InstOpcodeInd::LessThan.int_value(); execute(inst, exe_state) => {
    let input0 = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    let input1 = Self::read_mem(exe_state, inst.params[1], inst.param_modes[1])?;
    Self::write_mem(
        exe_state,
        inst.params[2],
        inst.param_modes[2],
        if input0 < input1 { 1 } else { 0 },
    )?;
    inst.forward_inst_p(exe_state);

    Ok(())
});

def_instruction!(name=Equals, length=4, index=InstOpcodeInd::Equals.int_value(); execute(inst, exe_state) => {
    let input0 = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    let input1 = Self::read_mem(exe_state, inst.params[1], inst.param_modes[1])?;
    Self::write_mem(
        exe_state,
        inst.params[2],
        inst.param_modes[2],
        if input0 == input1 { 1 } else { 0 },
    )?;
    inst.forward_inst_p(exe_state);

    Ok(())
});

def_instruction!(name=AdjustRelativeBase, length=2, index=InstOpcodeInd::AdjustRelativeBase.int_value(); execute(inst, exe_state) => {
    let offset = Self::read_mem(exe_state, inst.params[0], inst.param_modes[0])?;
    let rel_base = exe_state.rel_base_mut();
    *rel_base = rel_base.wrapping_add(offset);
    inst.forward_inst_p(exe_state);

    Ok(())
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_modes_from_digits() {
        use ParameterMode::*;
        assert_eq!(
            decode(1002).unwrap(),
            (InstOpcodeInd::Multiply, [Position, Immediate, Position])
        );
        assert_eq!(
            decode(21107).unwrap(),
            (InstOpcodeInd::LessThan, [Immediate, Immediate, Relative])
        );
        assert_eq!(decode(99).unwrap(), (InstOpcodeInd::Halt, [Position; 3]));
        assert_eq!(decode(204).unwrap(), (InstOpcodeInd::Output, [Relative, Position, Position]));
    }

    #[test]
    fn decode_rejects_malformed_words() {
        assert!(matches!(decode(-1), Err(Error::InvalidOpcode(-1))));
        assert!(matches!(decode(42), Err(Error::InvalidOpcodeIndex(42))));
        assert!(matches!(decode(0), Err(Error::InvalidOpcodeIndex(0))));
        assert!(matches!(decode(301), Err(Error::UnknownParameterMode(3))));
        assert!(matches!(decode(90001), Err(Error::UnknownParameterMode(9))));
    }

    #[test]
    fn parse_reads_params_past_image_end() {
        let mem = Memory::from([1101, 5].as_slice());
        let inst = parse_cur_inst(&mem, 0).unwrap();
        assert_eq!(inst.opcode_ind(), 1);
        assert_eq!(inst.length(), 4);
        assert_eq!(inst.params(), &[5, 0, 0]);
        assert_eq!(
            inst.param_modes(),
            &[
                ParameterMode::Immediate,
                ParameterMode::Immediate,
                ParameterMode::Position
            ]
        );
    }
}
