use std::fmt::Display;

use log::{debug, trace};

use crate::Error;

use super::{
    inst::parse_cur_inst,
    io::{Channel, InputPort, OutputPort},
    mem::Memory,
    parse_int_code,
};

pub trait ExecutionState {
    fn read_mem(&self, addr: i64) -> Result<i64, Error>;
    fn write_mem(&mut self, addr: i64, value: i64) -> Result<(), Error>;
    fn input(&mut self) -> Option<i64>;
    fn output(&mut self, value: i64);
    fn inst_p_mut(&mut self) -> &mut usize;
    fn rel_base(&self) -> i64;
    fn rel_base_mut(&mut self) -> &mut i64;
    fn halt(&mut self);
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum WalkState {
    #[default]
    Ready,
    NeedInput,
    HasOutput,
    Halt,
}

// Providing input or reading output in the wrong state panics.
#[derive(Debug, Default, Clone)]
pub struct WalkToken {
    state: WalkState,
    input: Option<i64>,
    output: Option<i64>,
}

impl WalkToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn is_input(&self) -> bool {
        self.state == WalkState::NeedInput
    }

    pub fn is_output(&self) -> bool {
        self.state == WalkState::HasOutput
    }

    pub fn is_halted(&self) -> bool {
        self.state == WalkState::Halt
    }

    pub fn provide_input(&mut self, value: i64) {
        assert!(
            self.is_input(),
            "Try to provide input({}) to token in state {:?}",
            value,
            self.state
        );
        assert!(
            self.input.is_none(),
            "Try to provide input({}) while input({:?}) is still pending",
            value,
            self.input
        );
        self.input = Some(value);
    }

    pub fn read_output(&mut self) -> i64 {
        match (self.state, self.output.take()) {
            (WalkState::HasOutput, Some(value)) => {
                self.state = WalkState::Ready;
                value
            }
            (state, _) => panic!("Try to read output from token in state {:?}", state),
        }
    }
}

impl Display for WalkToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            WalkState::Ready => write!(f, "<ready>"),
            WalkState::NeedInput => match self.input {
                Some(v) => write!(f, "<in:{}>", v),
                None => write!(f, "<in:?>"),
            },
            WalkState::HasOutput => write!(f, "<out:{}>", self.output.unwrap_or_default()),
            WalkState::Halt => write!(f, "<halt>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    mem: Memory,
    inst_p: usize,
    rel_base: i64,
    halted: bool,
    step_count: usize,
    step_limit: Option<usize>,
}

impl Machine {
    pub fn load(image: &[i64]) -> Self {
        Self {
            mem: Memory::from(image),
            inst_p: 0,
            rel_base: 0,
            halted: false,
            step_count: 0,
            step_limit: None,
        }
    }

    pub fn from_text(text: &str) -> Result<Self, Error> {
        parse_int_code(text).map(|image| Self::load(&image))
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    // Memory is kept as is.
    pub fn reset(&mut self) {
        self.inst_p = 0;
        self.rel_base = 0;
        self.halted = false;
        self.step_count = 0;
    }

    pub fn mem(&self, addr: i64) -> Result<i64, Error> {
        self.mem.read(addr)
    }

    pub fn set_mem(&mut self, addr: i64, value: i64) -> Result<(), Error> {
        self.mem.write(addr, value)
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn dump(&self) -> Vec<i64> {
        Vec::from(self.mem.as_slice())
    }

    pub fn inst_p(&self) -> usize {
        self.inst_p
    }

    pub fn rel_base(&self) -> i64 {
        self.rel_base
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    // Unread output in token is dropped.
    pub fn resume(&mut self, token: &mut WalkToken) -> Result<WalkState, Error> {
        match token.state {
            WalkState::Halt => return Ok(WalkState::Halt),
            WalkState::NeedInput if token.input.is_none() => return Ok(WalkState::NeedInput),
            WalkState::HasOutput => {
                if let Some(value) = token.output.take() {
                    debug!("Drop unread output({}) @ {}", value, self.inst_p);
                }
                token.state = WalkState::Ready;
            }
            _ => (),
        }

        if self.halted {
            token.state = WalkState::Halt;
            return Ok(WalkState::Halt);
        }

        let mut run_mach = RunningMachine {
            machine: self,
            token,
        };
        loop {
            if let Some(limit) = run_mach.machine.step_limit {
                if run_mach.machine.step_count >= limit {
                    return Err(Error::StepLimitExceeded(limit));
                }
            }

            let inst_p = run_mach.machine.inst_p;
            let inst = parse_cur_inst(&run_mach.machine.mem, inst_p)?;
            trace!(
                "Step # {}: {:?} @ {}, relative base {}.",
                run_mach.machine.step_count,
                inst,
                inst_p,
                run_mach.machine.rel_base
            );

            match inst.execute(&mut run_mach) {
                Ok(_) => {
                    run_mach.machine.step_count += 1;
                    if run_mach.machine.halted {
                        debug!(
                            "Machine halt @ {} after {} steps.",
                            inst_p, run_mach.machine.step_count
                        );
                        run_mach.token.state = WalkState::Halt;
                        return Ok(WalkState::Halt);
                    }

                    if run_mach.token.output.is_some() {
                        run_mach.token.state = WalkState::HasOutput;
                        return Ok(WalkState::HasOutput);
                    }
                }
                Err(Error::NotEnoughInput) => {
                    // The input instruction stays at the instruction pointer, to be retried.
                    debug!("Machine blocked by requiring input @ {}.", inst_p);
                    run_mach.token.state = WalkState::NeedInput;
                    return Ok(WalkState::NeedInput);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn run_with_io<I, O>(
        &mut self,
        token: &mut WalkToken,
        input: &mut I,
        output: &mut O,
    ) -> Result<WalkState, Error>
    where
        I: InputPort + ?Sized,
        O: OutputPort + ?Sized,
    {
        loop {
            match self.resume(token)? {
                WalkState::NeedInput => match input.get() {
                    Some(value) => token.provide_input(value),
                    None => return Ok(WalkState::NeedInput),
                },
                WalkState::HasOutput => output.put(token.read_output())?,
                WalkState::Halt => return Ok(WalkState::Halt),
                WalkState::Ready => unreachable!("resume never stops in ready state"),
            }
        }
    }

    pub fn run(&mut self, inputs: &[i64]) -> Result<Vec<i64>, Error> {
        let mut input_chan = Channel::new(inputs);
        let mut outputs = Vec::new();
        let mut token = WalkToken::new();
        match self.run_with_io(&mut token, &mut input_chan, &mut outputs)? {
            WalkState::Halt => Ok(outputs),
            _ => Err(Error::NotEnoughInput),
        }
    }
}

pub fn run(image: &[i64], inputs: &[i64]) -> Result<Vec<i64>, Error> {
    Machine::load(image).run(inputs)
}

struct RunningMachine<'a> {
    machine: &'a mut Machine,
    token: &'a mut WalkToken,
}

impl<'a> ExecutionState for RunningMachine<'a> {
    fn read_mem(&self, addr: i64) -> Result<i64, Error> {
        self.machine.mem.read(addr)
    }

    fn write_mem(&mut self, addr: i64, value: i64) -> Result<(), Error> {
        self.machine.mem.write(addr, value)
    }

    fn input(&mut self) -> Option<i64> {
        self.token.input.take()
    }

    fn output(&mut self, value: i64) {
        self.token.output = Some(value);
    }

    fn inst_p_mut(&mut self) -> &mut usize {
        &mut self.machine.inst_p
    }

    fn rel_base(&self) -> i64 {
        self.machine.rel_base
    }

    fn rel_base_mut(&mut self) -> &mut i64 {
        &mut self.machine.rel_base
    }

    fn halt(&mut self) {
        self.machine.halted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EQ_8: [i64; 11] = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];

    #[test]
    fn self_add_after_one_step() {
        let mut machine = Machine::load(&[1, 0, 0, 0, 99]);
        let mut token = WalkToken::new();
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::Halt);
        assert_eq!(machine.dump(), vec![2, 0, 0, 0, 99]);
        assert_eq!(machine.step_count(), 2);
        assert_eq!(machine.inst_p(), 4);
    }

    #[test]
    fn input_request_does_not_advance() {
        let mut machine = Machine::load(&EQ_8);
        let mut token = WalkToken::new();
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::NeedInput);
        assert!(token.is_input());
        assert_eq!(machine.inst_p(), 0);
        assert_eq!(machine.step_count(), 0);

        // Resuming without input is a no-op.
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::NeedInput);
        assert_eq!(machine.inst_p(), 0);

        token.provide_input(8);
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::HasOutput);
        assert_eq!(machine.mem(9).unwrap(), 1);
        assert_eq!(token.read_output(), 1);
        assert_eq!(token.state(), WalkState::Ready);
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::Halt);
        assert!(token.is_halted());
    }

    #[test]
    fn halted_token_stays_halted() {
        let mut machine = Machine::load(&[104, 7, 99]);
        let mut token = WalkToken::new();
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::HasOutput);
        assert_eq!(token.read_output(), 7);
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::Halt);
        let snapshot = machine.clone();
        for _ in 0..3 {
            assert_eq!(machine.resume(&mut token).unwrap(), WalkState::Halt);
        }
        assert_eq!(machine, snapshot);

        // A new token on a halted machine reports halt at once.
        assert_eq!(machine.resume(&mut WalkToken::new()).unwrap(), WalkState::Halt);
    }

    #[test]
    fn unread_output_is_dropped_on_resume() {
        let mut machine = Machine::load(&[104, 1, 104, 2, 99]);
        let mut token = WalkToken::new();
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::HasOutput);
        assert_eq!(machine.resume(&mut token).unwrap(), WalkState::HasOutput);
        assert_eq!(token.read_output(), 2);
    }

    #[test]
    fn step_wise_matches_batch_run() {
        let program = [
            3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31, 1106, 0, 36, 98, 0,
            0, 1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104, 999, 1105, 1, 46, 1101, 1000, 1, 20, 4,
            20, 1105, 1, 46, 98, 99,
        ];
        for input in [5, 8, 13] {
            let mut machine = Machine::load(&program);
            let mut token = WalkToken::new();
            let mut inputs = vec![input];
            let mut outputs = Vec::new();
            loop {
                match machine.resume(&mut token).unwrap() {
                    WalkState::NeedInput => token.provide_input(inputs.remove(0)),
                    WalkState::HasOutput => outputs.push(token.read_output()),
                    WalkState::Halt => break,
                    WalkState::Ready => unreachable!(),
                }
            }
            assert_eq!(outputs, run(&program, &[input]).unwrap());
            let mut batch = Machine::load(&program);
            batch.run(&[input]).unwrap();
            assert_eq!(machine.dump(), batch.dump());
        }
    }

    #[test]
    fn batch_run_needs_enough_input() {
        assert!(matches!(
            run(&[3, 0, 3, 1, 99], &[1]),
            Err(Error::NotEnoughInput)
        ));
    }

    #[test]
    fn step_limit_stops_endless_loop() {
        let mut machine = Machine::load(&[1105, 1, 0]).with_step_limit(1000);
        let res = machine.resume(&mut WalkToken::new());
        assert!(matches!(res, Err(Error::StepLimitExceeded(1000))));
        assert_eq!(machine.step_count(), 1000);
    }

    #[test]
    fn malformed_programs_are_errors() {
        assert!(matches!(run(&[42], &[]), Err(Error::InvalidOpcodeIndex(42))));
        assert!(matches!(
            run(&[11101, 1, 1, 0, 99], &[]),
            Err(Error::InvalidWriteMemoryMode(1))
        ));
        assert!(matches!(run(&[1, -1, 0, 0, 99], &[]), Err(Error::InvalidAddress(-1))));
        assert!(matches!(run(&[1105, 1, -3], &[]), Err(Error::InvalidJumpTarget(-3))));
        assert!(matches!(run(&[109, -5, 204, 0, 99], &[]), Err(Error::InvalidAddress(-5))));
    }

    #[test]
    fn reset_keeps_memory() {
        let mut machine = Machine::load(&[1001, 0, 1, 0, 99]);
        machine.run(&[]).unwrap();
        assert_eq!(machine.mem(0).unwrap(), 1002);
        machine.reset();
        assert!(!machine.is_halted());
        assert_eq!(machine.inst_p(), 0);
        // 1002 now multiplies instead of adding.
        machine.run(&[]).unwrap();
        assert_eq!(machine.mem(0).unwrap(), 1002);
    }

    #[test]
    #[should_panic]
    fn provide_input_without_request_panics() {
        let mut token = WalkToken::new();
        token.provide_input(1);
    }

    #[test]
    #[should_panic]
    fn read_output_without_output_panics() {
        let mut machine = Machine::load(&EQ_8);
        let mut token = WalkToken::new();
        machine.resume(&mut token).unwrap();
        token.read_output();
    }

    #[test]
    #[should_panic]
    fn provide_input_twice_panics() {
        let mut machine = Machine::load(&EQ_8);
        let mut token = WalkToken::new();
        machine.resume(&mut token).unwrap();
        token.provide_input(1);
        token.provide_input(2);
    }
}
