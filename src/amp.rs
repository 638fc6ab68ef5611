use std::{fmt::Display, mem};

use log::{debug, info};
use rayon::prelude::*;

use crate::int_code::{io::Channel, Machine, WalkState, WalkToken};

pub struct AmpSettings {
    settings: Vec<Vec<i64>>,
}

impl From<&[i64]> for AmpSettings {
    fn from(init_setting: &[i64]) -> Self {
        AmpSettings {
            settings: Self::gen_permutation(init_setting),
        }
    }
}

impl AmpSettings {
    pub fn new(amp_count: usize) -> AmpSettings {
        let init_setting = (0..amp_count as i64).collect::<Vec<_>>();
        Self::from(init_setting.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[i64]> {
        self.settings.iter().map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    fn gen_permutation(init_numbers: &[i64]) -> Vec<Vec<i64>> {
        let mut permutations = Vec::new();
        let mut numbers = Vec::from(init_numbers);
        let number_count = numbers.len();
        Self::gen_permutation_recur(&mut permutations, &mut numbers, number_count);
        permutations
    }

    // Heap's algorithm to generate permutation of slice.
    fn gen_permutation_recur(
        permutations: &mut Vec<Vec<i64>>,
        numbers: &mut [i64],
        cur_size: usize,
    ) {
        if cur_size <= 1 {
            permutations.push(Vec::from(numbers));
            return;
        }

        for i in 0..cur_size {
            Self::gen_permutation_recur(permutations, numbers, cur_size - 1);

            if cur_size % 2 == 1 {
                numbers.swap(0, cur_size - 1);
            } else {
                numbers.swap(i, cur_size - 1);
            }
        }
    }
}

#[derive(Debug)]
pub enum Error {
    ProcessBlockInChain(usize),
    EmptyAmplifierResult(Vec<i64>),
    ExecutionError(crate::Error, Vec<i64>),
    AmplifierInLoopStuck,
    EmptyOutputFromAmplifierLoop,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ProcessBlockInChain(ind) => {
                write!(f, "Process(Amplifier #{}) blocked in amplifier chain", ind)
            }
            Error::EmptyAmplifierResult(s) => {
                write!(f, "Amplifiers have empty result with settings({:?})", s)
            }
            Error::ExecutionError(e, s) => write!(
                f,
                "Error({}) in execution of amplifiers with settings({:?})",
                e, s
            ),
            Error::AmplifierInLoopStuck => {
                write!(f, "There has some processes blocked in amplifier loop")
            }
            Error::EmptyOutputFromAmplifierLoop => write!(
                f,
                "Got empty output from amplifier loop after all are halted"
            ),
        }
    }
}

impl std::error::Error for Error {}

pub fn amp_chain(int_code: &[i64], settings: &[i64]) -> Result<i64, Error> {
    let mut amp_res = 0;
    for (i, &phase) in settings.iter().enumerate() {
        let mut machine = Machine::load(int_code);
        let mut input_chan = Channel::new(&[phase, amp_res]);
        let mut output_chan = Channel::new(&[]);
        let state = machine
            .run_with_io(&mut WalkToken::new(), &mut input_chan, &mut output_chan)
            .map_err(|e| Error::ExecutionError(e, Vec::from(settings)))?;

        if state != WalkState::Halt {
            return Err(Error::ProcessBlockInChain(i));
        }

        amp_res = output_chan
            .data()
            .front()
            .copied()
            .ok_or(Error::EmptyAmplifierResult(Vec::from(settings)))?;
    }

    debug!("Amplifier chain({:?}) outputs {}.", settings, amp_res);
    Ok(amp_res)
}

// The last amplifier feeds the first one, until all of them halt.
pub fn amp_loop(int_code: &[i64], settings: &[i64]) -> Result<i64, Error> {
    let amp_count = settings.len();
    let mut amp_channels = (0..amp_count)
        .map(|i| {
            if i == 0 {
                Channel::new(&[settings[0], 0])
            } else {
                Channel::new(&settings[i..(i + 1)])
            }
        })
        .collect::<Vec<_>>();
    let mut amps = vec![Machine::load(int_code); amp_count];
    let mut tokens = vec![WalkToken::new(); amp_count];
    let mut states = vec![WalkState::Ready; amp_count];
    let mut last_to_first = None;

    while states.iter().any(|&s| s != WalkState::Halt) {
        let mut progressed = false;
        for i in 0..amp_count {
            if states[i] == WalkState::Halt {
                continue;
            }

            let mut input_chan = mem::take(&mut amp_channels[i]);
            let input_len = input_chan.data().len();
            let mut outputs = Vec::new();
            states[i] = amps[i]
                .run_with_io(&mut tokens[i], &mut input_chan, &mut outputs)
                .map_err(|e| Error::ExecutionError(e, Vec::from(settings)))?;
            progressed |= states[i] == WalkState::Halt
                || input_chan.data().len() != input_len
                || !outputs.is_empty();
            amp_channels[i] = input_chan;
            if i + 1 == amp_count {
                last_to_first = outputs.last().copied().or(last_to_first);
            }

            let next_chan = &mut amp_channels[(i + 1) % amp_count];
            for value in outputs {
                next_chan.push(value);
            }
        }

        if !progressed {
            return Err(Error::AmplifierInLoopStuck);
        }
    }

    let res = last_to_first.ok_or(Error::EmptyOutputFromAmplifierLoop)?;
    debug!("Amplifier loop({:?}) outputs {}.", settings, res);
    Ok(res)
}

pub fn max_signal<F>(int_code: &[i64], phases: &[i64], runner: F) -> Result<(Vec<i64>, i64), Error>
where
    F: Fn(&[i64], &[i64]) -> Result<i64, Error> + Sync,
{
    let settings = AmpSettings::from(phases);
    let (best_setting, best_signal) = settings
        .settings
        .par_iter()
        .map(|s| runner(int_code, s).map(|signal| (s.clone(), signal)))
        .collect::<Result<Vec<_>, Error>>()?
        .into_iter()
        .max_by_key(|(_, signal)| *signal)
        .ok_or(Error::EmptyAmplifierResult(Vec::from(phases)))?;

    info!(
        "Best signal {} from {} settings, with setting {:?}.",
        best_signal,
        settings.len(),
        best_setting
    );
    Ok((best_setting, best_signal))
}
