use std::collections::VecDeque;

use crate::Error;

// Input port for machine, data source
pub trait InputPort {
    fn get(&mut self) -> Option<i64>;
}

// Output port for machine, data sink
pub trait OutputPort {
    fn put(&mut self, value: i64) -> Result<(), Error>;
}

impl OutputPort for Vec<i64> {
    fn put(&mut self, value: i64) -> Result<(), Error> {
        self.push(value);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Channel {
    data: VecDeque<i64>,
}

impl InputPort for Channel {
    fn get(&mut self) -> Option<i64> {
        self.data.pop_front()
    }
}

impl OutputPort for Channel {
    fn put(&mut self, value: i64) -> Result<(), Error> {
        self.push(value);
        Ok(())
    }
}

impl Channel {
    pub fn new(init_input: &[i64]) -> Self {
        Self {
            data: VecDeque::from_iter(init_input.iter().copied()),
        }
    }

    pub fn push(&mut self, value: i64) {
        self.data.push_back(value);
    }

    pub fn data(&self) -> &VecDeque<i64> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
