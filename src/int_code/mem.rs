use crate::Error;

pub const MEM_LIMIT: usize = 1 << 24;

// Cells never written read as 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Memory {
    cells: Vec<i64>,
}

impl From<&[i64]> for Memory {
    fn from(image: &[i64]) -> Self {
        Self {
            cells: Vec::from(image),
        }
    }
}

impl Memory {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn read(&self, addr: i64) -> Result<i64, Error> {
        let ind = Self::index(addr)?;
        Ok(self.cells.get(ind).copied().unwrap_or(0))
    }

    pub fn read_at(&self, ind: usize) -> i64 {
        self.cells.get(ind).copied().unwrap_or(0)
    }

    pub fn write(&mut self, addr: i64, value: i64) -> Result<(), Error> {
        let ind = Self::index(addr)?;
        if ind >= self.cells.len() {
            if ind >= MEM_LIMIT {
                return Err(Error::MemoryLimitExceeded(ind));
            }
            self.cells.resize(ind + 1, 0);
        }

        self.cells[ind] = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    fn index(addr: i64) -> Result<usize, Error> {
        usize::try_from(addr).map_err(|_| Error::InvalidAddress(addr))
    }
}
