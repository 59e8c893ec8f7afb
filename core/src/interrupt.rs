use crate::cell::Cell;
use crate::{Result, VmError, INTERRUPT_TABLE_SIZE};

/// Word-addressed interrupt vector table.
///
/// Slots start at zero; triggering an unset interrupt therefore jumps to
/// address 0, and a program that never set a handler there will run off into
/// whatever the image holds.
#[derive(Debug, Clone)]
pub struct InterruptTable {
    handlers: [Cell; INTERRUPT_TABLE_SIZE],
}

impl Default for InterruptTable {
    fn default() -> Self {
        Self {
            handlers: [Cell::ZERO; INTERRUPT_TABLE_SIZE],
        }
    }
}

impl InterruptTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: usize) -> Result<Cell> {
        if id >= INTERRUPT_TABLE_SIZE {
            return Err(VmError::IllegalInterruptId);
        }
        Ok(self.handlers[id])
    }

    pub fn set(&mut self, id: usize, addr: Cell) -> Result<()> {
        if id >= INTERRUPT_TABLE_SIZE {
            return Err(VmError::IllegalInterruptId);
        }
        self.handlers[id] = addr;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.handlers = [Cell::ZERO; INTERRUPT_TABLE_SIZE];
    }

    pub fn snapshot(&self) -> Vec<Cell> {
        self.handlers.to_vec()
    }
}
