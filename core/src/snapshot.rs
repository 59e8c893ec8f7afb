use crate::cell::Cell;
use crate::mode::{AddrMode, OpMode};
use serde::{Deserialize, Serialize};

/// Deep copy of one stack: the full backing array plus the live count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub cells: Vec<Cell>,
    pub top: usize,
}

impl StackSnapshot {
    /// The occupied entries, bottom first.
    pub fn live(&self) -> &[Cell] {
        &self.cells[..self.top]
    }

    /// The top of the stack, if any.
    pub fn peek(&self) -> Option<Cell> {
        self.top.checked_sub(1).map(|i| self.cells[i])
    }
}

/// Deep copy of one core's architectural state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    pub ip: u32,
    pub active: bool,
    pub op_mode: OpMode,
    pub addr_mode: AddrMode,
    pub data: StackSnapshot,
    pub addrs: StackSnapshot,
    pub regs: Vec<Cell>,
}

/// Deep, read-only copy of the whole machine, taken while the VM is
/// quiescent. I/O slots are represented by their descriptions only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub mem: Vec<u8>,
    pub int_table: Vec<Cell>,
    pub io_table: Vec<String>,
    pub cores: Vec<CoreSnapshot>,
    pub cur_core: usize,
    pub ints_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_and_peek_track_top() {
        let snap = StackSnapshot {
            cells: vec![Cell::from_u32(1), Cell::from_u32(2), Cell::ZERO],
            top: 2,
        };
        assert_eq!(snap.live(), &[Cell::from_u32(1), Cell::from_u32(2)]);
        assert_eq!(snap.peek(), Some(Cell::from_u32(2)));

        let empty = StackSnapshot {
            cells: vec![],
            top: 0,
        };
        assert_eq!(empty.peek(), None);
    }
}
