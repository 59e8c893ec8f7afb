use crate::mode::OpMode;
use crate::{Result, VmError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-bit value stored as four little-endian bytes, reinterpretable as
/// i32, u32, f32, bool or raw bytes depending on the current [`OpMode`].
///
/// The byte layout is fixed regardless of host endianness: `from_u32` and
/// `as_u32` round-trip through `to_le_bytes`/`from_le_bytes`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell([u8; 4]);

impl Cell {
    pub const ZERO: Cell = Cell([0; 4]);

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Cell(bytes)
    }

    pub fn from_byte(byte: u8) -> Self {
        Cell([byte, 0, 0, 0])
    }

    pub fn from_i32(value: i32) -> Self {
        Cell(value.to_le_bytes())
    }

    pub fn from_u32(value: u32) -> Self {
        Cell(value.to_le_bytes())
    }

    pub fn from_f32(value: f32) -> Self {
        Cell(value.to_le_bytes())
    }

    /// True is all-ones, false is all-zeroes.
    pub fn from_bool(value: bool) -> Self {
        Cell(if value { [0xFF; 4] } else { [0x00; 4] })
    }

    pub fn as_bytes(self) -> [u8; 4] {
        self.0
    }

    /// The low byte.
    pub fn as_byte(self) -> u8 {
        self.0[0]
    }

    pub fn as_i32(self) -> i32 {
        i32::from_le_bytes(self.0)
    }

    pub fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn as_f32(self) -> f32 {
        f32::from_le_bytes(self.0)
    }

    pub fn as_size(self) -> usize {
        self.as_u32() as usize
    }

    /// A cell is truthy only when all four bytes are 0xFF.
    pub fn as_bool(self) -> bool {
        self.0 == [0xFF; 4]
    }

    pub fn add(self, rhs: Cell, mode: OpMode) -> Cell {
        match mode {
            OpMode::Signed => Cell::from_i32(self.as_i32().wrapping_add(rhs.as_i32())),
            OpMode::Unsigned => Cell::from_u32(self.as_u32().wrapping_add(rhs.as_u32())),
            OpMode::Float => Cell::from_f32(self.as_f32() + rhs.as_f32()),
        }
    }

    pub fn sub(self, rhs: Cell, mode: OpMode) -> Cell {
        match mode {
            OpMode::Signed => Cell::from_i32(self.as_i32().wrapping_sub(rhs.as_i32())),
            OpMode::Unsigned => Cell::from_u32(self.as_u32().wrapping_sub(rhs.as_u32())),
            OpMode::Float => Cell::from_f32(self.as_f32() - rhs.as_f32()),
        }
    }

    pub fn mul(self, rhs: Cell, mode: OpMode) -> Cell {
        match mode {
            OpMode::Signed => Cell::from_i32(self.as_i32().wrapping_mul(rhs.as_i32())),
            OpMode::Unsigned => Cell::from_u32(self.as_u32().wrapping_mul(rhs.as_u32())),
            OpMode::Float => Cell::from_f32(self.as_f32() * rhs.as_f32()),
        }
    }

    /// Division with remainder: `(self % rhs, self / rhs)`, remainder first.
    ///
    /// A zero divisor (integer zero, or float exactly 0.0) fails with
    /// `DivisionByZero`. Signed division wraps on `i32::MIN / -1`.
    pub fn divmod(self, rhs: Cell, mode: OpMode) -> Result<(Cell, Cell)> {
        match mode {
            OpMode::Signed => {
                let (lhs, rhs) = (self.as_i32(), rhs.as_i32());
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }
                Ok((
                    Cell::from_i32(lhs.wrapping_rem(rhs)),
                    Cell::from_i32(lhs.wrapping_div(rhs)),
                ))
            }
            OpMode::Unsigned => {
                let (lhs, rhs) = (self.as_u32(), rhs.as_u32());
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }
                Ok((Cell::from_u32(lhs % rhs), Cell::from_u32(lhs / rhs)))
            }
            OpMode::Float => {
                let (lhs, rhs) = (self.as_f32(), rhs.as_f32());
                if rhs == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                Ok((Cell::from_f32(lhs % rhs), Cell::from_f32(lhs / rhs)))
            }
        }
    }

    /// `(self * mul) % rhs` and `(self * mul) / rhs`, remainder first, with
    /// the same zero-divisor policy as [`Cell::divmod`].
    pub fn mul_divmod(self, mul: Cell, rhs: Cell, mode: OpMode) -> Result<(Cell, Cell)> {
        match mode {
            OpMode::Signed => self.mul(mul, mode).divmod(rhs, mode),
            OpMode::Unsigned => self.mul(mul, mode).divmod(rhs, mode),
            OpMode::Float => {
                let (product, rhs) = (self.as_f32() * mul.as_f32(), rhs.as_f32());
                if rhs == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                Ok((Cell::from_f32(product % rhs), Cell::from_f32(product / rhs)))
            }
        }
    }

    /// Byte-wise equality, ignoring mode.
    pub fn equal(self, rhs: Cell) -> Cell {
        Cell::from_bool(self.as_u32() == rhs.as_u32())
    }

    pub fn not_equal(self, rhs: Cell) -> Cell {
        Cell::from_bool(self.as_u32() != rhs.as_u32())
    }

    pub fn less_than(self, rhs: Cell, mode: OpMode) -> Cell {
        Cell::from_bool(match mode {
            OpMode::Signed => self.as_i32() < rhs.as_i32(),
            OpMode::Unsigned => self.as_u32() < rhs.as_u32(),
            OpMode::Float => self.as_f32() < rhs.as_f32(),
        })
    }

    pub fn greater_than(self, rhs: Cell, mode: OpMode) -> Cell {
        Cell::from_bool(match mode {
            OpMode::Signed => self.as_i32() > rhs.as_i32(),
            OpMode::Unsigned => self.as_u32() > rhs.as_u32(),
            OpMode::Float => self.as_f32() > rhs.as_f32(),
        })
    }

    pub fn bitwise_and(self, rhs: Cell) -> Cell {
        Cell::from_u32(self.as_u32() & rhs.as_u32())
    }

    pub fn bitwise_or(self, rhs: Cell) -> Cell {
        Cell::from_u32(self.as_u32() | rhs.as_u32())
    }

    pub fn bitwise_xor(self, rhs: Cell) -> Cell {
        Cell::from_u32(self.as_u32() ^ rhs.as_u32())
    }

    pub fn bitwise_not(self) -> Cell {
        Cell::from_u32(!self.as_u32())
    }

    /// Left shift by the low five bits of `rhs`. Fails in float mode.
    pub fn shift_left(self, rhs: Cell, mode: OpMode) -> Result<Cell> {
        match mode {
            OpMode::Signed => Ok(Cell::from_i32(self.as_i32().wrapping_shl(rhs.as_u32()))),
            OpMode::Unsigned => Ok(Cell::from_u32(self.as_u32().wrapping_shl(rhs.as_u32()))),
            OpMode::Float => Err(VmError::InvalidFloatOperation),
        }
    }

    /// Right shift by the low five bits of `rhs`; arithmetic in signed mode,
    /// logical in unsigned mode. Fails in float mode.
    pub fn shift_right(self, rhs: Cell, mode: OpMode) -> Result<Cell> {
        match mode {
            OpMode::Signed => Ok(Cell::from_i32(self.as_i32().wrapping_shr(rhs.as_u32()))),
            OpMode::Unsigned => Ok(Cell::from_u32(self.as_u32().wrapping_shr(rhs.as_u32()))),
            OpMode::Float => Err(VmError::InvalidFloatOperation),
        }
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell(0x{:08X})", self.as_u32())
    }
}
