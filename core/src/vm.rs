use crate::cell::Cell;
use crate::core::Core;
use crate::interrupt::InterruptTable;
use crate::io::{IoHandler, IoTable};
use crate::memory::Memory;
use crate::mode::{AddrMode, OpMode};
use crate::opcode::Opcode;
use crate::snapshot::VmSnapshot;
use crate::{Result, VmError, CORE_COUNT};
use std::env;

/// The virtual machine: shared memory and tables plus the core array, driven
/// by a cooperative round-robin interpreter loop.
///
/// Execution is strictly serialized; one instruction runs to completion
/// before the next core is selected, so cross-core memory effects are
/// totally ordered.
pub struct Vm {
    mem: Memory,
    int_table: InterruptTable,
    io_table: IoTable,
    cores: [Core; CORE_COUNT],
    cur_core: usize,
    ints_enabled: bool,
    trace: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A VM with an empty I/O table.
    pub fn new() -> Self {
        Self::with_io_table(IoTable::new())
    }

    pub fn with_io_table(io_table: IoTable) -> Self {
        let mut cores: [Core; CORE_COUNT] = std::array::from_fn(|_| Core::default());
        cores[0].active = true;
        Self {
            mem: Memory::new(),
            int_table: InterruptTable::new(),
            io_table,
            cores,
            // Start on the last core so the first scheduling pass lands on
            // core 0 before the first fetch.
            cur_core: CORE_COUNT - 1,
            ints_enabled: false,
            trace: matches!(env::var("ZAGROS_TRACE").as_deref(), Ok("1")),
        }
    }

    /// Copies a flat byte image to address 0; byte 0 becomes the first
    /// opcode core 0 executes.
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        self.mem.load_program(program)
    }

    /// Installs a host I/O callback. Out-of-range slots are ignored.
    pub fn install_io(&mut self, slot: usize, handler: Box<dyn IoHandler>) {
        self.io_table.install(slot, handler);
    }

    /// Host side-channel into the memory I/O window.
    pub fn io_write(&mut self, addr: usize, byte: u8) -> Result<()> {
        self.mem.write_io_byte(addr, byte)
    }

    pub fn io_read(&self, addr: usize) -> Result<u8> {
        self.mem.read_io_byte(addr)
    }

    /// Runs until any terminal error. `SystemHalt` is the orderly ending;
    /// everything else is a fault the program tripped.
    pub fn run(&mut self) -> VmError {
        loop {
            if let Err(err) = self.step() {
                return err;
            }
        }
    }

    /// Executes exactly one instruction on the next scheduled core. Exposed
    /// so hosts can bound a run by step count.
    pub fn step(&mut self) -> Result<()> {
        self.select_next_core();
        let ip = self.cores[self.cur_core].ip;
        let byte = self.mem.fetch_opcode(ip as usize)?;
        let opcode = Opcode::from_byte(byte).ok_or(VmError::SystemHalt)?;
        if self.trace {
            eprintln!(
                "[zagros-trace] core={} ip=0x{ip:04X} op={}",
                self.cur_core,
                opcode.mnemonic()
            );
        }
        self.execute(opcode)
    }

    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot {
            mem: self.mem.snapshot(),
            int_table: self.int_table.snapshot(),
            io_table: self.io_table.snapshot(),
            cores: self.cores.iter().map(Core::snapshot).collect(),
            cur_core: self.cur_core,
            ints_enabled: self.ints_enabled,
        }
    }

    /// Round-robin over active cores: scan forward from the successor of the
    /// current core, wrap to the front, and keep the current core when no
    /// other core is active.
    fn select_next_core(&mut self) {
        if CORE_COUNT == 1 {
            return;
        }
        for next in self.cur_core + 1..CORE_COUNT {
            if self.cores[next].active {
                self.cur_core = next;
                return;
            }
        }
        for next in 0..self.cur_core {
            if self.cores[next].active {
                self.cur_core = next;
                return;
            }
        }
    }

    fn execute(&mut self, opcode: Opcode) -> Result<()> {
        match opcode {
            Opcode::Nop => {
                self.finish(1);
                Ok(())
            }
            Opcode::LoadWord => self.op_load(4, 4, 8),
            Opcode::LoadHalf => self.op_load(1, 2, 3),
            Opcode::LoadByte => self.op_load(1, 1, 2),
            Opcode::FetchWord => self.op_fetch(4),
            Opcode::FetchHalf => self.op_fetch(2),
            Opcode::FetchByte => self.op_fetch(1),
            Opcode::StoreWord => self.op_store(4),
            Opcode::StoreHalf => self.op_store(2),
            Opcode::StoreByte => self.op_store(1),
            Opcode::Dup => self.op_dup(),
            Opcode::Drop => self.op_drop(),
            Opcode::Swap => self.op_swap(),
            Opcode::PushAddr => self.op_push_addr(),
            Opcode::PopAddr => self.op_pop_addr(),
            Opcode::Equal => self.binary_op(|l, r, _| Ok(l.equal(r))),
            Opcode::NotEqual => self.binary_op(|l, r, _| Ok(l.not_equal(r))),
            Opcode::LessThan => self.binary_op(|l, r, m| Ok(l.less_than(r, m))),
            Opcode::GreaterThan => self.binary_op(|l, r, m| Ok(l.greater_than(r, m))),
            Opcode::Add => self.binary_op(|l, r, m| Ok(l.add(r, m))),
            Opcode::Sub => self.binary_op(|l, r, m| Ok(l.sub(r, m))),
            Opcode::Mul => self.binary_op(|l, r, m| Ok(l.mul(r, m))),
            Opcode::DivMod => self.op_divmod(),
            Opcode::MulDivMod => self.op_mul_divmod(),
            Opcode::And => self.binary_op(|l, r, _| Ok(l.bitwise_and(r))),
            Opcode::Or => self.binary_op(|l, r, _| Ok(l.bitwise_or(r))),
            Opcode::Xor => self.binary_op(|l, r, _| Ok(l.bitwise_xor(r))),
            Opcode::Not => self.op_not(),
            Opcode::ShiftLeft => self.binary_op(|l, r, m| l.shift_left(r, m)),
            Opcode::ShiftRight => self.binary_op(|l, r, m| l.shift_right(r, m)),
            Opcode::Pack => self.op_pack(),
            Opcode::Unpack => self.op_unpack(),
            Opcode::Relative => self.op_relative(),
            Opcode::Call => self.op_call(),
            Opcode::CondCall => self.op_cond_call(),
            Opcode::Jump => self.op_jump(),
            Opcode::CondJump => self.op_cond_jump(),
            Opcode::Return => self.op_return(),
            Opcode::CondReturn => self.op_cond_return(),
            Opcode::SetInterrupt => self.op_set_interrupt(),
            Opcode::HaltInterrupts => self.op_set_ints_enabled(false),
            Opcode::StartInterrupts => self.op_set_ints_enabled(true),
            Opcode::TriggerInterrupt => self.op_trigger_interrupt(),
            Opcode::InvokeIo => self.op_invoke_io(),
            Opcode::HaltSystem => Err(VmError::SystemHalt),
            Opcode::InitCore => self.op_init_core(),
            Opcode::ActivateCore => self.op_set_core_active(true),
            Opcode::PauseCore => self.op_set_core_active(false),
            Opcode::SuspendCore => self.op_suspend_core(),
            Opcode::ReadRegister => self.op_read_register(),
            Opcode::WriteRegister => self.op_write_register(),
            Opcode::CopyBlock => self.op_copy_block(),
            Opcode::CompareBlock => self.op_compare_block(),
            Opcode::UnsignedMode => self.op_set_mode(OpMode::Unsigned),
            Opcode::FloatMode => self.op_set_mode(OpMode::Float),
        }
    }

    fn cur(&mut self) -> &mut Core {
        &mut self.cores[self.cur_core]
    }

    /// Advances the instruction pointer and performs the end-of-instruction
    /// mode reset every non-modifier instruction shares.
    fn finish(&mut self, instr_len: u32) {
        let core = self.cur();
        core.ip = core.ip.wrapping_add(instr_len);
        core.op_mode = OpMode::Signed;
    }

    fn op_load(&mut self, offset: u32, len: usize, instr_len: u32) -> Result<()> {
        let core = self.cur();
        core.data.guard(0, 1)?;
        let addr = core.ip.wrapping_add(offset) as usize;
        let cell = self.mem.read_cell(addr, len)?;
        self.cur().data.push(cell);
        self.finish(instr_len);
        Ok(())
    }

    fn op_fetch(&mut self, len: usize) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 1)?;
        let addr = core.data.pop().as_size();
        let cell = self.mem.read_cell(addr, len)?;
        self.cur().data.push(cell);
        self.finish(1);
        Ok(())
    }

    fn op_store(&mut self, len: usize) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 0)?;
        let addr = core.data.pop().as_size();
        let value = core.data.pop();
        self.mem.write_cell(addr, value, len)?;
        self.finish(1);
        Ok(())
    }

    fn op_dup(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 2)?;
        let value = core.data.pop();
        core.data.push(value);
        core.data.push(value);
        self.finish(1);
        Ok(())
    }

    fn op_drop(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        core.data.pop();
        self.finish(1);
        Ok(())
    }

    fn op_swap(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 2)?;
        let right = core.data.pop();
        let left = core.data.pop();
        core.data.push(right);
        core.data.push(left);
        self.finish(1);
        Ok(())
    }

    fn op_push_addr(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        let addr = core.data.pop();
        core.addrs.push(addr)?;
        self.finish(1);
        Ok(())
    }

    fn op_pop_addr(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(0, 1)?;
        let addr = core.addrs.pop()?;
        core.data.push(addr);
        self.finish(1);
        Ok(())
    }

    /// Shared shape of the two-operand instructions: the right operand is
    /// the top of the stack and the result of `left op right` replaces both.
    fn binary_op(&mut self, op: impl FnOnce(Cell, Cell, OpMode) -> Result<Cell>) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 1)?;
        let right = core.data.pop();
        let left = core.data.pop();
        let result = op(left, right, core.op_mode)?;
        core.data.push(result);
        self.finish(1);
        Ok(())
    }

    fn op_divmod(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 2)?;
        let right = core.data.pop();
        let left = core.data.pop();
        let (remainder, quotient) = left.divmod(right, core.op_mode)?;
        core.data.push(remainder);
        core.data.push(quotient);
        self.finish(1);
        Ok(())
    }

    fn op_mul_divmod(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(3, 2)?;
        let right = core.data.pop();
        let mul = core.data.pop();
        let left = core.data.pop();
        let (remainder, quotient) = left.mul_divmod(mul, right, core.op_mode)?;
        core.data.push(remainder);
        core.data.push(quotient);
        self.finish(1);
        Ok(())
    }

    fn op_not(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 1)?;
        let value = core.data.pop();
        core.data.push(value.bitwise_not());
        self.finish(1);
        Ok(())
    }

    fn op_pack(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(4, 1)?;
        let b0 = core.data.pop();
        let b1 = core.data.pop();
        let b2 = core.data.pop();
        let b3 = core.data.pop();
        core.data.push(Cell::from_bytes([
            b0.as_byte(),
            b1.as_byte(),
            b2.as_byte(),
            b3.as_byte(),
        ]));
        self.finish(1);
        Ok(())
    }

    fn op_unpack(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 4)?;
        let bytes = core.data.pop().as_bytes();
        // Low byte ends up on top.
        core.data.push(Cell::from_byte(bytes[3]));
        core.data.push(Cell::from_byte(bytes[2]));
        core.data.push(Cell::from_byte(bytes[1]));
        core.data.push(Cell::from_byte(bytes[0]));
        self.finish(1);
        Ok(())
    }

    fn op_relative(&mut self) -> Result<()> {
        self.cur().addr_mode = AddrMode::Relative;
        self.finish(1);
        Ok(())
    }

    /// Resolves a control-transfer target against the addressing mode in
    /// effect. The caller is responsible for the `Direct` reset afterwards.
    fn resolve_target(core: &Core, target: Cell) -> u32 {
        match core.addr_mode {
            AddrMode::Direct => target.as_u32(),
            AddrMode::Relative => target.as_u32().wrapping_add(core.ip),
        }
    }

    fn op_call(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        core.addrs.push(Cell::from_u32(core.ip.wrapping_add(4)))?;
        let target = core.data.pop();
        core.ip = Self::resolve_target(core, target);
        core.addr_mode = AddrMode::Direct;
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_cond_call(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 0)?;
        let target = core.data.pop();
        let cond = core.data.pop();
        if cond.as_bool() {
            core.addrs.push(Cell::from_u32(core.ip.wrapping_add(4)))?;
            core.ip = Self::resolve_target(core, target);
        }
        core.addr_mode = AddrMode::Direct;
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_jump(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        let target = core.data.pop();
        core.ip = Self::resolve_target(core, target);
        core.addr_mode = AddrMode::Direct;
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_cond_jump(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 0)?;
        let target = core.data.pop();
        let cond = core.data.pop();
        if cond.as_bool() {
            core.ip = Self::resolve_target(core, target);
        } else {
            core.ip = core.ip.wrapping_add(4);
        }
        core.addr_mode = AddrMode::Direct;
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_return(&mut self) -> Result<()> {
        let core = self.cur();
        let ret = core.addrs.pop()?;
        core.ip = ret.as_u32();
        core.addr_mode = AddrMode::Direct;
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_cond_return(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        let cond = core.data.pop();
        if cond.as_bool() {
            let ret = core.addrs.pop()?;
            core.ip = ret.as_u32();
        } else {
            core.ip = core.ip.wrapping_add(4);
        }
        core.addr_mode = AddrMode::Direct;
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_set_interrupt(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 0)?;
        let id = core.data.pop();
        let addr = core.data.pop();
        self.int_table.set(id.as_size(), addr)?;
        self.finish(1);
        Ok(())
    }

    fn op_set_ints_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ints_enabled = enabled;
        self.finish(1);
        Ok(())
    }

    fn op_trigger_interrupt(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        let id = core.data.pop();
        if !self.ints_enabled {
            self.finish(1);
            return Ok(());
        }
        let handler = self.int_table.get(id.as_size())?;
        let core = self.cur();
        core.addrs.push(Cell::from_u32(core.ip.wrapping_add(1)))?;
        core.ip = handler.as_u32();
        core.op_mode = OpMode::Signed;
        Ok(())
    }

    fn op_invoke_io(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 0)?;
        let id = core.data.pop().as_size();
        self.io_table.call(id, self.mem.io_window_mut());
        self.finish(1);
        Ok(())
    }

    fn pop_core_id(&mut self, pops: usize) -> Result<usize> {
        let core = self.cur();
        core.data.guard(pops, 0)?;
        let id = core.data.pop().as_size();
        if id >= CORE_COUNT {
            return Err(VmError::IllegalRegisterId);
        }
        Ok(id)
    }

    fn op_init_core(&mut self) -> Result<()> {
        let id = self.pop_core_id(2)?;
        let addr = self.cur().data.pop();
        self.cores[id].init(addr.as_u32());
        self.finish(1);
        Ok(())
    }

    fn op_set_core_active(&mut self, active: bool) -> Result<()> {
        let id = self.pop_core_id(1)?;
        self.cores[id].active = active;
        self.finish(1);
        Ok(())
    }

    fn op_suspend_core(&mut self) -> Result<()> {
        self.cur().active = false;
        self.finish(1);
        Ok(())
    }

    fn op_read_register(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(1, 1)?;
        let id = core.data.pop();
        let value = core.regs.read(id.as_size())?;
        core.data.push(value);
        self.finish(1);
        Ok(())
    }

    fn op_write_register(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(2, 0)?;
        let id = core.data.pop();
        let value = core.data.pop();
        core.regs.write(id.as_size(), value)?;
        self.finish(1);
        Ok(())
    }

    fn op_copy_block(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(3, 0)?;
        let len = core.data.pop().as_size();
        let dst = core.data.pop().as_size();
        let src = core.data.pop().as_size();
        self.mem.copy_block(len, dst, src)?;
        self.finish(1);
        Ok(())
    }

    fn op_compare_block(&mut self) -> Result<()> {
        let core = self.cur();
        core.data.guard(3, 1)?;
        let len = core.data.pop().as_size();
        let dst = core.data.pop().as_size();
        let src = core.data.pop().as_size();
        let equal = self.mem.compare_block(len, dst, src)?;
        self.cur().data.push(equal);
        self.finish(1);
        Ok(())
    }

    /// UU and FF: the one place the end-of-instruction reset does not apply.
    fn op_set_mode(&mut self, mode: OpMode) -> Result<()> {
        let core = self.cur();
        core.ip = core.ip.wrapping_add(1);
        core.op_mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    const LB: u8 = Opcode::LoadByte as u8;
    const HS: u8 = Opcode::HaltSystem as u8;

    fn run_program(program: &[u8]) -> (VmError, VmSnapshot) {
        let mut vm = Vm::new();
        vm.load_program(program).unwrap();
        let err = vm.run();
        (err, vm.snapshot())
    }

    #[test]
    fn scheduler_starts_on_core_zero() {
        let vm = Vm::new();
        assert_eq!(vm.snapshot().cur_core, CORE_COUNT - 1);
        let (_, snap) = run_program(&[HS]);
        assert_eq!(snap.cur_core, 0);
    }

    #[test]
    fn scheduler_keeps_sole_active_core() {
        let mut vm = Vm::new();
        vm.cur_core = 0;
        vm.select_next_core();
        assert_eq!(vm.cur_core, 0);
    }

    #[test]
    fn scheduler_alternates_between_active_cores() {
        let mut vm = Vm::new();
        vm.cores[1].active = true;
        vm.cur_core = 0;
        vm.select_next_core();
        assert_eq!(vm.cur_core, 1);
        vm.select_next_core();
        assert_eq!(vm.cur_core, 0);
    }

    #[test]
    fn scheduler_leaves_cur_core_when_nothing_is_active() {
        let mut vm = Vm::new();
        vm.cores[0].active = false;
        vm.cur_core = 0;
        vm.select_next_core();
        assert_eq!(vm.cur_core, 0);
    }

    #[test]
    fn unknown_opcode_halts() {
        let (err, snap) = run_program(&[200]);
        assert_eq!(err, VmError::SystemHalt);
        assert_eq!(snap.cores[0].ip, 0);
    }

    #[test]
    fn running_off_the_image_halts() {
        // A single NO at the very last byte leaves ip == MEMORY_SIZE.
        let mut vm = Vm::new();
        let mut program = vec![HS; crate::MEMORY_SIZE];
        program[crate::MEMORY_SIZE - 1] = Opcode::Nop as u8;
        vm.load_program(&program).unwrap();
        vm.cores[0].ip = (crate::MEMORY_SIZE - 1) as u32;
        assert_eq!(vm.run(), VmError::SystemHalt);
        assert_eq!(vm.cores[0].ip, crate::MEMORY_SIZE as u32);
    }

    #[test]
    fn mode_modifier_lasts_one_instruction() {
        // UU, LB 1, HS: the load resets the mode the modifier set.
        let (err, snap) = run_program(&[Opcode::UnsignedMode as u8, LB, 1, HS]);
        assert_eq!(err, VmError::SystemHalt);
        assert_eq!(snap.cores[0].op_mode, OpMode::Signed);
    }

    #[test]
    fn float_mode_survives_until_after_the_next_instruction() {
        let mut vm = Vm::new();
        vm.load_program(&[Opcode::FloatMode as u8, HS]).unwrap();
        vm.step().unwrap();
        assert_eq!(vm.cores[0].op_mode, OpMode::Float);
    }

    #[test]
    fn trigger_interrupt_jumps_through_the_table_when_enabled() {
        // SI, LB 0, TI, ... HS at 10; int_table[0] = 10 set by the host.
        let mut vm = Vm::new();
        let program = [
            Opcode::StartInterrupts as u8,
            LB,
            0,
            Opcode::TriggerInterrupt as u8,
            0,
            0,
            0,
            0,
            0,
            0,
            HS,
        ];
        vm.load_program(&program).unwrap();
        vm.int_table.set(0, Cell::from_u32(10)).unwrap();
        assert_eq!(vm.run(), VmError::SystemHalt);
        let snap = vm.snapshot();
        assert_eq!(snap.cores[0].ip, 10);
        // The return address (after TI at 3) is parked on the address stack.
        assert_eq!(snap.cores[0].addrs.peek(), Some(Cell::from_u32(4)));
    }

    #[test]
    fn trigger_interrupt_is_inert_when_disabled() {
        let (err, snap) = run_program(&[LB, 0, Opcode::TriggerInterrupt as u8, HS]);
        assert_eq!(err, VmError::SystemHalt);
        assert_eq!(snap.cores[0].ip, 3);
        assert_eq!(snap.cores[0].addrs.top, 0);
    }

    #[test]
    fn trigger_interrupt_validates_the_id() {
        let mut vm = Vm::new();
        let program = [
            Opcode::StartInterrupts as u8,
            Opcode::LoadHalf as u8,
            0xFF,
            0xFF,
            Opcode::TriggerInterrupt as u8,
        ];
        vm.load_program(&program).unwrap();
        assert_eq!(vm.run(), VmError::IllegalInterruptId);
    }

    #[test]
    fn out_of_range_core_id_faults() {
        let (err, _) = run_program(&[LB, CORE_COUNT as u8, Opcode::ActivateCore as u8]);
        assert_eq!(err, VmError::IllegalRegisterId);
    }

    #[test]
    fn io_window_roundtrip_through_the_host_api() {
        let mut vm = Vm::new();
        vm.io_write(8, 0x5A).unwrap();
        assert_eq!(vm.io_read(8), Ok(0x5A));
        assert_eq!(
            vm.io_write(crate::IO_WINDOW_END, 0),
            Err(VmError::IllegalMemoryAddress)
        );
    }
}
