use crate::IO_TABLE_SIZE;

/// A host-supplied I/O effect bound to one slot of the [`IoTable`].
///
/// `run` receives the memory I/O window; it returns nothing into the VM.
/// `description` labels the slot in snapshots.
pub trait IoHandler {
    fn run(&mut self, io_window: &mut [u8]);

    fn description(&self) -> String;
}

/// Fixed table of host I/O callbacks. Invoking an empty or out-of-range
/// slot is a silent no-op.
pub struct IoTable {
    handlers: [Option<Box<dyn IoHandler>>; IO_TABLE_SIZE],
}

impl Default for IoTable {
    fn default() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
        }
    }
}

impl IoTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` in `slot`, replacing whatever was there. Out-of-range
    /// slots are ignored.
    pub fn install(&mut self, slot: usize, handler: Box<dyn IoHandler>) {
        if let Some(entry) = self.handlers.get_mut(slot) {
            *entry = Some(handler);
        }
    }

    pub fn call(&mut self, id: usize, io_window: &mut [u8]) {
        if let Some(Some(handler)) = self.handlers.get_mut(id) {
            handler.run(io_window);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.handlers
            .iter()
            .map(|slot| match slot {
                Some(handler) => handler.description(),
                None => "empty".to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MarkByte(u8);

    impl IoHandler for MarkByte {
        fn run(&mut self, io_window: &mut [u8]) {
            io_window[0] = self.0;
        }

        fn description(&self) -> String {
            format!("mark byte 0x{:02X}", self.0)
        }
    }

    #[test]
    fn call_runs_the_installed_handler() {
        let mut table = IoTable::new();
        table.install(2, Box::new(MarkByte(0xAB)));
        let mut window = [0u8; 8];
        table.call(2, &mut window);
        assert_eq!(window[0], 0xAB);
    }

    #[test]
    fn empty_and_out_of_range_slots_are_silent() {
        let mut table = IoTable::new();
        let mut window = [0u8; 8];
        table.call(0, &mut window);
        table.call(IO_TABLE_SIZE, &mut window);
        table.call(usize::MAX, &mut window);
        assert_eq!(window, [0u8; 8]);
    }

    #[test]
    fn install_past_the_table_is_ignored() {
        let mut table = IoTable::new();
        table.install(IO_TABLE_SIZE, Box::new(MarkByte(1)));
        assert!(table.snapshot().iter().all(|desc| desc == "empty"));
    }

    #[test]
    fn snapshot_describes_each_slot() {
        let mut table = IoTable::new();
        table.install(1, Box::new(MarkByte(0x10)));
        let descriptions = table.snapshot();
        assert_eq!(descriptions.len(), IO_TABLE_SIZE);
        assert_eq!(descriptions[0], "empty");
        assert_eq!(descriptions[1], "mark byte 0x10");
    }
}
