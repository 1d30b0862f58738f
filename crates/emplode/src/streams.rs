//! Output stream registry (§3.4): file name → output stream, opened
//! lazily on first write. Actual file/stream management is an external
//! collaborator concern (spec Non-goals); this registry only provides
//! the lazy-open bookkeeping the core promises host-registered types
//! like the original's `DataFile`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};

#[derive(Default)]
pub struct StreamRegistry {
    open: HashMap<String, File>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_open(&mut self, name: &str) -> io::Result<&mut File> {
        if !self.open.contains_key(name) {
            let file = File::create(name)?;
            self.open.insert(name.to_string(), file);
        }
        Ok(self.open.get_mut(name).unwrap())
    }

    pub fn write_line(&mut self, name: &str, line: &str) -> io::Result<()> {
        let file = self.get_or_open(name)?;
        writeln!(file, "{line}")
    }
}
