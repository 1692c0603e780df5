use std::io::{Read, Write};

use crate::runtime::tape_vm::TapeVm;

/// Renders a window of the tape around the origin, one row per line:
/// offset, cell values, then the printable characters.
pub struct TapeDump {
    pub color: bool,
    pub columns: usize,
    pub rows: usize,
}

impl Default for TapeDump {
    fn default() -> Self {
        Self {
            color: true,
            columns: 16,
            rows: 4,
        }
    }
}

impl TapeDump {
    const RESET: &'static str = "\x1b[0m";
    const INVERT: &'static str = "\x1b[7m";
    const DIM: &'static str = "\x1b[2m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn window(mut self, rows: usize, columns: usize) -> Self {
        self.rows = rows.max(1);
        self.columns = columns.max(1);
        self
    }

    /// Index of the first cell shown. The upper half of the rows covers
    /// the heap left of the origin.
    fn start(&self) -> isize {
        -((self.columns * (self.rows / 2)) as isize)
    }

    pub fn format<R: Read, W: Write>(&self, vm: &TapeVm<R, W>) -> String {
        let pointer = vm.relative_pointer();
        let mut out = String::new();
        let mut start = self.start();

        // keep the pointer visible
        let span = (self.columns * self.rows) as isize;
        if pointer < start || pointer >= start + span {
            start = pointer - pointer.rem_euclid(self.columns as isize);
        }

        for row in 0..self.rows {
            let first = start + (row * self.columns) as isize;
            out.push_str(&format!("{:>6} |", first));

            let mut chars = String::new();
            for i in 0..self.columns as isize {
                let offset = first + i;
                let value = vm.cell(offset);
                let cell = if offset == pointer {
                    if self.color {
                        format!(" {}{:>3}{} ", Self::INVERT, value, Self::RESET)
                    } else {
                        format!("[{:>3}]", value)
                    }
                } else if value == 0 && self.color {
                    format!(" {}{:>3}{} ", Self::DIM, value, Self::RESET)
                } else {
                    format!(" {:>3} ", value)
                };
                out.push_str(&cell);
                chars.push(if value.is_ascii_graphic() || value == b' ' {
                    value as char
                } else {
                    '.'
                });
            }
            out.push_str(" | ");
            out.push_str(&chars);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tape_vm::TapeVmConfig;

    #[test]
    fn test_plain_window() {
        let mut out = Vec::new();
        let code = "<->>>+++>>++++++++[<++++++++>-]<";
        let mut vm = TapeVm::new(code, &b""[..], &mut out, TapeVmConfig::default()).unwrap();
        vm.run().unwrap();

        let dump = TapeDump::new().no_color().window(2, 4).format(&vm);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "    -4 |   0    0    0  255  | ....");
        assert_eq!(lines[1], "     0 |   0    0    3 [ 64] | ...@");
    }

    #[test]
    fn test_follows_pointer() {
        let mut out = Vec::new();
        let config = TapeVmConfig::default();
        let mut vm = TapeVm::new(">>>>>>>>>>+", &b""[..], &mut out, config).unwrap();
        vm.run().unwrap();

        let dump = TapeDump::new().no_color().window(1, 4).format(&vm);
        assert!(dump.starts_with("     8 |"), "{dump}");
        assert!(dump.contains("[  1]"));
    }

    #[test]
    fn test_colored_pointer() {
        let mut out = Vec::new();
        let vm = TapeVm::new("", &b""[..], &mut out, TapeVmConfig::default()).unwrap();
        let dump = TapeDump::new().window(1, 2).format(&vm);
        assert!(dump.contains("\x1b[7m  0\x1b[0m"));
    }
}
