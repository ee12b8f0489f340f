use heapless::Vec;

/// Incremental parser for the serial time sync protocol: one line of ASCII
/// decimal seconds terminated by CR or LF, e.g. `1700000000\n`.
///
/// Bytes are fed in one at a time as they arrive on the wire; a complete
/// valid line yields the parsed value, anything else yields nothing and the
/// parser is ready for the next line.
pub struct SyncParser {
    digits: Vec<u8, 10>,
    invalid: bool,
}

impl SyncParser {
    pub const fn new() -> SyncParser {
        SyncParser {
            digits: Vec::new(),
            invalid: false,
        }
    }

    /// Feed one received byte. Returns the seconds value when the byte
    /// completes a valid line.
    pub fn push(&mut self, byte: u8) -> Option<u32> {
        match byte {
            b'\r' | b'\n' => self.finish(),
            b'0'..=b'9' => {
                if self.digits.push(byte - b'0').is_err() {
                    // longer than any u32, poison the rest of the line
                    self.invalid = true;
                }
                None
            }
            _ => {
                self.invalid = true;
                None
            }
        }
    }

    fn finish(&mut self) -> Option<u32> {
        let mut value = if self.invalid || self.digits.is_empty() {
            None
        } else {
            Some(0u32)
        };

        for &digit in &self.digits {
            value = value
                .and_then(|v| v.checked_mul(10))
                .and_then(|v| v.checked_add(u32::from(digit)));
        }

        self.digits.clear();
        self.invalid = false;
        value
    }
}
