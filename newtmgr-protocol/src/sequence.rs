/// Per-connection request sequence number (one byte on the wire).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    /// Number of distinct values before the counter wraps.
    pub const SPACE: usize = 256;

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// The following sequence number, wrapping 255 -> 0.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u8> for SequenceNumber {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
