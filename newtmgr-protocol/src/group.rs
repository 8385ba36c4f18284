/// Command group (u16 on the wire).
///
/// Groups namespace command ids; the device dispatches on `(group, id)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Group(u16);

impl Group {
    pub const DEFAULT: Self = Self(0);
    pub const IMAGE: Self = Self(1);
    pub const STATS: Self = Self(2);
    pub const CONFIG: Self = Self(3);
    pub const LOGS: Self = Self(4);
    pub const CRASH: Self = Self(5);
    /// First group id available to application-defined handlers.
    pub const PERUSER: Self = Self(64);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::DEFAULT => write!(f, "default"),
            Self::IMAGE => write!(f, "image"),
            Self::STATS => write!(f, "stats"),
            Self::CONFIG => write!(f, "config"),
            Self::LOGS => write!(f, "logs"),
            Self::CRASH => write!(f, "crash"),
            Self(n) => write!(f, "{n}"),
        }
    }
}

/// Command ids in [`Group::DEFAULT`].
pub mod default_id {
    pub const ECHO: u8 = 0;
    pub const CONS_ECHO_CTRL: u8 = 1;
    pub const TASKSTATS: u8 = 2;
    pub const MPSTATS: u8 = 3;
    pub const DATETIME_STR: u8 = 4;
    pub const RESET: u8 = 5;
}
