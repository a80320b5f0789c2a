use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::constants::PRIORITY_LEVELS;
use crate::RuleError;

/// Message priority, 0 is lowest and 9 is highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(0);
    pub const LOW: Priority = Priority(3);
    pub const NORM: Priority = Priority(5);
    pub const HIGH: Priority = Priority(7);
    pub const MAX: Priority = Priority(9);

    pub fn new(value: u8) -> Result<Self, RuleError> {
        if (value as usize) < PRIORITY_LEVELS {
            Ok(Priority(value))
        } else {
            Err(RuleError::InvalidPriority(value as i64))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Slot index into a priority table
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All priorities from lowest to highest
    pub fn all() -> impl Iterator<Item = Priority> {
        (0..PRIORITY_LEVELS as u8).map(Priority)
    }
}

impl TryFrom<u8> for Priority {
    type Error = RuleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive priority range as written in `ifPriority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityRange {
    low: Priority,
    high: Priority,
}

impl PriorityRange {
    pub fn new(
        low: Priority,
        high: Priority,
    ) -> Self {
        if low > high {
            Self { low: high, high: low }
        } else {
            Self { low, high }
        }
    }

    pub fn full() -> Self {
        Self {
            low: Priority::MIN,
            high: Priority::MAX,
        }
    }

    pub fn low(&self) -> Priority {
        self.low
    }

    pub fn high(&self) -> Priority {
        self.high
    }

    pub fn contains(
        &self,
        priority: Priority,
    ) -> bool {
        self.low <= priority && priority <= self.high
    }

    /// Slot indices covered by this range
    pub fn indices(&self) -> RangeInclusive<usize> {
        self.low.index()..=self.high.index()
    }

    /// Parses `"low-high"` or a single digit. Blank means `0-9`, reversed
    /// bounds are swapped.
    pub fn parse(range: &str) -> Result<Self, RuleError> {
        let trimmed = range.trim();
        if trimmed.is_empty() {
            return Ok(Self::full());
        }

        let invalid = || RuleError::InvalidPriorityRange {
            range: range.to_string(),
        };
        let bound = |s: &str| -> Result<Priority, RuleError> {
            let value: u8 = s.trim().parse().map_err(|_| invalid())?;
            Priority::new(value).map_err(|_| invalid())
        };

        match trimmed.split_once('-') {
            Some((low, high)) => Ok(Self::new(bound(low)?, bound(high)?)),
            None => {
                let single = bound(trimmed)?;
                Ok(Self::new(single, single))
            }
        }
    }
}

impl Default for PriorityRange {
    fn default() -> Self {
        Self::full()
    }
}

impl FromStr for PriorityRange {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriorityRange::parse(s)
    }
}

impl fmt::Display for PriorityRange {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}
