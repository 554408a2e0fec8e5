//! Device identification

use std::fmt;

/// Where a storage lives
///
/// `Host` is plain CPU memory with no queue; every `Accel` index owns one
/// ordered execution queue in the [`Runtime`](super::Runtime).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host (CPU) memory
    Host,
    /// Accelerator with the given index
    Accel(u16),
}

impl Device {
    /// True for host memory
    #[inline]
    pub const fn is_host(self) -> bool {
        matches!(self, Self::Host)
    }

    /// True for accelerator memory
    #[inline]
    pub const fn is_accel(self) -> bool {
        matches!(self, Self::Accel(_))
    }

    /// Accelerator index, `None` for the host
    #[inline]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Host => None,
            Self::Accel(i) => Some(i as usize),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "cpu"),
            Self::Accel(i) => write!(f, "accel:{i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kinds() {
        assert!(Device::Host.is_host());
        assert_eq!(Device::Host.index(), None);
        assert!(Device::Accel(3).is_accel());
        assert_eq!(Device::Accel(3).index(), Some(3));
        assert_eq!(Device::Accel(1).to_string(), "accel:1");
        assert_ne!(Device::Accel(0), Device::Accel(1));
    }
}
