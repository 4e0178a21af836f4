//! Readiness event masks

use bitflags::bitflags;

/// Raw file descriptor number as seen by readiness sources
pub type Fd = i32;

bitflags! {
    /// Events a task can wait for on a descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Events: u8 {
        /// Readable
        const IN = 0x1;
        /// Exceptional condition
        const ERR = 0x2;
        /// Writable
        const OUT = 0x4;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Events {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Events({=u8:#x})", self.bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(Events::IN.bits(), 0x1);
        assert_eq!(Events::ERR.bits(), 0x2);
        assert_eq!(Events::OUT.bits(), 0x4);
        assert!(Events::empty().is_empty());
    }
}
