//! Seek epochs
//!
//! Every schedule, seek and stop replaces the live epoch. A hardware
//! completion carries the epoch of the segment it belongs to and is acted on
//! only if that epoch is still live. Epochs compare by identity only; they
//! have no ordering.

/// Opaque token for one scheduling operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeekEpoch(u64);

/// Source of fresh epochs
#[derive(Debug, Default)]
pub struct EpochSource {
    issued: u64,
}

impl EpochSource {
    /// Create a source
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an epoch distinct from every earlier one
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> SeekEpoch {
        self.issued = self.issued.wrapping_add(1);
        SeekEpoch(self.issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_epochs_are_distinct() {
        let mut source = EpochSource::new();
        let a = source.next();
        let b = source.next();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
