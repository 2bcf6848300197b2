//! Keyboard LED state reported by the host through the receiver.

/// Lock-key LEDs as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LedState(u8);

impl LedState {
    pub const NUM_LOCK: u8 = 0x01;
    pub const CAPS_LOCK: u8 = 0x02;
    pub const SCROLL_LOCK: u8 = 0x04;

    /// Builds a state from raw bits; bits above ScrollLock are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::NUM_LOCK | Self::CAPS_LOCK | Self::SCROLL_LOCK))
    }

    /// Parses an LED characteristic notification (first byte is the bitmask).
    pub fn from_notification(value: &[u8]) -> Option<Self> {
        value.first().map(|&b| Self::from_bits(b))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn num_lock(self) -> bool {
        self.0 & Self::NUM_LOCK != 0
    }

    pub fn caps_lock(self) -> bool {
        self.0 & Self::CAPS_LOCK != 0
    }

    pub fn scroll_lock(self) -> bool {
        self.0 & Self::SCROLL_LOCK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_sets_individual_locks() {
        // Arrange / Act
        let leds = LedState::from_notification(&[0x03]).unwrap();

        // Assert
        assert!(leds.num_lock());
        assert!(leds.caps_lock());
        assert!(!leds.scroll_lock());
    }

    #[test]
    fn test_unknown_bits_are_masked_off() {
        assert_eq!(LedState::from_bits(0xFC).bits(), LedState::SCROLL_LOCK);
    }

    #[test]
    fn test_empty_notification_is_ignored() {
        assert_eq!(LedState::from_notification(&[]), None);
    }
}
