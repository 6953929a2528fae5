//! Platform-level interrupt controller, reduced to what a single hart with
//! one context needs: a pending bitmap and claim/complete.

use log::{debug, warn};

use crate::bus::*;
use crate::irq::IrqController;

pub const PLIC_SIZE: u64 = 0x40_0000;
pub const PLIC_NUM_SOURCES: u32 = 32;

pub const PLIC_PENDING: u64 = 0x1000;
pub const PLIC_HART_THRESHOLD: u64 = 0x20_0000;
pub const PLIC_HART_CLAIM: u64 = 0x20_0004;

#[derive(Default)]
pub struct Plic {
    pending: u32,
    served: u32,
}

impl Plic {
    pub fn new() -> Self {
        Self {
            pending: 0,
            served: 0,
        }
    }

    /// Whether the hart would see its external interrupt bit set.
    pub fn external_pending(&self) -> bool {
        self.pending & !self.served != 0
    }

    fn claim(&mut self) -> u32 {
        let mask = self.pending & !self.served;
        if mask == 0 {
            return 0;
        }

        let i = mask.trailing_zeros();
        self.served |= 1 << i;
        debug!("plic: claimed source {}", i + 1);
        i + 1
    }

    fn complete(&mut self, irq: u32) {
        match irq.checked_sub(1) {
            Some(i) if i < PLIC_NUM_SOURCES => {
                self.served &= !(1 << i);
                debug!("plic: completed source {irq}");
            }
            _ => warn!("plic: completion for invalid source {irq}"),
        }
    }
}

impl IrqController for Plic {
    fn set_irq(&mut self, irq: u32, level: bool) {
        let Some(i) = irq.checked_sub(1).filter(|i| *i < PLIC_NUM_SOURCES) else {
            warn!("plic: ignoring level change on invalid source {irq}");
            return;
        };

        if level {
            self.pending |= 1 << i;
        } else {
            self.pending &= !(1 << i);
        }
    }
}

impl Device for Plic {
    fn load_u32(&mut self, offset: u64) -> Result<u32, BusError> {
        Ok(match offset {
            PLIC_PENDING => self.pending,
            PLIC_HART_CLAIM => self.claim(),
            _ => 0,
        })
    }

    fn store_u32(&mut self, offset: u64, val: u32) -> Result<(), BusError> {
        // threshold and everything else is write-ignored
        if offset == PLIC_HART_CLAIM {
            self.complete(val);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_lowest_then_complete() {
        let mut plic = Plic::new();
        plic.set_irq(5, true);
        plic.set_irq(2, true);
        assert!(plic.external_pending());
        assert_eq!(plic.load_u32(PLIC_PENDING).unwrap(), 0b1_0010);

        assert_eq!(plic.load_u32(PLIC_HART_CLAIM).unwrap(), 2);
        assert_eq!(plic.load_u32(PLIC_HART_CLAIM).unwrap(), 5);
        assert_eq!(plic.load_u32(PLIC_HART_CLAIM).unwrap(), 0);
        assert!(!plic.external_pending());

        plic.store_u32(PLIC_HART_CLAIM, 2).unwrap();
        assert!(plic.external_pending());
        assert_eq!(plic.load_u32(PLIC_HART_CLAIM).unwrap(), 2);
    }

    #[test]
    fn lowering_a_line_clears_pending() {
        let mut plic = Plic::new();
        plic.set_irq(10, true);
        plic.set_irq(10, true);
        assert_eq!(plic.load_u32(PLIC_PENDING).unwrap(), 1 << 9);

        plic.set_irq(10, false);
        plic.set_irq(10, false);
        assert_eq!(plic.load_u32(PLIC_PENDING).unwrap(), 0);
        assert!(!plic.external_pending());
    }

    #[test]
    fn invalid_sources_are_ignored() {
        let mut plic = Plic::new();
        plic.set_irq(0, true);
        plic.set_irq(33, true);
        plic.store_u32(PLIC_HART_CLAIM, 0).unwrap();
        plic.store_u32(PLIC_HART_CLAIM, 40).unwrap();

        assert_eq!(plic.load_u32(PLIC_PENDING).unwrap(), 0);
        assert_eq!(plic.load_u32(PLIC_HART_THRESHOLD).unwrap(), 0);
    }
}
