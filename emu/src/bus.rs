//! Physical memory map: address ranges bound to devices.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

pub use crate::error::BusError;

/// A device that can sit on the bus.
///
/// Offsets are relative to the base of the device's region. Widths a device
/// does not override read as 0 and drop writes.
pub trait Device {
    fn load_u8(&mut self, offset: u64) -> Result<u8, BusError> {
        trace!("unsupported 8-bit load at offset {offset:#x}");
        Ok(0)
    }

    fn load_u16(&mut self, offset: u64) -> Result<u16, BusError> {
        trace!("unsupported 16-bit load at offset {offset:#x}");
        Ok(0)
    }

    fn load_u32(&mut self, offset: u64) -> Result<u32, BusError> {
        trace!("unsupported 32-bit load at offset {offset:#x}");
        Ok(0)
    }

    fn load_u64(&mut self, offset: u64) -> Result<u64, BusError> {
        trace!("unsupported 64-bit load at offset {offset:#x}");
        Ok(0)
    }

    fn store_u8(&mut self, offset: u64, _val: u8) -> Result<(), BusError> {
        trace!("unsupported 8-bit store at offset {offset:#x}");
        Ok(())
    }

    fn store_u16(&mut self, offset: u64, _val: u16) -> Result<(), BusError> {
        trace!("unsupported 16-bit store at offset {offset:#x}");
        Ok(())
    }

    fn store_u32(&mut self, offset: u64, _val: u32) -> Result<(), BusError> {
        trace!("unsupported 32-bit store at offset {offset:#x}");
        Ok(())
    }

    fn store_u64(&mut self, offset: u64, _val: u64) -> Result<(), BusError> {
        trace!("unsupported 64-bit store at offset {offset:#x}");
        Ok(())
    }
}

struct Region {
    base: u64,
    end: u64,
    dev: Rc<RefCell<dyn Device>>,
}

#[derive(Default)]
pub struct Bus {
    regions: Vec<Region>,
}

impl Bus {
    pub fn new() -> Self {
        Self { regions: Vec::new() }
    }

    /// Reserves `[base, base + len)` for `dev`.
    pub fn register(
        &mut self,
        base: u64,
        len: u64,
        dev: Rc<RefCell<dyn Device>>,
    ) -> Result<(), BusError> {
        if len == 0 {
            return Err(BusError::EmptyRegion(base));
        }
        let end = base.checked_add(len).ok_or(BusError::Wraps { base, len })?;
        if self.regions.iter().any(|r| base < r.end && r.base < end) {
            return Err(BusError::Overlap { base, end });
        }

        trace!("mapped region {base:#x}..{end:#x}");
        self.regions.push(Region { base, end, dev });
        Ok(())
    }

    fn find(&self, addr: u64, size: u64) -> Result<&Region, BusError> {
        let last = addr.checked_add(size).ok_or(BusError::Unmapped(addr))?;
        self.regions
            .iter()
            .find(|r| r.base <= addr && last <= r.end)
            .ok_or(BusError::Unmapped(addr))
    }
}

macro_rules! gen {
    ($l: tt $s: tt $t: tt $sz: tt) => {
        impl Bus {
            pub fn $l(&self, addr: u64) -> Result<$t, BusError> {
                let r = self.find(addr, $sz)?;
                r.dev.borrow_mut().$l(addr - r.base)
            }

            pub fn $s(&self, addr: u64, val: $t) -> Result<(), BusError> {
                let r = self.find(addr, $sz)?;
                r.dev.borrow_mut().$s(addr - r.base, val)
            }
        }
    };
}

gen!(load_u8 store_u8 u8 1);
gen!(load_u16 store_u16 u16 2);
gen!(load_u32 store_u32 u32 4);
gen!(load_u64 store_u64 u64 8);
