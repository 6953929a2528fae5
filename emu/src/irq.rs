//! Interrupt lines from devices to an interrupt controller.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

/// Receiver side of interrupt lines. Setting a line to the level it already
/// has must be a no-op.
pub trait IrqController {
    fn set_irq(&mut self, irq: u32, level: bool);
}

/// One interrupt line, owned by the device that drives it.
#[derive(Clone)]
pub struct IrqSignal {
    controller: Rc<RefCell<dyn IrqController>>,
    irq: u32,
}

impl IrqSignal {
    pub fn new(controller: Rc<RefCell<dyn IrqController>>, irq: u32) -> Self {
        Self { controller, irq }
    }

    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn set(&self, level: bool) {
        trace!("irq {} <- {}", self.irq, level as u8);
        self.controller.borrow_mut().set_irq(self.irq, level);
    }
}
