//! A polled guest-side driver for the UART, talking to it only through the
//! bus the way guest code would.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Context};
use emu::bus::Bus;
use emu::plic::{Plic, PLIC_HART_CLAIM};
use emu::uart::{IntrEnable, LineStatus, Serial};
use log::{debug, info, warn};

const RBR: u64 = 0;
const THR: u64 = 0;
const DLL: u64 = 0;
const IER: u64 = 1;
const DLM: u64 = 1;
const IIR: u64 = 2;
const LCR: u64 = 3;
const LSR: u64 = 5;

const LCR_8N1: u8 = 0x03;
const LCR_DLAB: u8 = 0x80;

const IIR_NO_INT: u8 = 0x01;
const IIR_ID_MASK: u8 = 0x0e;
const IIR_RDI: u8 = 0x04;

/// Polls of LSR before giving up on the transmitter.
const THRE_SPINS: usize = 1000;

pub struct Console<'a> {
    bus: &'a Bus,
    serial: Rc<RefCell<Serial>>,
    plic: Rc<RefCell<Plic>>,
    base: u64,
    plic_base: u64,
    irq: u32,
    breaks: usize,
}

impl<'a> Console<'a> {
    pub fn new(
        bus: &'a Bus,
        serial: Rc<RefCell<Serial>>,
        plic: Rc<RefCell<Plic>>,
        base: u64,
        plic_base: u64,
        irq: u32,
    ) -> Self {
        Self {
            bus,
            serial,
            plic,
            base,
            plic_base,
            irq,
            breaks: 0,
        }
    }

    pub fn breaks(&self) -> usize {
        self.breaks
    }

    fn load(&self, reg: u64) -> anyhow::Result<u8> {
        self.bus
            .load_u8(self.base + reg)
            .with_context(|| format!("uart register {reg} read"))
    }

    fn store(&self, reg: u64, val: u8) -> anyhow::Result<()> {
        self.bus
            .store_u8(self.base + reg, val)
            .with_context(|| format!("uart register {reg} write"))
    }

    /// Programs the divisor, 8N1 framing and the receive interrupt.
    pub fn init(&mut self, divisor: u16) -> anyhow::Result<()> {
        self.store(LCR, LCR_DLAB | LCR_8N1)?;
        self.store(DLL, divisor as u8)?;
        self.store(DLM, (divisor >> 8) as u8)?;
        self.store(LCR, LCR_8N1)?;
        self.store(IER, IntrEnable::RDI.bits())?;

        debug!("console: divisor latch {:#06x}", self.serial.borrow().divisor());
        Ok(())
    }

    pub fn putc(&mut self, ch: u8) -> anyhow::Result<()> {
        for _ in 0..THRE_SPINS {
            let lsr = LineStatus::from_bits_retain(self.load(LSR)?);
            if lsr.contains(LineStatus::THRE) {
                return self.store(THR, ch);
            }
        }
        bail!("transmitter never became ready");
    }

    /// Injects a break on the line and services the interrupt it raises.
    pub fn send_break(&mut self) -> anyhow::Result<()> {
        self.serial.borrow_mut().send_break();
        self.service_interrupts()
    }

    fn service_interrupts(&mut self) -> anyhow::Result<()> {
        let claim = self.plic_base + PLIC_HART_CLAIM;
        while self.plic.borrow().external_pending() {
            let src = self.bus.load_u32(claim).context("plic claim")?;
            if src == 0 {
                break;
            }

            if src == self.irq {
                self.service_uart()?;
            } else {
                warn!("console: unexpected interrupt source {src}");
            }
            self.bus.store_u32(claim, src).context("plic complete")?;
        }
        Ok(())
    }

    fn service_uart(&mut self) -> anyhow::Result<()> {
        loop {
            let iir = self.load(IIR)?;
            if iir & IIR_NO_INT != 0 {
                return Ok(());
            }

            if iir & IIR_ID_MASK != IIR_RDI {
                // only RDI is enabled
                warn!("console: unhandled uart interrupt {iir:#04x}");
                return Ok(());
            }

            let lsr = LineStatus::from_bits_retain(self.load(LSR)?);
            let ch = self.load(RBR)?;
            if lsr.contains(LineStatus::BI) {
                self.breaks += 1;
                info!("console: break on line");
            } else {
                debug!("console: received {ch:#04x}");
            }
        }
    }
}
