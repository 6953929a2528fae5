//! 16450 UART chip emulation
//!
//! Characters move one at a time. A store to THR hands the byte to the sink
//! before the store returns, so the transmitter is never seen busy. The only
//! receive path is an injected line break. FCR is accepted but there is no
//! FIFO behind it.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, trace};

use crate::bus::*;
use crate::irq::IrqSignal;
use crate::sink::SerialSink;

/// Size of the register window.
pub const SERIAL_WINDOW: u64 = 8;

bitflags! {
    /// Interrupt Enable Register (IER)
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct IntrEnable: u8 {
        /// Received data available
        const RDI = 1 << 0;
        /// Transmit holding register empty
        const THRI = 1 << 1;
    }

    /// Line Status Register (LSR)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineStatus: u8 {
        /// Data ready
        const DR = 1 << 0;
        /// Break interrupt
        const BI = 1 << 4;
        /// Transmit holding register empty
        const THRE = 1 << 5;
        /// Transmitter empty
        const TEMT = 1 << 6;
    }

    /// Line Control Register (LCR)
    ///
    /// Word length, stop bits and parity are stored but have no effect.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct LineCtrl: u8 {
        /// Divisor latch access bit
        const DLAB = 1 << 7;
    }

    /// FIFO Control Register (FCR)
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct FifoCtrl: u8 {
        /// FIFO enable
        const FE = 1 << 0;
    }
}

impl Default for LineStatus {
    fn default() -> Self {
        LineStatus::THRE | LineStatus::TEMT
    }
}

/// Set in IIR reads while FCR has the FIFO enable bit.
pub const IIR_FIFO_ENABLED: u8 = 0xc0;

/// Highest priority interrupt cause, as reported in IIR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrIdent {
    None,
    ThrEmpty,
    RecvData,
}

impl IntrIdent {
    pub fn bits(self) -> u8 {
        match self {
            IntrIdent::None => 0x01,
            IntrIdent::ThrEmpty => 0x02,
            IntrIdent::RecvData => 0x04,
        }
    }

    pub fn is_pending(self) -> bool {
        self != IntrIdent::None
    }

    /// Received data outranks an empty transmit holding register.
    pub fn arbitrate(lsr: LineStatus, ier: IntrEnable) -> Self {
        if lsr.contains(LineStatus::DR) && ier.contains(IntrEnable::RDI) {
            IntrIdent::RecvData
        } else if lsr.contains(LineStatus::THRE) && ier.contains(IntrEnable::THRI) {
            IntrIdent::ThrEmpty
        } else {
            IntrIdent::None
        }
    }
}

/// What offsets 0 and 1 address, selected by DLAB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Data,
    DivisorLatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Register {
    DivisorLow,
    DivisorHigh,
    RecvBuffer,
    TransmitHold,
    IntrEnable,
    IntrIdent,
    FifoCtrl,
    LineCtrl,
    ModemCtrl,
    LineStatus,
    ModemStatus,
    Scratch,
}

impl Register {
    fn for_read(offset: u64, mode: AddressMode) -> Self {
        match (offset & 7, mode) {
            (0, AddressMode::DivisorLatch) => Register::DivisorLow,
            (0, AddressMode::Data) => Register::RecvBuffer,
            (1, AddressMode::DivisorLatch) => Register::DivisorHigh,
            (1, AddressMode::Data) => Register::IntrEnable,
            (2, _) => Register::IntrIdent,
            (off, _) => Register::common(off),
        }
    }

    fn for_write(offset: u64, mode: AddressMode) -> Self {
        match (offset & 7, mode) {
            (0, AddressMode::DivisorLatch) => Register::DivisorLow,
            (0, AddressMode::Data) => Register::TransmitHold,
            (1, AddressMode::DivisorLatch) => Register::DivisorHigh,
            (1, AddressMode::Data) => Register::IntrEnable,
            (2, _) => Register::FifoCtrl,
            (off, _) => Register::common(off),
        }
    }

    /// Offsets 3..=7 mean the same thing in both directions and modes.
    fn common(offset: u64) -> Self {
        match offset {
            3 => Register::LineCtrl,
            4 => Register::ModemCtrl,
            5 => Register::LineStatus,
            6 => Register::ModemStatus,
            _ => Register::Scratch,
        }
    }
}

pub struct Serial {
    divisor: u16,
    rbr: u8,
    ier: IntrEnable,
    lcr: LineCtrl,
    mcr: u8,
    lsr: LineStatus,
    msr: u8,
    scr: u8,
    fcr: FifoCtrl,

    irq: IrqSignal,
    sink: Box<dyn SerialSink>,
}

impl Serial {
    pub fn new(irq: IrqSignal, sink: impl SerialSink + 'static) -> Self {
        Self {
            divisor: 0,
            rbr: 0,
            ier: IntrEnable::empty(),
            lcr: LineCtrl::empty(),
            mcr: 0,
            lsr: LineStatus::default(),
            msr: 0,
            scr: 0,
            fcr: FifoCtrl::empty(),

            irq,
            sink: Box::new(sink),
        }
    }

    /// Creates a UART and maps its register window at `base`.
    ///
    /// The returned handle stays valid for [`Serial::send_break`] while the
    /// bus routes guest accesses to the same device.
    pub fn create(
        bus: &mut Bus,
        base: u64,
        irq: IrqSignal,
        sink: impl SerialSink + 'static,
    ) -> Result<Rc<RefCell<Serial>>, BusError> {
        let serial = Rc::new(RefCell::new(Serial::new(irq, sink)));
        bus.register(base, SERIAL_WINDOW, serial.clone())?;
        debug!("uart: mapped at {base:#x}");
        Ok(serial)
    }

    pub fn address_mode(&self) -> AddressMode {
        if self.lcr.contains(LineCtrl::DLAB) {
            AddressMode::DivisorLatch
        } else {
            AddressMode::Data
        }
    }

    /// IIR as the guest would read it.
    pub fn interrupt_id(&self) -> u8 {
        let iir = IntrIdent::arbitrate(self.lsr, self.ier).bits();
        if self.fcr.contains(FifoCtrl::FE) {
            iir | IIR_FIFO_ENABLED
        } else {
            iir
        }
    }

    pub fn line_status(&self) -> LineStatus {
        self.lsr
    }

    pub fn divisor(&self) -> u16 {
        self.divisor
    }

    pub fn read(&mut self, offset: u64) -> u8 {
        let reg = Register::for_read(offset, self.address_mode());
        let val = match reg {
            Register::DivisorLow => self.divisor as u8,
            Register::DivisorHigh => (self.divisor >> 8) as u8,
            Register::RecvBuffer => {
                self.lsr.remove(LineStatus::DR | LineStatus::BI);
                self.update_irq();
                self.rbr
            }
            Register::IntrEnable => self.ier.bits(),
            Register::IntrIdent => self.interrupt_id(),
            Register::LineCtrl => self.lcr.bits(),
            Register::ModemCtrl => self.mcr,
            Register::LineStatus => self.lsr.bits(),
            Register::ModemStatus => self.msr,
            Register::Scratch => self.scr,
            Register::TransmitHold | Register::FifoCtrl => {
                unreachable!("uart reg {reg:?} should not decode to be readable")
            }
        };

        trace!("uart: read {reg:?} -> {val:#04x}");
        val
    }

    pub fn write(&mut self, offset: u64, val: u8) {
        let reg = Register::for_write(offset, self.address_mode());
        trace!("uart: write {reg:?} <- {val:#04x}");

        match reg {
            Register::DivisorLow => self.divisor = (self.divisor & 0xff00) | val as u16,
            Register::DivisorHigh => self.divisor = (self.divisor & 0x00ff) | ((val as u16) << 8),
            Register::TransmitHold => self.transmit(val),
            Register::IntrEnable => {
                self.ier = IntrEnable::from_bits_retain(val);
                self.update_irq();
            }
            Register::FifoCtrl => self.fcr = FifoCtrl::from_bits_truncate(val),
            Register::LineCtrl => self.lcr = LineCtrl::from_bits_retain(val),
            Register::ModemCtrl => self.mcr = val,
            // read-only on real hardware
            Register::LineStatus => {}
            Register::ModemStatus => self.msr = val,
            Register::Scratch => self.scr = val,
            Register::RecvBuffer | Register::IntrIdent => {
                unreachable!("uart reg {reg:?} should not decode to be writable")
            }
        }
    }

    /// Signals a break from the far end: a zero byte with BI and DR set.
    pub fn send_break(&mut self) {
        debug!("uart: break received");
        self.rbr = 0;
        self.lsr.insert(LineStatus::BI | LineStatus::DR);
        self.update_irq();
    }

    fn transmit(&mut self, ch: u8) {
        self.lsr.remove(LineStatus::THRE);
        self.update_irq();

        self.sink.write_bytes(&[ch]);

        self.lsr.insert(LineStatus::THRE | LineStatus::TEMT);
        self.update_irq();
    }

    fn update_irq(&self) {
        let ident = IntrIdent::arbitrate(self.lsr, self.ier);
        trace!("uart: iir {ident:?}");
        self.irq.set(ident.is_pending());
    }
}

impl Device for Serial {
    fn load_u8(&mut self, offset: u64) -> Result<u8, BusError> {
        Ok(self.read(offset))
    }

    fn store_u8(&mut self, offset: u64, val: u8) -> Result<(), BusError> {
        self.write(offset, val);
        Ok(())
    }
}
