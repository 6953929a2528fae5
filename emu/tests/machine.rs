use std::cell::RefCell;
use std::rc::Rc;

use emu::bus::Bus;
use emu::irq::IrqSignal;
use emu::plic::{Plic, PLIC_HART_CLAIM, PLIC_PENDING, PLIC_SIZE};
use emu::ram::Ram;
use emu::uart::Serial;

const RAM_BASE: u64 = 0x8000_0000;
const PLIC_BASE: u64 = 0x0c00_0000;
const UART_BASE: u64 = 0x1000_0000;
const UART_IRQ: u32 = 10;

struct Machine {
    bus: Bus,
    serial: Rc<RefCell<Serial>>,
    plic: Rc<RefCell<Plic>>,
    out: Rc<RefCell<Vec<u8>>>,
}

fn machine() -> Machine {
    let mut bus = Bus::new();
    bus.register(RAM_BASE, 0x1000, Rc::new(RefCell::new(Ram::new(0x1000))))
        .unwrap();

    let plic = Rc::new(RefCell::new(Plic::new()));
    bus.register(PLIC_BASE, PLIC_SIZE, plic.clone()).unwrap();

    let out = Rc::new(RefCell::new(Vec::new()));
    let sink = out.clone();
    let serial = Serial::create(
        &mut bus,
        UART_BASE,
        IrqSignal::new(plic.clone(), UART_IRQ),
        move |buf: &[u8]| sink.borrow_mut().extend_from_slice(buf),
    )
    .unwrap();

    Machine { bus, serial, plic, out }
}

#[test]
fn guest_copies_ram_to_uart() {
    let m = machine();
    for (i, b) in b"boot ok\n".iter().enumerate() {
        m.bus.store_u8(RAM_BASE + i as u64, *b).unwrap();
    }

    for i in 0..8 {
        let b = m.bus.load_u8(RAM_BASE + i).unwrap();
        assert_ne!(m.bus.load_u8(UART_BASE + 5).unwrap() & 0x20, 0);
        m.bus.store_u8(UART_BASE, b).unwrap();
    }

    assert_eq!(*m.out.borrow(), b"boot ok\n");
}

#[test]
fn break_interrupt_round_trip() {
    let m = machine();
    m.bus.store_u8(UART_BASE + 1, 0x01).unwrap();
    assert!(!m.plic.borrow().external_pending());

    m.serial.borrow_mut().send_break();
    assert!(m.plic.borrow().external_pending());
    assert_eq!(m.bus.load_u32(PLIC_BASE + PLIC_PENDING).unwrap(), 1 << (UART_IRQ - 1));

    assert_eq!(m.bus.load_u32(PLIC_BASE + PLIC_HART_CLAIM).unwrap(), UART_IRQ);
    assert_eq!(m.bus.load_u8(UART_BASE + 2).unwrap(), 0x04);
    assert_eq!(m.bus.load_u8(UART_BASE + 5).unwrap() & 0x11, 0x11);
    assert_eq!(m.bus.load_u8(UART_BASE).unwrap(), 0);
    m.bus.store_u32(PLIC_BASE + PLIC_HART_CLAIM, UART_IRQ).unwrap();

    assert_eq!(m.bus.load_u32(PLIC_BASE + PLIC_PENDING).unwrap(), 0);
    assert!(!m.plic.borrow().external_pending());
    assert_eq!(m.bus.load_u8(UART_BASE + 2).unwrap(), 0x01);
}

#[test]
fn thre_interrupt_follows_enable() {
    let m = machine();
    m.bus.store_u8(UART_BASE + 1, 0x02).unwrap();
    assert!(m.plic.borrow().external_pending());

    m.bus.store_u8(UART_BASE, b'!').unwrap();
    assert!(m.plic.borrow().external_pending());

    m.bus.store_u8(UART_BASE + 1, 0x00).unwrap();
    assert!(!m.plic.borrow().external_pending());
    assert_eq!(*m.out.borrow(), b"!");
}

#[test]
fn uart_window_cannot_be_double_mapped() {
    let mut m = machine();
    let again = Serial::create(
        &mut m.bus,
        UART_BASE + 4,
        IrqSignal::new(m.plic.clone(), UART_IRQ),
        |_: &[u8]| {},
    );
    assert!(again.is_err());
}
