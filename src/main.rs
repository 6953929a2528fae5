use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::*;
use emu::bus::Bus;
use emu::irq::IrqSignal;
use emu::plic::{Plic, PLIC_SIZE};
use emu::sink::{SerialSink, WriteSink};
use emu::uart::Serial;

mod console;

const PLIC_BASE: u64 = 0x0c00_0000;

fn parse_addr(s: &str) -> Result<u64, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

/// Drive an emulated 16450 UART from stdin like a guest driver would.
#[derive(Parser)]
struct Args {
    /// Base address of the UART register window
    #[arg(long, default_value = "0x10000000", value_parser = parse_addr)]
    base: u64,

    /// Interrupt controller source the UART is wired to
    #[arg(long, default_value_t = 10)]
    irq: u32,

    /// Baud rate divisor programmed before transmitting
    #[arg(long, default_value_t = 1)]
    divisor: u16,

    /// Input byte that injects a line break instead of being transmitted
    #[arg(long, default_value_t = 0)]
    break_byte: u8,

    /// Write transmitted bytes here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut sink: Box<dyn SerialSink> = match &args.output {
        Some(path) => Box::new(WriteSink::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(WriteSink::new(io::stdout())),
    };

    let mut bus = Bus::new();
    let plic = Rc::new(RefCell::new(Plic::new()));
    bus.register(PLIC_BASE, PLIC_SIZE, plic.clone())
        .context("mapping interrupt controller")?;

    let irq = IrqSignal::new(plic.clone(), args.irq);
    let serial = Serial::create(&mut bus, args.base, irq, move |buf: &[u8]| {
        sink.write_bytes(buf)
    })
    .with_context(|| format!("mapping uart at {:#x}", args.base))?;

    let mut console = console::Console::new(&bus, serial, plic, args.base, PLIC_BASE, args.irq);
    console.init(args.divisor)?;

    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input).context("reading stdin")?;

    for byte in input {
        if byte == args.break_byte {
            console.send_break()?;
        } else {
            console.putc(byte)?;
        }
    }

    log::info!("{} break(s) serviced", console.breaks());
    Ok(())
}
