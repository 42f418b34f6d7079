//! Scripted bus and delay for driver tests.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::ErrorKind;

use super::RegisterBus;

/// One expected bus transaction.
#[derive(Debug)]
pub enum Op {
    /// Expect exactly these bytes to be written.
    Write(Vec<u8>),
    /// Answer a read with these bytes, which may be fewer than requested.
    Read(Vec<u8>),
    WriteFail,
    ReadFail,
}

impl Op {
    pub fn write<const N: usize>(bytes: [u8; N]) -> Self {
        Self::Write(bytes.to_vec())
    }

    pub fn read<const N: usize>(bytes: [u8; N]) -> Self {
        Self::Read(bytes.to_vec())
    }
}

/// Bus that replays a fixed script and panics on anything unexpected.
pub struct ScriptedBus {
    script: VecDeque<Op>,
}

impl ScriptedBus {
    pub fn new(script: impl IntoIterator<Item = Op>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Assert that every scripted transaction happened.
    pub fn done(&self) {
        assert!(self.script.is_empty(), "unconsumed bus script: {:02x?}", self.script);
    }
}

impl RegisterBus for ScriptedBus {
    type Error = ErrorKind;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        match self.script.pop_front() {
            Some(Op::Write(expected)) => {
                assert_eq!(bytes, expected.as_slice(), "unexpected write");
                Ok(())
            }
            Some(Op::WriteFail) => Err(ErrorKind::Other),
            other => panic!("write {bytes:02x?} but script expected {other:02x?}"),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.script.pop_front() {
            Some(Op::Read(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Op::ReadFail) => Err(ErrorKind::Other),
            other => panic!("read of {} bytes but script expected {other:02x?}", buf.len()),
        }
    }
}

/// Delay that returns immediately and remembers how long it was asked to wait.
#[derive(Default)]
pub struct NoopDelay {
    total_ns: u64,
}

impl NoopDelay {
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
