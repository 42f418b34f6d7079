//! Client/daemon wire protocol
//!
//! One request per connection: the client sends a single command byte. For
//! [`Command::Get`] the daemon answers with the fixed 56-byte snapshot and
//! closes the connection; [`Command::Exit`] gets no answer.

use std::io::{self, Read, Write};

use cjmcu_core::{SNAPSHOT_LEN, Snapshot};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop the daemon
    Exit,
    /// Return the current snapshot
    Get,
}

impl Command {
    pub const fn code(self) -> u8 {
        match self {
            Self::Exit => 0,
            Self::Get => 1,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = AppError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Exit),
            1 => Ok(Self::Get),
            other => Err(AppError::Protocol(format!("unknown command {other}"))),
        }
    }
}

fn eof_as_protocol(what: &'static str) -> impl FnOnce(io::Error) -> AppError {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => AppError::Protocol(format!("connection closed before {what}")),
        _ => AppError::Socket(e),
    }
}

pub fn read_command<R: Read>(reader: &mut R) -> Result<Command, AppError> {
    let mut code = [0u8; 1];
    reader
        .read_exact(&mut code)
        .map_err(eof_as_protocol("the command byte"))?;
    Command::try_from(code[0])
}

pub fn write_command<W: Write>(writer: &mut W, command: Command) -> Result<(), AppError> {
    writer.write_all(&[command.code()])?;
    writer.flush()?;
    Ok(())
}

pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<Snapshot, AppError> {
    let mut bytes = [0u8; SNAPSHOT_LEN];
    reader
        .read_exact(&mut bytes)
        .map_err(eof_as_protocol("the full snapshot"))?;
    Ok(Snapshot::from_bytes(&bytes))
}

pub fn write_snapshot<W: Write>(writer: &mut W, snapshot: &Snapshot) -> Result<(), AppError> {
    writer.write_all(&snapshot.to_bytes())?;
    writer.flush()?;
    Ok(())
}
