//! Scripted serial port and in-memory settings store for exercising the
//! reader, session, and event loop without hardware.

use std::collections::HashMap;

use embedded_io_async::{Error, ErrorKind, ErrorType, Read, Write};

use crate::settings::SettingsStore;

/// Plain map-backed [`SettingsStore`].
#[derive(Default)]
pub struct MemoryStore {
    floats: HashMap<std::string::String, f32>,
    bools: HashMap<std::string::String, bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get_f32(&self, key: &str) -> Option<f32> {
        self.floats.get(key).copied()
    }

    fn put_f32(&mut self, key: &str, value: f32) {
        self.floats.insert(key.into(), value);
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.bools.get(key).copied()
    }

    fn put_bool(&mut self, key: &str, value: bool) {
        self.bools.insert(key.into(), value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptError;

impl core::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ScriptError")
    }
}

impl core::error::Error for ScriptError {}

impl Error for ScriptError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Replays a canned byte script in fixed-size chunks and records everything
/// written back. When the script runs out it either reports end-of-stream
/// (the default, seen by callers as a disconnect) or parks the reader
/// forever so timeout paths can fire.
pub struct ScriptedPort {
    input: std::vec::Vec<u8>,
    pos: usize,
    chunk: usize,
    pub pend_when_empty: bool,
    pub written: std::vec::Vec<u8>,
}

impl ScriptedPort {
    pub fn new(input: std::vec::Vec<u8>, chunk: usize) -> Self {
        Self {
            input,
            pos: 0,
            chunk,
            pend_when_empty: false,
            written: std::vec::Vec::new(),
        }
    }

    pub fn pending_after_script(input: std::vec::Vec<u8>, chunk: usize) -> Self {
        let mut port = Self::new(input, chunk);
        port.pend_when_empty = true;
        port
    }
}

impl ErrorType for ScriptedPort {
    type Error = ScriptError;
}

impl Read for ScriptedPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.pos >= self.input.len() {
            if self.pend_when_empty {
                return core::future::pending().await;
            }
            return Ok(0);
        }
        let len = self
            .chunk
            .min(buf.len())
            .min(self.input.len() - self.pos);
        buf[..len].copy_from_slice(&self.input[self.pos..self.pos + len]);
        self.pos += len;
        Ok(len)
    }
}

impl Write for ScriptedPort {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
