//! Single-instance hand-off over a loopback socket.
//!
//! The first process binds the port and polls it from its event loop. Later
//! invocations find the port taken, send their phone number as one line and
//! exit.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Longest accepted message, newline included.
const MAX_LINE: u64 = 256;

pub enum Instance {
    Primary(Listener),
    /// Another instance owns the port; our number (if any) went to it.
    Forwarded,
}

pub struct Listener {
    inner: TcpListener,
}

pub fn claim(port: u16, phone: Option<&str>) -> Result<Instance> {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
        Ok(inner) => {
            inner
                .set_nonblocking(true)
                .context("setting IPC listener non-blocking")?;
            tracing::debug!(port, "listening for forwarded lookups");
            Ok(Instance::Primary(Listener { inner }))
        }
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            if let Some(phone) = phone {
                send(port, phone)?;
                tracing::info!(port, "forwarded lookup to running instance");
            }
            Ok(Instance::Forwarded)
        }
        Err(e) => Err(e).with_context(|| format!("binding IPC port {}", port)),
    }
}

pub fn send(port: u16, phone: &str) -> Result<()> {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))
        .with_context(|| format!("connecting to running instance on port {}", port))?;
    writeln!(stream, "{}", phone.trim()).context("sending phone number")?;
    Ok(())
}

impl Listener {
    #[cfg(test)]
    pub fn port(&self) -> Result<u16> {
        Ok(self.inner.local_addr()?.port())
    }

    /// Numbers received since the last poll. Never blocks on accept.
    pub fn poll(&self) -> Vec<String> {
        let mut numbers = Vec::new();
        loop {
            match self.inner.accept() {
                Ok((stream, _)) => match read_line(stream) {
                    Ok(Some(line)) => numbers.push(line),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "dropping malformed IPC message"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "IPC accept failed");
                    break;
                }
            }
        }
        numbers
    }
}

fn read_line(stream: TcpStream) -> std::io::Result<Option<String>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut line = String::new();
    BufReader::new(stream.take(MAX_LINE)).read_line(&mut line)?;
    if line.len() as u64 == MAX_LINE && !line.ends_with('\n') {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("message longer than {} bytes", MAX_LINE),
        ));
    }
    let line = line.trim();
    Ok(if line.is_empty() { None } else { Some(line.to_string()) })
}
