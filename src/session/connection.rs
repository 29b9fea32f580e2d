//! Blocking TCP connection carrying LDDS frames

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use super::ConnectionError;
use crate::protocol::{self, Frame, read_frame};

/// One open socket to a relay server
#[derive(Debug)]
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Connect to `host:port`, trying each resolved address in turn.
    pub fn open(host: &str, port: u16, connect_timeout: Duration) -> Result<Self, ConnectionError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| ConnectionError::Resolve {
                host: host.to_string(),
                port,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            debug!(%addr, "connecting");
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => return Self::from_stream(stream, addr, host, port),
                Err(err) => last_err = Some(err),
            }
        }

        Err(match last_err {
            Some(source) => ConnectionError::Unreachable {
                host: host.to_string(),
                port,
                source,
            },
            None => ConnectionError::Resolve {
                host: host.to_string(),
                port,
            },
        })
    }

    fn from_stream(
        stream: TcpStream,
        peer: SocketAddr,
        host: &str,
        port: u16,
    ) -> Result<Self, ConnectionError> {
        let unreachable = |source| ConnectionError::Unreachable {
            host: host.to_string(),
            port,
            source,
        };
        stream.set_nodelay(true).map_err(unreachable)?;
        let writer = stream.try_clone().map_err(unreachable)?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            peer,
        })
    }

    /// Remote address
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Set the read timeout; `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> protocol::Result<()> {
        self.writer.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Write one frame
    pub fn send(&mut self, frame: &Frame) -> protocol::Result<()> {
        let bytes = frame.encode()?;
        trace!(id = %frame.id(), len = frame.body().len(), "send");
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read one frame
    pub fn recv(&mut self) -> protocol::Result<Frame> {
        let frame = read_frame(&mut self.reader)?;
        trace!(id = %frame.id(), len = frame.body().len(), "recv");
        Ok(frame)
    }

    /// Send a request and read the reply
    pub fn request(&mut self, frame: &Frame) -> protocol::Result<Frame> {
        self.send(frame)?;
        self.recv()
    }

    /// Shut down both directions; errors are ignored.
    pub fn shutdown(&self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
