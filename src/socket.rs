//! embassy-net TCP socket behind the embedded-io-async traits
//!
//! embedded-tls and the HTTP exchange both drive the connection through
//! `embedded_io_async::{Read, Write}`, so plain and TLS requests share one
//! code path.

use core::fmt;

use embassy_net::tcp::{self, ConnectError, TcpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Duration;
use embedded_io::ErrorKind;
use embedded_io_async::{ErrorType, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketError(pub tcp::Error);

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl core::error::Error for SocketError {}

impl embedded_io::Error for SocketError {
    fn kind(&self) -> ErrorKind {
        // Reset is the only failure a connected socket reports
        ErrorKind::ConnectionReset
    }
}

pub struct AsyncTcpSocket<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> AsyncTcpSocket<'a> {
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8]) -> Self {
        Self {
            socket: TcpSocket::new(stack, rx_buffer, tx_buffer),
        }
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.socket.set_timeout(timeout);
    }

    pub async fn connect<T>(&mut self, endpoint: T) -> Result<(), ConnectError>
    where
        T: Into<IpEndpoint>,
    {
        self.socket.connect(endpoint).await
    }

    pub fn close(&mut self) {
        self.socket.close();
    }
}

impl ErrorType for AsyncTcpSocket<'_> {
    type Error = SocketError;
}

impl Read for AsyncTcpSocket<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(SocketError)
    }
}

impl Write for AsyncTcpSocket<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(SocketError)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await.map_err(SocketError)
    }
}
