//! TCP client for the report collector
//!
//! Every wait on the asynchronous socket is bounded by `config::TCP_TIMEOUT_MS`,
//! so a dead collector can never stall the reporter task.

use crate::report::{self, ReportTarget};
use crate::{BoardError, config, println};
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, IpEndpoint, Stack};
use embassy_time::{Duration, with_timeout};

/// How a send finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// All bytes written and acknowledged
    Delivered,
    /// The collector closed the connection; the report is considered handled
    PeerClosed,
}

/// One reusable connection to the collector
pub struct TcpLink<'a> {
    socket: TcpSocket<'a>,
    target: ReportTarget,
    timeout: Duration,
    connected: bool,
}

impl<'a> TcpLink<'a> {
    pub fn new(
        stack: Stack<'a>,
        target: ReportTarget,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_millis(config::TCP_TIMEOUT_MS)));
        Self {
            socket,
            target,
            timeout: Duration::from_millis(config::TCP_TIMEOUT_MS),
            connected: false,
        }
    }

    fn endpoint(&self) -> IpEndpoint {
        let ip = self.target.ip;
        IpEndpoint::new(IpAddress::v4(ip[0], ip[1], ip[2], ip[3]), self.target.port)
    }

    /// Drops any previous session and connects to the collector
    pub async fn open(&mut self) -> Result<(), BoardError> {
        self.abort();

        let ip = self.target.ip;
        println!(
            "[TCP] Connecting to {}.{}.{}.{}:{}",
            ip[0], ip[1], ip[2], ip[3], self.target.port
        );

        let endpoint = self.endpoint();
        match with_timeout(self.timeout, self.socket.connect(endpoint)).await {
            Ok(Ok(())) => {
                self.connected = true;
                println!("[TCP] Connected");
                Ok(())
            }
            Ok(Err(e)) => {
                println!("[TCP] Connect failed: {:?}", e);
                self.socket.abort();
                Err(BoardError::TcpError)
            }
            Err(_) => {
                println!("[TCP] Connect timed out after {} ms", config::TCP_TIMEOUT_MS);
                self.socket.abort();
                Err(BoardError::Timeout)
            }
        }
    }

    /// Writes the whole message and waits until it is acknowledged
    pub async fn send(&mut self, message: &[u8]) -> Result<SendOutcome, BoardError> {
        if !self.connected {
            return Err(BoardError::TcpError);
        }

        let preview = report::preview(
            core::str::from_utf8(message).unwrap_or("<binary>"),
            report::PREVIEW_CHARS,
        );
        println!("[TCP] Sending {} bytes: {}", message.len(), preview);

        match with_timeout(self.timeout, write_all(&mut self.socket, message)).await {
            Ok(Ok(())) => Ok(SendOutcome::Delivered),
            Ok(Err(e)) => {
                if self.peer_closed() {
                    println!("[TCP] Collector closed the connection");
                    self.connected = false;
                    Ok(SendOutcome::PeerClosed)
                } else {
                    println!("[TCP] Send failed: {:?}", e);
                    Err(BoardError::TcpError)
                }
            }
            Err(_) => {
                println!("[TCP] Send timed out after {} ms", config::TCP_TIMEOUT_MS);
                Err(BoardError::Timeout)
            }
        }
    }

    /// Reads whatever the collector sent without waiting for more
    pub async fn drain(&mut self) -> usize {
        let mut buf = [0u8; config::TCP_RX_BUFFER_SIZE];
        let mut total = 0;

        while self.socket.can_recv() && total < buf.len() {
            match self.socket.read(&mut buf[total..]).await {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(_) => break,
            }
        }

        if total > 0 {
            match core::str::from_utf8(&buf[..total]) {
                Ok(text) => println!("[TCP] Received: {}", text.trim_end()),
                Err(_) => println!("[TCP] Received {} bytes", total),
            }
        }
        total
    }

    /// True once the collector sent FIN or reset the connection
    pub fn peer_closed(&self) -> bool {
        self.connected && !self.socket.may_recv()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Graceful close, waits at most for the timeout for the FIN to go out
    pub async fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.socket.close();
        if with_timeout(self.timeout, self.socket.flush()).await.is_err() {
            println!("[TCP] Close timed out, aborting");
        }
        // the next open() must start from a closed socket
        self.socket.abort();
        self.connected = false;
    }

    pub fn abort(&mut self) {
        self.socket.abort();
        self.connected = false;
    }
}

async fn write_all(socket: &mut TcpSocket<'_>, mut data: &[u8]) -> Result<(), embassy_net::tcp::Error> {
    while !data.is_empty() {
        let n = socket.write(data).await?;
        if n == 0 {
            return Err(embassy_net::tcp::Error::ConnectionReset);
        }
        data = &data[n..];
    }
    socket.flush().await
}
