//! Minimal HTTP server for the web-control demo

use crate::web_control::{ControlState, MatrixCommand, Route};
use crate::{BoardError, config, println};
use core::fmt::Write;
use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use heapless::String;

const MAX_REQUEST_SIZE: usize = 1024;

pub type CommandSender = Sender<'static, CriticalSectionRawMutex, MatrixCommand, 4>;

/// Accepts one connection at a time on `config::HTTP_PORT`, forever
pub async fn serve(
    stack: Stack<'static>,
    state: &'static Mutex<CriticalSectionRawMutex, ControlState>,
    commands: CommandSender,
) -> ! {
    let mut rx_buf = [0u8; MAX_REQUEST_SIZE];
    let mut tx_buf = [0u8; MAX_REQUEST_SIZE];

    println!("[HTTP] Server starting (port={})", config::HTTP_PORT);

    loop {
        // Ensure network is configured before accepting connections.
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_secs(10)));

        match socket.accept(config::HTTP_PORT).await {
            Ok(()) => {
                if let Err(e) = handle_connection(&mut socket, state, &commands).await {
                    println!("[HTTP] Connection handling error: {:?}", e);
                }
                socket.close();
                let _ = socket.flush().await;
            }
            Err(e) => {
                println!("[HTTP] Accept error: {:?}", e);
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.abort();
    }
}

async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    state: &'static Mutex<CriticalSectionRawMutex, ControlState>,
    commands: &CommandSender,
) -> Result<(), BoardError> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0usize;

    // Read until we see the end of headers or the buffer is full.
    loop {
        let n = socket
            .read(&mut buf[total..])
            .await
            .map_err(|_| BoardError::TcpError)?;
        if n == 0 {
            if total == 0 {
                return Ok(());
            }
            break;
        }
        total += n;
        if total >= MAX_REQUEST_SIZE || buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let now_ms = Instant::now().as_millis();
    let (status, body) = match Route::parse(&buf[..total]) {
        Ok(route) => {
            println!("[HTTP] {:?}", route);
            let mut guard = state.lock().await;
            if let Some(command) = guard.apply(route) {
                if commands.try_send(command).is_err() {
                    println!("[HTTP] Matrix queue full, dropping {:?}", command);
                }
            }
            ("200 OK", guard.status_body(now_ms))
        }
        Err(_) => {
            let mut body = String::new();
            let _ = body.push_str("bad request\n");
            ("400 Bad Request", body)
        }
    };

    let mut header: String<128> = String::new();
    let _ = write!(
        header,
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );

    write_all(socket, header.as_bytes()).await?;
    write_all(socket, body.as_bytes()).await?;
    socket.flush().await.map_err(|_| BoardError::TcpError)
}

async fn write_all(socket: &mut TcpSocket<'_>, mut data: &[u8]) -> Result<(), BoardError> {
    while !data.is_empty() {
        let n = socket.write(data).await.map_err(|_| BoardError::TcpError)?;
        if n == 0 {
            return Err(BoardError::TcpError);
        }
        data = &data[n..];
    }
    Ok(())
}
