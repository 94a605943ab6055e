/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Socket option application.
//!
//! Listener sockets take reuse-address and buffer sizing before bind;
//! Nagle suppression applies to the established stream on both the accept
//! and connect paths.

use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Socket-level options from the session settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    /// Disable Nagle's algorithm (TCP_NODELAY).
    pub no_delay: bool,
    /// Allow rebinding a recently used address (SO_REUSEADDR).
    pub reuse_address: bool,
    /// Kernel send buffer size, if overridden.
    pub send_buffer_size: Option<u32>,
    /// Kernel receive buffer size, if overridden.
    pub receive_buffer_size: Option<u32>,
}

fn new_socket(addr: &SocketAddr, options: &SocketOptions) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if options.reuse_address {
        socket.set_reuseaddr(true)?;
    }
    if let Some(size) = options.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = options.receive_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }
    Ok(socket)
}

/// Binds a listener with the given options applied.
///
/// # Errors
/// Returns any socket or bind error.
pub fn bind_listener(addr: SocketAddr, options: &SocketOptions) -> io::Result<TcpListener> {
    let socket = new_socket(&addr, options)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Dials a counterparty with the given options applied.
///
/// # Errors
/// Returns any socket or connect error.
pub async fn connect(addr: SocketAddr, options: &SocketOptions) -> io::Result<TcpStream> {
    let socket = new_socket(&addr, options)?;
    let stream = socket.connect(addr).await?;
    configure_stream(&stream, options)?;
    Ok(stream)
}

/// Applies per-stream options to an established connection.
///
/// # Errors
/// Returns any setsockopt error.
pub fn configure_stream(stream: &TcpStream, options: &SocketOptions) -> io::Result<()> {
    if options.no_delay {
        stream.set_nodelay(true)?;
    }
    Ok(())
}
