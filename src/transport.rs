use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::Error;

/// A channel able to carry ICMPv4 messages to and from one host.
///
/// A transport is shared between the probe and its listener thread, so every
/// method takes `&self`. `close` must make a blocked `recv_from` return.
pub trait Transport: Send + Sync + 'static {
    fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> io::Result<usize>;

    /// Receive one datagram, returning its length and source address.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Ipv4Addr)>;

    /// Whether echo reply identifiers can be compared with the one we sent.
    /// False when the kernel rewrites them.
    fn checks_identifier(&self) -> bool;

    fn close(&self);
}

/// Opens a fresh transport for each probe.
pub trait Connector {
    type Transport: Transport;

    /// `timeout` bounds how long a single receive may block.
    fn connect(&self, timeout: Duration) -> Result<Self::Transport, Error>;
}

/// TransportGuard closes the transport when it goes out of scope.
pub struct TransportGuard<T: Transport> {
    inner: Arc<T>,
}

impl<T: Transport> TransportGuard<T> {
    pub fn new(transport: T) -> Self {
        TransportGuard {
            inner: Arc::new(transport),
        }
    }

    /// A handle for the listener thread. It does not keep the transport open.
    pub fn share(&self) -> Arc<T> {
        self.inner.clone()
    }
}

impl<T: Transport> Deref for TransportGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Drop for TransportGuard<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// SOCK_RAW, needs privileges, sees every ICMP message of the host.
    Raw,
    /// Unprivileged ICMP datagram socket, the kernel owns the identifier.
    Datagram,
}

/// IcmpConnector opens socket2 backed ICMPv4 sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct IcmpConnector;

impl Connector for IcmpConnector {
    type Transport = IcmpSocket;

    fn connect(&self, timeout: Duration) -> Result<IcmpSocket, Error> {
        let (socket, kind) =
            open_socket().map_err(|e| Error::transport("fail to open icmp socket", e))?;

        // A zero read timeout is rejected by the OS.
        let read_timeout = timeout.max(Duration::from_millis(1));
        socket
            .set_read_timeout(Some(read_timeout))
            .map_err(|e| Error::transport("fail to set read timeout", e))?;

        debug!("opened {:?} icmp socket", kind);
        Ok(IcmpSocket { socket, kind })
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "macos"))] {
        fn open_socket() -> io::Result<(Socket, SocketKind)> {
            match Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) {
                Ok(socket) => Ok((socket, SocketKind::Raw)),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    debug!("raw icmp socket refused ({}), using a datagram socket", e);
                    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))?;
                    Ok((socket, SocketKind::Datagram))
                }
                Err(e) => Err(e),
            }
        }
    } else {
        fn open_socket() -> io::Result<(Socket, SocketKind)> {
            let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
            Ok((socket, SocketKind::Raw))
        }
    }
}

pub struct IcmpSocket {
    socket: Socket,
    kind: SocketKind,
}

impl Transport for IcmpSocket {
    fn send_to(&self, buf: &[u8], dest: Ipv4Addr) -> io::Result<usize> {
        let dest = SocketAddr::V4(SocketAddrV4::new(dest, 0));
        self.socket.send_to(buf, &dest.into())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Ipv4Addr)> {
        // socket2 only writes initialized bytes into the buffer.
        let uninit = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
        let (n, addr) = self.socket.recv_from(uninit)?;
        match addr.as_socket_ipv4() {
            Some(addr) => Ok((n, *addr.ip())),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "icmp message from a non ipv4 address",
            )),
        }
    }

    fn checks_identifier(&self) -> bool {
        self.kind == SocketKind::Raw
    }

    fn close(&self) {
        // Unconnected sockets may report ENOTCONN, blocked readers still wake up.
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}
