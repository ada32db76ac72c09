//! The stream under an SMTP connection

#[cfg(feature = "rustls")]
use std::sync::Arc;
use std::{
    io::{self, Read, Write},
    mem,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

#[cfg(feature = "native-tls")]
use native_tls::TlsStream;
#[cfg(feature = "rustls")]
use rustls::{pki_types::ServerName, ClientConnection, StreamOwned};

use super::{mock::MockStream, tls::InnerTlsParameters, tls::TlsParameters};
use crate::transport::smtp::{error, Error};

/// A network stream
#[derive(Debug)]
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

/// Represents the different types of underlying network streams
#[allow(clippy::large_enum_variant)]
enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    #[cfg(feature = "native-tls")]
    NativeTls(TlsStream<TcpStream>),
    /// Encrypted TCP stream
    #[cfg(feature = "rustls")]
    Rustls(StreamOwned<ClientConnection, TcpStream>),
    /// In-memory stream
    Mock(MockStream),
    /// Can't be built
    None,
}

impl std::fmt::Debug for InnerNetworkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InnerNetworkStream::Tcp(_) => "Tcp",
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(_) => "NativeTls",
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(_) => "Rustls",
            InnerNetworkStream::Mock(_) => "Mock",
            InnerNetworkStream::None => "None",
        };
        f.write_str(name)
    }
}

impl NetworkStream {
    fn new(inner: InnerNetworkStream) -> Self {
        if let InnerNetworkStream::None = inner {
            debug_assert!(false, "InnerNetworkStream::None must never be built");
        }

        NetworkStream { inner }
    }

    /// Wraps an in-memory stream
    pub fn mock(stream: MockStream) -> Self {
        NetworkStream::new(InnerNetworkStream::Mock(stream))
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.peer_addr(),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref s) => s.get_ref().peer_addr(),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref s) => s.get_ref().peer_addr(),
            InnerNetworkStream::Mock(_) | InnerNetworkStream::None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no peer address for this stream",
            )),
        }
    }

    /// Shutdowns the connection
    pub fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.shutdown(how),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref s) => s.get_ref().shutdown(how),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref s) => s.get_ref().shutdown(how),
            InnerNetworkStream::Mock(ref s) => {
                s.shutdown();
                Ok(())
            }
            InnerNetworkStream::None => Ok(()),
        }
    }

    /// Opens a TCP connection to the first reachable address of `server`
    ///
    /// With `tls_parameters`, the TLS handshake is performed right away.
    pub fn connect<T: ToSocketAddrs>(
        server: T,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<NetworkStream, Error> {
        fn try_connect<T: ToSocketAddrs>(
            server: T,
            timeout: Option<Duration>,
        ) -> Result<TcpStream, Error> {
            let addrs = server.to_socket_addrs().map_err(error::connection)?;

            let mut last_err = None;
            for addr in addrs {
                let result = match timeout {
                    Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                    None => TcpStream::connect(addr),
                };
                match result {
                    Ok(stream) => return Ok(stream),
                    Err(err) => last_err = Some(err),
                }
            }

            Err(match last_err {
                Some(last_err) => error::connection(last_err),
                None => error::connection("could not resolve to any supported address"),
            })
        }

        let tcp_stream = try_connect(server, timeout)?;
        let mut stream = NetworkStream::new(InnerNetworkStream::Tcp(tcp_stream));
        if let Some(tls_parameters) = tls_parameters {
            stream.upgrade_tls(tls_parameters)?;
        }
        Ok(stream)
    }

    /// Performs the TLS handshake over the current plain stream
    pub fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        match &self.inner {
            InnerNetworkStream::Tcp(_) => {
                // get owned TcpStream
                let tcp_stream = mem::replace(&mut self.inner, InnerNetworkStream::None);
                let InnerNetworkStream::Tcp(tcp_stream) = tcp_stream else {
                    return Err(error::connection("stream changed during TLS upgrade"));
                };

                self.inner = Self::upgrade_tcp(tcp_stream, tls_parameters)?;
                Ok(())
            }
            InnerNetworkStream::Mock(_) => Err(error::tls("cannot encrypt an in-memory stream")),
            _ => Ok(()),
        }
    }

    fn upgrade_tcp(
        tcp_stream: TcpStream,
        tls_parameters: &TlsParameters,
    ) -> Result<InnerNetworkStream, Error> {
        match tls_parameters.connector {
            #[cfg(feature = "native-tls")]
            InnerTlsParameters::NativeTls(ref connector) => {
                let stream = connector
                    .connect(tls_parameters.domain(), tcp_stream)
                    .map_err(error::tls)?;
                Ok(InnerNetworkStream::NativeTls(stream))
            }
            #[cfg(feature = "rustls")]
            InnerTlsParameters::Rustls(ref config) => {
                let domain = ServerName::try_from(tls_parameters.domain().to_owned())
                    .map_err(error::tls)?;
                let connection =
                    ClientConnection::new(Arc::clone(config), domain).map_err(error::tls)?;
                Ok(InnerNetworkStream::Rustls(StreamOwned::new(
                    connection, tcp_stream,
                )))
            }
            #[cfg(not(any(feature = "native-tls", feature = "rustls")))]
            _ => {
                let _ = tcp_stream;
                Err(error::tls("no TLS backend enabled"))
            }
        }
    }

    /// Tells if the stream is encrypted
    pub fn is_encrypted(&self) -> bool {
        match self.inner {
            InnerNetworkStream::Tcp(_) | InnerNetworkStream::Mock(_) => false,
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(_) => true,
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(_) => true,
            InnerNetworkStream::None => false,
        }
    }

    /// Set read timeout for IO calls
    pub fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref stream) => stream.set_read_timeout(duration),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref stream) => {
                stream.get_ref().set_read_timeout(duration)
            }
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref stream) => stream.get_ref().set_read_timeout(duration),
            InnerNetworkStream::Mock(_) | InnerNetworkStream::None => Ok(()),
        }
    }

    /// Set write timeout for IO calls
    pub fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref stream) => stream.set_write_timeout(duration),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref stream) => {
                stream.get_ref().set_write_timeout(duration)
            }
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref stream) => {
                stream.get_ref().set_write_timeout(duration)
            }
            InnerNetworkStream::Mock(_) | InnerNetworkStream::None => Ok(()),
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is not connected")
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.read(buf),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref mut s) => s.read(buf),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref mut s) => s.read(buf),
            InnerNetworkStream::Mock(ref mut s) => s.read(buf),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.write(buf),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref mut s) => s.write(buf),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref mut s) => s.write(buf),
            InnerNetworkStream::Mock(ref mut s) => s.write(buf),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.flush(),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(ref mut s) => s.flush(),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::Rustls(ref mut s) => s.flush(),
            InnerNetworkStream::Mock(ref mut s) => s.flush(),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}
