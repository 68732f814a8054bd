use std::future::Future;
use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time;
use tracing::{error, info};

use crate::results::ResultAggregator;
use crate::types::{EndpointSpec, Protocol, RemoteTarget};

/// The literal probe sent to every remote endpoint.
pub const PROBE: &[u8] = b"HEAD\n";

/// What happened to one remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOutcome {
    /// TCP peer answered the probe with this line (newline included).
    Responded(String),
    /// UDP probe was sent; UDP answers are never read.
    Sent,
    /// Resolve, connect, write or read failed; the error has been logged.
    Failed,
    /// Protocol not recognized, nothing attempted.
    Skipped,
}

/// Probes remote endpoints one at a time.
///
/// By default no step has a deadline, so an unresponsive peer holds up every
/// endpoint after it. `with_timeout` bounds each resolve/connect/write/read
/// step separately.
#[derive(Clone, Debug)]
pub struct DialerManager {
    results: ResultAggregator,
    timeout: Option<Duration>,
}

impl DialerManager {
    pub fn new(results: ResultAggregator) -> Self {
        Self {
            results,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dial every endpoint of `target` in order. Endpoint `i + 1` is not
    /// started until endpoint `i` has succeeded or failed.
    pub async fn dial_all(&self, target: &RemoteTarget) -> Vec<DialOutcome> {
        let mut outcomes = Vec::with_capacity(target.endpoints.len());
        for spec in &target.endpoints {
            outcomes.push(self.dial(&target.host, spec).await);
        }
        outcomes
    }

    pub async fn dial(&self, host: &str, spec: &EndpointSpec) -> DialOutcome {
        info!(
            "connecting via {} to host:port {}:{} used for {}",
            spec.protocol, host, spec.port, spec.description
        );
        match spec.protocol {
            Protocol::Tcp => self.connect_tcp(host, &spec.port, &spec.description).await,
            Protocol::Udp => self.connect_udp(host, &spec.port, &spec.description).await,
            Protocol::Other(_) => DialOutcome::Skipped,
        }
    }

    /// Connect, send the probe, read one line back.
    pub async fn connect_tcp(&self, host: &str, port: &str, description: &str) -> DialOutcome {
        let addr = remote_addr(host, port);
        let mut stream = match self.bounded(TcpStream::connect(&addr)).await {
            Ok(s) => s,
            Err(e) => {
                error!("error in connecting to TCP listener at {addr} used for {description}: {e}");
                return DialOutcome::Failed;
            }
        };

        if let Err(e) = self.bounded(stream.write_all(PROBE)).await {
            error!("error in writing to TCP listener at {addr} used for {description}: {e}");
            return DialOutcome::Failed;
        }

        let mut reader = BufReader::new(stream);
        match self.bounded(read_line(&mut reader)).await {
            Ok(line) => {
                info!("response = {}", line.trim_end());
                self.results.increment_tcp_response();
                DialOutcome::Responded(line)
            }
            Err(e) => {
                error!("error in reading return stream from {addr} used for {description}: {e}");
                DialOutcome::Failed
            }
        }
    }

    /// Resolve, connect a UDP socket to the peer and send the probe.
    pub async fn connect_udp(&self, host: &str, port: &str, description: &str) -> DialOutcome {
        let addr = remote_addr(host, port);
        let peer = match self.bounded(resolve(&addr)).await {
            Ok(p) => p,
            Err(e) => {
                error!("error in resolving remote UDP address {addr} used for {description}: {e}");
                return DialOutcome::Failed;
            }
        };

        let socket = match connect_udp_socket(peer).await {
            Ok(s) => s,
            Err(e) => {
                error!("error in connecting to UDP listener at {addr} used for {description}: {e}");
                return DialOutcome::Failed;
            }
        };

        match self.bounded(socket.send(PROBE)).await {
            Ok(_) => {
                info!("wrote the probe to UDP listener at {addr}");
                DialOutcome::Sent
            }
            Err(e) => {
                error!("error in writing to UDP listener at {addr} used for {description}: {e}");
                DialOutcome::Failed
            }
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> io::Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        match self.timeout {
            None => fut.await,
            Some(limit) => match time::timeout(limit, fut).await {
                Ok(res) => res,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out after {}ms", limit.as_millis()),
                )),
            },
        }
    }
}

/// `host:port`, with brackets around a bare IPv6 literal.
pub fn remote_addr(host: &str, port: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Read up to and including `\n`. The bytes are not required to be UTF-8;
/// invalid sequences are replaced in the returned line.
async fn read_line(reader: &mut BufReader<TcpStream>) -> io::Result<String> {
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf).await?;
    if buf.last() == Some(&b'\n') {
        Ok(String::from_utf8_lossy(&buf).into_owned())
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed before end of line",
        ))
    }
}

async fn resolve(addr: &str) -> io::Result<SocketAddr> {
    lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no address found for {addr}"))
    })
}

async fn connect_udp_socket(peer: SocketAddr) -> io::Result<UdpSocket> {
    let local = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(peer).await?;
    Ok(socket)
}
