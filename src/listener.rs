use std::net::{IpAddr, Ipv4Addr};

use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::handler::{handle_connection, READ_BUFFER_SIZE};
use crate::results::ResultAggregator;
use crate::types::{EndpointSpec, Protocol};

/// Opens one listener per local endpoint and keeps it serving until the
/// process exits or the listeners are shut down.
#[derive(Clone, Debug)]
pub struct ListenerManager {
    bind_ip: IpAddr,
    results: ResultAggregator,
    cancel: CancellationToken,
}

/// The listener tasks started by one `ListenerManager::launch` call.
///
/// Dropping this handle detaches the tasks: they keep serving until the
/// process exits or `shutdown` cancels the manager's token.
#[derive(Debug)]
pub struct Listeners {
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: usize,
}

impl Listeners {
    /// Number of endpoints a listener task was started for.
    pub fn len(&self) -> usize {
        self.started
    }

    pub fn is_empty(&self) -> bool {
        self.started == 0
    }

    /// Stop every accept/receive loop and wait for the tasks to finish.
    /// Connections already handed to a handler are left to complete.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl ListenerManager {
    pub fn new(results: ResultAggregator) -> Self {
        Self::with_bind_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED), results)
    }

    pub fn with_bind_ip(bind_ip: IpAddr, results: ResultAggregator) -> Self {
        Self {
            bind_ip,
            results,
            cancel: CancellationToken::new(),
        }
    }

    /// Start one task per local endpoint and return without waiting for any
    /// of them to bind. Endpoints with an unrecognized protocol are skipped.
    pub fn launch(&self, locals: &[EndpointSpec]) -> Listeners {
        let tracker = TaskTracker::new();
        let mut started = 0;
        for spec in locals {
            info!(
                "Setting up a {} listener on port {} used for {}",
                spec.protocol, spec.port, spec.description
            );
            let manager = self.clone();
            let port = spec.port.clone();
            let description = spec.description.clone();
            match spec.protocol {
                Protocol::Tcp => {
                    tracker.spawn(async move { manager.open_tcp_listener(&port, &description).await });
                    started += 1;
                }
                Protocol::Udp => {
                    tracker.spawn(async move { manager.open_udp_listener(&port, &description).await });
                    started += 1;
                }
                Protocol::Other(_) => {}
            }
        }
        Listeners {
            cancel: self.cancel.clone(),
            tracker,
            started,
        }
    }

    /// Bind a TCP listener and serve it. Returns right away if the bind fails.
    pub async fn open_tcp_listener(&self, port: &str, description: &str) {
        if let Some(listener) = self.bind_tcp(port, description).await {
            self.serve_tcp(listener, port, description).await;
        }
    }

    /// Bind a UDP socket and serve it. Returns right away if the bind fails.
    pub async fn open_udp_listener(&self, port: &str, description: &str) {
        if let Some(socket) = self.bind_udp(port, description).await {
            self.serve_udp(socket, port, description).await;
        }
    }

    /// Bind `<bind_ip>:port` for TCP, counting the listener on success.
    pub async fn bind_tcp(&self, port: &str, description: &str) -> Option<TcpListener> {
        match TcpListener::bind(self.bind_addr(port)).await {
            Ok(listener) => {
                self.results.increment_tcp_listener();
                Some(listener)
            }
            Err(e) => {
                error!(
                    "error in setting up TCP listener on port {port} used for {description}: {e}"
                );
                None
            }
        }
    }

    /// Bind `<bind_ip>:port` for UDP, counting the listener on success.
    pub async fn bind_udp(&self, port: &str, description: &str) -> Option<UdpSocket> {
        match UdpSocket::bind(self.bind_addr(port)).await {
            Ok(socket) => {
                self.results.increment_udp_listener();
                Some(socket)
            }
            Err(e) => {
                error!(
                    "error in setting up UDP listener on port {port} used for {description}: {e}"
                );
                None
            }
        }
    }

    /// Accept loop. Accept errors are logged and the loop carries on; each
    /// connection is handled on its own task.
    pub async fn serve_tcp(&self, listener: TcpListener, port: &str, description: &str) {
        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = listener.accept() => res,
            };
            match accepted {
                Ok((stream, peer)) => {
                    match stream.local_addr() {
                        Ok(local) => info!("Received message {peer} -> {local}"),
                        Err(_) => info!("Received message from {peer}"),
                    }
                    self.results.increment_tcp_request();
                    tokio::spawn(handle_connection(stream));
                }
                Err(e) => {
                    error!(
                        "error in accepting TCP connections on port {port} used for {description}: {e}"
                    );
                }
            }
        }
        debug!("TCP listener on port {port} stopped");
    }

    /// Receive loop. Datagram content is not inspected.
    pub async fn serve_udp(&self, socket: UdpSocket, port: &str, description: &str) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = socket.recv_from(&mut buf) => res,
            };
            match received {
                Ok((n, peer)) => {
                    info!("Received {n} byte UDP message from {peer}");
                    self.results.increment_udp_request();
                }
                Err(e) => {
                    error!(
                        "error in accepting UDP connections on port {port} used for {description}: {e}"
                    );
                }
            }
        }
        debug!("UDP listener on port {port} stopped");
    }

    fn bind_addr(&self, port: &str) -> String {
        match self.bind_ip {
            IpAddr::V4(ip) => format!("{ip}:{port}"),
            IpAddr::V6(ip) => format!("[{ip}]:{port}"),
        }
    }
}
