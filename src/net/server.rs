//! Network adapter.
//!
//! Accepts client connections and decodes inbound request frames. Everything
//! is pumped non-blockingly from the dispatcher tick; the listener and every
//! client socket are only ever touched from that one thread.
//!
//! Transient network errors are swallowed here: a client that disconnects
//! mid-response is simply dropped, the request it originated stays terminal
//! in the registry.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::net::{IpAddr, TcpListener, TcpStream};
use std::time::Duration;

use super::{FrameDecoder, MessageId, ResourceRequest, encode_frame};
use crate::{debug, log};

/// Give a stalled client this many 1ms grace periods before dropping it.
const MAX_WRITE_STALLS: u32 = 10;

/// A decoded `RequestResource` message.
#[derive(Debug)]
pub struct InboundRequest {
    pub client_id: u32,
    pub path: String,
}

struct ClientConnection {
    id: u32,
    stream: TcpStream,
    decoder: FrameDecoder,
    alive: bool,
}

/// TCP server: client registry, inbound pump, unicast send.
pub struct NetServer {
    listener: TcpListener,
    clients: Vec<ClientConnection>,
    // Client 0 is reserved for internal requests
    next_client_id: u32,
}

impl NetServer {
    /// Bind the listener. Failure here aborts server initialization.
    pub fn bind(interface: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((interface, port))
            .with_context(|| format!("failed to bind {interface}:{port}"))?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            clients: Vec::new(),
            next_client_id: 1,
        })
    }

    /// Port actually bound (useful when configured port is 0).
    pub fn local_port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Accept pending connections and drain inbound messages.
    pub fn pump(&mut self) -> Vec<InboundRequest> {
        self.accept_pending();

        let mut inbound = Vec::new();
        for client in &mut self.clients {
            Self::read_client(client, &mut inbound);
        }
        self.clients.retain(|c| c.alive);

        inbound
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    let id = self.next_client_id;
                    self.next_client_id += 1;
                    debug!("net"; "client {} connected: {}", id, addr);
                    self.clients.push(ClientConnection {
                        id,
                        stream,
                        decoder: FrameDecoder::new(),
                        alive: true,
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("net"; "accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn read_client(client: &mut ClientConnection, inbound: &mut Vec<InboundRequest>) {
        let mut buf = [0u8; 4096];
        loop {
            match client.stream.read(&mut buf) {
                Ok(0) => {
                    debug!("net"; "client {} disconnected", client.id);
                    client.alive = false;
                    break;
                }
                Ok(n) => client.decoder.feed(&buf[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("net"; "client {} read error: {}", client.id, e);
                    client.alive = false;
                    break;
                }
            }
        }

        loop {
            match client.decoder.next_frame() {
                Ok(Some((id, payload))) => match MessageId::from_u32(id) {
                    Some(MessageId::RequestResource) => {
                        match serde_json::from_slice::<ResourceRequest>(&payload) {
                            Ok(request) => inbound.push(InboundRequest {
                                client_id: client.id,
                                path: request.path,
                            }),
                            Err(e) => {
                                debug!("net"; "client {}: malformed request payload: {}", client.id, e);
                            }
                        }
                    }
                    // Server-to-client ids and unknown ids alike are skipped
                    _ => debug!("net"; "client {}: skipping message id {}", client.id, id),
                },
                Ok(None) => break,
                Err(e) => {
                    log!("net"; "client {}: {}", client.id, e);
                    client.alive = false;
                    break;
                }
            }
        }
    }

    /// Send one message to one client. Errors drop the client silently.
    pub fn send(&mut self, client_id: u32, id: MessageId, payload: &impl Serialize) {
        let frame = encode_frame(id, payload);

        if let Some(client) = self.clients.iter_mut().find(|c| c.id == client_id) {
            if let Err(e) = Self::write_frame(&mut client.stream, &frame) {
                debug!("net"; "client {} send failed: {}", client.id, e);
                client.alive = false;
            }
        }
        self.clients.retain(|c| c.alive);
    }

    fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
        let mut written = 0;
        let mut stalls = 0;
        while written < frame.len() {
            match stream.write(&frame[written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    written += n;
                    stalls = 0;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    stalls += 1;
                    if stalls > MAX_WRITE_STALLS {
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Ids of every connected client, in connection order.
    pub fn client_ids(&self) -> Vec<u32> {
        self.clients.iter().map(|c| c.id).collect()
    }

    pub fn connected_count(&self) -> usize {
        self.clients.len()
    }

    /// Drop every client connection.
    pub fn shutdown(&mut self) {
        self.clients.clear();
    }
}
