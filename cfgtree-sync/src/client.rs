//! Blocking TCP client for the coordination service.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::thread::sleep;
use std::time::Duration;

use cfgtree_core::{AclEntry, CoordinatorConfig};

use crate::error::TreeError;
use crate::path::NodePath;
use crate::tree::{Node, TreeSession};
use crate::wire::{Request, Response, WireAcl, WireError};

/// Bounds on how long [`connect`] and each request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Per-address timeout for a single connection attempt.
    pub connect_timeout: Duration,
    pub attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Read and write timeout once connected.
    pub io_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions::from(&CoordinatorConfig::default())
    }
}

impl From<&CoordinatorConfig> for ConnectOptions {
    fn from(config: &CoordinatorConfig) -> Self {
        ConnectOptions {
            connect_timeout: config.connect_timeout(),
            attempts: config.connect_attempts,
            retry_delay: Duration::from_millis(200),
            io_timeout: config.io_timeout(),
        }
    }
}

/// Open a session to `host:port`, trying at most `options.attempts` times.
pub fn connect(host: &str, port: u16, options: &ConnectOptions) -> Result<TcpSession, TreeError> {
    let addr = format!("{host}:{port}");
    let attempts = options.attempts.max(1);
    let mut last_err = io::Error::new(io::ErrorKind::Other, "no connection attempt made");

    for attempt in 1..=attempts {
        match try_connect(host, port, options.connect_timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(options.io_timeout))
                    .and_then(|_| stream.set_write_timeout(Some(options.io_timeout)))
                    .map_err(|source| TreeError::Connection {
                        addr: addr.clone(),
                        attempts: attempt,
                        source,
                    })?;
                tracing::debug!("connected to {addr} on attempt {attempt}");
                return Ok(TcpSession {
                    addr,
                    reader: BufReader::new(stream),
                    broken: false,
                });
            }
            Err(err) => {
                tracing::warn!("connection attempt {attempt}/{attempts} to {addr} failed: {err}");
                last_err = err;
                if attempt < attempts {
                    sleep(options.retry_delay);
                }
            }
        }
    }

    Err(TreeError::Connection {
        addr,
        attempts,
        source: last_err,
    })
}

/// [`connect`] with host, port and bounds taken from `config`.
pub fn connect_with(config: &CoordinatorConfig) -> Result<TcpSession, TreeError> {
    connect(&config.host, config.port, &ConnectOptions::from(config))
}

fn try_connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    }))
}

/// A live connection. Any I/O failure ends the session; callers reconnect.
///
/// Once broken, every further call fails with [`TreeError::SessionLost`]
/// without touching the socket, so a late reply is never paired with a
/// newer request.
#[derive(Debug)]
pub struct TcpSession {
    addr: String,
    reader: BufReader<TcpStream>,
    broken: bool,
}

impl TcpSession {
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// False after any I/O failure on this session.
    pub fn is_alive(&self) -> bool {
        !self.broken
    }

    fn call(&mut self, path: &NodePath, request: &Request) -> Result<Response, TreeError> {
        if self.broken {
            return Err(TreeError::SessionLost {
                addr: self.addr.clone(),
                source: io::Error::new(io::ErrorKind::NotConnected, "session already lost"),
            });
        }
        let payload = serde_json::to_string(request)?;
        let written = {
            let stream = self.reader.get_mut();
            stream
                .write_all(payload.as_bytes())
                .and_then(|_| stream.write_all(b"\n"))
                .and_then(|_| stream.flush())
        };
        written.map_err(|source| self.lost(source))?;

        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|source| self.lost(source))?;
        if read == 0 {
            return Err(self.lost(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }

        let response: Response = serde_json::from_str(line.trim_end())?;
        if response.ok {
            return Ok(response);
        }
        Err(match response.error {
            Some(error) => error_from_wire(path, error),
            None => TreeError::Protocol("error response without details".to_string()),
        })
    }

    fn lost(&mut self, source: io::Error) -> TreeError {
        self.broken = true;
        if let Err(err) = self.reader.get_ref().shutdown(Shutdown::Both) {
            tracing::debug!("shutdown of {} after failure: {err}", self.addr);
        }
        tracing::warn!("session to {} lost: {source}", self.addr);
        TreeError::SessionLost {
            addr: self.addr.clone(),
            source,
        }
    }
}

fn error_from_wire(path: &NodePath, error: WireError) -> TreeError {
    let path = path.clone();
    match error.code.as_str() {
        "no_node" => TreeError::NoNode { path },
        "node_exists" => TreeError::NodeExists { path },
        "no_parent" => TreeError::NoParent { path },
        "not_empty" => TreeError::NotEmpty { path },
        "invalid_path" => TreeError::InvalidPath {
            path: path.to_string(),
            reason: error.message,
        },
        _ => TreeError::Protocol(error.message),
    }
}

fn wire_acl(acl: &[AclEntry]) -> Vec<WireAcl> {
    acl.iter().map(WireAcl::from).collect()
}

impl TreeSession for TcpSession {
    fn get(&mut self, path: &NodePath) -> Result<Option<Node>, TreeError> {
        let request = Request::Get {
            path: path.to_string(),
        };
        let response = self.call(path, &request)?;
        response.node.map(|node| node.into_node()).transpose()
    }

    fn create(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError> {
        let request = Request::Create {
            path: path.to_string(),
            data: hex::encode(data),
            acl: wire_acl(acl),
        };
        self.call(path, &request).map(|_| ())
    }

    fn write(&mut self, path: &NodePath, data: &[u8], acl: &[AclEntry]) -> Result<(), TreeError> {
        let request = Request::Write {
            path: path.to_string(),
            data: hex::encode(data),
            acl: wire_acl(acl),
        };
        self.call(path, &request).map(|_| ())
    }

    fn delete(&mut self, path: &NodePath) -> Result<(), TreeError> {
        let request = Request::Delete {
            path: path.to_string(),
        };
        self.call(path, &request).map(|_| ())
    }

    fn list_children(&mut self, path: &NodePath) -> Result<Vec<String>, TreeError> {
        let request = Request::ListChildren {
            path: path.to_string(),
        };
        Ok(self.call(path, &request)?.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn error_codes_map_back_to_variants() {
        let path = NodePath::parse("/a").unwrap();
        let err = error_from_wire(
            &path,
            WireError {
                code: "not_empty".to_string(),
                message: "node /a has children".to_string(),
            },
        );
        assert!(matches!(err, TreeError::NotEmpty { .. }));

        let err = error_from_wire(
            &path,
            WireError {
                code: "something_else".to_string(),
                message: "boom".to_string(),
            },
        );
        assert!(matches!(err, TreeError::Protocol(ref m) if m == "boom"));
    }

    #[test]
    fn unreachable_port_reports_attempts() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let options = ConnectOptions {
            connect_timeout: Duration::from_millis(200),
            attempts: 2,
            retry_delay: Duration::from_millis(10),
            io_timeout: Duration::from_millis(200),
        };
        let err = connect("127.0.0.1", port, &options).unwrap_err();
        match err {
            TreeError::Connection { addr, attempts, .. } => {
                assert_eq!(addr, format!("127.0.0.1:{port}"));
                assert_eq!(attempts, 2);
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }
}
