//! Newline-delimited JSON protocol spoken between [`crate::client::TcpSession`]
//! and [`crate::server::serve`].
//!
//! One request per line, one response per line. Node data travels hex-encoded.

use serde::{Deserialize, Serialize};

use cfgtree_core::{AclEntry, Perms};

use crate::error::TreeError;
use crate::path::NodePath;
use crate::tree::{Node, TreeSession};

/// Access-control entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAcl {
    pub scheme: String,
    pub id: String,
    pub perms: u32,
}

impl From<&AclEntry> for WireAcl {
    fn from(entry: &AclEntry) -> Self {
        WireAcl {
            scheme: entry.scheme.clone(),
            id: entry.id.clone(),
            perms: entry.perms.bits(),
        }
    }
}

impl From<WireAcl> for AclEntry {
    fn from(wire: WireAcl) -> Self {
        AclEntry {
            scheme: wire.scheme,
            id: wire.id,
            perms: Perms::from_bits_truncate(wire.perms),
        }
    }
}

/// JSON newline-delimited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Get {
        path: String,
    },
    Create {
        path: String,
        data: String,
        acl: Vec<WireAcl>,
    },
    Write {
        path: String,
        data: String,
        acl: Vec<WireAcl>,
    },
    Delete {
        path: String,
    },
    ListChildren {
        path: String,
    },
}

impl Request {
    pub fn path(&self) -> &str {
        match self {
            Request::Get { path }
            | Request::Create { path, .. }
            | Request::Write { path, .. }
            | Request::Delete { path }
            | Request::ListChildren { path } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireNode {
    pub data: String,
    pub acl: Vec<WireAcl>,
    pub children: usize,
}

impl WireNode {
    pub fn into_node(self) -> Result<Node, TreeError> {
        let data = hex::decode(&self.data)
            .map_err(|err| TreeError::Protocol(format!("node data is not hex: {err}")))?;
        Ok(Node {
            data,
            acl: self.acl.into_iter().map(AclEntry::from).collect(),
            children: self.children,
        })
    }
}

impl From<Node> for WireNode {
    fn from(node: Node) -> Self {
        WireNode {
            data: hex::encode(&node.data),
            acl: node.acl.iter().map(WireAcl::from).collect(),
            children: node.children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<WireNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            node: None,
            children: Vec::new(),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            node: None,
            children: Vec::new(),
            error: Some(WireError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

impl From<&TreeError> for Response {
    fn from(err: &TreeError) -> Self {
        Response::error(err.code(), err.to_string())
    }
}

/// Apply one request to `session` and build the response.
pub fn handle<S: TreeSession + ?Sized>(session: &mut S, request: Request) -> Response {
    match apply(session, request) {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!("request failed: {err}");
            Response::from(&err)
        }
    }
}

fn apply<S: TreeSession + ?Sized>(session: &mut S, request: Request) -> Result<Response, TreeError> {
    let path = NodePath::parse(request.path())?;
    match request {
        Request::Get { .. } => {
            let mut response = Response::ok();
            response.node = session.get(&path)?.map(WireNode::from);
            Ok(response)
        }
        Request::Create { data, acl, .. } => {
            let (data, acl) = decode_payload(&data, acl)?;
            session.create(&path, &data, &acl)?;
            Ok(Response::ok())
        }
        Request::Write { data, acl, .. } => {
            let (data, acl) = decode_payload(&data, acl)?;
            session.write(&path, &data, &acl)?;
            Ok(Response::ok())
        }
        Request::Delete { .. } => {
            session.delete(&path)?;
            Ok(Response::ok())
        }
        Request::ListChildren { .. } => {
            let mut response = Response::ok();
            response.children = session.list_children(&path)?;
            Ok(response)
        }
    }
}

fn decode_payload(data: &str, acl: Vec<WireAcl>) -> Result<(Vec<u8>, Vec<AclEntry>), TreeError> {
    let data = hex::decode(data)
        .map_err(|err| TreeError::Protocol(format!("request data is not hex: {err}")))?;
    Ok((data, acl.into_iter().map(AclEntry::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTree;

    #[test]
    fn request_is_tagged_by_op() {
        let json = serde_json::to_string(&Request::ListChildren {
            path: "/a".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"op":"list_children","path":"/a"}"#);
    }

    #[test]
    fn handle_create_then_get() {
        let mut tree = MemoryTree::new();
        let created = handle(
            &mut tree,
            Request::Create {
                path: "/a".to_string(),
                data: hex::encode("hello"),
                acl: vec![WireAcl {
                    scheme: "host".to_string(),
                    id: "ops1".to_string(),
                    perms: Perms::READ.bits(),
                }],
            },
        );
        assert!(created.ok);

        let got = handle(&mut tree, Request::Get { path: "/a".to_string() });
        let node = got.node.unwrap().into_node().unwrap();
        assert_eq!(node.data, b"hello");
        assert_eq!(node.acl[0].perms, Perms::READ);
    }

    #[test]
    fn handle_reports_error_codes() {
        let mut tree = MemoryTree::new();
        let response = handle(&mut tree, Request::Delete { path: "/nope".to_string() });
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "no_node");

        let response = handle(&mut tree, Request::Get { path: "/a/../b".to_string() });
        assert_eq!(response.error.unwrap().code, "invalid_path");
    }

    #[test]
    fn bad_hex_is_a_protocol_error() {
        let mut tree = MemoryTree::new();
        let response = handle(
            &mut tree,
            Request::Write {
                path: "/".to_string(),
                data: "zz".to_string(),
                acl: Vec::new(),
            },
        );
        assert_eq!(response.error.unwrap().code, "internal");
    }
}
