//! Declared platform objects: what the config file asks the platform to build.

use serde::{Deserialize, Serialize};

use crate::query::Predicate;

/// A projection from a channel into a binder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionDecl {
    pub name: String,
    pub channel: String,
    pub binder: String,
    /// Payload field used as the document id (default: "id")
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_id_field() -> String {
    "id".to_string()
}

/// A query over a binder. All predicates must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDecl {
    pub name: String,
    pub binder: String,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    /// Stop after this many accepted documents
    #[serde(default)]
    pub limit: Option<u64>,
}

/// A command that publishes its payload to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDecl {
    pub name: String,
    pub channel: String,
}

/// An HTTP exposure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteDecl {
    /// `GET uri` streams the query; path parameters become query parameters
    Query { query: String, uri: String },
    /// `METHOD uri` invokes the command with the request body
    Command {
        command: String,
        uri: String,
        #[serde(default = "default_command_method")]
        method: String,
    },
    /// `GET uri?id=...` returns one binder document
    FindById { binder: String, uri: String },
}

fn default_command_method() -> String {
    "POST".to_string()
}

impl RouteDecl {
    /// Route path
    pub fn uri(&self) -> &str {
        match self {
            RouteDecl::Query { uri, .. } => uri,
            RouteDecl::Command { uri, .. } => uri,
            RouteDecl::FindById { uri, .. } => uri,
        }
    }
}
