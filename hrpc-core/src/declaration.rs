//! # Method Declarations
//!
//! Plain-data description of the interfaces an [`crate::client::HrpcClient`] can call.
//!
//! There is no runtime interception here: every method a caller wants to invoke is
//! registered up front with its HTTP verb, endpoint template, parameter roles and the
//! declared return type. The descriptor builder turns each declaration into an immutable
//! [`crate::binding::MethodDescriptor`] the first time the method is invoked.
//!
//! All types are serde-friendly so a registry can be loaded from JSON as well as built in code.
//!
//! ```rust
//! use hrpc_core::declaration::{
//!     Endpoint, InterfaceDeclaration, MethodDeclaration, ParameterDeclaration,
//! };
//!
//! let interface = InterfaceDeclaration::new("OrderClient")
//!     .service("provider")
//!     .method(
//!         MethodDeclaration::get("find_order", Endpoint::dynamic("http", "/orders/{id}"))
//!             .parameter(ParameterDeclaration::path("id", None))
//!             .parameter(ParameterDeclaration::header("tenant", Some("x-tenant")))
//!             .returns("Order"),
//!     );
//!
//! assert_eq!(interface.methods.len(), 1);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a declared interface method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId {
    pub interface: String,
    pub method: String,
}

impl MethodId {
    pub fn new(interface: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.interface, self.method)
    }
}

/// The HTTP verbs a method can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Parses a verb name, ignoring ASCII case. Returns `None` for anything outside
    /// GET/POST/PUT/PATCH/DELETE.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Verb::Get),
            "POST" => Some(Verb::Post),
            "PUT" => Some(Verb::Put),
            "PATCH" => Some(Verb::Patch),
            "DELETE" => Some(Verb::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Whether requests with this verb carry the encoded body argument.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Verb::Get)
    }

    pub fn to_http(&self) -> http::Method {
        match self {
            Verb::Get => http::Method::GET,
            Verb::Post => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Patch => http::Method::PATCH,
            Verb::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the host part of the URL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostType {
    /// The host written in the [`Endpoint`] is used as is.
    #[default]
    Static,
    /// The host is picked per call from the service topology by the cluster resolver.
    Dynamic,
}

/// The target of a method: protocol, host and URI template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub uri: String,
    pub host_type: HostType,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "localhost:8080".to_string(),
            uri: "/".to_string(),
            host_type: HostType::Static,
        }
    }
}

impl Endpoint {
    /// An endpoint with a fixed `host` (e.g. `localhost:8888` or `api.example.com`).
    pub fn fixed(protocol: &str, host: &str, uri: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            uri: uri.to_string(),
            host_type: HostType::Static,
        }
    }

    /// An endpoint whose host is resolved per call from the interface's service.
    pub fn dynamic(protocol: &str, uri: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: String::new(),
            uri: uri.to_string(),
            host_type: HostType::Dynamic,
        }
    }
}

/// The role a parameter plays in the request.
///
/// An omitted alias means the declared parameter name is used as key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ParameterRole {
    Query { alias: Option<String> },
    Path { alias: Option<String> },
    Header { alias: Option<String> },
    Body,
}

/// Shape of the runtime value passed for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    Scalar,
    /// A key/value mapping. An unaliased query parameter of this kind is flattened into
    /// the query string using the map's own keys.
    Map,
}

/// Loaded from a flat object: `{ "name": "id", "role": "path", "alias": "orderId" }`. An unknown
/// `role` is a parse error, a missing one leaves the parameter unannotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter")]
pub struct ParameterDeclaration {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    /// `None` marks a parameter without any binding annotation.
    #[serde(flatten)]
    pub role: Option<ParameterRole>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RoleTag {
    Query,
    Path,
    Header,
    Body,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameter {
    name: String,
    #[serde(default)]
    kind: ParamKind,
    #[serde(default)]
    role: Option<RoleTag>,
    #[serde(default)]
    alias: Option<String>,
}

impl TryFrom<RawParameter> for ParameterDeclaration {
    type Error = String;

    fn try_from(raw: RawParameter) -> Result<Self, Self::Error> {
        let RawParameter {
            name,
            kind,
            role,
            alias,
        } = raw;

        let role = match role {
            Some(RoleTag::Query) => Some(ParameterRole::Query { alias }),
            Some(RoleTag::Path) => Some(ParameterRole::Path { alias }),
            Some(RoleTag::Header) => Some(ParameterRole::Header { alias }),
            Some(RoleTag::Body) if alias.is_some() => {
                return Err(format!("body parameter '{name}' cannot carry an alias"));
            }
            Some(RoleTag::Body) => Some(ParameterRole::Body),
            None if alias.is_some() => {
                return Err(format!("parameter '{name}' has an alias but no role"));
            }
            None => None,
        };

        Ok(Self { name, kind, role })
    }
}

impl ParameterDeclaration {
    fn with_role(name: &str, role: Option<ParameterRole>) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Scalar,
            role,
        }
    }

    pub fn query(name: &str, alias: Option<&str>) -> Self {
        Self::with_role(
            name,
            Some(ParameterRole::Query {
                alias: alias.map(str::to_string),
            }),
        )
    }

    /// An unaliased query parameter whose value is a map of extra query parameters.
    pub fn query_map(name: &str) -> Self {
        Self {
            kind: ParamKind::Map,
            ..Self::query(name, None)
        }
    }

    pub fn path(name: &str, alias: Option<&str>) -> Self {
        Self::with_role(
            name,
            Some(ParameterRole::Path {
                alias: alias.map(str::to_string),
            }),
        )
    }

    pub fn header(name: &str, alias: Option<&str>) -> Self {
        Self::with_role(
            name,
            Some(ParameterRole::Header {
                alias: alias.map(str::to_string),
            }),
        )
    }

    pub fn body(name: &str) -> Self {
        Self::with_role(name, Some(ParameterRole::Body))
    }

    /// A parameter carrying no role at all. Building a descriptor for a method that
    /// declares one always fails.
    pub fn unannotated(name: &str) -> Self {
        Self::with_role(name, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDeclaration {
    pub name: String,
    /// Kept as text so that declarations loaded from data can be validated when the
    /// descriptor is built.
    pub verb: String,
    #[serde(default)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    /// Declared return type, e.g. `()`, `Vec<Order>`, `ResponseEntity<Order>` or `Order`.
    #[serde(default = "unit_type")]
    pub returns: String,
}

fn unit_type() -> String {
    "()".to_string()
}

impl MethodDeclaration {
    pub fn new(name: &str, verb: &str, endpoint: Endpoint) -> Self {
        Self {
            name: name.to_string(),
            verb: verb.to_string(),
            endpoint,
            parameters: Vec::new(),
            returns: unit_type(),
        }
    }

    pub fn get(name: &str, endpoint: Endpoint) -> Self {
        Self::new(name, "GET", endpoint)
    }

    pub fn post(name: &str, endpoint: Endpoint) -> Self {
        Self::new(name, "POST", endpoint)
    }

    pub fn put(name: &str, endpoint: Endpoint) -> Self {
        Self::new(name, "PUT", endpoint)
    }

    pub fn patch(name: &str, endpoint: Endpoint) -> Self {
        Self::new(name, "PATCH", endpoint)
    }

    pub fn delete(name: &str, endpoint: Endpoint) -> Self {
        Self::new(name, "DELETE", endpoint)
    }

    pub fn parameter(mut self, parameter: ParameterDeclaration) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, type_expr: &str) -> Self {
        self.returns = type_expr.to_string();
        self
    }
}

/// A declared client interface: a group of methods sharing a logical service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDeclaration {
    pub name: String,
    /// Logical service used to resolve dynamic hosts.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDeclaration>,
}

impl InterfaceDeclaration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            service: None,
            methods: Vec::new(),
        }
    }

    pub fn service(mut self, service: &str) -> Self {
        self.service = Some(service.to_string());
        self
    }

    pub fn method(mut self, method: MethodDeclaration) -> Self {
        self.methods.push(method);
        self
    }
}
