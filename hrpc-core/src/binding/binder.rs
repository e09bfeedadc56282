//! # Parameter Binding Chain
//!
//! An ordered set of independent binders, one per parameter role. Each binder looks at a single
//! [`ParameterDeclaration`] and either declines it or claims it by returning a [`Binding`].
//!
//! Binders are pure: they never touch the descriptor being built. Alias uniqueness and slot
//! bookkeeping are the job of the [`super::DescriptorBuilder`].
//!
//! The default chain registers, in this order:
//!
//! | order | binder                 | claims                     |
//! |-------|------------------------|----------------------------|
//! | 0     | [`QueryParamBinder`]   | `ParameterRole::Query`     |
//! | 1     | [`PathVariableBinder`] | `ParameterRole::Path`      |
//! | 2     | [`HeaderBinder`]       | `ParameterRole::Header`    |
//! | 3     | [`BodyBinder`]         | `ParameterRole::Body`      |
use crate::declaration::{ParamKind, ParameterDeclaration, ParameterRole};

/// The key a parameter is bound under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKey {
    /// An explicit alias. Must be unique across the query, path and header roles of a method.
    Alias(String),
    /// No alias was given, the declared parameter name is used as key. Not checked for
    /// uniqueness.
    Positional(String),
}

impl SlotKey {
    /// Builds the key from an optional alias, falling back to the parameter name when the alias
    /// is missing or blank.
    pub fn from_alias(alias: Option<&str>, name: &str) -> Self {
        match alias.map(str::trim) {
            Some(alias) if !alias.is_empty() => SlotKey::Alias(alias.to_string()),
            _ => SlotKey::Positional(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SlotKey::Alias(name) | SlotKey::Positional(name) => name,
        }
    }
}

/// A claimed parameter: its role, key and position in the argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Query { key: SlotKey, position: usize },
    /// An unaliased map-valued query parameter, flattened into the query string at call time.
    QueryMap { position: usize },
    Path { key: SlotKey, position: usize },
    Header { key: SlotKey, position: usize },
    Body { position: usize },
}

impl Binding {
    pub fn position(&self) -> usize {
        match self {
            Binding::Query { position, .. }
            | Binding::QueryMap { position }
            | Binding::Path { position, .. }
            | Binding::Header { position, .. }
            | Binding::Body { position } => *position,
        }
    }

    /// The explicit alias carried by this binding, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Binding::Query { key, .. } | Binding::Path { key, .. } | Binding::Header { key, .. } => {
                match key {
                    SlotKey::Alias(alias) => Some(alias),
                    SlotKey::Positional(_) => None,
                }
            }
            Binding::QueryMap { .. } | Binding::Body { .. } => None,
        }
    }
}

/// A unit that claims the parameters of one role.
pub trait ParameterBinder: Send + Sync {
    /// Lower orders are consulted first.
    fn order(&self) -> i32;

    /// Returns `None` when the parameter does not belong to this binder.
    fn bind(&self, parameter: &ParameterDeclaration, position: usize) -> Option<Binding>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueryParamBinder;

impl ParameterBinder for QueryParamBinder {
    fn order(&self) -> i32 {
        0
    }

    fn bind(&self, parameter: &ParameterDeclaration, position: usize) -> Option<Binding> {
        let Some(ParameterRole::Query { alias }) = &parameter.role else {
            return None;
        };

        let key = SlotKey::from_alias(alias.as_deref(), &parameter.name);

        match (&key, parameter.kind) {
            (SlotKey::Positional(_), ParamKind::Map) => Some(Binding::QueryMap { position }),
            _ => Some(Binding::Query { key, position }),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PathVariableBinder;

impl ParameterBinder for PathVariableBinder {
    fn order(&self) -> i32 {
        1
    }

    fn bind(&self, parameter: &ParameterDeclaration, position: usize) -> Option<Binding> {
        match &parameter.role {
            Some(ParameterRole::Path { alias }) => Some(Binding::Path {
                key: SlotKey::from_alias(alias.as_deref(), &parameter.name),
                position,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderBinder;

impl ParameterBinder for HeaderBinder {
    fn order(&self) -> i32 {
        2
    }

    fn bind(&self, parameter: &ParameterDeclaration, position: usize) -> Option<Binding> {
        match &parameter.role {
            Some(ParameterRole::Header { alias }) => Some(Binding::Header {
                key: SlotKey::from_alias(alias.as_deref(), &parameter.name),
                position,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BodyBinder;

impl ParameterBinder for BodyBinder {
    fn order(&self) -> i32 {
        3
    }

    fn bind(&self, parameter: &ParameterDeclaration, position: usize) -> Option<Binding> {
        match &parameter.role {
            Some(ParameterRole::Body) => Some(Binding::Body { position }),
            _ => None,
        }
    }
}

/// The ordered binder chain. The first binder that claims a parameter wins.
pub struct BinderChain {
    binders: Vec<Box<dyn ParameterBinder>>,
}

impl BinderChain {
    /// An empty chain. Every parameter is declined until binders are registered.
    pub fn empty() -> Self {
        Self {
            binders: Vec::new(),
        }
    }

    /// Registers a binder, keeping the chain sorted by [`ParameterBinder::order`].
    /// Binders with the same order keep their registration order.
    pub fn register(mut self, binder: impl ParameterBinder + 'static) -> Self {
        self.binders.push(Box::new(binder));
        self.binders.sort_by_key(|b| b.order());
        self
    }

    pub fn claim(&self, parameter: &ParameterDeclaration, position: usize) -> Option<Binding> {
        self.binders
            .iter()
            .find_map(|binder| binder.bind(parameter, position))
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }
}

impl Default for BinderChain {
    fn default() -> Self {
        Self::empty()
            .register(QueryParamBinder)
            .register(PathVariableBinder)
            .register(HeaderBinder)
            .register(BodyBinder)
    }
}

impl std::fmt::Debug for BinderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinderChain")
            .field("orders", &self.binders.iter().map(|b| b.order()).collect::<Vec<_>>())
            .finish()
    }
}
