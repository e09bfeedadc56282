//! # Method Descriptor
//!
//! A [`MethodDescriptor`] is the immutable binding template of one declared method. It is built
//! exactly once, the first time the method is invoked, and then shared by every call.
//!
//! The [`DescriptorBuilder`] walks the parameters in declaration order and lets the
//! [`BinderChain`] claim each of them. A method is never partially bound: the first parameter
//! that cannot be claimed, or whose alias collides with an alias already in use, aborts the build.
use super::binder::{Binding, BinderChain, SlotKey};
use crate::{
    codec::TypeRef,
    declaration::{HostType, MethodDeclaration, MethodId, Verb},
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Unsupported HTTP verb '{0}', expected one of GET, POST, PUT, PATCH or DELETE")]
    UnsupportedVerb(String),
    #[error("Parameter '{name}' at position {position} has no binding annotation")]
    MissingBindingAnnotation { name: String, position: usize },
    #[error("Alias '{alias}' of the parameter at position {position} is already in use")]
    DuplicateAlias { alias: String, position: usize },
    #[error("Parameter at position {position} is a second request body")]
    DuplicateBody { position: usize },
    #[error("Parameter at position {position} has an empty name and no alias")]
    EmptyParameterName { position: usize },
    #[error("Dynamic host requires a service name on interface '{0}'")]
    MissingService(String),
}

/// How the declared return type is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// The unit type: the response body is discarded.
    Void,
    /// An ordered sequence of `element`.
    Collection { element: TypeRef },
    /// The generic response envelope. `inner` is only a name, resolved when decoding.
    WrappedEntity { inner: TypeRef },
    Plain(TypeRef),
}

impl ReturnShape {
    /// Classifies a declared return type expression.
    pub fn classify(returns: &str) -> Self {
        let type_ref = TypeRef::new(returns);

        if type_ref.is_unit() {
            return ReturnShape::Void;
        }
        if let Some(element) = type_ref.sequence_element() {
            return ReturnShape::Collection { element };
        }
        if let Some(inner) = type_ref.envelope_inner() {
            return ReturnShape::WrappedEntity { inner };
        }
        ReturnShape::Plain(type_ref)
    }
}

/// Where the host of the request URL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostBinding {
    Static(String),
    /// Resolved per call from the routes of `service`.
    Dynamic { service: String },
}

/// Alias and positional slots of one parameter role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    /// alias -> argument position.
    pub aliases: BTreeMap<String, usize>,
    /// (parameter name, argument position), in declaration order.
    pub positional: Vec<(String, usize)>,
}

impl Slots {
    fn insert(&mut self, key: SlotKey, position: usize) {
        match key {
            SlotKey::Alias(alias) => {
                self.aliases.insert(alias, position);
            }
            SlotKey::Positional(name) => self.positional.push((name, position)),
        }
    }

    /// Every slot, aliased ones first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.aliases
            .iter()
            .map(|(key, position)| (key.as_str(), *position))
            .chain(
                self.positional
                    .iter()
                    .map(|(key, position)| (key.as_str(), *position)),
            )
    }

    pub fn len(&self) -> usize {
        self.aliases.len() + self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable, build-once binding template of a declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub(crate) id: MethodId,
    pub(crate) verb: Verb,
    pub(crate) protocol: String,
    pub(crate) host: HostBinding,
    pub(crate) url_skeleton: String,
    pub(crate) query: Slots,
    pub(crate) query_maps: Vec<usize>,
    pub(crate) path: Slots,
    pub(crate) headers: Slots,
    pub(crate) body_index: Option<usize>,
    pub(crate) alias_registry: BTreeSet<String>,
    pub(crate) return_shape: ReturnShape,
    pub(crate) arity: usize,
}

impl MethodDescriptor {
    pub fn id(&self) -> &MethodId {
        &self.id
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &HostBinding {
        &self.host
    }

    /// The path and query template, without scheme and host. Aliased query parameters already
    /// appear in it as `alias={alias}`.
    pub fn url_skeleton(&self) -> &str {
        &self.url_skeleton
    }

    pub fn query_slots(&self) -> &Slots {
        &self.query
    }

    pub fn query_map_slots(&self) -> &[usize] {
        &self.query_maps
    }

    pub fn path_slots(&self) -> &Slots {
        &self.path
    }

    pub fn header_slots(&self) -> &Slots {
        &self.headers
    }

    pub fn body_index(&self) -> Option<usize> {
        self.body_index
    }

    pub fn alias_registry(&self) -> &BTreeSet<String> {
        &self.alias_registry
    }

    pub fn return_shape(&self) -> &ReturnShape {
        &self.return_shape
    }

    /// Number of arguments a call must provide.
    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// Builds [`MethodDescriptor`]s using a [`BinderChain`].
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBuilder<'a> {
    binders: &'a BinderChain,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(binders: &'a BinderChain) -> Self {
        Self { binders }
    }

    /// Builds the descriptor of `method`, declared on `interface`.
    ///
    /// # Arguments
    ///
    /// * `interface` - Name of the declaring interface, used in error messages.
    /// * `service` - Logical service of the interface. Required when the endpoint host is
    ///   [`HostType::Dynamic`].
    /// * `method` - The declaration to bind.
    ///
    /// # Returns
    ///
    /// * `Ok(MethodDescriptor)` - Every parameter claimed by exactly one binder.
    /// * `Err(DescriptorError)` - If the verb is unsupported, a parameter has no role, an alias
    ///   is reused or a second body is declared.
    pub fn build(
        &self,
        interface: &str,
        service: Option<&str>,
        method: &MethodDeclaration,
    ) -> Result<MethodDescriptor, DescriptorError> {
        let verb = Verb::parse(&method.verb)
            .ok_or_else(|| DescriptorError::UnsupportedVerb(method.verb.clone()))?;

        let host = match method.endpoint.host_type {
            HostType::Static => HostBinding::Static(method.endpoint.host.clone()),
            HostType::Dynamic => HostBinding::Dynamic {
                service: service
                    .map(str::to_string)
                    .ok_or_else(|| DescriptorError::MissingService(interface.to_string()))?,
            },
        };

        let mut descriptor = MethodDescriptor {
            id: MethodId::new(interface, &method.name),
            verb,
            protocol: method.endpoint.protocol.clone(),
            host,
            url_skeleton: method.endpoint.uri.trim_start_matches('/').to_string(),
            query: Slots::default(),
            query_maps: Vec::new(),
            path: Slots::default(),
            headers: Slots::default(),
            body_index: None,
            alias_registry: BTreeSet::new(),
            return_shape: ReturnShape::classify(&method.returns),
            arity: method.parameters.len(),
        };

        for (position, parameter) in method.parameters.iter().enumerate() {
            let missing = || DescriptorError::MissingBindingAnnotation {
                name: parameter.name.clone(),
                position,
            };

            if parameter.role.is_none() {
                return Err(missing());
            }

            let binding = self.binders.claim(parameter, position).ok_or_else(missing)?;
            apply(&mut descriptor, binding)?;
        }

        tracing::debug!(
            method = %descriptor.id,
            verb = %descriptor.verb,
            skeleton = %descriptor.url_skeleton,
            shape = ?descriptor.return_shape,
            "Built method descriptor"
        );

        Ok(descriptor)
    }
}

fn apply(descriptor: &mut MethodDescriptor, binding: Binding) -> Result<(), DescriptorError> {
    let position = binding.position();

    if let Some(alias) = binding.alias() {
        if !descriptor.alias_registry.insert(alias.to_string()) {
            return Err(DescriptorError::DuplicateAlias {
                alias: alias.to_string(),
                position,
            });
        }
    }

    match binding {
        Binding::Query { key, position } => {
            check_name(&key, position)?;
            if let SlotKey::Alias(alias) = &key {
                append_query_placeholder(&mut descriptor.url_skeleton, alias);
            }
            descriptor.query.insert(key, position);
        }
        Binding::QueryMap { position } => descriptor.query_maps.push(position),
        Binding::Path { key, position } => {
            check_name(&key, position)?;
            descriptor.path.insert(key, position);
        }
        Binding::Header { key, position } => {
            check_name(&key, position)?;
            descriptor.headers.insert(key, position);
        }
        Binding::Body { position } => {
            if descriptor.body_index.is_some() {
                return Err(DescriptorError::DuplicateBody { position });
            }
            descriptor.body_index = Some(position);
        }
    }

    Ok(())
}

fn check_name(key: &SlotKey, position: usize) -> Result<(), DescriptorError> {
    if key.name().trim().is_empty() {
        return Err(DescriptorError::EmptyParameterName { position });
    }
    Ok(())
}

/// Appends `alias={alias}` to the skeleton's query string.
fn append_query_placeholder(skeleton: &mut String, alias: &str) {
    skeleton.push(if skeleton.contains('?') { '&' } else { '?' });
    skeleton.push_str(alias);
    skeleton.push_str("={");
    skeleton.push_str(alias);
    skeleton.push('}');
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::declaration::{Endpoint, ParameterDeclaration};

    fn build(method: &MethodDeclaration) -> Result<MethodDescriptor, DescriptorError> {
        let chain = BinderChain::default();
        DescriptorBuilder::new(&chain).build("OrderClient", Some("provider"), method)
    }

    fn order_method() -> MethodDeclaration {
        MethodDeclaration::get(
            "find",
            Endpoint::fixed("http", "localhost:8888", "//orders/{orderId}/{userId}"),
        )
        .parameter(ParameterDeclaration::path("order", Some("orderId")))
        .parameter(ParameterDeclaration::path("userId", None))
        .parameter(ParameterDeclaration::header("app", Some("x-app")))
        .parameter(ParameterDeclaration::query("page", Some("p")))
        .parameter(ParameterDeclaration::query("size", None))
        .parameter(ParameterDeclaration::query_map("additional"))
        .returns("ResponseEntity<Order>")
    }

    #[test]
    fn every_parameter_is_claimed_exactly_once() {
        let descriptor = build(&order_method()).unwrap();

        assert_eq!(descriptor.id().to_string(), "OrderClient.find");
        assert_eq!(descriptor.verb(), Verb::Get);
        assert_eq!(
            descriptor.host(),
            &HostBinding::Static("localhost:8888".into())
        );
        assert_eq!(descriptor.arity(), 6);

        assert_eq!(descriptor.path_slots().aliases.get("orderId"), Some(&0));
        assert_eq!(
            descriptor.path_slots().positional,
            vec![("userId".to_string(), 1)]
        );
        assert_eq!(descriptor.header_slots().aliases.get("x-app"), Some(&2));
        assert_eq!(descriptor.query_slots().aliases.get("p"), Some(&3));
        assert_eq!(
            descriptor.query_slots().positional,
            vec![("size".to_string(), 4)]
        );
        assert_eq!(descriptor.query_map_slots(), &[5]);
        assert_eq!(descriptor.body_index(), None);

        let claimed = descriptor.path_slots().len()
            + descriptor.header_slots().len()
            + descriptor.query_slots().len()
            + descriptor.query_map_slots().len();
        assert_eq!(claimed, descriptor.arity());
    }

    #[test]
    fn skeleton_strips_leading_slashes_and_carries_query_aliases() {
        let descriptor = build(&order_method()).unwrap();

        assert_eq!(
            descriptor.url_skeleton(),
            "orders/{orderId}/{userId}?p={p}"
        );
    }

    #[test]
    fn unannotated_parameter_fails_the_build() {
        let method = order_method().parameter(ParameterDeclaration::unannotated("oops"));

        assert_eq!(
            build(&method),
            Err(DescriptorError::MissingBindingAnnotation {
                name: "oops".into(),
                position: 6
            })
        );
    }

    #[test]
    fn duplicate_aliases_across_roles_are_rejected() {
        let method = MethodDeclaration::get("find", Endpoint::default())
            .parameter(ParameterDeclaration::path("id", Some("key")))
            .parameter(ParameterDeclaration::header("token", Some("key")));

        assert_eq!(
            build(&method),
            Err(DescriptorError::DuplicateAlias {
                alias: "key".into(),
                position: 1
            })
        );

        let method = MethodDeclaration::get("find", Endpoint::default())
            .parameter(ParameterDeclaration::query("a", Some("q")))
            .parameter(ParameterDeclaration::query("b", Some("q")));

        assert!(matches!(
            build(&method),
            Err(DescriptorError::DuplicateAlias { .. })
        ));
    }

    #[test]
    fn duplicate_positional_names_are_accepted() {
        let method = MethodDeclaration::get("find", Endpoint::default())
            .parameter(ParameterDeclaration::query("tag", None))
            .parameter(ParameterDeclaration::query("tag", None))
            .parameter(ParameterDeclaration::header("tag", None));

        let descriptor = build(&method).unwrap();

        assert_eq!(descriptor.query_slots().positional.len(), 2);
        assert!(descriptor.alias_registry().is_empty());
    }

    #[test]
    fn second_body_is_rejected() {
        let method = MethodDeclaration::post("save", Endpoint::default())
            .parameter(ParameterDeclaration::body("a"))
            .parameter(ParameterDeclaration::body("b"));

        assert_eq!(
            build(&method),
            Err(DescriptorError::DuplicateBody { position: 1 })
        );
    }

    #[test]
    fn unsupported_verbs_are_rejected() {
        let method = MethodDeclaration::new("probe", "HEAD", Endpoint::default());

        assert_eq!(
            build(&method),
            Err(DescriptorError::UnsupportedVerb("HEAD".into()))
        );
    }

    #[test]
    fn dynamic_host_requires_a_service() {
        let chain = BinderChain::default();
        let method = MethodDeclaration::get("find", Endpoint::dynamic("http", "/orders"));

        assert_eq!(
            DescriptorBuilder::new(&chain).build("OrderClient", None, &method),
            Err(DescriptorError::MissingService("OrderClient".into()))
        );

        let descriptor = build(&method).unwrap();
        assert_eq!(
            descriptor.host(),
            &HostBinding::Dynamic {
                service: "provider".into()
            }
        );
    }

    #[test]
    fn return_shapes_are_classified_from_the_declared_type() {
        assert_eq!(ReturnShape::classify("()"), ReturnShape::Void);
        assert_eq!(ReturnShape::classify(""), ReturnShape::Void);
        assert_eq!(
            ReturnShape::classify("Vec<Order>"),
            ReturnShape::Collection {
                element: TypeRef::new("Order")
            }
        );
        assert_eq!(
            ReturnShape::classify("ResponseEntity<model::Order>"),
            ReturnShape::WrappedEntity {
                inner: TypeRef::new("model::Order")
            }
        );
        assert_eq!(
            ReturnShape::classify("Order"),
            ReturnShape::Plain(TypeRef::new("Order"))
        );
        assert_eq!(
            ReturnShape::classify("Option<Order>"),
            ReturnShape::Plain(TypeRef::new("Option<Order>"))
        );
    }
}
