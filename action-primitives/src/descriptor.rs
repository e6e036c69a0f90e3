//! Static self-description of a governance action service kind.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{ElementGuid, ElementRef, GuardCatalog, SupportedCardinalities};

const MAX_KIND_LEN: usize = 64;
const MAX_NAME_LEN: usize = 128;

/// Identifier of a governance action service kind.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceKind(String);

impl ServiceKind {
    /// Creates a service kind identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if the identifier is empty, too long,
    /// or contains unsupported characters.
    pub fn new(kind: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        validate_kind(&kind)?;
        Ok(Self(kind))
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServiceKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServiceKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ServiceKind> for String {
    fn from(value: ServiceKind) -> Self {
        value.0
    }
}

fn validate_kind(kind: &str) -> Result<()> {
    if kind.is_empty() {
        return Err(Error::identifier("", "service kind cannot be empty"));
    }

    if kind.len() > MAX_KIND_LEN {
        return Err(Error::identifier(
            kind,
            format!("service kind length must be <= {MAX_KIND_LEN}"),
        ));
    }

    if !kind
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(Error::identifier(
            kind,
            "service kind must contain lowercase alphanumeric, dash, underscore, or dot",
        ));
    }

    Ok(())
}

fn require_name(field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::InvalidDescriptor {
            reason: format!("{field} cannot be empty"),
        });
    }
    if value.len() > MAX_NAME_LEN {
        return Err(Error::InvalidDescriptor {
            reason: format!("{field} length must be <= {MAX_NAME_LEN}"),
        });
    }
    Ok(value)
}

/// Identity of the connector implementing a service kind.
///
/// Used for wiring only; decision logic never consults it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConnectorIdentity {
    guid: ElementGuid,
    qualified_name: String,
}

impl ConnectorIdentity {
    /// Creates a connector identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when the qualified name is empty.
    pub fn new(guid: ElementGuid, qualified_name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            guid,
            qualified_name: require_name("connector qualified name", qualified_name.into())?,
        })
    }

    /// Returns the connector type GUID.
    #[must_use]
    pub const fn guid(&self) -> ElementGuid {
        self.guid
    }

    /// Returns the connector's qualified name.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }
}

/// Declares a kind of element an action target may reference.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionTargetType {
    name: String,
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ActionTargetType {
    /// Creates a target type for the role `name` constrained to `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when either field is empty.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: require_name("action target name", name.into())?,
            type_name: require_name("action target type name", type_name.into())?,
            description: None,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the required element type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns `true` when the element satisfies this type constraint.
    #[must_use]
    pub fn matches(&self, element: &ElementRef) -> bool {
        element.is_of_type(&self.type_name)
    }
}

/// Declares a request parameter understood by a service kind.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RequestParameterType {
    name: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    example: Option<String>,
}

impl RequestParameterType {
    /// Creates a parameter declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when the name or description is empty.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(Error::InvalidDescriptor {
                reason: "request parameter description cannot be empty".into(),
            });
        }
        Ok(Self {
            name: require_name("request parameter name", name.into())?,
            description,
            example: None,
        })
    }

    /// Sets an example value.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the example value.
    #[must_use]
    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }
}

/// Immutable, per-kind record used to validate process wiring before execution.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    kind: ServiceKind,
    connector: ConnectorIdentity,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    supported_action_targets: Vec<ActionTargetType>,
    supported_cardinalities: SupportedCardinalities,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    supported_request_parameters: Vec<RequestParameterType>,
    produced_guards: GuardCatalog,
}

impl ProviderDescriptor {
    /// Starts building a descriptor.
    #[must_use]
    pub fn builder(kind: ServiceKind, connector: ConnectorIdentity) -> ProviderDescriptorBuilder {
        ProviderDescriptorBuilder {
            kind,
            connector,
            version: None,
            description: None,
            supported_action_targets: Vec::new(),
            supported_cardinalities: SupportedCardinalities::default(),
            supported_request_parameters: Vec::new(),
            produced_guards: None,
        }
    }

    /// Returns the service kind.
    #[must_use]
    pub fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    /// Returns the connector identity.
    #[must_use]
    pub fn connector(&self) -> &ConnectorIdentity {
        &self.connector
    }

    /// Returns the descriptor version. A changed descriptor is a new version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared action target types.
    #[must_use]
    pub fn supported_action_targets(&self) -> &[ActionTargetType] {
        &self.supported_action_targets
    }

    /// Returns the target cardinalities the kind evaluates.
    #[must_use]
    pub const fn supported_cardinalities(&self) -> SupportedCardinalities {
        self.supported_cardinalities
    }

    /// Returns the declared request parameters.
    #[must_use]
    pub fn supported_request_parameters(&self) -> &[RequestParameterType] {
        &self.supported_request_parameters
    }

    /// Returns the full guard catalog of the kind.
    #[must_use]
    pub fn produced_guards(&self) -> &GuardCatalog {
        &self.produced_guards
    }

    /// Returns `true` when the kind can emit the named guard.
    #[must_use]
    pub fn produces(&self, guard: &str) -> bool {
        self.produced_guards.contains(guard)
    }

    /// Returns `true` when the element satisfies at least one declared target
    /// type, or when no target types were declared.
    #[must_use]
    pub fn accepts_element(&self, element: &ElementRef) -> bool {
        self.supported_action_targets.is_empty()
            || self
                .supported_action_targets
                .iter()
                .any(|target_type| target_type.matches(element))
    }

    /// Returns `true` when the request parameter is declared.
    #[must_use]
    pub fn declares_parameter(&self, name: &str) -> bool {
        self.supported_request_parameters
            .iter()
            .any(|parameter| parameter.name == name)
    }
}

/// Builder for [`ProviderDescriptor`].
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
    kind: ServiceKind,
    connector: ConnectorIdentity,
    version: Option<String>,
    description: Option<String>,
    supported_action_targets: Vec<ActionTargetType>,
    supported_cardinalities: SupportedCardinalities,
    supported_request_parameters: Vec<RequestParameterType>,
    produced_guards: Option<GuardCatalog>,
}

impl ProviderDescriptorBuilder {
    /// Sets the descriptor version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when the version string is empty.
    pub fn version(mut self, version: impl Into<String>) -> Result<Self> {
        self.version = Some(require_name("descriptor version", version.into())?);
        Ok(self)
    }

    /// Sets an optional description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares an action target type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when a target type with the same
    /// role name was already declared.
    pub fn add_action_target(mut self, target_type: ActionTargetType) -> Result<Self> {
        if self
            .supported_action_targets
            .iter()
            .any(|existing| existing.name == target_type.name)
        {
            return Err(Error::InvalidDescriptor {
                reason: format!("action target `{}` declared more than once", target_type.name),
            });
        }
        self.supported_action_targets.push(target_type);
        Ok(self)
    }

    /// Sets the supported target cardinalities.
    #[must_use]
    pub fn cardinalities(mut self, cardinalities: SupportedCardinalities) -> Self {
        self.supported_cardinalities = cardinalities;
        self
    }

    /// Declares a request parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] when the parameter was already declared.
    pub fn add_request_parameter(mut self, parameter: RequestParameterType) -> Result<Self> {
        if self
            .supported_request_parameters
            .iter()
            .any(|existing| existing.name == parameter.name)
        {
            return Err(Error::InvalidDescriptor {
                reason: format!("request parameter `{}` declared more than once", parameter.name),
            });
        }
        self.supported_request_parameters.push(parameter);
        Ok(self)
    }

    /// Sets the guard catalog.
    #[must_use]
    pub fn produced_guards(mut self, catalog: GuardCatalog) -> Self {
        self.produced_guards = Some(catalog);
        self
    }

    /// Consumes the builder and returns the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if the version or guard catalog is
    /// missing, or the kind supports no target cardinality at all.
    pub fn build(self) -> Result<ProviderDescriptor> {
        let version = self.version.ok_or_else(|| Error::InvalidDescriptor {
            reason: "descriptor version must be provided".into(),
        })?;
        let produced_guards = self
            .produced_guards
            .ok_or_else(|| Error::InvalidDescriptor {
                reason: format!("service kind `{}` must declare its guards", self.kind),
            })?;
        if self.supported_cardinalities.is_empty() {
            return Err(Error::InvalidDescriptor {
                reason: "at least one target cardinality must be supported".into(),
            });
        }

        Ok(ProviderDescriptor {
            kind: self.kind,
            connector: self.connector,
            version,
            description: self.description,
            supported_action_targets: self.supported_action_targets,
            supported_cardinalities: self.supported_cardinalities,
            supported_request_parameters: self.supported_request_parameters,
            produced_guards,
        })
    }
}
