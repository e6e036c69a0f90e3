//! Reference engine: verifies that an asset carries zone, owner, and origin
//! classifications.

use std::collections::BTreeSet;
use std::sync::Arc;

use action_config::{ConfigError, RequestParameters};
use action_primitives::{
    ActionTargetType, CompletionStatus, ConnectorIdentity, GuardCatalog, GuardToken,
    ProviderDescriptor, RequestParameterType, ServiceKind, SupportedCardinalities,
    TargetCardinality,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::contracts::ActionContext;
use crate::decision::ActionOutcome;
use crate::dimensions::{Dimension, DimensionTable};
use crate::engine::{DecisionEngine, EngineError, EngineResult, enforce_cardinality};
use crate::integrations::{ElementAccessor, ElementState};

/// Service kind implemented by [`AssetVerificationEngine`].
pub const VERIFY_ASSET_KIND: &str = "verify-asset";
/// Element type every target must be (or inherit from).
pub const ASSET_TYPE: &str = "Asset";
/// Classification recording governance zone membership.
pub const ZONE_CLASSIFICATION: &str = "AssetZoneMembership";
/// Classification recording ownership.
pub const OWNERSHIP_CLASSIFICATION: &str = "Ownership";
/// Classification recording where the asset came from.
pub const ORIGIN_CLASSIFICATION: &str = "AssetOrigin";

/// Request parameter listing dimensions whose absence fails the invocation.
pub const MANDATORY_DIMENSIONS_PARAMETER: &str = "mandatoryDimensions";
/// Request parameter applying mandatory checks to unclassified assets too.
pub const ENFORCE_ON_UNCLASSIFIED_PARAMETER: &str = "enforceOnUnclassified";

/// Guards produced by the asset verification engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyAssetGuard {
    /// The asset belongs to at least one governance zone.
    ZonesAssigned,
    /// The asset belongs to no governance zone.
    NoZones,
    /// The asset has an owner.
    OwnerAssigned,
    /// The asset has no owner.
    NoOwner,
    /// The asset's origin is recorded.
    OriginAssigned,
    /// The asset's origin is not recorded.
    NoOrigin,
    /// The target is not an asset.
    TargetNotAsset,
    /// No target was supplied.
    NoTargetsDetected,
    /// More than one target was supplied.
    MultipleTargetsDetected,
    /// The asset could not be inspected.
    VerificationFailed,
}

impl GuardToken for VerifyAssetGuard {
    fn all() -> &'static [Self] {
        &[
            Self::ZonesAssigned,
            Self::NoZones,
            Self::OwnerAssigned,
            Self::NoOwner,
            Self::OriginAssigned,
            Self::NoOrigin,
            Self::TargetNotAsset,
            Self::NoTargetsDetected,
            Self::MultipleTargetsDetected,
            Self::VerificationFailed,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            Self::ZonesAssigned => "zones-assigned",
            Self::NoZones => "no-zones",
            Self::OwnerAssigned => "owner-assigned",
            Self::NoOwner => "no-owner",
            Self::OriginAssigned => "origin-assigned",
            Self::NoOrigin => "no-origin",
            Self::TargetNotAsset => "target-not-asset",
            Self::NoTargetsDetected => "no-targets-detected",
            Self::MultipleTargetsDetected => "multiple-targets-detected",
            Self::VerificationFailed => "verification-failed",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::ZonesAssigned => "The asset is a member of one or more governance zones.",
            Self::NoZones => "The asset is not a member of any governance zone.",
            Self::OwnerAssigned => "The asset has an owner.",
            Self::NoOwner => "The asset does not have an owner.",
            Self::OriginAssigned => "The origin of the asset is recorded.",
            Self::NoOrigin => "The origin of the asset is not recorded.",
            Self::TargetNotAsset => "The action target is not an asset.",
            Self::NoTargetsDetected => "No action target was supplied.",
            Self::MultipleTargetsDetected => {
                "More than one action target was supplied; supply exactly one asset."
            }
            Self::VerificationFailed => "The asset could not be retrieved or inspected.",
        }
    }

    fn typical_completion_status(self) -> CompletionStatus {
        match self {
            Self::ZonesAssigned
            | Self::NoZones
            | Self::OwnerAssigned
            | Self::NoOwner
            | Self::OriginAssigned => CompletionStatus::Actioned,
            Self::NoOrigin | Self::VerificationFailed => CompletionStatus::Failed,
            Self::TargetNotAsset | Self::NoTargetsDetected | Self::MultipleTargetsDetected => {
                CompletionStatus::Invalid
            }
        }
    }
}

/// Which missing classifications fail the invocation.
///
/// By default only a missing origin fails it, and only for assets that carry
/// at least one classification; an asset with no classifications at all is
/// reported with every absence guard and an ACTIONED status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    mandatory_dimensions: BTreeSet<String>,
    enforce_on_unclassified: bool,
}

impl VerificationPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new<I, S>(mandatory_dimensions: I, enforce_on_unclassified: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mandatory_dimensions: mandatory_dimensions.into_iter().map(Into::into).collect(),
            enforce_on_unclassified,
        }
    }

    /// Derives the policy from request parameters, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for malformed values or
    /// dimension names the engine does not check.
    pub fn from_parameters(
        parameters: &RequestParameters,
        known_dimensions: &DimensionTable<VerifyAssetGuard>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mandatory_dimensions = match parameters.get_string_list(MANDATORY_DIMENSIONS_PARAMETER)? {
            Some(names) => {
                if let Some(unknown) = names.iter().find(|name| !known_dimensions.contains(name)) {
                    return Err(ConfigError::InvalidParameter {
                        name: MANDATORY_DIMENSIONS_PARAMETER.to_owned(),
                        reason: format!("unknown dimension `{unknown}`"),
                    });
                }
                names.into_iter().collect()
            }
            None => defaults.mandatory_dimensions,
        };

        let enforce_on_unclassified = parameters
            .get_bool(ENFORCE_ON_UNCLASSIFIED_PARAMETER)?
            .unwrap_or(defaults.enforce_on_unclassified);

        Ok(Self {
            mandatory_dimensions,
            enforce_on_unclassified,
        })
    }

    /// Returns `true` when absence of the named dimension fails the invocation.
    #[must_use]
    pub fn is_mandatory(&self, dimension: &str) -> bool {
        self.mandatory_dimensions.contains(dimension)
    }

    /// Returns `true` when mandatory checks also apply to unclassified assets.
    #[must_use]
    pub const fn enforce_on_unclassified(&self) -> bool {
        self.enforce_on_unclassified
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::new(["origin"], false)
    }
}

/// Checks a single asset for zone membership, ownership, and origin.
pub struct AssetVerificationEngine<A>
where
    A: ElementAccessor + ?Sized,
{
    accessor: Arc<A>,
    descriptor: Arc<ProviderDescriptor>,
    dimensions: DimensionTable<VerifyAssetGuard>,
}

impl<A> std::fmt::Debug for AssetVerificationEngine<A>
where
    A: ElementAccessor + ?Sized,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetVerificationEngine")
            .field("accessor", &"dyn ElementAccessor")
            .field("kind", self.descriptor.kind())
            .field("dimensions", &self.dimensions.names().collect::<Vec<_>>())
            .finish()
    }
}

impl<A> AssetVerificationEngine<A>
where
    A: ElementAccessor + ?Sized,
{
    /// Creates the engine reading element state through `accessor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the static descriptor fails validation.
    pub fn new(accessor: Arc<A>, connector: ConnectorIdentity) -> action_primitives::Result<Self> {
        Ok(Self {
            accessor,
            descriptor: Arc::new(Self::describe(connector)?),
            dimensions: default_dimensions(),
        })
    }

    /// Builds the descriptor advertised for [`VERIFY_ASSET_KIND`].
    ///
    /// # Errors
    ///
    /// Returns an error if the guard vocabulary or descriptor fails validation.
    pub fn describe(connector: ConnectorIdentity) -> action_primitives::Result<ProviderDescriptor> {
        ProviderDescriptor::builder(ServiceKind::new(VERIFY_ASSET_KIND)?, connector)
            .version("1.0.0")?
            .description("Verifies that an asset has zones, an owner, and a recorded origin.")
            .add_action_target(
                ActionTargetType::new("asset", ASSET_TYPE)?
                    .with_description("The asset to verify."),
            )?
            .cardinalities(SupportedCardinalities::single_only())
            .add_request_parameter(
                RequestParameterType::new(
                    MANDATORY_DIMENSIONS_PARAMETER,
                    "Dimensions whose absence fails the verification (zones, owner, origin).",
                )?
                .with_example("origin,owner"),
            )?
            .add_request_parameter(
                RequestParameterType::new(
                    ENFORCE_ON_UNCLASSIFIED_PARAMETER,
                    "Apply mandatory dimensions to assets that carry no classifications at all.",
                )?
                .with_example("false"),
            )?
            .produced_guards(GuardCatalog::from_tokens::<VerifyAssetGuard>()?)
            .build()
    }

    /// Derives the outcome for an already resolved asset.
    ///
    /// A pure function of the snapshot and policy.
    #[must_use]
    pub fn assess(
        &self,
        state: &ElementState,
        policy: &VerificationPolicy,
    ) -> ActionOutcome {
        if !self.descriptor.accepts_element(state.element()) {
            return ActionOutcome::single(CompletionStatus::Invalid, VerifyAssetGuard::TargetNotAsset)
                .with_output("elementType", state.element().type_name());
        }

        let findings = self.dimensions.evaluate(state.classifications());
        let unclassified = state.classifications().is_empty();
        let missing: Vec<&str> = findings
            .iter()
            .filter(|finding| !finding.present)
            .map(|finding| finding.dimension)
            .collect();
        let fails = (!unclassified || policy.enforce_on_unclassified())
            && missing.iter().any(|dimension| policy.is_mandatory(dimension));

        let status = if fails {
            CompletionStatus::Failed
        } else {
            CompletionStatus::Actioned
        };

        ActionOutcome::from_tokens(status, findings.iter().map(|finding| finding.guard))
            .with_output("assetGuid", state.element().guid().to_string())
            .with_output(
                "missingDimensions",
                Value::from(missing.iter().map(|d| Value::from(*d)).collect::<Vec<_>>()),
            )
    }

    async fn verify(&self, ctx: &mut ActionContext) -> EngineResult<ActionOutcome> {
        ctx.checkpoint()?;

        if let Some(outcome) = enforce_cardinality(
            self.descriptor.supported_cardinalities(),
            ctx.targets(),
            |cardinality| match cardinality {
                TargetCardinality::Zero => VerifyAssetGuard::NoTargetsDetected,
                TargetCardinality::One | TargetCardinality::Many => {
                    VerifyAssetGuard::MultipleTargetsDetected
                }
            },
        ) {
            return Ok(outcome);
        }

        let policy = VerificationPolicy::from_parameters(ctx.parameters(), &self.dimensions)?;

        let target = ctx
            .targets_mut()
            .single_mut()
            .ok_or_else(|| EngineError::evaluation("expected exactly one action target"))?;
        target.begin(Utc::now())?;
        let guid = target.element().guid();

        debug!(%guid, "resolving asset");
        let state = self
            .accessor
            .element(guid)
            .await
            .map_err(|source| EngineError::Resolution { guid, source })?;

        ctx.checkpoint()?;
        Ok(self.assess(&state, &policy))
    }
}

fn default_dimensions() -> DimensionTable<VerifyAssetGuard> {
    DimensionTable::new()
        .with(Dimension::new(
            "zones",
            ZONE_CLASSIFICATION,
            VerifyAssetGuard::ZonesAssigned,
            VerifyAssetGuard::NoZones,
        ))
        .with(Dimension::new(
            "owner",
            OWNERSHIP_CLASSIFICATION,
            VerifyAssetGuard::OwnerAssigned,
            VerifyAssetGuard::NoOwner,
        ))
        .with(Dimension::new(
            "origin",
            ORIGIN_CLASSIFICATION,
            VerifyAssetGuard::OriginAssigned,
            VerifyAssetGuard::NoOrigin,
        ))
}

#[async_trait]
impl<A> DecisionEngine for AssetVerificationEngine<A>
where
    A: ElementAccessor + ?Sized + 'static,
{
    fn descriptor(&self) -> Arc<ProviderDescriptor> {
        Arc::clone(&self.descriptor)
    }

    async fn evaluate(&self, ctx: &mut ActionContext) -> EngineResult<()> {
        match self.verify(ctx).await {
            Ok(outcome) => {
                info!(
                    invocation_id = %ctx.invocation_id(),
                    status = %outcome.status(),
                    guards = ?outcome.guards(),
                    "asset verification complete"
                );
                ctx.record_completion(outcome)
            }
            Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
            Err(err) => {
                warn!(invocation_id = %ctx.invocation_id(), error = %err, "asset verification failed");
                ctx.record_completion(
                    ActionOutcome::single(
                        CompletionStatus::Failed,
                        VerifyAssetGuard::VerificationFailed,
                    )
                    .with_output("error", err.to_string()),
                )?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use action_primitives::{
        ActionTarget, ActionTargetSet, ElementGuid, ElementRef, GuardName, TargetStatus,
    };
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::contracts::{ActionRequest, ContractViolation};
    use crate::integrations::InMemoryElementStore;

    fn engine(store: Arc<InMemoryElementStore>) -> AssetVerificationEngine<InMemoryElementStore> {
        let connector =
            ConnectorIdentity::new(ElementGuid::random(), "governance.verify-asset.connector")
                .unwrap();
        AssetVerificationEngine::new(store, connector).unwrap()
    }

    fn asset_ref() -> ElementRef {
        ElementRef::new(ElementGuid::random(), "CSVFile")
            .unwrap()
            .with_super_types(["DataFile", "DataStore", ASSET_TYPE, "Referenceable"])
    }

    fn names(outcome: &ActionOutcome) -> Vec<&str> {
        outcome.guards().iter().map(GuardName::as_str).collect()
    }

    fn context_for(
        engine: &AssetVerificationEngine<InMemoryElementStore>,
        elements: &[ElementRef],
        parameters: RequestParameters,
    ) -> ActionContext {
        let targets: ActionTargetSet = elements
            .iter()
            .map(|element| ActionTarget::new("asset", element.clone()).unwrap())
            .collect();
        let request = ActionRequest::new(ServiceKind::new(VERIFY_ASSET_KIND).unwrap(), targets)
            .with_parameters(parameters);
        ActionContext::new(request, engine.descriptor(), CancellationToken::new())
    }

    #[test]
    fn descriptor_declares_every_guard() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));
        let descriptor = engine.descriptor();
        for token in VerifyAssetGuard::all() {
            assert!(descriptor.produces(token.name()), "{}", token.name());
        }
        assert_eq!(descriptor.produced_guards().len(), VerifyAssetGuard::all().len());
    }

    #[test]
    fn asset_check_follows_declared_target_types() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));
        let descriptor = engine.descriptor();
        let glossary = ElementRef::new(ElementGuid::random(), "GlossaryTerm").unwrap();
        let policy = VerificationPolicy::default();

        for element in [asset_ref(), glossary] {
            let outcome = engine.assess(&ElementState::new(element.clone()), &policy);
            let rejected = outcome.status() == CompletionStatus::Invalid;
            assert_eq!(
                rejected,
                !descriptor.accepts_element(&element),
                "{}",
                element.type_name()
            );
        }
    }

    #[test]
    fn unclassified_asset_is_actioned_with_all_absence_guards() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));
        let state = ElementState::new(asset_ref());

        let outcome = engine.assess(&state, &VerificationPolicy::default());
        assert_eq!(outcome.status(), CompletionStatus::Actioned);
        assert_eq!(names(&outcome), ["no-zones", "no-owner", "no-origin"]);
    }

    #[test]
    fn missing_origin_fails_classified_asset() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));
        let state = ElementState::new(asset_ref())
            .with_classification(ZONE_CLASSIFICATION)
            .with_classification(OWNERSHIP_CLASSIFICATION);

        let outcome = engine.assess(&state, &VerificationPolicy::default());
        assert_eq!(outcome.status(), CompletionStatus::Failed);
        assert_eq!(names(&outcome), ["zones-assigned", "owner-assigned", "no-origin"]);
        assert_eq!(
            outcome.output().get("missingDimensions"),
            Some(&Value::from(vec![Value::from("origin")]))
        );
    }

    #[test]
    fn policy_can_relax_or_tighten_mandatory_dimensions() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));
        let classified = ElementState::new(asset_ref()).with_classification(ZONE_CLASSIFICATION);

        let relaxed = VerificationPolicy::new(Vec::<String>::new(), false);
        assert_eq!(
            engine.assess(&classified, &relaxed).status(),
            CompletionStatus::Actioned
        );

        let strict = VerificationPolicy::new(["origin"], true);
        let bare = ElementState::new(asset_ref());
        assert_eq!(engine.assess(&bare, &strict).status(), CompletionStatus::Failed);
    }

    #[test]
    fn policy_rejects_unknown_dimensions() {
        let params = RequestParameters::new().with(MANDATORY_DIMENSIONS_PARAMETER, "origin,colour");
        let err = VerificationPolicy::from_parameters(&params, &default_dimensions()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));

        let params = RequestParameters::new()
            .with(MANDATORY_DIMENSIONS_PARAMETER, "owner")
            .with(ENFORCE_ON_UNCLASSIFIED_PARAMETER, true);
        let policy = VerificationPolicy::from_parameters(&params, &default_dimensions()).unwrap();
        assert!(policy.is_mandatory("owner"));
        assert!(!policy.is_mandatory("origin"));
        assert!(policy.enforce_on_unclassified());
    }

    #[tokio::test]
    async fn non_asset_target_is_invalid() {
        let store = Arc::new(InMemoryElementStore::new());
        let process = ElementRef::new(ElementGuid::random(), "Process").unwrap();
        store
            .upsert(
                ElementState::new(process.clone())
                    .with_classification(ZONE_CLASSIFICATION)
                    .with_classification(ORIGIN_CLASSIFICATION),
            )
            .unwrap();
        let engine = engine(store);
        let mut ctx = context_for(&engine, &[process], RequestParameters::new());

        engine.evaluate(&mut ctx).await.unwrap();

        let (request, record) = ctx.into_parts();
        let outcome = record.verify().unwrap();
        assert_eq!(outcome.status(), CompletionStatus::Invalid);
        assert_eq!(names(&outcome), ["target-not-asset"]);
        assert_eq!(
            request.targets().single().unwrap().status(),
            TargetStatus::Invalid
        );
    }

    #[tokio::test]
    async fn unresolvable_asset_fails_and_propagates() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));
        let mut ctx = context_for(&engine, &[asset_ref()], RequestParameters::new());

        let err = engine.evaluate(&mut ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Resolution { .. }));

        let (request, record) = ctx.into_parts();
        let outcome = record.verify().unwrap();
        assert_eq!(outcome.status(), CompletionStatus::Failed);
        assert_eq!(names(&outcome), ["verification-failed"]);
        let target = request.targets().single().unwrap();
        assert_eq!(target.status(), TargetStatus::Failed);
        assert!(target.start_time().is_some());
        assert!(target.completion_time().is_some());
    }

    #[tokio::test]
    async fn cardinality_is_checked_before_anything_else() {
        let engine = engine(Arc::new(InMemoryElementStore::new()));

        let mut ctx = context_for(&engine, &[], RequestParameters::new());
        engine.evaluate(&mut ctx).await.unwrap();
        let outcome = ctx.into_parts().1.verify().unwrap();
        assert_eq!(outcome.status(), CompletionStatus::Invalid);
        assert_eq!(names(&outcome), ["no-targets-detected"]);

        let mut ctx = context_for(
            &engine,
            &[asset_ref(), asset_ref(), asset_ref()],
            RequestParameters::new().with(MANDATORY_DIMENSIONS_PARAMETER, "nonsense"),
        );
        engine.evaluate(&mut ctx).await.unwrap();
        let (request, record) = ctx.into_parts();
        let outcome = record.verify().unwrap();
        assert_eq!(outcome.status(), CompletionStatus::Invalid);
        assert_eq!(names(&outcome), ["multiple-targets-detected"]);
        assert!(request.targets().iter().all(|t| t.status() == TargetStatus::Invalid));
    }

    #[tokio::test]
    async fn cancelled_invocation_records_nothing() {
        let store = Arc::new(InMemoryElementStore::new());
        let asset = asset_ref();
        store.upsert(ElementState::new(asset.clone())).unwrap();
        let engine = engine(store);

        let token = CancellationToken::new();
        let targets = ActionTargetSet::new().with_target(ActionTarget::new("asset", asset).unwrap());
        let request = ActionRequest::new(ServiceKind::new(VERIFY_ASSET_KIND).unwrap(), targets);
        let mut ctx = ActionContext::new(request, engine.descriptor(), token.clone());
        token.cancel();

        let err = engine.evaluate(&mut ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert_eq!(
            ctx.into_parts().1.verify(),
            Err(ContractViolation::NoCompletion)
        );
    }
}
