#![cfg(all(feature = "kernel", feature = "policy", feature = "config"))]

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::join_all;
use governance_actions::config::{KernelConfig, RequestParameters};
use governance_actions::kernel::{ActionKernel, ProviderRegistry, Verdict};
use governance_actions::policy::engine::EngineError;
use governance_actions::policy::integrations::{ElementState, InMemoryElementStore};
use governance_actions::policy::verification::{
    ASSET_TYPE, AssetVerificationEngine, OWNERSHIP_CLASSIFICATION, ORIGIN_CLASSIFICATION,
    VERIFY_ASSET_KIND, ZONE_CLASSIFICATION,
};
use governance_actions::primitives::{
    ActionTarget, ActionTargetSet, CompletionStatus, ConnectorIdentity, ElementGuid, ElementRef,
    GuardName, ServiceKind, TargetStatus,
};

struct Harness {
    kernel: ActionKernel,
    store: Arc<InMemoryElementStore>,
    kind: ServiceKind,
}

impl Harness {
    fn new(max_concurrency: usize) -> Self {
        let store = Arc::new(InMemoryElementStore::new());
        let connector =
            ConnectorIdentity::new(ElementGuid::random(), "governance.verify-asset.connector")
                .unwrap();
        let engine = AssetVerificationEngine::new(Arc::clone(&store), connector).unwrap();

        let registry = Arc::new(ProviderRegistry::new());
        registry.register_engine(Arc::new(engine)).unwrap();
        registry.seal();

        let config = KernelConfig::new(NonZeroUsize::new(max_concurrency).unwrap(), false);
        Self {
            kernel: ActionKernel::new(registry, config).unwrap(),
            store,
            kind: ServiceKind::new(VERIFY_ASSET_KIND).unwrap(),
        }
    }

    fn asset(&self, classifications: &[&str]) -> ElementRef {
        let element = ElementRef::new(ElementGuid::random(), "CSVFile")
            .unwrap()
            .with_super_types(["DataFile", ASSET_TYPE]);
        let state = classifications
            .iter()
            .fold(ElementState::new(element.clone()), |state, name| {
                state.with_classification(*name)
            });
        self.store.upsert(state).unwrap();
        element
    }

    async fn verify(&self, elements: &[ElementRef]) -> (CompletionStatus, Vec<String>) {
        let report = self
            .kernel
            .run(&self.kind, targets(elements), RequestParameters::new())
            .await
            .unwrap();
        let guards = report.guards().iter().map(ToString::to_string).collect();
        (report.completion_status().unwrap(), guards)
    }
}

fn targets(elements: &[ElementRef]) -> ActionTargetSet {
    elements
        .iter()
        .map(|element| ActionTarget::new("asset", element.clone()).unwrap())
        .collect()
}

#[tokio::test]
async fn unclassified_asset_reports_every_absence() {
    let harness = Harness::new(4);
    let asset = harness.asset(&[]);

    let (status, guards) = harness.verify(&[asset]).await;
    assert_eq!(status, CompletionStatus::Actioned);
    assert_eq!(guards, ["no-zones", "no-owner", "no-origin"]);
}

#[tokio::test]
async fn missing_origin_fails_an_otherwise_classified_asset() {
    let harness = Harness::new(4);
    let asset = harness.asset(&[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION]);

    let (status, guards) = harness.verify(&[asset]).await;
    assert_eq!(status, CompletionStatus::Failed);
    assert_eq!(guards, ["zones-assigned", "owner-assigned", "no-origin"]);
}

#[tokio::test]
async fn fully_classified_asset_is_actioned() {
    let harness = Harness::new(4);
    let asset = harness.asset(&[
        ZONE_CLASSIFICATION,
        OWNERSHIP_CLASSIFICATION,
        ORIGIN_CLASSIFICATION,
    ]);

    let (status, guards) = harness.verify(&[asset]).await;
    assert_eq!(status, CompletionStatus::Actioned);
    assert_eq!(guards, ["zones-assigned", "owner-assigned", "origin-assigned"]);
}

#[tokio::test]
async fn non_asset_target_short_circuits_content_checks() {
    let harness = Harness::new(4);
    let process = ElementRef::new(ElementGuid::random(), "GovernanceActionProcess").unwrap();
    harness
        .store
        .upsert(ElementState::new(process.clone()).with_classification(ZONE_CLASSIFICATION))
        .unwrap();

    let (status, guards) = harness.verify(&[process]).await;
    assert_eq!(status, CompletionStatus::Invalid);
    assert_eq!(guards, ["target-not-asset"]);
}

#[tokio::test]
async fn empty_target_set_is_invalid() {
    let harness = Harness::new(4);

    let (status, guards) = harness.verify(&[]).await;
    assert_eq!(status, CompletionStatus::Invalid);
    assert_eq!(guards, ["no-targets-detected"]);
}

#[tokio::test]
async fn several_targets_are_invalid_regardless_of_content() {
    let harness = Harness::new(4);
    let elements = [
        harness.asset(&[]),
        harness.asset(&[ORIGIN_CLASSIFICATION]),
        harness.asset(&[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION]),
    ];

    let report = harness
        .kernel
        .run(&harness.kind, targets(&elements), RequestParameters::new())
        .await
        .unwrap();
    assert_eq!(report.completion_status(), Some(CompletionStatus::Invalid));
    assert_eq!(report.guards(), [GuardName::new("multiple-targets-detected").unwrap()]);
    assert!(
        report
            .targets()
            .iter()
            .all(|target| target.status() == TargetStatus::Invalid)
    );
}

#[tokio::test]
async fn repeated_evaluation_is_stable() {
    let harness = Harness::new(4);
    let asset = harness.asset(&[OWNERSHIP_CLASSIFICATION]);

    let first = harness.verify(std::slice::from_ref(&asset)).await;
    let second = harness.verify(std::slice::from_ref(&asset)).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn each_dimension_contributes_exactly_one_guard() {
    let harness = Harness::new(4);
    let dimensions = [
        (ZONE_CLASSIFICATION, "zones-assigned", "no-zones"),
        (OWNERSHIP_CLASSIFICATION, "owner-assigned", "no-owner"),
        (ORIGIN_CLASSIFICATION, "origin-assigned", "no-origin"),
    ];

    for mask in 0..8_u8 {
        let present: Vec<&str> = dimensions
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, (classification, _, _))| *classification)
            .collect();
        let asset = harness.asset(&present);

        let (_, guards) = harness.verify(&[asset]).await;
        let guards: BTreeSet<String> = guards.into_iter().collect();
        assert_eq!(guards.len(), dimensions.len(), "mask {mask:03b}");
        for (classification, yes, no) in dimensions {
            let expected = if present.contains(&classification) { yes } else { no };
            let unexpected = if present.contains(&classification) { no } else { yes };
            assert!(guards.contains(expected), "mask {mask:03b}: {guards:?}");
            assert!(!guards.contains(unexpected), "mask {mask:03b}: {guards:?}");
        }
    }
}

#[tokio::test]
async fn emitted_guards_always_validate_against_the_registry() {
    let harness = Harness::new(4);
    let registry = harness.kernel.registry();
    let scenarios: Vec<Vec<ElementRef>> = vec![
        vec![],
        vec![harness.asset(&[])],
        vec![harness.asset(&[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION])],
        vec![harness.asset(&[]), harness.asset(&[])],
        vec![ElementRef::new(ElementGuid::random(), "CSVFile").unwrap()],
    ];

    for elements in scenarios {
        let report = harness
            .kernel
            .run(&harness.kind, targets(&elements), RequestParameters::new())
            .await
            .unwrap();
        assert!(!report.guards().is_empty());
        for guard in report.guards() {
            registry
                .validate_transition(VERIFY_ASSET_KIND, guard.as_str(), VERIFY_ASSET_KIND)
                .unwrap();
        }
    }
}

#[tokio::test]
async fn unreadable_asset_fails_and_propagates_the_fault() {
    let harness = Harness::new(4);
    let missing = ElementRef::new(ElementGuid::random(), "CSVFile")
        .unwrap()
        .with_super_types([ASSET_TYPE]);

    let report = harness
        .kernel
        .run(&harness.kind, targets(&[missing]), RequestParameters::new())
        .await
        .unwrap();
    assert!(matches!(report.verdict(), Verdict::Faulted { .. }));
    assert!(matches!(report.error(), Some(EngineError::Resolution { .. })));
    assert_eq!(report.completion_status(), Some(CompletionStatus::Failed));
    assert_eq!(report.guards(), [GuardName::new("verification-failed").unwrap()]);
}

#[tokio::test]
async fn request_parameters_adjust_the_failure_policy() {
    let harness = Harness::new(4);
    let unclassified = harness.asset(&[]);

    let strict = RequestParameters::new()
        .with("mandatoryDimensions", serde_json::json!(["origin", "owner"]))
        .with("enforceOnUnclassified", true);
    let report = harness
        .kernel
        .run(&harness.kind, targets(&[unclassified]), strict)
        .await
        .unwrap();
    assert_eq!(report.completion_status(), Some(CompletionStatus::Failed));

    let partial = harness.asset(&[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION]);
    let relaxed = RequestParameters::new().with("mandatoryDimensions", serde_json::json!([]));
    let report = harness
        .kernel
        .run(&harness.kind, targets(&[partial]), relaxed)
        .await
        .unwrap();
    assert_eq!(report.completion_status(), Some(CompletionStatus::Actioned));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invocations_stay_independent() {
    let harness = Harness::new(3);
    let mut expected = Vec::new();
    let mut handles = Vec::new();

    for i in 0..24 {
        let (classes, status): (&[&str], CompletionStatus) = match i % 3 {
            0 => (&[], CompletionStatus::Actioned),
            1 => (
                &[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION],
                CompletionStatus::Failed,
            ),
            _ => (
                &[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION, ORIGIN_CLASSIFICATION],
                CompletionStatus::Actioned,
            ),
        };
        let asset = harness.asset(classes);
        let handle = harness
            .kernel
            .invoke(&harness.kind, targets(&[asset]), RequestParameters::new())
            .unwrap();
        expected.push((handle.id(), status));
        handles.push(handle.wait());
    }

    let reports = join_all(handles).await;
    for (report, (id, status)) in reports.into_iter().zip(expected) {
        let report = report.unwrap();
        assert_eq!(report.invocation_id(), id);
        assert_eq!(report.completion_status(), Some(status));
        assert_eq!(report.guards().len(), 3);
        assert!(report.targets().all_terminal());
    }
}
