//! Verifies a handful of seeded assets and routes them through a two-step process.

use std::num::NonZeroUsize;
use std::sync::Arc;

use action_config::{KernelConfig, RequestParameters};
use action_kernel::{ActionKernel, InvocationReport, ProcessWiring, ProviderRegistry};
use action_policy::integrations::{ElementState, InMemoryElementStore};
use action_policy::verification::{
    ASSET_TYPE, AssetVerificationEngine, OWNERSHIP_CLASSIFICATION, ORIGIN_CLASSIFICATION,
    VERIFY_ASSET_KIND, ZONE_CLASSIFICATION,
};
use action_primitives::{
    ActionTarget, ActionTargetSet, CompletionStatus, ConnectorIdentity, ElementGuid, ElementRef,
    GuardCatalog, GuardName, GuardType, ProviderDescriptor, ServiceKind,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Run the asset verification engine against seeded assets")]
struct Args {
    /// Maximum concurrent invocations.
    #[arg(long, default_value_t = NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN))]
    max_concurrency: NonZeroUsize,
    /// Reject request parameters the service kind does not declare.
    #[arg(long)]
    strict: bool,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    action_telemetry::tracing_support::init_tracing(&args.log_filter)?;

    let store = Arc::new(InMemoryElementStore::new());
    let registry = Arc::new(ProviderRegistry::new());

    let verifier = AssetVerificationEngine::new(
        Arc::clone(&store),
        ConnectorIdentity::new(ElementGuid::random(), "demo.verify-asset.connector")?,
    )?;
    registry.register_engine(Arc::new(verifier))?;
    registry.register(quarantine_descriptor()?)?;
    registry.seal();

    let wiring = ProcessWiring::new("onboard-asset")
        .with_step("verify", ServiceKind::new(VERIFY_ASSET_KIND)?)
        .with_step("quarantine", ServiceKind::new("quarantine-asset")?)
        .with_transition("verify", GuardName::new("no-origin")?, "quarantine")
        .with_transition("verify", GuardName::new("verification-failed")?, "quarantine");
    registry
        .validate_wiring(&wiring)
        .context("onboarding process is miswired")?;
    info!(process = wiring.name(), "process wiring validated");

    let config = KernelConfig::new(args.max_concurrency, args.strict);
    let kernel = ActionKernel::new(Arc::clone(&registry), config)?;
    let kind = ServiceKind::new(VERIFY_ASSET_KIND)?;

    let unclassified = seed(&store, "CSVFile", &[])?;
    let missing_origin = seed(&store, "CSVFile", &[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION])?;
    let complete = seed(
        &store,
        "DataFile",
        &[ZONE_CLASSIFICATION, OWNERSHIP_CLASSIFICATION, ORIGIN_CLASSIFICATION],
    )?;
    let process = ElementRef::new(ElementGuid::random(), "GovernanceActionProcess")?;
    store.upsert(ElementState::new(process.clone()))?;

    let batches = [
        ("unclassified asset", vec![unclassified.clone()]),
        ("asset without origin", vec![missing_origin]),
        ("fully classified asset", vec![complete]),
        ("non-asset element", vec![process]),
        ("no targets", vec![]),
        ("three targets", vec![unclassified.clone(), unclassified.clone(), unclassified]),
    ];

    let mut handles = Vec::with_capacity(batches.len());
    for (label, elements) in batches {
        let targets = elements
            .into_iter()
            .map(|element| ActionTarget::new("asset", element))
            .collect::<action_primitives::Result<Vec<_>>>()?;
        let handle = kernel.invoke(
            &kind,
            ActionTargetSet::from(targets),
            RequestParameters::new(),
        )?;
        handles.push((label, handle));
    }

    for (label, handle) in handles {
        let report = handle.wait().await?;
        print_report(label, &report, &wiring);
    }

    kernel.shutdown();
    Ok(())
}

fn seed(
    store: &InMemoryElementStore,
    type_name: &str,
    classifications: &[&str],
) -> Result<ElementRef> {
    let element =
        ElementRef::new(ElementGuid::random(), type_name)?.with_super_types([ASSET_TYPE]);
    let state = classifications
        .iter()
        .fold(ElementState::new(element.clone()), |state, name| {
            state.with_classification(*name)
        });
    store.upsert(state)?;
    Ok(element)
}

fn quarantine_descriptor() -> Result<ProviderDescriptor> {
    let catalog = GuardCatalog::builder()
        .add(GuardType::new(
            GuardName::new("quarantined")?,
            CompletionStatus::Actioned,
            "The asset was moved to the quarantine zone.",
        )?)?
        .build()?;
    Ok(ProviderDescriptor::builder(
        ServiceKind::new("quarantine-asset")?,
        ConnectorIdentity::new(ElementGuid::random(), "demo.quarantine-asset.connector")?,
    )
    .version("1.0.0")?
    .produced_guards(catalog)
    .build()?)
}

fn print_report(label: &str, report: &InvocationReport, wiring: &ProcessWiring) {
    let status = report
        .completion_status()
        .map_or("none", CompletionStatus::as_str);
    let guards: Vec<&str> = report.guards().iter().map(GuardName::as_str).collect();
    let next: Vec<&str> = wiring
        .transitions()
        .iter()
        .filter(|transition| {
            transition.from_step() == "verify" && report.guards().contains(transition.guard())
        })
        .map(|transition| transition.to_step())
        .collect();

    println!("{label}");
    println!("  status: {status}");
    println!("  guards: {guards:?}");
    if let Some(error) = report.error() {
        println!("  error:  {error}");
    }
    if !next.is_empty() {
        println!("  next:   {next:?}");
    }
}
