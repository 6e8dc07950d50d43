//! End-to-end suite runs against a simulated cluster-deployment fleet.
//!
//! The fleet simulator stands in for the external control plane and
//! hypervisor: it boots nodes, deploys clusters, and verifies networks,
//! counting how often the expensive operations happen so the tests can
//! assert that memoization and blocking behave as promised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use rigor_plan::Selection;
use rigor_registry::{case_assert, CaseBody, CaseContext, CaseError, Registry, TestCase};
use rigor_runner::{MemorySink, Outcome, Suite};
use rigor_snapshot::{MemoryStore, SnapshotStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rigor_runner=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Fleet simulator
// =============================================================================

#[derive(Default)]
struct ClusterSim {
    nodes: HashMap<String, Vec<String>>,
    deployed: bool,
}

/// Simulated control plane and node fleet.
struct FleetSim {
    booted_nodes: AtomicUsize,
    clusters: Mutex<HashMap<u64, ClusterSim>>,
    next_cluster_id: AtomicU64,
    deploys: AtomicUsize,
    network_broken: AtomicBool,
}

impl FleetSim {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            booted_nodes: AtomicUsize::new(0),
            clusters: Mutex::new(HashMap::new()),
            next_cluster_id: AtomicU64::new(1),
            deploys: AtomicUsize::new(0),
            network_broken: AtomicBool::new(false),
        })
    }

    fn boot_nodes(&self, count: usize) {
        self.booted_nodes.fetch_add(count, Ordering::SeqCst);
    }

    fn create_cluster(&self) -> u64 {
        let id = self.next_cluster_id.fetch_add(1, Ordering::SeqCst);
        let mut clusters = self.clusters.lock().unwrap();
        clusters.insert(id, ClusterSim::default());
        id
    }

    fn assign_role(&self, cluster_id: u64, node: &str, role: &str) -> anyhow::Result<()> {
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&cluster_id)
            .ok_or_else(|| anyhow!("no cluster {cluster_id}"))?;
        cluster
            .nodes
            .entry(node.to_string())
            .or_default()
            .push(role.to_string());
        Ok(())
    }

    async fn deploy(&self, cluster_id: u64) -> anyhow::Result<()> {
        // The real operation takes minutes; the simulator only records
        // that it happened.
        tokio::task::yield_now().await;
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&cluster_id)
            .ok_or_else(|| anyhow!("no cluster {cluster_id}"))?;
        if cluster.nodes.is_empty() {
            return Err(anyhow!("cluster {cluster_id} has no nodes assigned"));
        }
        cluster.deployed = true;
        self.deploys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn verify_network(&self, cluster_id: u64) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        if self.network_broken.load(Ordering::SeqCst) {
            return Err(anyhow!("network verification task failed"));
        }
        let clusters = self.clusters.lock().unwrap();
        let cluster = clusters
            .get(&cluster_id)
            .ok_or_else(|| anyhow!("no cluster {cluster_id}"))?;
        if !cluster.deployed {
            return Err(anyhow!("cluster {cluster_id} not deployed"));
        }
        Ok(())
    }

    fn service_count(&self, cluster_id: u64) -> usize {
        let clusters = self.clusters.lock().unwrap();
        clusters
            .get(&cluster_id)
            .map(|c| c.nodes.values().map(|roles| roles.len() * 3).sum())
            .unwrap_or(0)
    }

    fn deploy_count(&self) -> usize {
        self.deploys.load(Ordering::SeqCst)
    }

    fn booted_count(&self) -> usize {
        self.booted_nodes.load(Ordering::SeqCst)
    }

    fn break_network(&self) {
        self.network_broken.store(true, Ordering::SeqCst);
    }
}

fn cluster_id_from(ctx: &CaseContext) -> Result<u64, CaseError> {
    ctx.env
        .get("cluster_id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| CaseError::assertion("cluster_id missing from environment"))
}

// =============================================================================
// Suite cases
// =============================================================================

/// Boot the slave fleet. Produces the `ready_with_3_slaves` snapshot.
struct PrepareSlaves {
    fleet: Arc<FleetSim>,
}

#[async_trait]
impl CaseBody for PrepareSlaves {
    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        self.fleet.boot_nodes(3);
        ctx.env.set("slaves", serde_json::json!(3));
        Ok(())
    }
}

/// Create and deploy a controller + compute cluster. Produces the
/// `deploy_simple_flat` snapshot.
struct DeploySimpleFlat {
    fleet: Arc<FleetSim>,
}

#[async_trait]
impl CaseBody for DeploySimpleFlat {
    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        case_assert!(
            ctx.env.get("slaves").is_some(),
            "slave fleet missing from restored environment"
        );

        let cluster_id = self.fleet.create_cluster();
        self.fleet
            .assign_role(cluster_id, "slave-01", "controller")
            .context("assigning controller")?;
        self.fleet
            .assign_role(cluster_id, "slave-02", "compute")
            .context("assigning compute")?;
        self.fleet.deploy(cluster_id).await?;

        let services = self.fleet.service_count(cluster_id);
        case_assert!(services == 6, "expected 6 services, found {services}");

        ctx.env.set("cluster_id", serde_json::json!(cluster_id));
        Ok(())
    }
}

/// Run network verification against the deployed cluster.
struct VerifyNetworks {
    fleet: Arc<FleetSim>,
}

#[async_trait]
impl CaseBody for VerifyNetworks {
    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        let cluster_id = cluster_id_from(ctx)?;
        self.fleet.verify_network(cluster_id).await?;
        Ok(())
    }
}

/// Check the per-node service roster on the deployed cluster.
struct VerifyServices {
    fleet: Arc<FleetSim>,
}

#[async_trait]
impl CaseBody for VerifyServices {
    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        let cluster_id = cluster_id_from(ctx)?;
        let services = self.fleet.service_count(cluster_id);
        case_assert!(services == 6, "expected 6 services, found {services}");
        Ok(())
    }
}

fn suite_registry(fleet: &Arc<FleetSim>) -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            TestCase::builder("prepare_slaves")
                .produces_snapshot("ready_with_3_slaves")
                .body(Arc::new(PrepareSlaves {
                    fleet: Arc::clone(fleet),
                }))
                .build(),
        )
        .unwrap();
    registry
        .register(
            TestCase::builder("deploy_simple_flat")
                .group("smoke")
                .depends_on("prepare_slaves")
                .restores_snapshot("ready_with_3_slaves")
                .produces_snapshot("deploy_simple_flat")
                .body(Arc::new(DeploySimpleFlat {
                    fleet: Arc::clone(fleet),
                }))
                .build(),
        )
        .unwrap();
    registry
        .register(
            TestCase::builder("simple_flat_verify_networks")
                .group("smoke")
                .depends_on("deploy_simple_flat")
                .restores_snapshot("deploy_simple_flat")
                .body(Arc::new(VerifyNetworks {
                    fleet: Arc::clone(fleet),
                }))
                .build(),
        )
        .unwrap();
    registry
        .register(
            TestCase::builder("simple_flat_verify_services")
                .group("smoke")
                .depends_on("deploy_simple_flat")
                .restores_snapshot("deploy_simple_flat")
                .body(Arc::new(VerifyServices {
                    fleet: Arc::clone(fleet),
                }))
                .build(),
        )
        .unwrap();
    registry
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn smoke_suite_passes_end_to_end() {
    init_tracing();
    let fleet = FleetSim::new();
    let store = Arc::new(MemoryStore::new());
    let suite = Suite::new(
        suite_registry(&fleet),
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
    );

    let report = suite.run(&Selection::groups(["smoke"])).await.unwrap();

    assert!(report.is_success(), "report:\n{report}");
    assert_eq!(report.entries.len(), 4);
    assert_eq!(report.passed_count(), 4);

    // Both setup snapshots were captured.
    assert!(store.exists("ready_with_3_slaves").await.unwrap());
    assert!(store.exists("deploy_simple_flat").await.unwrap());
    assert_eq!(fleet.booted_count(), 3);
    assert_eq!(fleet.deploy_count(), 1);
}

#[tokio::test]
async fn warm_cache_rerun_skips_expensive_setup() {
    init_tracing();
    let fleet = FleetSim::new();
    let store = Arc::new(MemoryStore::new());
    let suite = Suite::new(
        suite_registry(&fleet),
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
    );

    let first = suite.run(&Selection::groups(["smoke"])).await.unwrap();
    assert!(first.is_success(), "first run:\n{first}");
    assert_eq!(fleet.deploy_count(), 1);

    let second = suite.run(&Selection::groups(["smoke"])).await.unwrap();
    assert!(second.is_success(), "second run:\n{second}");
    assert_eq!(
        second.outcome_of("prepare_slaves"),
        Some(&Outcome::SkippedMemoized)
    );
    assert_eq!(
        second.outcome_of("deploy_simple_flat"),
        Some(&Outcome::SkippedMemoized)
    );
    assert_eq!(
        second.outcome_of("simple_flat_verify_networks"),
        Some(&Outcome::Passed)
    );
    assert_eq!(
        second.outcome_of("simple_flat_verify_services"),
        Some(&Outcome::Passed)
    );

    // The deployment never ran a second time.
    assert_eq!(fleet.deploy_count(), 1);
}

#[tokio::test]
async fn network_failure_blocks_dependents_and_captures_diagnostics() {
    init_tracing();
    let fleet = FleetSim::new();
    fleet.break_network();

    let mut registry = suite_registry(&fleet);
    registry
        .register(
            TestCase::builder("after_verify")
                .depends_on("simple_flat_verify_networks")
                .build(),
        )
        .unwrap();

    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let suite = Suite::new(registry, Arc::clone(&store) as Arc<dyn SnapshotStore>)
        .with_sink(Arc::clone(&sink) as Arc<dyn rigor_runner::DiagnosticSink>);

    let report = suite
        .run(&Selection::names([
            "simple_flat_verify_networks",
            "simple_flat_verify_services",
            "after_verify",
        ]))
        .await
        .unwrap();

    // Deployment itself succeeded; only the network verification failed.
    assert_eq!(
        report.outcome_of("deploy_simple_flat"),
        Some(&Outcome::Passed)
    );
    assert!(matches!(
        report.outcome_of("simple_flat_verify_networks"),
        Some(Outcome::Failed { .. })
    ));
    assert_eq!(
        report.outcome_of("after_verify"),
        Some(&Outcome::Blocked {
            on: "simple_flat_verify_networks".into()
        })
    );

    // The sibling branch kept running.
    assert_eq!(
        report.outcome_of("simple_flat_verify_services"),
        Some(&Outcome::Passed)
    );

    // Diagnostics captured, with the cluster state at failure time and a
    // failure snapshot beside it.
    let captures = sink.captures();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].failure.case, "simple_flat_verify_networks");
    assert!(captures[0].env.get("cluster_id").is_some());
    assert!(store
        .exists("error_simple_flat_verify_networks")
        .await
        .unwrap());

    let failed_entry = report
        .entries
        .iter()
        .find(|e| e.case == "simple_flat_verify_networks")
        .unwrap();
    assert_eq!(failed_entry.diagnostic, Some(captures[0].reference.clone()));
}

#[tokio::test]
async fn report_renders_one_line_per_case() {
    init_tracing();
    let fleet = FleetSim::new();
    let suite = Suite::new(suite_registry(&fleet), Arc::new(MemoryStore::new()));

    let report = suite.run(&Selection::groups(["smoke"])).await.unwrap();
    let rendered = report.to_string();

    // Header plus one line per planned case.
    assert_eq!(rendered.lines().count(), 5);
    for case in [
        "prepare_slaves",
        "deploy_simple_flat",
        "simple_flat_verify_networks",
        "simple_flat_verify_services",
    ] {
        assert!(rendered.contains(case), "missing {case} in:\n{rendered}");
    }
}
