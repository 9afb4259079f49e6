//! Cross-language payment flow: a Python service called through a
//! controller and an HTTP route, plus a frontend that hits the route.

use codemap_extract::NodeKind;
use codemap_graph::{find_usages, impact_analysis, CancelToken, Direction, EdgeKind};
use codemap_indexer::{FileWatcher, IndexStats, ProjectIndexer, WatchConfig};
use codemap_risk::{analyze_diff, RiskBand, RiskBands};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time;

const PAYMENT_SERVICE: &str = r#"class PaymentService:
    def charge(self, user_id, amount, currency):
        ledger.record(user_id, amount, currency)
        return True
"#;

const PAYMENT_SERVICE_WITH_REFUND: &str = r#"class PaymentService:
    def charge(self, user_id, amount, currency):
        ledger.record(user_id, amount, currency)
        return True

    def refund(self, user_id, amount):
        ledger.reverse(user_id, amount)
        return True
"#;

const USER_CONTROLLER: &str = r#"from backend.payment_service import PaymentService


class UserController:
    def processPayment(self, user_id, amount):
        service = PaymentService()
        return service.charge(user_id, amount, "USD")
"#;

const ROUTES: &str = r#"from backend.user_controller import UserController


@app.post("/api/v1/users/{id}/pay")
def pay_user(id, amount):
    controller = UserController()
    return controller.processPayment(id, amount)
"#;

const CHECKOUT: &str = r#"class CheckoutPage {
    async submitPayment(userId, amount) {
        const response = await fetch(`/api/v1/users/${userId}/pay`, {
            method: "POST",
            body: JSON.stringify({ amount }),
        });
        return response.json();
    }
}
"#;

const CHARGE_DIFF: &str = "\
--- a/backend/payment_service.py
+++ b/backend/payment_service.py
@@ -2,3 +2,4 @@
     def charge(self, user_id, amount, currency):
+        audit.log(user_id)
         ledger.record(user_id, amount, currency)
         return True
";

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn write_fixture(root: &Path) {
    tokio::fs::create_dir_all(root.join("backend"))
        .await
        .expect("mkdir backend");
    tokio::fs::create_dir_all(root.join("frontend"))
        .await
        .expect("mkdir frontend");
    tokio::fs::write(root.join("backend/payment_service.py"), PAYMENT_SERVICE)
        .await
        .expect("write service");
    tokio::fs::write(root.join("backend/user_controller.py"), USER_CONTROLLER)
        .await
        .expect("write controller");
    tokio::fs::write(root.join("backend/routes.py"), ROUTES)
        .await
        .expect("write routes");
    tokio::fs::write(root.join("frontend/checkout.js"), CHECKOUT)
        .await
        .expect("write checkout");
}

async fn indexed_project() -> (TempDir, ProjectIndexer, IndexStats) {
    let dir = TempDir::new().expect("tempdir");
    write_fixture(dir.path()).await;
    let indexer = ProjectIndexer::new(dir.path()).expect("indexer");
    let stats = indexer.index_full().await.expect("full index");
    (dir, indexer, stats)
}

#[tokio::test]
async fn payment_flow_links_graph_across_languages() {
    init_logs();
    let (_dir, indexer, stats) = indexed_project().await;

    assert_eq!(stats.files, 4);
    assert_eq!(stats.languages.get("python"), Some(&3));
    assert_eq!(stats.languages.get("javascript"), Some(&1));
    assert!(stats.errors.is_empty(), "errors: {:?}", stats.errors);
    assert_eq!(stats.resolved_calls, 4);
    assert_eq!(stats.bridges, 1);

    let snapshot = indexer.graph().snapshot();
    // ledger.record, fetch and response.json have no targets here
    assert_eq!(snapshot.unresolved_count(), 3);

    let hits = snapshot.lookup_by_name("charge");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].qualified_name, "PaymentService.charge");

    let cancel = CancelToken::new();
    let direct =
        impact_analysis(&snapshot, "charge", 1, Direction::Callers, &cancel).expect("impact");
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].node.name, "processPayment");
    assert_eq!(direct[0].distance, 1);

    let transitive =
        impact_analysis(&snapshot, "charge", 2, Direction::Callers, &cancel).expect("impact");
    let names: Vec<&str> = transitive.iter().map(|i| i.node.name.as_str()).collect();
    assert_eq!(transitive.len(), 2);
    assert!(names.contains(&"processPayment"));
    assert!(names.contains(&"pay_user"));

    let endpoint = snapshot
        .nodes()
        .find(|n| n.kind == NodeKind::Endpoint)
        .expect("endpoint node");
    assert_eq!(endpoint.name, "/api/v1/users/{id}/pay");
    let bridges = snapshot.neighbors(&endpoint.id, Direction::Callers, Some(EdgeKind::Bridges));
    assert_eq!(bridges.len(), 1);
    let frontend_caller = snapshot
        .lookup_by_id(&bridges[0].from_node)
        .expect("bridge caller");
    assert_eq!(frontend_caller.name, "submitPayment");
    assert_eq!(frontend_caller.file, "frontend/checkout.js");

    let usages = find_usages(&snapshot, "charge", None, Some("USD")).expect("usages");
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].caller.name, "processPayment");

    let report = analyze_diff(&snapshot, CHARGE_DIFF, &RiskBands::default()).expect("diff");
    assert_eq!(report.files, 1);
    assert_eq!(report.symbols.len(), 2);
    let touched = &report.symbols[1];
    assert_eq!(touched.name, "charge");
    assert_eq!(touched.caller_count, 1);
    assert_eq!(touched.risk_band, RiskBand::Low);
    assert_eq!(report.highest, Some(RiskBand::Low));
}

#[tokio::test]
async fn incremental_update_and_removal_keep_graph_linked() {
    init_logs();
    let (dir, indexer, _) = indexed_project().await;
    let cancel = CancelToken::new();

    tokio::fs::write(
        dir.path().join("backend/payment_service.py"),
        PAYMENT_SERVICE_WITH_REFUND,
    )
    .await
    .expect("rewrite service");
    let stats = indexer
        .update_file(Path::new("backend/payment_service.py"), &cancel)
        .await
        .expect("update");
    assert_eq!(stats.files, 1);

    let snapshot = indexer.graph().snapshot();
    assert_eq!(snapshot.lookup_by_name("refund").len(), 1);
    // the re-commit relinked the cross-file call and kept the bridge
    let charge = &snapshot.lookup_by_name("charge")[0];
    let callers = snapshot.neighbors(&charge.id, Direction::Callers, Some(EdgeKind::Calls));
    assert_eq!(callers.len(), 1);
    assert_eq!(
        snapshot
            .edges()
            .filter(|e| e.kind == EdgeKind::Bridges)
            .count(),
        1
    );

    tokio::fs::remove_file(dir.path().join("backend/routes.py"))
        .await
        .expect("delete routes");
    indexer
        .remove_file(Path::new("backend/routes.py"))
        .expect("remove from graph");

    let snapshot = indexer.graph().snapshot();
    assert!(!snapshot.contains_file("backend/routes.py"));
    assert!(!snapshot.nodes().any(|n| n.kind == NodeKind::Endpoint));
    assert_eq!(
        snapshot
            .edges()
            .filter(|e| e.kind == EdgeKind::Bridges)
            .count(),
        0
    );

    let transitive =
        impact_analysis(&snapshot, "charge", 2, Direction::Callers, &cancel).expect("impact");
    assert_eq!(transitive.len(), 1);
    assert_eq!(transitive[0].node.name, "processPayment");
}

#[tokio::test]
async fn watcher_reindexes_touched_path() {
    init_logs();
    let (dir, indexer, _) = indexed_project().await;
    let indexer = Arc::new(indexer);

    let config = WatchConfig {
        debounce: Duration::from_millis(50),
        max_batch_wait: Duration::from_millis(500),
        queue_capacity: 64,
    };
    let watcher = match FileWatcher::start(indexer.clone(), config) {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("skipping, filesystem watcher unavailable: {e}");
            return;
        }
    };
    let mut updates = watcher.subscribe();

    tokio::fs::write(
        dir.path().join("backend/payment_service.py"),
        PAYMENT_SERVICE_WITH_REFUND,
    )
    .await
    .expect("rewrite service");
    watcher
        .touch("backend/payment_service.py")
        .await
        .expect("touch");

    loop {
        let update = match time::timeout(Duration::from_secs(10), updates.recv()).await {
            Ok(Ok(update)) => update,
            Ok(Err(_)) | Err(_) => {
                eprintln!("skipping, no watcher update arrived");
                return;
            }
        };
        if update.success && update.path.ends_with("backend/payment_service.py") {
            break;
        }
    }

    let snapshot = indexer.graph().snapshot();
    assert_eq!(snapshot.lookup_by_name("refund").len(), 1);
}
