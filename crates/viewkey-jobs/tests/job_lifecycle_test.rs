use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};
use viewkey_core::{AppConfig, JobId, ViewingKey, WalletSlug};
use viewkey_jobs::job::lock_job;
use viewkey_jobs::{
    ClassifyContext, FailureCategory, FailureClassifier, FailureKind, ImportRequest, JobError,
    JobManager, JobSnapshot, JobStatus, SyncInvoker, SyncRequest, ToolFailure, ToolOutput,
};

const KEY: &str = "uviewtest1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq";

const REPORT: &str = "\
Transactions:
aa11bb22cc33dd44ee55ff66aa11bb22cc33dd44ee55ff66aa11bb22cc33dd44
    Mined: 2600500 (2024-09-03 12:00:00)
    Amount: 1.25 ZEC
    Output 0 (Orchard)
        Value: 1.25 ZEC
        Received by account: 0
        Memo: Memo::Text(\"thanks\")
0000111122223333444455556666777788889999aaaabbbbccccddddeeeeffff
    Mined: 2500000 (2024-05-01 08:00:00)
    Amount: 0.1 ZEC
";

enum Behavior {
    Report(&'static str),
    Exit { code: i32, stderr: &'static str },
    NoReport,
    Error,
    Panic,
}

struct FakeInvoker {
    behavior: Behavior,
    gate: Option<Arc<Notify>>,
    read_gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl FakeInvoker {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            gate: None,
            read_gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn gated(behavior: Behavior, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(behavior)
        }
    }

    fn read_gated(behavior: Behavior, read_gate: Arc<Notify>) -> Self {
        Self {
            read_gate: Some(read_gate),
            ..Self::new(behavior)
        }
    }
}

#[async_trait]
impl SyncInvoker for FakeInvoker {
    async fn invoke(&self, request: &SyncRequest) -> viewkey_jobs::Result<ToolOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let ok = ToolOutput {
            exit_code: Some(0),
            ..ToolOutput::default()
        };
        match &self.behavior {
            Behavior::Report(text) => {
                let path = request.report_path();
                tokio::fs::create_dir_all(path.parent().expect("report has a parent")).await?;
                tokio::fs::write(&path, text).await?;
                Ok(ok)
            }
            Behavior::Exit { code, stderr } => Ok(ToolOutput {
                exit_code: Some(*code),
                stdout: String::new(),
                stderr: (*stderr).to_string(),
            }),
            Behavior::NoReport => Ok(ok),
            Behavior::Error => Err(JobError::Invoker("failed to start zcash-devtool".to_string())),
            Behavior::Panic => panic!("invoker exploded"),
        }
    }

    async fn read_report(&self, request: &SyncRequest) -> viewkey_jobs::Result<Option<String>> {
        if let Some(gate) = &self.read_gate {
            gate.notified().await;
        }
        match tokio::fs::read_to_string(request.report_path()).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

struct FixedClassifier;

impl FailureClassifier for FixedClassifier {
    fn classify(&self, output: &ToolOutput, ctx: &ClassifyContext<'_>) -> ToolFailure {
        ToolFailure {
            category: FailureCategory::CorruptedWalletDir,
            message: format!(
                "custom: exit {:?} at {}",
                output.exit_code,
                ctx.wallet_dir.display()
            ),
        }
    }
}

fn config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.paths.wallets_dir = dir.path().join("wallets");
    config.paths.exports_dir = dir.path().join("exports");
    config.jobs.progress_tick_ms = 10;
    config
}

fn request() -> ImportRequest {
    ImportRequest::new(ViewingKey::new(KEY).expect("valid key"), 2_600_000)
}

async fn wait_terminal(manager: &JobManager, id: &JobId) -> JobSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = manager.poll(id).expect("job registered");
            if snapshot.status.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job finished in time")
}

#[tokio::test]
async fn test_create_returns_before_completion() {
    let dir = TempDir::new().expect("temp dir");
    let gate = Arc::new(Notify::new());
    let invoker = Arc::new(FakeInvoker::gated(Behavior::Report(REPORT), gate.clone()));
    let manager = JobManager::new(invoker, &config(&dir));

    let id = assert_ok!(manager.create(request()));
    let pending = assert_ok!(manager.poll(&id));
    assert!(!pending.status.is_terminal());
    assert!(pending.progress < 100);
    assert!(pending.result.is_none());

    gate.notify_one();
    let done = wait_terminal(&manager, &id).await;
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.progress, 100);
    assert_eq!(done.message, "Done.");
}

#[tokio::test]
async fn test_done_result_is_filtered_and_delivered_once() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::Report(REPORT))),
        &config(&dir),
    );

    let id = manager.create(request()).expect("create job");
    let done = wait_terminal(&manager, &id).await;

    let report = done.result.expect("result on done");
    let slug = WalletSlug::derive(&ViewingKey::new(KEY).expect("valid key"));
    assert_eq!(report.wallet_name, "webwallet");
    assert_eq!(report.birthday, 2_600_000);
    assert_eq!(report.slug, slug);
    assert_eq!(report.file, format!("{slug}_txs.txt"));
    assert_eq!(report.raw_text, REPORT);
    assert_eq!(report.transactions.len(), 1);
    assert_eq!(report.dropped_below_birthday, 1);
    assert_eq!(report.transactions[0].outputs[0].memo.as_deref(), Some("thanks"));

    let json = serde_json::to_string(&report).expect("serialize report");
    assert!(!json.contains(KEY));

    assert!(matches!(manager.poll(&id), Err(JobError::NotFound(_))));
    assert!(manager.registry().is_empty());
}

#[tokio::test]
async fn test_custom_wallet_name_is_used() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::Report(REPORT))),
        &config(&dir),
    );

    let id = manager
        .create(request().with_wallet_name("donations"))
        .expect("create job");
    let report = wait_terminal(&manager, &id)
        .await
        .result
        .expect("result on done");
    assert_eq!(report.wallet_name, "donations");
}

#[tokio::test]
async fn test_store_locked_failure() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::Exit {
            code: 1,
            stderr: "Error: SqliteClientError: database is locked",
        })),
        &config(&dir),
    );

    let id = manager.create(request()).expect("create job");
    let failed = wait_terminal(&manager, &id).await;

    let slug = WalletSlug::derive(&ViewingKey::new(KEY).expect("valid key"));
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.message, "Sync failed.");
    assert_eq!(failed.failure, Some(FailureKind::StoreLocked));
    assert!(failed.error.expect("error on failure").contains(slug.as_str()));
    assert!(failed.progress >= 20 && failed.progress < 100);
    assert!(failed.result.is_none());
}

#[tokio::test]
async fn test_unsupported_birthday_failure() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::Exit {
            code: 1,
            stderr: "status: InvalidArgument, message: \"GetTreeState: no tree state\"",
        })),
        &config(&dir),
    );

    let id = manager.create(request()).expect("create job");
    let failed = wait_terminal(&manager, &id).await;
    assert_eq!(failed.failure, Some(FailureKind::BirthdayUnsupported));
    assert!(failed.error.expect("error on failure").contains("2600000"));
}

#[tokio::test]
async fn test_missing_report_failure() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::NoReport)),
        &config(&dir),
    );

    let id = manager.create(request()).expect("create job");
    let failed = wait_terminal(&manager, &id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.message, "Sync failed (no output).");
    assert_eq!(failed.failure, Some(FailureKind::MissingOutput));
    assert!(failed.error.expect("error on failure").contains("_txs.txt"));
}

#[tokio::test]
async fn test_invoker_error_becomes_crash() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(Arc::new(FakeInvoker::new(Behavior::Error)), &config(&dir));

    let id = manager.create(request()).expect("create job");
    let failed = wait_terminal(&manager, &id).await;
    assert_eq!(failed.message, "Sync crashed.");
    assert_eq!(failed.failure, Some(FailureKind::WorkerFault));
    assert!(failed
        .error
        .expect("error on failure")
        .contains("failed to start zcash-devtool"));
}

#[tokio::test]
async fn test_worker_panic_becomes_crash() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(Arc::new(FakeInvoker::new(Behavior::Panic)), &config(&dir));

    let id = manager.create(request()).expect("create job");
    let failed = wait_terminal(&manager, &id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.message, "Sync crashed.");
    assert!(failed
        .error
        .expect("error on failure")
        .contains("invoker exploded"));
}

#[tokio::test]
async fn test_birthday_below_minimum_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = config(&dir);
    config.jobs.min_birthday_height = Some(419_200);
    let invoker = Arc::new(FakeInvoker::new(Behavior::NoReport));
    let manager = JobManager::new(invoker.clone(), &config);

    let low = ImportRequest::new(ViewingKey::new(KEY).expect("valid key"), 1);
    assert!(matches!(
        manager.create(low),
        Err(JobError::InvalidRequest(_))
    ));
    assert!(manager.registry().is_empty());
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_poll_unknown_job() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::NoReport)),
        &config(&dir),
    );
    let id = JobId::new("0123456789ab").expect("valid job ID");
    let err = assert_err!(manager.poll(&id));
    assert!(matches!(err, JobError::NotFound(_)));
}

#[tokio::test]
async fn test_identical_requests_get_distinct_ids() {
    let dir = TempDir::new().expect("temp dir");
    let gate = Arc::new(Notify::new());
    let manager = JobManager::new(
        Arc::new(FakeInvoker::gated(Behavior::NoReport, gate)),
        &config(&dir),
    );

    let ids: Vec<JobId> = (0..20)
        .map(|_| manager.create(request()).expect("create job"))
        .collect();
    let unique: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(manager.registry().len(), ids.len());
}

#[tokio::test]
async fn test_custom_classifier_replaces_substring_rules() {
    let dir = TempDir::new().expect("temp dir");
    let manager = JobManager::new(
        Arc::new(FakeInvoker::new(Behavior::Exit {
            code: 3,
            stderr: "Error: SqliteClientError: database is locked",
        })),
        &config(&dir),
    )
    .with_classifier(Arc::new(FixedClassifier));

    let id = manager.create(request()).expect("create job");
    let failed = wait_terminal(&manager, &id).await;

    let slug = WalletSlug::derive(&ViewingKey::new(KEY).expect("valid key"));
    assert_eq!(failed.message, "Sync failed.");
    assert_eq!(failed.failure, Some(FailureKind::CorruptedWalletDir));
    let error = failed.error.expect("error on failure");
    assert!(error.starts_with("custom: exit Some(3)"));
    assert!(error.contains(slug.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_progress_stays_where_the_estimator_left_it() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = config(&dir);
    config.jobs.progress_tick_ms = 1000;
    let gate = Arc::new(Notify::new());
    let manager = JobManager::new(
        Arc::new(FakeInvoker::gated(
            Behavior::Exit {
                code: 1,
                stderr: "database is locked",
            },
            gate.clone(),
        )),
        &config,
    );

    let id = manager.create(request()).expect("create job");
    tokio::time::sleep(Duration::from_millis(1)).await;
    let cell = manager.registry().get(&id).expect("job registered");

    // estimates run 5, 8, 11 ... one per second; the tenth tick gives 35
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let running = manager.poll(&id).expect("job registered");
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.message, "Syncing wallet…");
    assert_eq!(running.progress, 35);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(1)).await;
    let failed = manager.poll(&id).expect("job registered");
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.progress, 35);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(lock_job(&cell).progress, 35);
}

#[tokio::test]
async fn test_parsing_stage_is_visible_before_done() {
    let dir = TempDir::new().expect("temp dir");
    let read_gate = Arc::new(Notify::new());
    let manager = JobManager::new(
        Arc::new(FakeInvoker::read_gated(
            Behavior::Report(REPORT),
            read_gate.clone(),
        )),
        &config(&dir),
    );

    let id = manager.create(request()).expect("create job");
    let parsing = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = manager.poll(&id).expect("job registered");
            if snapshot.message == "Parsing results…" {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("parsing stage reached in time");
    assert_eq!(parsing.status, JobStatus::Running);
    assert_eq!(parsing.progress, 90);
    assert!(parsing.result.is_none());

    read_gate.notify_one();
    let done = wait_terminal(&manager, &id).await;
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.progress, 100);
}
