use super::{cohort_fixture, payload, start_server};
use hotswap::catalog::rotation::TagRotator;
use hotswap::client::config::ClientConfig;
use hotswap::client::restart::{Restart, RestartTarget};
use hotswap::client::{ClientContext, CycleOutcome, Updater};
use hotswap::core::HotswapError;
use hotswap::platform::Platform;
use hotswap::test_utils::LogCapture;
use hotswap::verification::ChecksumVerifier;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records restart requests instead of replacing the test process.
#[derive(Default, Clone)]
struct RecordingRestart {
    calls: Arc<Mutex<Vec<RestartTarget>>>,
}

impl Restart for RecordingRestart {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn restart(&self, target: &RestartTarget) -> Result<Infallible, HotswapError> {
        self.calls.lock().unwrap().push(target.clone());
        Err(HotswapError::Restart {
            path: target.executable.display().to_string(),
            reason: "recorded by test".to_string(),
        })
    }
}

fn installed_client(dir: &Path, version: &str) -> PathBuf {
    let exe = dir.join("hotswap-app");
    std::fs::write(&exe, payload(version)).unwrap();
    exe
}

fn updater(
    server_url: &str,
    exe: PathBuf,
    version: &str,
    restarter: RecordingRestart,
) -> Updater {
    let ctx = Arc::new(ClientContext::new(
        server_url,
        exe,
        version.to_string(),
        Platform::Linux,
    ));
    let config = ClientConfig::new(server_url);
    Updater::new(ctx, &config)
        .unwrap()
        .with_restarter(Box::new(restarter))
}

#[tokio::test]
async fn test_up_to_date_client_downloads_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/releases/linux/latest/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Checksum": "sha256:00",
            "Platform": "linux",
            "Tags": ["odd", "latest"],
            "Version": "1.5",
            "Md5": ""
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/releases/linux/1.5"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload("1.5")))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let exe = installed_client(temp_dir.path(), "1.5");
    let restarter = RecordingRestart::default();
    let updater = updater(&server.uri(), exe.clone(), "1.5", restarter.clone());

    let logs = LogCapture::default();
    let outcome = {
        let _guard = logs.install();
        updater.run_cycle().await.unwrap()
    };
    assert_eq!(outcome, CycleOutcome::UpToDate);
    assert_eq!(logs.contents().matches("already latest").count(), 1);
    assert!(restarter.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read(&exe).unwrap(), payload("1.5"));
    assert!(!updater.installer().swap().backup_exists());
}

#[tokio::test]
async fn test_failed_restart_is_retried_without_reinstalling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/releases/linux/latest/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Checksum": ChecksumVerifier::sha256_of(&payload("2.0")),
            "Platform": "linux",
            "Tags": ["even", "latest"],
            "Version": "2.0",
            "Md5": ""
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/releases/linux/2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload("2.0")))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let exe = installed_client(temp_dir.path(), "1.0");
    let restarter = RecordingRestart::default();
    let updater = updater(&server.uri(), exe.clone(), "1.0", restarter.clone());

    for _ in 0..2 {
        let outcome = updater.run_cycle().await.unwrap();
        assert!(
            matches!(outcome, CycleOutcome::RestartFailed { ref version, .. } if version == "2.0")
        );
    }

    assert_eq!(restarter.calls.lock().unwrap().len(), 2);
    assert_eq!(std::fs::read(&exe).unwrap(), payload("2.0"));
    assert_eq!(
        std::fs::read(updater.installer().swap().backup_path()).unwrap(),
        payload("1.0")
    );
}

#[tokio::test]
async fn test_client_follows_rotation_in_both_directions() {
    let fixture = cohort_fixture();
    let (catalog, server) = start_server(&fixture).await;
    let rotator = TagRotator::new(Arc::clone(&catalog));
    rotator.rotate_for_minute(8);

    let temp_dir = TempDir::new().unwrap();
    let exe = installed_client(temp_dir.path(), "1.0");
    let restarter = RecordingRestart::default();
    let updater = updater(&server.url(), exe.clone(), "1.0", restarter.clone());

    // Even minute: 2.0 is latest, client on 1.0 upgrades
    let outcome = updater.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::RestartFailed {
            version: "2.0".to_string(),
            reason: format!("Failed to restart {}: recorded by test", exe.display()),
        }
    );
    assert_eq!(std::fs::read(&exe).unwrap(), payload("2.0"));
    assert_eq!(
        std::fs::read(updater.installer().swap().backup_path()).unwrap(),
        payload("1.0")
    );
    assert!(!updater.installer().staged_path().exists());

    {
        let calls = restarter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].executable, exe);
        assert_eq!(calls[0].args[..2], ["--server".to_string(), server.url()]);
    }

    // Odd minute: 1.0 is latest again, which is still the running image
    rotator.rotate_for_minute(9);
    assert_eq!(updater.run_cycle().await.unwrap(), CycleOutcome::UpToDate);
}

#[tokio::test]
async fn test_older_latest_is_installed() {
    let fixture = cohort_fixture();
    let (catalog, server) = start_server(&fixture).await;
    TagRotator::new(Arc::clone(&catalog)).rotate_for_minute(1);

    let temp_dir = TempDir::new().unwrap();
    let exe = installed_client(temp_dir.path(), "2.0");
    let updater = updater(&server.url(), exe.clone(), "2.0", RecordingRestart::default());

    let outcome = updater.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::RestartFailed { ref version, .. } if version == "1.0"));
    assert_eq!(std::fs::read(&exe).unwrap(), payload("1.0"));
}

#[tokio::test]
async fn test_missing_latest_abandons_cycle() {
    let fixture = cohort_fixture();
    let (catalog, server) = start_server(&fixture).await;
    TagRotator::new(Arc::clone(&catalog)).rotate_for_minute(2);

    let temp_dir = TempDir::new().unwrap();
    let exe = installed_client(temp_dir.path(), "1.2");
    let ctx = Arc::new(ClientContext::new(
        server.url(),
        exe.clone(),
        "1.2".to_string(),
        Platform::Windows,
    ));
    let restarter = RecordingRestart::default();
    let updater = Updater::new(ctx, &ClientConfig::new(server.url()))
        .unwrap()
        .with_restarter(Box::new(restarter.clone()));

    let err = updater.run_cycle().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HotswapError>(),
        Some(HotswapError::ServerStatus { status: 404, .. })
    ));
    assert_eq!(std::fs::read(&exe).unwrap(), payload("1.2"));
    assert!(restarter.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_leaves_binary_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let exe = installed_client(temp_dir.path(), "1.0");
    // Port 9 (discard) on loopback is not expected to run an HTTP server
    let updater = updater(
        "http://127.0.0.1:9",
        exe.clone(),
        "1.0",
        RecordingRestart::default(),
    );

    assert!(updater.run_cycle().await.is_err());
    assert_eq!(std::fs::read(&exe).unwrap(), payload("1.0"));
}
