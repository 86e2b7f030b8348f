//! REST client and console commands against the mock backend.

mod mock_backend;

use collector_console::config::BackendConfig;
use collector_console::console::{Console, OutputKind};
use collector_console::dashboard::Style;
use collector_console::panels::PanelSet;
use collector_console::protocol::{LineKind, Topic};
use collector_console::rest_client::BackendClient;

use mock_backend::{Mock, start};

async fn client(mock: Mock) -> BackendClient {
    let addr = start(mock).await;
    BackendClient::new(&BackendConfig {
        base_url: format!("http://{}", addr),
        ..BackendConfig::default()
    })
    .unwrap()
}

fn errors(out: &[(String, OutputKind)]) -> Vec<&str> {
    out.iter()
        .filter(|(_, k)| *k == OutputKind::Error)
        .map(|(t, _)| t.as_str())
        .collect()
}

#[tokio::test]
async fn session_lifecycle() {
    let mock = Mock::default();
    let backend = client(mock.clone()).await;

    let status = backend.session_status().await.unwrap();
    assert!(!status.active);
    assert_eq!(status.id, None);

    let msg = backend.start_session("ses_test").await.unwrap();
    assert_eq!(msg, "Session started with label: ses_test");
    assert_eq!(mock.session.lock().unwrap().as_deref(), Some("ses_test"));
    assert_eq!(backend.session_status().await.unwrap().id, Some(3));

    let outcome = backend.stop_session().await.unwrap();
    assert_eq!(outcome.message.as_deref(), Some("Current Session Ended"));
    let backup = outcome.backup.unwrap();
    assert!(backup.success);
    assert_eq!(backup.path.as_deref(), Some("/db_backups/backup_1.dump"));
    assert!(mock.session.lock().unwrap().is_none());
}

#[tokio::test]
async fn failure_replies_become_errors() {
    let backend = client(Mock::default()).await;

    let err = backend.start_session("fail").await.unwrap_err();
    assert!(err.to_string().contains("database is locked"));

    let err = backend.create_backup().await.unwrap_err();
    assert!(err.to_string().contains("pg_dump not found"));

    let err = backend.restore_backup("nope.dump").await.unwrap_err();
    assert!(err.to_string().contains("404"), "{}", err);

    let err = backend.session_data(Topic::Imu, "missing").await.unwrap_err();
    assert!(err.to_string().contains("no such session"));
}

#[tokio::test]
async fn relay_posts_type_and_text() {
    let mock = Mock::default();
    let backend = client(mock.clone()).await;

    backend
        .send(Topic::Robot, LineKind::Error, "arm fault")
        .await
        .unwrap();

    let relayed = mock.relayed.lock().unwrap().clone();
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].0, "robot");
    assert_eq!(relayed[0].1["type"], "error");
    assert_eq!(relayed[0].1["text"], "arm fault");
}

#[tokio::test]
async fn backups_and_history() {
    let backend = client(Mock::default()).await;
    assert_eq!(
        backend.list_backups().await.unwrap(),
        vec!["backup_1.dump", "backup_2.dump"]
    );
    backend.restore_backup("backup_2.dump").await.unwrap();
    assert_eq!(backend.session_data(Topic::Camera, "ses_a").await.unwrap().len(), 3);
    assert_eq!(backend.list_sessions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_backend_reports_transport_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap();
    let backend = BackendClient::new(&BackendConfig {
        base_url: format!("http://127.0.0.1:{}", port),
        ..BackendConfig::default()
    })
    .unwrap();
    let err = backend.list_backups().await.unwrap_err();
    assert!(err.to_string().contains("Is the backend running?"));
}

#[tokio::test]
async fn console_reports_outcomes() {
    let mock = Mock::default();
    let backend = client(mock.clone()).await;
    let mut console = Console::new(PanelSet::empty(), backend, Style::plain());

    let out = console.execute("restore backup_1.dump").await;
    assert!(errors(&out).is_empty());
    assert_eq!(out.last().unwrap().0, "Loaded backup successfully");

    let out = console.execute("restore gone.dump").await;
    assert_eq!(errors(&out).len(), 1);

    let out = console.execute("backup").await;
    assert!(errors(&out)[0].contains("pg_dump not found"));

    let out = console.execute("send misc info hello there").await;
    assert_eq!(out[0].0, "Sent info line to misc");
    assert_eq!(mock.relayed.lock().unwrap()[0].1["text"], "hello there");

    let out = console.execute("start").await;
    assert!(errors(&out).is_empty());
    assert!(mock.session.lock().unwrap().as_deref().unwrap().starts_with("ses_"));

    let out = console.execute("session").await;
    assert_eq!(out[0].0, "Session 3 is running");

    let out = console.execute("stop").await;
    let texts: Vec<_> = out.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Current Session Ended", "Backup written to /db_backups/backup_1.dump"]
    );

    let out = console.execute("history robot ses_a").await;
    assert_eq!(out[0].0, "3 robot record(s) in session ses_a");

    let out = console.execute("backups").await;
    assert_eq!(out.len(), 2);
}
