use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    id: String,
    name: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    id: String,
    activity_id: String,
    metrics: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEntry {
    entry: Entry,
    undo_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Deleted {
    undo_token: String,
    undo_window_secs: u64,
}

#[derive(Debug, Deserialize)]
struct EntryView {
    entry: Entry,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct TodayResponse {
    date: String,
    streak: u32,
    entries: Vec<EntryView>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("repbook_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/today")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_repbook"))
        .env("PORT", port.to_string())
        .env("BIND_ADDR", "127.0.0.1")
        .env("APP_DATA_PATH", data_path)
        .env("UNDO_WINDOW_SECS", "30")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn activity_named(client: &Client, base_url: &str, name: &str) -> Activity {
    let activities: Vec<Activity> = client
        .get(format!("{base_url}/api/activities?include_archived=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    activities
        .into_iter()
        .find(|a| a.name == name)
        .unwrap_or_else(|| panic!("missing seeded activity {name}"))
}

#[tokio::test]
async fn http_seeds_default_activities() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    for name in ["Push-ups", "Squats", "Run", "Plank", "Walk", "Sit-ups", "Meditation"] {
        activity_named(&client, &server.base_url, name).await;
    }
}

#[tokio::test]
async fn http_entry_derives_total_and_shows_today() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let pushups = activity_named(&client, &server.base_url, "Push-ups").await;

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&json!({
            "activityId": pushups.id,
            "metrics": { "style": "knee", "sets": "3", "reps_list": "10,12,15" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: CreatedEntry = response.json().await.unwrap();
    assert_eq!(created.entry.activity_id, pushups.id);
    assert_eq!(created.entry.metrics["total_reps"], json!(37.0));
    assert!(!created.undo_token.is_empty());

    let today: TodayResponse = client
        .get(format!("{}/api/today", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!today.date.is_empty());
    assert!(today.streak >= 1);
    let view = today
        .entries
        .iter()
        .find(|v| v.entry.id == created.entry.id)
        .expect("entry listed today");
    assert_eq!(view.summary, "Knee • 10+12+15 (37 reps)");
}

#[tokio::test]
async fn http_missing_required_field_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let run = activity_named(&client, &server.base_url, "Run").await;

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&json!({ "activityId": run.id, "metrics": { "distance_km": "5" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&json!({
            "activityId": run.id,
            "metrics": { "distance_km": "5", "duration": "1:xx" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_deleted_entry_can_be_undone() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let plank = activity_named(&client, &server.base_url, "Plank").await;

    let created: CreatedEntry = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&json!({ "activityId": plank.id, "metrics": { "duration": "1:30" } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created.entry.metrics["duration"], json!(90.0));
    let entry_url = format!("{}/api/entries/{}", server.base_url, created.entry.id);

    let deleted: Deleted = client
        .delete(&entry_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted.undo_window_secs, 30);
    assert_eq!(
        client.get(&entry_url).send().await.unwrap().status(),
        StatusCode::NOT_FOUND
    );

    let undo_url = format!("{}/api/undo/{}", server.base_url, deleted.undo_token);
    let response = client.post(&undo_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(client.get(&entry_url).send().await.unwrap().status().is_success());

    let response = client.post(&undo_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_referenced_activity_cannot_be_deleted_but_can_be_archived() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let created: Activity = client
        .post(format!("{}/api/activities", server.base_url))
        .json(&json!({
            "name": "Lunges",
            "fields": [{ "key": "reps", "label": "Reps", "type": "number", "required": true }]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/entries", server.base_url))
        .json(&json!({ "activityId": created.id, "metrics": { "reps": 20 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let activity_url = format!("{}/api/activities/{}", server.base_url, created.id);
    let response = client.delete(&activity_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let archived: Activity = client
        .post(format!("{activity_url}/archive"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(archived.archived);

    let visible: Vec<Activity> = client
        .get(format!("{}/api/activities", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(visible.iter().all(|a| a.id != created.id));
}

#[tokio::test]
async fn http_invalid_activity_keys_are_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/activities", server.base_url))
        .json(&json!({
            "name": "Broken",
            "fields": [{ "key": "occurredAt", "label": "When", "type": "date" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_backup_round_trip() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let backup_url = format!("{}/api/backup", server.base_url);

    let response = client.get(&backup_url).send().await.unwrap();
    assert!(response.status().is_success());
    let disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"repbook-backup-"));
    let document: Value = response.json().await.unwrap();
    assert_eq!(document["meta"]["app"], "repbook");
    assert!(document["activities"].as_array().unwrap().len() >= 7);

    let summary: Value = client
        .post(&backup_url)
        .body(document.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["activities"], json!(document["activities"].as_array().unwrap().len()));
    assert_eq!(summary["skipped"], 0);

    let response = client
        .post(&backup_url)
        .body(r#"{"hello":"world"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "invalid backup file");
}

#[tokio::test]
async fn http_settings_patch_and_meditation() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let settings: Value = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "dateFormat": "YYYY-MM-DD" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["dateFormat"], "YYYY-MM-DD");
    assert_eq!(settings["distanceUnit"], "km");

    let meditation = activity_named(&client, &server.base_url, "Meditation").await;
    let response = client
        .post(format!("{}/api/meditation", server.base_url))
        .json(&json!({ "minutes": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry: Entry = response.json().await.unwrap();
    assert_eq!(entry.activity_id, meditation.id);
    assert_eq!(entry.metrics["duration_min"], json!(10.0));

    let response = client
        .post(format!("{}/api/meditation", server.base_url))
        .json(&json!({ "minutes": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_rest_and_meditation_timers() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let rest: Value = client
        .post(format!("{}/api/rest", server.base_url))
        .json(&json!({ "seconds": 30 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rest["state"], "counting");
    assert!(rest["remaining"].as_u64().unwrap() <= 30);

    let response = client
        .post(format!("{}/api/rest", server.base_url))
        .json(&json!({ "seconds": 45 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rest: Value = client
        .delete(format!("{}/api/rest", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rest, json!({ "state": "idle" }));

    let timer: Value = client
        .post(format!("{}/api/meditation/timer", server.base_url))
        .json(&json!({ "minutes": 1 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(timer["state"], "running");

    let response = client
        .post(format!("{}/api/meditation/timer", server.base_url))
        .json(&json!({ "minutes": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{}/api/meditation/timer/complete", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let timer: Value = client
        .delete(format!("{}/api/meditation/timer", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(timer, json!({ "state": "setup" }));
}
