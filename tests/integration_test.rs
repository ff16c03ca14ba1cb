use std::net::SocketAddr;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use hydrosense::store::{MemoryStore, Stores};
use hydrosense::{profiles, router, AppState, Config};

const OWNER: i64 = 1;
const NEIGHBOUR: i64 = 2;

struct TestApp {
    base: String,
    client: Client,
    tank: i64,
    foreign_tank: i64,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Serve the app over an in-memory store on an ephemeral port.
async fn spawn_app() -> Result<TestApp> {
    // ---
    let store = MemoryStore::new();
    profiles::seed(&store).await?;

    let farm = store.add_farm("Greenhouse A", OWNER, Some("Lettuce"))?;
    let tank = store.add_reservoir(farm, "Tank 1")?;
    let other_farm = store.add_farm("Rooftop B", NEIGHBOUR, Some("Basil"))?;
    let foreign_tank = store.add_reservoir(other_farm, "Tank 9")?;

    let state = AppState::new(Stores::from_backend(store), &Config::default());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Ok(TestApp {
        base: format!("http://{addr}"),
        client: Client::new(),
        tank,
        foreign_tank,
    })
}

async fn dashboard(app: &TestApp, user: i64) -> Result<Value> {
    // ---
    let resp = app
        .client
        .get(app.url("/dashboard"))
        .header("X-User-Id", user.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(resp.json().await?)
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let body: Value = app.client.get(app.url("/health")).send().await?.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn requests_without_user_are_rejected() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let resp = app.client.get(app.url("/dashboard")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn csv_import_keeps_valid_rows() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let csv = "measuredAt;ph;ec;waterTemp\n\
               2025-05-01T08:00:00Z;6.0;1.0;18.0\n\
               2025-05-01 12:00:00;6,1;1,1;\n\
               not-a-date;6.0;1.0;18.0\n\
               2025-05-02;5.9;;19.5\n\
               2025-05-02T08:00:00Z;abc;1.0;18.0\n";

    let resp = app
        .client
        .post(app.url(&format!("/reservoirs/{}/measurements/import", app.tank)))
        .header("X-User-Id", OWNER.to_string())
        .header("Content-Type", "text/csv")
        .body(csv)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["imported"], 3);
    assert_eq!(body["skipped"], 2);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(2));

    // Latest imported row shows up on the dashboard; import raises no alerts
    let dash = dashboard(&app, OWNER).await?;
    let tank = &dash["reservoirs"][0];
    assert_eq!(tank["name"], "Tank 1");
    assert_eq!(tank["status"], "OK");
    assert_eq!(tank["lastMeasurement"]["ph"], 5.9);
    assert_eq!(dash["alerts"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn csv_import_rejects_bad_uploads() -> Result<()> {
    // ---
    let app = spawn_app().await?;
    let import_url = app.url(&format!("/reservoirs/{}/measurements/import", app.tank));

    let resp = app
        .client
        .post(&import_url)
        .header("X-User-Id", OWNER.to_string())
        .header("Content-Type", "text/csv")
        .body("foo;bar\n1;2\n")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().starts_with("Invalid CSV header"));

    let resp = app
        .client
        .post(&import_url)
        .header("X-User-Id", OWNER.to_string())
        .header("Content-Type", "image/png")
        .body("measuredAt;ph;ec;waterTemp\n")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = app
        .client
        .post(app.url(&format!("/reservoirs/{}/measurements/import", app.foreign_tank)))
        .header("X-User-Id", OWNER.to_string())
        .header("Content-Type", "text/csv")
        .body("measuredAt;ph;ec;waterTemp\n2025-05-01;6.0;1.0;18.0\n")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn manual_measurement_alert_lifecycle() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    // pH 7.2 against Lettuce [5.5, 6.5] deviates by 70%
    let resp = app
        .client
        .post(app.url(&format!("/reservoirs/{}/measurements", app.tank)))
        .header("X-User-Id", OWNER.to_string())
        .json(&json!({ "ph": 7.2, "ec": 1.0, "waterTemp": 18.0 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = resp.json().await?;
    assert_eq!(body["measurement"]["source"], "MANUAL");
    let alerts = body["alerts"].as_array().cloned().unwrap_or_default();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["type"], "PH_OUT_OF_RANGE");
    assert_eq!(alerts[0]["severity"], "CRITICAL");
    assert_eq!(alerts[0]["cultureName"], "Lettuce");
    let alert_id = alerts[0]["id"].as_i64().unwrap();

    let dash = dashboard(&app, OWNER).await?;
    assert_eq!(dash["reservoirs"][0]["status"], "CRITICAL");
    assert_eq!(dash["alerts"]["critical"], 1);

    // Someone else's alert looks missing
    let resp = app
        .client
        .post(app.url(&format!("/alerts/{alert_id}/resolve")))
        .header("X-User-Id", NEIGHBOUR.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .post(app.url(&format!("/alerts/{alert_id}/resolve")))
        .header("X-User-Id", OWNER.to_string())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let resolved: Value = resp.json().await?;
    assert!(resolved["resolvedAt"].is_string());

    let dash = dashboard(&app, OWNER).await?;
    assert_eq!(dash["reservoirs"][0]["status"], "OK");
    assert_eq!(dash["alerts"]["total"], 0);

    // The neighbour never sees this reservoir
    let dash = dashboard(&app, NEIGHBOUR).await?;
    assert_eq!(dash["reservoirs"].as_array().map(Vec::len), Some(1));
    assert_eq!(dash["reservoirs"][0]["name"], "Tank 9");
    Ok(())
}

#[tokio::test]
async fn manual_measurement_is_validated() -> Result<()> {
    // ---
    let app = spawn_app().await?;

    let resp = app
        .client
        .post(app.url(&format!("/reservoirs/{}/measurements", app.tank)))
        .header("X-User-Id", OWNER.to_string())
        .json(&json!({ "ph": 15.0 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .client
        .post(app.url(&format!("/reservoirs/{}/measurements", app.foreign_tank)))
        .header("X-User-Id", OWNER.to_string())
        .json(&json!({ "ph": 6.0 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}
