use std::{collections::HashSet, fmt, fs::File, net::SocketAddr};

use anyhow::Context;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use cucumber::{given, then, when, World as _};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use tripsheet::{
    auth,
    config::AppConfig,
    db::init_pool,
    routes::create_router,
    services::{counters::CounterStore, invoices::InvoiceAllocator, trips::TripRepository},
    state::AppState,
};

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    token: Option<String>,
    last_status: Option<StatusCode>,
    last_body: Option<Value>,
    last_allocation: Option<(i64, String)>,
    concurrent_allocations: Vec<i64>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn router(&self) -> Router {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .router
            .clone()
    }

    fn bearer(&self) -> String {
        format!(
            "Bearer {}",
            self.token.as_ref().expect("a logged-in user is required")
        )
    }

    async fn send(&mut self, request: Request<Body>) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router is infallible");
        self.last_status = Some(response.status());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        self.last_body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };
    }

    fn last_body(&self) -> &Value {
        self.last_body
            .as_ref()
            .expect("a JSON response body is required")
    }
}

struct TestState {
    app: AppState,
    router: Router,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            token_secret: "bdd-token-secret".into(),
            cors_allow_origin: "*".into(),
            invoice_prefix: "STINV".into(),
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let counters = CounterStore::new(db.clone());
        let invoices = InvoiceAllocator::new(counters, config.invoice_prefix.clone());
        let trips = TripRepository::new(db.clone());

        let app = AppState::new(config, db, trips, invoices);
        let router = create_router(app.clone());
        Ok(Self {
            app,
            router,
            _root: root,
        })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

fn trip_payload(
    agency: &str,
    date: &str,
    starting_km: i64,
    closing_km: i64,
    starting_time: &str,
    closing_time: &str,
    invoice: &str,
) -> Value {
    json!({
        "guestName": "A. Traveller",
        "guestNumber": "9000000000",
        "vehicleName": "Innova",
        "vehicleNumber": "KA01AB1234",
        "driverName": "R. Kumar",
        "reporting": "Airport T2",
        "agency": agency,
        "date": date,
        "startingKm": starting_km,
        "closingKm": closing_km,
        "startingTime": starting_time,
        "closingTime": closing_time,
        "tollFee": 120.0,
        "parkingFee": 40.0,
        "amount": 2500.0,
        "invoiceNumber": invoice,
    })
}

fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, bearer);
    }
    builder
        .body(Body::from(
            serde_json::to_vec(body).expect("serialize request body"),
        ))
        .expect("build request")
}

fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, bearer);
    }
    builder.body(Body::empty()).expect("build request")
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.token = None;
    world.last_status = None;
    world.last_body = None;
    world.last_allocation = None;
    world.concurrent_allocations.clear();
}

#[given(regex = r#"^a registered user "([^"]+)" with password "([^"]+)"$"#)]
async fn given_registered_user(world: &mut AppWorld, username: String, password: String) {
    auth::register_user(world.app_state(), &username, &password)
        .await
        .expect("register user");
}

#[given(regex = r#"^a logged-in user "([^"]+)" with password "([^"]+)"$"#)]
async fn given_logged_in_user(world: &mut AppWorld, username: String, password: String) {
    auth::register_user(world.app_state(), &username, &password)
        .await
        .expect("register user");
    let token = auth::mint_token(&world.app_state().token_key, &username).expect("mint token");
    world.token = Some(token);
}

#[when(regex = r#"^I register a user "([^"]+)" with password "([^"]+)"$"#)]
async fn when_register_user(world: &mut AppWorld, username: String, password: String) {
    let body = json!({ "username": username, "password": password });
    let request = json_request("POST", "/users/register", None, &body);
    world.send(request).await;
}

#[then(regex = r#"^I can authenticate as "([^"]+)" using password "([^"]+)"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, username: String, password: String) {
    let user = auth::authenticate_user(world.app_state(), &username, &password)
        .await
        .expect("authentication");
    assert_eq!(user.username, username);
}

#[then(regex = r#"^authenticating as "([^"]+)" with password "([^"]+)" is rejected$"#)]
async fn then_authentication_rejected(world: &mut AppWorld, username: String, password: String) {
    let result = auth::authenticate_user(world.app_state(), &username, &password).await;
    assert!(result.is_err(), "authentication should have been rejected");
}

#[when("I request the trip list without a token")]
async fn when_list_without_token(world: &mut AppWorld) {
    let request = get_request("/travels", None);
    world.send(request).await;
}

#[when(regex = r#"^I request the trip list with an expired token for "([^"]+)"$"#)]
async fn when_list_with_expired_token(world: &mut AppWorld, username: String) {
    let claims = auth::Claims {
        sub: username,
        exp: (Utc::now() - Duration::hours(1)).timestamp(),
    };
    let token =
        auth::sign_claims(&world.app_state().token_key, &claims).expect("sign expired claims");
    let request = get_request("/travels", Some(&format!("Bearer {token}")));
    world.send(request).await;
}

#[when("I allocate the next invoice number")]
async fn when_allocate_next(world: &mut AppWorld) {
    let allocation = world
        .app_state()
        .invoices
        .allocate_next()
        .await
        .expect("allocate invoice number");
    world.last_allocation = Some(allocation);
}

#[when(regex = r"^(\d+) invoice numbers are allocated concurrently$")]
async fn when_allocate_concurrently(world: &mut AppWorld, count: usize) {
    let mut handles = Vec::new();
    for _ in 0..count {
        let invoices = world.app_state().invoices.clone();
        handles.push(tokio::spawn(
            async move { invoices.allocate_next().await },
        ));
    }
    world.concurrent_allocations.clear();
    for handle in handles {
        let (value, _) = handle.await.expect("join").expect("allocate");
        world.concurrent_allocations.push(value);
    }
}

#[then("all concurrently allocated numbers are distinct")]
async fn then_concurrent_distinct(world: &mut AppWorld) {
    let mut seen = HashSet::new();
    for value in &world.concurrent_allocations {
        assert!(seen.insert(*value), "invoice number {value} allocated twice");
    }
}

#[then(regex = r"^the current invoice number is (\d+)$")]
async fn then_current_invoice(world: &mut AppWorld, expected: i64) {
    let (current, _) = world
        .app_state()
        .invoices
        .peek_current()
        .await
        .expect("peek invoice number");
    assert_eq!(current, expected);
}

#[then(regex = r"^the allocated invoice number is (\d+)$")]
async fn then_allocated_number(world: &mut AppWorld, expected: i64) {
    let (value, _) = world
        .last_allocation
        .as_ref()
        .expect("an allocation must have happened");
    assert_eq!(*value, expected);
}

#[then(regex = r#"^the allocated invoice ends with "([^"]+)"$"#)]
async fn then_allocated_suffix(world: &mut AppWorld, suffix: String) {
    let (_, formatted) = world
        .last_allocation
        .as_ref()
        .expect("an allocation must have happened");
    assert!(
        formatted.ends_with(&suffix),
        "{formatted} does not end with {suffix}"
    );
}

#[when(
    regex = r#"^I submit a trip entry for agency "([^"]+)" on "([^"]+)" from km (\d+) to (\d+) between "([^"]+)" and "([^"]+)" with invoice "([^"]+)"$"#
)]
#[allow(clippy::too_many_arguments)]
async fn when_submit_trip(
    world: &mut AppWorld,
    agency: String,
    date: String,
    starting_km: i64,
    closing_km: i64,
    starting_time: String,
    closing_time: String,
    invoice: String,
) {
    let body = trip_payload(
        &agency,
        &date,
        starting_km,
        closing_km,
        &starting_time,
        &closing_time,
        &invoice,
    );
    let bearer = world.bearer();
    let request = json_request("POST", "/travels", Some(&bearer), &body);
    world.send(request).await;
}

#[when(regex = r#"^I submit a trip entry missing "([^"]+)" with invoice "([^"]+)"$"#)]
async fn when_submit_trip_missing(world: &mut AppWorld, field: String, invoice: String) {
    let mut body = trip_payload("KTC", "2025-03-01", 100, 150, "09:00", "10:00", &invoice);
    body.as_object_mut()
        .expect("payload is an object")
        .remove(&field);
    let bearer = world.bearer();
    let request = json_request("POST", "/travels", Some(&bearer), &body);
    world.send(request).await;
}

#[when(regex = r#"^I update the stored entry with agency "([^"]+)" and invoice "([^"]+)"$"#)]
async fn when_update_stored_entry(world: &mut AppWorld, agency: String, invoice: String) {
    let id = world.last_body()["id"]
        .as_i64()
        .expect("a created entry with an id");
    send_update(world, id, &agency, &invoice).await;
}

#[when(regex = r#"^I update trip entry (\d+) with agency "([^"]+)" and invoice "([^"]+)"$"#)]
async fn when_update_entry_by_id(world: &mut AppWorld, id: i64, agency: String, invoice: String) {
    send_update(world, id, &agency, &invoice).await;
}

async fn send_update(world: &mut AppWorld, id: i64, agency: &str, invoice: &str) {
    let body = trip_payload(agency, "2025-03-04", 100, 180, "10:00", "12:30", invoice);
    let bearer = world.bearer();
    let request = json_request("PUT", &format!("/travels/{id}"), Some(&bearer), &body);
    world.send(request).await;
}

#[then(regex = r#"^the stored entry has agency "([^"]+)" and invoice "([^"]+)"$"#)]
async fn then_stored_entry_agency_invoice(world: &mut AppWorld, agency: String, invoice: String) {
    let body = world.last_body();
    assert_eq!(body["agency"].as_str(), Some(agency.as_str()));
    assert_eq!(body["invoiceNumber"].as_str(), Some(invoice.as_str()));
}

#[when(regex = r"^I delete trip entry (\d+)$")]
async fn when_delete_trip(world: &mut AppWorld, id: i64) {
    let bearer = world.bearer();
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/travels/{id}"))
        .header(header::AUTHORIZATION, &bearer)
        .body(Body::empty())
        .expect("build request");
    world.send(request).await;
}

#[then(regex = r"^the response status is (\d+)$")]
async fn then_response_status(world: &mut AppWorld, expected: u16) {
    let status = world.last_status.expect("a request must have been sent");
    assert_eq!(status.as_u16(), expected);
}

#[then(regex = r#"^the error mentions "([^"]+)"$"#)]
async fn then_error_mentions(world: &mut AppWorld, fragment: String) {
    let error = world.last_body()["error"]
        .as_str()
        .expect("error body has a reason string")
        .to_string();
    assert!(
        error.contains(&fragment),
        "error {error:?} does not mention {fragment:?}"
    );
}

#[then(regex = r#"^the stored entry has total km (\d+) and total hours "([^"]+)"$"#)]
async fn then_stored_entry_totals(world: &mut AppWorld, total_km: i64, total_hours: String) {
    let body = world.last_body();
    assert_eq!(body["totalKm"].as_i64(), Some(total_km));
    assert_eq!(body["totalHours"].as_str(), Some(total_hours.as_str()));
}

#[then("no trip entries are stored")]
async fn then_no_entries_stored(world: &mut AppWorld) {
    let entries = world
        .app_state()
        .trips
        .list(&Default::default())
        .await
        .expect("list trips");
    assert!(entries.is_empty(), "expected no stored entries");
}

#[then(regex = r#"^listing trips for agency "([^"]+)" returns (\d+) entries sorted by date ascending$"#)]
async fn then_listing_by_agency(world: &mut AppWorld, agency: String, expected: usize) {
    let bearer = world.bearer();
    let request = get_request(&format!("/travels?agency={agency}"), Some(&bearer));
    world.send(request).await;
    assert_eq!(world.last_status, Some(StatusCode::OK));

    let entries = world.last_body().as_array().expect("array body").clone();
    assert_eq!(entries.len(), expected);
    let dates: Vec<&str> = entries
        .iter()
        .map(|entry| entry["date"].as_str().expect("date string"))
        .collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted, "entries are not date-sorted ascending");
    for entry in &entries {
        assert_eq!(entry["agency"].as_str(), Some(agency.as_str()));
    }
}

#[then(regex = r#"^listing trips between "([^"]+)" and "([^"]+)" returns (\d+) entries$"#)]
async fn then_listing_by_range(world: &mut AppWorld, start: String, end: String, expected: usize) {
    let bearer = world.bearer();
    let request = get_request(
        &format!("/travels?startDate={start}&endDate={end}"),
        Some(&bearer),
    );
    world.send(request).await;
    assert_eq!(world.last_status, Some(StatusCode::OK));
    let entries = world.last_body().as_array().expect("array body");
    assert_eq!(entries.len(), expected);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .max_concurrent_scenarios(1)
        .with_default_cli()
        .run("tests/features")
        .await;
}
