use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Local, Utc};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use fortuna_core::{
    settle, share_text, todays_entries, AdminSession, DrawResult, Entry, EntryStats, EntryStore, PrizeTable,
    ProvablyFairRng, SpinEvent, SpinSequencer, SpinTiming, Ticket, Tier, Trigger,
};
use fortuna_shared::{
    ApiError, Database, DrawRequest, DrawResponse, EntryQuery, RevealFrame, TierView, TodayRecord,
    VerifyResponse,
};

pub struct AppState {
    pub db: Database,
    pub prizes: PrizeTable,
    pub timing: SpinTiming,
    pub api_key: String,
}

/// Request body cap for `/draw`. The receipt photo travels inline as a base64
/// data URI, so a phone picture needs several megabytes.
pub const MAX_DRAW_BODY: usize = 10 * 1024 * 1024;

type Shared = State<Arc<AppState>>;
type AdminAuth = Option<TypedHeader<Authorization<Bearer>>>;

/// `ApiError` rendered as a JSON body with a matching status.
pub struct HttpError(ApiError);

impl<E: Into<ApiError>> From<E> for HttpError {
    fn from(e: E) -> Self {
        HttpError(e.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn session(state: &AppState, bearer: AdminAuth) -> AdminSession {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    AdminSession::from_bearer(token, &state.api_key)
}

async fn route_tiers(State(state): Shared) -> Json<Vec<TierView>> {
    Json(state.prizes.tiers().map(TierView::from).collect())
}

async fn route_verify(State(state): Shared) -> Result<Json<VerifyResponse>, HttpError> {
    let p = state.db.params().await?;
    Ok(Json(VerifyResponse {
        server_seed_hash: p.server_seed_hash,
        nonce: p.nonce as u64,
    }))
}

/// Draw, build the reveal trace on a virtual timeline, then save the entry.
///
/// The reveal is not paced here; clients replay `frames` with their `at_ms`
/// offsets.
async fn route_draw(
    State(state): Shared,
    Json(req): Json<DrawRequest>,
) -> Result<Json<DrawResponse>, HttpError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::Invalid("username is required".into()).into());
    }
    let tier = Tier::resolve(&req.amount);

    let p = state.db.next_nonce().await?;
    let nonce = p.nonce as u64;
    let rng = ProvablyFairRng::new(&p.server_seed, &req.client_seed, nonce);

    let (result, celebration, frames, reveal_ms) = {
        let mut seq = SpinSequencer::with_timeline(
            state.prizes.tier(tier).clone(),
            state.timing,
            rng.stream(),
        );
        if seq.trigger() != Trigger::Started {
            return Err(ApiError::Internal.into());
        }
        let trace = seq.run_to_end();
        let revealed = trace.iter().find_map(|t| match &t.event {
            SpinEvent::Revealed {
                result,
                celebration,
            } => Some((result.clone(), *celebration, t.at)),
            _ => None,
        });
        let Some((result, celebration, at)) = revealed else {
            return Err(ApiError::Internal.into());
        };
        (
            result,
            celebration,
            RevealFrame::from_trace(&trace),
            at.as_millis() as u64,
        )
    };

    info!(%username, %tier, nonce, label = %result.label, "draw");
    let ticket = Ticket::new(username, tier, req.image);
    let settlement = settle(&state.db, &ticket, result, Utc::now()).await;
    let DrawResult { label, value } = settlement.result;
    let share = share_text(&ticket.username, value);

    Ok(Json(DrawResponse {
        server_seed_hash: p.server_seed_hash,
        nonce,
        tier,
        label,
        value,
        celebration,
        reveal_ms,
        frames,
        entry_id: settlement.entry.id,
        saved: settlement.persisted.is_ok(),
        save_error: settlement.persisted.err().map(|e| e.to_string()),
        share_text: share,
    }))
}

async fn route_today(State(state): Shared) -> Result<Json<Vec<TodayRecord>>, HttpError> {
    let entries = state.db.list_all().await?;
    let today = todays_entries(&entries, &Local::now());
    Ok(Json(today.into_iter().map(TodayRecord::from).collect()))
}

async fn route_admin_entries(
    State(state): Shared,
    bearer: AdminAuth,
    Query(q): Query<EntryQuery>,
) -> Result<Json<Vec<Entry>>, HttpError> {
    session(&state, bearer).require()?;
    let filter = q.to_filter()?;
    let entries = state.db.list_all().await?;
    Ok(Json(filter.apply(&entries).into_iter().cloned().collect()))
}

async fn route_admin_stats(
    State(state): Shared,
    bearer: AdminAuth,
) -> Result<Json<EntryStats>, HttpError> {
    session(&state, bearer).require()?;
    let entries = state.db.list_all().await?;
    Ok(Json(EntryStats::compute(&entries, &Local::now())))
}

async fn route_admin_delete(
    State(state): Shared,
    bearer: AdminAuth,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    session(&state, bearer).require()?;
    state.db.delete_by_id(&id).await?;
    info!(%id, "entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn route_admin_clear(
    State(state): Shared,
    bearer: AdminAuth,
) -> Result<StatusCode, HttpError> {
    session(&state, bearer).require()?;
    state.db.delete_all().await?;
    warn!("all entries deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tiers", get(route_tiers))
        .route("/verify", get(route_verify))
        .route(
            "/draw",
            post(route_draw).layer(DefaultBodyLimit::max(MAX_DRAW_BODY)),
        )
        .route("/entries/today", get(route_today))
        .route(
            "/admin/entries",
            get(route_admin_entries).delete(route_admin_clear),
        )
        .route("/admin/entries/:id", delete(route_admin_delete))
        .route("/admin/stats", get(route_admin_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use fortuna_core::{verify_draw, Celebration};
    use serde_json::Value;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    async fn app() -> (Router, Arc<AppState>) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let state = Arc::new(AppState {
            db,
            prizes: PrizeTable::builtin(),
            timing: SpinTiming::normal(),
            api_key: KEY.into(),
        });
        (router(state.clone()), state)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn draw_req(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/draw")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().method(method).uri(uri);
        if let Some(k) = key {
            b = b.header("authorization", format!("Bearer {k}"));
        }
        b.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn tiers_listed() {
        let (app, _) = app().await;
        let (status, body) = call(&app, admin("GET", "/tiers", None)).await;
        assert_eq!(status, StatusCode::OK);
        let tiers = body.as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["tier"], "1000");
        assert_eq!(tiers[0]["prizes"][2]["percent"], 9.5);
    }

    #[tokio::test]
    async fn draw_is_verifiable_and_saved() {
        let (app, state) = app().await;
        let (status, body) = call(
            &app,
            draw_req(json!({"username": "alice", "amount": "5000", "client_seed": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);
        assert_eq!(body["tier"], "5000");
        assert_eq!(body["nonce"], 1);
        assert_eq!(body["reveal_ms"], 3600);

        let frames = body["frames"].as_array().unwrap();
        let last = frames.last().unwrap();
        let label = body["label"].as_str().unwrap();
        assert!(last["reels"].as_array().unwrap().iter().all(|r| r == label));

        let p = state.db.params().await.unwrap();
        let expected = verify_draw(&p.server_seed, "abc", 1, state.prizes.tier(Tier::T5000));
        assert_eq!(label, expected.label);
        assert_eq!(body["value"], expected.value);
        let celebration = expected.celebration().map(|c| match c {
            Celebration::Big => "big",
            Celebration::Medium => "medium",
        });
        assert_eq!(body["celebration"].as_str(), celebration);

        let entries = state.db.list_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, body["entry_id"].as_str().unwrap());
        assert_eq!(entries[0].username, "alice");
        assert_eq!(entries[0].awarded_prize, expected.value);
    }

    #[tokio::test]
    async fn unknown_amount_uses_default_tier() {
        let (app, _) = app().await;
        let (status, body) =
            call(&app, draw_req(json!({"username": "bob", "amount": "999"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], "10000");
    }

    #[tokio::test]
    async fn draw_requires_username() {
        let (app, state) = app().await;
        let (status, body) = call(&app, draw_req(json!({"username": "  ", "amount": "1000"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("username"));
        assert_eq!(state.db.params().await.unwrap().nonce, 0);
    }

    #[tokio::test]
    async fn draw_accepts_phone_sized_receipt() {
        let (app, state) = app().await;
        let image = format!("data:image/jpeg;base64,{}", "A".repeat(3 * 1024 * 1024));
        let (status, body) = call(
            &app,
            draw_req(json!({"username": "erin", "amount": "1000", "image": image})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);
        assert!(body["share_text"].as_str().unwrap().starts_with("erin在抽獎中獲得了"));

        let entries = state.db.list_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].proof_image.len(), image.len());
    }

    #[tokio::test]
    async fn draw_rejects_body_over_cap() {
        let (app, state) = app().await;
        let image = "A".repeat(MAX_DRAW_BODY + 1);
        let resp = app
            .oneshot(draw_req(json!({"username": "erin", "amount": "1000", "image": image})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(state.db.params().await.unwrap().nonce, 0);
    }

    #[tokio::test]
    async fn draw_stands_when_save_fails() {
        let (app, state) = app().await;
        sqlx::query("DROP TABLE entries")
            .execute(state.db.pool())
            .await
            .unwrap();
        let (status, body) =
            call(&app, draw_req(json!({"username": "carol", "amount": "1000"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], false);
        assert!(body["save_error"].as_str().is_some());
        assert!(body["label"].as_str().is_some());
    }

    #[tokio::test]
    async fn admin_routes_need_key() {
        let (app, _) = app().await;
        for (method, uri) in [
            ("GET", "/admin/entries"),
            ("GET", "/admin/stats"),
            ("DELETE", "/admin/entries"),
            ("DELETE", "/admin/entries/x"),
        ] {
            let (status, _) = call(&app, admin(method, uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            let (status, _) = call(&app, admin(method, uri, Some("wrong"))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn admin_filter_stats_delete() {
        let (app, _) = app().await;
        for (user, amount) in [("LuckyStar", "5000"), ("player001", "1000"), ("starlight", "1000")] {
            let (status, _) = call(&app, draw_req(json!({"username": user, "amount": amount}))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, all) = call(&app, admin("GET", "/admin/entries", Some(KEY))).await;
        assert_eq!(all.as_array().unwrap().len(), 3);
        // newest first
        assert_eq!(all[0]["username"], "starlight");

        let (_, hits) = call(
            &app,
            admin("GET", "/admin/entries?search=STAR&amount=1000", Some(KEY)),
        )
        .await;
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, admin("GET", "/admin/entries?amount=7", Some(KEY))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, stats) = call(&app, admin("GET", "/admin/stats", Some(KEY))).await;
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["today"], 3);
        assert_eq!(stats["total_deposit"], 7000);

        let id = all[0]["id"].as_str().unwrap();
        let (status, _) =
            call(&app, admin("DELETE", &format!("/admin/entries/{id}"), Some(KEY))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, left) = call(&app, admin("GET", "/admin/entries", Some(KEY))).await;
        assert_eq!(left.as_array().unwrap().len(), 2);

        let (_, today) = call(&app, admin("GET", "/entries/today", None)).await;
        assert_eq!(today.as_array().unwrap().len(), 2);
        assert!(today[0]["username"].as_str().unwrap().ends_with("***"));

        let (status, _) = call(&app, admin("DELETE", "/admin/entries", Some(KEY))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, left) = call(&app, admin("GET", "/admin/entries", Some(KEY))).await;
        assert!(left.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_reports_hash_and_nonce() {
        let (app, state) = app().await;
        call(&app, draw_req(json!({"username": "dave", "amount": "1000"}))).await;
        let (status, body) = call(&app, admin("GET", "/verify", None)).await;
        assert_eq!(status, StatusCode::OK);
        let p = state.db.params().await.unwrap();
        assert_eq!(body["server_seed_hash"], p.server_seed_hash);
        assert_eq!(body["nonce"], 1);
    }
}
