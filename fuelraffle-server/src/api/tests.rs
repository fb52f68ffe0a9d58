use crate::config::hash_secret;
use crate::config::runtime::{AdminConfig, PipelineConfig, SigningConfig};
use crate::server::build_router;
use crate::state::{AppState, Store};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fuelraffle_core::config::ConfigStore;
use fuelraffle_core::entities::RaffleStatus;
use fuelraffle_core::entities::coupon::Coupon;
use fuelraffle_core::entities::raffle::Raffle;
use fuelraffle_core::events::{EventPublisher, InProcessBus};
use fuelraffle_core::processors::{TicketIssuanceConsumer, TicketIssuer};
use fuelraffle_core::store::MemoryStore;
use fuelraffle_sdk::objects::{
    EngagementDetails, GenerateQrRequest, RecordEngagementRequest, RedeemRequest, topics,
};
use fuelraffle_sdk::signature::{
    ADMIN_AUTH_HEADER, DEFAULT_MAX_EXPIRATION_HOURS, Ed25519KeyProvider, QrSigner,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN_SECRET: &str = "correct horse battery staple";

struct Harness {
    router: Router,
    state: AppState,
    store: Arc<MemoryStore>,
    bus: Arc<InProcessBus>,
    config: ConfigStore<PipelineConfig>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(InProcessBus::new());
    let config = ConfigStore::new(PipelineConfig::with_seed_secret(
        b"server-test-seed-secret".to_vec(),
    ));
    let (keys, _) = Ed25519KeyProvider::generate().unwrap();
    let signing = SigningConfig {
        private_key: String::new(),
        max_expiration_hours: DEFAULT_MAX_EXPIRATION_HOURS,
        default_expiration_hours: 24,
    };
    let state = AppState::new(
        Arc::clone(&store) as Arc<Store>,
        Arc::clone(&bus) as Arc<dyn EventPublisher>,
        config.clone(),
        AdminConfig::new(hash_secret(ADMIN_SECRET).unwrap()),
        &signing,
        keys,
    );
    Harness {
        router: build_router(state.clone()),
        state,
        store,
        bus,
        config,
    }
}

enum Auth {
    None,
    Admin,
    Wrong,
}

async fn send(
    h: &Harness,
    method: &str,
    uri: &str,
    auth: Auth,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    match auth {
        Auth::None => {}
        Auth::Admin => builder = builder.header(ADMIN_AUTH_HEADER, ADMIN_SECRET),
        Auth::Wrong => builder = builder.header(ADMIN_AUTH_HEADER, "guess"),
    }
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let response = h
        .router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn draft_raffle() -> Raffle {
    let now = OffsetDateTime::now_utc();
    Raffle {
        id: Uuid::now_v7(),
        name: "Weekend fill-up raffle".to_string(),
        status: RaffleStatus::Draft,
        registration_start: now - time::Duration::days(1),
        registration_end: now + time::Duration::days(1),
        draw_at: now + time::Duration::days(2),
        max_participants: None,
        min_tickets_to_participate: 1,
        allow_multiple_wins: false,
        seed_commitment: None,
        draw_seed: None,
        completed_at: None,
    }
}

#[tokio::test]
async fn test_health_reports_version() {
    let h = harness();
    let (status, body) = send(&h, "GET", "/health", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let before = body["config_version"].as_u64().unwrap();
    h.config
        .update(PipelineConfig::with_seed_secret(b"rotated-test-seed-secret".to_vec()))
        .await;
    let (_, body) = send(&h, "GET", "/health", Auth::None, None).await;
    assert_eq!(body["config_version"].as_u64().unwrap(), before + 1);
}

#[tokio::test]
async fn test_qr_generation_requires_admin_secret() {
    let h = harness();
    let request = serde_json::to_value(GenerateQrRequest {
        station_id: Uuid::now_v7(),
        dispenser_id: Uuid::now_v7(),
        expiration_hours: Some(2),
    })
    .unwrap();

    let (status, body) = send(&h, "POST", "/qr/generate", Auth::None, Some(request.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(&h, "POST", "/qr/generate", Auth::Wrong, Some(request.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, generated) = send(&h, "POST", "/qr/generate", Auth::Admin, Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let issued_at = generated["payload"]["issuedAt"].as_i64().unwrap();
    assert_eq!(
        generated["payload"]["expiresAt"].as_i64().unwrap() - issued_at,
        2 * 3600
    );

    let (status, payload) = send(
        &h,
        "POST",
        "/qr/verify",
        Auth::None,
        Some(json!({ "content": generated["content"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["stationId"], request["station_id"]);
}

#[tokio::test]
async fn test_qr_generation_rejects_long_expiry() {
    let h = harness();
    let request = serde_json::to_value(GenerateQrRequest {
        station_id: Uuid::now_v7(),
        dispenser_id: Uuid::now_v7(),
        expiration_hours: Some(DEFAULT_MAX_EXPIRATION_HOURS + 1),
    })
    .unwrap();
    let (status, body) = send(&h, "POST", "/qr/generate", Auth::Admin, Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_qr_verify_rejects_foreign_and_garbled_tokens() {
    let h = harness();
    let (other_keys, _) = Ed25519KeyProvider::generate().unwrap();
    let foreign = QrSigner::new(other_keys, DEFAULT_MAX_EXPIRATION_HOURS)
        .sign(Uuid::now_v7(), Uuid::now_v7(), 1)
        .unwrap();

    for content in [foreign.content(), "FRQR1.not-base64!.sig".to_string()] {
        let (status, body) = send(
            &h,
            "POST",
            "/qr/verify",
            Auth::None,
            Some(json!({ "content": content })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_CODE");
    }
}

#[tokio::test]
async fn test_redemption_mints_tickets_once() {
    let h = harness();
    let subscription = h
        .bus
        .subscribe(
            "ticket-issuance",
            &[topics::REDEMPTION_COMPLETED],
            3,
            Duration::ZERO,
        )
        .await;
    let coupon_id = Uuid::now_v7();
    let user_id = Uuid::now_v7();
    h.store
        .insert_coupon(Coupon {
            id: coupon_id,
            owner_user_id: Some(user_id),
            active: true,
            expires_at: None,
            tickets_per_redemption: 2,
        })
        .await;

    let token = h
        .state
        .signer
        .sign(Uuid::now_v7(), Uuid::now_v7(), 1)
        .unwrap();
    let request = serde_json::to_value(RedeemRequest {
        qr_content: token.content(),
        coupon_id,
        user_id,
        fuel_amount: Decimal::new(405, 1),
        fuel_price: Decimal::new(189, 2),
    })
    .unwrap();

    let (status, first) = send(&h, "POST", "/redemptions", Auth::None, Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["outcome"], "COMPLETED");
    assert_eq!(first["tickets_eligible"], 2);

    let (status, rescan) = send(&h, "POST", "/redemptions", Auth::None, Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rescan["outcome"], "DUPLICATE");
    assert_eq!(rescan["redemption_id"], first["redemption_id"]);

    // Only the first request published; the rescan is answered from the store.
    let mut consumer = TicketIssuanceConsumer::new(
        TicketIssuer::new(
            Arc::clone(&h.store),
            Arc::clone(&h.bus) as Arc<dyn EventPublisher>,
            h.config.clone(),
        ),
        subscription,
    );
    assert!(consumer.handle_next().await);

    let (status, balance) = send(
        &h,
        "GET",
        &format!("/users/{user_id}/tickets/balance"),
        Auth::None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["active_tickets"], 2);
    assert_eq!(h.store.tickets_for_user(user_id).await.len(), 2);
}

#[tokio::test]
async fn test_redemption_rejects_someone_elses_coupon() {
    let h = harness();
    let coupon_id = Uuid::now_v7();
    h.store
        .insert_coupon(Coupon {
            id: coupon_id,
            owner_user_id: Some(Uuid::now_v7()),
            active: true,
            expires_at: None,
            tickets_per_redemption: 1,
        })
        .await;
    let token = h
        .state
        .signer
        .sign(Uuid::now_v7(), Uuid::now_v7(), 1)
        .unwrap();
    let request = serde_json::to_value(RedeemRequest {
        qr_content: token.content(),
        coupon_id,
        user_id: Uuid::now_v7(),
        fuel_amount: Decimal::new(20, 0),
        fuel_price: Decimal::new(2, 0),
    })
    .unwrap();

    let (status, body) = send(&h, "POST", "/redemptions", Auth::None, Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NOT_YET_ELIGIBLE");
}

#[tokio::test]
async fn test_engagement_publishes_only_when_it_qualifies() {
    let h = harness();
    let mut subscription = h
        .bus
        .subscribe(
            "ticket-issuance",
            &[topics::AD_ENGAGEMENT_COMPLETED],
            3,
            Duration::ZERO,
        )
        .await;
    let engagement = |duration_seconds| RecordEngagementRequest {
        engagement_id: Uuid::now_v7(),
        user_id: Uuid::now_v7(),
        advertisement_id: Uuid::now_v7(),
        base_tickets: 1,
        engagement: EngagementDetails {
            duration_seconds,
            completed: true,
            clicked: true,
            ..EngagementDetails::default()
        },
    };

    let (status, body) = send(
        &h,
        "POST",
        "/engagements",
        Auth::None,
        Some(serde_json::to_value(engagement(40)).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["qualifies"], true);
    // completion + click + extended view
    assert_eq!(body["bonus_tickets"], 3);
    let delivery = subscription.try_recv().unwrap();
    assert_eq!(delivery.topic, topics::AD_ENGAGEMENT_COMPLETED);

    let (status, body) = send(
        &h,
        "POST",
        "/engagements",
        Auth::None,
        Some(serde_json::to_value(engagement(5)).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["qualifies"], false);
    assert_eq!(body["bonus_tickets"], 0);
    assert!(subscription.try_recv().is_none());
}

#[tokio::test]
async fn test_engagement_base_above_cap_is_rejected() {
    let h = harness();
    let mut subscription = h
        .bus
        .subscribe(
            "ticket-issuance",
            &[topics::AD_ENGAGEMENT_COMPLETED],
            3,
            Duration::ZERO,
        )
        .await;
    let engagement = |base_tickets| RecordEngagementRequest {
        engagement_id: Uuid::now_v7(),
        user_id: Uuid::now_v7(),
        advertisement_id: Uuid::now_v7(),
        base_tickets,
        engagement: EngagementDetails {
            duration_seconds: 40,
            completed: true,
            ..EngagementDetails::default()
        },
    };

    let (status, body) = send(
        &h,
        "POST",
        "/engagements",
        Auth::None,
        Some(serde_json::to_value(engagement(200_000)).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(subscription.try_recv().is_none());

    // At the cap the base is accepted and the bonus has no headroom.
    let (status, body) = send(
        &h,
        "POST",
        "/engagements",
        Auth::None,
        Some(serde_json::to_value(engagement(10)).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["base_tickets"], 10);
    assert_eq!(body["bonus_tickets"], 0);
    assert!(subscription.try_recv().is_some());
}

#[tokio::test]
async fn test_raffle_lifecycle_over_admin_api() {
    let h = harness();
    let raffle = draft_raffle();
    h.store.insert_raffle(raffle.clone()).await;
    let base = format!("/admin/raffles/{}", raffle.id);

    let (status, _) = send(&h, "POST", &format!("{base}/activate"), Auth::None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&h, "POST", &format!("{base}/activate"), Auth::Admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["seed_commitment"].as_str().map(str::len), Some(64));

    let (_, body) = send(&h, "POST", &format!("{base}/pause"), Auth::Admin, None).await;
    assert_eq!(body["status"], "PAUSED");

    let (status, body) = send(&h, "POST", &format!("{base}/activate"), Auth::Admin, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STATE_CONFLICT");

    let (_, body) = send(&h, "POST", &format!("{base}/resume"), Auth::Admin, None).await;
    assert_eq!(body["status"], "ACTIVE");

    // Registration is still open.
    let (status, body) = send(
        &h,
        "POST",
        &format!("{base}/draw"),
        Auth::Admin,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NOT_YET_ELIGIBLE");

    let (_, body) = send(&h, "POST", &format!("{base}/cancel"), Auth::Admin, None).await;
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn test_draw_rejects_non_hex_reveal() {
    let h = harness();
    let raffle = draft_raffle();
    h.store.insert_raffle(raffle.clone()).await;
    let (status, body) = send(
        &h,
        "POST",
        &format!("/admin/raffles/{}/draw", raffle.id),
        Auth::Admin,
        Some(json!({ "reveal": "not hex" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_winner_and_empty_sweeps() {
    let h = harness();
    let winner_id = Uuid::now_v7();

    let (status, body) = send(&h, "GET", &format!("/winners/{winner_id}"), Auth::None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(
        &h,
        "POST",
        &format!("/winners/{winner_id}/claim"),
        Auth::None,
        Some(json!({ "processed_by": "desk-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for sweep in ["winners", "tickets"] {
        let (status, body) = send(
            &h,
            "POST",
            &format!("/admin/sweeps/{sweep}"),
            Auth::Admin,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["affected"], 0);
    }
}

#[tokio::test]
async fn test_join_requires_an_open_raffle() {
    let h = harness();
    let user_id = Uuid::now_v7();

    let (status, _) = send(
        &h,
        "POST",
        &format!("/users/{user_id}/raffles/{}/join", Uuid::now_v7()),
        Auth::None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let raffle = draft_raffle();
    h.store.insert_raffle(raffle.clone()).await;
    let join = format!("/users/{user_id}/raffles/{}/join", raffle.id);
    let (status, body) = send(&h, "POST", &join, Auth::None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NOT_YET_ELIGIBLE");

    send(
        &h,
        "POST",
        &format!("/admin/raffles/{}/activate", raffle.id),
        Auth::Admin,
        None,
    )
    .await;
    let (status, body) = send(&h, "POST", &join, Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tickets_moved"], 0);
}
