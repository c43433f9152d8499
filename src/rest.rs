//! REST API over the CRM (Axum, port 11111 by default).
//!
//! One route group per collection plus segments, analytics, report export
//! and settings. Handlers call the synchronous services directly; writes are
//! serialized per collection inside the store.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analytics::{CampaignSummary, DashboardSummary, RevenuePoint, SubscriptionPoint};
use crate::crm::Crm;
use crate::error::CrmError;
use crate::models::{
    CampaignUpdate, Contact, ContactUpdate, DeliveryCounts, EmailCampaign, NewCampaign,
    NewContact, NewProduct, NewPurchase, NewSubscription, Product, ProductUpdate, Purchase,
    PurchaseUpdate, SegmentCriteria, Subscription, SubscriptionStatus, SubscriptionUpdate,
};
use crate::reports::{DateRange, Report};
use crate::segments::{self, Segment, SegmentSummary};
use crate::settings::{Settings, SettingsPatch};

/// Shared state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    crm: Crm,
    report_dir: Arc<PathBuf>,
}

/// Domain errors rendered as `{"error": ..., "code": ...}`.
#[derive(Debug)]
pub struct ApiError(CrmError);

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CrmError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CrmError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            CrmError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            CrmError::TeamFull { .. } => (StatusCode::CONFLICT, "TEAM_FULL"),
            CrmError::Storage(_)
            | CrmError::Serialization(_)
            | CrmError::Io(_)
            | CrmError::Config(_) => {
                tracing::error!(error = %self.0, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal error occurred".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn found<T>(entity: &'static str, id: &str, value: Option<T>) -> ApiResult<Json<T>> {
    value
        .map(Json)
        .ok_or_else(|| CrmError::not_found(entity, id).into())
}

fn deleted(entity: &'static str, id: &str, removed: bool) -> ApiResult<StatusCode> {
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CrmError::not_found(entity, id).into())
    }
}

/// Build the router. Exports written through `POST /reports/export` land in
/// `report_dir`.
pub fn create_router(crm: Crm, report_dir: PathBuf) -> Router {
    let state = AppState {
        crm,
        report_dir: Arc::new(report_dir),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/contacts", get(list_contacts_handler).post(create_contact_handler))
        .route(
            "/contacts/:id",
            get(get_contact_handler)
                .put(update_contact_handler)
                .delete(delete_contact_handler),
        )
        .route("/contacts/:id/touch", post(touch_contact_handler))
        .route("/contacts/:id/subscriptions", get(contact_subscriptions_handler))
        .route("/contacts/:id/purchases", get(contact_purchases_handler))
        .route("/products", get(list_products_handler).post(create_product_handler))
        .route(
            "/products/:id",
            get(get_product_handler)
                .put(update_product_handler)
                .delete(delete_product_handler),
        )
        .route("/products/:id/toggle", post(toggle_product_handler))
        .route(
            "/subscriptions",
            get(list_subscriptions_handler).post(create_subscription_handler),
        )
        .route(
            "/subscriptions/:id",
            get(get_subscription_handler)
                .put(update_subscription_handler)
                .delete(delete_subscription_handler),
        )
        .route("/subscriptions/:id/status", post(transition_subscription_handler))
        .route("/subscriptions/:id/team", post(add_team_member_handler))
        .route(
            "/subscriptions/:id/team/:contact_id",
            delete(remove_team_member_handler),
        )
        .route("/purchases", get(list_purchases_handler).post(create_purchase_handler))
        .route(
            "/purchases/:id",
            get(get_purchase_handler)
                .put(update_purchase_handler)
                .delete(delete_purchase_handler),
        )
        .route("/campaigns", get(list_campaigns_handler).post(create_campaign_handler))
        .route(
            "/campaigns/:id",
            get(get_campaign_handler)
                .put(update_campaign_handler)
                .delete(delete_campaign_handler),
        )
        .route("/campaigns/:id/metrics", post(record_metrics_handler))
        .route("/campaigns/:id/target", post(target_campaign_handler))
        .route("/segments", get(segments_handler))
        .route("/segments/members", get(segment_members_handler))
        .route("/segments/resolve", post(resolve_segment_handler))
        .route("/analytics/campaigns", get(campaign_analytics_handler))
        .route("/analytics/revenue", get(revenue_analytics_handler))
        .route("/analytics/subscriptions", get(subscription_analytics_handler))
        .route("/analytics/dashboard", get(dashboard_handler))
        .route(
            "/reports/export",
            get(report_handler).post(export_report_handler),
        )
        .route("/settings", get(get_settings_handler).put(update_settings_handler))
        .route("/settings/stripe", post(connect_stripe_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "durable": state.crm.storage().is_durable(),
    }))
}

// --- Contacts ---

#[derive(Deserialize, Default)]
pub struct ContactQuery {
    #[serde(default)]
    pub search: String,
    pub tag: Option<String>,
}

async fn list_contacts_handler(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> ApiResult<Json<Vec<Contact>>> {
    let contacts = state
        .crm
        .contacts()
        .filter(&query.search, query.tag.as_deref())?;
    Ok(Json(contacts))
}

async fn create_contact_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewContact>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let contact = state.crm.contacts().create(payload)?;
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn get_contact_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Contact>> {
    found("Contact", &id, state.crm.contacts().get(&id)?)
}

async fn update_contact_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ContactUpdate>,
) -> ApiResult<Json<Contact>> {
    found("Contact", &id, state.crm.contacts().update(&id, payload)?)
}

async fn delete_contact_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted("Contact", &id, state.crm.contacts().delete(&id)?)
}

async fn touch_contact_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Contact>> {
    found("Contact", &id, state.crm.contacts().touch(&id)?)
}

async fn contact_subscriptions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Subscription>>> {
    Ok(Json(state.crm.subscriptions().for_contact(&id)?))
}

async fn contact_purchases_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Purchase>>> {
    Ok(Json(state.crm.purchases().for_contact(&id)?))
}

// --- Products ---

async fn list_products_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.crm.products().list()?))
}

async fn create_product_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.crm.products().create(payload)?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    found("Product", &id, state.crm.products().get(&id)?)
}

async fn update_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    found("Product", &id, state.crm.products().update(&id, payload)?)
}

async fn delete_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted("Product", &id, state.crm.products().delete(&id)?)
}

async fn toggle_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    found("Product", &id, state.crm.products().toggle_active(&id)?)
}

// --- Subscriptions ---

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: SubscriptionStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub contact_id: String,
}

async fn list_subscriptions_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Subscription>>> {
    Ok(Json(state.crm.subscriptions().list()?))
}

async fn create_subscription_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewSubscription>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let subscription = state.crm.subscriptions().create(payload)?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn get_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    found("Subscription", &id, state.crm.subscriptions().get(&id)?)
}

async fn update_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SubscriptionUpdate>,
) -> ApiResult<Json<Subscription>> {
    found("Subscription", &id, state.crm.subscriptions().update(&id, payload)?)
}

async fn delete_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted("Subscription", &id, state.crm.subscriptions().delete(&id)?)
}

async fn transition_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusChange>,
) -> ApiResult<Json<Subscription>> {
    Ok(Json(state.crm.subscriptions().transition(&id, payload.status)?))
}

async fn add_team_member_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TeamMember>,
) -> ApiResult<Json<Subscription>> {
    Ok(Json(
        state
            .crm
            .subscriptions()
            .add_team_member(&id, &payload.contact_id)?,
    ))
}

async fn remove_team_member_handler(
    State(state): State<AppState>,
    Path((id, contact_id)): Path<(String, String)>,
) -> ApiResult<Json<Subscription>> {
    Ok(Json(
        state.crm.subscriptions().remove_team_member(&id, &contact_id)?,
    ))
}

// --- Purchases ---

async fn list_purchases_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<Purchase>>> {
    Ok(Json(state.crm.purchases().list()?))
}

async fn create_purchase_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewPurchase>,
) -> ApiResult<(StatusCode, Json<Purchase>)> {
    let purchase = state.crm.purchases().create(payload)?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

async fn get_purchase_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Purchase>> {
    found("Purchase", &id, state.crm.purchases().get(&id)?)
}

async fn update_purchase_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<PurchaseUpdate>,
) -> ApiResult<Json<Purchase>> {
    found("Purchase", &id, state.crm.purchases().update(&id, payload)?)
}

async fn delete_purchase_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted("Purchase", &id, state.crm.purchases().delete(&id)?)
}

// --- Campaigns ---

async fn list_campaigns_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<EmailCampaign>>> {
    Ok(Json(state.crm.campaigns().list()?))
}

async fn create_campaign_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewCampaign>,
) -> ApiResult<(StatusCode, Json<EmailCampaign>)> {
    let campaign = state.crm.campaigns().create(payload)?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

async fn get_campaign_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EmailCampaign>> {
    found("Campaign", &id, state.crm.campaigns().get(&id)?)
}

async fn update_campaign_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CampaignUpdate>,
) -> ApiResult<Json<EmailCampaign>> {
    found("Campaign", &id, state.crm.campaigns().update(&id, payload)?)
}

async fn delete_campaign_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    deleted("Campaign", &id, state.crm.campaigns().delete(&id)?)
}

async fn record_metrics_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<DeliveryCounts>,
) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.crm.campaigns().record_metrics(&id, payload)?))
}

async fn target_campaign_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SegmentCriteria>,
) -> ApiResult<Json<EmailCampaign>> {
    Ok(Json(state.crm.campaigns().target(&id, payload)?))
}

// --- Segments ---

#[derive(Deserialize)]
pub struct SegmentQuery {
    pub dimension: String,
    pub value: String,
}

#[derive(Serialize)]
pub struct SegmentMembers {
    #[serde(flatten)]
    pub segment: Segment,
    pub count: usize,
    pub contacts: Vec<Contact>,
}

async fn segments_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<SegmentSummary>>> {
    let contacts = state.crm.contacts().list()?;
    Ok(Json(segments::catalog_with_counts(&contacts)))
}

async fn segment_members_handler(
    State(state): State<AppState>,
    Query(query): Query<SegmentQuery>,
) -> ApiResult<Json<SegmentMembers>> {
    let segment = Segment::parse(&query.dimension, &query.value)?;
    let contacts = state.crm.contacts().list()?;
    let members: Vec<Contact> = segments::segment_members(&contacts, &segment)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(SegmentMembers {
        segment,
        count: members.len(),
        contacts: members,
    }))
}

async fn resolve_segment_handler(
    State(state): State<AppState>,
    Json(criteria): Json<SegmentCriteria>,
) -> ApiResult<Json<Vec<Contact>>> {
    let contacts = state.crm.contacts().list()?;
    let subscriptions = state.crm.subscriptions().list()?;
    let purchases = state.crm.purchases().list()?;
    let matched = segments::resolve_criteria(&contacts, &subscriptions, &purchases, &criteria)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(matched))
}

// --- Analytics and reports ---

async fn campaign_analytics_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<CampaignSummary>> {
    Ok(Json(state.crm.campaign_summary()?))
}

async fn revenue_analytics_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RevenuePoint>>> {
    Ok(Json(state.crm.revenue_series()?))
}

async fn subscription_analytics_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SubscriptionPoint>>> {
    Ok(Json(state.crm.subscription_series()?))
}

async fn dashboard_handler(State(state): State<AppState>) -> ApiResult<Json<DashboardSummary>> {
    Ok(Json(state.crm.dashboard()?))
}

#[derive(Deserialize, Default)]
pub struct ReportQuery {
    pub range: Option<String>,
}

impl ReportQuery {
    fn range(&self) -> Result<DateRange, CrmError> {
        self.range
            .as_deref()
            .map_or(Ok(DateRange::default()), str::parse::<DateRange>)
    }
}

async fn report_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Report>> {
    Ok(Json(state.crm.report(query.range()?)?))
}

async fn export_report_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let path = state
        .crm
        .export_report(query.range()?, state.report_dir.as_path())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "path": path.display().to_string() })),
    ))
}

// --- Settings ---

async fn get_settings_handler(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.crm.settings().get()?))
}

async fn update_settings_handler(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<Json<Settings>> {
    Ok(Json(state.crm.settings().update(patch)?))
}

async fn connect_stripe_handler(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.crm.settings().connect_stripe()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(Crm::new(Storage::memory(), true), std::env::temp_dir())
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["durable"], false);
    }

    #[tokio::test]
    async fn test_contact_lifecycle() {
        let app = app();
        let (status, created) = call(
            &app,
            Method::POST,
            "/contacts",
            Some(json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "ada@example.com",
                "tags": ["VET", "VET"],
                "engagementScore": 60
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["tags"], json!(["VET"]));
        let id = created["id"].as_str().unwrap().to_string();

        let (status, listed) = call(&app, Method::GET, "/contacts?search=lovelace", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::DELETE, &format!("/contacts/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, Method::DELETE, &format!("/contacts/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_touch_contact() {
        let app = app();
        let (status, touched) = call(&app, Method::POST, "/contacts/1/touch", None).await;
        assert_eq!(status, StatusCode::OK);
        let at = crate::timestamp::parse(touched["lastActivity"].as_str().unwrap()).unwrap();
        assert!(at > crate::timestamp::date(2024, 12, 20));

        let (status, body) = call(&app, Method::POST, "/contacts/missing/touch", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_negative_purchase_amount_is_rejected() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::PUT,
            "/purchases/pur_1",
            Some(json!({ "amount": -5000.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (_, series) = call(&app, Method::GET, "/analytics/revenue", None).await;
        assert!(series
            .as_array()
            .unwrap()
            .iter()
            .all(|point| point["revenue"].as_f64().unwrap() >= 0.0));
    }

    #[tokio::test]
    async fn test_validation_and_conflict_statuses() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/contacts",
            Some(json!({
                "firstName": "Too",
                "lastName": "Engaged",
                "email": "x@example.com",
                "engagementScore": 101
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = call(
            &app,
            Method::POST,
            "/subscriptions/sub_1/status",
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_individual_subscription_capped_over_http() {
        let (status, body) = call(
            &app(),
            Method::POST,
            "/subscriptions",
            Some(json!({
                "contactId": "3",
                "type": "individual",
                "amount": 299,
                "maxTeamMembers": 6
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["maxTeamMembers"], 1);
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn test_segments_and_analytics() {
        let app = app();
        let (_, catalog) = call(&app, Method::GET, "/segments", None).await;
        assert_eq!(catalog.as_array().unwrap().len(), 18);

        let (status, members) = call(
            &app,
            Method::GET,
            "/segments/members?dimension=engagement&value=high",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(members["count"], 2);

        let (status, _) = call(
            &app,
            Method::GET,
            "/segments/members?dimension=colour&value=red",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, summary) = call(&app, Method::GET, "/analytics/campaigns", None).await;
        assert_eq!(summary["openRate"], 55.1);
        assert_eq!(summary["totalSent"], 2650);

        let (_, dashboard) = call(&app, Method::GET, "/analytics/dashboard", None).await;
        assert_eq!(dashboard["totalContacts"], 3);
    }

    #[tokio::test]
    async fn test_report_and_settings() {
        let app = app();
        let (status, report) = call(&app, Method::GET, "/reports/export?range=90d", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["dateRange"], "90d");
        assert_eq!(report["sourceBreakdown"].as_array().unwrap().len(), 5);

        let (status, _) = call(&app, Method::GET, "/reports/export?range=5y", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, settings) = call(&app, Method::POST, "/settings/stripe", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settings["payments"]["stripeConnected"], true);
    }
}
