use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::usecases::subscriptions::SubscriptionUseCase,
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{
            plans::PlanRepository, subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::subscriptions::{SubscribeRequest, ThreeDSecureResult},
    },
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::AppError},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                plans::PlanPostgres, subscriptions::SubscriptionPostgres, users::UserPostgres,
            },
        },
    },
    payments::{ConfiguredProcessor, gateway::SubscriptionGateway},
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    gateway: Arc<ConfiguredProcessor>,
) -> Router {
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));

    let usecase = SubscriptionUseCase::new(
        Arc::new(plan_repository),
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        gateway,
        Arc::new(config.application.clone()),
    );

    router(Arc::new(usecase))
}

pub fn router<P, U, S, G>(usecase: Arc<SubscriptionUseCase<P, U, S, G>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/subscribe", post(subscribe::<P, U, S, G>))
        .route("/cancel", post(cancel::<P, U, S, G>))
        .route(
            "/:id/users/:user_id/subscribe-3d",
            get(confirm_3d_secure::<P, U, S, G>),
        )
        .route("/stripe/webhook", post(stripe_webhook::<P, U, S, G>))
        .with_state(usecase)
}

pub async fn subscribe<P, U, S, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, U, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<SubscribeRequest>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    info!(%user_id, plan_id = %request.plan_id, "subscriptions: subscribe request received");

    match usecase.subscribe(user_id, request).await {
        Ok(flash) => (StatusCode::OK, Json(flash)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn cancel<P, U, S, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, U, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    info!(%user_id, "subscriptions: cancel request received");

    match usecase.cancel(user_id).await {
        Ok(flash) => (StatusCode::OK, Json(flash)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn confirm_3d_secure<P, U, S, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, U, S, G>>>,
    AuthUser { user_id: caller_id, .. }: AuthUser,
    Path((plan_id, user_id)): Path<(Uuid, Uuid)>,
    Query(result): Query<ThreeDSecureResult>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    match usecase
        .confirm_3d_secure(caller_id, plan_id, user_id, result)
        .await
    {
        Ok(flash) => (StatusCode::OK, Json(flash)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn stripe_webhook<P, U, S, G>(
    State(usecase): State<Arc<SubscriptionUseCase<P, U, S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("subscriptions: webhook without signature header");
        return AppError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: "Missing Stripe-Signature header".to_string(),
        }
        .into_response();
    };

    match usecase.handle_webhook(&body, signature).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
