use std::sync::Arc;

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
};
use tracing::info;

use crate::{
    application::usecases::current_plan::CurrentPlanUseCase,
    config::config_model::DotEnvyConfig,
    domain::repositories::{plans::PlanRepository, users::UserRepository},
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::AppError},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{plans::PlanPostgres, users::UserPostgres},
        },
    },
    payments::{ConfiguredProcessor, gateway::SubscriptionGateway},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    gateway: Arc<ConfiguredProcessor>,
) -> Router {
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));

    let usecase = CurrentPlanUseCase::new(
        Arc::new(plan_repository),
        Arc::new(user_repository),
        gateway,
        Arc::new(config.application.clone()),
    );

    router(Arc::new(usecase))
}

pub fn router<P, U, G>(usecase: Arc<CurrentPlanUseCase<P, U, G>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/current", get(current::<P, U, G>))
        .with_state(usecase)
}

pub async fn current<P, U, G>(
    State(usecase): State<Arc<CurrentPlanUseCase<P, U, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    info!(%user_id, "current_plan: request received");

    match usecase.current(user_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
