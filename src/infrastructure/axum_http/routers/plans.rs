use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::usecases::plan_catalog::PlanCatalogUseCase,
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{plans::PlanRepository, users::UserRepository},
        value_objects::plans::PlanInput,
    },
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::AppError},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{plans::PlanPostgres, users::UserPostgres},
        },
    },
};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));

    let usecase = PlanCatalogUseCase::new(
        Arc::new(plan_repository),
        Arc::new(user_repository),
        Arc::new(config.application.clone()),
    );

    router(Arc::new(usecase))
}

pub fn router<P, U>(usecase: Arc<PlanCatalogUseCase<P, U>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index::<P, U>).post(store::<P, U>))
        .route("/create", get(create_form::<P, U>))
        .route("/:id/edit", get(edit::<P, U>))
        .route("/:id", put(update::<P, U>).delete(destroy::<P, U>))
        .with_state(usecase)
}

pub async fn index<P, U>(
    State(usecase): State<Arc<PlanCatalogUseCase<P, U>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let page = query.page.unwrap_or(1);
    info!(%user_id, page, "plans: index request received");

    match usecase.index(user_id, page).await {
        Ok(plans) => (StatusCode::OK, Json(plans)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn create_form<P, U>(
    State(usecase): State<Arc<PlanCatalogUseCase<P, U>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match usecase.create_form(user_id).await {
        Ok(form) => (StatusCode::OK, Json(form)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn store<P, U>(
    State(usecase): State<Arc<PlanCatalogUseCase<P, U>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(input): Json<PlanInput>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    info!(%user_id, "plans: store request received");

    match usecase.store(user_id, input).await {
        Ok(saved) => (StatusCode::CREATED, Json(saved)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn edit<P, U>(
    State(usecase): State<Arc<PlanCatalogUseCase<P, U>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(plan_id): Path<Uuid>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    match usecase.edit(user_id, plan_id).await {
        Ok(form) => (StatusCode::OK, Json(form)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn update<P, U>(
    State(usecase): State<Arc<PlanCatalogUseCase<P, U>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<PlanInput>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    info!(%user_id, %plan_id, "plans: update request received");

    match usecase.update(user_id, plan_id, input).await {
        Ok(saved) => (StatusCode::OK, Json(saved)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn destroy<P, U>(
    State(usecase): State<Arc<PlanCatalogUseCase<P, U>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(plan_id): Path<Uuid>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    info!(%user_id, %plan_id, "plans: destroy request received");

    match usecase.destroy(user_id, plan_id).await {
        Ok(flash) => (StatusCode::OK, Json(flash)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::authorization::test_support::user_with_role,
        config::config_model::Application,
        domain::{
            entities::users::UserEntity,
            repositories::{plans::MockPlanRepository, users::MockUserRepository},
            value_objects::enums::processor_kinds::ProcessorKind,
        },
        infrastructure::axum_http::routers::test_support::{bearer, read_json_body},
    };
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn app_settings() -> Arc<Application> {
        Arc::new(Application {
            app_url: "https://app.example.com".to_string(),
            subscription_processor: ProcessorKind::Stripe,
            free_plan_id: Uuid::nil(),
            force_user_to_pay: false,
            is_demo: false,
            plans_extended: true,
            available_plugins: vec![],
        })
    }

    fn app(plan_repo: MockPlanRepository, user: UserEntity) -> Router {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        router(Arc::new(PlanCatalogUseCase::new(
            Arc::new(plan_repo),
            Arc::new(user_repo),
            app_settings(),
        )))
    }

    #[tokio::test]
    async fn requests_without_token_are_unauthorized() {
        let response = app(MockPlanRepository::new(), user_with_role("admin"))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let payload = read_json_body(response).await;
        assert_eq!(payload["code"], 401);
    }

    #[tokio::test]
    async fn owners_get_forbidden_message() {
        let owner = user_with_role("owner");
        let token = bearer(owner.id);

        let response = app(MockPlanRepository::new(), owner)
            .oneshot(
                Request::get("/create")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let payload = read_json_body(response).await;
        assert_eq!(payload["message"], "Unauthorized action.");
    }

    #[tokio::test]
    async fn store_returns_created_flash() {
        let admin = user_with_role("admin");
        let token = bearer(admin.id);
        let plan_id = Uuid::new_v4();

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_create_plan()
            .returning(move |_| Ok(plan_id));

        let body = json!({
            "name": "Pro",
            "price": "19.99",
            "description": "Everything",
            "features": "menus",
            "period": "monthly",
            "subscribe": { "stripe_id": "price_pro" }
        });

        let response = app(plan_repo, admin)
            .oneshot(
                Request::post("/")
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = read_json_body(response).await;
        assert_eq!(payload["status"], "Plan successfully created!");
        assert_eq!(payload["plan_id"], plan_id.to_string());
    }

    #[tokio::test]
    async fn invalid_store_lists_field_errors() {
        let admin = user_with_role("admin");
        let token = bearer(admin.id);

        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_create_plan().never();

        let response = app(plan_repo, admin)
            .oneshot(
                Request::post("/")
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"Pro"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = read_json_body(response).await;
        assert!(payload["errors"].get("price").is_some());
        assert!(payload["errors"].get("name").is_none());
    }

    #[tokio::test]
    async fn destroy_missing_plan_is_not_found() {
        let admin = user_with_role("admin");
        let token = bearer(admin.id);

        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_find_by_id().returning(|_| Ok(None));

        let response = app(plan_repo, admin)
            .oneshot(
                Request::delete(format!("/{}", Uuid::new_v4()))
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
