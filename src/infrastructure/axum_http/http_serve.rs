use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{
        Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::config_model::{DotEnvyConfig, Server},
    infrastructure::{
        axum_http::{default_routers, routers},
        postgres::postgres_connection::PgPoolSquad,
    },
    payments::ConfiguredProcessor,
};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let gateway = Arc::new(ConfiguredProcessor::from_config(&config)?);
    info!(
        processor = %config.application.subscription_processor,
        "http: subscription processor configured"
    );

    let plan_routes = routers::plans::routes(Arc::clone(&db_pool), Arc::clone(&config))
        .merge(routers::current_plan::routes(
            Arc::clone(&db_pool),
            Arc::clone(&config),
            Arc::clone(&gateway),
        ))
        .merge(routers::subscriptions::routes(
            Arc::clone(&db_pool),
            Arc::clone(&config),
            Arc::clone(&gateway),
        ));

    let app = with_layers(
        Router::new()
            .fallback(default_routers::not_found)
            .nest("/api/v1/plans", plan_routes)
            .route("/api/v1/health-check", get(default_routers::health_check)),
        &config.server,
    )?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn with_layers(app: Router, server: &Server) -> Result<Router> {
    Ok(app
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.timeout),
        ))
        .layer(RequestBodyLimitLayer::new(
            (server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http()))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received ctrl+C signal"),
        Err(err) => {
            error!(?err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn server(timeout: u64) -> Server {
        Server {
            port: 0,
            body_limit: 1,
            timeout,
        }
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        let app = with_layers(
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            ),
            &server(1),
        )
        .unwrap();

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn health_check_passes_through_the_layers() {
        let app = with_layers(
            Router::new().route("/api/v1/health-check", get(default_routers::health_check)),
            &server(30),
        )
        .unwrap();

        let response = app
            .oneshot(
                Request::get("/api/v1/health-check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
