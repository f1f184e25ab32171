//! Freelance Billing API
//!
//! Keeps each account's plan and credit balance consistent with payment
//! provider events.
//!
//! ## Endpoints
//!
//! - `POST /api/billing/webhook` - Provider event delivery
//! - `POST /api/billing/checkout` - Create checkout session
//! - `POST /api/billing/portal` - Create customer portal session
//! - `POST /api/billing/connect-onboarding` - Payout onboarding link
//! - `POST /api/billing/connect-dashboard` - Payout dashboard link
//! - `POST /api/billing/accounts` - Register billing account
//! - `GET /api/billing/accounts/me` - Current billing state
//! - `POST /api/billing/downgrade` - Return to the Free plan
//! - `POST /api/billing/credits/consume` - Spend credits
//! - `GET /health` - Liveness probe

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use freelance_billing::adapters::auth::{OidcConfig, OidcSessionValidator};
use freelance_billing::adapters::http::middleware::AuthState;
use freelance_billing::adapters::http::{billing_router, BillingAppState, BillingStores};
use freelance_billing::adapters::postgres::{
    PostgresAccountStore, PostgresInvoiceStore, PostgresJobPostStore,
    PostgresWebhookEventRepository, MIGRATOR,
};
use freelance_billing::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use freelance_billing::application::billing::{
    CheckoutSettings, ConnectUrls, PruneWebhookEventsHandler,
};
use freelance_billing::config::AppConfig;
use freelance_billing::domain::billing::EventVerifier;
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config);

    tracing::info!("Starting Freelance Billing API");
    config.validate()?;
    let addr = config.server.socket_addr()?;
    tracing::info!(
        addr = %addr,
        environment = ?config.server.environment,
        stripe_test_mode = config.stripe.is_test_mode(),
        "Configuration loaded"
    );

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    tracing::info!("Database pool created");
    if config.database.run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let stores = BillingStores {
        accounts: Arc::new(PostgresAccountStore::new(pool.clone())),
        invoices: Arc::new(PostgresInvoiceStore::new(pool.clone())),
        job_posts: Arc::new(PostgresJobPostStore::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
    };

    let stripe = &config.stripe;
    let payment_provider = Arc::new(StripePaymentAdapter::new(
        StripeConfig::new(stripe.api_key.expose_secret().as_str())
            .with_base_url(stripe.api_base_url.as_str()),
    ));
    let verifier = EventVerifier::new(stripe.webhook_secret.clone())
        .with_require_livemode(stripe.require_livemode);
    let checkout = CheckoutSettings {
        catalog: stripe.price_catalog(),
        job_post_price_cents: stripe.job_post_price_cents,
        currency: stripe.currency.clone(),
        success_url: stripe.success_url.clone(),
        cancel_url: stripe.cancel_url.clone(),
    };
    let connect_urls = ConnectUrls {
        refresh_url: stripe.connect_refresh_url.clone(),
        return_url: stripe.connect_return_url.clone(),
    };

    let state = BillingAppState::new(
        stores.clone(),
        payment_provider,
        verifier,
        checkout,
        stripe.portal_return_url.clone(),
        connect_urls,
    );

    let validator: AuthState = Arc::new(OidcSessionValidator::new(
        OidcConfig::new(config.auth.issuer.as_str(), config.auth.audience.as_str())
            .with_cache_duration(config.auth.jwks_cache_ttl()),
    )?);

    spawn_event_pruning(&config, stores);

    let app = build_router(&config, state, validator);

    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},freelance_billing=debug,sqlx=warn",
            config.server.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_router(config: &AppConfig, state: BillingAppState, validator: AuthState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&config.server.cors_origins_list()))
        .layer(TimeoutLayer::new(config.server.request_timeout()));

    // Health stays outside the timeout layer.
    billing_router(state, validator)
        .layer(middleware)
        .merge(Router::new().route("/health", get(|| async { "ok" })))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Prunes processed webhook records once at startup, then on the configured interval.
fn spawn_event_pruning(config: &AppConfig, stores: BillingStores) {
    let handler = PruneWebhookEventsHandler::new(
        stores.webhook_events,
        chrono::Duration::days(i64::from(config.webhooks.retention_days)),
    );
    let mut interval = tokio::time::interval(config.webhooks.prune_interval());

    tokio::spawn(async move {
        loop {
            interval.tick().await;
            match handler.handle(chrono::Utc::now()).await {
                Ok(removed) => tracing::info!(removed, "Pruned webhook event records"),
                Err(e) => tracing::error!(error = %e, "Webhook event pruning failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
