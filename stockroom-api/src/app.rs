/// Application state and router builder
///
/// # Routes
///
/// ```text
/// public          /health, /auth/login, /auth/register, /auth/logout,
///                 /auth/email/verify
/// refresh token   /auth/refresh
/// protect         /auth/email/send-verify, /users/..., /teams, /teams/me,
///                 /teams/join, /teams/join/link, /teams/:team_id/request-join
/// protect + team  /teams/:team_id/... (members, products, categories,
///                 sequences)
/// protect + rule  /reports/...
/// ```
///
/// Guards are attached with `route_layer`; the last layer added runs first,
/// so `protect` is always added after the permission check it feeds.

use crate::{
    config::Config,
    middleware::{guard, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use stockroom_shared::{
    auth::{
        guard::{AuthGuard, PgDirectory},
        jwt::CredentialService,
        policy::PgPolicyStore,
    },
    db::transaction::TransactionRunner,
    mailer::{LogMailer, Mailer},
    sequence::SequenceGenerator,
};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialService>,
    pub guard: AuthGuard,
    pub runner: TransactionRunner,
    pub sequences: SequenceGenerator,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Production wiring: PostgreSQL directories and policy store, log mailer
    pub fn new(db: PgPool, config: Config) -> Self {
        let credentials = Arc::new(CredentialService::new(config.jwt.settings()));
        let directory = Arc::new(PgDirectory::new(db.clone()));
        let guard = AuthGuard::new(
            credentials.clone(),
            directory.clone(),
            directory,
            Arc::new(PgPolicyStore::new(db.clone())),
        );

        Self::from_parts(db, config, credentials, guard, Arc::new(LogMailer))
    }

    pub fn from_parts(
        db: PgPool,
        config: Config,
        credentials: Arc<CredentialService>,
        guard: AuthGuard,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            runner: TransactionRunner::new(db.clone()),
            sequences: SequenceGenerator::new(db.clone()),
            db,
            config: Arc::new(config),
            credentials,
            guard,
            mailer,
        }
    }
}

/// Builds the complete router with every route group and the middleware stack
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/email/verify", get(routes::auth::verify_email));

    let refresh = Router::new()
        .route("/auth/refresh", post(routes::auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), guard::protect_refresh));

    let protected = Router::new()
        .route("/auth/email/send-verify", post(routes::auth::send_verify_email))
        .route("/users/me", get(routes::users::me))
        .route("/users/verify-email", get(routes::users::email_verified))
        .route("/users/by-username", get(routes::users::search_by_username))
        .route("/users/profile-image", post(routes::users::upload_profile_image))
        .route("/users/:id", get(routes::users::get_user))
        .route("/teams", get(routes::teams::list_teams).post(routes::teams::create_team))
        .route("/teams/me", get(routes::teams::my_teams))
        .route("/teams/join", get(routes::teams::accept_invite))
        .route("/teams/join/link", post(routes::teams::join_with_link))
        .route("/teams/:team_id/request-join", post(routes::teams::request_join))
        .route_layer(from_fn_with_state(state.clone(), guard::protect));

    let team = Router::new()
        .route("/teams/:team_id", get(routes::teams::get_team).put(routes::teams::update_team))
        .route("/teams/:team_id/member-count", get(routes::teams::member_count))
        .route("/teams/:team_id/members", get(routes::teams::members))
        .route("/teams/:team_id/pending-member-count", get(routes::teams::pending_member_count))
        .route("/teams/:team_id/pending-members", get(routes::teams::pending_members))
        .route("/teams/:team_id/user-me", get(routes::teams::user_me))
        .route("/teams/:team_id/member-role", put(routes::teams::update_member_role))
        .route("/teams/:team_id/pending-member", post(routes::teams::invite_member))
        .route("/teams/:team_id/shared-link", post(routes::teams::shared_link))
        .route("/teams/:team_id/accept", post(routes::teams::accept_member))
        .route(
            "/teams/:team_id/product_category",
            get(routes::product_categories::list).post(routes::product_categories::create),
        )
        .route(
            "/teams/:team_id/product_category/:id",
            get(routes::product_categories::get)
                .put(routes::product_categories::update)
                .delete(routes::product_categories::delete),
        )
        .route(
            "/teams/:team_id/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route(
            "/teams/:team_id/products/:products_id",
            get(routes::products::get)
                .put(routes::products::update)
                .delete(routes::products::delete),
        )
        .route(
            "/teams/:team_id/products/:products_id/upload_image",
            post(routes::products::upload_image),
        )
        .route(
            "/teams/:team_id/products/:products_id/product_image/:product_image_id",
            delete(routes::products::delete_image),
        )
        .route("/teams/:team_id/sequences/:entity_type/next", post(routes::sequences::next))
        .route("/teams/:team_id/sequences/:entity_type/reset", post(routes::sequences::reset))
        .route_layer(from_fn_with_state(state.clone(), guard::team_permission))
        .route_layer(from_fn_with_state(state.clone(), guard::protect));

    let reports = Router::new()
        .route("/reports", get(routes::reports::list).post(routes::reports::create))
        .route(
            "/reports/:id",
            get(routes::reports::get)
                .put(routes::reports::update)
                .delete(routes::reports::delete),
        )
        .route_layer(from_fn_with_state(state.clone(), guard::permission))
        .route_layer(from_fn_with_state(state.clone(), guard::protect));

    Router::new()
        .merge(public)
        .merge(refresh)
        .merge(protected)
        .merge(team)
        .merge(reports)
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.api.request_timeout_secs,
        )))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory wiring for router tests that never touch the database.

    use super::*;
    use crate::config::{ApiConfig, CookieConfig, DatabaseConfig, JwtConfig};
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;
    use std::collections::{HashMap, HashSet};
    use stockroom_shared::auth::{
        guard::{MembershipDirectory, UserDirectory},
        policy::{PolicyError, PolicyStore},
    };
    use stockroom_shared::models::{policy::PolicyRule, role::TeamRole};

    struct Users(HashSet<i64>);

    #[async_trait]
    impl UserDirectory for Users {
        async fn user_exists(&self, user_id: i64) -> Result<bool, sqlx::Error> {
            Ok(self.0.contains(&user_id))
        }
    }

    struct Members(HashMap<(i64, i64), (TeamRole, bool)>);

    #[async_trait]
    impl MembershipDirectory for Members {
        async fn active_role(&self, team_id: i64, user_id: i64) -> Result<Option<TeamRole>, sqlx::Error> {
            Ok(self
                .0
                .get(&(team_id, user_id))
                .filter(|(_, active)| *active)
                .map(|(role, _)| *role))
        }
    }

    struct Rules(Vec<PolicyRule>);

    #[async_trait]
    impl PolicyStore for Rules {
        async fn load_rules(&self) -> Result<Vec<PolicyRule>, PolicyError> {
            Ok(self.0.clone())
        }
    }

    pub fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
                request_timeout_secs: 5,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "postgresql://stockroom@127.0.0.1:1/unused".to_string(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 1,
            },
            jwt: JwtConfig {
                access_secret: "router-access-secret-at-least-32-bytes".to_string(),
                refresh_secret: "router-refresh-secret-at-least-32-bytes".to_string(),
                link_secret: "router-link-secret-at-least-32-bytes!!".to_string(),
                access_ttl_secs: 3600,
                refresh_ttl_secs: 7200,
                email_verify_ttl_secs: 600,
                team_invite_ttl_secs: 600,
            },
            cookie: CookieConfig {
                name: "session".to_string(),
                secure: false,
            },
        }
    }

    /// Users 1, 2 and 3; user 1 owns team 10, user 3 is pending there;
    /// user 1 may read `/reports`.
    pub fn state() -> AppState {
        let config = config();
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy(&config.database.url)
            .expect("lazy pool");

        let credentials = Arc::new(CredentialService::new(config.jwt.settings()));
        let guard = AuthGuard::new(
            credentials.clone(),
            Arc::new(Users(HashSet::from([1, 2, 3]))),
            Arc::new(Members(HashMap::from([
                ((10, 1), (TeamRole::Owner, true)),
                ((10, 3), (TeamRole::Member, false)),
            ]))),
            Arc::new(Rules(vec![
                PolicyRule::permission("team:owner", "/teams/:team_id", "GET"),
                PolicyRule::permission("1", "/reports", "GET"),
            ])),
        );

        AppState::from_parts(pool, config, credentials, guard, Arc::new(LogMailer))
    }
}
