use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_data_store::{
    AppState,
    config::Config,
    database::PgUserStore,
    middleware::log_errors,
    routes,
    service::UserDataService,
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，失败即为启动阶段的致命错误
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'user_data_store';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 应用表结构迁移
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    // 构造用户数据服务并触发启动事件
    let store = Arc::new(PgUserStore::new(Arc::new(pool)));
    let service = Arc::new(UserDataService::new(store, config.cache_settings()));
    service.handle_started(&config);

    let state = AppState {
        service,
        config: config.clone(),
    };

    // 用户数据路由
    let router = Router::new().nest(
        "/user-data",
        Router::new()
            .route(
                "/user",
                get(routes::user_data::handler::get_user)
                    .put(routes::user_data::handler::set_user),
            )
            .route("/users", get(routes::user_data::handler::get_users))
            .route(
                "/value",
                get(routes::user_data::handler::get_value)
                    .put(routes::user_data::handler::set_value),
            ),
    );

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
