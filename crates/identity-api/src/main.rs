//! 사용자 인증/관리 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 가입, 로그인, 토큰 갱신, 사용자 관리 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use identity_api::auth::TokenIssuer;
use identity_api::metrics::setup_metrics_recorder;
use identity_api::middleware::{
    metrics_layer, rate_limit_middleware, RateLimitConfig, RateLimitState,
};
use identity_api::openapi::swagger_ui_router;
use identity_api::routes::create_api_router;
use identity_api::state::AppState;
use identity_core::config::{AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, ServerConfig};
use identity_core::logging::{init_logging, LogConfig};

/// 인증 시크릿 확정.
///
/// 설정 파일이나 `IDENTITY__AUTH__*` 환경 변수로 받은 시크릿이 비어 있으면
/// 개발용 기본값으로 채웁니다. 액세스/리프레시 시크릿은 반드시 서로 달라야
/// 하므로 기본값도 클래스별로 분리되어 있습니다.
fn resolve_auth_config(mut auth: AuthConfig) -> AuthConfig {
    if auth.access_secret.expose_secret().is_empty() {
        warn!("액세스 토큰 시크릿이 비어 있습니다. 개발용 기본값을 사용합니다 (운영 환경 사용 금지)");
        auth.access_secret =
            SecretString::from("dev-access-secret-change-in-production".to_string());
    }
    if auth.refresh_secret.expose_secret().is_empty() {
        warn!("리프레시 토큰 시크릿이 비어 있습니다. 개발용 기본값을 사용합니다 (운영 환경 사용 금지)");
        auth.refresh_secret =
            SecretString::from("dev-refresh-secret-change-in-production".to_string());
    }
    auth
}

/// AppState 초기화.
///
/// DATABASE_URL 환경 변수가 있으면 PostgreSQL 풀을 연결하고, 없으면
/// 저장소가 필요 없는 엔드포인트만 동작하는 상태로 시작합니다.
async fn create_app_state(config: &AppConfig, tokens: TokenIssuer) -> AppState {
    let mut state = AppState::new(tokens);

    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        match PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
            .connect(&database_url)
            .await
        {
            Ok(pool) => {
                // 연결 테스트
                if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                    info!("Connected to PostgreSQL successfully");
                    state = state.with_db_pool(pool);
                } else {
                    error!("Failed to verify database connection");
                }
            }
            Err(e) => {
                error!("Failed to connect to database: {}", e);
            }
        }
    } else {
        warn!("DATABASE_URL not set, database features will be disabled");
    }

    state
}

/// CORS 미들웨어 구성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
///   예: `https://dashboard.example.com,https://admin.example.com`
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            // 프로덕션: 특정 origin만 허용
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            // 개발: 모든 origin 허용
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        // 허용되는 HTTP 메서드
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        // 허용되는 헤더
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        // 자격 증명 포함 허용 (CORS_ORIGINS 설정 시에만)
        .allow_credentials(std::env::var("CORS_ORIGINS").is_ok())
        // preflight 요청 캐시 시간
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// Rate Limit 비활성화 여부 확인.
fn is_rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Rate Limit 설정 로드.
fn rate_limit_config() -> RateLimitConfig {
    let requests_per_minute = std::env::var("RATE_LIMIT_RPM")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300); // 기본: 분당 300회

    // 신뢰할 수 있는 프록시 뒤에 배포할 때만 켠다 (X-Forwarded-For 기반 키)
    let trust_forwarded_headers = std::env::var("RATE_LIMIT_TRUST_PROXY")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    info!(
        requests_per_minute = requests_per_minute,
        trust_forwarded_headers = trust_forwarded_headers,
        "Rate limiting configured"
    );

    RateLimitConfig {
        trust_forwarded_headers,
        ..RateLimitConfig::new(requests_per_minute)
    }
}

/// 전체 라우터 생성.
fn create_router(
    state: AppState,
    metrics_handle: PrometheusHandle,
    rate_limit_state: Option<RateLimitState>,
) -> Router {
    // 메트릭 라우터 (별도 상태, Rate Limit 제외)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let tokens = state.tokens.clone();

    // API 라우터 (Rate Limit 조건부 적용)
    let api_router = match rate_limit_state {
        None => {
            info!("Rate limiting DISABLED (RATE_LIMIT_DISABLED=true)");
            create_api_router().with_state(state)
        }
        Some(rate_limit_state) => create_api_router().with_state(state).layer(
            middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware),
        ),
    };

    // 전체 라우터 조합
    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        // OpenAPI 문서 및 Swagger UI
        .merge(swagger_ui_router())
        // 인증 추출기가 요청 확장에서 TokenIssuer를 읽는다
        .layer(Extension(tokens))
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        // 기타 미들웨어
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> Result<(), Box<dyn std::error::Error>> {
    use identity_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    // 명령줄 인자에서 --export-openapi 플래그 확인
    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");

    // 환경변수 EXPORT_OPENAPI 확인
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        // OpenAPI 스펙 생성
        let spec = ApiDoc::openapi();

        // JSON으로 직렬화
        let json = serde_json::to_string_pretty(&spec)?;

        // stdout으로 출력
        println!("{}", json);

        // 프로세스 종료
        std::process::exit(0);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // OpenAPI 내보내기 처리 (서버 시작 전)
    handle_export_openapi()?;

    // 설정 로드. 파일이 없으면 기본값으로 시작한다 (로깅 초기화 후에 알린다).
    let (config, config_load_error) = match AppConfig::load_default() {
        Ok(config) => (config, None),
        Err(e) => (
            AppConfig {
                server: ServerConfig::default(),
                database: DatabaseConfig::default(),
                auth: AuthConfig::default(),
                logging: LoggingConfig::default(),
            },
            Some(e),
        ),
    };

    // tracing 초기화
    let log_config = LogConfig::new(&config.logging.level)
        .with_format(config.logging.format.parse().unwrap_or_default());
    init_logging(log_config)?;

    if let Some(e) = config_load_error {
        warn!("설정 파일을 읽지 못했습니다 ({}), 기본값으로 시작합니다", e);
    }

    info!("Starting Identity API server...");

    // Prometheus 메트릭 레코더 설정
    let metrics_handle = setup_metrics_recorder();
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. IDENTITY__SERVER__HOST, IDENTITY__SERVER__PORT를 확인하세요."
            );
            e
        })?;

    // 토큰 발급기 생성 (시크릿 미설정 시 개발용 기본값 + 경고)
    let auth_config = resolve_auth_config(config.auth.clone());
    let tokens = TokenIssuer::new(&auth_config);
    info!(
        access_ttl_minutes = auth_config.access_ttl_minutes,
        refresh_ttl_days = auth_config.refresh_ttl_days,
        "Token issuer initialized"
    );

    // AppState 생성 (DB 연결 포함)
    let state = create_app_state(&config, tokens).await;

    info!(version = %state.version, "Application state initialized");
    info!(
        has_db = state.has_db_pool(),
        "Service connections status"
    );

    // 전역 종료 토큰 생성 (graceful shutdown용, 백그라운드 태스크에서 사용)
    let shutdown_token = CancellationToken::new();

    // Rate Limit 상태 준비 (비활성화 시 None)
    let rate_limit_state = if is_rate_limit_disabled() {
        None
    } else {
        Some(RateLimitState::new(rate_limit_config()))
    };

    // Rate Limiter 버킷 청소 태스크 (오래된 IP 엔트리 제거)
    if let Some(ref rate_limit) = rate_limit_state {
        let cleanup_state = rate_limit.clone();
        let cleanup_token = shutdown_token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_state.limiter().cleanup_interval());
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        cleanup_state.limiter().cleanup().await;
                    }
                    _ = cleanup_token.cancelled() => {
                        info!("Rate limiter cleanup task stopped");
                        break;
                    }
                }
            }
        });
    }

    // 라우터 생성
    let app = create_router(state, metrics_handle, rate_limit_state);

    // 서버 시작
    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_token_for_signal = shutdown_token.clone();

    // Graceful shutdown 처리 (타임아웃 포함)
    // ConnectInfo로 피어 주소를 확장에 실어 Rate Limiter가 키로 쓴다
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token_for_signal))
    .await?;

    // 종료 시그널 받은 후 정리 작업
    info!("Server shutdown initiated, cleaning up...");

    // 종료 토큰 취소 (백그라운드 태스크에 종료 시그널 전파)
    shutdown_token.cancel();

    // 정리 작업에 최대 10초 대기
    let cleanup_timeout = tokio::time::timeout(Duration::from_secs(10), async {
        // 진행 중인 요청 완료 대기
        tokio::time::sleep(Duration::from_millis(500)).await;
        info!("Cleanup completed");
    })
    .await;

    if cleanup_timeout.is_err() {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
///
/// # Arguments
/// * `shutdown_token` - 백그라운드 태스크에 종료를 전파할 CancellationToken
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    // 모든 백그라운드 태스크에 종료 시그널 전파
    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
