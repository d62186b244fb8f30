//! 시계열 데이터 캐시 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 헬스 체크와 날짜 구간 시계열 조회 엔드포인트를 제공하며,
//! 종료 시 write-back 큐를 드레인한 뒤 내려갑니다.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use findata_api::routes::create_api_router;
use findata_api::state::AppState;
use findata_cache::{
    BlobStore, DataCacheService, FredApiClient, MarketDataProvider, MemoryBlobStore,
    RedisBlobStore, SeriesProvider, YahooFinanceProvider,
};
use findata_core::{init_logging, AppConfig, LogConfig};

/// 설정에 따라 계층형 캐시 서비스를 조립합니다.
///
/// - provider 계층: Yahoo Finance (자산) + FRED (거시경제 지표)
/// - 내구 계층: Redis URL이 있으면 gzip blob 저장소, 없으면 메모리 저장소
async fn build_cache_service(
    config: &AppConfig,
) -> Result<DataCacheService, Box<dyn std::error::Error>> {
    let fred = match config.provider.fred_api_key.clone() {
        Some(key) => FredApiClient::new(Some(key)),
        None => FredApiClient::from_env(),
    };
    if !fred.has_api_key() {
        warn!("FRED API 키가 없습니다. 거시경제 지표 요청은 실패합니다.");
    }

    let yahoo = YahooFinanceProvider::new()?;
    let provider: Arc<dyn SeriesProvider> = Arc::new(MarketDataProvider::new(yahoo, fred));

    let durable: Arc<dyn BlobStore> = match &config.durable.redis_url {
        Some(url) => match RedisBlobStore::connect(url, config.durable.blob_ttl_secs).await {
            Ok(store) => {
                info!("Redis 내구 저장소 연결 성공");
                Arc::new(store)
            }
            Err(e) => {
                warn!("Redis 연결 실패: {}. 메모리 저장소로 대체합니다 (내구성 없음).", e);
                Arc::new(MemoryBlobStore::new())
            }
        },
        None => {
            warn!("durable.redis_url 미설정, 메모리 저장소로 동작합니다 (재시작 시 소실)");
            Arc::new(MemoryBlobStore::new())
        }
    };

    Ok(DataCacheService::new(provider, durable, &config.cache))
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
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(std::env::var("CORS_ORIGINS").is_ok())
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // 설정 로드 후 그 값으로 tracing 초기화
    let config = AppConfig::load()?;
    init_logging(LogConfig::from_app_config(&config.logging))?;

    info!("Starting findata API server...");

    let addr = config.server.socket_addr().map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. FINDATA__SERVER__HOST, FINDATA__SERVER__PORT를 확인하세요."
        );
        e
    })?;

    // 캐시 서비스 조립 (provider + 내구 저장소 + write-back 큐)
    let service = Arc::new(build_cache_service(&config).await?);
    let state = Arc::new(AppState::new(service.clone()));

    info!(version = %state.version, "Application state initialized");

    let app = create_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    info!(%addr, "API server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 종료 시그널 받은 후 정리 작업
    info!("Server shutdown initiated, draining write-back queue...");

    // write-back 큐 드레인에 최대 10초 대기
    let drain = tokio::time::timeout(Duration::from_secs(10), service.shutdown()).await;
    if drain.is_err() {
        warn!("Write-back drain timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 반환하여 axum의 graceful
/// shutdown과 이어지는 write-back 드레인을 시작시킵니다.
async fn shutdown_signal() {
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
}
