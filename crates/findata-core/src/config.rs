//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 로드 순서: 구조체 기본값 → `config/default.toml` → `config/{RUN_ENV}.toml`
//! → `FINDATA__` 접두사 환경 변수 (예: `FINDATA__SERVER__PORT=9000`).

use serde::{Deserialize, Serialize};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 캐시 코어 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 내구 저장소 설정
    #[serde(default)]
    pub durable: DurableConfig,
    /// 외부 프로바이더 설정
    #[serde(default)]
    pub provider: ProviderConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 전역 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// 바인딩할 소켓 주소를 반환합니다.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 30,
        }
    }
}

/// 캐시 코어 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// 원격 fetch 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 엔티티 락 획득 타임아웃 (초). 초과는 정상 경합이 아니라 결함 신호.
    pub lock_timeout_secs: u64,
    /// 쓰기 큐 용량 (가득 차면 write-back 유실)
    pub persist_queue_capacity: usize,
    /// 쓰기 워커 수
    pub persist_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            lock_timeout_secs: 120,
            persist_queue_capacity: 256,
            persist_workers: 2,
        }
    }
}

/// 내구 저장소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DurableConfig {
    /// Redis URL (없으면 메모리 저장소로 동작, 내구성 없음)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// blob TTL (초, 0이면 만료 없음)
    pub blob_ttl_secs: u64,
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            blob_ttl_secs: 0,
        }
    }
}

/// 외부 프로바이더 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// FRED API 키 (거시경제 지표 조회에 필요)
    #[serde(default)]
    pub fred_api_key: Option<String>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 설정 파일이 없어도 실패하지 않고 기본값 + 환경 변수로 동작합니다.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "default".to_string());

        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("cache.fetch_timeout_secs", 30)?
            .set_default("cache.lock_timeout_secs", 120)?
            .set_default("cache.persist_queue_capacity", 256)?
            .set_default("cache.persist_workers", 2)?
            .set_default("durable.blob_ttl_secs", 0)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // 파일에서 로드 (없으면 무시)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/{}", run_env)).required(false),
            )
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("FINDATA")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
