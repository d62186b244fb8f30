//! 내구 blob 저장소.
//!
//! 시계열 스냅샷을 gzip 압축 JSON blob으로 저장합니다. 저장소 구현은
//! [`BlobStore`] trait 뒤에 있어 테스트에서는 메모리 구현으로 대체합니다.

use crate::store::SeriesSnapshot;
use async_trait::async_trait;
use findata_core::{CacheError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// blob 단위 load/save 인터페이스.
///
/// blob 이름은 [`findata_core::EntityKey::blob_name`]이 결정하며,
/// 저장소는 이름을 불투명한 키로만 다룹니다.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// blob을 읽습니다. 없으면 `Ok(None)`.
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// blob을 통째로 덮어씁니다.
    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<()>;
}

// =============================================================================
// 스냅샷 직렬화
// =============================================================================

/// 스냅샷을 gzip 압축 JSON으로 인코딩합니다.
pub fn encode_snapshot(snapshot: &SeriesSnapshot) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(snapshot)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// gzip 압축 JSON blob을 스냅샷으로 디코딩합니다.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SeriesSnapshot> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

// =============================================================================
// Redis 구현
// =============================================================================

/// Redis 기반 blob 저장소.
#[derive(Clone)]
pub struct RedisBlobStore {
    connection: Arc<RwLock<MultiplexedConnection>>,
    /// 0이면 만료 없음.
    ttl_secs: u64,
}

impl RedisBlobStore {
    /// Redis에 연결합니다.
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self> {
        info!("내구 저장소(Redis) 연결 중...");

        let client =
            Client::open(url).map_err(|e| CacheError::DurableStore(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::DurableStore(e.to_string()))?;

        let store = Self {
            connection: Arc::new(RwLock::new(connection)),
            ttl_secs,
        };

        // 커맨드 왕복까지 확인해야 죽은 연결로 기동하지 않음
        if !store.ping().await? {
            return Err(CacheError::DurableStore(
                "Redis PING 응답이 올바르지 않습니다".to_string(),
            ));
        }

        info!("내구 저장소(Redis) 연결 완료");

        Ok(store)
    }

    /// blob 이름에 대응하는 Redis 키.
    fn blob_key(name: &str) -> String {
        format!("series:{}", name)
    }

    /// 연결 상태를 확인합니다.
    pub async fn ping(&self) -> Result<bool> {
        let mut conn = self.connection.write().await;
        let result: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::DurableStore(e.to_string()))?;

        Ok(result == "PONG")
    }
}

#[async_trait]
impl BlobStore for RedisBlobStore {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.write().await;
        let bytes: Option<Vec<u8>> = conn
            .get(Self::blob_key(name))
            .await
            .map_err(|e| CacheError::DurableStore(e.to_string()))?;

        Ok(bytes)
    }

    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let key = Self::blob_key(name);
        let mut conn = self.connection.write().await;

        if self.ttl_secs > 0 {
            let _: () = conn
                .set_ex(key, bytes, self.ttl_secs)
                .await
                .map_err(|e| CacheError::DurableStore(e.to_string()))?;
        } else {
            let _: () = conn
                .set(key, bytes)
                .await
                .map_err(|e| CacheError::DurableStore(e.to_string()))?;
        }

        Ok(())
    }
}

// =============================================================================
// 메모리 구현
// =============================================================================

/// 테스트와 Redis 미설정 환경용 메모리 blob 저장소.
///
/// 재시작하면 내용이 사라지므로 내구성은 없지만, 서비스는 원격 provider만으로
/// 동일하게 동작합니다.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.blobs.read().await.contains_key(name)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(name).cloned())
    }

    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write().await.insert(name.to_string(), bytes);
        Ok(())
    }
}
