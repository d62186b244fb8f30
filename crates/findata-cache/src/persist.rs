//! 비동기 write-back 큐.
//!
//! 병합으로 변경된 시계열 스냅샷을 유계 큐에 넣고, 백그라운드 워커가
//! 내구 저장소에 기록합니다. 요청 경로는 큐 적재까지만 책임지므로
//! 내구 저장소의 지연이나 장애가 응답 시간에 영향을 주지 않습니다.
//!
//! 큐가 가득 차면 적재를 거부하고 호출자에게 알립니다. 호출자는 시계열을
//! 다시 dirty로 되돌려 다음 병합 때 재적재합니다.
//!
//! 같은 blob의 스냅샷은 적재 순서대로 일련번호를 받고, 워커는 blob별
//! 뮤텍스 아래에서 마지막으로 저장된 일련번호와 비교합니다. 워커가 여러 개라
//! 같은 blob의 작업을 서로 다른 워커가 집더라도 오래된 전체 이미지가
//! 새 이미지를 덮어쓰는 일은 없습니다.

use crate::storage::{encode_snapshot, BlobStore};
use crate::store::SeriesSnapshot;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 내구 기록 한 건.
#[derive(Debug)]
pub struct PersistJob {
    /// 기록 대상 blob 이름.
    pub blob_name: String,
    /// 기록할 전체 이미지.
    pub snapshot: SeriesSnapshot,
}

/// 큐 내부 표현. 일련번호는 적재 시점에 부여됩니다.
#[derive(Debug)]
struct QueuedJob {
    seq: u64,
    job: PersistJob,
}

#[derive(Debug, Default)]
struct PersistCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    saved: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
}

/// 큐 카운터 스냅샷.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub saved: u64,
    /// 더 새로운 스냅샷이 이미 저장되어 건너뛴 작업 수.
    pub superseded: u64,
    pub failed: u64,
}

/// blob별 마지막 저장 일련번호.
///
/// 같은 blob의 저장은 이 뮤텍스 아래에서만 일어나므로, 어느 워커가 먼저
/// 도착하든 오래된 스냅샷은 저장되지 않고 건너뜁니다.
#[derive(Debug, Default)]
struct WriteOrder {
    per_blob: Mutex<HashMap<String, Arc<Mutex<u64>>>>,
}

impl WriteOrder {
    async fn slot_for(&self, name: &str) -> Arc<Mutex<u64>> {
        let mut per_blob = self.per_blob.lock().await;
        per_blob.entry(name.to_string()).or_default().clone()
    }
}

/// 유계 큐 + 워커 풀.
pub struct PersistQueue {
    /// 종료 시 `take()` 후 drop하여 채널을 닫습니다.
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    /// 워커가 0개여도 채널이 닫히지 않도록 큐가 receiver를 보유합니다.
    _receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    next_seq: AtomicU64,
    counters: Arc<PersistCounters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PersistQueue {
    /// 큐를 만들고 워커를 기동합니다.
    pub fn start(store: Arc<dyn BlobStore>, capacity: usize, worker_count: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PersistCounters::default());
        let order = Arc::new(WriteOrder::default());

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                receiver.clone(),
                store.clone(),
                order.clone(),
                counters.clone(),
            )));
        }

        info!(capacity = capacity.max(1), workers = worker_count, "write-back 큐 기동");

        Self {
            sender: Mutex::new(Some(sender)),
            _receiver: receiver,
            next_seq: AtomicU64::new(0),
            counters,
            workers: Mutex::new(workers),
        }
    }

    /// 스냅샷 기록을 예약합니다. 블로킹하지 않습니다.
    ///
    /// 큐가 받아들였으면 true를 반환합니다. false면 작업이 버려진 것이므로
    /// 호출자가 해당 시계열을 다시 dirty로 되돌려야 합니다.
    ///
    /// 일련번호 부여와 채널 적재가 sender 잠금 아래에서 함께 일어나므로
    /// 큐 순서와 일련번호 순서는 항상 일치합니다.
    pub async fn enqueue(&self, job: PersistJob) -> bool {
        let sender = self.sender.lock().await;
        let Some(sender) = sender.as_ref() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(blob = %job.blob_name, "종료된 write-back 큐, 작업 버림");
            return false;
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        match sender.try_send(QueuedJob { seq, job }) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(q)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(blob = %q.job.blob_name, "write-back 큐 가득 참, 작업 버림");
                false
            }
            Err(mpsc::error::TrySendError::Closed(q)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(blob = %q.job.blob_name, "write-back 큐 닫힘, 작업 버림");
                false
            }
        }
    }

    /// 채널을 닫고 잔여 작업이 모두 기록될 때까지 기다립니다.
    pub async fn shutdown(&self) {
        // sender를 drop해야 워커의 recv()가 None을 반환하며 종료됨
        let sender = self.sender.lock().await.take();
        drop(sender);

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        let stats = self.stats();
        info!(
            saved = stats.saved,
            failed = stats.failed,
            dropped = stats.dropped,
            "write-back 큐 드레인 완료"
        );
    }

    /// 현재 카운터 값.
    pub fn stats(&self) -> PersistStats {
        PersistStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            saved: self.counters.saved.load(Ordering::Relaxed),
            superseded: self.counters.superseded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// 워커 루프. 채널이 닫히고 비워지면 종료합니다.
///
/// receiver 잠금은 recv 동안만 잡으므로 서로 다른 blob의 작업은 워커들이
/// 병렬로 처리합니다. 같은 blob은 blob별 뮤텍스가 직렬화하며, 스냅샷이
/// 전체 이미지이므로 마지막 저장본보다 오래된 작업은 건너뜁니다.
async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    store: Arc<dyn BlobStore>,
    order: Arc<WriteOrder>,
    counters: Arc<PersistCounters>,
) {
    loop {
        let queued = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(QueuedJob { seq, job }) = queued else { break };

        let slot = order.slot_for(&job.blob_name).await;
        let mut last_saved = slot.lock().await;
        if seq <= *last_saved {
            counters.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(worker = worker_id, blob = %job.blob_name, "더 새로운 스냅샷이 이미 저장됨, 건너뜀");
            continue;
        }

        let rows = job.snapshot.observations.len();
        match encode_snapshot(&job.snapshot) {
            Ok(bytes) => match store.save(&job.blob_name, bytes).await {
                Ok(()) => {
                    *last_saved = seq;
                    counters.saved.fetch_add(1, Ordering::Relaxed);
                    debug!(worker = worker_id, blob = %job.blob_name, rows, "스냅샷 저장 완료");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(worker = worker_id, blob = %job.blob_name, error = %e, "스냅샷 저장 실패");
                }
            },
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(worker = worker_id, blob = %job.blob_name, error = %e, "스냅샷 직렬화 실패");
            }
        }
    }

    debug!(worker = worker_id, "write-back 워커 종료");
}
