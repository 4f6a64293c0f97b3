//! 客群人数重算跟踪
//!
//! 每次被接受的编辑都会发起一次重算。重算可能很慢，新的编辑可能在旧的重算完成前发起：
//! 只有最近一次发起的重算结果会被观察到，被取代的重算照常跑完，但结果被丢弃。

use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// 客群人数状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceStatus {
    /// 尚未发起过重算
    Idle,
    /// 最近一次重算进行中
    Pending,
    Ready(u64),
    Failed(String),
}

/// 带代次的客群人数状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceState {
    /// 最近一次发起的重算代次
    pub generation: u64,
    pub status: AudienceStatus,
}

impl AudienceState {
    pub fn count(&self) -> Option<u64> {
        match self.status {
            AudienceStatus::Ready(count) => Some(count),
            _ => None,
        }
    }
}

/// 客群人数跟踪器
///
/// 克隆共享同一状态。
#[derive(Debug, Clone)]
pub struct AudienceTracker {
    state: Arc<watch::Sender<AudienceState>>,
}

impl Default for AudienceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AudienceTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AudienceState {
            generation: 0,
            status: AudienceStatus::Idle,
        });
        Self { state: Arc::new(tx) }
    }

    /// 以已知人数初始化（如打开已保存的客群）
    pub fn with_count(count: u64) -> Self {
        let tracker = Self::new();
        tracker.state.send_replace(AudienceState {
            generation: 0,
            status: AudienceStatus::Ready(count),
        });
        tracker
    }

    /// 发起一次重算，返回其代次
    ///
    /// 必须在 tokio 运行时中调用。结果写回时若代次已不是最新，则丢弃。
    pub fn issue<F>(&self, computation: F) -> u64
    where
        F: Future<Output = Result<u64>> + Send + 'static,
    {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = AudienceStatus::Pending;
            generation = state.generation;
        });

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let status = match computation.await {
                Ok(count) => AudienceStatus::Ready(count),
                Err(e) => AudienceStatus::Failed(e.to_string()),
            };
            Self::complete(&state, generation, status);
        });

        generation
    }

    fn complete(state: &watch::Sender<AudienceState>, generation: u64, status: AudienceStatus) {
        let applied = state.send_if_modified(|current| {
            if current.generation != generation {
                return false;
            }
            current.status = status;
            true
        });

        if !applied {
            debug!(generation, "重算结果已被更新的编辑取代，丢弃");
            crm_shared::observability::metrics::record_stale_discard();
        }
    }

    /// 当前状态
    pub fn current(&self) -> AudienceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AudienceState> {
        self.state.subscribe()
    }

    /// 等待最近一次重算结束并返回其状态
    pub async fn settled(&self) -> AudienceState {
        let mut rx = self.state.subscribe();
        match rx
            .wait_for(|state| state.status != AudienceStatus::Pending)
            .await
        {
            Ok(state) => state.clone(),
            // 发送端由 self 持有，不会关闭
            Err(_) => self.current(),
        }
    }
}
