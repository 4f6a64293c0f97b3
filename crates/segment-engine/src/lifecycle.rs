//! 客群生命周期管理
//!
//! 创建与更新都会先校验名称和描述，再对完整客户群体重新计算人数，
//! 最后把表达式与人数一起持久化。存储中的 customer_count 总是对应同一次写入的表达式。

use crate::compiler::compile;
use crate::error::{Result, SegmentError};
use crate::evaluator::AudienceEvaluator;
use crate::expression::Expression;
use crate::models::Segment;
use crate::registry::FieldRegistry;
use crate::store::{CustomerSource, SegmentStore};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 待保存的客群内容
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDraft {
    pub name: String,
    pub description: String,
    pub expression: Expression,
}

impl SegmentDraft {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expression: Expression,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expression,
        }
    }

    /// 校验并返回去除首尾空白的名称和描述
    fn validated(&self) -> Result<(String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SegmentError::MissingField("name"));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(SegmentError::MissingField("description"));
        }
        Ok((name.to_string(), description.to_string()))
    }
}

/// 客群管理器
pub struct SegmentManager {
    registry: Arc<FieldRegistry>,
    store: Arc<dyn SegmentStore>,
    customers: Arc<dyn CustomerSource>,
    /// 按客群 ID 串行化持久化操作
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SegmentManager {
    pub fn new(
        registry: Arc<FieldRegistry>,
        store: Arc<dyn SegmentStore>,
        customers: Arc<dyn CustomerSource>,
    ) -> Self {
        Self {
            registry,
            store,
            customers,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 在当前客户快照上计算表达式的人数
    pub async fn compute_audience(&self, expression: &Expression) -> Result<u64> {
        let population = self.customers.list().await?;
        let predicate = compile(expression);
        Ok(AudienceEvaluator::count(&predicate, &population))
    }

    /// 创建客群
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: &SegmentDraft) -> Result<Segment> {
        let (name, description) = draft.validated()?;
        let customer_count = self.compute_audience(&draft.expression).await?;

        let now = Utc::now();
        let segment = Segment {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            expression: draft.expression.clone(),
            customer_count,
            created_at: now,
            last_updated: now,
        };

        let lock = self.lock_for(&segment.id);
        let _guard = lock.lock().await;

        let created = self.store.create(&segment).await.inspect_err(|e| {
            warn!(error = %e, "客群创建失败");
        })?;

        info!(segment_id = %created.id, customer_count, "客群已保存");
        Ok(created)
    }

    /// 更新客群
    ///
    /// created_at 保留原值，last_updated 由服务端设置。
    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: &str, draft: &SegmentDraft) -> Result<Segment> {
        let (name, description) = draft.validated()?;

        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let existing = self.store.read(id).await?;
        let customer_count = self.compute_audience(&draft.expression).await?;

        let segment = Segment {
            id: existing.id,
            name,
            description,
            expression: draft.expression.clone(),
            customer_count,
            created_at: existing.created_at,
            last_updated: Utc::now(),
        };

        let updated = self.store.update(id, &segment).await.inspect_err(|e| {
            warn!(error = %e, "客群更新失败");
        })?;

        info!(customer_count, "客群已更新");
        Ok(updated)
    }

    /// 删除客群，不可恢复
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id);
        {
            let _guard = lock.lock().await;
            self.store.delete(id).await?;
        }
        self.locks.remove(id);

        info!("客群已删除");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Segment> {
        self.store.read(id).await
    }

    /// 全部客群，按创建时间倒序
    pub async fn list(&self) -> Result<Vec<Segment>> {
        self.store.list().await
    }

    /// 客户数据变化后重新计算已保存客群的人数
    #[instrument(skip(self))]
    pub async fn refresh_count(&self, id: &str) -> Result<Segment> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut segment = self.store.read(id).await?;
        let customer_count = self.compute_audience(&segment.expression).await?;
        if customer_count == segment.customer_count {
            return Ok(segment);
        }

        segment.customer_count = customer_count;
        segment.last_updated = Utc::now();
        let updated = self.store.update(id, &segment).await?;

        info!(customer_count, "客群人数已刷新");
        Ok(updated)
    }
}
