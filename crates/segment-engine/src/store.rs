//! 外部协作方接口与内存实现
//!
//! 客户数据源与客群存储都视为不透明的远程调用，引擎只依赖这里的 trait。

use crate::error::{Result, SegmentError};
use crate::models::{CustomerRecord, Segment, SegmentDocument};
use crate::registry::FieldRegistry;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 客户数据源
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerSource: Send + Sync {
    /// 返回一次评估期间保持一致的客户快照
    async fn list(&self) -> Result<Arc<Vec<CustomerRecord>>>;
}

/// 客群存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn create(&self, segment: &Segment) -> Result<Segment>;
    async fn read(&self, id: &str) -> Result<Segment>;
    async fn update(&self, id: &str, segment: &Segment) -> Result<Segment>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// 按创建时间倒序返回全部客群
    async fn list(&self) -> Result<Vec<Segment>>;
}

/// 内存客户数据源
#[derive(Default)]
pub struct MemoryCustomerSource {
    records: RwLock<Arc<Vec<CustomerRecord>>>,
}

impl MemoryCustomerSource {
    pub fn new(records: Vec<CustomerRecord>) -> Self {
        Self {
            records: RwLock::new(Arc::new(records)),
        }
    }

    /// 从客户文档数组构建
    pub fn from_documents(docs: &serde_json::Value, registry: &FieldRegistry) -> Self {
        Self::new(CustomerRecord::from_documents(docs, registry))
    }

    /// 整体替换客户数据，已在进行中的评估继续使用旧快照
    pub fn replace(&self, records: Vec<CustomerRecord>) {
        *self.records.write() = Arc::new(records);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CustomerSource for MemoryCustomerSource {
    async fn list(&self) -> Result<Arc<Vec<CustomerRecord>>> {
        Ok(self.records.read().clone())
    }
}

/// 内存客群存储
///
/// 以持久化文档形式保存，读取时按注册表重新校验规则。
#[derive(Clone)]
pub struct MemorySegmentStore {
    segments: Arc<DashMap<String, SegmentDocument>>,
    registry: Arc<FieldRegistry>,
}

impl MemorySegmentStore {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        Self {
            segments: Arc::new(DashMap::new()),
            registry,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn decode(&self, doc: SegmentDocument) -> Result<Segment> {
        Segment::from_document(doc, &self.registry)
    }
}

#[async_trait]
impl SegmentStore for MemorySegmentStore {
    #[instrument(skip(self, segment), fields(segment_id = %segment.id))]
    async fn create(&self, segment: &Segment) -> Result<Segment> {
        match self.segments.entry(segment.id.clone()) {
            Entry::Occupied(_) => {
                return Err(SegmentError::Persistence(format!(
                    "客群已存在: {}",
                    segment.id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(segment.to_document());
            }
        }
        info!("客群已创建");
        Ok(segment.clone())
    }

    #[instrument(skip(self))]
    async fn read(&self, id: &str) -> Result<Segment> {
        let doc = self
            .segments
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SegmentError::not_found(id))?;
        self.decode(doc)
    }

    #[instrument(skip(self, segment))]
    async fn update(&self, id: &str, segment: &Segment) -> Result<Segment> {
        let mut entry = self
            .segments
            .get_mut(id)
            .ok_or_else(|| SegmentError::not_found(id))?;

        let mut doc = segment.to_document();
        doc.id = id.to_string();
        *entry = doc;
        drop(entry);

        debug!("客群已更新");
        self.read(id).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        self.segments
            .remove(id)
            .map(|_| info!("客群已删除"))
            .ok_or_else(|| SegmentError::not_found(id))
    }

    async fn list(&self) -> Result<Vec<Segment>> {
        let mut docs: Vec<SegmentDocument> =
            self.segments.iter().map(|e| e.value().clone()).collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        docs.into_iter().map(|doc| self.decode(doc)).collect()
    }
}
