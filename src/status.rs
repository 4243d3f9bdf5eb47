//! URL状态表模块
//!
//! 保存每个URL最近一次检测的结果，供调度器写入、Web层读取

use crate::health::result::duration_serde;
use crate::health::{HealthResult, HealthStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// 单个URL的最新状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlStatus {
    /// URL（同时也是状态表的键）
    pub url: String,
    /// 当前状态
    pub state: HealthStatus,
    /// HTTP状态码，请求未完成时为空
    pub status_code: Option<u16>,
    /// 最后检测完成时间
    pub checked_at: DateTime<Utc>,
    /// 最后一次检测耗时
    #[serde(with = "duration_serde")]
    pub latency: Duration,
    /// 错误信息
    pub error_message: Option<String>,
}

impl UrlStatus {
    /// 耗时（毫秒）
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

impl From<HealthResult> for UrlStatus {
    fn from(result: HealthResult) -> Self {
        Self {
            url: result.url,
            state: result.status,
            status_code: result.status_code,
            checked_at: result.timestamp,
            latency: result.response_time,
            error_message: result.error_message,
        }
    }
}

/// 并发安全的URL状态表
///
/// 内部的映射和锁都不对外暴露，所有访问只能经过 [`StatusTable::set`] 和
/// [`StatusTable::snapshot`]。克隆得到的是同一张表的句柄。
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    entries: Arc<RwLock<HashMap<String, UrlStatus>>>,
}

impl StatusTable {
    /// 创建空的状态表
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖某个URL的状态
    ///
    /// 同一个URL的并发写入以最后获得锁的一方为准。
    pub async fn set(&self, url: impl Into<String>, status: UrlStatus) {
        let mut entries = self.entries.write().await;
        entries.insert(url.into(), status);
    }

    /// 获取整张表在某一时刻的副本
    pub async fn snapshot(&self) -> StatusSnapshot {
        let entries = self.entries.read().await;
        StatusSnapshot {
            taken_at: Utc::now(),
            entries: entries.clone(),
        }
    }

    /// 获取单个URL的状态副本
    pub async fn get(&self, url: &str) -> Option<UrlStatus> {
        let entries = self.entries.read().await;
        entries.get(url).cloned()
    }

    /// 已有记录的URL数量
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 是否还没有任何记录
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// 状态表快照
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// 快照时间
    pub taken_at: DateTime<Utc>,
    /// URL到状态的映射
    pub entries: HashMap<String, UrlStatus>,
}

impl StatusSnapshot {
    pub fn get(&self, url: &str) -> Option<&UrlStatus> {
        self.entries.get(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按URL排序后的条目，保证页面渲染顺序稳定
    pub fn sorted(&self) -> Vec<&UrlStatus> {
        let mut statuses: Vec<&UrlStatus> = self.entries.values().collect();
        statuses.sort_by(|a, b| a.url.cmp(&b.url));
        statuses
    }

    /// 统计某种状态的数量
    pub fn count(&self, state: HealthStatus) -> usize {
        self.entries.values().filter(|s| s.state == state).count()
    }
}
