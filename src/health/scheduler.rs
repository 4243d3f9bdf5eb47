//! 轮询调度器模块
//!
//! 按固定间隔对所有URL发起并发检测，并把结果写入状态表

use crate::error::{HealthCheckError, Result};
use crate::health::result::log_check_event;
use crate::health::HealthChecker;
use crate::status::{StatusSnapshot, StatusTable};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 调度器状态
#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    /// 调度器是否运行中
    pub is_running: bool,
    /// 配置的URL数量
    pub total_urls: usize,
    /// 已开始的轮次
    pub rounds_started: u64,
    /// 当前尚未完成的检测数
    pub in_flight_checks: usize,
    /// 因上一次检测未完成而跳过的检测数
    pub skipped_checks: u64,
    /// 最近一轮开始时间
    pub last_round_at: Option<DateTime<Utc>>,
}

/// 调度器trait，定义调度接口
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// 启动调度器
    ///
    /// # 参数
    /// * `urls` - 要检测的URL列表，运行期间不会改变
    ///
    /// # 返回
    /// * `Result<()>` - 启动结果
    async fn start(&self, urls: Vec<String>) -> Result<()>;

    /// 停止调度器，已经发出的检测允许继续完成
    async fn stop(&self) -> Result<()>;

    /// 获取调度器状态
    async fn get_status(&self) -> SchedulerStatus;
}

/// 正在进行中的检测计数
#[derive(Debug, Default)]
struct InFlight {
    counts: Mutex<HashMap<String, usize>>,
}

impl InFlight {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        // 计数只做简单增减，锁中毒时沿用内部数据即可
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 登记一次检测；`skip_if_busy` 为真且该URL已有检测在进行时返回 `None`
    fn enter(self: &Arc<Self>, url: &str, skip_if_busy: bool) -> Option<InFlightGuard> {
        let mut counts = self.lock();
        let count = counts.entry(url.to_string()).or_insert(0);
        if skip_if_busy && *count > 0 {
            return None;
        }
        *count += 1;
        Some(InFlightGuard {
            in_flight: Arc::clone(self),
            url: url.to_string(),
        })
    }

    fn total(&self) -> usize {
        self.lock().values().sum()
    }
}

/// 检测任务结束（包括被中止）时自动减少计数
struct InFlightGuard {
    in_flight: Arc<InFlight>,
    url: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut counts = self.in_flight.lock();
        if let Some(count) = counts.get_mut(&self.url) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.url);
            }
        }
    }
}

/// 轮询器实现
///
/// 启动后立即执行一轮检测，之后每隔 `interval` 执行一轮。每一轮为每个URL
/// 各启动一个独立任务，不等待上一轮完成，因此检测慢于间隔时轮次会重叠，
/// 同一URL的结果以最后写入状态表的为准。
pub struct Poller {
    /// 健康检测器
    checker: Arc<dyn HealthChecker>,
    /// 状态表
    table: StatusTable,
    /// 轮询间隔
    interval: Duration,
    /// 同一URL上一次检测未完成时是否跳过新的检测
    skip_overlapping: bool,
    /// 定时循环任务
    task: RwLock<Option<JoinHandle<()>>>,
    /// 停止信号
    shutdown_tx: broadcast::Sender<()>,
    /// 外部关闭信号，与 `stop` 一样结束定时循环
    external_shutdown: Option<broadcast::Receiver<()>>,
    /// 调度器状态
    status: Arc<RwLock<SchedulerStatus>>,
    /// 进行中的检测
    in_flight: Arc<InFlight>,
}

impl Poller {
    /// 创建新的轮询器
    ///
    /// # 参数
    /// * `checker` - 健康检测器
    /// * `table` - 结果写入的状态表
    /// * `interval` - 轮询间隔，必须大于0
    ///
    /// # 返回
    /// * `Result<Self>` - 轮询器实例
    pub fn new(
        checker: Arc<dyn HealthChecker>,
        table: StatusTable,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(HealthCheckError::InvalidInterval.into());
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            checker,
            table,
            interval,
            skip_overlapping: false,
            task: RwLock::new(None),
            shutdown_tx,
            external_shutdown: None,
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// 设置是否跳过仍在进行中的同一URL检测
    pub fn with_skip_overlapping(mut self, skip_overlapping: bool) -> Self {
        self.skip_overlapping = skip_overlapping;
        self
    }

    /// 订阅外部关闭信号
    pub fn with_shutdown_signal(mut self, shutdown_rx: broadcast::Receiver<()>) -> Self {
        self.external_shutdown = Some(shutdown_rx);
        self
    }

    /// 轮询间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 执行一轮检测并等待全部完成，返回完成后的快照
    ///
    /// 用于单次检测命令，不影响定时循环。
    pub async fn check_once(&self, urls: &[String]) -> StatusSnapshot {
        let handles = Self::run_round(
            urls,
            &self.checker,
            &self.table,
            &self.in_flight,
            self.skip_overlapping,
            &self.status,
        )
        .await;
        futures::future::join_all(handles).await;
        self.table.snapshot().await
    }

    /// 发起一轮检测，每个URL一个独立任务
    async fn run_round(
        urls: &[String],
        checker: &Arc<dyn HealthChecker>,
        table: &StatusTable,
        in_flight: &Arc<InFlight>,
        skip_overlapping: bool,
        status: &Arc<RwLock<SchedulerStatus>>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(urls.len());
        let mut skipped = 0u64;

        for url in urls {
            let Some(guard) = in_flight.enter(url, skip_overlapping) else {
                debug!("上一次检测尚未完成，跳过: {}", url);
                skipped += 1;
                continue;
            };

            let url = url.clone();
            let checker = Arc::clone(checker);
            let table = table.clone();
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                let result = checker.check(&url).await;
                table.set(url, result.clone().into()).await;
                log_check_event(&result);
            }));
        }

        let mut status = status.write().await;
        status.rounds_started += 1;
        status.skipped_checks += skipped;
        status.last_round_at = Some(Utc::now());

        handles
    }
}

#[async_trait]
impl Scheduler for Poller {
    async fn start(&self, urls: Vec<String>) -> Result<()> {
        let mut task = self.task.write().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("轮询器已在运行，忽略重复启动");
            return Ok(());
        }

        info!(
            "启动轮询器，URL数量: {}，间隔: {:?}",
            urls.len(),
            self.interval
        );

        {
            let mut status = self.status.write().await;
            status.is_running = true;
            status.total_urls = urls.len();
        }

        let checker = Arc::clone(&self.checker);
        let table = self.table.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let status = Arc::clone(&self.status);
        let skip_overlapping = self.skip_overlapping;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut external_rx = self.external_shutdown.as_ref().map(|rx| rx.resubscribe());
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    // 第一次 tick 立即完成，即启动时的初始检测
                    _ = ticker.tick() => {
                        debug!("开始新一轮检测，URL数量: {}", urls.len());
                        Self::run_round(
                            &urls,
                            &checker,
                            &table,
                            &in_flight,
                            skip_overlapping,
                            &status,
                        )
                        .await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("轮询器收到停止信号");
                        break;
                    }
                    _ = wait_external(&mut external_rx) => {
                        info!("轮询器收到外部关闭信号");
                        break;
                    }
                }
            }
            status.write().await.is_running = false;
        }));

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("停止轮询器");

        let handle = self.task.write().await.take();
        if let Some(handle) = handle {
            let _ = self.shutdown_tx.send(());
            if let Err(e) = handle.await {
                warn!("轮询任务异常结束: {}", e);
            }
        }

        self.status.write().await.is_running = false;
        info!("轮询器已停止");
        Ok(())
    }

    async fn get_status(&self) -> SchedulerStatus {
        let mut status = self.status.read().await.clone();
        status.in_flight_checks = self.in_flight.total();
        status
    }
}

/// 等待外部关闭信号
///
/// 未设置接收端或发送端已全部丢弃时永不完成，轮询继续进行。
async fn wait_external(rx: &mut Option<broadcast::Receiver<()>>) {
    if let Some(rx) = rx.as_mut() {
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => {
                debug!("外部关闭信号的发送端已丢弃，忽略该信号");
            }
        }
    }
    std::future::pending().await
}

impl Drop for Poller {
    fn drop(&mut self) {
        // 丢弃轮询器时结束定时循环，已发出的检测不受影响
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::capture::CaptureWriter;
    use crate::health::{HealthResult, HealthStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按脚本返回状态码的检测器，`None` 表示请求失败
    struct ScriptedChecker {
        codes: Vec<Option<u16>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedChecker {
        fn new(codes: Vec<Option<u16>>, delay: Duration) -> Self {
            Self {
                codes,
                delay,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthChecker for ScriptedChecker {
        async fn check(&self, url: &str) -> HealthResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = match self.codes[n % self.codes.len()] {
                Some(code) => HealthResult::completed(url, code),
                None => HealthResult::failed(url, "Connection refused"),
            };
            result.with_response_time(self.delay)
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let result = Poller::new(checker, StatusTable::new(), Duration::ZERO);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_check_once_fills_table() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_secs(5)).unwrap();

        let snapshot = poller
            .check_once(&urls(&["http://a.test", "http://b.test"]))
            .await;

        assert_eq!(checker.calls(), 2);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("http://a.test").unwrap().state, HealthStatus::Up);
    }

    #[tokio::test]
    async fn test_initial_round_runs_immediately() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let table = StatusTable::new();
        // 间隔很长，只有初始检测会执行
        let poller = Poller::new(checker.clone(), table.clone(), Duration::from_secs(3600)).unwrap();

        poller.start(urls(&["http://a.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(checker.calls(), 1);
        assert!(table.get("http://a.test").await.is_some());
        poller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_rounds_repeat_on_interval() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_millis(50)).unwrap();

        poller.start(urls(&["http://a.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(280)).await;
        poller.stop().await.unwrap();

        let status = poller.get_status().await;
        assert!(checker.calls() >= 3, "calls = {}", checker.calls());
        assert!(status.rounds_started >= 3);
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_stop_ends_timer_loop() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_millis(30)).unwrap();

        poller.start(urls(&["http://a.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await.unwrap();

        let calls_after_stop = checker.calls();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(checker.calls(), calls_after_stop);
    }

    #[tokio::test]
    async fn test_external_shutdown_signal_ends_loop() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_millis(30))
            .unwrap()
            .with_shutdown_signal(shutdown_rx);

        poller.start(urls(&["http://a.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!poller.get_status().await.is_running);
        let calls = checker.calls();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(checker.calls(), calls);
    }

    #[tokio::test]
    async fn test_dropped_external_sender_keeps_polling() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_millis(30))
            .unwrap()
            .with_shutdown_signal(shutdown_rx);
        drop(shutdown_tx);

        poller.start(urls(&["http://a.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let status = poller.get_status().await;
        assert!(status.is_running);
        assert!(status.rounds_started >= 2);
        assert!(checker.calls() >= 2);
        poller.stop().await.unwrap();
    }

    fn check_lines(output: &str) -> Vec<&str> {
        output
            .lines()
            .filter(|line| line.contains("site_vitals::check"))
            .collect()
    }

    #[tokio::test]
    async fn test_one_log_event_per_check() {
        let writer = CaptureWriter::default();
        let _guard = tracing::subscriber::set_default(writer.subscriber());

        let checker = Arc::new(ScriptedChecker::new(vec![Some(200), Some(404), None], Duration::ZERO));
        let poller = Poller::new(checker, StatusTable::new(), Duration::from_secs(5)).unwrap();
        poller
            .check_once(&urls(&["http://a.test", "http://b.test", "http://c.test"]))
            .await;

        let output = writer.contents();
        let lines = check_lines(&output);
        assert_eq!(lines.len(), 3, "{output}");

        for url in ["http://a.test", "http://b.test", "http://c.test"] {
            let line = lines
                .iter()
                .find(|line| line.contains(&format!("url={url}")))
                .unwrap_or_else(|| panic!("no event for {url}: {output}"));
            assert!(line.contains("state="));
            assert!(line.contains("status_code=") || line.contains("error="));
        }
        assert_eq!(lines.iter().filter(|l| l.contains("error=")).count(), 1);
    }

    #[tokio::test]
    async fn test_empty_round_logs_no_check_events() {
        let writer = CaptureWriter::default();
        let _guard = tracing::subscriber::set_default(writer.subscriber());

        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let poller = Poller::new(checker, StatusTable::new(), Duration::from_secs(5)).unwrap();
        let snapshot = poller.check_once(&[]).await;

        assert!(snapshot.is_empty());
        assert!(check_lines(&writer.contents()).is_empty());
    }

    /// 每次写日志时记录该URL是否已在状态表中
    #[derive(Clone)]
    struct TableAwareWriter {
        table: StatusTable,
        url: String,
        present: Arc<Mutex<Vec<bool>>>,
    }

    impl std::io::Write for TableAwareWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let present = futures::executor::block_on(self.table.get(&self.url)).is_some();
            self.present.lock().unwrap().push(present);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_result_is_stored_before_it_is_logged() {
        let table = StatusTable::new();
        let writer = TableAwareWriter {
            table: table.clone(),
            url: "http://a.test".to_string(),
            present: Arc::new(Mutex::new(Vec::new())),
        };
        let make_writer = writer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || make_writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let poller = Poller::new(checker, table, Duration::from_secs(5)).unwrap();
        poller.check_once(&urls(&["http://a.test"])).await;

        let present = writer.present.lock().unwrap().clone();
        assert!(!present.is_empty());
        assert!(present.iter().all(|p| *p));
    }

    #[tokio::test]
    async fn test_empty_url_list_keeps_table_empty() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::ZERO));
        let table = StatusTable::new();
        let poller = Poller::new(checker.clone(), table.clone(), Duration::from_millis(20)).unwrap();

        poller.start(Vec::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await.unwrap();

        assert_eq!(checker.calls(), 0);
        assert!(table.snapshot().await.is_empty());
        assert!(poller.get_status().await.rounds_started >= 1);
    }

    #[tokio::test]
    async fn test_alternating_responses() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200), Some(500)], Duration::ZERO));
        let poller = Poller::new(checker, StatusTable::new(), Duration::from_secs(5)).unwrap();
        let list = urls(&["http://flap.test"]);

        let mut last_checked_at = None;
        for expected in [
            HealthStatus::Up,
            HealthStatus::Degraded,
            HealthStatus::Up,
            HealthStatus::Degraded,
        ] {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let snapshot = poller.check_once(&list).await;
            let entry = snapshot.get("http://flap.test").unwrap();
            assert_eq!(entry.state, expected);
            if let Some(previous) = last_checked_at {
                assert!(entry.checked_at > previous);
            }
            last_checked_at = Some(entry.checked_at);
        }
    }

    #[tokio::test]
    async fn test_overlapping_rounds_without_skip() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::from_millis(300)));
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_millis(50)).unwrap();

        poller.start(urls(&["http://slow.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(280)).await;

        // 检测比间隔慢，轮次重叠，多个检测同时进行
        assert!(checker.calls() >= 4, "calls = {}", checker.calls());
        assert!(poller.get_status().await.in_flight_checks >= 2);
        poller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_skip_overlapping_bounds_in_flight_checks() {
        let checker = Arc::new(ScriptedChecker::new(vec![Some(200)], Duration::from_millis(300)));
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_millis(50))
            .unwrap()
            .with_skip_overlapping(true);

        poller.start(urls(&["http://slow.test"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(280)).await;

        let status = poller.get_status().await;
        assert_eq!(checker.calls(), 1);
        assert!(status.in_flight_checks <= 1);
        assert!(status.skipped_checks >= 3);
        poller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_urls_share_one_entry() {
        let checker = Arc::new(ScriptedChecker::new(vec![None], Duration::ZERO));
        let poller = Poller::new(checker.clone(), StatusTable::new(), Duration::from_secs(5)).unwrap();

        let snapshot = poller
            .check_once(&urls(&["http://dup.test", "http://dup.test"]))
            .await;

        assert_eq!(checker.calls(), 2);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("http://dup.test").unwrap().state, HealthStatus::Down);
    }
}
