use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::cache::user_cache::UserDataCache;
use crate::config::CacheSettings;

/// 定时器状态机：停止 / 按固定间隔运行
enum TimerState {
    Stopped,
    Running {
        interval: Duration,
        handle: JoinHandle<()>,
    },
}

/// 缓存刷新定时器
///
/// 进程级的周期任务，每个周期对整个用户缓存执行 clear()，用于约束缓存
/// 条目的过期程度。通过"子系统启动"和"配置变更"两个触发点重建；重建时
/// 先停掉旧任务再启动新任务，世代计数保证被替换任务的迟到 tick 不会再
/// 清空缓存。
pub struct CacheRefreshTimer {
    cache: Arc<UserDataCache>,
    generation: Arc<AtomicU64>,
    state: Mutex<TimerState>,
}

impl CacheRefreshTimer {
    pub fn new(cache: Arc<UserDataCache>) -> Self {
        Self {
            cache,
            generation: Arc::new(AtomicU64::new(0)),
            state: Mutex::new(TimerState::Stopped),
        }
    }

    /// 按配置快照重建定时器，重复应用同一配置是安全的
    ///
    /// 间隔在此刻一次性取自快照，周期中途不会重新读取。未启用缓存或间隔
    /// 为零时进入停止态。
    pub fn apply(&self, settings: CacheSettings) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // 先停掉当前任务
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let TimerState::Running { handle, .. } = &*state {
            handle.abort();
        }

        if !settings.use_cache || settings.refresh_interval.is_zero() {
            *state = TimerState::Stopped;
            tracing::debug!("Cache refresh timer stopped");
            return;
        }

        let cache = Arc::clone(&self.cache);
        let current_generation = Arc::clone(&self.generation);
        let period = settings.refresh_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // 已被新配置替换的任务不再清缓存
                if current_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                tracing::debug!("Cache refresh tick, clearing user data cache");
                cache.clear();
            }
        });

        *state = TimerState::Running {
            interval: period,
            handle,
        };
        tracing::info!("Cache refresh timer running, interval {:?}", period);
    }

    /// 停止定时器并丢弃任务
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let TimerState::Running { handle, .. } = &*state {
            handle.abort();
        }
        *state = TimerState::Stopped;
    }

    pub fn is_running(&self) -> bool {
        matches!(
            &*self.state.lock().unwrap_or_else(|e| e.into_inner()),
            TimerState::Running { .. }
        )
    }

    /// 当前运行间隔，停止态为 None
    pub fn current_interval(&self) -> Option<Duration> {
        match &*self.state.lock().unwrap_or_else(|e| e.into_inner()) {
            TimerState::Stopped => None,
            TimerState::Running { interval, .. } => Some(*interval),
        }
    }
}

impl Drop for CacheRefreshTimer {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut()
            && let TimerState::Running { handle, .. } = state
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserData;

    fn enabled(millis: u64) -> CacheSettings {
        CacheSettings {
            use_cache: true,
            refresh_interval: Duration::from_millis(millis),
        }
    }

    #[tokio::test]
    async fn tick_clears_cache() {
        let cache = Arc::new(UserDataCache::new());
        let timer = CacheRefreshTimer::new(Arc::clone(&cache));

        cache.insert(UserData::new("1001", "player"));
        timer.apply(enabled(20));
        assert!(timer.is_running());
        assert_eq!(timer.current_interval(), Some(Duration::from_millis(20)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.is_empty());
        // 清空后定时器仍在运行
        assert!(timer.is_running());
    }

    #[tokio::test]
    async fn disabled_settings_stop_timer() {
        let cache = Arc::new(UserDataCache::new());
        let timer = CacheRefreshTimer::new(Arc::clone(&cache));

        timer.apply(enabled(10));
        timer.apply(CacheSettings {
            use_cache: false,
            refresh_interval: Duration::from_millis(10),
        });
        assert!(!timer.is_running());

        cache.insert(UserData::new("1001", "player"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn zero_interval_means_stopped() {
        let cache = Arc::new(UserDataCache::new());
        let timer = CacheRefreshTimer::new(cache);

        timer.apply(enabled(0));
        assert!(!timer.is_running());
    }

    #[tokio::test]
    async fn reapply_same_settings_is_idempotent() {
        let cache = Arc::new(UserDataCache::new());
        let timer = CacheRefreshTimer::new(Arc::clone(&cache));

        timer.apply(enabled(20));
        timer.apply(enabled(20));
        assert!(timer.is_running());

        cache.insert(UserData::new("1001", "player"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn stop_discards_task() {
        let cache = Arc::new(UserDataCache::new());
        let timer = CacheRefreshTimer::new(Arc::clone(&cache));

        timer.apply(enabled(10));
        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.current_interval(), None);

        cache.insert(UserData::new("1001", "player"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.len(), 1);
    }
}
