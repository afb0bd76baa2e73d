//! Rolling who-talked-to-whom history.
//!
//! Storage eviction (capacity + retention window) and statistics (a shorter
//! recency window) are independent. Individual records are never exposed.

use anima_core::config::InteractionConfig;
use anima_core::Clock;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InteractionRecord {
    timestamp: DateTime<Utc>,
    /// The utterance involved the primary user
    is_primary: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionStats {
    pub primary: usize,
    pub others: usize,
    /// primary / (primary + others); 0 with no activity
    pub primary_share: f32,
}

impl InteractionStats {
    pub fn total(&self) -> usize {
        self.primary + self.others
    }

    /// Share of recent activity that did not involve the primary user.
    pub fn others_share(&self) -> f32 {
        if self.total() == 0 {
            0.0
        } else {
            1.0 - self.primary_share
        }
    }
}

pub struct InteractionTracker {
    config: InteractionConfig,
    clock: Arc<dyn Clock>,
    history: RwLock<VecDeque<InteractionRecord>>,
}

impl InteractionTracker {
    pub fn new(config: InteractionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            history: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, is_primary: bool) {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.retention_minutes);
        let mut history = self.history.write().await;
        history.push_back(InteractionRecord {
            timestamp: now,
            is_primary,
        });
        while history.front().is_some_and(|r| r.timestamp < cutoff) {
            history.pop_front();
        }
        while history.len() > self.config.capacity {
            history.pop_front();
        }
    }

    pub async fn count_recent(&self, is_primary: bool, window_minutes: i64) -> usize {
        let cutoff = self.clock.now() - Duration::minutes(window_minutes);
        self.history
            .read()
            .await
            .iter()
            .filter(|r| r.timestamp >= cutoff && r.is_primary == is_primary)
            .count()
    }

    pub async fn stats(&self, window_minutes: i64) -> InteractionStats {
        let cutoff = self.clock.now() - Duration::minutes(window_minutes);
        let history = self.history.read().await;
        let (primary, others) = history
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .fold((0, 0), |(p, o), r| if r.is_primary { (p + 1, o) } else { (p, o + 1) });
        let total = primary + others;
        InteractionStats {
            primary,
            others,
            primary_share: if total == 0 {
                0.0
            } else {
                primary as f32 / total as f32
            },
        }
    }

    /// Stats over the configured statistics window.
    pub async fn recent_stats(&self) -> InteractionStats {
        self.stats(self.config.stats_window_minutes).await
    }

    /// How "left out" the companion is: the share of recent talk that went elsewhere.
    pub async fn relation_signal(&self) -> f32 {
        self.recent_stats().await.others_share()
    }

    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.read().await.is_empty()
    }

    pub async fn reset(&self) {
        self.history.write().await.clear();
    }
}
