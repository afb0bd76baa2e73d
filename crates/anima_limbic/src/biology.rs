//! Biological clock: time-of-day energy and conversational fatigue.
//!
//! Nothing here can fail. A missing fatigue record simply means "fully rested".

use anima_core::config::BiologyConfig;
use anima_core::{sanitize_f32, Clock};
use chrono::{DateTime, Duration, FixedOffset, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Upper bound on minutes applied in one recovery step; (1 - rate)^N is 0 long before.
const MAX_RECOVERY_MINUTES: i64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 00:00 - 04:59
    LateNight,
    /// 05:00 - 06:59
    Dawn,
    /// 07:00 - 08:59
    EarlyMorning,
    /// 09:00 - 11:59
    LateMorning,
    /// 12:00 - 13:59
    Noon,
    /// 14:00 - 17:59
    Afternoon,
    /// 18:00 - 20:59
    Evening,
    /// 21:00 - 23:59
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            0..=4 => Self::LateNight,
            5..=6 => Self::Dawn,
            7..=8 => Self::EarlyMorning,
            9..=11 => Self::LateMorning,
            12..=13 => Self::Noon,
            14..=17 => Self::Afternoon,
            18..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn baseline_energy(self) -> f32 {
        match self {
            Self::LateNight => 0.2,
            Self::Dawn => 0.4,
            Self::EarlyMorning => 0.7,
            Self::LateMorning => 1.0,
            Self::Noon => 0.85,
            Self::Afternoon => 0.75,
            Self::Evening => 0.6,
            Self::Night => 0.4,
        }
    }

    pub fn is_night(self) -> bool {
        matches!(self, Self::LateNight | Self::Night)
    }
}

/// Running tally of conversational load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueAccumulation {
    pub start_time: DateTime<Utc>,
    pub conversation_count: u32,
    /// 0.0 - unbounded; the clock clamps to 1.0 when reporting
    pub accumulated_fatigue: f32,
    /// Last conversation turn, used for expiry
    pub last_activity: DateTime<Utc>,
    /// Recovery has been applied up to here (whole minutes only)
    pub recovered_until: DateTime<Utc>,
}

impl FatigueAccumulation {
    pub fn start(now: DateTime<Utc>, intensity: f32) -> Self {
        Self {
            start_time: now,
            conversation_count: 1,
            accumulated_fatigue: sanitize_f32(intensity, 0.0).max(0.0),
            last_activity: now,
            recovered_until: now,
        }
    }

    pub fn add(&mut self, intensity: f32, now: DateTime<Utc>) {
        self.accumulated_fatigue += sanitize_f32(intensity, 0.0).max(0.0);
        self.conversation_count = self.conversation_count.saturating_add(1);
        self.last_activity = self.last_activity.max(now);
    }

    /// No activity for `expiry_minutes` or longer.
    pub fn is_expired(&self, now: DateTime<Utc>, expiry_minutes: i64) -> bool {
        now - self.last_activity >= Duration::minutes(expiry_minutes)
    }

    /// Natural recovery: fatigue decays by `rate` per whole elapsed minute.
    ///
    /// Partial minutes carry over to the next call. Returns `None` once the
    /// fatigue falls below `discard_threshold`.
    pub fn recover(mut self, now: DateTime<Utc>, rate: f32, discard_threshold: f32) -> Option<Self> {
        let minutes = (now - self.recovered_until).num_minutes();
        if minutes > 0 {
            let steps = minutes.min(MAX_RECOVERY_MINUTES);
            let keep = (1.0 - rate.clamp(0.0, 1.0)) as f64;
            self.accumulated_fatigue = (self.accumulated_fatigue as f64 * keep.powf(steps as f64)) as f32;
            self.recovered_until += Duration::minutes(minutes);
        }
        if self.accumulated_fatigue < discard_threshold {
            None
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiologicalState {
    pub time_of_day: TimeOfDay,
    pub baseline_energy: f32,
    /// Baseline reduced by fatigue (0.0 - 1.0)
    pub energy_level: f32,
    /// 0.0 - 1.0
    pub fatigue: f32,
    pub conversation_count: u32,
    pub needs_rest: bool,
    pub is_sleepy: bool,
}

impl BiologicalState {
    pub fn compute(
        config: &BiologyConfig,
        time_of_day: TimeOfDay,
        fatigue: Option<&FatigueAccumulation>,
    ) -> Self {
        let baseline = time_of_day.baseline_energy();
        let fatigue_level = fatigue
            .map(|f| f.accumulated_fatigue.clamp(0.0, 1.0))
            .unwrap_or(0.0);
        let energy = (baseline * (1.0 - config.fatigue_impact * fatigue_level)).clamp(0.0, 1.0);
        let needs_rest = energy < config.rest_energy_threshold
            || fatigue_level > config.rest_fatigue_threshold;
        let is_sleepy = (time_of_day.is_night() && energy < config.sleepy_energy_threshold)
            || energy < config.sleepy_energy_threshold / 2.0;
        Self {
            time_of_day,
            baseline_energy: baseline,
            energy_level: energy,
            fatigue: fatigue_level,
            conversation_count: fatigue.map(|f| f.conversation_count).unwrap_or(0),
            needs_rest,
            is_sleepy,
        }
    }

    /// Time factor for the speak decision: energy, halved when sleepy.
    pub fn time_signal(&self) -> f32 {
        if self.is_sleepy {
            self.energy_level * 0.5
        } else {
            self.energy_level
        }
    }
}

#[derive(Debug, Default)]
struct BioInner {
    fatigue: Option<FatigueAccumulation>,
    total_conversations: u64,
    last_rest: Option<DateTime<Utc>>,
}

pub struct BiologicalClock {
    config: BiologyConfig,
    clock: Arc<dyn Clock>,
    inner: RwLock<BioInner>,
}

impl BiologicalClock {
    pub fn new(config: BiologyConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: RwLock::new(BioInner::default()),
        }
    }

    pub fn time_of_day_at(&self, now: DateTime<Utc>) -> TimeOfDay {
        let hour = match self.config.utc_offset_minutes {
            Some(minutes) => match FixedOffset::east_opt(minutes * 60) {
                Some(offset) => now.with_timezone(&offset).hour(),
                None => now.hour(),
            },
            None => now.with_timezone(&Local).hour(),
        };
        TimeOfDay::from_hour(hour)
    }

    /// Current state, after applying natural recovery.
    pub async fn current_state(&self) -> BiologicalState {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        self.apply_recovery(&mut inner, now);
        BiologicalState::compute(&self.config, self.time_of_day_at(now), inner.fatigue.as_ref())
    }

    /// One conversation turn of the given intensity (clamped to 0.0 - 1.0).
    pub async fn record_conversation(&self, intensity: f32) {
        let now = self.clock.now();
        let intensity = sanitize_f32(intensity, 0.0).clamp(0.0, 1.0);
        let mut inner = self.inner.write().await;
        self.apply_recovery(&mut inner, now);
        inner.total_conversations += 1;

        match inner.fatigue.as_mut() {
            Some(f) if !f.is_expired(now, self.config.expiry_minutes) => {
                f.add(intensity, now);
            }
            _ => {
                inner.fatigue = Some(FatigueAccumulation::start(now, intensity));
            }
        }
        if let Some(f) = &inner.fatigue {
            tracing::trace!(
                "Fatigue {:.3} after {} turns",
                f.accumulated_fatigue,
                f.conversation_count
            );
        }
    }

    /// Fully rest: the fatigue record is discarded.
    pub async fn rest(&self) {
        let mut inner = self.inner.write().await;
        inner.fatigue = None;
        inner.last_rest = Some(self.clock.now());
        tracing::debug!("Rested, fatigue cleared");
    }

    /// Forget everything, including lifetime counters.
    pub async fn reset(&self) {
        *self.inner.write().await = BioInner::default();
    }

    pub async fn overall_energy(&self) -> f32 {
        self.current_state().await.energy_level
    }

    pub async fn needs_rest(&self) -> bool {
        self.current_state().await.needs_rest
    }

    pub async fn is_sleepy(&self) -> bool {
        self.current_state().await.is_sleepy
    }

    pub async fn fatigue_record(&self) -> Option<FatigueAccumulation> {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        self.apply_recovery(&mut inner, now);
        inner.fatigue.clone()
    }

    pub async fn total_conversations(&self) -> u64 {
        self.inner.read().await.total_conversations
    }

    pub async fn last_rest(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_rest
    }

    fn apply_recovery(&self, inner: &mut BioInner, now: DateTime<Utc>) {
        if let Some(f) = inner.fatigue.take() {
            inner.fatigue = f.recover(
                now,
                self.config.recovery_rate_per_minute,
                self.config.discard_threshold,
            );
            if inner.fatigue.is_none() {
                tracing::debug!("Fatigue fully recovered, record discarded");
            }
        }
    }
}
