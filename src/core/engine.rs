//! The per-tick pipeline.
//!
//! [`Engine::tick`] takes the previous [`EngineState`] by value and returns
//! the next one together with the [`Effect`]s the caller must carry out. The
//! engine itself never touches the store, the screen or the speakers.

use std::rc::Rc;

use chrono::{DateTime, Local, Timelike, Utc};

use super::collector::SignalCollector;
use super::control::{ClientControl, CommandClientControl, DisconnectTarget};
use super::executor::CommandExecutor;
use super::probes::Platform;
use super::resolver::StatusResolver;
use super::store::{PersistenceStore, StoreKey, StoreValue};
use super::throttle::{Advisory, NotificationCategory, NotificationState, NotificationThrottler};
use super::usage::{
    CommandInterfaceStats, DataUsageTracker, SyntheticTraffic, UsageSource, UsageState,
};
use crate::config::Config;
use crate::constants;
use crate::error::{Error, Result};
use crate::state::{ConnectionSession, SignalSnapshot, UsageCounters, VpnStatus};

/// Everything the engine remembers between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub status: VpnStatus,
    pub session: ConnectionSession,
    pub usage: UsageState,
    pub notifications: NotificationState,
    pub last_tick: Option<DateTime<Utc>>,
}

impl EngineState {
    /// Rebuilds state persisted by an earlier run.
    ///
    /// A stored start time means the previous run was connected; the state
    /// resumes as `Connected` so a tunnel that is still up keeps its session.
    #[must_use]
    pub fn restore(store: &dyn PersistenceStore) -> Self {
        let timestamp = |key| store.get(key).and_then(|v| v.as_timestamp());
        let integer = |key| store.get(key).and_then(|v| v.as_u64()).unwrap_or(0);

        let start_time = timestamp(StoreKey::ConnectionStartTime);
        let (status, usage) = if start_time.is_some() {
            let counters = UsageCounters {
                uploaded: integer(StoreKey::DataUploaded),
                downloaded: integer(StoreKey::DataDownloaded),
            };
            (VpnStatus::Connected, UsageState::with_counters(counters))
        } else {
            (VpnStatus::Disconnected, UsageState::default())
        };

        if let Some(start) = start_time {
            log::info!("Resuming session started at {start}");
        }

        Self {
            status,
            session: ConnectionSession {
                start_time,
                attempt_count: 0,
            },
            usage,
            notifications: NotificationState {
                last_notification: timestamp(StoreKey::LastNotificationTime),
                last_long_session: timestamp(StoreKey::LastLongConnectionReminder),
                last_high_data: timestamp(StoreKey::LastDataWarning),
                last_connection_issue: None,
            },
            last_tick: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Disconnect,
}

/// A side effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowNotification {
        title: String,
        message: String,
        category: NotificationCategory,
    },
    PlaySound(SoundCue),
    /// `None` removes the key.
    PersistenceWrite {
        key: StoreKey,
        value: Option<StoreValue>,
    },
}

impl Effect {
    fn write(key: StoreKey, value: StoreValue) -> Self {
        Self::PersistenceWrite {
            key,
            value: Some(value),
        }
    }

    fn clear(key: StoreKey) -> Self {
        Self::PersistenceWrite { key, value: None }
    }

    fn notify(advisory: Advisory) -> Self {
        Self::ShowNotification {
            title: advisory.title,
            message: advisory.message,
            category: advisory.category,
        }
    }
}

/// Result of a launch, connect or disconnect request.
#[derive(Debug)]
pub struct ControlOutcome {
    pub result: Result<()>,
    /// Notifications that passed the debounce, with their bookkeeping writes.
    pub effects: Vec<Effect>,
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub state: EngineState,
    pub effects: Vec<Effect>,
    pub snapshot: SignalSnapshot,
    /// How usage was updated this tick, if it was.
    pub usage_source: Option<UsageSource>,
    pub advisories_evaluated: bool,
}

pub struct Engine {
    collector: SignalCollector,
    resolver: StatusResolver,
    tracker: DataUsageTracker,
    throttler: NotificationThrottler,
    control: Box<dyn ClientControl>,
    advisory_interval_secs: u64,
}

impl Engine {
    /// Engine backed by real OS probes through `executor`.
    #[must_use]
    pub fn new(config: &Config, executor: Rc<dyn CommandExecutor>, platform: Platform) -> Self {
        let collector = SignalCollector::new(executor.clone(), platform, config);
        let tracker = DataUsageTracker::new(
            Box::new(CommandInterfaceStats::new(executor.clone(), platform)),
            Box::new(SyntheticTraffic::from_entropy(config.estimation.clone())),
        );
        let control = Box::new(CommandClientControl::new(executor, platform, config));
        Self::from_parts(config, collector, tracker, control)
    }

    #[must_use]
    pub fn from_parts(
        config: &Config,
        collector: SignalCollector,
        tracker: DataUsageTracker,
        control: Box<dyn ClientControl>,
    ) -> Self {
        Self {
            collector,
            resolver: StatusResolver::default(),
            tracker,
            throttler: NotificationThrottler::new(config.notifications.clone()),
            control,
            advisory_interval_secs: config.advisory_interval_secs,
        }
    }

    #[must_use]
    pub fn collector(&self) -> &SignalCollector {
        &self.collector
    }

    #[must_use]
    pub fn resolver(&self) -> &StatusResolver {
        &self.resolver
    }

    /// Collects signals and advances the state machine.
    pub fn tick(&mut self, state: EngineState, now: DateTime<Utc>) -> TickOutcome {
        let snapshot = self.collector.collect();
        self.step(state, snapshot, now)
    }

    /// Advances the state machine with an already collected snapshot.
    pub fn step(
        &mut self,
        mut state: EngineState,
        snapshot: SignalSnapshot,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let mut effects = Vec::new();
        let previous = state.status;
        let current = self.resolver.resolve(&snapshot);
        log::debug!("Resolved status {current} from {snapshot:?}");

        if previous != current {
            log::info!("VPN status {previous} -> {current}");
            self.transition(&mut state, previous, current, now, &mut effects);
        }
        state.status = current;

        let usage_source = self
            .tracker
            .update(&mut state.usage, current, local_hour(now));
        if usage_source.is_some() {
            effects.extend(counter_writes(state.usage.counters));
        }

        let advisories_evaluated = advisory_due(state.last_tick, now, self.advisory_interval_secs);
        if advisories_evaluated {
            let advisories = self.throttler.evaluate(
                &mut state.notifications,
                &mut state.session,
                &state.usage.counters,
                current,
                now,
            );
            for advisory in advisories {
                if let Some(key) = cooldown_key(advisory.category) {
                    effects.push(Effect::write(key, StoreValue::Timestamp(now)));
                }
                effects.push(Effect::write(
                    StoreKey::LastNotificationTime,
                    StoreValue::Timestamp(now),
                ));
                effects.push(Effect::notify(advisory));
            }
        }

        state.last_tick = Some(now);
        TickOutcome {
            state,
            effects,
            snapshot,
            usage_source,
            advisories_evaluated,
        }
    }

    fn transition(
        &self,
        state: &mut EngineState,
        previous: VpnStatus,
        current: VpnStatus,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        if current.is_connected() {
            state.session.open(now);
            state.usage.reset();
            effects.push(Effect::write(
                StoreKey::ConnectionStartTime,
                StoreValue::Timestamp(now),
            ));
            effects.extend(counter_writes(state.usage.counters));
            self.announce(
                state,
                constants::TITLE_CONNECTED,
                constants::MSG_CONNECTED,
                now,
                effects,
            );
        } else if previous.is_connected() {
            state.session.close();
            state.usage.reset();
            effects.push(Effect::clear(StoreKey::ConnectionStartTime));
            effects.push(Effect::clear(StoreKey::DataUploaded));
            effects.push(Effect::clear(StoreKey::DataDownloaded));
            self.announce(
                state,
                constants::TITLE_DISCONNECTED,
                constants::MSG_DISCONNECTED,
                now,
                effects,
            );
            effects.push(Effect::PlaySound(SoundCue::Disconnect));
        } else if previous == VpnStatus::Disconnected {
            state.usage.reset();
        }
    }

    fn announce(
        &self,
        state: &mut EngineState,
        title: &str,
        message: &str,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        if self.throttler.admit(&mut state.notifications, now) {
            effects.push(Effect::write(
                StoreKey::LastNotificationTime,
                StoreValue::Timestamp(now),
            ));
            effects.push(Effect::ShowNotification {
                title: title.to_string(),
                message: message.to_string(),
                category: NotificationCategory::Generic,
            });
        }
    }

    /// Asks a client to connect; a successful request counts as an attempt.
    /// A client without a connect command yields a hint notification.
    pub fn connect(
        &self,
        state: &mut EngineState,
        name: &str,
        now: DateTime<Utc>,
    ) -> ControlOutcome {
        let mut effects = Vec::new();
        let result = self.control.connect(name);
        match &result {
            Ok(()) => {
                state.session.attempt_count = state.session.attempt_count.saturating_add(1);
                log::info!(
                    "Connect requested for {name} (attempt {})",
                    state.session.attempt_count
                );
            }
            Err(Error::Unsupported(_)) => self.announce(
                state,
                constants::TITLE_CONNECTION,
                constants::MSG_CONNECT_UNSUPPORTED,
                now,
                &mut effects,
            ),
            Err(e) => log::warn!("Connect {name} failed: {e}"),
        }
        ControlOutcome { result, effects }
    }

    /// Asks a client or system VPN service to disconnect. Only a stopped
    /// system service is announced here; a client's drop shows up on the
    /// next tick.
    pub fn disconnect(
        &self,
        state: &mut EngineState,
        name: &str,
        now: DateTime<Utc>,
    ) -> ControlOutcome {
        let mut effects = Vec::new();
        let result = match self.control.disconnect(name) {
            Ok(DisconnectTarget::SystemService) => {
                self.announce(
                    state,
                    constants::TITLE_DISCONNECTED,
                    constants::MSG_SYSTEM_DISCONNECTED,
                    now,
                    &mut effects,
                );
                Ok(())
            }
            Ok(DisconnectTarget::Client) => Ok(()),
            Err(e) => {
                log::warn!("Disconnect {name} failed: {e}");
                Err(e)
            }
        };
        ControlOutcome { result, effects }
    }

    pub fn launch(
        &self,
        state: &mut EngineState,
        name: &str,
        now: DateTime<Utc>,
    ) -> ControlOutcome {
        let mut effects = Vec::new();
        let result = self.control.launch(name);
        let (title, message) = match &result {
            Ok(()) => (constants::TITLE_LAUNCHED, format!("{name} has been opened")),
            Err(e) => {
                log::warn!("Launch {name} failed: {e}");
                (constants::TITLE_LAUNCH_FAILED, format!("Could not open {name}"))
            }
        };
        self.announce(state, title, &message, now, &mut effects);
        ControlOutcome { result, effects }
    }
}

fn counter_writes(counters: UsageCounters) -> [Effect; 2] {
    [
        Effect::write(StoreKey::DataUploaded, StoreValue::Integer(counters.uploaded)),
        Effect::write(
            StoreKey::DataDownloaded,
            StoreValue::Integer(counters.downloaded),
        ),
    ]
}

fn cooldown_key(category: NotificationCategory) -> Option<StoreKey> {
    match category {
        NotificationCategory::LongSession => Some(StoreKey::LastLongConnectionReminder),
        NotificationCategory::HighData => Some(StoreKey::LastDataWarning),
        NotificationCategory::Generic | NotificationCategory::ConnectionIssue => None,
    }
}

fn local_hour(now: DateTime<Utc>) -> u32 {
    now.with_timezone(&Local).hour()
}

/// True when a multiple of `interval` epoch seconds lies in `(last, now]`.
/// Without a previous tick only an exact multiple counts.
#[must_use]
pub fn advisory_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: u64) -> bool {
    let Ok(interval) = i64::try_from(interval) else {
        return false;
    };
    if interval == 0 {
        return false;
    }
    let now = now.timestamp();
    match last {
        None => now.rem_euclid(interval) == 0,
        Some(last) => last.timestamp().div_euclid(interval) < now.div_euclid(interval),
    }
}
