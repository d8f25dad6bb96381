//! Notification rate limiting and advisory rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;
use crate::constants;
use crate::state::{ConnectionSession, UsageCounters, VpnStatus};

/// What a notification is about; each advisory kind has its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationCategory {
    /// Connect and disconnect notices.
    Generic,
    LongSession,
    HighData,
    ConnectionIssue,
}

/// Last time each category fired. `last_notification` covers every category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    pub last_notification: Option<DateTime<Utc>>,
    pub last_long_session: Option<DateTime<Utc>>,
    pub last_high_data: Option<DateTime<Utc>>,
    pub last_connection_issue: Option<DateTime<Utc>>,
}

/// A derived-condition notification ready to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationThrottler {
    config: NotificationConfig,
}

fn cooled_down(last: Option<DateTime<Utc>>, now: DateTime<Utc>, secs: u64) -> bool {
    last.map_or(true, |last| {
        u64::try_from((now - last).num_seconds()).map_or(false, |gap| gap >= secs)
    })
}

impl NotificationThrottler {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Global debounce. Records `now` when the notification is let through.
    pub fn admit(&self, state: &mut NotificationState, now: DateTime<Utc>) -> bool {
        if !cooled_down(state.last_notification, now, self.config.debounce_secs) {
            log::debug!("Notification suppressed by debounce");
            return false;
        }
        state.last_notification = Some(now);
        true
    }

    /// Checks the advisory rules in order: long session, high data usage,
    /// connection instability.
    ///
    /// A rule whose advisory is swallowed by the debounce leaves its own
    /// cooldown untouched, so it is retried at the next evaluation.
    pub fn evaluate(
        &self,
        state: &mut NotificationState,
        session: &mut ConnectionSession,
        counters: &UsageCounters,
        status: VpnStatus,
        now: DateTime<Utc>,
    ) -> Vec<Advisory> {
        let mut out = Vec::new();

        if let Some(hours) = self.long_session_hours(session, status, now) {
            if cooled_down(
                state.last_long_session,
                now,
                self.config.long_session_cooldown_secs,
            ) && self.admit(state, now)
            {
                state.last_long_session = Some(now);
                out.push(Advisory {
                    category: NotificationCategory::LongSession,
                    title: constants::TITLE_LONG_SESSION.to_string(),
                    message: format!(
                        "VPN has been connected for {hours} hours. Consider taking a break."
                    ),
                });
            }
        }

        if counters.total() > self.config.high_data_bytes
            && cooled_down(
                state.last_high_data,
                now,
                self.config.high_data_cooldown_secs,
            )
            && self.admit(state, now)
        {
            state.last_high_data = Some(now);
            out.push(Advisory {
                category: NotificationCategory::HighData,
                title: constants::TITLE_HIGH_DATA.to_string(),
                message: format!("VPN has used {} of data", gigabytes(counters.total())),
            });
        }

        if session.attempt_count > self.config.max_connect_attempts && self.admit(state, now) {
            state.last_connection_issue = Some(now);
            session.attempt_count = 0;
            out.push(Advisory {
                category: NotificationCategory::ConnectionIssue,
                title: constants::TITLE_CONNECTION_ISSUES.to_string(),
                message: constants::MSG_CONNECTION_ISSUES.to_string(),
            });
        }

        for advisory in &out {
            log::info!("Advisory: {}", advisory.title);
        }
        out
    }

    /// Whole hours connected, if that is a positive multiple of the
    /// configured period.
    fn long_session_hours(
        &self,
        session: &ConnectionSession,
        status: VpnStatus,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        if !status.is_connected() || self.config.long_session_hours == 0 {
            return None;
        }
        let hours = session.elapsed_secs(now)? / 3600;
        (hours > 0 && hours % self.config.long_session_hours == 0).then_some(hours)
    }
}

#[allow(clippy::cast_precision_loss)]
fn gigabytes(bytes: u64) -> String {
    format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const GIB: u64 = 1024 * 1024 * 1024;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn session_since(start: DateTime<Utc>) -> ConnectionSession {
        ConnectionSession {
            start_time: Some(start),
            attempt_count: 0,
        }
    }

    fn big() -> UsageCounters {
        UsageCounters {
            uploaded: GIB / 2,
            downloaded: GIB,
        }
    }

    #[test]
    fn test_debounce_blocks_within_window() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        assert!(throttler.admit(&mut state, t0()));
        assert!(!throttler.admit(&mut state, t0() + Duration::seconds(29)));
        assert!(throttler.admit(&mut state, t0() + Duration::seconds(30)));
        assert_eq!(state.last_notification, Some(t0() + Duration::seconds(30)));
    }

    #[test]
    fn test_never_two_notifications_within_debounce() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let start = t0() - Duration::hours(8);
        let mut session = session_since(start);
        let mut fired = Vec::new();

        // Every 7 seconds for two hours, with transitions mixed in.
        for step in 0..1000 {
            let now = t0() + Duration::seconds(step * 7);
            session.attempt_count = 10;
            if step % 3 == 0 && throttler.admit(&mut state, now) {
                fired.push(now);
            }
            let advisories =
                throttler.evaluate(&mut state, &mut session, &big(), VpnStatus::Connected, now);
            fired.extend(advisories.iter().map(|_| now));
        }

        assert!(fired.len() > 3);
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::seconds(30), "{pair:?}");
        }
    }

    #[test]
    fn test_long_session_fires_only_on_multiples() {
        let throttler = NotificationThrottler::default();
        let start = t0();
        let fires_at = |hours: i64| {
            let mut state = NotificationState::default();
            let mut session = session_since(start);
            let now = start + Duration::hours(hours) + Duration::minutes(5);
            let counters = UsageCounters::default();
            throttler
                .evaluate(&mut state, &mut session, &counters, VpnStatus::Connected, now)
                .iter()
                .any(|a| a.category == NotificationCategory::LongSession)
        };

        for hours in [8, 16, 24] {
            assert!(fires_at(hours), "hour {hours}");
        }
        for hours in [0, 1, 7, 9, 10, 15, 17] {
            assert!(!fires_at(hours), "hour {hours}");
        }
    }

    #[test]
    fn test_long_session_once_per_window() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let mut session = session_since(t0());
        let counters = UsageCounters::default();

        let mut count = 0;
        // Advisory cadence through hour 8.
        for minute in (0..60).step_by(5) {
            let now = t0() + Duration::hours(8) + Duration::minutes(minute);
            count += throttler
                .evaluate(&mut state, &mut session, &counters, VpnStatus::Connected, now)
                .len();
        }
        assert_eq!(count, 1);
        let advisory_message = {
            let mut state = NotificationState::default();
            throttler.evaluate(
                &mut state,
                &mut session,
                &counters,
                VpnStatus::Connected,
                t0() + Duration::hours(16),
            )
        };
        assert_eq!(
            advisory_message[0].message,
            "VPN has been connected for 16 hours. Consider taking a break."
        );
    }

    #[test]
    fn test_long_session_requires_connected() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let mut session = session_since(t0());
        let now = t0() + Duration::hours(8);
        let out = throttler.evaluate(
            &mut state,
            &mut session,
            &UsageCounters::default(),
            VpnStatus::Connecting,
            now,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_high_data_once_per_rolling_hour() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let mut session = ConnectionSession::default();
        let mut counters = big();

        let mut fired = Vec::new();
        for minutes in (0..=125).step_by(5) {
            counters.downloaded += GIB / 10;
            let now = t0() + Duration::minutes(minutes);
            let out =
                throttler.evaluate(&mut state, &mut session, &counters, VpnStatus::Connected, now);
            if out.iter().any(|a| a.category == NotificationCategory::HighData) {
                fired.push(minutes);
            }
        }
        assert_eq!(fired, vec![0, 60, 120]);
    }

    #[test]
    fn test_high_data_threshold_is_strict() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let mut session = ConnectionSession::default();
        let exactly = UsageCounters {
            uploaded: GIB,
            downloaded: 0,
        };
        assert!(throttler
            .evaluate(&mut state, &mut session, &exactly, VpnStatus::Connected, t0())
            .is_empty());

        let over = UsageCounters {
            uploaded: GIB,
            downloaded: GIB / 2,
        };
        let out = throttler.evaluate(&mut state, &mut session, &over, VpnStatus::Connected, t0());
        assert_eq!(out[0].message, "VPN has used 1.5 GB of data");
    }

    #[test]
    fn test_instability_resets_attempts() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let mut session = ConnectionSession {
            start_time: None,
            attempt_count: 3,
        };
        let counters = UsageCounters::default();

        assert!(throttler
            .evaluate(&mut state, &mut session, &counters, VpnStatus::Disconnected, t0())
            .is_empty());
        assert_eq!(session.attempt_count, 3);

        session.attempt_count = 4;
        let status = VpnStatus::Disconnected;
        let out = throttler.evaluate(&mut state, &mut session, &counters, status, t0());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, NotificationCategory::ConnectionIssue);
        assert_eq!(session.attempt_count, 0);
        assert_eq!(state.last_connection_issue, Some(t0()));
    }

    #[test]
    fn test_suppressed_advisory_keeps_its_cooldown_open() {
        let throttler = NotificationThrottler::default();
        let mut state = NotificationState::default();
        let mut session = session_since(t0() - Duration::hours(8));
        session.attempt_count = 5;

        // Long session wins the tick; high data and instability are debounced.
        let out = throttler.evaluate(&mut state, &mut session, &big(), VpnStatus::Connected, t0());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, NotificationCategory::LongSession);
        assert!(state.last_high_data.is_none());
        assert_eq!(session.attempt_count, 5);

        let later = t0() + Duration::minutes(5);
        let out = throttler.evaluate(&mut state, &mut session, &big(), VpnStatus::Connected, later);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, NotificationCategory::HighData);
    }
}
