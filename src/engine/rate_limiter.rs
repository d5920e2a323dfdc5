//! Sliding-window per-session rate limiting with periodic garbage
//! collection.
//!
//! Ported from the reference implementation's `rate_limiter.py`. Mutable
//! state is held behind a single [`std::sync::Mutex`], per `spec.md` §5's
//! "serialize all state transitions under one lock" requirement — the
//! `recent_actions`-per-key idiom is grounded in the sentinel-style
//! sliding window seen elsewhere in the retrieval pack.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sweep the state maps every this many `allow` calls.
const GC_INTERVAL: u64 = 100;

struct State {
    windows: HashMap<String, VecDeque<Instant>>,
    blocked_until: HashMap<String, Instant>,
    call_count: u64,
}

/// Process-wide sliding-window rate limiter.
pub struct RateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    block_duration: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    /// Builds a limiter. When `enabled` is `false`, [`RateLimiter::allow`]
    /// always returns `true` and no state is ever recorded.
    #[must_use]
    pub fn new(enabled: bool, max_requests: u32, window_seconds: u64, block_seconds: u64) -> Self {
        Self {
            enabled,
            max_requests,
            window: Duration::from_secs(window_seconds),
            block_duration: Duration::from_secs(block_seconds),
            state: Mutex::new(State {
                windows: HashMap::new(),
                blocked_until: HashMap::new(),
                call_count: 0,
            }),
        }
    }

    /// Returns `true` iff `session_id` may proceed. Always `true` when
    /// disabled or when `session_id` is absent.
    pub fn allow(&self, session_id: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(session_id) = session_id else {
            return true;
        };

        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        state.call_count += 1;
        if state.call_count % GC_INTERVAL == 0 {
            self.gc(&mut state, now);
        }

        if let Some(blocked_until) = state.blocked_until.get(session_id) {
            if *blocked_until > now {
                return false;
            }
            state.blocked_until.remove(session_id);
        }

        let window = self.window;
        let entry = state.windows.entry(session_id.to_string()).or_default();
        entry.retain(|t| now.saturating_duration_since(*t) < window);
        if entry.is_empty() {
            state.windows.remove(session_id);
        }

        let current_count = state.windows.get(session_id).map_or(0, VecDeque::len);
        if current_count as u32 >= self.max_requests {
            state.blocked_until.insert(session_id.to_string(), now + self.block_duration);
            tracing::warn!(session_id, "rate limit exceeded; session blocked");
            return false;
        }

        state.windows.entry(session_id.to_string()).or_default().push_back(now);
        true
    }

    /// Clears one session's state, or all state if `session_id` is absent.
    pub fn reset(&self, session_id: Option<&str>) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match session_id {
            Some(id) => {
                state.windows.remove(id);
                state.blocked_until.remove(id);
            }
            None => {
                state.windows.clear();
                state.blocked_until.clear();
            }
        }
    }

    fn gc(&self, state: &mut State, now: Instant) {
        let window = self.window;
        state.windows.retain(|_, timestamps| {
            timestamps.retain(|t| now.saturating_duration_since(*t) < window);
            !timestamps.is_empty()
        });
        state.blocked_until.retain(|_, blocked_until| *blocked_until > now);
        state.call_count = 0;
        tracing::debug!("rate limiter garbage collection sweep completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(false, 1, 60, 60);
        for _ in 0..10 {
            assert!(limiter.allow(Some("session-a")));
        }
    }

    #[test]
    fn missing_session_id_always_allows_even_when_enabled() {
        let limiter = RateLimiter::new(true, 1, 60, 60);
        for _ in 0..10 {
            assert!(limiter.allow(None));
        }
    }

    #[test]
    fn allows_up_to_max_requests_then_blocks() {
        let limiter = RateLimiter::new(true, 3, 60, 300);
        assert!(limiter.allow(Some("session-a")));
        assert!(limiter.allow(Some("session-a")));
        assert!(limiter.allow(Some("session-a")));
        assert!(!limiter.allow(Some("session-a")));
    }

    #[test]
    fn different_sessions_are_independent() {
        let limiter = RateLimiter::new(true, 1, 60, 300);
        assert!(limiter.allow(Some("session-a")));
        assert!(!limiter.allow(Some("session-a")));
        assert!(limiter.allow(Some("session-b")));
    }

    #[test]
    fn reset_single_session_clears_its_state() {
        let limiter = RateLimiter::new(true, 1, 60, 300);
        assert!(limiter.allow(Some("session-a")));
        assert!(!limiter.allow(Some("session-a")));
        limiter.reset(Some("session-a"));
        assert!(limiter.allow(Some("session-a")));
    }

    #[test]
    fn reset_without_session_clears_everything() {
        let limiter = RateLimiter::new(true, 1, 60, 300);
        limiter.allow(Some("session-a"));
        limiter.allow(Some("session-b"));
        limiter.reset(None);
        assert!(limiter.allow(Some("session-a")));
        assert!(limiter.allow(Some("session-b")));
    }
}
