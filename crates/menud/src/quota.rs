//! Free-tier metering for generation calls.
//!
//! Only a cache miss that actually reaches the generator counts against a
//! quota; cache hits are free. Counters reset at UTC midnight and live in
//! process memory, matching the single-instance deployment scope.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::QuotaConfig;

/// Who is asking. `user_id` is set when a valid bearer token was presented.
#[derive(Debug, Clone)]
pub struct QuotaContext {
    pub user_id: Option<String>,
    /// Client IP or equivalent, used to key anonymous usage.
    pub client_key: String,
}

impl QuotaContext {
    pub fn anonymous(client_key: impl Into<String>) -> Self {
        Self {
            user_id: None,
            client_key: client_key.into(),
        }
    }

    pub fn authenticated(user_id: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            client_key: client_key.into(),
        }
    }

    fn counter_key(&self) -> String {
        match &self.user_id {
            Some(user) => format!("user:{user}"),
            None => format!("anon:{}", self.client_key),
        }
    }
}

/// Gate consulted before spending a generation call.
pub trait QuotaService: Send + Sync {
    fn can_explain(&self, ctx: &QuotaContext) -> bool;
    fn record_explain(&self, ctx: &QuotaContext);
}

struct DayCount {
    day: NaiveDate,
    count: u32,
}

/// In-memory daily counters with separate anonymous/authenticated limits.
pub struct DailyQuota {
    config: QuotaConfig,
    counters: Mutex<HashMap<String, DayCount>>,
}

impl DailyQuota {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn limit_for(&self, ctx: &QuotaContext) -> u32 {
        if ctx.user_id.is_some() {
            self.config.authenticated_daily
        } else {
            self.config.anonymous_daily
        }
    }

    /// Clock-injected variant for tests.
    pub fn can_explain_on(&self, ctx: &QuotaContext, today: NaiveDate) -> bool {
        let limit = self.limit_for(ctx);
        if limit == 0 {
            return true;
        }
        let counters = self.counters.lock().expect("quota lock");
        let used = match counters.get(&ctx.counter_key()) {
            Some(entry) if entry.day == today => entry.count,
            _ => 0,
        };
        used < limit
    }

    /// Clock-injected variant for tests.
    pub fn record_explain_on(&self, ctx: &QuotaContext, today: NaiveDate) {
        let mut counters = self.counters.lock().expect("quota lock");
        // Counters from earlier days are dead weight; the day rollover is
        // the sweep point.
        counters.retain(|_, entry| entry.day == today);
        let entry = counters.entry(ctx.counter_key()).or_insert(DayCount {
            day: today,
            count: 0,
        });
        entry.count += 1;
    }
}

impl QuotaService for DailyQuota {
    fn can_explain(&self, ctx: &QuotaContext) -> bool {
        self.can_explain_on(ctx, Utc::now().date_naive())
    }

    fn record_explain(&self, ctx: &QuotaContext) {
        self.record_explain_on(ctx, Utc::now().date_naive())
    }
}

/// No limits; used in tests and for self-hosted deployments.
pub struct UnlimitedQuota;

impl QuotaService for UnlimitedQuota {
    fn can_explain(&self, _ctx: &QuotaContext) -> bool {
        true
    }

    fn record_explain(&self, _ctx: &QuotaContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(anonymous: u32, authenticated: u32) -> DailyQuota {
        DailyQuota::new(QuotaConfig {
            anonymous_daily: anonymous,
            authenticated_daily: authenticated,
        })
    }

    #[test]
    fn anonymous_limit_is_enforced() {
        let q = quota(2, 50);
        let ctx = QuotaContext::anonymous("1.2.3.4");

        assert!(q.can_explain(&ctx));
        q.record_explain(&ctx);
        assert!(q.can_explain(&ctx));
        q.record_explain(&ctx);
        assert!(!q.can_explain(&ctx));
    }

    #[test]
    fn authenticated_users_get_their_own_limit() {
        let q = quota(1, 3);
        let anon = QuotaContext::anonymous("1.2.3.4");
        let user = QuotaContext::authenticated("u-9", "1.2.3.4");

        q.record_explain(&anon);
        assert!(!q.can_explain(&anon));
        // Same IP, but the authenticated counter is separate.
        assert!(q.can_explain(&user));
    }

    #[test]
    fn zero_limit_means_unmetered() {
        let q = quota(0, 0);
        let ctx = QuotaContext::anonymous("1.2.3.4");
        for _ in 0..100 {
            assert!(q.can_explain(&ctx));
            q.record_explain(&ctx);
        }
    }

    #[test]
    fn day_rollover_resets_and_sweeps_counters() {
        let q = quota(1, 1);
        let a = QuotaContext::anonymous("1.1.1.1");
        let b = QuotaContext::anonymous("2.2.2.2");
        let day1 = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();

        q.record_explain_on(&a, day1);
        assert!(!q.can_explain_on(&a, day1));

        // Next day the limit is fresh, and yesterday's counters are gone.
        assert!(q.can_explain_on(&a, day2));
        q.record_explain_on(&b, day2);
        let counters = q.counters.lock().unwrap();
        assert_eq!(counters.len(), 1);
        assert!(counters.contains_key("anon:2.2.2.2"));
    }

    #[test]
    fn clients_are_independent() {
        let q = quota(1, 1);
        let a = QuotaContext::anonymous("1.1.1.1");
        let b = QuotaContext::anonymous("2.2.2.2");
        q.record_explain(&a);
        assert!(!q.can_explain(&a));
        assert!(q.can_explain(&b));
    }
}
