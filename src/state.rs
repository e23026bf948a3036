use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;

use recipebook::config::AppConfig;
use recipebook::store::RecordStore;
use recipebook::sync::SearchCoordinator;

/// Failures allowed from one IP before it is blocked
pub const MAX_LOGIN_FAILURES: u32 = 5;
/// How long a block lasts, and how long failures are remembered
pub const LOGIN_BLOCK_MINUTES: i64 = 30;

/// Login failure record
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub fail_count: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Per-IP login throttling
pub struct LoginSecurity {
    /// IP -> failures
    pub ip_attempts: RwLock<HashMap<String, LoginAttempt>>,
}

impl LoginSecurity {
    pub fn new() -> Self {
        Self {
            ip_attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Blocked after 5 failures within 30 minutes
    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        self.is_ip_blocked_at(ip, Utc::now())
    }

    fn is_ip_blocked_at(&self, ip: &str, now: DateTime<Utc>) -> bool {
        let attempts = self.ip_attempts.read();
        if let Some(attempt) = attempts.get(ip) {
            if attempt.fail_count >= MAX_LOGIN_FAILURES {
                let elapsed = now.signed_duration_since(attempt.last_attempt);
                return elapsed.num_minutes() < LOGIN_BLOCK_MINUTES;
            }
        }
        false
    }

    pub fn record_failure(&self, ip: &str) {
        self.record_failure_at(ip, Utc::now());
    }

    fn record_failure_at(&self, ip: &str, now: DateTime<Utc>) {
        let mut attempts = self.ip_attempts.write();
        // Old failures expire, for every IP
        attempts.retain(|_, attempt| {
            now.signed_duration_since(attempt.last_attempt).num_minutes() < LOGIN_BLOCK_MINUTES
        });
        let entry = attempts.entry(ip.to_string()).or_insert(LoginAttempt {
            fail_count: 0,
            last_attempt: now,
        });
        entry.fail_count += 1;
        entry.last_attempt = now;
    }

    /// Login successful, clear failure records
    pub fn clear_failure(&self, ip: &str) {
        self.ip_attempts.write().remove(ip);
    }
}

impl Default for LoginSecurity {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AppState {
    pub db: SqlitePool,
    pub store: RecordStore,
    pub coordinator: Arc<SearchCoordinator>,
    pub login_security: LoginSecurity,
    pub config: AppConfig,
}
