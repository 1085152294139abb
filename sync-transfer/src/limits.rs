//! Connection limits for the transfer server.
//!
//! Two independent guards run before a connection gets a handler task:
//! - a **concurrency cap** (`tokio::sync::Semaphore`); the permit lives as
//!   long as the handler, so at most `max_connections` run at once
//! - a **per-IP rate limit** using the governor crate's keyed limiter backed
//!   by DashMap, against peers that reconnect in a tight loop

use crate::config::ServerConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Limits applied to inbound connections.
#[derive(Clone)]
pub struct ConnectionLimits {
    /// Permits for concurrently handled connections.
    slots: Arc<Semaphore>,
    /// Configured size of `slots`.
    max_connections: usize,
    /// Accept rate per remote IP. `None` when disabled.
    per_ip: Option<Arc<KeyedLimiter<IpAddr>>>,
}

impl std::fmt::Debug for ConnectionLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLimits")
            .field("max_connections", &self.max_connections)
            .field("active", &self.active())
            .field("per_ip", &self.per_ip.as_ref().map(|_| "KeyedLimiter<IpAddr>"))
            .finish()
    }
}

impl ConnectionLimits {
    /// Create limits from configuration.
    ///
    /// `max_connections` of zero is treated as one; `connections_per_minute`
    /// of zero disables the rate limit.
    pub fn new(config: &ServerConfig) -> Self {
        let max_connections = config.max_connections.max(1);
        let per_ip = NonZeroU32::new(config.connections_per_minute)
            .map(|rate| Arc::new(RateLimiter::keyed(Quota::per_minute(rate))));

        Self {
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            per_ip,
        }
    }

    /// Check if another connection from `ip` is allowed right now.
    pub fn check_rate(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        match &self.per_ip {
            Some(limiter) => limiter
                .check_key(&ip)
                .map_err(|_| RateLimitError::RateExceeded { ip }),
            None => Ok(()),
        }
    }

    /// Reserve a handler slot. The slot is released when the permit drops.
    pub fn try_acquire(&self) -> Result<OwnedSemaphorePermit, RateLimitError> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| RateLimitError::TooManyConnections {
                max: self.max_connections,
            })
    }

    /// Number of connections currently holding a slot.
    pub fn active(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Configured connection cap.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Evict idle entries from the per-IP limiter.
    pub fn shrink(&self) {
        if let Some(limiter) = &self.per_ip {
            limiter.retain_recent();
        }
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// All handler slots are busy.
    TooManyConnections {
        /// Configured cap.
        max: usize,
    },
    /// Too many connections from one address.
    RateExceeded {
        /// Offending address.
        ip: IpAddr,
    },
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyConnections { max } => {
                write!(f, "connection limit reached ({max} active)")
            }
            Self::RateExceeded { ip } => {
                write!(f, "connection rate limit exceeded for {ip}")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_config(max_connections: usize, connections_per_minute: u32) -> ServerConfig {
        ServerConfig {
            max_connections,
            connections_per_minute,
            ..ServerConfig::loopback()
        }
    }

    #[test]
    fn slots_are_bounded_and_released_on_drop() {
        let limits = ConnectionLimits::new(&test_config(2, 0));

        let a = limits.try_acquire().unwrap();
        let _b = limits.try_acquire().unwrap();
        assert_eq!(limits.active(), 2);
        assert_eq!(
            limits.try_acquire().unwrap_err(),
            RateLimitError::TooManyConnections { max: 2 }
        );

        drop(a);
        assert_eq!(limits.active(), 1);
        assert!(limits.try_acquire().is_ok());
    }

    #[test]
    fn per_ip_rate_limit() {
        let limits = ConnectionLimits::new(&test_config(10, 3));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));

        for _ in 0..3 {
            assert!(limits.check_rate(ip).is_ok());
        }
        assert_eq!(
            limits.check_rate(ip),
            Err(RateLimitError::RateExceeded { ip })
        );

        // Another peer still has full quota
        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6));
        assert!(limits.check_rate(other).is_ok());
    }

    #[test]
    fn zero_rate_disables_limit() {
        let limits = ConnectionLimits::new(&test_config(10, 0));
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for _ in 0..1000 {
            assert!(limits.check_rate(ip).is_ok());
        }
        limits.shrink();
    }

    #[test]
    fn zero_max_connections_clamped() {
        let limits = ConnectionLimits::new(&test_config(0, 0));
        assert_eq!(limits.max_connections(), 1);
    }

    #[test]
    fn rate_limit_error_display() {
        assert_eq!(
            RateLimitError::TooManyConnections { max: 64 }.to_string(),
            "connection limit reached (64 active)"
        );
        assert_eq!(
            RateLimitError::RateExceeded {
                ip: IpAddr::V4(Ipv4Addr::LOCALHOST)
            }
            .to_string(),
            "connection rate limit exceeded for 127.0.0.1"
        );
    }

    #[test]
    fn limits_are_debug() {
        let limits = ConnectionLimits::new(&test_config(4, 10));
        assert!(format!("{:?}", limits).contains("ConnectionLimits"));
    }
}
