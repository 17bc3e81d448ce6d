//! Broadcast cooldown: Redis-backed lock against duplicate bulk sends.
//!
//! After a broadcast starts, repeating the same message to the same district
//! is refused until the lock expires. This stops a double submit from
//! messaging every customer twice. A different message, or a different
//! district selector, is not affected.
//!
//! Uses Redis `SET NX EX` for atomic check-and-set with automatic TTL expiry.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};

use crm_common::error::AppError;

/// Redis-backed broadcast cooldown.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastCooldown {
    ttl_seconds: u64,
}

impl BroadcastCooldown {
    /// `ttl_seconds == 0` disables the guard.
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_seconds > 0
    }

    /// Try to take the cooldown lock for a `(district, message)` pair.
    ///
    /// Returns `true` if the broadcast may proceed, `false` if the same
    /// message to the same district was started within the cooldown window.
    pub async fn try_acquire(
        &self,
        redis: &mut ConnectionManager,
        district: &str,
        message: &str,
    ) -> Result<bool, AppError> {
        if !self.is_enabled() {
            return Ok(true);
        }

        // Returns Some("OK") if the key was set, None if it already exists
        let result: Option<String> = redis::cmd("SET")
            .arg(Self::key(district, message))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(redis)
            .await?;

        let allowed = result.is_some();

        if !allowed {
            tracing::debug!(
                district,
                ttl_seconds = self.ttl_seconds,
                "Broadcast suppressed: duplicate within cooldown"
            );
        }

        Ok(allowed)
    }

    /// Release the lock early, e.g. when a broadcast could not start.
    pub async fn release(
        &self,
        redis: &mut ConnectionManager,
        district: &str,
        message: &str,
    ) -> Result<(), AppError> {
        if !self.is_enabled() {
            return Ok(());
        }
        redis.del::<_, ()>(Self::key(district, message)).await?;
        Ok(())
    }

    /// District is kept verbatim since recipient matching is case-sensitive.
    fn key(district: &str, message: &str) -> String {
        let digest = Sha256::digest(message.as_bytes());
        format!("broadcast:cooldown:{}:{:x}", district, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_separates_districts_and_messages() {
        let key = BroadcastCooldown::key("Nashik", "Sale this weekend");
        assert!(key.starts_with("broadcast:cooldown:Nashik:"));
        assert_eq!(key, BroadcastCooldown::key("Nashik", "Sale this weekend"));

        assert_ne!(key, BroadcastCooldown::key("Nashik", "Rain alert"));
        assert_ne!(key, BroadcastCooldown::key("nashik", "Sale this weekend"));
        assert_ne!(key, BroadcastCooldown::key("all", "Sale this weekend"));
    }

    #[test]
    fn test_key_digest_is_hex_sha256() {
        let key = BroadcastCooldown::key("Pune", "");
        assert_eq!(
            key,
            "broadcast:cooldown:Pune:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_zero_ttl_disables() {
        assert!(!BroadcastCooldown::new(0).is_enabled());
        assert!(BroadcastCooldown::new(60).is_enabled());
    }
}
