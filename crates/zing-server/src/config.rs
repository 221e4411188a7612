//! Server configuration.
//!
//! Every field can be overridden by a `ZING_`-prefixed environment
//! variable, following the same `std::env::var(...).ok().and_then(...)`
//! pattern used for `PORT` / `STATIC_DIR` elsewhere.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub turn_duration_ms: u64,
    pub talon_pause_ms: u64,
    pub recap_pause_ms: u64,
    pub match_target_initial: u32,
    pub match_target_step: u32,
    pub invite_ttl_ms: u64,
    pub reconnect_token_ttl_ms: u64,
    pub max_spectators_per_room: usize,
    pub dev_mode_enabled: bool,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            turn_duration_ms: 12_000,
            talon_pause_ms: 1_500,
            recap_pause_ms: 9_000,
            match_target_initial: 101,
            match_target_step: 50,
            invite_ttl_ms: 300_000,
            reconnect_token_ttl_ms: 600_000,
            max_spectators_per_room: 8,
            dev_mode_enabled: false,
            port: 8080,
        }
    }
}

impl Config {
    /// Load from environment, falling back to defaults for anything unset
    /// or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            turn_duration_ms: env_u64("ZING_TURN_DURATION_MS", defaults.turn_duration_ms),
            talon_pause_ms: env_u64("ZING_TALON_PAUSE_MS", defaults.talon_pause_ms),
            recap_pause_ms: env_u64("ZING_RECAP_PAUSE_MS", defaults.recap_pause_ms),
            match_target_initial: env_u32(
                "ZING_MATCH_TARGET_INITIAL",
                defaults.match_target_initial,
            ),
            match_target_step: env_u32("ZING_MATCH_TARGET_STEP", defaults.match_target_step),
            invite_ttl_ms: env_u64("ZING_INVITE_TTL_MS", defaults.invite_ttl_ms),
            reconnect_token_ttl_ms: env_u64(
                "ZING_RECONNECT_TOKEN_TTL_MS",
                defaults.reconnect_token_ttl_ms,
            ),
            max_spectators_per_room: env_u64(
                "ZING_MAX_SPECTATORS_PER_ROOM",
                defaults.max_spectators_per_room as u64,
            ) as usize,
            dev_mode_enabled: std::env::var("ZING_DEV_MODE_ENABLED")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.dev_mode_enabled),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.turn_duration_ms, 12_000);
        assert_eq!(c.talon_pause_ms, 1_500);
        assert_eq!(c.recap_pause_ms, 9_000);
        assert_eq!(c.match_target_initial, 101);
        assert_eq!(c.match_target_step, 50);
        assert_eq!(c.invite_ttl_ms, 300_000);
        assert_eq!(c.reconnect_token_ttl_ms, 600_000);
        assert_eq!(c.max_spectators_per_room, 8);
        assert!(!c.dev_mode_enabled);
    }
}
