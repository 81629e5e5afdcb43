//! Match Rules Configuration

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Minimum connected participants required to start a match.
pub const MIN_PARTICIPANTS_TO_START: usize = 2;

/// What a disconnect means for a participant who is alive in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectPolicy {
    /// Disconnection is not elimination; the participant stays in the alive set.
    #[default]
    KeepAlive,
    /// Disconnection during a round counts as an elimination.
    Eliminate,
}

impl FromStr for DisconnectPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_alive" | "keep-alive" | "keepalive" => Ok(Self::KeepAlive),
            "eliminate" => Ok(Self::Eliminate),
            other => Err(ConfigError::UnknownDisconnectPolicy(other.to_string())),
        }
    }
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A match needs at least one round.
    #[error("rounds_per_match must be at least 1")]
    NoRounds,

    /// Point awards must be non-negative.
    #[error("{field} must not be negative (got {value})")]
    NegativePoints {
        /// Config field name.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// Unknown disconnect policy name.
    #[error("unknown disconnect policy: {0}")]
    UnknownDisconnectPolicy(String),
}

/// Rules for one hosted match.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Rounds played before the match is over.
    pub rounds_per_match: u32,
    /// Length of the results pause after each round.
    pub results_duration: Duration,
    /// Length of a round's playing time.
    pub round_duration: Duration,
    /// Grace period between round load and play.
    pub countdown_duration: Duration,
    /// Points awarded to a round winner.
    pub round_win_bonus: i64,
    /// Disconnect handling during a round.
    pub disconnect_policy: DisconnectPolicy,
    /// Points credited to the last attacker of an eliminated participant.
    pub ring_out_credit_points: i64,
    /// How long a hit keeps its attacker eligible for ring-out credit.
    pub attacker_credit_window: Duration,
    /// Environment loaded between matches.
    pub lobby_environment: String,
    /// Environment loaded for each round.
    pub round_environment: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            rounds_per_match: 3,
            results_duration: Duration::from_secs(8),
            round_duration: Duration::from_secs(120),
            countdown_duration: Duration::from_secs(3),
            round_win_bonus: 100,
            disconnect_policy: DisconnectPolicy::KeepAlive,
            ring_out_credit_points: 10,
            attacker_credit_window: Duration::from_secs(5),
            lobby_environment: "HubLobby".to_string(),
            round_environment: "BeachRound".to_string(),
        }
    }
}

impl MatchConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rounds_per_match: env_parse("PARTY_ROUNDS_PER_MATCH").unwrap_or(defaults.rounds_per_match),
            results_duration: env_secs("PARTY_RESULTS_SECS").unwrap_or(defaults.results_duration),
            round_duration: env_secs("PARTY_ROUND_DURATION_SECS").unwrap_or(defaults.round_duration),
            countdown_duration: env_secs("PARTY_COUNTDOWN_SECS").unwrap_or(defaults.countdown_duration),
            round_win_bonus: env_parse("PARTY_ROUND_WIN_BONUS").unwrap_or(defaults.round_win_bonus),
            disconnect_policy: env_parse("PARTY_DISCONNECT_POLICY").unwrap_or(defaults.disconnect_policy),
            ring_out_credit_points: env_parse("PARTY_RING_OUT_CREDIT").unwrap_or(defaults.ring_out_credit_points),
            attacker_credit_window: defaults.attacker_credit_window,
            lobby_environment: std::env::var("PARTY_LOBBY_ENVIRONMENT").unwrap_or(defaults.lobby_environment),
            round_environment: std::env::var("PARTY_ROUND_ENVIRONMENT").unwrap_or(defaults.round_environment),
        }
    }

    /// Check rule values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds_per_match == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.round_win_bonus < 0 {
            return Err(ConfigError::NegativePoints {
                field: "round_win_bonus",
                value: self.round_win_bonus,
            });
        }
        if self.ring_out_credit_points < 0 {
            return Err(ConfigError::NegativePoints {
                field: "ring_out_credit_points",
                value: self.ring_out_credit_points,
            });
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<f64>(key)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatchConfig::default();
        assert_eq!(config.rounds_per_match, 3);
        assert_eq!(config.results_duration, Duration::from_secs(8));
        assert_eq!(config.round_duration, Duration::from_secs(120));
        assert_eq!(config.round_win_bonus, 100);
        assert_eq!(config.disconnect_policy, DisconnectPolicy::KeepAlive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_rounds() {
        let config = MatchConfig { rounds_per_match: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::NoRounds));
    }

    #[test]
    fn test_validate_rejects_negative_points() {
        let config = MatchConfig { round_win_bonus: -5, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativePoints { field: "round_win_bonus", value: -5 })
        ));

        let config = MatchConfig { ring_out_credit_points: -1, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disconnect_policy_parse() {
        assert_eq!("eliminate".parse::<DisconnectPolicy>(), Ok(DisconnectPolicy::Eliminate));
        assert_eq!("Keep-Alive".parse::<DisconnectPolicy>(), Ok(DisconnectPolicy::KeepAlive));
        assert!("vanish".parse::<DisconnectPolicy>().is_err());
    }
}
