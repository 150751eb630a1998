use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub server_port: u16,
    pub advance_notice_hours: i64,
    pub max_daily_classes_per_teacher: usize,
    pub consent_age_threshold: i32,
    pub calendar_utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            server_port: 3000,
            advance_notice_hours: 24,
            max_daily_classes_per_teacher: 2,
            consent_age_threshold: 16,
            calendar_utc_offset_minutes: 0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            api_base_url: env::var("SCHEDULING_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULING_API_BASE_URL not set, using default");
                    defaults.api_base_url.clone()
                }),
            server_port: parse_var("SCHEDULING_SERVER_PORT", defaults.server_port),
            advance_notice_hours: parse_var("SCHEDULING_ADVANCE_NOTICE_HOURS", defaults.advance_notice_hours),
            max_daily_classes_per_teacher: parse_var("SCHEDULING_MAX_DAILY_CLASSES", defaults.max_daily_classes_per_teacher),
            consent_age_threshold: parse_var("SCHEDULING_CONSENT_AGE", defaults.consent_age_threshold),
            calendar_utc_offset_minutes: parse_var("SCHEDULING_UTC_OFFSET_MINUTES", defaults.calendar_utc_offset_minutes),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - backend API URL is empty");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.trim().is_empty()
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", name, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_booking_policy() {
        let config = AppConfig::default();
        assert_eq!(config.advance_notice_hours, 24);
        assert_eq!(config.max_daily_classes_per_teacher, 2);
        assert_eq!(config.consent_age_threshold, 16);
        assert_eq!(config.calendar_utc_offset_minutes, 0);
        assert!(config.is_configured());
    }

    #[test]
    fn blank_base_url_is_not_configured() {
        let config = AppConfig {
            api_base_url: "  ".to_string(),
            ..AppConfig::default()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let value: u16 = parse_var("SCHEDULING_TEST_SURELY_UNSET_VARIABLE", 4242);
        assert_eq!(value, 4242);
    }
}
