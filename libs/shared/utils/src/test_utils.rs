use serde_json::{json, Value};

use shared_config::AppConfig;

pub struct TestConfig {
    pub api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_base_url(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.to_string(),
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            ..AppConfig::default()
        }
    }
}

/// Payloads shaped like the console backend's JSON.
pub struct MockBackendResponses;

impl MockBackendResponses {
    pub fn student_response(id: u64, name: &str, birth_date: Option<&str>) -> Value {
        json!({
            "id": id,
            "name": name,
            "cpf": "123.456.789-00",
            "birthDate": birth_date,
            "email": format!("student{}@example.com", id),
            "createdAt": "2023-02-01T10:00:00"
        })
    }

    pub fn teacher_response(id: u64, name: &str, status: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "cpf": "987.654.321-00",
            "speciality": "Mathematics",
            "status": status,
            "createdAt": "2022-08-15T10:00:00"
        })
    }

    pub fn appointment_response(
        id: u64,
        student_id: u64,
        teacher_id: u64,
        appointment_datetime: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "content": "Fractions and decimals",
            "appointmentDatetime": appointment_datetime,
            "status": status,
            "requiresConsentForm": false,
            "student": { "id": student_id, "name": format!("Student {}", student_id) },
            "teacher": { "id": teacher_id, "name": format!("Teacher {}", teacher_id) }
        })
    }

    pub fn error_response(message: &str) -> Value {
        json!({
            "error": message
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_overrides_base_url_only() {
        let config = TestConfig::with_base_url("http://127.0.0.1:9999").to_app_config();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9999");
        assert_eq!(config.advance_notice_hours, 24);
    }

    #[test]
    fn appointment_fixture_nests_people() {
        let value = MockBackendResponses::appointment_response(1, 2, 3, "2024-01-03T09:00:00", "PENDING");
        assert_eq!(value["student"]["id"], 2);
        assert_eq!(value["teacher"]["id"], 3);
        assert_eq!(value["status"], "PENDING");
    }
}
