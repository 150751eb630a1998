// libs/appointment-cell/src/services/provider.rs
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use shared_database::rest::{is_not_found, RestClient};

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, SchedulingError, Student, Teacher};

const APPOINTMENTS_PATH: &str = "/api/appointments";
const STUDENTS_PATH: &str = "/api/students";
const TEACHERS_PATH: &str = "/api/teachers";

// ==============================================================================
// COLLABORATOR SEAMS
// ==============================================================================

/// Read side of the backend, as seen by the scheduling rules.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingDataProvider: Send + Sync {
    async fn list_appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;

    async fn get_appointment(&self, id: &str) -> Result<Appointment, SchedulingError>;

    async fn get_student(&self, id: &str) -> Result<Student, SchedulingError>;

    async fn get_teacher(&self, id: &str) -> Result<Teacher, SchedulingError>;
}

/// Write side; only called after an accepted decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentWriter: Send + Sync {
    async fn create_appointment(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError>;

    async fn update_appointment(&self, id: &str, appointment: &Appointment) -> Result<Appointment, SchedulingError>;
}

// ==============================================================================
// BACKEND PAYLOADS
// ==============================================================================

/// The backend emits numeric ids; older records and the console use strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BackendId {
    Number(i64),
    Text(String),
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendId::Number(n) => write!(f, "{}", n),
            BackendId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BackendPersonRef {
    id: BackendId,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendAppointment {
    id: Option<BackendId>,
    content: Option<String>,
    appointment_datetime: String,
    status: Option<String>,
    #[serde(default)]
    requires_consent_form: bool,
    student: Option<BackendPersonRef>,
    teacher: Option<BackendPersonRef>,
    student_id: Option<BackendId>,
    teacher_id: Option<BackendId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendStudent {
    id: BackendId,
    name: Option<String>,
    birth_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendTeacher {
    id: BackendId,
    name: Option<String>,
    status: Option<String>,
}

impl TryFrom<BackendAppointment> for Appointment {
    type Error = SchedulingError;

    fn try_from(raw: BackendAppointment) -> Result<Self, Self::Error> {
        let (student_id, student_name) = person_ref(raw.student, raw.student_id, "student")?;
        let (teacher_id, teacher_name) = person_ref(raw.teacher, raw.teacher_id, "teacher")?;

        Ok(Appointment {
            id: raw.id.map(|id| id.to_string()),
            student_id,
            teacher_id,
            scheduled_at: parse_instant(&raw.appointment_datetime)?,
            content: raw.content.unwrap_or_default(),
            status: status_from_backend(raw.status.as_deref())?,
            requires_consent_form: raw.requires_consent_form,
            student_name,
            teacher_name,
        })
    }
}

impl TryFrom<BackendStudent> for Student {
    type Error = SchedulingError;

    fn try_from(raw: BackendStudent) -> Result<Self, Self::Error> {
        let date_of_birth = match raw.birth_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(parse_date(text)?),
        };

        Ok(Student {
            id: raw.id.to_string(),
            name: raw.name.unwrap_or_default(),
            date_of_birth,
        })
    }
}

impl TryFrom<BackendTeacher> for Teacher {
    type Error = SchedulingError;

    fn try_from(raw: BackendTeacher) -> Result<Self, Self::Error> {
        Ok(Teacher {
            id: raw.id.to_string(),
            name: raw.name.unwrap_or_default(),
            active: raw
                .status
                .as_deref()
                .is_some_and(|status| status.trim().eq_ignore_ascii_case("active")),
        })
    }
}

fn person_ref(
    nested: Option<BackendPersonRef>,
    flat_id: Option<BackendId>,
    entity: &str,
) -> Result<(String, Option<String>), SchedulingError> {
    match (nested, flat_id) {
        (Some(person), _) => Ok((person.id.to_string(), person.name)),
        (None, Some(id)) => Ok((id.to_string(), None)),
        (None, None) => Err(SchedulingError::InvalidPayload(format!(
            "appointment without {} reference",
            entity
        ))),
    }
}

/// RFC 3339, or a zone-less local date-time read as UTC.
fn parse_instant(text: &str) -> Result<DateTime<Utc>, SchedulingError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc())
        .map_err(|e| SchedulingError::InvalidPayload(format!("invalid date-time '{}': {}", text, e)))
}

fn parse_date(text: &str) -> Result<NaiveDate, SchedulingError> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_instant(text)
        .map(|instant| instant.date_naive())
        .map_err(|_| SchedulingError::InvalidPayload(format!("invalid date '{}'", text)))
}

fn status_from_backend(status: Option<&str>) -> Result<AppointmentStatus, SchedulingError> {
    match status.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        None | Some("PENDING") | Some("SCHEDULED") => Ok(AppointmentStatus::Scheduled),
        Some("COMPLETED") => Ok(AppointmentStatus::Completed),
        Some("CANCELED") | Some("CANCELLED") => Ok(AppointmentStatus::Canceled),
        Some(other) => Err(SchedulingError::InvalidPayload(format!("unknown appointment status '{}'", other))),
    }
}

fn status_to_backend(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Scheduled => "PENDING",
        AppointmentStatus::Completed => "COMPLETED",
        AppointmentStatus::Canceled => "CANCELED",
    }
}

fn appointment_payload(appointment: &Appointment) -> Value {
    json!({
        "content": appointment.content,
        "appointmentDatetime": appointment.scheduled_at.to_rfc3339(),
        "status": status_to_backend(appointment.status),
        "studentId": appointment.student_id,
        "teacherId": appointment.teacher_id,
        "requiresConsentForm": appointment.requires_consent_form,
    })
}

fn decode<T, R>(value: Value) -> Result<R, SchedulingError>
where
    T: serde::de::DeserializeOwned,
    R: TryFrom<T, Error = SchedulingError>,
{
    let raw: T = serde_json::from_value(value).map_err(|e| SchedulingError::InvalidPayload(e.to_string()))?;
    R::try_from(raw)
}

fn backend_error(err: anyhow::Error) -> SchedulingError {
    SchedulingError::BackendError(err.to_string())
}

fn lookup_error(err: anyhow::Error, entity: &'static str, id: &str) -> SchedulingError {
    if is_not_found(&err) {
        warn!("{} {} not found in backend", entity, id);
        SchedulingError::ReferenceNotFound {
            entity,
            id: id.to_string(),
        }
    } else {
        backend_error(err)
    }
}

// ==============================================================================
// REST ADAPTER
// ==============================================================================

pub struct RestSchedulingProvider {
    client: Arc<RestClient>,
    calendar_offset: FixedOffset,
}

impl RestSchedulingProvider {
    pub fn new(client: Arc<RestClient>, calendar_offset: FixedOffset) -> Self {
        Self { client, calendar_offset }
    }
}

#[async_trait]
impl SchedulingDataProvider for RestSchedulingProvider {
    async fn list_appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let raw: Vec<Value> = self.client.get(APPOINTMENTS_PATH).await.map_err(backend_error)?;
        debug!("Fetched {} appointments from backend", raw.len());

        let appointments = raw
            .into_iter()
            .map(decode::<BackendAppointment, Appointment>)
            .collect::<Result<Vec<_>, _>>()?;

        // The backend has no query filters; narrow the listing here.
        Ok(appointments
            .into_iter()
            .filter(|appointment| filter.matches(appointment, self.calendar_offset))
            .collect())
    }

    async fn get_appointment(&self, id: &str) -> Result<Appointment, SchedulingError> {
        let path = format!("{}/{}", APPOINTMENTS_PATH, id);
        let raw: Value = self.client.get(&path).await.map_err(|e| {
            if is_not_found(&e) {
                SchedulingError::AppointmentNotFound(id.to_string())
            } else {
                backend_error(e)
            }
        })?;
        decode::<BackendAppointment, Appointment>(raw)
    }

    async fn get_student(&self, id: &str) -> Result<Student, SchedulingError> {
        let path = format!("{}/{}", STUDENTS_PATH, id);
        let raw: Value = self
            .client
            .get(&path)
            .await
            .map_err(|e| lookup_error(e, "student", id))?;
        decode::<BackendStudent, Student>(raw)
    }

    async fn get_teacher(&self, id: &str) -> Result<Teacher, SchedulingError> {
        let path = format!("{}/{}", TEACHERS_PATH, id);
        let raw: Value = self
            .client
            .get(&path)
            .await
            .map_err(|e| lookup_error(e, "teacher", id))?;
        decode::<BackendTeacher, Teacher>(raw)
    }
}

#[async_trait]
impl AppointmentWriter for RestSchedulingProvider {
    async fn create_appointment(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let raw: Value = self
            .client
            .post(APPOINTMENTS_PATH, appointment_payload(appointment))
            .await
            .map_err(backend_error)?;
        decode::<BackendAppointment, Appointment>(raw)
    }

    async fn update_appointment(&self, id: &str, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let path = format!("{}/{}", APPOINTMENTS_PATH, id);
        let raw: Value = self
            .client
            .put(&path, appointment_payload(appointment))
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    SchedulingError::AppointmentNotFound(id.to_string())
                } else {
                    backend_error(e)
                }
            })?;
        decode::<BackendAppointment, Appointment>(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_nested_appointment() {
        let appointment: Appointment = decode::<BackendAppointment, Appointment>(json!({
            "id": 12,
            "content": "Fractions",
            "appointmentDatetime": "2024-01-03T09:00:00",
            "status": "PENDING",
            "student": { "id": 3, "name": "Ana Souza" },
            "teacher": { "id": 4, "name": "Carlos Lima" }
        }))
        .unwrap();

        assert_eq!(appointment.id.as_deref(), Some("12"));
        assert_eq!(appointment.student_id, "3");
        assert_eq!(appointment.teacher_name.as_deref(), Some("Carlos Lima"));
        assert_eq!(appointment.scheduled_at, Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap());
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn decodes_flat_ids_and_offsets() {
        let appointment: Appointment = decode::<BackendAppointment, Appointment>(json!({
            "id": "a-1",
            "content": "Fractions",
            "appointmentDatetime": "2024-01-03T09:00:00-03:00",
            "status": "canceled",
            "studentId": "3",
            "teacherId": 4
        }))
        .unwrap();

        assert_eq!(appointment.teacher_id, "4");
        assert_eq!(appointment.scheduled_at, Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap());
        assert_eq!(appointment.status, AppointmentStatus::Canceled);
    }

    #[test]
    fn rejects_untyped_garbage() {
        let missing_student = decode::<BackendAppointment, Appointment>(json!({
            "id": 1,
            "appointmentDatetime": "2024-01-03T09:00:00",
            "teacherId": 4
        }));
        assert!(matches!(missing_student, Err(SchedulingError::InvalidPayload(_))));

        let bad_status = decode::<BackendAppointment, Appointment>(json!({
            "id": 1,
            "appointmentDatetime": "2024-01-03T09:00:00",
            "status": "ARCHIVED",
            "studentId": 3,
            "teacherId": 4
        }));
        assert!(matches!(bad_status, Err(SchedulingError::InvalidPayload(_))));

        let bad_time = decode::<BackendAppointment, Appointment>(json!({
            "id": 1,
            "appointmentDatetime": "next tuesday",
            "studentId": 3,
            "teacherId": 4
        }));
        assert!(matches!(bad_time, Err(SchedulingError::InvalidPayload(_))));
    }

    #[test]
    fn student_birth_date_is_optional() {
        let student: Student = decode::<BackendStudent, Student>(json!({
            "id": 3, "name": "Ana Souza", "birthDate": "2010-01-01"
        }))
        .unwrap();
        assert_eq!(student.date_of_birth, NaiveDate::from_ymd_opt(2010, 1, 1));

        let unknown: Student = decode::<BackendStudent, Student>(json!({
            "id": 3, "name": "Ana Souza", "birthDate": null
        }))
        .unwrap();
        assert_eq!(unknown.date_of_birth, None);
    }

    #[test]
    fn teacher_status_is_case_insensitive() {
        let active: Teacher = decode::<BackendTeacher, Teacher>(json!({"id": 4, "status": "Active"})).unwrap();
        assert!(active.active);
        let inactive: Teacher = decode::<BackendTeacher, Teacher>(json!({"id": 4, "status": "INACTIVE"})).unwrap();
        assert!(!inactive.active);
        let missing: Teacher = decode::<BackendTeacher, Teacher>(json!({"id": 4})).unwrap();
        assert!(!missing.active);
    }

    #[test]
    fn payload_uses_backend_status_names() {
        let appointment = Appointment {
            id: None,
            student_id: "3".into(),
            teacher_id: "4".into(),
            scheduled_at: Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap(),
            content: "Fractions".into(),
            status: AppointmentStatus::Scheduled,
            requires_consent_form: true,
            student_name: None,
            teacher_name: None,
        };
        let payload = appointment_payload(&appointment);
        assert_eq!(payload["status"], "PENDING");
        assert_eq!(payload["requiresConsentForm"], true);
        assert_eq!(payload["appointmentDatetime"], "2024-01-03T09:00:00+00:00");
    }
}
