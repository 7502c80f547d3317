use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::PortalConfig;
use shared_models::auth::{Role, SessionContext, User};

/// Push relay secret configured by `TestConfig`.
pub const TEST_PUSH_TOKEN: &str = "test-push-token";

pub struct TestConfig {
    pub api_base_url: String,
    pub slot_staleness_secs: u64,
    pub push_ingest_token: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            slot_staleness_secs: 60,
            push_ingest_token: Some(TEST_PUSH_TOKEN.to_string()),
        }
    }
}

impl TestConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            api_base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_portal_config(&self) -> PortalConfig {
        let mut config = PortalConfig::with_base_url(&self.api_base_url);
        config.slot_staleness_secs = self.slot_staleness_secs;
        config.request_timeout_secs = 5;
        config.push_ingest_token = self.push_ingest_token.clone();
        config
    }

    pub fn to_arc(&self) -> Arc<PortalConfig> {
        Arc::new(self.to_portal_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Test Patient".to_string(),
            email: "test@example.com".to_string(),
            role: Role::Patient,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: Some(self.name.clone()),
            username: None,
            email: Some(self.email.clone()),
            role: self.role,
            created_at: Some(Utc::now()),
        }
    }

    pub fn session(&self, token: &str) -> SessionContext {
        SessionContext::new(token, self.to_user())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "_id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role.to_string()
        })
    }
}

/// Canned backend payloads in the shape the remote API returns them.
pub struct MockApiResponses;

impl MockApiResponses {
    pub fn envelope(data: Value) -> Value {
        json!({
            "success": true,
            "data": data
        })
    }

    pub fn failure(message: &str) -> Value {
        json!({
            "success": false,
            "message": message
        })
    }

    pub fn verify_token_response(user: &TestUser) -> Value {
        Self::envelope(json!({ "user": user.to_json() }))
    }

    pub fn doctor_response(id: &str, name: &str, specialty: &str) -> Value {
        json!({
            "_id": id,
            "name": name,
            "specialty": specialty,
            "location": "Nairobi",
            "bio": "Experienced physician",
            "workingHoursStart": "09:00",
            "workingHoursEnd": "10:00",
            "workingDays": [1, 2, 3, 4, 5]
        })
    }

    pub fn doctor_with_hours(id: &str, start: &str, end: &str, days: &[u8]) -> Value {
        json!({
            "_id": id,
            "name": "Dr. Test",
            "specialty": "General Practice",
            "location": "Nairobi",
            "workingHoursStart": start,
            "workingHoursEnd": end,
            "workingDays": days
        })
    }

    pub fn appointment_response(id: &str, doctor_id: &str, patient_id: &str, date: &str, time: &str, status: &str) -> Value {
        json!({
            "_id": id,
            "doctorId": doctor_id,
            "patientId": patient_id,
            "date": date,
            "time": time,
            "status": status
        })
    }

    pub fn available_slots_response(slots: &[(&str, bool)], start: &str, end: &str, days: &[u8]) -> Value {
        let slots: Vec<Value> = slots
            .iter()
            .map(|(time, available)| json!({"time": time, "available": available}))
            .collect();

        Self::envelope(json!({
            "slots": slots,
            "workingHours": {"start": start, "end": end},
            "workingDays": days
        }))
    }
}
