//! Domain models for the cloud API.
//!
//! # Design
//! These types are declared independently of the mock-server's schema.
//! Each implements `Model`, so every response is validated field by field
//! before a caller sees it. Request payloads only need to be written, so they
//! expose `to_record` directly.

use serde_json::Value;
use uuid::Uuid;

use crate::error::Violation;
use crate::model::{FieldValue, Fields, Model, RecordWriter};

crate::closed_set! {
    /// Lifecycle state of a server.
    pub enum ServerStatus {
        Provisioning => "provisioning",
        Running => "running",
        Stopped => "stopped",
        Suspended => "suspended",
    }
}

crate::closed_set! {
    /// Installation step reported while a server is provisioned.
    pub enum Stage {
        Unpacking => "unpacking",
        Installing => "installing",
        Configuring => "configuring",
        Booting => "booting",
    }
}

crate::closed_set! {
    pub enum UserRole {
        Admin => "admin",
        Member => "member",
        Viewer => "viewer",
    }
}

/// Hardware size of a server. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flavor {
    pub cpus: u32,
    pub memory_mb: u64,
}

impl Model for Flavor {
    const NAME: &'static str = "Flavor";
    const CLOSED: bool = true;

    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let cpus = fields.required("cpus");
        let memory_mb = fields.required("memory_mb");
        Some(Self {
            cpus: cpus?,
            memory_mb: memory_mb?,
        })
    }

    fn write(&self, record: &mut RecordWriter) {
        record.field("cpus", &self.cpus).field("memory_mb", &self.memory_mb);
    }
}

crate::model_field!(Flavor);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: Uuid,
    pub name: String,
    pub status: ServerStatus,
    pub flavor: Flavor,
    pub owner_id: Option<Uuid>,
}

impl Model for Server {
    const NAME: &'static str = "Server";

    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let id = fields.required("id");
        let name = fields.required("name");
        let status = fields.required("status");
        let flavor = fields.required("flavor");
        let owner_id = fields.optional("owner_id");
        Some(Self {
            id: id?,
            name: name?,
            status: status?,
            flavor: flavor?,
            owner_id: owner_id?,
        })
    }

    fn write(&self, record: &mut RecordWriter) {
        record
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("flavor", &self.flavor)
            .optional("owner_id", &self.owner_id);
    }
}

/// Completion of one stage, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(u8);

impl Percent {
    pub const fn new(value: u8) -> Option<Self> {
        if value <= 100 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl FieldValue for Percent {
    fn expected() -> String {
        "percentage (0..=100)".to_string()
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        // Report the range, not the underlying integer shape.
        let mut integer_violations = Vec::new();
        let percent = u8::from_field(raw, path, &mut integer_violations).and_then(Percent::new);
        if percent.is_none() {
            violations.push(Violation::mismatch(path, Self::expected(), raw));
        }
        percent
    }

    fn to_field(&self) -> Value {
        Value::from(self.0)
    }
}

/// Installation progress of a server. The wire key for `stages` is `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub current_stage: Option<Stage>,
    pub stages: Vec<(Stage, Percent)>,
}

impl Progress {
    /// Mean completion over all stages, rounded half to even. `0` when no
    /// stage has been reported.
    pub fn total_progress(&self) -> u8 {
        if self.stages.is_empty() {
            return 0;
        }
        let sum: u32 = self.stages.iter().map(|(_, pct)| u32::from(pct.value())).sum();
        let mean = f64::from(sum) / self.stages.len() as f64;
        mean.round_ties_even() as u8
    }
}

impl Model for Progress {
    const NAME: &'static str = "Progress";

    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let current_stage = fields.optional("current_stage");
        let stages = fields.required_as("stages", "data");
        Some(Self {
            current_stage: current_stage?,
            stages: stages?,
        })
    }

    fn write(&self, record: &mut RecordWriter) {
        record
            .optional("current_stage", &self.current_stage)
            .field("data", &self.stages);
    }
}

/// An account. The wire key for `name` is `username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub display_name: Option<String>,
}

impl Model for User {
    const NAME: &'static str = "User";

    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let id = fields.required("id");
        let name = fields.required_as("name", "username");
        let email = fields.required("email");
        let role = fields.required("role");
        let display_name = fields.optional("display_name");
        Some(Self {
            id: id?,
            name: name?,
            email: email?,
            role: role?,
            display_name: display_name?,
        })
    }

    fn write(&self, record: &mut RecordWriter) {
        record
            .field("id", &self.id)
            .field("username", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .optional("display_name", &self.display_name);
    }
}

/// Request payload for creating a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServer {
    pub name: String,
    pub flavor: Flavor,
    pub owner_id: Option<Uuid>,
}

impl NewServer {
    pub fn to_record(&self) -> Value {
        let mut record = RecordWriter::default();
        record
            .field("name", &self.name)
            .field("flavor", &self.flavor)
            .optional("owner_id", &self.owner_id);
        record.finish()
    }
}

/// Request payload for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub display_name: Option<String>,
}

impl NewUser {
    pub fn to_record(&self) -> Value {
        let mut record = RecordWriter::default();
        record
            .field("username", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .optional("display_name", &self.display_name);
        record.finish()
    }
}

/// Request payload for updating a user. Only the fields that are set are
/// sent; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub display_name: Option<String>,
}

impl UserUpdate {
    pub fn to_record(&self) -> Value {
        let mut record = RecordWriter::default();
        record
            .optional("email", &self.email)
            .optional("role", &self.role)
            .optional("display_name", &self.display_name);
        record.finish()
    }
}
