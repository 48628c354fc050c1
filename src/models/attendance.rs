use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Worked time in whole seconds, `None` while still clocked in.
    pub fn duration_secs(&self) -> Option<i64> {
        self.clock_out
            .map(|out| (out - self.clock_in).num_seconds())
    }
}

impl Serialize for AttendanceRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("AttendanceRecord", 5)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("user_id", &self.user_id)?;
        s.serialize_field("clock_in", &self.clock_in)?;
        s.serialize_field("clock_out", &self.clock_out)?;
        s.serialize_field("duration_secs", &self.duration_secs())?;
        s.end()
    }
}
