use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Listed in ascending severity/resolution order for reference; no total
// order is enforced anywhere.
str_enum!(ToothStatus {
    Healthy => "healthy",
    Caries => "caries",
    Filled => "filled",
    Crown => "crown",
    RootCanal => "root_canal",
    Implant => "implant",
    Attention => "attention",
    ExtractionNeeded => "extraction_needed",
    Missing => "missing",
});

str_enum!(TreatmentStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

str_enum!(EventKind {
    TreatmentCompleted => "treatment_completed",
    AppointmentCompleted => "appointment_completed",
});

str_enum!(ChangedEntity {
    ToothDiagnosis => "tooth_diagnosis",
    Treatment => "treatment",
    Appointment => "appointment",
});

str_enum!(ChangeKind {
    Insert => "insert",
    Update => "update",
    Delete => "delete",
});

str_enum!(OverviewStatus {
    Resolved => "resolved",
    Monitoring => "monitoring",
    Active => "active",
});

impl AppointmentStatus {
    /// Treatment status a synthesized pseudo-treatment inherits from its
    /// appointment when no explicit treatment row exists.
    pub fn as_treatment_status(&self) -> TreatmentStatus {
        match self {
            Self::Scheduled | Self::Confirmed => TreatmentStatus::Pending,
            Self::InProgress => TreatmentStatus::InProgress,
            Self::Completed => TreatmentStatus::Completed,
            Self::Cancelled | Self::NoShow => TreatmentStatus::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

impl TreatmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}
