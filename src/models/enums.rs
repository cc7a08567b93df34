//! Choice fields stored as `VARCHAR` columns.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use std::io::Write;

/// Declares a text-backed enum with serde and diesel glue.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, diesel::AsExpression, diesel::FromSqlRow)]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("'{}' is not a valid {}", other, stringify!($name))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = std::str::from_utf8(bytes.as_bytes())?;
                raw.parse().map_err(Into::into)
            }
        }
    };
}

text_enum! {
    /// Administrative level of an account.
    UserLevel {
        Rde => "rde",
        Eac => "eac",
        Country => "country",
    }
}

text_enum! {
    ApplicationStatus {
        PendingApproval => "pending_approval",
        ApprovedByPartnerState => "approved_by_partner_state",
        ApprovalComplete => "approval_complete",
        Rejected => "rejected",
    }
}

text_enum! {
    DeploymentStatus {
        Initiated => "initiated",
        PreDeployment => "pre_deployment",
        Deployed => "deployed",
        Ended => "ended",
    }
}

text_enum! {
    Gender {
        Female => "F",
        Male => "M",
        Transgender => "T",
        Other => "O",
    }
}

text_enum! {
    IdType {
        AlienId => "alien_id",
        BirthCert => "birth_cert",
        MilitaryId => "military_id",
        NationalId => "national_id",
        Passport => "passport",
    }
}

text_enum! {
    Severity {
        Minor => "minor",
        Medium => "medium",
        Severe => "severe",
    }
}

text_enum! {
    CompetenceType {
        Language => "language",
        Work => "work",
    }
}

text_enum! {
    Proficiency {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Fluent => "fluent",
        NativeSpeaker => "native_speaker",
    }
}

impl Default for UserLevel {
    fn default() -> Self {
        UserLevel::Rde
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::PendingApproval
    }
}

impl Default for CompetenceType {
    fn default() -> Self {
        CompetenceType::Work
    }
}

impl DeploymentStatus {
    /// Position along the lifecycle; status never decreases.
    pub fn rank(&self) -> u8 {
        match self {
            DeploymentStatus::Initiated => 0,
            DeploymentStatus::PreDeployment => 1,
            DeploymentStatus::Deployed => 2,
            DeploymentStatus::Ended => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_values() {
        assert_eq!("approved_by_partner_state".parse::<ApplicationStatus>(), Ok(ApplicationStatus::ApprovedByPartnerState));
        assert_eq!("F".parse::<Gender>(), Ok(Gender::Female));
        assert!("regional".parse::<UserLevel>().is_err());
    }

    #[test]
    fn serde_uses_stored_text() {
        let json = serde_json::to_string(&DeploymentStatus::PreDeployment).unwrap();
        assert_eq!(json, "\"pre_deployment\"");

        let level: UserLevel = serde_json::from_str("\"eac\"").unwrap();
        assert_eq!(level, UserLevel::Eac);

        let err = serde_json::from_str::<Severity>("\"catastrophic\"").unwrap_err();
        assert!(err.to_string().contains("not a valid Severity"));
    }

    #[test]
    fn lifecycle_rank_is_monotonic() {
        let ranks: Vec<u8> = DeploymentStatus::ALL.iter().map(|s| s.rank()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));
    }
}
