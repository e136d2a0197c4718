//! Enumerated columns. Each enum is stored as its lowercase text form and
//! serialized the same way; a few accept legacy aliases on input.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("invalid {kind} '{value}', expected one of: {allowed}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub allowed: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $kind:literal {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Comma-separated list of accepted values, for error messages.
            #[must_use]
            pub fn allowed() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                        allowed: Self::allowed(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum! {
    /// Active flag used by institutions and strategic objectives.
    RecordStatus: "status" {
        Aktif => "aktif" | "active",
        Nonaktif => "nonaktif" | "inactive",
    }
}

text_enum! {
    ProgramStatus: "program status" {
        Draft => "draft",
        Aktif => "aktif" | "active",
        Selesai => "selesai" | "finished",
    }
}

text_enum! {
    KegiatanStatus: "activity status" {
        Draft => "draft",
        Berjalan => "berjalan" | "running",
        Selesai => "selesai" | "finished",
        Tunda => "tunda" | "postponed",
    }
}

text_enum! {
    IndicatorCategory: "category" {
        Input => "input",
        Output => "output",
        Outcome => "outcome",
        Impact => "impact",
    }
}

text_enum! {
    MeasurementType: "measurement type" {
        Percentage => "percentage",
        Number => "number",
        Ratio => "ratio",
        Index => "index",
    }
}

text_enum! {
    /// How often an indicator is measured; determines its valid periods.
    Frequency: "frequency" {
        Monthly => "monthly",
        Quarterly => "quarterly",
        Semester => "semester",
        Annual => "annual",
    }
}

text_enum! {
    CollectionMethod: "collection method" {
        Manual => "manual",
        Automated => "automated",
        Survey => "survey",
        Interview => "interview",
        Observation => "observation",
        DocumentReview => "document_review",
    }
}

text_enum! {
    /// Performance-data lifecycle status.
    DataStatus: "data status" {
        Draft => "draft",
        Submitted => "submitted" | "pending",
        Validated => "validated" | "approved",
        Rejected => "rejected",
        NeedsRevision => "needs_revision",
    }
}

text_enum! {
    AchievementLevel: "achievement level" {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Poor => "poor",
    }
}

text_enum! {
    /// Review lifecycle shared by assessments and reports.
    ReviewStatus: "status" {
        Draft => "draft",
        Submitted => "submitted" | "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    ReportType: "report type" {
        Monthly => "monthly",
        Quarterly => "quarterly",
        Semester => "semester",
        Annual => "annual",
        Custom => "custom",
    }
}

text_enum! {
    ReportFormat: "format" {
        Pdf => "pdf",
        Excel => "excel",
        Word => "word",
        Csv => "csv",
    }
}

text_enum! {
    SettingType: "setting type" {
        String => "string",
        Integer => "integer",
        Float => "float",
        Boolean => "boolean",
        Array => "array",
        Json => "json",
    }
}
