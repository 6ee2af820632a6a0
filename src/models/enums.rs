use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// Serde goes through the same strings, so the stored form, the wire form
/// and the parsed form of a value never drift apart.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $(#[$meta])*
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
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
    };
}

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
    PreferNotToSay => "prefer-not-to-say",
    Unknown => "unknown",
});

str_enum!(SymptomCategory {
    Pain => "pain",
    Respiratory => "respiratory",
    Digestive => "digestive",
    Neurological => "neurological",
    Skin => "skin",
    Other => "other",
});

impl SymptomCategory {
    /// Human-readable category name used in prompts and the staff view.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pain => "Pain & Discomfort",
            Self::Respiratory => "Breathing & Respiratory",
            Self::Digestive => "Digestive & Stomach",
            Self::Neurological => "Neurological & Mental",
            Self::Skin => "Skin & External",
            Self::Other => "Other Concerns",
        }
    }
}

str_enum!(
    /// Variants are declared lowest priority first, so the derived ordering
    /// matches clinical priority: `Emergency` is the maximum.
    #[derive(PartialOrd, Ord)]
    UrgencyLabel {
        SelfCare => "Self-care",
        Standard => "Standard",
        Urgent => "Urgent",
        Emergency => "Emergency",
    }
);

/// Patient-facing guidance attached to an urgency label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UrgencyGuidance {
    pub action: &'static str,
    pub wait_time: &'static str,
    pub description: &'static str,
}

impl UrgencyLabel {
    pub fn guidance(&self) -> UrgencyGuidance {
        match self {
            Self::Emergency => UrgencyGuidance {
                action: "Call 999 immediately",
                wait_time: "Immediate",
                description: "Life-threatening condition requiring immediate emergency care",
            },
            Self::Urgent => UrgencyGuidance {
                action: "Call NHS 111 or visit A&E",
                wait_time: "Within 1 hour",
                description: "Urgent medical attention needed but not immediately life-threatening",
            },
            Self::Standard => UrgencyGuidance {
                action: "See your GP within 24-48 hours",
                wait_time: "1-2 days",
                description: "Medical attention needed but can wait for GP appointment",
            },
            Self::SelfCare => UrgencyGuidance {
                action: "Self-care measures recommended",
                wait_time: "Monitor symptoms",
                description: "Symptoms can likely be managed with self-care and monitoring",
            },
        }
    }
}

str_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
});

str_enum!(RecordKind {
    ChatTurn => "chat",
    Assessment => "triage",
});

str_enum!(EventLevel {
    Info => "INFO",
    Warning => "WARNING",
    Error => "ERROR",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn urgency_ordering_follows_clinical_priority() {
        assert!(UrgencyLabel::Emergency > UrgencyLabel::Urgent);
        assert!(UrgencyLabel::Urgent > UrgencyLabel::Standard);
        assert!(UrgencyLabel::Standard > UrgencyLabel::SelfCare);
        let mut labels = vec![
            UrgencyLabel::Standard,
            UrgencyLabel::Emergency,
            UrgencyLabel::SelfCare,
            UrgencyLabel::Urgent,
        ];
        labels.sort();
        assert_eq!(labels.last(), Some(&UrgencyLabel::Emergency));
        assert_eq!(labels.first(), Some(&UrgencyLabel::SelfCare));
    }

    #[test]
    fn urgency_stored_form() {
        assert_eq!(UrgencyLabel::SelfCare.as_str(), "Self-care");
        assert_eq!(UrgencyLabel::from_str("Emergency").unwrap(), UrgencyLabel::Emergency);
        assert!(UrgencyLabel::from_str("emergency").is_err());
    }

    #[test]
    fn gender_wire_form_is_kebab_case() {
        let g: Gender = serde_json::from_str("\"prefer-not-to-say\"").unwrap();
        assert_eq!(g, Gender::PreferNotToSay);
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "\"female\"");
        assert!(serde_json::from_str::<Gender>("\"robot\"").is_err());
    }

    #[test]
    fn invalid_category_reports_field() {
        let err = SymptomCategory::from_str("cardiac").unwrap_err();
        assert!(err.to_string().contains("SymptomCategory"));
        assert!(err.to_string().contains("cardiac"));
    }

    #[test]
    fn category_display_names() {
        assert_eq!(SymptomCategory::Respiratory.display_name(), "Breathing & Respiratory");
        assert_eq!(SymptomCategory::Other.display_name(), "Other Concerns");
    }

    #[test]
    fn every_label_has_guidance() {
        for label in [
            UrgencyLabel::Emergency,
            UrgencyLabel::Urgent,
            UrgencyLabel::Standard,
            UrgencyLabel::SelfCare,
        ] {
            assert!(!label.guidance().action.is_empty());
        }
        assert_eq!(UrgencyLabel::Emergency.guidance().action, "Call 999 immediately");
    }

    #[test]
    fn urgency_serializes_as_stored_form() {
        assert_eq!(
            serde_json::to_string(&UrgencyLabel::SelfCare).unwrap(),
            "\"Self-care\""
        );
    }
}
