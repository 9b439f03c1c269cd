//! Delivery risk class labels.
//!
//! This table is the only place class ids and label strings are related.
//! Target construction in the trainer and result construction in the
//! service both go through [`ClassLabel`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of risk classes the model predicts.
pub const CLASS_COUNT: usize = 3;

/// Risk class of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    #[serde(rename = "On-Time")]
    OnTime = 0,
    #[serde(rename = "At Risk")]
    AtRisk = 1,
    #[serde(rename = "Delayed")]
    Delayed = 2,
}

impl ClassLabel {
    /// All classes ordered by id.
    pub const ALL: [ClassLabel; CLASS_COUNT] =
        [ClassLabel::OnTime, ClassLabel::AtRisk, ClassLabel::Delayed];

    pub const fn id(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            ClassLabel::OnTime => "On-Time",
            ClassLabel::AtRisk => "At Risk",
            ClassLabel::Delayed => "Delayed",
        }
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.label() == label)
    }

    /// Training target for a raw delivery status.
    ///
    /// "delivered" is on time, "delayed" is delayed, every other status
    /// (in transit, returned, failed attempt...) counts as at risk.
    pub fn from_delivery_status(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "delivered" => ClassLabel::OnTime,
            "delayed" => ClassLabel::Delayed,
            _ => ClassLabel::AtRisk,
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_label_round_trip() {
        for class in ClassLabel::ALL {
            let label = class.label();
            let back = ClassLabel::from_label(label).unwrap();
            assert_eq!(ClassLabel::from_id(back.id()), Some(class));
        }
        for id in 0..CLASS_COUNT {
            let class = ClassLabel::from_id(id).unwrap();
            assert_eq!(ClassLabel::from_label(class.label()).map(ClassLabel::id), Some(id));
        }
    }

    #[test]
    fn test_fixed_mapping() {
        assert_eq!(ClassLabel::from_id(0), Some(ClassLabel::OnTime));
        assert_eq!(ClassLabel::from_id(1).unwrap().label(), "At Risk");
        assert_eq!(ClassLabel::from_id(2).unwrap().label(), "Delayed");
        assert_eq!(ClassLabel::from_id(3), None);
        assert_eq!(ClassLabel::from_label("on-time"), None);
    }

    #[test]
    fn test_delivery_status_mapping() {
        assert_eq!(ClassLabel::from_delivery_status(" Delivered "), ClassLabel::OnTime);
        assert_eq!(ClassLabel::from_delivery_status("DELAYED"), ClassLabel::Delayed);
        assert_eq!(ClassLabel::from_delivery_status("in transit"), ClassLabel::AtRisk);
        assert_eq!(ClassLabel::from_delivery_status(""), ClassLabel::AtRisk);
    }

    #[test]
    fn test_serialization_uses_label() {
        assert_eq!(serde_json::to_string(&ClassLabel::AtRisk).unwrap(), "\"At Risk\"");
        let parsed: ClassLabel = serde_json::from_str("\"Delayed\"").unwrap();
        assert_eq!(parsed, ClassLabel::Delayed);
    }
}
