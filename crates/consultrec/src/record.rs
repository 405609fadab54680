//! Core record types for consultrec.
//!
//! This module defines the consultation form submitted by a user, the
//! structured analysis returned for it, and the immutable record that pairs
//! the two once an analysis has succeeded.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// The submitter's relationship to the property in dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    /// The contractor who did the work.
    #[serde(rename = "시공업자")]
    Contractor,
    /// The landlord (owner renting the property out).
    #[serde(rename = "임대인(집주인)")]
    Landlord,
    /// The tenant.
    #[serde(rename = "임차인(세입자)")]
    Tenant,
    /// An owner-occupier who commissioned the work.
    #[serde(rename = "의뢰인(자가)")]
    Client,
}

impl UserRole {
    /// The label used on the wire and in persisted records.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contractor => "시공업자",
            Self::Landlord => "임대인(집주인)",
            Self::Tenant => "임차인(세입자)",
            Self::Client => "의뢰인(자가)",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// The category of defect being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    /// Water leak.
    #[serde(rename = "누수")]
    Leak,
    /// Blockage or backflow.
    #[serde(rename = "막힘/역류")]
    Clog,
    /// Bad smell.
    #[serde(rename = "악취")]
    Odor,
    /// Frozen or burst pipes.
    #[serde(rename = "동파")]
    Frozen,
    /// Any other construction defect.
    #[serde(rename = "기타 시공 하자")]
    Other,
}

impl IssueType {
    /// The label used on the wire and in persisted records.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Leak => "누수",
            Self::Clog => "막힘/역류",
            Self::Odor => "악취",
            Self::Frozen => "동파",
            Self::Other => "기타 시공 하자",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// The user's submitted consultation input.
///
/// Free-text and contact fields use an empty string for "not provided".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationForm {
    /// Who is asking.
    pub role: UserRole,
    /// What kind of defect.
    pub issue_type: IssueType,
    /// Description of the symptoms.
    pub symptoms: String,
    /// Construction date, occupancy period and similar background.
    #[serde(default)]
    pub history: String,
    /// Relationship with the other party and what they claim.
    #[serde(default)]
    pub other_party_info: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Contact email address.
    #[serde(default)]
    pub email: String,
}

impl ConsultationForm {
    /// Check that the form carries enough information to be analyzed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidForm`] if the symptoms are blank or neither a
    /// phone number nor an email address is given.
    pub fn validate(&self) -> Result<()> {
        if self.symptoms.trim().is_empty() {
            return Err(Error::invalid_form("symptoms are required"));
        }
        if self.phone.trim().is_empty() && self.email.trim().is_empty() {
            return Err(Error::invalid_form(
                "either a phone number or an email address is required",
            ));
        }
        Ok(())
    }
}

/// The structured opinion returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Whether the request could be analyzed at all.
    pub is_consultation_possible: bool,
    /// Why the analysis was refused, when it was.
    #[serde(default)]
    pub refusal_reason: String,
    /// Summary of the core issue.
    #[serde(default)]
    pub core_issue: String,
    /// Estimated technical cause.
    #[serde(default)]
    pub technical_estimation: String,
    /// Who is likely responsible.
    #[serde(default)]
    pub responsibility_judgment: String,
    /// Applicable statutes.
    #[serde(default)]
    pub legal_basis: String,
    /// Relevant court precedents and similar cases.
    #[serde(default)]
    pub precedent: String,
    /// Suggested wording for talking to the other party.
    #[serde(default)]
    pub recommended_script: String,
    /// Follow-up service offer.
    #[serde(default)]
    pub upsell: String,
}

/// Opaque identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// One persisted consultation: an input snapshot and its analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRecord {
    /// Unique identifier, assigned by the record store.
    pub id: RecordId,
    /// Creation instant in epoch milliseconds.
    pub timestamp: i64,
    /// The form as submitted.
    pub form_data: ConsultationForm,
    /// The analysis that was returned.
    pub result: AnalysisResult,
}

impl ConsultationRecord {
    /// Create a record from copies of the form and result.
    #[must_use]
    pub fn new(
        id: RecordId,
        timestamp: i64,
        form_data: &ConsultationForm,
        result: &AnalysisResult,
    ) -> Self {
        Self {
            id,
            timestamp,
            form_data: form_data.clone(),
            result: result.clone(),
        }
    }

    /// The creation instant as a UTC datetime.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// Case-insensitive match against symptoms, issue type, role and core issue.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        [
            self.form_data.symptoms.as_str(),
            self.form_data.issue_type.label(),
            self.form_data.role.label(),
            self.result.core_issue.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn form(symptoms: &str) -> ConsultationForm {
        ConsultationForm {
            role: UserRole::Tenant,
            issue_type: IssueType::Leak,
            symptoms: symptoms.to_string(),
            history: "moved in two years ago".to_string(),
            other_party_info: "landlord blames the tenant".to_string(),
            phone: "010-1234-5678".to_string(),
            email: String::new(),
        }
    }

    pub fn result(possible: bool) -> AnalysisResult {
        AnalysisResult {
            is_consultation_possible: possible,
            refusal_reason: String::new(),
            core_issue: "ceiling leak from the upstairs bathroom".to_string(),
            technical_estimation: "failed waterproofing membrane".to_string(),
            responsibility_judgment: "likely the landlord".to_string(),
            legal_basis: "Civil Act art. 623".to_string(),
            precedent: "similar rulings favor the tenant".to_string(),
            recommended_script: "Please arrange a leak inspection this week.".to_string(),
            upsell: "Book a thermal-camera inspection.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{form, result};
    use super::*;

    #[test]
    fn test_role_and_issue_labels() {
        assert_eq!(UserRole::Tenant.to_string(), "임차인(세입자)");
        assert_eq!(IssueType::Clog.to_string(), "막힘/역류");
    }

    #[test]
    fn test_form_serializes_with_labels_and_camel_case() {
        let json = serde_json::to_value(form("water on the floor")).unwrap();
        assert_eq!(json["role"], "임차인(세입자)");
        assert_eq!(json["issueType"], "누수");
        assert!(json.get("otherPartyInfo").is_some());
    }

    #[test]
    fn test_validate_requires_symptoms() {
        let mut f = form("  ");
        let err = f.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidForm { .. }));

        f.symptoms = "dripping".to_string();
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_some_contact() {
        let mut f = form("dripping");
        f.phone = String::new();
        f.email = String::new();
        assert!(f.validate().is_err());

        f.email = "user@example.com".to_string();
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_record_id_generate_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_record_serialization_layout() {
        let record = ConsultationRecord::new(
            RecordId::from("abc"),
            1_700_000_000_000,
            &form("dripping"),
            &result(true),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["timestamp"], 1_700_000_000_000_i64);
        assert!(json["formData"].is_object());
        assert_eq!(json["result"]["isConsultationPossible"], true);
    }

    #[test]
    fn test_created_at() {
        let record = ConsultationRecord::new(
            RecordId::generate(),
            0,
            &form("x"),
            &result(true),
        );
        assert_eq!(record.created_at().unwrap().timestamp(), 0);
    }

    #[test]
    fn test_matches_searches_selected_fields() {
        let record = ConsultationRecord::new(
            RecordId::generate(),
            0,
            &form("Water stains on the CEILING"),
            &result(true),
        );
        assert!(record.matches("ceiling"));
        assert!(record.matches("누수"));
        assert!(record.matches("세입자"));
        assert!(record.matches("upstairs bathroom"));
        assert!(record.matches(""));
        assert!(!record.matches("waterproofing"));
    }

    #[test]
    fn test_result_defaults_missing_fields() {
        let json = r#"{"isConsultationPossible": false, "refusalReason": "off-topic"}"#;
        let parsed: AnalysisResult = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_consultation_possible);
        assert_eq!(parsed.refusal_reason, "off-topic");
        assert!(parsed.core_issue.is_empty());
    }
}
