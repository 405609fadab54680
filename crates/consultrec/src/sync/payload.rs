//! Flattening of a consultation into form fields.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};

use crate::record::{AnalysisResult, ConsultationForm};

/// How a consultation is rendered into the remote payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFormat {
    /// Offset, in hours, of the wall clock used for `timestamp`.
    pub utc_offset_hours: i32,
    /// Sent for blank contact fields.
    pub missing_placeholder: String,
    /// `isSuccess` value for a possible consultation.
    pub success_label: String,
    /// `isSuccess` value for a refused consultation.
    pub failure_label: String,
}

impl Default for PayloadFormat {
    fn default() -> Self {
        Self {
            utc_offset_hours: 9,
            missing_placeholder: "미입력".to_string(),
            success_label: "분석 성공".to_string(),
            failure_label: "분석 실패".to_string(),
        }
    }
}

impl PayloadFormat {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Render `at` the way a ko-KR locale prints a date and time,
    /// e.g. `2024. 3. 5. 오후 2:07:09`.
    #[must_use]
    pub fn render_timestamp(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.offset());
        let (is_pm, hour) = local.hour12();
        format!(
            "{}. {}. {}. {} {}:{:02}:{:02}",
            local.year(),
            local.month(),
            local.day(),
            if is_pm { "오후" } else { "오전" },
            hour,
            local.minute(),
            local.second()
        )
    }

    /// The ordered field list sent for one consultation submitted at `at`.
    #[must_use]
    pub fn fields(
        &self,
        form: &ConsultationForm,
        result: &AnalysisResult,
        at: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let or_placeholder = |value: &str| {
            if value.trim().is_empty() {
                self.missing_placeholder.clone()
            } else {
                value.to_string()
            }
        };
        let outcome = if result.is_consultation_possible {
            &self.success_label
        } else {
            &self.failure_label
        };

        [
            ("timestamp", self.render_timestamp(at)),
            ("role", form.role.label().to_string()),
            ("issueType", form.issue_type.label().to_string()),
            ("phone", or_placeholder(&form.phone)),
            ("email", or_placeholder(&form.email)),
            ("symptoms", form.symptoms.clone()),
            ("history", form.history.clone()),
            ("otherPartyInfo", form.other_party_info.clone()),
            ("coreIssue", result.core_issue.clone()),
            ("recommendedScript", result.recommended_script.clone()),
            ("isSuccess", outcome.clone()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}
