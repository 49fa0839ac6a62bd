//! Pipeline step model.
//!
//! The pipeline is fixed: four steps, always in the same order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const STEP_COUNT: usize = 4;

/// One of the four fixed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    PayrollDownload,
    DataExtraction,
    TaxSubmission,
    DocumentUpload,
}

impl StepId {
    /// Pipeline order.
    pub const ALL: [StepId; STEP_COUNT] = [
        StepId::PayrollDownload,
        StepId::DataExtraction,
        StepId::TaxSubmission,
        StepId::DocumentUpload,
    ];

    pub fn index(self) -> usize {
        match self {
            StepId::PayrollDownload => 0,
            StepId::DataExtraction => 1,
            StepId::TaxSubmission => 2,
            StepId::DocumentUpload => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<StepId> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepId::PayrollDownload => "payroll-download",
            StepId::DataExtraction => "data-extraction",
            StepId::TaxSubmission => "tax-submission",
            StepId::DocumentUpload => "document-upload",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StepId::PayrollDownload => "Payroll Download",
            StepId::DataExtraction => "Data Extraction",
            StepId::TaxSubmission => "Tax Submission",
            StepId::DocumentUpload => "Document Upload",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StepId::PayrollDownload => "Download the payroll journal from the payroll system",
            StepId::DataExtraction => "Extract wage and tax figures from the payroll journal",
            StepId::TaxSubmission => "Submit the wage tax return to the tax authority",
            StepId::DocumentUpload => "Upload the submission receipt to the document archive",
        }
    }

    /// Task description while this step is the active one.
    pub fn progress_label(self) -> &'static str {
        match self {
            StepId::PayrollDownload => "Downloading payroll",
            StepId::DataExtraction => "Extracting payroll data",
            StepId::TaxSubmission => "Submitting tax return",
            StepId::DocumentUpload => "Uploading documents",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepId::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| PipelineError::bad_request(format!("unknown step: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
    NotReady,
    ReviewRequired,
}

impl StepStatus {
    /// `ended_at` may only be set while the step is in one of these.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StepStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    Passed,
    Pending,
    Failed,
}

/// Display-only assertion result attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationCheck {
    pub key: String,
    pub title: String,
    pub value: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub description: Option<String>,
    pub download_link: Option<String>,
    pub status: CheckStatus,
}

impl ValidationCheck {
    pub fn new(key: impl Into<String>, title: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            value: None,
            expected: None,
            actual: None,
            description: None,
            download_link: None,
            status,
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn download_link(mut self, link: impl Into<String>) -> Self {
        self.download_link = Some(link.into());
        self
    }
}

/// Per-step record owned by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: StepId,
    pub title: String,
    pub description: String,
    pub status_description: Option<String>,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub error_reasons: Vec<String>,
    pub validation_checks: Vec<ValidationCheck>,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn new(id: StepId) -> Self {
        Self {
            id,
            title: id.title().to_string(),
            description: id.description().to_string(),
            status_description: None,
            data: serde_json::Map::new(),
            error_reasons: Vec::new(),
            validation_checks: Vec::new(),
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }

    /// Fresh set of four pending steps in pipeline order.
    pub fn pipeline() -> Vec<StepRecord> {
        StepId::ALL.into_iter().map(StepRecord::new).collect()
    }

    /// Back to `pending` with every output cleared.
    pub fn reset(&mut self) {
        *self = StepRecord::new(self.id);
    }

    pub fn begin(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Moves the step into a terminal status. Errors are cleared on completion.
    pub fn finish(&mut self, status: StepStatus, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.begin(now);
        self.status = status;
        self.ended_at = Some(now);
        if status == StepStatus::Completed {
            self.error_reasons.clear();
            self.status_description = None;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}
