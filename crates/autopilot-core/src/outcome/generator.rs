//! Failure/outcome generator.
//!
//! Side-effect free apart from drawing from the injected `RandomSource`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fate::Fate;
use crate::config::SimulationProfile;
use crate::domain::{StepId, Task};
use crate::ports::RandomSource;

const PAYROLL_DOWNLOAD_REASONS: &[&str] = &[
    "Payroll system did not respond within the timeout",
    "Payroll journal for the period is missing",
    "Credentials for the payroll system have expired",
];

const DATA_EXTRACTION_REASONS: &[&str] = &[
    "Payroll journal could not be parsed",
    "Gross wage total does not match the employee sum",
    "Mandatory field tax class is empty for at least one employee",
];

const TAX_SUBMISSION_REASONS: &[&str] = &[
    "Tax authority rejected the submission: invalid tax number",
    "Certificate for the tax authority interface is invalid",
    "Submission deadline for the period has passed",
    "Tax authority interface is temporarily unavailable",
];

const DOCUMENT_UPLOAD_REASONS: &[&str] = &[
    "Document archive rejected the file format",
    "Upload to the document archive timed out",
];

const COMPANY_STEMS: &[&str] = &[
    "Nordlicht",
    "Bergmann",
    "Falkenrot",
    "Lindenhof",
    "Sonnenfeld",
    "Weidmann",
    "Rheinblick",
    "Eichwald",
];

const COMPANY_FORMS: &[&str] = &["GmbH", "AG", "KG", "GmbH & Co. KG", "UG"];

/// Display values for one task run.
///
/// Everything except `sum_check_cents` is a pure function of the legal entity
/// id, so the same task always shows the same company and numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedData {
    pub company_name: String,
    pub sum_check_cents: u64,
    pub tax_id_last4: String,
    pub confirmation_number: String,
}

impl EnrichedData {
    pub fn from_le_id(le_id: &str, sum_check_cents: u64) -> Self {
        let hash = fnv1a(le_id.as_bytes());
        let stem = COMPANY_STEMS[(hash % COMPANY_STEMS.len() as u64) as usize];
        let form = COMPANY_FORMS[((hash >> 8) % COMPANY_FORMS.len() as u64) as usize];
        Self {
            company_name: format!("{stem} {form}"),
            sum_check_cents,
            tax_id_last4: format!("{:04}", (hash >> 16) % 10_000),
            confirmation_number: format!("CN-{:08X}", (hash >> 32) as u32),
        }
    }

    /// `1234567` cents -> `12,345.67 EUR`.
    pub fn sum_check(&self) -> String {
        let euros = self.sum_check_cents / 100;
        let cents = self.sum_check_cents % 100;
        let digits = euros.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("{grouped}.{cents:02} EUR")
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

pub struct OutcomeGenerator {
    rng: Arc<dyn RandomSource>,
    profile: SimulationProfile,
}

impl OutcomeGenerator {
    pub fn new(rng: Arc<dyn RandomSource>, profile: SimulationProfile) -> Self {
        Self { rng, profile }
    }

    fn chance(&self, probability: f64) -> bool {
        self.rng.next_f64() < probability
    }

    pub fn should_task_fail(&self) -> bool {
        self.chance(self.profile.failure_probability)
    }

    pub fn should_task_be_not_ready(&self) -> bool {
        self.chance(self.profile.not_ready_probability)
    }

    pub fn should_require_review(&self) -> bool {
        self.chance(self.profile.review_probability)
    }

    /// Weighted draw over the pipeline steps.
    pub fn failure_step(&self) -> StepId {
        let weights = &self.profile.failure_step_weights;
        let total: f64 = weights.iter().sum();
        let mut roll = self.rng.next_f64() * total;
        for (step, weight) in StepId::ALL.into_iter().zip(weights) {
            if roll < *weight {
                return step;
            }
            roll -= weight;
        }
        // float rounding only
        StepId::TaxSubmission
    }

    pub fn failure_reason(&self, step: StepId) -> String {
        let reasons = match step {
            StepId::PayrollDownload => PAYROLL_DOWNLOAD_REASONS,
            StepId::DataExtraction => DATA_EXTRACTION_REASONS,
            StepId::TaxSubmission => TAX_SUBMISSION_REASONS,
            StepId::DocumentUpload => DOCUMENT_UPLOAD_REASONS,
        };
        let index = self.rng.range_u64(0, reasons.len() as u64 - 1) as usize;
        reasons[index].to_string()
    }

    pub fn step_duration(&self) -> Duration {
        let range = self.profile.step_duration;
        Duration::from_millis(self.rng.range_u64(range.min, range.max))
    }

    pub fn processing_duration(&self) -> Duration {
        let range = self.profile.processing_duration;
        Duration::from_millis(self.rng.range_u64(range.min, range.max))
    }

    pub fn enriched_data(&self, task: &Task) -> EnrichedData {
        let range = self.profile.sum_check_range;
        EnrichedData::from_le_id(&task.le_id, self.rng.range_u64(range.min, range.max))
    }

    /// Rolls the fate of one attempt.
    ///
    /// Not-ready and review are only considered for attempts that are not
    /// already failing.
    pub fn roll_fate(&self) -> Fate {
        if self.should_task_fail() {
            return Fate {
                will_fail: true,
                failure_step: self.failure_step(),
                is_not_ready: false,
                will_require_review: false,
            };
        }
        Fate {
            will_fail: false,
            failure_step: StepId::TaxSubmission,
            is_not_ready: self.should_task_be_not_ready(),
            will_require_review: self.should_require_review(),
        }
    }

    pub fn review_url(&self, task: &Task) -> String {
        format!(
            "{}/{}/review",
            self.profile.review_base_url.trim_end_matches('/'),
            task.id
        )
    }
}
