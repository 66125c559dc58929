//! Generation job models and API request/response types.
//!
//! This module defines:
//! - `JobKind` / `JobStatus`: the closed sets stored as text in `ai_jobs`
//! - `Job`: Database entity for one generation request
//! - `CreateJobRequest`: Request body for `POST /api/v1/jobs`
//! - `JobResponse`: Response body returned to clients
//! - Credit pricing for each kind

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::format;
use crate::response::Pagination;

/// What the provider is asked to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
    LipSync,
    Sound,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Image => "image",
            JobKind::Video => "video",
            JobKind::LipSync => "lip_sync",
            JobKind::Sound => "sound",
        }
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(JobKind::Image),
            "video" => Ok(JobKind::Video),
            "lip_sync" => Ok(JobKind::LipSync),
            "sound" => Ok(JobKind::Sound),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a job. `Succeeded`, `Failed` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Terminal statuses that hand the job's credits back.
    pub fn refunds_credits(self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Canceled)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a generation job record from the database.
///
/// # Database Table
///
/// Maps to the `ai_jobs` table. `kind` and `status` are stored as text and parsed
/// with [`Job::status`] where needed. `credits_cost` is what was deducted when
/// the job was created, and is what gets refunded if it fails.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub model: String,
    pub status: String,
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    pub duration_seconds: Option<i32>,
    pub num_outputs: i32,
    pub effect_id: Option<Uuid>,
    pub credits_cost: i64,
    /// Identifier the provider assigned on submission
    pub provider_job_id: Option<String>,
    pub input: serde_json::Value,
    pub output_urls: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Parsed status. Rows are constrained by a CHECK, so unknown text is treated
    /// as still processing rather than failing the request.
    pub fn status(&self) -> JobStatus {
        self.status.parse().unwrap_or(JobStatus::Processing)
    }
}

/// Request to start a generation job.
///
/// # JSON Example
///
/// ```json
/// {
///   "kind": "video",
///   "model": "motion-v2",
///   "prompt": "a paper boat drifting down a rainy street",
///   "aspect_ratio": "16:9",
///   "duration_seconds": 5,
///   "input_urls": ["https://cdn.example.com/u/1/start.png"]
/// }
/// ```
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    pub kind: JobKind,

    #[validate(length(min = 1, max = 100, message = "model is required"))]
    pub model: String,

    #[serde(default)]
    #[validate(length(max = 2000, message = "prompt must be at most 2000 characters"))]
    pub prompt: String,

    #[validate(custom(function = "validate_aspect_ratio"))]
    pub aspect_ratio: Option<String>,

    #[validate(range(min = 1, max = 60, message = "duration must be between 1 and 60 seconds"))]
    pub duration_seconds: Option<i32>,

    #[validate(range(min = 1, max = 4, message = "num_outputs must be between 1 and 4"))]
    pub num_outputs: Option<i32>,

    #[serde(default)]
    #[validate(length(max = 4, message = "at most 4 input files"))]
    pub input_urls: Vec<String>,

    pub effect_id: Option<Uuid>,
}

fn validate_aspect_ratio(ratio: &str) -> Result<(), ValidationError> {
    if format::aspect_ratio_name(ratio).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("aspect_ratio").with_message("unsupported aspect ratio".into()))
    }
}

/// Credits charged per unit of output.
pub const IMAGE_CREDITS_PER_OUTPUT: i64 = 4;
pub const VIDEO_CREDITS_PER_SECOND: i64 = 4;
pub const LIP_SYNC_CREDITS_PER_SECOND: i64 = 3;
pub const SOUND_CREDITS: i64 = 2;

/// Video clips are generated in fixed lengths.
pub const VIDEO_DURATIONS: [i32; 2] = [5, 10];
pub const DEFAULT_VIDEO_DURATION: i32 = 5;

impl CreateJobRequest {
    /// Rules that depend on the kind and can't be expressed as field attributes.
    ///
    /// `has_effect` relaxes the prompt requirement because effect templates carry
    /// their own prompt.
    pub fn check_kind_rules(&self, has_effect: bool) -> Result<(), String> {
        let prompt_empty = self.prompt.trim().is_empty();
        match self.kind {
            JobKind::Image | JobKind::Sound if prompt_empty && !has_effect => {
                Err(format!("a prompt is required for {} jobs", self.kind))
            }
            JobKind::Video if prompt_empty && self.input_urls.is_empty() && !has_effect => {
                Err("video jobs need a prompt or an input image".to_string())
            }
            JobKind::Video
                if self
                    .duration_seconds
                    .is_some_and(|d| !VIDEO_DURATIONS.contains(&d)) =>
            {
                Err("video duration must be 5 or 10 seconds".to_string())
            }
            JobKind::LipSync if self.input_urls.len() < 2 => {
                Err("lip sync jobs need a video and an audio input".to_string())
            }
            JobKind::LipSync if self.duration_seconds.is_none() => {
                Err("lip sync jobs need a duration".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Duration actually sent to the provider, with kind defaults applied.
    pub fn effective_duration(&self) -> Option<i32> {
        match self.kind {
            JobKind::Video => Some(self.duration_seconds.unwrap_or(DEFAULT_VIDEO_DURATION)),
            JobKind::LipSync => self.duration_seconds,
            JobKind::Image | JobKind::Sound => None,
        }
    }

    pub fn effective_num_outputs(&self) -> i32 {
        match self.kind {
            JobKind::Image => self.num_outputs.unwrap_or(1),
            _ => 1,
        }
    }

    /// Price of this request when no effect template overrides it.
    pub fn credit_cost(&self) -> i64 {
        credit_cost(
            self.kind,
            self.effective_duration(),
            self.effective_num_outputs(),
        )
    }
}

/// Credits charged for a job of `kind`.
pub fn credit_cost(kind: JobKind, duration_seconds: Option<i32>, num_outputs: i32) -> i64 {
    match kind {
        JobKind::Image => IMAGE_CREDITS_PER_OUTPUT * i64::from(num_outputs.max(1)),
        JobKind::Video => {
            VIDEO_CREDITS_PER_SECOND * i64::from(duration_seconds.unwrap_or(DEFAULT_VIDEO_DURATION))
        }
        JobKind::LipSync => LIP_SYNC_CREDITS_PER_SECOND * i64::from(duration_seconds.unwrap_or(1)),
        JobKind::Sound => SOUND_CREDITS,
    }
}

/// Query parameters for listing jobs.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListJobsQuery {
    pub fn page(&self) -> Pagination {
        Pagination {
            limit: self.limit.unwrap_or(20),
            offset: self.offset.unwrap_or(0),
        }
        .normalized()
    }
}

/// Response returned for job endpoints.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub kind: String,
    pub model: String,
    pub status: String,
    /// Human-readable status shown in the dashboard
    pub status_label: &'static str,
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    pub aspect_ratio_name: Option<&'static str>,
    pub duration_seconds: Option<i32>,
    pub num_outputs: i32,
    pub effect_id: Option<Uuid>,
    pub credits_cost: i64,
    pub output_urls: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let status = job.status();
        let aspect_ratio_name = job
            .aspect_ratio
            .as_deref()
            .and_then(format::aspect_ratio_name);
        Self {
            id: job.id,
            kind: job.kind,
            model: job.model,
            status: job.status,
            status_label: format::status_label(status),
            prompt: job.prompt,
            aspect_ratio: job.aspect_ratio,
            aspect_ratio_name,
            duration_seconds: job.duration_seconds,
            num_outputs: job.num_outputs,
            effect_id: job.effect_id,
            credits_cost: job.credits_cost,
            output_urls: job.output_urls,
            error_message: job.error_message,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: JobKind) -> CreateJobRequest {
        CreateJobRequest {
            kind,
            model: "m".into(),
            prompt: String::new(),
            aspect_ratio: None,
            duration_seconds: None,
            num_outputs: None,
            input_urls: vec![],
            effect_id: None,
        }
    }

    #[test]
    fn image_cost_scales_with_outputs() {
        let mut req = request(JobKind::Image);
        assert_eq!(req.credit_cost(), 4);
        req.num_outputs = Some(3);
        assert_eq!(req.credit_cost(), 12);
    }

    #[test]
    fn video_cost_uses_default_duration() {
        let mut req = request(JobKind::Video);
        assert_eq!(req.effective_duration(), Some(5));
        assert_eq!(req.credit_cost(), 20);
        req.duration_seconds = Some(10);
        assert_eq!(req.credit_cost(), 40);
    }

    #[test]
    fn lip_sync_and_sound_costs() {
        let mut req = request(JobKind::LipSync);
        req.duration_seconds = Some(12);
        assert_eq!(req.credit_cost(), 36);
        assert_eq!(request(JobKind::Sound).credit_cost(), 2);
    }

    #[test]
    fn num_outputs_ignored_outside_images() {
        let mut req = request(JobKind::Sound);
        req.num_outputs = Some(4);
        assert_eq!(req.effective_num_outputs(), 1);
        assert_eq!(req.credit_cost(), SOUND_CREDITS);
    }

    #[test]
    fn image_needs_prompt_unless_effect() {
        let req = request(JobKind::Image);
        assert!(req.check_kind_rules(false).is_err());
        assert!(req.check_kind_rules(true).is_ok());
    }

    #[test]
    fn video_accepts_input_image_instead_of_prompt() {
        let mut req = request(JobKind::Video);
        assert!(req.check_kind_rules(false).is_err());
        req.input_urls = vec!["https://cdn/x.png".into()];
        assert!(req.check_kind_rules(false).is_ok());
        req.duration_seconds = Some(7);
        assert_eq!(
            req.check_kind_rules(false).unwrap_err(),
            "video duration must be 5 or 10 seconds"
        );
    }

    #[test]
    fn lip_sync_needs_two_inputs_and_duration() {
        let mut req = request(JobKind::LipSync);
        req.input_urls = vec!["v.mp4".into()];
        assert!(req.check_kind_rules(false).is_err());
        req.input_urls.push("a.mp3".into());
        assert!(req.check_kind_rules(false).is_err());
        req.duration_seconds = Some(8);
        assert!(req.check_kind_rules(false).is_ok());
    }

    #[test]
    fn unknown_aspect_ratio_fails_validation() {
        let mut req = request(JobKind::Image);
        req.prompt = "cat".into();
        req.aspect_ratio = Some("5:7".into());
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("aspect_ratio"));

        req.aspect_ratio = Some("16:9".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.refunds_credits());
        assert!(JobStatus::Canceled.refunds_credits());
        assert!(!JobStatus::Succeeded.refunds_credits());
    }

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [JobKind::Image, JobKind::Video, JobKind::LipSync, JobKind::Sound] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("gif".parse::<JobKind>().is_err());
    }
}
