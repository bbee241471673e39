//! Distribution records and their lifecycle
//!
//! A distribution is one post targeted at one account. Its status only moves
//! along these edges:
//!
//! ```text
//! pending ──> publishing ──> completed
//!    ^             │
//!    │             ├──> failed ──┐
//!    │             └──> error  ──┤
//!    └───────── retry ───────────┘
//! ```
//!
//! `completed` is terminal. Every mutation goes through a method on
//! [`Distribution`] that checks the edge first and leaves the record
//! untouched if the move is illegal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DistributionError;
use crate::response::{FailureKind, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStatus {
    Pending,
    Publishing,
    Completed,
    /// The platform was reached and refused, or could not be reached
    Failed,
    /// The attempt could not be made (no client, missing credentials or settings)
    Error,
}

impl DistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Publishing => "publishing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn can_transition_to(&self, next: DistributionStatus) -> bool {
        use DistributionStatus::*;
        matches!(
            (self, next),
            (Pending, Publishing)
                | (Publishing, Completed)
                | (Publishing, Failed)
                | (Publishing, Error)
                | (Failed, Pending)
                | (Error, Pending)
        )
    }
}

impl FromStr for DistributionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "publishing" => Ok(Self::Publishing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid distribution status: '{}'", s)),
        }
    }
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One post on one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub post_id: String,
    pub account_id: String,
    pub platform_post_id: Option<String>,
    pub status: DistributionStatus,
    pub scheduled_for: i64,
    pub attempted_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub platform_response: Option<Value>,
    /// Filled in later by analytics collection, never by publishing
    pub engagement_metrics: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Distribution {
    /// A fresh `pending` record
    pub fn new(post_id: &str, account_id: &str, scheduled_for: i64, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            account_id: account_id.to_string(),
            platform_post_id: None,
            status: DistributionStatus::Pending,
            scheduled_for,
            attempted_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
            platform_response: None,
            engagement_metrics: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: DistributionStatus, now: i64) -> Result<(), DistributionError> {
        if !self.status.can_transition_to(to) {
            return Err(DistributionError::IllegalTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// `pending -> publishing`, stamping the attempt time
    pub fn begin_attempt(&mut self, now: i64) -> Result<(), DistributionError> {
        self.transition(DistributionStatus::Publishing, now)?;
        self.attempted_at = Some(now);
        Ok(())
    }

    /// Record the platform's answer: `publishing -> completed | failed | error`
    ///
    /// Configuration failures (the request was never sent) become `error`;
    /// rejections and transport failures become `failed`.
    pub fn record_response(&mut self, response: &Response, now: i64) -> Result<(), DistributionError> {
        if response.is_success() {
            self.transition(DistributionStatus::Completed, now)?;
            self.platform_post_id = response.platform_post_id();
            self.completed_at = Some(now);
            self.error_message = None;
        } else {
            let next = match response.failure_kind() {
                Some(FailureKind::Configuration) => DistributionStatus::Error,
                _ => DistributionStatus::Failed,
            };
            self.transition(next, now)?;
            self.error_message = Some(
                response
                    .error()
                    .unwrap_or("Unknown platform error")
                    .to_string(),
            );
        }
        self.platform_response = response.platform_response().cloned();
        Ok(())
    }

    /// `publishing -> error` for problems found before any request was made
    pub fn record_error(&mut self, message: impl Into<String>, now: i64) -> Result<(), DistributionError> {
        self.transition(DistributionStatus::Error, now)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// `failed | error -> pending`, clearing the last attempt and counting the retry
    pub fn reset_for_retry(&mut self, now: i64) -> Result<(), DistributionError> {
        self.transition(DistributionStatus::Pending, now)?;
        self.attempted_at = None;
        self.error_message = None;
        self.retry_count += 1;
        Ok(())
    }
}
