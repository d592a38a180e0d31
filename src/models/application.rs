//! Application record models
//!
//! One `Application` is a single tracked job application as persisted in the
//! remote `applications` table. Writes travel as an `ApplicationPatch`, which
//! carries only the fields the caller supplied; everything else is left to
//! server defaults on insert and preserved on update.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// == Application Status ==
/// Pipeline stage of a tracked application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Saved,
    Applied,
    Interviewing,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "saved",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Application ==
/// One persisted item of the user's tracked collection.
///
/// `id` and the timestamps are server-assigned; every cached record belongs
/// to the currently authenticated owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub company: String,
    pub url: Option<String>,
    pub status: ApplicationStatus,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub applied_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// == Application Patch ==
/// The subset of descriptive fields supplied by a caller.
///
/// Serializes only the fields that are present, so a partial update never
/// overwrites remote columns the caller did not mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ApplicationPatch {
    /// Merges the supplied fields into `application`, preserving the rest.
    pub fn apply_to(&self, application: &mut Application) {
        if let Some(title) = &self.title {
            application.title = title.clone();
        }
        if let Some(company) = &self.company {
            application.company = company.clone();
        }
        if let Some(url) = &self.url {
            application.url = Some(url.clone());
        }
        if let Some(status) = self.status {
            application.status = status;
        }
        if let Some(salary_min) = self.salary_min {
            application.salary_min = Some(salary_min);
        }
        if let Some(salary_max) = self.salary_max {
            application.salary_max = Some(salary_max);
        }
        if let Some(location) = &self.location {
            application.location = Some(location.clone());
        }
        if let Some(remote) = self.remote {
            application.remote = Some(remote);
        }
        if let Some(applied_date) = self.applied_date {
            application.applied_date = Some(applied_date);
        }
        if let Some(description) = &self.description {
            application.description = Some(description.clone());
        }
        if let Some(notes) = &self.notes {
            application.notes = Some(notes.clone());
        }
    }
}

// == Application Insert ==
/// Insert payload: the owner id plus whatever fields the caller supplied.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationInsert {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub fields: ApplicationPatch,
}
