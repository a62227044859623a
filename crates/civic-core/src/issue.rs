//! Issue data model for civic
//!
//! One document per reported issue. The JSON shape is what the web client
//! consumes, so field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Error, Result};

/// Categories offered by the submission form. The server filters on
/// `category` but does not restrict it to this list.
pub const CATEGORIES: &[&str] = &[
    "Infrastructure",
    "Environment",
    "Public Safety",
    "Transportation",
    "Utilities",
    "Health & Sanitation",
    "Education",
    "Other",
];

/// Issue status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
pub enum Status {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "resolved")]
    Resolved,
    #[serde(rename = "rejected")]
    Rejected,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Pending,
        Status::InProgress,
        Status::Resolved,
        Status::Rejected,
    ];
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in progress" | "in_progress" | "in-progress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            "rejected" => Ok(Status::Rejected),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::InProgress => write!(f, "in progress"),
            Status::Resolved => write!(f, "resolved"),
            Status::Rejected => write!(f, "rejected"),
        }
    }
}

/// Where the issue was reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
}

impl Location {
    pub fn new(lat: f64, lng: f64, address: impl Into<String>) -> Result<Self> {
        let location = Self {
            lat,
            lng,
            address: address.into(),
        };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::InvalidLocation(format!(
                "latitude {} out of range",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(Error::InvalidLocation(format!(
                "longitude {} out of range",
                self.lng
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for Location {
    type Err = Error;

    /// Parse the serialized `{"lat":..,"lng":..,"address":..}` blob that
    /// multipart submissions carry.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let location: Location =
            serde_json::from_str(s).map_err(|e| Error::InvalidLocation(e.to_string()))?;
        location.validate()?;
        Ok(location)
    }
}

/// Location as submitted: either a structured object or its JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationInput {
    Structured(Location),
    Text(String),
}

impl LocationInput {
    pub fn parse(self) -> Result<Location> {
        match self {
            LocationInput::Structured(location) => {
                location.validate()?;
                Ok(location)
            }
            LocationInput::Text(text) => text.parse(),
        }
    }
}

impl From<Location> for LocationInput {
    fn from(location: Location) -> Self {
        LocationInput::Structured(location)
    }
}

/// Set of user IDs supporting an issue
///
/// Serialized as a JSON array. Duplicates in stored data collapse on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Upvotes(BTreeSet<String>);

impl Upvotes {
    /// Flip membership of `user_id`. Returns true if the user now upvotes.
    pub fn toggle(&mut self, user_id: &str) -> bool {
        if self.0.remove(user_id) {
            false
        } else {
            self.0.insert(user_id.to_string());
            true
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Upvotes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Core issue document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Unique identifier (iss-xxxxxxxxxx)
    pub id: String,

    pub title: String,

    pub description: String,

    /// URL of the attached photo on the media host
    pub image: Option<String>,

    pub category: String,

    pub location: Location,

    /// Who reported the issue
    pub created_by: String,

    #[serde(default)]
    pub upvotes: Upvotes,

    #[serde(default)]
    pub status: Status,

    /// Admin remarks from the last status change
    #[serde(default)]
    pub remarks: Option<String>,

    /// Admin estimate for the fix, free text ("2 weeks", a date, ...)
    #[serde(default)]
    pub estimated_fix_time: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Revision counter, bumped on every persisted mutation
    #[serde(default)]
    pub version: u64,
}

/// Input for creating an issue
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: LocationInput,
    pub created_by: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewIssue {
    /// Check the input without consuming it
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("category", &self.category),
            ("createdBy", &self.created_by),
        ] {
            required(field, value.clone())?;
        }
        self.location.clone().parse()?;
        Ok(())
    }

    /// Validate the input and build the initial document
    pub fn into_issue(self, id: String) -> Result<Issue> {
        let title = required("title", self.title)?;
        let description = required("description", self.description)?;
        let category = required("category", self.category)?;
        let created_by = required("createdBy", self.created_by)?;
        let location = self.location.parse()?;
        let image = self
            .image
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let now = Utc::now();
        Ok(Issue {
            id,
            title,
            description,
            image,
            category,
            location,
            created_by,
            upvotes: Upvotes::default(),
            status: Status::Pending,
            remarks: None,
            estimated_fix_time: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }
}

fn required(field: &str, value: String) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Partial status change requested by an admin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub estimated_fix_time: Option<String>,
}

impl StatusUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.remarks.is_none() && self.estimated_fix_time.is_none()
    }
}

impl Issue {
    /// Toggle an upvote. Returns true if the user now upvotes.
    pub fn toggle_upvote(&mut self, user_id: &str) -> bool {
        let added = self.upvotes.toggle(user_id);
        self.touch();
        added
    }

    /// Apply a status change. Nothing is modified when the update is invalid,
    /// and an empty update leaves the issue (revision included) as it was.
    ///
    /// A blank `remarks` or `estimatedFixTime` clears the annotation.
    pub fn apply_status_update(&mut self, update: &StatusUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let status = update
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()?;

        if let Some(status) = status {
            self.status = status;
        }
        if let Some(remarks) = &update.remarks {
            self.remarks = non_blank(remarks);
        }
        if let Some(eta) = &update.estimated_fix_time {
            self.estimated_fix_time = non_blank(eta);
        }
        self.touch();
        Ok(())
    }

    pub fn upvote_count(&self) -> usize {
        self.upvotes.len()
    }

    /// Bump revision and `updated_at`, never moving the timestamp backwards
    fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
        self.version += 1;
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] [{}] {} (+{})",
            self.id,
            self.status,
            self.category,
            self.title,
            self.upvotes.len()
        )
    }
}
