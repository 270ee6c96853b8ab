//! Event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, EventStatus, OrganizerProfile};
use crate::store::{Bound, Filter};

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Music,
    Sports,
    Arts,
    Food,
    Technology,
    Business,
    Education,
    Health,
    Community,
    Other,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Music => "MUSIC",
            EventCategory::Sports => "SPORTS",
            EventCategory::Arts => "ARTS",
            EventCategory::Food => "FOOD",
            EventCategory::Technology => "TECHNOLOGY",
            EventCategory::Business => "BUSINESS",
            EventCategory::Education => "EDUCATION",
            EventCategory::Health => "HEALTH",
            EventCategory::Community => "COMMUNITY",
            EventCategory::Other => "OTHER",
        }
    }
}

/// Event document (collection `events`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "$id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    #[serde(default)]
    pub address: Option<String>,
    pub is_free: bool,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub max_attendees: Option<i64>,
    #[serde(default)]
    pub registration_url: Option<String>,
    #[serde(default)]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub status: EventStatus,
    pub featured: bool,
    pub view_count: i64,
    pub organizer: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }
}

/// Organizer-supplied content for a new event.
///
/// Lifecycle fields are deliberately absent: any `status`, `featured` or
/// `viewCount` in a request body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_free: bool,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub max_attendees: Option<i64>,
    #[serde(default)]
    pub registration_url: Option<String>,
    #[serde(default)]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl NewEvent {
    /// Validate and normalize the content
    pub fn validate(mut self) -> Result<Self, DomainError> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(DomainError::Validation("title is required".to_string()));
        }
        if self.end_date < self.start_date {
            return Err(DomainError::Validation("endDate is before startDate".to_string()));
        }
        validate_pricing(self.is_free, self.price)?;
        if self.is_free {
            self.price = None;
        }
        validate_capacity(self.max_attendees)?;
        Ok(self)
    }
}

/// Document written for a new event: always a draft, unfeatured, unseen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(flatten)]
    pub content: NewEvent,
    pub status: EventStatus,
    pub featured: bool,
    pub view_count: i64,
    pub organizer: String,
}

impl EventRecord {
    pub fn draft(content: NewEvent, organizer: String) -> Self {
        Self {
            content,
            status: EventStatus::Draft,
            featured: false,
            view_count: 0,
            organizer,
        }
    }
}

/// Content changes to an existing event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<EventCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl EventPatch {
    /// Validate the patch against the event it applies to
    pub fn validate_against(&self, current: &Event) -> Result<(), DomainError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(DomainError::Validation("title is required".to_string()));
            }
        }
        let start = self.start_date.unwrap_or(current.start_date);
        let end = self.end_date.unwrap_or(current.end_date);
        if end < start {
            return Err(DomainError::Validation("endDate is before startDate".to_string()));
        }
        let is_free = self.is_free.unwrap_or(current.is_free);
        if !is_free {
            validate_pricing(is_free, self.price.or(current.price))?;
        }
        validate_capacity(self.max_attendees)
    }

    /// Whether the patch makes the event free (price must then be cleared)
    pub fn makes_free(&self) -> bool {
        self.is_free == Some(true)
    }
}

fn validate_pricing(is_free: bool, price: Option<i64>) -> Result<(), DomainError> {
    match price {
        Some(p) if p < 0 => Err(DomainError::Validation("price cannot be negative".to_string())),
        None if !is_free => Err(DomainError::Validation("price is required for paid events".to_string())),
        _ => Ok(()),
    }
}

fn validate_capacity(max_attendees: Option<i64>) -> Result<(), DomainError> {
    match max_attendees {
        Some(n) if n < 1 => Err(DomainError::Validation("maxAttendees must be positive".to_string())),
        _ => Ok(()),
    }
}

/// Public listing filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilters {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<EventCategory>,
    #[serde(default)]
    pub is_free: Option<bool>,
    #[serde(default)]
    pub start_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
}

impl EventFilters {
    /// Store conditions; always restricted to published events
    pub fn to_filters(&self) -> Vec<Filter> {
        let mut filters = vec![Filter::equal("status", EventStatus::Published.as_str())];

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filters.push(Filter::search("title", search));
        }
        if let Some(category) = self.category {
            filters.push(Filter::equal("category", category.as_str()));
        }
        if let Some(is_free) = self.is_free {
            filters.push(Filter::equal("isFree", is_free));
        }
        if let Some(from) = self.start_from {
            filters.push(Filter::gte("startDate", Bound::Date(from)));
        }
        if let Some(to) = self.start_to {
            filters.push(Filter::lte("startDate", Bound::Date(to)));
        }
        if let Some(location) = self.location.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filters.push(Filter::contains("location", location));
        }
        if let Some(featured) = self.featured {
            filters.push(Filter::equal("featured", featured));
        }

        filters
    }
}

/// Event page data, with caller-specific flags
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub event: Event,
    pub organizer: Option<OrganizerProfile>,
    pub registration_count: u64,
    pub is_user_registered: bool,
    pub is_user_favorite: bool,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Duration;

    pub fn new_event(title: &str) -> NewEvent {
        let start = Utc::now() + Duration::days(7);
        NewEvent {
            title: title.to_string(),
            description: "An evening of live music".to_string(),
            category: EventCategory::Music,
            start_date: start,
            end_date: start + Duration::hours(3),
            location: "Riverside Park".to_string(),
            address: None,
            is_free: true,
            price: None,
            max_attendees: Some(200),
            registration_url: None,
            ticket_url: None,
            image_url: None,
            tags: vec!["jazz".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::new_event;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_payload_lifecycle_fields_ignored() {
        let json = serde_json::json!({
            "title": "Jazz",
            "description": "d",
            "category": "MUSIC",
            "startDate": "2026-06-01T18:00:00Z",
            "endDate": "2026-06-01T21:00:00Z",
            "location": "Park",
            "status": "PUBLISHED",
            "featured": true,
            "viewCount": 99
        });
        let content: NewEvent = serde_json::from_value(json).unwrap();
        let record = serde_json::to_value(EventRecord::draft(content, "org1".into())).unwrap();

        assert_eq!(record["status"], "DRAFT");
        assert_eq!(record["featured"], false);
        assert_eq!(record["viewCount"], 0);
        assert_eq!(record["organizer"], "org1");
        assert_eq!(record["isFree"], true);
    }

    #[test]
    fn test_validate_dates_and_price() {
        let mut event = new_event("Late");
        event.end_date = event.start_date - Duration::hours(1);
        assert!(event.validate().is_err());

        let mut paid = new_event("Paid");
        paid.is_free = false;
        assert!(paid.clone().validate().is_err());
        paid.price = Some(1500);
        assert_eq!(paid.validate().unwrap().price, Some(1500));

        let mut free = new_event("Free");
        free.price = Some(10);
        assert_eq!(free.validate().unwrap().price, None);
    }

    #[test]
    fn test_filters_always_published() {
        let filters = EventFilters::default().to_filters();
        assert_eq!(filters, vec![Filter::equal("status", "PUBLISHED")]);

        let filters = EventFilters {
            search: Some("  ".to_string()),
            category: Some(EventCategory::Food),
            is_free: Some(false),
            ..Default::default()
        }
        .to_filters();
        assert_eq!(filters.len(), 3);
        assert!(filters.contains(&Filter::equal("isFree", false)));
    }
}
