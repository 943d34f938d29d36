pub mod error;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, min};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::llm::ClassifyError;
use crate::shared::enums::{TicketCategory, TicketPriority, TicketStatus};
use crate::shared::schema::tickets;
use crate::shared::state::AppState;

pub use error::{TicketsError, ValidationErrors};

pub const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

/// Raw create payload. Fields stay untyped strings so that a missing field or
/// an out-of-set label turns into a field-level 400 instead of a body
/// rejection.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub suggested_category: TicketCategory,
    pub suggested_priority: TicketPriority,
}

#[derive(Debug, Serialize)]
pub struct TicketStats {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub avg_tickets_per_day: f64,
    pub priority_breakdown: BTreeMap<TicketPriority, i64>,
    pub category_breakdown: BTreeMap<TicketCategory, i64>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tickets)]
struct TicketChanges {
    category: Option<TicketCategory>,
    priority: Option<TicketPriority>,
    status: Option<TicketStatus>,
}

fn push_error(errors: &mut ValidationErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn validate_create(req: CreateTicketRequest) -> Result<Ticket, TicketsError> {
    let mut errors = ValidationErrors::new();

    let title = req.title.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() {
        push_error(&mut errors, "title", "Title cannot be empty.".to_string());
    } else if title.chars().count() > TITLE_MAX_CHARS {
        push_error(
            &mut errors,
            "title",
            format!("Title cannot exceed {TITLE_MAX_CHARS} characters."),
        );
    }

    let description = req.description.as_deref().unwrap_or("").trim().to_string();
    if description.is_empty() {
        push_error(
            &mut errors,
            "description",
            "Description cannot be empty.".to_string(),
        );
    }

    let category = match req.category.as_deref() {
        None => {
            push_error(&mut errors, "category", "This field is required.".to_string());
            None
        }
        Some(value) => match value.parse::<TicketCategory>() {
            Ok(category) => Some(category),
            Err(message) => {
                push_error(&mut errors, "category", message);
                None
            }
        },
    };

    let priority = match req.priority.as_deref() {
        None => {
            push_error(&mut errors, "priority", "This field is required.".to_string());
            None
        }
        Some(value) => match value.parse::<TicketPriority>() {
            Ok(priority) => Some(priority),
            Err(message) => {
                push_error(&mut errors, "priority", message);
                None
            }
        },
    };

    match (category, priority) {
        (Some(category), Some(priority)) if errors.is_empty() => Ok(Ticket {
            id: Uuid::new_v4(),
            title,
            description,
            category,
            priority,
            status: TicketStatus::default(),
            created_at: Utc::now(),
        }),
        _ => Err(TicketsError::Validation(errors)),
    }
}

fn validate_update(req: UpdateTicketRequest) -> Result<TicketChanges, TicketsError> {
    if req.category.is_none() && req.priority.is_none() && req.status.is_none() {
        return Err(TicketsError::field(
            "non_field_errors",
            "At least one field must be provided for update.",
        ));
    }

    let mut errors = ValidationErrors::new();
    let mut changes = TicketChanges::default();

    if let Some(value) = req.category.as_deref() {
        match value.parse::<TicketCategory>() {
            Ok(category) => changes.category = Some(category),
            Err(message) => push_error(&mut errors, "category", message),
        }
    }
    if let Some(value) = req.priority.as_deref() {
        match value.parse::<TicketPriority>() {
            Ok(priority) => changes.priority = Some(priority),
            Err(message) => push_error(&mut errors, "priority", message),
        }
    }
    if let Some(value) = req.status.as_deref() {
        match value.parse::<TicketStatus>() {
            Ok(status) => changes.status = Some(status),
            Err(message) => push_error(&mut errors, "status", message),
        }
    }

    if !errors.is_empty() {
        return Err(TicketsError::Validation(errors));
    }

    Ok(changes)
}

/// total ÷ whole days since the earliest ticket (at least one day), rounded
/// to one decimal. Zero when the store is empty.
fn average_per_day(total: i64, earliest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match earliest {
        Some(first) if total > 0 => {
            let days = (now - first).num_days().max(1);
            ((total as f64 / days as f64) * 10.0).round() / 10.0
        }
        _ => 0.0,
    }
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), TicketsError> {
    let ticket = validate_create(req)?;

    let mut conn = state.conn.get()?;
    diesel::insert_into(tickets::table)
        .values(&ticket)
        .execute(&mut conn)?;

    log::info!("Created ticket {}: {}", ticket.id, ticket.title);
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, TicketsError> {
    let mut q = tickets::table.into_boxed();

    // A filter value outside the enum set can never match a stored row.
    if let Some(value) = query.category.as_deref() {
        match value.parse::<TicketCategory>() {
            Ok(category) => q = q.filter(tickets::category.eq(category)),
            Err(_) => return Ok(Json(Vec::new())),
        }
    }

    if let Some(value) = query.priority.as_deref() {
        match value.parse::<TicketPriority>() {
            Ok(priority) => q = q.filter(tickets::priority.eq(priority)),
            Err(_) => return Ok(Json(Vec::new())),
        }
    }

    if let Some(value) = query.status.as_deref() {
        match value.parse::<TicketStatus>() {
            Ok(status) => q = q.filter(tickets::status.eq(status)),
            Err(_) => return Ok(Json(Vec::new())),
        }
    }

    if let Some(search) = query.search.as_deref() {
        let pattern = format!("%{search}%");
        q = q.filter(
            tickets::title
                .ilike(pattern.clone())
                .or(tickets::description.ilike(pattern)),
        );
    }

    let mut conn = state.conn.get()?;
    let results: Vec<Ticket> = q
        .order(tickets::created_at.desc())
        .load(&mut conn)?;

    log::info!("Listed {} tickets", results.len());
    Ok(Json(results))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, TicketsError> {
    let mut conn = state.conn.get()?;

    let ticket = tickets::table
        .find(id)
        .first::<Ticket>(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => TicketsError::NotFound,
            other => TicketsError::Database(other),
        })?;

    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, TicketsError> {
    let changes = validate_update(req)?;

    let mut conn = state.conn.get()?;
    let ticket = diesel::update(tickets::table.find(id))
        .set(&changes)
        .get_result::<Ticket>(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => TicketsError::NotFound,
            other => TicketsError::Database(other),
        })?;

    log::info!("Updated ticket {id}");
    Ok(Json(ticket))
}

pub async fn get_ticket_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TicketStats>, TicketsError> {
    let mut conn = state.conn.get()?;

    let total_tickets: i64 = tickets::table.count().get_result(&mut conn)?;

    let open_tickets: i64 = tickets::table
        .filter(tickets::status.eq(TicketStatus::Open))
        .count()
        .get_result(&mut conn)?;

    let earliest: Option<DateTime<Utc>> = tickets::table
        .select(min(tickets::created_at))
        .first(&mut conn)?;

    let priority_counts: Vec<(TicketPriority, i64)> = tickets::table
        .group_by(tickets::priority)
        .select((tickets::priority, count_star()))
        .load(&mut conn)?;

    let category_counts: Vec<(TicketCategory, i64)> = tickets::table
        .group_by(tickets::category)
        .select((tickets::category, count_star()))
        .load(&mut conn)?;

    let mut priority_breakdown: BTreeMap<TicketPriority, i64> =
        TicketPriority::ALL.iter().map(|p| (*p, 0)).collect();
    for (priority, count) in priority_counts {
        priority_breakdown.insert(priority, count);
    }

    let mut category_breakdown: BTreeMap<TicketCategory, i64> =
        TicketCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for (category, count) in category_counts {
        category_breakdown.insert(category, count);
    }

    let stats = TicketStats {
        total_tickets,
        open_tickets,
        avg_tickets_per_day: average_per_day(total_tickets, earliest, Utc::now()),
        priority_breakdown,
        category_breakdown,
    };

    log::info!(
        "Generated stats: total={} open={}",
        stats.total_tickets,
        stats.open_tickets
    );
    Ok(Json(stats))
}

pub async fn classify_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, TicketsError> {
    let description = req.description.as_deref().unwrap_or("").trim().to_string();
    if description.is_empty() {
        return Err(TicketsError::field(
            "description",
            "Description cannot be empty.",
        ));
    }

    match state.classifier.classify(&description).await {
        Ok(suggestion) => {
            log::info!(
                "Classified ticket description: category={} priority={}",
                suggestion.category,
                suggestion.priority
            );
            Ok(Json(ClassifyResponse {
                suggested_category: suggestion.category,
                suggested_priority: suggestion.priority,
            }))
        }
        Err(e @ (ClassifyError::Malformed(_) | ClassifyError::InvalidLabel(_))) => {
            log::error!("Invalid classifier reply: {e}");
            Err(TicketsError::InvalidClassification)
        }
        Err(e) => {
            log::warn!("Classification unavailable: {e}");
            Err(TicketsError::ClassifierUnavailable)
        }
    }
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/stats", get(get_ticket_stats))
        .route("/api/tickets/classify", post(classify_ticket))
        .route("/api/tickets/:id", get(get_ticket).patch(update_ticket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_request(
        title: Option<&str>,
        description: Option<&str>,
        category: Option<&str>,
        priority: Option<&str>,
    ) -> CreateTicketRequest {
        CreateTicketRequest {
            title: title.map(str::to_string),
            description: description.map(str::to_string),
            category: category.map(str::to_string),
            priority: priority.map(str::to_string),
        }
    }

    #[test]
    fn create_with_valid_fields_builds_an_open_ticket() {
        let ticket = validate_create(create_request(
            Some("  Refund request  "),
            Some("I was charged twice."),
            Some("billing"),
            Some("high"),
        ))
        .expect("valid request");

        assert_eq!(ticket.title, "Refund request");
        assert_eq!(ticket.description, "I was charged twice.");
        assert_eq!(ticket.category, TicketCategory::Billing);
        assert_eq!(ticket.priority, TicketPriority::High);
        assert_eq!(ticket.status, TicketStatus::Open);
    }

    #[test]
    fn create_without_description_is_a_field_error() {
        let err = validate_create(create_request(
            Some("Login broken"),
            None,
            Some("account"),
            Some("medium"),
        ))
        .unwrap_err();

        match err {
            TicketsError::Validation(errors) => {
                assert!(errors.contains_key("description"));
                assert!(!errors.contains_key("title"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_with_blank_title_is_a_field_error() {
        let err = validate_create(create_request(
            Some("   "),
            Some("Something broke."),
            Some("technical"),
            Some("low"),
        ))
        .unwrap_err();

        match err {
            TicketsError::Validation(errors) => assert!(errors.contains_key("title")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_with_oversized_title_is_a_field_error() {
        let long_title = "x".repeat(TITLE_MAX_CHARS + 1);
        let err = validate_create(create_request(
            Some(&long_title),
            Some("Details."),
            Some("general"),
            Some("low"),
        ))
        .unwrap_err();

        match err {
            TicketsError::Validation(errors) => {
                assert_eq!(errors["title"][0], "Title cannot exceed 200 characters.");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_collects_errors_across_fields() {
        let err = validate_create(create_request(None, None, Some("spam"), Some("urgent")))
            .unwrap_err();

        match err {
            TicketsError::Validation(errors) => {
                assert_eq!(
                    errors.keys().collect::<Vec<_>>(),
                    vec!["category", "description", "priority", "title"]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn update_requires_at_least_one_field() {
        let err = validate_update(UpdateTicketRequest {
            category: None,
            priority: None,
            status: None,
        })
        .unwrap_err();

        match err {
            TicketsError::Validation(errors) => {
                assert!(errors.contains_key("non_field_errors"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn update_accepts_a_single_status_change() {
        let changes = validate_update(UpdateTicketRequest {
            category: None,
            priority: None,
            status: Some("resolved".to_string()),
        })
        .expect("valid update");

        assert_eq!(changes.status, Some(TicketStatus::Resolved));
        assert_eq!(changes.category, None);
        assert_eq!(changes.priority, None);
    }

    #[test]
    fn update_rejects_out_of_enum_values() {
        let err = validate_update(UpdateTicketRequest {
            category: Some("billing".to_string()),
            priority: Some("urgent".to_string()),
            status: None,
        })
        .unwrap_err();

        match err {
            TicketsError::Validation(errors) => {
                assert!(errors.contains_key("priority"));
                assert!(!errors.contains_key("category"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn average_is_zero_without_tickets() {
        assert_eq!(average_per_day(0, None, Utc::now()), 0.0);
    }

    #[test]
    fn average_counts_a_same_day_backlog_as_one_day() {
        let now = Utc::now();
        let earliest = now - Duration::hours(5);
        assert_eq!(average_per_day(7, Some(earliest), now), 7.0);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        let now = Utc::now();
        let earliest = now - Duration::days(3);
        // 10 tickets over 3 days
        assert_eq!(average_per_day(10, Some(earliest), now), 3.3);
    }
}
