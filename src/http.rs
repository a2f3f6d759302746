use crate::booking_service::{BookingError, BookingService, InvalidBooking};
use crate::configuration::Configuration;
use crate::store::ReservationStore;
use crate::types::Booking;
use axum::extract::{rejection::JsonRejection, Query};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState<T: ReservationStore> {
    pub booking_service: BookingService<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AvailabilityQuery {
    #[serde(default)]
    date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AvailabilityResponse {
    date: String,
    slots: Vec<String>,
}

pub fn create_app<T: ReservationStore, C: Configuration>(backend: T, configuration: C) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        booking_service: BookingService::new(backend),
    };

    let api = Router::new()
        .route("/api/bookings", get(get_bookings::<T>).post(create_booking::<T>))
        .route("/api/bookings/available", get(get_available_slots::<T>))
        .with_state(state);

    let base_path = configuration.base_path();
    let app = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(&base_path, api)
    };
    app.layer(cors)
}

fn error_response(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let body = match details {
        Some(details) => json!({ "error": error, "details": details }),
        None => json!({ "error": error }),
    };
    (status, Json(body)).into_response()
}

async fn get_bookings<T: ReservationStore>(State(state): State<AppState<T>>) -> Response {
    match state.booking_service.bookings().await {
        Ok(bookings) => Json(bookings).into_response(),
        Err(err) => {
            error!(?err, "Failed to fetch bookings");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch bookings",
                Some(err.to_string()),
            )
        }
    }
}

async fn create_booking<T: ReservationStore>(
    State(state): State<AppState<T>>,
    request: Result<Json<Booking>, JsonRejection>,
) -> Response {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(%rejection, "Rejected malformed booking request");
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(rejection.body_text()),
            );
        }
    };
    let result = state
        .booking_service
        .reserve(&request.date, &request.time, &request.name, &request.bribe)
        .await;

    match result {
        Ok(_) => Json(json!({ "message": "Booking successful" })).into_response(),
        Err(err @ BookingError::Validation(InvalidBooking::MissingField)) => (
            err.status_code(),
            Json(json!({ "error": "Missing required fields", "received": request })),
        )
            .into_response(),
        Err(err @ BookingError::Validation(InvalidBooking::InvalidAmount)) => {
            error_response(err.status_code(), "Invalid bribe amount", None)
        }
        Err(err @ BookingError::Validation(InvalidBooking::InvalidDate)) => {
            error_response(err.status_code(), "Invalid date, expected DD.MM.YYYY", None)
        }
        Err(err @ BookingError::Validation(InvalidBooking::InvalidTime)) => {
            error_response(err.status_code(), "Invalid time slot", None)
        }
        Err(err @ BookingError::Conflict { .. }) => {
            error_response(err.status_code(), "Time slot is already booked", None)
        }
        Err(err @ BookingError::Backend(_)) => {
            error!(?err, "Failed to create booking");
            error_response(
                err.status_code(),
                "Failed to create booking",
                Some(err.to_string()),
            )
        }
    }
}

async fn get_available_slots<T: ReservationStore>(
    State(state): State<AppState<T>>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    match state.booking_service.available_slots(&query.date).await {
        Ok(slots) => Json(AvailabilityResponse {
            date: query.date,
            slots: slots.into_iter().map(String::from).collect(),
        })
        .into_response(),
        Err(err @ BookingError::Validation(_)) => {
            error_response(err.status_code(), "Invalid date, expected DD.MM.YYYY", None)
        }
        Err(err) => {
            error!(?err, "Failed to fetch available slots");
            error_response(
                err.status_code(),
                "Failed to fetch available slots",
                Some(err.to_string()),
            )
        }
    }
}
