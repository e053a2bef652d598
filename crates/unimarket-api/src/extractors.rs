//! # Request Extraction Helpers
//!
//! Provides the [`Validate`] trait for request DTOs, JSON extraction that
//! maps body rejections to [`AppError::BadRequest`], and parsing of path
//! segments into typed identifiers. Malformed input becomes a 400 or 422
//! before any ledger call.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use unimarket_core::ValidationError;

use crate::error::AppError;

/// Request types that check business rules beyond what serde enforces.
pub trait Validate {
    /// Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse a raw path segment or body field into a validated domain value.
pub fn parse_field<T>(raw: &str) -> Result<T, AppError>
where
    T: FromStr<Err = ValidationError>,
{
    raw.parse::<T>().map_err(AppError::from)
}
