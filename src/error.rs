use log::{error, warn};
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
    Catcher, Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::common::validation::{FieldError, ValidationErrors};
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to export voters: {0}")]
    Csv(#[from] csv::Error),
    #[error("Geocoding failed: {0}")]
    Geocoding(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::UnprocessableEntity,
            Self::NotFound(_) => Status::NotFound,
            Self::Store(_) | Self::Csv(_) => Status::InternalServerError,
            Self::Geocoding(_) => Status::BadGateway,
        }
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        Self::Store(StoreError::Db(err))
    }
}

impl From<BsonError> for Error {
    fn from(err: BsonError) -> Self {
        Self::Store(StoreError::Serialise(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Geocoding(err.to_string())
    }
}

/// JSON body sent alongside every error status.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{} {}: {self}", req.method(), req.uri()),
            _ => warn!("{} {}: {self}", req.method(), req.uri()),
        }

        // Internal details stay in the log.
        let body = match self {
            Self::Validation(errors) => ErrorBody {
                error: errors.to_string(),
                fields: Some(errors.errors().to_vec()),
            },
            Self::Store(_) | Self::Csv(_) => ErrorBody {
                error: "The voter store could not complete the request.".to_string(),
                fields: None,
            },
            other => ErrorBody {
                error: other.to_string(),
                fields: None,
            },
        };
        (status, Json(body)).respond_to(req)
    }
}

/// Error catchers, so requests that never reach a handler still get a JSON body.
pub fn catchers() -> Vec<Catcher> {
    catchers![json_error]
}

#[catch(default)]
fn json_error(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let error = match status.code {
        400 | 422 => "The request body is not a valid voter form.".to_string(),
        404 => format!("Not found: {}", req.uri().path()),
        _ => status.reason().unwrap_or("Request failed").to_string(),
    };
    (status, Json(ErrorBody { error, fields: None }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::Value,
    };

    #[backend_test]
    async fn unroutable_requests_get_json(client: Client) {
        let response = client.get("/no/such/route").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(Some(ContentType::JSON), response.content_type());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Not found: /no/such/route");
        assert!(body.get("fields").is_none());
    }

    #[backend_test]
    async fn malformed_bodies_get_json(client: Client) {
        for body in [r#"{"name": 5}"#, "not json at all", r#"{"age": true}"#] {
            let response = client
                .post("/voters")
                .header(ContentType::JSON)
                .body(body)
                .dispatch()
                .await;
            assert!(matches!(response.status().code, 400 | 422), "{body}");
            assert_eq!(Some(ContentType::JSON), response.content_type());
            let json: Value = response.into_json().await.unwrap();
            assert_eq!(json["error"], "The request body is not a valid voter form.");
        }
    }
}
