use std::io::Cursor;

use rocket::{
    http::ContentType,
    response::{self, Responder},
    serde::json::Json,
    Request, Response, Route, State,
};

use crate::{
    dashboard::{export_csv, DashboardSummary, EXPORT_FILE_NAME},
    error::Result,
    store::VoterRepository,
};

pub fn routes() -> Vec<Route> {
    routes![get_dashboard, export_voters]
}

#[get("/dashboard")]
async fn get_dashboard(voters: &State<VoterRepository>) -> Result<Json<DashboardSummary>> {
    let records = voters.list().await?;
    Ok(Json(DashboardSummary::from_records(&records)))
}

/// A CSV document served as a file download.
struct CsvAttachment(String);

impl<'r> Responder<'r, 'static> for CsvAttachment {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::CSV)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            )
            .sized_body(self.0.len(), Cursor::new(self.0))
            .ok()
    }
}

#[get("/dashboard/export")]
async fn export_voters(voters: &State<VoterRepository>) -> Result<CsvAttachment> {
    let records = voters.list().await?;
    Ok(CsvAttachment(export_csv(&records)?))
}
