use rocket::{
    http::Status,
    response::stream::{Event, EventStream},
    serde::json::Json,
    tokio::select,
    Route, Shutdown, State,
};

use crate::{
    error::Result,
    model::{
        api::voter::{VoterForm, VoterRecord},
        mongodb::Id,
    },
    store::VoterRepository,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_voters,
        get_voter,
        create_voter,
        update_voter,
        delete_voter,
        voter_events,
    ]
}

#[get("/voters")]
async fn get_voters(voters: &State<VoterRepository>) -> Result<Json<Vec<VoterRecord>>> {
    Ok(Json(voters.list().await?))
}

#[get("/voters/<voter_id>")]
async fn get_voter(voter_id: Id, voters: &State<VoterRepository>) -> Result<Json<VoterRecord>> {
    Ok(Json(voters.get(voter_id).await?))
}

#[post("/voters", data = "<form>", format = "json")]
async fn create_voter(
    form: Json<VoterForm>,
    voters: &State<VoterRepository>,
) -> Result<(Status, Json<VoterRecord>)> {
    let voter = form.into_inner().validate()?;
    let record = voters.create(voter).await?;
    Ok((Status::Created, Json(record)))
}

#[patch("/voters/<voter_id>", data = "<form>", format = "json")]
async fn update_voter(
    voter_id: Id,
    form: Json<VoterForm>,
    voters: &State<VoterRepository>,
) -> Result<Json<VoterRecord>> {
    let patch = form.into_inner().validate_patch()?;
    Ok(Json(voters.update(voter_id, patch).await?))
}

#[delete("/voters/<voter_id>")]
async fn delete_voter(voter_id: Id, voters: &State<VoterRepository>) -> Result<Status> {
    voters.delete(voter_id).await?;
    Ok(Status::NoContent)
}

/// Live feed of changes to the voter collection, one JSON event per change.
#[get("/voters/events")]
fn voter_events(voters: &State<VoterRepository>, mut end: Shutdown) -> EventStream![] {
    let mut subscription = voters.subscribe();
    EventStream! {
        loop {
            let event = select! {
                event = subscription.next() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = &mut end => break,
            };
            yield Event::json(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{serde_json, Value},
    };

    use crate::model::{
        api::voter::NOTES_MAX_CHARS,
        common::party::Party,
        db::voter::{VoterCore, VoterPatch},
    };

    use super::*;

    async fn post_form<'c>(client: &'c Client, form: &VoterForm) -> LocalResponse<'c> {
        client
            .post(uri!(create_voter))
            .header(ContentType::JSON)
            .body(serde_json::to_string(form).unwrap())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn create_and_list(client: Client, voters: VoterRepository) {
        let response = post_form(&client, &VoterForm::example()).await;
        assert_eq!(Status::Created, response.status());
        let created: VoterRecord = response.into_json().await.unwrap();
        assert_eq!(created.name, "John Doe");
        assert_eq!(created.party, Party::Red);
        assert_eq!(created.people_in_house, Some(4));

        let response = client.get(uri!(get_voters)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<VoterRecord> = response.into_json().await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        // The stored copy matches what the API returned.
        assert_eq!(voters.get(*created.id).await.unwrap(), created);
    }

    #[backend_test(seeded)]
    async fn seeded_listing(client: Client) {
        let response = client.get(uri!(get_voters)).dispatch().await;
        let listed: Vec<VoterRecord> = response.into_json().await.unwrap();
        let names: Vec<_> = listed.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["John Doe", "Jane Smith", "Peter Jones"]);
    }

    #[backend_test]
    async fn get_one(client: Client, voters: VoterRepository) {
        let created = voters.create(VoterCore::example2()).await.unwrap();

        let response = client.get(uri!(get_voter(*created.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(created, response.into_json::<VoterRecord>().await.unwrap());

        let response = client.get(uri!(get_voter(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get("/voters/not-an-id").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn invalid_form_reports_every_field(client: Client, voters: VoterRepository) {
        let form = VoterForm {
            name: Some("J".to_string()),
            age: Some(17.0.into()),
            party: Some("Purple".to_string()),
            lat: None,
            ..VoterForm::example()
        };
        let response = post_form(&client, &form).await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        let body: Value = response.into_json().await.unwrap();
        let fields: Vec<_> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["name", "age", "party", "lat"]);
        assert!(body["error"].as_str().unwrap().contains("Voter must be 18 or older."));

        // Nothing was stored.
        assert!(voters.list().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn age_boundary(client: Client) {
        let mut form = VoterForm::minimal("Young Voter", Party::Yellow);
        form.age = Some(17.0.into());
        assert_eq!(
            Status::UnprocessableEntity,
            post_form(&client, &form).await.status()
        );

        form.age = Some(18.0.into());
        assert_eq!(Status::Created, post_form(&client, &form).await.status());
    }

    #[backend_test]
    async fn numbers_sent_as_strings(client: Client, voters: VoterRepository) {
        let body = r#"{"name":"John Doe","age":"30","party":"Red","lat":1.0,"lng":2.0}"#;
        let response = client
            .post(uri!(create_voter))
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let created: VoterRecord = response.into_json().await.unwrap();
        assert_eq!(created.age, 30);

        let body = r#"{"name":"John Doe","age":"abc","party":"Red","lat":"1","lng":"east"}"#;
        let response = client
            .post(uri!(create_voter))
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        assert_eq!(Some(ContentType::JSON), response.content_type());
        let body: Value = response.into_json().await.unwrap();
        let fields: Vec<_> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["age", "lng"]);
        assert_eq!(body["fields"][0]["message"], "Age must be a number.");

        assert_eq!(voters.list().await.unwrap(), vec![created]);
    }

    #[backend_test]
    async fn notes_boundary(client: Client) {
        let mut form = VoterForm::minimal("Note Taker", Party::White);
        form.notes = Some("n".repeat(NOTES_MAX_CHARS + 1));
        let response = post_form(&client, &form).await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["fields"][0]["field"], "notes");

        form.notes = Some("n".repeat(NOTES_MAX_CHARS));
        assert_eq!(Status::Created, post_form(&client, &form).await.status());
    }

    #[backend_test]
    async fn patch_merges(client: Client, voters: VoterRepository) {
        let created = voters.create(VoterCore::example()).await.unwrap();

        let patch = VoterForm {
            party: Some("Green".to_string()),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_voter(*created.id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&patch).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: VoterRecord = response.into_json().await.unwrap();
        assert_eq!(updated.party, Party::Green);
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.notes, created.notes);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at.is_some());

        // Invalid values are rejected and leave the voter alone.
        let patch = VoterForm {
            age: Some(200.0.into()),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_voter(*created.id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&patch).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        assert_eq!(voters.get(*created.id).await.unwrap(), updated);

        // Unknown voters.
        let response = client
            .patch(uri!(update_voter(Id::new())))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&VoterPatch::default()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(seeded)]
    async fn patch_blanks_clear_fields(client: Client, voters: VoterRepository) {
        let voter = voters.list().await.unwrap().remove(0);
        assert!(voter.notes.is_some());

        let response = client
            .patch(uri!(update_voter(*voter.id)))
            .header(ContentType::JSON)
            .body(r#"{"notes": "", "designation": "  ", "peopleInHouse": ""}"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert!(body.get("notes").is_none());
        assert!(body.get("designation").is_none());
        assert!(body.get("peopleInHouse").is_none());
        assert_eq!(body["address"], voter.address.unwrap().as_str());

        let stored = voters.get(*voter.id).await.unwrap();
        assert_eq!(stored.notes, None);
        assert_eq!(stored.designation, None);
        assert_eq!(stored.people_in_house, None);
    }

    #[backend_test(seeded)]
    async fn delete_removes(client: Client, voters: VoterRepository) {
        let victim = voters.list().await.unwrap().remove(1);

        let response = client.delete(uri!(delete_voter(*victim.id))).dispatch().await;
        assert_eq!(Status::NoContent, response.status());

        let remaining = voters.list().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|v| v.id != victim.id));

        let response = client.delete(uri!(delete_voter(*victim.id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn events_stream_ends_on_shutdown(client: Client) {
        client.rocket().shutdown().notify();
        let response = client.get(uri!(voter_events)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(Some(ContentType::EventStream), response.content_type());
        assert_eq!(response.into_string().await.unwrap_or_default(), "");
    }
}
