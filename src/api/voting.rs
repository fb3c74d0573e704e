use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::engine::writer::ResponseWriter;
use crate::error::Result;
use crate::model::{
    api::{
        eligibility::EligibilityDesc,
        vote::{SurveyRequest, SurveyResult, VoteRequest, VoteResult},
    },
    common::instrument::InstrumentId,
};
use crate::oracle::Oracle;
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![submit_vote, submit_survey_response, eligibility]
}

#[post("/instruments/<instrument_id>/votes", data = "<vote>", format = "json")]
async fn submit_vote(
    instrument_id: InstrumentId,
    vote: Json<VoteRequest>,
    store: &State<Store>,
    oracle: &State<Oracle>,
    config: &State<Config>,
) -> Result<Json<VoteResult>> {
    let writer = ResponseWriter::new(store.inner().as_ref(), oracle.inner().as_ref(), config);
    let submitted = writer
        .submit(instrument_id, &vote.voter_id, &vote.raw, Utc::now())
        .await?;
    Ok(Json(submitted.into()))
}

#[post(
    "/instruments/<instrument_id>/survey-responses",
    data = "<response>",
    format = "json"
)]
async fn submit_survey_response(
    instrument_id: InstrumentId,
    response: Json<SurveyRequest>,
    store: &State<Store>,
    oracle: &State<Oracle>,
    config: &State<Config>,
) -> Result<Json<SurveyResult>> {
    let writer = ResponseWriter::new(store.inner().as_ref(), oracle.inner().as_ref(), config);
    let records = writer
        .respond(
            instrument_id,
            &response.voter_id,
            &response.answers,
            Utc::now(),
        )
        .await?;
    Ok(Json(records.into()))
}

#[get("/instruments/<instrument_id>/eligibility?<voter_id>")]
async fn eligibility(
    instrument_id: InstrumentId,
    voter_id: String,
    store: &State<Store>,
    oracle: &State<Oracle>,
    config: &State<Config>,
) -> Result<Json<EligibilityDesc>> {
    let writer = ResponseWriter::new(store.inner().as_ref(), oracle.inner().as_ref(), config);
    let eligibility = writer.eligibility(instrument_id, &voter_id).await?;
    Ok(Json(eligibility.into()))
}
