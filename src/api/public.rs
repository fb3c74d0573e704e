use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::engine::{
    tally::{tally, Tally},
    writer::ResponseWriter,
};
use crate::error::{Error, Result};
use crate::model::{
    api::{
        health::Health,
        preview::{PreviewDesc, PreviewRequest},
    },
    common::instrument::InstrumentId,
};
use crate::oracle::Oracle;
use crate::store::{ResponseStore, Store};

pub fn routes() -> Vec<Route> {
    routes![instrument_tally, visible_questions, health]
}

#[get("/instruments/<instrument_id>/tally")]
async fn instrument_tally(
    instrument_id: InstrumentId,
    store: &State<Store>,
) -> Result<Json<Tally>> {
    let instrument = store
        .instrument(instrument_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Instrument {instrument_id}")))?;
    let records = store.read_responses(instrument_id, None).await?;
    Ok(Json(tally(&instrument, &records)?))
}

#[post(
    "/instruments/<instrument_id>/visible-questions",
    data = "<request>",
    format = "json"
)]
async fn visible_questions(
    instrument_id: InstrumentId,
    request: Json<PreviewRequest>,
    store: &State<Store>,
    oracle: &State<Oracle>,
    config: &State<Config>,
) -> Result<Json<PreviewDesc>> {
    let writer = ResponseWriter::new(store.inner().as_ref(), oracle.inner().as_ref(), config);
    let preview = writer.preview(instrument_id, &request.answers).await?;
    Ok(Json(preview.into()))
}

#[get("/health")]
fn health() -> Json<Health> {
    Json(Health::healthy())
}
