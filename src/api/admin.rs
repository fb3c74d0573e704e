use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::engine::writer::ResponseWriter;
use crate::error::Result;
use crate::model::common::instrument::{InstrumentId, Question};
use crate::oracle::Oracle;
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![replace_questions]
}

/// Replace a survey's question tree. Refused once anyone has responded.
#[put("/instruments/<instrument_id>/questions", data = "<questions>", format = "json")]
async fn replace_questions(
    instrument_id: InstrumentId,
    questions: Json<Vec<Question>>,
    store: &State<Store>,
    oracle: &State<Oracle>,
    config: &State<Config>,
) -> Result<()> {
    let writer = ResponseWriter::new(store.inner().as_ref(), oracle.inner().as_ref(), config);
    writer
        .replace_questions(instrument_id, questions.into_inner())
        .await
}
