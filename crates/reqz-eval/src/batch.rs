//! CSV driven replay of a module: one execution per data row.
//!
//! The header row names the variables. Every row runs with the base
//! variables plus its columns, and the whole row is also bound to `$play`.
//! Lines starting with `#` are comments; cells are trimmed.

use crate::environment::Vars;
use crate::http::HttpResponse;
use crate::module::RequestModule;
use crate::value::{Object, Value};
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Runs `module` once per row of `reader`, in row order. The first failing
/// row stops the batch.
pub fn play<R: Read>(
    module: &RequestModule,
    reader: R,
    base_vars: &Vars,
    delimiter: u8,
) -> Result<Vec<Option<HttpResponse>>> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let headers = csv.headers().context("Failed to read CSV header row")?.clone();
    let mut responses = Vec::new();

    for (index, record) in csv.records().enumerate() {
        let row = index + 1;
        let record = record.with_context(|| format!("Failed to read CSV row {}", row))?;

        let columns: Object = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.to_string(), Value::typed(cell)))
            .collect();

        let mut vars = base_vars.clone();
        vars.extend(columns.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.insert("$play".to_string(), Value::Object(columns));

        debug!(row, "playing row");
        let response = module.exec(vars).with_context(|| format!("Row {} failed", row))?;
        responses.push(response);
    }
    Ok(responses)
}

pub fn play_file(
    module: &RequestModule,
    path: impl AsRef<Path>,
    base_vars: &Vars,
    delimiter: u8,
) -> Result<Vec<Option<HttpResponse>>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    play(module, file, base_vars, delimiter)
}
