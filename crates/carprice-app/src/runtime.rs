// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    DataTable, EstimatorCommand, EstimatorEvent, EstimatorState, FormSubmission, OptionRequest,
    SubmitOutcome, SubmitRequest, SubmitResponse, TableCommand, TableEvent, TablePage,
};

/// I/O behind the widgets. The HTTP client implements it for real pages and
/// the test kit implements it in memory.
pub trait EstimatorRuntime {
    fn fetch_options(&mut self, request: &OptionRequest) -> Result<Vec<String>>;
    fn fetch_table(&mut self, endpoint: &str, query: &[(String, String)]) -> Result<TablePage>;
    fn submit_form(&mut self, request: &SubmitRequest) -> Result<SubmitResponse>;
}

/// Dispatches `command` and performs every fetch it triggers.
pub fn run_command<R: EstimatorRuntime>(
    state: &mut EstimatorState,
    runtime: &mut R,
    command: EstimatorCommand,
) -> Vec<EstimatorEvent> {
    let events = state.dispatch(command);
    drive(state, runtime, events)
}

/// Performs the fetches named in `events`, feeding each answer back into the
/// state. Returns the input events followed by those the answers produced.
pub fn drive<R: EstimatorRuntime>(
    state: &mut EstimatorState,
    runtime: &mut R,
    events: Vec<EstimatorEvent>,
) -> Vec<EstimatorEvent> {
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let request = match &event {
            EstimatorEvent::FetchOptions(request) => Some(request.clone()),
            _ => None,
        };
        out.push(event);
        let Some(request) = request else {
            continue;
        };

        debug!(
            level = request.level.as_str(),
            endpoint = request.endpoint(),
            "fetching options"
        );
        let result = runtime
            .fetch_options(&request)
            .map_err(|error| format!("{error:#}"));
        out.extend(state.receive_options(request.token, result));
    }
    out
}

pub fn reload_table<R: EstimatorRuntime>(
    table: &mut DataTable,
    runtime: &mut R,
    endpoint: &str,
    params: &[(String, String)],
) -> TableEvent {
    let request = table.begin_load(params);
    let result = runtime
        .fetch_table(endpoint, &request.query)
        .map_err(|error| format!("{error:#}"));
    table.finish_load(request.token, result)
}

/// Applies a table command, reloading from `endpoint` when the table is
/// server-backed and the command changed what the server must return.
pub fn run_table_command<R: EstimatorRuntime>(
    table: &mut DataTable,
    runtime: &mut R,
    endpoint: &str,
    params: &[(String, String)],
    command: TableCommand,
) -> TableEvent {
    match table.dispatch(command) {
        TableEvent::ReloadRequired => reload_table(table, runtime, endpoint, params),
        event => event,
    }
}

pub fn submit_form<R: EstimatorRuntime>(
    form: &mut FormSubmission,
    runtime: &mut R,
) -> Result<SubmitOutcome> {
    let request = form.begin_submit()?;
    let result = runtime.submit_form(&request).map_err(|error| {
        warn!(action = %request.action, error = %format!("{error:#}"), "form submission failed");
        format!("{error:#}")
    });
    Ok(form.finish_submit(request.token, result))
}
