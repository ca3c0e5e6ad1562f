// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use carprice_app::{
    ConditionGroup, CsrfToken, DataTable, EstimatorCommand, EstimatorEvent, EstimatorRuntime,
    EstimatorState, FieldFilter, FormSubmission, SelectorLevel, SubmitOutcome, TableCommand,
    TableEvent, TableMode, cell_text, reload_table, run_command, run_table_command, submit_form,
};
use std::io::Write;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimateArgs {
    pub selections: Vec<(SelectorLevel, String)>,
    pub conditions: Vec<(ConditionGroup, String)>,
    pub mileage: Option<String>,
    pub submit: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableArgs {
    pub endpoint: Option<String>,
    pub page: usize,
    pub size: Option<usize>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub descending: bool,
    pub filters: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub server_side: bool,
}

/// Walks the selector chain with the given choices. Stops and lists the
/// options of the first level still missing; otherwise validates the form,
/// prints the estimate payload and optionally posts it.
pub fn run_estimate<R: EstimatorRuntime, W: Write>(
    runtime: &mut R,
    args: &EstimateArgs,
    out: &mut W,
) -> Result<()> {
    let mut state = EstimatorState::default();
    let events = run_command(&mut state, runtime, EstimatorCommand::Start);
    check_events(&events)?;

    let mut selections = args.selections.clone();
    selections.sort_by_key(|(level, _)| level.index());
    for (level, value) in selections {
        let events = run_command(
            &mut state,
            runtime,
            EstimatorCommand::Select(level, value.clone()),
        );
        check_events(&events).with_context(|| format!("select {}={value}", level.as_str()))?;
    }

    if let Some(level) = state.selectors.first_missing() {
        let slot = state.selectors.slot(level);
        if !slot.is_enabled() {
            bail!(
                "{} -- pass --select {}=<value> first",
                state.selectors.placeholder(level),
                level
                    .parent()
                    .map_or(level.as_str(), |parent| parent.as_str())
            );
        }
        writeln!(out, "{}:", state.selectors.placeholder(level))?;
        for option in slot.options() {
            writeln!(out, "  {option}")?;
        }
        writeln!(out, "Pass --select {}=<value> to continue.", level.as_str())?;
        return Ok(());
    }

    for (group, value) in &args.conditions {
        let events = run_command(
            &mut state,
            runtime,
            EstimatorCommand::ChooseCondition(*group, value.clone()),
        );
        check_events(&events).with_context(|| format!("condition {}", group.as_str()))?;
    }
    if let Some(mileage) = &args.mileage {
        let events = run_command(
            &mut state,
            runtime,
            EstimatorCommand::SetMileage(mileage.clone()),
        );
        check_events(&events).context("mileage")?;
    }

    let request = state
        .submission()
        .context("estimate form is incomplete -- pass --condition <group>=<score> for each group")?;
    let body = serde_json::to_value(&request).context("encode estimate payload")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;

    let Some(action) = &args.submit else {
        return Ok(());
    };
    let csrf = args.csrf_token.as_deref().map(CsrfToken::new).transpose()?;
    let mut form = FormSubmission::new(action, csrf);
    form.set_fields(body)?;
    match submit_form(&mut form, runtime)? {
        SubmitOutcome::Succeeded => {
            info!(action = %action, "estimate submitted");
            writeln!(out, "Submitted to {action}.")?;
            Ok(())
        }
        SubmitOutcome::Rejected { .. } => {
            for (field, messages) in form.all_field_errors() {
                for message in messages {
                    writeln!(out, "  {field}: {message}")?;
                }
            }
            bail!(
                "{} rejected the submission: {}",
                action,
                form.error().unwrap_or("see field errors above")
            )
        }
        SubmitOutcome::Failed(message) => bail!("submit to {action} failed: {message}"),
        SubmitOutcome::StaleResponse(_) => bail!("submit to {action} was superseded"),
    }
}

fn check_events(events: &[EstimatorEvent]) -> Result<()> {
    for event in events {
        match event {
            EstimatorEvent::InputRejected(message) | EstimatorEvent::DialogShown(message) => {
                bail!("{message}")
            }
            _ => {}
        }
    }
    Ok(())
}

/// `key=min..max` with numeric bounds is a range; anything else matches by
/// substring.
pub fn parse_filter(raw: &str) -> FieldFilter {
    if let Some((min, max)) = raw.split_once("..") {
        let min = min.trim();
        let max = max.trim();
        let bound = |text: &str| -> Option<Option<f64>> {
            if text.is_empty() {
                Some(None)
            } else {
                text.parse::<f64>().ok().map(Some)
            }
        };
        if let (Some(min), Some(max)) = (bound(min), bound(max)) {
            return FieldFilter::Range { min, max };
        }
    }
    FieldFilter::Contains(raw.to_owned())
}

pub fn run_table<R: EstimatorRuntime, W: Write>(
    runtime: &mut R,
    args: &TableArgs,
    default_endpoint: &str,
    default_page_size: usize,
    out: &mut W,
) -> Result<()> {
    let endpoint = args.endpoint.as_deref().unwrap_or(default_endpoint);
    info!(endpoint, server_side = args.server_side, "loading table");
    let mode = if args.server_side {
        TableMode::ServerSide
    } else {
        TableMode::ClientSide
    };
    let mut table = DataTable::new(mode, args.size.unwrap_or(default_page_size))?;

    if let Some(search) = &args.search {
        table.dispatch(TableCommand::Search(search.clone()));
    }
    for (field, raw) in &args.filters {
        table.dispatch(TableCommand::Filter {
            field: field.clone(),
            filter: Some(parse_filter(raw)),
        });
    }
    if let Some(field) = &args.sort {
        table.dispatch(TableCommand::Sort(field.clone()));
        if args.descending {
            table.dispatch(TableCommand::Sort(field.clone()));
        }
    }

    expect_loaded(reload_table(&mut table, runtime, endpoint, &args.params))?;
    if args.page > 1 {
        let event = run_table_command(
            &mut table,
            runtime,
            endpoint,
            &args.params,
            TableCommand::GoToPage(args.page),
        );
        if event == TableEvent::Unchanged {
            bail!(
                "page {} is out of range -- the table has {} page(s)",
                args.page,
                table.total_pages()
            );
        }
        expect_loaded(event)?;
    }

    print_table(&table, out)
}

fn expect_loaded(event: TableEvent) -> Result<()> {
    match event {
        TableEvent::LoadFailed(message) => bail!("load table: {message}"),
        _ => Ok(()),
    }
}

fn print_table<W: Write>(table: &DataTable, out: &mut W) -> Result<()> {
    let rows = table.rows();
    let mut columns: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    if rows.is_empty() {
        writeln!(out, "No matching records found")?;
    } else {
        writeln!(out, "{}", columns.join("\t"))?;
        for row in &rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|column| row.get(*column).map(cell_text).unwrap_or_default())
                .collect();
            writeln!(out, "{}", cells.join("\t"))?;
        }
    }

    writeln!(out, "{}", table.range_label())?;
    if table.total_pages() > 1 {
        let window: Vec<String> = table
            .page_window(5)
            .into_iter()
            .map(|page| {
                if page == table.page() {
                    format!("[{page}]")
                } else {
                    page.to_string()
                }
            })
            .collect();
        writeln!(
            out,
            "Page {} of {}: {}",
            table.page(),
            table.total_pages(),
            window.join(" ")
        )?;
    }
    Ok(())
}
