// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tracing::warn;

use crate::{
    ConditionAssessment, ConditionGroup, EstimateRequest, FormRules, Modal, ModalKind,
    OptionRequest, OptionToken, SelectorChain, SelectorEvent, SelectorLevel, is_submittable,
    parse_mileage, validate_form,
};

/// Action bound to the estimate page's dialog button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    RetryOptions(SelectorLevel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorState {
    pub selectors: SelectorChain,
    pub conditions: ConditionAssessment,
    pub rules: FormRules,
    pub mileage: Option<u64>,
    pub modal: Modal<DialogAction>,
    submit_enabled: bool,
}

impl Default for EstimatorState {
    fn default() -> Self {
        Self::new(FormRules::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimatorCommand {
    Start,
    Select(SelectorLevel, String),
    ChooseCondition(ConditionGroup, String),
    ClearCondition(ConditionGroup),
    SetMileage(String),
    ConfirmDialog,
    DismissDialog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimatorEvent {
    FetchOptions(OptionRequest),
    LevelsReset(Vec<SelectorLevel>),
    OptionsLoaded { level: SelectorLevel, count: usize },
    SubmitEnabledChanged(bool),
    DialogShown(String),
    DialogClosed,
    InputRejected(String),
    StaleResponse(OptionToken),
}

impl EstimatorState {
    pub fn new(rules: FormRules) -> Self {
        Self {
            selectors: SelectorChain::new(),
            conditions: ConditionAssessment::default(),
            rules,
            mileage: None,
            modal: Modal::default(),
            submit_enabled: false,
        }
    }

    pub fn submit_enabled(&self) -> bool {
        self.submit_enabled
    }

    pub fn dispatch(&mut self, command: EstimatorCommand) -> Vec<EstimatorEvent> {
        let mut events = match command {
            EstimatorCommand::Start => {
                vec![EstimatorEvent::FetchOptions(self.selectors.start())]
            }
            EstimatorCommand::Select(level, value) => match self.selectors.select(level, &value) {
                Ok(change) => {
                    let mut events = Vec::new();
                    if !change.reset.is_empty() {
                        events.push(EstimatorEvent::LevelsReset(change.reset));
                    }
                    events.extend(change.request.map(EstimatorEvent::FetchOptions));
                    events
                }
                Err(error) => vec![EstimatorEvent::InputRejected(error.to_string())],
            },
            EstimatorCommand::ChooseCondition(group, value) => {
                match self.conditions.choose(group, &value) {
                    Ok(()) => Vec::new(),
                    Err(error) => vec![EstimatorEvent::InputRejected(format!("{error:#}"))],
                }
            }
            EstimatorCommand::ClearCondition(group) => {
                self.conditions.clear(group);
                Vec::new()
            }
            EstimatorCommand::SetMileage(raw) => match parse_mileage(&raw) {
                Ok(mileage) => {
                    self.mileage = mileage;
                    Vec::new()
                }
                Err(error) => vec![EstimatorEvent::InputRejected(format!("{error:#}"))],
            },
            EstimatorCommand::ConfirmDialog | EstimatorCommand::DismissDialog
                if !self.modal.is_visible() =>
            {
                Vec::new()
            }
            EstimatorCommand::ConfirmDialog => {
                let mut events = vec![EstimatorEvent::DialogClosed];
                if let Some(DialogAction::RetryOptions(level)) = self.modal.confirm() {
                    match self.selectors.retry(level) {
                        Ok(request) => events.push(EstimatorEvent::FetchOptions(request)),
                        Err(error) => events.push(self.show_error(&error.to_string(), None)),
                    }
                }
                events
            }
            EstimatorCommand::DismissDialog => {
                self.modal.close();
                vec![EstimatorEvent::DialogClosed]
            }
        };
        self.revalidate(&mut events);
        events
    }

    /// Feeds an option response back into the chain. Failures open an error
    /// dialog whose button retries the same level.
    pub fn receive_options(
        &mut self,
        token: OptionToken,
        result: Result<Vec<String>, String>,
    ) -> Vec<EstimatorEvent> {
        let mut events = match self.selectors.receive(token, result) {
            SelectorEvent::Populated { level, count } => {
                vec![EstimatorEvent::OptionsLoaded { level, count }]
            }
            SelectorEvent::FetchFailed { level, message } => {
                warn!(level = level.as_str(), error = %message, "option fetch failed");
                let text = format!("Could not load {}: {message}", level.plural());
                vec![self.show_error(&text, Some(DialogAction::RetryOptions(level)))]
            }
            SelectorEvent::StaleResponse(token) => vec![EstimatorEvent::StaleResponse(token)],
        };
        self.revalidate(&mut events);
        events
    }

    /// Validated request body; the error names the first missing field.
    pub fn submission(&self) -> Result<EstimateRequest> {
        validate_form(&self.selectors, &self.conditions, &self.rules)?;
        let selection = self
            .selectors
            .selection()
            .ok_or_else(|| anyhow::anyhow!("vehicle selection is incomplete"))?;
        EstimateRequest::build(&selection, self.mileage, &self.conditions)
    }

    fn show_error(&mut self, message: &str, action: Option<DialogAction>) -> EstimatorEvent {
        match action {
            Some(action) => self
                .modal
                .show_with_action(ModalKind::Error, "Error", message, action),
            None => self.modal.show(ModalKind::Error, "Error", message),
        }
        EstimatorEvent::DialogShown(message.to_owned())
    }

    fn revalidate(&mut self, events: &mut Vec<EstimatorEvent>) {
        let enabled = is_submittable(&self.selectors, &self.conditions, &self.rules);
        if enabled != self.submit_enabled {
            self.submit_enabled = enabled;
            events.push(EstimatorEvent::SubmitEnabledChanged(enabled));
        }
    }
}
