// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::debug;

use crate::{OptionToken, SelectorLevel};

/// Observable state of one dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Disabled,
    Loading,
    Empty,
    Selected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Disabled,
    Loading(OptionToken),
    Populated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSlot {
    level: SelectorLevel,
    phase: Phase,
    options: Vec<String>,
    selected: Option<String>,
}

impl SelectorSlot {
    fn disabled(level: SelectorLevel) -> Self {
        Self {
            level,
            phase: Phase::Disabled,
            options: Vec::new(),
            selected: None,
        }
    }

    fn reset(&mut self) {
        *self = Self::disabled(self.level);
    }

    pub fn level(&self) -> SelectorLevel {
        self.level
    }

    pub fn state(&self) -> SelectorState {
        match (&self.phase, &self.selected) {
            (Phase::Disabled, _) => SelectorState::Disabled,
            (Phase::Loading(_), _) => SelectorState::Loading,
            (Phase::Populated, Some(_)) => SelectorState::Selected,
            (Phase::Populated, None) => SelectorState::Empty,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.phase == Phase::Populated
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }
}

/// Fetch of one level's option list, tagged so late answers can be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRequest {
    pub token: OptionToken,
    pub level: SelectorLevel,
    pub params: Vec<(String, String)>,
}

impl OptionRequest {
    pub fn endpoint(&self) -> &'static str {
        self.level.endpoint()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub reset: Vec<SelectorLevel>,
    pub request: Option<OptionRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorEvent {
    Populated {
        level: SelectorLevel,
        count: usize,
    },
    FetchFailed {
        level: SelectorLevel,
        message: String,
    },
    StaleResponse(OptionToken),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleSelection {
    pub category: String,
    pub brand: String,
    pub model: String,
    pub variant: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorChain {
    slots: [SelectorSlot; 5],
    last_token: OptionToken,
}

impl Default for SelectorChain {
    fn default() -> Self {
        Self {
            slots: SelectorLevel::ALL.map(SelectorSlot::disabled),
            last_token: OptionToken::new(0),
        }
    }
}

impl SelectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the whole chain and asks for the category list.
    pub fn start(&mut self) -> OptionRequest {
        for slot in &mut self.slots {
            slot.reset();
        }
        self.request_for(SelectorLevel::Category)
    }

    pub fn slot(&self, level: SelectorLevel) -> &SelectorSlot {
        &self.slots[level.index()]
    }

    pub fn slots(&self) -> &[SelectorSlot] {
        &self.slots
    }

    pub fn value(&self, level: SelectorLevel) -> Option<&str> {
        self.slot(level).selected()
    }

    pub fn first_missing(&self) -> Option<SelectorLevel> {
        SelectorLevel::ALL
            .into_iter()
            .find(|level| self.value(*level).is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    /// Applies a change at `level`: everything below is disabled and the next
    /// level is requested when the new value is non-empty.
    pub fn select(&mut self, level: SelectorLevel, value: &str) -> Result<SelectionChange> {
        let slot = &self.slots[level.index()];
        if !slot.is_enabled() {
            match level.parent() {
                Some(parent) => bail!(
                    "{} is not available yet -- choose a {} first",
                    level.as_str(),
                    parent.as_str()
                ),
                None => bail!("categories are not loaded yet -- wait for them or retry"),
            }
        }

        let value = value.trim();
        if !value.is_empty() && !slot.options.iter().any(|option| option == value) {
            bail!(
                "{value:?} is not a valid {} -- choose one of the listed {}",
                level.as_str(),
                level.plural()
            );
        }

        self.slots[level.index()].selected = (!value.is_empty()).then(|| value.to_owned());

        let reset: Vec<SelectorLevel> = level.below().collect();
        for below in &reset {
            self.slots[below.index()].reset();
        }

        let request = match level.next() {
            Some(next) if !value.is_empty() => Some(self.request_for(next)),
            _ => None,
        };
        Ok(SelectionChange { reset, request })
    }

    /// Feeds back the answer for a request. Answers for a request that is no
    /// longer the pending one for its level are dropped.
    pub fn receive(
        &mut self,
        token: OptionToken,
        result: Result<Vec<String>, String>,
    ) -> SelectorEvent {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.phase == Phase::Loading(token))
        else {
            debug!(token = token.get(), "discarding stale option response");
            return SelectorEvent::StaleResponse(token);
        };

        match result {
            Ok(options) => {
                slot.phase = Phase::Populated;
                slot.selected = None;
                slot.options = options;
                SelectorEvent::Populated {
                    level: slot.level,
                    count: slot.options.len(),
                }
            }
            Err(message) => {
                slot.reset();
                SelectorEvent::FetchFailed {
                    level: slot.level,
                    message,
                }
            }
        }
    }

    /// Re-issues the fetch for a level whose parents are all chosen.
    pub fn retry(&mut self, level: SelectorLevel) -> Result<OptionRequest> {
        if let Some(parent) = level.parent()
            && self.value(parent).is_none()
        {
            bail!(
                "cannot reload {} -- choose a {} first",
                level.plural(),
                parent.as_str()
            );
        }
        for below in level.below() {
            self.slots[below.index()].reset();
        }
        Ok(self.request_for(level))
    }

    pub fn placeholder(&self, level: SelectorLevel) -> String {
        let slot = self.slot(level);
        match slot.phase {
            Phase::Disabled => match level.parent() {
                Some(parent) => format!("Select {} first", parent.as_str()),
                None => format!("No {} loaded", level.plural()),
            },
            Phase::Loading(_) => format!("Loading {}...", level.plural()),
            Phase::Populated if slot.options.is_empty() => {
                format!("No {} available", level.plural())
            }
            Phase::Populated => format!("Select {}", level.as_str()),
        }
    }

    pub fn selection(&self) -> Option<VehicleSelection> {
        Some(VehicleSelection {
            category: self.value(SelectorLevel::Category)?.to_owned(),
            brand: self.value(SelectorLevel::Brand)?.to_owned(),
            model: self.value(SelectorLevel::Model)?.to_owned(),
            variant: self.value(SelectorLevel::Variant)?.to_owned(),
            year: self.value(SelectorLevel::Year)?.to_owned(),
        })
    }

    fn request_for(&mut self, level: SelectorLevel) -> OptionRequest {
        self.last_token = self.last_token.next();
        let token = self.last_token;

        let slot = &mut self.slots[level.index()];
        slot.phase = Phase::Loading(token);
        slot.options.clear();
        slot.selected = None;

        let params = level
            .query_levels()
            .iter()
            .filter_map(|upstream| {
                self.slots[upstream.index()]
                    .selected
                    .as_ref()
                    .map(|value| (upstream.as_str().to_owned(), value.clone()))
            })
            .collect();

        OptionRequest {
            token,
            level,
            params,
        }
    }
}
