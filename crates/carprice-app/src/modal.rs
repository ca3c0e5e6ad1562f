// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Info,
    Error,
    Confirm,
}

/// Dialog visibility plus the action bound to its primary button, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal<A> {
    visible: bool,
    kind: ModalKind,
    title: String,
    message: String,
    action: Option<A>,
}

impl<A> Default for Modal<A> {
    fn default() -> Self {
        Self {
            visible: false,
            kind: ModalKind::Info,
            title: String::new(),
            message: String::new(),
            action: None,
        }
    }
}

impl<A> Modal<A> {
    pub fn show(&mut self, kind: ModalKind, title: &str, message: &str) {
        self.visible = true;
        self.kind = kind;
        self.title = title.to_owned();
        self.message = message.to_owned();
        self.action = None;
    }

    pub fn show_with_action(&mut self, kind: ModalKind, title: &str, message: &str, action: A) {
        self.show(kind, title, message);
        self.action = Some(action);
    }

    /// Closes the dialog through its primary button, handing back the bound
    /// action.
    pub fn confirm(&mut self) -> Option<A> {
        if !self.visible {
            return None;
        }
        self.visible = false;
        self.action.take()
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.action = None;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn kind(&self) -> ModalKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn action(&self) -> Option<&A> {
        self.action.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{Modal, ModalKind};

    #[test]
    fn confirm_returns_bound_action_once() {
        let mut modal = Modal::default();
        modal.show_with_action(ModalKind::Error, "Error", "fetch failed", "retry");
        assert!(modal.is_visible());
        assert_eq!(modal.confirm(), Some("retry"));
        assert!(!modal.is_visible());
        assert_eq!(modal.confirm(), None);
    }

    #[test]
    fn close_drops_action() {
        let mut modal = Modal::default();
        modal.show_with_action(ModalKind::Confirm, "Retry?", "try again", 7);
        modal.close();
        assert!(modal.action().is_none());
        assert!(!modal.is_visible());
    }

    #[test]
    fn plain_show_has_no_action() {
        let mut modal: Modal<()> = Modal::default();
        modal.show(ModalKind::Info, "Saved", "estimate submitted");
        assert_eq!(modal.kind(), ModalKind::Info);
        assert_eq!(modal.message(), "estimate submitted");
        assert!(modal.action().is_none());
    }
}
