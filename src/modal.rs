//! Overlay primitive used for the action plan, intervention plan and add
//! forms. Holds no application data.

use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Page-level scroll state. Scrolling is locked while any modal is open.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    locks: Arc<AtomicUsize>,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_locked(&self) -> bool {
        self.locks.load(Ordering::SeqCst) > 0
    }

    fn lock(&self) -> ScrollLock {
        self.locks.fetch_add(1, Ordering::SeqCst);
        ScrollLock {
            locks: Arc::clone(&self.locks),
        }
    }
}

#[derive(Debug)]
struct ScrollLock {
    locks: Arc<AtomicUsize>,
}

impl Drop for ScrollLock {
    fn drop(&mut self) {
        self.locks.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Char(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalEvent {
    Key(Key),
    BackdropClick,
    CloseButton,
    /// A click inside the dialog body.
    ContentClick,
}

#[derive(Debug)]
pub struct Modal {
    title: String,
    description: Option<String>,
    lock: Option<ScrollLock>,
}

impl Modal {
    pub fn open(viewport: &Viewport, title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            lock: Some(viewport.lock()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock.is_some()
    }

    /// Returns whether the modal is still open afterwards.
    pub fn handle(&mut self, event: &ModalEvent) -> bool {
        match event {
            ModalEvent::Key(Key::Escape) | ModalEvent::BackdropClick | ModalEvent::CloseButton => {
                self.close()
            }
            ModalEvent::Key(_) | ModalEvent::ContentClick => {}
        }
        self.is_open()
    }

    pub fn close(&mut self) {
        self.lock = None;
    }

    /// Frames `body` for a terminal of `width` columns.
    pub fn render(&self, body: &str, width: usize) -> String {
        let width = width.max(24);
        let inner = width - 4;
        let mut out = String::new();
        let rule = "─".repeat(width - 2);

        let _ = writeln!(out, "┌{rule}┐");
        for line in wrap(&self.title, inner) {
            let _ = writeln!(out, "│ {line:<inner$} │");
        }
        if let Some(description) = &self.description {
            for line in wrap(description, inner) {
                let _ = writeln!(out, "│ {line:<inner$} │");
            }
        }
        let _ = writeln!(out, "├{rule}┤");
        for paragraph in body.lines() {
            for line in wrap(paragraph, inner) {
                let _ = writeln!(out, "│ {line:<inner$} │");
            }
        }
        let _ = writeln!(out, "└{rule}┘");
        out
    }
}

/// Greedy word wrap. Words wider than `width` are split across lines.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for whole in text.split_whitespace() {
        let mut word = whole;
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(width)
                .map_or(word.len(), |(index, _)| index);
            lines.push(word[..split].to_string());
            word = &word[split..];
        }
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    lines.push(current);
    lines
}
