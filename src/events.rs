//! Event logging for HIR construction.
//!
//! The builder reports what it did while translating a method: constants it folded,
//! instructions value numbering deduplicated, phis it created, local slots it
//! invalidated at joins, and the blocks it interpreted or deferred. Events can be
//! inspected for debugging, summarized by the CLI, or ignored entirely.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only collection with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events; records itself on drop
//!
//! # Example
//!
//! ```rust,ignore
//! use hirforge::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::PhiCreated)
//!     .at(block, 0x12)
//!     .message("v9 = phi local 2");
//! println!("{}", log.summary());
//! ```

use std::{collections::HashMap, fmt};

use crate::hir::BlockId;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An instruction was replaced by a folded or simplified equivalent.
    Idealized,
    /// An instruction was found in the value numbering cache and not emitted.
    ValueNumbered,
    /// A phi was created at a join.
    PhiCreated,
    /// A local slot was invalidated at a join.
    SlotInvalidated,
    /// A store-store barrier was placed before a constructor return.
    BarrierInserted,
    /// A synthetic entry block was inserted in front of a loop-header entry.
    EntryInserted,
    /// A missing terminal was synthesized as a jump to the fall-through block.
    FallthroughSynthesized,

    /// A block was interpreted.
    BlockBuilt,
    /// A block was re-queued because some of its predecessors were not built yet.
    BlockDeferred,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (the build bailed out).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idealized => "instruction idealized",
            Self::ValueNumbered => "instruction value numbered",
            Self::PhiCreated => "phi created",
            Self::SlotInvalidated => "slot invalidated",
            Self::BarrierInserted => "barrier inserted",
            Self::EntryInserted => "entry inserted",
            Self::FallthroughSynthesized => "fall-through synthesized",
            Self::BlockBuilt => "block built",
            Self::BlockDeferred => "block deferred",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event changed the IR being built.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::Idealized
                | Self::ValueNumbered
                | Self::PhiCreated
                | Self::SlotInvalidated
                | Self::BarrierInserted
                | Self::EntryInserted
                | Self::FallthroughSynthesized
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The block being built when the event occurred.
    pub block: Option<BlockId>,
    /// Bytecode offset of the operation being translated.
    pub offset: Option<u32>,
    /// Human-readable description.
    pub message: String,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            block: None,
            offset: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(block) = self.block {
            write!(f, " {block}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " @{offset}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    block: Option<BlockId>,
    offset: Option<u32>,
    message: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            block: None,
            offset: None,
            message: None,
        }
    }

    /// Sets the block and offset where the event occurred.
    pub fn at(mut self, block: BlockId, offset: u32) -> Self {
        self.block = Some(block);
        self.offset = Some(offset);
        self
    }

    /// Sets only the block (for block-level events).
    pub fn block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            block: self.block.take(),
            offset: self.offset.take(),
            message,
        });
    }
}

/// Collection of events from one or more builds.
///
/// This type is thread-safe: events can be appended concurrently from
/// multiple threads using shared references (`&self`).
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events recorded for a specific block.
    pub fn filter_block(&self, block: BlockId) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.block == Some(block))
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Generates a human-readable summary of all transformation events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(!log.has(EventKind::PhiCreated));
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();
        log.record(EventKind::PhiCreated)
            .at(BlockId::new(3), 0x10)
            .message("v7 = phi stack 0");

        assert_eq!(log.len(), 1);
        let event = log.iter().next().unwrap();
        assert_eq!(event.block, Some(BlockId::new(3)));
        assert_eq!(event.offset, Some(0x10));
        assert_eq!(event.message, "v7 = phi stack 0");
        assert_eq!(event.to_string(), "[phi created] B3 @16 v7 = phi stack 0");
    }

    #[test]
    fn test_default_message() {
        let log = EventLog::new();
        log.record(EventKind::BlockBuilt).block(BlockId::new(0));
        assert_eq!(log.iter().next().unwrap().message, "block built");
    }

    #[test]
    fn test_filters_and_summary() {
        let log = EventLog::new();
        log.record(EventKind::Idealized).message("1 + 2 -> 3");
        log.record(EventKind::Idealized).message("x * 1 -> x");
        log.record(EventKind::ValueNumbered).block(BlockId::new(1));
        log.warn("fell off the end");
        log.info("started");

        assert_eq!(log.count_kind(EventKind::Idealized), 2);
        assert_eq!(log.filter_block(BlockId::new(1)).count(), 1);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(
            log.summary(),
            "1 instruction value numbered, 2 instruction idealized"
        );
    }

    #[test]
    fn test_clone_and_merge() {
        let log = EventLog::new();
        log.error("bailout");
        let copy = log.clone();
        copy.merge(&log);
        assert_eq!(copy.len(), 2);
        assert!(EventKind::Error.is_diagnostic());
        assert!(!EventKind::BlockBuilt.is_transformation());
    }
}
