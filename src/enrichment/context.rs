//! Per-run state visible to stop conditions

use super::scope::ResourceScope;
use crate::model::{Photo, SourceData};

/// The photo, its source data and the scope of one run, plus the reason the
/// run was stopped, if it was.
#[derive(Debug)]
pub struct RunContext<'a> {
    photo: &'a mut Photo,
    source: &'a mut SourceData,
    scope: &'a ResourceScope,
    stop_reason: Option<String>,
}

impl<'a> RunContext<'a> {
    pub fn new(photo: &'a mut Photo, source: &'a mut SourceData, scope: &'a ResourceScope) -> Self {
        Self {
            photo,
            source,
            scope,
            stop_reason: None,
        }
    }

    pub fn photo(&self) -> &Photo {
        &*self.photo
    }

    pub fn source(&self) -> &SourceData {
        &*self.source
    }

    pub fn scope(&self) -> &ResourceScope {
        self.scope
    }

    /// Request that the run stop after the current step.
    ///
    /// The first reason sticks; later calls are ignored.
    pub fn stop(&mut self, reason: impl Into<String>) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason.into());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_reason.is_some()
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub(crate) fn take_stop_reason(&mut self) -> Option<String> {
        self.stop_reason.take()
    }

    /// Split borrow for executing a step.
    pub(crate) fn parts_mut(&mut self) -> (&mut Photo, &mut SourceData, &ResourceScope) {
        (&mut *self.photo, &mut *self.source, self.scope)
    }
}
