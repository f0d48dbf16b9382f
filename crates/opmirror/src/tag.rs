//! Version tag reconciliation
//!
//! Each operator's tag goes through `Unknown -> {Present, Absent}` on the
//! existence check and `Absent -> {Created, Failed}` on creation. `Present` is
//! terminal: an existing tag is never recreated or moved.

use std::fmt;

use crate::tools::{TagStore, ToolError};

/// Where a tag stands in reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Unknown,
    Absent,
    Present,
    Created,
    Failed,
}

impl fmt::Display for TagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagState::Unknown => "unknown",
            TagState::Absent => "absent",
            TagState::Present => "present",
            TagState::Created => "created",
            TagState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Drives one tag through its states against a [`TagStore`]
pub struct TagReconciler<'a> {
    store: &'a dyn TagStore,
    name: String,
    state: TagState,
}

impl<'a> TagReconciler<'a> {
    pub fn new(store: &'a dyn TagStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            state: TagState::Unknown,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TagState {
        self.state
    }

    /// Resolve `Unknown` into `Present` or `Absent`; other states are kept.
    pub fn check(&mut self) -> Result<TagState, ToolError> {
        if self.state != TagState::Unknown {
            return Ok(self.state);
        }
        match self.store.tag_exists(&self.name) {
            Ok(true) => self.state = TagState::Present,
            Ok(false) => self.state = TagState::Absent,
            Err(e) => {
                self.state = TagState::Failed;
                return Err(e);
            }
        }
        Ok(self.state)
    }

    /// Create the tag if it is absent, checking first when still unknown.
    pub fn create(&mut self) -> Result<TagState, ToolError> {
        if self.check()? != TagState::Absent {
            return Ok(self.state);
        }
        match self.store.create_tag(&self.name) {
            Ok(()) => self.state = TagState::Created,
            Err(e) => {
                self.state = TagState::Failed;
                return Err(e);
            }
        }
        Ok(self.state)
    }
}

/// Outcome of reconciling every operator's tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    /// Tags created by this run
    pub created: Vec<String>,

    /// Tags that already existed
    pub present: Vec<String>,
}

impl TagReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub(crate) fn record(&mut self, name: &str, state: TagState) {
        match state {
            TagState::Created => self.created.push(name.to_string()),
            TagState::Present => self.present.push(name.to_string()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeTags {
        tags: RefCell<BTreeSet<String>>,
        creates: RefCell<usize>,
        fail_check: bool,
        fail_create: bool,
    }

    fn failure(command: &str) -> ToolError {
        ToolError::Failed {
            command: command.to_string(),
            dir: PathBuf::from("/repo"),
            code: Some(128),
            stderr: Some("fatal: boom".to_string()),
        }
    }

    impl TagStore for FakeTags {
        fn tag_exists(&self, name: &str) -> Result<bool, ToolError> {
            if self.fail_check {
                return Err(failure("git show-ref"));
            }
            Ok(self.tags.borrow().contains(name))
        }

        fn create_tag(&self, name: &str) -> Result<(), ToolError> {
            if self.fail_create {
                return Err(failure("git tag"));
            }
            *self.creates.borrow_mut() += 1;
            self.tags.borrow_mut().insert(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_absent_tag_is_created_once() {
        let store = FakeTags::default();
        let mut tag = TagReconciler::new(&store, "mirrors/widgets/v1.0.0");

        assert_eq!(tag.state(), TagState::Unknown);
        assert_eq!(tag.create().unwrap(), TagState::Created);
        assert_eq!(tag.create().unwrap(), TagState::Created);
        assert_eq!(*store.creates.borrow(), 1);

        let mut again = TagReconciler::new(&store, "mirrors/widgets/v1.0.0");
        assert_eq!(again.check().unwrap(), TagState::Present);
    }

    #[test]
    fn test_present_tag_is_left_alone() {
        let store = FakeTags::default();
        store.tags.borrow_mut().insert("mirrors/widgets/v1.0.0".to_string());

        let mut tag = TagReconciler::new(&store, "mirrors/widgets/v1.0.0");
        assert_eq!(tag.create().unwrap(), TagState::Present);
        assert_eq!(*store.creates.borrow(), 0);
    }

    #[test]
    fn test_check_failure_moves_to_failed() {
        let store = FakeTags {
            fail_check: true,
            ..Default::default()
        };
        let mut tag = TagReconciler::new(&store, "t");

        let err = tag.create().unwrap_err();
        assert!(err.to_string().contains("fatal: boom"));
        assert_eq!(tag.state(), TagState::Failed);
        assert_eq!(*store.creates.borrow(), 0);
    }

    #[test]
    fn test_create_failure_moves_to_failed() {
        let store = FakeTags {
            fail_create: true,
            ..Default::default()
        };
        let mut tag = TagReconciler::new(&store, "t");

        assert!(tag.create().is_err());
        assert_eq!(tag.state(), TagState::Failed);
    }

    #[test]
    fn test_report_counts_created_only() {
        let mut report = TagReport::default();
        report.record("a", TagState::Created);
        report.record("b", TagState::Present);
        report.record("c", TagState::Absent);

        assert_eq!(report.created_count(), 1);
        assert_eq!(report.present, vec!["b".to_string()]);
    }
}
