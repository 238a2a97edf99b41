//! Activity trace rendering.
//!
//! A test run's `activityLogs` are turned into a labeled tree rooted at a
//! synthetic `Activities` node, then drawn with box-drawing connectors:
//!
//! ```text
//! Activities
//! ├── Launch (5.00s)
//! │   ├── Attachment: screenshot
//! │   └── Tap button (3.00s)
//! └── Teardown (7.50s)
//! ```
//!
//! Each activity label carries the time from the first activity's start to
//! that activity's finish. Attachments precede sub-activities under their
//! owning activity; input order is otherwise preserved.

use std::fmt;

use crate::types::TestActivity;

const ROOT_LABEL: &str = "Activities";

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// A rendered node: a label and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTree {
    label: String,
    children: Vec<ActivityTree>,
}

impl ActivityTree {
    /// Build the tree for `activities`. Elapsed times are measured from
    /// `activities[0].start`; an empty slice yields a bare root.
    pub fn build(activities: &[TestActivity]) -> Self {
        let origin = activities.first().map(|a| a.start).unwrap_or_default();
        Self {
            label: ROOT_LABEL.to_string(),
            children: activities
                .iter()
                .map(|activity| Self::activity_node(activity, origin))
                .collect(),
        }
    }

    fn activity_node(activity: &TestActivity, origin: f64) -> Self {
        let attachments = activity.attachments.iter().map(|attachment| Self {
            label: format!("Attachment: {}", attachment.name),
            children: vec![],
        });
        let sub_activities = activity
            .sub_activities
            .iter()
            .map(|sub| Self::activity_node(sub, origin));

        Self {
            label: format!("{} ({:.2}s)", activity.name, activity.finish - origin),
            children: attachments.chain(sub_activities).collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn children(&self) -> &[ActivityTree] {
        &self.children
    }

    fn write_children(&self, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let connector = if last { LAST_BRANCH } else { BRANCH };
            write!(f, "\n{prefix}{connector}{}", child.label)?;

            let continuation = if last { SPACE } else { PIPE };
            child.write_children(f, &format!("{prefix}{continuation}"))?;
        }
        Ok(())
    }
}

impl fmt::Display for ActivityTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)?;
        self.write_children(f, "")
    }
}

/// Render `activities` as a multi-line tree (no trailing newline).
pub fn human_format_activities(activities: &[TestActivity]) -> String {
    ActivityTree::build(activities).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
