//! Log formatting helpers

use serde::Serialize;
use std::fmt::{self, Debug};

/// Renders a value as YAML inside tracing events.
///
/// ```ignore
/// tracing::debug!("loaded board {}", Pretty(&board));
/// ```
///
/// The YAML is preceded by a newline. Falls back to pretty `Debug` output if
/// serialization fails.
pub struct Pretty<T>(pub T);

impl<T: Serialize + Debug> fmt::Display for Pretty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_yaml_ng::to_string(&self.0) {
            Ok(yaml) => write!(f, "\n{}", yaml),
            Err(_) => write!(f, "\n{:#?}", self.0),
        }
    }
}

impl<T: Serialize + Debug> Debug for Pretty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoardId, Column, ColumnId};

    #[test]
    fn test_pretty_renders_yaml() {
        let column = Column::new(ColumnId::new(4), "Review").with_color("blue");
        let rendered = Pretty(&column).to_string();
        assert!(rendered.starts_with('\n'));
        assert!(rendered.contains("title: Review"));
        assert!(rendered.contains("color: blue"));
    }

    #[test]
    fn test_pretty_debug_matches_display() {
        let id = BoardId::new(2);
        assert_eq!(format!("{:?}", Pretty(id)), format!("{}", Pretty(id)));
    }
}
