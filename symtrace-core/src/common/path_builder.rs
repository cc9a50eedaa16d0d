//! Node-name building for extractors that track nesting while walking a tree.
//!
//! Inline modules join with `::`; the owning type or enclosing function of a
//! member joins with `.` (`outer.inner`, `Parser.parse`).

/// Implemented by extractors that track the current module and owner stack.
pub trait ModulePathBuilder {
    /// Current inline-module components.
    fn current_mod(&self) -> &[String];

    /// Current module path as a `::` separated string.
    fn build_module_path(&self) -> String {
        self.current_mod().join("::")
    }

    /// Node name for `name`, optionally owned by a type or enclosing function.
    fn build_node_name(&self, owner: Option<&str>, name: &str) -> String {
        let local = match owner {
            Some(owner) => format!("{}.{}", owner, name),
            None => name.to_string(),
        };
        if self.current_mod().is_empty() {
            local
        } else {
            format!("{}::{}", self.build_module_path(), local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestExtractor {
        current_mod: Vec<String>,
    }

    impl ModulePathBuilder for TestExtractor {
        fn current_mod(&self) -> &[String] {
            &self.current_mod
        }
    }

    #[test]
    fn test_build_module_path_nested() {
        let ext = TestExtractor {
            current_mod: vec!["api".to_string(), "v1".to_string()],
        };
        assert_eq!(ext.build_module_path(), "api::v1");
    }

    #[test]
    fn test_node_name_top_level() {
        let ext = TestExtractor { current_mod: vec![] };
        assert_eq!(ext.build_node_name(None, "process"), "process");
        assert_eq!(ext.build_node_name(Some("Parser"), "parse"), "Parser.parse");
    }

    #[test]
    fn test_node_name_inside_inline_module() {
        let ext = TestExtractor {
            current_mod: vec!["helpers".to_string()],
        };
        assert_eq!(ext.build_node_name(None, "trim"), "helpers::trim");
        assert_eq!(ext.build_node_name(Some("outer"), "inner"), "helpers::outer.inner");
    }
}
