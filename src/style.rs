//! Component style installation.
//!
//! Styles are plain CSS strings declared on a class. The `:host` token
//! stands for the component's tag selector and is substituted at install
//! time. The "document head" here is an in-memory ordered list so tests can
//! inspect what got installed.

use indexmap::IndexSet;
use std::cell::RefCell;

#[derive(Default)]
pub struct StyleSheets {
    /// Installed rules in install order.
    head: RefCell<Vec<String>>,
    /// Dedupe key: (tag, raw css). A subclass chain re-installing the same
    /// source under the same tag is a no-op.
    installed: RefCell<IndexSet<(String, String)>>,
}

impl StyleSheets {
    /// Installs `css` for the component `tag`, once per distinct
    /// (tag, content) pair. Returns whether anything was added.
    pub fn install(&self, tag: &str, css: &str) -> bool {
        let key = (tag.to_string(), css.to_string());
        if !self.installed.borrow_mut().insert(key) {
            return false;
        }
        let rule = css.replace(":host", tag);
        self.head.borrow_mut().push(rule);
        true
    }

    /// The installed rules, in order.
    pub fn rules(&self) -> Vec<String> {
        self.head.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_token_is_substituted() {
        let sheets = StyleSheets::default();
        sheets.install("x-button", ":host { color: red; } :host:hover { color: blue; }");
        assert_eq!(
            sheets.rules(),
            vec!["x-button { color: red; } x-button:hover { color: blue; }"]
        );
    }

    #[test]
    fn identical_content_installs_once_per_tag() {
        let sheets = StyleSheets::default();
        assert!(sheets.install("x-button", ":host { color: red; }"));
        assert!(!sheets.install("x-button", ":host { color: red; }"));
        // Same source under a different tag is a distinct rule.
        assert!(sheets.install("x-fancy-button", ":host { color: red; }"));
        assert_eq!(sheets.rules().len(), 2);
    }
}
