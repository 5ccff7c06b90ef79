//! TaskType - coarse task buckets used by the learner.
//!
//! Classification is a keyword cascade over the description. The order of
//! [`CASCADE`] is the precedence when several buckets match: "fix security
//! vulnerability" is `security`, not `bugfix`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Documentation,
    Security,
    Optimization,
    Refactoring,
    Testing,
    Bugfix,
    Api,
    Frontend,
    Backend,
    Feature,
    General,
}

impl TaskCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskCategory::Documentation => "documentation",
            TaskCategory::Security => "security",
            TaskCategory::Optimization => "optimization",
            TaskCategory::Refactoring => "refactoring",
            TaskCategory::Testing => "testing",
            TaskCategory::Bugfix => "bugfix",
            TaskCategory::Api => "api",
            TaskCategory::Frontend => "frontend",
            TaskCategory::Backend => "backend",
            TaskCategory::Feature => "feature",
            TaskCategory::General => "general",
        }
    }

    /// Classify a free-text task description.
    pub fn classify(description: &str) -> Self {
        let lowered = description.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|t| !t.is_empty())
            .collect();

        CASCADE
            .iter()
            .find(|rule| rule.matches(&lowered, &tokens))
            .map(|rule| rule.category)
            .unwrap_or(TaskCategory::General)
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the cascade.
struct CategoryRule {
    category: TaskCategory,
    /// Whole-token matches.
    words: &'static [&'static str],
    /// Token prefixes ("refactor" matches "refactoring").
    stems: &'static [&'static str],
    /// Multi-word substrings.
    phrases: &'static [&'static str],
}

impl CategoryRule {
    fn matches(&self, lowered: &str, tokens: &[&str]) -> bool {
        tokens.iter().any(|t| self.words.contains(t))
            || tokens
                .iter()
                .any(|t| self.stems.iter().any(|stem| t.starts_with(stem)))
            || self.phrases.iter().any(|p| lowered.contains(p))
    }
}

const CASCADE: &[CategoryRule] = &[
    CategoryRule {
        category: TaskCategory::Documentation,
        words: &["doc", "docs", "readme", "changelog", "docstring", "docstrings", "guide"],
        stems: &["document"],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Security,
        words: &["security", "secure", "auth", "xss", "csrf", "cve", "injection", "permissions"],
        stems: &["vulnerab", "authenticat", "authoriz", "encrypt", "sanitiz"],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Optimization,
        words: &["cache", "caching", "faster", "slow", "speed"],
        stems: &["optimi", "performan", "latenc", "throughput"],
        phrases: &["speed up", "memory usage"],
    },
    CategoryRule {
        category: TaskCategory::Refactoring,
        words: &["cleanup"],
        stems: &["refactor", "restructur", "reorganiz", "simplif"],
        phrases: &["clean up"],
    },
    CategoryRule {
        category: TaskCategory::Testing,
        words: &["test", "tests", "testing", "coverage", "e2e", "unittest"],
        stems: &[],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Bugfix,
        words: &["bug", "bugs", "error", "errors", "crash", "crashes", "broken", "regression"],
        stems: &["fix", "bugfix"],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Api,
        words: &["api", "apis", "endpoint", "endpoints", "rest", "graphql", "route", "routes", "webhook"],
        stems: &[],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Frontend,
        words: &[
            "frontend", "front-end", "ui", "ux", "css", "styling", "style", "styles",
            "component", "components", "react", "layout", "button", "page",
        ],
        stems: &[],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Backend,
        words: &[
            "backend", "back-end", "database", "db", "migration", "migrations", "server",
            "sql", "schema", "queue", "worker",
        ],
        stems: &[],
        phrases: &[],
    },
    CategoryRule {
        category: TaskCategory::Feature,
        words: &["feature", "features", "implement", "add", "new", "create", "support"],
        stems: &[],
        phrases: &[],
    },
];
