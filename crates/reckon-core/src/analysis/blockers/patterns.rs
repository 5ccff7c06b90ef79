//! Blocker pattern table.
//!
//! Rows are consulted in table order within each detection pass. A custom
//! table (see [`BlockerPatternSpec`]) replaces the built-in one entirely.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{BlockerSeverity, BlockerType};

/// Serializable form of a pattern row, as supplied by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerPatternSpec {
    pub name: String,
    /// Regular expression matched against `"{type} {message}"` of an error,
    /// or against the agent feedback.
    pub pattern: String,
    pub blocker_type: BlockerType,
    pub description: String,
    #[serde(default)]
    pub needs_human: bool,
    #[serde(default = "default_row_severity")]
    pub severity: BlockerSeverity,
    #[serde(default)]
    pub solutions: Vec<String>,
}

fn default_row_severity() -> BlockerSeverity {
    BlockerSeverity::Medium
}

/// A compiled pattern row.
#[derive(Debug, Clone)]
pub struct BlockerPattern {
    pub name: String,
    pub regex: Regex,
    pub blocker_type: BlockerType,
    pub description: String,
    pub needs_human: bool,
    pub severity: BlockerSeverity,
    pub solutions: Vec<String>,
}

impl BlockerPattern {
    pub fn compile(spec: BlockerPatternSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&spec.pattern)?,
            name: spec.name,
            blocker_type: spec.blocker_type,
            description: spec.description,
            needs_human: spec.needs_human,
            severity: spec.severity,
            solutions: spec.solutions,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

struct Row {
    name: &'static str,
    pattern: &'static str,
    blocker_type: BlockerType,
    description: &'static str,
    needs_human: bool,
    severity: BlockerSeverity,
    solutions: &'static [&'static str],
}

const DEFAULT_ROWS: &[Row] = &[
    Row {
        name: "missing_dependency",
        pattern: r"(?i)(cannot find module|module not found|no module named|unresolved import|could not resolve|cannot find crate|package \S+ (is )?not found|missing dependency)",
        blocker_type: BlockerType::Dependency,
        description: "Missing dependency",
        needs_human: false,
        severity: BlockerSeverity::Medium,
        solutions: &[
            "Install the missing package",
            "Check the import path and package name",
            "Declare the dependency in the project manifest",
        ],
    },
    Row {
        name: "circular_dependency",
        pattern: r"(?i)(circular (dependency|import|reference)|cyclic dependency|dependency cycle|import cycle)",
        blocker_type: BlockerType::Dependency,
        description: "Circular dependency",
        needs_human: false,
        severity: BlockerSeverity::Critical,
        solutions: &[
            "Extract the shared code into a separate module",
            "Invert one of the dependencies behind an interface",
        ],
    },
    Row {
        name: "version_conflict",
        pattern: r"(?i)(version conflict|incompatible version|version mismatch|peer dep|conflicting (requirements|versions)|requires \S+ version)",
        blocker_type: BlockerType::Dependency,
        description: "Dependency version conflict",
        needs_human: false,
        severity: BlockerSeverity::Medium,
        solutions: &[
            "Align the conflicting package versions",
            "Pin a version compatible with every dependent",
        ],
    },
    Row {
        name: "external_service",
        pattern: r"(?i)(econnrefused|connection refused|connection reset|timed? ?out|service unavailable|\b50[234]\b|rate limit|network error|getaddrinfo|\bdns\b)",
        blocker_type: BlockerType::External,
        description: "External service unavailable",
        needs_human: false,
        severity: BlockerSeverity::Medium,
        solutions: &[
            "Retry after checking that the service is reachable",
            "Mock the external service for local work",
        ],
    },
    Row {
        name: "auth_permission",
        pattern: r"(?i)(unauthori[sz]ed|forbidden|\b40[13]\b|permission denied|access denied|eacces|invalid (api )?key|missing credentials|authentication failed)",
        blocker_type: BlockerType::External,
        description: "Missing credentials or permission",
        needs_human: true,
        severity: BlockerSeverity::High,
        solutions: &[
            "Ask a human to provide the required credentials",
            "Request the missing access rights",
        ],
    },
    Row {
        name: "resource_exhaustion",
        pattern: r"(?i)(out of memory|heap (out of memory|exhausted)|stack overflow|maximum call stack|allocation failed)",
        blocker_type: BlockerType::Technical,
        description: "Memory or stack exhaustion",
        needs_human: false,
        severity: BlockerSeverity::Critical,
        solutions: &[
            "Look for unbounded recursion or loops",
            "Reduce the size of the data processed at once",
        ],
    },
    Row {
        name: "type_or_compile_error",
        pattern: r"(?i)(type ?error|syntax ?error|mismatched types|is not assignable|cannot assign|expected \S+,? found|compil(e|ation) (error|failed)|undefined is not)",
        blocker_type: BlockerType::Technical,
        description: "Type or compilation error",
        needs_human: false,
        severity: BlockerSeverity::Low,
        solutions: &[
            "Read the reported location and fix the type mismatch",
            "Check the signatures of the functions involved",
        ],
    },
    Row {
        name: "unclear_requirement",
        pattern: r"(?i)(unclear|ambiguous|not sure what|unsure (what|whether|how|if)|needs? clarification|clarify|conflicting requirements?|contradict)",
        blocker_type: BlockerType::UnclearRequirement,
        description: "Unclear requirement",
        needs_human: true,
        severity: BlockerSeverity::Medium,
        solutions: &[
            "Ask the task owner to clarify the requirement",
            "Write down the assumption and confirm it",
        ],
    },
    Row {
        name: "knowledge_gap",
        pattern: r"(?i)(don'?t know how|not familiar|unfamiliar with|no documentation|undocumented|need an? example|cannot figure out|can'?t figure out)",
        blocker_type: BlockerType::KnowledgeGap,
        description: "Knowledge gap",
        needs_human: false,
        severity: BlockerSeverity::Low,
        solutions: &[
            "Search the codebase for a similar implementation",
            "Read the library documentation or examples",
        ],
    },
];

/// The built-in table as serializable rows.
pub fn default_pattern_specs() -> Vec<BlockerPatternSpec> {
    DEFAULT_ROWS
        .iter()
        .map(|row| BlockerPatternSpec {
            name: row.name.to_string(),
            pattern: row.pattern.to_string(),
            blocker_type: row.blocker_type,
            description: row.description.to_string(),
            needs_human: row.needs_human,
            severity: row.severity,
            solutions: row.solutions.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

static DEFAULT_PATTERNS: LazyLock<Vec<BlockerPattern>> = LazyLock::new(|| {
    default_pattern_specs()
        .into_iter()
        .map(|spec| BlockerPattern::compile(spec).expect("built-in blocker pattern"))
        .collect()
});

pub fn default_patterns() -> Vec<BlockerPattern> {
    DEFAULT_PATTERNS.clone()
}
