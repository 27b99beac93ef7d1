use serde::Serialize;

const BYTES_PER_MB: u64 = 1024 * 1024;

pub const DEFAULT_MAX_MB: u64 = 5;
pub const DEFAULT_ACCEPT: &str = "application/pdf,.doc,.docx";

/// One entry of an accept list: either an exact media type or a filename suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TypeMatcher {
    MediaType(String),
    Extension(String),
}

impl TypeMatcher {
    /// Entries starting with `.` are suffixes, everything else is a media type.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.starts_with('.') {
            Some(TypeMatcher::Extension(raw.to_string()))
        } else {
            Some(TypeMatcher::MediaType(raw.to_string()))
        }
    }

    pub fn accepts(&self, file_name: &str, media_type: &str) -> bool {
        match self {
            TypeMatcher::Extension(suffix) => file_name
                .to_lowercase()
                .ends_with(&suffix.to_lowercase()),
            TypeMatcher::MediaType(expected) => media_type == expected,
        }
    }
}

/// Size and type limits applied by the intake gate.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationPolicy {
    pub max_bytes: u64,
    pub accepted: Vec<TypeMatcher>,
}

impl ValidationPolicy {
    pub fn new(max_bytes: u64, accepted: Vec<TypeMatcher>) -> Self {
        Self {
            max_bytes,
            accepted,
        }
    }

    /// Builds a policy from a megabyte limit and a comma-separated accept string
    /// such as `application/pdf,.doc,.docx`. `None` when the limit does not fit
    /// in bytes.
    pub fn from_accept(max_mb: u64, accept: &str) -> Option<Self> {
        let max_bytes = max_mb.checked_mul(BYTES_PER_MB)?;
        Some(Self::new(max_bytes, parse_accept(accept)))
    }

    pub fn accepts_type(&self, file_name: &str, media_type: &str) -> bool {
        self.accepted
            .iter()
            .any(|m| m.accepts(file_name, media_type))
    }

    /// Human-readable limit used in rejection messages: `5MB`, or `1.50MB`
    /// when the limit is not a whole number of megabytes.
    pub fn limit_label(&self) -> String {
        if self.max_bytes % BYTES_PER_MB == 0 {
            format!("{}MB", self.max_bytes / BYTES_PER_MB)
        } else {
            format!("{:.2}MB", self.max_bytes as f64 / BYTES_PER_MB as f64)
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MB * BYTES_PER_MB, parse_accept(DEFAULT_ACCEPT))
    }
}

fn parse_accept(accept: &str) -> Vec<TypeMatcher> {
    accept.split(',').filter_map(TypeMatcher::parse).collect()
}
