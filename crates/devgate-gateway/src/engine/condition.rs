use std::fmt;

/// AMQP error condition symbols used when rejecting links
pub mod conditions {
    pub const NOT_FOUND: &str = "amqp:not-found";
    pub const UNAUTHORIZED_ACCESS: &str = "amqp:unauthorized-access";
    pub const INVALID_FIELD: &str = "amqp:invalid-field";
}

/// Condition attached to a link before it is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCondition {
    pub condition: &'static str,
    pub description: String,
}

impl ErrorCondition {
    pub fn new(condition: &'static str, description: impl Into<String>) -> Self {
        Self {
            condition,
            description: description.into(),
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(conditions::NOT_FOUND, description)
    }

    pub fn unauthorized_access(description: impl Into<String>) -> Self {
        Self::new(conditions::UNAUTHORIZED_ACCESS, description)
    }

    pub fn invalid_field(description: impl Into<String>) -> Self {
        Self::new(conditions::INVALID_FIELD, description)
    }
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.condition, self.description)
    }
}
