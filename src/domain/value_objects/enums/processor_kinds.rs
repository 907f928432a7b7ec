use std::fmt::Display;

/// The payment provider configured for recurring billing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessorKind {
    #[default]
    Stripe,
    Local,
    /// A processor shipped as an external module, identified by its lower-cased name.
    External(String),
}

impl ProcessorKind {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "stripe" => ProcessorKind::Stripe,
            "local" => ProcessorKind::Local,
            other => ProcessorKind::External(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProcessorKind::Stripe => "stripe",
            ProcessorKind::Local => "local",
            ProcessorKind::External(name) => name.as_str(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ProcessorKind::External(_))
    }
}

impl Display for ProcessorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(ProcessorKind::from_str("Stripe"), ProcessorKind::Stripe);
        assert_eq!(ProcessorKind::from_str(" LOCAL "), ProcessorKind::Local);
        assert_eq!(
            ProcessorKind::from_str("ePayco"),
            ProcessorKind::External("epayco".to_string())
        );
    }

    #[test]
    fn defaults_to_stripe_when_unset() {
        assert_eq!(ProcessorKind::from_str(""), ProcessorKind::Stripe);
    }
}
