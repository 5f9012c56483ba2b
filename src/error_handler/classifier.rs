//! Binary classifier (C5 step 1): an explicit allow-list or deny-list of
//! `ListenerError::kind()` values. Unclassified errors default to retry.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMode {
    AllowList,
    DenyList,
}

/// Decides whether a given listener-error kind is retriable.
pub struct ErrorClassifier {
    mode: ClassifierMode,
    kinds: HashSet<String>,
}

impl ErrorClassifier {
    pub fn allow_list(kinds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode: ClassifierMode::AllowList,
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn deny_list(kinds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode: ClassifierMode::DenyList,
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    /// `true` means "retry this error"; unclassified kinds always retry.
    pub fn is_retryable(&self, kind: &str) -> bool {
        match self.mode {
            ClassifierMode::AllowList => self.kinds.contains(kind),
            ClassifierMode::DenyList => !self.kinds.contains(kind),
        }
    }
}

impl Default for ErrorClassifier {
    /// Everything retries by default - the least surprising behavior when no
    /// classifier has been configured.
    fn default() -> Self {
        Self {
            mode: ClassifierMode::DenyList,
            kinds: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_only_retries_named_kinds() {
        let classifier = ErrorClassifier::allow_list(["IllegalStateException"]);
        assert!(classifier.is_retryable("IllegalStateException"));
        assert!(!classifier.is_retryable("ValidationError"));
    }

    #[test]
    fn deny_list_retries_everything_else() {
        let classifier = ErrorClassifier::deny_list(["ValidationError"]);
        assert!(!classifier.is_retryable("ValidationError"));
        assert!(classifier.is_retryable("IllegalStateException"));
    }

    #[test]
    fn default_classifier_retries_unclassified_errors() {
        assert!(ErrorClassifier::default().is_retryable("anything"));
    }
}
