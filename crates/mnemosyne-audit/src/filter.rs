//! Exclusion rules applied after sanitization.

use std::collections::HashSet;

use mnemosyne_core::{ActionCategory, ActionType, AuditEvent};

use crate::config::FilterConfig;
use crate::error::ConfigError;

/// A single compiled exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    /// Drop events in any of these categories
    ExcludeCategory(HashSet<ActionCategory>),
    /// Drop events with any of these action types
    ExcludeActionType(HashSet<ActionType>),
}

impl FilterRule {
    /// Compiles a configured rule, normalizing names to the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a listed name is not in the
    /// vocabulary.
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let invalid = |e: mnemosyne_core::ValidationError| ConfigError::Invalid {
            reason: format!("filter: {}", e.message),
        };

        Ok(match config {
            FilterConfig::ExcludeCategory { categories } => Self::ExcludeCategory(
                categories
                    .iter()
                    .map(|c| c.parse().map_err(invalid))
                    .collect::<Result<_, _>>()?,
            ),
            FilterConfig::ExcludeActionType { action_types } => Self::ExcludeActionType(
                action_types
                    .iter()
                    .map(|t| t.parse().map_err(invalid))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Returns true if the rule drops `event`.
    #[must_use]
    pub fn excludes(&self, event: &AuditEvent) -> bool {
        match self {
            Self::ExcludeCategory(categories) => categories.contains(&event.action.category),
            Self::ExcludeActionType(types) => types.contains(&event.action.action_type),
        }
    }
}

/// Ordered list of exclusion rules. An event matching any rule is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    rules: Vec<FilterRule>,
}

impl FilterChain {
    /// Compiles every configured rule.
    ///
    /// # Errors
    ///
    /// See [`FilterRule::from_config`].
    pub fn from_config(filters: &[FilterConfig]) -> Result<Self, ConfigError> {
        let rules = filters
            .iter()
            .map(FilterRule::from_config)
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    /// Returns the first rule that drops `event`, if any.
    #[must_use]
    pub fn matching_rule(&self, event: &AuditEvent) -> Option<&FilterRule> {
        self.rules.iter().find(|rule| rule.excludes(event))
    }

    /// Returns true if any rule drops `event`.
    #[must_use]
    pub fn excludes(&self, event: &AuditEvent) -> bool {
        self.matching_rule(event).is_some()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(category: ActionCategory, action_type: ActionType) -> AuditEvent {
        let mut event = AuditEvent::new();
        event.action.category = category;
        event.action.action_type = action_type;
        event
    }

    #[test]
    fn test_exclude_category_any_case() {
        let chain = FilterChain::from_config(&[FilterConfig::ExcludeCategory {
            categories: vec!["system".into()],
        }])
        .unwrap();

        assert!(chain.excludes(&event(ActionCategory::System, ActionType::Execute)));
        assert!(!chain.excludes(&event(ActionCategory::Database, ActionType::Execute)));
    }

    #[test]
    fn test_exclude_action_type() {
        let chain = FilterChain::from_config(&[FilterConfig::ExcludeActionType {
            action_types: vec!["READ".into(), "access".into()],
        }])
        .unwrap();

        assert!(chain.excludes(&event(ActionCategory::Api, ActionType::Read)));
        assert!(chain.excludes(&event(ActionCategory::Api, ActionType::Access)));
        assert!(!chain.excludes(&event(ActionCategory::Api, ActionType::Write)));
    }

    #[test]
    fn test_first_matching_rule_is_reported() {
        let chain = FilterChain::from_config(&[
            FilterConfig::ExcludeActionType {
                action_types: vec!["DELETE".into()],
            },
            FilterConfig::ExcludeCategory {
                categories: vec!["AUTH".into()],
            },
        ])
        .unwrap();

        let rule = chain
            .matching_rule(&event(ActionCategory::Auth, ActionType::Delete))
            .unwrap();
        assert!(matches!(rule, FilterRule::ExcludeActionType(_)));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_empty_chain_passes_everything() {
        let chain = FilterChain::default();
        assert!(chain.is_empty());
        assert!(!chain.excludes(&event(ActionCategory::System, ActionType::Execute)));
    }

    #[test]
    fn test_unknown_name_is_config_error() {
        let err = FilterChain::from_config(&[FilterConfig::ExcludeCategory {
            categories: vec!["DATABSE".into()],
        }])
        .unwrap_err();
        assert!(err.to_string().contains("DATABSE"));
    }
}
