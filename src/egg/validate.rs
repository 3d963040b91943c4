//! Validation DSL for egg variable `rules` strings.
//!
//! Pipe-separated tokens: `required`, `nullable`, `string`, `numeric`,
//! `min:n`, `max:n`, `between:a,b`, `in:v1,v2,…`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("value is required")]
    Required,
    #[error("value must be numeric")]
    NotNumeric,
    #[error("value must be at least {0}")]
    Min(i64),
    #[error("value must be at most {0}")]
    Max(i64),
    #[error("value must be between {0} and {1}")]
    Between(i64, i64),
    #[error("value must be one of: {0}")]
    NotInSet(String),
}

/// Evaluate a pipe-separated rules string against a single value.
///
/// `value` is `None` when the variable was left unset and has no default.
pub fn validate(rules: &str, value: Option<&str>) -> Result<(), RuleViolation> {
    let tokens: Vec<&str> = rules.split('|').map(|t| t.trim()).filter(|t| !t.is_empty()).collect();

    let nullable = tokens.iter().any(|t| *t == "nullable");
    let required = tokens.iter().any(|t| *t == "required");

    let value = match value.filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            if required {
                return Err(RuleViolation::Required);
            }
            return Ok(());
        }
    };

    if nullable && value.is_empty() {
        return Ok(());
    }

    for token in &tokens {
        if let Some(rest) = token.strip_prefix("min:") {
            let min: i64 = rest.parse().unwrap_or(i64::MIN);
            let n: i64 = value.parse().map_err(|_| RuleViolation::NotNumeric)?;
            if n < min {
                return Err(RuleViolation::Min(min));
            }
        } else if let Some(rest) = token.strip_prefix("max:") {
            let max: i64 = rest.parse().unwrap_or(i64::MAX);
            let n: i64 = value.parse().map_err(|_| RuleViolation::NotNumeric)?;
            if n > max {
                return Err(RuleViolation::Max(max));
            }
        } else if let Some(rest) = token.strip_prefix("between:") {
            let mut parts = rest.splitn(2, ',');
            let lo: i64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(i64::MIN);
            let hi: i64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(i64::MAX);
            let n: i64 = value.parse().map_err(|_| RuleViolation::NotNumeric)?;
            if n < lo || n > hi {
                return Err(RuleViolation::Between(lo, hi));
            }
        } else if let Some(rest) = token.strip_prefix("in:") {
            let allowed: Vec<&str> = rest.split(',').collect();
            if !allowed.contains(&value) {
                return Err(RuleViolation::NotInSet(rest.to_string()));
            }
        } else if *token == "numeric" {
            value.parse::<f64>().map_err(|_| RuleViolation::NotNumeric)?;
        }
        // "string", "required", "nullable" carry no further check here
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing() {
        assert_eq!(validate("required", None), Err(RuleViolation::Required));
    }

    #[test]
    fn nullable_allows_missing() {
        assert!(validate("nullable", None).is_ok());
    }

    #[test]
    fn numeric_rejects_non_numbers() {
        assert_eq!(validate("numeric", Some("abc")), Err(RuleViolation::NotNumeric));
        assert!(validate("numeric", Some("42")).is_ok());
    }

    #[test]
    fn min_max_between() {
        assert_eq!(validate("min:10", Some("5")), Err(RuleViolation::Min(10)));
        assert!(validate("min:10", Some("10")).is_ok());
        assert_eq!(validate("max:10", Some("11")), Err(RuleViolation::Max(10)));
        assert!(validate("between:1,5", Some("3")).is_ok());
        assert_eq!(validate("between:1,5", Some("9")), Err(RuleViolation::Between(1, 5)));
    }

    #[test]
    fn in_set() {
        assert!(validate("in:a,b,c", Some("b")).is_ok());
        assert!(validate("in:a,b,c", Some("z")).is_err());
    }

    #[test]
    fn combined_rules() {
        assert!(validate("required|numeric|between:1,64", Some("8")).is_ok());
        assert!(validate("required|numeric|between:1,64", Some("100")).is_err());
    }
}
