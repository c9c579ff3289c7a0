//! Range-boundary validation
//!
//! Checks optional `before`/`after` identifiers before a run starts.
//! Pure: no side effects, no platform calls. Failures carry reasons
//! suitable for direct user display.

use crate::error::{Result, SweepError};
use crate::models::RunParameters;
use crate::snowflake::Snowflake;

/// Parse an optional raw boundary string into a snowflake
///
/// `which` names the parameter in the failure reason ("before"/"after").
pub fn parse_bound(raw: Option<&str>, which: &str) -> Result<Option<Snowflake>> {
    match raw {
        None => Ok(None),
        Some(value) => value.parse::<Snowflake>().map(Some).map_err(|_| {
            SweepError::Validation(format!(
                "{} parameter `{}` is not a valid snowflake",
                which,
                cap(value, 20)
            ))
        }),
    }
}

/// Reject bound pairs whose embedded creation times contradict each other
pub fn validate_order(before: Option<Snowflake>, after: Option<Snowflake>) -> Result<()> {
    if let (Some(before), Some(after)) = (before, after) {
        if after.timestamp_ms() > before.timestamp_ms() {
            return Err(SweepError::InvalidRange(format!(
                "after parameter `{}` cant be after before parameter `{}`",
                after, before
            )));
        }
    }
    Ok(())
}

/// Per-command-shape requirements on top of bound ordering
///
/// A destructive run must name a target user; a collecting-only run does
/// not have to.
pub fn validate_shape(params: &RunParameters) -> Result<()> {
    if params.effect.deletes() && params.user_id.is_none() {
        return Err(SweepError::Validation(
            "a delete run requires a target user".to_string(),
        ));
    }
    Ok(())
}

/// Full pre-run validation of a parameter set
pub fn validate(params: &RunParameters) -> Result<()> {
    validate_order(params.before, params.after)?;
    validate_shape(params)
}

/// Human-readable rendering of a bound pair for prompts and job listings
pub fn describe_bounds(before: Option<Snowflake>, after: Option<Snowflake>) -> String {
    match (before, after) {
        (Some(before), Some(after)) => format!("between {} and {}", after, before),
        (Some(before), None) => format!("before {}", before),
        (None, Some(after)) => format!("after {}", after),
        (None, None) => String::new(),
    }
}

fn cap(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Effect, UserRef};

    fn params(effect: Effect, user: Option<u64>) -> RunParameters {
        RunParameters {
            channel_id: Snowflake::from_raw(81384788765712384),
            user_id: user.map(Snowflake::from_raw),
            before: None,
            after: None,
            effect,
            authorizer: UserRef::new(Snowflake::from_raw(175928847299117063), "mod#0001"),
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let older = Snowflake::from_raw(1 << 22);
        let newer = Snowflake::from_raw(100 << 22);
        let result = validate_order(Some(older), Some(newer));
        assert!(matches!(result, Err(SweepError::InvalidRange(_))));
    }

    #[test]
    fn test_ordered_bounds_accepted() {
        let older = Snowflake::from_raw(1 << 22);
        let newer = Snowflake::from_raw(100 << 22);
        assert!(validate_order(Some(newer), Some(older)).is_ok());
        // equal timestamps are not inverted
        assert!(validate_order(Some(older), Some(older)).is_ok());
    }

    #[test]
    fn test_single_bound_always_ordered() {
        let id = Snowflake::from_raw(1 << 22);
        assert!(validate_order(Some(id), None).is_ok());
        assert!(validate_order(None, Some(id)).is_ok());
        assert!(validate_order(None, None).is_ok());
    }

    #[test]
    fn test_delete_requires_user() {
        let result = validate_shape(&params(Effect::Delete, None));
        assert!(matches!(result, Err(SweepError::Validation(_))));
        assert!(validate_shape(&params(Effect::Delete, Some(1 << 22))).is_ok());
        assert!(validate_shape(&params(Effect::DeleteAndCollect, None)).is_err());
    }

    #[test]
    fn test_collect_does_not_require_user() {
        assert!(validate_shape(&params(Effect::Collect, None)).is_ok());
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound(None, "before").unwrap(), None);
        assert!(parse_bound(Some("175928847299117063"), "before")
            .unwrap()
            .is_some());
        let err = parse_bound(Some("nope"), "after").unwrap_err();
        assert!(format!("{}", err).contains("after"));
    }

    #[test]
    fn test_describe_bounds() {
        let a = Snowflake::from_raw(1 << 22);
        let b = Snowflake::from_raw(100 << 22);
        assert_eq!(describe_bounds(None, None), "");
        assert!(describe_bounds(Some(b), None).starts_with("before"));
        assert!(describe_bounds(None, Some(a)).starts_with("after"));
        assert!(describe_bounds(Some(b), Some(a)).starts_with("between"));
    }
}
