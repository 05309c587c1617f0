use crate::error::{ApiError, ApiResult};

/// Single source of truth for closed string-valued sets (statuses, property
/// types). Each implementor lists its values once; parsing and rendering are
/// derived from that table.
pub trait ClosedEnum: Sized + Copy + PartialEq + 'static {
    const FIELD: &'static str;
    const VALUES: &'static [(&'static str, Self)];

    fn parse(raw: &str) -> ApiResult<Self> {
        Self::VALUES
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::VALUES.iter().map(|(name, _)| *name).collect();
                ApiError::Validation(format!(
                    "Invalid {}: '{}' (expected one of: {})",
                    Self::FIELD,
                    raw,
                    allowed.join(", ")
                ))
            })
    }

    fn as_str(self) -> &'static str {
        Self::VALUES
            .iter()
            .find(|(_, v)| *v == self)
            .map(|(name, _)| *name)
            .unwrap_or(Self::VALUES[0].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Fruit {
        Apple,
        Pear,
    }

    impl ClosedEnum for Fruit {
        const FIELD: &'static str = "fruit";
        const VALUES: &'static [(&'static str, Self)] =
            &[("apple", Fruit::Apple), ("pear", Fruit::Pear)];
    }

    #[test]
    fn parse_accepts_members() {
        assert_eq!(Fruit::parse("apple").unwrap(), Fruit::Apple);
        assert_eq!(Fruit::parse("pear").unwrap(), Fruit::Pear);
    }

    #[test]
    fn parse_rejects_non_members_naming_the_field() {
        let err = Fruit::parse("banana").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fruit"));
        assert!(msg.contains("banana"));
        assert!(msg.contains("apple, pear"));
    }

    #[test]
    fn as_str_round_trips() {
        assert_eq!(Fruit::Apple.as_str(), "apple");
        assert_eq!(Fruit::parse(Fruit::Pear.as_str()).unwrap(), Fruit::Pear);
    }
}
