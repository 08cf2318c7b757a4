//! Formatting cultures passed around as explicit context.
//!
//! There is no ambient "current culture": code that formats numbers or dates
//! receives a [`CultureContext`] (or a [`Culture`]) and a [`CultureScope`]
//! temporarily swaps the context's culture, restoring it when dropped.

use crate::errors::{CoreError, Result};
use chrono::{NaiveDate, NaiveTime};
use std::ops::{Deref, DerefMut};

/// Number and date conventions for one language/region.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Culture {
    name: &'static str,
    decimal_separator: char,
    group_separator: Option<char>,
    date_pattern: &'static str,
    time_pattern: &'static str,
}

const CULTURES: &[Culture] = &[
    Culture {
        name: "invariant",
        decimal_separator: '.',
        group_separator: Some(','),
        date_pattern: "%m/%d/%Y",
        time_pattern: "%H:%M:%S",
    },
    Culture {
        name: "en-US",
        decimal_separator: '.',
        group_separator: Some(','),
        date_pattern: "%-m/%-d/%Y",
        time_pattern: "%-I:%M:%S %p",
    },
    Culture {
        name: "en-GB",
        decimal_separator: '.',
        group_separator: Some(','),
        date_pattern: "%d/%m/%Y",
        time_pattern: "%H:%M:%S",
    },
    Culture {
        name: "de-DE",
        decimal_separator: ',',
        group_separator: Some('.'),
        date_pattern: "%d.%m.%Y",
        time_pattern: "%H:%M:%S",
    },
    Culture {
        name: "fr-FR",
        decimal_separator: ',',
        group_separator: Some('\u{202f}'),
        date_pattern: "%d/%m/%Y",
        time_pattern: "%H:%M:%S",
    },
    Culture {
        name: "ja-JP",
        decimal_separator: '.',
        group_separator: Some(','),
        date_pattern: "%Y/%m/%d",
        time_pattern: "%H:%M:%S",
    },
];

impl Culture {
    /// The culture-neutral conventions.
    pub fn invariant() -> Self {
        CULTURES[0].clone()
    }

    /// Finds a culture by name.
    ///
    /// Accepts BCP 47 style (`de-DE`) and POSIX style (`de_DE.UTF-8`) names,
    /// case-insensitively. `C`, `POSIX` and the empty string map to the
    /// invariant culture.
    pub fn lookup(name: &str) -> Result<Self> {
        let normalized = normalize_name(name);
        if normalized.is_empty()
            || normalized.eq_ignore_ascii_case("c")
            || normalized.eq_ignore_ascii_case("posix")
        {
            return Ok(Self::invariant());
        }
        CULTURES
            .iter()
            .find(|culture| culture.name.eq_ignore_ascii_case(&normalized))
            .cloned()
            .ok_or_else(|| CoreError::UnknownCulture(name.to_string()))
    }

    /// Names of every built-in culture.
    pub fn available() -> impl Iterator<Item = &'static str> {
        CULTURES.iter().map(|culture| culture.name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    pub fn is_invariant(&self) -> bool {
        self.name == CULTURES[0].name
    }

    /// Formats `value` with `decimals` fractional digits and grouped thousands.
    pub fn format_number(&self, value: f64, decimals: usize) -> String {
        let raw = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match raw.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (raw.as_str(), None),
        };

        let mut out = String::with_capacity(raw.len() + raw.len() / 3 + 1);
        if value.is_sign_negative() && raw.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.push('-');
        }
        let digits = int_part.len();
        for (idx, digit) in int_part.chars().enumerate() {
            if idx > 0 && (digits - idx) % 3 == 0 {
                if let Some(separator) = self.group_separator {
                    out.push(separator);
                }
            }
            out.push(digit);
        }
        if let Some(frac_part) = frac_part {
            out.push(self.decimal_separator);
            out.push_str(frac_part);
        }
        out
    }

    /// Parses a number written in this culture's conventions.
    pub fn parse_number(&self, text: &str) -> Result<f64> {
        let mut canonical = String::with_capacity(text.len());
        for c in text.trim().chars() {
            if Some(c) == self.group_separator {
                continue;
            } else if c == self.decimal_separator {
                canonical.push('.');
            } else {
                canonical.push(c);
            }
        }
        canonical.parse::<f64>().map_err(|_| {
            CoreError::invalid_argument(format!(
                "'{text}' is not a number in culture {}",
                self.name
            ))
        })
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(self.date_pattern).to_string()
    }

    pub fn format_time(&self, time: NaiveTime) -> String {
        time.format(self.time_pattern).to_string()
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

impl std::fmt::Display for Culture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

fn normalize_name(name: &str) -> String {
    let name = name.trim();
    let name = name.split(['.', '@']).next().unwrap_or_default();
    name.replace('_', "-")
}

/// The culture in effect for a unit of work.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CultureContext {
    current: Culture,
}

impl CultureContext {
    pub fn new(current: Culture) -> Self {
        Self { current }
    }

    /// Builds a context from `LC_ALL`, `LC_MESSAGES` and `LANG`, in that order.
    ///
    /// Unknown or missing locales fall back to the invariant culture.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`CultureContext::from_env`], reading variables through `lookup`.
    ///
    /// Empty values are skipped as if unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .into_iter()
            .find_map(|key| lookup(key).filter(|value| !value.is_empty()));
        let Some(locale) = locale else {
            return Self::default();
        };
        match Culture::lookup(&locale) {
            Ok(culture) => Self::new(culture),
            Err(_) => {
                tracing::debug!(locale = %locale, "unknown locale, using invariant culture");
                Self::default()
            }
        }
    }

    pub fn current(&self) -> &Culture {
        &self.current
    }

    /// Switches to `culture` until the returned scope is dropped.
    pub fn scope(&mut self, culture: Culture) -> CultureScope<'_> {
        let previous = std::mem::replace(&mut self.current, culture);
        tracing::trace!(from = previous.name, to = self.current.name, "entered culture scope");
        CultureScope {
            context: self,
            previous: Some(previous),
        }
    }

    /// Runs `f` with the named culture in effect, restoring the original afterwards.
    pub fn with_culture<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&CultureContext) -> T,
    ) -> Result<T> {
        let culture = Culture::lookup(name)?;
        let scope = self.scope(culture);
        Ok(f(&*scope))
    }
}

/// Guard that restores the previous culture of a [`CultureContext`] on drop.
#[derive(Debug)]
pub struct CultureScope<'a> {
    context: &'a mut CultureContext,
    previous: Option<Culture>,
}

impl CultureScope<'_> {
    /// The culture that will be restored.
    pub fn previous(&self) -> Option<&Culture> {
        self.previous.as_ref()
    }
}

impl Deref for CultureScope<'_> {
    type Target = CultureContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for CultureScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for CultureScope<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            tracing::trace!(restored = previous.name, "left culture scope");
            self.context.current = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_posix_names() {
        assert_eq!(Culture::lookup("de_DE.UTF-8").unwrap().name(), "de-DE");
        assert_eq!(Culture::lookup("en-gb").unwrap().name(), "en-GB");
        assert!(Culture::lookup("C").unwrap().is_invariant());
        assert!(matches!(Culture::lookup("xx-YY"), Err(CoreError::UnknownCulture(_))));
    }

    #[test]
    fn numbers_follow_culture() {
        let de = Culture::lookup("de-DE").unwrap();
        let us = Culture::lookup("en-US").unwrap();
        assert_eq!(de.format_number(1234567.891, 2), "1.234.567,89");
        assert_eq!(us.format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(us.format_number(-12.4, 0), "-12");
        assert_eq!(us.format_number(-0.001, 1), "0.0");
        assert_eq!(us.format_number(999.0, 0), "999");
        assert_eq!(de.parse_number("1.234,5").unwrap(), 1234.5);
        assert!(de.parse_number("abc").is_err());
    }

    #[test]
    fn dates_follow_culture() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Culture::lookup("de-DE").unwrap().format_date(date), "09.03.2024");
        assert_eq!(Culture::lookup("en-US").unwrap().format_date(date), "3/9/2024");
        assert_eq!(Culture::lookup("ja-JP").unwrap().format_date(date), "2024/03/09");

        let time = NaiveTime::from_hms_opt(14, 5, 0).unwrap();
        assert_eq!(Culture::lookup("en-US").unwrap().format_time(time), "2:05:00 PM");
    }

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn locale_variables_are_read_in_priority_order() {
        let all = [("LANG", "en_US.UTF-8"), ("LC_MESSAGES", "fr_FR"), ("LC_ALL", "de_DE.UTF-8")];
        assert_eq!(CultureContext::from_lookup(vars(&all)).current().name(), "de-DE");

        let no_lc_all = [("LANG", "en_US.UTF-8"), ("LC_MESSAGES", "fr_FR")];
        assert_eq!(CultureContext::from_lookup(vars(&no_lc_all)).current().name(), "fr-FR");

        let empty_skipped = [("LC_ALL", ""), ("LC_MESSAGES", ""), ("LANG", "ja_JP.UTF-8")];
        assert_eq!(CultureContext::from_lookup(vars(&empty_skipped)).current().name(), "ja-JP");
    }

    #[test]
    fn unknown_or_missing_locale_falls_back_to_invariant() {
        let unknown = [("LC_ALL", "tlh_QO.UTF-8"), ("LANG", "en_US.UTF-8")];
        assert!(CultureContext::from_lookup(vars(&unknown)).current().is_invariant());
        assert!(CultureContext::from_lookup(vars(&[])).current().is_invariant());
        assert!(CultureContext::from_lookup(vars(&[("LANG", "C")])).current().is_invariant());
    }

    #[test]
    fn scope_restores_on_drop() {
        let mut context = CultureContext::new(Culture::lookup("en-GB").unwrap());
        {
            let scope = context.scope(Culture::lookup("fr-FR").unwrap());
            assert_eq!(scope.current().name(), "fr-FR");
            assert_eq!(scope.previous().map(Culture::name), Some("en-GB"));
        }
        assert_eq!(context.current().name(), "en-GB");
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let mut context = CultureContext::default();
        {
            let mut outer = context.scope(Culture::lookup("de-DE").unwrap());
            {
                let inner = outer.scope(Culture::lookup("ja-JP").unwrap());
                assert_eq!(inner.current().name(), "ja-JP");
            }
            assert_eq!(outer.current().name(), "de-DE");
        }
        assert!(context.current().is_invariant());
    }

    #[test]
    fn with_culture_restores_after_early_return() {
        fn first_negative(context: &CultureContext, values: &[f64]) -> Option<String> {
            for value in values {
                if *value < 0.0 {
                    return Some(context.current().format_number(*value, 1));
                }
            }
            None
        }

        let mut context = CultureContext::default();
        let found = context
            .with_culture("de-DE", |ctx| first_negative(ctx, &[1.0, -2.5, 3.0]))
            .unwrap();
        assert_eq!(found.as_deref(), Some("-2,5"));
        assert!(context.current().is_invariant());

        assert!(context.with_culture("tlh", |_| ()).is_err());
        assert!(context.current().is_invariant());
    }

    #[test]
    fn scope_restores_when_unwinding() {
        let mut context = CultureContext::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = context.scope(Culture::lookup("fr-FR").unwrap());
            panic!("formatting failed");
        }));
        assert!(result.is_err());
        assert!(context.current().is_invariant());
    }
}
