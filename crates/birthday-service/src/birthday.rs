// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Date-of-birth validation and the days-until-birthday message.

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

const DATE_LAYOUT: &str = "%Y-%m-%d";

fn date_shape() -> &'static Regex {
    static DATE_SHAPE: OnceLock<Regex> = OnceLock::new();
    // chrono accepts unpadded month/day, the wire format does not
    DATE_SHAPE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid literal regex"))
}

/// Strict `yyyy-mm-dd` check: zero-padded fields and a real calendar date.
pub fn is_valid_date_format(date: &str) -> bool {
    date_shape().is_match(date) && NaiveDate::parse_from_str(date, DATE_LAYOUT).is_ok()
}

/// Builds the greeting for `user` given a stored date of birth and today's
/// date (already normalized to a calendar day).
///
/// The day difference compares day-of-year numbers within the current year;
/// a birthday that already passed produces the same message regardless of
/// how long ago it was.
pub fn birthday_message(
    user: &str,
    date_of_birth: &str,
    today: NaiveDate,
) -> anyhow::Result<String> {
    let birth_date = NaiveDate::parse_from_str(date_of_birth, DATE_LAYOUT)
        .context("failed to parse dateOfBirth")?;

    let birthday_this_year = NaiveDate::from_ymd_opt(today.year(), birth_date.month(), birth_date.day())
        .with_context(|| {
            format!(
                "{:04}-{:02}-{:02} does not exist",
                today.year(),
                birth_date.month(),
                birth_date.day()
            )
        })?;

    let day_diff = i64::from(birthday_this_year.ordinal()) - i64::from(today.ordinal());

    Ok(match day_diff {
        0 => format!("Hello, {user}! Happy birthday"),
        1 => format!("Hello, {user}! Your birthday is in 1 day"),
        d if d > 1 => format!("Hello, {user}! Your birthday is in {d} days"),
        _ => format!("Hello, {user}! Your birthday is passed this year"),
    })
}
