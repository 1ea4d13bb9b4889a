use std::fmt::Display;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use crate::utils::time::parse_iso_date;

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct DateArgs {
    #[arg(
        long,
        short,
        help = "Date to use, today by default. Examples are \"2024-03-13\", \"yesterday\", \"last friday\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl DateArgs {
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDate> {
        match &self.date {
            Some(value) => resolve_date(value, self.date_style),
            None => Ok(today),
        }
    }
}

/// ISO dates are taken as is, anything else goes through natural language parsing.
pub fn resolve_date(value: &str, style: DateStyle) -> Result<NaiveDate> {
    if let Ok(date) = parse_iso_date(value) {
        return Ok(date);
    }
    match parse_date_string(value, Local::now(), style.into()) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {value:?}: {e}"),
            )
            .into()),
    }
}
