//! Client modules for external services

pub mod bank_holidays;

pub use bank_holidays::{BankHolidaysClient, HolidaySource, StaticHolidays};
