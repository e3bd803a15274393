use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::users::repo::Gender;

// Allowed age window for registration, in whole years.
const MIN_AGE_YEARS: i32 = 18;
const MAX_AGE_YEARS: i32 = 50;

const MIN_PASSWORD_LEN: usize = 8;

fn invalid(code: u16, message: &'static str) -> ApiError {
    ApiError::Validation { code, message }
}

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    let trimmed = name.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .split_whitespace()
            .all(|word| word.chars().all(char::is_alphabetic));
    if valid {
        Ok(())
    } else {
        Err(invalid(423, "Invalid name"))
    }
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(invalid(424, "Invalid email"))
    }
}

/// `birthday` is a unix-millisecond timestamp.
pub fn validate_birthday(birthday: i64) -> Result<(), ApiError> {
    let message = "Invalid birthday, must be at least 18yrs old and not older than 50yrs old.";
    let born = OffsetDateTime::from_unix_timestamp(birthday / 1000)
        .map_err(|_| invalid(425, message))?;
    let now = OffsetDateTime::now_utc();

    let mut age = now.year() - born.year();
    if (u8::from(now.month()), now.day()) < (u8::from(born.month()), born.day()) {
        age -= 1;
    }
    if (MIN_AGE_YEARS..=MAX_AGE_YEARS).contains(&age) {
        Ok(())
    } else {
        Err(invalid(425, message))
    }
}

pub fn validate_gender(gender: &str) -> Result<Gender, ApiError> {
    Gender::parse(gender)
        .ok_or_else(|| invalid(426, "Invalid gender. Must be 'M' or 'F' values only"))
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let valid = password.len() >= MIN_PASSWORD_LEN
        && password.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(invalid(
            428,
            "User password invalid. Must be letters or numbers. Minimum of 8 characters.",
        ))
    }
}
