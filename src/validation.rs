//! Input validation for request bodies
//!
//! Every check trims its input and returns the cleaned value, or
//! `AppError::BadRequest` with a message fit for the client.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AppError;

pub const USERNAME_MAX: usize = 64;
pub const EMAIL_MAX: usize = 120;
pub const ABOUT_ME_MAX: usize = 140;
pub const TITLE_MAX: usize = 64;
pub const METHOD_MAX: usize = 1024;
pub const DESCRIPTION_MAX: usize = 64;
pub const UNIT_MAX: usize = 64;
pub const PASSWORD_MIN: usize = 6;

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]*$").expect("static pattern"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static pattern"));

fn required(value: &str, field: &str, max: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// Empty input means the field is cleared
fn optional(value: Option<&str>, field: &str, max: usize) -> Result<Option<String>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max => Err(AppError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        Some(v) => Ok(Some(v.to_string())),
    }
}

pub fn username(value: &str) -> Result<String, AppError> {
    required(value, "Username", USERNAME_MAX)
}

pub fn email(value: &str) -> Result<String, AppError> {
    let value = required(value, "Email", EMAIL_MAX)?;
    if !EMAIL_RE.is_match(&value) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    Ok(value)
}

pub fn password(value: &str) -> Result<(), AppError> {
    if value.chars().count() < PASSWORD_MIN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN
        )));
    }
    Ok(())
}

pub fn about_me(value: Option<&str>) -> Result<Option<String>, AppError> {
    optional(value, "About me", ABOUT_ME_MAX)
}

pub fn title(value: &str) -> Result<String, AppError> {
    required(value, "Title", TITLE_MAX)
}

pub fn method(value: Option<&str>) -> Result<Option<String>, AppError> {
    optional(value, "Method", METHOD_MAX)
}

pub fn description(value: &str) -> Result<String, AppError> {
    required(value, "Ingredient", DESCRIPTION_MAX)
}

pub fn unit(value: Option<&str>) -> Result<Option<String>, AppError> {
    optional(value, "Unit", UNIT_MAX)
}

/// Quantity must be digits only; empty means no quantity
pub fn quantity(value: Option<&str>) -> Result<Option<f64>, AppError> {
    let value = value.map(str::trim).unwrap_or_default();
    if !QUANTITY_RE.is_match(value) {
        return Err(AppError::BadRequest("Enter a valid quantity".to_string()));
    }
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AppError::BadRequest("Enter a valid quantity".to_string()))
}

pub fn search_phrase(value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::BadRequest("Search query is required".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity() {
        assert_eq!(quantity(Some("200")).unwrap(), Some(200.0));
        assert_eq!(quantity(Some("")).unwrap(), None);
        assert_eq!(quantity(None).unwrap(), None);
        assert_eq!(quantity(Some(" 3 ")).unwrap(), Some(3.0));
        assert!(quantity(Some("1.5")).is_err());
        assert!(quantity(Some("-2")).is_err());
        assert!(quantity(Some("two")).is_err());
    }

    #[test]
    fn test_title_limits() {
        assert_eq!(title("  Pancakes ").unwrap(), "Pancakes");
        assert!(title("   ").is_err());
        assert!(title(&"a".repeat(64)).is_ok());
        assert!(title(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_method_and_about_me() {
        assert_eq!(method(Some("")).unwrap(), None);
        assert!(method(Some(&"x".repeat(1024))).unwrap().is_some());
        assert!(method(Some(&"x".repeat(1025))).is_err());
        assert!(about_me(Some(&"x".repeat(141))).is_err());
        assert_eq!(about_me(None).unwrap(), None);
    }

    #[test]
    fn test_email() {
        assert!(email("susan@example.com").is_ok());
        assert!(email("susan").is_err());
        assert!(email("a b@example.com").is_err());
        assert!(email(&format!("{}@example.com", "a".repeat(120))).is_err());
    }

    #[test]
    fn test_search_phrase() {
        assert_eq!(search_phrase(Some(" pie ")).unwrap(), "pie");
        assert!(search_phrase(Some("  ")).is_err());
        assert!(search_phrase(None).is_err());
    }

    #[test]
    fn test_password() {
        assert!(password("secret").is_ok());
        assert!(password("abc").is_err());
    }
}
