//! Validation Utilities

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors};

use super::error::{AppError, FieldError};

/// Vietnamese mobile numbers: `0` or `+84`, then a 3-9 carrier digit and eight more digits.
static VN_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|\+84)[3-9][0-9]{8}$").expect("valid phone regex"));

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const COMMON_PASSWORDS: [&str; 8] = [
    "password", "123456", "12345678", "qwerty", "admin", "letmein", "111111", "iloveyou",
];

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation {
        message,
        errors: field_errors,
    }
}

/// Run derive-based validation on a request body.
pub fn validate_body<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

/// Whitespace is ignored, so "0912 345 678" is accepted.
pub fn is_valid_vn_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    VN_PHONE.is_match(&compact)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// `validator` custom hook for phone fields.
pub fn validate_vn_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_vn_phone(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Invalid Vietnamese phone number".into()))
    }
}

/// Rejects well-known passwords, case-insensitively.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let normalized = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&normalized.as_str()) {
        Err(ValidationError::new("password")
            .with_message("Password is too common, choose another one".into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0912345678", true)]
    #[test_case("0912 345 678", true)]
    #[test_case("+84912345678", true)]
    #[test_case("0212345678", false; "landline prefix")]
    #[test_case("091234567", false; "too short")]
    #[test_case("84912345678", false; "missing plus")]
    fn vn_phone_rules(input: &str, expected: bool) {
        assert_eq!(is_valid_vn_phone(input), expected);
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("khach@audiotailoc.vn"));
        assert!(!is_valid_email("khach@localhost"));
        assert!(!is_valid_email("khach hang@x.vn"));
    }

    #[test_case("Password", false; "case insensitive")]
    #[test_case(" 12345678 ", false; "surrounding spaces")]
    #[test_case("loa-karaoke-2026", true)]
    fn common_passwords_are_refused(input: &str, accepted: bool) {
        assert_eq!(validate_password_strength(input).is_ok(), accepted);
    }

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn collects_field_errors() {
        let err = validate_body(&Named { name: "ab".into() }).unwrap_err();
        match err {
            AppError::Validation { message, errors } => {
                assert_eq!(message, "name: too short");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
