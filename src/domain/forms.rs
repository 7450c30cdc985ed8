//! Field validation for the forms submitted by visitors.
//!
//! Each `clean_*` function takes the raw submitted strings and either returns
//! the normalised values or a [`FormErrors`] map keyed by field name, ready to
//! be rendered next to the offending inputs.

use std::collections::BTreeMap;

use crate::domain::entities::GroupRecord;
use crate::domain::password_policy::{UserAttributes, validate_password};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn’t match.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const INCORRECT_OLD_PASSWORD: &str =
    "Your old password was entered incorrectly. Please enter it again.";

pub const USERNAME_MAX_CHARS: usize = 150;
pub const NAME_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const GROUP_TITLE_MAX_CHARS: usize = 200;

/// Validation messages collected per field, plus form-wide messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
        self.non_field.extend(other.non_field);
    }

    /// Form-wide error carrying a single message.
    pub fn non_field_only(message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add_non_field(message);
        errors
    }

    fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Normalised values of the post form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    pub text: String,
    pub group_id: Option<i64>,
}

/// Validate post text and the optional group choice against the available groups.
pub fn clean_post(text: &str, group: &str, groups: &[GroupRecord]) -> Result<PostFields, FormErrors> {
    let mut errors = FormErrors::new();

    if text.trim().is_empty() {
        errors.add("text", REQUIRED);
    }

    let group = group.trim();
    let group_id = if group.is_empty() {
        None
    } else {
        match group.parse::<i64>() {
            Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
            _ => {
                errors.add("group", INVALID_CHOICE);
                None
            }
        }
    };

    errors.finish(PostFields {
        text: text.trim().to_string(),
        group_id,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignupInput<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password1: &'a str,
    pub password2: &'a str,
}

/// Normalised values of the signup form; the password is still plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupFields {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn clean_signup(input: SignupInput<'_>) -> Result<SignupFields, FormErrors> {
    let mut errors = FormErrors::new();

    let username = input.username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else {
        let length = username.chars().count();
        if length > USERNAME_MAX_CHARS {
            errors.add("username", max_length_message(USERNAME_MAX_CHARS, length));
        }
        if !is_valid_username(username) {
            errors.add("username", INVALID_USERNAME);
        }
    }

    let first_name = input.first_name.trim();
    check_max_length(&mut errors, "first_name", first_name, NAME_MAX_CHARS);
    let last_name = input.last_name.trim();
    check_max_length(&mut errors, "last_name", last_name, NAME_MAX_CHARS);

    let email = normalize_email(input.email.trim());
    if !email.is_empty() {
        check_max_length(&mut errors, "email", &email, EMAIL_MAX_CHARS);
        if !is_valid_email(&email) {
            errors.add("email", INVALID_EMAIL);
        }
    }

    if input.password1.is_empty() {
        errors.add("password1", REQUIRED);
    }
    if input.password2.is_empty() {
        errors.add("password2", REQUIRED);
    }

    if !input.password1.is_empty() && !input.password2.is_empty() {
        if input.password1 != input.password2 {
            errors.add("password2", PASSWORD_MISMATCH);
        } else {
            let attributes = UserAttributes {
                username,
                first_name,
                last_name,
                email: &email,
            };
            for problem in validate_password(input.password2, &attributes) {
                errors.add("password2", problem);
            }
        }
    }

    errors.finish(SignupFields {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        username: username.to_string(),
        email,
        password: input.password1.to_string(),
    })
}

/// Require both login fields; credential checks happen in the auth service.
pub fn clean_login(username: &str, password: &str) -> Result<(String, String), FormErrors> {
    let mut errors = FormErrors::new();
    let username = username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    }
    if password.is_empty() {
        errors.add("password", REQUIRED);
    }
    errors.finish((username.to_string(), password.to_string()))
}

/// Validate a new password pair (set-password and password-change forms).
pub fn clean_new_password(
    new_password1: &str,
    new_password2: &str,
    attributes: &UserAttributes<'_>,
) -> Result<String, FormErrors> {
    let mut errors = FormErrors::new();
    if new_password1.is_empty() {
        errors.add("new_password1", REQUIRED);
    }
    if new_password2.is_empty() {
        errors.add("new_password2", REQUIRED);
    }
    if !new_password1.is_empty() && !new_password2.is_empty() {
        if new_password1 != new_password2 {
            errors.add("new_password2", PASSWORD_MISMATCH);
        } else {
            for problem in validate_password(new_password2, attributes) {
                errors.add("new_password2", problem);
            }
        }
    }
    errors.finish(new_password1.to_string())
}

/// Validate the email address submitted to request a password reset.
pub fn clean_reset_email(email: &str) -> Result<String, FormErrors> {
    let mut errors = FormErrors::new();
    let email = normalize_email(email.trim());
    if email.is_empty() {
        errors.add("email", REQUIRED);
    } else if !is_valid_email(&email) {
        errors.add("email", INVALID_EMAIL);
    }
    errors.finish(email)
}

/// Letters, digits and `@ . + - _` only.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.contains(char::is_whitespace) || local.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

/// Lowercase the domain part, keep the local part as typed.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn check_max_length(errors: &mut FormErrors, field: &'static str, value: &str, max: usize) {
    let length = value.chars().count();
    if length > max {
        errors.add(field, max_length_message(max, length));
    }
}

fn max_length_message(max: usize, actual: usize) -> String {
    format!("Ensure this value has at most {max} characters (it has {actual}).")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<GroupRecord> {
        vec![GroupRecord {
            id: 7,
            title: "Тестовая группа".into(),
            slug: "test-slug".into(),
            description: "Тестовое описание".into(),
        }]
    }

    fn signup<'a>(username: &'a str, p1: &'a str, p2: &'a str) -> SignupInput<'a> {
        SignupInput {
            username,
            password1: p1,
            password2: p2,
            ..Default::default()
        }
    }

    #[test]
    fn post_requires_text_but_not_group() {
        let cleaned = clean_post("  Hello\n", "", &groups()).expect("valid post");
        assert_eq!(cleaned.text, "Hello");
        assert_eq!(cleaned.group_id, None);

        let errors = clean_post("   ", "", &groups()).expect_err("blank text");
        assert_eq!(errors.field("text"), [REQUIRED.to_string()]);
        assert!(!errors.has_field("group"));
    }

    #[test]
    fn post_group_must_be_a_known_choice() {
        let cleaned = clean_post("Hello", "7", &groups()).expect("known group");
        assert_eq!(cleaned.group_id, Some(7));

        for bad in ["8", "seven"] {
            let errors = clean_post("Hello", bad, &groups()).expect_err("unknown group");
            assert_eq!(errors.field("group"), [INVALID_CHOICE.to_string()]);
        }
    }

    #[test]
    fn signup_accepts_valid_input() {
        let input = SignupInput {
            first_name: " Anna ",
            last_name: "Karenina",
            username: "anna.k",
            email: "Anna@Example.COM",
            password1: "violet-harbour-42",
            password2: "violet-harbour-42",
        };
        let fields = clean_signup(input).expect("valid signup");
        assert_eq!(fields.first_name, "Anna");
        assert_eq!(fields.email, "Anna@example.com");
    }

    #[test]
    fn signup_rejects_bad_username_and_mismatch() {
        let errors = clean_signup(signup("bad name!", "violet-harbour-42", "violet-harbour-43"))
            .expect_err("invalid");
        assert_eq!(errors.field("username"), [INVALID_USERNAME.to_string()]);
        assert_eq!(errors.field("password2"), [PASSWORD_MISMATCH.to_string()]);
    }

    #[test]
    fn signup_applies_password_policy() {
        let errors = clean_signup(signup("someone", "12345678", "12345678")).expect_err("weak");
        let messages = errors.field("password2");
        assert!(messages.iter().any(|m| m == "This password is too common."));
        assert!(messages.iter().any(|m| m == "This password is entirely numeric."));
    }

    #[test]
    fn signup_rejects_overlong_username() {
        let long = "a".repeat(151);
        let errors = clean_signup(signup(&long, "violet-harbour-42", "violet-harbour-42"))
            .expect_err("too long");
        assert_eq!(
            errors.field("username"),
            ["Ensure this value has at most 150 characters (it has 151).".to_string()]
        );
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@-bad.com"));
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = clean_login(" ", "").expect_err("empty");
        assert!(errors.has_field("username"));
        assert!(errors.has_field("password"));
        assert_eq!(
            clean_login(" leo ", "pw").expect("filled"),
            ("leo".to_string(), "pw".to_string())
        );
    }

    #[test]
    fn reset_email_is_required_and_checked() {
        assert_eq!(
            clean_reset_email("").expect_err("empty").field("email"),
            [REQUIRED.to_string()]
        );
        assert_eq!(
            clean_reset_email("nope").expect_err("invalid").field("email"),
            [INVALID_EMAIL.to_string()]
        );
        assert_eq!(clean_reset_email("a@B.com").expect("valid"), "a@b.com");
    }
}
