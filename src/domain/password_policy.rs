//! Password strength rules applied on signup, password change and reset.

/// Minimum number of characters a password must contain.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Similarity ratio at which a password is considered derived from a user attribute.
const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "1234567890", "qwerty", "qwertyuiop", "password",
    "password1", "password123", "11111111", "00000000", "iloveyou", "sunshine", "princess",
    "football", "baseball", "welcome", "welcome1", "admin123", "abc12345", "letmein1",
    "trustno1", "superman", "starwars", "qwerty123", "1q2w3e4r", "1qaz2wsx", "zaq12wsx",
    "passw0rd", "dragon12", "monkey12", "master12",
];

/// User attributes a password must not closely resemble.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAttributes<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
}

impl<'a> UserAttributes<'a> {
    fn labelled(&self) -> [(&'static str, &'a str); 4] {
        [
            ("username", self.username),
            ("first name", self.first_name),
            ("last name", self.last_name),
            ("email address", self.email),
        ]
    }
}

/// Returns every rule the password breaks, in a stable order.
pub fn validate_password(password: &str, attributes: &UserAttributes<'_>) -> Vec<String> {
    let mut problems = Vec::new();

    if let Some(label) = similar_attribute(password, attributes) {
        problems.push(format!("The password is too similar to the {label}."));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }

    let lowered = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

fn similar_attribute(password: &str, attributes: &UserAttributes<'_>) -> Option<&'static str> {
    let password: Vec<char> = password.to_lowercase().chars().collect();
    if password.is_empty() {
        return None;
    }

    for (label, value) in attributes.labelled() {
        if value.trim().is_empty() {
            continue;
        }
        let lowered = value.to_lowercase();
        let whole = std::iter::once(lowered.as_str());
        let parts = lowered.split(|c: char| !c.is_alphanumeric() && c != '_');
        for part in whole.chain(parts).filter(|part| !part.is_empty()) {
            let part: Vec<char> = part.chars().collect();
            if similarity(&password, &part) >= MAX_SIMILARITY {
                return Some(label);
            }
        }
    }

    None
}

/// Ratio of matching characters, `2 * matches / (len(a) + len(b))`.
fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * matching_chars(a, b)) as f64 / total as f64
}

/// Counts characters covered by recursively chosen longest common blocks.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                current[j + 1] = previous[j] + 1;
                if current[j + 1] > best.2 {
                    best = (i + 1 - current[j + 1], j + 1 - current[j + 1], current[j + 1]);
                }
            }
        }
        previous = current;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> UserAttributes<'static> {
        UserAttributes {
            username: "test_user",
            first_name: "Anna",
            last_name: "Karenina",
            email: "anna@example.com",
        }
    }

    #[test]
    fn strong_password_passes() {
        assert!(validate_password("violet-harbour-42", &attrs()).is_empty());
    }

    #[test]
    fn short_numeric_password_breaks_two_rules() {
        let problems = validate_password("1234", &attrs());
        assert!(problems.iter().any(|p| p.contains("too short")));
        assert!(problems.iter().any(|p| p.contains("entirely numeric")));
    }

    #[test]
    fn common_password_is_rejected() {
        let problems = validate_password("Password123", &attrs());
        assert_eq!(problems, vec!["This password is too common.".to_string()]);
    }

    #[test]
    fn password_close_to_username_is_rejected() {
        let problems = validate_password("test_user1", &attrs());
        assert_eq!(
            problems.first().map(String::as_str),
            Some("The password is too similar to the username.")
        );
    }

    #[test]
    fn similarity_of_identical_strings_is_one() {
        let a: Vec<char> = "karenina".chars().collect();
        assert!((similarity(&a, &a) - 1.0).abs() < f64::EPSILON);
    }
}
