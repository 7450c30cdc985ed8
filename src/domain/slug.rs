//! Group slug derivation and validation.
//!
//! Group titles are frequently written in Cyrillic, so derivation relies on the
//! `slug` crate's transliteration to produce ASCII URL segments such as
//! `testovaia-gruppa`. Uniqueness is checked by a caller-supplied async
//! predicate so the logic stays independent of persistence.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

/// Maximum length of a group slug.
pub const SLUG_MAX_CHARS: usize = 50;

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{input}` is not a valid slug: use letters, numbers, underscores or hyphens")]
    Invalid { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors that can occur while generating a slug via an async uniqueness check.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.chars().count() > SLUG_MAX_CHARS {
        candidate = candidate
            .chars()
            .take(SLUG_MAX_CHARS)
            .collect::<String>()
            .trim_end_matches('-')
            .to_string();
    }

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Accept an explicitly supplied slug when it only uses ASCII letters, digits, `_` or `-`.
pub fn validate_slug(input: &str) -> Result<String, SlugError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    let valid = trimmed.len() <= SLUG_MAX_CHARS
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(SlugError::Invalid {
            input: trimmed.to_string(),
        })
    }
}

/// Produce a slug that does not collide according to the supplied predicate.
///
/// The predicate must resolve to `true` when the candidate is free. Collisions
/// are retried with a monotonic suffix (`-2`, `-3`, …).
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}
