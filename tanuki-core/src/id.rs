//! Composite resource IDs
//!
//! Remote objects are addressed by several fields joined with `:`, for example
//! `project:key:environment_scope`. Fields are not escaped, so a value that
//! itself contains `:` only round-trips in the final position of a two-part ID
//! or through [`decode_with_tail`].
//!
//! Patterns are written the way they appear in error messages; the number of
//! `:`-separated names in a pattern is the expected number of segments.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("Unexpected ID format ({id:?}). Expected {pattern}")]
    UnexpectedFormat { id: String, pattern: String },
    #[error("Unexpected ID format ({id:?}): {segment} must be an integer, got {value:?}")]
    InvalidInteger {
        id: String,
        segment: String,
        value: String,
    },
}

pub fn encode<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(":")
}

fn segment_count(pattern: &str) -> usize {
    pattern.split(':').count()
}

fn unexpected(id: &str, pattern: &str) -> IdError {
    IdError::UnexpectedFormat {
        id: id.to_string(),
        pattern: pattern.to_string(),
    }
}

/// Decode `id` into as many segments as `pattern` names
///
/// Two-part IDs split at the first `:` only so the second field may contain
/// `:`. Longer IDs must have exactly the expected number of segments.
pub fn decode(id: &str, pattern: &str) -> Result<Vec<String>, IdError> {
    let n = segment_count(pattern);
    let parts: Vec<String> = if n == 2 {
        id.splitn(2, ':').map(str::to_string).collect()
    } else {
        id.split(':').map(str::to_string).collect()
    };

    if parts.len() != n {
        return Err(unexpected(id, pattern));
    }
    Ok(parts)
}

/// Decode `id` into at most as many segments as `pattern` names, leaving any
/// further `:` inside the final segment
pub fn decode_with_tail(id: &str, pattern: &str) -> Result<Vec<String>, IdError> {
    let n = segment_count(pattern);
    let parts: Vec<String> = id.splitn(n, ':').map(str::to_string).collect();

    if parts.len() != n {
        return Err(unexpected(id, pattern));
    }
    Ok(parts)
}

/// Decode `id` against several accepted shapes, longest first
///
/// Used where an older, shorter form of the ID is still accepted. Every shape
/// requires an exact segment count.
pub fn decode_first_of(id: &str, patterns: &[&str]) -> Result<Vec<String>, IdError> {
    let mut ordered: Vec<&str> = patterns.to_vec();
    ordered.sort_by_key(|p| std::cmp::Reverse(segment_count(p)));

    let parts: Vec<&str> = id.split(':').collect();
    for pattern in &ordered {
        if parts.len() == segment_count(pattern) {
            return Ok(parts.iter().map(|s| s.to_string()).collect());
        }
    }

    Err(unexpected(id, &patterns.join(" or ")))
}

/// Parse an integer segment of an ID
pub fn parse_int(id: &str, segment: &str, value: &str) -> Result<i64, IdError> {
    value.parse::<i64>().map_err(|_| IdError::InvalidInteger {
        id: id.to_string(),
        segment: segment.to_string(),
        value: value.to_string(),
    })
}
