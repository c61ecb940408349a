//! Record keys and list patterns.
//!
//! A key is a slash-separated relative path such as `char/7`. Every segment is
//! checked so that a key can only ever name a file beneath the store root, and
//! never collides with the store's own sidecar and scratch files.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{LOCK_SUFFIX, MAX_SEGMENT_BYTES};

/// Why a key or pattern was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
  #[error("key is empty")]
  Empty,

  #[error("key must be relative")]
  Absolute,

  #[error("key has an empty segment")]
  EmptySegment,

  #[error("key segment {0:?} escapes or aliases its directory")]
  Traversal(String),

  #[error("key segment {0:?} starts with '.', which is reserved")]
  Hidden(String),

  #[error("key segment {segment:?} contains forbidden character {ch:?}")]
  ForbiddenChar { segment: String, ch: char },

  #[error("key segment {0:?} ends with {LOCK_SUFFIX:?}, which is reserved")]
  LockSuffix(String),

  #[error("key segment is {len} bytes, longer than {MAX_SEGMENT_BYTES}")]
  TooLong { len: usize },

  #[error("unterminated character class in pattern segment {0:?}")]
  UnterminatedClass(String),
}

/// Characters never allowed in a key segment.
///
/// `\` and `:` would be separators or drive/stream markers on Windows.
const FORBIDDEN: [char; 3] = ['\\', ':', '\0'];

/// Validate `key` and return its segments.
pub fn segments(key: &str) -> Result<Vec<&str>, KeyError> {
  split(key, false)
}

/// Resolve `key` to a path beneath `root`.
pub fn resolve(root: &Path, key: &str) -> Result<PathBuf, KeyError> {
  let mut path = root.to_path_buf();
  for segment in segments(key)? {
    path.push(segment);
  }
  Ok(path)
}

/// Turn a path beneath `root` back into a key.
///
/// Returns `None` when the path is not under `root` or is not valid UTF-8.
pub fn relativize(root: &Path, path: &Path) -> Option<String> {
  let relative = path.strip_prefix(root).ok()?;
  let mut parts = Vec::new();
  for component in relative.components() {
    match component {
      std::path::Component::Normal(part) => parts.push(part.to_str()?),
      _ => return None,
    }
  }
  if parts.is_empty() {
    return None;
  }
  Some(parts.join("/"))
}

fn split(input: &str, allow_wildcards: bool) -> Result<Vec<&str>, KeyError> {
  if input.is_empty() {
    return Err(KeyError::Empty);
  }
  if input.starts_with('/') {
    return Err(KeyError::Absolute);
  }

  let parts: Vec<&str> = input.split('/').collect();
  for segment in &parts {
    check_segment(segment, allow_wildcards)?;
  }
  Ok(parts)
}

fn check_segment(segment: &str, allow_wildcards: bool) -> Result<(), KeyError> {
  if segment.is_empty() {
    return Err(KeyError::EmptySegment);
  }
  if segment == "." || segment == ".." {
    return Err(KeyError::Traversal(segment.to_string()));
  }
  if segment.starts_with('.') {
    return Err(KeyError::Hidden(segment.to_string()));
  }
  if segment.len() > MAX_SEGMENT_BYTES {
    return Err(KeyError::TooLong { len: segment.len() });
  }
  // A directory named like a sidecar would block that record's lock.
  if segment.ends_with(LOCK_SUFFIX) {
    return Err(KeyError::LockSuffix(segment.to_string()));
  }
  if let Some(ch) = segment.chars().find(|c| FORBIDDEN.contains(c)) {
    return Err(KeyError::ForbiddenChar {
      segment: segment.to_string(),
      ch,
    });
  }
  if !allow_wildcards && let Some(ch) = segment.chars().find(|c| matches!(c, '*' | '?' | '[' | ']')) {
    return Err(KeyError::ForbiddenChar {
      segment: segment.to_string(),
      ch,
    });
  }
  Ok(())
}

/// A compiled glob pattern over keys.
///
/// `*` matches any run of characters within a segment, `?` a single character,
/// and `[...]` a character class (`[abc]`, `[a-z]`, `[!a-z]`). Wildcards never
/// match `/`, so a pattern only matches keys with the same number of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
  segments: Vec<Vec<Token>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  Literal(char),
  AnyOne,
  AnyRun,
  Class { negated: bool, ranges: Vec<(char, char)> },
}

impl KeyPattern {
  /// Parse a pattern, applying the same segment rules as keys.
  pub fn parse(pattern: &str) -> Result<Self, KeyError> {
    let segments = split(pattern, true)?
      .into_iter()
      .map(compile_segment)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { segments })
  }

  /// Number of `/`-separated segments a matching key has.
  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  /// Whether `name` can be the `index`-th segment of a matching key.
  pub fn matches_segment(&self, index: usize, name: &str) -> bool {
    self.segments.get(index).is_some_and(|tokens| {
      let chars: Vec<char> = name.chars().collect();
      match_tokens(tokens, &chars)
    })
  }

  /// Whether `key` matches this pattern.
  pub fn matches(&self, key: &str) -> bool {
    let parts: Vec<&str> = key.split('/').collect();
    parts.len() == self.segments.len()
      && parts.iter().zip(&self.segments).all(|(part, tokens)| {
        let chars: Vec<char> = part.chars().collect();
        match_tokens(tokens, &chars)
      })
  }
}

fn compile_segment(segment: &str) -> Result<Vec<Token>, KeyError> {
  let mut tokens = Vec::new();
  let mut chars = segment.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '*' => {
        // Consecutive stars are equivalent to one.
        if tokens.last() != Some(&Token::AnyRun) {
          tokens.push(Token::AnyRun);
        }
      }
      '?' => tokens.push(Token::AnyOne),
      '[' => {
        let negated = chars.next_if_eq(&'!').is_some();
        let mut ranges = Vec::new();
        let mut closed = false;
        while let Some(start) = chars.next() {
          if start == ']' && !ranges.is_empty() {
            closed = true;
            break;
          }
          if chars.next_if_eq(&'-').is_some() {
            match chars.next() {
              Some(']') | None => {
                // Trailing '-' is literal.
                ranges.push((start, start));
                ranges.push(('-', '-'));
                closed = true;
                break;
              }
              Some(end) => ranges.push((start, end)),
            }
          } else {
            ranges.push((start, start));
          }
        }
        if !closed {
          return Err(KeyError::UnterminatedClass(segment.to_string()));
        }
        tokens.push(Token::Class { negated, ranges });
      }
      ']' => {
        return Err(KeyError::ForbiddenChar {
          segment: segment.to_string(),
          ch: ']',
        });
      }
      other => tokens.push(Token::Literal(other)),
    }
  }

  Ok(tokens)
}

fn match_tokens(tokens: &[Token], input: &[char]) -> bool {
  let (mut t, mut i) = (0, 0);
  // Last `*` seen and the input position it currently absorbs up to.
  let mut star: Option<(usize, usize)> = None;

  while i < input.len() {
    match tokens.get(t) {
      Some(Token::AnyRun) => {
        star = Some((t, i));
        t += 1;
      }
      Some(token) if token_matches(token, input[i]) => {
        t += 1;
        i += 1;
      }
      _ => match star {
        Some((star_t, star_i)) => {
          star = Some((star_t, star_i + 1));
          t = star_t + 1;
          i = star_i + 1;
        }
        None => return false,
      },
    }
  }

  tokens[t..].iter().all(|token| *token == Token::AnyRun)
}

fn token_matches(token: &Token, c: char) -> bool {
  match token {
    Token::Literal(l) => *l == c,
    Token::AnyOne | Token::AnyRun => true,
    Token::Class { negated, ranges } => ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c)) != *negated,
  }
}
