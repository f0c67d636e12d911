//! Secret References
//!
//! Parses the `output:path` notation used in the `secrets` input into
//! [`Reference`] values and renders their canonical Secret Manager
//! resource path.
//!
//! Accepted path forms:
//!
//! - `projects/P/locations/L/secrets/S/versions/V`
//! - `projects/P/secrets/S/versions/V`
//! - `projects/P/locations/L/secrets/S`
//! - `projects/P/secrets/S`
//! - `P/L/S/V`
//! - `P/S/V`
//! - `P/S`
//!
//! A missing version resolves to `latest`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version used when a reference does not name one
pub const LATEST_VERSION: &str = "latest";

/// Error returned when a secret reference cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `output:` label in front of the secret path
    #[error("Invalid reference \"{raw}\" - missing destination")]
    MissingDestination { raw: String },

    /// The path does not match any known reference form
    #[error("Invalid reference \"{raw}\" - unknown format")]
    UnknownFormat { raw: String },
}

impl ParseError {
    /// The raw entry that failed to parse
    pub fn raw(&self) -> &str {
        match self {
            ParseError::MissingDestination { raw } | ParseError::UnknownFormat { raw } => raw,
        }
    }

    fn missing_destination(raw: &str) -> Self {
        ParseError::MissingDestination {
            raw: raw.to_string(),
        }
    }

    fn unknown_format(raw: &str) -> Self {
        ParseError::UnknownFormat {
            raw: raw.to_string(),
        }
    }
}

/// A parsed reference to one secret version and the output it is written to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    output: String,
    project: String,
    name: String,
    version: String,
    location: Option<String>,
}

impl Reference {
    /// Name of the output the secret value is written to
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Secret name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Region of a regional secret, `None` for global secrets
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Full resource path of the secret version.
    ///
    /// Regional secrets include the `locations/{location}` segment.
    pub fn self_link(&self) -> String {
        match &self.location {
            Some(location) => format!(
                "projects/{}/locations/{}/secrets/{}/versions/{}",
                self.project, location, self.name, self.version
            ),
            None => format!(
                "projects/{}/secrets/{}/versions/{}",
                self.project, self.name, self.version
            ),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.output, self.self_link())
    }
}

impl FromStr for Reference {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_reference(s)
    }
}

/// Identifier segments picked out of a path, before validation
struct PathParts<'a> {
    project: &'a str,
    location: Option<&'a str>,
    name: &'a str,
    version: &'a str,
}

impl<'a> PathParts<'a> {
    fn new(project: &'a str, location: Option<&'a str>, name: &'a str, version: &'a str) -> Self {
        Self {
            project,
            location,
            name,
            version,
        }
    }
}

fn match_path(path: &str) -> Option<PathParts<'_>> {
    let segments: Vec<&str> = path.split('/').map(str::trim).collect();

    let parts = match segments.as_slice() {
        ["projects", p, "locations", l, "secrets", s, "versions", v] => {
            PathParts::new(*p, Some(*l), *s, *v)
        }
        ["projects", p, "secrets", s, "versions", v] => PathParts::new(*p, None, *s, *v),
        ["projects", p, "locations", l, "secrets", s] => {
            PathParts::new(*p, Some(*l), *s, LATEST_VERSION)
        }
        ["projects", p, "secrets", s] => PathParts::new(*p, None, *s, LATEST_VERSION),
        ["projects", _, _, _] => return None,
        [p, l, s, v] => PathParts::new(*p, Some(*l), *s, *v),
        [p, s, v] => PathParts::new(*p, None, *s, *v),
        [p, s] => PathParts::new(*p, None, *s, LATEST_VERSION),
        _ => return None,
    };

    Some(parts)
}

/// Parse a single `output:path` reference.
///
/// Only the first colon separates the output name from the path.
/// Whitespace around the output name and each path segment is ignored.
pub fn parse_reference(raw: &str) -> Result<Reference, ParseError> {
    parse_reference_with_location(raw, None)
}

/// Parse a reference, using `location` for paths that do not carry one.
///
/// A location embedded in the path always takes precedence.
pub fn parse_reference_with_location(
    raw: &str,
    location: Option<&str>,
) -> Result<Reference, ParseError> {
    let Some((output, path)) = raw.split_once(':') else {
        return Err(ParseError::missing_destination(raw));
    };

    let output = output.trim();
    if output.is_empty() {
        return Err(ParseError::missing_destination(raw));
    }

    let parts = match_path(path).ok_or_else(|| ParseError::unknown_format(raw))?;

    let identifiers = [Some(parts.project), Some(parts.name), Some(parts.version), parts.location];
    if identifiers.iter().flatten().any(|segment| segment.is_empty()) {
        return Err(ParseError::unknown_format(raw));
    }

    let location = parts
        .location
        .or_else(|| location.map(str::trim).filter(|l| !l.is_empty()))
        .map(str::to_string);

    Ok(Reference {
        output: output.to_string(),
        project: parts.project.to_string(),
        name: parts.name.to_string(),
        version: parts.version.to_string(),
        location,
    })
}

/// Parse the full `secrets` input into references, in input order.
///
/// Entries are separated by newlines or commas. Blank entries are skipped
/// and the first invalid entry fails the whole batch.
pub fn parse_secret_batch(raw: &str) -> Result<Vec<Reference>, ParseError> {
    parse_secret_batch_with_location(raw, None)
}

/// Like [`parse_secret_batch`], with a default location for every entry
pub fn parse_secret_batch_with_location(
    raw: &str,
    location: Option<&str>,
) -> Result<Vec<Reference>, ParseError> {
    let mut references = Vec::new();

    // "\r\n" leaves an empty piece between the two separators; it is skipped below
    for line in raw.split(['\r', '\n']) {
        if line.trim().is_empty() {
            continue;
        }

        for entry in split_entries(line)? {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            references.push(parse_reference_with_location(entry, location)?);
        }
    }

    tracing::debug!("Parsed {} secret reference(s)", references.len());
    Ok(references)
}

/// Split one line on commas.
///
/// A double-quoted entry keeps its commas and uses `""` for a literal quote.
/// Outside quotes, `\,` is a literal comma. A quote left open at the end of
/// the line is an error.
fn split_entries(line: &str) -> Result<Vec<String>, ParseError> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            '\\' if !in_quotes && chars.peek() == Some(&',') => {
                chars.next();
                current.push(',');
            }
            ',' if !in_quotes => entries.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(ParseError::unknown_format(line));
    }
    entries.push(current);

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(raw: &str) -> String {
        parse_reference(raw).unwrap().self_link()
    }

    #[test]
    fn test_full_ref() {
        assert_eq!(
            link("out:projects/fruits/secrets/apple/versions/123"),
            "projects/fruits/secrets/apple/versions/123"
        );
    }

    #[test]
    fn test_full_ref_without_version() {
        assert_eq!(
            link("out:projects/fruits/secrets/apple"),
            "projects/fruits/secrets/apple/versions/latest"
        );
    }

    #[test]
    fn test_short_ref() {
        assert_eq!(link("out:fruits/apple/123"), "projects/fruits/secrets/apple/versions/123");
    }

    #[test]
    fn test_short_ref_without_version() {
        assert_eq!(link("out:fruits/apple"), "projects/fruits/secrets/apple/versions/latest");
    }

    #[test]
    fn test_regional_full_ref() {
        let reference =
            parse_reference("out:projects/fruits/locations/us-east1/secrets/apple/versions/7").unwrap();
        assert_eq!(reference.project(), "fruits");
        assert_eq!(reference.location(), Some("us-east1"));
        assert_eq!(reference.name(), "apple");
        assert_eq!(reference.version(), "7");
        assert_eq!(
            reference.self_link(),
            "projects/fruits/locations/us-east1/secrets/apple/versions/7"
        );
    }

    #[test]
    fn test_regional_ref_without_version() {
        let reference = parse_reference("out:projects/fruits/locations/us-east1/secrets/apple").unwrap();
        assert_eq!(reference.location(), Some("us-east1"));
        assert_eq!(reference.version(), LATEST_VERSION);
    }

    #[test]
    fn test_regional_short_ref() {
        let reference = parse_reference("out:fruits/us-east1/apple/3").unwrap();
        assert_eq!(reference.project(), "fruits");
        assert_eq!(reference.location(), Some("us-east1"));
        assert_eq!(reference.name(), "apple");
        assert_eq!(reference.version(), "3");
    }

    #[test]
    fn test_extra_segments_fail() {
        let err = parse_reference("out:projects/fruits/secrets/apple/versions/123/subversions/5")
            .unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat { .. }));
        assert_eq!(err.raw(), "out:projects/fruits/secrets/apple/versions/123/subversions/5");
    }

    #[test]
    fn test_single_segment_fails() {
        assert!(matches!(
            parse_reference("out:apple"),
            Err(ParseError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_unknown_middle_tag_fails() {
        assert!(matches!(
            parse_reference("out:projects/fruits/buckets/apple/versions/1"),
            Err(ParseError::UnknownFormat { .. })
        ));
        assert!(matches!(
            parse_reference("out:projects/fruits/buckets/apple"),
            Err(ParseError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_empty_segment_fails() {
        assert!(matches!(
            parse_reference("out:fruits/"),
            Err(ParseError::UnknownFormat { .. })
        ));
        assert!(matches!(
            parse_reference("out:fruits/ /apple/1"),
            Err(ParseError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_missing_output_fails() {
        let err = parse_reference("fruits/apple/123").unwrap_err();
        assert!(matches!(err, ParseError::MissingDestination { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid reference \"fruits/apple/123\" - missing destination"
        );
    }

    #[test]
    fn test_blank_output_fails() {
        assert!(matches!(
            parse_reference("  :fruits/apple"),
            Err(ParseError::MissingDestination { .. })
        ));
    }

    #[test]
    fn test_only_first_colon_separates() {
        // Later colons belong to the path
        let reference = parse_reference("out:fruits/apple:pie").unwrap();
        assert_eq!(reference.output(), "out");
        assert_eq!(reference.name(), "apple:pie");
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let spaced = parse_reference("out : projects/ my-project /secrets/ my-secret").unwrap();
        let compact = parse_reference("out:projects/my-project/secrets/my-secret").unwrap();
        assert_eq!(spaced, compact);
    }

    #[test]
    fn test_display_includes_output() {
        let reference = parse_reference("db_password:fruits/apple").unwrap();
        assert_eq!(
            reference.to_string(),
            "db_password:projects/fruits/secrets/apple/versions/latest"
        );
    }

    #[test]
    fn test_from_str() {
        let reference: Reference = "out:fruits/apple/2".parse().unwrap();
        assert_eq!(reference.version(), "2");
    }

    #[test]
    fn test_external_location_fills_in() {
        let reference = parse_reference_with_location("out:fruits/apple", Some("europe-west1")).unwrap();
        assert_eq!(
            reference.self_link(),
            "projects/fruits/locations/europe-west1/secrets/apple/versions/latest"
        );
    }

    #[test]
    fn test_embedded_location_wins() {
        let reference =
            parse_reference_with_location("out:fruits/us-east1/apple/1", Some("europe-west1")).unwrap();
        assert_eq!(reference.location(), Some("us-east1"));
    }

    #[test]
    fn test_blank_external_location_is_ignored() {
        let reference = parse_reference_with_location("out:fruits/apple", Some("  ")).unwrap();
        assert_eq!(reference.location(), None);
    }

    #[test]
    fn test_batch_empty() {
        assert!(parse_secret_batch("").unwrap().is_empty());
        assert!(parse_secret_batch(" \n\r\n ").unwrap().is_empty());
    }

    #[test]
    fn test_batch_single() {
        let refs = parse_secret_batch("output:project/secret").unwrap();
        assert_eq!(refs, vec![parse_reference("output:project/secret").unwrap()]);
    }

    #[test]
    fn test_batch_separators() {
        let inputs = [
            "output1:project/secret, output2:project/secret",
            "output1:project/secret\noutput2:project/secret",
            "output1:project/secret\routput2:project/secret",
            "output1:project/secret\r\noutput2:project/secret",
            "output1:project/secret\n\n\noutput2:project/secret",
        ];

        for input in inputs {
            let outputs: Vec<String> = parse_secret_batch(input)
                .unwrap()
                .iter()
                .map(|r| r.output().to_string())
                .collect();
            assert_eq!(outputs, vec!["output1", "output2"], "input: {input:?}");
        }
    }

    #[test]
    fn test_batch_mixed_separators_keep_order() {
        let refs = parse_secret_batch(
            "output1:project/secret\noutput2:project/secret,output3:project/secret",
        )
        .unwrap();
        let outputs: Vec<&str> = refs.iter().map(Reference::output).collect();
        assert_eq!(outputs, vec!["output1", "output2", "output3"]);
    }

    #[test]
    fn test_batch_skips_empty_entries() {
        let refs = parse_secret_batch("a:p/s,, ,b:p/s,").unwrap();
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_batch_quoted_entry_keeps_commas() {
        let refs = parse_secret_batch(r#""a:p/s,1", b:p/s"#).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name(), "s,1");
        assert_eq!(refs[1].output(), "b");
    }

    #[test]
    fn test_batch_escaped_comma() {
        let refs = parse_secret_batch(r"a:p/s\,1").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name(), "s,1");
    }

    #[test]
    fn test_batch_invalid_entry_fails() {
        let err = parse_secret_batch("a:p/s\nnot/valid\nb:p/s").unwrap_err();
        assert_eq!(err, ParseError::missing_destination("not/valid"));
    }

    #[test]
    fn test_batch_with_location() {
        let refs = parse_secret_batch_with_location("a:p/s\nb:p/us-east1/s/1", Some("asia-east1")).unwrap();
        assert_eq!(refs[0].location(), Some("asia-east1"));
        assert_eq!(refs[1].location(), Some("us-east1"));
    }

    #[test]
    fn test_split_entries_quotes() {
        assert_eq!(
            split_entries(r#"a, "b ""c"", d", e"#).unwrap(),
            vec!["a", r#"b "c", d"#, " e"]
        );
    }

    #[test]
    fn test_split_entries_unterminated_quote() {
        assert!(split_entries(r#"a:p/s, "b:p/s"#).is_err());
        assert!(split_entries(r#""a:p/s"""#).is_err());
    }

    #[test]
    fn test_batch_unterminated_quote_fails() {
        let err = parse_secret_batch("ok:p/s\n\"a:p/s, b:p/s").unwrap_err();
        assert_eq!(err, ParseError::unknown_format("\"a:p/s, b:p/s"));
    }
}
