//! Package version ordering, archive filename parsing and requirement strings.
//!
//! Versions are compared the way legacy setuptools did: the string is split
//! into numeric and alphabetic runs, numeric runs are zero padded, trailing
//! zeros are dropped, and pre-release tags sort before the final release.
//! This tolerates the arbitrary version strings found in old archives.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Recognized archive extensions. Longer suffixes come first so `.tar.gz`
/// is never read as `.tar`.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tar.bz2", ".zip", ".tar", ".egg"];

const FINAL: &str = "*final";
const FINAL_DASH: &str = "*final-";
const ZERO: &str = "00000000";

/// A parsed, comparable package version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    key: Vec<String>,
}

impl Version {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self {
            raw: s.to_string(),
            key: sort_key(s),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Leading dotted numeric components, e.g. `[1, 4]` for `1.4rc1`.
    fn release(&self) -> Vec<u64> {
        let mut release = Vec::new();
        for part in self.raw.split('.') {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse() {
                Ok(n) => release.push(n),
                Err(_) => break,
            }
            if digits.len() != part.len() {
                break;
            }
        }
        release
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_components(s: &str) -> Vec<String> {
    #[derive(PartialEq, Clone, Copy)]
    enum Class {
        Digit,
        Alpha,
        Other,
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut class = Class::Other;

    for c in s.chars() {
        if c == '.' || c == '-' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.push(c.to_string());
            continue;
        }
        let next = if c.is_ascii_digit() {
            Class::Digit
        } else if c.is_ascii_lowercase() {
            Class::Alpha
        } else {
            Class::Other
        };
        if next != class && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        class = next;
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn sort_key(s: &str) -> Vec<String> {
    let lowered = s.to_lowercase();
    let mut raw_parts: Vec<String> = split_components(&lowered)
        .into_iter()
        .filter(|p| p != ".")
        .map(|p| {
            let p = match p.as_str() {
                "pre" | "preview" | "rc" => "c".to_string(),
                "-" => "final-".to_string(),
                "dev" => "@".to_string(),
                _ => p,
            };
            if p.starts_with(|c: char| c.is_ascii_digit()) {
                format!("{p:0>8}")
            } else {
                format!("*{p}")
            }
        })
        .collect();
    raw_parts.push(FINAL.to_string());

    let mut key: Vec<String> = Vec::with_capacity(raw_parts.len());
    for part in raw_parts {
        if part.starts_with('*') {
            if part.as_str() < FINAL {
                while key.last().is_some_and(|p| p == FINAL_DASH) {
                    key.pop();
                }
            }
            while key.last().is_some_and(|p| p == ZERO) {
                key.pop();
            }
        }
        key.push(part);
    }
    key
}

/// Components of a `name-version[-pyX.Y[-platform]].ext` archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub name: String,
    pub version: String,
    pub py_version: Option<String>,
    pub platform: Option<String>,
    pub extension: &'static str,
}

impl ArchiveName {
    /// Parses an archive filename. Returns `None` when the name has no
    /// recognized extension or no version segment.
    #[must_use]
    pub fn parse(filename: &str) -> Option<Self> {
        let base = filename.rsplit('/').next().unwrap_or(filename);
        let base = base.split('#').next().unwrap_or(base);

        let extension = ARCHIVE_EXTENSIONS
            .iter()
            .copied()
            .find(|ext| base.len() > ext.len() && base.ends_with(ext))?;
        let stem = &base[..base.len() - extension.len()];

        // Project names may themselves hold hyphens; the version is the
        // first later segment that starts with a digit.
        let segments: Vec<&str> = stem.split('-').collect();
        if segments.len() < 2 {
            return None;
        }
        let version_at = (1..segments.len())
            .find(|&i| segments[i].starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(1);

        let name = segments[..version_at].join("-");
        if name.is_empty() {
            return None;
        }
        let version = segments[version_at];
        if version.is_empty() {
            return None;
        }
        let rest = (version_at + 1 < segments.len()).then(|| segments[version_at + 1..].join("-"));

        let (py_version, platform) = match rest.as_deref().and_then(|r| r.strip_prefix("py")) {
            Some(r) => match r.split_once('-') {
                Some((py, plat)) => (Some(py.to_string()), Some(plat.to_string())),
                None => (Some(r.to_string()), None),
            },
            None => (None, None),
        };

        Some(Self {
            name,
            version: version.to_string(),
            py_version,
            platform,
            extension,
        })
    }

    #[must_use]
    pub fn parsed_version(&self) -> Version {
        Version::parse(&self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
    Compatible,
}

impl Operator {
    // Longest spellings first so `>=` is not read as `>`.
    const SPELLINGS: &'static [(&'static str, Operator)] = &[
        ("===", Operator::Equal),
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        (">=", Operator::GreaterEqual),
        ("<=", Operator::LessEqual),
        ("~=", Operator::Compatible),
        (">", Operator::Greater),
        ("<", Operator::Less),
        ("=", Operator::Equal),
    ];

    fn split_prefix(s: &str) -> Option<(Operator, &str)> {
        Self::SPELLINGS
            .iter()
            .find_map(|(spelling, op)| s.strip_prefix(spelling).map(|rest| (*op, rest)))
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Compatible => "~=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    pub op: Operator,
    pub version: Version,
}

impl VersionSpec {
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            Operator::Equal => candidate == &self.version,
            Operator::NotEqual => candidate != &self.version,
            Operator::GreaterEqual => candidate >= &self.version,
            Operator::LessEqual => candidate <= &self.version,
            Operator::Greater => candidate > &self.version,
            Operator::Less => candidate < &self.version,
            Operator::Compatible => {
                let mut upper = self.version.release();
                if upper.len() < 2 {
                    return candidate >= &self.version;
                }
                upper.pop();
                if let Some(last) = upper.last_mut() {
                    *last += 1;
                }
                let upper = upper
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                candidate >= &self.version && candidate < &Version::parse(&upper)
            }
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// A `name [op version[, op version...]]` requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub specs: Vec<VersionSpec>,
}

impl Requirement {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let op_start = s.find(['<', '>', '=', '!', '~']);
        let (name, spec_str) = match op_start {
            Some(pos) => (s[..pos].trim(), Some(&s[pos..])),
            None => (s, None),
        };

        if name.is_empty() {
            return Err(Error::invalid(format!("requirement \"{s}\" has no name")));
        }
        if name.contains([',', ';', '[', ']']) {
            return Err(Error::invalid(format!(
                "requirement \"{s}\" has an invalid name"
            )));
        }

        let mut specs = Vec::new();
        if let Some(spec_str) = spec_str {
            for part in spec_str.split(',') {
                let part = part.trim();
                let (op, version) = Operator::split_prefix(part).ok_or_else(|| {
                    Error::invalid(format!("bad version specifier \"{part}\" in \"{s}\""))
                })?;
                let version = version.trim();
                if version.is_empty()
                    || version.contains(|c: char| c.is_whitespace() || "<>=!~".contains(c))
                {
                    return Err(Error::invalid(format!(
                        "bad version \"{version}\" in \"{s}\""
                    )));
                }
                specs.push(VersionSpec {
                    op,
                    version: Version::parse(version),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            specs,
        })
    }

    /// Parses one or more requirement strings, each of which may hold
    /// several newline separated requirements. Blank lines and `#`
    /// comments are skipped.
    pub fn parse_many<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Self>> {
        let mut reqs = Vec::new();
        for input in inputs {
            for line in input.as_ref().lines() {
                let line = line.split('#').next().unwrap_or("").trim();
                if line.is_empty() {
                    continue;
                }
                reqs.push(Self::parse(line)?);
            }
        }
        if reqs.is_empty() {
            return Err(Error::invalid("no requirements given"));
        }
        Ok(reqs)
    }

    /// Parses an exact pin, `name==version` (legacy `name=version` is also
    /// accepted). Ranges and other operators are rejected.
    pub fn parse_pin(s: &str) -> Result<(String, String)> {
        let req = Self::parse(s)?;
        match req.specs.as_slice() {
            [spec] if spec.op == Operator::Equal => {
                Ok((req.name, spec.version.as_str().to_string()))
            }
            _ => Err(Error::invalid(format!(
                "\"{s}\" must pin exactly one version with =="
            ))),
        }
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.specs.iter().all(|spec| spec.matches(version))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        let specs: Vec<String> = self.specs.iter().map(ToString::to_string).collect();
        f.write_str(&specs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(v("2.0") > v("1.5"));
        assert!(v("1.5") > v("1.0"));
        assert!(v("1.10") > v("1.9"));
        assert_eq!(v("1.0"), v("1.0.0"));
    }

    #[test]
    fn test_prerelease_ordering() {
        assert!(v("1.0a1") < v("1.0b1"));
        assert!(v("1.0b1") < v("1.0rc1"));
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0dev") < v("1.0a1"));
        assert!(v("1.0") < v("1.0-1"));
        assert!(v("1.0") < v("1.0.post1"));
    }

    #[test]
    fn test_archive_name_parse() {
        let a = ArchiveName::parse("foo-1.0.tar.gz").unwrap();
        assert_eq!(a.name, "foo");
        assert_eq!(a.version, "1.0");
        assert_eq!(a.extension, ".tar.gz");

        let egg = ArchiveName::parse("Foo_Bar-2.1-py2.5-linux-x86_64.egg").unwrap();
        assert_eq!(egg.version, "2.1");
        assert_eq!(egg.py_version.as_deref(), Some("2.5"));
        assert_eq!(egg.platform.as_deref(), Some("linux-x86_64"));

        let frag = ArchiveName::parse("foo-1.2.zip#md5=abc").unwrap();
        assert_eq!(frag.version, "1.2");
        assert_eq!(frag.extension, ".zip");

        let hyphenated = ArchiveName::parse("lib-a-1.0-py2.6.egg").unwrap();
        assert_eq!(hyphenated.name, "lib-a");
        assert_eq!(hyphenated.version, "1.0");
        assert_eq!(hyphenated.py_version.as_deref(), Some("2.6"));

        let tar = ArchiveName::parse("dir/foo-3.tar").unwrap();
        assert_eq!(tar.extension, ".tar");
        assert_eq!(tar.version, "3");
    }

    #[test]
    fn test_archive_name_rejects_unconventional() {
        assert!(ArchiveName::parse("README").is_none());
        assert!(ArchiveName::parse("foo.tar.gz").is_none());
        assert!(ArchiveName::parse("foo-1.0.rpm").is_none());
        assert!(ArchiveName::parse("-1.0.zip").is_none());
        assert!(ArchiveName::parse(".tar.gz").is_none());
    }

    #[test]
    fn test_requirement_parse() {
        let r = Requirement::parse("Foo >= 1.0, < 2.0").unwrap();
        assert_eq!(r.name, "Foo");
        assert_eq!(r.specs.len(), 2);
        assert!(r.matches(&v("1.5")));
        assert!(!r.matches(&v("2.0")));
        assert!(!r.matches(&v("0.9")));

        let bare = Requirement::parse("bar").unwrap();
        assert!(bare.specs.is_empty());
        assert!(bare.matches(&v("0.1")));
    }

    #[test]
    fn test_requirement_parse_errors() {
        assert!(matches!(Requirement::parse(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(Requirement::parse(">=1.0"), Err(Error::InvalidArgument(_))));
        assert!(matches!(Requirement::parse("foo>="), Err(Error::InvalidArgument(_))));
        assert!(matches!(Requirement::parse("foo>=1.0,"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_compatible_release() {
        let r = Requirement::parse("foo~=1.4").unwrap();
        assert!(r.matches(&v("1.4")));
        assert!(r.matches(&v("1.9")));
        assert!(!r.matches(&v("2.0")));
        assert!(!r.matches(&v("1.3")));
    }

    #[test]
    fn test_parse_many() {
        let reqs = Requirement::parse_many(&["foo==1.0\n# comment\n\nbar>2", "baz"]).unwrap();
        assert_eq!(reqs.len(), 3);
        assert!(Requirement::parse_many(&["", "  # nothing"]).is_err());
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(
            Requirement::parse_pin("Foo==1.0").unwrap(),
            ("Foo".to_string(), "1.0".to_string())
        );
        assert_eq!(
            Requirement::parse_pin("Foo=1.0").unwrap(),
            ("Foo".to_string(), "1.0".to_string())
        );
        assert!(Requirement::parse_pin("Foo>=1.0").is_err());
        assert!(Requirement::parse_pin("Foo==1.0,==2.0").is_err());
        assert!(Requirement::parse_pin("Foo").is_err());
    }
}
