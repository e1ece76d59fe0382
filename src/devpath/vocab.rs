//! Devpath string parsing and validation: `/phys(/SEG)*[:NS:TEXT]`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DevpathError;

static PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/phys(?:/[0-9a-zA-Z\-_@]+)*$").unwrap());
static CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-zA-Z\-_@]+$").unwrap());
static DEVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-zA-Z\-_@.]+(?::[0-9a-zA-Z\-_@.]+)*$").unwrap());

/// The suffix namespace of a devpath, when one is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Connector,
    Device,
}

impl Namespace {
    fn as_str(self) -> &'static str {
        match self {
            Namespace::Connector => "connector",
            Namespace::Device => "device",
        }
    }
}

/// The three parts of a devpath: `path[:ns:text]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DevpathComponents {
    pub path: String,
    pub ns: Option<Namespace>,
    pub text: Option<String>,
}

fn split_candidate(s: &str) -> Vec<&str> {
    s.splitn(3, ':').collect()
}

/// Returns true iff `s` is a well-formed devpath string.
pub fn is_valid_devpath(s: &str) -> bool {
    let parts = split_candidate(s);
    if (parts.len() > 1 && parts[1].is_empty()) || (parts.len() > 2 && parts[2].is_empty()) {
        return false;
    }
    if !PATH_RE.is_match(parts[0]) {
        return false;
    }
    match parts.len() {
        1 => true,
        3 if parts[1] == "connector" => CONNECTOR_RE.is_match(parts[2]),
        3 if parts[1] == "device" => DEVICE_RE.is_match(parts[2]),
        _ => false,
    }
}

/// Splits a devpath into its `(path, ns, text)` components. Callers must
/// check [`is_valid_devpath`] first; behavior on invalid input is to return
/// [`DevpathError::InvalidFormat`].
pub fn devpath_components(s: &str) -> Result<DevpathComponents, DevpathError> {
    if !is_valid_devpath(s) {
        return Err(DevpathError::InvalidFormat(s.to_string()));
    }
    let parts = split_candidate(s);
    let ns = match parts.get(1) {
        Some(&"connector") => Some(Namespace::Connector),
        Some(&"device") => Some(Namespace::Device),
        _ => None,
    };
    Ok(DevpathComponents {
        path: parts[0].to_string(),
        ns,
        text: parts.get(2).map(|s| s.to_string()),
    })
}

/// The bare plugin path of a devpath, discarding any suffix.
pub fn devpath_plugin(s: &str) -> Result<String, DevpathError> {
    Ok(devpath_components(s)?.path)
}

/// Joins a `(path, ns, text)` triple back into its canonical string form.
pub fn join_devpath(path: &str, ns: Option<Namespace>, text: Option<&str>) -> String {
    let mut out = path.to_string();
    if let Some(ns) = ns {
        out.push(':');
        out.push_str(ns.as_str());
        if let Some(text) = text {
            if !text.is_empty() {
                out.push(':');
                out.push_str(text);
            }
        }
    }
    out
}

impl DevpathComponents {
    pub fn to_devpath(&self) -> String {
        join_devpath(&self.path, self.ns, self.text.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bare_paths() {
        assert!(is_valid_devpath("/phys"));
        assert!(is_valid_devpath("/phys/A/B-1/C_2@x"));
    }

    #[test]
    fn accepts_connector_and_device_suffixes() {
        assert!(is_valid_devpath("/phys/A:connector:PE0"));
        assert!(is_valid_devpath("/phys/A:device:eth0"));
        assert!(is_valid_devpath("/phys/A:device:eth0:0"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(!is_valid_devpath("phys/A"));
        assert!(!is_valid_devpath("/phys/"));
        assert!(!is_valid_devpath("/phys/A:"));
        assert!(!is_valid_devpath("/phys/A::text"));
        assert!(!is_valid_devpath("/phys/A:bogus:text"));
        assert!(!is_valid_devpath("/phys/A:connector:"));
        assert!(!is_valid_devpath(""));
    }

    #[test]
    fn components_round_trip() {
        for d in ["/phys", "/phys/A/B", "/phys/A:connector:PE0", "/phys/A:device:eth0:0"] {
            let c = devpath_components(d).unwrap();
            assert_eq!(c.to_devpath(), d);
        }
    }

    #[test]
    fn plugin_discards_suffix() {
        assert_eq!(devpath_plugin("/phys/A:connector:PE0").unwrap(), "/phys/A");
        assert_eq!(devpath_plugin("/phys/A").unwrap(), "/phys/A");
    }

    #[test]
    fn invalid_devpath_is_an_error() {
        assert!(devpath_components("not-a-devpath").is_err());
    }
}
