//! Format catalog read from a C++ header of `<Name>fmt[]` declarations

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::catalog::FormatCatalog;
use crate::error::{Error, Result};

/// Format strings parsed from declarations like
/// `char constexpr SkillLineAbilityfmt[] = "niiiixxiiiiixx";`
#[derive(Debug, Clone, Default)]
pub struct HeaderFormatCatalog {
    formats: BTreeMap<String, String>,
}

impl HeaderFormatCatalog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("format header {}", path.display()))
            }
            _ => Error::Io(e),
        })?;
        Self::parse(&source)
    }

    pub fn parse(source: &str) -> Result<Self> {
        let re = Regex::new(r#"char\s+(?:const\s+)?constexpr\s+(\w+)fmt\[\]\s*=\s*"([^"]+)""#)
            .map_err(|e| Error::Catalog(e.to_string()))?;

        // Declarations are one per line; commented-out ones are ignored
        let formats: BTreeMap<String, String> = source
            .lines()
            .filter(|line| !line.trim_start().starts_with("//"))
            .filter_map(|line| re.captures(line))
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect();

        if formats.is_empty() {
            return Err(Error::Catalog("no format declarations found".into()));
        }
        Ok(Self { formats })
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl FormatCatalog for HeaderFormatCatalog {
    fn lookup_format(&self, name: &str) -> Option<&str> {
        self.formats.get(name).map(String::as_str)
    }

    fn table_names(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"
#ifndef DBCFMT_H
#define DBCFMT_H

char constexpr Achievementfmt[] = "niixssssssssssssssssxxxxxxxxxxxxxxxxxxiixixxxxxxxxxxxxxxxxxxii";
char constexpr SkillLineAbilityfmt[] = "niiiixxiiiiixx";
char constexpr SpellEntryfmt[]="nis";
// char constexpr Disabledfmt[] = "nn";
#endif
"#;

    #[test]
    fn test_parse_declarations() {
        let catalog = HeaderFormatCatalog::parse(HEADER).unwrap();
        assert_eq!(catalog.lookup_format("SkillLineAbility"), Some("niiiixxiiiiixx"));
        assert_eq!(catalog.resolve_format("Spell"), Some("nis"));
        assert!(catalog.table_names().contains(&"Achievement".to_string()));
        assert_eq!(catalog.lookup_format("Disabled"), None);
    }

    #[test]
    fn test_empty_format_declaration_ignored() {
        let source = "char constexpr Emptyfmt[] = \"\";\nchar constexpr Talentfmt[] = \"nii\";\n";
        let catalog = HeaderFormatCatalog::parse(source).unwrap();
        assert_eq!(catalog.lookup_format("Empty"), None);
        assert_eq!(catalog.lookup_format("Talent"), Some("nii"));
    }

    #[test]
    fn test_parse_rejects_empty_source() {
        assert!(matches!(
            HeaderFormatCatalog::parse("int main() {}"),
            Err(Error::Catalog(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HeaderFormatCatalog::open(dir.path().join("DBCfmt.h")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DBCfmt.h");
        std::fs::write(&path, HEADER).unwrap();
        let catalog = HeaderFormatCatalog::open(&path).unwrap();
        assert_eq!(catalog.len(), 3);
    }
}
