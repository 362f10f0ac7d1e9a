use mtl_core::{Location, TranslationError};

/// One `key = value` line. The value is the raw text after comment
/// stripping, untrimmed of interior whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniProperty {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// One `[Header]` block with its properties in file order. Duplicate keys
/// are retained; trigger lines depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    pub properties: Vec<IniProperty>,
    pub line: usize,
}

impl IniSection {
    /// First value for `key`, case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(key))
            .map(|p| p.value.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a IniProperty> {
        let key = key.to_ascii_lowercase();
        self.properties
            .iter()
            .filter(move |p| p.key.to_ascii_lowercase() == key)
    }

    /// True when the header's first word matches `word`, case-insensitive.
    pub fn is_kind(&self, word: &str) -> bool {
        self.name
            .split_whitespace()
            .next()
            .is_some_and(|first| first.eq_ignore_ascii_case(word))
    }

    /// Header text after the first word, trimmed.
    pub fn name_rest(&self) -> &str {
        match self.name.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim(),
            None => "",
        }
    }
}

/// Strips a trailing `;` comment, leaving `;` inside double quotes alone.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

/// Parses INI-structured source into ordered sections.
pub fn parse_ini(source: &str, file: &str) -> Result<Vec<IniSection>, TranslationError> {
    let mut sections: Vec<IniSection> = Vec::new();
    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                return Err(TranslationError::new(
                    "UNTERMINATED_SECTION_HEADER",
                    format!("section header is missing a closing bracket: {line}"),
                )
                .at(Location::new(file, line_number)));
            };
            sections.push(IniSection {
                name: name.trim().to_string(),
                properties: Vec::new(),
                line: line_number,
            });
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(TranslationError::new(
                "MALFORMED_LINE",
                format!("expected `key = value` or a section header, found: {line}"),
            )
            .at(Location::new(file, line_number)));
        };
        let Some(section) = sections.last_mut() else {
            return Err(TranslationError::new(
                "PROPERTY_OUTSIDE_SECTION",
                format!("property `{}` appears before any section header", key.trim()),
            )
            .at(Location::new(file, line_number)));
        };
        section.properties.push(IniProperty {
            key: key.trim().to_ascii_lowercase(),
            value: value.trim().to_string(),
            line: line_number,
        });
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_with_ordered_duplicate_keys() {
        let source = "[State attack]\ntype = ChangeState\ntrigger1 = Time > 3\ntrigger1 = Command = \"fwd\"\nvalue = 200\n";
        let sections = parse_ini(source, "a.mtl").expect("source should parse");
        assert_eq!(sections.len(), 1);
        let section = &sections[0];
        assert_eq!(section.name, "State attack");
        assert_eq!(section.get("type"), Some("ChangeState"));
        assert_eq!(section.get_all("trigger1").count(), 2);
        assert_eq!(section.properties[3].line, 5);
    }

    #[test]
    fn strips_comments_outside_strings_only() {
        let source = "[S]\nvalue = 1 ; tail comment\ntext = \"a;b\" ; real comment\n";
        let sections = parse_ini(source, "a.mtl").expect("source should parse");
        assert_eq!(sections[0].get("value"), Some("1"));
        assert_eq!(sections[0].get("text"), Some("\"a;b\""));
    }

    #[test]
    fn keys_are_lowercased_but_header_case_is_preserved() {
        let source = "[Statedef 200, Attack]\nType = S\n";
        let sections = parse_ini(source, "a.mtl").expect("source should parse");
        assert_eq!(sections[0].name, "Statedef 200, Attack");
        assert!(sections[0].is_kind("statedef"));
        assert_eq!(sections[0].name_rest(), "200, Attack");
        assert_eq!(sections[0].get("type"), Some("S"));
    }

    #[test]
    fn rejects_property_before_a_section() {
        let err = parse_ini("x = 1\n", "a.mtl").expect_err("should fail");
        assert_eq!(err.code, "PROPERTY_OUTSIDE_SECTION");
        assert_eq!(err.location.as_ref().map(|l| l.line), Some(1));
    }

    #[test]
    fn rejects_unterminated_header() {
        let err = parse_ini("[Statedef 0\n", "a.mtl").expect_err("should fail");
        assert_eq!(err.code, "UNTERMINATED_SECTION_HEADER");
    }
}
