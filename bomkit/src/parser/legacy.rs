//! KiCad legacy (4-5) schematic scanner
//!
//! Reads `$Comp` ... `$EndComp` blocks from an `.sch` file with a two-state
//! machine. Inside a block every line is dispatched on its first character:
//!
//! ```text
//! $Comp
//! L Device:R R12                                   generic (L, U, P)
//! U 1 1 5C1D2E3F
//! P 5000 3000
//! AR Path="/5C1D2E3F/5C1E" Ref="R12"  Part="1"     hierarchical alias
//! F 0 "R12" H 5070 3046 50  0000 L CNN             numbered attribute
//! F 4 "1439758" H 5000 3000 50  0001 C CNN "Supplier no"
//! 	1    5000 3000                               opaque body (tab)
//! $EndComp                                         terminator
//! ```
//!
//! The scanner keeps byte spans into each line so the rewriter can swap a
//! single token without disturbing the rest of the line.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::parser::ParseError;

const COMPONENT_START: &str = "$Comp";
const COMPONENT_END: &str = "$EndComp";

/// What a line inside a component block is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Generic,
    Alias,
    Field,
    Body,
    Terminator,
}

/// First character of a line inside `$Comp` to its handler.
const DISPATCH: [(char, Attribute); 7] = [
    ('L', Attribute::Generic),
    ('U', Attribute::Generic),
    ('P', Attribute::Generic),
    ('A', Attribute::Alias),
    ('F', Attribute::Field),
    ('\t', Attribute::Body),
    ('$', Attribute::Terminator),
];

pub fn classify(line: &str) -> Attribute {
    line.chars()
        .next()
        .and_then(|c| DISPATCH.iter().find(|(tag, _)| *tag == c))
        .map(|(_, attribute)| *attribute)
        .unwrap_or(Attribute::Body)
}

/// A whitespace separated token. Quoted sections may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub raw: &'a str,
    pub span: Range<usize>,
}

impl<'a> Token<'a> {
    pub fn is_quoted(&self) -> bool {
        self.raw.len() >= 2 && self.raw.starts_with('"') && self.raw.ends_with('"')
    }

    /// Token text with surrounding quotes removed and escapes resolved.
    pub fn text(&self) -> String {
        unquote(self.raw)
    }
}

/// Strip surrounding quotes and resolve escapes; unquoted text is returned as is.
pub fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        unescape(&raw[1..raw.len() - 1])
    } else {
        raw.to_string()
    }
}

/// Split a line on spaces, keeping quoted runs (`"a b"`, `Path="/x y"`) whole.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b' ' || bytes[i] == b'\t' {
            i += 1;
            continue;
        }
        let start = i;
        let mut in_quotes = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if in_quotes => i += 1,
                b'"' => in_quotes = !in_quotes,
                b' ' | b'\t' if !in_quotes => break,
                _ => {}
            }
            i += 1;
        }
        let end = i.min(bytes.len());
        tokens.push(Token {
            raw: &line[start..end],
            span: start..end,
        });
    }
    tokens
}

/// Resolve `\"` and `\\`; any other backslash is kept as is.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote a value the way eeschema writes it.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `AR Path="..." Ref="..." Part="..."`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasAttribute {
    pub path: String,
    pub designator: String,
    pub part: String,
    pub line: usize,
}

/// `F n "value" orientation x y size flags justify style ["name"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAttribute {
    pub index: u32,
    pub value: String,
    /// Span of the quoted value token within the line.
    pub value_span: Range<usize>,
    /// Trailing quoted name, present on user-defined attributes only.
    pub name: Option<String>,
    pub line: usize,
}

/// One `$Comp` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentBlock {
    /// Line index of `$Comp`.
    pub start: usize,
    /// Line index of `$EndComp`.
    pub end: usize,
    /// `L`, `U` and `P` attributes, tokens after the tag, verbatim.
    pub generic: Vec<(char, Vec<String>)>,
    pub aliases: Vec<AliasAttribute>,
    pub fields: Vec<FieldAttribute>,
    /// Line index of the first opaque body line.
    pub first_body_line: Option<usize>,
}

impl ComponentBlock {
    fn generic(&self, tag: char) -> Option<&[String]> {
        self.generic
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, tokens)| tokens.as_slice())
    }

    pub fn library_reference(&self) -> &str {
        self.generic('L')
            .and_then(|t| t.first())
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Designator from the `L` line, falling back to attribute 0.
    pub fn primary_designator(&self) -> String {
        self.generic('L')
            .and_then(|t| t.get(1))
            .cloned()
            .or_else(|| self.field(0).map(|f| f.value.clone()))
            .unwrap_or_default()
    }

    pub fn is_power_symbol(&self) -> bool {
        self.primary_designator()
            .starts_with(crate::schematic::POWER_PREFIX)
    }

    /// Alias designators if any, else the primary designator.
    pub fn designators(&self) -> Vec<String> {
        if self.aliases.is_empty() {
            vec![self.primary_designator()]
        } else {
            self.aliases.iter().map(|a| a.designator.clone()).collect()
        }
    }

    /// Position from the `P` line.
    pub fn position(&self) -> (String, String) {
        let p = self.generic('P').unwrap_or(&[]);
        (
            p.first().cloned().unwrap_or_else(|| "0".to_string()),
            p.get(1).cloned().unwrap_or_else(|| "0".to_string()),
        )
    }

    pub fn field(&self, index: u32) -> Option<&FieldAttribute> {
        self.fields.iter().find(|f| f.index == index)
    }

    pub fn max_field_index(&self) -> Option<u32> {
        self.fields.iter().map(|f| f.index).max()
    }
}

/// Result of scanning one sheet file. Lines keep their terminators.
#[derive(Debug)]
pub struct ScannedSheet<'a> {
    pub path: PathBuf,
    pub lines: Vec<&'a str>,
    pub components: Vec<ComponentBlock>,
    /// Alias designators declared twice in a component, with their line index.
    pub duplicate_aliases: Vec<(String, usize)>,
}

enum ScanState {
    Outside,
    InComponent(ComponentBlock),
}

/// Line content without its `\n` / `\r\n` terminator.
pub fn content(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

pub fn scan_sheet<'a>(text: &'a str, path: &Path) -> Result<ScannedSheet<'a>, ParseError> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut sheet = ScannedSheet {
        path: path.to_path_buf(),
        lines: Vec::new(),
        components: Vec::new(),
        duplicate_aliases: Vec::new(),
    };
    let mut state = ScanState::Outside;

    for (idx, raw) in lines.iter().enumerate() {
        let line = content(raw);
        state = match state {
            ScanState::Outside => {
                if line.starts_with(COMPONENT_START) && !line.starts_with(COMPONENT_END) {
                    ScanState::InComponent(ComponentBlock {
                        start: idx,
                        ..Default::default()
                    })
                } else {
                    ScanState::Outside
                }
            }
            ScanState::InComponent(mut block) => match classify(line) {
                Attribute::Terminator if line.starts_with(COMPONENT_END) => {
                    block.end = idx;
                    sheet.components.push(block);
                    ScanState::Outside
                }
                Attribute::Terminator => ScanState::InComponent(block),
                Attribute::Generic => {
                    handle_generic(&mut block, line);
                    ScanState::InComponent(block)
                }
                Attribute::Alias => {
                    handle_alias(&mut block, line, idx, &mut sheet.duplicate_aliases);
                    ScanState::InComponent(block)
                }
                Attribute::Field => {
                    handle_field(&mut block, line, idx, path)?;
                    ScanState::InComponent(block)
                }
                Attribute::Body => {
                    block.first_body_line.get_or_insert(idx);
                    ScanState::InComponent(block)
                }
            },
        };
    }

    if let ScanState::InComponent(block) = state {
        return Err(ParseError::Malformed {
            path: path.to_path_buf(),
            line: block.start + 1,
            message: "component block is not terminated by $EndComp".to_string(),
        });
    }

    sheet.lines = lines;
    Ok(sheet)
}

fn handle_generic(block: &mut ComponentBlock, line: &str) {
    let mut tokens = line.split(' ');
    let tag = tokens.next().and_then(|t| t.chars().next()).unwrap_or(' ');
    let values = tokens.filter(|t| !t.is_empty()).map(str::to_string).collect();
    block.generic.push((tag, values));
}

fn handle_alias(
    block: &mut ComponentBlock,
    line: &str,
    idx: usize,
    duplicates: &mut Vec<(String, usize)>,
) {
    let tokens = tokenize(line);
    if tokens.first().map(|t| t.raw) != Some("AR") {
        // Any other `A` line is kept like a generic attribute.
        handle_generic(block, line);
        return;
    }

    let mut alias = AliasAttribute {
        path: String::new(),
        designator: String::new(),
        part: String::new(),
        line: idx,
    };
    for token in &tokens[1..] {
        let Some((key, value)) = token.raw.split_once('=') else {
            continue;
        };
        let value = unquote(value);
        match key {
            "Path" => alias.path = value,
            "Ref" => alias.designator = value,
            "Part" => alias.part = value,
            _ => {}
        }
    }

    if block.aliases.iter().any(|a| a.designator == alias.designator) {
        duplicates.push((alias.designator, idx));
    } else {
        block.aliases.push(alias);
    }
}

fn handle_field(
    block: &mut ComponentBlock,
    line: &str,
    idx: usize,
    path: &Path,
) -> Result<(), ParseError> {
    let tokens = tokenize(line);
    let malformed = |message: &str| ParseError::Malformed {
        path: path.to_path_buf(),
        line: idx + 1,
        message: message.to_string(),
    };

    let index = tokens
        .get(1)
        .and_then(|t| t.raw.parse::<u32>().ok())
        .ok_or_else(|| malformed("attribute line without a numeric index"))?;
    let value = tokens
        .get(2)
        .ok_or_else(|| malformed("attribute line without a value"))?;
    let name = if index >= 4 && tokens.len() > 3 {
        tokens.last().filter(|t| t.is_quoted()).map(|t| t.text())
    } else {
        None
    };

    block.fields.push(FieldAttribute {
        index,
        value: value.text(),
        value_span: value.span.clone(),
        name,
        line: idx,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "EESchema Schematic File Version 4\n\
$Comp\n\
L Device:C C202\n\
U 1 1 5C1D2E3F\n\
P 5000 3000\n\
AR Path=\"/5C1D0001/5C1D2E3F\" Ref=\"C202\"  Part=\"1\" \n\
AR Path=\"/5C1D0002/5C1D2E3F\" Ref=\"C219\"  Part=\"1\" \n\
AR Path=\"/5C1D0003/5C1D2E3F\" Ref=\"C202\"  Part=\"1\" \n\
F 0 \"C202\" H 5025 3100 50  0000 L CNN\n\
F 1 \"100n\" H 5025 2900 50  0000 L CNN\n\
F 2 \"Capacitor_SMD:C_0603\" H 5038 2850 50  0001 C CNN\n\
F 3 \"~\" H 5000 3000 50  0001 C CNN\n\
F 4 \"Murata Electronics\" H 5000 3000 50  0001 C CNN \"Manufacturer\"\n\
\t1    5000 3000\n\
\t1    0    0    -1  \n\
$EndComp\n\
$EndSCHEMATC\n";

    #[test]
    fn test_dispatch_table() {
        assert_eq!(classify("L Device:R R1"), Attribute::Generic);
        assert_eq!(classify("AR Path=\"/x\""), Attribute::Alias);
        assert_eq!(classify("F 0 \"R1\""), Attribute::Field);
        assert_eq!(classify("\t1    5000 3000"), Attribute::Body);
        assert_eq!(classify("$EndComp"), Attribute::Terminator);
        assert_eq!(classify("X unknown"), Attribute::Body);
    }

    #[test]
    fn test_tokenize_quote_aware() {
        let line = r#"F 4 "Murata Electronics" H 5000 3000 50  0001 C CNN "Mfr. no""#;
        let tokens = tokenize(line);
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens[2].text(), "Murata Electronics");
        assert_eq!(&line[tokens[2].span.clone()], "\"Murata Electronics\"");
        assert_eq!(tokens[10].text(), "Mfr. no");
    }

    #[test]
    fn test_escape_round_trip() {
        let value = r#"say "hi" C:\docs"#;
        let quoted = quote(value);
        assert_eq!(quoted, r#""say \"hi\" C:\\docs""#);
        let tokens = tokenize(&quoted);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text(), value);
        assert_eq!(unescape(r"a\b"), r"a\b");
    }

    #[test]
    fn test_scan_component_block() {
        let sheet = scan_sheet(SHEET, Path::new("t.sch")).unwrap();
        assert_eq!(sheet.components.len(), 1);
        let block = &sheet.components[0];
        assert_eq!(block.start, 1);
        assert_eq!(block.end, 15);
        assert_eq!(block.library_reference(), "Device:C");
        assert_eq!(block.primary_designator(), "C202");
        assert_eq!(block.designators(), vec!["C202", "C219"]);
        assert_eq!(block.position(), ("5000".to_string(), "3000".to_string()));
        assert_eq!(block.first_body_line, Some(13));
        assert_eq!(block.fields.len(), 5);
        assert_eq!(block.field(2).unwrap().value, "Capacitor_SMD:C_0603");
        assert_eq!(block.field(0).unwrap().name, None);
        assert_eq!(
            block.field(4).unwrap().name.as_deref(),
            Some("Manufacturer")
        );
        assert_eq!(sheet.duplicate_aliases, vec![("C202".to_string(), 7)]);
    }

    #[test]
    fn test_lines_keep_terminators() {
        let text = "$Comp\r\nL R R1\r\n$EndComp\r\n";
        let sheet = scan_sheet(text, Path::new("crlf.sch")).unwrap();
        assert_eq!(sheet.lines.concat(), text);
        assert_eq!(sheet.components[0].primary_designator(), "R1");
    }

    #[test]
    fn test_unterminated_component() {
        let err = scan_sheet("$Comp\nL R R1\n", Path::new("bad.sch")).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_field_without_index_is_malformed() {
        let err = scan_sheet("$Comp\nF x \"a\"\n$EndComp\n", Path::new("bad.sch")).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 2, .. }));
    }
}
