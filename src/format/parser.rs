//! Number-format mini-language parser.
//!
//! A format string is split into up to four `;`-separated sections
//! (positive / negative / zero / text), each tokenised and classified as
//! `General`, `Date`, `Duration`, or `Text`. [`StyleTable`](crate::style_table::StyleTable)
//! uses the classification to decide whether a raw cell number should be
//! reinterpreted as a date, a duration, or left alone.

use super::token_cursor::TokenCursor;

const LITERAL_SYMBOLS: &str = ",!&%+-$\u{20AC}\u{A3}(){}/@123456789";
const DATE_RUN_CHARS: [char; 6] = ['y', 'm', 'd', 'h', 's', 'g'];

/// One token of a tokenised format section.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    DatePart(String),
    DurationPart(String),
    AmPm,
    GeneralMarker,
    NumberPlaceholder(char),
    DecimalPoint,
    Literal(String),
    Scientific,
    Whitespace,
    /// Post-pass result: a `.` followed by a run of `0`s, coalesced into one sub-second token.
    SubSecond(usize),
}

/// The classification of a single format section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    General,
    Date,
    Duration,
    Text,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub section_type: SectionType,
    pub tokens: Vec<Token>,
}

/// A fully parsed number format: up to four sections, or `valid = false` if
/// the source string mixed date tokens with general/text tokens in a single
/// section — that is a syntax error recovered by falling back to
/// `General` for the whole format.
#[derive(Debug, Clone)]
pub struct Format {
    pub sections: Vec<Section>,
    pub valid: bool,
}

/// What kind of value a format is being asked to render, for section selection.
#[derive(Debug, Clone, Copy)]
pub enum ValueKind {
    Text,
    DateTime,
    Duration(f64),
    Number(f64),
}

impl Format {
    /// Parse a raw xlsx number-format string.
    pub fn parse(format_str: &str) -> Format {
        let raw_sections = split_sections(format_str);
        let mut sections = Vec::with_capacity(raw_sections.len());
        for raw in &raw_sections {
            let tokens = coalesce_subseconds(tokenize_section(raw));
            match classify(&tokens) {
                Ok(section_type) => sections.push(Section {
                    section_type,
                    tokens,
                }),
                Err(()) => {
                    log::debug!("format syntax error in section {raw:?}, falling back to General");
                    return Format {
                        sections: vec![Section {
                            section_type: SectionType::General,
                            tokens: Vec::new(),
                        }],
                        valid: false,
                    };
                }
            }
        }
        if sections.is_empty() {
            sections.push(Section {
                section_type: SectionType::General,
                tokens: Vec::new(),
            });
        }
        Format {
            sections,
            valid: true,
        }
    }

    /// The built-in `General` format, used whenever a style index has no
    /// custom format string or a custom format fails to parse.
    pub fn general() -> Format {
        Format {
            sections: vec![Section {
                section_type: SectionType::General,
                tokens: Vec::new(),
            }],
            valid: true,
        }
    }

    pub fn select_section(&self, kind: ValueKind) -> Option<&Section> {
        match kind {
            ValueKind::Text => self.sections.get(3),
            ValueKind::DateTime => self
                .sections
                .iter()
                .find(|s| s.section_type == SectionType::Date),
            ValueKind::Duration(v) | ValueKind::Number(v) => self.numeric_section(v),
        }
    }

    /// Section selection for numeric/duration values. Reference behaviour
    /// (see DESIGN.md "numeric section by sign"): with three or more
    /// sections the third (index 2) always wins, regardless of sign; with
    /// fewer sections the positive/negative split is honoured.
    fn numeric_section(&self, value: f64) -> Option<&Section> {
        match self.sections.len() {
            0 => None,
            1 => self.sections.first(),
            2 => {
                if value.is_sign_negative() && value != 0.0 {
                    self.sections.get(1)
                } else {
                    self.sections.first()
                }
            }
            _ => self.sections.get(2),
        }
    }
}

fn classify(tokens: &[Token]) -> Result<SectionType, ()> {
    let has_date = tokens.iter().any(|t| matches!(t, Token::DatePart(_)));
    let has_duration = tokens.iter().any(|t| matches!(t, Token::DurationPart(_)));
    let has_general = tokens.iter().any(|t| matches!(t, Token::GeneralMarker));
    let has_literal = tokens
        .iter()
        .any(|t| matches!(t, Token::Literal(_) | Token::Whitespace));
    let has_numeric = tokens
        .iter()
        .any(|t| matches!(t, Token::NumberPlaceholder(_) | Token::SubSecond(_)));

    if has_date && has_general {
        // A literal separator (`-`, `:`, ` `, ...) is normal punctuation
        // inside a date/time format; only the "General" marker itself
        // cannot coexist with date tokens in one section.
        return Err(());
    }
    if has_date && has_duration {
        return Ok(SectionType::Duration);
    }
    if has_date {
        return Ok(SectionType::Date);
    }
    if has_general {
        return Ok(SectionType::General);
    }
    if has_literal && !has_numeric {
        return Ok(SectionType::Text);
    }
    Ok(SectionType::General)
}

/// Split on unquoted, unbracketed `;`. Truncates to four sections — the
/// documented Excel maximum — per the resolved open question in DESIGN.md.
fn split_sections(format_str: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut bracket_depth: i32 = 0;
    let mut chars = format_str.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '[' if !in_quote => {
                bracket_depth += 1;
                current.push(c);
            }
            ']' if !in_quote => {
                bracket_depth -= 1;
                current.push(c);
            }
            '\\' if !in_quote => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ';' if !in_quote && bracket_depth <= 0 => {
                sections.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    sections.push(current);
    if sections.len() > 4 {
        sections.truncate(4);
    }
    sections
}

fn tokenize_section(text: &str) -> Vec<Token> {
    let mut cursor = TokenCursor::new(text);
    let mut tokens = Vec::new();

    'outer: while !cursor.is_eof() {
        if cursor.match_literal("general", true) {
            tokens.push(Token::GeneralMarker);
            continue;
        }
        if let Some(inner) = cursor.match_enclosed('[', ']') {
            tokens.push(classify_bracket(&inner));
            continue;
        }
        if cursor.match_literal("am/pm", true) || cursor.match_literal("a/p", true) {
            tokens.push(Token::AmPm);
            continue;
        }
        for &ch in &DATE_RUN_CHARS {
            if let Some(n) = cursor.match_run_of(ch) {
                tokens.push(Token::DatePart(ch.to_string().repeat(n)));
                continue 'outer;
            }
        }
        if cursor.match_literal("e+", true) || cursor.match_literal("e-", true) {
            tokens.push(Token::Scientific);
            continue;
        }
        if let Some(c) = cursor.match_any_of("0#?") {
            tokens.push(Token::NumberPlaceholder(c));
            continue;
        }
        if cursor.match_any_of(".").is_some() {
            tokens.push(Token::DecimalPoint);
            continue;
        }
        if cursor.peek(0) == Some('\\') {
            cursor.advance(1);
            if let Some(escaped) = cursor.peek(0) {
                cursor.advance(1);
                tokens.push(Token::Literal(escaped.to_string()));
            }
            continue;
        }
        if cursor.peek(0) == Some('*') || cursor.peek(0) == Some('_') {
            cursor.advance(1);
            if let Some(filler) = cursor.peek(0) {
                cursor.advance(1);
                tokens.push(Token::Literal(filler.to_string()));
            }
            continue;
        }
        if let Some(inner) = cursor.match_enclosed('"', '"') {
            tokens.push(Token::Literal(inner));
            continue;
        }
        if let Some(c) = cursor.match_any_of(LITERAL_SYMBOLS) {
            tokens.push(Token::Literal(c.to_string()));
            continue;
        }
        if cursor.match_run_of(' ').is_some() {
            tokens.push(Token::Whitespace);
            continue;
        }
        // Unrecognised symbol: consume one char as a literal so the loop always makes progress.
        if let Some(c) = cursor.peek(0) {
            cursor.advance(1);
            tokens.push(Token::Literal(c.to_string()));
        }
    }

    tokens
}

/// `[h]`, `[mm]`, `[ss]` are duration runs; anything else bracketed (colour
/// codes, locale/currency codes) is an opaque literal for our purposes.
fn classify_bracket(inner: &str) -> Token {
    let first = match inner.chars().next() {
        Some(c) => c,
        None => return Token::Literal("[]".to_string()),
    };
    let is_duration_char = matches!(first.to_ascii_lowercase(), 'h' | 'm' | 's');
    let all_same = inner.chars().all(|c| c.eq_ignore_ascii_case(&first));
    if is_duration_char && all_same {
        Token::DurationPart(inner.to_string())
    } else {
        Token::Literal(format!("[{inner}]"))
    }
}

fn coalesce_subseconds(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if matches!(tokens[i], Token::DecimalPoint) {
            let mut j = i + 1;
            let mut count = 0;
            while j < tokens.len() && matches!(tokens[j], Token::NumberPlaceholder('0')) {
                count += 1;
                j += 1;
            }
            if count > 0 {
                out.push(Token::SubSecond(count));
                i = j;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_date_format() {
        let fmt = Format::parse("yyyy-mm-dd");
        assert!(fmt.valid);
        assert_eq!(fmt.sections[0].section_type, SectionType::Date);
    }

    #[test]
    fn classifies_duration_format() {
        let fmt = Format::parse("[h]:mm:ss");
        assert!(fmt.valid);
        assert_eq!(fmt.sections[0].section_type, SectionType::Duration);
    }

    #[test]
    fn classifies_general_format() {
        let fmt = Format::parse("General");
        assert!(fmt.valid);
        assert_eq!(fmt.sections[0].section_type, SectionType::General);
    }

    #[test]
    fn classifies_text_format() {
        let fmt = Format::parse("\"Item: \"@");
        assert!(fmt.valid);
        assert_eq!(fmt.sections[0].section_type, SectionType::Text);
    }

    #[test]
    fn classifies_number_format_as_general() {
        let fmt = Format::parse("#,##0.00");
        assert!(fmt.valid);
        assert_eq!(fmt.sections[0].section_type, SectionType::General);
    }

    #[test]
    fn mixing_date_and_general_is_invalid() {
        let fmt = Format::parse("yyyy General");
        assert!(!fmt.valid);
        assert_eq!(fmt.sections[0].section_type, SectionType::General);
    }

    #[test]
    fn splits_four_sections_and_truncates_the_rest() {
        let fmt = Format::parse("0;-0;0;@;ignored");
        assert_eq!(fmt.sections.len(), 4);
        assert_eq!(fmt.sections[3].section_type, SectionType::Text);
    }

    #[test]
    fn splitting_respects_quotes_and_brackets() {
        let fmt = Format::parse("\"a;b\"0;[h;m]0");
        // The quoted `;` and the bracketed `;` must not split sections.
        assert_eq!(fmt.sections.len(), 2);
    }

    #[test]
    fn coalesces_millisecond_runs() {
        let fmt = Format::parse("h:mm:ss.000");
        let has_subsecond = fmt.sections[0]
            .tokens
            .iter()
            .any(|t| matches!(t, Token::SubSecond(3)));
        assert!(has_subsecond);
    }

    #[test]
    fn numeric_section_selection_uses_third_section_quirk() {
        let fmt = Format::parse("0.00;(0.00);\"zero\"");
        let chosen = fmt.select_section(ValueKind::Number(5.0)).unwrap();
        assert_eq!(chosen.section_type, SectionType::General);
        let chosen_neg = fmt.select_section(ValueKind::Number(-5.0)).unwrap();
        // Same section regardless of sign once >= 3 sections exist.
        assert!(
            std::ptr::eq(chosen, chosen_neg),
            "third section should be selected for both signs"
        );
    }

    #[test]
    fn numeric_section_selection_honours_sign_with_two_sections() {
        let fmt = Format::parse("0.00;(0.00)");
        let pos = fmt.select_section(ValueKind::Number(5.0)).unwrap();
        let neg = fmt.select_section(ValueKind::Number(-5.0)).unwrap();
        assert!(!std::ptr::eq(pos, neg));
    }

    #[test]
    fn text_value_uses_fourth_section() {
        let fmt = Format::parse("0;0;0;@");
        let section = fmt.select_section(ValueKind::Text).unwrap();
        assert_eq!(section.section_type, SectionType::Text);
    }

    #[test]
    fn text_value_with_no_fourth_section_has_no_selection() {
        let fmt = Format::parse("0.00");
        assert!(fmt.select_section(ValueKind::Text).is_none());
    }
}
