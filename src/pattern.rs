//! Frame patterns: line templates with typed placeholders.
//!
//! A template is a regular expression in which `%x` placeholders mark the
//! parts of a line that carry frame information:
//!
//! | Placeholder | Meaning                                              |
//! |-------------|------------------------------------------------------|
//! | `%c`        | class name, dot-separated                            |
//! | `%C`        | class name, slash-separated                          |
//! | `%s`        | source file name, possibly empty                     |
//! | `%l`        | line number, optionally negative                     |
//! | `%t`        | type, a class name with optional `[]` suffixes       |
//! | `%f`        | field name                                           |
//! | `%m`        | method name                                          |
//! | `%a`        | comma-separated argument types, possibly empty       |
//!
//! Every placeholder becomes one capture group, so the remaining expression
//! must only use non-capturing groups (`(?:...)`).

use std::ops::Range;

use lazy_static::lazy_static;
use regex::{Match, Regex};

use crate::error::Result;
use crate::frame::FrameInfo;
use crate::utils::{external_class_name, internal_class_name};

/// The maximum number of placeholders compiled from a single template.
///
/// Any template text after the last compiled placeholder is used verbatim.
pub const MAX_PLACEHOLDERS: usize = 32;

const REGEX_CLASS: &str = r#"(?:[^\s":./()]+\.)*[^\s":./()]+"#;
const REGEX_CLASS_SLASH: &str = r#"(?:[^\s":./()]+/)*[^\s":./()]+"#;
const REGEX_SOURCE_FILE: &str = r"(?:[^:()\d][^:()]*)?";
const REGEX_LINE_NUMBER: &str = r"-?\b\d+\b";
const REGEX_MEMBER: &str = r#"<?[^\s":./()]+>?"#;

lazy_static! {
    static ref REGEX_TYPE: String = format!(r"{}(?:\[\])*", REGEX_CLASS);
    static ref REGEX_ARGUMENTS: String = format!(r"(?:{0}(?:\s*,\s*{0})*)?", *REGEX_TYPE);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placeholder {
    Class,
    ClassSlash,
    SourceFile,
    LineNumber,
    Type,
    Field,
    Method,
    Arguments,
}

impl Placeholder {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'c' => Some(Self::Class),
            'C' => Some(Self::ClassSlash),
            's' => Some(Self::SourceFile),
            'l' => Some(Self::LineNumber),
            't' => Some(Self::Type),
            'f' => Some(Self::Field),
            'm' => Some(Self::Method),
            'a' => Some(Self::Arguments),
            _ => None,
        }
    }

    fn fragment(self) -> &'static str {
        match self {
            Self::Class => REGEX_CLASS,
            Self::ClassSlash => REGEX_CLASS_SLASH,
            Self::SourceFile => REGEX_SOURCE_FILE,
            Self::LineNumber => REGEX_LINE_NUMBER,
            Self::Type => REGEX_TYPE.as_str(),
            Self::Field | Self::Method => REGEX_MEMBER,
            Self::Arguments => REGEX_ARGUMENTS.as_str(),
        }
    }
}

/// A compiled template that can parse frame information out of a line and
/// format other frame information back into the same line.
///
/// # Examples
///
/// ```
/// use proguard_retrace::{FrameInfo, FramePattern};
///
/// let pattern = FramePattern::new(r"\s*at %c\.%m\(%s:%l\)").unwrap();
///
/// let line = "    at a.b.c(SourceFile:12)";
/// let frame = pattern.parse(line).unwrap();
/// assert_eq!(frame.class_name(), "a.b");
/// assert_eq!(frame.method_name(), "c");
/// assert_eq!(frame.line_number(), 12);
///
/// let original = FrameInfo::with_method("com.example.Foo", "bar", 34).with_source_file("Foo.java");
/// assert_eq!(
///     pattern.format(line, &original),
///     "    at com.example.Foo.bar(Foo.java:34)"
/// );
/// ```
#[derive(Clone, Debug)]
pub struct FramePattern {
    template: String,
    regex: Regex,
    // group `i + 1` was produced by `placeholders[i]`
    placeholders: Vec<Placeholder>,
    verbose: bool,
}

impl FramePattern {
    /// Compiles the given template.
    ///
    /// Unknown placeholder letters are dropped. Fails only when the resulting
    /// expression is not a valid regular expression.
    pub fn new(template: &str) -> Result<Self> {
        let (expression, placeholders) = compile(template);
        let regex = Regex::new(&expression)?;

        Ok(Self {
            template: template.to_owned(),
            regex,
            placeholders,
            verbose: false,
        })
    }

    /// Enables verbose formatting of field and method names.
    ///
    /// Verbose output prefixes fields and methods with their type and appends
    /// the argument list to methods, e.g. `void bar(int,boolean)`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The number of placeholders that were compiled into capture groups.
    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Whether the given line matches this pattern.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Parses all frame information from the given line.
    ///
    /// Returns `None` if the line does not match, meaning it does not
    /// describe a frame. A line number that does not fit is parsed as `-1`.
    pub fn parse(&self, line: &str) -> Option<FrameInfo> {
        let groups = self.groups(line)?;

        let mut frame = FrameInfo::default();
        for (placeholder, group) in groups {
            let text = group.as_str();
            if text.is_empty() {
                continue;
            }
            match placeholder {
                Placeholder::Class => frame.class_name = text.to_owned(),
                Placeholder::ClassSlash => frame.class_name = external_class_name(text),
                Placeholder::SourceFile => frame.source_file = text.to_owned(),
                Placeholder::LineNumber => frame.line_number = text.parse().unwrap_or(-1),
                Placeholder::Type => frame.ty = text.to_owned(),
                Placeholder::Field => frame.field_name = text.to_owned(),
                Placeholder::Method => frame.method_name = text.to_owned(),
                Placeholder::Arguments => frame.arguments = text.to_owned(),
            }
        }

        Some(frame)
    }

    /// Formats the given frame information into the given template line.
    ///
    /// This is the reverse of [`parse`](Self::parse): text outside of the
    /// placeholders is copied from `line`, and every placeholder that took
    /// part in the match is replaced with the corresponding field of `frame`.
    /// A line that does not match is returned unchanged.
    pub fn format(&self, line: &str, frame: &FrameInfo) -> String {
        self.format_with_spans(line, frame).0
    }

    /// Same as [`format`](Self::format), but also returns the byte ranges of
    /// the formatted line that were substituted.
    pub(crate) fn format_with_spans(
        &self,
        line: &str,
        frame: &FrameInfo,
    ) -> (String, Vec<Range<usize>>) {
        let Some(groups) = self.groups(line) else {
            return (line.to_owned(), Vec::new());
        };

        let mut formatted = String::with_capacity(line.len() + 32);
        let mut spans = Vec::with_capacity(groups.len());
        let mut cursor = 0;

        for (placeholder, group) in groups {
            if group.start() < cursor {
                continue;
            }
            formatted.push_str(&line[cursor..group.start()]);

            let start = formatted.len();
            self.write_placeholder(&mut formatted, placeholder, frame);
            spans.push(start..formatted.len());

            cursor = group.end();
        }
        formatted.push_str(&line[cursor..]);

        (formatted, spans)
    }

    /// The byte ranges of the placeholders matched in `line`, if it matches.
    pub(crate) fn group_spans(&self, line: &str) -> Option<Vec<Range<usize>>> {
        self.groups(line)
            .map(|groups| groups.into_iter().map(|(_, group)| group.range()).collect())
    }

    fn groups<'l>(&self, line: &'l str) -> Option<Vec<(Placeholder, Match<'l>)>> {
        let captures = self.regex.captures(line)?;

        let groups = self
            .placeholders
            .iter()
            .enumerate()
            .filter_map(|(idx, placeholder)| captures.get(idx + 1).map(|m| (*placeholder, m)))
            .collect();

        Some(groups)
    }

    fn write_placeholder(&self, out: &mut String, placeholder: Placeholder, frame: &FrameInfo) {
        match placeholder {
            Placeholder::Class => out.push_str(&frame.class_name),
            Placeholder::ClassSlash => out.push_str(&internal_class_name(&frame.class_name)),
            Placeholder::SourceFile => out.push_str(&frame.source_file),
            Placeholder::LineNumber => out.push_str(&frame.line_number.to_string()),
            Placeholder::Type => out.push_str(&frame.ty),
            Placeholder::Field => {
                if self.verbose {
                    out.push_str(&frame.ty);
                    out.push(' ');
                }
                out.push_str(&frame.field_name);
            }
            Placeholder::Method => {
                if self.verbose {
                    out.push_str(&frame.ty);
                    out.push(' ');
                }
                out.push_str(&frame.method_name);
                if self.verbose {
                    out.push('(');
                    out.push_str(&frame.arguments);
                    out.push(')');
                }
            }
            Placeholder::Arguments => out.push_str(&frame.arguments),
        }
    }
}

/// Rewrites the placeholders of `template` into capture groups, anchoring the
/// expression to the start of the line.
///
/// Text after the match is not part of the frame and is kept by `format`.
fn compile(template: &str) -> (String, Vec<Placeholder>) {
    let mut expression = String::with_capacity(template.len() * 4);
    let mut placeholders = Vec::new();
    let mut rest = template;

    expression.push_str("^(?:");
    while placeholders.len() < MAX_PLACEHOLDERS {
        let Some(pos) = rest.find('%') else {
            break;
        };
        // a trailing `%` is plain text
        let Some(kind) = rest[pos + 1..].chars().next() else {
            break;
        };

        expression.push_str(&rest[..pos]);
        if let Some(placeholder) = Placeholder::from_char(kind) {
            expression.push('(');
            expression.push_str(placeholder.fragment());
            expression.push(')');
            placeholders.push(placeholder);
        }
        rest = &rest[pos + 1 + kind.len_utf8()..];
    }
    expression.push_str(rest);
    expression.push(')');

    (expression, placeholders)
}
