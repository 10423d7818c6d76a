//! Retracing of whole crash logs.

use std::io::{BufRead, BufWriter, Write};
use std::ops::Range;

use lazy_static::lazy_static;
use tracing::{debug, trace};

use crate::error::Result;
use crate::mapper::FrameRemapper;
use crate::pattern::FramePattern;
use crate::utils::{is_token_delimiter, split_with_delimiters, trim_common_prefix};

// `com.example.Foo.bar`
const REGEX_CLASS_METHOD: &str = r"%c\.%m";
// `(Foo.java:123:0) ~[0]`, `()(Foo.java:123)` or no source info at all
const REGEX_SOURCE_LINE: &str = r"(?:\(\))?(?:\((?:%s)?(?::?%l)?(?::\d+)?\))?\s*(?:~\[.*\])?";
// `at o.afc.b + 45(:45)`
const REGEX_OPTIONAL_SOURCE_LINE_INFO: &str = r"(?:\+\s+[0-9]+)?";

// Only one class per line can be matched, so the cast target has to be long
// enough to not be an obfuscated class itself.
const REGEX_CAST1: &str = r".*?\bjava\.lang\.ClassCastException: %c cannot be cast to .{5,}";
const REGEX_CAST2: &str = r".*?\bjava\.lang\.ClassCastException: .* cannot be cast to %c";
const REGEX_NULL_FIELD_READ: &str = r".*?\bjava\.lang\.NullPointerException: Attempt to read from field '%t %c\.%f' on a null object reference";
const REGEX_NULL_FIELD_WRITE: &str = r".*?\bjava\.lang\.NullPointerException: Attempt to write to field '%t %c\.%f' on a null object reference";
const REGEX_NULL_METHOD: &str = r".*?\bjava\.lang\.NullPointerException: Attempt to invoke (?:virtual|interface) method '%t %c\.%m\(%a\)' on a null object reference";
const REGEX_RETURN_VALUE_NULL1: &str = r#".*?\bjava\.lang\.NullPointerException: Cannot invoke ".*" because the return value of "%c\.%m\(%a\)" is null"#;
const REGEX_RETURN_VALUE_NULL2: &str = r#".*?\bjava\.lang\.NullPointerException: Cannot invoke "%c\.%m\(%a\)" because the return value of ".*" is null"#;
const REGEX_BECAUSE_IS_NULL: &str = r#".*?\bbecause "%c\.%f" is null"#;
// `Something: com.example.FooException: something`, which has to cover the
// whole line so it cannot pick a word out of any message
const REGEX_THROW: &str = r#"(?:.*?[:"]\s+)?%c(?::.*)?$"#;

lazy_static! {
    static ref REGEX_AT: String = format!(
        r".*?\bat\s+{}\s*{}{}",
        REGEX_CLASS_METHOD, REGEX_OPTIONAL_SOURCE_LINE_INFO, REGEX_SOURCE_LINE
    );

    /// The built-in template for stack frames and exception messages.
    ///
    /// Covers `at` frames, class cast exceptions, null pointer messages about
    /// fields and methods, and `Class: message` lines.
    pub static ref DEFAULT_TEMPLATE: String = [
        REGEX_AT.as_str(),
        REGEX_CAST1,
        REGEX_CAST2,
        REGEX_NULL_FIELD_READ,
        REGEX_NULL_FIELD_WRITE,
        REGEX_NULL_METHOD,
        REGEX_RETURN_VALUE_NULL1,
        REGEX_BECAUSE_IS_NULL,
        REGEX_THROW,
    ]
    .iter()
    .map(|alternative| format!("(?:{alternative})"))
    .collect::<Vec<_>>()
    .join("|");

    /// The built-in template for the first method of
    /// `Cannot invoke "..." because the return value of "..." is null`,
    /// which names two methods on the same line.
    pub static ref SECONDARY_TEMPLATE: String = format!("(?:{REGEX_RETURN_VALUE_NULL2})");

    static ref DEFAULT_PATTERN: FramePattern =
        FramePattern::new(&DEFAULT_TEMPLATE).expect("built-in template is valid");
    static ref SECONDARY_PATTERN: FramePattern =
        FramePattern::new(&SECONDARY_TEMPLATE).expect("built-in template is valid");
}

/// Options for [`Retrace`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetraceOptions {
    /// Print field types and full method signatures.
    pub verbose: bool,
    /// Additionally replace every token of a line that is an obfuscated
    /// class name, even outside of recognized frames.
    pub all_class_names: bool,
    /// A custom template replacing [`DEFAULT_TEMPLATE`].
    pub regex: Option<String>,
}

/// Retraces obfuscated crash logs.
///
/// # Examples
///
/// ```
/// use proguard_retrace::{Retrace, RetraceOptions};
///
/// let mapping = "\
/// com.example.Foo -> a:
///     1:3:void bar():10:12 -> b
/// ";
/// let retrace = Retrace::from_mapping(mapping.as_bytes(), &RetraceOptions::default()).unwrap();
///
/// assert_eq!(
///     retrace.retrace_str("java.lang.IllegalStateException: broken state\n    at a.b(SourceFile:2)\n"),
///     "java.lang.IllegalStateException: broken state\n    at com.example.Foo.bar(Foo.java:11)\n"
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Retrace {
    primary: FramePattern,
    secondary: FramePattern,
    remapper: FrameRemapper,
    all_class_names: bool,
}

impl Retrace {
    /// Creates a retracer for an already loaded mapping.
    ///
    /// Fails if the custom template in `options` is not a valid pattern.
    pub fn new(remapper: FrameRemapper, options: &RetraceOptions) -> Result<Self> {
        let primary = match &options.regex {
            Some(template) => FramePattern::new(template)?,
            None => DEFAULT_PATTERN.clone(),
        };

        Ok(Self {
            primary: primary.with_verbose(options.verbose),
            secondary: SECONDARY_PATTERN.clone().with_verbose(options.verbose),
            remapper,
            all_class_names: options.all_class_names,
        })
    }

    /// Reads the whole mapping and creates a retracer for it.
    ///
    /// Malformed mapping lines are logged and skipped.
    pub fn from_mapping<R: BufRead>(mapping: R, options: &RetraceOptions) -> Result<Self> {
        Self::new(FrameRemapper::from_reader(mapping)?, options)
    }

    /// The loaded mapping.
    pub fn remapper(&self) -> &FrameRemapper {
        &self.remapper
    }

    /// Retraces every line of `input` into `output`.
    ///
    /// Line terminators are preserved, and invalid UTF-8 is replaced.
    pub fn retrace<R: BufRead, W: Write>(&self, mut input: R, output: W) -> Result<()> {
        let mut output = BufWriter::new(output);
        let mut buf = Vec::new();
        let mut retraced = String::new();
        let mut lines = 0usize;

        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            lines += 1;

            retraced.clear();
            self.retrace_raw_line(&String::from_utf8_lossy(&buf), &mut retraced);
            output.write_all(retraced.as_bytes())?;
        }

        output.flush()?;
        debug!(lines, "retraced crash log");
        Ok(())
    }

    /// Retraces a whole crash log held in memory.
    pub fn retrace_str(&self, input: &str) -> String {
        let mut retraced = String::with_capacity(input.len());
        for line in input.split_inclusive('\n') {
            self.retrace_raw_line(line, &mut retraced);
        }
        retraced
    }

    /// Retraces a single line without its terminator.
    ///
    /// Returns one line per original frame. A line can expand into several
    /// lines when the mapping is ambiguous. In that case all lines after the
    /// first have the prefix they share with the line above blanked out.
    pub fn retrace_line(&self, line: &str) -> Vec<String> {
        let frame = self.primary.parse(line);

        let first_pass: Vec<(String, Vec<Range<usize>>)> = match &frame {
            Some(frame) => self
                .remapper
                .transform(frame)
                .iter()
                .map(|original| self.primary.format_with_spans(line, original))
                .collect(),
            None => vec![(line.to_owned(), Vec::new())],
        };

        let mut retraced = Vec::with_capacity(first_pass.len());
        for (line, spans) in first_pass {
            self.second_pass(line, &spans, &mut retraced);
        }

        if frame.is_none() && retraced.len() == 1 && retraced[0] == line {
            trace!(line, "no frame found");
        }

        // Alternatives can only be told apart by the line number.
        let ambiguous = frame.map_or(true, |frame| frame.line_number == 0);
        if ambiguous && retraced.len() > 1 {
            retraced = trim_alternatives(retraced);
        }

        if self.all_class_names {
            for line in &mut retraced {
                *line = self.deobfuscate_tokens(line);
            }
        }

        retraced
    }

    /// Retraces a line as read from the input, including its terminator.
    fn retrace_raw_line(&self, raw: &str, out: &mut String) {
        let (line, terminator) = split_terminator(raw);
        let separator = if terminator.is_empty() { "\n" } else { terminator };

        for (idx, retraced) in self.retrace_line(line).iter().enumerate() {
            if idx > 0 {
                out.push_str(separator);
            }
            out.push_str(retraced);
        }
        out.push_str(terminator);
    }

    /// Applies the secondary pattern to an already retraced line.
    ///
    /// Only parts of the line that were not substituted before are touched.
    fn second_pass(&self, line: String, substituted: &[Range<usize>], out: &mut Vec<String>) {
        let Some(frame) = self.secondary.parse(&line) else {
            out.push(line);
            return;
        };

        let overlaps = self.secondary.group_spans(&line).map_or(false, |spans| {
            spans
                .iter()
                .any(|span| substituted.iter().any(|other| ranges_overlap(span, other)))
        });
        if overlaps {
            out.push(line);
            return;
        }

        out.extend(
            self.remapper
                .transform(&frame)
                .iter()
                .map(|original| self.secondary.format(&line, original)),
        );
    }

    /// Replaces every token of `line` that is an obfuscated class name.
    fn deobfuscate_tokens(&self, line: &str) -> String {
        let mut deobfuscated = String::with_capacity(line.len());
        for token in split_with_delimiters(line, is_token_delimiter) {
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if is_token_delimiter(c) => deobfuscated.push(c),
                _ => deobfuscated.push_str(self.remapper.original_class_name(token)),
            }
        }
        deobfuscated
    }
}

fn trim_alternatives(lines: Vec<String>) -> Vec<String> {
    let mut trimmed = Vec::with_capacity(lines.len());
    let mut previous: Option<&str> = None;

    for line in &lines {
        match previous {
            Some(previous) => {
                let line = trim_common_prefix(line, previous);
                if !line.is_empty() {
                    trimmed.push(line);
                }
            }
            None => trimmed.push(line.clone()),
        }
        previous = Some(line);
    }

    trimmed
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(stripped) = line.strip_suffix("\r\n") {
        (stripped, "\r\n")
    } else if let Some(stripped) = line.strip_suffix('\n') {
        (stripped, "\n")
    } else {
        (line, "")
    }
}

fn ranges_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
