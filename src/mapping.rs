//! A Parser for Proguard Mapping Files.
//!
//! The mapping file format is described
//! [here](https://www.guardsquare.com/en/products/proguard/manual/retrace).
//!
//! A mapping consists of class lines, each followed by the member lines of
//! that class:
//!
//! ```text
//! originalclassname -> obfuscatedclassname:
//!     originalfieldtype originalfieldname -> obfuscatedfieldname
//!     [startline:endline:]originalreturntype [originalclassname.]originalmethodname(originalargumenttype,...)[:originalstartline[:originalendline]] -> obfuscatedmethodname
//! ```

use std::io::BufRead;
use std::str;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Result;

/// Error when parsing a proguard mapping line.
///
/// Since the mapping is parsed line-by-line, an error also contains the
/// offending line and its 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line_number}: {kind}")]
pub struct ParseError {
    line_number: usize,
    line: String,
    kind: ParseErrorKind,
}

impl ParseError {
    /// The 1-based number of the offending line.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// The offending line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// The specific parse Error.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

/// The specific parse Error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// The line failed utf-8 conversion.
    #[error("line is not valid utf-8: {0}")]
    Utf8(#[from] str::Utf8Error),
    /// A class line without `->` or without the trailing `:`.
    #[error("class line is not of the form `original -> obfuscated:`")]
    MalformedClass,
    /// A member line without a space between its type and its name.
    #[error("missing space between member type and name")]
    MissingSeparator,
    /// A member line without `->`.
    #[error("missing `->` before the obfuscated member name")]
    MissingArrow,
    /// A line number that is not an integer.
    #[error("invalid line number `{0}`")]
    InvalidLineNumber(String),
}

/// A proguard line mapping.
///
/// Maps start/end lines of a minified method to original start/end lines.
/// A line of `0` means the line is not known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LineMapping {
    /// Start Line of the minified method.
    pub startline: i64,
    /// End Line of the minified method, inclusive.
    pub endline: i64,
    /// The original Start Line.
    pub original_startline: i64,
    /// The original End Line, inclusive.
    pub original_endline: i64,
}

/// A field mapping line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMapping<'s> {
    /// Type of the field.
    pub ty: &'s str,
    /// Original name of the field.
    pub original: &'s str,
    /// Obfuscated name of the field.
    pub obfuscated: &'s str,
    /// Original class of a field that was qualified with a foreign class name.
    pub original_class: Option<&'s str>,
}

/// A method mapping line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodMapping<'s> {
    /// Return Type of the method.
    pub ty: &'s str,
    /// Original name of the method.
    pub original: &'s str,
    /// Obfuscated name of the method.
    pub obfuscated: &'s str,
    /// Arguments of the method as raw string.
    pub arguments: &'s str,
    /// Original class of a foreign inlined method.
    pub original_class: Option<&'s str>,
    /// Line mapping of the method.
    pub line_mapping: LineMapping,
}

/// A Proguard Mapping Record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MappingRecord<'s> {
    /// A Class Mapping.
    Class {
        /// Original name of the class.
        original: &'s str,
        /// Obfuscated name of the class.
        obfuscated: &'s str,
    },
    /// A Field Mapping.
    Field(FieldMapping<'s>),
    /// A Method Mapping.
    Method(MethodMapping<'s>),
}

impl<'s> MappingRecord<'s> {
    /// Parses a line from a proguard mapping file.
    ///
    /// Returns `Ok(None)` for blank lines, comments, and member lines that
    /// lack a type, name or obfuscated name.
    ///
    /// # Examples
    ///
    /// ```
    /// use proguard_retrace::{FieldMapping, LineMapping, MappingRecord, MethodMapping};
    ///
    /// // Class Mappings
    /// let parsed =
    ///     MappingRecord::try_parse("android.arch.core.executor.ArchTaskExecutor -> a.a.a.a.c:");
    /// assert_eq!(
    ///     parsed,
    ///     Ok(Some(MappingRecord::Class {
    ///         original: "android.arch.core.executor.ArchTaskExecutor",
    ///         obfuscated: "a.a.a.a.c"
    ///     }))
    /// );
    ///
    /// // Field
    /// let parsed = MappingRecord::try_parse(
    ///     "    android.arch.core.executor.ArchTaskExecutor sInstance -> a",
    /// );
    /// assert_eq!(
    ///     parsed,
    ///     Ok(Some(MappingRecord::Field(FieldMapping {
    ///         ty: "android.arch.core.executor.ArchTaskExecutor",
    ///         original: "sInstance",
    ///         obfuscated: "a",
    ///         original_class: None,
    ///     })))
    /// );
    ///
    /// // Inlined method from foreign class
    /// let parsed = MappingRecord::try_parse(
    ///     "    1016:1016:void com.example1.domain.MyBean.doWork():16:16 -> buttonClicked",
    /// );
    /// assert_eq!(
    ///     parsed,
    ///     Ok(Some(MappingRecord::Method(MethodMapping {
    ///         ty: "void",
    ///         original: "doWork",
    ///         obfuscated: "buttonClicked",
    ///         arguments: "",
    ///         original_class: Some("com.example1.domain.MyBean"),
    ///         line_mapping: LineMapping {
    ///             startline: 1016,
    ///             endline: 1016,
    ///             original_startline: 16,
    ///             original_endline: 16,
    ///         },
    ///     })))
    /// );
    /// ```
    pub fn try_parse(line: &'s str) -> std::result::Result<Option<Self>, ParseErrorKind> {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            Ok(None)
        } else if line.ends_with(':') {
            parse_class(line).map(Some)
        } else {
            parse_member(line)
        }
    }
}

/// Processes the mappings read by a [`MappingReader`].
///
/// Member mappings are always reported with the original name of the class
/// whose class line they follow. A member that names a different declaring
/// class (`void com.example.Other.method() -> a`) carries that class in its
/// `original_class`.
pub trait MappingProcessor {
    /// Processes a class mapping.
    ///
    /// Returns whether the processor wants the member mappings of this class.
    fn process_class_mapping(&mut self, original: &str, obfuscated: &str) -> bool;

    /// Processes a field mapping of the class `class_name`.
    fn process_field_mapping(&mut self, class_name: &str, field: &FieldMapping<'_>);

    /// Processes a method mapping of the class `class_name`.
    fn process_method_mapping(&mut self, class_name: &str, method: &MethodMapping<'_>);
}

/// Reads a mapping file line by line and feeds it into a [`MappingProcessor`].
///
/// # Examples
///
/// ```
/// use proguard_retrace::{FrameRemapper, MappingReader};
///
/// let mapping = "\
/// com.example.Foo -> a:
///     void bar() -> b
///     void broken(
/// ";
/// let mut remapper = FrameRemapper::new();
/// let errors = MappingReader::new(mapping.as_bytes())
///     .pump(&mut remapper)
///     .unwrap();
///
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].line_number(), 3);
/// assert_eq!(remapper.original_class_name("a"), "com.example.Foo");
/// ```
#[derive(Debug)]
pub struct MappingReader<R> {
    reader: R,
}

impl<R: BufRead> MappingReader<R> {
    /// Create a new reader over mapping file content.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the whole mapping and feeds every record into `processor`.
    ///
    /// Malformed member lines do not stop processing; they are logged and
    /// returned once the input is exhausted. Malformed class lines are
    /// skipped silently, together with the members that follow them. Only
    /// I/O failures are returned as an error.
    pub fn pump<P>(mut self, processor: &mut P) -> Result<Vec<ParseError>>
    where
        P: MappingProcessor + ?Sized,
    {
        let mut errors = Vec::new();
        let mut class_name: Option<String> = None;
        let mut buf = Vec::new();
        let mut line_number = 0;

        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_number += 1;

            let record = str::from_utf8(&buf)
                .map_err(ParseErrorKind::from)
                .and_then(MappingRecord::try_parse);

            match record {
                Ok(None) => {}
                Ok(Some(MappingRecord::Class {
                    original,
                    obfuscated,
                })) => {
                    class_name = processor
                        .process_class_mapping(original, obfuscated)
                        .then(|| original.to_owned());
                }
                Ok(Some(MappingRecord::Field(field))) => {
                    if let Some(class_name) = &class_name {
                        processor.process_field_mapping(class_name, &field);
                    }
                }
                Ok(Some(MappingRecord::Method(method))) => {
                    if let Some(class_name) = &class_name {
                        processor.process_method_mapping(class_name, &method);
                    }
                }
                Err(ParseErrorKind::MalformedClass) => {
                    debug!(line_number, "skipping malformed class mapping");
                    class_name = None;
                }
                Err(kind) => {
                    // members outside of a class are never interpreted
                    if class_name.is_none() && !matches!(kind, ParseErrorKind::Utf8(_)) {
                        continue;
                    }
                    let error = ParseError {
                        line_number,
                        line: String::from_utf8_lossy(&buf).trim_end().to_owned(),
                        kind,
                    };
                    warn!(%error, "skipping malformed mapping line");
                    errors.push(error);
                }
            }
        }

        Ok(errors)
    }
}

/// Parses a class line of the form `original -> obfuscated:`.
fn parse_class(line: &str) -> std::result::Result<MappingRecord<'_>, ParseErrorKind> {
    let arrow = line.find("->").ok_or(ParseErrorKind::MalformedClass)?;
    let colon = find_from(line, ":", arrow + 2).ok_or(ParseErrorKind::MalformedClass)?;

    let original = line[..arrow].trim();
    let obfuscated = line[arrow + 2..colon].trim();
    if original.is_empty() || obfuscated.is_empty() {
        return Err(ParseErrorKind::MalformedClass);
    }

    Ok(MappingRecord::Class {
        original,
        obfuscated,
    })
}

/// Parses a trimmed field or method line.
fn parse_member(line: &str) -> std::result::Result<Option<MappingRecord<'_>>, ParseErrorKind> {
    // The leading `startline:endline:` range never contains a space, so both
    // colons have to appear before the first one.
    let first_space = line.find(' ').unwrap_or(line.len());
    let colon1 = line.find(':').filter(|&idx| idx < first_space);
    let colon2 = colon1
        .and_then(|colon1| find_from(line, ":", colon1 + 1))
        .filter(|&idx| idx < first_space);
    let range = colon1.zip(colon2);

    let type_start = range.map_or(0, |(_, colon2)| colon2 + 1);
    let space = find_from(line, " ", type_start).ok_or(ParseErrorKind::MissingSeparator)?;

    let parens = find_from(line, "(", space + 1)
        .and_then(|open| find_from(line, ")", open + 1).map(|close| (open, close)));

    let cursor = parens.map_or(space, |(_, close)| close);
    let arrow = find_from(line, "->", cursor + 1).ok_or(ParseErrorKind::MissingArrow)?;

    let ty = line[type_start..space].trim();
    let name_end = parens.map_or(arrow, |(open, _)| open);
    let name = line[space + 1..name_end].trim();
    let obfuscated = line[arrow + 2..].trim();

    if ty.is_empty() || name.is_empty() || obfuscated.is_empty() {
        return Ok(None);
    }

    let (original_class, original) = match name.rfind('.') {
        Some(dot) => (Some(&name[..dot]), &name[dot + 1..]),
        None => (None, name),
    };

    let Some((open, close)) = parens else {
        return Ok(Some(MappingRecord::Field(FieldMapping {
            ty,
            original,
            obfuscated,
            original_class,
        })));
    };

    let mut line_mapping = LineMapping::default();
    if let Some((colon1, colon2)) = range {
        line_mapping.startline = parse_line_number(&line[..colon1])?;
        line_mapping.endline = parse_line_number(&line[colon1 + 1..colon2])?;
        line_mapping.original_startline = line_mapping.startline;
        line_mapping.original_endline = line_mapping.endline;
    }

    // `:originalstartline[:originalendline]` between the arguments and `->`
    let suffix = &line[close + 1..arrow];
    if let Some(suffix) = suffix.trim_start().strip_prefix(':') {
        match suffix.split_once(':') {
            Some((first, last)) => {
                line_mapping.original_startline = parse_line_number(first)?;
                line_mapping.original_endline = parse_line_number(last)?;
            }
            None => {
                line_mapping.original_startline = parse_line_number(suffix)?;
                line_mapping.original_endline = line_mapping.original_startline;
            }
        }
    }

    Ok(Some(MappingRecord::Method(MethodMapping {
        ty,
        original,
        obfuscated,
        arguments: line[open + 1..close].trim(),
        original_class,
        line_mapping,
    })))
}

fn parse_line_number(s: &str) -> std::result::Result<i64, ParseErrorKind> {
    let s = s.trim();
    s.parse()
        .map_err(|_| ParseErrorKind::InvalidLineNumber(s.to_owned()))
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .find(needle)
        .map(|idx| idx + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        interested: bool,
        calls: Vec<String>,
    }

    impl MappingProcessor for Recorder {
        fn process_class_mapping(&mut self, original: &str, obfuscated: &str) -> bool {
            self.calls.push(format!("class {original} -> {obfuscated}"));
            self.interested
        }

        fn process_field_mapping(&mut self, class_name: &str, field: &FieldMapping<'_>) {
            self.calls.push(format!(
                "field {class_name}: {:?} {} {} -> {}",
                field.original_class, field.ty, field.original, field.obfuscated
            ));
        }

        fn process_method_mapping(&mut self, class_name: &str, method: &MethodMapping<'_>) {
            let lines = method.line_mapping;
            self.calls.push(format!(
                "method {class_name}: {:?} {}:{}:{} {}({}):{}:{} -> {}",
                method.original_class,
                lines.startline,
                lines.endline,
                method.ty,
                method.original,
                method.arguments,
                lines.original_startline,
                lines.original_endline,
                method.obfuscated
            ));
        }
    }

    fn pump(mapping: &str) -> (Recorder, Vec<ParseError>) {
        let mut recorder = Recorder {
            interested: true,
            ..Default::default()
        };
        let errors = MappingReader::new(mapping.as_bytes())
            .pump(&mut recorder)
            .unwrap();
        (recorder, errors)
    }

    #[test]
    fn try_parse_class() {
        assert_eq!(
            MappingRecord::try_parse("com.example.Foo -> a:"),
            Ok(Some(MappingRecord::Class {
                original: "com.example.Foo",
                obfuscated: "a",
            }))
        );
        assert_eq!(
            MappingRecord::try_parse("com.example.Foo => a:"),
            Err(ParseErrorKind::MalformedClass)
        );
        assert_eq!(
            MappingRecord::try_parse(" -> a:"),
            Err(ParseErrorKind::MalformedClass)
        );
    }

    #[test]
    fn try_parse_comments_and_blanks() {
        assert_eq!(MappingRecord::try_parse("# compiler: R8"), Ok(None));
        assert_eq!(MappingRecord::try_parse("   "), Ok(None));
        assert_eq!(MappingRecord::try_parse(""), Ok(None));
    }

    #[test]
    fn try_parse_method_without_lines() {
        assert_eq!(
            MappingRecord::try_parse(
                "    java.lang.Object putIfAbsent(java.lang.Object,java.lang.Object) -> b"
            ),
            Ok(Some(MappingRecord::Method(MethodMapping {
                ty: "java.lang.Object",
                original: "putIfAbsent",
                obfuscated: "b",
                arguments: "java.lang.Object,java.lang.Object",
                original_class: None,
                line_mapping: LineMapping::default(),
            })))
        );
    }

    #[test]
    fn try_parse_method_line_variants() {
        let method = |line| match MappingRecord::try_parse(line) {
            Ok(Some(MappingRecord::Method(method))) => method.line_mapping,
            other => panic!("not a method: {other:?}"),
        };

        assert_eq!(
            method("    1:3:void foo() -> a"),
            LineMapping {
                startline: 1,
                endline: 3,
                original_startline: 1,
                original_endline: 3,
            }
        );
        assert_eq!(
            method("    1:3:void foo():10:12 -> a"),
            LineMapping {
                startline: 1,
                endline: 3,
                original_startline: 10,
                original_endline: 12,
            }
        );
        assert_eq!(
            method("    1:1:void foo():83 -> a"),
            LineMapping {
                startline: 1,
                endline: 1,
                original_startline: 83,
                original_endline: 83,
            }
        );
        assert_eq!(
            method("    void foo():7:9 -> a"),
            LineMapping {
                startline: 0,
                endline: 0,
                original_startline: 7,
                original_endline: 9,
            }
        );
    }

    #[test]
    fn try_parse_errors() {
        assert_eq!(
            MappingRecord::try_parse("    void foo() a"),
            Err(ParseErrorKind::MissingArrow)
        );
        assert_eq!(
            MappingRecord::try_parse("    foo->a"),
            Err(ParseErrorKind::MissingSeparator)
        );
        assert_eq!(
            MappingRecord::try_parse("    x:3:void foo() -> a"),
            Err(ParseErrorKind::InvalidLineNumber("x".into()))
        );
        assert_eq!(
            MappingRecord::try_parse("    1:3:void foo():1y -> a"),
            Err(ParseErrorKind::InvalidLineNumber("1y".into()))
        );
    }

    #[test]
    fn pump_records() {
        let (recorder, errors) = pump(
            "\
# compiler: R8
com.example.Foo -> a:
    int count -> a
    com.example.Bar.Baz other.Owner.field -> b
    1:3:void bar(int,boolean):10:12 -> c

    4:4:void com.example.Other.inlined():20 -> c
",
        );

        assert!(errors.is_empty());
        assert_eq!(
            recorder.calls,
            vec![
                "class com.example.Foo -> a",
                "field com.example.Foo: None int count -> a",
                "field com.example.Foo: Some(\"other.Owner\") com.example.Bar.Baz field -> b",
                "method com.example.Foo: None 1:3:void bar(int,boolean):10:12 -> c",
                "method com.example.Foo: Some(\"com.example.Other\") 4:4:void inlined():20:20 -> c",
            ]
        );
    }

    #[test]
    fn pump_skips_members_of_uninteresting_classes() {
        let mut recorder = Recorder::default();
        let mapping = b"com.example.Foo -> a:\n    int count -> a\n    broken\n";
        let errors = MappingReader::new(&mapping[..])
            .pump(&mut recorder)
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(recorder.calls, vec!["class com.example.Foo -> a"]);
    }

    #[test]
    fn pump_recovers_from_malformed_lines() {
        let (recorder, errors) = pump(
            "\
com.example.Foo -> a:
    void missingArrow() b
    void bar() -> b
malformed class line:
    void ignored() -> c
com.example.Baz -> c:
    x:1:void bad() -> d
    void baz() -> d
",
        );

        assert_eq!(
            recorder.calls,
            vec![
                "class com.example.Foo -> a",
                "method com.example.Foo: None 0:0:void bar():0:0 -> b",
                "class com.example.Baz -> c",
                "method com.example.Baz: None 0:0:void baz():0:0 -> d",
            ]
        );

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line_number(), 2);
        assert_eq!(errors[0].line(), "    void missingArrow() b");
        assert_eq!(errors[0].kind(), &ParseErrorKind::MissingArrow);
        assert_eq!(errors[1].line_number(), 7);
        assert_eq!(
            errors[1].kind(),
            &ParseErrorKind::InvalidLineNumber("x".into())
        );
        assert_eq!(errors[1].to_string(), "line 7: invalid line number `x`");
    }

    #[test]
    fn pump_reports_invalid_utf8() {
        let mut recorder = Recorder {
            interested: true,
            ..Default::default()
        };
        let mapping = b"com.example.Foo -> a:\n    int \xff -> a\n    int ok -> b";
        let errors = MappingReader::new(&mapping[..])
            .pump(&mut recorder)
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind(), ParseErrorKind::Utf8(_)));
        assert_eq!(recorder.calls.len(), 2);
    }
}
