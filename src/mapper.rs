use std::collections::HashMap;
use std::io::BufRead;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::Result;
use crate::frame::FrameInfo;
use crate::mapping::{FieldMapping, MappingProcessor, MappingReader, MethodMapping};
use crate::utils::synthesize_source_file;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FieldInfo {
    original_class: String,
    ty: String,
    name: String,
}

impl FieldInfo {
    /// An empty `ty` matches any field.
    fn matches(&self, ty: &str) -> bool {
        ty.is_empty() || ty == self.ty
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MethodInfo {
    obfuscated_startline: i64,
    obfuscated_endline: i64,
    original_class: String,
    original_startline: i64,
    original_endline: i64,
    ty: String,
    name: String,
    arguments: String,
}

impl MethodInfo {
    fn matches(&self, line: i64, ty: &str, arguments: &str) -> bool {
        (line == 0
            || self.obfuscated_endline == 0
            || (self.obfuscated_startline <= line && line <= self.obfuscated_endline))
            && (ty.is_empty() || ty == self.ty)
            && (arguments.is_empty() || arguments == self.arguments)
    }

    fn original_line(&self, line: i64) -> i64 {
        if self.original_startline == self.obfuscated_startline {
            line
        } else if self.original_endline != 0
            && self.original_endline != self.original_startline
            && self.obfuscated_startline != 0
            && line != 0
        {
            self.original_startline
                .saturating_sub(self.obfuscated_startline)
                .saturating_add(line)
        } else {
            self.original_startline
        }
    }
}

// obfuscated member name -> members, per original class name
type MemberTable<T> = HashMap<String, HashMap<String, IndexSet<T>>>;

/// A symbol table that remaps obfuscated [`FrameInfo`]s to their originals.
///
/// The table is filled through its [`MappingProcessor`] implementation,
/// usually by a [`MappingReader`], and is read-only afterwards.
///
/// # Examples
///
/// ```
/// use proguard_retrace::{FrameInfo, FrameRemapper};
///
/// let remapper = FrameRemapper::from(
///     "\
/// com.example.Foo -> a:
///     1:3:void bar():10:12 -> b
/// ",
/// );
///
/// let frames = remapper.transform(&FrameInfo::with_method("a", "b", 2));
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].class_name(), "com.example.Foo");
/// assert_eq!(frames[0].method_name(), "bar");
/// assert_eq!(frames[0].source_file(), "Foo.java");
/// assert_eq!(frames[0].line_number(), 11);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FrameRemapper {
    // obfuscated class name -> original class name
    classes: HashMap<String, String>,
    fields: MemberTable<FieldInfo>,
    methods: MemberTable<MethodInfo>,
}

impl FrameRemapper {
    /// Create a new, empty remapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a whole mapping into a new remapper.
    ///
    /// Malformed mapping lines are logged and skipped, only I/O errors are
    /// returned.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut remapper = Self::new();
        let errors = MappingReader::new(reader).pump(&mut remapper)?;

        debug!(
            classes = remapper.class_count(),
            members = remapper.member_count(),
            errors = errors.len(),
            "loaded mapping"
        );

        Ok(remapper)
    }

    /// The number of class mappings.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// The number of distinct field and method mappings.
    pub fn member_count(&self) -> usize {
        fn count<T>(table: &MemberTable<T>) -> usize {
            table
                .values()
                .flat_map(|members| members.values())
                .map(IndexSet::len)
                .sum()
        }

        count(&self.fields) + count(&self.methods)
    }

    /// Remaps an obfuscated frame.
    ///
    /// Returns one frame per field and method mapping matching `frame`.
    /// Methods are returned in the order of the mapping file. When nothing
    /// matches, a single frame with only the class name remapped is
    /// returned, so the result is never empty.
    pub fn transform(&self, frame: &FrameInfo) -> Vec<FrameInfo> {
        let class_name = self.original_class_name(&frame.class_name);

        let mut frames = Vec::new();
        self.transform_fields(frame, class_name, &mut frames);
        self.transform_methods(frame, class_name, &mut frames);

        if frames.is_empty() {
            let source_file = if frame.source_file.is_empty() {
                synthesize_source_file(class_name)
            } else {
                frame.source_file.clone()
            };

            frames.push(FrameInfo {
                class_name: class_name.to_owned(),
                source_file,
                ..frame.clone()
            });
        }

        frames
    }

    fn transform_fields(&self, frame: &FrameInfo, class_name: &str, frames: &mut Vec<FrameInfo>) {
        let Some(fields) = self
            .fields
            .get(class_name)
            .and_then(|fields| fields.get(&frame.field_name))
        else {
            return;
        };

        let ty = self.original_type(&frame.ty);
        frames.extend(fields.iter().filter(|field| field.matches(&ty)).map(|field| {
            FrameInfo {
                class_name: field.original_class.clone(),
                source_file: synthesize_source_file(&field.original_class),
                line_number: frame.line_number,
                ty: field.ty.clone(),
                field_name: field.name.clone(),
                method_name: frame.method_name.clone(),
                arguments: frame.arguments.clone(),
            }
        }));
    }

    fn transform_methods(&self, frame: &FrameInfo, class_name: &str, frames: &mut Vec<FrameInfo>) {
        let Some(methods) = self
            .methods
            .get(class_name)
            .and_then(|methods| methods.get(&frame.method_name))
        else {
            return;
        };

        let line = frame.line_number;
        let ty = self.original_type(&frame.ty);
        let arguments = self.original_arguments(&frame.arguments);

        frames.extend(
            methods
                .iter()
                .filter(|method| method.matches(line, &ty, &arguments))
                .map(|method| FrameInfo {
                    class_name: method.original_class.clone(),
                    source_file: synthesize_source_file(&method.original_class),
                    line_number: method.original_line(line),
                    ty: method.ty.clone(),
                    field_name: frame.field_name.clone(),
                    method_name: method.name.clone(),
                    arguments: method.arguments.clone(),
                }),
        );
    }

    /// Resolves an obfuscated class name, falling back to the name itself.
    pub fn original_class_name<'a>(&'a self, obfuscated: &'a str) -> &'a str {
        self.classes
            .get(obfuscated)
            .map(String::as_str)
            .unwrap_or(obfuscated)
    }

    /// Resolves an obfuscated type such as `a.b[][]`, keeping array suffixes.
    pub fn original_type(&self, obfuscated: &str) -> String {
        let (base, suffix) = obfuscated.split_at(obfuscated.find('[').unwrap_or(obfuscated.len()));
        format!("{}{}", self.original_class_name(base), suffix)
    }

    /// Resolves a comma separated list of obfuscated argument types.
    ///
    /// The resolved types are joined with `,` without any whitespace.
    pub fn original_arguments(&self, obfuscated: &str) -> String {
        obfuscated
            .split(',')
            .map(|argument| self.original_type(argument.trim()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl MappingProcessor for FrameRemapper {
    fn process_class_mapping(&mut self, original: &str, obfuscated: &str) -> bool {
        self.classes.insert(obfuscated.to_owned(), original.to_owned());
        true
    }

    fn process_field_mapping(&mut self, class_name: &str, field: &FieldMapping<'_>) {
        self.fields
            .entry(class_name.to_owned())
            .or_default()
            .entry(field.obfuscated.to_owned())
            .or_default()
            .insert(FieldInfo {
                original_class: field.original_class.unwrap_or(class_name).to_owned(),
                ty: field.ty.to_owned(),
                name: field.original.to_owned(),
            });
    }

    fn process_method_mapping(&mut self, class_name: &str, method: &MethodMapping<'_>) {
        let lines = method.line_mapping;
        self.methods
            .entry(class_name.to_owned())
            .or_default()
            .entry(method.obfuscated.to_owned())
            .or_default()
            .insert(MethodInfo {
                obfuscated_startline: lines.startline,
                obfuscated_endline: lines.endline,
                original_class: method.original_class.unwrap_or(class_name).to_owned(),
                original_startline: lines.original_startline,
                original_endline: lines.original_endline,
                ty: method.ty.to_owned(),
                name: method.original.to_owned(),
                arguments: method.arguments.to_owned(),
            });
    }
}

impl From<&str> for FrameRemapper {
    fn from(mapping: &str) -> Self {
        let mut remapper = Self::new();
        // reading from a slice cannot fail, line errors are logged by the reader
        let _ = MappingReader::new(mapping.as_bytes()).pump(&mut remapper);
        remapper
    }
}
