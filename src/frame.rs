//! The structured representation of a single stack trace frame.

/// Information about a single frame, as parsed from a crash log line or
/// produced by remapping.
///
/// Besides classic stack frames (`at com.example.Foo.bar(Foo.java:12)`), a
/// frame may also describe a class, field or method referenced from an
/// exception message, in which case only some of the fields are set.
/// Unset fields are empty strings, and an unknown line number is `0`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameInfo {
    pub(crate) class_name: String,
    pub(crate) source_file: String,
    pub(crate) line_number: i64,
    pub(crate) ty: String,
    pub(crate) field_name: String,
    pub(crate) method_name: String,
    pub(crate) arguments: String,
}

impl FrameInfo {
    /// Create a new frame referencing only a class.
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_owned(),
            ..Self::default()
        }
    }

    /// Create a new frame for a method invocation at the given line.
    ///
    /// # Examples
    ///
    /// ```
    /// use proguard_retrace::FrameInfo;
    ///
    /// let frame = FrameInfo::with_method("a.b", "c", 12);
    /// assert_eq!(frame.class_name(), "a.b");
    /// assert_eq!(frame.method_name(), "c");
    /// assert_eq!(frame.line_number(), 12);
    /// ```
    pub fn with_method(class_name: &str, method_name: &str, line_number: i64) -> Self {
        Self {
            class_name: class_name.to_owned(),
            method_name: method_name.to_owned(),
            line_number,
            ..Self::default()
        }
    }

    /// Create a new frame for a field access.
    pub fn with_field(class_name: &str, field_name: &str) -> Self {
        Self {
            class_name: class_name.to_owned(),
            field_name: field_name.to_owned(),
            ..Self::default()
        }
    }

    /// Sets the source file.
    pub fn with_source_file(mut self, source_file: &str) -> Self {
        self.source_file = source_file.to_owned();
        self
    }

    /// Sets the field type or method return type.
    pub fn with_type(mut self, ty: &str) -> Self {
        self.ty = ty.to_owned();
        self
    }

    /// Sets the comma-separated method argument types.
    pub fn with_arguments(mut self, arguments: &str) -> Self {
        self.arguments = arguments.to_owned();
        self
    }

    /// The fully qualified, dot-separated class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The source file name, possibly empty.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// The line number, `0` if unknown.
    pub fn line_number(&self) -> i64 {
        self.line_number
    }

    /// The field type or method return type, possibly empty.
    pub fn ty(&self) -> &str {
        &self.ty
    }

    /// The field name, possibly empty.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The method name, possibly empty.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The method argument types, possibly empty.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }
}
