use proguard_retrace::{FrameRemapper, Retrace, RetraceOptions};

static MAPPING: &[u8] = include_bytes!("res/mapping.txt");

fn retrace(options: RetraceOptions) -> Retrace {
    Retrace::from_mapping(MAPPING, &options).unwrap()
}

#[test]
fn test_retrace() {
    let retrace = retrace(RetraceOptions::default());

    let stacktrace = "\
java.lang.IllegalStateException: Cannot execute task: the task is already running.
    at d.c(SourceFile:5)
    at d.<init>(SourceFile:2)
    at a.execute(SourceFile:2)
    at c.getInstance(SourceFile:4)
    at f.remove(SourceFile:3)
    at e.b(Unknown Source)
    at f.get(SourceFile:1)
    at android.os.Handler.handleCallback(Handler.java:873)
    ... 9 more
";

    let mut output = Vec::new();
    retrace.retrace(stacktrace.as_bytes(), &mut output).unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "\
java.lang.IllegalStateException: Cannot execute task: the task is already running.
    at android.arch.core.executor.DefaultTaskExecutor.postToMainThread(DefaultTaskExecutor.java:50)
    at android.arch.core.executor.DefaultTaskExecutor.<init>(DefaultTaskExecutor.java:32)
    at android.arch.core.executor.ArchTaskExecutor.postToMainThread(ArchTaskExecutor.java:101)
    at android.arch.core.executor.ArchTaskExecutor$1.execute(ArchTaskExecutor.java:45)
    at android.arch.core.executor.ArchTaskExecutor.getInstance(ArchTaskExecutor.java:73)
    at android.arch.core.internal.SafeIterableMap.remove(SafeIterableMap.java:102)
    at android.arch.core.internal.FastSafeIterableMap.remove(FastSafeIterableMap.java:56)
    at android.arch.core.executor.TaskExecutor.executeOnDiskIO(TaskExecutor.java)
    at android.arch.core.internal.FastSafeIterableMap.get(FastSafeIterableMap.java:41)
    at android.os.Handler.handleCallback(Handler.java:873)
    ... 9 more
"
    );
}

#[test]
fn test_inlined_frames() {
    let retrace = retrace(RetraceOptions::default());

    assert_eq!(
        retrace.retrace_str("    at io.sentry.sample.MainActivity.t(MainActivity.java:2)\n"),
        "    at io.sentry.sample.MainActivity.bar(MainActivity.java:54)
    at io.sentry.sample.MainActivity.onClick(MainActivity.java:30)\n"
    );
}

#[test]
fn test_ambiguous_without_line() {
    let retrace = retrace(RetraceOptions::default());

    let expected = [
        "    at android.arch.core.internal.FastSafeIterableMap.get(FastSafeIterableMap.java:41)"
            .to_owned(),
        format!(
            "{}putIfAbsent(FastSafeIterableMap.java:46)",
            " ".repeat(54)
        ),
        format!("{}8)", " ".repeat(92)),
        format!("{}50)", " ".repeat(91)),
    ];

    assert_eq!(
        retrace.retrace_line("    at f.putIfAbsent(SourceFile:0)"),
        expected
    );
}

#[test]
fn test_ambiguous_r8() {
    let mapping = "\
com.android.tools.r8.R8 -> a.a:
    void foo(int) -> a
    void bar(int, int) -> a
";
    let retrace = Retrace::new(FrameRemapper::from(mapping), &RetraceOptions::default()).unwrap();

    let input = "\
Exception in thread \"main\" java.lang.NullPointerException
\tat a.a.a(SourceFile)
";

    assert_eq!(
        retrace.retrace_str(input),
        format!(
            "\
Exception in thread \"main\" java.lang.NullPointerException
\tat com.android.tools.r8.R8.foo(R8.java)
{}bar(R8.java)
",
            " ".repeat(28)
        )
    );
}

#[test]
fn test_null_pointer_messages() {
    let retrace = retrace(RetraceOptions::default());

    assert_eq!(
        retrace.retrace_line(
            "java.lang.NullPointerException: Attempt to invoke virtual method 'boolean e.ee()' on a null object reference"
        ),
        vec!["java.lang.NullPointerException: Attempt to invoke virtual method 'boolean android.arch.core.executor.TaskExecutor.isMainThread()' on a null object reference"]
    );
    assert_eq!(
        retrace.retrace_line(
            "java.lang.NullPointerException: Attempt to read from field 'android.os.Handler d.pesfd' on a null object reference"
        ),
        vec!["java.lang.NullPointerException: Attempt to read from field 'android.os.Handler android.arch.core.executor.DefaultTaskExecutor.mMainHandler' on a null object reference"]
    );
    assert_eq!(
        retrace.retrace_line(
            r#"java.lang.NullPointerException: Cannot invoke "e.ee()" because the return value of "c.ee()" is null"#
        ),
        vec![
            r#"java.lang.NullPointerException: Cannot invoke "android.arch.core.executor.TaskExecutor.isMainThread()" because the return value of "android.arch.core.executor.ArchTaskExecutor.isMainThread()" is null"#
        ]
    );
}

#[test]
fn test_all_class_names() {
    let retrace = retrace(RetraceOptions {
        all_class_names: true,
        ..Default::default()
    });

    assert_eq!(
        retrace.retrace_str("Executors in use: c, e and d (via [f])\n"),
        "Executors in use: android.arch.core.executor.ArchTaskExecutor, \
         android.arch.core.executor.TaskExecutor and android.arch.core.executor.DefaultTaskExecutor \
         (via [android.arch.core.internal.FastSafeIterableMap])\n"
    );
}
