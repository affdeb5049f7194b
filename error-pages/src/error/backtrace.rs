//! Stack snapshots taken when a request handler panics.

// inline(never) is added to make sure there is a separate frame for this
// function so that it can be used to find the start of the backtrace.
#[inline(never)]
pub(crate) fn __error_pages_create_backtrace() -> Backtrace {
    let mut frames = Vec::new();
    let mut start = false;
    backtrace::trace(|frame| {
        let frame = StackFrame::from(frame);
        if start {
            frames.push(frame);
        } else if frame
            .symbol_name()
            .contains("__error_pages_create_backtrace")
        {
            start = true;
        }

        true
    });

    if frames.is_empty() {
        // symbols are stripped, so the marker frame was never found
        backtrace::trace(|frame| {
            frames.push(StackFrame::from(frame));
            true
        });
    }

    Backtrace { frames }
}

/// The stack of the thread at the moment a snapshot was taken, innermost frame
/// first.
#[derive(Debug, Clone)]
pub(crate) struct Backtrace {
    frames: Vec<StackFrame>,
}

impl Backtrace {
    /// Returns the frames of this backtrace.
    #[must_use]
    pub(crate) fn frames(&self) -> &[StackFrame] {
        &self.frames
    }
}

/// A single frame of a [`Backtrace`].
#[derive(Debug, Clone)]
pub(crate) struct StackFrame {
    symbol_name: Option<String>,
    filename: Option<String>,
    lineno: Option<u32>,
    colno: Option<u32>,
}

impl StackFrame {
    /// Returns the demangled name of the function, or `<unknown>`.
    #[must_use]
    pub(crate) fn symbol_name(&self) -> String {
        self.symbol_name
            .as_deref()
            .unwrap_or("<unknown>")
            .to_string()
    }

    /// Returns the `file:line:column` location of the frame, or `<unknown>`.
    #[must_use]
    pub(crate) fn location(&self) -> String {
        let Some(filename) = self.filename.as_deref() else {
            return "<unknown>".to_string();
        };

        match (self.lineno, self.colno) {
            (Some(line_no), Some(col_no)) => format!("{filename}:{line_no}:{col_no}"),
            (Some(line_no), None) => format!("{filename}:{line_no}"),
            _ => filename.to_owned(),
        }
    }
}

impl From<&backtrace::Frame> for StackFrame {
    fn from(frame: &backtrace::Frame) -> Self {
        let mut symbol_name = None;
        let mut filename = None;
        let mut lineno = None;
        let mut colno = None;

        backtrace::resolve_frame(frame, |symbol| {
            if let Some(name) = symbol.name() {
                symbol_name = Some(name.to_string());
            }
            if let Some(file) = symbol.filename() {
                filename = Some(file.display().to_string());
            }
            if let Some(line) = symbol.lineno() {
                lineno = Some(line);
            }
            if let Some(col) = symbol.colno() {
                colno = Some(col);
            }
        });

        Self {
            symbol_name,
            filename,
            lineno,
            colno,
        }
    }
}
