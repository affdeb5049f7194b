use std::any::Any;
use std::cell::RefCell;
use std::panic::PanicHookInfo;
use std::sync::Once;

use askama::Template;
use tracing::error;

use crate::error::backtrace::{__error_pages_create_backtrace, Backtrace, StackFrame};

const UNKNOWN_LOCATION: &str = "<unknown>";

thread_local! {
    static LAST_PANIC: RefCell<Option<RecordedPanic>> = const { RefCell::new(None) };
}

/// What the panic hook saw of the most recent panic on this thread.
#[derive(Debug)]
struct RecordedPanic {
    message: String,
    location: Option<String>,
    backtrace: Backtrace,
}

/// Registers the panic hook that records where request handlers panic.
///
/// The hook stores the location and a backtrace of every panic in
/// thread-local storage, where the [`ErrorHandler`](crate::ErrorHandler)
/// picks them up after catching the panic. The previously registered hook
/// keeps running first.
///
/// This is called by [`ErrorHandlerLayer::new`](crate::ErrorHandlerLayer::new)
/// unless `register_panic_hook` is disabled in the configuration. Calling it
/// more than once has no further effect.
pub fn register_panic_hook() {
    static REGISTER: Once = Once::new();

    REGISTER.call_once(|| {
        let current_hook = std::panic::take_hook();
        let new_hook = move |hook_info: &PanicHookInfo<'_>| {
            current_hook(hook_info);
            record_panic(hook_info);
        };
        std::panic::set_hook(Box::new(new_hook));
    });
}

fn record_panic(info: &PanicHookInfo<'_>) {
    let recorded = RecordedPanic {
        message: panic_message(info.payload()),
        location: info.location().map(|location| format!("{location}")),
        backtrace: __error_pages_create_backtrace(),
    };
    LAST_PANIC.replace(Some(recorded));
}

/// Everything known about a caught panic.
#[derive(Debug)]
pub(crate) struct PanicReport {
    message: String,
    location: Option<String>,
    backtrace: Backtrace,
}

impl PanicReport {
    /// Builds a report for a panic that has just been caught on this thread.
    ///
    /// The location and backtrace recorded by the panic hook are only used if
    /// they belong to a panic with the same message. Payloads that never went
    /// through the hook, such as those passed to
    /// [`resume_unwind`](std::panic::resume_unwind), get an unknown location
    /// and a snapshot taken here.
    #[must_use]
    pub(crate) fn capture(payload: &(dyn Any + Send)) -> Self {
        let message = panic_message(payload);
        let recorded = LAST_PANIC
            .take()
            .filter(|recorded| recorded.message == message);

        match recorded {
            Some(recorded) => Self {
                message,
                location: recorded.location,
                backtrace: recorded.backtrace,
            },
            None => Self {
                message,
                location: None,
                backtrace: __error_pages_create_backtrace(),
            },
        }
    }

    #[must_use]
    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub(crate) fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(UNKNOWN_LOCATION)
    }

    /// Renders the diagnostic body shown to the client in debug mode.
    #[must_use]
    pub(crate) fn render(&self, log_line: &str) -> String {
        let template = PanicPageTemplate {
            log_line,
            message: &self.message,
            frames: self.backtrace.frames(),
        };

        template.render().unwrap_or_else(|render_error| {
            error!(%render_error, "Failed to render the panic diagnostic page");
            format!("{log_line}\n\n{}\n", self.message)
        })
    }
}

#[derive(Debug, Template)]
#[template(path = "panic.txt")]
struct PanicPageTemplate<'a> {
    log_line: &'a str,
    message: &'a str,
    frames: &'a [StackFrame],
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(&message) = payload.downcast_ref::<&str>() {
        message.to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_str() {
        let payload: Box<dyn Any + Send> = Box::new("I'm a panic");

        assert_eq!(panic_message(&*payload), "I'm a panic");
    }

    #[test]
    fn panic_message_string() {
        let payload: Box<dyn Any + Send> = Box::new(format!("panic #{}", 42));

        assert_eq!(panic_message(&*payload), "panic #42");
    }

    #[test]
    fn panic_message_other() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(&*payload), "Box<dyn Any>");
    }

    #[test]
    fn capture_records_location() {
        register_panic_hook();

        let payload = std::panic::catch_unwind(|| panic!("captured")).unwrap_err();
        let report = PanicReport::capture(&*payload);

        assert_eq!(report.message(), "captured");
        assert!(
            report.location().starts_with(file!()),
            "unexpected location: {}",
            report.location()
        );
        assert!(!report.backtrace.frames().is_empty());
    }

    #[test]
    fn capture_consumes_recorded_state() {
        register_panic_hook();

        let payload = std::panic::catch_unwind(|| panic!("first")).unwrap_err();
        let _ = PanicReport::capture(&*payload);
        let report = PanicReport::capture(&*payload);

        assert_eq!(report.location(), UNKNOWN_LOCATION);
        assert!(!report.backtrace.frames().is_empty());
    }

    #[test]
    fn capture_ignores_unrelated_recorded_panic() {
        register_panic_hook();

        let _ = std::panic::catch_unwind(|| panic!("handled elsewhere"));
        let payload = std::panic::catch_unwind(|| {
            std::panic::resume_unwind(Box::new("real failure"))
        })
        .unwrap_err();
        let report = PanicReport::capture(&*payload);

        assert_eq!(report.message(), "real failure");
        assert_eq!(report.location(), UNKNOWN_LOCATION);
        assert!(!report.backtrace.frames().is_empty());
    }

    #[test]
    fn capture_formatted_message_keeps_location() {
        register_panic_hook();

        let payload =
            std::panic::catch_unwind(|| panic!("panic #{}", 42)).unwrap_err();
        let report = PanicReport::capture(&*payload);

        assert_eq!(report.message(), "panic #42");
        assert!(report.location().starts_with(file!()));
    }

    #[test]
    fn render_contains_everything() {
        let payload: Box<dyn Any + Send> = Box::new("rendered");
        let report = PanicReport {
            message: panic_message(&*payload),
            location: Some("src/lib.rs:1:1".to_owned()),
            backtrace: __error_pages_create_backtrace(),
        };

        let body = report.render("[PANIC /] src/lib.rs:1:1: rendered");

        assert!(body.starts_with("[PANIC /] src/lib.rs:1:1: rendered\n"));
        assert!(body.contains("\nrendered\n"));
        assert!(body.contains("stack backtrace:"));
        assert!(body.contains("render_contains_everything"));
    }
}
