//! Diagnostic context - thread awareness for diagnostic messages.

use std::thread::ThreadId;

/// Diagnostic context containing runtime state.
#[derive(Debug, Clone)]
pub struct DiagContext {
    /// What the diagnostic is about (identifier, category, task id...).
    pub subject: String,
    /// Current thread ID.
    pub thread_id: ThreadId,
    /// Thread name (if available).
    pub thread_name: Option<String>,
}

impl DiagContext {
    /// Capture the current thread together with a subject description.
    pub fn capture(subject: String) -> Self {
        let thread = std::thread::current();
        Self {
            subject,
            thread_id: thread.id(),
            thread_name: thread.name().map(String::from),
        }
    }

    /// Format context for diagnostic output.
    pub fn format(&self) -> String {
        match self.thread_name {
            Some(ref name) => format!("{}, thread=\"{}\"", self.subject, name),
            None => format!("{}, thread={:?}", self.subject, self.thread_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_names_thread() {
        let formatted = std::thread::Builder::new()
            .name("decoder".into())
            .spawn(|| DiagContext::capture("identifier=\"a.png\"".into()).format())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(formatted, "identifier=\"a.png\", thread=\"decoder\"");
    }
}
