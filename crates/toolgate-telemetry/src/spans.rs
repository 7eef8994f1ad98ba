//! Span helpers for tool calls

use crate::attributes::*;
use tracing::Span;
use tracing::field::Empty;

/// Identifying fields of one tool call.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpanAttributes<'a> {
    pub tool_name: &'a str,
    pub invocation_id: &'a str,
    /// Empty for tools that do not map to an HTTP operation
    pub http_method: &'a str,
    /// Path template, not the substituted path
    pub route: &'a str,
}

/// Create the `tool_call` span. Outcome fields start empty and are filled in
/// by [`record_outcome`].
pub fn tool_call_span(attrs: ToolSpanAttributes<'_>) -> Span {
    tracing::info_span!(
        "tool_call",
        { TOOL_NAME } = %attrs.tool_name,
        { TOOL_INVOCATION_ID } = %attrs.invocation_id,
        { HTTP_METHOD } = %attrs.http_method,
        { HTTP_ROUTE } = %attrs.route,
        { RESULT_TYPE } = Empty,
        { HTTP_STATUS } = Empty,
    )
}

/// Record how a call ended.
pub fn record_outcome(span: &Span, result_type: &str, http_status: Option<u16>) {
    span.record(RESULT_TYPE, result_type);
    if let Some(status) = http_status {
        span.record(HTTP_STATUS, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_tool_call_span_fields() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = tool_call_span(ToolSpanAttributes {
                tool_name: "listPets",
                invocation_id: "abc-123",
                http_method: "GET",
                route: "/pets",
            });
            record_outcome(&span, "json", Some(200));
            let _guard = span.enter();
            tracing::info!("call finished");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("tool_call"));
        assert!(output.contains("listPets"));
        assert!(output.contains("abc-123"));
        assert!(output.contains("call finished"));
    }
}
