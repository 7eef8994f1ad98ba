//! Span field names.

pub const TOOL_NAME: &str = "tool.name";
pub const TOOL_INVOCATION_ID: &str = "tool.invocation_id";
pub const HTTP_METHOD: &str = "http.request.method";
pub const HTTP_ROUTE: &str = "http.route";
pub const HTTP_STATUS: &str = "http.response.status_code";
pub const RESULT_TYPE: &str = "tool.result_type";
