use tracing::Span;

/// Per-request correlation data, created by the HTTP request middleware and
/// passed explicitly down to the tool handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation identifier, 32 lowercase hex characters.
    pub request_id: String,
    /// Span carrying `request_id`, method, path, remote address and user agent.
    /// Events emitted inside it inherit those fields.
    pub span: Span,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: String, span: Span) -> Self {
        Self { request_id, span }
    }

    /// Correlation id of `ctx`, or `""` when there is no context.
    #[must_use]
    pub fn request_id_of(ctx: Option<&RequestContext>) -> &str {
        match ctx {
            Some(ctx) => &ctx.request_id,
            None => "",
        }
    }

    /// Logging span of `ctx`, or the current span when there is no context.
    #[must_use]
    pub fn logger_of(ctx: Option<&RequestContext>) -> Span {
        match ctx {
            Some(ctx) => ctx.span.clone(),
            None => Span::current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_context_falls_back() {
        assert_eq!(RequestContext::request_id_of(None), "");
        // Without a subscriber the fallback span is disabled, but it must
        // still be usable.
        let span = RequestContext::logger_of(None);
        span.in_scope(|| tracing::info!("no context"));
    }

    #[test]
    fn present_context_is_returned() {
        let ctx = RequestContext::new("0123456789abcdef0123456789abcdef".to_string(), Span::none());
        assert_eq!(
            RequestContext::request_id_of(Some(&ctx)),
            "0123456789abcdef0123456789abcdef"
        );
        let span = RequestContext::logger_of(Some(&ctx));
        assert_eq!(span.id(), ctx.span.id());
    }
}
