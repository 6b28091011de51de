//! Build options for [`HirBuilder`](crate::hir::HirBuilder).

/// Switches that control how a method is translated.
///
/// # Examples
///
/// ```rust,ignore
/// use hirforge::hir::BuildConfig;
///
/// let config = BuildConfig::default()
///     .with_idealize(false)
///     .with_strict_fallthrough(true);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildConfig {
    /// Fold constants and simplify algebraic identities while appending
    pub idealize: bool,
    /// Deduplicate pure instructions within a block
    pub value_numbering: bool,
    /// Log the finished graph at `debug` level
    pub print_ir: bool,
    /// Log every interpreted operation and appended instruction at `trace` level
    pub trace_generation: bool,
    /// Record events in the attached [`EventLog`](crate::EventLog)
    pub record_events: bool,
    /// Treat falling off the end of the method as an invariant violation
    pub strict_fallthrough: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            idealize: true,
            value_numbering: true,
            print_ir: false,
            trace_generation: false,
            record_events: true,
            strict_fallthrough: false,
        }
    }
}

impl BuildConfig {
    /// Enables or disables idealization.
    #[must_use]
    pub fn with_idealize(mut self, enabled: bool) -> Self {
        self.idealize = enabled;
        self
    }

    /// Enables or disables value numbering.
    #[must_use]
    pub fn with_value_numbering(mut self, enabled: bool) -> Self {
        self.value_numbering = enabled;
        self
    }

    /// Enables or disables the debug dump of the finished graph.
    #[must_use]
    pub fn with_print_ir(mut self, enabled: bool) -> Self {
        self.print_ir = enabled;
        self
    }

    /// Enables or disables per-operation tracing.
    #[must_use]
    pub fn with_trace_generation(mut self, enabled: bool) -> Self {
        self.trace_generation = enabled;
        self
    }

    /// Enables or disables event recording.
    #[must_use]
    pub fn with_record_events(mut self, enabled: bool) -> Self {
        self.record_events = enabled;
        self
    }

    /// Enables or disables strict fall-through checking.
    #[must_use]
    pub fn with_strict_fallthrough(mut self, enabled: bool) -> Self {
        self.strict_fallthrough = enabled;
        self
    }
}
