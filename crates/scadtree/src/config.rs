//! Configuration for the parse pipeline.

/// Options controlling a [`Pipeline`](crate::Pipeline) run.
///
/// # Example
///
/// ```
/// use scadtree::ParseConfig;
///
/// let config = ParseConfig::default()
///     .with_comments(true)
///     .with_max_include_iterations(20);
/// assert!(config.include_comments());
/// assert_eq!(config.max_include_iterations(), 20);
/// ```
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Retain top-level comments as AST nodes.
    include_comments: bool,

    /// Upper bound on include-expansion passes; exceeding it reports a
    /// likely-circular-include error.
    max_include_iterations: usize,
}

impl ParseConfig {
    /// Creates a configuration with the given settings.
    pub fn new(include_comments: bool, max_include_iterations: usize) -> Self {
        Self {
            include_comments,
            max_include_iterations,
        }
    }

    /// Whether top-level comments are retained in the AST.
    pub fn include_comments(&self) -> bool {
        self.include_comments
    }

    /// The include-expansion iteration bound.
    pub fn max_include_iterations(&self) -> usize {
        self.max_include_iterations
    }

    /// Returns the configuration with comment retention set.
    pub fn with_comments(mut self, include_comments: bool) -> Self {
        self.include_comments = include_comments;
        self
    }

    /// Returns the configuration with the iteration bound set.
    pub fn with_max_include_iterations(mut self, max_include_iterations: usize) -> Self {
        self.max_include_iterations = max_include_iterations;
        self
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            include_comments: false,
            max_include_iterations: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParseConfig::default();
        assert!(!config.include_comments());
        assert_eq!(config.max_include_iterations(), 100);
    }

    #[test]
    fn test_builders() {
        let config = ParseConfig::default().with_comments(true);
        assert!(config.include_comments());
    }
}
