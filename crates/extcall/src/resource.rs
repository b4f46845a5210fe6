use std::fmt;

use crate::exception::{ExcType, RunError, SimpleException};

/// Error returned when a heap allocation would exceed a configured limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The heap already made `limit` allocations.
    Allocation { limit: usize, count: usize },
    /// The new object would push usage past `limit` bytes.
    Memory { limit: usize, used: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for RunError {
    /// Resource exhaustion surfaces as a `MemoryError` that extension code cannot swallow.
    fn from(err: ResourceError) -> Self {
        Self::UncatchableExc(Box::new(SimpleException::new_msg(ExcType::MemoryError, err)))
    }
}

/// Limits applied by [`LimitedTracker`].
///
/// `None` disables the corresponding check. Limits can be loaded from JSON so an
/// embedding host can keep them next to the rest of its configuration:
///
/// ```
/// # use extcall::ResourceLimits;
/// let limits = ResourceLimits::from_json(r#"{"max_allocations": 64}"#).unwrap();
/// assert_eq!(limits.max_allocations, Some(64));
/// assert_eq!(limits.max_memory, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of live-or-dead allocations over the heap's lifetime.
    #[serde(default)]
    pub max_allocations: Option<usize>,
    /// Maximum approximate heap memory in bytes.
    #[serde(default)]
    pub max_memory: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with every check disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_allocations: None,
            max_memory: None,
        }
    }

    #[must_use]
    pub const fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    #[must_use]
    pub const fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Parses limits from a JSON object. Missing fields mean "no limit".
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Maximum nesting depth for traversals of heap data (repr, dict key hashing).
///
/// Protects against stack overflow on deeply nested tuples and lists. Debug builds use
/// larger stack frames, so their limit is lower.
#[cfg(debug_assertions)]
pub const MAX_DATA_RECURSION_DEPTH: u16 = 100;
#[cfg(not(debug_assertions))]
pub const MAX_DATA_RECURSION_DEPTH: u16 = 500;

/// Trait for tracking heap resource usage.
///
/// The heap calls [`on_allocate`](Self::on_allocate) before every allocation and
/// [`on_free`](Self::on_free) whenever an object's storage is released. Sizes are
/// passed lazily so trackers that don't care about memory never compute them.
pub trait ResourceTracker: fmt::Debug {
    /// Consulted before every allocation; an `Err` aborts it.
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError>;

    /// Called when an object's storage is released.
    fn on_free(&mut self, get_size: impl FnOnce() -> usize);

    /// Allocations made so far, for trackers that count them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }

    /// Approximate bytes currently held, for trackers that measure them.
    fn current_memory_bytes(&self) -> Option<usize> {
        None
    }
}

/// Tracker that never rejects an allocation and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_free(&mut self, _get_size: impl FnOnce() -> usize) {}
}

/// Tracker enforcing [`ResourceLimits`].
#[derive(Debug, Clone, Default)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    allocation_count: usize,
    current_memory: usize,
}

impl LimitedTracker {
    #[must_use]
    pub const fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocation_count: 0,
            current_memory: 0,
        }
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, get_size: impl FnOnce() -> usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }

        let size = get_size();
        let new_memory = self.current_memory + size;
        if let Some(max) = self.limits.max_memory
            && new_memory > max
        {
            return Err(ResourceError::Memory {
                limit: max,
                used: new_memory,
            });
        }

        self.current_memory = new_memory;
        self.allocation_count += 1;
        Ok(())
    }

    fn on_free(&mut self, get_size: impl FnOnce() -> usize) {
        self.current_memory = self.current_memory.saturating_sub(get_size());
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }

    fn current_memory_bytes(&self) -> Option<usize> {
        Some(self.current_memory)
    }
}
