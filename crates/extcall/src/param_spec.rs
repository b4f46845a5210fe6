//! Declared parameter shapes and the per-runtime cache of interned keyword names.
//!
//! A [`ParamSpec`] is declared once per call site, typically as a `static`:
//!
//! ```
//! use extcall::ParamSpec;
//!
//! static SPEC: ParamSpec = ParamSpec::new(&["", "b", "c"], Some("f"));
//! let layout = SPEC.layout().unwrap();
//! assert_eq!(layout.positional_only(), 1);
//! assert_eq!(layout.keyword_names(), &["b", "c"]);
//! assert_eq!(layout.max_args(), 3);
//! ```
//!
//! The layout is derived on first use and shared by every thread. The interned name
//! objects belong to a heap, so they are cached per [`Context`](crate::Context) in a
//! [`ParamSpecCache`] keyed by the spec's [`SpecId`].

use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use ahash::AHashMap;

use crate::{
    exception::{ExcType, RunError, RunResult, SimpleException},
    heap::{Heap, HeapId},
    resource::ResourceTracker,
};

static NEXT_SPEC_ID: AtomicUsize = AtomicUsize::new(0);

/// Process-wide identity of a [`ParamSpec`] call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId(usize);

/// A malformed parameter declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecError {
    /// An empty name follows a non-empty one.
    EmptyKeywordName,
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKeywordName => f.write_str("Empty keyword parameter name"),
        }
    }
}

impl std::error::Error for SpecError {}

impl From<SpecError> for RunError {
    fn from(err: SpecError) -> Self {
        SimpleException::new_msg(ExcType::SystemError, err).into()
    }
}

/// Shape derived from a spec's keyword list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecLayout {
    positional_only: usize,
    keyword_names: &'static [&'static str],
}

impl SpecLayout {
    fn compute(keywords: &'static [&'static str]) -> Result<Self, SpecError> {
        let positional_only = keywords.iter().take_while(|name| name.is_empty()).count();
        let keyword_names = &keywords[positional_only..];
        if keyword_names.iter().any(|name| name.is_empty()) {
            return Err(SpecError::EmptyKeywordName);
        }
        Ok(Self {
            positional_only,
            keyword_names,
        })
    }

    /// Number of leading parameters that can only be passed positionally.
    #[must_use]
    pub fn positional_only(&self) -> usize {
        self.positional_only
    }

    /// Names that may be passed by keyword, in declaration order.
    #[must_use]
    pub fn keyword_names(&self) -> &'static [&'static str] {
        self.keyword_names
    }

    /// Total number of declared parameters.
    #[must_use]
    pub fn max_args(&self) -> usize {
        self.positional_only + self.keyword_names.len()
    }
}

/// A function's declared parameters.
///
/// Leading empty names are positional-only parameters.
#[derive(Debug)]
pub struct ParamSpec {
    keywords: &'static [&'static str],
    fname: Option<&'static str>,
    layout: OnceLock<Result<SpecLayout, SpecError>>,
    id: OnceLock<SpecId>,
}

impl ParamSpec {
    #[must_use]
    pub const fn new(keywords: &'static [&'static str], fname: Option<&'static str>) -> Self {
        Self {
            keywords,
            fname,
            layout: OnceLock::new(),
            id: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn keywords(&self) -> &'static [&'static str] {
        self.keywords
    }

    /// The function name used in diagnostics.
    #[must_use]
    pub fn fname(&self) -> Option<&'static str> {
        self.fname
    }

    /// Derived layout, computed on first call.
    pub fn layout(&self) -> Result<&SpecLayout, SpecError> {
        self.layout
            .get_or_init(|| SpecLayout::compute(self.keywords))
            .as_ref()
            .map_err(|err| *err)
    }

    /// Identity of this call site, assigned on first call.
    pub fn id(&self) -> SpecId {
        *self
            .id
            .get_or_init(|| SpecId(NEXT_SPEC_ID.fetch_add(1, Ordering::Relaxed)))
    }
}

/// Interned keyword-name objects per spec, owned by one runtime.
#[derive(Debug, Default)]
pub struct ParamSpecCache {
    names: AHashMap<SpecId, Arc<[HeapId]>>,
}

impl ParamSpecCache {
    /// The cached names for `spec`, if they were interned already.
    #[must_use]
    pub fn get(&self, spec: &ParamSpec) -> Option<Arc<[HeapId]>> {
        self.names.get(&spec.id()).cloned()
    }

    /// Returns the interned keyword names of `spec`, interning them on first use.
    ///
    /// Later calls return the cached sequence without touching the heap.
    pub fn interned_names(&mut self, heap: &mut Heap<impl ResourceTracker>, spec: &ParamSpec) -> RunResult<Arc<[HeapId]>> {
        let id = spec.id();
        if let Some(names) = self.names.get(&id) {
            return Ok(Arc::clone(names));
        }
        let layout = spec.layout()?;
        let names: Arc<[HeapId]> = layout
            .keyword_names()
            .iter()
            .map(|name| heap.intern(name))
            .collect::<Result<_, _>>()?;
        self.names.insert(id, Arc::clone(&names));
        Ok(names)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
