//! Adapter selection for declared call sites.
//!
//! # Design
//! A call site describes what it expects with `TypeDesc` values built by
//! hand: `Continuation<Item>`, `Continuation<Response<Item>>`, `Any`. No
//! runtime reflection is involved; concrete body types are recorded by
//! `TypeId` through `TypeDesc::of::<T>()`.
//!
//! Selection runs once per call site. `CoroutineAdapterFactory` either
//! declines (another factory may accept), returns an `AdapterPlan`, or
//! fails with a `ConfigError` when the declaration is malformed. A plan is
//! turned into a typed adapter once the caller names the body type, which
//! is checked against what the call site declared.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::adapter::{BodyAdapter, EnvelopeAdapter};
use crate::error::ConfigError;
use crate::executor::Executor;

/// The outer constructor of a described type.
#[derive(Debug, Clone, Copy)]
pub enum RawType {
    /// The suspension token a call site resumes.
    Continuation,
    /// The response envelope.
    Response,
    /// The "any result" return marker of a suspending call site.
    Any,
    /// A concrete Rust type.
    Named { id: TypeId, name: &'static str },
}

impl PartialEq for RawType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawType::Continuation, RawType::Continuation)
            | (RawType::Response, RawType::Response)
            | (RawType::Any, RawType::Any) => true,
            (RawType::Named { id: a, .. }, RawType::Named { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for RawType {}

/// Structural description of a declared type and its type arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    raw: RawType,
    arguments: Vec<TypeDesc>,
}

impl TypeDesc {
    pub fn new(raw: RawType, arguments: Vec<TypeDesc>) -> Self {
        Self { raw, arguments }
    }

    /// A concrete, fully known Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(
            RawType::Named {
                id: TypeId::of::<T>(),
                name: type_name::<T>(),
            },
            Vec::new(),
        )
    }

    pub fn any() -> Self {
        Self::new(RawType::Any, Vec::new())
    }

    /// `Continuation<inner>`.
    pub fn continuation(inner: TypeDesc) -> Self {
        Self::new(RawType::Continuation, vec![inner])
    }

    /// `Response<body>`.
    pub fn response(body: TypeDesc) -> Self {
        Self::new(RawType::Response, vec![body])
    }

    /// An unparameterized `raw`, such as a bare `Continuation`.
    pub fn raw(raw: RawType) -> Self {
        Self::new(raw, Vec::new())
    }

    pub fn raw_type(&self) -> RawType {
        self.raw
    }

    pub fn arguments(&self) -> &[TypeDesc] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&TypeDesc> {
        self.arguments.get(index)
    }

    pub fn is_parameterized(&self) -> bool {
        !self.arguments.is_empty()
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            RawType::Continuation => f.write_str("Continuation")?,
            RawType::Response => f.write_str("Response")?,
            RawType::Any => f.write_str("Any")?,
            RawType::Named { name, .. } => f.write_str(name)?,
        }
        if let Some((first, rest)) = self.arguments.split_first() {
            write!(f, "<{first}")?;
            for argument in rest {
                write!(f, ", {argument}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Metadata attached to a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub value: Option<String>,
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Declaration of a call site that expects a suspended result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub parameter: TypeDesc,
    pub return_type: TypeDesc,
    pub annotations: Vec<Annotation>,
}

impl CallSite {
    pub fn new(parameter: TypeDesc, return_type: TypeDesc) -> Self {
        Self {
            parameter,
            return_type,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

/// What the selected adapter resumes the caller with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// The unwrapped body of a successful response.
    Body,
    /// The full response envelope.
    Envelope,
}

impl ResultShape {
    fn describe(self) -> &'static str {
        match self {
            ResultShape::Body => "a body",
            ResultShape::Envelope => "a response envelope",
        }
    }
}

/// The outcome of selection: which adapter to build, for which body type.
#[derive(Clone)]
pub struct AdapterPlan {
    shape: ResultShape,
    response_type: TypeDesc,
    executor: Arc<dyn Executor>,
}

impl AdapterPlan {
    pub fn new(shape: ResultShape, response_type: TypeDesc, executor: Arc<dyn Executor>) -> Self {
        Self {
            shape,
            response_type,
            executor,
        }
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    /// The body type the call site declared.
    pub fn response_type(&self) -> &TypeDesc {
        &self.response_type
    }

    pub fn bind_body<T: Send + 'static>(&self) -> Result<BodyAdapter<T>, ConfigError> {
        self.check::<T>(ResultShape::Body)?;
        Ok(BodyAdapter::new(Arc::clone(&self.executor)))
    }

    pub fn bind_envelope<T: Send + 'static>(&self) -> Result<EnvelopeAdapter<T>, ConfigError> {
        self.check::<T>(ResultShape::Envelope)?;
        Ok(EnvelopeAdapter::new(Arc::clone(&self.executor)))
    }

    fn check<T: 'static>(&self, requested: ResultShape) -> Result<(), ConfigError> {
        if self.shape != requested {
            return Err(ConfigError::ShapeMismatch {
                planned: self.shape.describe(),
                requested: requested.describe(),
            });
        }
        let requested = TypeDesc::of::<T>();
        if self.response_type != requested {
            return Err(ConfigError::TypeMismatch {
                declared: self.response_type.to_string(),
                requested: requested.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for AdapterPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterPlan")
            .field("shape", &self.shape)
            .field("response_type", &self.response_type)
            .finish_non_exhaustive()
    }
}

/// Selects an adapter for a call site, or declines it.
pub trait AdapterFactory: Send + Sync {
    fn get(&self, site: &CallSite) -> Result<Option<AdapterPlan>, ConfigError>;
}

/// Accepts call sites taking `Continuation<Foo>` or
/// `Continuation<Response<Foo>>` and returning `Any`.
#[derive(Clone)]
pub struct CoroutineAdapterFactory {
    executor: Arc<dyn Executor>,
}

impl CoroutineAdapterFactory {
    /// Adapters built by this factory deliver results on `executor`.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// A body adapter for `T` without going through a call site.
    pub fn body<T: Send + 'static>(&self) -> BodyAdapter<T> {
        BodyAdapter::new(Arc::clone(&self.executor))
    }

    /// An envelope adapter for `T` without going through a call site.
    pub fn envelope<T: Send + 'static>(&self) -> EnvelopeAdapter<T> {
        EnvelopeAdapter::new(Arc::clone(&self.executor))
    }
}

impl AdapterFactory for CoroutineAdapterFactory {
    fn get(&self, site: &CallSite) -> Result<Option<AdapterPlan>, ConfigError> {
        if site.parameter.raw_type() != RawType::Continuation {
            return Ok(None);
        }
        if site.return_type.raw_type() != RawType::Any {
            return Ok(None);
        }
        let response_type = site.parameter.argument(0).ok_or_else(|| {
            ConfigError::UnparameterizedContinuation {
                found: site.parameter.to_string(),
            }
        })?;

        let plan = if response_type.raw_type() == RawType::Response {
            let body = response_type
                .argument(0)
                .ok_or_else(|| ConfigError::UnparameterizedResponse {
                    found: response_type.to_string(),
                })?;
            AdapterPlan::new(ResultShape::Envelope, body.clone(), Arc::clone(&self.executor))
        } else {
            AdapterPlan::new(ResultShape::Body, response_type.clone(), Arc::clone(&self.executor))
        };
        tracing::debug!(site = %site.parameter, shape = ?plan.shape(), "adapter selected");
        Ok(Some(plan))
    }
}

/// Ordered list of factories consulted until one accepts a call site.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: Vec<Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory(mut self, factory: impl AdapterFactory + 'static) -> Self {
        self.add(factory);
        self
    }

    pub fn add(&mut self, factory: impl AdapterFactory + 'static) {
        self.factories.push(Arc::new(factory));
    }

    /// The first plan offered for `site`.
    ///
    /// A configuration fault from any factory stops the search.
    pub fn resolve(&self, site: &CallSite) -> Result<AdapterPlan, ConfigError> {
        for factory in &self.factories {
            if let Some(plan) = factory.get(site)? {
                return Ok(plan);
            }
        }
        Err(ConfigError::NoAdapter {
            parameter: site.parameter.to_string(),
            return_type: site.return_type.to_string(),
        })
    }
}
