// parallel_job.rs - Per-index jobs and their data declarations

use crate::ecs::{
    ArchetypeDataPool, Component, ComponentId, EntityManager, EntityQuery, FieldArray, PoolError,
    Primitive, PrimitiveKind,
};
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

/// A job run once per live entity index of every matching pool.
///
/// The scheduler creates instances with `Default`, fills them through the
/// injectors listed in [`declare`](Self::declare), and never reuses an
/// instance across sub-ranges. Apart from injected data, `execute` must only
/// depend on `index`.
///
/// ```ignore
/// #[derive(Default)]
/// struct Decay { heat: Option<FieldArray<f32>> }
///
/// impl ParallelJob for Decay {
///     fn declare(decl: &mut JobDeclaration<Self>) {
///         decl.data::<Heat, f32>(&["level"], |job, array| job.heat = Some(array));
///     }
///     fn query(&self, query: &mut EntityQuery) { query.add_with::<Heat>(); }
///     fn estimate_workload(&self, _index: usize) -> u32 { 1 }
///     fn execute(&mut self, _entities: &EntityManager, index: usize, _thread_ordinal: usize) {
///         if let Some(heat) = &self.heat { heat.set(index, heat.get(index) * 0.5); }
///     }
/// }
/// ```
pub trait ParallelJob: Default + Send + 'static {
    /// List the columns and external values this job needs.
    fn declare(decl: &mut JobDeclaration<Self>) {
        let _ = decl;
    }

    /// Select the pools this job runs over.
    fn query(&self, query: &mut EntityQuery);

    /// Relative cost of processing `index`. Must be at least 1.
    fn estimate_workload(&self, index: usize) -> u32;

    /// Process one live entity index.
    fn execute(&mut self, entities: &EntityManager, index: usize, thread_ordinal: usize);
}

pub(crate) type DataBinder<J> =
    Box<dyn Fn(&mut J, &ArchetypeDataPool, ComponentId, usize) -> Result<(), PoolError> + Send + Sync>;

pub(crate) type ExternalBinder<J> = Box<dyn Fn(&mut J, &Arc<dyn Any + Send + Sync>) -> bool + Send + Sync>;

pub(crate) struct DataQuery<J> {
    pub type_id: TypeId,
    pub component: &'static str,
    pub chain: Vec<&'static str>,
    pub kind: PrimitiveKind,
    pub bind: DataBinder<J>,
}

pub(crate) struct ExternalQuery<J> {
    pub key: String,
    pub type_name: &'static str,
    pub accepts: fn(&(dyn Any + Send + Sync)) -> bool,
    pub bind: ExternalBinder<J>,
}

/// Data requirements of a [`ParallelJob`], collected once at registration.
pub struct JobDeclaration<J> {
    pub(crate) data: Vec<DataQuery<J>>,
    pub(crate) external: Vec<ExternalQuery<J>>,
}

impl<J: 'static> JobDeclaration<J> {
    pub(crate) fn new() -> Self {
        Self {
            data: Vec::new(),
            external: Vec::new(),
        }
    }

    /// Request the column of component `C` at `chain`, typed as `P`.
    ///
    /// `inject` receives a fresh view for every pool the job runs on.
    pub fn data<C, P>(
        &mut self,
        chain: &[&'static str],
        inject: impl Fn(&mut J, FieldArray<P>) + Send + Sync + 'static,
    ) -> &mut Self
    where
        C: Component,
        P: Primitive,
    {
        self.data.push(DataQuery {
            type_id: TypeId::of::<C>(),
            component: C::NAME,
            chain: chain.to_vec(),
            kind: P::KIND,
            bind: Box::new(
                move |job: &mut J,
                      pool: &ArchetypeDataPool,
                      id: ComponentId,
                      ordinal: usize|
                      -> Result<(), PoolError> {
                    inject(job, pool.field_array::<P>(id, ordinal)?);
                    Ok(())
                },
            ),
        });
        self
    }

    /// Request the external value stored under `key`, which must be a `T`.
    pub fn external<T>(
        &mut self,
        key: impl Into<String>,
        inject: impl Fn(&mut J, Arc<T>) + Send + Sync + 'static,
    ) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.external.push(ExternalQuery {
            key: key.into(),
            type_name: type_name::<T>(),
            accepts: |value: &(dyn Any + Send + Sync)| value.is::<T>(),
            bind: Box::new(
                move |job: &mut J, value: &Arc<dyn Any + Send + Sync>| match Arc::clone(value)
                    .downcast::<T>()
                {
                    Ok(value) => {
                        inject(job, value);
                        true
                    }
                    Err(_) => false,
                },
            ),
        });
        self
    }
}
